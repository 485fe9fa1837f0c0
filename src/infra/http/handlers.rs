use std::collections::BTreeMap;

use axum::Json;
use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde::{Deserialize, Serialize};

use crate::application::error::ErrorReport;
use crate::application::hooks::HookOutcome;
use crate::application::stock_sync::PrimeSummary;
use crate::cache::CacheKey;
use crate::domain::attributes::AttributeSet;
use crate::domain::types::{ProductId, StockStatus};

use super::error::{ApiError, hook_to_api, repo_to_api, sync_to_api};
use super::state::HttpState;

#[derive(Debug, Deserialize)]
pub struct StockStatusPayload {
    pub status: String,
}

#[derive(Debug, Serialize)]
pub struct HookResponse {
    pub product_id: ProductId,
    pub synced: bool,
    pub variations: usize,
    pub writes: usize,
}

impl HookResponse {
    fn new(product_id: ProductId, outcome: HookOutcome) -> Self {
        match outcome {
            HookOutcome::Disabled => Self {
                product_id,
                synced: false,
                variations: 0,
                writes: 0,
            },
            HookOutcome::Synced(outcome) => Self {
                product_id,
                synced: true,
                variations: outcome.variations,
                writes: outcome.writes,
            },
        }
    }
}

#[derive(Debug, Serialize)]
pub struct StockLookupResponse {
    pub product_id: ProductId,
    pub key: Option<CacheKey>,
    pub status: Option<StockStatus>,
}

fn parse_status(payload: StockStatusPayload) -> Result<StockStatus, ApiError> {
    StockStatus::parse(payload.status)
        .map_err(|err| ApiError::bad_request("invalid stock status", Some(err.to_string())))
}

pub async fn product_stock_status(
    State(state): State<HttpState>,
    Path(id): Path<i64>,
    Json(payload): Json<StockStatusPayload>,
) -> Result<impl IntoResponse, ApiError> {
    let product_id = ProductId::new(id);
    let status = parse_status(payload)?;

    let outcome = state
        .hooks
        .product_status_set(product_id, status)
        .await
        .map_err(hook_to_api)?;

    Ok(Json(HookResponse::new(product_id, outcome)))
}

pub async fn variation_stock_status(
    State(state): State<HttpState>,
    Path(id): Path<i64>,
    Json(payload): Json<StockStatusPayload>,
) -> Result<impl IntoResponse, ApiError> {
    let variation_id = ProductId::new(id);
    let status = parse_status(payload)?;

    let outcome = state
        .hooks
        .variation_status_set(variation_id, status)
        .await
        .map_err(hook_to_api)?;

    Ok(Json(HookResponse::new(variation_id, outcome)))
}

pub async fn stock_lookup(
    State(state): State<HttpState>,
    Path(id): Path<i64>,
    Query(filter): Query<BTreeMap<String, String>>,
) -> Result<impl IntoResponse, ApiError> {
    let product_id = ProductId::new(id);
    let filter = AttributeSet::from(filter);

    let result = state
        .lookup
        .status_for(product_id, &filter)
        .await
        .map_err(repo_to_api)?;

    Ok(Json(StockLookupResponse {
        product_id,
        key: result.key,
        status: result.status,
    }))
}

pub async fn prime_stock_cache(
    State(state): State<HttpState>,
) -> Result<Json<PrimeSummary>, ApiError> {
    let summary = state.sync.prime_cache().await.map_err(sync_to_api)?;
    Ok(Json(summary))
}

pub async fn health(State(state): State<HttpState>) -> Response {
    match state.health.health_check().await {
        Ok(()) => StatusCode::NO_CONTENT.into_response(),
        Err(err) => {
            let mut response = StatusCode::SERVICE_UNAVAILABLE.into_response();
            ErrorReport::from_error(
                "infra::http::health",
                StatusCode::SERVICE_UNAVAILABLE,
                &err,
            )
            .attach(&mut response);
            response
        }
    }
}
