use std::sync::Arc;

use axum::{
    Router,
    body::Body,
    http::{Method, Request, StatusCode, header},
};
use http_body_util::BodyExt;
use serde_json::{Value, json};
use tower::ServiceExt;
use varstock::application::hooks::StockHooks;
use varstock::application::lookup::StockLookup;
use varstock::application::stock_sync::StockSync;
use varstock::cache::{CacheConfig, KeyDeriver};
use varstock::domain::attributes::AttributeSet;
use varstock::domain::entities::ProductRecord;
use varstock::domain::types::{ProductId, ProductKind, ProductLifecycle, StockStatus};
use varstock::infra::http::{AdminToken, HttpState, build_router};
use varstock::infra::memory::{InMemoryCatalog, InMemoryMetaStore};

const ADMIN_TOKEN: &str = "prime-secret";

fn record(
    id: i64,
    parent: Option<i64>,
    kind: ProductKind,
    status: StockStatus,
    attributes: &[(&str, &str)],
) -> ProductRecord {
    ProductRecord {
        id: ProductId::new(id),
        parent_id: parent.map(ProductId::new),
        kind,
        lifecycle: ProductLifecycle::Publish,
        stock_status: status,
        attributes: attributes.iter().copied().collect::<AttributeSet>(),
    }
}

fn seeded_catalog() -> Arc<InMemoryCatalog> {
    let catalog = Arc::new(InMemoryCatalog::new());
    catalog.insert(record(
        10,
        None,
        ProductKind::Variable,
        StockStatus::in_stock(),
        &[],
    ));
    catalog.insert(record(
        11,
        Some(10),
        ProductKind::Variation,
        StockStatus::in_stock(),
        &[("attribute_pa_size", "M"), ("attribute_pa_color", "Red")],
    ));
    catalog.insert(record(
        12,
        Some(10),
        ProductKind::Variation,
        StockStatus::out_of_stock(),
        &[("attribute_pa_size", "L"), ("attribute_pa_color", "Red")],
    ));
    catalog
}

struct Harness {
    router: Router,
    store: Arc<InMemoryMetaStore>,
}

fn harness(config: CacheConfig, admin_token: Option<&str>) -> Harness {
    let catalog = seeded_catalog();
    let store = Arc::new(InMemoryMetaStore::new());
    let deriver = Arc::new(KeyDeriver::from_config(&config).expect("valid prefix"));
    let sync = Arc::new(StockSync::new(
        deriver.clone(),
        catalog.clone(),
        store.clone(),
    ));
    let hooks = Arc::new(StockHooks::new(config, catalog.clone(), sync.clone()));

    let state = HttpState {
        hooks,
        sync,
        lookup: StockLookup::new(deriver, store.clone()),
        health: catalog,
        admin_token: admin_token.map(|token| Arc::new(AdminToken::new(token))),
    };

    Harness {
        router: build_router(state),
        store,
    }
}

async fn send(router: &Router, request: Request<Body>) -> (StatusCode, Value) {
    let response = router
        .clone()
        .oneshot(request)
        .await
        .expect("router responds");
    let status = response.status();
    let bytes = response
        .into_body()
        .collect()
        .await
        .expect("body collects")
        .to_bytes();
    let body = if bytes.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&bytes).expect("json body")
    };
    (status, body)
}

fn post_json(uri: &str, body: Value) -> Request<Body> {
    Request::builder()
        .method(Method::POST)
        .uri(uri)
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from(body.to_string()))
        .expect("request builds")
}

fn get(uri: &str) -> Request<Body> {
    Request::builder()
        .uri(uri)
        .body(Body::empty())
        .expect("request builds")
}

fn prime_request(token: Option<&str>) -> Request<Body> {
    let mut builder = Request::builder()
        .method(Method::POST)
        .uri("/admin/stock-cache/prime");
    if let Some(token) = token {
        builder = builder.header(header::AUTHORIZATION, format!("Bearer {token}"));
    }
    builder.body(Body::empty()).expect("request builds")
}

#[tokio::test]
async fn variation_hook_writes_every_subset_key() {
    let h = harness(CacheConfig::default(), None);

    let (status, body) = send(
        &h.router,
        post_json(
            "/hooks/variations/11/stock-status",
            json!({ "status": "outofstock" }),
        ),
    )
    .await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["synced"], json!(true));
    assert_eq!(body["writes"], json!(3));

    let entries = h.store.entries_for(ProductId::new(10));
    assert_eq!(entries.len(), 3);
    for key in [
        "_codelight_stock_pa_size:m",
        "_codelight_stock_pa_color:red",
        "_codelight_stock_pa_color:red_pa_size:m",
    ] {
        assert_eq!(
            entries.get(key).map(StockStatus::as_str),
            Some("outofstock"),
            "{key}"
        );
    }
}

#[tokio::test]
async fn product_hook_fans_out_and_lookup_reads_back() {
    let h = harness(CacheConfig::default(), None);

    let (status, body) = send(
        &h.router,
        post_json(
            "/hooks/products/10/stock-status",
            json!({ "status": "instock" }),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["variations"], json!(2));
    assert_eq!(body["writes"], json!(6));

    let (status, body) = send(&h.router, get("/products/10/stock?pa_size=L")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["key"], json!("_codelight_stock_pa_size:l"));
    assert_eq!(body["status"], json!("outofstock"));

    // Siblings share the color-only key; the last child written wins.
    let (_, body) = send(&h.router, get("/products/10/stock?attribute_pa_color=RED")).await;
    assert_eq!(body["status"], json!("outofstock"));
}

#[tokio::test]
async fn lookup_of_unwritten_key_returns_null_status() {
    let h = harness(CacheConfig::default(), None);

    let (status, body) = send(&h.router, get("/products/10/stock?pa_size=XL")).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["key"], json!("_codelight_stock_pa_size:xl"));
    assert_eq!(body["status"], Value::Null);
}

#[tokio::test]
async fn unknown_product_hook_is_not_found() {
    let h = harness(CacheConfig::default(), None);

    let (status, body) = send(
        &h.router,
        post_json(
            "/hooks/variations/999/stock-status",
            json!({ "status": "instock" }),
        ),
    )
    .await;

    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["error"]["code"], json!("not_found"));
    assert_eq!(h.store.write_count(), 0);
}

#[tokio::test]
async fn blank_status_is_rejected() {
    let h = harness(CacheConfig::default(), None);

    let (status, body) = send(
        &h.router,
        post_json(
            "/hooks/variations/11/stock-status",
            json!({ "status": "  " }),
        ),
    )
    .await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"]["code"], json!("bad_request"));
}

#[tokio::test]
async fn hooks_are_not_mounted_without_autoload() {
    let h = harness(
        CacheConfig {
            autoload: false,
            ..Default::default()
        },
        None,
    );

    let (status, _) = send(
        &h.router,
        post_json(
            "/hooks/variations/11/stock-status",
            json!({ "status": "instock" }),
        ),
    )
    .await;

    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(h.store.write_count(), 0);
}

#[tokio::test]
async fn prime_requires_the_admin_token() {
    let h = harness(CacheConfig::default(), Some(ADMIN_TOKEN));

    let (status, body) = send(&h.router, prime_request(None)).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body["error"]["code"], json!("unauthorized"));

    let (status, _) = send(&h.router, prime_request(Some("wrong"))).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(h.store.write_count(), 0);
}

#[tokio::test]
async fn prime_rebuilds_every_parent() {
    let h = harness(CacheConfig::default(), Some(ADMIN_TOKEN));

    let (status, body) = send(&h.router, prime_request(Some(ADMIN_TOKEN))).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(
        body,
        json!({ "parents": 1, "failed_parents": 0, "variations": 2, "writes": 6 })
    );
    assert_eq!(
        h.store
            .entries_for(ProductId::new(10))
            .get("_codelight_stock_pa_color:red_pa_size:m")
            .map(StockStatus::as_str),
        Some("instock")
    );
}

#[tokio::test]
async fn prime_is_not_mounted_without_a_token() {
    let h = harness(CacheConfig::default(), None);

    let (status, _) = send(&h.router, prime_request(Some(ADMIN_TOKEN))).await;

    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn health_reports_no_content() {
    let h = harness(CacheConfig::default(), None);

    let (status, body) = send(&h.router, get("/health")).await;

    assert_eq!(status, StatusCode::NO_CONTENT);
    assert_eq!(body, Value::Null);
}

#[tokio::test]
async fn untracked_attributes_never_reach_keys() {
    let h = harness(
        CacheConfig {
            untracked_attributes: vec!["pa_color".to_string()],
            ..Default::default()
        },
        None,
    );

    let (status, body) = send(
        &h.router,
        post_json(
            "/hooks/variations/11/stock-status",
            json!({ "status": "onbackorder" }),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["writes"], json!(1));

    let (_, body) = send(
        &h.router,
        get("/products/10/stock?pa_size=m&attribute_pa_color=red"),
    )
    .await;
    assert_eq!(body["key"], json!("_codelight_stock_pa_size:m"));
    assert_eq!(body["status"], json!("onbackorder"));
}
