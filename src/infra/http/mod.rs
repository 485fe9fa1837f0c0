//! HTTP surface: platform webhooks, storefront lookups and maintenance routes.

mod auth;
mod error;
mod handlers;
mod middleware;
mod state;

pub use auth::AdminToken;
pub use error::{ApiError, ApiErrorBody, codes};
pub use state::HttpState;

use axum::{
    Router, middleware as axum_middleware,
    routing::{get, post},
};

use self::middleware::{log_responses, set_request_context};

/// Build the application router.
///
/// Hook routes are mounted only while the cache autoloads; the maintenance
/// routes only when an admin token is configured.
pub fn build_router(state: HttpState) -> Router {
    let mut router = Router::new()
        .route("/health", get(handlers::health))
        .route("/products/{id}/stock", get(handlers::stock_lookup));

    if state.hooks.config().is_enabled() {
        router = router
            .route(
                "/hooks/products/{id}/stock-status",
                post(handlers::product_stock_status),
            )
            .route(
                "/hooks/variations/{id}/stock-status",
                post(handlers::variation_stock_status),
            );
    }

    if state.admin_token.is_some() {
        let admin = Router::new()
            .route(
                "/admin/stock-cache/prime",
                post(handlers::prime_stock_cache),
            )
            .layer(axum_middleware::from_fn_with_state(
                state.clone(),
                auth::admin_auth,
            ));
        router = router.merge(admin);
    }

    router
        .with_state(state)
        .layer(axum_middleware::from_fn(log_responses))
        .layer(axum_middleware::from_fn(set_request_context))
}
