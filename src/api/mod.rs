//! API module
//!
//! HTTP endpoints and middleware in front of the ledger.

pub mod middleware;
pub mod routes;

use axum::{middleware as axum_middleware, Router};
use tower_http::request_id::{MakeRequestUuid, PropagateRequestIdLayer, SetRequestIdLayer};
use tower_http::trace::TraceLayer;

use crate::store::TransactionExecutor;

pub use middleware::ApiKeys;
pub use routes::{create_router, AppState};

/// Build the full application router
///
/// Layers run outermost first: request id -> trace -> auth -> logging -> handler.
pub fn build_app<X>(state: AppState<X>, api_keys: ApiKeys) -> Router
where
    X: TransactionExecutor + Clone + 'static,
{
    let protected_routes = create_router::<X>()
        .layer(axum_middleware::from_fn(middleware::logging_middleware))
        .layer(axum_middleware::from_fn_with_state(
            api_keys,
            middleware::auth_middleware,
        ));

    Router::new()
        // Health check (no auth)
        .route("/health", axum::routing::get(health_check))
        .nest("/api/v1", protected_routes)
        .layer(PropagateRequestIdLayer::x_request_id())
        .layer(TraceLayer::new_for_http())
        .layer(SetRequestIdLayer::x_request_id(MakeRequestUuid))
        .with_state(state)
}

/// Health check endpoint
async fn health_check() -> &'static str {
    "OK"
}
