use axum::Router;
use axum::routing::any;

use super::handlers;
use crate::module::AppState;

/// Proxy routes. The caller's `SecurityContext` must already be installed as a
/// request extension by the host's auth layer.
pub fn router(state: AppState) -> Router {
    Router::new()
        .route(
            "/datasources/{id}/{*proxy_path}",
            any(handlers::proxy::proxy_handler),
        )
        .route("/datasources/{id}/", any(handlers::proxy::proxy_handler))
        .route("/datasources/{id}", any(handlers::proxy::proxy_handler))
        .layer(axum::Extension(state))
}

/// Router with a fixed security context, for tests.
#[cfg(any(test, feature = "test-utils"))]
pub fn test_router(state: AppState, ctx: dataproxy_sdk::SecurityContext) -> Router {
    router(state).layer(axum::Extension(ctx))
}
