pub mod adapters;
pub mod args;
pub mod auth;
pub mod config;
pub mod error;
pub mod http;
pub mod mcp;
pub mod state;

use axum::middleware;
use axum::routing::{get, post};
use axum::Router;

use state::AppState;

/// Build the HTTP transport router with the given state.
/// Extracted from `main()` so integration tests can construct the app
/// without binding to a network port.
pub fn create_router(state: AppState) -> Router {
    let protected = Router::new()
        .route("/mcp", post(mcp::http::mcp_handler))
        .route_layer(middleware::from_fn_with_state(state.clone(), auth::require_auth));

    Router::new()
        .route("/health", get(mcp::http::health))
        .merge(protected)
        .with_state(state)
}
