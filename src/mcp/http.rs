//! Streamable-HTTP style transport: JSON-RPC 2.0 over `POST /mcp`.

use axum::body::Bytes;
use axum::extract::State;
use axum::http::StatusCode;
use axum::Json;
use serde_json::{json, Value};

use super::server::{json_rpc_error, PARSE_ERROR};
use crate::state::AppState;

/// MCP JSON-RPC 2.0 endpoint handler.
///
/// Notifications get `202 Accepted` with an empty object, everything else a
/// `200` carrying the JSON-RPC reply (errors included).
pub async fn mcp_handler(State(state): State<AppState>, body: Bytes) -> (StatusCode, Json<Value>) {
    let message: Value = match serde_json::from_slice(&body) {
        Ok(v) => v,
        Err(e) => {
            tracing::warn!(error = %e, "unparseable MCP request body");
            return (
                StatusCode::OK,
                Json(json_rpc_error(Value::Null, PARSE_ERROR, &format!("Parse error: {}", e))),
            );
        }
    };

    match state.server.handle(message).await {
        Some(reply) => (StatusCode::OK, Json(reply)),
        None => (StatusCode::ACCEPTED, Json(json!({}))),
    }
}

/// Liveness check; does not touch the upstream.
pub async fn health(State(state): State<AppState>) -> Json<Value> {
    Json(json!({
        "status": "ok",
        "adapter": state.server.adapter().name(),
        "version": env!("CARGO_PKG_VERSION"),
        "uptime_seconds": state.start_time.elapsed().as_secs(),
    }))
}
