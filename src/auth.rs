// Optional Bearer token authentication middleware for the HTTP transport.
// If MCP_AUTH_SECRET is set, `/mcp` requires `Authorization: Bearer <secret>`.
// If not set, auth is disabled.

use axum::{
    extract::{Request, State},
    http::StatusCode,
    middleware::Next,
    response::Response,
};
use subtle::ConstantTimeEq;

use crate::state::AppState;

/// Middleware that enforces Bearer token auth when MCP_AUTH_SECRET is configured.
/// `/health` is mounted outside this layer.
pub async fn require_auth(
    State(state): State<AppState>,
    request: Request,
    next: Next,
) -> Result<Response, StatusCode> {
    let secret = match state.auth_secret.as_deref() {
        Some(s) => s,
        None => return Ok(next.run(request).await),
    };

    let auth_header = request
        .headers()
        .get("authorization")
        .and_then(|v| v.to_str().ok());

    match auth_header.and_then(|h| h.strip_prefix("Bearer ")) {
        Some(token) if token_matches(token, secret) => Ok(next.run(request).await),
        Some(_) => {
            tracing::warn!("Auth failed: invalid token");
            Err(StatusCode::UNAUTHORIZED)
        }
        None => {
            tracing::warn!("Auth failed: missing or malformed Authorization header");
            Err(StatusCode::UNAUTHORIZED)
        }
    }
}

/// Constant-time comparison; lengths leak, contents do not.
fn token_matches(token: &str, secret: &str) -> bool {
    token.as_bytes().ct_eq(secret.as_bytes()).into()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn token_comparison() {
        assert!(token_matches("s3cret", "s3cret"));
        assert!(!token_matches("s3cres", "s3cret"));
        assert!(!token_matches("s3cret-longer", "s3cret"));
        assert!(!token_matches("", "s3cret"));
    }
}
