// devops-mcp - HTTP transport state

use std::sync::Arc;
use std::time::Instant;

use crate::mcp::McpServer;

/// Shared state for the axum transport. Clone-friendly; everything is Arc'd.
#[derive(Clone)]
pub struct AppState {
    pub server: McpServer,
    pub start_time: Instant,
    /// Optional bearer secret from MCP_AUTH_SECRET. None = no auth.
    pub auth_secret: Option<Arc<str>>,
}

impl AppState {
    pub fn new(server: McpServer, auth_secret: Option<String>) -> Self {
        if auth_secret.is_some() {
            tracing::info!("MCP_AUTH_SECRET configured, bearer authentication enabled");
        } else {
            tracing::info!("MCP_AUTH_SECRET not set, /mcp is unauthenticated");
        }

        Self {
            server,
            start_time: Instant::now(),
            auth_secret: auth_secret.map(Arc::from),
        }
    }
}
