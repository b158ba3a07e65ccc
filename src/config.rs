//! Environment-driven configuration.
//!
//! Vendor credentials are read once when an adapter is built and never
//! change afterwards. `.env` is loaded by `main` before any of this runs.

use std::str::FromStr;
use std::time::Duration;

use crate::error::{AdapterError, Result};
use crate::http::DEFAULT_TIMEOUT;

/// Required variable; unset and empty are both errors.
pub fn required(name: &str) -> Result<String> {
    optional(name).ok_or_else(|| AdapterError::MissingConfig(name.to_string()))
}

pub fn optional(name: &str) -> Option<String> {
    std::env::var(name)
        .ok()
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

pub fn with_default(name: &str, default: &str) -> String {
    optional(name).unwrap_or_else(|| default.to_string())
}

/// First variable that is set, in order.
pub fn first_of(names: &[&str]) -> Option<String> {
    names.iter().find_map(|n| optional(n))
}

/// Boolean switch. Accepts true/1/yes/on in any case.
pub fn flag(name: &str, default: bool) -> bool {
    match optional(name) {
        Some(v) => matches!(v.to_ascii_lowercase().as_str(), "true" | "1" | "yes" | "on"),
        None => default,
    }
}

pub fn parse_or<T: FromStr>(name: &str, default: T) -> T {
    match optional(name) {
        Some(v) => v.parse().unwrap_or_else(|_| {
            tracing::warn!("{} has an unparseable value {:?}, using default", name, v);
            default
        }),
        None => default,
    }
}

/// Upstream request timeout shared by every adapter.
pub fn http_timeout() -> Duration {
    Duration::from_secs(parse_or("HTTP_TIMEOUT_SECS", DEFAULT_TIMEOUT.as_secs()))
}

/// Process-level settings for the MCP transports.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    /// When set, `POST /mcp` requires `Authorization: Bearer <secret>`.
    pub auth_secret: Option<String>,
    pub max_body_bytes: usize,
}

impl ServerConfig {
    pub fn from_env() -> Self {
        Self {
            host: with_default("MCP_HOST", "0.0.0.0"),
            port: parse_or("PORT", 8081),
            auth_secret: optional("MCP_AUTH_SECRET"),
            max_body_bytes: parse_or("MCP_MAX_BODY_BYTES", 10 * 1024 * 1024),
        }
    }
}
