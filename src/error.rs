//! Adapter error type.
//!
//! Every adapter returns `Result<String, AdapterError>`. The MCP dispatcher is
//! the only place that turns these into text for the host.

use serde_json::Value;

use crate::http::truncate_str;

/// Longest slice of a raw upstream body quoted in an error message.
const MAX_ERROR_BODY: usize = 200;

#[derive(Debug, thiserror::Error)]
pub enum AdapterError {
    #[error("Missing configuration: {0} environment variable is not set")]
    MissingConfig(String),

    #[error("{0}")]
    InvalidArgument(String),

    #[error("Request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("{service} API error: {status} - {message}")]
    Status {
        service: &'static str,
        status: u16,
        message: String,
    },

    #[error("Socket request failed: {0}")]
    Socket(#[from] hyper::Error),

    #[error("Invalid request: {0}")]
    Request(#[from] hyper::http::Error),

    #[error("Invalid JSON: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Invalid URL: {0}")]
    Url(#[from] url::ParseError),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Unknown tool: {0}")]
    UnknownTool(String),

    #[error("Unknown resource URI: {0}")]
    UnknownResource(String),

    #[error("Unknown prompt: {0}")]
    UnknownPrompt(String),

    #[error("{0}")]
    Unsupported(String),

    #[error("{context}: {source}")]
    Context {
        context: String,
        #[source]
        source: Box<AdapterError>,
    },
}

pub type Result<T> = std::result::Result<T, AdapterError>;

/// Prefix an error with what the tool was doing, e.g. "Failed to delete user".
pub trait ResultExt<T> {
    fn context(self, context: impl Into<String>) -> Result<T>;
}

impl<T> ResultExt<T> for Result<T> {
    fn context(self, context: impl Into<String>) -> Result<T> {
        self.map_err(|e| AdapterError::Context {
            context: context.into(),
            source: Box::new(e),
        })
    }
}

impl AdapterError {
    pub fn invalid(msg: impl Into<String>) -> Self {
        AdapterError::InvalidArgument(msg.into())
    }

    /// Build a status error, pulling a readable message out of the upstream body.
    pub fn status(service: &'static str, status: u16, body: &str) -> Self {
        AdapterError::Status {
            service,
            status,
            message: extract_error_message(body),
        }
    }

    /// Upstream HTTP status, if this error came from a non-2xx reply.
    pub fn http_status(&self) -> Option<u16> {
        match self {
            AdapterError::Status { status, .. } => Some(*status),
            AdapterError::Http(e) => e.status().map(|s| s.as_u16()),
            AdapterError::Context { source, .. } => source.http_status(),
            _ => None,
        }
    }

    pub fn is_not_found(&self) -> bool {
        self.http_status() == Some(404)
    }
}

/// Pick the most useful message out of a vendor error body.
///
/// Vendors disagree on the shape: Artifactory sends `errors[{message}]`,
/// GitLab and Grafana send `message`, Elasticsearch sends `error.reason`,
/// Nexus sometimes sends a bare string. Anything else is quoted raw.
pub fn extract_error_message(body: &str) -> String {
    let trimmed = body.trim();
    if trimmed.is_empty() {
        return "empty response body".to_string();
    }

    if let Ok(json) = serde_json::from_str::<Value>(trimmed) {
        if let Some(msg) = message_from_json(&json) {
            return msg;
        }
    }

    truncate_str(trimmed, MAX_ERROR_BODY).to_string()
}

fn message_from_json(json: &Value) -> Option<String> {
    if let Some(first) = json.get("errors").and_then(|e| e.as_array()).and_then(|a| a.first()) {
        return Some(match first {
            Value::String(s) => s.clone(),
            other => other
                .get("message")
                .and_then(|m| m.as_str())
                .map(str::to_string)
                .unwrap_or_else(|| other.to_string()),
        });
    }

    match json.get("message") {
        Some(Value::String(s)) => return Some(s.clone()),
        Some(Value::Object(_)) | Some(Value::Array(_)) => {
            return json.get("message").map(|m| m.to_string());
        }
        _ => {}
    }

    match json.get("error") {
        Some(Value::String(s)) => return Some(s.clone()),
        Some(err @ Value::Object(_)) => {
            let reason = err.get("reason").and_then(|r| r.as_str());
            let kind = err.get("type").and_then(|t| t.as_str());
            return Some(match (kind, reason) {
                (Some(k), Some(r)) => format!("{}: {}", k, r),
                (None, Some(r)) => r.to_string(),
                _ => err.to_string(),
            });
        }
        _ => {}
    }

    json.get("errorMessages")
        .and_then(|e| e.as_array())
        .and_then(|a| a.first())
        .and_then(|m| m.as_str())
        .map(str::to_string)
}
