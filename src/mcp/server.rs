//! MCP server: JSON-RPC 2.0 dispatch for one adapter.
//!
//! Transport-agnostic. Both `stdio` and the axum `/mcp` route feed raw
//! messages into [`McpServer::handle`].
//!
//! Supported methods:
//! - `initialize` (server info + capabilities)
//! - `notifications/initialized` / `initialized` (client ack, no reply)
//! - `ping`
//! - `tools/list`, `tools/call`
//! - `resources/list`, `resources/templates/list`, `resources/read`
//! - `prompts/list`, `prompts/get`

use std::sync::Arc;

use serde_json::{json, Value};

use crate::adapters::Adapter;

pub const PROTOCOL_VERSION: &str = "2024-11-05";

pub const PARSE_ERROR: i32 = -32700;
pub const INVALID_REQUEST: i32 = -32600;
pub const METHOD_NOT_FOUND: i32 = -32601;
pub const INVALID_PARAMS: i32 = -32602;

#[derive(Clone)]
pub struct McpServer {
    adapter: Arc<dyn Adapter>,
}

impl McpServer {
    pub fn new(adapter: Arc<dyn Adapter>) -> Self {
        Self { adapter }
    }

    pub fn adapter(&self) -> &Arc<dyn Adapter> {
        &self.adapter
    }

    /// Handle one JSON-RPC message or a batch. `None` means nothing to send back.
    pub async fn handle(&self, message: Value) -> Option<Value> {
        match message {
            Value::Array(batch) => {
                if batch.is_empty() {
                    return Some(json_rpc_error(Value::Null, INVALID_REQUEST, "Empty batch"));
                }
                let mut replies = Vec::with_capacity(batch.len());
                for item in batch {
                    if let Some(reply) = self.handle_single(item).await {
                        replies.push(reply);
                    }
                }
                if replies.is_empty() { None } else { Some(Value::Array(replies)) }
            }
            single => self.handle_single(single).await,
        }
    }

    async fn handle_single(&self, request: Value) -> Option<Value> {
        if !request.is_object() {
            return Some(json_rpc_error(Value::Null, INVALID_REQUEST, "Request must be a JSON object"));
        }

        let method = request.get("method").and_then(|m| m.as_str()).unwrap_or("");
        let id = request.get("id").cloned();

        tracing::debug!(method = %method, "MCP request");

        // Notifications carry no id and never get a reply.
        if method == "initialized" || method.starts_with("notifications/") {
            return None;
        }

        let id = id.unwrap_or(Value::Null);
        let reply = match method {
            "initialize" => self.handle_initialize(&id),
            "ping" => handle_ping(&id),
            "tools/list" => self.handle_tools_list(&id),
            "tools/call" => self.handle_tools_call(&request, &id).await,
            "resources/list" => self.handle_resources_list(&id),
            "resources/templates/list" => self.handle_resource_templates_list(&id),
            "resources/read" => self.handle_resources_read(&request, &id).await,
            "prompts/list" => self.handle_prompts_list(&id),
            "prompts/get" => self.handle_prompts_get(&request, &id).await,
            "" => json_rpc_error(id, INVALID_REQUEST, "Missing 'method'"),
            _ => json_rpc_error(id, METHOD_NOT_FOUND, &format!("Method not found: {}", method)),
        };
        Some(reply)
    }

    // ── initialize ──────────────────────────────────────────────────────────

    fn handle_initialize(&self, id: &Value) -> Value {
        let mut capabilities = json!({
            "tools": { "listChanged": false },
        });
        if !self.adapter.resources().is_empty() || !self.adapter.resource_templates().is_empty() {
            capabilities["resources"] = json!({ "subscribe": false, "listChanged": false });
        }
        if !self.adapter.prompts().is_empty() {
            capabilities["prompts"] = json!({ "listChanged": false });
        }

        json!({
            "jsonrpc": "2.0",
            "id": id,
            "result": {
                "protocolVersion": PROTOCOL_VERSION,
                "capabilities": capabilities,
                "serverInfo": {
                    "name": self.adapter.name(),
                    "version": env!("CARGO_PKG_VERSION")
                },
                "instructions": self.adapter.instructions()
            }
        })
    }

    // ── tools/list ──────────────────────────────────────────────────────────

    fn handle_tools_list(&self, id: &Value) -> Value {
        json!({
            "jsonrpc": "2.0",
            "id": id,
            "result": { "tools": self.adapter.tools() }
        })
    }

    // ── tools/call ──────────────────────────────────────────────────────────

    async fn handle_tools_call(&self, request: &Value, id: &Value) -> Value {
        let params = request.get("params").cloned().unwrap_or(json!({}));
        let tool_name = params.get("name").and_then(|n| n.as_str()).unwrap_or("");
        let arguments = match params.get("arguments") {
            None | Some(Value::Null) => json!({}),
            Some(args) => args.clone(),
        };

        if tool_name.is_empty() {
            return json_rpc_error(id.clone(), INVALID_PARAMS, "Missing 'name' in params");
        }

        tracing::info!(tool = %tool_name, "MCP tools/call");

        let (text, is_error) = match self.adapter.call_tool(tool_name, &arguments).await {
            Ok(text) => (text, false),
            Err(e) => {
                tracing::warn!(tool = %tool_name, error = %e, "tool call failed");
                (format!("Error: {}", e), true)
            }
        };

        json!({
            "jsonrpc": "2.0",
            "id": id,
            "result": {
                "content": [{ "type": "text", "text": text }],
                "isError": is_error
            }
        })
    }

    // ── resources ───────────────────────────────────────────────────────────

    fn handle_resources_list(&self, id: &Value) -> Value {
        json!({
            "jsonrpc": "2.0",
            "id": id,
            "result": { "resources": self.adapter.resources() }
        })
    }

    fn handle_resource_templates_list(&self, id: &Value) -> Value {
        json!({
            "jsonrpc": "2.0",
            "id": id,
            "result": { "resourceTemplates": self.adapter.resource_templates() }
        })
    }

    async fn handle_resources_read(&self, request: &Value, id: &Value) -> Value {
        let uri = request
            .pointer("/params/uri")
            .and_then(|u| u.as_str())
            .unwrap_or("");

        if uri.is_empty() {
            return json_rpc_error(id.clone(), INVALID_PARAMS, "Missing 'uri' in params");
        }

        match self.adapter.read_resource(uri).await {
            Ok(text) => json!({
                "jsonrpc": "2.0",
                "id": id,
                "result": {
                    "contents": [{
                        "uri": uri,
                        "mimeType": self.mime_type_for(uri),
                        "text": text
                    }]
                }
            }),
            Err(e) => json_rpc_error(id.clone(), INVALID_PARAMS, &e.to_string()),
        }
    }

    /// Mime type from the static resource list, or the first template whose
    /// fixed prefix matches.
    fn mime_type_for(&self, uri: &str) -> String {
        let exact = self
            .adapter
            .resources()
            .into_iter()
            .find(|r| r["uri"] == uri)
            .and_then(|r| r["mimeType"].as_str().map(str::to_string));
        if let Some(mime) = exact {
            return mime;
        }
        self.adapter
            .resource_templates()
            .into_iter()
            .find(|t| {
                t["uriTemplate"]
                    .as_str()
                    .and_then(|tpl| tpl.split('{').next())
                    .is_some_and(|prefix| uri.starts_with(prefix))
            })
            .and_then(|t| t["mimeType"].as_str().map(str::to_string))
            .unwrap_or_else(|| "text/plain".to_string())
    }

    // ── prompts ─────────────────────────────────────────────────────────────

    fn handle_prompts_list(&self, id: &Value) -> Value {
        json!({
            "jsonrpc": "2.0",
            "id": id,
            "result": { "prompts": self.adapter.prompts() }
        })
    }

    async fn handle_prompts_get(&self, request: &Value, id: &Value) -> Value {
        let name = request
            .pointer("/params/name")
            .and_then(|n| n.as_str())
            .unwrap_or("");
        if name.is_empty() {
            return json_rpc_error(id.clone(), INVALID_PARAMS, "Missing 'name' in params");
        }
        let arguments = request
            .pointer("/params/arguments")
            .cloned()
            .unwrap_or(json!({}));

        let description = self
            .adapter
            .prompts()
            .into_iter()
            .find(|p| p["name"] == name)
            .and_then(|p| p["description"].as_str().map(str::to_string))
            .unwrap_or_default();

        match self.adapter.get_prompt(name, &arguments).await {
            Ok(text) => json!({
                "jsonrpc": "2.0",
                "id": id,
                "result": {
                    "description": description,
                    "messages": [{
                        "role": "user",
                        "content": { "type": "text", "text": text }
                    }]
                }
            }),
            Err(e) => json_rpc_error(id.clone(), INVALID_PARAMS, &e.to_string()),
        }
    }
}

// ── ping ────────────────────────────────────────────────────────────────────

fn handle_ping(id: &Value) -> Value {
    json!({
        "jsonrpc": "2.0",
        "id": id,
        "result": {}
    })
}

pub fn json_rpc_error(id: Value, code: i32, message: &str) -> Value {
    json!({
        "jsonrpc": "2.0",
        "id": id,
        "error": {
            "code": code,
            "message": message
        }
    })
}
