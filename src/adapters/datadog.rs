//! Datadog adapter.
//!
//! Env: `DATADOG_API_KEY`, `DATADOG_APP_KEY`, `DATADOG_SITE` (default
//! `datadoghq.com`). `DATADOG_API_URL` replaces `https://api.{site}` outright,
//! which is how tests and proxies point it elsewhere.

use async_trait::async_trait;
use serde_json::{json, Value};

use super::{tool, Adapter};
use crate::args;
use crate::config;
use crate::error::{AdapterError, Result};
use crate::http::{pretty, Auth, Call, Payload, RestClient};

const ALERT_TYPES: &[&str] = &["info", "warning", "error", "success"];
const PRIORITIES: &[&str] = &["normal", "low"];
const MONITOR_TYPES: &[&str] = &[
    "metric alert",
    "service check",
    "event alert",
    "query alert",
    "composite",
    "log alert",
];
const LAYOUT_TYPES: &[&str] = &["ordered", "free"];

pub struct Datadog {
    client: RestClient,
}

impl Datadog {
    pub fn from_env() -> Result<Self> {
        let api_key = config::required("DATADOG_API_KEY")?;
        let app_key = config::required("DATADOG_APP_KEY")?;
        let base = config::optional("DATADOG_API_URL").unwrap_or_else(|| {
            format!("https://api.{}", config::with_default("DATADOG_SITE", "datadoghq.com"))
        });
        let client = RestClient::builder("Datadog", base)
            .auth(Auth::Headers(vec![
                ("DD-API-KEY".to_string(), api_key),
                ("DD-APPLICATION-KEY".to_string(), app_key),
            ]))
            .timeout(config::http_timeout())
            .build()?;
        Ok(Self::new(client))
    }

    pub fn new(client: RestClient) -> Self {
        Self { client }
    }

    async fn send(&self, call: Call<'_>) -> Result<Value> {
        let reply = call.send().await?;
        Ok(match reply.payload() {
            Payload::Empty => json!({ "status": "success" }),
            Payload::Json(v) => v,
            Payload::Text(text) => json!({ "status": "success", "message": text }),
        })
    }

    async fn submit_metric(&self, args: &Value) -> Result<String> {
        let metric = args::str(args, "metric_name")?;
        let value = args::f64_req(args, "value")?;
        let timestamp = args::opt_i64(args, "timestamp")
            .unwrap_or_else(|| chrono::Utc::now().timestamp());
        let body = json!({
            "series": [{
                "metric": metric,
                "points": [[timestamp, value]],
                "tags": args::string_list(args, "tags").unwrap_or_default(),
            }]
        });
        self.send(self.client.post("/api/v1/series").json(body)).await?;
        Ok(pretty(&json!({
            "status": "success",
            "message": "Metric submitted successfully",
        })))
    }

    async fn query_metrics(&self, args: &Value) -> Result<String> {
        let call = self
            .client
            .get("/api/v1/query")
            .query("query", args::str(args, "query")?)
            .query("from", required_i64(args, "from_time")?)
            .query("to", required_i64(args, "to_time")?);
        Ok(pretty(&self.send(call).await?))
    }

    async fn create_event(&self, args: &Value) -> Result<String> {
        let alert_type = one_of(args, "alert_type", "info", ALERT_TYPES)?;
        let priority = one_of(args, "priority", "normal", PRIORITIES)?;
        let body = json!({
            "title": args::str(args, "title")?,
            "text": args::str(args, "text")?,
            "tags": args::string_list(args, "tags").unwrap_or_default(),
            "alert_type": alert_type,
            "priority": priority,
        });
        Ok(pretty(&self.send(self.client.post("/api/v1/events").json(body)).await?))
    }

    async fn get_events(&self, args: &Value) -> Result<String> {
        let call = self
            .client
            .get("/api/v2/events")
            .query_opt("filter[query]", args::opt_str(args, "query"))
            .query_opt("filter[from]", args::opt_i64(args, "from_time"))
            .query_opt("filter[to]", args::opt_i64(args, "to_time"));
        Ok(pretty(&self.send(call).await?))
    }

    async fn create_monitor(&self, args: &Value) -> Result<String> {
        let monitor_type = args::str(args, "type")?;
        if !MONITOR_TYPES.contains(&monitor_type) {
            return Err(invalid_choice("type", monitor_type, MONITOR_TYPES));
        }
        let body = json!({
            "name": args::str(args, "name")?,
            "type": monitor_type,
            "query": args::str(args, "query")?,
            "message": args::str(args, "message")?,
            "tags": args::string_list(args, "tags").unwrap_or_default(),
        });
        Ok(pretty(&self.send(self.client.post("/api/v1/monitor").json(body)).await?))
    }

    /// Only the fields that were given are sent.
    async fn update_monitor(&self, args: &Value) -> Result<String> {
        let id = args::id(args, "monitor_id")?;
        let mut body = json!({});
        for key in ["name", "query", "message"] {
            if let Some(v) = args::opt_str(args, key) {
                body[key] = json!(v);
            }
        }
        if let Some(tags) = args::string_list(args, "tags") {
            body["tags"] = json!(tags);
        }
        if body.as_object().is_some_and(|b| b.is_empty()) {
            return Err(AdapterError::invalid(
                "Nothing to update: give at least one of name, query, message, tags",
            ));
        }
        let call = self.client.put(format!("/api/v1/monitor/{}", id)).json(body);
        Ok(pretty(&self.send(call).await?))
    }

    async fn delete_monitor(&self, args: &Value) -> Result<String> {
        let id = args::id(args, "monitor_id")?;
        self.send(self.client.delete(format!("/api/v1/monitor/{}", id))).await?;
        Ok(pretty(&json!({
            "status": "success",
            "message": format!("Monitor {} deleted successfully", id),
        })))
    }

    async fn list_monitors(&self, args: &Value) -> Result<String> {
        let call = self
            .client
            .get("/api/v1/monitor")
            .query_opt("name", args::opt_str(args, "name"))
            .query_opt("monitor_tags", args::string_list(args, "tags").map(|t| t.join(",")));
        Ok(pretty(&self.send(call).await?))
    }

    async fn create_dashboard(&self, args: &Value) -> Result<String> {
        let layout = one_of(args, "layout_type", "ordered", LAYOUT_TYPES)?;
        let widgets = match args::opt_json(args, "widgets")? {
            Some(Value::Array(w)) => w,
            Some(_) => return Err(AdapterError::invalid("Argument 'widgets' must be a JSON array")),
            None => Vec::new(),
        };
        let body = json!({
            "title": args::str(args, "title")?,
            "description": args::str_or(args, "description", ""),
            "widgets": widgets,
            "layout_type": layout,
        });
        Ok(pretty(&self.send(self.client.post("/api/v1/dashboard").json(body)).await?))
    }

    async fn delete_dashboard(&self, args: &Value) -> Result<String> {
        let id = args::str(args, "dashboard_id")?;
        self.send(self.client.delete(format!("/api/v1/dashboard/{}", id))).await?;
        Ok(pretty(&json!({
            "status": "success",
            "message": format!("Dashboard {} deleted successfully", id),
        })))
    }

    async fn list_hosts(&self, args: &Value) -> Result<String> {
        let call = self
            .client
            .get("/api/v1/hosts")
            .query_opt("filter", args::opt_str(args, "filter"))
            .query_opt("count", args::opt_u64(args, "count"));
        Ok(pretty(&self.send(call).await?))
    }

    async fn search_logs(&self, args: &Value) -> Result<String> {
        let body = json!({
            "filter": {
                "query": args::str_or(args, "query", "*"),
                "from": args::str_or(args, "from_time", "now-15m"),
                "to": args::str_or(args, "to_time", "now"),
            },
            "page": { "limit": args::u64_or(args, "limit", 50) },
            "sort": "-timestamp",
        });
        let call = self.client.post("/api/v2/logs/events/search").json(body);
        Ok(pretty(&self.send(call).await?))
    }
}

fn required_i64(args: &Value, name: &str) -> Result<i64> {
    args::opt_i64(args, name)
        .ok_or_else(|| AdapterError::invalid(format!("Missing required argument: {}", name)))
}

/// Optional enumerated argument with a default.
fn one_of<'a>(args: &'a Value, name: &str, default: &'a str, allowed: &[&str]) -> Result<&'a str> {
    let value = args::str_or(args, name, default);
    if allowed.contains(&value) {
        Ok(value)
    } else {
        Err(invalid_choice(name, value, allowed))
    }
}

fn invalid_choice(name: &str, value: &str, allowed: &[&str]) -> AdapterError {
    AdapterError::invalid(format!(
        "Invalid {} '{}': must be one of {}",
        name,
        value,
        allowed.join(", ")
    ))
}

#[async_trait]
impl Adapter for Datadog {
    fn name(&self) -> &'static str {
        "datadog"
    }

    fn instructions(&self) -> &'static str {
        "Datadog: submit and query metrics, create and read events, manage monitors and dashboards, list hosts and search logs."
    }

    fn tools(&self) -> Vec<Value> {
        let monitor_id = json!({
            "type": "object",
            "properties": { "monitor_id": { "type": "integer" } },
            "required": ["monitor_id"]
        });
        let dashboard_id = json!({
            "type": "object",
            "properties": { "dashboard_id": { "type": "string" } },
            "required": ["dashboard_id"]
        });
        let tags = json!({ "type": "array", "items": { "type": "string" } });

        vec![
            tool("submit_metric", "Submit one gauge point for a metric.", json!({
                "type": "object",
                "properties": {
                    "metric_name": { "type": "string" },
                    "value": { "type": "number" },
                    "timestamp": { "type": "integer", "description": "Unix seconds; defaults to now" },
                    "tags": tags
                },
                "required": ["metric_name", "value"]
            })),
            tool("query_metrics", "Query timeseries between two Unix timestamps.", json!({
                "type": "object",
                "properties": {
                    "query": { "type": "string", "description": "e.g. avg:system.cpu.user{*}" },
                    "from_time": { "type": "integer" },
                    "to_time": { "type": "integer" }
                },
                "required": ["query", "from_time", "to_time"]
            })),
            tool("create_event", "Post an event to the event stream.", json!({
                "type": "object",
                "properties": {
                    "title": { "type": "string" },
                    "text": { "type": "string" },
                    "tags": tags,
                    "alert_type": { "type": "string", "enum": ALERT_TYPES, "default": "info" },
                    "priority": { "type": "string", "enum": PRIORITIES, "default": "normal" }
                },
                "required": ["title", "text"]
            })),
            tool("get_events", "List events, optionally filtered by query and time.", json!({
                "type": "object",
                "properties": {
                    "query": { "type": "string" },
                    "from_time": { "type": "integer" },
                    "to_time": { "type": "integer" }
                }
            })),
            tool("create_monitor", "Create a monitor.", json!({
                "type": "object",
                "properties": {
                    "name": { "type": "string" },
                    "type": { "type": "string", "enum": MONITOR_TYPES },
                    "query": { "type": "string" },
                    "message": { "type": "string" },
                    "tags": tags
                },
                "required": ["name", "type", "query", "message"]
            })),
            tool("get_monitor", "Get a monitor.", monitor_id.clone()),
            tool("update_monitor", "Change a monitor's name, query, message or tags.", json!({
                "type": "object",
                "properties": {
                    "monitor_id": { "type": "integer" },
                    "name": { "type": "string" },
                    "query": { "type": "string" },
                    "message": { "type": "string" },
                    "tags": tags
                },
                "required": ["monitor_id"]
            })),
            tool("delete_monitor", "Delete a monitor.", monitor_id),
            tool("list_monitors", "List monitors, optionally by name or tags.", json!({
                "type": "object",
                "properties": {
                    "name": { "type": "string" },
                    "tags": tags
                }
            })),
            tool("create_dashboard", "Create a dashboard.", json!({
                "type": "object",
                "properties": {
                    "title": { "type": "string" },
                    "description": { "type": "string" },
                    "widgets": { "type": "array", "items": { "type": "object" } },
                    "layout_type": { "type": "string", "enum": LAYOUT_TYPES, "default": "ordered" }
                },
                "required": ["title"]
            })),
            tool("get_dashboard", "Get a dashboard.", dashboard_id.clone()),
            tool("delete_dashboard", "Delete a dashboard.", dashboard_id),
            tool("list_dashboards", "List all dashboards.", json!({ "type": "object", "properties": {} })),
            tool("list_hosts", "List reporting hosts.", json!({
                "type": "object",
                "properties": {
                    "filter": { "type": "string", "description": "Host name, alias or tag filter" },
                    "count": { "type": "integer" }
                }
            })),
            tool("search_logs", "Search log events.", json!({
                "type": "object",
                "properties": {
                    "query": { "type": "string", "default": "*" },
                    "from_time": { "type": "string", "default": "now-15m", "description": "ISO8601, Unix ms, or relative such as now-1h" },
                    "to_time": { "type": "string", "default": "now" },
                    "limit": { "type": "integer", "default": 50 }
                }
            })),
        ]
    }

    async fn call_tool(&self, name: &str, args: &Value) -> Result<String> {
        match name {
            "submit_metric" => self.submit_metric(args).await,
            "query_metrics" => self.query_metrics(args).await,
            "create_event" => self.create_event(args).await,
            "get_events" => self.get_events(args).await,
            "create_monitor" => self.create_monitor(args).await,
            "get_monitor" => {
                let id = args::id(args, "monitor_id")?;
                Ok(pretty(&self.send(self.client.get(format!("/api/v1/monitor/{}", id))).await?))
            }
            "update_monitor" => self.update_monitor(args).await,
            "delete_monitor" => self.delete_monitor(args).await,
            "list_monitors" => self.list_monitors(args).await,
            "create_dashboard" => self.create_dashboard(args).await,
            "get_dashboard" => {
                let id = args::str(args, "dashboard_id")?;
                Ok(pretty(&self.send(self.client.get(format!("/api/v1/dashboard/{}", id))).await?))
            }
            "delete_dashboard" => self.delete_dashboard(args).await,
            "list_dashboards" => Ok(pretty(&self.send(self.client.get("/api/v1/dashboard")).await?)),
            "list_hosts" => self.list_hosts(args).await,
            "search_logs" => self.search_logs(args).await,
            _ => Err(AdapterError::UnknownTool(name.to_string())),
        }
    }
}
