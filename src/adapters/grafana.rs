//! Grafana adapter covering the core HTTP API plus the Mimir and Loki
//! query endpoints exposed through the same base URL.
//!
//! Env: `GRAFANA_URL`, `GRAFANA_API_KEY` (Bearer).

use async_trait::async_trait;
use serde_json::{json, Value};

use super::{no_args, tool, Adapter};
use crate::args;
use crate::config;
use crate::error::{AdapterError, Result};
use crate::http::{pretty, Auth, Call, RestClient};

const ALERTMANAGER_CONFIG: &str = "/api/alertmanager/grafana/config/api/v1/alerts";

pub struct Grafana {
    client: RestClient,
}

impl Grafana {
    pub fn from_env() -> Result<Self> {
        let url = config::required("GRAFANA_URL")?;
        let key = config::required("GRAFANA_API_KEY")?;
        let client = RestClient::builder("Grafana", url)
            .auth(Auth::Bearer(key))
            .timeout(config::http_timeout())
            .build()?;
        Ok(Self::new(client))
    }

    pub fn new(client: RestClient) -> Self {
        Self { client }
    }

    async fn send(&self, call: Call<'_>) -> Result<String> {
        let reply = call.header("Accept", "application/json").send().await?;
        Ok(pretty(&reply.json()?))
    }

    async fn mimir_instant_query(&self, args: &Value) -> Result<String> {
        let call = self
            .client
            .get("/api/v1/query")
            .query("query", args::str(args, "query")?)
            .query_opt("time", args::opt_str(args, "time"));
        self.send(call).await
    }

    async fn mimir_range_query(&self, args: &Value) -> Result<String> {
        let call = self
            .client
            .get("/api/v1/query_range")
            .query("query", args::str(args, "query")?)
            .query("start", args::str(args, "start")?)
            .query("end", args::str(args, "end")?)
            .query("step", args::str(args, "step")?);
        self.send(call).await
    }

    async fn mimir_get_series(&self, args: &Value) -> Result<String> {
        let selectors = args::string_list(args, "match")
            .filter(|m| !m.is_empty())
            .ok_or_else(|| AdapterError::invalid("Missing required argument: match"))?;
        let call = self
            .client
            .get("/api/v1/series")
            .query_all("match[]", &selectors)
            .query_opt("start", args::opt_str(args, "start"))
            .query_opt("end", args::opt_str(args, "end"));
        self.send(call).await
    }

    async fn loki_query(&self, args: &Value) -> Result<String> {
        let call = self
            .client
            .get("/loki/api/v1/query")
            .query("query", args::str(args, "query")?)
            .query_opt("limit", args::opt_u64(args, "limit"))
            .query_opt("time", args::opt_str(args, "time"));
        self.send(call).await
    }

    async fn loki_query_range(&self, args: &Value) -> Result<String> {
        let call = self
            .client
            .get("/loki/api/v1/query_range")
            .query("query", args::str(args, "query")?)
            .query("start", args::str(args, "start")?)
            .query("end", args::str(args, "end")?)
            .query_opt("limit", args::opt_u64(args, "limit"))
            .query_opt("step", args::opt_str(args, "step"));
        self.send(call).await
    }

    async fn create_dashboard(&self, args: &Value) -> Result<String> {
        let mut body = json!({
            "dashboard": args::json(args, "dashboard_json")?,
            "overwrite": args::bool_or(args, "overwrite", false),
        });
        if let Some(message) = args::opt_str(args, "message") {
            body["message"] = json!(message);
        }
        self.send(self.client.post("/api/dashboards/db").json(body)).await
    }

    async fn get_all_dashboards(&self, args: &Value) -> Result<String> {
        let call = self
            .client
            .get("/api/search")
            .query_opt("type", args::opt_str(args, "type"))
            .query_opt("tag", args::opt_str(args, "tag"))
            .query_opt("limit", args::opt_u64(args, "limit"));
        self.send(call).await
    }

    async fn get_alert_rules(&self, args: &Value) -> Result<String> {
        let call = self
            .client
            .get("/api/alerting/rules")
            .query_opt("dashboardUID", args::opt_str(args, "dashboard_uid"))
            .query_opt("panelId", args::opt_u64(args, "panel_id"));
        self.send(call).await
    }

    async fn query_data_source(&self, args: &Value) -> Result<String> {
        let id = args::id(args, "datasource_id")?;
        let query = args::json(args, "query_json")?;
        self.send(
            self.client
                .post(format!("/api/datasources/{}/query", id))
                .json(query),
        )
        .await
    }

    async fn mimir_remote_write(&self, args: &Value) -> Result<String> {
        let payload = match args::opt_json(args, "payload")? {
            Some(p) => p,
            None => args::json(args, "metrics_json")?,
        };
        self.client.post("/api/v1/push").json(payload).send().await?;
        Ok(pretty(&json!({
            "status": "success",
            "message": "Metrics written successfully",
        })))
    }
}

#[async_trait]
impl Adapter for Grafana {
    fn name(&self) -> &'static str {
        "grafana"
    }

    fn instructions(&self) -> &'static str {
        "Grafana: query Mimir metrics and Loki logs, manage dashboards, data sources, alert rules and the Alertmanager configuration."
    }

    fn tools(&self) -> Vec<Value> {
        let uid = |key: &str| {
            json!({
                "type": "object",
                "properties": { key: { "type": "string" } },
                "required": [key]
            })
        };
        let datasource_id = json!({
            "type": "object",
            "properties": { "datasource_id": { "type": "integer" } },
            "required": ["datasource_id"]
        });
        let json_arg = |key: &str, description: &str| {
            json!({
                "type": "object",
                "properties": { key: { "type": ["object", "string"], "description": description } },
                "required": [key]
            })
        };

        vec![
            tool("mimir_instant_query", "Evaluate a PromQL query at one instant against Mimir.", json!({
                "type": "object",
                "properties": {
                    "query": { "type": "string" },
                    "time": { "type": "string", "description": "RFC3339 or Unix timestamp" }
                },
                "required": ["query"]
            })),
            tool("mimir_range_query", "Evaluate a PromQL query over a time range against Mimir.", json!({
                "type": "object",
                "properties": {
                    "query": { "type": "string" },
                    "start": { "type": "string" },
                    "end": { "type": "string" },
                    "step": { "type": "string", "description": "Duration such as 30s, or seconds" }
                },
                "required": ["query", "start", "end", "step"]
            })),
            tool("mimir_get_series", "Find series matching label selectors.", json!({
                "type": "object",
                "properties": {
                    "match": { "type": "array", "items": { "type": "string" } },
                    "start": { "type": "string" },
                    "end": { "type": "string" }
                },
                "required": ["match"]
            })),
            tool("loki_query", "Evaluate a LogQL query at one instant.", json!({
                "type": "object",
                "properties": {
                    "query": { "type": "string" },
                    "limit": { "type": "integer" },
                    "time": { "type": "string" }
                },
                "required": ["query"]
            })),
            tool("loki_query_range", "Evaluate a LogQL query over a time range.", json!({
                "type": "object",
                "properties": {
                    "query": { "type": "string" },
                    "start": { "type": "string" },
                    "end": { "type": "string" },
                    "limit": { "type": "integer" },
                    "step": { "type": "string" }
                },
                "required": ["query", "start", "end"]
            })),
            tool("loki_get_labels", "List Loki label names.", no_args()),
            tool("check_grafana_health", "Check Grafana and database health.", no_args()),
            tool("get_dashboard", "Get a dashboard by UID.", uid("dashboard_uid")),
            tool("create_dashboard", "Create or update a dashboard.", json!({
                "type": "object",
                "properties": {
                    "dashboard_json": { "type": ["object", "string"], "description": "Dashboard model" },
                    "overwrite": { "type": "boolean", "default": false },
                    "message": { "type": "string", "description": "Version history message" }
                },
                "required": ["dashboard_json"]
            })),
            tool("delete_dashboard", "Delete a dashboard by UID.", uid("dashboard_uid")),
            tool("get_all_dashboards", "Search dashboards and folders.", json!({
                "type": "object",
                "properties": {
                    "type": { "type": "string", "enum": ["dash-db", "dash-folder"] },
                    "tag": { "type": "string" },
                    "limit": { "type": "integer" }
                }
            })),
            tool("get_plugins", "List installed plugins.", no_args()),
            tool("get_datasource", "Get a data source by id.", datasource_id.clone()),
            tool("create_datasource", "Create a data source.", json_arg("datasource_json", "Data source definition")),
            tool("delete_datasource", "Delete a data source by id.", datasource_id),
            tool("get_alertmanager_config", "Get the Grafana Alertmanager configuration.", no_args()),
            tool("set_alertmanager_config", "Replace the Grafana Alertmanager configuration.", json_arg("config_json", "Alertmanager configuration")),
            tool("get_alert_rules", "List alert rules, optionally for one dashboard or panel.", json!({
                "type": "object",
                "properties": {
                    "dashboard_uid": { "type": "string" },
                    "panel_id": { "type": "integer" }
                }
            })),
            tool("create_alert_rule", "Create an alert rule.", json_arg("rule_json", "Alert rule definition")),
            tool("delete_alert_rule", "Delete an alert rule by UID.", uid("rule_uid")),
            tool("query_data_source", "Run a raw query against a data source.", json!({
                "type": "object",
                "properties": {
                    "datasource_id": { "type": "integer" },
                    "query_json": { "type": ["object", "string"] }
                },
                "required": ["datasource_id", "query_json"]
            })),
            tool("mimir_remote_write", "Push samples to Mimir.", json_arg("payload", "Remote write payload")),
        ]
    }

    async fn call_tool(&self, name: &str, args: &Value) -> Result<String> {
        match name {
            "mimir_instant_query" => self.mimir_instant_query(args).await,
            "mimir_range_query" => self.mimir_range_query(args).await,
            "mimir_get_series" => self.mimir_get_series(args).await,
            "loki_query" => self.loki_query(args).await,
            "loki_query_range" => self.loki_query_range(args).await,
            "loki_get_labels" => self.send(self.client.get("/loki/api/v1/labels")).await,
            "check_grafana_health" => self.send(self.client.get("/api/health")).await,
            "get_dashboard" => {
                let uid = args::str(args, "dashboard_uid")?;
                self.send(self.client.get(format!("/api/dashboards/uid/{}", uid))).await
            }
            "create_dashboard" => self.create_dashboard(args).await,
            "delete_dashboard" => {
                let uid = args::str(args, "dashboard_uid")?;
                self.send(self.client.delete(format!("/api/dashboards/uid/{}", uid))).await
            }
            "get_all_dashboards" => self.get_all_dashboards(args).await,
            "get_plugins" => self.send(self.client.get("/api/plugins")).await,
            "get_datasource" => {
                let id = args::id(args, "datasource_id")?;
                self.send(self.client.get(format!("/api/datasources/{}", id))).await
            }
            "create_datasource" => {
                let body = args::json(args, "datasource_json")?;
                self.send(self.client.post("/api/datasources").json(body)).await
            }
            "delete_datasource" => {
                let id = args::id(args, "datasource_id")?;
                self.send(self.client.delete(format!("/api/datasources/{}", id))).await
            }
            "get_alertmanager_config" => self.send(self.client.get(ALERTMANAGER_CONFIG)).await,
            "set_alertmanager_config" => {
                let body = args::json(args, "config_json")?;
                self.send(self.client.post(ALERTMANAGER_CONFIG).json(body)).await
            }
            "get_alert_rules" => self.get_alert_rules(args).await,
            "create_alert_rule" => {
                let body = args::json(args, "rule_json")?;
                self.send(self.client.post("/api/alerting/rules").json(body)).await
            }
            "delete_alert_rule" => {
                let uid = args::str(args, "rule_uid")?;
                self.send(self.client.delete(format!("/api/alerting/rules/{}", uid))).await
            }
            "query_data_source" => self.query_data_source(args).await,
            "mimir_remote_write" => self.mimir_remote_write(args).await,
            _ => Err(AdapterError::UnknownTool(name.to_string())),
        }
    }
}
