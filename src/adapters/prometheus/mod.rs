//! Prometheus adapter.
//!
//! Unlike the other adapters this one answers in markdown: query results,
//! target health and alert summaries are rendered as tables meant to be read
//! by the model directly. It also publishes resources and prompts.
//!
//! Env: `PROMETHEUS_URL`, optional `PROMETHEUS_TOKEN` (Bearer) or
//! `PROMETHEUS_USERNAME` / `PROMETHEUS_PASSWORD` (Basic).

mod analysis;
mod format;

use std::fmt::Write;

use async_trait::async_trait;
use chrono::Utc;
use regex::Regex;
use serde::Deserialize;
use serde_json::{json, Value};

use super::{prompt, resource, resource_template, tool, Adapter};
use crate::args;
use crate::config;
use crate::error::{AdapterError, Result};
use crate::http::{Auth, Call, RestClient};

pub use analysis::{build_query, parse_duration, SeriesStats};

const METRICS_URI_PREFIX: &str = "prometheus://metrics/";

pub struct Prometheus {
    client: RestClient,
}

#[derive(Deserialize)]
struct Envelope {
    status: String,
    #[serde(default)]
    data: Value,
    #[serde(rename = "errorType")]
    error_type: Option<String>,
    error: Option<String>,
}

impl Prometheus {
    pub fn from_env() -> Result<Self> {
        let url = config::required("PROMETHEUS_URL")?;
        let auth = match config::optional("PROMETHEUS_TOKEN") {
            Some(token) => Auth::Bearer(token),
            None => match config::optional("PROMETHEUS_USERNAME") {
                Some(username) => Auth::Basic {
                    username,
                    password: config::optional("PROMETHEUS_PASSWORD"),
                },
                None => Auth::None,
            },
        };
        let client = RestClient::builder("Prometheus", url)
            .auth(auth)
            .timeout(config::http_timeout())
            .build()?;
        Ok(Self::new(client))
    }

    pub fn new(client: RestClient) -> Self {
        Self { client }
    }

    /// `data` of a Prometheus API envelope.
    async fn api(&self, call: Call<'_>) -> Result<Value> {
        let reply = call.send().await?;
        let envelope: Envelope = serde_json::from_slice(reply.bytes())?;
        if envelope.status == "error" {
            let message = match envelope.error_type {
                Some(kind) => format!("{}: {}", kind, envelope.error.unwrap_or_default()),
                None => envelope.error.unwrap_or_else(|| "unknown error".to_string()),
            };
            return Err(AdapterError::Status {
                service: self.client.service(),
                status: reply.status_code(),
                message,
            });
        }
        Ok(envelope.data)
    }

    async fn query_metrics(&self, args: &Value) -> Result<String> {
        let query = args::str(args, "query")?;
        let start = args::opt_str(args, "start");
        let end = args::opt_str(args, "end");

        let call = match (start, end) {
            (Some(start), Some(end)) => {
                let step = args::opt_str(args, "step").unwrap_or_else(|| analysis::query_step(start, end));
                self.client
                    .get("/api/v1/query_range")
                    .query("start", start)
                    .query("end", end)
                    .query("step", step)
            }
            _ => self.client.get("/api/v1/query"),
        };
        let call = call
            .query("query", query)
            .query_opt("time", args::opt_str(args, "time"))
            .query_opt("timeout", args::opt_f64(args, "timeout"));

        let data = self.api(call).await?;
        Ok(format::render_query_result(query, &data))
    }

    async fn find_metrics(&self, args: &Value) -> Result<String> {
        let pattern = args::str(args, "pattern")?;
        let limit = args::u64_or(args, "limit", 50) as usize;
        let re = Regex::new(pattern)
            .map_err(|e| AdapterError::invalid(format!("Invalid metric pattern '{}': {}", pattern, e)))?;

        let names = self.api(self.client.get("/api/v1/label/__name__/values")).await?;
        let matched: Vec<&str> = names
            .as_array()
            .map(|a| a.iter().filter_map(|v| v.as_str()).filter(|n| re.is_match(n)).collect())
            .unwrap_or_default();

        let mut out = format!("# Metrics matching '{}'\n\n", pattern);
        if matched.is_empty() {
            out.push_str("No metrics found matching this pattern.\n");
            return Ok(out);
        }
        let _ = writeln!(out, "Found {} metric names.\n", matched.len());
        if matched.len() > limit {
            let _ = writeln!(out, "Showing first {} metrics (out of {}):\n", limit, matched.len());
        }

        // Metadata is best effort; older servers and some remote stores lack it.
        let metadata = match self.api(self.client.get("/api/v1/metadata")).await {
            Ok(m) => m,
            Err(e) => {
                tracing::debug!(error = %e, "metric metadata unavailable");
                Value::Null
            }
        };

        for name in matched.into_iter().take(limit) {
            let meta = &metadata[name][0];
            match (meta["type"].as_str(), meta["help"].as_str()) {
                (Some(kind), Some(help)) if !help.is_empty() => {
                    let _ = writeln!(out, "- `{}` ({}): {}", name, kind, help);
                }
                (Some(kind), _) => {
                    let _ = writeln!(out, "- `{}` ({})", name, kind);
                }
                _ => {
                    let _ = writeln!(out, "- `{}`", name);
                }
            }
        }
        Ok(out)
    }

    async fn analyze_metric(&self, args: &Value) -> Result<String> {
        let metric = args::str(args, "metric")?;
        let duration = args::str_or(args, "duration", "1h");
        let aggregation = args::opt_str(args, "aggregation");
        let labels = args::opt_str(args, "labels");

        let window = parse_duration(duration)?;
        let query = build_query(metric, labels, aggregation)?;
        let end = Utc::now();
        let start = end.checked_sub_signed(window).ok_or_else(|| {
            AdapterError::invalid(format!("Duration {} reaches before the earliest supported time", duration))
        })?;

        let call = self
            .client
            .get("/api/v1/query_range")
            .query("query", &query)
            .query("start", start.timestamp())
            .query("end", end.timestamp())
            .query("step", analysis::analysis_step(window));
        let data = self.api(call).await?;

        let empty = Vec::new();
        let results = data["result"].as_array().unwrap_or(&empty);
        let request = analysis::AnalysisRequest {
            metric,
            query: &query,
            duration,
            aggregation,
            labels,
            start,
            end,
        };
        Ok(analysis::render_analysis(&request, results))
    }

    async fn active_targets(&self) -> Result<Vec<Value>> {
        let mut data = self.api(self.client.get("/api/v1/targets")).await?;
        Ok(take_array(&mut data, "activeTargets"))
    }

    async fn alerts(&self) -> Result<Vec<Value>> {
        let mut data = self.api(self.client.get("/api/v1/alerts")).await?;
        Ok(take_array(&mut data, "alerts"))
    }

    async fn metrics_resource(&self, pattern: &str) -> Result<String> {
        let pattern = urlencoding::decode(pattern)
            .map(|p| p.into_owned())
            .unwrap_or_else(|_| pattern.to_string());
        let selector = series_selector(&pattern);
        let data = self
            .api(self.client.get("/api/v1/series").query("match[]", &selector))
            .await?;
        let empty = Vec::new();
        Ok(format::render_series(&pattern, data.as_array().unwrap_or(&empty)))
    }
}

fn take_array(data: &mut Value, key: &str) -> Vec<Value> {
    match data.get_mut(key).map(Value::take) {
        Some(Value::Array(items)) => items,
        _ => Vec::new(),
    }
}

/// A bare name or regex becomes a `__name__` matcher; selectors pass through.
fn series_selector(pattern: &str) -> String {
    let bare_name = pattern.chars().all(|c| c.is_ascii_alphanumeric() || c == '_' || c == ':');
    if bare_name || pattern.contains('{') {
        pattern.to_string()
    } else {
        format!("{{__name__=~\"{}\"}}", pattern)
    }
}

/// `state` argument lower-cased, rejecting anything outside `allowed`.
fn state_filter(args: &Value, allowed: &[&str]) -> Result<Option<String>> {
    match args::opt_str(args, "state") {
        None => Ok(None),
        Some(s) => {
            let s = s.to_ascii_lowercase();
            if allowed.contains(&s.as_str()) {
                Ok(Some(s))
            } else {
                Err(AdapterError::invalid(format!(
                    "Invalid state '{}'. Use one of: {}",
                    s,
                    allowed.join(", ")
                )))
            }
        }
    }
}

#[async_trait]
impl Adapter for Prometheus {
    fn name(&self) -> &'static str {
        "prometheus"
    }

    fn instructions(&self) -> &'static str {
        "Prometheus: run PromQL queries, discover and analyze metrics, inspect scrape targets, alerts and rules."
    }

    fn tools(&self) -> Vec<Value> {
        vec![
            tool("query_metrics", "Query Prometheus using PromQL. Supplying both start and end runs a range query.", json!({
                "type": "object",
                "properties": {
                    "query": { "type": "string", "description": "PromQL query string" },
                    "time": { "type": "string", "description": "Evaluation timestamp (RFC3339 or Unix)" },
                    "timeout": { "type": "number", "description": "Evaluation timeout in seconds" },
                    "start": { "type": "string", "description": "Range start (RFC3339 or Unix)" },
                    "end": { "type": "string", "description": "Range end (RFC3339 or Unix)" },
                    "step": { "type": "string", "description": "Resolution step; derived from the range when omitted" }
                },
                "required": ["query"]
            })),
            tool("find_metrics", "Find metric names matching a regular expression.", json!({
                "type": "object",
                "properties": {
                    "pattern": { "type": "string", "description": "Regex matched against metric names" },
                    "limit": { "type": "integer", "default": 50 }
                },
                "required": ["pattern"]
            })),
            tool("analyze_metric", "Analyze a metric over time with basic statistics and trend.", json!({
                "type": "object",
                "properties": {
                    "metric": { "type": "string" },
                    "duration": { "type": "string", "default": "1h", "description": "e.g. 1h, 1d, 2w" },
                    "aggregation": { "type": "string", "enum": ["sum", "avg", "min", "max", "count"] },
                    "labels": { "type": "string", "description": "Label filters as label1=value1,label2=value2" }
                },
                "required": ["metric"]
            })),
            tool("get_targets_health", "Summarize the health of scrape targets.", json!({
                "type": "object",
                "properties": {
                    "state": { "type": "string", "enum": ["up", "down"] }
                }
            })),
            tool("get_alert_summary", "Summarize alerts grouped by name.", json!({
                "type": "object",
                "properties": {
                    "state": { "type": "string", "enum": ["firing", "pending", "inactive"] }
                }
            })),
        ]
    }

    async fn call_tool(&self, name: &str, args: &Value) -> Result<String> {
        match name {
            "query_metrics" => self.query_metrics(args).await,
            "find_metrics" => self.find_metrics(args).await,
            "analyze_metric" => self.analyze_metric(args).await,
            "get_targets_health" => {
                let state = state_filter(args, &["up", "down"])?;
                let targets = self.active_targets().await?;
                Ok(format::render_targets_health(&targets, state.as_deref()))
            }
            "get_alert_summary" => {
                let state = state_filter(args, &["firing", "pending", "inactive"])?;
                let alerts = self.alerts().await?;
                Ok(format::render_alert_summary(&alerts, state.as_deref()))
            }
            _ => Err(AdapterError::UnknownTool(name.to_string())),
        }
    }

    fn resources(&self) -> Vec<Value> {
        vec![
            resource("prometheus://targets", "targets", "Scrape targets and their status", "text/markdown"),
            resource("prometheus://alerts", "alerts", "Active alerts", "text/markdown"),
            resource("prometheus://rules", "rules", "Recording and alerting rules", "text/markdown"),
        ]
    }

    fn resource_templates(&self) -> Vec<Value> {
        vec![resource_template(
            "prometheus://metrics/{pattern}",
            "metrics",
            "Series whose metric name matches a pattern",
            "text/markdown",
        )]
    }

    async fn read_resource(&self, uri: &str) -> Result<String> {
        match uri {
            "prometheus://targets" => Ok(format::render_targets(&self.active_targets().await?)),
            "prometheus://alerts" => Ok(format::render_alerts(&self.alerts().await?)),
            "prometheus://rules" => {
                let mut data = self.api(self.client.get("/api/v1/rules")).await?;
                Ok(format::render_rules(&take_array(&mut data, "groups")))
            }
            _ => match uri.strip_prefix(METRICS_URI_PREFIX) {
                Some(pattern) if !pattern.is_empty() => self.metrics_resource(pattern).await,
                _ => Err(AdapterError::UnknownResource(uri.to_string())),
            },
        }
    }

    fn prompts(&self) -> Vec<Value> {
        vec![
            prompt("analyze_system_health", "Analyze overall system health from Prometheus metrics.", &[]),
            prompt("performance_analysis", "Analyze the performance of one service over time.", &[
                ("service", "The name of the service to analyze", true),
                ("duration", "Time duration to analyze (e.g. 1h, 1d, 7d)", false),
            ]),
            prompt("capacity_planning", "Plan capacity from current utilization and growth.", &[
                ("service", "The name of the service to analyze", true),
                ("growth_rate", "Expected growth rate in percent", false),
            ]),
            prompt("alert_investigation", "Investigate a firing alert and recommend actions.", &[
                ("alert_name", "The name of the alert to investigate", true),
            ]),
        ]
    }

    async fn get_prompt(&self, name: &str, args: &Value) -> Result<String> {
        let text = match name {
            "analyze_system_health" => "Please analyze the overall health of my systems monitored by Prometheus.\n\
                Focus on:\n\
                1. Any firing alerts\n\
                2. Down targets\n\
                3. CPU, memory, and disk usage\n\
                4. Network performance\n\
                5. Application-specific metrics\n\n\
                Provide a comprehensive health assessment with recommendations for any issues found.\n"
                .to_string(),
            "performance_analysis" => format!(
                "Please analyze the performance of the \"{}\" service over the past {}.\n\
                 Focus on:\n\
                 1. Response times and latency\n\
                 2. Error rates\n\
                 3. Resource usage (CPU, memory)\n\
                 4. Request volume/throughput\n\
                 5. Any performance degradation or improvements\n\n\
                 Provide a detailed analysis with comparisons to normal baselines when possible.\n",
                args::str(args, "service")?,
                args::str_or(args, "duration", "1d"),
            ),
            "capacity_planning" => format!(
                "Please help me plan capacity for the \"{}\" service assuming a {:.1}% growth rate.\n\
                 Focus on:\n\
                 1. Current resource utilization\n\
                 2. Resource usage trends over the past 7 days\n\
                 3. Projected resource needs based on the growth rate\n\
                 4. Recommendations for scaling and resource allocation\n\
                 5. Potential bottlenecks to address\n\n\
                 Use Prometheus metrics to provide evidence-based planning recommendations.\n",
                args::str(args, "service")?,
                args::opt_f64(args, "growth_rate").unwrap_or(10.0),
            ),
            "alert_investigation" => format!(
                "Please investigate the \"{}\" alert that is currently firing.\n\
                 Focus on:\n\
                 1. The root cause of the alert\n\
                 2. Systems and services affected\n\
                 3. Historical patterns of this alert\n\
                 4. Potential remediation steps\n\
                 5. Long-term fixes to prevent recurrence\n\n\
                 Use Prometheus metrics and graphs to analyze the situation and provide actionable recommendations.\n",
                args::str(args, "alert_name")?,
            ),
            _ => return Err(AdapterError::UnknownPrompt(name.to_string())),
        };
        Ok(text)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn adapter() -> Prometheus {
        Prometheus::new(RestClient::builder("Prometheus", "http://127.0.0.1:9").build().unwrap())
    }

    #[test]
    fn selectors_for_metric_patterns() {
        assert_eq!(series_selector("up"), "up");
        assert_eq!(series_selector("node_cpu.*"), r#"{__name__=~"node_cpu.*"}"#);
        assert_eq!(series_selector(r#"up{job="api"}"#), r#"up{job="api"}"#);
    }

    #[test]
    fn state_filter_rejects_unknown_states() {
        let allowed = ["up", "down"];
        assert_eq!(state_filter(&json!({ "state": "UP" }), &allowed).unwrap(), Some("up".into()));
        assert_eq!(state_filter(&json!({}), &allowed).unwrap(), None);
        assert!(state_filter(&json!({ "state": "sideways" }), &allowed).is_err());
    }

    #[tokio::test]
    async fn prompts_fill_in_arguments() {
        let p = adapter();
        let text = p
            .get_prompt("capacity_planning", &json!({ "service": "checkout" }))
            .await
            .unwrap();
        assert!(text.contains("\"checkout\" service assuming a 10.0% growth rate"));

        let text = p
            .get_prompt("performance_analysis", &json!({ "service": "api", "duration": "7d" }))
            .await
            .unwrap();
        assert!(text.contains("over the past 7d."));

        assert!(p.get_prompt("alert_investigation", &json!({})).await.is_err());
    }

    #[test]
    fn publishes_resources_and_prompts() {
        let p = adapter();
        assert_eq!(p.resources().len(), 3);
        assert_eq!(p.resource_templates()[0]["uriTemplate"], "prometheus://metrics/{pattern}");
        assert_eq!(p.prompts().len(), 4);
        assert_eq!(p.tools().len(), 5);
    }
}
