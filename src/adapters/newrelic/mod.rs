//! New Relic adapter.
//!
//! Env: `NEW_RELIC_API_KEY`, `NEW_RELIC_API_URL` (default
//! `https://api.newrelic.com`), `NEW_RELIC_SYNTHETICS_URL` (default
//! `https://synthetics.newrelic.com/synthetics/api`) and
//! `NEW_RELIC_INFRA_URL` (default `https://infra-api.newrelic.com/v2`).
//! REST v2 endpoints live under `/v2/*.json` and NerdGraph at `/graphql`,
//! both authenticated with `API-Key`. Synthetics expects the key as
//! `X-Api-Key`, Infrastructure as `Api-Key`.

mod nerdgraph;
mod render;
mod synthetics;

use async_trait::async_trait;
use chrono::{Duration, SecondsFormat, Utc};
use serde_json::{json, Map, Value};

use super::{prompt, resource, resource_template, tool, Adapter};
use crate::args;
use crate::config;
use crate::error::{AdapterError, Result, ResultExt};
use crate::http::{pretty, Auth, Call, Payload, RestClient};

const DEFAULT_API_URL: &str = "https://api.newrelic.com";
const DEFAULT_SYNTHETICS_URL: &str = "https://synthetics.newrelic.com/synthetics/api";
const DEFAULT_INFRA_URL: &str = "https://infra-api.newrelic.com/v2";

pub struct NewRelic {
    client: RestClient,
    synthetics: RestClient,
    infrastructure: RestClient,
}

/// Add `key` to `map` when the value is present.
fn put(map: &mut Map<String, Value>, key: &str, value: Option<Value>) {
    if let Some(v) = value {
        map.insert(key.to_string(), v);
    }
}

fn wrap(key: &str, inner: Map<String, Value>) -> Value {
    json!({ key: inner })
}

fn deployment_body(args: &Value) -> Result<Value> {
    let mut deployment = Map::new();
    deployment.insert("revision".into(), json!(args::str(args, "revision")?));
    for key in ["changelog", "description", "user"] {
        put(&mut deployment, key, args::opt_str(args, key).map(|v| json!(v)));
    }
    Ok(wrap("deployment", deployment))
}

fn application_update(args: &Value) -> Value {
    let mut settings = Map::new();
    put(&mut settings, "app_apdex_threshold", args::opt_f64(args, "app_apdex_threshold").map(|v| json!(v)));
    put(
        &mut settings,
        "end_user_apdex_threshold",
        args::opt_f64(args, "end_user_apdex_threshold").map(|v| json!(v)),
    );
    put(
        &mut settings,
        "enable_real_user_monitoring",
        args::opt_bool(args, "enable_real_user_monitoring").map(|v| json!(v)),
    );
    let mut application = Map::new();
    put(&mut application, "name", args::opt_str(args, "name").map(|v| json!(v)));
    if !settings.is_empty() {
        application.insert("settings".into(), Value::Object(settings));
    }
    wrap("application", application)
}

fn condition_body(args: &Value, create: bool) -> Result<Value> {
    let mut condition = Map::new();
    if create {
        condition.insert("name".into(), json!(args::str(args, "name")?));
        condition.insert("type".into(), json!(args::str(args, "type")?));
        condition.insert("entities".into(), json!(args::array(args, "entities")?));
        condition.insert("metric".into(), json!(args::str(args, "metric")?));
        condition.insert("terms".into(), json!(args::array(args, "terms")?));
    } else {
        put(&mut condition, "name", args::opt_str(args, "name").map(|v| json!(v)));
        put(&mut condition, "entities", args::opt_json(args, "entities")?);
        put(&mut condition, "metric", args::opt_str(args, "metric").map(|v| json!(v)));
        put(&mut condition, "terms", args::opt_json(args, "terms")?);
    }
    put(&mut condition, "condition_scope", args::opt_str(args, "condition_scope").map(|v| json!(v)));
    put(
        &mut condition,
        "violation_close_timer",
        args::opt_u64(args, "violation_close_timer").map(|v| json!(v)),
    );
    put(&mut condition, "user_defined", args::opt_json(args, "user_defined")?);
    Ok(wrap("condition", condition))
}

fn nrql_condition_body(args: &Value, create: bool) -> Result<Value> {
    let mut condition = Map::new();
    if create {
        condition.insert("name".into(), json!(args::str(args, "name")?));
        condition.insert("nrql".into(), Value::Object(args::object(args, "nrql")?));
        condition.insert("terms".into(), json!(args::array(args, "terms")?));
        condition.insert("value_function".into(), json!(args::str(args, "value_function")?));
        condition.insert("enabled".into(), json!(args::bool_or(args, "enabled", true)));
    } else {
        put(&mut condition, "name", args::opt_str(args, "name").map(|v| json!(v)));
        put(&mut condition, "nrql", args::opt_json(args, "nrql")?);
        put(&mut condition, "terms", args::opt_json(args, "terms")?);
        put(&mut condition, "value_function", args::opt_str(args, "value_function").map(|v| json!(v)));
        put(&mut condition, "enabled", args::opt_bool(args, "enabled").map(|v| json!(v)));
    }
    put(&mut condition, "runbook_url", args::opt_str(args, "runbook_url").map(|v| json!(v)));
    put(&mut condition, "expected_groups", args::opt_i64(args, "expected_groups").map(|v| json!(v)));
    put(&mut condition, "ignore_overlap", args::opt_bool(args, "ignore_overlap").map(|v| json!(v)));
    Ok(wrap("nrql_condition", condition))
}

fn policy_body(args: &Value, create: bool) -> Result<Value> {
    let mut policy = Map::new();
    if create {
        policy.insert("name".into(), json!(args::str(args, "name")?));
        policy.insert("incident_preference".into(), json!(args::str(args, "incident_preference")?));
    } else {
        put(&mut policy, "name", args::opt_str(args, "name").map(|v| json!(v)));
        put(
            &mut policy,
            "incident_preference",
            args::opt_str(args, "incident_preference").map(|v| json!(v)),
        );
    }
    Ok(wrap("policy", policy))
}

impl NewRelic {
    pub fn from_env() -> Result<Self> {
        let key = config::required("NEW_RELIC_API_KEY")?;
        let keyed = |service: &'static str, var: &str, default: &str, header: &str| {
            RestClient::builder(service, config::with_default(var, default))
                .auth(Auth::Headers(vec![(header.to_string(), key.clone())]))
                .timeout(config::http_timeout())
                .build()
        };
        let client = keyed("New Relic", "NEW_RELIC_API_URL", DEFAULT_API_URL, "API-Key")?;
        let synthetics = keyed(
            "New Relic Synthetics",
            "NEW_RELIC_SYNTHETICS_URL",
            DEFAULT_SYNTHETICS_URL,
            "X-Api-Key",
        )?;
        let infrastructure = keyed(
            "New Relic Infrastructure",
            "NEW_RELIC_INFRA_URL",
            DEFAULT_INFRA_URL,
            "Api-Key",
        )?;
        Ok(Self::new(client)
            .with_synthetics(synthetics)
            .with_infrastructure(infrastructure))
    }

    /// All three APIs on one client until told otherwise.
    pub fn new(client: RestClient) -> Self {
        Self {
            synthetics: client.clone(),
            infrastructure: client.clone(),
            client,
        }
    }

    pub fn with_synthetics(mut self, client: RestClient) -> Self {
        self.synthetics = client;
        self
    }

    pub fn with_infrastructure(mut self, client: RestClient) -> Self {
        self.infrastructure = client;
        self
    }

    async fn fetch(&self, call: Call<'_>) -> Result<Value> {
        let reply = call.send().await?;
        Ok(match reply.payload() {
            Payload::Json(v) => v,
            Payload::Empty => json!({ "status": "success" }),
            Payload::Text(t) => json!({ "status": "success", "text": t }),
        })
    }

    async fn send(&self, call: Call<'_>) -> Result<String> {
        Ok(pretty(&self.fetch(call).await?))
    }

    fn get(&self, path: &str) -> Call<'_> {
        self.client.get(format!("/v2{}", path))
    }

    /// GET with `filter[...]` arguments and `page`.
    fn list(&self, path: &str, args: &Value, filters: &[(&str, &str)]) -> Call<'_> {
        let mut call = self.get(path);
        for (arg, filter) in filters {
            call = call.query_opt(&format!("filter[{}]", filter), args::opt_str(args, arg));
        }
        call.query_opt("page", args::opt_u64(args, "page"))
    }

    async fn graphql(&self, query: &str, variables: Value) -> Result<Value> {
        let body = self
            .fetch(
                self.client
                    .post("/graphql")
                    .json(json!({ "query": query, "variables": variables })),
            )
            .await?;
        if let Some(errors) = body["errors"].as_array().filter(|e| !e.is_empty()) {
            let messages: Vec<&str> = errors.iter().filter_map(|e| e["message"].as_str()).collect();
            return Err(AdapterError::Status {
                service: "New Relic",
                status: 200,
                message: format!("NerdGraph error: {}", messages.join("; ")),
            });
        }
        Ok(body)
    }

    async fn metric_data(&self, args: &Value) -> Result<String> {
        let app = args::id(args, "app_id")?;
        let names = args::string_list(args, "names")
            .filter(|n| !n.is_empty())
            .ok_or_else(|| AdapterError::invalid("Missing required argument: names"))?;
        let values = args::string_list(args, "values").unwrap_or_default();
        let mut call = self
            .get(&format!("/applications/{}/metrics/data.json", app))
            .query_all("names[]", &names)
            .query_all("values[]", &values)
            .query_opt("from", args::opt_str(args, "from_date"))
            .query_opt("to", args::opt_str(args, "to_date"))
            .query_opt("period", args::opt_u64(args, "period"));
        if args::bool_or(args, "summarize", false) {
            call = call.query("summarize", true);
        }
        self.send(call).await
    }

    async fn list_dashboards(&self, args: &Value) -> Result<String> {
        let account = args::opt_id(args, "account_id");
        let search = nerdgraph::dashboard_search(account.as_deref(), args::opt_str(args, "name"));
        let mut variables = json!({ "query": search });
        if let Some(cursor) = args::opt_str(args, "cursor") {
            variables["cursor"] = json!(cursor);
        }
        let body = self
            .graphql(nerdgraph::DASHBOARD_SEARCH, variables)
            .await
            .context("Error listing dashboards")?;
        Ok(pretty(&body["data"]["actor"]["entitySearch"]))
    }

    /// NerdGraph call whose reply is returned whole.
    async fn nerdgraph(&self, query: &str, variables: Value, context: &str) -> Result<String> {
        let body = self.graphql(query, variables).await.context(context)?;
        Ok(pretty(&body))
    }

    /// `actor.account` of a NerdGraph reply.
    async fn account_data(&self, query: &str, account_id: i64, context: &str) -> Result<Value> {
        let mut body = self
            .graphql(query, json!({ "accountId": account_id }))
            .await
            .context(context)?;
        Ok(body["data"]["actor"]["account"].take())
    }

    async fn nrql(&self, account_id: i64, query: &str, timeout: Option<u64>) -> Result<Value> {
        let mut variables = json!({ "accountId": account_id, "query": query });
        if let Some(timeout) = timeout {
            variables["timeout"] = json!(timeout);
        }
        self.graphql(nerdgraph::NRQL, variables).await
    }

    async fn update_monitor(&self, args: &Value) -> Result<String> {
        let path = format!("/v3/monitors/{}", args::str(args, "monitor_id")?);
        let current = self
            .fetch(self.synthetics.get(path.as_str()))
            .await
            .context("Error loading monitor")?;
        let body = synthetics::update_body(args, &current)?;
        let reply = self.fetch(self.synthetics.put(path).json(body)).await?;
        Ok(pretty(synthetics::monitor(&reply)))
    }

    async fn list_errors(&self, args: &Value) -> Result<String> {
        let mut filters = Map::new();
        if let Some(query) = args::opt_str(args, "query") {
            filters.insert("searchQuery".into(), json!(query));
        }
        let variables = json!({
            "accountId": nerdgraph::account_id(args)?,
            "filters": filters,
            "cursor": args::opt_str(args, "cursor"),
        });
        let mut body = self
            .graphql(nerdgraph::ERRORS, variables)
            .await
            .context("Error listing errors")?;
        let limit = args::u64_or(args, "limit", 10) as usize;
        let errors = &mut body["data"]["actor"]["account"]["errorTracking"]["errors"];
        if let Some(results) = errors["results"].as_array_mut() {
            results.truncate(limit);
        }
        Ok(pretty(errors))
    }

    async fn create_dashboard(&self, args: &Value) -> Result<String> {
        let widgets = match args::opt_json(args, "widgets")? {
            None => Vec::new(),
            Some(Value::Array(items)) => items,
            Some(_) => return Err(AdapterError::invalid("Argument 'widgets' must be a JSON array")),
        };
        let dashboard = nerdgraph::dashboard_input(
            args::str(args, "title")?,
            args::str_or(args, "page_name", "Main Page"),
            &widgets,
        );
        let variables = json!({ "accountId": nerdgraph::account_id(args)?, "dashboard": dashboard });
        self.nerdgraph(nerdgraph::DASHBOARD_CREATE, variables, "Error creating dashboard")
            .await
    }

    async fn query_logs(&self, args: &Value) -> Result<String> {
        let nrql = nerdgraph::log_query(
            args::str(args, "query")?,
            args::opt_str(args, "from_time"),
            args::opt_str(args, "to_time"),
            args::u64_or(args, "limit", 100),
        );
        tracing::debug!(%nrql, "querying logs");
        let body = self
            .nrql(nerdgraph::account_id(args)?, &nrql, None)
            .await
            .context("Error querying logs")?;
        Ok(pretty(&body))
    }

    fn open_flag(args: &Value) -> Option<bool> {
        args::opt_bool(args, "only_open")
    }

    async fn items(&self, call: Call<'_>, key: &str) -> Result<Vec<Value>> {
        let mut body = self.fetch(call).await?;
        Ok(match body[key].take() {
            Value::Array(items) => items,
            _ => Vec::new(),
        })
    }

    async fn overview(&self) -> Result<String> {
        let apps = self
            .items(self.get("/applications.json").query("exclude_links", true), "applications")
            .await?;
        let mobile = self.items(self.get("/mobile_applications.json"), "applications").await?;
        let policies = self.items(self.get("/alerts_policies.json"), "policies").await?;
        let incidents = self
            .items(self.get("/alerts_incidents.json").query("only_open", true), "incidents")
            .await?;
        Ok(render::overview(&apps, &mobile, &policies, &incidents))
    }

    async fn read_template(&self, uri: &str) -> Option<Result<String>> {
        let rest = uri.strip_prefix("nr://")?;
        let (kind, tail) = rest.split_once('/')?;
        Some(match kind {
            "application" => {
                let id = numeric(tail)?;
                self.fetch(self.get(&format!("/applications/{}.json", id)))
                    .await
                    .map(|body| render::application(&body["application"]))
            }
            "mobile_application" => {
                let id = numeric(tail)?;
                self.fetch(self.get(&format!("/mobile_applications/{}.json", id)))
                    .await
                    .map(|body| render::mobile_application(&body["application"]))
            }
            "key_transaction" => {
                let id = numeric(tail)?;
                self.fetch(self.get(&format!("/key_transactions/{}.json", id)))
                    .await
                    .map(|body| render::key_transaction(&body["key_transaction"]))
            }
            "dashboards" => {
                let id = numeric(tail)?;
                let account = self.account_dashboards(id).await;
                account.map(|list| render::account_dashboards(id, &list))
            }
            "service_levels" => {
                let id = numeric(tail)?;
                self.service_levels(id)
                    .await
                    .map(|list| render::service_levels(id, &list))
            }
            "alerts" => {
                let (what, params) = tail.split_once('/')?;
                match what {
                    "incidents" => {
                        let only_open = flag(params)?;
                        let call = self.get("/alerts_incidents.json").query("only_open", only_open);
                        self.items(call, "incidents")
                            .await
                            .map(|list| render::incidents(&list, only_open))
                    }
                    "violations" => {
                        let mut parts = params.splitn(3, '/');
                        let only_open = flag(parts.next()?)?;
                        let (start, end) = violation_window(parts.next(), parts.next());
                        let call = self
                            .get("/alerts_violations.json")
                            .query("only_open", only_open)
                            .query("start_date", &start)
                            .query("end_date", &end);
                        self.items(call, "violations")
                            .await
                            .map(|list| render::violations(&list, only_open, &start, &end))
                    }
                    _ => return None,
                }
            }
            _ => return None,
        })
    }

    async fn account_dashboards(&self, account_id: &str) -> Result<Vec<Value>> {
        let id = account_number(account_id)?;
        let mut account = self
            .account_data(nerdgraph::ACCOUNT_DASHBOARDS, id, "Error listing dashboards")
            .await?;
        Ok(match account["dashboards"]["dashboards"].take() {
            Value::Array(items) => items,
            _ => Vec::new(),
        })
    }

    async fn service_levels(&self, account_id: &str) -> Result<Vec<Value>> {
        let id = account_number(account_id)?;
        let mut account = self
            .account_data(nerdgraph::SERVICE_LEVELS, id, "Error listing service levels")
            .await?;
        Ok(match account["serviceLevels"]["indicators"].take() {
            Value::Array(items) => items,
            _ => Vec::new(),
        })
    }
}

/// Path segment made only of digits.
fn numeric(segment: &str) -> Option<&str> {
    (!segment.is_empty() && segment.bytes().all(|b| b.is_ascii_digit())).then_some(segment)
}

fn account_number(segment: &str) -> Result<i64> {
    segment
        .parse()
        .map_err(|_| AdapterError::invalid(format!("account id out of range: {}", segment)))
}

fn flag(segment: &str) -> Option<bool> {
    match segment.to_ascii_lowercase().as_str() {
        "true" | "1" | "yes" => Some(true),
        "false" | "0" | "no" => Some(false),
        _ => None,
    }
}

/// Empty bounds default to the last 24 hours.
fn violation_window(start: Option<&str>, end: Option<&str>) -> (String, String) {
    let now = Utc::now();
    let given = |v: Option<&str>| v.filter(|s| !s.is_empty()).map(String::from);
    let start = given(start)
        .unwrap_or_else(|| (now - Duration::days(1)).to_rfc3339_opts(SecondsFormat::Secs, true));
    let end = given(end).unwrap_or_else(|| now.to_rfc3339_opts(SecondsFormat::Secs, true));
    (start, end)
}

fn schema(properties: Value, required: &[&str]) -> Value {
    json!({ "type": "object", "properties": properties, "required": required })
}

#[async_trait]
impl Adapter for NewRelic {
    fn name(&self) -> &'static str {
        "newrelic"
    }

    fn instructions(&self) -> &'static str {
        "New Relic: APM, browser and mobile applications, deployments, alerts, synthetic monitors, infrastructure hosts, NRQL and log queries, service levels, errors inbox, workloads and dashboards."
    }

    fn tools(&self) -> Vec<Value> {
        let id = json!({ "type": "integer" });
        let page = json!({ "type": "integer", "description": "Pagination index" });
        let text = json!({ "type": "string" });
        let array = json!({ "type": "array" });
        let object = json!({ "type": "object" });
        let monitor_id = json!({ "type": "string", "description": "Monitor UUID" });
        let frequency = json!({ "type": "integer", "enum": [1, 5, 10, 15, 30, 60, 360, 720, 1440], "description": "Minutes" });
        let status = json!({ "type": "string", "enum": ["ENABLED", "DISABLED", "MUTED"] });
        let locations = json!({ "type": "array", "items": { "type": "string" } });

        vec![
            tool("list_applications", "List APM applications.", schema(json!({
                "filter_name": text, "filter_host": text, "filter_language": text, "page": page
            }), &[])),
            tool("get_application", "Get an APM application.", schema(json!({ "app_id": id }), &["app_id"])),
            tool("update_application", "Rename an application or change its Apdex and RUM settings.", schema(json!({
                "app_id": id,
                "name": text,
                "app_apdex_threshold": { "type": "number" },
                "end_user_apdex_threshold": { "type": "number" },
                "enable_real_user_monitoring": { "type": "boolean" }
            }), &["app_id"])),
            tool("delete_application", "Delete an application that has stopped reporting.", schema(json!({ "app_id": id }), &["app_id"])),
            tool("get_application_metrics", "List metric names available for an application.", schema(json!({
                "app_id": id, "name_filter": text, "page": page
            }), &["app_id"])),
            tool("get_application_metric_data", "Get timeslice data for application metrics.", schema(json!({
                "app_id": id,
                "names": { "type": "array", "items": { "type": "string" } },
                "values": { "type": "array", "items": { "type": "string" } },
                "from_date": { "type": "string", "description": "ISO 8601" },
                "to_date": { "type": "string", "description": "ISO 8601" },
                "period": { "type": "integer", "description": "Seconds per timeslice" },
                "summarize": { "type": "boolean", "default": false }
            }), &["app_id", "names"])),
            tool("list_deployments", "List deployments for an application.", schema(json!({ "app_id": id, "page": page }), &["app_id"])),
            tool("create_deployment", "Record a deployment.", schema(json!({
                "app_id": id, "revision": text, "changelog": text, "description": text, "user": text
            }), &["app_id", "revision"])),
            tool("delete_deployment", "Delete a deployment record.", schema(json!({
                "app_id": id, "deployment_id": id
            }), &["app_id", "deployment_id"])),
            tool("list_application_hosts", "List hosts for an application.", schema(json!({
                "app_id": id, "filter_hostname": text, "page": page
            }), &["app_id"])),
            tool("get_application_host", "Get one application host.", schema(json!({
                "app_id": id, "host_id": id
            }), &["app_id", "host_id"])),
            tool("list_application_instances", "List instances for an application.", schema(json!({
                "app_id": id, "filter_hostname": text, "page": page
            }), &["app_id"])),
            tool("get_application_instance", "Get one application instance.", schema(json!({
                "app_id": id, "instance_id": id
            }), &["app_id", "instance_id"])),
            tool("list_key_transactions", "List key transactions.", schema(json!({ "filter_name": text, "page": page }), &[])),
            tool("get_key_transaction", "Get a key transaction.", schema(json!({ "transaction_id": id }), &["transaction_id"])),
            tool("list_mobile_applications", "List mobile applications.", schema(json!({}), &[])),
            tool("get_mobile_application", "Get a mobile application.", schema(json!({ "app_id": id }), &["app_id"])),
            tool("list_alert_policies", "List alert policies.", schema(json!({ "filter_name": text, "page": page }), &[])),
            tool("create_alert_policy", "Create an alert policy.", schema(json!({
                "name": text,
                "incident_preference": { "type": "string", "enum": ["PER_POLICY", "PER_CONDITION", "PER_CONDITION_AND_TARGET"] }
            }), &["name", "incident_preference"])),
            tool("update_alert_policy", "Update an alert policy.", schema(json!({
                "policy_id": id, "name": text, "incident_preference": text
            }), &["policy_id"])),
            tool("delete_alert_policy", "Delete an alert policy.", schema(json!({ "policy_id": id }), &["policy_id"])),
            tool("list_alert_conditions", "List metric alert conditions of a policy.", schema(json!({
                "policy_id": id, "page": page
            }), &["policy_id"])),
            tool("create_alert_condition", "Create a metric alert condition.", schema(json!({
                "policy_id": id,
                "name": text,
                "type": { "type": "string", "description": "apm_app_metric, apm_kt_metric, servers_metric, browser_metric or mobile_metric" },
                "entities": { "type": "array", "items": { "type": "integer" } },
                "metric": text,
                "terms": { "type": "array", "items": { "type": "object" } },
                "condition_scope": { "type": "string", "enum": ["instance", "application"] },
                "violation_close_timer": { "type": "integer", "description": "Hours" },
                "user_defined": object
            }), &["policy_id", "name", "type", "entities", "metric", "terms"])),
            tool("update_alert_condition", "Update a metric alert condition.", schema(json!({
                "condition_id": id,
                "name": text,
                "entities": array,
                "metric": text,
                "terms": array,
                "condition_scope": text,
                "violation_close_timer": { "type": "integer" },
                "user_defined": object
            }), &["condition_id"])),
            tool("delete_alert_condition", "Delete a metric alert condition.", schema(json!({ "condition_id": id }), &["condition_id"])),
            tool("list_nrql_alert_conditions", "List NRQL alert conditions of a policy.", schema(json!({
                "policy_id": id, "page": page
            }), &["policy_id"])),
            tool("create_nrql_alert_condition", "Create a NRQL alert condition.", schema(json!({
                "policy_id": id,
                "name": text,
                "nrql": { "type": "object", "description": "query and since_value" },
                "terms": { "type": "array", "items": { "type": "object" } },
                "value_function": { "type": "string", "description": "single_value or sum" },
                "enabled": { "type": "boolean", "default": true },
                "runbook_url": text,
                "expected_groups": { "type": "integer" },
                "ignore_overlap": { "type": "boolean" }
            }), &["policy_id", "name", "nrql", "terms", "value_function"])),
            tool("update_nrql_alert_condition", "Update a NRQL alert condition.", schema(json!({
                "condition_id": id,
                "name": text,
                "nrql": object,
                "terms": array,
                "value_function": text,
                "enabled": { "type": "boolean" },
                "runbook_url": text,
                "expected_groups": { "type": "integer" },
                "ignore_overlap": { "type": "boolean" }
            }), &["condition_id"])),
            tool("delete_nrql_alert_condition", "Delete a NRQL alert condition.", schema(json!({ "condition_id": id }), &["condition_id"])),
            tool("list_alerts_incidents", "List alert incidents.", schema(json!({
                "page": page, "only_open": { "type": "boolean" }
            }), &[])),
            tool("list_alerts_violations", "List alert violations.", schema(json!({
                "page": page,
                "start_date": { "type": "string", "description": "ISO 8601" },
                "end_date": { "type": "string", "description": "ISO 8601" },
                "only_open": { "type": "boolean" }
            }), &[])),
            tool("list_browser_applications", "List browser applications.", schema(json!({ "filter_name": text, "page": page }), &[])),
            tool("get_browser_application", "Get a browser application.", schema(json!({ "app_id": id }), &["app_id"])),
            tool("create_browser_application", "Create a browser application.", schema(json!({ "name": text }), &["name"])),
            tool("update_browser_application", "Rename a browser application.", schema(json!({ "app_id": id, "name": text }), &["app_id"])),
            tool("delete_browser_application", "Delete a browser application.", schema(json!({ "app_id": id }), &["app_id"])),
            tool("list_workloads", "List workloads through NerdGraph.", schema(json!({}), &[])),
            tool("list_dashboards", "Search dashboards through NerdGraph.", schema(json!({
                "account_id": id,
                "name": { "type": "string", "description": "Substring of the dashboard name" },
                "cursor": { "type": "string", "description": "nextCursor from a previous page" }
            }), &[])),
            tool("list_monitors", "List synthetic monitors.", schema(json!({
                "limit": { "type": "integer", "description": "Maximum monitors to return" },
                "offset": { "type": "integer", "description": "Monitors to skip" }
            }), &[])),
            tool("get_monitor", "Get a synthetic monitor.", schema(json!({ "monitor_id": monitor_id }), &["monitor_id"])),
            tool("create_simple_monitor", "Create a synthetic monitor.", schema(json!({
                "name": text,
                "uri": { "type": "string", "description": "Required for SIMPLE and BROWSER monitors" },
                "type": { "type": "string", "enum": ["SIMPLE", "BROWSER", "SCRIPT_API", "SCRIPT_BROWSER"] },
                "frequency": frequency,
                "locations": locations,
                "status": status,
                "sla_threshold": { "type": "number", "description": "Seconds" }
            }), &["name", "type", "frequency", "locations"])),
            tool("update_monitor", "Update a synthetic monitor.", schema(json!({
                "monitor_id": monitor_id,
                "name": text,
                "frequency": frequency,
                "status": status,
                "sla_threshold": { "type": "number", "description": "Seconds" },
                "locations": locations
            }), &["monitor_id"])),
            tool("delete_monitor", "Delete a synthetic monitor.", schema(json!({ "monitor_id": monitor_id }), &["monitor_id"])),
            tool("get_workload", "Get a workload with its entities.", schema(json!({
                "account_id": id, "workload_id": { "type": "string", "description": "Workload GUID" }
            }), &["account_id", "workload_id"])),
            tool("create_workload", "Create a workload from an entity search query.", schema(json!({
                "account_id": id,
                "name": text,
                "entity_search_query": text,
                "entity_guids": { "type": "array", "items": { "type": "string" } }
            }), &["account_id", "name", "entity_search_query"])),
            tool("update_workload", "Rename a workload or change its entity search query.", schema(json!({
                "account_id": id, "workload_guid": text, "name": text, "entity_search_query": text
            }), &["account_id", "workload_guid"])),
            tool("delete_workload", "Delete a workload.", schema(json!({
                "account_id": id, "workload_guid": text
            }), &["account_id", "workload_guid"])),
            tool("get_dashboard", "Get a dashboard with its pages and widgets.", schema(json!({
                "account_id": id, "dashboard_id": text
            }), &["account_id", "dashboard_id"])),
            tool("create_simple_dashboard", "Create a one-page dashboard.", schema(json!({
                "account_id": id,
                "title": text,
                "page_name": { "type": "string", "default": "Main Page" },
                "widgets": {
                    "type": "array",
                    "items": { "type": "object", "description": "visualization_id, title, layout, raw_configuration" }
                }
            }), &["account_id", "title"])),
            tool("delete_dashboard", "Delete a dashboard.", schema(json!({ "account_id": id, "dashboard_guid": text }), &["dashboard_guid"])),
            tool("execute_nrql_query", "Run a NRQL query.", schema(json!({
                "account_id": id,
                "query": text,
                "timeout": { "type": "integer", "description": "Seconds" }
            }), &["account_id", "query"])),
            tool("get_metric_timeslice_data", "Get timeslice data for metrics across the account.", schema(json!({
                "metric_names": { "type": "array", "items": { "type": "string" } },
                "start_time": { "type": "string", "description": "ISO 8601" },
                "end_time": { "type": "string", "description": "ISO 8601" },
                "period": { "type": "integer", "description": "Seconds per timeslice" },
                "summarize": { "type": "boolean", "default": false }
            }), &["metric_names", "start_time", "end_time"])),
            tool("list_infrastructure_hosts", "List infrastructure hosts.", schema(json!({
                "filter_hostname": text, "filter_os": text, "page": page
            }), &[])),
            tool("get_infrastructure_host", "Get an infrastructure host.", schema(json!({ "host_id": text }), &["host_id"])),
            tool("list_infrastructure_alerts", "List infrastructure alert conditions.", schema(json!({}), &[])),
            tool("query_logs", "Search logs with NRQL.", schema(json!({
                "account_id": id,
                "query": { "type": "string", "description": "NRQL; FROM Log and LIMIT are added when missing" },
                "from_time": { "type": "string", "description": "ISO 8601" },
                "to_time": { "type": "string", "description": "ISO 8601" },
                "limit": { "type": "integer", "default": 100 }
            }), &["account_id", "query"])),
            tool("list_service_levels", "List service level indicators.", schema(json!({ "account_id": id }), &["account_id"])),
            tool("create_service_level_indicator", "Create a service level indicator with one objective.", schema(json!({
                "account_id": id,
                "name": text,
                "entity_guid": text,
                "description": text,
                "valid_events_query": text,
                "bad_events_query": text,
                "total_events_query": text,
                "target_percentage": { "type": "number", "description": "For example 99.9" },
                "time_window_value": { "type": "integer" },
                "time_window_unit": { "type": "string", "enum": ["MINUTE", "HOUR", "DAY", "WEEK", "MONTH"] }
            }), &[
                "account_id", "name", "entity_guid", "description", "valid_events_query", "bad_events_query",
                "total_events_query", "target_percentage", "time_window_value", "time_window_unit"
            ])),
            tool("list_errors", "List errors from the errors inbox.", schema(json!({
                "account_id": id,
                "query": { "type": "string", "description": "Search query" },
                "cursor": { "type": "string", "description": "endCursor from a previous page" },
                "limit": { "type": "integer", "default": 10 }
            }), &["account_id"])),
            tool("get_error_details", "Get one error group with its stack trace.", schema(json!({
                "account_id": id, "error_id": text
            }), &["account_id", "error_id"])),
            tool("list_accounts", "List accessible accounts.", schema(json!({}), &[])),
            tool("get_account_users", "List users of an account by authentication domain.", schema(json!({ "account_id": id }), &["account_id"])),
        ]
    }

    async fn call_tool(&self, name: &str, args: &Value) -> Result<String> {
        let id = |key: &str| args::id(args, key);
        match name {
            "list_applications" => {
                let call = self.list(
                    "/applications.json",
                    args,
                    &[("filter_name", "name"), ("filter_host", "host"), ("filter_language", "language")],
                );
                self.send(call).await
            }
            "get_application" => self.send(self.get(&format!("/applications/{}.json", id("app_id")?))).await,
            "update_application" => {
                let path = format!("/v2/applications/{}.json", id("app_id")?);
                self.send(self.client.put(path).json(application_update(args))).await
            }
            "delete_application" => {
                let path = format!("/v2/applications/{}.json", id("app_id")?);
                self.send(self.client.delete(path)).await
            }
            "get_application_metrics" => {
                let call = self
                    .get(&format!("/applications/{}/metrics.json", id("app_id")?))
                    .query_opt("name", args::opt_str(args, "name_filter"))
                    .query_opt("page", args::opt_u64(args, "page"));
                self.send(call).await
            }
            "get_application_metric_data" => self.metric_data(args).await,
            "list_deployments" => {
                let call = self.list(&format!("/applications/{}/deployments.json", id("app_id")?), args, &[]);
                self.send(call).await
            }
            "create_deployment" => {
                let path = format!("/v2/applications/{}/deployments.json", id("app_id")?);
                self.send(self.client.post(path).json(deployment_body(args)?)).await
            }
            "delete_deployment" => {
                let path = format!(
                    "/v2/applications/{}/deployments/{}.json",
                    id("app_id")?,
                    id("deployment_id")?
                );
                self.send(self.client.delete(path)).await
            }
            "list_application_hosts" | "list_application_instances" => {
                let kind = if name == "list_application_hosts" { "hosts" } else { "instances" };
                let call = self.list(
                    &format!("/applications/{}/{}.json", id("app_id")?, kind),
                    args,
                    &[("filter_hostname", "hostname")],
                );
                self.send(call).await
            }
            "get_application_host" => {
                let path = format!("/applications/{}/hosts/{}.json", id("app_id")?, id("host_id")?);
                self.send(self.get(&path)).await
            }
            "get_application_instance" => {
                let path = format!("/applications/{}/instances/{}.json", id("app_id")?, id("instance_id")?);
                self.send(self.get(&path)).await
            }
            "list_key_transactions" => {
                self.send(self.list("/key_transactions.json", args, &[("filter_name", "name")])).await
            }
            "get_key_transaction" => {
                let path = format!("/key_transactions/{}.json", id("transaction_id")?);
                self.send(self.get(&path)).await
            }
            "list_mobile_applications" => self.send(self.get("/mobile_applications.json")).await,
            "get_mobile_application" => {
                self.send(self.get(&format!("/mobile_applications/{}.json", id("app_id")?))).await
            }
            "list_alert_policies" => {
                self.send(self.list("/alerts_policies.json", args, &[("filter_name", "name")])).await
            }
            "create_alert_policy" => {
                let call = self.client.post("/v2/alerts_policies.json").json(policy_body(args, true)?);
                self.send(call).await
            }
            "update_alert_policy" => {
                let path = format!("/v2/alerts_policies/{}.json", id("policy_id")?);
                self.send(self.client.put(path).json(policy_body(args, false)?)).await
            }
            "delete_alert_policy" => {
                let path = format!("/v2/alerts_policies/{}.json", id("policy_id")?);
                self.send(self.client.delete(path)).await
            }
            "list_alert_conditions" | "list_nrql_alert_conditions" => {
                let path = if name == "list_alert_conditions" {
                    "/alerts_conditions.json"
                } else {
                    "/alerts_nrql_conditions.json"
                };
                let call = self.list(path, args, &[]).query("policy_id", id("policy_id")?);
                self.send(call).await
            }
            "create_alert_condition" => {
                let path = format!("/v2/alerts_conditions/policies/{}.json", id("policy_id")?);
                self.send(self.client.post(path).json(condition_body(args, true)?)).await
            }
            "update_alert_condition" => {
                let path = format!("/v2/alerts_conditions/{}.json", id("condition_id")?);
                self.send(self.client.put(path).json(condition_body(args, false)?)).await
            }
            "delete_alert_condition" => {
                let path = format!("/v2/alerts_conditions/{}.json", id("condition_id")?);
                self.send(self.client.delete(path)).await
            }
            "create_nrql_alert_condition" => {
                let path = format!("/v2/alerts_nrql_conditions/policies/{}.json", id("policy_id")?);
                self.send(self.client.post(path).json(nrql_condition_body(args, true)?)).await
            }
            "update_nrql_alert_condition" => {
                let path = format!("/v2/alerts_nrql_conditions/{}.json", id("condition_id")?);
                self.send(self.client.put(path).json(nrql_condition_body(args, false)?)).await
            }
            "delete_nrql_alert_condition" => {
                let path = format!("/v2/alerts_nrql_conditions/{}.json", id("condition_id")?);
                self.send(self.client.delete(path)).await
            }
            "list_alerts_incidents" => {
                let call = self
                    .list("/alerts_incidents.json", args, &[])
                    .query_opt("only_open", Self::open_flag(args));
                self.send(call).await
            }
            "list_alerts_violations" => {
                let call = self
                    .list("/alerts_violations.json", args, &[])
                    .query_opt("start_date", args::opt_str(args, "start_date"))
                    .query_opt("end_date", args::opt_str(args, "end_date"))
                    .query_opt("only_open", Self::open_flag(args));
                self.send(call).await
            }
            "list_browser_applications" => {
                self.send(self.list("/browser_applications.json", args, &[("filter_name", "name")])).await
            }
            "get_browser_application" => {
                self.send(self.get(&format!("/browser_applications/{}.json", id("app_id")?))).await
            }
            "create_browser_application" => {
                let body = json!({ "browser_application": { "name": args::str(args, "name")? } });
                self.send(self.client.post("/v2/browser_applications.json").json(body)).await
            }
            "update_browser_application" => {
                let path = format!("/v2/browser_applications/{}.json", id("app_id")?);
                let mut app = Map::new();
                put(&mut app, "name", args::opt_str(args, "name").map(|v| json!(v)));
                self.send(self.client.put(path).json(wrap("browser_application", app))).await
            }
            "delete_browser_application" => {
                let path = format!("/v2/browser_applications/{}.json", id("app_id")?);
                self.send(self.client.delete(path)).await
            }
            "list_workloads" => {
                self.nerdgraph(nerdgraph::WORKLOADS, json!({}), "Error listing workloads").await
            }
            "list_dashboards" => self.list_dashboards(args).await,
            "list_monitors" => {
                let call = self
                    .synthetics
                    .get("/v3/monitors")
                    .query_opt("limit", args::opt_u64(args, "limit").filter(|n| *n > 0))
                    .query_opt("offset", args::opt_u64(args, "offset").filter(|n| *n > 0));
                let mut body = self.fetch(call).await?;
                Ok(pretty(&json!({ "monitors": body["monitors"].take() })))
            }
            "get_monitor" => {
                let path = format!("/v3/monitors/{}", args::str(args, "monitor_id")?);
                let body = self.fetch(self.synthetics.get(path)).await?;
                Ok(pretty(synthetics::monitor(&body)))
            }
            "create_simple_monitor" => {
                let body = synthetics::create_body(args)?;
                let reply = self.fetch(self.synthetics.post("/v3/monitors").json(body)).await?;
                Ok(pretty(synthetics::monitor(&reply)))
            }
            "update_monitor" => self.update_monitor(args).await,
            "delete_monitor" => {
                let path = format!("/v3/monitors/{}", args::str(args, "monitor_id")?);
                self.synthetics.delete(path).send().await?;
                Ok(pretty(&json!({ "success": true, "message": "Monitor deleted successfully" })))
            }
            "get_workload" => {
                let variables = json!({
                    "accountId": nerdgraph::account_id(args)?,
                    "guid": args::str(args, "workload_id")?,
                });
                self.nerdgraph(nerdgraph::WORKLOAD, variables, "Error getting workload").await
            }
            "create_workload" => {
                let variables = json!({
                    "accountId": nerdgraph::account_id(args)?,
                    "name": args::str(args, "name")?,
                    "entitySearchQuery": args::str(args, "entity_search_query")?,
                    "entityGuids": args::string_list(args, "entity_guids").unwrap_or_default(),
                });
                self.nerdgraph(nerdgraph::WORKLOAD_CREATE, variables, "Error creating workload").await
            }
            "update_workload" => {
                let variables = json!({
                    "accountId": nerdgraph::account_id(args)?,
                    "guid": args::str(args, "workload_guid")?,
                    "updateFields": nerdgraph::workload_update_fields(args)?,
                });
                self.nerdgraph(nerdgraph::WORKLOAD_UPDATE, variables, "Error updating workload").await
            }
            "delete_workload" => {
                let variables = json!({
                    "accountId": nerdgraph::account_id(args)?,
                    "guid": args::str(args, "workload_guid")?,
                });
                self.nerdgraph(nerdgraph::WORKLOAD_DELETE, variables, "Error deleting workload").await
            }
            "get_dashboard" => {
                let variables = json!({
                    "accountId": nerdgraph::account_id(args)?,
                    "id": args::id(args, "dashboard_id")?,
                });
                self.nerdgraph(nerdgraph::DASHBOARD, variables, "Error getting dashboard").await
            }
            "create_simple_dashboard" => self.create_dashboard(args).await,
            "delete_dashboard" => {
                let variables = json!({ "guid": args::str(args, "dashboard_guid")? });
                self.nerdgraph(nerdgraph::DASHBOARD_DELETE, variables, "Error deleting dashboard").await
            }
            "execute_nrql_query" => {
                let body = self
                    .nrql(
                        nerdgraph::account_id(args)?,
                        args::str(args, "query")?,
                        args::opt_u64(args, "timeout"),
                    )
                    .await
                    .context("Error executing NRQL query")?;
                Ok(pretty(&body))
            }
            "get_metric_timeslice_data" => {
                let names = args::string_list(args, "metric_names")
                    .filter(|n| !n.is_empty())
                    .ok_or_else(|| AdapterError::invalid("Missing required argument: metric_names"))?;
                let mut call = self
                    .get("/metrics/data.json")
                    .query_all("names[]", &names)
                    .query("from", args::str(args, "start_time")?)
                    .query("to", args::str(args, "end_time")?)
                    .query_opt("period", args::opt_u64(args, "period"));
                if args::bool_or(args, "summarize", false) {
                    call = call.query("summarize", true);
                }
                self.send(call).await
            }
            "list_infrastructure_hosts" => {
                let call = self
                    .infrastructure
                    .get("/hosts")
                    .query_opt("filter[hostname]", args::opt_str(args, "filter_hostname"))
                    .query_opt("filter[os]", args::opt_str(args, "filter_os"))
                    .query_opt("page", args::opt_u64(args, "page"));
                let mut body = self.fetch(call).await?;
                Ok(pretty(&json!({ "hosts": body["hosts"].take() })))
            }
            "get_infrastructure_host" => {
                let path = format!("/hosts/{}", args::str(args, "host_id")?);
                let mut body = self.fetch(self.infrastructure.get(path)).await?;
                let host = if body.get("host").is_some() { body["host"].take() } else { body };
                Ok(pretty(&host))
            }
            "list_infrastructure_alerts" => {
                let body = self.fetch(self.infrastructure.get("/alerts/conditions")).await?;
                Ok(pretty(&json!({ "conditions": body })))
            }
            "query_logs" => self.query_logs(args).await,
            "list_service_levels" => {
                let variables = json!({ "accountId": nerdgraph::account_id(args)? });
                self.nerdgraph(nerdgraph::SERVICE_LEVELS, variables, "Error listing service levels").await
            }
            "create_service_level_indicator" => {
                let variables = json!({
                    "accountId": nerdgraph::account_id(args)?,
                    "sli": nerdgraph::service_level_input(args)?,
                });
                self.nerdgraph(nerdgraph::SERVICE_LEVEL_CREATE, variables, "Error creating service level indicator")
                    .await
            }
            "list_errors" => self.list_errors(args).await,
            "get_error_details" => {
                let variables = json!({
                    "accountId": nerdgraph::account_id(args)?,
                    "errorId": args::str(args, "error_id")?,
                });
                self.nerdgraph(nerdgraph::ERROR, variables, "Error getting error details").await
            }
            "list_accounts" => self.nerdgraph(nerdgraph::ACCOUNTS, json!({}), "Error listing accounts").await,
            "get_account_users" => {
                let variables = json!({ "accountId": nerdgraph::account_id(args)? });
                self.nerdgraph(nerdgraph::ACCOUNT_USERS, variables, "Error listing account users").await
            }
            _ => Err(AdapterError::UnknownTool(name.to_string())),
        }
    }

    fn resources(&self) -> Vec<Value> {
        vec![
            resource("nr://applications", "applications", "APM applications with summary metrics", "text/markdown"),
            resource("nr://alerts/policies", "alert policies", "Alert policies", "text/markdown"),
            resource("nr://mobile_applications", "mobile applications", "Mobile applications with crash summaries", "text/markdown"),
            resource("nr://key_transactions", "key transactions", "Key transactions with summary metrics", "text/markdown"),
            resource("nr://dashboard", "overview", "Busiest applications, mobile crash rates and open incidents", "text/markdown"),
            resource("nr://synthetics/monitors", "synthetic monitors", "Synthetic monitors and their locations", "text/markdown"),
            resource("nr://browser_applications", "browser applications", "Browser applications with page load summaries", "text/markdown"),
        ]
    }

    fn resource_templates(&self) -> Vec<Value> {
        vec![
            resource_template(
                "nr://application/{app_id}",
                "application",
                "One APM application with settings and summaries",
                "text/markdown",
            ),
            resource_template(
                "nr://mobile_application/{app_id}",
                "mobile application",
                "One mobile application with mobile and crash summaries",
                "text/markdown",
            ),
            resource_template(
                "nr://key_transaction/{txn_id}",
                "key transaction",
                "One key transaction with application and end user summaries",
                "text/markdown",
            ),
            resource_template(
                "nr://alerts/incidents/{only_open}",
                "alert incidents",
                "Alert incidents; only_open is true or false",
                "text/markdown",
            ),
            resource_template(
                "nr://alerts/violations/{only_open}/{start_date}/{end_date}",
                "alert violations",
                "Alert violations in an ISO 8601 range; empty dates mean the last 24 hours",
                "text/markdown",
            ),
            resource_template(
                "nr://dashboards/{account_id}",
                "dashboards",
                "Dashboards of an account with their pages",
                "text/markdown",
            ),
            resource_template(
                "nr://service_levels/{account_id}",
                "service levels",
                "Service level indicators of an account with objectives and event queries",
                "text/markdown",
            ),
        ]
    }

    async fn read_resource(&self, uri: &str) -> Result<String> {
        match uri {
            "nr://applications" => {
                let call = self.get("/applications.json").query("exclude_links", true);
                Ok(render::applications(&self.items(call, "applications").await?))
            }
            "nr://alerts/policies" => {
                let policies = self.items(self.get("/alerts_policies.json"), "policies").await?;
                Ok(render::alert_policies(&policies))
            }
            "nr://mobile_applications" => {
                let apps = self.items(self.get("/mobile_applications.json"), "applications").await?;
                Ok(render::mobile_applications(&apps))
            }
            "nr://key_transactions" => {
                let txns = self.items(self.get("/key_transactions.json"), "key_transactions").await?;
                Ok(render::key_transactions(&txns))
            }
            "nr://dashboard" => self.overview().await,
            "nr://synthetics/monitors" => {
                let monitors = self.items(self.synthetics.get("/v3/monitors"), "monitors").await?;
                Ok(render::monitors(&monitors))
            }
            "nr://browser_applications" => {
                let apps = self
                    .items(self.get("/browser_applications.json"), "browser_applications")
                    .await?;
                Ok(render::browser_applications(&apps))
            }
            _ => match self.read_template(uri).await {
                Some(view) => view,
                None => Err(AdapterError::UnknownResource(uri.to_string())),
            },
        }
    }

    fn prompts(&self) -> Vec<Value> {
        vec![
            prompt("analyze_application_performance", "Analyze the performance of one application.", &[
                ("app_id", "Application ID to analyze", true),
            ]),
            prompt("deployment_recommendations", "Assess one deployment and recommend next steps.", &[
                ("app_id", "Application ID", true),
                ("deployment_id", "Deployment ID", true),
            ]),
            prompt("investigate_alert_incident", "Investigate an alert incident.", &[
                ("incident_id", "Incident ID to investigate", true),
            ]),
            prompt("compare_environments", "Compare production and staging applications.", &[
                ("prod_app_id", "Production application ID", true),
                ("staging_app_id", "Staging application ID", true),
            ]),
            prompt("deployment_analysis", "Analyze the impact of recent deployments.", &[
                ("app_id", "Application ID", true),
                ("days", "Days of deployment history, default 7", false),
            ]),
            prompt("synthetic_monitoring_analysis", "Analyze the results of a synthetic monitor.", &[
                ("monitor_id", "Synthetic monitor ID", true),
                ("time_period", "Hours to look back, default 24", false),
            ]),
        ]
    }

    async fn get_prompt(&self, name: &str, args: &Value) -> Result<String> {
        let text = match name {
            "analyze_application_performance" => format!(
                "Please analyze the performance of the New Relic application with ID {}.\n\n\
                 Focus on:\n\
                 1. Response time trends\n\
                 2. Error rates\n\
                 3. Throughput patterns\n\
                 4. Apdex score interpretation\n\
                 5. Any concerning metrics or potential bottlenecks\n\n\
                 Give specific, actionable recommendations for performance improvements based on the metrics.",
                args::id(args, "app_id")?
            ),
            "deployment_recommendations" => format!(
                "Please analyze deployment {} for application with ID {} and provide recommendations.\n\n\
                 I need to understand:\n\
                 1. The impact of this deployment on application performance\n\
                 2. Any new errors or issues introduced by this deployment\n\
                 3. Comparison of key metrics before and after the deployment\n\
                 4. Apdex score changes\n\n\
                 Based on this analysis, please provide:\n\
                 - A summary of the deployment's impact\n\
                 - Recommendations for addressing any negative effects\n\
                 - Suggestions for future deployments to minimize risks\n\
                 - A recommendation on whether to roll back or keep this deployment",
                args::id(args, "deployment_id")?,
                args::id(args, "app_id")?
            ),
            "investigate_alert_incident" => format!(
                "Please help me investigate New Relic alert incident {}.\n\n\
                 I need to understand:\n\
                 1. What conditions triggered this incident\n\
                 2. The affected applications or services\n\
                 3. The timeline of the incident\n\
                 4. The severity and impact\n\
                 5. Any related historical patterns\n\n\
                 Based on the available information, please provide:\n\
                 - A root cause analysis\n\
                 - Possible remediation steps\n\
                 - Recommendations to prevent similar incidents",
                args::id(args, "incident_id")?
            ),
            "compare_environments" => format!(
                "Please compare the performance metrics between our production application (ID: {}) \
                 and staging application (ID: {}).\n\n\
                 I need to understand:\n\
                 1. Key differences in response times, throughput, and error rates\n\
                 2. Significant disparities in resource utilization\n\
                 3. Whether staging accurately represents production load characteristics\n\
                 4. Any concerning metrics that appear in one environment but not the other\n\n\
                 Please provide recommendations on:\n\
                 - Improving staging to better represent production\n\
                 - Potential optimizations based on the differences observed\n\
                 - Any metrics that suggest problems in the production deployment pipeline",
                args::id(args, "prod_app_id")?,
                args::id(args, "staging_app_id")?
            ),
            "deployment_analysis" => format!(
                "Please analyze the impact of deployments over the past {} days for application ID {}.\n\n\
                 I need to understand:\n\
                 1. The correlation between deployments and performance changes\n\
                 2. Any deployments that caused significant errors or performance degradation\n\
                 3. The overall stability trend following deployments\n\
                 4. How our deployment patterns affect user experience (Apdex)\n\n\
                 Please provide:\n\
                 - A summary of each significant deployment and its impact\n\
                 - Patterns or trends across deployments\n\
                 - Recommendations for improving our deployment process and reducing negative impacts",
                args::u64_or(args, "days", 7),
                args::id(args, "app_id")?
            ),
            "synthetic_monitoring_analysis" => format!(
                "Please analyze the performance of synthetic monitor with ID {} over the past {} hours.\n\n\
                 I need to understand:\n\
                 1. Check failure patterns and their frequency\n\
                 2. Average response times and trends\n\
                 3. Geographical performance differences\n\
                 4. Any correlation between failures and specific conditions (time of day, location, etc.)\n\n\
                 Based on the data, please provide:\n\
                 - Key performance insights\n\
                 - Recommendations for improving the monitored endpoint\n\
                 - Suggestions for adjusting monitor settings or thresholds\n\
                 - Whether additional monitoring should be implemented",
                args::id(args, "monitor_id")?,
                args::u64_or(args, "time_period", 24)
            ),
            _ => return Err(AdapterError::UnknownPrompt(name.to_string())),
        };
        Ok(text)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn adapter() -> NewRelic {
        let client = RestClient::builder("New Relic", "http://localhost:1").build().unwrap();
        NewRelic::new(client)
    }

    #[test]
    fn descriptor_counts() {
        let nr = adapter();
        assert_eq!(nr.tools().len(), 62);
        assert_eq!(nr.resources().len(), 7);
        assert_eq!(nr.resource_templates().len(), 7);
        assert_eq!(nr.prompts().len(), 6);
    }

    #[test]
    fn update_bodies_only_carry_given_fields() {
        let body = application_update(&json!({ "app_id": 1, "app_apdex_threshold": 0.4 }));
        assert_eq!(body, json!({ "application": { "settings": { "app_apdex_threshold": 0.4 } } }));

        let body = policy_body(&json!({ "policy_id": 3, "name": "Paging" }), false).unwrap();
        assert_eq!(body, json!({ "policy": { "name": "Paging" } }));

        let body = nrql_condition_body(&json!({ "condition_id": 9, "enabled": false }), false).unwrap();
        assert_eq!(body, json!({ "nrql_condition": { "enabled": false } }));
    }

    #[test]
    fn create_bodies_require_fields() {
        let err = condition_body(&json!({ "name": "cpu" }), true).unwrap_err();
        assert_eq!(err.to_string(), "Missing required argument: type");

        let body = nrql_condition_body(
            &json!({
                "name": "errors",
                "nrql": { "query": "SELECT count(*) FROM TransactionError", "since_value": "5" },
                "terms": [{ "threshold": "10" }],
                "value_function": "single_value"
            }),
            true,
        )
        .unwrap();
        assert_eq!(body["nrql_condition"]["enabled"], true);
        assert_eq!(body["nrql_condition"]["nrql"]["since_value"], "5");
    }

    #[test]
    fn deployment_body_shape() {
        let body = deployment_body(&json!({ "revision": "abc123", "user": "ci" })).unwrap();
        assert_eq!(body, json!({ "deployment": { "revision": "abc123", "user": "ci" } }));
    }

    #[tokio::test]
    async fn prompt_arguments_are_required() {
        let nr = adapter();
        let text = nr
            .get_prompt("deployment_analysis", &json!({ "app_id": 5 }))
            .await
            .unwrap();
        assert!(text.starts_with("Please analyze the impact of deployments over the past 7 days for application ID 5."));
        assert!(nr.get_prompt("compare_environments", &json!({ "prod_app_id": 1 })).await.is_err());

        let text = nr
            .get_prompt("synthetic_monitoring_analysis", &json!({ "monitor_id": "a1b2" }))
            .await
            .unwrap();
        assert!(text.starts_with("Please analyze the performance of synthetic monitor with ID a1b2 over the past 24 hours."));
        assert!(text.ends_with("- Whether additional monitoring should be implemented"));
    }

    #[test]
    fn template_segments() {
        assert_eq!(numeric("42"), Some("42"));
        assert_eq!(numeric("4x"), None);
        assert_eq!(numeric(""), None);
        assert_eq!(flag("TRUE"), Some(true));
        assert_eq!(flag("0"), Some(false));
        assert_eq!(flag("maybe"), None);
    }

    #[test]
    fn violation_window_defaults_to_a_day() {
        let (start, end) = violation_window(Some("2024-01-01T00:00:00Z"), Some(""));
        assert_eq!(start, "2024-01-01T00:00:00Z");
        let end = chrono::DateTime::parse_from_rfc3339(&end).unwrap();
        let (start, _) = violation_window(None, None);
        let start = chrono::DateTime::parse_from_rfc3339(&start).unwrap();
        assert!(end - start >= Duration::hours(23));
    }

    #[tokio::test]
    async fn unknown_templates_are_rejected_without_a_request() {
        let nr = adapter();
        for uri in [
            "nr://application/abc",
            "nr://alerts/incidents/sometimes",
            "nr://alerts/other/true",
            "nr://service_levels/",
            "nr://nothing",
        ] {
            let err = nr.read_resource(uri).await.unwrap_err();
            assert_eq!(err.to_string(), format!("Unknown resource URI: {}", uri));
        }
    }
}
