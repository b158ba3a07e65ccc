//! Elasticsearch adapter.
//!
//! Env: `ELASTICSEARCH_BASE_URL`, optional `ELASTICSEARCH_TOKEN`
//! (`Authorization: ApiKey <token>`).
//!
//! Serverless deployments reject the cluster and node admin APIs and the
//! shard/replica index settings. The flavour is detected once from `GET /`
//! and cached for the life of the process.

use async_trait::async_trait;
use serde_json::{json, Map, Value};
use tokio::sync::OnceCell;

use super::{no_args, tool, Adapter};
use crate::args;
use crate::config;
use crate::error::{AdapterError, Result, ResultExt};
use crate::http::{pretty, Auth, Call, Payload, RestClient};

const NDJSON: &str = "application/x-ndjson";
const SERVERLESS_ONLY_SETTINGS: [&str; 2] = ["number_of_shards", "number_of_replicas"];
const REFRESH_POLICIES: [&str; 3] = ["true", "false", "wait_for"];

pub struct Elasticsearch {
    client: RestClient,
    serverless: OnceCell<bool>,
}

fn unavailable(api: &str) -> String {
    format!("{} API is not available in Elasticsearch Serverless mode", api)
}

fn is_serverless_info(info: &Value) -> bool {
    info["version"]["build_flavor"] == "serverless"
}

/// Drop shard and replica counts, at the top level and under `index`.
fn strip_serverless_settings(settings: &mut Map<String, Value>) {
    for key in SERVERLESS_ONLY_SETTINGS {
        if settings.remove(key).is_some() {
            tracing::info!(setting = key, "removed setting for serverless mode");
        }
    }
    if let Some(Value::Object(index)) = settings.get_mut("index") {
        for key in SERVERLESS_ONLY_SETTINGS {
            if index.remove(key).is_some() {
                tracing::info!(setting = key, "removed index setting for serverless mode");
            }
        }
    }
}

/// `_msearch` body: a header line naming the index, then the search body.
pub fn msearch_body(searches: &[Value]) -> String {
    let mut out = String::new();
    for search in searches {
        let mut body = search.clone();
        let header = match body.as_object_mut().and_then(|o| o.remove("index")) {
            Some(index) => json!({ "index": index }),
            None => json!({}),
        };
        out.push_str(&header.to_string());
        out.push('\n');
        out.push_str(&body.to_string());
        out.push('\n');
    }
    out
}

/// Bulk bodies must end with a newline.
fn ndjson_terminated(ops: &str) -> String {
    if ops.ends_with('\n') {
        ops.to_string()
    } else {
        format!("{}\n", ops)
    }
}

fn simple_query(keyword: &str, field: Option<&str>, exact: bool) -> Value {
    match (field, exact) {
        (Some(field), true) => json!({ "term": { field: keyword } }),
        (Some(field), false) => json!({ "match": { field: keyword } }),
        (None, true) => json!({ "multi_match": { "query": keyword, "type": "phrase" } }),
        (None, false) => json!({ "multi_match": { "query": keyword } }),
    }
}

fn refresh(args: &Value) -> Result<Option<&str>> {
    match args::opt_str(args, "refresh") {
        Some(r) if !REFRESH_POLICIES.contains(&r) => Err(AdapterError::invalid(format!(
            "Invalid refresh policy: {}. Use 'true', 'false' or 'wait_for'.",
            r
        ))),
        other => Ok(other),
    }
}

impl Elasticsearch {
    pub fn from_env() -> Result<Self> {
        let url = config::required("ELASTICSEARCH_BASE_URL")?;
        let auth = match config::optional("ELASTICSEARCH_TOKEN") {
            Some(token) => Auth::Raw(format!("ApiKey {}", token)),
            None => Auth::None,
        };
        let client = RestClient::builder("Elasticsearch", url)
            .auth(auth)
            .timeout(config::http_timeout())
            .build()?;
        Ok(Self::new(client))
    }

    pub fn new(client: RestClient) -> Self {
        Self {
            client,
            serverless: OnceCell::new(),
        }
    }

    async fn send(&self, call: Call<'_>) -> Result<String> {
        let reply = call.send().await?;
        Ok(match reply.payload() {
            Payload::Json(v) => pretty(&v),
            Payload::Text(t) => t,
            Payload::Empty => pretty(&json!({ "acknowledged": true })),
        })
    }

    async fn is_serverless(&self) -> bool {
        *self
            .serverless
            .get_or_init(|| async {
                let detected = match self.client.get("/").send().await.and_then(|r| r.json()) {
                    Ok(info) => is_serverless_info(&info),
                    Err(e) => {
                        tracing::error!(error = %e, "serverless detection failed, assuming standard");
                        false
                    }
                };
                tracing::info!(
                    mode = if detected { "serverless" } else { "standard" },
                    "detected elasticsearch flavour"
                );
                detected
            })
            .await
    }

    /// Run `call` unless the deployment is serverless.
    async fn admin(&self, api: &str, call: Call<'_>, context: &str) -> Result<String> {
        if self.is_serverless().await {
            return Ok(unavailable(api));
        }
        self.send(call).await.context(context)
    }

    async fn cluster_settings(&self, args: &Value) -> Result<String> {
        if self.is_serverless().await {
            return Ok(unavailable("Cluster settings"));
        }
        let path = if args::bool_or(args, "include_defaults", false) {
            "/_cluster/settings?include_defaults=true"
        } else {
            "/_cluster/settings"
        };
        let result = match args::str(args, "action")? {
            "get" => self.send(self.client.get(path)).await,
            "update" => {
                let settings = args::opt_object(args, "settings")?
                    .filter(|s| !s.is_empty())
                    .ok_or_else(|| AdapterError::invalid("Settings object is required for update action"))?;
                self.send(self.client.put(path).json(Value::Object(settings))).await
            }
            other => Err(AdapterError::invalid(format!(
                "Invalid action: {}. Must be 'get' or 'update'.",
                other
            ))),
        };
        result.context("Error with cluster settings")
    }

    async fn create_index(&self, args: &Value) -> Result<String> {
        let index = args::str(args, "index_name")?;
        let mut body = Map::new();
        if let Some(mut settings) = args::opt_object(args, "settings")? {
            if self.is_serverless().await {
                strip_serverless_settings(&mut settings);
            }
            body.insert("settings".into(), Value::Object(settings));
        }
        for key in ["mappings", "aliases"] {
            if let Some(v) = args::opt_object(args, key)? {
                body.insert(key.into(), Value::Object(v));
            }
        }
        self.send(self.client.put(format!("/{}", index)).json(Value::Object(body)))
            .await
            .context(format!("Error creating index {}", index))
    }

    async fn list_indices(&self, args: &Value) -> Result<String> {
        let path = match args::opt_str(args, "pattern") {
            Some(pattern) => format!("/_cat/indices/{}", pattern),
            None => "/_cat/indices".to_string(),
        };
        let call = self.client.get(path).query("format", "json").query("v", true);
        self.send(call).await.context("Error listing indices")
    }

    async fn index_document(&self, args: &Value) -> Result<String> {
        let index = args::str(args, "index_name")?;
        let document = args::json(args, "document")?;
        let call = match args::opt_id(args, "id") {
            Some(id) => self.client.put(format!("/{}/_doc/{}", index, id)),
            None => self.client.post(format!("/{}/_doc", index)),
        };
        let call = call.query_opt("refresh", refresh(args)?).json(document);
        self.send(call).await.context("Error indexing document")
    }

    async fn get_document(&self, args: &Value) -> Result<String> {
        let index = args::str(args, "index_name")?;
        let id = args::id(args, "id")?;
        let call = self
            .client
            .get(format!("/{}/_doc/{}", index, id))
            .query_opt("_source_includes", args::opt_str(args, "source_includes"))
            .query_opt("_source_excludes", args::opt_str(args, "source_excludes"));
        self.send(call).await.context("Error getting document")
    }

    async fn bulk_operations(&self, args: &Value) -> Result<String> {
        let ops = args::str(args, "operations")?;
        let path = match args::opt_str(args, "index_name") {
            Some(index) => format!("/{}/_bulk", index),
            None => "/_bulk".to_string(),
        };
        let call = self
            .client
            .post(path)
            .query_opt("refresh", refresh(args)?)
            .text(NDJSON, ndjson_terminated(ops));
        self.send(call).await.context("Error performing bulk operations")
    }

    async fn search(&self, args: &Value) -> Result<String> {
        let index = args::str(args, "index_name")?;
        let mut body = json!({ "query": args::json(args, "query")? });
        if let Some(from) = args::opt_u64(args, "from_offset") {
            body["from"] = json!(from);
        }
        if let Some(size) = args::opt_u64(args, "size") {
            body["size"] = json!(size);
        }
        for (arg, key) in [("sort", "sort"), ("aggs", "aggs"), ("source", "_source")] {
            if let Some(v) = args::opt_json(args, arg)? {
                body[key] = v;
            }
        }
        self.send(self.client.post(format!("/{}/_search", index)).json(body))
            .await
            .context("Error searching documents")
    }

    async fn simple_search(&self, args: &Value) -> Result<String> {
        let index = args::str(args, "index_name")?;
        let query = simple_query(
            args::str(args, "keyword")?,
            args::opt_str(args, "field"),
            args::bool_or(args, "exact_match", false),
        );
        let body = json!({
            "from": args::u64_or(args, "from_offset", 0),
            "size": args::u64_or(args, "size", 10),
            "query": query,
        });
        self.send(self.client.post(format!("/{}/_search", index)).json(body))
            .await
            .context("Error performing simple search")
    }

    async fn count_documents(&self, args: &Value) -> Result<String> {
        let index = args::str(args, "index_name")?;
        let mut call = self.client.post(format!("/{}/_count", index));
        if let Some(query) = args::opt_json(args, "query")? {
            call = call.json(json!({ "query": query }));
        }
        self.send(call).await.context("Error counting documents")
    }

    async fn multi_search(&self, args: &Value) -> Result<String> {
        let searches = args::array(args, "searches")?;
        let call = self.client.post("/_msearch").text(NDJSON, msearch_body(&searches));
        self.send(call).await.context("Error performing multi-search")
    }

    async fn create_pipeline(&self, args: &Value) -> Result<String> {
        let id = args::str(args, "pipeline_id")?;
        let mut body = json!({ "processors": args::array(args, "processors")? });
        if let Some(description) = args::opt_str(args, "description") {
            body["description"] = json!(description);
        }
        self.send(self.client.put(format!("/_ingest/pipeline/{}", id)).json(body))
            .await
            .context("Error creating pipeline")
    }

    async fn simulate_pipeline(&self, args: &Value) -> Result<String> {
        let docs: Vec<Value> = args::array(args, "documents")?
            .into_iter()
            .map(|doc| json!({ "_source": doc }))
            .collect();
        let mut body = json!({ "docs": docs });
        let path = match args::opt_str(args, "pipeline_id") {
            Some(id) => format!("/_ingest/pipeline/{}/_simulate", id),
            None => {
                if let Some(pipeline) = args::opt_json(args, "pipeline")? {
                    body["pipeline"] = pipeline;
                }
                "/_ingest/pipeline/_simulate".to_string()
            }
        };
        let call = self
            .client
            .post(path)
            .query_opt("verbose", args::bool_or(args, "verbose", false).then_some(true))
            .json(body);
        self.send(call).await.context("Error simulating pipeline")
    }

    fn nodes_path(args: &Value, stats: bool) -> String {
        let mut path = "/_nodes".to_string();
        if let Some(node) = args::opt_str(args, "node_id") {
            path.push('/');
            path.push_str(node);
        }
        if stats {
            path.push_str("/stats");
        }
        if let Some(metrics) = args::opt_str(args, "metrics") {
            path.push('/');
            path.push_str(metrics);
            if stats {
                if let Some(index_metrics) = args::opt_str(args, "index_metrics") {
                    path.push('/');
                    path.push_str(index_metrics);
                }
            }
        }
        path
    }

    fn cat(&self, path: &str, args: &Value, with_headers: bool) -> Call<'_> {
        let mut call = self
            .client
            .get(path)
            .query("format", args::str_or(args, "format", "json"));
        if args::bool_or(args, "verbose", true) {
            call = call.query("v", true);
        }
        if with_headers {
            call = call.query_opt("h", args::opt_str(args, "headers"));
        }
        call
    }

    async fn cluster_info(&self) -> Result<String> {
        let info = self
            .client
            .get("/")
            .send()
            .await
            .and_then(|r| r.json())
            .context("Error getting cluster info")?;
        let _ = self.serverless.set(is_serverless_info(&info));
        Ok(pretty(&info))
    }

    async fn create_index_template(&self, args: &Value) -> Result<String> {
        let name = args::str(args, "name")?;
        let mut template = args::object(args, "template")?;
        if self.is_serverless().await {
            if let Some(Value::Object(settings)) = template.get_mut("settings") {
                strip_serverless_settings(settings);
            }
        }
        let mut body = json!({
            "index_patterns": args::string_list(args, "index_patterns")
                .ok_or_else(|| AdapterError::invalid("Missing required argument: index_patterns"))?,
            "template": template,
        });
        if let Some(version) = args::opt_i64(args, "version") {
            body["version"] = json!(version);
        }
        if let Some(priority) = args::opt_i64(args, "priority") {
            body["priority"] = json!(priority);
        }
        self.send(self.client.put(format!("/_index_template/{}", name)).json(body))
            .await
            .context("Error creating index template")
    }
}

#[async_trait]
impl Adapter for Elasticsearch {
    fn name(&self) -> &'static str {
        "elasticsearch"
    }

    fn instructions(&self) -> &'static str {
        "Elasticsearch: manage indices, documents, ingest pipelines and templates, search, and inspect cluster and node state. Works against standard and Serverless deployments."
    }

    fn tools(&self) -> Vec<Value> {
        let index_only = json!({
            "type": "object",
            "properties": { "index_name": { "type": "string" } },
            "required": ["index_name"]
        });
        let refresh = json!({ "type": "string", "enum": REFRESH_POLICIES });
        let nodes = json!({
            "type": "object",
            "properties": {
                "node_id": { "type": "string", "description": "Omit for all nodes" },
                "metrics": { "type": "string", "description": "Comma-separated, e.g. jvm,os,process" }
            }
        });
        let mut node_stats = nodes.clone();
        node_stats["properties"]["index_metrics"] = json!({ "type": "string" });
        let cat = json!({
            "type": "object",
            "properties": {
                "format": { "type": "string", "default": "json" },
                "verbose": { "type": "boolean", "default": true },
                "headers": { "type": "string", "description": "Comma-separated columns" }
            }
        });
        let optional_name = |key: &str| {
            json!({ "type": "object", "properties": { key: { "type": "string" } } })
        };
        let required_name = |key: &str| {
            json!({ "type": "object", "properties": { key: { "type": "string" } }, "required": [key] })
        };

        vec![
            tool("cluster_health", "Get cluster health.", json!({
                "type": "object",
                "properties": {
                    "index": { "type": "string" },
                    "timeout": { "type": "string", "description": "e.g. 30s" },
                    "level": { "type": "string", "enum": ["cluster", "indices", "shards"] }
                }
            })),
            tool("cluster_stats", "Get cluster statistics.", optional_name("node_id")),
            tool("cluster_settings", "Get or update cluster settings.", json!({
                "type": "object",
                "properties": {
                    "action": { "type": "string", "enum": ["get", "update"] },
                    "settings": { "type": "object" },
                    "include_defaults": { "type": "boolean", "default": false }
                },
                "required": ["action"]
            })),
            tool("create_index", "Create an index.", json!({
                "type": "object",
                "properties": {
                    "index_name": { "type": "string" },
                    "settings": { "type": "object" },
                    "mappings": { "type": "object" },
                    "aliases": { "type": "object" }
                },
                "required": ["index_name"]
            })),
            tool("get_index", "Get index information.", index_only.clone()),
            tool("delete_index", "Delete an index.", index_only.clone()),
            tool("get_mapping", "Get an index mapping.", index_only),
            tool("update_mapping", "Add properties to an index mapping.", json!({
                "type": "object",
                "properties": {
                    "index_name": { "type": "string" },
                    "properties": { "type": "object" }
                },
                "required": ["index_name", "properties"]
            })),
            tool("list_indices", "List indices, optionally matching a pattern such as log-*.", optional_name("pattern")),
            tool("index_document", "Create or replace a document.", json!({
                "type": "object",
                "properties": {
                    "index_name": { "type": "string" },
                    "document": { "type": "object" },
                    "id": { "type": "string", "description": "Generated when omitted" },
                    "refresh": refresh
                },
                "required": ["index_name", "document"]
            })),
            tool("get_document", "Get a document by id.", json!({
                "type": "object",
                "properties": {
                    "index_name": { "type": "string" },
                    "id": { "type": "string" },
                    "source_includes": { "type": "string" },
                    "source_excludes": { "type": "string" }
                },
                "required": ["index_name", "id"]
            })),
            tool("delete_document", "Delete a document by id.", json!({
                "type": "object",
                "properties": {
                    "index_name": { "type": "string" },
                    "id": { "type": "string" },
                    "refresh": refresh
                },
                "required": ["index_name", "id"]
            })),
            tool("bulk_operations", "Run bulk operations given as NDJSON.", json!({
                "type": "object",
                "properties": {
                    "operations": { "type": "string", "description": "Action and source lines in NDJSON" },
                    "index_name": { "type": "string" },
                    "refresh": refresh
                },
                "required": ["operations"]
            })),
            tool("search", "Search with the query DSL.", json!({
                "type": "object",
                "properties": {
                    "index_name": { "type": "string", "description": "Index or comma-separated list" },
                    "query": { "type": "object" },
                    "from_offset": { "type": "integer" },
                    "size": { "type": "integer" },
                    "sort": { "type": "array" },
                    "aggs": { "type": "object" },
                    "source": { "type": ["boolean", "array"] }
                },
                "required": ["index_name", "query"]
            })),
            tool("simple_search", "Keyword search, full text or on one field.", json!({
                "type": "object",
                "properties": {
                    "index_name": { "type": "string" },
                    "keyword": { "type": "string" },
                    "field": { "type": "string" },
                    "size": { "type": "integer", "default": 10 },
                    "from_offset": { "type": "integer", "default": 0 },
                    "exact_match": { "type": "boolean", "default": false }
                },
                "required": ["index_name", "keyword"]
            })),
            tool("count_documents", "Count documents, optionally matching a query.", json!({
                "type": "object",
                "properties": {
                    "index_name": { "type": "string" },
                    "query": { "type": "object" }
                },
                "required": ["index_name"]
            })),
            tool("multi_search", "Run several searches in one request.", json!({
                "type": "object",
                "properties": {
                    "searches": { "type": "array", "items": { "type": "object" }, "description": "Search bodies, each with an optional index" }
                },
                "required": ["searches"]
            })),
            tool("create_pipeline", "Create or replace an ingest pipeline.", json!({
                "type": "object",
                "properties": {
                    "pipeline_id": { "type": "string" },
                    "processors": { "type": "array", "items": { "type": "object" } },
                    "description": { "type": "string" }
                },
                "required": ["pipeline_id", "processors"]
            })),
            tool("get_pipeline", "Get one or all ingest pipelines.", optional_name("pipeline_id")),
            tool("delete_pipeline", "Delete an ingest pipeline.", required_name("pipeline_id")),
            tool("simulate_pipeline", "Run documents through a stored or inline pipeline.", json!({
                "type": "object",
                "properties": {
                    "documents": { "type": "array", "items": { "type": "object" } },
                    "pipeline_id": { "type": "string" },
                    "pipeline": { "type": "object" },
                    "verbose": { "type": "boolean", "default": false }
                },
                "required": ["documents"]
            })),
            tool("node_info", "Get node information.", nodes),
            tool("node_stats", "Get node statistics.", node_stats),
            tool("cluster_info", "Get basic cluster information and version.", no_args()),
            tool("cat_indices", "Index overview from the cat API.", cat.clone()),
            tool("cat_nodes", "Node overview from the cat API.", cat.clone()),
            tool("cat_aliases", "Alias overview from the cat API.", json!({
                "type": "object",
                "properties": {
                    "format": { "type": "string", "default": "json" },
                    "verbose": { "type": "boolean", "default": true }
                }
            })),
            tool("create_index_template", "Create or replace a composable index template.", json!({
                "type": "object",
                "properties": {
                    "name": { "type": "string" },
                    "index_patterns": { "type": "array", "items": { "type": "string" } },
                    "template": { "type": "object", "description": "settings, mappings and aliases" },
                    "version": { "type": "integer" },
                    "priority": { "type": "integer" }
                },
                "required": ["name", "index_patterns", "template"]
            })),
            tool("get_index_template", "Get one or all index templates.", optional_name("name")),
            tool("delete_index_template", "Delete an index template.", required_name("name")),
        ]
    }

    async fn call_tool(&self, name: &str, args: &Value) -> Result<String> {
        match name {
            "cluster_health" => {
                let path = match args::opt_str(args, "index") {
                    Some(index) => format!("/_cluster/health/{}", index),
                    None => "/_cluster/health".to_string(),
                };
                let call = self
                    .client
                    .get(path)
                    .query_opt("timeout", args::opt_str(args, "timeout"))
                    .query_opt("level", args::opt_str(args, "level"));
                self.admin("Cluster health", call, "Error getting cluster health").await
            }
            "cluster_stats" => {
                let path = match args::opt_str(args, "node_id") {
                    Some(node) => format!("/_cluster/stats/nodes/{}", node),
                    None => "/_cluster/stats".to_string(),
                };
                self.admin("Cluster stats", self.client.get(path), "Error getting cluster stats").await
            }
            "cluster_settings" => self.cluster_settings(args).await,
            "create_index" => self.create_index(args).await,
            "get_index" => {
                let index = args::str(args, "index_name")?;
                self.send(self.client.get(format!("/{}", index)))
                    .await
                    .context(format!("Error getting index {}", index))
            }
            "delete_index" => {
                let index = args::str(args, "index_name")?;
                self.send(self.client.delete(format!("/{}", index)))
                    .await
                    .context(format!("Error deleting index {}", index))
            }
            "get_mapping" => {
                let index = args::str(args, "index_name")?;
                self.send(self.client.get(format!("/{}/_mapping", index)))
                    .await
                    .context(format!("Error getting mapping for index {}", index))
            }
            "update_mapping" => {
                let index = args::str(args, "index_name")?;
                let body = json!({ "properties": args::object(args, "properties")? });
                self.send(self.client.put(format!("/{}/_mapping", index)).json(body))
                    .await
                    .context(format!("Error updating mapping for index {}", index))
            }
            "list_indices" => self.list_indices(args).await,
            "index_document" => self.index_document(args).await,
            "get_document" => self.get_document(args).await,
            "delete_document" => {
                let index = args::str(args, "index_name")?;
                let id = args::id(args, "id")?;
                let call = self
                    .client
                    .delete(format!("/{}/_doc/{}", index, id))
                    .query_opt("refresh", refresh(args)?);
                self.send(call).await.context("Error deleting document")
            }
            "bulk_operations" => self.bulk_operations(args).await,
            "search" => self.search(args).await,
            "simple_search" => self.simple_search(args).await,
            "count_documents" => self.count_documents(args).await,
            "multi_search" => self.multi_search(args).await,
            "create_pipeline" => self.create_pipeline(args).await,
            "get_pipeline" => {
                let path = match args::opt_str(args, "pipeline_id") {
                    Some(id) => format!("/_ingest/pipeline/{}", id),
                    None => "/_ingest/pipeline".to_string(),
                };
                self.send(self.client.get(path)).await.context("Error getting pipeline")
            }
            "delete_pipeline" => {
                let id = args::str(args, "pipeline_id")?;
                self.send(self.client.delete(format!("/_ingest/pipeline/{}", id)))
                    .await
                    .context("Error deleting pipeline")
            }
            "simulate_pipeline" => self.simulate_pipeline(args).await,
            "node_info" => {
                let call = self.client.get(Self::nodes_path(args, false));
                self.admin("Node info", call, "Error getting node info").await
            }
            "node_stats" => {
                let call = self.client.get(Self::nodes_path(args, true));
                self.admin("Node stats", call, "Error getting node stats").await
            }
            "cluster_info" => self.cluster_info().await,
            "cat_indices" => {
                let call = self.cat("/_cat/indices", args, true);
                self.send(call).await.context("Error listing indices")
            }
            "cat_nodes" => {
                let call = self.cat("/_cat/nodes", args, true);
                self.admin("Cat nodes", call, "Error listing nodes").await
            }
            "cat_aliases" => {
                let call = self.cat("/_cat/aliases", args, false);
                self.send(call).await.context("Error listing aliases")
            }
            "create_index_template" => self.create_index_template(args).await,
            "get_index_template" => {
                let path = match args::opt_str(args, "name") {
                    Some(name) => format!("/_index_template/{}", name),
                    None => "/_index_template".to_string(),
                };
                self.send(self.client.get(path)).await.context("Error getting index template")
            }
            "delete_index_template" => {
                let name = args::str(args, "name")?;
                self.send(self.client.delete(format!("/_index_template/{}", name)))
                    .await
                    .context("Error deleting index template")
            }
            _ => Err(AdapterError::UnknownTool(name.to_string())),
        }
    }
}
