//! Puppet Enterprise adapter.
//!
//! Env: `PUPPET_URL` (host only), `PUPPET_TOKEN` (`X-Authentication`),
//! `PUPPET_SCHEME`, `PUPPET_CONSOLE_PORT`, `PUPPET_CA_PORT`,
//! `PUPPET_ORCHESTRATOR_PORT`.
//!
//! PE serves its APIs on three ports from one host, so a single client is
//! used with absolute URLs. Results are wrapped as
//! `{"status":"success","data":...}`; upstream failures come back as
//! `{"status":"error","message":...}` instead of a tool error.

use async_trait::async_trait;
use reqwest::StatusCode;
use serde_json::{json, Value};

use super::{no_args, tool, Adapter};
use crate::args;
use crate::config;
use crate::error::{AdapterError, Result};
use crate::http::{encode_segment, pretty, Auth, RestClient};

/// PE service roots, e.g. `https://pe.example.com:4433`.
#[derive(Debug, Clone)]
pub struct Endpoints {
    pub console: String,
    pub ca: String,
    pub orchestrator: String,
}

impl Endpoints {
    pub fn for_host(scheme: &str, host: &str, console_port: u16, ca_port: u16, orchestrator_port: u16) -> Self {
        let host = host.trim_end_matches('/');
        Self {
            console: format!("{}://{}:{}", scheme, host, console_port),
            ca: format!("{}://{}:{}", scheme, host, ca_port),
            orchestrator: format!("{}://{}:{}", scheme, host, orchestrator_port),
        }
    }

    /// Every service behind one base URL.
    pub fn single(base: &str) -> Self {
        let base = base.trim_end_matches('/').to_string();
        Self {
            console: base.clone(),
            ca: base.clone(),
            orchestrator: base,
        }
    }
}

pub struct Puppet {
    client: RestClient,
    endpoints: Endpoints,
}

fn success(data: Value) -> Value {
    json!({ "status": "success", "data": data })
}

fn message(text: String) -> Value {
    json!({ "status": "success", "message": text })
}

/// Group id from a `Location` such as `/classifier-api/v1/groups/<id>`.
fn group_id_from_location(location: &str) -> Option<&str> {
    location.trim_end_matches('/').rsplit('/').next().filter(|s| !s.is_empty())
}

fn default_rule() -> Value {
    json!(["and", ["~", "name", ".*"]])
}

fn node_names(args: &Value) -> Result<Vec<Value>> {
    args::array(args, "node_names_json")
        .map_err(|_| AdapterError::invalid("Invalid input: node_names_json must be a JSON array of strings"))
}

impl Puppet {
    pub fn from_env() -> Result<Self> {
        let host = config::required("PUPPET_URL")?;
        let scheme = config::with_default("PUPPET_SCHEME", "https");
        let endpoints = Endpoints::for_host(
            &scheme,
            &host,
            config::parse_or("PUPPET_CONSOLE_PORT", 4433),
            config::parse_or("PUPPET_CA_PORT", 8140),
            config::parse_or("PUPPET_ORCHESTRATOR_PORT", 8143),
        );
        let auth = match config::optional("PUPPET_TOKEN") {
            Some(token) => Auth::Headers(vec![("X-Authentication".to_string(), token)]),
            None => Auth::None,
        };
        let client = RestClient::builder("Puppet", endpoints.console.clone())
            .auth(auth)
            .timeout(config::http_timeout())
            .accept_invalid_certs(true)
            .follow_redirects(false)
            .build()?;
        Ok(Self::new(client, endpoints))
    }

    pub fn new(client: RestClient, endpoints: Endpoints) -> Self {
        Self { client, endpoints }
    }

    async fn get_json(&self, url: String) -> Result<Value> {
        self.client.get(url).send().await?.json()
    }

    async fn create_node_group(&self, args: &Value) -> Result<Value> {
        let name = args::str(args, "name")?;
        let rule = args::opt_json(args, "rule_json")?.unwrap_or_else(default_rule);
        let classes = args::opt_json(args, "classes_json")?.unwrap_or_else(|| json!({}));
        let body = json!({
            "name": name,
            "description": args::str(args, "description")?,
            "parent": args::str(args, "parent_id")?,
            "environment": args::str_or(args, "environment", "production"),
            "classes": classes,
            "rule": rule,
        });

        let reply = self
            .client
            .post(format!("{}/classifier-api/v1/groups", self.endpoints.console))
            .json(body)
            .send_unchecked()
            .await?;
        let status = reply.status;
        if !(status.is_success() || status == StatusCode::SEE_OTHER) {
            return Err(AdapterError::status("Puppet", status.as_u16(), &reply.text()));
        }
        if let Ok(data) = reply.json() {
            return Ok(success(data));
        }
        if status == StatusCode::SEE_OTHER {
            if let Some(id) = reply.header("location").and_then(group_id_from_location) {
                tracing::info!(group = %name, id = %id, "node group created");
                return Ok(success(json!({ "id": id, "name": name })));
            }
        }
        Ok(message(format!("Group {} created successfully", name)))
    }

    async fn update_node_group(&self, group_id: &str, data: Value) -> Result<Value> {
        let reply = self
            .client
            .post(self.group_url(group_id))
            .json(data)
            .send()
            .await?;
        Ok(match reply.json() {
            Ok(data) => success(data),
            Err(_) => message(format!("Group {} updated successfully", group_id)),
        })
    }

    async fn pin(&self, group_id: &str, action: &str, nodes: Vec<Value>) -> Result<Value> {
        let count = nodes.len();
        self.client
            .post(format!("{}/{}", self.group_url(group_id), action))
            .json(json!({ "nodes": nodes }))
            .send()
            .await?;
        let text = if action == "pin" {
            format!("Successfully pinned {} node(s) to group {}", count, group_id)
        } else {
            format!("Successfully unpinned {} node(s) from group {}", count, group_id)
        };
        Ok(message(text))
    }

    fn group_url(&self, group_id: &str) -> String {
        format!(
            "{}/classifier-api/v1/groups/{}",
            self.endpoints.console,
            encode_segment(group_id)
        )
    }

    /// Run one tool. The error side carries the prefix for the error envelope.
    async fn dispatch(&self, name: &str, args: &Value) -> std::result::Result<Value, (String, AdapterError)> {
        let console = &self.endpoints.console;
        match name {
            "check_status" => self
                .get_json(format!("{}/status/v1/services", console))
                .await
                .map(success)
                .map_err(|e| ("Failed to get status".to_string(), e)),
            "get_certificate_statuses" => self
                .get_json(format!("{}/puppet-ca/v1/certificate_statuses/any_key", self.endpoints.ca))
                .await
                .map(success)
                .map_err(|e| ("Failed to fetch certificate statuses".to_string(), e)),
            "get_certificate" => {
                let certname = args::str(args, "certname").map_err(|e| (String::new(), e))?;
                let url = format!("{}/puppet-ca/v1/certificate/{}", self.endpoints.ca, encode_segment(certname));
                match self.client.get(url).send().await {
                    Ok(reply) => Ok(success(json!(reply.text()))),
                    Err(e) => Err((format!("Failed to fetch certificate {}", certname), e)),
                }
            }
            "get_node_groups" => self
                .get_json(format!("{}/classifier-api/v1/groups", console))
                .await
                .map(success)
                .map_err(|e| ("Failed to fetch node groups".to_string(), e)),
            "get_node_group" => {
                let id = args::str(args, "group_id").map_err(|e| (String::new(), e))?;
                self.get_json(self.group_url(id))
                    .await
                    .map(success)
                    .map_err(|e| (format!("Failed to fetch node group {}", id), e))
            }
            "create_node_group" => {
                let group = args::str_or(args, "name", "");
                self.create_node_group(args)
                    .await
                    .map_err(|e| (format!("Failed to create node group {}", group), e))
            }
            "update_node_group" => {
                let id = args::str(args, "group_id").map_err(|e| (String::new(), e))?;
                let data = args::json(args, "data_json").map_err(|e| (String::new(), e))?;
                self.update_node_group(id, data)
                    .await
                    .map_err(|e| (format!("Failed to update node group {}", id), e))
            }
            "delete_node_group" => {
                let id = args::str(args, "group_id").map_err(|e| (String::new(), e))?;
                match self.client.delete(self.group_url(id)).send().await {
                    Ok(_) => Ok(message(format!("Group {} deleted successfully", id))),
                    Err(e) => Err((format!("Failed to delete node group {}", id), e)),
                }
            }
            "pin_nodes_to_group" | "unpin_nodes_from_group" => {
                let id = args::str(args, "group_id").map_err(|e| (String::new(), e))?;
                let nodes = node_names(args).map_err(|e| (String::new(), e))?;
                let (action, verb) = if name == "pin_nodes_to_group" {
                    ("pin", "Failed to pin nodes to group")
                } else {
                    ("unpin", "Failed to unpin nodes from group")
                };
                self.pin(id, action, nodes)
                    .await
                    .map_err(|e| (format!("{} {}", verb, id), e))
            }
            "list_roles" => self
                .get_json(format!("{}/rbac-api/v1/roles", console))
                .await
                .map(success)
                .map_err(|e| ("Failed to fetch roles".to_string(), e)),
            "list_users" => self
                .get_json(format!("{}/rbac-api/v1/users", console))
                .await
                .map(success)
                .map_err(|e| ("Failed to fetch users".to_string(), e)),
            "list_tasks" => self
                .get_json(format!("{}/orchestrator/v1/tasks", self.endpoints.orchestrator))
                .await
                .map(|mut body| success(body.get_mut("items").map(Value::take).unwrap_or_else(|| json!([]))))
                .map_err(|e| ("Failed to fetch tasks list".to_string(), e)),
            _ => Err((String::new(), AdapterError::UnknownTool(name.to_string()))),
        }
    }
}

/// `{"status":"error"}` envelope; argument errors keep their own wording.
fn error_envelope(prefix: &str, err: &AdapterError) -> Value {
    let text = if prefix.is_empty() {
        err.to_string()
    } else {
        format!("{}: {}", prefix, err)
    };
    json!({ "status": "error", "message": text })
}

#[async_trait]
impl Adapter for Puppet {
    fn name(&self) -> &'static str {
        "puppet"
    }

    fn instructions(&self) -> &'static str {
        "Puppet Enterprise: service status, CA certificates, node classification groups, RBAC roles and users, and orchestrator tasks."
    }

    fn tools(&self) -> Vec<Value> {
        let group_id = json!({
            "type": "object",
            "properties": { "group_id": { "type": "string" } },
            "required": ["group_id"]
        });
        let pinning = json!({
            "type": "object",
            "properties": {
                "group_id": { "type": "string" },
                "node_names_json": { "type": "string", "description": "JSON array of certnames" }
            },
            "required": ["group_id", "node_names_json"]
        });

        vec![
            tool("check_status", "Check the status of Puppet Enterprise services.", no_args()),
            tool("get_certificate_statuses", "List certificate statuses from the Puppet CA.", no_args()),
            tool("get_certificate", "Get a signed certificate in PEM form.", json!({
                "type": "object",
                "properties": { "certname": { "type": "string" } },
                "required": ["certname"]
            })),
            tool("get_node_groups", "List node classification groups.", no_args()),
            tool("get_node_group", "Get a node classification group.", group_id.clone()),
            tool("create_node_group", "Create a node classification group.", json!({
                "type": "object",
                "properties": {
                    "name": { "type": "string" },
                    "description": { "type": "string" },
                    "parent_id": { "type": "string" },
                    "environment": { "type": "string", "default": "production" },
                    "rule_json": { "type": "string", "description": "Rule as JSON; defaults to matching every node" },
                    "classes_json": { "type": "string", "description": "Classes as a JSON object" }
                },
                "required": ["name", "description", "parent_id"]
            })),
            tool("update_node_group", "Replace a node group definition.", json!({
                "type": "object",
                "properties": {
                    "group_id": { "type": "string" },
                    "data_json": { "type": "string", "description": "Complete group as JSON" }
                },
                "required": ["group_id", "data_json"]
            })),
            tool("delete_node_group", "Delete a node group.", group_id),
            tool("pin_nodes_to_group", "Pin nodes to a group.", pinning.clone()),
            tool("unpin_nodes_from_group", "Unpin nodes from a group.", pinning),
            tool("list_roles", "List RBAC roles.", no_args()),
            tool("list_users", "List RBAC users.", no_args()),
            tool("list_tasks", "List orchestrator tasks.", no_args()),
        ]
    }

    async fn call_tool(&self, name: &str, args: &Value) -> Result<String> {
        match self.dispatch(name, args).await {
            Ok(body) => Ok(pretty(&body)),
            Err((_, e @ AdapterError::UnknownTool(_))) => Err(e),
            Err((prefix, e)) => {
                tracing::warn!(tool = %name, error = %e, "puppet call failed");
                Ok(pretty(&error_envelope(&prefix, &e)))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn endpoints_share_host() {
        let e = Endpoints::for_host("https", "pe.example.com", 4433, 8140, 8143);
        assert_eq!(e.console, "https://pe.example.com:4433");
        assert_eq!(e.ca, "https://pe.example.com:8140");
        assert_eq!(e.orchestrator, "https://pe.example.com:8143");
    }

    #[test]
    fn location_yields_group_id() {
        assert_eq!(
            group_id_from_location("https://pe:4433/classifier-api/v1/groups/7d1c5b1e-0001"),
            Some("7d1c5b1e-0001")
        );
        assert_eq!(group_id_from_location("/groups/abc/"), Some("abc"));
        assert_eq!(group_id_from_location(""), None);
    }

    #[test]
    fn default_rule_matches_everything() {
        assert_eq!(default_rule(), json!(["and", ["~", "name", ".*"]]));
    }

    #[test]
    fn error_envelope_wording() {
        let err = AdapterError::status("Puppet", 403, r#"{"msg":"denied"}"#);
        let env = error_envelope("Failed to fetch roles", &err);
        assert_eq!(env["status"], "error");
        assert!(env["message"].as_str().unwrap().starts_with("Failed to fetch roles: Puppet API error: 403"));

        let env = error_envelope("", &AdapterError::invalid("Missing required argument: group_id"));
        assert_eq!(env["message"], "Missing required argument: group_id");
    }

    #[test]
    fn node_names_must_be_an_array() {
        assert_eq!(node_names(&json!({ "node_names_json": "[\"a\",\"b\"]" })).unwrap().len(), 2);
        let err = node_names(&json!({ "node_names_json": "{\"a\":1}" })).unwrap_err();
        assert!(err.to_string().contains("must be a JSON array"));
    }
}
