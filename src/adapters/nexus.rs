//! Sonatype Nexus Repository Manager adapter.
//!
//! Env: `NEXUS_URL`, `NEXUS_USERNAME` (default `admin`), `NEXUS_PASSWORD`.
//!
//! Nexus has moved endpoints between `v1`, `beta` and `security/` across
//! releases. Every request that fails with a 4xx/5xx is retried against
//! those older locations before the first error is reported.

use async_trait::async_trait;
use reqwest::Method;
use serde_json::{json, Map, Value};

use super::{no_args, tool, Adapter};
use crate::args;
use crate::config;
use crate::error::{AdapterError, Result};
use crate::http::{first_success, pretty, Auth, RestClient};

const V1: &str = "/service/rest/v1";

pub struct Nexus {
    client: RestClient,
}

impl Nexus {
    pub fn from_env() -> Result<Self> {
        let url = config::required("NEXUS_URL")?;
        let client = RestClient::builder("Nexus", url)
            .auth(Auth::Basic {
                username: config::with_default("NEXUS_USERNAME", "admin"),
                password: config::optional("NEXUS_PASSWORD"),
            })
            .timeout(config::http_timeout())
            .build()?;
        Ok(Self::new(client))
    }

    pub fn new(client: RestClient) -> Self {
        Self { client }
    }

    /// One request against an absolute path, no fallback.
    async fn send_once(
        &self,
        method: Method,
        path: &str,
        query: &[(&str, &str)],
        body: Option<&Value>,
    ) -> Result<Value> {
        let mut call = self.client.request(method, path);
        for (k, v) in query {
            call = call.query(k, v);
        }
        if let Some(body) = body {
            call = call.json(body.clone());
        }
        let reply = call.send().await?;
        if reply.status_code() == 204 || reply.bytes().is_empty() {
            return Ok(json!({ "message": "Operation successful" }));
        }
        Ok(reply.json().unwrap_or_else(|_| {
            json!({ "message": format!("Operation successful. Status code: {}", reply.status_code()) })
        }))
    }

    /// Request `endpoint` under v1, retrying older API locations on failure.
    async fn request(
        &self,
        method: Method,
        endpoint: &str,
        query: &[(&str, &str)],
        body: Option<&Value>,
    ) -> Result<Value> {
        let primary = format!("{}/{}", V1, endpoint);
        let err = match self.send_once(method.clone(), &primary, query, body).await {
            Ok(v) => return Ok(v),
            Err(e) if e.http_status().is_some() => e,
            Err(e) => return Err(e),
        };

        let alternates = fallback_paths(endpoint);
        let attempts: Vec<_> = alternates
            .iter()
            .map(|path| self.send_once(method.clone(), path, query, body))
            .collect();
        first_success(attempts).await.map_err(|_| err)
    }

    /// First of several endpoints that answers, without the generic fallback.
    async fn request_any(
        &self,
        method: Method,
        endpoints: &[&str],
        body: Option<&Value>,
    ) -> Result<Value> {
        let paths: Vec<String> = endpoints.iter().map(|e| format!("{}/{}", V1, e)).collect();
        let attempts: Vec<_> = paths
            .iter()
            .map(|p| self.send_once(method.clone(), p, &[], body))
            .collect();
        first_success(attempts).await
    }

    async fn get(&self, endpoint: &str) -> Result<String> {
        Ok(pretty(&self.request(Method::GET, endpoint, &[], None).await?))
    }

    async fn create_repository(&self, args: &Value) -> Result<String> {
        let repo_type = args::str(args, "repository_type")?;
        let format = args::str(args, "format")?;
        let body = repository_body(args)?;
        let result = self
            .request(
                Method::POST,
                &format!("repositories/{}/{}", format, repo_type),
                &[],
                Some(&body),
            )
            .await?;
        Ok(pretty(&result))
    }

    async fn update_repository(&self, args: &Value) -> Result<String> {
        let repo_type = args::str(args, "repository_type")?;
        let format = args::str(args, "format")?;
        let name = args::str(args, "name")?;
        let mut data = args::object(args, "repository_data")?;

        data.entry("name").or_insert_with(|| json!(name));
        data.entry("online").or_insert(json!(true));
        let storage = data
            .entry("storage")
            .or_insert_with(|| json!({}))
            .as_object_mut()
            .ok_or_else(|| AdapterError::invalid("repository_data.storage must be an object"))?;
        storage.entry("blobStoreName").or_insert(json!("default"));
        storage.entry("strictContentTypeValidation").or_insert(json!(true));
        if repo_type == "hosted" {
            storage.entry("writePolicy").or_insert(json!("ALLOW"));
        }

        let result = self
            .request(
                Method::PUT,
                &format!("repositories/{}/{}/{}", format, repo_type, name),
                &[],
                Some(&Value::Object(data)),
            )
            .await?;
        Ok(pretty(&result))
    }

    async fn delete_repository(&self, args: &Value) -> Result<String> {
        let name = args::str(args, "name")?;
        let result = self
            .request(Method::DELETE, &format!("repositories/{}", name), &[], None)
            .await?;
        Ok(pretty(&result))
    }

    async fn create_user(&self, args: &Value) -> Result<String> {
        let body = json!({
            "userId": args::str(args, "user_id")?,
            "firstName": args::str(args, "first_name")?,
            "lastName": args::str(args, "last_name")?,
            "emailAddress": args::str(args, "email_address")?,
            "password": args::str(args, "password")?,
            "status": args::str_or(args, "status", "active"),
            "roles": args::string_list(args, "roles").unwrap_or_default(),
        });
        Ok(pretty(&self.request(Method::POST, "users", &[], Some(&body)).await?))
    }

    async fn update_user(&self, args: &Value) -> Result<String> {
        let user_id = args::str(args, "user_id")?;
        let mut data = args::object(args, "user_data")?;
        data.insert("userId".to_string(), json!(user_id));
        data.entry("source").or_insert(json!("default"));
        let result = self
            .request(
                Method::PUT,
                &format!("users/{}", user_id),
                &[],
                Some(&Value::Object(data)),
            )
            .await?;
        Ok(pretty(&result))
    }

    async fn delete_user(&self, args: &Value) -> Result<String> {
        let user_id = args::str(args, "user_id")?;
        let result = self
            .request(Method::DELETE, &format!("users/{}", user_id), &[], None)
            .await?;
        Ok(pretty(&result))
    }

    async fn create_role(&self, args: &Value) -> Result<String> {
        let body = json!({
            "id": args::str(args, "id")?,
            "name": args::str(args, "name")?,
            "description": args::str_or(args, "description", ""),
            "privileges": args::string_list(args, "privileges").unwrap_or_default(),
            "roles": args::string_list(args, "roles").unwrap_or_default(),
        });
        Ok(pretty(&self.request(Method::POST, "roles", &[], Some(&body)).await?))
    }

    async fn search_components(&self, args: &Value) -> Result<String> {
        let mut query: Vec<(&str, &str)> = Vec::new();
        for key in ["repository", "keyword", "format"] {
            if let Some(v) = args::opt_str(args, key) {
                query.push((key, v));
            }
        }
        let paths = [format!("{}/search", V1), format!("{}/search/assets", V1)];
        let attempts: Vec<_> = paths
            .iter()
            .map(|p| self.send_once(Method::GET, p, &query, None))
            .collect();
        let result = first_success(attempts).await?;
        Ok(pretty(&result))
    }

    async fn upload_component(&self, args: &Value) -> Result<String> {
        let repository = args::str(args, "repository")?;
        let format = args::str(args, "format")?;
        let mut data = args::object(args, "component_data")?;
        data.entry("format").or_insert_with(|| json!(format));
        let result = self
            .request(
                Method::POST,
                "components",
                &[("repository", repository)],
                Some(&Value::Object(data)),
            )
            .await?;
        Ok(pretty(&result))
    }

    async fn create_ldap_server(&self, args: &Value) -> Result<String> {
        let mut body = json!({
            "name": args::str(args, "name")?,
            "protocol": args::str(args, "protocol")?,
            "host": args::str(args, "host")?,
            "port": args::opt_u64(args, "port").ok_or_else(|| AdapterError::invalid("Missing required argument: port"))?,
            "searchBase": args::str(args, "search_base")?,
            "authScheme": args::str_or(args, "auth_scheme", "SIMPLE"),
            "connectionTimeoutSeconds": 30,
            "connectionRetryDelaySeconds": 300,
            "maxIncidentsCount": 3,
        });
        if let Some(user) = args::opt_str(args, "auth_username") {
            body["authUsername"] = json!(user);
        }
        if let Some(password) = args::opt_str(args, "auth_password") {
            body["authPassword"] = json!(password);
        }
        Ok(pretty(&self.request(Method::POST, "security/ldap", &[], Some(&body)).await?))
    }

    async fn create_content_selector(&self, args: &Value) -> Result<String> {
        let body = json!({
            "name": args::str(args, "name")?,
            "description": args::str_or(args, "description", ""),
            "expression": args::str(args, "expression")?,
        });
        let result = self
            .request(Method::POST, "security/content-selectors", &[], Some(&body))
            .await?;
        Ok(pretty(&result))
    }

    async fn list_webhooks(&self) -> Result<String> {
        let endpoints = ["webhooks", "security/webhooks", "events/webhooks"];
        match self.request_any(Method::GET, &endpoints, None).await {
            Ok(result) => Ok(pretty(&result)),
            Err(e) => {
                tracing::debug!(error = %e, "no webhook endpoint answered");
                Ok(pretty(&json!({
                    "webhooks": [],
                    "message": "No webhooks found or the webhook API is not available on this Nexus version",
                })))
            }
        }
    }

    async fn create_webhook(&self, args: &Value) -> Result<String> {
        let mut body = Map::new();
        body.insert("name".into(), json!(args::str(args, "name")?));
        body.insert("url".into(), json!(args::str(args, "url")?));
        body.insert("eventTypes".into(), json!([args::str(args, "webhook_type")?]));
        if let Some(secret) = args::opt_str(args, "secret") {
            body.insert("secret".into(), json!(secret));
        }
        if let Some(extra) = args::opt_object(args, "webhook_config")? {
            body.extend(extra);
        }
        let endpoints = ["webhooks", "security/webhooks", "events/webhooks"];
        let result = self
            .request_any(Method::POST, &endpoints, Some(&Value::Object(body)))
            .await?;
        Ok(pretty(&result))
    }

    async fn update_firewall_config(&self, args: &Value) -> Result<String> {
        let mut body = json!({
            "enabled": args::opt_bool(args, "enabled").ok_or_else(|| AdapterError::invalid("Missing required argument: enabled"))?,
            "url": args::str(args, "url")?,
            "authenticationType": args::str(args, "authentication_type")?,
        });
        if let Some(user) = args::opt_str(args, "username") {
            body["username"] = json!(user);
        }
        if let Some(password) = args::opt_str(args, "password") {
            body["password"] = json!(password);
        }
        Ok(pretty(&self.request(Method::PUT, "iq", &[], Some(&body)).await?))
    }
}

/// Older API locations for a v1 endpoint, in the order they are tried.
fn fallback_paths(endpoint: &str) -> Vec<String> {
    let mut paths = Vec::with_capacity(4);
    if !endpoint.starts_with("security/") {
        paths.push(format!("{}/security/{}", V1, endpoint));
    }
    paths.push(format!("/service/rest/beta/{}", endpoint));
    paths.push(format!("/service/rest/v1/beta/{}", endpoint));
    paths.push(format!("/service/local/{}", endpoint));
    paths
}

/// Repository definition shaped by type (hosted, proxy, group) and format.
fn repository_body(args: &Value) -> Result<Value> {
    let repo_type = args::str(args, "repository_type")?;
    let format = args::str(args, "format")?;
    let name = args::str(args, "name")?;

    let mut storage = json!({
        "blobStoreName": args::str_or(args, "blob_store", "default"),
        "strictContentTypeValidation": true,
    });

    let mut body = json!({
        "name": name,
        "online": args::bool_or(args, "online", true),
    });

    match repo_type {
        "hosted" => {
            storage["writePolicy"] = json!(args::str_or(args, "write_policy", "ALLOW"));
        }
        "proxy" => {
            let remote_url = args::opt_str(args, "remote_url").ok_or_else(|| {
                AdapterError::invalid("remote_url is required for proxy repositories")
            })?;
            body["proxy"] = json!({
                "remoteUrl": remote_url,
                "contentMaxAge": -1,
                "metadataMaxAge": 1440,
            });
            body["negativeCache"] = json!({ "enabled": true, "timeToLive": 1440 });
            body["httpClient"] = json!({ "blocked": false, "autoBlock": true });
        }
        "group" => {
            body["group"] = json!({
                "memberNames": args::string_list(args, "member_names").unwrap_or_default(),
            });
        }
        other => {
            return Err(AdapterError::invalid(format!(
                "Invalid repository_type '{}': expected hosted, proxy or group",
                other
            )));
        }
    }
    body["storage"] = storage;

    match format {
        "maven2" => {
            body["maven"] = json!({ "versionPolicy": "MIXED", "layoutPolicy": "STRICT" });
        }
        "docker" => {
            body["docker"] = json!({ "v1Enabled": false, "forceBasicAuth": true });
        }
        _ => {}
    }

    Ok(body)
}

#[async_trait]
impl Adapter for Nexus {
    fn name(&self) -> &'static str {
        "nexus"
    }

    fn instructions(&self) -> &'static str {
        "Sonatype Nexus: manage repositories, users, roles, LDAP, content selectors and webhooks, and search components."
    }

    fn tools(&self) -> Vec<Value> {
        let name_only = |key: &str| {
            json!({
                "type": "object",
                "properties": { key: { "type": "string" } },
                "required": [key]
            })
        };

        vec![
            tool("get_all_repositories", "List all repositories.", no_args()),
            tool("create_repository", "Create a hosted, proxy or group repository.", json!({
                "type": "object",
                "properties": {
                    "repository_type": { "type": "string", "enum": ["hosted", "proxy", "group"] },
                    "format": { "type": "string", "description": "maven2, npm, docker, raw, pypi, ..." },
                    "name": { "type": "string" },
                    "blob_store": { "type": "string", "default": "default" },
                    "online": { "type": "boolean", "default": true },
                    "write_policy": { "type": "string", "enum": ["ALLOW", "ALLOW_ONCE", "DENY"], "default": "ALLOW" },
                    "remote_url": { "type": "string", "description": "Upstream URL, required for proxy repositories" },
                    "member_names": { "type": "array", "items": { "type": "string" }, "description": "Members of a group repository" }
                },
                "required": ["repository_type", "format", "name"]
            })),
            tool("update_repository", "Update a repository's configuration.", json!({
                "type": "object",
                "properties": {
                    "repository_type": { "type": "string" },
                    "format": { "type": "string" },
                    "name": { "type": "string" },
                    "repository_data": { "type": "object", "description": "Repository definition (JSON object or string)" }
                },
                "required": ["repository_type", "format", "name", "repository_data"]
            })),
            tool("delete_repository", "Delete a repository.", name_only("name")),
            tool("get_all_users", "List all users.", no_args()),
            tool("create_user", "Create a local user.", json!({
                "type": "object",
                "properties": {
                    "user_id": { "type": "string" },
                    "first_name": { "type": "string" },
                    "last_name": { "type": "string" },
                    "email_address": { "type": "string" },
                    "password": { "type": "string" },
                    "status": { "type": "string", "enum": ["active", "disabled"], "default": "active" },
                    "roles": { "type": "array", "items": { "type": "string" } }
                },
                "required": ["user_id", "first_name", "last_name", "email_address", "password", "roles"]
            })),
            tool("update_user", "Update a user.", json!({
                "type": "object",
                "properties": {
                    "user_id": { "type": "string" },
                    "user_data": { "type": "object", "description": "Fields to set, e.g. firstName, emailAddress, roles" }
                },
                "required": ["user_id", "user_data"]
            })),
            tool("delete_user", "Delete a user.", name_only("user_id")),
            tool("list_roles", "List roles.", no_args()),
            tool("create_role", "Create a role.", json!({
                "type": "object",
                "properties": {
                    "id": { "type": "string" },
                    "name": { "type": "string" },
                    "description": { "type": "string" },
                    "privileges": { "type": "array", "items": { "type": "string" } },
                    "roles": { "type": "array", "items": { "type": "string" } }
                },
                "required": ["id", "name"]
            })),
            tool("list_privileges", "List privileges.", no_args()),
            tool("search_components", "Search components by repository, keyword or format.", json!({
                "type": "object",
                "properties": {
                    "repository": { "type": "string" },
                    "keyword": { "type": "string" },
                    "format": { "type": "string" }
                }
            })),
            tool("upload_component", "Upload a component to a repository.", json!({
                "type": "object",
                "properties": {
                    "repository": { "type": "string" },
                    "format": { "type": "string" },
                    "component_data": { "type": "object" }
                },
                "required": ["repository", "format", "component_data"]
            })),
            tool("list_ldap_servers", "List LDAP server connections.", no_args()),
            tool("create_ldap_server", "Create an LDAP server connection.", json!({
                "type": "object",
                "properties": {
                    "name": { "type": "string" },
                    "protocol": { "type": "string", "enum": ["LDAP", "LDAPS"] },
                    "host": { "type": "string" },
                    "port": { "type": "integer" },
                    "search_base": { "type": "string" },
                    "auth_scheme": { "type": "string", "default": "SIMPLE" },
                    "auth_username": { "type": "string" },
                    "auth_password": { "type": "string" }
                },
                "required": ["name", "protocol", "host", "port", "search_base"]
            })),
            tool("list_content_selectors", "List content selectors.", no_args()),
            tool("create_content_selector", "Create a content selector from a CSEL expression.", json!({
                "type": "object",
                "properties": {
                    "name": { "type": "string" },
                    "description": { "type": "string" },
                    "expression": { "type": "string", "description": "e.g. format == \"maven2\" and path =^ \"/org/\"" }
                },
                "required": ["name", "expression"]
            })),
            tool("list_webhooks", "List webhooks.", no_args()),
            tool("create_webhook", "Create a webhook.", json!({
                "type": "object",
                "properties": {
                    "name": { "type": "string" },
                    "url": { "type": "string" },
                    "webhook_type": { "type": "string", "description": "Event type, e.g. repository or component" },
                    "secret": { "type": "string" },
                    "webhook_config": { "type": "object", "description": "Extra fields merged into the webhook" }
                },
                "required": ["name", "url", "webhook_type"]
            })),
            tool("get_firewall_config", "Get the repository firewall (IQ server) configuration.", no_args()),
            tool("update_firewall_config", "Update the repository firewall (IQ server) configuration.", json!({
                "type": "object",
                "properties": {
                    "enabled": { "type": "boolean" },
                    "url": { "type": "string" },
                    "authentication_type": { "type": "string", "enum": ["USER", "PKI"] },
                    "username": { "type": "string" },
                    "password": { "type": "string" }
                },
                "required": ["enabled", "url", "authentication_type"]
            })),
        ]
    }

    async fn call_tool(&self, name: &str, args: &Value) -> Result<String> {
        match name {
            "get_all_repositories" => self.get("repositories").await,
            "create_repository" => self.create_repository(args).await,
            "update_repository" => self.update_repository(args).await,
            "delete_repository" => self.delete_repository(args).await,
            "get_all_users" => self.get("users").await,
            "create_user" => self.create_user(args).await,
            "update_user" => self.update_user(args).await,
            "delete_user" => self.delete_user(args).await,
            "list_roles" => self.get("roles").await,
            "create_role" => self.create_role(args).await,
            "list_privileges" => self.get("privileges").await,
            "search_components" => self.search_components(args).await,
            "upload_component" => self.upload_component(args).await,
            "list_ldap_servers" => self.get("security/ldap").await,
            "create_ldap_server" => self.create_ldap_server(args).await,
            "list_content_selectors" => self.get("security/content-selectors").await,
            "create_content_selector" => self.create_content_selector(args).await,
            "list_webhooks" => self.list_webhooks().await,
            "create_webhook" => self.create_webhook(args).await,
            "get_firewall_config" => self.get("iq").await,
            "update_firewall_config" => self.update_firewall_config(args).await,
            _ => Err(AdapterError::UnknownTool(name.to_string())),
        }
    }
}
