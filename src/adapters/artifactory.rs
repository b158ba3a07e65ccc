//! JFrog Artifactory adapter.
//!
//! Env: `JFROG_URL` (required), then one of `JFROG_ACCESS_TOKEN` (Bearer),
//! `JFROG_API_KEY` or `JFROG_USERNAME`/`JFROG_PASSWORD`.
//!
//! Older and newer Artifactory deployments disagree on whether system
//! endpoints live under `/artifactory/api` or `/api`, so health and version
//! try a short list of paths in order.

use async_trait::async_trait;
use serde_json::{json, Value};

use super::{no_args, tool, Adapter};
use crate::args;
use crate::config;
use crate::error::{AdapterError, Result, ResultExt};
use crate::http::{first_success, pretty, Auth, Call, Payload, RestClient};

const HEALTH_PATHS: &[&str] = &[
    "/artifactory/api/system/ping",
    "/api/system/ping",
    "/artifactory/api/v1/system/ping",
    "/api/v1/system/ping",
];

const VERSION_PATHS: &[&str] = &[
    "/artifactory/api/system/version",
    "/api/system/version",
    "/artifactory/api/v1/system/version",
];

pub struct Artifactory {
    client: RestClient,
}

impl Artifactory {
    pub fn from_env() -> Result<Self> {
        let url = config::required("JFROG_URL")?;
        let auth = if let Some(token) = config::optional("JFROG_ACCESS_TOKEN") {
            Auth::Bearer(token)
        } else if let Some(key) = config::optional("JFROG_API_KEY") {
            Auth::Headers(vec![("X-JFrog-Art-Api".to_string(), key)])
        } else if let Some(username) = config::optional("JFROG_USERNAME") {
            Auth::Basic {
                username,
                password: config::optional("JFROG_PASSWORD"),
            }
        } else {
            tracing::warn!("no Artifactory credentials set; requests will be anonymous");
            Auth::None
        };
        let client = RestClient::builder("Artifactory", url)
            .auth(auth)
            .timeout(config::http_timeout())
            .build()?;
        Ok(Self::new(client))
    }

    pub fn new(client: RestClient) -> Self {
        Self { client }
    }

    /// Send and normalise the body: empty means success, text is wrapped.
    async fn send(&self, call: Call<'_>) -> Result<Value> {
        let reply = call.send().await?;
        Ok(match reply.payload() {
            Payload::Empty => json!({ "status": "success" }),
            Payload::Json(v) => v,
            Payload::Text(text) => json!({ "content": text }),
        })
    }

    // ── Artifacts ───────────────────────────────────────────────────────────

    async fn deploy_artifact(&self, args: &Value) -> Result<String> {
        let repo = args::str(args, "repo_key")?;
        let item_path = args::str(args, "item_path")?;
        let file_path = args::str(args, "file_path")?;

        let data = match tokio::fs::read(file_path).await {
            Ok(data) => data,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                return Err(AdapterError::invalid(format!("File {} not found", file_path)));
            }
            Err(e) => return Err(e.into()),
        };

        let call = self
            .client
            .put(format!("/artifactory/{}/{}", repo, item_path))
            .bytes("application/octet-stream", data);
        self.send(call).await.context("Failed to deploy artifact")?;
        Ok(format!("Successfully deployed artifact to {}/{}", repo, item_path))
    }

    async fn get_artifact_info(&self, args: &Value) -> Result<String> {
        let repo = args::str(args, "repo_key")?;
        let item_path = args::str(args, "item_path")?;
        let info = self
            .send(self.client.get(format!("/artifactory/api/storage/{}/{}", repo, item_path)))
            .await
            .context("Failed to get artifact info")?;
        Ok(pretty(&info))
    }

    async fn delete_artifact(&self, args: &Value) -> Result<String> {
        let repo = args::str(args, "repo_key")?;
        let item_path = args::str(args, "item_path")?;
        self.send(self.client.delete(format!("/artifactory/{}/{}", repo, item_path)))
            .await
            .context("Failed to delete artifact")?;
        Ok(format!("Successfully deleted artifact {}/{}", repo, item_path))
    }

    async fn search_artifacts(&self, args: &Value) -> Result<String> {
        let call = self
            .client
            .get("/artifactory/api/search/artifact")
            .query_opt("name", args::opt_str(args, "name"))
            .query_opt("repos", args::opt_str(args, "repos"))
            .query_opt("properties", args::opt_str(args, "properties"));
        let result = self.send(call).await.context("Failed to search artifacts")?;
        Ok(pretty(&result))
    }

    async fn advanced_search(&self, args: &Value) -> Result<String> {
        let query = args::str(args, "query")?;
        let call = self
            .client
            .post("/artifactory/api/search/aql")
            .text("text/plain", query);
        let result = self.send(call).await.context("Failed to execute AQL search")?;
        Ok(pretty(&result))
    }

    // ── Repositories ────────────────────────────────────────────────────────

    async fn create_repository(&self, args: &Value) -> Result<String> {
        let key = args::str(args, "repo_key")?;
        let repo_type = args::str(args, "repo_type")?;
        let package_type = args::str(args, "package_type")?;
        let body = json!({ "key": key, "rclass": repo_type, "packageType": package_type });
        self.send(self.client.put(format!("/artifactory/api/repositories/{}", key)).json(body))
            .await
            .context("Failed to create repository")?;
        Ok(format!(
            "Successfully created {} repository {} for {} packages",
            repo_type, key, package_type
        ))
    }

    async fn get_repository(&self, args: &Value) -> Result<String> {
        let key = args::str(args, "repo_key")?;
        let repo = self
            .send(self.client.get(format!("/artifactory/api/repositories/{}", key)))
            .await
            .context("Failed to get repository info")?;
        Ok(pretty(&repo))
    }

    async fn list_repositories(&self, args: &Value) -> Result<String> {
        let call = self
            .client
            .get("/artifactory/api/repositories")
            .query_opt("type", args::opt_str(args, "repo_type"));
        let repos = self.send(call).await.context("Failed to list repositories")?;
        Ok(pretty(&repos))
    }

    async fn delete_repository(&self, args: &Value) -> Result<String> {
        let key = args::str(args, "repo_key")?;
        self.send(self.client.delete(format!("/artifactory/api/repositories/{}", key)))
            .await
            .context("Failed to delete repository")?;
        Ok(format!("Successfully deleted repository {}", key))
    }

    async fn create_federated_repository(&self, args: &Value) -> Result<String> {
        let key = args::str(args, "repo_key")?;
        let package_type = args::str(args, "package_type")?;
        let body = json!({ "key": key, "rclass": "federated", "packageType": package_type });
        self.send(self.client.put(format!("/artifactory/api/repositories/{}", key)).json(body))
            .await
            .context("Failed to create federated repository")?;
        Ok(format!(
            "Successfully created federated repository {} for {} packages",
            key, package_type
        ))
    }

    async fn setup_repository_replication(&self, args: &Value) -> Result<String> {
        let key = args::str(args, "repo_key")?;
        let body = json!({
            "url": args::str(args, "target_url")?,
            "username": args::str(args, "username")?,
            "password": args::str(args, "password")?,
        });
        self.send(self.client.post(format!("/artifactory/api/replications/{}", key)).json(body))
            .await
            .context("Failed to setup repository replication")?;
        Ok(format!("Successfully set up replication for repository {}", key))
    }

    // ── Users ───────────────────────────────────────────────────────────────

    async fn create_user(&self, args: &Value) -> Result<String> {
        let username = args::str(args, "username")?;
        let body = json!({
            "name": username,
            "email": args::str(args, "email")?,
            "password": args::str(args, "password")?,
            "admin": args::bool_or(args, "admin", false),
        });
        self.send(self.client.put(user_path(username)).json(body))
            .await
            .context("Failed to create user")?;
        Ok(format!("Successfully created user {}", username))
    }

    async fn get_user(&self, args: &Value) -> Result<String> {
        let username = args::str(args, "username")?;
        let user = self
            .send(self.client.get(user_path(username)))
            .await
            .context("Failed to get user info")?;
        Ok(pretty(&user))
    }

    async fn list_users(&self) -> Result<String> {
        let users = self
            .send(self.client.get("/artifactory/api/security/users"))
            .await
            .context("Failed to list users")?;
        Ok(pretty(&users))
    }

    /// Read-modify-write: unchanged fields are carried over from the current user.
    async fn update_user(&self, args: &Value) -> Result<String> {
        let username = args::str(args, "username")?;
        let current = self
            .send(self.client.get(user_path(username)))
            .await
            .context("Failed to get current user info")?;

        let email = args::opt_str(args, "email")
            .map(str::to_string)
            .or_else(|| current["email"].as_str().map(str::to_string))
            .unwrap_or_default();
        let admin = args::opt_bool(args, "admin")
            .or_else(|| current["admin"].as_bool())
            .unwrap_or(false);

        let mut body = json!({ "name": username, "email": email, "admin": admin });
        if let Some(password) = args::opt_str(args, "password") {
            body["password"] = json!(password);
        }

        self.send(self.client.post(user_path(username)).json(body))
            .await
            .context("Failed to update user")?;
        Ok(format!("Successfully updated user {}", username))
    }

    async fn delete_user(&self, args: &Value) -> Result<String> {
        let username = args::str(args, "username")?;
        self.send(self.client.delete(user_path(username)))
            .await
            .context("Failed to delete user")?;
        Ok(format!("Successfully deleted user {}", username))
    }

    // ── System ──────────────────────────────────────────────────────────────

    async fn get_system_info(&self) -> Result<String> {
        match self.send(self.client.get("/artifactory/api/system")).await {
            Ok(info) => Ok(pretty(&info)),
            Err(e) => {
                if self.client.get(HEALTH_PATHS[0]).send().await.is_ok() {
                    return Ok("System is responsive, but detailed system info is not available.".to_string());
                }
                Err(e).context("Failed to get system info")
            }
        }
    }

    async fn get_system_health(&self) -> Result<String> {
        let pings: Vec<_> = HEALTH_PATHS.iter().map(|p| self.client.get(*p).send()).collect();
        let reply = first_success(pings)
            .await
            .context("Failed to check system health: all health check endpoints failed")?;
        Ok(pretty(&json!({
            "status": "healthy",
            "message": reply.text().trim(),
        })))
    }

    async fn get_system_configuration(&self) -> Result<String> {
        let config = self
            .send(self.client.get("/artifactory/api/system/configuration"))
            .await
            .context("Failed to get system configuration")?;
        Ok(pretty(&config))
    }

    async fn get_storage_info(&self) -> Result<String> {
        let info = self
            .send(self.client.get("/artifactory/api/storageinfo"))
            .await
            .context("Failed to get storage info")?;
        Ok(pretty(&info))
    }

    async fn get_version(&self) -> Result<String> {
        let attempts: Vec<_> = VERSION_PATHS.iter().map(|p| self.send(self.client.get(*p))).collect();
        let version = first_success(attempts)
            .await
            .context("Failed to get version info: all version endpoints failed")?;
        Ok(pretty(&version))
    }

    // ── Builds, webhooks, permissions ───────────────────────────────────────

    async fn integrate_build(&self, args: &Value) -> Result<String> {
        let name = args::str(args, "build_name")?;
        let number = args::id(args, "build_number")?;
        let body = json!({ "buildName": name, "buildNumber": number });
        self.send(self.client.post("/artifactory/api/build").json(body))
            .await
            .context("Failed to integrate build")?;
        Ok(format!("Successfully integrated build {} #{}", name, number))
    }

    async fn create_webhook(&self, args: &Value) -> Result<String> {
        let name = args::str(args, "name")?;
        let body = json!({
            "name": name,
            "url": args::str(args, "url")?,
            "events": args::string_list(args, "events").unwrap_or_default(),
        });
        self.send(self.client.post("/artifactory/api/webhooks").json(body))
            .await
            .context("Failed to create webhook")?;
        Ok(format!("Successfully created webhook {}", name))
    }

    async fn manage_permissions(&self, args: &Value) -> Result<String> {
        let name = args::str(args, "name")?;
        let body = json!({
            "name": name,
            "repositories": args::string_list(args, "repositories").unwrap_or_default(),
            "principals": args::string_list(args, "principals").unwrap_or_default(),
        });
        self.send(self.client.post("/artifactory/api/security/permissions").json(body))
            .await
            .context("Failed to manage permissions")?;
        Ok(format!("Successfully set up permissions {}", name))
    }
}

fn user_path(username: &str) -> String {
    format!("/artifactory/api/security/users/{}", username)
}

#[async_trait]
impl Adapter for Artifactory {
    fn name(&self) -> &'static str {
        "artifactory"
    }

    fn instructions(&self) -> &'static str {
        "JFrog Artifactory: deploy and inspect artifacts, manage repositories, users, webhooks and permissions, and check system health."
    }

    fn tools(&self) -> Vec<Value> {
        let repo_item = json!({
            "type": "object",
            "properties": {
                "repo_key": { "type": "string", "description": "Repository key" },
                "item_path": { "type": "string", "description": "Path of the artifact inside the repository" }
            },
            "required": ["repo_key", "item_path"]
        });
        let repo_key = json!({
            "type": "object",
            "properties": { "repo_key": { "type": "string", "description": "Repository key" } },
            "required": ["repo_key"]
        });
        let username = json!({
            "type": "object",
            "properties": { "username": { "type": "string" } },
            "required": ["username"]
        });

        vec![
            tool("deploy_artifact", "Upload a local file to a repository path.", json!({
                "type": "object",
                "properties": {
                    "repo_key": { "type": "string", "description": "Target repository key" },
                    "item_path": { "type": "string", "description": "Path inside the repository" },
                    "file_path": { "type": "string", "description": "Local file to upload" }
                },
                "required": ["repo_key", "item_path", "file_path"]
            })),
            tool("get_artifact_info", "Get storage information (size, checksums, dates) for an artifact.", repo_item.clone()),
            tool("delete_artifact", "Delete an artifact.", repo_item),
            tool("search_artifacts", "Quick search for artifacts by name, optionally limited to repositories.", json!({
                "type": "object",
                "properties": {
                    "name": { "type": "string", "description": "Name pattern, wildcards allowed" },
                    "repos": { "type": "string", "description": "Comma-separated repository keys" },
                    "properties": { "type": "string", "description": "key1=value1;key2=value2" }
                }
            })),
            tool("advanced_search", "Run an Artifactory Query Language (AQL) search.", json!({
                "type": "object",
                "properties": { "query": { "type": "string", "description": "AQL, e.g. items.find({\"repo\":\"libs-release\"})" } },
                "required": ["query"]
            })),
            tool("create_repository", "Create a repository.", json!({
                "type": "object",
                "properties": {
                    "repo_key": { "type": "string" },
                    "repo_type": { "type": "string", "enum": ["local", "remote", "virtual"] },
                    "package_type": { "type": "string", "description": "maven, npm, docker, generic, ..." }
                },
                "required": ["repo_key", "repo_type", "package_type"]
            })),
            tool("get_repository", "Get a repository's configuration.", repo_key.clone()),
            tool("list_repositories", "List repositories, optionally filtered by type.", json!({
                "type": "object",
                "properties": { "repo_type": { "type": "string", "enum": ["local", "remote", "virtual", "federated", "distribution"] } }
            })),
            tool("delete_repository", "Delete a repository and everything in it.", repo_key),
            tool("create_federated_repository", "Create a federated repository.", json!({
                "type": "object",
                "properties": {
                    "repo_key": { "type": "string" },
                    "package_type": { "type": "string" }
                },
                "required": ["repo_key", "package_type"]
            })),
            tool("setup_repository_replication", "Configure push replication from a repository to a remote URL.", json!({
                "type": "object",
                "properties": {
                    "repo_key": { "type": "string", "description": "Source repository key" },
                    "target_url": { "type": "string" },
                    "username": { "type": "string" },
                    "password": { "type": "string" }
                },
                "required": ["repo_key", "target_url", "username", "password"]
            })),
            tool("create_user", "Create a user.", json!({
                "type": "object",
                "properties": {
                    "username": { "type": "string" },
                    "email": { "type": "string" },
                    "password": { "type": "string" },
                    "admin": { "type": "boolean" }
                },
                "required": ["username", "email", "password"]
            })),
            tool("get_user", "Get a user's details.", username.clone()),
            tool("list_users", "List all users.", no_args()),
            tool("update_user", "Update a user's email, password or admin flag. Omitted fields keep their value.", json!({
                "type": "object",
                "properties": {
                    "username": { "type": "string" },
                    "email": { "type": "string" },
                    "password": { "type": "string" },
                    "admin": { "type": "boolean" }
                },
                "required": ["username"]
            })),
            tool("delete_user", "Delete a user.", username),
            tool("get_system_info", "Get general system information.", no_args()),
            tool("get_system_health", "Ping the instance to check it is healthy.", no_args()),
            tool("get_system_configuration", "Get the system configuration (admin only).", no_args()),
            tool("get_storage_info", "Get storage summary and per-repository usage.", no_args()),
            tool("get_version", "Get the Artifactory version and addons.", no_args()),
            tool("integrate_build", "Record build metadata for a build name and number.", json!({
                "type": "object",
                "properties": {
                    "build_name": { "type": "string" },
                    "build_number": { "type": "string" }
                },
                "required": ["build_name", "build_number"]
            })),
            tool("create_webhook", "Create a webhook notified on the given events.", json!({
                "type": "object",
                "properties": {
                    "name": { "type": "string" },
                    "url": { "type": "string" },
                    "events": { "type": "array", "items": { "type": "string" } }
                },
                "required": ["name", "url", "events"]
            })),
            tool("manage_permissions", "Create a permission target over repositories for principals.", json!({
                "type": "object",
                "properties": {
                    "name": { "type": "string" },
                    "repositories": { "type": "array", "items": { "type": "string" } },
                    "principals": { "type": "array", "items": { "type": "string" } }
                },
                "required": ["name", "repositories", "principals"]
            })),
        ]
    }

    async fn call_tool(&self, name: &str, args: &Value) -> Result<String> {
        match name {
            "deploy_artifact" => self.deploy_artifact(args).await,
            "get_artifact_info" => self.get_artifact_info(args).await,
            "delete_artifact" => self.delete_artifact(args).await,
            "search_artifacts" => self.search_artifacts(args).await,
            "advanced_search" => self.advanced_search(args).await,
            "create_repository" => self.create_repository(args).await,
            "get_repository" => self.get_repository(args).await,
            "list_repositories" => self.list_repositories(args).await,
            "delete_repository" => self.delete_repository(args).await,
            "create_federated_repository" => self.create_federated_repository(args).await,
            "setup_repository_replication" => self.setup_repository_replication(args).await,
            "create_user" => self.create_user(args).await,
            "get_user" => self.get_user(args).await,
            "list_users" => self.list_users().await,
            "update_user" => self.update_user(args).await,
            "delete_user" => self.delete_user(args).await,
            "get_system_info" => self.get_system_info().await,
            "get_system_health" => self.get_system_health().await,
            "get_system_configuration" => self.get_system_configuration().await,
            "get_storage_info" => self.get_storage_info().await,
            "get_version" => self.get_version().await,
            "integrate_build" => self.integrate_build(args).await,
            "create_webhook" => self.create_webhook(args).await,
            "manage_permissions" => self.manage_permissions(args).await,
            _ => Err(AdapterError::UnknownTool(name.to_string())),
        }
    }
}
