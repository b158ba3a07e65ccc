//! Argo CD adapter.
//!
//! Env: `ARGOCD_URL`, then either `ARGOCD_TOKEN` or `ARGOCD_USERNAME` +
//! `ARGOCD_PASSWORD`. `ARGOCD_VERIFY_SSL` defaults to false.
//!
//! With a username and password the adapter logs in on first use through
//! `POST /api/v1/session` and reuses the session token. A 401 on a later
//! call means the token expired: it logs in again and retries once.

use async_trait::async_trait;
use serde_json::{json, Value};
use tokio::sync::Mutex;

use super::{no_args, tool, Adapter};
use crate::args;
use crate::config;
use crate::error::{AdapterError, Result, ResultExt};
use crate::http::{encode_segment, pretty, Auth, Call, Payload, RestClient};

const MAX_TEXT_CHARS: usize = 1000;

struct Login {
    username: String,
    password: String,
}

pub struct ArgoCd {
    client: RestClient,
    login: Option<Login>,
    session: Mutex<Option<String>>,
}

impl ArgoCd {
    pub fn from_env() -> Result<Self> {
        let url = config::required("ARGOCD_URL")?;
        let verify = config::flag("ARGOCD_VERIFY_SSL", false);
        let token = config::optional("ARGOCD_TOKEN");
        let login = match (&token, config::optional("ARGOCD_USERNAME"), config::optional("ARGOCD_PASSWORD")) {
            (None, Some(username), Some(password)) => Some(Login { username, password }),
            (None, _, _) => return Err(AdapterError::MissingConfig("ARGOCD_TOKEN".to_string())),
            _ => None,
        };
        let auth = token.map(Auth::Bearer).unwrap_or(Auth::None);
        let client = RestClient::builder("Argo CD", url)
            .auth(auth)
            .timeout(config::http_timeout())
            .accept_invalid_certs(!verify)
            .build()?;
        let mut adapter = Self::new(client);
        adapter.login = login;
        Ok(adapter)
    }

    /// Client that already carries its credentials, or none at all.
    pub fn new(client: RestClient) -> Self {
        Self {
            client,
            login: None,
            session: Mutex::new(None),
        }
    }

    pub fn with_login(client: RestClient, username: impl Into<String>, password: impl Into<String>) -> Self {
        Self {
            login: Some(Login {
                username: username.into(),
                password: password.into(),
            }),
            ..Self::new(client)
        }
    }

    /// Cached session token, or a fresh one when none is held or the held
    /// one equals `expired`.
    async fn session_token(&self, login: &Login, expired: Option<&str>) -> Result<String> {
        let mut session = self.session.lock().await;
        if let Some(token) = session.as_deref() {
            if Some(token) != expired {
                return Ok(token.to_string());
            }
        }
        let reply = self
            .client
            .post("/api/v1/session")
            .json(json!({ "username": login.username, "password": login.password }))
            .send()
            .await
            .context("Login failed")?;
        let body = reply.json()?;
        let token = body["token"]
            .as_str()
            .filter(|t| !t.is_empty())
            .ok_or_else(|| AdapterError::invalid("Login failed: no token in session response"))?
            .to_string();
        tracing::info!(user = %login.username, renewed = expired.is_some(), "argo cd session established");
        *session = Some(token.clone());
        Ok(token)
    }

    async fn send(&self, call: Call<'_>) -> Result<String> {
        let reply = match &self.login {
            None => call.send().await?,
            Some(login) => {
                let token = self.session_token(login, None).await?;
                match call.clone().bearer(token.as_str()).send().await {
                    Err(e) if e.http_status() == Some(401) => {
                        tracing::warn!(error = %e, "argo cd session rejected, logging in again");
                        let fresh = self.session_token(login, Some(&token)).await?;
                        call.bearer(fresh).send().await?
                    }
                    other => other?,
                }
            }
        };
        let body = match reply.payload() {
            Payload::Json(v) => v,
            Payload::Empty => json!({ "status": "success" }),
            Payload::Text(text) => json!({
                "status": "success",
                "content_type": reply.content_type().unwrap_or("unknown"),
                "text": text.chars().take(MAX_TEXT_CHARS).collect::<String>(),
            }),
        };
        Ok(pretty(&body))
    }

    fn paged(&self, path: &str, args: &Value) -> Call<'_> {
        self.client
            .get(path)
            .query("limit", args::u64_or(args, "limit", 100))
            .query("offset", args::u64_or(args, "offset", 0))
    }

    async fn create_repository(&self, args: &Value) -> Result<String> {
        let mut body = json!({ "repo": args::str(args, "repo")?, "type": "git" });
        for (arg, key) in [
            ("username", "username"),
            ("password", "password"),
            ("ssh_private_key", "sshPrivateKey"),
        ] {
            if let Some(v) = args::opt_str(args, arg) {
                body[key] = json!(v);
            }
        }
        self.send(self.client.post("/api/v1/repositories").json(body)).await
    }
}

fn application_body(args: &Value) -> Result<Value> {
    Ok(json!({
        "application": {
            "metadata": { "name": args::str(args, "name")? },
            "spec": {
                "project": args::str(args, "project")?,
                "source": {
                    "repoURL": args::str(args, "repo_url")?,
                    "path": args::str(args, "path")?,
                    "targetRevision": "HEAD"
                },
                "destination": {
                    "server": args::str(args, "dest_server")?,
                    "namespace": args::str(args, "dest_namespace")?
                }
            }
        }
    }))
}

fn project_body(args: &Value) -> Result<Value> {
    let repos = args::string_list(args, "source_repos")
        .filter(|r| !r.is_empty())
        .unwrap_or_else(|| vec!["*".to_string()]);
    Ok(json!({
        "project": {
            "metadata": { "name": args::str(args, "name")? },
            "spec": {
                "description": args::str_or(args, "description", ""),
                "sourceRepos": repos,
                "destinations": [{ "server": "*", "namespace": "*" }]
            }
        }
    }))
}

#[async_trait]
impl Adapter for ArgoCd {
    fn name(&self) -> &'static str {
        "argocd"
    }

    fn instructions(&self) -> &'static str {
        "Argo CD: manage applications, projects, repositories and clusters, and trigger syncs."
    }

    fn tools(&self) -> Vec<Value> {
        let paging = json!({
            "type": "object",
            "properties": {
                "limit": { "type": "integer", "default": 100 },
                "offset": { "type": "integer", "default": 0 }
            }
        });
        let mut list_apps = paging.clone();
        list_apps["properties"]["project"] = json!({ "type": "string" });
        let named = json!({
            "type": "object",
            "properties": { "name": { "type": "string" } },
            "required": ["name"]
        });
        let repo_url = json!({
            "type": "object",
            "properties": { "repo_url": { "type": "string" } },
            "required": ["repo_url"]
        });

        vec![
            tool("list_applications", "List applications, optionally for one project.", list_apps),
            tool("get_application", "Get an application.", json!({
                "type": "object",
                "properties": { "name": { "type": "string" }, "project": { "type": "string" } },
                "required": ["name"]
            })),
            tool("create_application", "Create an application tracking HEAD of a repository path.", json!({
                "type": "object",
                "properties": {
                    "name": { "type": "string" },
                    "project": { "type": "string" },
                    "repo_url": { "type": "string" },
                    "path": { "type": "string" },
                    "dest_server": { "type": "string" },
                    "dest_namespace": { "type": "string" }
                },
                "required": ["name", "project", "repo_url", "path", "dest_server", "dest_namespace"]
            })),
            tool("delete_application", "Delete an application.", json!({
                "type": "object",
                "properties": {
                    "name": { "type": "string" },
                    "cascade": { "type": "boolean", "default": true }
                },
                "required": ["name"]
            })),
            tool("sync_application", "Sync an application.", json!({
                "type": "object",
                "properties": {
                    "name": { "type": "string" },
                    "revision": { "type": "string", "default": "HEAD" },
                    "prune": { "type": "boolean", "default": false }
                },
                "required": ["name"]
            })),
            tool("list_projects", "List projects.", paging.clone()),
            tool("get_project", "Get a project.", named.clone()),
            tool("create_project", "Create a project allowing every destination.", json!({
                "type": "object",
                "properties": {
                    "name": { "type": "string" },
                    "description": { "type": "string" },
                    "source_repos": { "type": "array", "items": { "type": "string" }, "default": ["*"] }
                },
                "required": ["name"]
            })),
            tool("delete_project", "Delete a project.", named),
            tool("list_repositories", "List repositories.", paging.clone()),
            tool("get_repository", "Get a repository by URL.", repo_url.clone()),
            tool("create_repository", "Register a git repository.", json!({
                "type": "object",
                "properties": {
                    "repo": { "type": "string" },
                    "username": { "type": "string" },
                    "password": { "type": "string" },
                    "ssh_private_key": { "type": "string" }
                },
                "required": ["repo"]
            })),
            tool("delete_repository", "Remove a repository by URL.", repo_url),
            tool("list_clusters", "List clusters.", paging),
            tool("get_cluster", "Get a cluster by server URL.", json!({
                "type": "object",
                "properties": { "server": { "type": "string" } },
                "required": ["server"]
            })),
            tool("get_version", "Get Argo CD version information.", no_args()),
            tool("get_settings", "Get Argo CD settings.", no_args()),
        ]
    }

    async fn call_tool(&self, name: &str, args: &Value) -> Result<String> {
        match name {
            "list_applications" => {
                let call = self
                    .paged("/api/v1/applications", args)
                    .query_opt("project", args::opt_str(args, "project"));
                self.send(call).await
            }
            "get_application" => {
                let app = args::str(args, "name")?;
                let call = self
                    .client
                    .get(format!("/api/v1/applications/{}", encode_segment(app)))
                    .query_opt("project", args::opt_str(args, "project"));
                self.send(call).await
            }
            "create_application" => {
                let body = application_body(args)?;
                self.send(self.client.post("/api/v1/applications").json(body)).await
            }
            "delete_application" => {
                let app = args::str(args, "name")?;
                let call = self
                    .client
                    .delete(format!("/api/v1/applications/{}", encode_segment(app)))
                    .query("cascade", args::bool_or(args, "cascade", true));
                self.send(call).await
            }
            "sync_application" => {
                let app = args::str(args, "name")?;
                let body = json!({
                    "revision": args::str_or(args, "revision", "HEAD"),
                    "prune": args::bool_or(args, "prune", false),
                });
                let call = self
                    .client
                    .post(format!("/api/v1/applications/{}/sync", encode_segment(app)))
                    .json(body);
                self.send(call).await
            }
            "list_projects" => self.send(self.paged("/api/v1/projects", args)).await,
            "get_project" => {
                let project = args::str(args, "name")?;
                self.send(self.client.get(format!("/api/v1/projects/{}", encode_segment(project))))
                    .await
            }
            "create_project" => {
                let body = project_body(args)?;
                self.send(self.client.post("/api/v1/projects").json(body)).await
            }
            "delete_project" => {
                let project = args::str(args, "name")?;
                self.send(self.client.delete(format!("/api/v1/projects/{}", encode_segment(project))))
                    .await
            }
            "list_repositories" => self.send(self.paged("/api/v1/repositories", args)).await,
            "get_repository" => {
                let repo = encode_segment(args::str(args, "repo_url")?);
                self.send(self.client.get(format!("/api/v1/repositories/{}", repo))).await
            }
            "create_repository" => self.create_repository(args).await,
            "delete_repository" => {
                let repo = encode_segment(args::str(args, "repo_url")?);
                self.send(self.client.delete(format!("/api/v1/repositories/{}", repo))).await
            }
            "list_clusters" => self.send(self.paged("/api/v1/clusters", args)).await,
            "get_cluster" => {
                let server = encode_segment(args::str(args, "server")?);
                self.send(self.client.get(format!("/api/v1/clusters/{}", server))).await
            }
            "get_version" => self.send(self.client.get("/api/version")).await,
            "get_settings" => self.send(self.client.get("/api/v1/settings")).await,
            _ => Err(AdapterError::UnknownTool(name.to_string())),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn application_tracks_head() {
        let args = json!({
            "name": "guestbook",
            "project": "default",
            "repo_url": "https://github.com/argoproj/argocd-example-apps",
            "path": "guestbook",
            "dest_server": "https://kubernetes.default.svc",
            "dest_namespace": "demo"
        });
        let body = application_body(&args).unwrap();
        assert_eq!(body["application"]["metadata"]["name"], "guestbook");
        assert_eq!(body["application"]["spec"]["source"]["targetRevision"], "HEAD");
        assert_eq!(body["application"]["spec"]["destination"]["namespace"], "demo");
    }

    #[test]
    fn application_requires_every_field() {
        let err = application_body(&json!({ "name": "x" })).unwrap_err();
        assert_eq!(err.to_string(), "Missing required argument: project");
    }

    #[test]
    fn project_defaults_to_any_source() {
        let body = project_body(&json!({ "name": "team-a" })).unwrap();
        assert_eq!(body["project"]["spec"]["sourceRepos"], json!(["*"]));
        assert_eq!(body["project"]["spec"]["description"], "");
        assert_eq!(
            body["project"]["spec"]["destinations"],
            json!([{ "server": "*", "namespace": "*" }])
        );

        let body = project_body(&json!({ "name": "team-b", "source_repos": ["https://git/a"] })).unwrap();
        assert_eq!(body["project"]["spec"]["sourceRepos"], json!(["https://git/a"]));
    }

    #[test]
    fn repository_urls_become_one_segment() {
        assert_eq!(
            encode_segment("https://github.com/org/repo.git"),
            "https%3A%2F%2Fgithub.com%2Forg%2Frepo.git"
        );
    }
}
