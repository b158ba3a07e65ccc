//! GitLab adapter (REST API v4).
//!
//! Env: `GITLAB_PERSONAL_ACCESS_TOKEN` (sent as `PRIVATE-TOKEN`),
//! `GITLAB_API_URL` (default `https://gitlab.com/api/v4`).
//!
//! `project_id` may be a numeric id or a `group/project` path; paths are
//! percent-encoded into a single segment as GitLab expects.

use async_trait::async_trait;
use base64::Engine;
use serde_json::{json, Value};

use super::{tool, Adapter};
use crate::args;
use crate::config;
use crate::error::{AdapterError, Result};
use crate::http::{encode_segment, pretty, Auth, Call, Payload, RestClient};

const DEFAULT_API_URL: &str = "https://gitlab.com/api/v4";

pub struct GitLab {
    client: RestClient,
}

impl GitLab {
    pub fn from_env() -> Result<Self> {
        let token = config::required("GITLAB_PERSONAL_ACCESS_TOKEN")?;
        let url = config::with_default("GITLAB_API_URL", DEFAULT_API_URL);
        let client = RestClient::builder("GitLab", url)
            .auth(Auth::Headers(vec![("PRIVATE-TOKEN".to_string(), token)]))
            .timeout(config::http_timeout())
            .build()?;
        Ok(Self::new(client))
    }

    pub fn new(client: RestClient) -> Self {
        Self { client }
    }

    async fn send(&self, call: Call<'_>) -> Result<Value> {
        let reply = call.send().await?;
        if reply.status_code() == 204 {
            return Ok(json!({ "success": true }));
        }
        match reply.payload() {
            Payload::Empty => Ok(json!({ "success": true })),
            Payload::Json(v) => Ok(v),
            Payload::Text(_) => reply.json(),
        }
    }

    async fn file_exists(&self, project: &str, file_path: &str, branch: &str) -> Result<bool> {
        let call = self
            .client
            .get(file_url(project, file_path))
            .query("ref", branch);
        match call.send().await {
            Ok(_) => Ok(true),
            Err(e) if e.is_not_found() => Ok(false),
            Err(e) => Err(e),
        }
    }

    async fn create_or_update_file(&self, args: &Value) -> Result<String> {
        let project = project(args)?;
        let file_path = args::str(args, "file_path")?;
        let branch = args::str(args, "branch")?;

        let mut body = json!({
            "branch": branch,
            "content": args::text(args, "content")?,
            "commit_message": args::str(args, "commit_message")?,
        });
        if let Some(previous) = args::opt_str(args, "previous_path") {
            body["previous_path"] = json!(previous);
        }

        let url = file_url(&project, file_path);
        let call = if self.file_exists(&project, file_path, branch).await? {
            self.client.put(url)
        } else {
            self.client.post(url)
        };
        Ok(pretty(&self.send(call.json(body)).await?))
    }

    async fn push_files(&self, args: &Value) -> Result<String> {
        let project = project(args)?;
        let branch = args::str(args, "branch")?;
        let files = args::array(args, "files")?;

        let mut actions = Vec::with_capacity(files.len());
        for file in &files {
            let file_path = args::str(file, "file_path")?;
            let content = args::text(file, "content")?;
            let action = if self.file_exists(&project, file_path, branch).await? {
                "update"
            } else {
                "create"
            };
            actions.push(json!({
                "action": action,
                "file_path": file_path,
                "content": content,
            }));
        }

        let body = json!({
            "branch": branch,
            "commit_message": args::str(args, "commit_message")?,
            "actions": actions,
        });
        let call = self
            .client
            .post(format!("projects/{}/repository/commits", project))
            .json(body);
        Ok(pretty(&self.send(call).await?))
    }

    async fn search_repositories(&self, args: &Value) -> Result<String> {
        let call = self
            .client
            .get("projects")
            .query("search", args::str(args, "search")?)
            .query("page", args::u64_or(args, "page", 1))
            .query("per_page", args::u64_or(args, "per_page", 20))
            .query("order_by", "id")
            .query("sort", "desc");
        Ok(pretty(&self.send(call).await?))
    }

    async fn create_repository(&self, args: &Value) -> Result<String> {
        let visibility = args::str_or(args, "visibility", "private");
        if !matches!(visibility, "private" | "internal" | "public") {
            return Err(AdapterError::invalid(
                "Visibility must be one of: 'private', 'internal', 'public'",
            ));
        }
        let mut body = json!({
            "name": args::str(args, "name")?,
            "visibility": visibility,
            "initialize_with_readme": args::bool_or(args, "initialize_with_readme", false),
        });
        if let Some(description) = args::opt_str(args, "description") {
            body["description"] = json!(description);
        }
        Ok(pretty(&self.send(self.client.post("projects").json(body)).await?))
    }

    async fn get_file_contents(&self, args: &Value) -> Result<String> {
        let project = project(args)?;
        let file_path = args::str(args, "file_path")?;
        let git_ref = args::opt_str(args, "ref");

        let call = self
            .client
            .get(file_url(&project, file_path))
            .query_opt("ref", git_ref);
        match self.send(call).await {
            Ok(mut file) => {
                if let Some(decoded) = file["content"].as_str().and_then(decode_content) {
                    file["decoded_content"] = json!(decoded);
                }
                Ok(pretty(&file))
            }
            Err(e) if e.is_not_found() => {
                // Not a file; try it as a directory.
                let call = self
                    .client
                    .get(format!("projects/{}/repository/tree", project))
                    .query("path", file_path.trim_start_matches('/'))
                    .query_opt("ref", git_ref);
                Ok(pretty(&self.send(call).await?))
            }
            Err(e) => Err(e),
        }
    }

    async fn create_issue(&self, args: &Value) -> Result<String> {
        let project = project(args)?;
        let mut body = json!({ "title": args::str(args, "title")? });
        if let Some(description) = args::opt_str(args, "description") {
            body["description"] = json!(description);
        }
        if let Some(assignees) = args::opt_json(args, "assignee_ids")? {
            body["assignee_ids"] = assignees;
        }
        if let Some(labels) = args::string_list(args, "labels") {
            body["labels"] = json!(labels.join(","));
        }
        if let Some(milestone) = args::opt_u64(args, "milestone_id") {
            body["milestone_id"] = json!(milestone);
        }
        let call = self
            .client
            .post(format!("projects/{}/issues", project))
            .json(body);
        Ok(pretty(&self.send(call).await?))
    }

    async fn create_merge_request(&self, args: &Value) -> Result<String> {
        let project = project(args)?;
        let mut body = json!({
            "title": args::str(args, "title")?,
            "source_branch": args::str(args, "source_branch")?,
            "target_branch": args::str(args, "target_branch")?,
            "allow_collaboration": args::bool_or(args, "allow_collaboration", false),
        });
        if let Some(description) = args::opt_str(args, "description") {
            body["description"] = json!(description);
        }
        if args::bool_or(args, "draft", false) {
            body["draft"] = json!(true);
        }
        let call = self
            .client
            .post(format!("projects/{}/merge_requests", project))
            .json(body);
        Ok(pretty(&self.send(call).await?))
    }

    async fn fork_repository(&self, args: &Value) -> Result<String> {
        let project = project(args)?;
        let mut body = json!({});
        if let Some(namespace) = args::opt_str(args, "namespace") {
            body["namespace"] = json!(namespace);
        }
        let call = self.client.post(format!("projects/{}/fork", project)).json(body);
        Ok(pretty(&self.send(call).await?))
    }

    async fn create_branch(&self, args: &Value) -> Result<String> {
        let project = project(args)?;
        let body = json!({
            "branch": args::str(args, "branch")?,
            "ref": args::str_or(args, "ref", "main"),
        });
        let call = self
            .client
            .post(format!("projects/{}/repository/branches", project))
            .json(body);
        Ok(pretty(&self.send(call).await?))
    }

    async fn list_branches(&self, args: &Value) -> Result<String> {
        let project = project(args)?;
        let call = self
            .client
            .get(format!("projects/{}/repository/branches", project))
            .query_opt("search", args::opt_str(args, "search"));
        Ok(pretty(&self.send(call).await?))
    }

    async fn list_issues(&self, args: &Value) -> Result<String> {
        let project = project(args)?;
        let call = self
            .client
            .get(format!("projects/{}/issues", project))
            .query("state", args::str_or(args, "state", "opened"))
            .query("page", args::u64_or(args, "page", 1))
            .query("per_page", args::u64_or(args, "per_page", 20))
            .query_opt("labels", args::string_list(args, "labels").map(|l| l.join(",")))
            .query_opt("milestone", args::opt_str(args, "milestone"))
            .query_opt("search", args::opt_str(args, "search"));
        Ok(pretty(&self.send(call).await?))
    }

    async fn list_commits(&self, args: &Value) -> Result<String> {
        let project = project(args)?;
        let call = self
            .client
            .get(format!("projects/{}/repository/commits", project))
            .query("page", args::u64_or(args, "page", 1))
            .query("per_page", args::u64_or(args, "per_page", 20))
            .query_opt("ref_name", args::opt_str(args, "ref_name"))
            .query_opt("path", args::opt_str(args, "path"));
        Ok(pretty(&self.send(call).await?))
    }

    async fn list_merge_requests(&self, args: &Value) -> Result<String> {
        let project = project(args)?;
        let call = self
            .client
            .get(format!("projects/{}/merge_requests", project))
            .query("state", args::str_or(args, "state", "opened"))
            .query("page", args::u64_or(args, "page", 1))
            .query("per_page", args::u64_or(args, "per_page", 20))
            .query_opt("target_branch", args::opt_str(args, "target_branch"))
            .query_opt("source_branch", args::opt_str(args, "source_branch"));
        Ok(pretty(&self.send(call).await?))
    }

    /// Numeric ids go straight to `users/{id}`; usernames go through the
    /// `?username=` lookup.
    async fn get_user_info(&self, args: &Value) -> Result<String> {
        let Some(user) = args::opt_id(args, "user_id") else {
            return Ok(pretty(&self.send(self.client.get("user")).await?));
        };
        if user.chars().all(|c| c.is_ascii_digit()) {
            return Ok(pretty(&self.send(self.client.get(format!("users/{}", user))).await?));
        }
        let users = self
            .send(self.client.get("users").query("username", &user))
            .await?;
        match users.as_array().and_then(|a| a.first()) {
            Some(found) => Ok(pretty(found)),
            None => Err(AdapterError::Status {
                service: "GitLab",
                status: 404,
                message: format!("User {} not found", user),
            }),
        }
    }
}

fn project(args: &Value) -> Result<String> {
    Ok(encode_segment(&args::id(args, "project_id")?))
}

fn file_url(project: &str, file_path: &str) -> String {
    format!(
        "projects/{}/repository/files/{}",
        project,
        encode_segment(file_path.trim_start_matches('/'))
    )
}

/// GitLab returns file bodies base64-encoded; binary files stay encoded.
fn decode_content(content: &str) -> Option<String> {
    let cleaned: String = content.chars().filter(|c| !c.is_whitespace()).collect();
    let bytes = base64::engine::general_purpose::STANDARD
        .decode(cleaned)
        .ok()?;
    String::from_utf8(bytes).ok()
}

#[async_trait]
impl Adapter for GitLab {
    fn name(&self) -> &'static str {
        "gitlab"
    }

    fn instructions(&self) -> &'static str {
        "GitLab: read and write repository files, manage projects, branches, issues and merge requests, and inspect commits and users."
    }

    fn tools(&self) -> Vec<Value> {
        let project_id = json!({ "type": "string", "description": "Project ID or path such as group/project" });
        let paging = |mut schema: Value| {
            schema["properties"]["page"] = json!({ "type": "integer", "default": 1 });
            schema["properties"]["per_page"] = json!({ "type": "integer", "default": 20 });
            schema
        };

        vec![
            tool("create_or_update_file", "Create a file, or update it if it already exists on the branch.", json!({
                "type": "object",
                "properties": {
                    "project_id": project_id,
                    "file_path": { "type": "string" },
                    "content": { "type": "string" },
                    "commit_message": { "type": "string" },
                    "branch": { "type": "string" },
                    "previous_path": { "type": "string", "description": "Old path when moving a file" }
                },
                "required": ["project_id", "file_path", "content", "commit_message", "branch"]
            })),
            tool("push_files", "Commit several files in one commit.", json!({
                "type": "object",
                "properties": {
                    "project_id": project_id,
                    "branch": { "type": "string" },
                    "commit_message": { "type": "string" },
                    "files": {
                        "type": "array",
                        "items": {
                            "type": "object",
                            "properties": {
                                "file_path": { "type": "string" },
                                "content": { "type": "string" }
                            },
                            "required": ["file_path", "content"]
                        }
                    }
                },
                "required": ["project_id", "branch", "files", "commit_message"]
            })),
            tool("search_repositories", "Search projects by name.", paging(json!({
                "type": "object",
                "properties": { "search": { "type": "string" } },
                "required": ["search"]
            }))),
            tool("create_repository", "Create a project.", json!({
                "type": "object",
                "properties": {
                    "name": { "type": "string" },
                    "description": { "type": "string" },
                    "visibility": { "type": "string", "enum": ["private", "internal", "public"], "default": "private" },
                    "initialize_with_readme": { "type": "boolean", "default": false }
                },
                "required": ["name"]
            })),
            tool("get_file_contents", "Get a file (decoded) or list a directory.", json!({
                "type": "object",
                "properties": {
                    "project_id": project_id,
                    "file_path": { "type": "string" },
                    "ref": { "type": "string", "description": "Branch, tag or commit" }
                },
                "required": ["project_id", "file_path"]
            })),
            tool("create_issue", "Open an issue.", json!({
                "type": "object",
                "properties": {
                    "project_id": project_id,
                    "title": { "type": "string" },
                    "description": { "type": "string" },
                    "assignee_ids": { "type": "array", "items": { "type": "integer" } },
                    "labels": { "type": "array", "items": { "type": "string" } },
                    "milestone_id": { "type": "integer" }
                },
                "required": ["project_id", "title"]
            })),
            tool("create_merge_request", "Open a merge request.", json!({
                "type": "object",
                "properties": {
                    "project_id": project_id,
                    "title": { "type": "string" },
                    "source_branch": { "type": "string" },
                    "target_branch": { "type": "string" },
                    "description": { "type": "string" },
                    "draft": { "type": "boolean", "default": false },
                    "allow_collaboration": { "type": "boolean", "default": false }
                },
                "required": ["project_id", "title", "source_branch", "target_branch"]
            })),
            tool("fork_repository", "Fork a project, optionally into a namespace.", json!({
                "type": "object",
                "properties": {
                    "project_id": project_id,
                    "namespace": { "type": "string" }
                },
                "required": ["project_id"]
            })),
            tool("create_branch", "Create a branch from a ref.", json!({
                "type": "object",
                "properties": {
                    "project_id": project_id,
                    "branch": { "type": "string" },
                    "ref": { "type": "string", "default": "main" }
                },
                "required": ["project_id", "branch"]
            })),
            tool("list_branches", "List branches.", json!({
                "type": "object",
                "properties": {
                    "project_id": project_id,
                    "search": { "type": "string" }
                },
                "required": ["project_id"]
            })),
            tool("list_issues", "List issues.", paging(json!({
                "type": "object",
                "properties": {
                    "project_id": project_id,
                    "state": { "type": "string", "enum": ["opened", "closed", "all"], "default": "opened" },
                    "labels": { "type": "array", "items": { "type": "string" } },
                    "milestone": { "type": "string" },
                    "search": { "type": "string" }
                },
                "required": ["project_id"]
            }))),
            tool("get_project_details", "Get a project.", json!({
                "type": "object",
                "properties": { "project_id": project_id },
                "required": ["project_id"]
            })),
            tool("list_commits", "List commits, optionally for a ref or path.", paging(json!({
                "type": "object",
                "properties": {
                    "project_id": project_id,
                    "ref_name": { "type": "string" },
                    "path": { "type": "string" }
                },
                "required": ["project_id"]
            }))),
            tool("get_commit_details", "Get one commit.", json!({
                "type": "object",
                "properties": {
                    "project_id": project_id,
                    "sha": { "type": "string" }
                },
                "required": ["project_id", "sha"]
            })),
            tool("list_merge_requests", "List merge requests.", paging(json!({
                "type": "object",
                "properties": {
                    "project_id": project_id,
                    "state": { "type": "string", "enum": ["opened", "closed", "locked", "merged", "all"], "default": "opened" },
                    "target_branch": { "type": "string" },
                    "source_branch": { "type": "string" }
                },
                "required": ["project_id"]
            }))),
            tool("get_user_info", "Get a user by id or username; the current user when omitted.", json!({
                "type": "object",
                "properties": { "user_id": { "type": "string" } }
            })),
        ]
    }

    async fn call_tool(&self, name: &str, args: &Value) -> Result<String> {
        match name {
            "create_or_update_file" => self.create_or_update_file(args).await,
            "push_files" => self.push_files(args).await,
            "search_repositories" => self.search_repositories(args).await,
            "create_repository" => self.create_repository(args).await,
            "get_file_contents" => self.get_file_contents(args).await,
            "create_issue" => self.create_issue(args).await,
            "create_merge_request" => self.create_merge_request(args).await,
            "fork_repository" => self.fork_repository(args).await,
            "create_branch" => self.create_branch(args).await,
            "list_branches" => self.list_branches(args).await,
            "list_issues" => self.list_issues(args).await,
            "get_project_details" => {
                let project = project(args)?;
                Ok(pretty(&self.send(self.client.get(format!("projects/{}", project))).await?))
            }
            "list_commits" => self.list_commits(args).await,
            "get_commit_details" => {
                let project = project(args)?;
                let sha = args::str(args, "sha")?;
                let call = self
                    .client
                    .get(format!("projects/{}/repository/commits/{}", project, sha));
                Ok(pretty(&self.send(call).await?))
            }
            "list_merge_requests" => self.list_merge_requests(args).await,
            "get_user_info" => self.get_user_info(args).await,
            _ => Err(AdapterError::UnknownTool(name.to_string())),
        }
    }
}
