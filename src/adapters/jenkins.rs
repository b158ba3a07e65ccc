//! Jenkins adapter.
//!
//! Env: `JENKINS_URL`, `JENKINS_USER`, `JENKINS_API_TOKEN` (Basic auth),
//! `JENKINS_VERIFY_SSL` (default false, self-signed controllers are common).

use async_trait::async_trait;
use serde_json::{json, Value};

use super::{no_args, tool, Adapter};
use crate::args;
use crate::config;
use crate::error::{AdapterError, Result};
use crate::http::{encode_segment, pretty, Auth, Call, RestClient};

const RUNNING_BUILDS_TREE: &str = "computer[executors[currentExecutable[url,fullDisplayName]],oneOffExecutors[currentExecutable[url,fullDisplayName]]]";

pub struct Jenkins {
    client: RestClient,
}

impl Jenkins {
    pub fn from_env() -> Result<Self> {
        let url = config::required("JENKINS_URL")?;
        let username = config::required("JENKINS_USER")?;
        let token = config::required("JENKINS_API_TOKEN")?;
        let verify = config::flag("JENKINS_VERIFY_SSL", false);
        let client = RestClient::builder("Jenkins", url)
            .auth(Auth::Basic {
                username,
                password: Some(token),
            })
            .timeout(config::http_timeout())
            .accept_invalid_certs(!verify)
            .build()?;
        Ok(Self::new(client))
    }

    pub fn new(client: RestClient) -> Self {
        Self { client }
    }

    /// JSON replies pass through; anything else (redirects, HTML, empty)
    /// collapses to a status object.
    async fn send(&self, call: Call<'_>) -> Result<String> {
        let reply = call.send().await?;
        if reply.is_json() && !reply.bytes().is_empty() {
            return Ok(pretty(&reply.json()?));
        }
        Ok(pretty(&json!({
            "status": "success",
            "statusCode": reply.status_code(),
        })))
    }

    async fn send_text(&self, call: Call<'_>) -> Result<String> {
        Ok(call.send().await?.text())
    }

    async fn trigger_build(&self, args: &Value) -> Result<String> {
        let job = job_path(args::str(args, "job_name")?);
        match args::opt_object(args, "parameters")? {
            Some(params) if !params.is_empty() => {
                let mut call = self.client.post(format!("{}/buildWithParameters", job));
                for (key, value) in &params {
                    call = call.query(key, scalar(value));
                }
                self.send(call).await
            }
            _ => self.send(self.client.post(format!("{}/build", job))).await,
        }
    }

    async fn install_plugin(&self, args: &Value) -> Result<String> {
        let plugin = args::str(args, "plugin_name")?;
        let body = format!(r#"<jenkins><install plugin="{}@latest" /></jenkins>"#, plugin);
        self.send(
            self.client
                .post("/pluginManager/installNecessaryPlugins")
                .text("text/xml", body),
        )
        .await
    }

    async fn create_job(&self, args: &Value) -> Result<String> {
        let name = args::str(args, "job_name")?;
        let config_xml = args::str(args, "config_xml")?;
        self.send(
            self.client
                .post("/createItem")
                .query("name", name)
                .text("text/xml", config_xml),
        )
        .await
    }

    async fn copy_job(&self, args: &Value) -> Result<String> {
        let source = args::str(args, "source_job_name")?;
        let target = args::str(args, "target_job_name")?;
        self.send(
            self.client
                .post("/createItem")
                .query("name", target)
                .query("mode", "copy")
                .query("from", source),
        )
        .await
    }

    async fn get_builds_list(&self, args: &Value) -> Result<String> {
        let job = job_path(args::str(args, "job_name")?);
        let limit = args::u64_or(args, "limit", 10);
        let tree = format!("builds[number,result,url,timestamp,duration]{{0,{}}}", limit);
        self.send(self.client.get(format!("{}/api/json", job)).query("tree", tree))
            .await
    }

    async fn update_build_description(&self, args: &Value) -> Result<String> {
        let build = build_path(args)?;
        let description = args::str(args, "description")?;
        self.send(
            self.client
                .post(format!("{}/submitDescription", build))
                .query("description", description),
        )
        .await
    }

    async fn update_job_config(&self, args: &Value) -> Result<String> {
        let job = job_path(args::str(args, "job_name")?);
        let config_xml = args::str(args, "config_xml")?;
        self.send(
            self.client
                .post(format!("{}/config.xml", job))
                .text("text/xml", config_xml),
        )
        .await
    }

    async fn job_get(&self, args: &Value, suffix: &str) -> Result<String> {
        let job = job_path(args::str(args, "job_name")?);
        self.send(self.client.get(format!("{}{}", job, suffix))).await
    }

    async fn job_post(&self, args: &Value, suffix: &str) -> Result<String> {
        let job = job_path(args::str(args, "job_name")?);
        self.send(self.client.post(format!("{}{}", job, suffix))).await
    }
}

/// `folder/sub/job` becomes `/job/folder/job/sub/job/job`.
fn job_path(name: &str) -> String {
    name.split('/')
        .filter(|s| !s.is_empty())
        .map(|s| format!("/job/{}", encode_segment(s)))
        .collect()
}

fn build_path(args: &Value) -> Result<String> {
    let job = job_path(args::str(args, "job_name")?);
    let number = args::id(args, "build_number")?;
    Ok(format!("{}/{}", job, number))
}

fn scalar(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

#[async_trait]
impl Adapter for Jenkins {
    fn name(&self) -> &'static str {
        "jenkins"
    }

    fn instructions(&self) -> &'static str {
        "Jenkins: inspect and trigger jobs and builds, read console output, manage job configuration, plugins, nodes and the queue."
    }

    fn tools(&self) -> Vec<Value> {
        let job = json!({
            "type": "object",
            "properties": { "job_name": { "type": "string", "description": "Job name; use folder/job for jobs in folders" } },
            "required": ["job_name"]
        });
        let build = json!({
            "type": "object",
            "properties": {
                "job_name": { "type": "string" },
                "build_number": { "type": ["integer", "string"], "description": "Build number or alias such as lastBuild" }
            },
            "required": ["job_name", "build_number"]
        });
        let job_xml = json!({
            "type": "object",
            "properties": {
                "job_name": { "type": "string" },
                "config_xml": { "type": "string", "description": "Job config.xml content" }
            },
            "required": ["job_name", "config_xml"]
        });

        vec![
            tool("get_jenkins_version", "Get server information, including jobs and views.", no_args()),
            tool("get_job_details", "Get detailed information about a job.", job.clone()),
            tool("get_last_build_status", "Get the last build of a job.", job.clone()),
            tool("trigger_build", "Trigger a build, optionally with parameters.", json!({
                "type": "object",
                "properties": {
                    "job_name": { "type": "string" },
                    "parameters": { "type": "object", "description": "Build parameters as key/value pairs" }
                },
                "required": ["job_name"]
            })),
            tool("get_plugin_details", "List installed plugins.", no_args()),
            tool("install_plugin", "Install the latest version of a plugin.", json!({
                "type": "object",
                "properties": { "plugin_name": { "type": "string" } },
                "required": ["plugin_name"]
            })),
            tool("get_node_details", "List nodes, including the built-in node.", no_args()),
            tool("get_queue_details", "List items waiting in the build queue.", no_args()),
            tool("create_job", "Create a job from config.xml.", job_xml.clone()),
            tool("restart_jenkins", "Restart the Jenkins controller.", no_args()),
            tool("get_build_status", "Get the status of one build.", build.clone()),
            tool("get_last_successful_build", "Get the last successful build of a job.", job.clone()),
            tool("get_last_failed_build", "Get the last failed build of a job.", job.clone()),
            tool("stop_build", "Abort a running build.", build.clone()),
            tool("get_pipeline_description", "Describe a pipeline job's runs and stages.", job.clone()),
            tool("get_builds_list", "List recent builds of a job.", json!({
                "type": "object",
                "properties": {
                    "job_name": { "type": "string" },
                    "limit": { "type": "integer", "default": 10 }
                },
                "required": ["job_name"]
            })),
            tool("get_running_builds", "List builds currently running on any executor.", no_args()),
            tool("update_build_description", "Set the description of a build.", json!({
                "type": "object",
                "properties": {
                    "job_name": { "type": "string" },
                    "build_number": { "type": ["integer", "string"] },
                    "description": { "type": "string" }
                },
                "required": ["job_name", "build_number", "description"]
            })),
            tool("delete_job", "Delete a job.", job.clone()),
            tool("copy_job", "Create a new job as a copy of an existing one.", json!({
                "type": "object",
                "properties": {
                    "source_job_name": { "type": "string" },
                    "target_job_name": { "type": "string" }
                },
                "required": ["source_job_name", "target_job_name"]
            })),
            tool("get_job_config", "Get a job's config.xml.", job.clone()),
            tool("update_job_config", "Replace a job's config.xml.", job_xml),
            tool("enable_job", "Enable a disabled job.", job.clone()),
            tool("disable_job", "Disable a job.", job),
            tool("get_build_console_output", "Get the console log of a build.", build),
            tool("get_crumb", "Get a CSRF crumb for POST requests.", no_args()),
        ]
    }

    async fn call_tool(&self, name: &str, args: &Value) -> Result<String> {
        match name {
            "get_jenkins_version" => self.send(self.client.get("/api/json")).await,
            "get_job_details" => self.job_get(args, "/api/json").await,
            "get_last_build_status" => self.job_get(args, "/lastBuild/api/json").await,
            "trigger_build" => self.trigger_build(args).await,
            "get_plugin_details" => self.send(self.client.get("/pluginManager/api/json")).await,
            "install_plugin" => self.install_plugin(args).await,
            "get_node_details" => self.send(self.client.get("/computer/api/json")).await,
            "get_queue_details" => self.send(self.client.get("/queue/api/json")).await,
            "create_job" => self.create_job(args).await,
            "restart_jenkins" => self.send(self.client.post("/restart")).await,
            "get_build_status" => {
                let build = build_path(args)?;
                self.send(self.client.get(format!("{}/api/json", build))).await
            }
            "get_last_successful_build" => self.job_get(args, "/lastSuccessfulBuild/api/json").await,
            "get_last_failed_build" => self.job_get(args, "/lastFailedBuild/api/json").await,
            "stop_build" => {
                let build = build_path(args)?;
                self.send(self.client.post(format!("{}/stop", build))).await
            }
            "get_pipeline_description" => self.job_get(args, "/wfapi").await,
            "get_builds_list" => self.get_builds_list(args).await,
            "get_running_builds" => {
                self.send(self.client.get("/computer/api/json").query("tree", RUNNING_BUILDS_TREE))
                    .await
            }
            "update_build_description" => self.update_build_description(args).await,
            "delete_job" => self.job_post(args, "/doDelete").await,
            "copy_job" => self.copy_job(args).await,
            "get_job_config" => {
                let job = job_path(args::str(args, "job_name")?);
                self.send_text(self.client.get(format!("{}/config.xml", job))).await
            }
            "update_job_config" => self.update_job_config(args).await,
            "enable_job" => self.job_post(args, "/enable").await,
            "disable_job" => self.job_post(args, "/disable").await,
            "get_build_console_output" => {
                let build = build_path(args)?;
                self.send_text(self.client.get(format!("{}/consoleText", build))).await
            }
            "get_crumb" => self.send(self.client.get("/crumbIssuer/api/json")).await,
            _ => Err(AdapterError::UnknownTool(name.to_string())),
        }
    }
}
