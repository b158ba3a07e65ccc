//! Vendor adapters.
//!
//! Each adapter maps one vendor REST API onto MCP tools (and, for a few,
//! resources and prompts). A process serves exactly one adapter because tool
//! names such as `list_users` or `create_repository` repeat across vendors.

use std::sync::Arc;

use async_trait::async_trait;
use serde_json::{json, Value};

use crate::error::{AdapterError, Result};

pub mod argocd;
pub mod artifactory;
pub mod aws;
pub mod datadog;
pub mod docker;
pub mod elasticsearch;
pub mod gitlab;
pub mod grafana;
pub mod jenkins;
pub mod newrelic;
pub mod nexus;
pub mod prometheus;
pub mod puppet;

/// One vendor's MCP surface.
#[async_trait]
pub trait Adapter: Send + Sync {
    /// Server name reported in `initialize`.
    fn name(&self) -> &'static str;

    fn instructions(&self) -> &'static str;

    /// Tool descriptors in MCP `tools/list` shape.
    fn tools(&self) -> Vec<Value>;

    async fn call_tool(&self, name: &str, args: &Value) -> Result<String>;

    fn resources(&self) -> Vec<Value> {
        Vec::new()
    }

    fn resource_templates(&self) -> Vec<Value> {
        Vec::new()
    }

    async fn read_resource(&self, uri: &str) -> Result<String> {
        Err(AdapterError::UnknownResource(uri.to_string()))
    }

    fn prompts(&self) -> Vec<Value> {
        Vec::new()
    }

    async fn get_prompt(&self, name: &str, _args: &Value) -> Result<String> {
        Err(AdapterError::UnknownPrompt(name.to_string()))
    }
}

/// Adapters selectable on the command line.
#[derive(Debug, Clone, Copy, PartialEq, Eq, clap::ValueEnum)]
pub enum AdapterKind {
    Artifactory,
    Jenkins,
    Nexus,
    Gitlab,
    Grafana,
    Datadog,
    Prometheus,
    Docker,
    Aws,
    Elasticsearch,
    Argocd,
    Puppet,
    Newrelic,
}

impl AdapterKind {
    pub const ALL: [AdapterKind; 13] = [
        AdapterKind::Artifactory,
        AdapterKind::Jenkins,
        AdapterKind::Nexus,
        AdapterKind::Gitlab,
        AdapterKind::Grafana,
        AdapterKind::Datadog,
        AdapterKind::Prometheus,
        AdapterKind::Docker,
        AdapterKind::Aws,
        AdapterKind::Elasticsearch,
        AdapterKind::Argocd,
        AdapterKind::Puppet,
        AdapterKind::Newrelic,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            AdapterKind::Artifactory => "artifactory",
            AdapterKind::Jenkins => "jenkins",
            AdapterKind::Nexus => "nexus",
            AdapterKind::Gitlab => "gitlab",
            AdapterKind::Grafana => "grafana",
            AdapterKind::Datadog => "datadog",
            AdapterKind::Prometheus => "prometheus",
            AdapterKind::Docker => "docker",
            AdapterKind::Aws => "aws",
            AdapterKind::Elasticsearch => "elasticsearch",
            AdapterKind::Argocd => "argocd",
            AdapterKind::Puppet => "puppet",
            AdapterKind::Newrelic => "newrelic",
        }
    }
}

/// Build an adapter from its environment variables.
pub fn build(kind: AdapterKind) -> Result<Arc<dyn Adapter>> {
    let adapter: Arc<dyn Adapter> = match kind {
        AdapterKind::Artifactory => Arc::new(artifactory::Artifactory::from_env()?),
        AdapterKind::Jenkins => Arc::new(jenkins::Jenkins::from_env()?),
        AdapterKind::Nexus => Arc::new(nexus::Nexus::from_env()?),
        AdapterKind::Gitlab => Arc::new(gitlab::GitLab::from_env()?),
        AdapterKind::Grafana => Arc::new(grafana::Grafana::from_env()?),
        AdapterKind::Datadog => Arc::new(datadog::Datadog::from_env()?),
        AdapterKind::Prometheus => Arc::new(prometheus::Prometheus::from_env()?),
        AdapterKind::Docker => Arc::new(docker::Docker::from_env()?),
        AdapterKind::Aws => Arc::new(aws::Aws::from_env()?),
        AdapterKind::Elasticsearch => Arc::new(elasticsearch::Elasticsearch::from_env()?),
        AdapterKind::Argocd => Arc::new(argocd::ArgoCd::from_env()?),
        AdapterKind::Puppet => Arc::new(puppet::Puppet::from_env()?),
        AdapterKind::Newrelic => Arc::new(newrelic::NewRelic::from_env()?),
    };
    tracing::info!(adapter = kind.as_str(), tools = adapter.tools().len(), "adapter ready");
    Ok(adapter)
}

// ── Descriptor helpers ──────────────────────────────────────────────────────

/// MCP tool descriptor.
pub fn tool(name: &str, description: &str, input_schema: Value) -> Value {
    json!({
        "name": name,
        "description": description,
        "inputSchema": input_schema,
    })
}

/// Input schema for a tool that takes no arguments.
pub fn no_args() -> Value {
    json!({ "type": "object", "properties": {} })
}

pub fn resource(uri: &str, name: &str, description: &str, mime_type: &str) -> Value {
    json!({
        "uri": uri,
        "name": name,
        "description": description,
        "mimeType": mime_type,
    })
}

pub fn resource_template(uri_template: &str, name: &str, description: &str, mime_type: &str) -> Value {
    json!({
        "uriTemplate": uri_template,
        "name": name,
        "description": description,
        "mimeType": mime_type,
    })
}

/// Prompt descriptor; `arguments` is a list of `(name, description, required)`.
pub fn prompt(name: &str, description: &str, arguments: &[(&str, &str, bool)]) -> Value {
    let arguments: Vec<Value> = arguments
        .iter()
        .map(|(name, description, required)| {
            json!({ "name": name, "description": description, "required": required })
        })
        .collect();
    json!({
        "name": name,
        "description": description,
        "arguments": arguments,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::ValueEnum;

    #[test]
    fn kind_names_match_clap_values() {
        for kind in AdapterKind::ALL {
            let value = kind.to_possible_value().unwrap();
            assert_eq!(value.get_name(), kind.as_str());
        }
    }

    #[test]
    fn tool_descriptor_shape() {
        let t = tool("ping", "Ping it", no_args());
        assert_eq!(t["name"], "ping");
        assert_eq!(t["inputSchema"]["type"], "object");
    }

    #[test]
    fn prompt_arguments_are_listed() {
        let p = prompt("investigate", "Dig in", &[("alert_name", "Alert", true)]);
        assert_eq!(p["arguments"][0]["name"], "alert_name");
        assert_eq!(p["arguments"][0]["required"], true);
    }
}
