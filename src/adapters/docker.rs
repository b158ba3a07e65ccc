//! Docker adapter speaking the Engine HTTP API.
//!
//! Env: `DOCKER_HOST` (`unix:///path`, `tcp://host:port` or `http(s)://...`,
//! default `unix:///var/run/docker.sock`), optional `DOCKER_API_VERSION`
//! such as `1.43`.

use async_trait::async_trait;
use base64::Engine as _;
use chrono::DateTime;
use serde_json::{json, Map, Value};

use super::{no_args, tool, Adapter};
use crate::args;
use crate::config;
use crate::error::{AdapterError, Result, ResultExt};
use crate::http::{pretty, RestClient};

const DEFAULT_HOST: &str = "unix:///var/run/docker.sock";

pub struct Docker {
    client: RestClient,
}

/// Where the daemon listens: an HTTP base URL, plus the socket to reach it
/// through for `unix://` hosts.
#[derive(Debug, PartialEq)]
struct Endpoint {
    base: String,
    socket: Option<String>,
}

/// Map `DOCKER_HOST` onto an endpoint.
fn endpoint(host: &str, api_version: Option<&str>) -> Result<Endpoint> {
    let host = host.trim();
    let (base, socket) = if let Some(path) = host.strip_prefix("unix://") {
        if path.is_empty() {
            return Err(AdapterError::invalid("DOCKER_HOST unix:// needs a socket path"));
        }
        ("http://localhost".to_string(), Some(path.to_string()))
    } else if host.starts_with("npipe://") {
        return Err(AdapterError::Unsupported(format!(
            "DOCKER_HOST {} is a named pipe; use a unix socket or tcp:// address",
            host
        )));
    } else {
        let host = host.trim_end_matches('/');
        let base = if let Some(rest) = host.strip_prefix("tcp://") {
            format!("http://{}", rest)
        } else if host.starts_with("http://") || host.starts_with("https://") {
            host.to_string()
        } else {
            format!("http://{}", host)
        };
        (base, None)
    };
    let base = match api_version {
        Some(v) => format!("{}/v{}", base, v.trim_start_matches('v')),
        None => base,
    };
    Ok(Endpoint { base, socket })
}

/// First 12 hex digits of a container, image or network id.
fn short_id(id: &str) -> String {
    let id = id.strip_prefix("sha256:").unwrap_or(id);
    id.chars().take(12).collect()
}

/// Unix seconds from list endpoints as RFC3339.
fn created(value: &Value) -> Value {
    match value.as_i64().and_then(|secs| DateTime::from_timestamp(secs, 0)) {
        Some(dt) => json!(dt.to_rfc3339()),
        None => value.clone(),
    }
}

/// Split a multiplexed log stream into text.
///
/// Without a TTY the daemon prefixes every chunk with an 8-byte header:
/// stream type, three zero bytes, then a big-endian payload length. Anything
/// that does not parse as frames is returned as raw text.
pub fn demux_logs(raw: &[u8]) -> String {
    let mut out = Vec::with_capacity(raw.len());
    let mut rest = raw;
    while !rest.is_empty() {
        if rest.len() < 8 || rest[0] > 2 || rest[1..4] != [0, 0, 0] {
            return String::from_utf8_lossy(raw).into_owned();
        }
        let len = u32::from_be_bytes([rest[4], rest[5], rest[6], rest[7]]) as usize;
        let Some(payload) = rest.get(8..8 + len) else {
            return String::from_utf8_lossy(raw).into_owned();
        };
        out.extend_from_slice(payload);
        rest = &rest[8 + len..];
    }
    String::from_utf8_lossy(&out).into_owned()
}

/// Engine API create body from the tool's flat arguments.
fn container_spec(
    image: &str,
    command: Option<Value>,
    ports: Option<&Map<String, Value>>,
    environment: Option<&Map<String, Value>>,
    volumes: Option<&Map<String, Value>>,
) -> Value {
    let mut spec = json!({ "Image": image });
    let mut host_config = Map::new();

    match command {
        Some(Value::String(cmd)) => {
            spec["Cmd"] = json!(cmd.split_whitespace().collect::<Vec<_>>());
        }
        Some(cmd @ Value::Array(_)) => spec["Cmd"] = cmd,
        _ => {}
    }

    if let Some(env) = environment {
        let env: Vec<String> = env
            .iter()
            .map(|(k, v)| format!("{}={}", k, v.as_str().map(String::from).unwrap_or_else(|| v.to_string())))
            .collect();
        spec["Env"] = json!(env);
    }

    if let Some(ports) = ports.filter(|p| !p.is_empty()) {
        let mut exposed = Map::new();
        let mut bindings = Map::new();
        for (container_port, host_port) in ports {
            let port = if container_port.contains('/') {
                container_port.clone()
            } else {
                format!("{}/tcp", container_port)
            };
            let host_port = match host_port {
                Value::String(s) => s.clone(),
                other => other.to_string(),
            };
            exposed.insert(port.clone(), json!({}));
            bindings.insert(port, json!([{ "HostPort": host_port }]));
        }
        spec["ExposedPorts"] = Value::Object(exposed);
        host_config.insert("PortBindings".into(), Value::Object(bindings));
    }

    if let Some(volumes) = volumes.filter(|v| !v.is_empty()) {
        let binds: Vec<String> = volumes
            .iter()
            .map(|(host, container)| format!("{}:{}:rw", host, container.as_str().unwrap_or_default()))
            .collect();
        host_config.insert("Binds".into(), json!(binds));
    }

    if !host_config.is_empty() {
        spec["HostConfig"] = Value::Object(host_config);
    }
    spec
}

/// Rebuild a create body from `GET /containers/{id}/json`.
fn spec_from_inspect(info: &Value) -> Value {
    let mut spec = json!({ "Image": info["Config"]["Image"] });
    if let Some(cmd) = info["Config"]["Cmd"].as_array() {
        spec["Cmd"] = json!(cmd);
    }
    if let Some(env) = info["Config"]["Env"].as_array() {
        spec["Env"] = json!(env);
    }
    if let Some(exposed) = info["Config"]["ExposedPorts"].as_object() {
        spec["ExposedPorts"] = json!(exposed);
    }

    let mut host_config = Map::new();
    if let Some(bindings) = info["HostConfig"]["PortBindings"].as_object() {
        let first_only: Map<String, Value> = bindings
            .iter()
            .filter_map(|(port, binds)| {
                let host_port = binds.get(0)?.get("HostPort")?.clone();
                Some((port.clone(), json!([{ "HostPort": host_port }])))
            })
            .collect();
        if !first_only.is_empty() {
            host_config.insert("PortBindings".into(), Value::Object(first_only));
        }
    }
    if let Some(binds) = info["HostConfig"]["Binds"].as_array() {
        host_config.insert("Binds".into(), json!(binds));
    }
    if !host_config.is_empty() {
        spec["HostConfig"] = Value::Object(host_config);
    }
    spec
}

/// `NetworkSettings.Ports`-style map from a list entry's `Ports` array.
fn port_map(ports: &Value) -> Value {
    let mut map = Map::new();
    for p in ports.as_array().into_iter().flatten() {
        let key = format!(
            "{}/{}",
            p["PrivatePort"],
            p["Type"].as_str().unwrap_or("tcp")
        );
        let entry = map.entry(key).or_insert(Value::Null);
        if let Some(public) = p["PublicPort"].as_u64() {
            let binding = json!({
                "HostIp": p["IP"].as_str().unwrap_or("0.0.0.0"),
                "HostPort": public.to_string(),
            });
            match entry {
                Value::Array(list) => list.push(binding),
                _ => *entry = json!([binding]),
            }
        }
    }
    Value::Object(map)
}

/// The first `{"error": ...}` line of a progress stream, if any.
fn stream_error(body: &str) -> Option<String> {
    body.lines()
        .filter_map(|line| serde_json::from_str::<Value>(line).ok())
        .find_map(|v| v["error"].as_str().map(String::from))
}

impl Docker {
    pub fn from_env() -> Result<Self> {
        let host = config::with_default("DOCKER_HOST", DEFAULT_HOST);
        let version = config::optional("DOCKER_API_VERSION");
        let endpoint = endpoint(&host, version.as_deref())?;
        let builder = RestClient::builder("Docker", endpoint.base).timeout(config::http_timeout());
        let client = match endpoint.socket {
            Some(socket) => builder.unix_socket(socket),
            None => builder,
        }
        .build()?;
        tracing::info!(
            base = client.base_url(),
            socket = ?client.socket_path(),
            "docker engine endpoint"
        );
        Ok(Self::new(client))
    }

    pub fn new(client: RestClient) -> Self {
        Self { client }
    }

    async fn create(&self, name: Option<&str>, spec: Value) -> Result<String> {
        let reply = self
            .client
            .post("/containers/create")
            .query_opt("name", name)
            .json(spec)
            .send()
            .await?;
        let body = reply.json()?;
        body["Id"]
            .as_str()
            .map(String::from)
            .ok_or_else(|| AdapterError::Unsupported("container create returned no Id".into()))
    }

    async fn start(&self, id: &str) -> Result<()> {
        let reply = self
            .client
            .post(format!("/containers/{}/start", id))
            .send_unchecked()
            .await?;
        // 304: already running
        if reply.status.is_success() || reply.status_code() == 304 {
            Ok(())
        } else {
            Err(AdapterError::status("Docker", reply.status_code(), &reply.text()))
        }
    }

    fn spec_from_args(args: &Value) -> Result<Value> {
        Ok(container_spec(
            args::str(args, "image")?,
            args.get("command").cloned(),
            args::opt_object(args, "ports")?.as_ref(),
            args::opt_object(args, "environment")?.as_ref(),
            args::opt_object(args, "volumes")?.as_ref(),
        ))
    }

    async fn list_containers(&self, args: &Value) -> Result<String> {
        let reply = self
            .client
            .get("/containers/json")
            .query("all", args::bool_or(args, "show_all", false))
            .send()
            .await
            .context("Error listing containers")?;
        let containers: Vec<Value> = reply
            .json()?
            .as_array()
            .into_iter()
            .flatten()
            .map(|c| {
                json!({
                    "id": short_id(c["Id"].as_str().unwrap_or_default()),
                    "name": c["Names"][0].as_str().unwrap_or_default().trim_start_matches('/'),
                    "image": c["Image"],
                    "status": c["State"],
                    "created": created(&c["Created"]),
                    "ports": port_map(&c["Ports"]),
                })
            })
            .collect();
        Ok(pretty(&json!(containers)))
    }

    async fn create_container(&self, args: &Value) -> Result<String> {
        let spec = Self::spec_from_args(args)?;
        let id = self
            .create(args::opt_str(args, "name"), spec)
            .await
            .context("Error creating container")?;
        Ok(format!("Container created successfully with ID: {}", short_id(&id)))
    }

    async fn run_container(&self, args: &Value) -> Result<String> {
        let spec = Self::spec_from_args(args)?;
        let id = async {
            let id = self.create(args::opt_str(args, "name"), spec).await?;
            self.start(&id).await?;
            Ok::<_, AdapterError>(id)
        }
        .await
        .context("Error running container")?;
        Ok(format!("Container started successfully with ID: {}", short_id(&id)))
    }

    async fn recreate_container(&self, args: &Value) -> Result<String> {
        let container_id = args::str(args, "container_id")?;
        let start = args::bool_or(args, "start", true);
        let id = async {
            let info = self
                .client
                .get(format!("/containers/{}/json", container_id))
                .send()
                .await?
                .json()?;
            let name = info["Name"].as_str().unwrap_or_default().trim_start_matches('/').to_string();
            let spec = spec_from_inspect(&info);

            self.client
                .delete(format!("/containers/{}", container_id))
                .query("force", true)
                .send()
                .await?;

            let name = (!name.is_empty()).then_some(name);
            let id = self.create(name.as_deref(), spec).await?;
            if start {
                self.start(&id).await?;
            }
            Ok::<_, AdapterError>(id)
        }
        .await
        .context("Error recreating container")?;

        let status = if start { "started" } else { "created" };
        Ok(format!("Container recreated and {} with ID: {}", status, short_id(&id)))
    }

    async fn fetch_container_logs(&self, args: &Value) -> Result<String> {
        let container_id = args::str(args, "container_id")?;
        let reply = self
            .client
            .get(format!("/containers/{}/logs", container_id))
            .query("stdout", true)
            .query("stderr", true)
            .query("tail", args::u64_or(args, "tail", 100))
            .send()
            .await
            .context("Error fetching container logs")?;
        let logs = demux_logs(reply.bytes());
        if logs.trim().is_empty() {
            Ok("No logs available".to_string())
        } else {
            Ok(logs)
        }
    }

    async fn list_images(&self) -> Result<String> {
        let reply = self
            .client
            .get("/images/json")
            .send()
            .await
            .context("Error listing images")?;
        let images: Vec<Value> = reply
            .json()?
            .as_array()
            .into_iter()
            .flatten()
            .map(|img| {
                let tags = match img["RepoTags"].as_array() {
                    Some(tags) if !tags.is_empty() => json!(tags),
                    _ => json!(["<none>"]),
                };
                let size = img["Size"].as_f64().unwrap_or(0.0);
                json!({
                    "id": short_id(img["Id"].as_str().unwrap_or_default()),
                    "tags": tags,
                    "size": format!("{:.2} MB", size / 1_000_000.0),
                    "created": created(&img["Created"]),
                })
            })
            .collect();
        Ok(pretty(&json!(images)))
    }

    async fn pull_image(&self, args: &Value) -> Result<String> {
        let image = args::str(args, "image_name")?;
        let tag = args::str_or(args, "tag", "latest");
        let full_name = format!("{}:{}", image, tag);
        let reply = self
            .client
            .post("/images/create")
            .query("fromImage", image)
            .query("tag", tag)
            .send()
            .await
            .context("Error pulling image")?;
        if let Some(err) = stream_error(&reply.text()) {
            return Err(AdapterError::invalid(err)).context("Error pulling image");
        }
        Ok(format!("Image {} pulled successfully", full_name))
    }

    async fn push_image(&self, args: &Value) -> Result<String> {
        let image = args::str(args, "image_name")?;
        let tag = args::str_or(args, "tag", "latest");
        let full_name = format!("{}:{}", image, tag);
        // The daemon insists on the header even when the registry needs no credentials.
        let registry_auth = base64::engine::general_purpose::STANDARD.encode("{}");
        let reply = self
            .client
            .post(format!("/images/{}/push", image))
            .query("tag", tag)
            .header("X-Registry-Auth", registry_auth)
            .send()
            .await
            .context("Error pushing image")?;
        if let Some(err) = stream_error(&reply.text()) {
            return Err(AdapterError::invalid(err)).context("Error pushing image");
        }
        Ok(format!("Image {} pushed successfully", full_name))
    }

    async fn list_networks(&self) -> Result<String> {
        let reply = self
            .client
            .get("/networks")
            .send()
            .await
            .context("Error listing networks")?;
        let networks: Vec<Value> = reply
            .json()?
            .as_array()
            .into_iter()
            .flatten()
            .map(|n| {
                let containers: Vec<&String> = n["Containers"]
                    .as_object()
                    .map(|c| c.keys().collect())
                    .unwrap_or_default();
                json!({
                    "id": short_id(n["Id"].as_str().unwrap_or_default()),
                    "name": n["Name"],
                    "driver": n["Driver"],
                    "scope": n["Scope"],
                    "containers": containers,
                })
            })
            .collect();
        Ok(pretty(&json!(networks)))
    }

    async fn create_network(&self, args: &Value) -> Result<String> {
        let mut body = json!({
            "Name": args::str(args, "name")?,
            "Driver": args::str_or(args, "driver", "bridge"),
            "Internal": args::bool_or(args, "internal", false),
        });
        if let Some(labels) = args::opt_object(args, "labels")? {
            body["Labels"] = Value::Object(labels);
        }
        let reply = self
            .client
            .post("/networks/create")
            .json(body)
            .send()
            .await
            .context("Error creating network")?;
        let id = reply.json()?["Id"].as_str().map(short_id).unwrap_or_default();
        Ok(format!("Network created successfully with ID: {}", id))
    }

    async fn list_volumes(&self) -> Result<String> {
        let reply = self
            .client
            .get("/volumes")
            .send()
            .await
            .context("Error listing volumes")?;
        let volumes: Vec<Value> = reply.json()?["Volumes"]
            .as_array()
            .into_iter()
            .flatten()
            .map(|v| {
                json!({
                    "name": v["Name"],
                    "driver": v["Driver"],
                    "mountpoint": v["Mountpoint"],
                    "created": v["CreatedAt"],
                })
            })
            .collect();
        Ok(pretty(&json!(volumes)))
    }

    async fn create_volume(&self, args: &Value) -> Result<String> {
        let mut body = json!({
            "Name": args::str(args, "name")?,
            "Driver": args::str_or(args, "driver", "local"),
        });
        if let Some(labels) = args::opt_object(args, "labels")? {
            body["Labels"] = Value::Object(labels);
        }
        self.client
            .post("/volumes/create")
            .json(body)
            .send()
            .await
            .context("Error creating volume")?;
        Ok("Volume created successfully".to_string())
    }
}

#[async_trait]
impl Adapter for Docker {
    fn name(&self) -> &'static str {
        "docker"
    }

    fn instructions(&self) -> &'static str {
        "Docker: manage containers, images, networks and volumes on a Docker Engine reachable over TCP."
    }

    fn tools(&self) -> Vec<Value> {
        let container_args = json!({
            "type": "object",
            "properties": {
                "image": { "type": "string", "description": "Image to run" },
                "name": { "type": "string" },
                "command": { "type": ["string", "array"], "description": "Command, split on whitespace when a string" },
                "ports": { "type": "object", "description": "Container port to host port, e.g. {\"8080/tcp\": \"80\"}" },
                "environment": { "type": "object", "description": "Environment variables" },
                "volumes": { "type": "object", "description": "Host path to container path" }
            },
            "required": ["image"]
        });
        let container_id = |extra: Value| {
            let mut properties = json!({ "container_id": { "type": "string", "description": "Container ID or name" } });
            if let (Some(props), Value::Object(extra)) = (properties.as_object_mut(), extra) {
                props.extend(extra);
            }
            json!({ "type": "object", "properties": properties, "required": ["container_id"] })
        };
        let image_tag = json!({
            "type": "object",
            "properties": {
                "image_name": { "type": "string" },
                "tag": { "type": "string", "default": "latest" }
            },
            "required": ["image_name"]
        });
        let labelled = |driver: &str| {
            json!({
                "type": "object",
                "properties": {
                    "name": { "type": "string" },
                    "driver": { "type": "string", "default": driver },
                    "labels": { "type": "object" }
                },
                "required": ["name"]
            })
        };

        let mut network = labelled("bridge");
        network["properties"]["internal"] = json!({ "type": "boolean", "default": false });

        vec![
            tool("list_containers", "List running containers, or all with show_all.", json!({
                "type": "object",
                "properties": { "show_all": { "type": "boolean", "default": false } }
            })),
            tool("create_container", "Create a container without starting it.", container_args.clone()),
            tool("run_container", "Create and start a container.", container_args),
            tool("recreate_container", "Recreate a container with the same settings.", container_id(json!({
                "start": { "type": "boolean", "default": true }
            }))),
            tool("start_container", "Start a stopped container.", container_id(json!({}))),
            tool("fetch_container_logs", "Fetch the last lines of a container's logs.", container_id(json!({
                "tail": { "type": "integer", "default": 100 }
            }))),
            tool("stop_container", "Stop a running container.", container_id(json!({
                "timeout": { "type": "integer", "default": 10, "description": "Seconds to wait before killing" }
            }))),
            tool("remove_container", "Remove a container.", container_id(json!({
                "force": { "type": "boolean", "default": false }
            }))),
            tool("list_images", "List local images.", no_args()),
            tool("pull_image", "Pull an image from a registry.", image_tag.clone()),
            tool("push_image", "Push an image to a registry.", image_tag),
            tool("remove_image", "Remove a local image.", json!({
                "type": "object",
                "properties": {
                    "image_name": { "type": "string", "description": "Image ID or name" },
                    "force": { "type": "boolean", "default": false }
                },
                "required": ["image_name"]
            })),
            tool("list_networks", "List networks.", no_args()),
            tool("create_network", "Create a network.", network),
            tool("remove_network", "Remove a network.", json!({
                "type": "object",
                "properties": { "network_id": { "type": "string" } },
                "required": ["network_id"]
            })),
            tool("list_volumes", "List volumes.", no_args()),
            tool("create_volume", "Create a volume.", labelled("local")),
            tool("remove_volume", "Remove a volume.", json!({
                "type": "object",
                "properties": {
                    "name": { "type": "string" },
                    "force": { "type": "boolean", "default": false }
                },
                "required": ["name"]
            })),
        ]
    }

    async fn call_tool(&self, name: &str, args: &Value) -> Result<String> {
        match name {
            "list_containers" => self.list_containers(args).await,
            "create_container" => self.create_container(args).await,
            "run_container" => self.run_container(args).await,
            "recreate_container" => self.recreate_container(args).await,
            "start_container" => {
                let id = args::str(args, "container_id")?;
                self.start(id).await.context("Error starting container")?;
                Ok(format!("Container {} started successfully", id))
            }
            "fetch_container_logs" => self.fetch_container_logs(args).await,
            "stop_container" => {
                let id = args::str(args, "container_id")?;
                let reply = self
                    .client
                    .post(format!("/containers/{}/stop", id))
                    .query("t", args::u64_or(args, "timeout", 10))
                    .send_unchecked()
                    .await
                    .context("Error stopping container")?;
                // 304: already stopped
                if !reply.status.is_success() && reply.status_code() != 304 {
                    return Err(AdapterError::status("Docker", reply.status_code(), &reply.text()))
                        .context("Error stopping container");
                }
                Ok(format!("Container {} stopped successfully", id))
            }
            "remove_container" => {
                let id = args::str(args, "container_id")?;
                self.client
                    .delete(format!("/containers/{}", id))
                    .query("force", args::bool_or(args, "force", false))
                    .send()
                    .await
                    .context("Error removing container")?;
                Ok(format!("Container {} removed successfully", id))
            }
            "list_images" => self.list_images().await,
            "pull_image" => self.pull_image(args).await,
            "push_image" => self.push_image(args).await,
            "remove_image" => {
                let image = args::str(args, "image_name")?;
                self.client
                    .delete(format!("/images/{}", image))
                    .query("force", args::bool_or(args, "force", false))
                    .send()
                    .await
                    .context("Error removing image")?;
                Ok(format!("Image {} removed successfully", image))
            }
            "list_networks" => self.list_networks().await,
            "create_network" => self.create_network(args).await,
            "remove_network" => {
                let id = args::str(args, "network_id")?;
                self.client
                    .delete(format!("/networks/{}", id))
                    .send()
                    .await
                    .context("Error removing network")?;
                Ok(format!("Network {} removed successfully", id))
            }
            "list_volumes" => self.list_volumes().await,
            "create_volume" => self.create_volume(args).await,
            "remove_volume" => {
                let volume = args::str(args, "name")?;
                self.client
                    .delete(format!("/volumes/{}", volume))
                    .query("force", args::bool_or(args, "force", false))
                    .send()
                    .await
                    .context("Error removing volume")?;
                Ok(format!("Volume {} removed successfully", volume))
            }
            _ => Err(AdapterError::UnknownTool(name.to_string())),
        }
    }
}
