// devops-mcp - container, cloud and deployment adapter integration tests

use serde_json::{json, Value};
use wiremock::matchers::{body_partial_json, body_string_contains, header, header_exists, method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

use devops_mcp::adapters::argocd::ArgoCd;
use devops_mcp::adapters::aws::sigv4::Credentials;
use devops_mcp::adapters::aws::Aws;
use devops_mcp::adapters::docker::Docker;
use devops_mcp::adapters::puppet::{Endpoints, Puppet};
use devops_mcp::adapters::Adapter;
use devops_mcp::http::RestClient;

fn client(service: &'static str, base: String) -> RestClient {
    RestClient::builder(service, base).build().unwrap()
}

fn parse(text: &str) -> Value {
    serde_json::from_str(text).unwrap()
}

// ── Docker ──────────────────────────────────────────────────────────────────

#[tokio::test]
async fn docker_lists_containers_in_short_form() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/containers/json"))
        .and(query_param("all", "true"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([{
            "Id": "0123456789abcdef0123456789abcdef",
            "Names": ["/web"],
            "Image": "nginx:1.25",
            "State": "running",
            "Created": 1700000000,
            "Ports": [{ "PrivatePort": 80, "PublicPort": 8080, "Type": "tcp", "IP": "0.0.0.0" }]
        }])))
        .expect(1)
        .mount(&server)
        .await;

    let out = Docker::new(client("Docker", server.uri()))
        .call_tool("list_containers", &json!({ "show_all": true }))
        .await
        .unwrap();
    let containers = parse(&out);
    let web = &containers[0];
    assert_eq!(web["id"], "0123456789ab");
    assert_eq!(web["name"], "web");
    assert_eq!(web["image"], "nginx:1.25");
    assert_eq!(web["status"], "running");
    assert_eq!(web["created"], "2023-11-14T22:13:20+00:00");
    assert_eq!(web["ports"]["80/tcp"], json!([{ "HostIp": "0.0.0.0", "HostPort": "8080" }]));
}

#[cfg(unix)]
#[tokio::test]
async fn docker_talks_to_the_engine_socket() {
    use tokio::io::{AsyncReadExt, AsyncWriteExt};

    let dir = tempfile::tempdir().unwrap();
    let socket = dir.path().join("docker.sock");
    let listener = tokio::net::UnixListener::bind(&socket).unwrap();
    let engine = tokio::spawn(async move {
        let (mut stream, _) = listener.accept().await.unwrap();
        let mut buf = vec![0u8; 4096];
        let n = stream.read(&mut buf).await.unwrap();
        stream.write_all(b"HTTP/1.1 204 No Content\r\n\r\n").await.unwrap();
        String::from_utf8_lossy(&buf[..n]).into_owned()
    });

    let rest = RestClient::builder("Docker", "http://localhost/v1.43")
        .unix_socket(&socket)
        .build()
        .unwrap();
    let out = Docker::new(rest)
        .call_tool("start_container", &json!({ "container_id": "web" }))
        .await
        .unwrap();
    assert_eq!(out, "Container web started successfully");

    let request = engine.await.unwrap().to_ascii_lowercase();
    assert!(request.starts_with("post /v1.43/containers/web/start http/1.1\r\n"));
    assert!(request.contains("host: localhost\r\n"));
}

#[tokio::test]
async fn docker_start_tolerates_already_running() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/containers/web/start"))
        .respond_with(ResponseTemplate::new(304))
        .expect(1)
        .mount(&server)
        .await;

    let out = Docker::new(client("Docker", server.uri()))
        .call_tool("start_container", &json!({ "container_id": "web" }))
        .await
        .unwrap();
    assert_eq!(out, "Container web started successfully");
}

#[tokio::test]
async fn docker_stop_passes_timeout() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/containers/web/stop"))
        .and(query_param("t", "3"))
        .respond_with(ResponseTemplate::new(204))
        .expect(1)
        .mount(&server)
        .await;

    let out = Docker::new(client("Docker", server.uri()))
        .call_tool("stop_container", &json!({ "container_id": "web", "timeout": 3 }))
        .await
        .unwrap();
    assert_eq!(out, "Container web stopped successfully");
}

#[tokio::test]
async fn docker_logs_are_demultiplexed() {
    let mut framed = vec![1, 0, 0, 0, 0, 0, 0, 6];
    framed.extend_from_slice(b"hello\n");
    framed.extend_from_slice(&[2, 0, 0, 0, 0, 0, 0, 4]);
    framed.extend_from_slice(b"oops");

    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/containers/web/logs"))
        .and(query_param("tail", "20"))
        .respond_with(ResponseTemplate::new(200).set_body_raw(framed, "application/vnd.docker.raw-stream"))
        .mount(&server)
        .await;

    let out = Docker::new(client("Docker", server.uri()))
        .call_tool("fetch_container_logs", &json!({ "container_id": "web", "tail": 20 }))
        .await
        .unwrap();
    assert_eq!(out, "hello\noops");
}

#[tokio::test]
async fn docker_pull_surfaces_stream_error() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/images/create"))
        .and(query_param("fromImage", "ghost"))
        .respond_with(ResponseTemplate::new(200).set_body_string(
            "{\"status\":\"Pulling from library/ghost\"}\n{\"error\":\"manifest unknown\"}\n",
        ))
        .mount(&server)
        .await;

    let err = Docker::new(client("Docker", server.uri()))
        .call_tool("pull_image", &json!({ "image_name": "ghost" }))
        .await
        .unwrap_err();
    assert_eq!(err.to_string(), "Error pulling image: manifest unknown");
}

// ── AWS ─────────────────────────────────────────────────────────────────────

fn aws(server: &MockServer) -> Aws {
    let creds = Credentials {
        access_key: "AKIDEXAMPLE".into(),
        secret_key: "wJalrXUtnFEMI/K7MDENG+bPxRfiCYEXAMPLEKEY".into(),
        session_token: None,
    };
    Aws::new(creds, "us-east-1".into(), Some(server.uri())).unwrap()
}

const DESCRIBE_INSTANCES: &str = r#"<?xml version="1.0" encoding="UTF-8"?>
<DescribeInstancesResponse xmlns="http://ec2.amazonaws.com/doc/2016-11-15/">
  <reservationSet>
    <item>
      <reservationId>r-1</reservationId>
      <instancesSet>
        <item>
          <instanceId>i-0abc</instanceId>
          <instanceType>t3.micro</instanceType>
          <instanceState><code>16</code><name>running</name></instanceState>
          <privateIpAddress>10.0.0.5</privateIpAddress>
          <launchTime>2024-01-02T03:04:05.000Z</launchTime>
          <tagSet>
            <item><key>env</key><value>prod</value></item>
            <item><key>Name</key><value>api-1</value></item>
          </tagSet>
        </item>
      </instancesSet>
    </item>
  </reservationSet>
</DescribeInstancesResponse>"#;

#[tokio::test]
async fn aws_describe_instances_is_signed_and_parsed() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/"))
        .and(header_exists("authorization"))
        .and(header_exists("x-amz-date"))
        .and(body_string_contains("Action=DescribeInstances"))
        .and(body_string_contains("Filter.1.Value.1=running"))
        .respond_with(ResponseTemplate::new(200).set_body_raw(DESCRIBE_INSTANCES, "text/xml"))
        .expect(1)
        .mount(&server)
        .await;

    let out = aws(&server)
        .call_tool("list_ec2_instances", &json!({ "state": "running" }))
        .await
        .unwrap();
    assert_eq!(
        parse(&out),
        json!([{
            "InstanceId": "i-0abc",
            "Name": "api-1",
            "InstanceType": "t3.micro",
            "State": "running",
            "PublicIpAddress": "None",
            "PrivateIpAddress": "10.0.0.5",
            "LaunchTime": "2024-01-02T03:04:05.000Z"
        }])
    );
}

#[tokio::test]
async fn aws_error_document_becomes_message() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/"))
        .respond_with(ResponseTemplate::new(401).set_body_raw(
            "<Response><Errors><Error><Code>AuthFailure</Code><Message>AWS was not able to validate the provided access credentials</Message></Error></Errors></Response>",
            "text/xml",
        ))
        .mount(&server)
        .await;

    let err = aws(&server)
        .call_tool("list_security_groups", &json!({}))
        .await
        .unwrap_err();
    assert_eq!(
        err.to_string(),
        "AWS API error: 401 - AuthFailure: AWS was not able to validate the provided access credentials"
    );
}

#[tokio::test]
async fn aws_lists_buckets_with_region() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/"))
        .respond_with(ResponseTemplate::new(200).set_body_raw(
            "<ListAllMyBucketsResult><Buckets>\
             <Bucket><Name>logs</Name><CreationDate>2024-01-01T00:00:00.000Z</CreationDate><BucketRegion>eu-west-1</BucketRegion></Bucket>\
             </Buckets></ListAllMyBucketsResult>",
            "application/xml",
        ))
        .expect(1)
        .mount(&server)
        .await;

    let out = aws(&server).call_tool("list_s3_buckets", &json!({})).await.unwrap();
    assert_eq!(
        parse(&out),
        json!([{ "Name": "logs", "CreationDate": "2024-01-01T00:00:00.000Z", "Region": "eu-west-1" }])
    );
}

// ── Argo CD ─────────────────────────────────────────────────────────────────

#[tokio::test]
async fn argocd_logs_in_once_and_reuses_session() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/api/v1/session"))
        .and(body_partial_json(json!({ "username": "admin", "password": "pw" })))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "token": "jwt-1" })))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/api/v1/applications"))
        .and(header("authorization", "Bearer jwt-1"))
        .and(query_param("limit", "100"))
        .and(query_param("offset", "0"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "items": [{ "metadata": { "name": "guestbook" } }] })))
        .expect(2)
        .mount(&server)
        .await;

    let adapter = ArgoCd::with_login(client("ArgoCD", server.uri()), "admin", "pw");
    for _ in 0..2 {
        let out = adapter.call_tool("list_applications", &json!({})).await.unwrap();
        assert_eq!(parse(&out)["items"][0]["metadata"]["name"], "guestbook");
    }
}

#[tokio::test]
async fn argocd_expired_session_logs_in_again() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/api/v1/session"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "token": "jwt-1" })))
        .up_to_n_times(1)
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/api/v1/session"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "token": "jwt-2" })))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/api/v1/applications/guestbook"))
        .and(header("authorization", "Bearer jwt-1"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "metadata": { "name": "guestbook" } })))
        .up_to_n_times(1)
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/api/v1/applications/guestbook"))
        .and(header("authorization", "Bearer jwt-1"))
        .respond_with(ResponseTemplate::new(401).set_body_json(json!({ "message": "token is expired" })))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/api/v1/applications/guestbook"))
        .and(header("authorization", "Bearer jwt-2"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "metadata": { "name": "guestbook" } })))
        .expect(2)
        .mount(&server)
        .await;

    let adapter = ArgoCd::with_login(client("ArgoCD", server.uri()), "admin", "pw");
    for _ in 0..3 {
        let out = adapter
            .call_tool("get_application", &json!({ "name": "guestbook" }))
            .await
            .unwrap();
        assert_eq!(parse(&out)["metadata"]["name"], "guestbook");
    }
}

#[tokio::test]
async fn argocd_failed_login_is_reported() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/api/v1/session"))
        .respond_with(ResponseTemplate::new(401).set_body_json(json!({ "message": "invalid username or password" })))
        .mount(&server)
        .await;

    let adapter = ArgoCd::with_login(client("ArgoCD", server.uri()), "admin", "bad");
    let err = adapter
        .call_tool("get_application", &json!({ "name": "guestbook" }))
        .await
        .unwrap_err();
    assert!(err.to_string().starts_with("Login failed: "));
    assert_eq!(err.http_status(), Some(401));
}

#[tokio::test]
async fn argocd_sync_defaults_to_head() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/api/v1/applications/guestbook/sync"))
        .and(body_partial_json(json!({ "revision": "HEAD", "prune": true })))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "metadata": { "name": "guestbook" } })))
        .expect(1)
        .mount(&server)
        .await;

    let out = ArgoCd::new(client("ArgoCD", server.uri()))
        .call_tool("sync_application", &json!({ "name": "guestbook", "prune": true }))
        .await
        .unwrap();
    assert_eq!(parse(&out)["metadata"]["name"], "guestbook");
}

// ── Puppet ──────────────────────────────────────────────────────────────────

fn puppet(server: &MockServer) -> Puppet {
    let rest = RestClient::builder("Puppet", server.uri())
        .follow_redirects(false)
        .build()
        .unwrap();
    Puppet::new(rest, Endpoints::single(&server.uri()))
}

#[tokio::test]
async fn puppet_group_id_from_see_other_location() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/classifier-api/v1/groups"))
        .and(body_partial_json(json!({
            "name": "web",
            "environment": "production",
            "rule": ["and", ["~", "name", ".*"]]
        })))
        .respond_with(
            ResponseTemplate::new(303)
                .insert_header("Location", "/classifier-api/v1/groups/4d1a6b9e-0f5c-4f8a-a1a4-1c2d3e4f5a6b"),
        )
        .expect(1)
        .mount(&server)
        .await;

    let out = puppet(&server)
        .call_tool(
            "create_node_group",
            &json!({ "name": "web", "description": "Web tier", "parent_id": "00000000-0000-4000-8000-000000000000" }),
        )
        .await
        .unwrap();
    assert_eq!(
        parse(&out),
        json!({
            "status": "success",
            "data": { "id": "4d1a6b9e-0f5c-4f8a-a1a4-1c2d3e4f5a6b", "name": "web" }
        })
    );
}

#[tokio::test]
async fn puppet_failures_render_error_envelope() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/classifier-api/v1/groups"))
        .respond_with(ResponseTemplate::new(500).set_body_string("database unavailable"))
        .mount(&server)
        .await;

    let out = puppet(&server).call_tool("get_node_groups", &json!({})).await.unwrap();
    assert_eq!(
        parse(&out),
        json!({
            "status": "error",
            "message": "Failed to fetch node groups: Puppet API error: 500 - database unavailable"
        })
    );
}

#[tokio::test]
async fn puppet_pin_counts_nodes() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/classifier-api/v1/groups/g1/pin"))
        .and(body_partial_json(json!({ "nodes": ["a.example.com", "b.example.com"] })))
        .respond_with(ResponseTemplate::new(204))
        .expect(1)
        .mount(&server)
        .await;

    let out = puppet(&server)
        .call_tool(
            "pin_nodes_to_group",
            &json!({ "group_id": "g1", "node_names_json": "[\"a.example.com\", \"b.example.com\"]" }),
        )
        .await
        .unwrap();
    assert_eq!(parse(&out)["message"], "Successfully pinned 2 node(s) to group g1");
}

#[tokio::test]
async fn puppet_unknown_tool_stays_an_error() {
    let server = MockServer::start().await;
    let err = puppet(&server).call_tool("reboot_master", &json!({})).await.unwrap_err();
    assert_eq!(err.to_string(), "Unknown tool: reboot_master");
}
