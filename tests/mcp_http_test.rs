// devops-mcp - HTTP transport integration tests
//
// Drives the axum router with `tower::ServiceExt::oneshot`, so no port is
// bound. The Prometheus adapter stands in for any adapter; tool calls that
// reach the upstream are served by wiremock.

use std::sync::Arc;

use axum::body::Body;
use axum::http::{Request, StatusCode};
use http_body_util::BodyExt;
use serde_json::{json, Value};
use tower::ServiceExt;
use wiremock::matchers::{method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

use devops_mcp::adapters::prometheus::Prometheus;
use devops_mcp::http::RestClient;
use devops_mcp::mcp::McpServer;
use devops_mcp::state::AppState;

fn app_for(base: &str, secret: Option<&str>) -> axum::Router {
    let client = RestClient::builder("Prometheus", base).build().unwrap();
    let server = McpServer::new(Arc::new(Prometheus::new(client)));
    devops_mcp::create_router(AppState::new(server, secret.map(str::to_string)))
}

/// Router whose upstream is never contacted.
fn offline_app(secret: Option<&str>) -> axum::Router {
    app_for("http://127.0.0.1:9", secret)
}

fn rpc(body: Value) -> Request<Body> {
    Request::builder()
        .method("POST")
        .uri("/mcp")
        .header("content-type", "application/json")
        .body(Body::from(body.to_string()))
        .unwrap()
}

async fn body_json(response: axum::response::Response) -> Value {
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    serde_json::from_slice(&bytes).unwrap()
}

#[tokio::test]
async fn health_reports_adapter_and_version() {
    let response = offline_app(None)
        .oneshot(Request::builder().uri("/health").body(Body::empty()).unwrap())
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let json = body_json(response).await;
    assert_eq!(json["status"], "ok");
    assert_eq!(json["adapter"], "prometheus");
    assert_eq!(json["version"], env!("CARGO_PKG_VERSION"));
    assert!(json["uptime_seconds"].is_u64());
}

#[tokio::test]
async fn health_skips_auth() {
    let response = offline_app(Some("s3cret"))
        .oneshot(Request::builder().uri("/health").body(Body::empty()).unwrap())
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
}

#[tokio::test]
async fn initialize_advertises_capabilities() {
    let response = offline_app(None)
        .oneshot(rpc(json!({
            "jsonrpc": "2.0", "id": 1, "method": "initialize",
            "params": { "protocolVersion": "2024-11-05", "capabilities": {} }
        })))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let json = body_json(response).await;
    assert_eq!(json["id"], 1);
    let result = &json["result"];
    assert_eq!(result["protocolVersion"], "2024-11-05");
    assert_eq!(result["serverInfo"]["name"], "prometheus");
    assert!(result["capabilities"]["tools"].is_object());
    assert!(result["capabilities"]["resources"].is_object());
    assert!(result["capabilities"]["prompts"].is_object());
}

#[tokio::test]
async fn tools_list_has_schemas() {
    let response = offline_app(None)
        .oneshot(rpc(json!({ "jsonrpc": "2.0", "id": "a", "method": "tools/list" })))
        .await
        .unwrap();

    let json = body_json(response).await;
    assert_eq!(json["id"], "a");
    let tools = json["result"]["tools"].as_array().unwrap();
    assert_eq!(tools.len(), 5);
    for tool in tools {
        assert!(tool["name"].is_string());
        assert_eq!(tool["inputSchema"]["type"], "object");
    }
}

#[tokio::test]
async fn notification_is_accepted_without_reply() {
    let response = offline_app(None)
        .oneshot(rpc(json!({ "jsonrpc": "2.0", "method": "notifications/initialized" })))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::ACCEPTED);
    assert_eq!(body_json(response).await, json!({}));
}

#[tokio::test]
async fn unparseable_body_is_a_parse_error() {
    let request = Request::builder()
        .method("POST")
        .uri("/mcp")
        .body(Body::from("{not json"))
        .unwrap();
    let response = offline_app(None).oneshot(request).await.unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let json = body_json(response).await;
    assert_eq!(json["error"]["code"], -32700);
    assert_eq!(json["id"], Value::Null);
}

#[tokio::test]
async fn unknown_method_is_rejected() {
    let response = offline_app(None)
        .oneshot(rpc(json!({ "jsonrpc": "2.0", "id": 7, "method": "sampling/createMessage" })))
        .await
        .unwrap();

    let json = body_json(response).await;
    assert_eq!(json["error"]["code"], -32601);
}

#[tokio::test]
async fn mcp_requires_bearer_when_secret_set() {
    let missing = offline_app(Some("s3cret"))
        .oneshot(rpc(json!({ "jsonrpc": "2.0", "id": 1, "method": "ping" })))
        .await
        .unwrap();
    assert_eq!(missing.status(), StatusCode::UNAUTHORIZED);

    let wrong = Request::builder()
        .method("POST")
        .uri("/mcp")
        .header("authorization", "Bearer nope")
        .body(Body::from(json!({ "jsonrpc": "2.0", "id": 1, "method": "ping" }).to_string()))
        .unwrap();
    let response = offline_app(Some("s3cret")).oneshot(wrong).await.unwrap();
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);

    let good = Request::builder()
        .method("POST")
        .uri("/mcp")
        .header("authorization", "Bearer s3cret")
        .body(Body::from(json!({ "jsonrpc": "2.0", "id": 1, "method": "ping" }).to_string()))
        .unwrap();
    let response = offline_app(Some("s3cret")).oneshot(good).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(body_json(response).await["result"], json!({}));
}

#[tokio::test]
async fn tool_call_reaches_upstream() {
    let upstream = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/api/v1/query"))
        .and(query_param("query", "up"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "status": "success",
            "data": {
                "resultType": "vector",
                "result": [{
                    "metric": { "__name__": "up", "job": "api" },
                    "value": [1_700_000_000.0, "1"]
                }]
            }
        })))
        .expect(1)
        .mount(&upstream)
        .await;

    let response = app_for(&upstream.uri(), None)
        .oneshot(rpc(json!({
            "jsonrpc": "2.0", "id": 3, "method": "tools/call",
            "params": { "name": "query_metrics", "arguments": { "query": "up" } }
        })))
        .await
        .unwrap();

    let json = body_json(response).await;
    assert_eq!(json["result"]["isError"], false);
    let text = json["result"]["content"][0]["text"].as_str().unwrap();
    assert!(text.starts_with("# Query Results\n\nQuery: `up`\nResult Type: vector\n"));
    assert!(text.contains("| up{job=\"api\"} | 1 | 2023-11-14 22:13:20 |"));
}

#[tokio::test]
async fn upstream_failure_is_a_tool_error() {
    let upstream = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/api/v1/query"))
        .respond_with(ResponseTemplate::new(503).set_body_string("overloaded"))
        .mount(&upstream)
        .await;

    let response = app_for(&upstream.uri(), None)
        .oneshot(rpc(json!({
            "jsonrpc": "2.0", "id": 4, "method": "tools/call",
            "params": { "name": "query_metrics", "arguments": { "query": "up" } }
        })))
        .await
        .unwrap();

    let json = body_json(response).await;
    assert_eq!(json["result"]["isError"], true);
    let text = json["result"]["content"][0]["text"].as_str().unwrap();
    assert!(text.starts_with("Error: Prometheus API error: 503"));
}

#[tokio::test]
async fn missing_argument_is_a_tool_error() {
    let response = offline_app(None)
        .oneshot(rpc(json!({
            "jsonrpc": "2.0", "id": 5, "method": "tools/call",
            "params": { "name": "query_metrics", "arguments": {} }
        })))
        .await
        .unwrap();

    let json = body_json(response).await;
    assert_eq!(json["result"]["isError"], true);
    assert_eq!(
        json["result"]["content"][0]["text"],
        "Error: Missing required argument: query"
    );
}
