// devops-mcp - monitoring and search adapter integration tests

use serde_json::{json, Value};
use wiremock::matchers::{body_json, body_partial_json, body_string, header, method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

use devops_mcp::adapters::datadog::Datadog;
use devops_mcp::adapters::elasticsearch::Elasticsearch;
use devops_mcp::adapters::grafana::Grafana;
use devops_mcp::adapters::newrelic::NewRelic;
use devops_mcp::adapters::prometheus::Prometheus;
use devops_mcp::adapters::Adapter;
use devops_mcp::http::{Auth, RestClient};

fn client(service: &'static str, base: String) -> RestClient {
    RestClient::builder(service, base).build().unwrap()
}

fn parse(text: &str) -> Value {
    serde_json::from_str(text).unwrap()
}

// ── Grafana ─────────────────────────────────────────────────────────────────

#[tokio::test]
async fn grafana_dashboard_by_uid_with_bearer() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/api/dashboards/uid/abc123"))
        .and(header("authorization", "Bearer glsa_key"))
        .and(header("accept", "application/json"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "dashboard": { "uid": "abc123", "title": "Latency" }
        })))
        .expect(1)
        .mount(&server)
        .await;

    let rest = RestClient::builder("Grafana", server.uri())
        .auth(Auth::Bearer("glsa_key".into()))
        .build()
        .unwrap();
    let out = Grafana::new(rest)
        .call_tool("get_dashboard", &json!({ "dashboard_uid": "abc123" }))
        .await
        .unwrap();
    assert_eq!(parse(&out)["dashboard"]["title"], "Latency");
}

#[tokio::test]
async fn grafana_series_repeats_match_selectors() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/api/v1/series"))
        .and(query_param("match[]", "up"))
        .and(query_param("match[]", "process_start_time_seconds"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "status": "success", "data": [] })))
        .expect(1)
        .mount(&server)
        .await;

    let out = Grafana::new(client("Grafana", server.uri()))
        .call_tool("mimir_get_series", &json!({ "match": ["up", "process_start_time_seconds"] }))
        .await
        .unwrap();
    assert_eq!(parse(&out)["status"], "success");
}

// ── Datadog ─────────────────────────────────────────────────────────────────

fn datadog(server: &MockServer) -> Datadog {
    let rest = RestClient::builder("Datadog", server.uri())
        .auth(Auth::Headers(vec![
            ("DD-API-KEY".into(), "api".into()),
            ("DD-APPLICATION-KEY".into(), "app".into()),
        ]))
        .build()
        .unwrap();
    Datadog::new(rest)
}

#[tokio::test]
async fn datadog_submit_metric_series_body() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/api/v1/series"))
        .and(header("DD-API-KEY", "api"))
        .and(header("DD-APPLICATION-KEY", "app"))
        .and(body_partial_json(json!({
            "series": [{ "metric": "deploys.count", "points": [[1700000000, 1.5]], "tags": ["env:prod", "team:core"] }]
        })))
        .respond_with(ResponseTemplate::new(202).set_body_json(json!({ "status": "ok" })))
        .expect(1)
        .mount(&server)
        .await;

    let out = datadog(&server)
        .call_tool(
            "submit_metric",
            &json!({
                "metric_name": "deploys.count",
                "value": 1.5,
                "timestamp": 1700000000,
                "tags": "env:prod,team:core"
            }),
        )
        .await
        .unwrap();
    assert_eq!(parse(&out)["message"], "Metric submitted successfully");
}

#[tokio::test]
async fn datadog_rejects_unknown_alert_type_locally() {
    let server = MockServer::start().await;
    let err = datadog(&server)
        .call_tool("create_event", &json!({ "title": "t", "text": "x", "alert_type": "panic" }))
        .await
        .unwrap_err();
    assert!(err.to_string().starts_with("Invalid alert_type 'panic': must be one of"));
    assert!(server.received_requests().await.unwrap().is_empty());
}

#[tokio::test]
async fn datadog_monitor_lookup() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/api/v1/monitor/991"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "id": 991, "name": "CPU high" })))
        .mount(&server)
        .await;

    let out = datadog(&server)
        .call_tool("get_monitor", &json!({ "monitor_id": 991 }))
        .await
        .unwrap();
    assert_eq!(parse(&out)["name"], "CPU high");
}

// ── Prometheus ──────────────────────────────────────────────────────────────

#[tokio::test]
async fn prometheus_find_metrics_filters_by_regex() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/api/v1/label/__name__/values"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "status": "success",
            "data": ["http_requests_total", "http_request_duration_seconds", "up"]
        })))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/api/v1/metadata"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "status": "success",
            "data": {
                "http_requests_total": [{ "type": "counter", "help": "Total requests." }]
            }
        })))
        .mount(&server)
        .await;

    let out = Prometheus::new(client("Prometheus", server.uri()))
        .call_tool("find_metrics", &json!({ "pattern": "^http_" }))
        .await
        .unwrap();
    assert!(out.starts_with("# Metrics matching '^http_'\n\nFound 2 metric names.\n"));
    assert!(out.contains("- `http_requests_total` (counter): Total requests.\n"));
    assert!(out.contains("- `http_request_duration_seconds`\n"));
    assert!(!out.contains("`up`"));
}

#[tokio::test]
async fn prometheus_error_envelope_is_an_error() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/api/v1/query"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "status": "error", "errorType": "bad_data", "error": "parse error"
        })))
        .mount(&server)
        .await;

    let err = Prometheus::new(client("Prometheus", server.uri()))
        .call_tool("query_metrics", &json!({ "query": "sum(" }))
        .await
        .unwrap_err();
    assert_eq!(err.to_string(), "Prometheus API error: 200 - bad_data: parse error");
}

#[tokio::test]
async fn prometheus_analyze_rejects_windows_beyond_calendar() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/api/v1/query_range"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "status": "success", "data": { "result": [] }
        })))
        .expect(0)
        .mount(&server)
        .await;

    let adapter = Prometheus::new(client("Prometheus", server.uri()));
    let err = adapter
        .call_tool("analyze_metric", &json!({ "metric": "up", "duration": "100000000d" }))
        .await
        .unwrap_err();
    assert_eq!(
        err.to_string(),
        "Duration 100000000d reaches before the earliest supported time"
    );

    let err = adapter
        .call_tool("analyze_metric", &json!({ "metric": "up", "duration": "9999999999999999w" }))
        .await
        .unwrap_err();
    assert_eq!(err.to_string(), "Duration out of range: 9999999999999999w");
}

#[tokio::test]
async fn prometheus_metrics_resource_uses_name_regex() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/api/v1/series"))
        .and(query_param("match[]", "{__name__=~\"node_.*\"}"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "status": "success",
            "data": [{ "__name__": "node_load1", "instance": "host:9100" }]
        })))
        .expect(1)
        .mount(&server)
        .await;

    let out = Prometheus::new(client("Prometheus", server.uri()))
        .read_resource("prometheus://metrics/node_.*")
        .await
        .unwrap();
    assert!(out.contains("node_load1"));
}

// ── Elasticsearch ───────────────────────────────────────────────────────────

#[tokio::test]
async fn elasticsearch_serverless_blocks_admin_apis() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "name": "serverless",
            "version": { "number": "8.11.0", "build_flavor": "serverless" }
        })))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/_cluster/health"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "status": "green" })))
        .expect(0)
        .mount(&server)
        .await;

    let adapter = Elasticsearch::new(client("Elasticsearch", server.uri()));
    for _ in 0..2 {
        let out = adapter.call_tool("cluster_health", &json!({})).await.unwrap();
        assert_eq!(out, "Cluster health API is not available in Elasticsearch Serverless mode");
    }
}

async fn elasticsearch_flavour(server: &MockServer, flavour: &str) {
    Mock::given(method("GET"))
        .and(path("/"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "version": { "number": "8.11.0", "build_flavor": flavour }
        })))
        .mount(server)
        .await;
}

#[tokio::test]
async fn elasticsearch_serverless_index_drops_shard_settings() {
    let server = MockServer::start().await;
    elasticsearch_flavour(&server, "serverless").await;
    Mock::given(method("PUT"))
        .and(path("/logs"))
        .and(body_json(json!({
            "settings": { "refresh_interval": "5s", "index": { "codec": "best_compression" } },
            "mappings": { "properties": { "ts": { "type": "date" } } }
        })))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "acknowledged": true, "index": "logs" })))
        .expect(1)
        .mount(&server)
        .await;

    let out = Elasticsearch::new(client("Elasticsearch", server.uri()))
        .call_tool(
            "create_index",
            &json!({
                "index_name": "logs",
                "settings": {
                    "number_of_shards": 3,
                    "number_of_replicas": 1,
                    "refresh_interval": "5s",
                    "index": { "number_of_replicas": 2, "codec": "best_compression" }
                },
                "mappings": { "properties": { "ts": { "type": "date" } } }
            }),
        )
        .await
        .unwrap();
    assert_eq!(parse(&out)["index"], "logs");
}

#[tokio::test]
async fn elasticsearch_standard_index_keeps_shard_settings() {
    let server = MockServer::start().await;
    elasticsearch_flavour(&server, "default").await;
    Mock::given(method("PUT"))
        .and(path("/logs"))
        .and(body_json(json!({ "settings": { "number_of_shards": 3, "number_of_replicas": 1 } })))
        .respond_with(ResponseTemplate::new(200))
        .expect(1)
        .mount(&server)
        .await;

    let out = Elasticsearch::new(client("Elasticsearch", server.uri()))
        .call_tool(
            "create_index",
            &json!({ "index_name": "logs", "settings": { "number_of_shards": 3, "number_of_replicas": 1 } }),
        )
        .await
        .unwrap();
    assert_eq!(parse(&out), json!({ "acknowledged": true }));
}

#[tokio::test]
async fn elasticsearch_standard_cluster_health_passes_through() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "version": { "number": "8.11.0", "build_flavor": "default" }
        })))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/_cluster/health/logs"))
        .and(query_param("level", "indices"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "status": "yellow" })))
        .expect(1)
        .mount(&server)
        .await;

    let out = Elasticsearch::new(client("Elasticsearch", server.uri()))
        .call_tool("cluster_health", &json!({ "index": "logs", "level": "indices" }))
        .await
        .unwrap();
    assert_eq!(parse(&out)["status"], "yellow");
}

#[tokio::test]
async fn elasticsearch_multi_search_sends_ndjson() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/_msearch"))
        .and(header("authorization", "ApiKey abc"))
        .and(body_string(
            "{\"index\":\"logs\"}\n{\"size\":1}\n{}\n{\"size\":2}\n".to_string(),
        ))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "responses": [{}, {}] })))
        .expect(1)
        .mount(&server)
        .await;

    let rest = RestClient::builder("Elasticsearch", server.uri())
        .auth(Auth::Raw("ApiKey abc".into()))
        .build()
        .unwrap();
    let out = Elasticsearch::new(rest)
        .call_tool(
            "multi_search",
            &json!({ "searches": [{ "index": "logs", "size": 1 }, { "size": 2 }] }),
        )
        .await
        .unwrap();
    assert_eq!(parse(&out)["responses"].as_array().unwrap().len(), 2);
}

// ── New Relic ───────────────────────────────────────────────────────────────

fn newrelic(server: &MockServer) -> NewRelic {
    let rest = RestClient::builder("New Relic", server.uri())
        .auth(Auth::Headers(vec![("API-Key".into(), "NRAK-1".into())]))
        .build()
        .unwrap();
    NewRelic::new(rest)
}

#[tokio::test]
async fn newrelic_metric_data_repeats_names() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/v2/applications/42/metrics/data.json"))
        .and(header("API-Key", "NRAK-1"))
        .and(query_param("names[]", "HttpDispatcher"))
        .and(query_param("names[]", "Apdex"))
        .and(query_param("values[]", "average_response_time"))
        .and(query_param("summarize", "true"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "metric_data": { "metrics": [] } })))
        .expect(1)
        .mount(&server)
        .await;

    let out = newrelic(&server)
        .call_tool(
            "get_application_metric_data",
            &json!({
                "app_id": 42,
                "names": ["HttpDispatcher", "Apdex"],
                "values": ["average_response_time"],
                "summarize": true
            }),
        )
        .await
        .unwrap();
    assert!(parse(&out)["metric_data"].is_object());
}

#[tokio::test]
async fn newrelic_dashboard_search_via_nerdgraph() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/graphql"))
        .and(body_partial_json(json!({
            "variables": { "query": "type = 'DASHBOARD' AND accountId = 7 AND name LIKE '%api%'" }
        })))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "data": { "actor": { "entitySearch": { "count": 1, "results": { "entities": [{ "name": "api" }] } } } }
        })))
        .expect(1)
        .mount(&server)
        .await;

    let out = newrelic(&server)
        .call_tool("list_dashboards", &json!({ "account_id": 7, "name": "api" }))
        .await
        .unwrap();
    assert_eq!(parse(&out)["count"], 1);
}

#[tokio::test]
async fn newrelic_graphql_errors_fail_the_call() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/graphql"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "errors": [{ "message": "Invalid query" }]
        })))
        .mount(&server)
        .await;

    let err = newrelic(&server)
        .call_tool("list_dashboards", &json!({}))
        .await
        .unwrap_err();
    assert!(err.to_string().contains("NerdGraph error: Invalid query"));
}

#[tokio::test]
async fn newrelic_application_resource_renders_markdown() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/v2/applications/42.json"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "application": {
                "id": 42, "name": "checkout", "language": "java",
                "health_status": "green", "reporting": true
            }
        })))
        .mount(&server)
        .await;

    let adapter = newrelic(&server);
    let out = adapter.read_resource("nr://application/42").await.unwrap();
    assert!(out.starts_with("# New Relic Application: checkout\n\n- ID: 42\n- Language: java\n"));

    let err = adapter.read_resource("nr://application/abc").await.unwrap_err();
    assert_eq!(err.to_string(), "Unknown resource URI: nr://application/abc");
}

fn newrelic_split(server: &MockServer) -> NewRelic {
    let keyed = |service: &'static str, header: &str| {
        RestClient::builder(service, server.uri())
            .auth(Auth::Headers(vec![(header.into(), "NRAK-1".into())]))
            .build()
            .unwrap()
    };
    NewRelic::new(keyed("New Relic", "API-Key"))
        .with_synthetics(keyed("New Relic Synthetics", "X-Api-Key"))
        .with_infrastructure(keyed("New Relic Infrastructure", "Api-Key"))
}

#[tokio::test]
async fn newrelic_monitor_update_resends_the_uri() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/v3/monitors/m-1"))
        .and(header("X-Api-Key", "NRAK-1"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "monitor": { "id": "m-1", "name": "home", "type": "SIMPLE", "frequency": 5, "uri": "https://example.com", "status": "ENABLED", "locations": ["AWS_US_EAST_1"] }
        })))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("PUT"))
        .and(path("/v3/monitors/m-1"))
        .and(body_json(json!({ "frequency": 15, "uri": "https://example.com" })))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "monitor": { "id": "m-1", "name": "home", "type": "SIMPLE", "frequency": 15 }
        })))
        .expect(1)
        .mount(&server)
        .await;

    let nr = newrelic_split(&server);
    let out = nr
        .call_tool("update_monitor", &json!({ "monitor_id": "m-1", "frequency": 15 }))
        .await
        .unwrap();
    assert_eq!(parse(&out)["frequency"], 15);

    let err = nr
        .call_tool("update_monitor", &json!({ "monitor_id": "m-1", "frequency": 7 }))
        .await
        .unwrap_err();
    assert!(err.to_string().starts_with("Invalid frequency '7'"));
}

#[tokio::test]
async fn newrelic_monitor_create_and_delete() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/v3/monitors"))
        .and(body_partial_json(json!({ "type": "BROWSER", "status": "ENABLED", "locations": ["AWS_EU_WEST_1"] })))
        .respond_with(ResponseTemplate::new(201))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("DELETE"))
        .and(path("/v3/monitors/m-9"))
        .respond_with(ResponseTemplate::new(204))
        .expect(1)
        .mount(&server)
        .await;

    let nr = newrelic_split(&server);
    let out = nr
        .call_tool(
            "create_simple_monitor",
            &json!({
                "name": "checkout page",
                "type": "BROWSER",
                "uri": "https://example.com/checkout",
                "frequency": 10,
                "locations": "AWS_EU_WEST_1"
            }),
        )
        .await
        .unwrap();
    assert_eq!(parse(&out)["status"], "success");

    let out = nr.call_tool("delete_monitor", &json!({ "monitor_id": "m-9" })).await.unwrap();
    assert_eq!(parse(&out), json!({ "success": true, "message": "Monitor deleted successfully" }));
}

#[tokio::test]
async fn newrelic_infrastructure_uses_its_own_key() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/hosts"))
        .and(header("Api-Key", "NRAK-1"))
        .and(query_param("filter[os]", "linux"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "hosts": [{ "id": "h1", "name": "db-1" }], "links": {}
        })))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/hosts/h1"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "host": { "id": "h1", "name": "db-1" } })))
        .mount(&server)
        .await;

    let nr = newrelic_split(&server);
    let out = nr
        .call_tool("list_infrastructure_hosts", &json!({ "filter_os": "linux" }))
        .await
        .unwrap();
    assert_eq!(parse(&out), json!({ "hosts": [{ "id": "h1", "name": "db-1" }] }));

    let out = nr.call_tool("get_infrastructure_host", &json!({ "host_id": "h1" })).await.unwrap();
    assert_eq!(parse(&out)["name"], "db-1");
}

#[tokio::test]
async fn newrelic_logs_query_is_completed_before_sending() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/graphql"))
        .and(body_partial_json(json!({
            "variables": { "accountId": 1234, "query": "SELECT message WHERE level = 'error' FROM Log LIMIT 20" }
        })))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "data": { "actor": { "account": { "nrql": { "results": [{ "message": "boom" }] } } } }
        })))
        .expect(1)
        .mount(&server)
        .await;

    let out = newrelic(&server)
        .call_tool(
            "query_logs",
            &json!({ "account_id": "1234", "query": "SELECT message WHERE level = 'error'", "limit": 20 }),
        )
        .await
        .unwrap();
    assert_eq!(parse(&out)["data"]["actor"]["account"]["nrql"]["results"][0]["message"], "boom");
}

#[tokio::test]
async fn newrelic_workload_mutations_use_variables() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/graphql"))
        .and(body_partial_json(json!({
            "variables": { "accountId": 1234, "guid": "WL-1", "updateFields": { "name": "payments" } }
        })))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "data": { "workloadUpdate": { "guid": "WL-1", "name": "payments" } }
        })))
        .expect(1)
        .mount(&server)
        .await;

    let nr = newrelic(&server);
    let out = nr
        .call_tool(
            "update_workload",
            &json!({ "account_id": 1234, "workload_guid": "WL-1", "name": "payments" }),
        )
        .await
        .unwrap();
    assert_eq!(parse(&out)["data"]["workloadUpdate"]["name"], "payments");

    let err = nr
        .call_tool("get_workload", &json!({ "account_id": "prod", "workload_id": "WL-1" }))
        .await
        .unwrap_err();
    assert_eq!(err.to_string(), "account_id must be numeric, got 'prod'");
}

#[tokio::test]
async fn newrelic_dashboard_create_lays_out_widgets() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/graphql"))
        .and(body_partial_json(json!({
            "variables": {
                "accountId": 1234,
                "dashboard": {
                    "name": "Checkout",
                    "permissions": "PUBLIC_READ_WRITE",
                    "pages": [{
                        "name": "Main Page",
                        "widgets": [
                            { "title": "Widget 1", "layout": { "width": 6, "height": 3, "row": 0, "column": 0 } },
                            { "title": "Latency", "layout": { "width": 6, "height": 3, "row": 0, "column": 6 } }
                        ]
                    }]
                }
            }
        })))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "data": { "dashboardCreate": { "entityResult": { "guid": "D-1", "name": "Checkout" } } }
        })))
        .expect(1)
        .mount(&server)
        .await;

    let out = newrelic(&server)
        .call_tool(
            "create_simple_dashboard",
            &json!({
                "account_id": 1234,
                "title": "Checkout",
                "widgets": [
                    { "visualization_id": "viz.line" },
                    { "visualization_id": "viz.line", "title": "Latency" }
                ]
            }),
        )
        .await
        .unwrap();
    assert_eq!(parse(&out)["data"]["dashboardCreate"]["entityResult"]["guid"], "D-1");
}

#[tokio::test]
async fn newrelic_error_list_honours_limit() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/graphql"))
        .and(body_partial_json(json!({
            "variables": { "accountId": 1234, "filters": { "searchQuery": "TypeError" } }
        })))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "data": { "actor": { "account": { "errorTracking": { "errors": {
                "results": [{ "id": "e1" }, { "id": "e2" }, { "id": "e3" }],
                "pageInfo": { "hasNextPage": true, "endCursor": "c2" }
            } } } } }
        })))
        .expect(1)
        .mount(&server)
        .await;

    let out = newrelic(&server)
        .call_tool("list_errors", &json!({ "account_id": 1234, "query": "TypeError", "limit": 2 }))
        .await
        .unwrap();
    let errors = parse(&out);
    assert_eq!(errors["results"].as_array().unwrap().len(), 2);
    assert_eq!(errors["pageInfo"]["endCursor"], "c2");
}

#[tokio::test]
async fn newrelic_overview_resource_joins_four_lists() {
    let server = MockServer::start().await;
    let reply = |body: Value| ResponseTemplate::new(200).set_body_json(body);
    Mock::given(method("GET"))
        .and(path("/v2/applications.json"))
        .respond_with(reply(json!({ "applications": [
            { "name": "web", "application_summary": { "throughput": 900, "response_time": 80, "error_rate": 0.2 } }
        ] })))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/v2/mobile_applications.json"))
        .respond_with(reply(json!({ "applications": [] })))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/v2/alerts_policies.json"))
        .respond_with(reply(json!({ "policies": [{ "id": 4, "name": "Golden signals" }] })))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/v2/alerts_incidents.json"))
        .and(query_param("only_open", "true"))
        .respond_with(reply(json!({ "incidents": [
            { "id": 11, "opened_at": 1_700_000_000_000i64, "links": { "policy_id": 4, "violations": [1] } }
        ] })))
        .expect(1)
        .mount(&server)
        .await;

    let out = newrelic(&server).read_resource("nr://dashboard").await.unwrap();
    assert!(out.starts_with("# New Relic Dashboard\n\n## Applications\n\nTotal Applications: 1\n"));
    assert!(out.contains("- **web**\n  - Throughput: 900 rpm\n"));
    assert!(out.contains("Open Incidents: 1\n"));
    assert!(out.contains("  - Policy: Golden signals\n  - Opened: 2023-11-14 22:13:20\n"));
}

#[tokio::test]
async fn newrelic_violations_resource_passes_the_window() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/v2/alerts_violations.json"))
        .and(query_param("only_open", "false"))
        .and(query_param("start_date", "2024-01-01T00:00:00Z"))
        .and(query_param("end_date", "2024-01-02T00:00:00Z"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "violations": [] })))
        .expect(1)
        .mount(&server)
        .await;

    let out = newrelic(&server)
        .read_resource("nr://alerts/violations/false/2024-01-01T00:00:00Z/2024-01-02T00:00:00Z")
        .await
        .unwrap();
    assert_eq!(
        out,
        "# New Relic Alert Violations\n\nTime range: 2024-01-01T00:00:00Z to 2024-01-02T00:00:00Z\n\n"
    );
}

#[tokio::test]
async fn newrelic_service_levels_resource() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/graphql"))
        .and(body_partial_json(json!({ "variables": { "accountId": 1234 } })))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "data": { "actor": { "account": { "serviceLevels": { "indicators": [{
                "guid": "g1", "name": "Checkout", "entityGuid": "e1",
                "objectives": [{ "name": "Target", "target": 0.999, "timeWindow": { "rolling": { "count": 28, "unit": "DAY" } } }]
            }] } } } }
        })))
        .expect(1)
        .mount(&server)
        .await;

    let out = newrelic(&server).read_resource("nr://service_levels/1234").await.unwrap();
    assert!(out.starts_with("# New Relic Service Level Indicators (Account: 1234)\n\n## Checkout\n"));
    assert!(out.contains("  - Target: 99.9%\n  - Time Window: 28 day\n"));
}

#[tokio::test]
async fn newrelic_monitor_resource_reads_synthetics() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/v3/monitors"))
        .and(header("X-Api-Key", "NRAK-1"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "monitors": [{ "id": "m-1", "name": "home", "type": "SIMPLE", "status": "ENABLED", "frequency": 5, "uri": "https://example.com", "locations": ["AWS_US_EAST_1"] }]
        })))
        .expect(1)
        .mount(&server)
        .await;

    let out = newrelic_split(&server).read_resource("nr://synthetics/monitors").await.unwrap();
    assert!(out.starts_with("# New Relic Synthetic Monitors\n\n## home\n- ID: m-1\n"));
    assert!(out.contains("- URI: https://example.com\n"));
}
