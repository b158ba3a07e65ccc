// devops-mcp - artifact and CI adapter integration tests
//
// Each adapter talks to a wiremock server standing in for the vendor API.

use serde_json::{json, Value};
use wiremock::matchers::{body_bytes, body_partial_json, header, method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

use devops_mcp::adapters::artifactory::Artifactory;
use devops_mcp::adapters::gitlab::GitLab;
use devops_mcp::adapters::jenkins::Jenkins;
use devops_mcp::adapters::nexus::Nexus;
use devops_mcp::adapters::Adapter;
use devops_mcp::http::{Auth, RestClient};

fn client(service: &'static str, base: String) -> RestClient {
    RestClient::builder(service, base).build().unwrap()
}

fn parse(text: &str) -> Value {
    serde_json::from_str(text).unwrap()
}

// ── Artifactory ─────────────────────────────────────────────────────────────

#[tokio::test]
async fn artifactory_health_falls_back_to_second_ping_path() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/api/system/ping"))
        .respond_with(ResponseTemplate::new(200).set_body_string("OK\n"))
        .expect(1)
        .mount(&server)
        .await;

    let adapter = Artifactory::new(client("Artifactory", server.uri()));
    let out = adapter.call_tool("get_system_health", &json!({})).await.unwrap();
    assert_eq!(parse(&out), json!({ "status": "healthy", "message": "OK" }));
}

#[tokio::test]
async fn artifactory_version_walks_the_endpoint_chain() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/api/system/version"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "version": "7.77.5", "revision": "77705900" })))
        .expect(1)
        .mount(&server)
        .await;

    let adapter = Artifactory::new(client("Artifactory", server.uri()));
    let out = adapter.call_tool("get_version", &json!({})).await.unwrap();
    assert_eq!(parse(&out)["version"], "7.77.5");

    let paths: Vec<String> = server
        .received_requests()
        .await
        .unwrap()
        .iter()
        .map(|r| r.url.path().to_string())
        .collect();
    assert_eq!(paths, ["/artifactory/api/system/version", "/api/system/version"]);
}

#[tokio::test]
async fn artifactory_version_fails_when_no_endpoint_answers() {
    let server = MockServer::start().await;
    let adapter = Artifactory::new(client("Artifactory", server.uri()));
    let err = adapter.call_tool("get_version", &json!({})).await.unwrap_err();
    assert!(err
        .to_string()
        .starts_with("Failed to get version info: all version endpoints failed: Artifactory API error: 404"));
    assert_eq!(server.received_requests().await.unwrap().len(), 3);
}

#[tokio::test]
async fn artifactory_system_info_falls_back_to_ping() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/artifactory/api/system"))
        .respond_with(ResponseTemplate::new(403).set_body_string("Forbidden"))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/artifactory/api/system/ping"))
        .respond_with(ResponseTemplate::new(200).set_body_string("OK"))
        .expect(1)
        .mount(&server)
        .await;

    let adapter = Artifactory::new(client("Artifactory", server.uri()));
    let out = adapter.call_tool("get_system_info", &json!({})).await.unwrap();
    assert_eq!(out, "System is responsive, but detailed system info is not available.");
}

#[tokio::test]
async fn artifactory_deploys_file_bytes() {
    let server = MockServer::start().await;
    Mock::given(method("PUT"))
        .and(path("/artifactory/libs-release/com/acme/app.jar"))
        .and(body_bytes(b"jar-bytes".to_vec()))
        .respond_with(ResponseTemplate::new(201).set_body_json(json!({ "repo": "libs-release" })))
        .expect(1)
        .mount(&server)
        .await;

    let dir = tempfile::tempdir().unwrap();
    let file = dir.path().join("app.jar");
    std::fs::write(&file, b"jar-bytes").unwrap();

    let adapter = Artifactory::new(client("Artifactory", server.uri()));
    let out = adapter
        .call_tool(
            "deploy_artifact",
            &json!({
                "repo_key": "libs-release",
                "item_path": "com/acme/app.jar",
                "file_path": file.to_str().unwrap(),
            }),
        )
        .await
        .unwrap();
    assert_eq!(out, "Successfully deployed artifact to libs-release/com/acme/app.jar");
}

#[tokio::test]
async fn artifactory_missing_file_is_rejected_before_upload() {
    let server = MockServer::start().await;
    let adapter = Artifactory::new(client("Artifactory", server.uri()));
    let err = adapter
        .call_tool(
            "deploy_artifact",
            &json!({ "repo_key": "r", "item_path": "a.txt", "file_path": "/nonexistent/a.txt" }),
        )
        .await
        .unwrap_err();
    assert_eq!(err.to_string(), "File /nonexistent/a.txt not found");
    assert!(server.received_requests().await.unwrap().is_empty());
}

#[tokio::test]
async fn artifactory_update_user_keeps_unset_fields() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/artifactory/api/security/users/jdoe"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "name": "jdoe", "email": "jdoe@example.com", "admin": true
        })))
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/artifactory/api/security/users/jdoe"))
        .and(body_partial_json(json!({
            "name": "jdoe", "email": "jdoe@example.com", "admin": false
        })))
        .respond_with(ResponseTemplate::new(200))
        .expect(1)
        .mount(&server)
        .await;

    let adapter = Artifactory::new(client("Artifactory", server.uri()));
    let out = adapter
        .call_tool("update_user", &json!({ "username": "jdoe", "admin": false }))
        .await
        .unwrap();
    assert_eq!(out, "Successfully updated user jdoe");
}

// ── Jenkins ─────────────────────────────────────────────────────────────────

#[tokio::test]
async fn jenkins_nested_job_path_and_basic_auth() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/job/platform/job/api/api/json"))
        // admin:token
        .and(header("authorization", "Basic YWRtaW46dG9rZW4="))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "name": "api", "buildable": true })))
        .expect(1)
        .mount(&server)
        .await;

    let rest = RestClient::builder("Jenkins", server.uri())
        .auth(Auth::Basic {
            username: "admin".into(),
            password: Some("token".into()),
        })
        .build()
        .unwrap();
    let out = Jenkins::new(rest)
        .call_tool("get_job_details", &json!({ "job_name": "platform/api" }))
        .await
        .unwrap();
    assert_eq!(parse(&out)["buildable"], true);
}

#[tokio::test]
async fn jenkins_parameterized_build_reports_status_code() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/job/api/buildWithParameters"))
        .and(query_param("BRANCH", "main"))
        .and(query_param("DRY_RUN", "true"))
        .respond_with(ResponseTemplate::new(201))
        .expect(1)
        .mount(&server)
        .await;

    let out = Jenkins::new(client("Jenkins", server.uri()))
        .call_tool(
            "trigger_build",
            &json!({ "job_name": "api", "parameters": { "BRANCH": "main", "DRY_RUN": true } }),
        )
        .await
        .unwrap();
    assert_eq!(parse(&out), json!({ "status": "success", "statusCode": 201 }));
}

#[tokio::test]
async fn jenkins_upstream_error_carries_status() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/job/missing/api/json"))
        .respond_with(ResponseTemplate::new(404).set_body_string("Not Found"))
        .mount(&server)
        .await;

    let err = Jenkins::new(client("Jenkins", server.uri()))
        .call_tool("get_job_details", &json!({ "job_name": "missing" }))
        .await
        .unwrap_err();
    assert_eq!(err.http_status(), Some(404));
    assert_eq!(err.to_string(), "Jenkins API error: 404 - Not Found");
}

// ── Nexus ───────────────────────────────────────────────────────────────────

#[tokio::test]
async fn nexus_retries_under_security_prefix() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/service/rest/v1/security/users"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([{ "userId": "admin" }])))
        .expect(1)
        .mount(&server)
        .await;

    let out = Nexus::new(client("Nexus", server.uri()))
        .call_tool("get_all_users", &json!({}))
        .await
        .unwrap();
    assert_eq!(parse(&out), json!([{ "userId": "admin" }]));
}

async fn nexus_paths(server: &MockServer) -> Vec<String> {
    server
        .received_requests()
        .await
        .unwrap()
        .iter()
        .map(|r| r.url.path().to_string())
        .collect()
}

#[tokio::test]
async fn nexus_falls_through_to_beta_api() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/service/rest/v1/beta/iq"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "enabled": false })))
        .expect(1)
        .mount(&server)
        .await;

    let out = Nexus::new(client("Nexus", server.uri()))
        .call_tool("get_firewall_config", &json!({}))
        .await
        .unwrap();
    assert_eq!(parse(&out), json!({ "enabled": false }));
    assert_eq!(
        nexus_paths(&server).await,
        [
            "/service/rest/v1/iq",
            "/service/rest/v1/security/iq",
            "/service/rest/beta/iq",
            "/service/rest/v1/beta/iq",
        ]
    );
}

#[tokio::test]
async fn nexus_security_endpoints_reach_legacy_service_local() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/service/local/security/ldap"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([{ "name": "corp" }])))
        .expect(1)
        .mount(&server)
        .await;

    let out = Nexus::new(client("Nexus", server.uri()))
        .call_tool("list_ldap_servers", &json!({}))
        .await
        .unwrap();
    assert_eq!(parse(&out)[0]["name"], "corp");
    assert_eq!(
        nexus_paths(&server).await,
        [
            "/service/rest/v1/security/ldap",
            "/service/rest/beta/security/ldap",
            "/service/rest/v1/beta/security/ldap",
            "/service/local/security/ldap",
        ]
    );
}

#[tokio::test]
async fn nexus_empty_reply_is_operation_successful() {
    let server = MockServer::start().await;
    Mock::given(method("DELETE"))
        .and(path("/service/rest/v1/repositories/maven-snapshots"))
        .respond_with(ResponseTemplate::new(204))
        .expect(1)
        .mount(&server)
        .await;

    let out = Nexus::new(client("Nexus", server.uri()))
        .call_tool("delete_repository", &json!({ "name": "maven-snapshots" }))
        .await
        .unwrap();
    assert_eq!(parse(&out), json!({ "message": "Operation successful" }));
}

#[tokio::test]
async fn nexus_reports_primary_error_when_all_paths_fail() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/service/rest/v1/roles"))
        .respond_with(ResponseTemplate::new(403).set_body_string("forbidden"))
        .mount(&server)
        .await;

    let err = Nexus::new(client("Nexus", server.uri()))
        .call_tool("list_roles", &json!({}))
        .await
        .unwrap_err();
    assert_eq!(err.http_status(), Some(403));
}

// ── GitLab ──────────────────────────────────────────────────────────────────

fn gitlab(server: &MockServer) -> GitLab {
    let rest = RestClient::builder("GitLab", format!("{}/api/v4", server.uri()))
        .auth(Auth::Headers(vec![("PRIVATE-TOKEN".into(), "glpat".into())]))
        .build()
        .unwrap();
    GitLab::new(rest)
}

#[tokio::test]
async fn gitlab_file_contents_are_decoded() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/api/v4/projects/42/repository/files/README.md"))
        .and(query_param("ref", "main"))
        .and(header("PRIVATE-TOKEN", "glpat"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "file_name": "README.md",
            "encoding": "base64",
            "content": "aGVsbG8K"
        })))
        .expect(1)
        .mount(&server)
        .await;

    let out = gitlab(&server)
        .call_tool(
            "get_file_contents",
            &json!({ "project_id": 42, "file_path": "README.md", "ref": "main" }),
        )
        .await
        .unwrap();
    assert_eq!(parse(&out)["decoded_content"], "hello\n");
}

#[tokio::test]
async fn gitlab_missing_file_lists_directory() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/api/v4/projects/42/repository/tree"))
        .and(query_param("path", "docs"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([
            { "name": "intro.md", "type": "blob" }
        ])))
        .expect(1)
        .mount(&server)
        .await;

    let out = gitlab(&server)
        .call_tool("get_file_contents", &json!({ "project_id": "42", "file_path": "docs" }))
        .await
        .unwrap();
    assert_eq!(parse(&out)[0]["name"], "intro.md");
}

#[tokio::test]
async fn gitlab_creates_file_when_absent() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/api/v4/projects/42/repository/files/CHANGELOG.md"))
        .and(body_partial_json(json!({ "branch": "main", "commit_message": "add changelog" })))
        .respond_with(ResponseTemplate::new(201).set_body_json(json!({
            "file_path": "CHANGELOG.md", "branch": "main"
        })))
        .expect(1)
        .mount(&server)
        .await;

    let out = gitlab(&server)
        .call_tool(
            "create_or_update_file",
            &json!({
                "project_id": 42,
                "file_path": "CHANGELOG.md",
                "branch": "main",
                "content": "# Changes\n",
                "commit_message": "add changelog"
            }),
        )
        .await
        .unwrap();
    assert_eq!(parse(&out)["file_path"], "CHANGELOG.md");
}

#[tokio::test]
async fn gitlab_push_files_picks_create_or_update_per_file() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/api/v4/projects/42/repository/files/app.py"))
        .and(query_param("ref", "main"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "file_name": "app.py" })))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/api/v4/projects/42/repository/commits"))
        .and(body_partial_json(json!({
            "branch": "main",
            "commit_message": "sync",
            "actions": [
                { "action": "update", "file_path": "app.py", "content": "print('hi')\n" },
                { "action": "create", "file_path": ".keep", "content": "" }
            ]
        })))
        .respond_with(ResponseTemplate::new(201).set_body_json(json!({ "id": "abc123" })))
        .expect(1)
        .mount(&server)
        .await;

    let out = gitlab(&server)
        .call_tool(
            "push_files",
            &json!({
                "project_id": 42,
                "branch": "main",
                "commit_message": "sync",
                "files": [
                    { "file_path": "app.py", "content": "print('hi')\n" },
                    { "file_path": ".keep", "content": "" }
                ]
            }),
        )
        .await
        .unwrap();
    assert_eq!(parse(&out)["id"], "abc123");
}

#[tokio::test]
async fn gitlab_empty_file_content_is_committed() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/api/v4/projects/42/repository/files/empty.txt"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "file_name": "empty.txt" })))
        .mount(&server)
        .await;
    Mock::given(method("PUT"))
        .and(path("/api/v4/projects/42/repository/files/empty.txt"))
        .and(body_partial_json(json!({ "content": "", "commit_message": "truncate" })))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "file_path": "empty.txt" })))
        .expect(1)
        .mount(&server)
        .await;

    let adapter = gitlab(&server);
    let out = adapter
        .call_tool(
            "create_or_update_file",
            &json!({
                "project_id": 42,
                "file_path": "empty.txt",
                "branch": "main",
                "content": "",
                "commit_message": "truncate"
            }),
        )
        .await
        .unwrap();
    assert_eq!(parse(&out)["file_path"], "empty.txt");

    let err = adapter
        .call_tool(
            "create_or_update_file",
            &json!({ "project_id": 42, "file_path": "empty.txt", "branch": "main", "commit_message": "x" }),
        )
        .await
        .unwrap_err();
    assert_eq!(err.to_string(), "Missing required argument: content");
}
