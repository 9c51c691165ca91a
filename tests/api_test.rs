//! Integration tests driving the HTTP router end to end.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use axum::body::{to_bytes, Body};
use axum::http::{Method, Request, StatusCode};
use axum::Router;
use serde_json::{json, Value};
use tempfile::TempDir;
use tower::ServiceExt;

use sheet_enrichment::config::Config;
use sheet_enrichment::routes;
use sheet_enrichment::AppState;

const CONTACTS: &str = "name,email,phone\n\
                        Acme,a@acme.com,\n\
                        Globex,,\n\
                        Initech,i@initech.com,0102\n\
                        Umbrella,,\n";

fn app() -> Router {
    let config = Config {
        fetch_interval_ms: 0,
        ..Config::default()
    };
    let state = AppState::new(config).expect("Failed to build state");
    routes::app(Arc::new(state))
}

fn write_fixture(dir: &TempDir, name: &str, content: &str) -> PathBuf {
    let path = dir.path().join(name);
    std::fs::write(&path, content).expect("Failed to write fixture");
    path
}

async fn send(app: Router, method: Method, uri: &str, body: Option<Value>) -> (StatusCode, Value) {
    let body = match body {
        Some(json) => Body::from(json.to_string()),
        None => Body::empty(),
    };
    let request = Request::builder()
        .method(method)
        .uri(uri)
        .header("content-type", "application/json")
        .body(body)
        .unwrap();

    let response = app.oneshot(request).await.unwrap();
    let status = response.status();
    let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    (status, serde_json::from_slice(&bytes).unwrap())
}

async fn call(tool: &str, arguments: Value) -> (StatusCode, Value) {
    send(app(), Method::POST, &format!("/tools/{}", tool), Some(json!({ "arguments": arguments }))).await
}

fn path_arg(path: &Path) -> String {
    path.to_string_lossy().into_owned()
}

// =============================================================================
// Discovery
// =============================================================================

#[tokio::test]
async fn test_root_lists_tools() {
    let (status, body) = send(app(), Method::GET, "/", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["protocol"], "mcp");
    let tools = body["tools"].as_array().unwrap();
    assert_eq!(tools.len(), 10);
    assert!(tools.contains(&json!("analyze_file")));
    assert!(tools.contains(&json!("extract_page")));
}

#[tokio::test]
async fn test_health() {
    let (status, body) = send(app(), Method::GET, "/health", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "healthy");
}

#[tokio::test]
async fn test_tool_descriptions() {
    let (status, body) = send(app(), Method::GET, "/tools", None).await;
    assert_eq!(status, StatusCode::OK);
    let run_sql = body["tools"]
        .as_array()
        .unwrap()
        .iter()
        .find(|tool| tool["name"] == "run_sql")
        .unwrap();
    assert_eq!(run_sql["parameters"]["limit"]["default"], 100);
}

// =============================================================================
// File analysis
// =============================================================================

#[tokio::test]
async fn test_analyze_file_detailed() {
    let dir = tempfile::tempdir().unwrap();
    let path = write_fixture(&dir, "contacts.csv", CONTACTS);

    let (status, body) = call("analyze_file", json!({ "file_path": path_arg(&path), "detailed": true })).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["success"], true);

    let report = &body["result"];
    assert_eq!(report["basic_info"]["rows_count"], 4);
    assert_eq!(report["basic_info"]["columns"], json!(["name", "email", "phone"]));
    assert_eq!(report["missing_data_summary"]["total_missing_values"], 5);
    assert_eq!(report["missing_data_summary"]["critical_columns"], json!(["phone"]));
    assert_eq!(report["missing_data_summary"]["completion_rate"], 58.33);

    let patterns = report["data_patterns"].as_array().unwrap();
    let email = patterns.iter().find(|p| p["column_name"] == "email").unwrap();
    assert_eq!(email["pattern_type"], "email");

    let suggestions = report["enrichment_suggestions"].as_array().unwrap();
    assert_eq!(suggestions.len(), 2);
    assert_eq!(suggestions[0]["column"], "email");
    assert_eq!(suggestions[0]["priority"], "medium");
    assert_eq!(suggestions[1]["column"], "phone");
    assert_eq!(suggestions[1]["priority"], "high");
    assert_eq!(suggestions[1]["suggested_actions"][0], "Search company directory");
}

#[tokio::test]
async fn test_analyze_file_summary_only() {
    let dir = tempfile::tempdir().unwrap();
    let path = write_fixture(&dir, "contacts.csv", CONTACTS);

    let (status, body) = call("analyze_file", json!({ "file_path": path_arg(&path) })).await;
    assert_eq!(status, StatusCode::OK);
    assert!(body["result"].get("data_patterns").is_none());
    assert!(body["result"].get("enrichment_suggestions").is_none());
}

#[tokio::test]
async fn test_missing_file_is_not_found() {
    let (status, body) = call("analyze", json!({ "file_path": "/nonexistent/contacts.csv" })).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["success"], false);
    assert!(body["error"].as_str().unwrap().contains("contacts.csv"));
}

#[tokio::test]
async fn test_unsupported_format() {
    let dir = tempfile::tempdir().unwrap();
    let path = write_fixture(&dir, "notes.txt", "hello");
    let (status, _) = call("analyze", json!({ "file_path": path_arg(&path) })).await;
    assert_eq!(status, StatusCode::UNSUPPORTED_MEDIA_TYPE);
}

#[tokio::test]
async fn test_enrich_file_is_pending() {
    let dir = tempfile::tempdir().unwrap();
    let path = write_fixture(&dir, "contacts.csv", CONTACTS);

    let (status, body) = call(
        "enrich_file",
        json!({ "file_path": path_arg(&path), "missing_fields": ["email", "phone"] }),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["result"]["enrichment_status"], "pending");
    assert_eq!(body["result"]["original_rows"], 4);
    assert_eq!(body["result"]["fields_to_enrich"], json!(["email", "phone"]));
}

// =============================================================================
// SQL workspace
// =============================================================================

#[tokio::test]
async fn test_run_sql_over_file() {
    let dir = tempfile::tempdir().unwrap();
    let path = write_fixture(&dir, "contacts.csv", CONTACTS);

    let (status, body) = call(
        "run_sql",
        json!({ "file_path": path_arg(&path), "query": "SELECT name FROM contacts WHERE email IS NULL" }),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["result"]["row_count"], 2);
    assert_eq!(body["result"]["rows"][0]["name"], "Globex");
    assert_eq!(body["result"]["query"], "SELECT name FROM contacts WHERE email IS NULL LIMIT 100");
}

#[tokio::test]
async fn test_run_sql_rejects_writes() {
    let dir = tempfile::tempdir().unwrap();
    let path = write_fixture(&dir, "contacts.csv", CONTACTS);

    let (status, body) = call("run_sql", json!({ "file_path": path_arg(&path), "query": "DELETE FROM contacts" })).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["success"], false);
}

#[tokio::test]
async fn test_table_schema() {
    let dir = tempfile::tempdir().unwrap();
    let path = write_fixture(&dir, "contacts.csv", CONTACTS);

    let (status, body) = call("get_table_schema", json!({ "file_path": path_arg(&path) })).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["result"]["table_name"], "contacts");
    assert_eq!(body["result"]["columns"][2]["name"], "phone");
    assert_eq!(body["result"]["columns"][2]["type"], "INTEGER");
}

#[tokio::test]
async fn test_run_sql_with_case_colliding_headers() {
    let dir = tempfile::tempdir().unwrap();
    let path = write_fixture(&dir, "people.csv", "Name,name\nAcme,acme corp\n");

    let (status, body) = call(
        "run_sql",
        json!({ "file_path": path_arg(&path), "query": "SELECT \"name.1\" FROM people" }),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["result"]["rows"][0]["name.1"], "acme corp");
}

// =============================================================================
// Web tools
// =============================================================================

#[tokio::test]
async fn test_search_web() {
    let (status, body) = call("search_web", json!({ "query": "Acme Corp", "max_results": 2 })).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["result"]["result_count"], 2);
    assert_eq!(body["result"]["results"][0]["url"], "https://example.com/page1?q=Acme+Corp");
}

#[tokio::test]
async fn test_name_echo_in_body_is_ignored() {
    let body = json!({ "name": "analyze_file", "arguments": { "query": "Acme", "max_results": 1 } });
    let (status, body) = send(app(), Method::POST, "/tools/search_web", Some(body)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["result"]["result_count"], 1);
}

#[tokio::test]
async fn test_extract_page_from_inline_html() {
    let html = r#"<html><head><title>Acme</title><meta name="description" content="Acme Corp"></head>
                  <body><p>Reach us at hello@acme.test</p>
                  <a href="/contact">Contact</a></body></html>"#;

    let (status, body) = call(
        "extract_page",
        json!({ "url": "https://acme.test/", "html": html, "extract_fields": ["email"] }),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    let page = &body["result"];
    assert_eq!(page["title"], "Acme");
    assert_eq!(page["description"], "Acme Corp");
    assert_eq!(page["links"][0]["url"], "https://acme.test/contact");
    assert_eq!(page["links"][0]["is_external"], false);
    assert_eq!(page["specific_fields"]["email"], "hello@acme.test");
}

#[tokio::test]
async fn test_scrape_url_rejects_bad_url() {
    let (status, _) = call("scrape_url", json!({ "url": "not a url" })).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

// =============================================================================
// Error envelope
// =============================================================================

#[tokio::test]
async fn test_unknown_tool() {
    let (status, body) = call("drop_everything", json!({})).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["success"], false);
    assert!(body["error"].as_str().unwrap().contains("drop_everything"));
}

#[tokio::test]
async fn test_invalid_arguments() {
    let (status, body) = call("search_web", json!({ "query": "acme", "pages": 3 })).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["success"], false);

    let (status, _) = send(app(), Method::POST, "/tools/analyze_file", None).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}
