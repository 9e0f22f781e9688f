//! Integration tests for the Notion HTTP source
//!
//! These tests use wiremock to stand in for the Notion API and check request
//! shape, pagination, retries and error classification.

use notion_wiki::cache::{CachePolicy, CacheStore};
use notion_wiki::config::{CrawlerConfig, NotionConfig};
use notion_wiki::source::{ContentSource, FetchError, HttpSource};
use notion_wiki::{run_pipeline, PipelineOptions};
use serde_json::json;
use std::sync::Arc;
use tempfile::TempDir;
use wiremock::matchers::{body_json, header, method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

const PAGE_ID: &str = "0123456789abcdef0123456789abcdef";
const CHILD_ID: &str = "fedcba9876543210fedcba9876543210";
const TOKEN: &str = "secret_test";

/// Creates a client pointed at the mock server with fast retries
fn create_source(server: &MockServer, max_retries: u32) -> HttpSource {
    let notion = NotionConfig {
        api_token: TOKEN.to_string(),
        root_id: PAGE_ID.to_string(),
        api_base_url: format!("{}/v1", server.uri()),
        ..NotionConfig::default()
    };
    let crawler = CrawlerConfig {
        min_request_interval_ms: 0,
        max_retries,
        retry_delay_ms: 1,
        request_timeout_secs: 5,
        ..CrawlerConfig::default()
    };
    HttpSource::new(&notion, &crawler).expect("Failed to build source")
}

#[tokio::test]
async fn test_get_page_sends_auth_and_version_headers() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path(format!("/v1/pages/{}", PAGE_ID)))
        .and(header("Authorization", format!("Bearer {}", TOKEN).as_str()))
        .and(header("Notion-Version", "2022-06-28"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"object": "page", "id": PAGE_ID})))
        .expect(1)
        .mount(&server)
        .await;

    let source = create_source(&server, 0);
    let page = source.get_page(PAGE_ID).await.unwrap();
    assert_eq!(page["object"], "page");
}

#[tokio::test]
async fn test_child_blocks_pagination() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path(format!("/v1/blocks/{}/children", PAGE_ID)))
        .and(query_param("page_size", "100"))
        .and(query_param("start_cursor", "cursor-2"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "results": [{"id": "b3"}],
            "has_more": false,
            "next_cursor": null
        })))
        .mount(&server)
        .await;

    Mock::given(method("GET"))
        .and(path(format!("/v1/blocks/{}/children", PAGE_ID)))
        .and(query_param("page_size", "100"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "results": [{"id": "b1"}, {"id": "b2"}],
            "has_more": true,
            "next_cursor": "cursor-2"
        })))
        .mount(&server)
        .await;

    let source = create_source(&server, 0);

    let first = source.get_child_blocks(PAGE_ID, None).await.unwrap();
    assert_eq!(first.results.len(), 2);
    assert_eq!(first.next_cursor.as_deref(), Some("cursor-2"));

    let second = source
        .get_child_blocks(PAGE_ID, first.next_cursor.as_deref())
        .await
        .unwrap();
    assert_eq!(second.results, vec![json!({"id": "b3"})]);
    assert!(second.next_cursor.is_none());
}

#[tokio::test]
async fn test_query_database_posts_cursor() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path(format!("/v1/databases/{}/query", PAGE_ID)))
        .and(body_json(json!({"page_size": 100, "start_cursor": "abc"})))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "results": [{"id": CHILD_ID}],
            "has_more": false
        })))
        .expect(1)
        .mount(&server)
        .await;

    let source = create_source(&server, 0);
    let page = source.query_database(PAGE_ID, Some("abc")).await.unwrap();
    assert_eq!(page.results.len(), 1);
}

#[tokio::test]
async fn test_not_found_and_forbidden() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path(format!("/v1/pages/{}", PAGE_ID)))
        .respond_with(ResponseTemplate::new(404))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path(format!("/v1/databases/{}", PAGE_ID)))
        .respond_with(ResponseTemplate::new(403))
        .expect(1)
        .mount(&server)
        .await;

    let source = create_source(&server, 3);
    assert!(source.get_page(PAGE_ID).await.unwrap_err().is_not_found());
    assert!(source.get_database(PAGE_ID).await.unwrap_err().is_not_found());
}

#[tokio::test]
async fn test_rate_limit_is_retried() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path(format!("/v1/pages/{}", PAGE_ID)))
        .respond_with(ResponseTemplate::new(429).insert_header("Retry-After", "0"))
        .up_to_n_times(1)
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path(format!("/v1/pages/{}", PAGE_ID)))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"object": "page"})))
        .expect(1)
        .mount(&server)
        .await;

    let source = create_source(&server, 2);
    assert!(source.get_page(PAGE_ID).await.is_ok());
}

#[tokio::test]
async fn test_server_errors_exhaust_retries() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path(format!("/v1/pages/{}", PAGE_ID)))
        .respond_with(ResponseTemplate::new(503))
        .expect(3)
        .mount(&server)
        .await;

    let source = create_source(&server, 2);
    let error = source.get_page(PAGE_ID).await.unwrap_err();

    assert!(error.is_transient());
    assert!(error.to_string().contains("after 2 retries"));
}

#[tokio::test]
async fn test_bad_request_is_rejected_with_message() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path(format!("/v1/pages/{}", PAGE_ID)))
        .respond_with(ResponseTemplate::new(401).set_body_json(json!({
            "object": "error",
            "code": "unauthorized",
            "message": "API token is invalid."
        })))
        .expect(1)
        .mount(&server)
        .await;

    let source = create_source(&server, 3);
    match source.get_page(PAGE_ID).await {
        Err(FetchError::Rejected {
            status, message, ..
        }) => {
            assert_eq!(status, 401);
            assert_eq!(message, "API token is invalid.");
        }
        other => panic!("Expected Rejected, got {:?}", other),
    }
}

#[tokio::test]
async fn test_malformed_body_is_invalid_response() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path(format!("/v1/pages/{}", PAGE_ID)))
        .respond_with(ResponseTemplate::new(200).set_body_string("<html>oops</html>"))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path(format!("/v1/blocks/{}/children", PAGE_ID)))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"object": "list"})))
        .mount(&server)
        .await;

    let source = create_source(&server, 0);
    assert!(matches!(
        source.get_page(PAGE_ID).await,
        Err(FetchError::InvalidResponse { .. })
    ));
    assert!(matches!(
        source.get_child_blocks(PAGE_ID, None).await,
        Err(FetchError::InvalidResponse { .. })
    ));
}

#[tokio::test]
async fn test_full_run_over_http() {
    let server = MockServer::start().await;
    let title = |text: &str| json!([{"type": "text", "plain_text": text}]);

    Mock::given(method("GET"))
        .and(path(format!("/v1/pages/{}", PAGE_ID)))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "object": "page",
            "properties": {"Name": {"type": "title", "title": title("Home")}}
        })))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path(format!("/v1/blocks/{}/children", PAGE_ID)))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "results": [
                {"id": "b1", "type": "heading_1", "has_children": false,
                 "heading_1": {"rich_text": title("Welcome")}},
                {"id": CHILD_ID, "type": "child_page", "has_children": true,
                 "child_page": {"title": "About Us"}}
            ],
            "has_more": false
        })))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path(format!("/v1/blocks/{}/children", CHILD_ID)))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "results": [
                {"id": "b2", "type": "paragraph", "has_children": false,
                 "paragraph": {"rich_text": title("Hello")}}
            ],
            "has_more": false
        })))
        .expect(1)
        .mount(&server)
        .await;

    let work = TempDir::new().unwrap();
    let output = work.path().join("wiki");
    let cache = Arc::new(CacheStore::new(work.path().join("cache"), CachePolicy::new(3600)));
    let options = PipelineOptions {
        output_dir: output.clone(),
        max_concurrent_requests: 2,
    };

    let summary = run_pipeline(Arc::new(create_source(&server, 0)), cache, PAGE_ID, &options)
        .await
        .unwrap();

    assert_eq!(summary.files_written, 2);
    assert_eq!(
        std::fs::read_to_string(output.join("index.md")).unwrap(),
        "# Home\n\n# Welcome\n\n[About Us](about-us.md)\n"
    );
    assert_eq!(
        std::fs::read_to_string(output.join("about-us.md")).unwrap(),
        "# About Us\n\nHello\n"
    );
}
