//! Integration tests for the static page fetcher
//!
//! These tests use wiremock to create mock HTTP servers and check the
//! retry policy and batch export end-to-end.

use tempfile::TempDir;
use tweet_harvest::config::{Config, FetchConfig};
use tweet_harvest::page::{build_http_client, export_pages, fetch_many, get_html, FetchError};
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn create_test_fetch_config() -> FetchConfig {
    FetchConfig {
        base_delay_ms: 1,
        timeout_secs: 5,
        ..FetchConfig::default()
    }
}

fn article(title: &str) -> String {
    format!(
        "<html><head><title>{}</title></head><body><p>A paragraph that is long enough to be picked up.</p></body></html>",
        title
    )
}

#[tokio::test]
async fn test_server_errors_are_retried() {
    let mock_server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/flaky"))
        .respond_with(ResponseTemplate::new(503))
        .up_to_n_times(2)
        .expect(2)
        .mount(&mock_server)
        .await;

    Mock::given(method("GET"))
        .and(path("/flaky"))
        .respond_with(ResponseTemplate::new(200).set_body_string(article("Recovered")))
        .expect(1)
        .mount(&mock_server)
        .await;

    let config = create_test_fetch_config();
    let client = build_http_client(&config).unwrap();
    let html = get_html(&client, &format!("{}/flaky", mock_server.uri()), &config)
        .await
        .unwrap();

    assert!(html.contains("Recovered"));
}

#[tokio::test]
async fn test_client_errors_fail_immediately() {
    let mock_server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/missing"))
        .respond_with(ResponseTemplate::new(404))
        .expect(1)
        .mount(&mock_server)
        .await;

    let config = create_test_fetch_config();
    let client = build_http_client(&config).unwrap();
    let error = get_html(&client, &format!("{}/missing", mock_server.uri()), &config)
        .await
        .unwrap_err();

    assert!(matches!(error, FetchError::Status { status: 404, .. }));
}

#[tokio::test]
async fn test_retries_stop_at_max_attempts() {
    let mock_server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/down"))
        .respond_with(ResponseTemplate::new(500))
        .expect(3)
        .mount(&mock_server)
        .await;

    let config = create_test_fetch_config();
    let client = build_http_client(&config).unwrap();
    let error = get_html(&client, &format!("{}/down", mock_server.uri()), &config)
        .await
        .unwrap_err();

    assert!(matches!(error, FetchError::Status { status: 500, .. }));
}

#[tokio::test]
async fn test_fetch_many_keeps_order_and_failures() {
    let mock_server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/a"))
        .respond_with(ResponseTemplate::new(200).set_body_string(article("Page A")))
        .mount(&mock_server)
        .await;

    Mock::given(method("GET"))
        .and(path("/b"))
        .respond_with(ResponseTemplate::new(404))
        .mount(&mock_server)
        .await;

    Mock::given(method("GET"))
        .and(path("/c"))
        .respond_with(ResponseTemplate::new(200).set_body_string(article("Page C")))
        .mount(&mock_server)
        .await;

    let urls: Vec<String> = ["/a", "/b", "/c"]
        .iter()
        .map(|p| format!("{}{}", mock_server.uri(), p))
        .collect();

    let config = create_test_fetch_config();
    let client = build_http_client(&config).unwrap();
    let pages = fetch_many(&client, &urls, &config).await;

    assert_eq!(pages.len(), 3);
    assert_eq!(pages[0].title.as_deref(), Some("Page A"));
    assert_eq!(pages[1].url, urls[1]);
    assert!(pages[1].title.is_none());
    assert_eq!(pages[2].title.as_deref(), Some("Page C"));
    assert!(pages.iter().all(|p| p.via == "http"));
}

#[tokio::test]
async fn test_export_pages_writes_json_and_csv() {
    let mock_server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/a"))
        .respond_with(ResponseTemplate::new(200).set_body_string(article("Page A")))
        .mount(&mock_server)
        .await;

    let dir = TempDir::new().unwrap();
    let mut config = Config::default();
    config.output.folder = dir.path().to_string_lossy().into_owned();
    config.fetch = create_test_fetch_config();

    let urls = vec![format!("{}/a", mock_server.uri())];
    let (json_path, csv_path) = export_pages(&config, &urls).await.unwrap();

    assert!(json_path.to_string_lossy().ends_with("_pages.json"));
    assert!(csv_path.to_string_lossy().ends_with("_pages.csv"));

    let json = std::fs::read_to_string(json_path).unwrap();
    assert!(json.contains("\"Page A\""));
    let csv = std::fs::read_to_string(csv_path).unwrap();
    assert!(csv.starts_with("url,title,"));
}
