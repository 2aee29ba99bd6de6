//! Integration tests for configuration loading and request building

use crate::common::TOKEN;
use std::io::Write;
use tempfile::NamedTempFile;
use tweet_harvest::config::load_config_with_hash;
use tweet_harvest::harvest::{output_path, CrawlMode, HarvestRequest, SearchTab};
use tweet_harvest::{ConfigError, HarvestError};

#[test]
fn test_partial_config_keeps_defaults() {
    let mut file = NamedTempFile::new().unwrap();
    writeln!(
        file,
        r#"
[browser]
headless = false

[harvest]
stall-limit = 5

[backoff]
base-ms = 1000
max-ms = 4000

[output]
folder = "out"
"#
    )
    .unwrap();

    let (config, hash) = load_config_with_hash(file.path()).unwrap();

    assert!(!config.browser.headless);
    assert_eq!(config.browser.window_width, 1240);
    assert_eq!(config.harvest.stall_limit, 5);
    assert_eq!(config.harvest.response_timeout_ms, 1500);
    assert_eq!(config.backoff.max_ms, 4000);
    assert_eq!(config.output.folder, "out");
    assert_eq!(hash.len(), 64);
}

#[test]
fn test_backoff_ceiling_below_base_rejected() {
    let mut file = NamedTempFile::new().unwrap();
    writeln!(file, "[backoff]\nbase-ms = 5000\nmax-ms = 1000").unwrap();

    let error = load_config_with_hash(file.path()).unwrap_err();
    assert!(matches!(error, ConfigError::Validation(_)));
}

#[test]
fn test_search_request_from_front_end_parameters() {
    let request = HarvestRequest::from_parts(
        TOKEN.to_string(),
        Some("rust lang".to_string()),
        None,
        Some("01-02-2024"),
        Some("2024-02-10"),
    )
    .unwrap();
    request.validate().unwrap();

    assert_eq!(request.mode(), CrawlMode::Search);
    let url = request.navigation_url(SearchTab::Top);
    assert!(url.starts_with("https://x.com/search?q="));
    assert!(url.contains("since%3A2024-02-01"));
    assert!(url.contains("until%3A2024-02-10"));
    assert!(url.ends_with("&src=typed_query&f=top"));
}

#[test]
fn test_thread_request_output_name() {
    let request = HarvestRequest::from_parts(
        TOKEN.to_string(),
        None,
        Some("https://x.com/alice/status/1234"),
        None,
        None,
    )
    .unwrap();

    assert_eq!(request.mode(), CrawlMode::Detail);
    let path = output_path(
        std::path::Path::new("tweets-data"),
        &request.output_stem("2024-01-02 03:04:05"),
    );
    assert_eq!(
        path,
        std::path::PathBuf::from("tweets-data/thread_1234_2024-01-02_03-04-05.csv")
    );
}

#[test]
fn test_reversed_date_range_rejected() {
    let request = HarvestRequest::from_parts(
        TOKEN.to_string(),
        Some("rust".to_string()),
        None,
        Some("2024-03-01"),
        Some("2024-02-01"),
    )
    .unwrap();

    assert!(matches!(
        request.validate(),
        Err(HarvestError::InvalidRequest(_))
    ));
}
