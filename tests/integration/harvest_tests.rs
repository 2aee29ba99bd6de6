//! Integration tests for the harvest loop
//!
//! These tests drive the real [`Harvester`] against a scripted browser
//! session. Tokio's clock is paused, so backoff and pacing waits elapse
//! instantly while still being measurable.

use crate::common::*;
use chrono::{TimeZone, Utc};
use std::fs;
use tempfile::TempDir;
use tokio::sync::watch;
use tokio::time::{Duration, Instant};
use tweet_harvest::harvest::{
    Harvester, HarvestOutcome, HarvestRequest, SearchTab, WriteMode,
};
use tweet_harvest::HarvestError;

fn search_request(limit: usize) -> HarvestRequest {
    let mut request = HarvestRequest::search(TOKEN, "rust lang");
    request.target_count = limit;
    request.delay_each_secs = 0;
    request.delay_batch_secs = 0;
    request.output_filename = Some("results.csv".to_string());
    request
}

fn harvester(
    session: ScriptedSession,
    request: HarvestRequest,
    dir: &TempDir,
) -> Harvester<ScriptedSession> {
    let started_at = Utc.with_ymd_and_hms(2024, 1, 2, 3, 4, 5).unwrap();
    Harvester::new(session, request, create_test_config(dir.path()), &started_at)
}

#[tokio::test(start_paused = true)]
async fn test_batch_overshooting_target_is_kept_whole() {
    let dir = TempDir::new().unwrap();
    let session = ScriptedSession::new(vec![PageScript::bodies(vec![search_page(1, 7)])]);

    let mut harvester = harvester(session, search_request(5), &dir);
    let result = harvester.run().await.unwrap();

    assert_eq!(result.total_records, 7);
    assert_eq!(result.outcome, HarvestOutcome::TargetReached);
    assert_eq!(result.used_tabs, vec![SearchTab::Latest]);
    assert!(result.file_path.is_absolute());
    assert!(result.file_path.ends_with("results.csv"));

    let rows = csv_rows(&result.file_path);
    assert_eq!(rows.len(), 7);
    assert_eq!(
        csv_column(&result.file_path, "tweet_url")[0],
        "https://x.com/alice/status/1"
    );

    let session = harvester.into_session();
    assert!(session.closed);
    assert!(session.navigations[0].contains("f=live"));
}

#[tokio::test(start_paused = true)]
async fn test_no_results_falls_back_to_alternate_tab() {
    let dir = TempDir::new().unwrap();
    let empty = search_body(vec![]);
    let session = ScriptedSession::new(vec![
        PageScript::bodies(vec![empty.clone()]).with_no_results_marker(),
        PageScript::bodies(vec![empty]).with_no_results_marker(),
    ]);

    let mut harvester = harvester(session, search_request(10), &dir);
    let result = harvester.run().await.unwrap();

    assert_eq!(result.total_records, 0);
    assert_eq!(result.outcome, HarvestOutcome::NoResults);
    assert_eq!(result.used_tabs, vec![SearchTab::Latest, SearchTab::Top]);

    let session = harvester.into_session();
    assert_eq!(session.navigations.len(), 2);
    assert!(session.navigations[0].contains("f=live"));
    assert!(session.navigations[1].contains("f=top"));
}

#[tokio::test(start_paused = true)]
async fn test_alternate_tab_results_are_saved() {
    let dir = TempDir::new().unwrap();
    let session = ScriptedSession::new(vec![
        PageScript::bodies(vec![search_body(vec![])]).with_no_results_marker(),
        PageScript::bodies(vec![search_page(1, 3)]),
    ]);

    let mut request = search_request(3);
    request.tab = SearchTab::Top;
    let mut harvester = harvester(session, request, &dir);
    let result = harvester.run().await.unwrap();

    assert_eq!(result.total_records, 3);
    assert_eq!(result.used_tabs, vec![SearchTab::Top, SearchTab::Latest]);
    assert_eq!(csv_rows(&result.file_path).len(), 3);
}

#[tokio::test(start_paused = true)]
async fn test_rate_limit_backs_off_and_retries() {
    let dir = TempDir::new().unwrap();
    let limited = "Rate limit exceeded".to_string();
    let session = ScriptedSession::new(vec![PageScript::bodies(vec![
        limited.clone(),
        limited.clone(),
        limited,
        search_page(1, 2),
    ])]);

    let mut harvester = harvester(session, search_request(2), &dir);
    let started = Instant::now();
    let result = harvester.run().await.unwrap();

    assert_eq!(result.total_records, 2);
    assert_eq!(result.outcome, HarvestOutcome::TargetReached);
    // 60s + 180s + 300s with the default backoff policy
    assert!(started.elapsed() >= Duration::from_secs(540));
    assert_eq!(harvester.state().rate_limit_count, 0);

    let session = harvester.into_session();
    assert_eq!(session.retry_clicks, 3);
    // Retries wait in place; only the data page is followed by a scroll
    assert_eq!(session.scroll_downs, 1);
}

#[tokio::test(start_paused = true)]
async fn test_thread_keeps_only_replies_to_author() {
    let dir = TempDir::new().unwrap();
    let body = thread_body(vec![
        thread_entry("100", "alice", None),
        thread_entry("101", "bob", Some("alice")),
        thread_entry("102", "carol", Some("dave")),
        cursor_entry(),
    ]);
    let session = ScriptedSession::new(vec![PageScript::bodies(vec![body])]);

    let mut request = HarvestRequest::thread(
        TOKEN,
        url::Url::parse("https://x.com/alice/status/100").unwrap(),
    );
    request.target_count = 1;
    request.delay_each_secs = 0;
    request.delay_batch_secs = 0;

    let mut harvester = harvester(session, request, &dir);
    let result = harvester.run().await.unwrap();

    assert_eq!(result.total_records, 1);
    assert!(result.used_tabs.len() == 1);
    assert_eq!(csv_column(&result.file_path, "username"), vec!["bob"]);
    assert_eq!(csv_column(&result.file_path, "full_text"), vec!["reply number 101"]);

    let session = harvester.into_session();
    assert_eq!(session.navigations, vec!["https://x.com/alice/status/100"]);
}

#[tokio::test(start_paused = true)]
async fn test_replace_mode_moves_previous_output_aside() {
    let dir = TempDir::new().unwrap();
    let previous = dir.path().join("results.csv");
    fs::write(&previous, "previous run\n").unwrap();

    let session = ScriptedSession::new(vec![PageScript::bodies(vec![search_page(1, 2)])]);
    let mut harvester = harvester(session, search_request(2), &dir);
    let result = harvester.run().await.unwrap();

    let sidecar = dir.path().join("results.old.csv");
    assert_eq!(fs::read_to_string(sidecar).unwrap(), "previous run\n");
    assert_eq!(csv_rows(&result.file_path).len(), 2);
}

#[tokio::test(start_paused = true)]
async fn test_append_mode_keeps_previous_output() {
    let dir = TempDir::new().unwrap();
    let session = ScriptedSession::new(vec![PageScript::bodies(vec![search_page(1, 2)])]);
    let mut first = harvester(session, search_request(2), &dir);
    first.run().await.unwrap();

    let session = ScriptedSession::new(vec![PageScript::bodies(vec![search_page(10, 2)])]);
    let mut request = search_request(2);
    request.write_mode = WriteMode::Append;
    let mut second = harvester(session, request, &dir);
    let result = second.run().await.unwrap();

    let content = fs::read_to_string(&result.file_path).unwrap();
    assert_eq!(content.matches("\"tweet number 1\"").count(), 1);
    assert_eq!(content.matches("\"tweet number 10\"").count(), 1);
    assert!(!dir.path().join("results.old.csv").exists());
}

#[tokio::test(start_paused = true)]
async fn test_login_redirect_is_invalid_credential() {
    let dir = TempDir::new().unwrap();
    let session = ScriptedSession::new(vec![PageScript::default()])
        .landing_on("https://x.com/i/flow/login?redirect_after_login=%2Fsearch");

    let mut harvester = harvester(session, search_request(5), &dir);
    let error = harvester.run().await.unwrap_err();

    assert!(matches!(error, HarvestError::InvalidCredential { .. }));
    let session = harvester.into_session();
    assert!(session.closed);
    assert!(session.screenshots.is_empty());
    assert_eq!(session.navigations.len(), 1);
}

#[tokio::test(start_paused = true)]
async fn test_unreadable_page_ends_tab_with_partial_results() {
    let dir = TempDir::new().unwrap();
    let session = ScriptedSession::new(vec![PageScript::bodies(vec![
        search_page(1, 2),
        "<html>Something went wrong</html>".to_string(),
    ])]);

    let mut harvester = harvester(session, search_request(10), &dir);
    let result = harvester.run().await.unwrap();

    assert_eq!(result.total_records, 2);
    assert_eq!(result.outcome, HarvestOutcome::Exhausted);
    assert_eq!(result.used_tabs, vec![SearchTab::Latest]);
    assert_eq!(csv_rows(&result.file_path).len(), 2);

    let session = harvester.into_session();
    assert_eq!(session.screenshots.len(), 1);
    assert!(session.screenshots[0]
        .to_string_lossy()
        .ends_with("Error-2024-01-02_03-04-05.png"));
    assert!(session.closed);
}

#[tokio::test(start_paused = true)]
async fn test_unreadable_first_tab_falls_back_to_alternate() {
    let dir = TempDir::new().unwrap();
    let session = ScriptedSession::new(vec![
        PageScript::bodies(vec!["<html>oops</html>".to_string()]),
        PageScript::bodies(vec![search_page(1, 2)]),
    ]);

    let mut harvester = harvester(session, search_request(2), &dir);
    let result = harvester.run().await.unwrap();

    assert_eq!(result.total_records, 2);
    assert_eq!(result.outcome, HarvestOutcome::TargetReached);
    assert_eq!(result.used_tabs, vec![SearchTab::Latest, SearchTab::Top]);
    assert_eq!(csv_rows(&result.file_path).len(), 2);
    assert!(harvester.state().found_records);
}

#[tokio::test(start_paused = true)]
async fn test_missing_entry_list_ends_attempt() {
    let dir = TempDir::new().unwrap();
    let exhausted = serde_json::json!({ "data": { "search_by_raw_query": {} } }).to_string();
    let session = ScriptedSession::new(vec![PageScript::bodies(vec![search_page(1, 2), exhausted])]);

    let mut harvester = harvester(session, search_request(10), &dir);
    let result = harvester.run().await.unwrap();

    assert_eq!(result.total_records, 2);
    assert_eq!(result.outcome, HarvestOutcome::Exhausted);
    assert_eq!(result.used_tabs, vec![SearchTab::Latest]);
}

#[tokio::test(start_paused = true)]
async fn test_stalls_trigger_recovery_then_exhaustion() {
    let dir = TempDir::new().unwrap();
    let session = ScriptedSession::new(vec![PageScript::bodies(vec![search_page(1, 1)])]);

    let mut config = create_test_config(dir.path());
    config.harvest.stall_limit = 2;
    config.harvest.recovery_limit = 2;
    let started_at = Utc.with_ymd_and_hms(2024, 1, 2, 3, 4, 5).unwrap();
    let mut harvester = Harvester::new(session, search_request(10), config, &started_at);

    let result = harvester.run().await.unwrap();

    assert_eq!(result.total_records, 1);
    assert_eq!(result.outcome, HarvestOutcome::Exhausted);
    assert_eq!(harvester.state().recovery_attempts, 2);
    assert_eq!(harvester.into_session().scroll_ups, 2);
}

#[tokio::test(start_paused = true)]
async fn test_silent_first_page_gives_up() {
    let dir = TempDir::new().unwrap();
    let session = ScriptedSession::new(vec![PageScript::default(), PageScript::default()]);

    let mut config = create_test_config(dir.path());
    config.harvest.first_page_timeouts = 3;
    let started_at = Utc.with_ymd_and_hms(2024, 1, 2, 3, 4, 5).unwrap();
    let mut harvester = Harvester::new(session, search_request(10), config, &started_at);

    let result = harvester.run().await.unwrap();

    assert_eq!(result.total_records, 0);
    assert_eq!(result.outcome, HarvestOutcome::Exhausted);
    // Nothing found on the first tab, so the other one is tried too
    assert_eq!(result.used_tabs, vec![SearchTab::Latest, SearchTab::Top]);
}

#[tokio::test(start_paused = true)]
async fn test_cancelled_run_keeps_partial_results() {
    let dir = TempDir::new().unwrap();
    let session = ScriptedSession::new(vec![PageScript::bodies(vec![search_page(1, 2)])]);
    let (cancel_tx, cancel_rx) = watch::channel(false);
    cancel_tx.send(true).unwrap();

    let mut harvester = harvester(session, search_request(10), &dir).with_cancel(cancel_rx);
    let result = harvester.run().await.unwrap();

    assert_eq!(result.outcome, HarvestOutcome::Cancelled);
    assert_eq!(result.total_records, 0);
    assert_eq!(result.used_tabs, vec![SearchTab::Latest]);
}

#[tokio::test(start_paused = true)]
async fn test_large_batch_waits_per_record_delay() {
    let dir = TempDir::new().unwrap();
    let session = ScriptedSession::new(vec![PageScript::bodies(vec![search_page(1, 25)])]);

    let mut request = search_request(25);
    request.delay_each_secs = 3;
    request.delay_batch_secs = 10;
    let mut harvester = harvester(session, request, &dir);

    let started = Instant::now();
    harvester.run().await.unwrap();
    let elapsed = started.elapsed();

    assert!(elapsed >= Duration::from_secs(3));
    assert!(elapsed < Duration::from_secs(10));
}

#[tokio::test(start_paused = true)]
async fn test_hundredth_record_waits_batch_delay() {
    let dir = TempDir::new().unwrap();
    let session = ScriptedSession::new(vec![PageScript::bodies(vec![search_page(1, 100)])]);

    let mut request = search_request(100);
    request.delay_each_secs = 3;
    request.delay_batch_secs = 10;
    let mut harvester = harvester(session, request, &dir);

    let started = Instant::now();
    harvester.run().await.unwrap();
    let elapsed = started.elapsed();

    assert!(elapsed >= Duration::from_secs(10));
    assert!(elapsed < Duration::from_secs(13));
}

#[tokio::test(start_paused = true)]
async fn test_invalid_request_rejected_before_navigation() {
    let dir = TempDir::new().unwrap();
    let mut request = search_request(10);
    request.token = "short".to_string();

    let mut harvester = harvester(ScriptedSession::default(), request, &dir);
    let error = harvester.run().await.unwrap_err();

    assert!(matches!(error, HarvestError::InvalidRequest(_)));
    let session = harvester.into_session();
    assert!(session.navigations.is_empty());
    assert!(session.closed);
}

#[tokio::test(start_paused = true)]
async fn test_unusable_output_folder_releases_session() {
    let dir = TempDir::new().unwrap();
    let blocker = dir.path().join("not-a-folder");
    fs::write(&blocker, "").unwrap();

    let config = create_test_config(&blocker.join("nested"));
    let started_at = Utc.with_ymd_and_hms(2024, 1, 2, 3, 4, 5).unwrap();
    let mut harvester =
        Harvester::new(ScriptedSession::default(), search_request(10), config, &started_at);

    let error = harvester.run().await.unwrap_err();

    assert!(matches!(error, HarvestError::Write { .. }));
    let session = harvester.into_session();
    assert!(session.navigations.is_empty());
    assert!(session.closed);
}

#[tokio::test(start_paused = true)]
async fn test_repeated_replace_runs_keep_every_backup() {
    let dir = TempDir::new().unwrap();
    fs::write(dir.path().join("results.csv"), "first run\n").unwrap();

    for start in [1, 10] {
        let session =
            ScriptedSession::new(vec![PageScript::bodies(vec![search_page(start, 2)])]);
        let mut harvester = harvester(session, search_request(2), &dir);
        harvester.run().await.unwrap();
    }

    assert_eq!(
        fs::read_to_string(dir.path().join("results.old.csv")).unwrap(),
        "first run\n"
    );
    let second_backup = fs::read_to_string(dir.path().join("results.old.1.csv")).unwrap();
    assert!(second_backup.contains("\"tweet number 1\""));

    let latest = fs::read_to_string(dir.path().join("results.csv")).unwrap();
    assert!(latest.contains("\"tweet number 10\""));
}

#[tokio::test(start_paused = true)]
async fn test_output_filename_cannot_leave_folder() {
    let dir = TempDir::new().unwrap();
    let out = dir.path().join("out");
    let session = ScriptedSession::new(vec![PageScript::bodies(vec![search_page(1, 1)])]);

    let mut request = search_request(1);
    request.output_filename = Some("../escaped".to_string());
    let config = create_test_config(&out);
    let started_at = Utc.with_ymd_and_hms(2024, 1, 2, 3, 4, 5).unwrap();
    let mut harvester = Harvester::new(session, request, config, &started_at);

    let result = harvester.run().await.unwrap();

    assert!(result.file_path.ends_with("out/_escaped.csv"));
    assert!(out.join("_escaped.csv").exists());
    assert!(!dir.path().join("escaped.csv").exists());
}
