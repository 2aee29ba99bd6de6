//! Harvest loop - scroll, intercept, classify, save
//!
//! The [`Harvester`] owns one browsing session and one [`RunState`] for the
//! whole run. Each attempt navigates one tab and then repeats:
//!
//! 1. Race the next pagination response against a short timeout
//! 2. Classify the response (or count the timeout)
//! 3. Save extracted records, back off on rate limits, or count a stall
//! 4. Scroll down to trigger the next page
//!
//! until the target count is reached, pagination is exhausted, the page
//! reports no results, or a fatal error occurs. A search run that finds
//! nothing on the requested tab is retried once on the other tab.

use crate::config::{Config, HarvestConfig};
use crate::harvest::backoff::rate_limit_delay;
use crate::harvest::classifier::{classify_response, PageClass};
use crate::harvest::payload::{view_for, PayloadView};
use crate::harvest::request::{CrawlMode, HarvestOutcome, HarvestRequest, HarvestResult, SearchTab};
use crate::harvest::session::{BrowserSession, InterceptedResponse, SessionError};
use crate::harvest::state::RunState;
use crate::harvest::writer::{
    error_screenshot_path, output_path, prepare_output, run_timestamp, IncrementalWriter,
};
use crate::HarvestError;
use chrono::{DateTime, TimeZone};
use serde_json::Value;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tokio::sync::watch;

/// How one tab attempt ended
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum AttemptOutcome {
    TargetReached,
    Exhausted,
    NoResults,
    Cancelled,
}

impl From<AttemptOutcome> for HarvestOutcome {
    fn from(outcome: AttemptOutcome) -> Self {
        match outcome {
            AttemptOutcome::TargetReached => HarvestOutcome::TargetReached,
            AttemptOutcome::Exhausted => HarvestOutcome::Exhausted,
            AttemptOutcome::NoResults => HarvestOutcome::NoResults,
            AttemptOutcome::Cancelled => HarvestOutcome::Cancelled,
        }
    }
}

/// What the loop does after one wait-and-classify step
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Step {
    /// Scroll and wait for the next page
    Continue,
    /// Wait again without scrolling
    Retry,
    /// End the attempt
    Stop(AttemptOutcome),
}

/// Drives one harvest run over a browsing session
pub struct Harvester<S: BrowserSession> {
    session: S,
    request: HarvestRequest,
    config: Config,
    view: Box<dyn PayloadView>,
    writer: IncrementalWriter,
    state: RunState,
    run_timestamp: String,
    cancel: Option<watch::Receiver<bool>>,
}

impl<S: BrowserSession> Harvester<S> {
    /// Creates a harvester for one run started at `started_at`
    pub fn new<Tz: TimeZone>(
        session: S,
        request: HarvestRequest,
        config: Config,
        started_at: &DateTime<Tz>,
    ) -> Self
    where
        Tz::Offset: std::fmt::Display,
    {
        let run_timestamp = run_timestamp(started_at);
        let path = output_path(
            Path::new(&config.output.folder),
            &request.output_stem(&run_timestamp),
        );

        Self {
            session,
            view: view_for(&request),
            writer: IncrementalWriter::new(path),
            state: RunState::new(),
            request,
            config,
            run_timestamp,
            cancel: None,
        }
    }

    /// Stops the run at the next iteration once the signal turns `true`
    pub fn with_cancel(mut self, cancel: watch::Receiver<bool>) -> Self {
        self.cancel = Some(cancel);
        self
    }

    /// Path the run writes to
    pub fn output_path(&self) -> &Path {
        self.writer.path()
    }

    pub fn state(&self) -> &RunState {
        &self.state
    }

    /// Gives the session back, e.g. to keep it alive for inspection
    pub fn into_session(self) -> S {
        self.session
    }

    /// Runs the harvest to completion
    ///
    /// Setup failures (invalid request, invalid credential, failed
    /// navigation) and write failures are returned as errors. Any other
    /// failure ends the run early but still reports what was saved.
    pub async fn run(&mut self) -> Result<HarvestResult, HarvestError> {
        if let Err(error) = self.prepare() {
            tracing::error!("Harvest could not start: {}", error);
            self.finish().await;
            return Err(error);
        }

        tracing::info!(
            "Starting {} harvest for {} (target {} records)",
            self.request.mode(),
            self.request.describe(),
            self.request.target_count
        );

        let mut used_tabs = Vec::new();
        let outcome = match self.run_tabs(&mut used_tabs).await {
            Ok(outcome) => outcome,
            Err(error) => match self.handle_failure(error).await {
                Ok(outcome) => outcome,
                Err(error) => {
                    self.finish().await;
                    return Err(error);
                }
            },
        };

        self.finish().await;

        let file_path = self
            .state
            .last_saved_path
            .clone()
            .unwrap_or_else(|| self.writer.path().to_path_buf());

        Ok(HarvestResult {
            file_path: absolute(file_path),
            total_records: self.state.total_records,
            used_tabs,
            outcome,
        })
    }

    /// Validates the request and readies the output file
    fn prepare(&self) -> Result<(), HarvestError> {
        self.request.validate()?;

        prepare_output(self.writer.path(), self.request.write_mode).map_err(|e| {
            HarvestError::Write {
                path: self.writer.path().to_path_buf(),
                source: e.into(),
            }
        })?;
        Ok(())
    }

    /// Runs the requested tab, then the alternate tab if nothing was found
    async fn run_tabs(
        &mut self,
        used_tabs: &mut Vec<SearchTab>,
    ) -> Result<HarvestOutcome, HarvestError> {
        let primary = self.request.tab;
        let outcome = self.run_attempt(primary, used_tabs).await?;

        let retry_alternate = !self.state.found_records
            && self.request.mode() == CrawlMode::Search
            && outcome != AttemptOutcome::Cancelled;

        if !retry_alternate {
            return Ok(outcome.into());
        }

        let alternate = primary.alternate();
        tracing::info!(
            "No tweets found on \"{}\" tab, trying \"{}\" tab...",
            primary,
            alternate
        );
        let outcome = self.run_attempt(alternate, used_tabs).await?;
        Ok(outcome.into())
    }

    /// Navigates one tab and harvests it
    async fn run_attempt(
        &mut self,
        tab: SearchTab,
        used_tabs: &mut Vec<SearchTab>,
    ) -> Result<AttemptOutcome, HarvestError> {
        self.state.begin_attempt();
        used_tabs.push(tab);

        let url = self.request.navigation_url(tab);
        tracing::info!("Opening {}", url);
        self.session.navigate(&url).await?;

        let current = self.session.current_url().await?;
        if current.contains("/login") {
            tracing::error!("Invalid twitter auth token. Please check your auth token");
            return Err(HarvestError::InvalidCredential { url: current });
        }

        let outcome = self.scroll_and_save().await?;

        if self.state.total_records > 0 {
            tracing::info!(
                "Got {} tweets, done scrolling...",
                self.state.total_records
            );
        } else {
            tracing::info!("No tweets found for the search criteria");
        }

        Ok(outcome)
    }

    /// The wait-classify-save loop of one attempt
    async fn scroll_and_save(&mut self) -> Result<AttemptOutcome, HarvestError> {
        let limits = self.config.harvest.clone();
        let response_timeout = Duration::from_millis(limits.response_timeout_ms);

        loop {
            if self.is_cancelled() {
                tracing::warn!("Harvest cancelled");
                return Ok(AttemptOutcome::Cancelled);
            }

            if self.state.total_records >= self.request.target_count {
                return Ok(AttemptOutcome::TargetReached);
            }

            if self.state.stall_count > limits.stall_limit {
                if self.state.recovery_attempts < limits.recovery_limit {
                    self.recover(&limits).await?;
                } else {
                    tracing::info!(
                        "No more tweets found, please check your search criteria and csv file result"
                    );
                    return Ok(AttemptOutcome::Exhausted);
                }
            }

            let step =
                match tokio::time::timeout(response_timeout, self.session.next_response()).await {
                    Ok(response) => self.handle_response(response?, &limits).await?,
                    Err(_) => self.handle_timeout(&limits),
                };

            match step {
                Step::Continue => {}
                Step::Retry => continue,
                Step::Stop(outcome) => return Ok(outcome),
            }

            self.session.scroll_down().await?;
        }
    }

    async fn handle_response(
        &mut self,
        response: InterceptedResponse,
        limits: &HarvestConfig,
    ) -> Result<Step, HarvestError> {
        self.state.page_seen = true;

        let class = classify_response(&response.body, self.view.as_ref());
        tracing::debug!(
            "Response {} (HTTP {}) classified as {}",
            response.url,
            response.status,
            class.label()
        );

        match class {
            PageClass::RateLimited => self.handle_rate_limit(limits).await,
            PageClass::TerminalError { snippet } => {
                tracing::error!(
                    "Unreadable response from {} ends this tab: {}",
                    response.url,
                    snippet
                );
                self.capture_error_screenshot().await;
                Ok(Step::Stop(AttemptOutcome::Exhausted))
            }
            PageClass::Exhausted => {
                self.state.rate_limit_count = 0;
                tracing::info!(
                    "No more tweets found, please check your search criteria and csv file result"
                );
                Ok(Step::Stop(AttemptOutcome::Exhausted))
            }
            PageClass::Empty => {
                self.state.rate_limit_count = 0;
                if self.no_results_shown().await {
                    tracing::info!("No tweets found for the search criteria");
                    return Ok(Step::Stop(AttemptOutcome::NoResults));
                }
                self.state.record_stall();
                Ok(Step::Continue)
            }
            PageClass::Data(entries) => {
                self.state.rate_limit_count = 0;
                self.save_entries(&entries, limits).await
            }
        }
    }

    async fn handle_rate_limit(&mut self, limits: &HarvestConfig) -> Result<Step, HarvestError> {
        let attempt = self.state.rate_limit_count;
        self.state.rate_limit_count += 1;

        if self.state.rate_limit_count > limits.max_rate_limit_retries {
            tracing::error!(
                "Still rate limited after {} retries, stopping this attempt",
                limits.max_rate_limit_retries
            );
            return Ok(Step::Stop(AttemptOutcome::Exhausted));
        }

        let delay = rate_limit_delay(&self.config.backoff, attempt);
        tracing::warn!(
            "Most likely, you have already exceeded the Twitter rate limit. Waiting {}s before retrying (attempt {})",
            delay.as_secs(),
            self.state.rate_limit_count
        );
        tokio::time::sleep(delay).await;

        if let Err(e) = self.session.click_retry().await {
            tracing::debug!("Retry button not clicked: {}", e);
        }

        Ok(Step::Retry)
    }

    fn handle_timeout(&mut self, limits: &HarvestConfig) -> Step {
        if !self.state.page_seen {
            self.state.first_page_timeouts += 1;
            if self.state.first_page_timeouts > limits.first_page_timeouts {
                tracing::warn!(
                    "No page loaded after {} timeouts, giving up on this tab",
                    limits.first_page_timeouts
                );
                return Step::Stop(AttemptOutcome::Exhausted);
            }
            tracing::debug!(
                "Waiting for the first page... ({})",
                self.state.first_page_timeouts
            );
            return Step::Continue;
        }

        self.state.record_stall();
        tracing::debug!("Scrolling... ({})", self.state.stall_count);
        Step::Continue
    }

    /// Extracts, writes and paces one data page
    async fn save_entries(
        &mut self,
        entries: &[Value],
        limits: &HarvestConfig,
    ) -> Result<Step, HarvestError> {
        let records: Vec<_> = entries
            .iter()
            .filter_map(|entry| match self.view.entry_to_record(entry) {
                Ok(record) => Some(record),
                Err(reason) => {
                    let entry_id = entry.get("entryId").and_then(|id| id.as_str());
                    tracing::trace!("Skipping entry {}: {}", entry_id.unwrap_or("?"), reason);
                    None
                }
            })
            .collect();

        if records.is_empty() {
            self.state.record_stall();
            return Ok(Step::Continue);
        }

        self.state.clear_stalls();

        let path = self.writer.append(&mut self.state, &records)?;
        tracing::info!("Your tweets saved to: {}", path.display());
        self.state.record_batch(records.len(), path);
        tracing::info!("Total tweets saved: {}", self.state.total_records);

        let total = self.state.total_records;
        if total % limits.batch_size == 0 && self.request.delay_batch_secs > 0 {
            tracing::info!(
                "Taking a break, waiting for {} seconds...",
                self.request.delay_batch_secs
            );
            tokio::time::sleep(Duration::from_secs(self.request.delay_batch_secs)).await;
        } else if records.len() > limits.pacing_threshold && self.request.delay_each_secs > 0 {
            tokio::time::sleep(Duration::from_secs(self.request.delay_each_secs)).await;
        }

        Ok(Step::Continue)
    }

    /// Scrolls up and back down to unstick a frozen timeline
    async fn recover(&mut self, limits: &HarvestConfig) -> Result<(), HarvestError> {
        self.state.recovery_attempts += 1;
        tracing::warn!(
            "Timeout reached {} times, making sure again...",
            self.state.recovery_attempts
        );
        self.state.clear_stalls();

        self.session.scroll_up().await?;
        tokio::time::sleep(Duration::from_millis(limits.recovery_pause_ms)).await;
        self.session.scroll_down().await?;
        Ok(())
    }

    async fn no_results_shown(&mut self) -> bool {
        match self.session.has_no_results_marker().await {
            Ok(shown) => shown,
            Err(e) => {
                tracing::debug!("Could not check for a no-results marker: {}", e);
                false
            }
        }
    }

    fn is_cancelled(&self) -> bool {
        self.cancel.as_ref().is_some_and(|rx| *rx.borrow())
    }

    /// Decides how a failure surfaces
    ///
    /// Setup and write failures become errors; everything else becomes an
    /// aborted outcome so the caller still gets the partial result.
    async fn handle_failure(&mut self, error: HarvestError) -> Result<HarvestOutcome, HarvestError> {
        tracing::error!("{}", error);
        tracing::info!("Query: {}", self.request.describe());
        tracing::info!("Tweet Harvest v{}", env!("CARGO_PKG_VERSION"));

        if !matches!(error, HarvestError::InvalidCredential { .. }) {
            self.capture_error_screenshot().await;
        }

        if error.is_setup_failure() || matches!(error, HarvestError::Write { .. }) {
            return Err(error);
        }

        Ok(HarvestOutcome::Aborted {
            reason: error.to_string(),
        })
    }

    /// Best-effort diagnostic screenshot; failures are only logged
    async fn capture_error_screenshot(&mut self) {
        let folder = PathBuf::from(&self.config.output.folder);
        if let Err(e) = std::fs::create_dir_all(&folder) {
            tracing::debug!("Could not create {}: {}", folder.display(), e);
            return;
        }

        let path = error_screenshot_path(&folder, &self.run_timestamp);
        match self.session.screenshot(&path).await {
            Ok(()) => tracing::error!(
                "If you need help, please send this error screenshot to the maintainer, it was saved to \"{}\"",
                absolute(path).display()
            ),
            Err(e) => tracing::debug!("Could not capture error screenshot: {}", e),
        }
    }

    /// Releases the session unless it should stay open for inspection
    async fn finish(&mut self) {
        if self.config.browser.keep_open {
            tracing::info!("Keeping the browser session open for inspection");
            return;
        }

        match self.session.close().await {
            Ok(()) | Err(SessionError::Closed) => {}
            Err(e) => tracing::warn!("Failed to close browser session: {}", e),
        }
    }
}

fn absolute(path: PathBuf) -> PathBuf {
    std::path::absolute(&path).unwrap_or(path)
}
