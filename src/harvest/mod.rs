//! Harvest module for timeline scrolling and record extraction
//!
//! This module contains the core harvesting logic, including:
//! - Request modelling and validation (search or thread)
//! - The browser session abstraction and its Chrome implementation
//! - Response classification and mode-specific payload views
//! - Record extraction and incremental CSV output
//! - The scroll loop with stall recovery and rate-limit backoff

mod backoff;
mod chrome;
mod classifier;
mod harvester;
mod payload;
mod record;
mod request;
mod session;
mod state;
mod writer;

pub use backoff::rate_limit_delay;
pub use chrome::ChromeSession;
pub use classifier::{classify_response, PageClass, RATE_LIMIT_MARKER};
pub use harvester::Harvester;
pub use payload::{view_for, DetailView, PayloadView, SearchView, SkipReason};
pub use record::{clean_text, ExtractedRecord, RawRecord, DERIVED_FIELDS, TWEET_FIELDS};
pub use request::{
    parse_date, search_query, CrawlMode, CrawlTarget, HarvestOutcome, HarvestRequest,
    HarvestResult, SearchTab, WriteMode, SITE_BASE_URL,
};
pub use session::{
    is_pagination_url, BrowserSession, InterceptedResponse, SessionError, SessionResult,
    PAGINATION_ENDPOINTS,
};
pub use state::RunState;
pub use writer::{output_path, sanitize_file_name, sidecar_path, IncrementalWriter};

use crate::config::Config;
use crate::HarvestError;
use tokio::sync::watch;

/// Runs a complete harvest in a fresh Chrome session
///
/// This is the main entry point for harvesting. It will:
/// 1. Validate the request
/// 2. Launch a browser and install the auth cookie
/// 3. Scroll the requested tab (and the alternate tab if nothing was found)
/// 4. Append records to the output file as pages arrive
/// 5. Close the browser, unless it should stay open for inspection
///
/// # Arguments
///
/// * `config` - Ambient configuration
/// * `request` - What to harvest
/// * `cancel` - Optional signal; the run stops once it turns `true`
///
/// # Returns
///
/// * `Ok(HarvestResult)` - The run finished, possibly early (see its outcome)
/// * `Err(HarvestError)` - Setup or output failed
pub async fn harvest(
    config: &Config,
    request: HarvestRequest,
    cancel: Option<watch::Receiver<bool>>,
) -> Result<HarvestResult, HarvestError> {
    request.validate()?;

    let session = ChromeSession::open(&request.token, &config.browser).await?;
    let mut harvester = Harvester::new(session, request, config.clone(), &chrono::Local::now());
    if let Some(cancel) = cancel {
        harvester = harvester.with_cancel(cancel);
    }

    let result = harvester.run().await;

    if config.browser.keep_open {
        let _session = harvester.into_session();
        tracing::info!("Browser left open, press Ctrl-C to close it");
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::warn!("Failed to listen for Ctrl-C: {}", e);
        }
    }

    result
}
