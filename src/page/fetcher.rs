//! HTTP fetcher for static pages
//!
//! This module handles plain HTTP page fetches, including:
//! - Building HTTP clients with a browser-like user agent
//! - GET requests with retry on transient failures
//! - Bounded-concurrency batch fetches that keep input order

use crate::config::FetchConfig;
use crate::page::parser::{parse_generic, PageExtract, HTTP_VIA};
use futures::stream::{self, StreamExt};
use reqwest::header::{HeaderMap, HeaderValue, ACCEPT};
use reqwest::Client;
use std::time::Duration;
use thiserror::Error;

const ACCEPT_HTML: &str = "text/html,application/xhtml+xml,application/xml;q=0.9,*/*;q=0.8";

/// Errors raised while fetching a page
#[derive(Debug, Error)]
pub enum FetchError {
    #[error("Failed to build HTTP client: {0}")]
    Client(reqwest::Error),

    #[error("HTTP {status} from {url}")]
    Status { url: String, status: u16 },

    #[error("Request to {url} failed: {source}")]
    Network { url: String, source: reqwest::Error },
}

impl FetchError {
    /// Network failures and server errors are worth another attempt
    pub fn is_retryable(&self) -> bool {
        match self {
            Self::Client(_) => false,
            Self::Status { status, .. } => *status >= 500,
            Self::Network { .. } => true,
        }
    }
}

/// Builds an HTTP client with proper configuration
///
/// # Arguments
///
/// * `config` - The fetch configuration
///
/// # Returns
///
/// * `Ok(Client)` - Successfully built HTTP client
/// * `Err(FetchError)` - Failed to build client
pub fn build_http_client(config: &FetchConfig) -> Result<Client, FetchError> {
    let mut headers = HeaderMap::new();
    headers.insert(ACCEPT, HeaderValue::from_static(ACCEPT_HTML));

    Client::builder()
        .user_agent(config.user_agent.as_str())
        .default_headers(headers)
        .timeout(Duration::from_secs(config.timeout_secs))
        .connect_timeout(Duration::from_secs(10))
        .gzip(true)
        .brotli(true)
        .build()
        .map_err(FetchError::Client)
}

/// Fetches a page body, retrying transient failures
///
/// # Retry Logic
///
/// | Condition | Action |
/// |-----------|--------|
/// | Network error / timeout | Retry |
/// | HTTP 5xx | Retry |
/// | Any other non-2xx | Fail immediately |
///
/// The delay before retry `n` is `base_delay_ms * 2^(n-1)`, and at most
/// `max_attempts` requests are sent in total.
pub async fn get_html(client: &Client, url: &str, config: &FetchConfig) -> Result<String, FetchError> {
    let mut attempt = 1;
    loop {
        let error = match fetch_once(client, url).await {
            Ok(body) => return Ok(body),
            Err(error) => error,
        };

        if attempt >= config.max_attempts || !error.is_retryable() {
            return Err(error);
        }

        let delay = retry_delay(config.base_delay_ms, attempt);
        tracing::warn!(
            "{} (attempt {}/{}), retrying in {}ms",
            error,
            attempt,
            config.max_attempts,
            delay.as_millis()
        );
        tokio::time::sleep(delay).await;
        attempt += 1;
    }
}

async fn fetch_once(client: &Client, url: &str) -> Result<String, FetchError> {
    let network = |source| FetchError::Network {
        url: url.to_string(),
        source,
    };

    let response = client.get(url).send().await.map_err(network)?;
    let status = response.status();
    if !status.is_success() {
        return Err(FetchError::Status {
            url: url.to_string(),
            status: status.as_u16(),
        });
    }

    response.text().await.map_err(network)
}

/// Delay before the given retry (1-based)
pub fn retry_delay(base_delay_ms: u64, attempt: u32) -> Duration {
    let factor = 1u64 << attempt.saturating_sub(1).min(16);
    Duration::from_millis(base_delay_ms.saturating_mul(factor))
}

/// Fetches and parses every URL, at most `concurrency` at a time
///
/// Results keep the order of `urls`. A page that cannot be fetched yields
/// an extract carrying only its URL, timestamp and source.
pub async fn fetch_many(client: &Client, urls: &[String], config: &FetchConfig) -> Vec<PageExtract> {
    stream::iter(urls)
        .map(|url| async move {
            match get_html(client, url, config).await {
                Ok(html) => parse_generic(&html, url, HTTP_VIA),
                Err(e) => {
                    tracing::warn!("Giving up on {}: {}", url, e);
                    PageExtract::empty(url, HTTP_VIA)
                }
            }
        })
        .buffered(config.concurrency.max(1))
        .collect()
        .await
}
