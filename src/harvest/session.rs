//! Browser session abstraction
//!
//! The harvest loop only needs a handful of primitives from a live browsing
//! session: navigation, scrolling, waiting for the next paginated network
//! response, a couple of DOM queries, and screenshots. [`BrowserSession`]
//! captures exactly those, so the loop can be driven by a real browser
//! ([`crate::harvest::ChromeSession`]) or by a scripted session in tests.

use async_trait::async_trait;
use std::path::Path;
use thiserror::Error;

/// Endpoint fragments identifying paginated responses worth classifying
pub const PAGINATION_ENDPOINTS: [&str; 2] = ["SearchTimeline", "TweetDetail"];

/// Returns true if the response URL belongs to a pagination endpoint
pub fn is_pagination_url(url: &str) -> bool {
    PAGINATION_ENDPOINTS
        .iter()
        .any(|endpoint| url.contains(endpoint))
}

/// Errors raised by session primitives
#[derive(Debug, Error)]
pub enum SessionError {
    #[error("Failed to launch browser: {0}")]
    Launch(String),

    #[error("Navigation to {url} failed: {message}")]
    Navigation { url: String, message: String },

    #[error("Navigation to {url} timed out")]
    NavigationTimeout { url: String },

    #[error("Script evaluation failed: {0}")]
    Script(String),

    #[error("Failed to read response body for {url}: {message}")]
    ResponseBody { url: String, message: String },

    #[error("Screenshot failed: {0}")]
    Screenshot(String),

    #[error("Browser session closed")]
    Closed,

    #[error("DevTools protocol error: {0}")]
    Protocol(String),
}

/// Result type for session operations
pub type SessionResult<T> = Result<T, SessionError>;

/// One intercepted network response from a pagination endpoint
#[derive(Debug, Clone)]
pub struct InterceptedResponse {
    pub url: String,
    pub status: u16,
    /// Raw response text; may not be valid JSON
    pub body: String,
}

/// Primitives of one authenticated browsing session
///
/// A session is owned by exactly one run and is never driven by two
/// operations at the same time.
#[async_trait]
pub trait BrowserSession: Send {
    /// Navigates the page and waits for the load to settle
    async fn navigate(&mut self, url: &str) -> SessionResult<()>;

    /// The URL the page currently shows (after redirects)
    async fn current_url(&mut self) -> SessionResult<String>;

    /// Smooth-scrolls to the bottom, then strips media previews from the DOM
    async fn scroll_down(&mut self) -> SessionResult<()>;

    /// Smooth-scrolls to the top
    async fn scroll_up(&mut self) -> SessionResult<()>;

    /// Waits for the next response from a pagination endpoint
    ///
    /// May never resolve when no further page is loading; callers race it
    /// against a timeout. Dropping the future must not lose a response.
    async fn next_response(&mut self) -> SessionResult<InterceptedResponse>;

    /// Whether the page shows an explicit "No results for" marker
    async fn has_no_results_marker(&mut self) -> SessionResult<bool>;

    /// Clicks the in-page "Retry" affordance if one is shown
    async fn click_retry(&mut self) -> SessionResult<()>;

    /// Writes a PNG screenshot of the current page
    async fn screenshot(&mut self, path: &Path) -> SessionResult<()>;

    /// Releases the session
    async fn close(&mut self) -> SessionResult<()>;
}
