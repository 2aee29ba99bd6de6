//! Response classification
//!
//! Decides what one intercepted pagination response means for the harvest
//! loop. Classification looks only at the response text; whether an empty
//! page is a "no results" page depends on the rendered DOM and is settled
//! by the loop.

use crate::harvest::payload::PayloadView;
use serde_json::Value;

/// Case-insensitive marker of a rate-limit response body
pub const RATE_LIMIT_MARKER: &str = "rate limit";

/// Classification of one pagination response
#[derive(Debug, Clone, PartialEq)]
pub enum PageClass {
    /// Body is not JSON and mentions a rate limit
    RateLimited,
    /// Body is not JSON for any other reason; ends the current tab
    TerminalError { snippet: String },
    /// Payload has no entry list at all
    Exhausted,
    /// Entry list is present but empty
    Empty,
    /// Entry list with content
    Data(Vec<Value>),
}

impl PageClass {
    /// Short label for logs
    pub fn label(&self) -> &'static str {
        match self {
            Self::RateLimited => "rate-limited",
            Self::TerminalError { .. } => "terminal-error",
            Self::Exhausted => "exhausted",
            Self::Empty => "empty",
            Self::Data(_) => "data",
        }
    }
}

/// Classifies a response body using the run's payload view
pub fn classify_response(body: &str, view: &dyn PayloadView) -> PageClass {
    let payload: Value = match serde_json::from_str(body) {
        Ok(payload) => payload,
        Err(_) => return classify_unparseable(body),
    };

    match view.locate_entries(&payload) {
        None => PageClass::Exhausted,
        Some([]) => PageClass::Empty,
        Some(entries) => PageClass::Data(entries.to_vec()),
    }
}

fn classify_unparseable(body: &str) -> PageClass {
    if body.to_lowercase().contains(RATE_LIMIT_MARKER) {
        PageClass::RateLimited
    } else {
        PageClass::TerminalError {
            snippet: body.chars().take(200).collect(),
        }
    }
}
