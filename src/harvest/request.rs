//! Harvest request and result types
//!
//! A [`HarvestRequest`] is the immutable description of one run. It is
//! validated once, before any browser is launched.

use crate::HarvestError;
use chrono::NaiveDate;
use std::fmt;
use std::path::PathBuf;
use url::Url;

/// Base URL of the site being harvested
pub const SITE_BASE_URL: &str = "https://x.com";

/// Cookie domain the session credential is installed on
pub const AUTH_COOKIE_DOMAIN: &str = "x.com";

/// Name of the session credential cookie
pub const AUTH_COOKIE_NAME: &str = "auth_token";

const MIN_TOKEN_LEN: usize = 20;
const MAX_TARGET_COUNT: usize = 10_000;
const MAX_DELAY_EACH_SECS: u64 = 60;
const MAX_DELAY_BATCH_SECS: u64 = 300;

/// Search result ordering
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SearchTab {
    Latest,
    Top,
}

impl SearchTab {
    /// The other tab, used when the requested one yields nothing
    pub fn alternate(self) -> Self {
        match self {
            Self::Latest => Self::Top,
            Self::Top => Self::Latest,
        }
    }

    /// Value of the `f` query parameter selecting this tab
    pub fn query_value(self) -> &'static str {
        match self {
            Self::Latest => "live",
            Self::Top => "top",
        }
    }
}

impl fmt::Display for SearchTab {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Latest => write!(f, "LATEST"),
            Self::Top => write!(f, "TOP"),
        }
    }
}

/// How an existing output file is treated at run start
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WriteMode {
    /// Move an existing file aside to `<name>.old.csv`
    Replace,
    /// Keep adding rows to an existing file
    Append,
}

/// What a run navigates to
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CrawlTarget {
    Search {
        keywords: String,
        from: Option<NaiveDate>,
        to: Option<NaiveDate>,
    },
    Thread {
        url: Url,
    },
}

/// Derived from the target; selects navigation and payload shape
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CrawlMode {
    Search,
    Detail,
}

impl fmt::Display for CrawlMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Search => write!(f, "SEARCH"),
            Self::Detail => write!(f, "DETAIL"),
        }
    }
}

/// Immutable configuration for one harvest run
#[derive(Debug, Clone)]
pub struct HarvestRequest {
    /// Session credential installed as the auth cookie
    pub token: String,

    pub target: CrawlTarget,

    /// Records wanted; the run may overshoot by up to one page
    pub target_count: usize,

    /// Pause after a large batch (seconds)
    pub delay_each_secs: u64,

    /// Pause each time the total reaches a multiple of the batch size (seconds)
    pub delay_batch_secs: u64,

    /// Output file name; derived from the query and run time when absent
    pub output_filename: Option<String>,

    pub tab: SearchTab,
    pub write_mode: WriteMode,
}

impl HarvestRequest {
    /// Creates a search request with the front end's defaults
    pub fn search(token: impl Into<String>, keywords: impl Into<String>) -> Self {
        Self::with_target(
            token.into(),
            CrawlTarget::Search {
                keywords: keywords.into(),
                from: None,
                to: None,
            },
        )
    }

    /// Creates a thread (reply harvesting) request with the front end's defaults
    pub fn thread(token: impl Into<String>, url: Url) -> Self {
        Self::with_target(token.into(), CrawlTarget::Thread { url })
    }

    fn with_target(token: String, target: CrawlTarget) -> Self {
        Self {
            token,
            target,
            target_count: 10,
            delay_each_secs: 3,
            delay_batch_secs: 10,
            output_filename: None,
            tab: SearchTab::Latest,
            write_mode: WriteMode::Replace,
        }
    }

    /// Builds a request from loosely-typed front-end parameters
    ///
    /// Exactly one of `keywords` and `thread_url` must be given.
    pub fn from_parts(
        token: String,
        keywords: Option<String>,
        thread_url: Option<&str>,
        from: Option<&str>,
        to: Option<&str>,
    ) -> Result<Self, HarvestError> {
        let target = match (keywords, thread_url) {
            (Some(keywords), None) => CrawlTarget::Search {
                keywords,
                from: from.map(parse_date).transpose()?,
                to: to.map(parse_date).transpose()?,
            },
            (None, Some(url)) => {
                let url = Url::parse(url).map_err(|e| {
                    HarvestError::InvalidRequest(format!("invalid thread URL '{}': {}", url, e))
                })?;
                CrawlTarget::Thread { url }
            }
            (Some(_), Some(_)) => {
                return Err(HarvestError::InvalidRequest(
                    "provide either a keyword or a thread URL, not both".to_string(),
                ))
            }
            (None, None) => {
                return Err(HarvestError::InvalidRequest(
                    "either a keyword or a thread URL must be provided".to_string(),
                ))
            }
        };

        Ok(Self::with_target(token, target))
    }

    pub fn mode(&self) -> CrawlMode {
        match self.target {
            CrawlTarget::Search { .. } => CrawlMode::Search,
            CrawlTarget::Thread { .. } => CrawlMode::Detail,
        }
    }

    /// Checks the request against the front-end contract
    pub fn validate(&self) -> Result<(), HarvestError> {
        if self.token.trim().len() < MIN_TOKEN_LEN {
            return Err(HarvestError::InvalidRequest(
                "invalid auth token: too short".to_string(),
            ));
        }

        if self.target_count < 1 || self.target_count > MAX_TARGET_COUNT {
            return Err(HarvestError::InvalidRequest(format!(
                "target count must be between 1 and {}, got {}",
                MAX_TARGET_COUNT, self.target_count
            )));
        }

        if self.delay_each_secs > MAX_DELAY_EACH_SECS {
            return Err(HarvestError::InvalidRequest(format!(
                "per-record delay must be <= {}s, got {}s",
                MAX_DELAY_EACH_SECS, self.delay_each_secs
            )));
        }

        if self.delay_batch_secs > MAX_DELAY_BATCH_SECS {
            return Err(HarvestError::InvalidRequest(format!(
                "batch delay must be <= {}s, got {}s",
                MAX_DELAY_BATCH_SECS, self.delay_batch_secs
            )));
        }

        match &self.target {
            CrawlTarget::Search { keywords, from, to } => {
                if keywords.trim().is_empty() {
                    return Err(HarvestError::InvalidRequest(
                        "keyword cannot be empty".to_string(),
                    ));
                }
                if let (Some(from), Some(to)) = (from, to) {
                    if from > to {
                        return Err(HarvestError::InvalidRequest(format!(
                            "date range is reversed: {} > {}",
                            from, to
                        )));
                    }
                }
            }
            CrawlTarget::Thread { url } => {
                if !matches!(url.scheme(), "http" | "https") {
                    return Err(HarvestError::InvalidRequest(format!(
                        "thread URL must be http(s), got '{}'",
                        url
                    )));
                }
            }
        }

        Ok(())
    }

    /// URL the session navigates to for the given tab
    ///
    /// Thread targets ignore the tab.
    pub fn navigation_url(&self, tab: SearchTab) -> String {
        match &self.target {
            CrawlTarget::Thread { url } => url.to_string(),
            CrawlTarget::Search { keywords, from, to } => {
                let query = search_query(keywords, *from, *to);
                let params = url::form_urlencoded::Serializer::new(String::new())
                    .append_pair("q", &query)
                    .append_pair("src", "typed_query")
                    .append_pair("f", tab.query_value())
                    .finish();
                format!("{}/search?{}", SITE_BASE_URL, params)
            }
        }
    }

    /// Handle of the thread's original poster, taken from the thread URL
    pub fn thread_author(&self) -> Option<String> {
        match &self.target {
            CrawlTarget::Thread { url } => url
                .path_segments()
                .and_then(|mut segments| segments.next())
                .filter(|handle| !handle.is_empty())
                .map(|handle| handle.to_string()),
            CrawlTarget::Search { .. } => None,
        }
    }

    /// Name used for the output file before sanitizing
    pub fn output_stem(&self, run_timestamp: &str) -> String {
        if let Some(name) = self
            .output_filename
            .as_deref()
            .map(str::trim)
            .filter(|n| !n.is_empty())
        {
            return name.trim_end_matches(".csv").to_string();
        }

        match &self.target {
            CrawlTarget::Search { keywords, .. } => {
                format!("{} {}", keywords.trim(), run_timestamp)
            }
            CrawlTarget::Thread { url } => {
                let id = url
                    .path_segments()
                    .and_then(|segments| segments.last())
                    .filter(|s| !s.is_empty())
                    .unwrap_or("thread");
                format!("thread {} {}", id, run_timestamp)
            }
        }
    }

    /// Label used in logs
    pub fn describe(&self) -> String {
        match &self.target {
            CrawlTarget::Search { keywords, .. } => format!("keywords '{}'", keywords),
            CrawlTarget::Thread { url } => format!("thread {}", url),
        }
    }
}

/// Builds the raw search query with the optional date operators
pub fn search_query(keywords: &str, from: Option<NaiveDate>, to: Option<NaiveDate>) -> String {
    let mut query = keywords.trim().to_string();
    if let Some(from) = from {
        query.push_str(&format!(" since:{}", from.format("%Y-%m-%d")));
    }
    if let Some(to) = to {
        query.push_str(&format!(" until:{}", to.format("%Y-%m-%d")));
    }
    query
}

/// Parses `DD-MM-YYYY` (front-end form) or `YYYY-MM-DD`
pub fn parse_date(value: &str) -> Result<NaiveDate, HarvestError> {
    let value = value.trim();
    NaiveDate::parse_from_str(value, "%d-%m-%Y")
        .or_else(|_| NaiveDate::parse_from_str(value, "%Y-%m-%d"))
        .map_err(|_| {
            HarvestError::InvalidRequest(format!(
                "invalid date '{}', expected DD-MM-YYYY or YYYY-MM-DD",
                value
            ))
        })
}

/// How an attempt or a run ended
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HarvestOutcome {
    /// Accumulated count reached the requested target
    TargetReached,
    /// Pagination stopped producing records
    Exhausted,
    /// The page reported no results on every tab tried
    NoResults,
    /// The cancel signal fired
    Cancelled,
    /// A mid-run failure ended the run; partial results were kept
    Aborted { reason: String },
}

impl fmt::Display for HarvestOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::TargetReached => write!(f, "target reached"),
            Self::Exhausted => write!(f, "no more results"),
            Self::NoResults => write!(f, "no results"),
            Self::Cancelled => write!(f, "cancelled"),
            Self::Aborted { reason } => write!(f, "aborted ({})", reason),
        }
    }
}

/// What a run reports back to its caller
#[derive(Debug, Clone)]
pub struct HarvestResult {
    /// Absolute path of the output file
    pub file_path: PathBuf,
    pub total_records: usize,
    /// Every tab that was actually navigated, in order
    pub used_tabs: Vec<SearchTab>,
    pub outcome: HarvestOutcome,
}
