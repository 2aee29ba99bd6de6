use serde::Deserialize;

/// Main configuration structure for Tweet Harvest
///
/// Every section and key is optional; a missing key takes the value used by
/// [`Config::default`].
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct Config {
    pub browser: BrowserConfig,
    pub harvest: HarvestConfig,
    pub backoff: BackoffConfig,
    pub output: OutputConfig,
    pub fetch: FetchConfig,
}

/// Browser session configuration
#[derive(Debug, Clone, Deserialize)]
#[serde(default, rename_all = "kebab-case")]
pub struct BrowserConfig {
    /// Run the browser without a visible window
    pub headless: bool,

    /// Leave the session open after the run for inspection
    pub keep_open: bool,

    /// Maximum time a single navigation may take (seconds)
    pub navigation_timeout_secs: u64,

    pub window_width: u32,
    pub window_height: u32,
}

impl Default for BrowserConfig {
    fn default() -> Self {
        Self {
            headless: true,
            keep_open: false,
            navigation_timeout_secs: 60,
            window_width: 1240,
            window_height: 1080,
        }
    }
}

/// Harvest loop limits and pacing
#[derive(Debug, Clone, Deserialize)]
#[serde(default, rename_all = "kebab-case")]
pub struct HarvestConfig {
    /// How long to wait for one paginated response before counting a timeout (milliseconds)
    pub response_timeout_ms: u64,

    /// Consecutive stalls tolerated before a recovery scroll
    pub stall_limit: u32,

    /// Recovery scrolls attempted before the attempt is reported as exhausted
    pub recovery_limit: u32,

    /// Pause between the scroll-up and scroll-down of a recovery (milliseconds)
    pub recovery_pause_ms: u64,

    /// Consecutive rate-limited responses tolerated before giving up the attempt
    pub max_rate_limit_retries: u32,

    /// Timeouts tolerated while no page has arrived yet
    pub first_page_timeouts: u32,

    /// A saved batch larger than this triggers the per-record delay
    pub pacing_threshold: usize,

    /// Every time the total reaches a multiple of this, the batch delay applies
    pub batch_size: usize,
}

impl Default for HarvestConfig {
    fn default() -> Self {
        Self {
            response_timeout_ms: 1500,
            stall_limit: 20,
            recovery_limit: 3,
            recovery_pause_ms: 2000,
            max_rate_limit_retries: 10,
            first_page_timeouts: 60,
            pacing_threshold: 20,
            batch_size: 100,
        }
    }
}

/// Rate-limit backoff policy
#[derive(Debug, Clone, Deserialize)]
#[serde(default, rename_all = "kebab-case")]
pub struct BackoffConfig {
    /// When false every wait is `base_ms`
    pub enabled: bool,

    pub base_ms: u64,

    /// Ceiling for any single wait
    pub max_ms: u64,

    pub ratio: u64,
}

impl Default for BackoffConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            base_ms: 60_000,
            max_ms: 600_000,
            ratio: 2,
        }
    }
}

/// Output configuration
#[derive(Debug, Clone, Deserialize)]
#[serde(default, rename_all = "kebab-case")]
pub struct OutputConfig {
    /// Folder receiving CSV files, page exports and error screenshots
    pub folder: String,
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            folder: "tweets-data".to_string(),
        }
    }
}

/// Static page fetcher configuration
#[derive(Debug, Clone, Deserialize)]
#[serde(default, rename_all = "kebab-case")]
pub struct FetchConfig {
    pub user_agent: String,

    /// Per-request timeout (seconds)
    pub timeout_secs: u64,

    /// Total attempts for one URL, first try included
    pub max_attempts: u32,

    /// Delay before the first retry; doubles on each further retry (milliseconds)
    pub base_delay_ms: u64,

    /// Pages fetched at the same time
    pub concurrency: usize,
}

impl Default for FetchConfig {
    fn default() -> Self {
        Self {
            user_agent: "Mozilla/5.0 (X11; Linux x86_64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/120 Safari/537.36".to_string(),
            timeout_secs: 30,
            max_attempts: 3,
            base_delay_ms: 500,
            concurrency: 5,
        }
    }
}
