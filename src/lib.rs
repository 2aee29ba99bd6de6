//! Tweet Harvest: an incremental-scroll timeline harvester
//!
//! This crate drives an authenticated browser session through a search
//! timeline or a conversation thread, intercepts the paginated responses the
//! page loads while scrolling, and appends the extracted records to a CSV
//! file as they arrive. It also carries a small static page fetcher for
//! exporting linked pages.

pub mod config;
pub mod harvest;
pub mod page;

use std::path::PathBuf;
use thiserror::Error;

/// Main error type for Tweet Harvest operations
#[derive(Debug, Error)]
pub enum HarvestError {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    #[error("Invalid auth token: redirected to {url}")]
    InvalidCredential { url: String },

    #[error("Browser session error: {0}")]
    Session(#[from] harvest::SessionError),

    #[error("Failed to write {path}: {source}")]
    Write { path: PathBuf, source: csv::Error },

    #[error("Fetch error: {0}")]
    Fetch(#[from] page::FetchError),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("URL parse error: {0}")]
    UrlParse(#[from] ::url::ParseError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl HarvestError {
    /// Whether the error happened before any harvesting could start
    pub fn is_setup_failure(&self) -> bool {
        matches!(
            self,
            Self::Config(_)
                | Self::InvalidRequest(_)
                | Self::InvalidCredential { .. }
                | Self::Session(
                    harvest::SessionError::Launch(_)
                        | harvest::SessionError::Navigation { .. }
                        | harvest::SessionError::NavigationTimeout { .. }
                )
        )
    }
}

/// Configuration-specific errors
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config file: {0}")]
    Io(#[from] std::io::Error),

    #[error("Failed to parse TOML: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("Validation error: {0}")]
    Validation(String),
}

/// Result type alias for Tweet Harvest operations
pub type Result<T> = std::result::Result<T, HarvestError>;

/// Result type alias for configuration operations
pub type ConfigResult<T> = std::result::Result<T, ConfigError>;

// Re-export commonly used types
pub use config::Config;
pub use harvest::{
    harvest, CrawlMode, CrawlTarget, HarvestOutcome, HarvestRequest, HarvestResult, SearchTab,
    WriteMode,
};
