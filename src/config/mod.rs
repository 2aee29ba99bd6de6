//! Configuration module for Tweet Harvest
//!
//! This module handles loading, parsing, and validating the process-wide TOML
//! configuration. Per-run parameters live in [`crate::harvest::HarvestRequest`].
//!
//! # Example
//!
//! ```no_run
//! use tweet_harvest::config::load_config;
//! use std::path::Path;
//!
//! let config = load_config(Path::new("harvest.toml")).unwrap();
//! println!("Stall limit: {}", config.harvest.stall_limit);
//! ```

mod parser;
mod types;
mod validation;

// Re-export types
pub use types::{BackoffConfig, BrowserConfig, Config, FetchConfig, HarvestConfig, OutputConfig};

// Re-export parser functions
pub use parser::{compute_config_hash, load_config, load_config_with_hash, parse_config};
pub use validation::validate;
