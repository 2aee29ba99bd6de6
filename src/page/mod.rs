//! Page module for static page export
//!
//! This module fetches pages over plain HTTP, extracts generic metadata and
//! writes the results as JSON and CSV:
//! - HTTP fetching with retry logic
//! - HTML metadata extraction
//! - JSON / CSV export

mod export;
mod fetcher;
mod parser;

pub use export::{save_csv, save_json};
pub use fetcher::{build_http_client, fetch_many, get_html, retry_delay, FetchError};
pub use parser::{parse_generic, trim_to, PageExtract, HTTP_VIA};

use crate::config::Config;
use crate::HarvestError;
use std::path::{Path, PathBuf};

/// Fetches, parses and exports a list of pages
///
/// Writes `<folder>/<YYYY-MM-DD>_pages.json` and `.csv`.
///
/// # Returns
///
/// * `Ok((json_path, csv_path))` - Both files were written
/// * `Err(HarvestError)` - The client could not be built or a file could not be written
pub async fn export_pages(config: &Config, urls: &[String]) -> Result<(PathBuf, PathBuf), HarvestError> {
    let client = build_http_client(&config.fetch)?;
    let rows = fetch_many(&client, urls, &config.fetch).await;

    let folder = Path::new(&config.output.folder);
    let stem = format!("{}_pages", chrono::Local::now().format("%Y-%m-%d"));
    let json_path = save_json(&rows, folder, &format!("{}.json", stem))?;
    let csv_path = save_csv(&rows, folder, &format!("{}.csv", stem))?;

    tracing::info!(
        "Exported {} pages to {} and {}",
        rows.len(),
        json_path.display(),
        csv_path.display()
    );

    Ok((json_path, csv_path))
}
