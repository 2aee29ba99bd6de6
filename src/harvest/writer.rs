//! Incremental CSV output
//!
//! Records are appended batch by batch as pages arrive, so everything already
//! written survives a failure later in the run. The header row is written
//! once per run, tracked in [`RunState`] rather than by inspecting the file.

use crate::harvest::record::ExtractedRecord;
use crate::harvest::request::WriteMode;
use crate::harvest::state::RunState;
use crate::HarvestError;
use chrono::{DateTime, TimeZone};
use std::fs::{self, OpenOptions};
use std::io;
use std::path::{Path, PathBuf};

const EXTENSION: &str = "csv";

/// Formats the run timestamp embedded in output and screenshot names
pub fn run_timestamp<Tz: TimeZone>(now: &DateTime<Tz>) -> String
where
    Tz::Offset: std::fmt::Display,
{
    now.format("%Y-%m-%d %H:%M:%S").to_string()
}

/// Replaces characters that do not belong in a file name
///
/// Path separators become `_` and leading dots are dropped, so the result
/// is always a single file name inside the output folder.
pub fn sanitize_file_name(name: &str) -> String {
    let name = name
        .trim()
        .replace([' ', '/', '\\'], "_")
        .replace(':', "-");

    match name.trim_start_matches('.') {
        "" => "tweets".to_string(),
        rest => rest.to_string(),
    }
}

/// Output path for a name inside the output folder
pub fn output_path(folder: &Path, stem: &str) -> PathBuf {
    folder.join(format!("{}.{}", sanitize_file_name(stem), EXTENSION))
}

/// Sidecar path an existing file is moved to in replace mode
///
/// `data/foo.csv` becomes `data/foo.old.csv`.
pub fn sidecar_path(path: &Path) -> PathBuf {
    let stem = path
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_default();
    path.with_file_name(format!("{}.old.{}", stem, EXTENSION))
}

/// First sidecar path that does not exist yet
///
/// Falls back to `foo.old.1.csv`, `foo.old.2.csv`, ... so an earlier backup
/// is never overwritten.
fn unused_sidecar_path(path: &Path) -> PathBuf {
    let sidecar = sidecar_path(path);
    if !sidecar.exists() {
        return sidecar;
    }

    let stem = path
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_default();
    (1..)
        .map(|n| path.with_file_name(format!("{}.old.{}.{}", stem, n, EXTENSION)))
        .find(|candidate| !candidate.exists())
        .unwrap_or(sidecar)
}

/// Path of the diagnostic screenshot for a failed run
pub fn error_screenshot_path(folder: &Path, run_timestamp: &str) -> PathBuf {
    folder.join(sanitize_file_name(&format!("Error-{}.png", run_timestamp)))
}

/// Prepares the output file before the run starts
///
/// Creates the output folder. In replace mode an existing file is renamed to
/// its sidecar path and that path is returned.
pub fn prepare_output(path: &Path, mode: WriteMode) -> io::Result<Option<PathBuf>> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        if !parent.exists() {
            fs::create_dir_all(parent)?;
            tracing::info!("Created new directory: {}", parent.display());
        }
    }

    if mode == WriteMode::Replace && path.exists() {
        let sidecar = unused_sidecar_path(path);
        tracing::info!(
            "Found existing file {}, renaming to {}",
            path.display(),
            sidecar.display()
        );
        fs::rename(path, &sidecar)?;
        return Ok(Some(sidecar));
    }

    Ok(None)
}

/// Appends record batches to one CSV file
#[derive(Debug, Clone)]
pub struct IncrementalWriter {
    path: PathBuf,
}

impl IncrementalWriter {
    pub fn new(path: PathBuf) -> Self {
        Self { path }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Appends one batch, writing the header first if this run has not yet
    ///
    /// Every field is quoted and every row ends with CRLF. An empty batch
    /// writes nothing and leaves the header flag untouched.
    pub fn append(
        &self,
        state: &mut RunState,
        records: &[ExtractedRecord],
    ) -> Result<PathBuf, HarvestError> {
        let Some(first) = records.first() else {
            return Ok(self.path.clone());
        };

        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)
            .map_err(|e| self.write_error(e.into()))?;

        let mut writer = csv::WriterBuilder::new()
            .quote_style(csv::QuoteStyle::Always)
            .terminator(csv::Terminator::CRLF)
            .from_writer(file);

        if !state.header_written {
            writer
                .write_record(first.headers())
                .map_err(|e| self.write_error(e))?;
        }

        for record in records {
            writer
                .write_record(record.values())
                .map_err(|e| self.write_error(e))?;
        }

        writer
            .flush()
            .map_err(|e| self.write_error(e.into()))?;
        state.header_written = true;

        Ok(self.path.clone())
    }

    fn write_error(&self, source: csv::Error) -> HarvestError {
        HarvestError::Write {
            path: self.path.clone(),
            source,
        }
    }
}
