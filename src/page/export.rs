//! JSON and CSV export of page extracts

use crate::HarvestError;
use serde::Serialize;
use std::fs;
use std::path::{Path, PathBuf};

/// Writes rows as pretty-printed JSON to `folder/name`
pub fn save_json<T: Serialize>(rows: &[T], folder: &Path, name: &str) -> Result<PathBuf, HarvestError> {
    fs::create_dir_all(folder)?;
    let path = folder.join(name);
    let json = serde_json::to_string_pretty(rows)?;
    fs::write(&path, json)?;
    Ok(path)
}

/// Writes rows as CSV to `folder/name`
///
/// The header comes from the row type's field names. No rows gives an
/// empty file.
pub fn save_csv<T: Serialize>(rows: &[T], folder: &Path, name: &str) -> Result<PathBuf, HarvestError> {
    fs::create_dir_all(folder)?;
    let path = folder.join(name);
    let write_error = |source| HarvestError::Write {
        path: path.clone(),
        source,
    };

    let mut writer = csv::Writer::from_path(&path).map_err(write_error)?;
    for row in rows {
        writer.serialize(row).map_err(write_error)?;
    }
    writer.flush().map_err(|e| write_error(e.into()))?;

    Ok(path)
}
