//! Reads the list of URLs to crawl.

use crate::error::{AppError, Result};
use std::fs;
use std::path::Path;

pub(crate) const URL_COLUMN: &str = "urls";

/// Makes sure the first line of the input file contains the `urls` header.
///
/// If it does not, the file is rewritten with a `urls` header followed by
/// every original line. Returns whether the file was modified.
pub(crate) fn ensure_header(path: &Path) -> Result<bool> {
    let content = fs::read_to_string(path)?;
    let first_line = content.lines().next().unwrap_or("").trim();
    if first_line.contains(URL_COLUMN) {
        return Ok(false);
    }

    let mut writer = csv::Writer::from_path(path)?;
    writer.write_record([URL_COLUMN])?;
    for line in content.lines() {
        writer.write_record([line.trim()])?;
    }
    writer.flush()?;
    tracing::info!("Added missing '{}' header to {}", URL_COLUMN, path.display());
    Ok(true)
}

/// Reads the `urls` column, skipping blank rows.
pub(crate) fn load_urls(path: &Path) -> Result<Vec<String>> {
    let mut reader = csv::ReaderBuilder::new()
        .flexible(true)
        .trim(csv::Trim::All)
        .from_path(path)?;

    let column = reader
        .headers()?
        .iter()
        .position(|h| h == URL_COLUMN)
        .ok_or_else(|| AppError::InvalidInput(format!("{} has no '{}' column", path.display(), URL_COLUMN)))?;

    let mut urls = Vec::new();
    for row in reader.records() {
        let row = row?;
        if let Some(token) = row.get(column).filter(|t| !t.is_empty()) {
            urls.push(token.to_string());
        }
    }
    Ok(urls)
}
