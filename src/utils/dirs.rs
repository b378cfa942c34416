use anyhow::{Context, Result};
use std::fs;
use std::path::Path;

// Extracted filings land under <FILINGS_DIR>/<ticker>/<form>/
pub const FILINGS_DIR: &str = "data/filings";

pub fn ensure_dir(path: &Path) -> Result<()> {
    fs::create_dir_all(path).with_context(|| format!("Failed to create directory {:?}", path))?;
    Ok(())
}

/// Creates the directory that will hold a SQLite database file, if the URL
/// names one.
pub fn ensure_database_parent(database_url: &str) -> Result<()> {
    let path = database_url
        .trim_start_matches("sqlite://")
        .trim_start_matches("sqlite:");
    if path.is_empty() || path.starts_with(":memory:") {
        return Ok(());
    }
    let path = path.split('?').next().unwrap_or(path);
    match Path::new(path).parent() {
        Some(parent) if !parent.as_os_str().is_empty() => ensure_dir(parent),
        _ => Ok(()),
    }
}
