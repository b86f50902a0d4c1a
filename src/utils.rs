//! Utility functions for text cleanup, log formatting, and file system checks.

use once_cell::sync::Lazy;
use regex::Regex;
use std::error::Error;
use std::fs as stdfs;
use tokio::fs::{self, File};
use tokio::io::AsyncWriteExt;
use tracing::{info, instrument, warn};

static WHITESPACE: Lazy<Regex> = Lazy::new(|| Regex::new(r"\s+").unwrap());

/// Collapse runs of whitespace (including newlines) to a single space and trim.
///
/// # Examples
///
/// ```ignore
/// assert_eq!(clean_text("  Dhaka \n\t traffic  "), "Dhaka traffic");
/// ```
pub fn clean_text(text: &str) -> String {
    WHITESPACE.replace_all(text, " ").trim().to_string()
}

/// Truncate a string for logging purposes.
///
/// Long strings are cut to at most `max` bytes (backing off to a character
/// boundary) with an ellipsis and the number of dropped bytes appended.
pub fn truncate_for_log(s: &str, max: usize) -> String {
    if s.len() <= max {
        return s.to_string();
    }
    let mut end = max;
    while !s.is_char_boundary(end) {
        end -= 1;
    }
    format!("{}…(+{} bytes)", &s[..end], s.len() - end)
}

/// Write `bytes` to an append-mode `file` and sync them to disk.
///
/// On error the file may hold any prefix of `bytes`; callers roll back with
/// [`File::set_len`].
pub async fn append_synced(file: &mut File, bytes: &[u8]) -> std::io::Result<()> {
    file.write_all(bytes).await?;
    file.flush().await?;
    file.sync_data().await
}

/// Ensure the data directory exists and accepts new files.
///
/// Creates the directory if needed, then creates and removes a scratch file.
#[instrument(level = "info", skip_all, fields(path = %path))]
pub async fn ensure_writable_dir(path: &str) -> Result<(), Box<dyn Error>> {
    fs::create_dir_all(path).await?;
    let scratch = stdfs::canonicalize(path)?.join(".crawler_write_check");
    stdfs::File::create(&scratch)?;
    if let Err(e) = stdfs::remove_file(&scratch) {
        warn!(file = %scratch.display(), error = %e, "Could not remove write-check file");
    }
    info!("Data directory is writable");
    Ok(())
}
