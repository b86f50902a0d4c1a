//! Durable record of article identifiers that have already been processed.
//!
//! The log is a UTF-8 text file with one identifier per line, only ever
//! appended to. Every append is flushed and synced before [`IdentifierStore::record`]
//! returns, so a restart never sees an identifier as new once it was recorded.
//!
//! A crash in the middle of an append leaves a final line without its
//! newline. Such a line is ignored by [`load`] and cut off when the store is
//! opened, so a half-written URL can never shadow a real article. A failed
//! append inside a running process is rolled back to the previous length, and
//! every append first checks that the log still ends in a newline.

use crate::models::ArticleId;
use crate::utils::append_synced;
use std::collections::HashSet;
use std::error::Error;
use std::io::{ErrorKind, SeekFrom};
use std::path::{Path, PathBuf};
use tokio::fs::{self, File, OpenOptions};
use tokio::io::{AsyncReadExt, AsyncSeekExt};
use tracing::{debug, info, instrument, warn};

/// Every identifier ever successfully processed.
pub type SeenSet = HashSet<ArticleId>;

/// Read the identifier log at `path`.
///
/// A missing file yields an empty set. Lines that do not parse as absolute
/// URLs are skipped with a warning.
#[instrument(level = "debug", skip_all, fields(path = %path.display()))]
pub async fn load(path: &Path) -> Result<SeenSet, Box<dyn Error>> {
    let text = match fs::read_to_string(path).await {
        Ok(text) => text,
        Err(e) if e.kind() == ErrorKind::NotFound => {
            debug!("No identifier log yet; starting empty");
            return Ok(SeenSet::new());
        }
        Err(e) => return Err(e.into()),
    };

    let complete = &text[..complete_len(&text)];
    let mut seen = SeenSet::new();
    for line in complete.lines().map(str::trim).filter(|l| !l.is_empty()) {
        match ArticleId::parse(line) {
            Some(id) => {
                seen.insert(id);
            }
            None => warn!(line, "Skipping unparseable identifier log line"),
        }
    }
    debug!(count = seen.len(), "Loaded identifier log");
    Ok(seen)
}

/// Length of the prefix of `text` made of complete, newline-terminated lines.
fn complete_len(text: &str) -> usize {
    text.rfind('\n').map_or(0, |i| i + 1)
}

/// Append-only, file-backed store of seen identifiers.
#[derive(Debug)]
pub struct IdentifierStore {
    path: PathBuf,
    seen: SeenSet,
}

impl IdentifierStore {
    /// Open the log at `path`, repairing a torn final line, and load it.
    #[instrument(level = "info", skip_all, fields(path = %path.as_ref().display()))]
    pub async fn open(path: impl AsRef<Path>) -> Result<Self, Box<dyn Error>> {
        let path = path.as_ref().to_path_buf();
        repair_torn_tail(&path).await?;
        let seen = load(&path).await?;
        info!(count = seen.len(), "Identifier store opened");
        Ok(Self { path, seen })
    }

    /// Re-read the log from disk.
    pub async fn reload(&mut self) -> Result<(), Box<dyn Error>> {
        self.seen = load(&self.path).await?;
        Ok(())
    }

    pub fn seen(&self) -> &SeenSet {
        &self.seen
    }

    pub fn contains(&self, id: &ArticleId) -> bool {
        self.seen.contains(id)
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Durably append `id` to the log.
    ///
    /// Returns once the line has been synced to disk. Recording an identifier
    /// that is already present is a no-op.
    #[instrument(level = "debug", skip_all, fields(%id))]
    pub async fn record(&mut self, id: &ArticleId) -> Result<(), Box<dyn Error>> {
        if self.contains(id) {
            debug!("Identifier already recorded");
            return Ok(());
        }

        let mut file = OpenOptions::new()
            .create(true)
            .read(true)
            .append(true)
            .open(&self.path)
            .await?;
        let mut len = file.metadata().await?.len();
        if !ends_with_newline(&mut file, len).await? {
            repair_torn_tail(&self.path).await?;
            len = file.metadata().await?.len();
        }

        if let Err(e) = append_synced(&mut file, format!("{id}\n").as_bytes()).await {
            warn!(error = %e, "Identifier append failed; rolling back");
            if let Err(undo) = file.set_len(len).await {
                warn!(path = %self.path.display(), error = %undo, "Could not roll back identifier log");
            }
            return Err(e.into());
        }

        self.seen.insert(id.clone());
        Ok(())
    }
}

/// Whether the first `len` bytes of `file` are empty or end in `\n`.
async fn ends_with_newline(file: &mut File, len: u64) -> Result<bool, Box<dyn Error>> {
    if len == 0 {
        return Ok(true);
    }
    file.seek(SeekFrom::Start(len - 1)).await?;
    Ok(file.read_u8().await? == b'\n')
}

/// Truncate a final line that lacks its newline.
async fn repair_torn_tail(path: &Path) -> Result<(), Box<dyn Error>> {
    let bytes = match fs::read(path).await {
        Ok(bytes) => bytes,
        Err(e) if e.kind() == ErrorKind::NotFound => return Ok(()),
        Err(e) => return Err(e.into()),
    };

    let keep = bytes.iter().rposition(|&b| b == b'\n').map_or(0, |i| i + 1);
    if keep < bytes.len() {
        warn!(
            path = %path.display(),
            dropped_bytes = bytes.len() - keep,
            "Truncating torn final line of identifier log"
        );
        let file = OpenOptions::new().write(true).open(path).await?;
        file.set_len(keep as u64).await?;
        file.sync_all().await?;
    }
    Ok(())
}
