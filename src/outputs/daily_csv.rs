//! Daily CSV record files.
//!
//! Each article becomes one row of `<dir>/<prefix>_<YYYYMMDD>.csv`, where the
//! date is the day the article was scraped. A new file starts with the header
//! row; an existing file is only ever appended to.
//!
//! # Crash consistency
//!
//! A row is encoded completely in memory and written with a single append,
//! then flushed and synced. If the process dies mid-write the file ends in a
//! partial row. The first time a file is touched by a process, anything after
//! the last complete record is truncated, so a row is either fully present or
//! absent. A failed append is rolled back to the previous length and the file
//! is checked again before the next row goes in.

use crate::models::ArticleRecord;
use crate::outputs::RecordSink;
use chrono::NaiveDate;
use csv::{Terminator, WriterBuilder};
use serde::Serialize;
use std::collections::HashSet;
use std::error::Error;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use crate::utils::append_synced;
use tokio::fs::{self, OpenOptions};
use tracing::{debug, info, instrument, warn};

/// Column names, in order. Matches the field names of [`Row`].
const HEADER: [&str; 6] = [
    "title",
    "full_content",
    "image_url",
    "article_url",
    "published_at",
    "scraped_at",
];

#[derive(Serialize)]
struct Row<'a> {
    title: &'a str,
    full_content: &'a str,
    image_url: &'a str,
    article_url: &'a str,
    published_at: &'a str,
    scraped_at: String,
}

impl<'a> From<&'a ArticleRecord> for Row<'a> {
    fn from(record: &'a ArticleRecord) -> Self {
        Self {
            title: &record.title,
            full_content: &record.body,
            image_url: &record.image_url,
            article_url: record.id.as_str(),
            published_at: &record.published_at,
            scraped_at: record.scraped_at_string(),
        }
    }
}

/// Record sink writing one CSV file per calendar day.
#[derive(Debug)]
pub struct DailyCsvSink {
    dir: PathBuf,
    prefix: String,
    /// Files whose tail has already been checked by this process.
    checked: HashSet<PathBuf>,
}

impl DailyCsvSink {
    pub fn new(dir: impl Into<PathBuf>, prefix: impl Into<String>) -> Self {
        Self {
            dir: dir.into(),
            prefix: prefix.into(),
            checked: HashSet::new(),
        }
    }

    pub fn path_for(&self, date: NaiveDate) -> PathBuf {
        self.dir
            .join(format!("{}_{}.csv", self.prefix, date.format("%Y%m%d")))
    }
}

impl RecordSink for DailyCsvSink {
    #[instrument(level = "debug", skip_all, fields(article_url = %record.id))]
    async fn append(&mut self, record: &ArticleRecord) -> Result<(), Box<dyn Error>> {
        let path = self.path_for(record.scraped_at.date());
        if !self.checked.contains(&path) {
            repair_torn_tail(&path).await?;
            self.checked.insert(path.clone());
        }

        fs::create_dir_all(&self.dir).await?;
        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&path)
            .await?;
        let len = file.metadata().await?.len();
        let needs_header = len == 0;
        if needs_header {
            info!(path = %path.display(), "Starting new daily record file");
        }

        let bytes = encode_row(record, needs_header)?;
        if let Err(e) = append_synced(&mut file, &bytes).await {
            warn!(path = %path.display(), error = %e, "Record append failed; rolling back");
            self.checked.remove(&path);
            if let Err(undo) = file.set_len(len).await {
                warn!(path = %path.display(), error = %undo, "Could not roll back daily file");
            }
            return Err(e.into());
        }

        debug!(path = %path.display(), bytes = bytes.len(), "Appended record");
        Ok(())
    }
}

/// Encode `record` as one CSV row, preceded by the header row if asked.
fn encode_row(record: &ArticleRecord, with_header: bool) -> Result<Vec<u8>, Box<dyn Error>> {
    let mut wtr = WriterBuilder::new()
        .has_headers(false)
        .terminator(Terminator::Any(b'\n'))
        .from_writer(Vec::new());
    if with_header {
        wtr.write_record(HEADER)?;
    }
    wtr.serialize(Row::from(record))?;
    wtr.flush()?;
    Ok(wtr.into_inner().map_err(|e| e.into_error())?)
}

/// Length of the prefix of `bytes` made of complete CSV records.
///
/// A record ends at a newline outside quotes. Escaped quotes (`""`) toggle
/// the quote state twice and so cancel out.
fn complete_len(bytes: &[u8]) -> usize {
    let mut in_quotes = false;
    let mut keep = 0;
    for (i, &b) in bytes.iter().enumerate() {
        match b {
            b'"' => in_quotes = !in_quotes,
            b'\n' if !in_quotes => keep = i + 1,
            _ => {}
        }
    }
    keep
}

/// Truncate a partially written final record.
async fn repair_torn_tail(path: &Path) -> Result<(), Box<dyn Error>> {
    let bytes = match fs::read(path).await {
        Ok(bytes) => bytes,
        Err(e) if e.kind() == ErrorKind::NotFound => return Ok(()),
        Err(e) => return Err(e.into()),
    };

    let keep = complete_len(&bytes);
    if keep < bytes.len() {
        warn!(
            path = %path.display(),
            dropped_bytes = bytes.len() - keep,
            "Truncating partial record at end of daily file"
        );
        let file = OpenOptions::new().write(true).open(path).await?;
        file.set_len(keep as u64).await?;
        file.sync_all().await?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::ArticleId;
    use tempfile::tempdir;

    fn record(slug: &str, day: u32, body: &str) -> ArticleRecord {
        ArticleRecord {
            title: format!("Title {slug}"),
            body: body.to_string(),
            image_url: format!("https://images.prothomalo.com/{slug}.jpg"),
            id: ArticleId::parse(&format!("https://www.prothomalo.com/world/{slug}")).unwrap(),
            published_at: "2025-05-06T08:00:00+06:00".to_string(),
            scraped_at: NaiveDate::from_ymd_opt(2025, 5, day)
                .unwrap()
                .and_hms_opt(9, 15, 0)
                .unwrap(),
        }
    }

    fn read_rows(path: &Path) -> (Vec<String>, Vec<Vec<String>>) {
        let mut rdr = csv::Reader::from_path(path).unwrap();
        let headers = rdr.headers().unwrap().iter().map(String::from).collect();
        let rows = rdr
            .records()
            .map(|r| r.unwrap().iter().map(String::from).collect())
            .collect();
        (headers, rows)
    }

    #[tokio::test]
    async fn test_header_written_once_per_file() {
        let dir = tempdir().unwrap();
        let mut sink = DailyCsvSink::new(dir.path(), "prothom_alo");
        sink.append(&record("a", 6, "Body a")).await.unwrap();
        sink.append(&record("b", 6, "Body b")).await.unwrap();

        let path = dir.path().join("prothom_alo_20250506.csv");
        let (headers, rows) = read_rows(&path);
        assert_eq!(headers, HEADER);
        assert_eq!(rows.len(), 2);
        assert_eq!(
            rows[0],
            vec![
                "Title a",
                "Body a",
                "https://images.prothomalo.com/a.jpg",
                "https://www.prothomalo.com/world/a",
                "2025-05-06T08:00:00+06:00",
                "2025-05-06 09:15:00",
            ]
        );
        assert_eq!(rows[1][3], "https://www.prothomalo.com/world/b");
    }

    #[tokio::test]
    async fn test_new_file_per_day() {
        let dir = tempdir().unwrap();
        let mut sink = DailyCsvSink::new(dir.path(), "prothom_alo");
        sink.append(&record("a", 6, "x")).await.unwrap();
        sink.append(&record("b", 7, "y")).await.unwrap();

        let (h6, r6) = read_rows(&dir.path().join("prothom_alo_20250506.csv"));
        let (h7, r7) = read_rows(&dir.path().join("prothom_alo_20250507.csv"));
        assert_eq!(h6, HEADER);
        assert_eq!(h7, HEADER);
        assert_eq!(r6.len(), 1);
        assert_eq!(r7.len(), 1);
    }

    #[tokio::test]
    async fn test_existing_file_is_appended_not_overwritten() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("prothom_alo_20250506.csv");
        std::fs::write(
            &path,
            "title,full_content,image_url,article_url,published_at,scraped_at\n\
             Old,Old body,,https://www.prothomalo.com/world/old,,2025-05-06 01:00:00\n",
        )
        .unwrap();

        let mut sink = DailyCsvSink::new(dir.path(), "prothom_alo");
        sink.append(&record("a", 6, "New body")).await.unwrap();

        let (_, rows) = read_rows(&path);
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0][0], "Old");
        assert_eq!(rows[1][0], "Title a");
    }

    #[tokio::test]
    async fn test_body_with_quotes_and_paragraphs_survives() {
        let dir = tempdir().unwrap();
        let mut sink = DailyCsvSink::new(dir.path(), "prothom_alo");
        let body = "He said, \"enough\".\n\nনতুন অনুচ্ছেদ, with commas.";
        sink.append(&record("q", 6, body)).await.unwrap();

        let (_, rows) = read_rows(&dir.path().join("prothom_alo_20250506.csv"));
        assert_eq!(rows[0][1], body);
    }

    #[tokio::test]
    async fn test_partial_final_record_is_truncated() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("prothom_alo_20250506.csv");
        std::fs::write(
            &path,
            "title,full_content,image_url,article_url,published_at,scraped_at\n\
             Good,Good body,,https://www.prothomalo.com/world/good,,2025-05-06 01:00:00\n\
             Torn,\"first paragraph\n\nsecond par",
        )
        .unwrap();

        let mut sink = DailyCsvSink::new(dir.path(), "prothom_alo");
        sink.append(&record("a", 6, "After crash")).await.unwrap();

        let (_, rows) = read_rows(&path);
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0][0], "Good");
        assert_eq!(rows[1][1], "After crash");
    }

    #[cfg(target_os = "linux")]
    #[tokio::test]
    async fn test_failed_append_rechecks_file_before_next_row() {
        if !Path::new("/dev/full").exists() {
            return;
        }
        let dir = tempdir().unwrap();
        let path = dir.path().join("prothom_alo_20250506.csv");
        let parked = dir.path().join("parked.csv");
        let mut sink = DailyCsvSink::new(dir.path(), "prothom_alo");
        sink.append(&record("a", 6, "Body a")).await.unwrap();

        // A write that died inside a quoted body.
        let mut file = std::fs::OpenOptions::new().append(true).open(&path).unwrap();
        std::io::Write::write_all(&mut file, b"Torn,\"half a para").unwrap();
        drop(file);

        // Every write to /dev/full fails with ENOSPC.
        std::fs::rename(&path, &parked).unwrap();
        std::os::unix::fs::symlink("/dev/full", &path).unwrap();
        assert!(sink.append(&record("b", 6, "Body b")).await.is_err());
        assert!(!sink.checked.contains(&path));
        std::fs::remove_file(&path).unwrap();
        std::fs::rename(&parked, &path).unwrap();

        sink.append(&record("c", 6, "Body c")).await.unwrap();

        let (headers, rows) = read_rows(&path);
        assert_eq!(headers, HEADER);
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0][1], "Body a");
        assert_eq!(rows[1][1], "Body c");
    }

    #[test]
    fn test_header_matches_row_fields() {
        let rec = record("h", 6, "x");
        let mut wtr = WriterBuilder::new().from_writer(Vec::new());
        wtr.serialize(Row::from(&rec)).unwrap();
        let text = String::from_utf8(wtr.into_inner().unwrap()).unwrap();
        assert_eq!(text.lines().next().unwrap(), HEADER.join(","));
    }

    #[test]
    fn test_complete_len_respects_quotes() {
        assert_eq!(complete_len(b""), 0);
        assert_eq!(complete_len(b"a,b\n"), 4);
        assert_eq!(complete_len(b"a,b\nc,\"d\n"), 4);
        assert_eq!(complete_len(b"a,\"say \"\"hi\"\"\nthere\"\nc"), 21);
    }
}
