//! Data models for discovered articles and crawl bookkeeping.
//!
//! This module defines the core data structures used throughout the application:
//! - [`ArticleId`]: Normalized absolute article URL, the natural deduplication key
//! - [`ExtractedFields`]: Best-effort fields pulled out of an article page
//! - [`ArticleRecord`]: One row of the daily record file
//! - [`CycleReport`] and [`RunTotals`]: Per-cycle and whole-run counters

use chrono::NaiveDateTime;
use std::fmt;
use std::time::Duration;
use url::Url;

/// Title written when no title strategy produced a value.
pub const NO_TITLE: &str = "No title found";

/// Body written when no body strategy produced a value.
pub const BODY_EXTRACTION_FAILED: &str = "Content extraction failed - no story-element-text found";

/// Format used for the `scraped_at` column.
pub const SCRAPED_AT_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

/// A normalized absolute article URL.
///
/// Two hrefs that point at the same article compare equal once normalized:
/// the fragment and query string are dropped, as are trailing slashes on
/// non-root paths. Protocol-relative and relative links are resolved against
/// a base URL first.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ArticleId(String);

impl ArticleId {
    /// Normalize an already-parsed URL. Returns `None` for non-HTTP schemes.
    pub fn from_url(mut url: Url) -> Option<Self> {
        if !matches!(url.scheme(), "http" | "https") {
            return None;
        }
        url.set_fragment(None);
        url.set_query(None);
        let trimmed = url.path().trim_end_matches('/').to_string();
        if !trimmed.is_empty() {
            url.set_path(&trimmed);
        }
        Some(ArticleId(url.to_string()))
    }

    /// Parse an absolute URL string, e.g. a line of the history log.
    pub fn parse(s: &str) -> Option<Self> {
        Url::parse(s.trim()).ok().and_then(Self::from_url)
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ArticleId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl AsRef<str> for ArticleId {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

/// Fields pulled out of an article page. Every field is independently optional.
#[derive(Debug, Default, Clone, PartialEq)]
pub struct ExtractedFields {
    pub title: Option<String>,
    pub body: Option<String>,
    pub image_url: Option<String>,
    pub published_at: Option<String>,
}

/// A processed article, written once to the record sink and never modified.
#[derive(Debug, Clone, PartialEq)]
pub struct ArticleRecord {
    pub title: String,
    pub body: String,
    pub image_url: String,
    pub id: ArticleId,
    pub published_at: String,
    pub scraped_at: NaiveDateTime,
}

impl ArticleRecord {
    /// Build a record, filling missing fields with their placeholders.
    pub fn from_fields(id: ArticleId, fields: ExtractedFields, scraped_at: NaiveDateTime) -> Self {
        Self {
            title: fields.title.unwrap_or_else(|| NO_TITLE.to_string()),
            body: fields
                .body
                .unwrap_or_else(|| BODY_EXTRACTION_FAILED.to_string()),
            image_url: fields.image_url.unwrap_or_default(),
            id,
            published_at: fields.published_at.unwrap_or_default(),
            scraped_at,
        }
    }

    pub fn scraped_at_string(&self) -> String {
        self.scraped_at.format(SCRAPED_AT_FORMAT).to_string()
    }
}

/// Outcome of one discovery-to-report pass.
#[derive(Debug, Default, Clone, PartialEq)]
pub struct CycleReport {
    /// Unique identifiers found on the homepage.
    pub discovered: usize,
    /// Identifiers not yet in the seen set.
    pub new: usize,
    /// Articles written to the sink and recorded as seen.
    pub processed: usize,
    /// Articles skipped because of an item-local failure.
    pub failed: usize,
    /// The cycle never got past loading history or fetching the homepage.
    pub aborted: bool,
    /// A stop signal arrived before every new article was attempted.
    pub interrupted: bool,
    pub elapsed: Duration,
}

impl CycleReport {
    pub fn aborted(elapsed: Duration) -> Self {
        Self {
            aborted: true,
            elapsed,
            ..Self::default()
        }
    }
}

/// Running totals across cycles.
///
/// Threaded explicitly through the scheduler: each cycle's report is folded in
/// with [`RunTotals::absorb`].
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct RunTotals {
    pub articles: u64,
    pub cycles: u64,
}

impl RunTotals {
    /// Fold a cycle report into the totals. Interrupted cycles contribute their
    /// articles but do not count as completed.
    pub fn absorb(self, report: &CycleReport) -> Self {
        Self {
            articles: self.articles + report.processed as u64,
            cycles: self.cycles + u64::from(!report.interrupted),
        }
    }
}
