//! Output sinks for processed articles.
//!
//! # Submodules
//!
//! - [`daily_csv`]: Appends one CSV row per article to a file per calendar day
//!
//! # Output Structure
//!
//! ```text
//! data_dir/
//! ├── article_history.txt        # identifier log, see `history`
//! ├── prothom_alo_20250505.csv
//! └── prothom_alo_20250506.csv
//! ```

pub mod daily_csv;

use crate::models::ArticleRecord;
use std::error::Error;

/// Append-only destination for article records.
///
/// An `Ok` return means the record is durably stored; the caller only marks
/// the article as seen after that.
pub trait RecordSink {
    async fn append(&mut self, record: &ArticleRecord) -> Result<(), Box<dyn Error>>;
}
