//! Site scraping: link discovery and article field extraction.
//!
//! The crawler follows a single source, split in two phases:
//!
//! 1. **Discovery**: [`prothomalo::ProthomAlo::discover_links`] finds article URLs on the homepage
//! 2. **Extraction**: [`prothomalo::extract_fields`] pulls fields out of one article page
//!
//! Extraction is tolerant of missing markup. Each field is produced by an
//! ordered list of [`strategy::Strategy`] values; the first non-empty result
//! wins.

pub mod prothomalo;
pub mod strategy;
