//! Ordered field-extraction strategies.
//!
//! Each field of an article is extracted by trying a list of strategies in
//! order. A strategy looks at the parsed document and may return a value; the
//! first non-empty value wins. When every strategy comes up empty the caller
//! falls back to the field's placeholder.

use crate::utils::clean_text;
use scraper::{Html, Selector};

/// A named way of pulling one field out of a document.
#[derive(Clone, Copy)]
pub struct Strategy {
    pub name: &'static str,
    pub run: fn(&Html) -> Option<String>,
}

impl std::fmt::Debug for Strategy {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Strategy").field("name", &self.name).finish()
    }
}

/// The winning strategy and the value it produced.
#[derive(Debug, Clone, PartialEq)]
pub struct Match {
    pub strategy: &'static str,
    /// Position of the winning strategy in the list; `0` is the primary one.
    pub rank: usize,
    pub value: String,
}

/// Run `strategies` in order and return the first non-blank result.
pub fn first_match(doc: &Html, strategies: &[Strategy]) -> Option<Match> {
    strategies.iter().enumerate().find_map(|(rank, s)| {
        (s.run)(doc)
            .filter(|v| !v.trim().is_empty())
            .map(|value| Match {
                strategy: s.name,
                rank,
                value,
            })
    })
}

/// Whitespace-collapsed text of the first element matching `selector`.
pub fn first_text(doc: &Html, selector: &Selector) -> Option<String> {
    doc.select(selector)
        .next()
        .map(|el| clean_text(&el.text().collect::<String>()))
}

/// Value of `attr` on the first element matching `selector` that carries it.
pub fn first_attr(doc: &Html, selector: &Selector, attr: &str) -> Option<String> {
    doc.select(selector)
        .find_map(|el| el.value().attr(attr))
        .map(|v| v.trim().to_string())
}

/// First non-blank value among `attrs` on the first element matching
/// `selector`. Later elements are never consulted.
pub fn attr_of_first(doc: &Html, selector: &Selector, attrs: &[&str]) -> Option<String> {
    let el = doc.select(selector).next()?;
    attrs
        .iter()
        .filter_map(|a| el.value().attr(a))
        .map(str::trim)
        .find(|v| !v.is_empty())
        .map(str::to_string)
}

/// Text of every element matching `selector`, one paragraph each, separated
/// by blank lines. Elements without text are skipped.
pub fn joined_paragraphs(doc: &Html, selector: &Selector) -> Option<String> {
    let paragraphs: Vec<String> = doc
        .select(selector)
        .map(|el| clean_text(&el.text().collect::<String>()))
        .filter(|t| !t.is_empty())
        .collect();
    if paragraphs.is_empty() {
        None
    } else {
        Some(paragraphs.join("\n\n"))
    }
}
