//! Prothom Alo homepage and article scraper.
//!
//! # Link discovery
//!
//! Every anchor on the homepage whose `href` contains `/<category>/` for one of
//! the configured sections is a candidate article, unless it points at a
//! video or photo gallery. Links are resolved against the homepage URL and
//! kept only when they stay on the same host.
//!
//! # Field extraction
//!
//! | Field | Strategies, in order | Placeholder |
//! |-------|----------------------|-------------|
//! | title | `h1`, `og:title` | `No title found` |
//! | published_at | `time[datetime]`, `article:published_time` | empty |
//! | image_url | first `figure img` (`src`, else `data-src`), `og:image` | empty |
//! | body | `.story-element-text`, `.storyContent p` | failure sentinel |

use crate::config::CrawlerConfig;
use crate::models::{ArticleId, ExtractedFields};
use crate::scrapers::strategy::{
    attr_of_first, first_attr, first_match, first_text, joined_paragraphs, Strategy,
};
use once_cell::sync::Lazy;
use scraper::{Html, Selector};
use std::error::Error;
use tracing::{debug, info, instrument};
use url::Url;

fn selector(css: &str) -> Selector {
    Selector::parse(css).unwrap()
}

static ANCHOR: Lazy<Selector> = Lazy::new(|| selector("a[href]"));
static H1: Lazy<Selector> = Lazy::new(|| selector("h1"));
static OG_TITLE: Lazy<Selector> = Lazy::new(|| selector(r#"meta[property="og:title"]"#));
static TIME: Lazy<Selector> = Lazy::new(|| selector("time[datetime]"));
static PUBLISHED_META: Lazy<Selector> =
    Lazy::new(|| selector(r#"meta[property="article:published_time"]"#));
static FIGURE_IMG: Lazy<Selector> = Lazy::new(|| selector("figure img"));
static OG_IMAGE: Lazy<Selector> = Lazy::new(|| selector(r#"meta[property="og:image"]"#));
static STORY_TEXT: Lazy<Selector> = Lazy::new(|| selector(".story-element-text"));
static STORY_CONTENT_P: Lazy<Selector> = Lazy::new(|| selector(".storyContent p"));

const TITLE: &[Strategy] = &[
    Strategy { name: "h1", run: |d| first_text(d, &H1) },
    Strategy { name: "og:title", run: |d| first_attr(d, &OG_TITLE, "content") },
];

const PUBLISHED_AT: &[Strategy] = &[
    Strategy { name: "time", run: |d| first_attr(d, &TIME, "datetime") },
    Strategy { name: "article:published_time", run: |d| first_attr(d, &PUBLISHED_META, "content") },
];

const IMAGE_URL: &[Strategy] = &[
    Strategy { name: "first figure img", run: |d| attr_of_first(d, &FIGURE_IMG, &["src", "data-src"]) },
    Strategy { name: "og:image", run: |d| first_attr(d, &OG_IMAGE, "content") },
];

const BODY: &[Strategy] = &[
    Strategy { name: "story-element-text", run: |d| joined_paragraphs(d, &STORY_TEXT) },
    Strategy { name: "storyContent p", run: |d| joined_paragraphs(d, &STORY_CONTENT_P) },
];

/// Site-specific knowledge: where the homepage is and which links are articles.
#[derive(Debug, Clone)]
pub struct ProthomAlo {
    home: Url,
    section_needles: Vec<String>,
    excluded_paths: Vec<String>,
}

impl ProthomAlo {
    pub fn new(config: &CrawlerConfig) -> Result<Self, Box<dyn Error>> {
        let home = Url::parse(&config.home_url)?;
        let section_needles = config
            .categories
            .iter()
            .map(|c| format!("/{}/", c.trim_matches('/')))
            .collect();
        Ok(Self {
            home,
            section_needles,
            excluded_paths: config.excluded_paths.clone(),
        })
    }

    pub fn home_url(&self) -> &str {
        self.home.as_str()
    }

    /// Candidate article identifiers linked from the homepage.
    ///
    /// May contain duplicates; the same story is often linked from several
    /// sections.
    #[instrument(level = "info", skip_all)]
    pub fn discover_links(&self, html: &str) -> Vec<ArticleId> {
        let document = Html::parse_document(html);
        let links: Vec<ArticleId> = document
            .select(&ANCHOR)
            .filter_map(|el| el.value().attr("href"))
            .filter(|href| self.section_needles.iter().any(|n| href.contains(n.as_str())))
            .filter(|href| !self.excluded_paths.iter().any(|x| href.contains(x.as_str())))
            .filter_map(|href| {
                let url = self.home.join(href.trim()).ok()?;
                if url.host_str() != self.home.host_str() {
                    debug!(%url, "Skipping off-site link");
                    return None;
                }
                ArticleId::from_url(url)
            })
            .collect();

        info!(count = links.len(), source = %self.home, "Discovered article links");
        links
    }
}

/// Extract the article fields from `html`. Never fails; missing fields are `None`.
#[instrument(level = "debug", skip_all)]
pub fn extract_fields(html: &str) -> ExtractedFields {
    let document = Html::parse_document(html);

    let body = match first_match(&document, BODY) {
        Some(m) if m.rank > 0 => {
            info!(
                strategy = m.strategy,
                chars = m.value.chars().count(),
                "No story-element-text found; used fallback body"
            );
            Some(m.value)
        }
        Some(m) => Some(m.value),
        None => {
            info!("No body found by any strategy");
            None
        }
    };

    ExtractedFields {
        title: first_match(&document, TITLE).map(|m| m.value),
        body,
        image_url: first_match(&document, IMAGE_URL).map(|m| m.value),
        published_at: first_match(&document, PUBLISHED_AT).map(|m| m.value),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const HOMEPAGE: &str = r#"
        <html><body>
          <a href="/bangladesh/capital/abc123">Dhaka story</a>
          <a href="https://www.prothomalo.com/world/asia/def456">World story</a>
          <a href="/world/asia/def456/">World story again</a>
          <a href="//www.prothomalo.com/sports/cricket/ghi789">Cricket</a>
          <a href="/video/bangladesh/v1">Video</a>
          <a href="/gallery/world/g1">Gallery</a>
          <a href="/about">About</a>
          <a href="https://www.facebook.com/sharer?u=/world/x/">Share</a>
          <a>No href</a>
        </body></html>
    "#;

    fn site() -> ProthomAlo {
        ProthomAlo::new(&CrawlerConfig::default()).unwrap()
    }

    fn id(s: &str) -> ArticleId {
        ArticleId::parse(s).unwrap()
    }

    #[test]
    fn test_discover_links_filters_and_resolves() {
        let links = site().discover_links(HOMEPAGE);
        assert_eq!(
            links,
            vec![
                id("https://www.prothomalo.com/bangladesh/capital/abc123"),
                id("https://www.prothomalo.com/world/asia/def456"),
                id("https://www.prothomalo.com/world/asia/def456"),
                id("https://www.prothomalo.com/sports/cricket/ghi789"),
            ]
        );
    }

    #[test]
    fn test_discover_links_empty_page() {
        assert!(site().discover_links("<html></html>").is_empty());
    }

    #[test]
    fn test_extract_primary_fields() {
        let html = r#"
            <html><head>
              <meta property="og:title" content="OG title">
            </head><body>
              <h1>  Padma bridge
                  toll collection  </h1>
              <time datetime="2025-05-06T08:30:00+06:00">6 May</time>
              <figure><img src="https://images.prothomalo.com/a.jpg"></figure>
              <div class="story-element-text"><p>First <b>paragraph</b>.</p></div>
              <div class="story-element-text"></div>
              <div class="story-element-text"><p>Second paragraph.</p></div>
              <div class="storyContent"><p>Ignored fallback.</p></div>
            </body></html>
        "#;
        let fields = extract_fields(html);
        assert_eq!(fields.title.as_deref(), Some("Padma bridge toll collection"));
        assert_eq!(fields.published_at.as_deref(), Some("2025-05-06T08:30:00+06:00"));
        assert_eq!(fields.image_url.as_deref(), Some("https://images.prothomalo.com/a.jpg"));
        assert_eq!(
            fields.body.as_deref(),
            Some("First paragraph.\n\nSecond paragraph.")
        );
    }

    #[test]
    fn test_extract_fallbacks() {
        let html = r#"
            <html><head>
              <meta property="og:title" content="Only OG title">
              <meta property="article:published_time" content="2025-05-06">
            </head><body>
              <figure><img data-src="/lazy.jpg"></figure>
              <div class="storyContent"><p>Fallback one.</p><p>Fallback two.</p></div>
            </body></html>
        "#;
        let fields = extract_fields(html);
        assert_eq!(fields.title.as_deref(), Some("Only OG title"));
        assert_eq!(fields.published_at.as_deref(), Some("2025-05-06"));
        assert_eq!(fields.image_url.as_deref(), Some("/lazy.jpg"));
        assert_eq!(fields.body.as_deref(), Some("Fallback one.\n\nFallback two."));
    }

    #[test]
    fn test_image_comes_from_first_figure_only() {
        let html = r#"
            <html><body>
              <figure><img data-src="/lead-lazy.jpg"></figure>
              <figure><img src="/inline.jpg"></figure>
            </body></html>
        "#;
        assert_eq!(extract_fields(html).image_url.as_deref(), Some("/lead-lazy.jpg"));
    }

    #[test]
    fn test_extract_nothing() {
        let fields = extract_fields("<html><body><p>Just text</p></body></html>");
        assert_eq!(fields, ExtractedFields::default());
    }
}
