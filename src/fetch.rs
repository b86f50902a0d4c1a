//! The network boundary: download a page and return its markup.
//!
//! # Architecture
//!
//! - [`PageFetcher`]: Core trait, given a URL returns the raw markup or an error
//! - [`HttpFetcher`]: `reqwest` implementation sending browser-like headers
//!
//! There is no retry here. A failed homepage fetch skips the cycle and a
//! failed article fetch is retried on the next cycle.

use crate::config::CrawlerConfig;
use reqwest::header::{ACCEPT, ACCEPT_LANGUAGE, HeaderMap, HeaderValue, USER_AGENT};
use reqwest::Client;
use std::error::Error;
use std::time::Instant;
use tracing::{debug, instrument, warn};

/// Trait for downloading a page.
///
/// Implementors return the response body as text, or an error for transport
/// failures and non-success statuses.
pub trait PageFetcher {
    async fn fetch(&self, url: &str) -> Result<String, Box<dyn Error>>;
}

/// HTTP fetcher with fixed identification headers and a per-request timeout.
#[derive(Debug, Clone)]
pub struct HttpFetcher {
    client: Client,
}

impl HttpFetcher {
    /// Build a client from the configured headers and timeout.
    ///
    /// The header values are sent unchanged on every request.
    pub fn new(config: &CrawlerConfig) -> Result<Self, Box<dyn Error>> {
        let mut headers = HeaderMap::new();
        headers.insert(USER_AGENT, HeaderValue::from_str(&config.user_agent)?);
        headers.insert(ACCEPT, HeaderValue::from_str(&config.accept)?);
        headers.insert(ACCEPT_LANGUAGE, HeaderValue::from_str(&config.accept_language)?);

        let client = Client::builder()
            .default_headers(headers)
            .timeout(config.request_timeout())
            .build()?;
        Ok(Self { client })
    }
}

impl PageFetcher for HttpFetcher {
    #[instrument(level = "debug", skip(self))]
    async fn fetch(&self, url: &str) -> Result<String, Box<dyn Error>> {
        let t0 = Instant::now();
        let res = async {
            let response = self.client.get(url).send().await?.error_for_status()?;
            Ok::<_, reqwest::Error>(response.text().await?)
        }
        .await;
        let dt = t0.elapsed();

        match &res {
            Ok(body) => debug!(elapsed_ms = dt.as_millis() as u64, bytes = body.len(), "Fetched page"),
            Err(e) => warn!(elapsed_ms = dt.as_millis() as u64, error = %e, "Fetch failed"),
        }
        res.map_err(Into::into)
    }
}
