//! Crawler configuration.
//!
//! Values come from three layers, later ones winning: built-in defaults, an
//! optional YAML file (`--config`), and individual command-line flags.
//!
//! ```yaml
//! data_dir: /var/lib/prothom-alo
//! cycle_interval_secs: 900
//! min_delay_ms: 2500
//! max_delay_ms: 4000
//! ```

use crate::cli::Cli;
use serde::Deserialize;
use std::error::Error;
use std::path::PathBuf;
use std::time::Duration;
use tracing::{debug, instrument};
use url::Url;

/// Longest accepted wait between cycles and countdown tick: one week.
pub const MAX_INTERVAL_SECS: u64 = 7 * 24 * 60 * 60;

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct CrawlerConfig {
    /// Homepage polled every cycle. Article links are resolved against it.
    pub home_url: String,
    /// Directory holding the identifier log and the daily record files.
    pub data_dir: String,
    /// File name of the identifier log inside `data_dir`.
    pub history_file: String,
    /// Daily record files are named `<record_prefix>_<YYYYMMDD>.csv`.
    pub record_prefix: String,
    /// Sections whose links count as articles (`/<category>/` in the href).
    pub categories: Vec<String>,
    /// Links containing any of these fragments are never articles.
    pub excluded_paths: Vec<String>,
    /// Wait between the end of one cycle and the start of the next.
    pub cycle_interval_secs: u64,
    /// How often the remaining wait is logged.
    pub countdown_tick_secs: u64,
    /// Politeness pause before each article fetch is drawn from
    /// `min_delay_ms..max_delay_ms`.
    pub min_delay_ms: u64,
    pub max_delay_ms: u64,
    /// Per-request timeout.
    pub request_timeout_secs: u64,
    pub user_agent: String,
    pub accept: String,
    pub accept_language: String,
}

impl Default for CrawlerConfig {
    fn default() -> Self {
        Self {
            home_url: "https://www.prothomalo.com".to_owned(),
            data_dir: "data".to_owned(),
            history_file: "article_history.txt".to_owned(),
            record_prefix: "prothom_alo".to_owned(),
            categories: [
                "bangladesh",
                "world",
                "economy",
                "sports",
                "entertainment",
                "opinion",
                "lifestyle",
                "technology",
            ]
            .into_iter()
            .map(String::from)
            .collect(),
            excluded_paths: vec!["/video/".to_owned(), "/gallery/".to_owned()],
            cycle_interval_secs: 600,
            countdown_tick_secs: 60,
            min_delay_ms: 2000,
            max_delay_ms: 3000,
            request_timeout_secs: 30,
            user_agent: "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/91.0.4472.124 Safari/537.36".to_owned(),
            accept: "text/html,application/xhtml+xml,application/xml;q=0.9,image/webp,*/*;q=0.8".to_owned(),
            accept_language: "en-US,en;q=0.9,bn;q=0.8".to_owned(),
        }
    }
}

impl CrawlerConfig {
    /// Load the YAML file at `path`, or the defaults when no path is given.
    #[instrument(level = "info")]
    pub fn load(path: Option<&str>) -> Result<Self, Box<dyn Error>> {
        match path {
            Some(path) => {
                let text = std::fs::read_to_string(path)?;
                let config = Self::from_yaml(&text)?;
                debug!(?config, "Loaded configuration file");
                Ok(config)
            }
            None => Ok(Self::default()),
        }
    }

    pub fn from_yaml(text: &str) -> Result<Self, Box<dyn Error>> {
        Ok(serde_yaml::from_str(text)?)
    }

    /// Apply command-line overrides on top of the loaded values.
    pub fn apply_cli(&mut self, cli: &Cli) {
        if let Some(dir) = &cli.data_dir {
            self.data_dir = dir.clone();
        }
        if let Some(mins) = cli.interval_mins {
            self.cycle_interval_secs = mins.saturating_mul(60);
        }
    }

    /// Reject settings the crawler cannot run with.
    pub fn validate(&self) -> Result<(), Box<dyn Error>> {
        let home = Url::parse(&self.home_url)
            .map_err(|e| format!("home_url {:?} is not a valid URL: {e}", self.home_url))?;
        if home.host_str().is_none() {
            return Err(format!("home_url {:?} has no host", self.home_url).into());
        }
        if self.data_dir.trim().is_empty() {
            return Err("data_dir cannot be empty".into());
        }
        if self.history_file.trim().is_empty() {
            return Err("history_file cannot be empty".into());
        }
        if self.categories.is_empty() {
            return Err("categories cannot be empty".into());
        }
        if !(1..=MAX_INTERVAL_SECS).contains(&self.cycle_interval_secs) {
            return Err(format!(
                "cycle_interval_secs ({}) must be between 1 and {MAX_INTERVAL_SECS}",
                self.cycle_interval_secs
            )
            .into());
        }
        if !(1..=MAX_INTERVAL_SECS).contains(&self.countdown_tick_secs) {
            return Err(format!(
                "countdown_tick_secs ({}) must be between 1 and {MAX_INTERVAL_SECS}",
                self.countdown_tick_secs
            )
            .into());
        }
        if self.request_timeout_secs == 0 {
            return Err("request_timeout_secs must be greater than zero".into());
        }
        if self.min_delay_ms >= self.max_delay_ms {
            return Err(format!(
                "min_delay_ms ({}) must be less than max_delay_ms ({})",
                self.min_delay_ms, self.max_delay_ms
            )
            .into());
        }
        Ok(())
    }

    pub fn history_path(&self) -> PathBuf {
        PathBuf::from(&self.data_dir).join(&self.history_file)
    }

    pub fn cycle_interval(&self) -> Duration {
        Duration::from_secs(self.cycle_interval_secs)
    }

    pub fn countdown_tick(&self) -> Duration {
        Duration::from_secs(self.countdown_tick_secs)
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }

    pub fn delay_range(&self) -> (Duration, Duration) {
        (
            Duration::from_millis(self.min_delay_ms),
            Duration::from_millis(self.max_delay_ms),
        )
    }
}
