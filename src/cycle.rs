//! One discovery-to-report pass over the homepage.
//!
//! ```text
//! FETCH_HOME -> DISCOVER_LINKS -> FILTER_NEW -> PROCESS_EACH -> REPORT
//! ```
//!
//! A failure to load the identifier log or to fetch the homepage aborts the
//! cycle without touching any state. Inside `PROCESS_EACH` every article is
//! independent: a failure is logged and the article stays unseen, so it is
//! tried again next cycle. An article is marked seen only after its record
//! has been written.

use crate::delta;
use crate::fetch::PageFetcher;
use crate::history::IdentifierStore;
use crate::models::{ArticleId, ArticleRecord, CycleReport};
use crate::outputs::RecordSink;
use crate::scheduler::StopSignal;
use crate::scrapers::prothomalo::{extract_fields, ProthomAlo};
use crate::utils::truncate_for_log;
use chrono::Local;
use itertools::Itertools;
use rand::{rng, Rng};
use std::error::Error;
use std::time::{Duration, Instant};
use tokio::time::sleep;
use tracing::{debug, error, info, instrument, warn};

/// Politeness pause taken before every article fetch.
///
/// The length is drawn uniformly from `min..=max` each time.
#[derive(Debug, Clone, Copy)]
pub struct Throttle {
    min: Duration,
    max: Duration,
}

impl Throttle {
    pub fn new(min: Duration, max: Duration) -> Self {
        Self {
            min,
            max: max.max(min),
        }
    }

    pub fn next_delay(&self) -> Duration {
        if self.min == self.max {
            return self.min;
        }
        rng().random_range(self.min..=self.max)
    }

    pub async fn pause(&self) {
        let delay = self.next_delay();
        if !delay.is_zero() {
            debug!(?delay, "Politeness pause");
            sleep(delay).await;
        }
    }
}

/// Everything a cycle needs, wired together once at startup.
pub struct Crawler<F, S> {
    fetcher: F,
    site: ProthomAlo,
    store: IdentifierStore,
    sink: S,
    throttle: Throttle,
}

impl<F, S> Crawler<F, S>
where
    F: PageFetcher,
    S: RecordSink,
{
    pub fn new(fetcher: F, site: ProthomAlo, store: IdentifierStore, sink: S, throttle: Throttle) -> Self {
        Self {
            fetcher,
            site,
            store,
            sink,
            throttle,
        }
    }

    /// Run one cycle and report how many new articles were stored.
    ///
    /// Never returns an error; failures are logged and reflected in the report.
    /// `stop` is checked between articles, never during one.
    #[instrument(level = "info", skip_all)]
    pub async fn run_cycle(&mut self, stop: &StopSignal) -> CycleReport {
        let t0 = Instant::now();
        info!("Starting scrape cycle");

        // FETCH_HOME
        if let Err(e) = self.store.reload().await {
            error!(path = %self.store.path().display(), error = %e, "Could not load identifier log; skipping cycle");
            return CycleReport::aborted(t0.elapsed());
        }
        let home_url = self.site.home_url().to_string();
        info!(url = %home_url, "Fetching homepage to extract article links");
        let html = match self.fetcher.fetch(&home_url).await {
            Ok(html) => html,
            Err(e) => {
                error!(url = %home_url, error = %e, "Homepage fetch failed; skipping cycle");
                return CycleReport::aborted(t0.elapsed());
            }
        };

        // DISCOVER_LINKS
        let discovered = self.site.discover_links(&html);
        let discovered_unique = discovered.iter().unique().count();

        // FILTER_NEW
        let new_ids = delta::new_ids(discovered, self.store.seen());
        let mut report = CycleReport {
            discovered: discovered_unique,
            new: new_ids.len(),
            ..CycleReport::default()
        };
        if new_ids.is_empty() {
            info!(discovered = discovered_unique, "No new articles found in this cycle");
            report.elapsed = t0.elapsed();
            return report;
        }
        info!(
            discovered = discovered_unique,
            new = new_ids.len(),
            "Found new article links; processing"
        );

        // PROCESS_EACH
        let total = new_ids.len();
        for (i, id) in new_ids.iter().enumerate() {
            if stop.is_stopped() {
                warn!(remaining = total - i, "Stop requested; leaving remaining articles for later");
                report.interrupted = true;
                break;
            }

            self.throttle.pause().await;
            info!(index = i + 1, total, url = %id, "Fetching article");
            match self.process_article(id).await {
                Ok(record) => {
                    info!(
                        url = %id,
                        chars = record.body.chars().count(),
                        "Saved article successfully"
                    );
                    report.processed += 1;
                }
                Err(e) => {
                    warn!(url = %id, error = %truncate_for_log(&e.to_string(), 300), "Error processing article; will retry next cycle");
                    report.failed += 1;
                }
            }
        }

        // REPORT
        report.elapsed = t0.elapsed();
        info!(
            processed = report.processed,
            failed = report.failed,
            interrupted = report.interrupted,
            elapsed_ms = report.elapsed.as_millis() as u64,
            "Scrape cycle finished"
        );
        report
    }

    /// Fetch, extract, write, then mark seen.
    async fn process_article(&mut self, id: &ArticleId) -> Result<ArticleRecord, Box<dyn Error>> {
        let html = self.fetcher.fetch(id.as_str()).await?;
        let fields = extract_fields(&html);
        let record = ArticleRecord::from_fields(id.clone(), fields, Local::now().naive_local());

        self.sink.append(&record).await?;
        if let Err(e) = self.store.record(id).await {
            error!(url = %id, error = %e, "Record written but identifier not saved; article may be stored twice");
            return Err(e);
        }
        Ok(record)
    }
}
