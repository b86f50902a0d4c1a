//! Repeating cycles until a stop signal arrives.
//!
//! The policy for how long to wait after a cycle lives behind the
//! [`Schedule`] trait; [`FixedInterval`] waits the same time after every
//! cycle, whatever happened in it. The loop itself only runs a cycle, folds
//! its report into the [`RunTotals`], asks the schedule for the next wait and
//! sleeps. The wait is cut short by [`StopSignal`].

use crate::cycle::Crawler;
use crate::fetch::PageFetcher;
use crate::models::{CycleReport, RunTotals};
use crate::outputs::RecordSink;
use std::time::Duration;
use tokio::sync::watch;
use tokio::time::{sleep_until, Instant};
use tracing::{info, instrument, warn};

/// Decides how long to wait after a cycle before starting the next one.
pub trait Schedule {
    fn next_wait(&mut self, last: &CycleReport) -> Duration;
}

/// The same wait after every cycle. No backoff after failed cycles.
#[derive(Debug, Clone, Copy)]
pub struct FixedInterval {
    interval: Duration,
}

impl FixedInterval {
    pub fn new(interval: Duration) -> Self {
        Self { interval }
    }
}

impl Schedule for FixedInterval {
    fn next_wait(&mut self, _last: &CycleReport) -> Duration {
        self.interval
    }
}

/// Stand-in deadline for waits too long to represent as an [`Instant`].
const FAR_FUTURE: Duration = Duration::from_secs(30 * 365 * 24 * 60 * 60);

/// `now + wait`, clamped to [`FAR_FUTURE`] when the sum would overflow.
fn deadline_after(now: Instant, wait: Duration) -> Instant {
    now.checked_add(wait)
        .or_else(|| now.checked_add(FAR_FUTURE))
        .unwrap_or(now)
}

/// Cloneable view of the process-wide stop request.
#[derive(Debug, Clone)]
pub struct StopSignal {
    rx: watch::Receiver<bool>,
}

impl StopSignal {
    /// A signal triggered by sending `true` on the returned sender.
    pub fn channel() -> (watch::Sender<bool>, Self) {
        let (tx, rx) = watch::channel(false);
        (tx, Self { rx })
    }

    /// A signal that never fires.
    #[cfg(test)]
    pub fn never() -> Self {
        Self::channel().1
    }

    /// A signal fired by Ctrl+C. Must be called from within a tokio runtime.
    pub fn on_ctrl_c() -> Self {
        let (tx, signal) = Self::channel();
        tokio::spawn(async move {
            match tokio::signal::ctrl_c().await {
                Ok(()) => {
                    info!("Received stop signal; finishing current article");
                    let _ = tx.send(true);
                }
                Err(e) => warn!(error = %e, "Could not listen for Ctrl+C"),
            }
        });
        signal
    }

    pub fn is_stopped(&self) -> bool {
        *self.rx.borrow()
    }

    /// Sleep for `total`, logging the remaining time every `tick`.
    ///
    /// Returns `true` as soon as a stop is requested, `false` once the full
    /// wait has elapsed.
    pub async fn sleep(&mut self, total: Duration, tick: Duration) -> bool {
        let now = Instant::now();
        let deadline = deadline_after(now, total);
        let mut next_tick = deadline_after(now, tick).min(deadline);

        loop {
            if self.is_stopped() {
                return true;
            }
            if Instant::now() >= deadline {
                return false;
            }

            let wake = next_tick.min(deadline);
            tokio::select! {
                _ = sleep_until(wake) => {
                    if wake == next_tick && next_tick < deadline {
                        let remaining = deadline.saturating_duration_since(Instant::now());
                        info!(
                            remaining_mins = remaining.as_secs().div_ceil(60),
                            "Waiting until next scrape"
                        );
                        next_tick = deadline_after(next_tick, tick).min(deadline);
                    }
                }
                changed = self.rx.changed() => {
                    if changed.is_err() {
                        // Sender gone: no stop can arrive any more.
                        sleep_until(deadline).await;
                        return self.is_stopped();
                    }
                }
            }
        }
    }
}

/// Run cycles until `stop` fires and return the accumulated totals.
///
/// A stop during a cycle lets the current article finish; a stop during the
/// wait ends it immediately.
#[instrument(level = "info", skip_all)]
pub async fn run_until_stopped<F, S, P>(
    crawler: &mut Crawler<F, S>,
    schedule: &mut P,
    stop: &mut StopSignal,
    tick: Duration,
) -> RunTotals
where
    F: PageFetcher,
    S: RecordSink,
    P: Schedule,
{
    let mut totals = RunTotals::default();

    while !stop.is_stopped() {
        let report = crawler.run_cycle(stop).await;
        totals = totals.absorb(&report);
        if report.interrupted {
            break;
        }
        info!(
            cycle = totals.cycles,
            discovered = report.discovered,
            new = report.new,
            articles = report.processed,
            failed = report.failed,
            aborted = report.aborted,
            total_articles = totals.articles,
            "Cycle completed"
        );

        let wait = schedule.next_wait(&report);
        info!(wait_secs = wait.as_secs(), "Waiting before next scrape cycle");
        if stop.sleep(wait, tick).await {
            break;
        }
    }

    info!(
        total_articles = totals.articles,
        total_cycles = totals.cycles,
        "Crawler stopped"
    );
    totals
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::CrawlerConfig;
    use crate::cycle::Throttle;
    use crate::history::IdentifierStore;
    use crate::models::ArticleRecord;
    use crate::scrapers::prothomalo::ProthomAlo;
    use std::error::Error;

    struct Offline;

    impl PageFetcher for Offline {
        async fn fetch(&self, url: &str) -> Result<String, Box<dyn Error>> {
            Err(format!("network unreachable: {url}").into())
        }
    }

    struct NullSink;

    impl RecordSink for NullSink {
        async fn append(&mut self, _record: &ArticleRecord) -> Result<(), Box<dyn Error>> {
            Ok(())
        }
    }

    /// Requests a stop once `cycles` cycles have finished.
    struct StopAfter {
        cycles: usize,
        tx: watch::Sender<bool>,
    }

    impl Schedule for StopAfter {
        fn next_wait(&mut self, _last: &CycleReport) -> Duration {
            self.cycles -= 1;
            if self.cycles == 0 {
                let _ = self.tx.send(true);
            }
            Duration::from_millis(1)
        }
    }

    #[test]
    fn test_fixed_interval_ignores_report() {
        let mut schedule = FixedInterval::new(Duration::from_secs(600));
        assert_eq!(schedule.next_wait(&CycleReport::default()), Duration::from_secs(600));
        assert_eq!(
            schedule.next_wait(&CycleReport::aborted(Duration::ZERO)),
            Duration::from_secs(600)
        );
    }

    #[tokio::test]
    async fn test_sleep_runs_to_completion_without_stop() {
        let (_tx, mut stop) = StopSignal::channel();
        let stopped = stop
            .sleep(Duration::from_millis(30), Duration::from_millis(10))
            .await;
        assert!(!stopped);
    }

    #[tokio::test]
    async fn test_sleep_is_cut_short_by_stop() {
        let (tx, mut stop) = StopSignal::channel();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(20)).await;
            let _ = tx.send(true);
        });

        let t0 = std::time::Instant::now();
        let stopped = stop
            .sleep(Duration::from_secs(60), Duration::from_secs(1))
            .await;
        assert!(stopped);
        assert!(t0.elapsed() < Duration::from_secs(10));
    }

    #[tokio::test]
    async fn test_unrepresentable_wait_is_still_interruptible() {
        let (tx, mut stop) = StopSignal::channel();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(20)).await;
            let _ = tx.send(true);
        });

        assert!(stop.sleep(Duration::MAX, Duration::MAX).await);
    }

    #[test]
    fn test_deadline_after_clamps_overflow() {
        let now = Instant::now();
        assert_eq!(deadline_after(now, Duration::from_secs(5)), now + Duration::from_secs(5));
        assert_eq!(deadline_after(now, Duration::MAX), now + FAR_FUTURE);
    }

    #[tokio::test]
    async fn test_never_signal_still_sleeps() {
        let mut stop = StopSignal::never();
        let t0 = std::time::Instant::now();
        assert!(!stop.sleep(Duration::from_millis(20), Duration::from_millis(5)).await);
        assert!(t0.elapsed() >= Duration::from_millis(20));
    }

    #[tokio::test]
    async fn test_failed_cycles_still_count() {
        let dir = tempfile::tempdir().unwrap();
        let store = IdentifierStore::open(dir.path().join("article_history.txt"))
            .await
            .unwrap();
        let site = ProthomAlo::new(&CrawlerConfig::default()).unwrap();
        let mut crawler = Crawler::new(
            Offline,
            site,
            store,
            NullSink,
            Throttle::new(Duration::ZERO, Duration::ZERO),
        );
        let (tx, mut stop) = StopSignal::channel();
        let mut schedule = StopAfter { cycles: 3, tx };

        let totals =
            run_until_stopped(&mut crawler, &mut schedule, &mut stop, Duration::from_millis(1)).await;

        assert_eq!(totals, RunTotals { articles: 0, cycles: 3 });
    }
}
