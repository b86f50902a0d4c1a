//! # Prothom Alo Crawler
//!
//! A small polling crawler that watches the Prothom Alo homepage for newly
//! published articles and appends each one, once, to a daily CSV file.
//!
//! ## Usage
//!
//! ```sh
//! prothom_alo_crawler
//! prothom_alo_crawler --data-dir ./data --interval-mins 10
//! ```
//!
//! Runs until interrupted with Ctrl+C, then prints how many articles and
//! cycles it completed.
//!
//! ## Architecture
//!
//! Every cycle runs the same pipeline:
//! 1. **Fetching**: Download the homepage
//! 2. **Discovery**: Collect article links from the configured sections
//! 3. **Filtering**: Drop every link already in the identifier log
//! 4. **Processing**: Fetch each new article, extract its fields, append a
//!    CSV row, then record its identifier
//!
//! Cycles are separated by a fixed wait that Ctrl+C interrupts.

use clap::Parser;
use std::error::Error;
use tracing::{debug, error, info, instrument};
use tracing_subscriber::{fmt as tfmt, EnvFilter};

mod cli;
mod config;
mod cycle;
mod delta;
mod fetch;
mod history;
mod models;
mod outputs;
mod scheduler;
mod scrapers;
mod utils;

use cli::Cli;
use config::CrawlerConfig;
use cycle::{Crawler, Throttle};
use fetch::HttpFetcher;
use history::IdentifierStore;
use outputs::daily_csv::DailyCsvSink;
use scheduler::{FixedInterval, StopSignal};
use scrapers::prothomalo::ProthomAlo;
use utils::ensure_writable_dir;

#[tokio::main]
#[instrument]
async fn main() -> Result<(), Box<dyn Error>> {
    // --- Tracing init ---
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tfmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_file(false)
        .with_line_number(false)
        .with_timer(tracing_subscriber::fmt::time::UtcTime::rfc_3339())
        .init();

    info!("Starting Prothom Alo news crawler");

    // Parse CLI and configuration
    let args = Cli::parse();
    debug!(?args, "Parsed CLI arguments");
    let mut config = CrawlerConfig::load(args.config.as_deref())?;
    config.apply_cli(&args);
    if let Err(e) = config.validate() {
        error!(error = %e, "Invalid configuration");
        return Err(e);
    }

    if let Err(e) = ensure_writable_dir(&config.data_dir).await {
        error!(
            path = %config.data_dir,
            error = %e,
            "Data directory is not writable (fix perms or choose a different path)"
        );
        return Err(e);
    }

    // ---- Wire the crawler ----
    let fetcher = HttpFetcher::new(&config)?;
    let site = ProthomAlo::new(&config)?;
    let store = IdentifierStore::open(config.history_path()).await?;
    let sink = DailyCsvSink::new(&config.data_dir, &config.record_prefix);
    let (min_delay, max_delay) = config.delay_range();
    let mut crawler = Crawler::new(fetcher, site, store, sink, Throttle::new(min_delay, max_delay));

    let mut schedule = FixedInterval::new(config.cycle_interval());
    let mut stop = StopSignal::on_ctrl_c();
    info!(
        home_url = %config.home_url,
        data_dir = %config.data_dir,
        interval_secs = config.cycle_interval_secs,
        "Crawler ready; press Ctrl+C to stop"
    );

    let totals =
        scheduler::run_until_stopped(&mut crawler, &mut schedule, &mut stop, config.countdown_tick())
            .await;

    println!("Program stopped by user.");
    println!("Total articles scraped: {}", totals.articles);
    println!("Total scrape cycles completed: {}", totals.cycles);
    Ok(())
}
