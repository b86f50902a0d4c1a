//! Command-line interface definitions.
//!
//! The crawler has a single run mode and needs no arguments. Every flag is an
//! optional override of the configuration defaults and can also be supplied
//! through an environment variable.

use clap::Parser;

/// Command-line arguments for the crawler.
///
/// # Examples
///
/// ```sh
/// # Poll every 10 minutes, writing to ./data
/// prothom_alo_crawler
///
/// # Custom data directory and interval
/// prothom_alo_crawler --data-dir /var/lib/alo --interval-mins 15
///
/// # Everything from a YAML file
/// prothom_alo_crawler --config crawler.yaml
/// ```
#[derive(Parser, Debug)]
#[command(author, version, about)]
pub struct Cli {
    /// Optional path to a YAML configuration file
    #[arg(short, long, env = "CRAWLER_CONFIG")]
    pub config: Option<String>,

    /// Directory for the identifier log and daily CSV files
    #[arg(short, long, env = "CRAWLER_DATA_DIR")]
    pub data_dir: Option<String>,

    /// Minutes to wait between scrape cycles
    #[arg(short, long, env = "CRAWLER_INTERVAL_MINS")]
    pub interval_mins: Option<u64>,
}
