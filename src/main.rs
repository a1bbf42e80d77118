//! Listing-Harvester main entry point
//!
//! Every subcommand is one independently schedulable unit of work. The unit's
//! result is printed to stdout as a single JSON envelope; logs go to stderr.

use anyhow::Context;
use clap::{Parser, Subcommand};
use listing_harvester::config::{load_config_with_hash, Config};
use listing_harvester::units::{self, Envelope};
use std::io::Write;
use std::path::PathBuf;
use std::process::ExitCode;
use tracing_subscriber::EnvFilter;

/// Listing-Harvester: crawls a car-listing site into a relational store
///
/// The orchestrator runs `page-count`, fans out one `scrape-page` per page,
/// drains the queue with `process`, and finally calls `set-flag`.
#[derive(Parser, Debug)]
#[command(name = "listing-harvester")]
#[command(version = "1.0.0")]
#[command(about = "Stateless crawl-and-extraction units for a car-listing site", long_about = None)]
struct Cli {
    /// Path to TOML configuration file
    #[arg(value_name = "CONFIG")]
    config: PathBuf,

    /// Increase logging verbosity (-v, -vv, -vvv)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    /// Suppress non-error output
    #[arg(short, long, conflicts_with = "verbose", global = true)]
    quiet: bool,

    #[command(subcommand)]
    unit: Unit,
}

#[derive(Subcommand, Debug)]
enum Unit {
    /// Report how many result pages the search produces
    PageCount,

    /// Scrape one result page and publish its listing references
    ScrapePage {
        /// 1-based page number
        #[arg(long)]
        page: u32,
    },

    /// Extract and store a batch of queued listings
    Process {
        /// Receive at most this many messages (defaults to [queue] batch-size)
        #[arg(long)]
        max: Option<usize>,
    },

    /// Print whether a full crawl has completed
    CheckFlag,

    /// Mark the crawl as completed
    SetFlag,

    /// Run the whole pipeline locally, unless already completed
    Cycle,
}

#[tokio::main]
async fn main() -> anyhow::Result<ExitCode> {
    let cli = Cli::parse();

    setup_logging(cli.verbose, cli.quiet);

    tracing::info!("Loading configuration from: {}", cli.config.display());
    let envelope = match load_config_with_hash(&cli.config) {
        Ok((config, hash)) => {
            tracing::info!("Configuration loaded successfully (hash: {})", hash);
            run_unit(&config, &cli.unit).await
        }
        Err(e) => {
            tracing::error!("Failed to load configuration: {}", e);
            Envelope::error(&e)
        }
    };

    let mut stdout = std::io::stdout().lock();
    writeln!(stdout, "{}", envelope.to_json()).context("failed to write unit result")?;

    Ok(if envelope.is_ok() {
        ExitCode::SUCCESS
    } else {
        ExitCode::FAILURE
    })
}

/// Runs the selected unit, converting its outcome into an envelope
async fn run_unit(config: &Config, unit: &Unit) -> Envelope {
    tracing::debug!("Running unit {:?}", unit);

    match unit {
        Unit::PageCount => Envelope::from_result(units::run_page_count(config).await),
        Unit::ScrapePage { page } => {
            Envelope::from_result(units::run_scrape_page(config, *page).await)
        }
        Unit::Process { max } => Envelope::from_result(units::run_process(config, *max).await),
        Unit::CheckFlag => Envelope::from_result(units::run_check_flag(config)),
        Unit::SetFlag => Envelope::from_result(units::run_set_flag(config)),
        Unit::Cycle => Envelope::from_result(units::run_cycle(config).await),
    }
}

/// Sets up the logging/tracing subscriber based on verbosity level
fn setup_logging(verbose: u8, quiet: bool) {
    let filter = if quiet {
        // Only show errors
        EnvFilter::new("error")
    } else {
        match verbose {
            0 => EnvFilter::new("listing_harvester=info,warn"),
            1 => EnvFilter::new("listing_harvester=debug,info"),
            2 => EnvFilter::new("listing_harvester=trace,debug"),
            _ => EnvFilter::new("trace"),
        }
    };

    // stdout carries the result envelope only
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .with_thread_ids(false)
        .with_file(false)
        .init();
}
