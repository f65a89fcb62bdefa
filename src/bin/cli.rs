//! ICS aggregator CLI
//!
//! Local execution entry point. Intended to be re-invoked on an interval by
//! cron or a systemd timer; each invocation performs one run.

use std::path::PathBuf;
use std::sync::Arc;

use chrono::Utc;
use clap::{Parser, Subcommand};
use ics_aggregator::{
    error::Result,
    models::{Config, RunStatus},
    pipeline,
    storage::FreshnessCache,
    utils::{cancel::Cancellation, http::HttpFetcher},
};

/// Merge per-event calendar files into one subscribable feed
#[derive(Parser, Debug)]
#[command(
    name = "ics-aggregator",
    version,
    about = "Aggregate event calendar files into a merged .ics feed"
)]
struct Cli {
    /// Path to the TOML configuration file
    #[arg(short, long, default_value = "config.toml")]
    config: PathBuf,

    /// Enable verbose logging
    #[arg(short, long)]
    verbose: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Run one full aggregation: discover, fetch, merge, publish
    Run {
        /// Override the output artifact path
        #[arg(long)]
        output: Option<PathBuf>,

        /// Override the cache file path
        #[arg(long)]
        cache: Option<PathBuf>,
    },

    /// Validate the configuration file
    Validate,

    /// Show cache and output status
    Info,
}

/// Initialize logging based on verbosity flag.
fn init_logging(verbose: bool) {
    let level = if verbose { "debug" } else { "info" };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(level))
        .format_timestamp_secs()
        .init();
}

/// Main entry point for the CLI application.
#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    let mut config = Config::load_or_default(&cli.config);

    match cli.command {
        Command::Run { output, cache } => {
            if let Some(output) = output {
                config.output.path = output;
            }
            if let Some(cache) = cache {
                config.cache.path = cache;
            }
            config.validate()?;

            let fetcher = Arc::new(HttpFetcher::from_config(&config.crawler)?);
            let cancel = Cancellation::new();
            {
                let cancel = cancel.clone();
                tokio::spawn(async move {
                    if tokio::signal::ctrl_c().await.is_ok() {
                        log::warn!("Interrupt received, stopping new requests");
                        cancel.cancel();
                    }
                });
            }

            let report = pipeline::run_pipeline(&config, fetcher, cancel).await?;
            match report.status {
                RunStatus::Success => log::info!("Done!"),
                RunStatus::PartialSuccess => log::warn!(
                    "Done with {} failed event(s); see warnings above",
                    report.stats.fetch_failures
                ),
            }
        }

        Command::Validate => {
            log::info!("Validating configuration...");

            if let Err(e) = config.validate() {
                log::error!("Config validation failed: {}", e);
                return Err(e);
            }
            log::info!("✓ Listing URL: {}", config.source.listing_url);
            log::info!(
                "✓ {} link strategies, {} calendar variants, {} description selectors",
                config.discovery.strategies.len(),
                config.acquire.calendar_variants.len(),
                config.acquire.description_selectors.len()
            );

            log::info!("All validations passed!");
        }

        Command::Info => {
            log::info!("Config file: {}", cli.config.display());

            let cache = FreshnessCache::open(&config.cache.path, config.cache.ttl()).await;
            let summary = cache.summary(Utc::now());
            log::info!("Cache: {}", config.cache.path.display());
            log::info!(
                "    {} records, {} fresh, {} servable offline",
                summary.records,
                summary.fresh,
                summary.servable
            );

            match std::fs::metadata(&config.output.path) {
                Ok(meta) => log::info!(
                    "Output: {} ({} bytes)",
                    config.output.path.display(),
                    meta.len()
                ),
                Err(_) => log::info!("Output: {} (not published yet)", config.output.path.display()),
            }
        }
    }

    Ok(())
}
