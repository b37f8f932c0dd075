//! Search-Disco pipeline entry point
//!
//! Claims items from the tracker, runs `discover` for each one and uploads
//! the results.

use anyhow::Context;
use clap::Parser;
use search_disco::config::{load_config_with_hash, Config};
use search_disco::crawler::TokioSleeper;
use search_disco::output::Accountability;
use search_disco::pipeline::{default_discover_bin, ItemProcessor, NetworkCheck, Pipeline};
use std::path::PathBuf;
use std::sync::Arc;
use tracing_subscriber::EnvFilter;

/// Search-Disco pipeline
///
/// Requests work items from the tracker, discovers every result page of the
/// assigned search term in a subprocess, uploads the record file and reports
/// the item as done.
#[derive(Parser, Debug)]
#[command(name = "disco-pipeline")]
#[command(version)]
#[command(about = "Claim, discover and upload search items", long_about = None)]
struct Cli {
    /// Path to TOML configuration file
    #[arg(value_name = "CONFIG")]
    config: PathBuf,

    /// Increase logging verbosity (-v, -vv, -vvv)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,

    /// Suppress non-error output
    #[arg(short, long, conflicts_with = "verbose")]
    quiet: bool,

    /// Process a single item and exit
    #[arg(long, conflicts_with = "dry_run")]
    once: bool,

    /// Validate config and show what would run without claiming items
    #[arg(long)]
    dry_run: bool,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    setup_logging(cli.verbose, cli.quiet);

    tracing::info!("Loading configuration from: {}", cli.config.display());
    let (config, config_hash) = match load_config_with_hash(&cli.config) {
        Ok((cfg, hash)) => {
            tracing::info!("Configuration loaded successfully (hash: {})", hash);
            (cfg, hash)
        }
        Err(e) => {
            tracing::error!("Failed to load configuration: {}", e);
            return Err(e.into());
        }
    };

    let discover_bin = match &config.pipeline.discover_bin {
        Some(path) => path.clone(),
        None => default_discover_bin().context("Cannot locate the discover binary")?,
    };

    if cli.dry_run {
        handle_dry_run(&config, &discover_bin);
        return Ok(());
    }

    std::fs::create_dir_all(&config.pipeline.data_dir).with_context(|| {
        format!(
            "Failed to create data directory {}",
            config.pipeline.data_dir.display()
        )
    })?;

    let accountability = Accountability::new(config_hash, &discover_bin)
        .with_context(|| format!("Cannot hash {}", discover_bin.display()))?;

    let processor = ItemProcessor::new(config, accountability, discover_bin, Arc::new(TokioSleeper))?;
    let mut pipeline = Pipeline::new(processor, NetworkCheck::default());

    if cli.once {
        let processed = pipeline.run_once().await?;
        if !processed {
            tracing::info!("Nothing to do");
        }
        return Ok(());
    }

    pipeline.run().await?;
    Ok(())
}

/// Sets up the logging/tracing subscriber based on verbosity level
fn setup_logging(verbose: u8, quiet: bool) {
    let filter = if quiet {
        EnvFilter::new("error")
    } else {
        match verbose {
            0 => EnvFilter::new("search_disco=info,disco_pipeline=info,warn"),
            1 => EnvFilter::new("search_disco=debug,disco_pipeline=debug,info"),
            2 => EnvFilter::new("search_disco=trace,disco_pipeline=trace,debug"),
            _ => EnvFilter::new("trace"),
        }
    };

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_thread_ids(false)
        .with_file(false)
        .init();
}

/// Handles the --dry-run mode: shows the validated configuration
fn handle_dry_run(config: &Config, discover_bin: &std::path::Path) {
    println!("=== Search-Disco Dry Run ===\n");

    println!("Tracker:");
    println!("  URL: {}", config.tracker.url());
    println!("  Downloader: {}", config.downloader.nick);

    println!("\nSearch:");
    println!("  Endpoint: {}", config.search.base_url);
    println!("  User agent: {}", config.search.user_agent);
    println!(
        "  Request delay: {}-{}s, retry pause {}s, ban cooldown {}s",
        config.pacing.min_delay,
        config.pacing.max_delay,
        config.pacing.retry_pause,
        config.pacing.ban_cooldown
    );

    println!("\nPipeline:");
    println!("  Data dir: {}", config.pipeline.data_dir.display());
    println!("  File prefix: {}", config.pipeline.file_prefix);
    println!("  Concurrent items: {}", config.pipeline.concurrent_items);
    println!("  Rsync threads: {}", config.pipeline.rsync_threads);
    println!("  Scraper tries: {}", config.pipeline.scraper_max_tries);
    println!("  Discover binary: {}", discover_bin.display());
    println!("  Rsync binary: {}", config.pipeline.rsync_bin.display());

    println!("\n✓ Configuration is valid");
}
