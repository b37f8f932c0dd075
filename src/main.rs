//! Search-Disco discover entry point
//!
//! Walks result pages `start_num..=end_num` for one search term and writes
//! the discovered records to a gzip file.

use anyhow::Context;
use clap::Parser;
use search_disco::config::PacingConfig;
use search_disco::crawler::{
    build_http_client, run_discovery, PageFetcher, PageRange, RangeDiscoverer, TokioSleeper,
    DEFAULT_BASE_URL, DEFAULT_USER_AGENT,
};
use search_disco::RecordSink;
use std::path::PathBuf;
use std::sync::Arc;
use tracing_subscriber::EnvFilter;

/// Discover file references on search result pages
///
/// Fetches one result page per offset, pausing between requests to stay
/// below the endpoint's abuse detection, and writes a `page:<term>:<offset>`
/// line plus every file reference found on each existing page.
#[derive(Parser, Debug)]
#[command(name = "discover")]
#[command(version)]
#[command(about = "Discover file references on search result pages", long_about = None)]
struct Cli {
    /// First page offset (inclusive)
    start_num: u64,

    /// Last page offset (inclusive)
    end_num: u64,

    /// Search term to discover
    search_term: String,

    /// Gzip output file; its directory must exist
    output_path: PathBuf,

    /// Search endpoint
    #[arg(long, env = "DISCO_BASE_URL", default_value = DEFAULT_BASE_URL)]
    base_url: String,

    /// User agent sent with every request
    #[arg(long, env = "DISCO_USER_AGENT", default_value = DEFAULT_USER_AGENT)]
    user_agent: String,

    /// Minimum pause before each request, in seconds
    #[arg(long, default_value_t = 30)]
    min_delay: u64,

    /// Maximum pause before each request, in seconds
    #[arg(long, default_value_t = 70)]
    max_delay: u64,

    /// Pause after a failed attempt, in seconds
    #[arg(long, default_value_t = 10)]
    retry_pause: u64,

    /// Cooldown after a ban response, in seconds
    #[arg(long, default_value_t = 3000)]
    ban_cooldown: u64,

    /// Increase logging verbosity (-v, -vv, -vvv)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,

    /// Suppress non-error output
    #[arg(short, long, conflicts_with = "verbose")]
    quiet: bool,
}

impl Cli {
    fn pacing(&self) -> PacingConfig {
        PacingConfig {
            min_delay: self.min_delay,
            max_delay: self.max_delay,
            retry_pause: self.retry_pause,
            ban_cooldown: self.ban_cooldown,
        }
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    setup_logging(cli.verbose, cli.quiet);

    // Checked before anything touches the network or the output file
    let range = PageRange::new(cli.start_num, cli.end_num)?;
    let policy = cli.pacing().policy()?;

    tracing::info!("Starting {} {}", range.start(), range.end());

    let client = build_http_client(&cli.user_agent).context("Failed to build HTTP client")?;
    let fetcher = PageFetcher::new(client, &cli.base_url, policy, Arc::new(TokioSleeper))?;
    let mut discoverer = RangeDiscoverer::new(fetcher, range, &cli.search_term)?;

    let sink = RecordSink::create(&cli.output_path)
        .with_context(|| format!("Failed to create {}", cli.output_path.display()))?;

    match run_discovery(&mut discoverer, sink).await {
        Ok(_) => {
            tracing::info!("Done");
            Ok(())
        }
        Err(e) => {
            tracing::error!("Discovery failed: {}", e);
            Err(e.into())
        }
    }
}

/// Sets up the logging/tracing subscriber based on verbosity level
fn setup_logging(verbose: u8, quiet: bool) {
    let filter = if quiet {
        EnvFilter::new("error")
    } else {
        match verbose {
            0 => EnvFilter::new("search_disco=info,discover=info,warn"),
            1 => EnvFilter::new("search_disco=debug,discover=debug,info"),
            2 => EnvFilter::new("search_disco=trace,discover=trace,debug"),
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
