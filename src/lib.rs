//! Search-Disco: paginated discovery of file references from a search engine
//!
//! This crate walks the result pages of a fixed search endpoint for a given
//! search term, extracts the file-reference links embedded in each page and
//! writes them to a gzip-compressed record file. A job pipeline wraps the
//! discovery loop: it claims work items from a remote tracker, runs discovery
//! as a subprocess and uploads the results.

pub mod config;
pub mod crawler;
pub mod output;
pub mod pipeline;
pub mod tracker;

use thiserror::Error;

/// Main error type for Search-Disco operations
#[derive(Debug, Error)]
pub enum DiscoError {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Precondition failed: {0}")]
    Precondition(String),

    #[error("Giving up on page {offset} after {attempts} attempts (last fault: {last_fault})")]
    AttemptsExhausted {
        offset: u64,
        attempts: u32,
        last_fault: crawler::FetchFault,
    },

    #[error("Fetch failed for {url}: {message}")]
    Fetch { url: String, message: String },

    #[error("HTTP client error: {0}")]
    Reqwest(#[from] reqwest::Error),

    #[error("URL parse error: {0}")]
    UrlParse(#[from] ::url::ParseError),

    #[error("Tracker error: {0}")]
    Tracker(#[from] tracker::TrackerError),

    #[error("Unsupported item '{0}'")]
    UnsupportedItem(String),

    #[error("Could not read the first result page for '{0}'")]
    PageCount(String),

    #[error("Subprocess {program} failed: {message}")]
    Subprocess { program: String, message: String },

    #[error("Upload failed: {0}")]
    Upload(String),

    #[error("Network check failed: {0}")]
    NetworkCheck(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Configuration-specific errors
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config file: {0}")]
    Io(#[from] std::io::Error),

    #[error("Failed to parse TOML: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Invalid URL in config: {0}")]
    InvalidUrl(String),
}

/// Result type alias for Search-Disco operations
pub type Result<T> = std::result::Result<T, DiscoError>;

/// Result type alias for configuration operations
pub type ConfigResult<T> = std::result::Result<T, ConfigError>;

// Re-export commonly used types
pub use config::Config;
pub use crawler::{DiscoveredRecord, PageRange, RangeDiscoverer};
pub use output::RecordSink;
