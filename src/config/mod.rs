//! Configuration module for the discovery pipeline
//!
//! This module handles loading, parsing, and validating TOML configuration files.
//!
//! # Example
//!
//! ```no_run
//! use search_disco::config::load_config;
//! use std::path::Path;
//!
//! let config = load_config(Path::new("pipeline.toml")).unwrap();
//! println!("Tracker: {}", config.tracker.url());
//! ```

mod parser;
mod types;
mod validation;

// Re-export types
pub use types::{
    Config, DownloaderConfig, PacingConfig, PipelineConfig, SearchConfig, TrackerConfig,
};

// Re-export parser functions
pub use parser::{compute_config_hash, load_config, load_config_with_hash, parse_config};
