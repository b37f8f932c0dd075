//! Output module for discovery results
//!
//! This module handles:
//! - Writing discovered records to gzip record files
//! - Collecting file sizes and hashes for tracker reports

mod sink;
pub mod stats;

pub use sink::RecordSink;
pub use stats::{file_stats, hash_file, Accountability, FileStats, ItemStats};
