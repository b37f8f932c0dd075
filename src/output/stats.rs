//! Item statistics reported to the tracker
//!
//! Sizes and content hashes of produced files, plus the accountability record
//! that identifies the build and configuration that produced them.

use serde::Serialize;
use sha2::{Digest, Sha256};
use std::collections::BTreeMap;
use std::fs::File;
use std::io::{self, Read};
use std::path::Path;

/// Identifies the software and configuration behind an upload
///
/// Built once at startup and passed explicitly to whoever reports items.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Accountability {
    /// Version string reported to the tracker
    pub version: String,

    /// SHA-256 of the pipeline configuration file
    pub config_hash: String,

    /// SHA-256 of the discover binary
    pub discover_hash: String,
}

impl Accountability {
    /// Builds the record from the config hash and the discover binary on disk
    pub fn new(config_hash: String, discover_bin: &Path) -> io::Result<Self> {
        Ok(Self {
            version: env!("CARGO_PKG_VERSION").to_string(),
            config_hash,
            discover_hash: hash_file(discover_bin)?,
        })
    }
}

/// Size and hash of one produced file
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FileStats {
    pub bytes: u64,
    pub sha256: String,
}

/// Stats for one finished item, keyed by file group
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ItemStats {
    pub groups: BTreeMap<String, FileStats>,
}

impl ItemStats {
    /// Byte totals per file group, the shape the tracker expects
    pub fn bytes_by_group(&self) -> BTreeMap<String, u64> {
        self.groups
            .iter()
            .map(|(group, stats)| (group.clone(), stats.bytes))
            .collect()
    }

    pub fn total_bytes(&self) -> u64 {
        self.groups.values().map(|s| s.bytes).sum()
    }
}

/// Hex-encoded SHA-256 of a file, read in chunks
pub fn hash_file(path: &Path) -> io::Result<String> {
    let mut file = File::open(path)?;
    let mut hasher = Sha256::new();
    let mut buf = [0u8; 64 * 1024];

    loop {
        let n = file.read(&mut buf)?;
        if n == 0 {
            break;
        }
        hasher.update(&buf[..n]);
    }

    Ok(hex::encode(hasher.finalize()))
}

/// Collects size and hash for a file
pub fn file_stats(path: &Path) -> io::Result<FileStats> {
    let bytes = std::fs::metadata(path)?.len();
    let sha256 = hash_file(path)?;
    Ok(FileStats { bytes, sha256 })
}
