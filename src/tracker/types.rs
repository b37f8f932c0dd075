use crate::output::{Accountability, ItemStats};
use serde::Serialize;
use std::collections::BTreeMap;

/// Protocol version spoken with the tracker
pub const API_VERSION: &str = "2";

/// Body of `POST /request`
#[derive(Debug, Clone, Serialize)]
pub struct ItemRequest<'a> {
    pub downloader: &'a str,
    pub api_version: &'a str,
    pub version: &'a str,
}

/// Body of `POST /upload`
#[derive(Debug, Clone, Serialize)]
pub struct UploadRequest<'a> {
    pub downloader: &'a str,
    pub version: &'a str,
}

/// Answer to an item request
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ClaimResult {
    /// An item was assigned
    Item(String),

    /// The tracker has nothing to hand out right now
    NoItems,

    /// The tracker asked us to slow down
    RateLimited,
}

/// Identity block attached to a done report
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ItemIdentity {
    #[serde(flatten)]
    pub accountability: Accountability,

    /// SHA-256 per file group
    pub hashes: BTreeMap<String, String>,
}

/// Body of `POST /done`
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DoneReport {
    pub downloader: String,
    pub version: String,
    pub item: String,
    pub bytes: BTreeMap<String, u64>,
    pub id: ItemIdentity,
}

impl DoneReport {
    /// Builds the report for a finished item
    pub fn new(
        downloader: &str,
        item: &str,
        stats: &ItemStats,
        accountability: &Accountability,
    ) -> Self {
        let hashes = stats
            .groups
            .iter()
            .map(|(group, file)| (group.clone(), file.sha256.clone()))
            .collect();

        Self {
            downloader: downloader.to_string(),
            version: accountability.version.clone(),
            item: item.to_string(),
            bytes: stats.bytes_by_group(),
            id: ItemIdentity {
                accountability: accountability.clone(),
                hashes,
            },
        }
    }
}
