use crate::crawler::{DiscoveryPolicy, DEFAULT_BASE_URL, DEFAULT_USER_AGENT};
use crate::DiscoError;
use serde::Deserialize;
use std::path::PathBuf;
use std::time::Duration;

/// Main configuration structure for the discovery pipeline
#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    pub tracker: TrackerConfig,
    pub downloader: DownloaderConfig,
    #[serde(default)]
    pub search: SearchConfig,
    #[serde(default)]
    pub pacing: PacingConfig,
    pub pipeline: PipelineConfig,
}

/// Remote tracker that hands out items
#[derive(Debug, Clone, Deserialize)]
pub struct TrackerConfig {
    /// Tracker host name (e.g., "tracker.example.org")
    pub host: String,

    /// Project identifier on the tracker
    pub id: String,
}

impl TrackerConfig {
    /// Base URL of the project on the tracker
    pub fn url(&self) -> String {
        format!("http://{}/{}", self.host, self.id)
    }
}

/// Who is doing the work
#[derive(Debug, Clone, Deserialize)]
pub struct DownloaderConfig {
    /// Nickname reported with every request and upload
    pub nick: String,
}

/// Search endpoint settings
#[derive(Debug, Clone, Deserialize)]
pub struct SearchConfig {
    #[serde(rename = "base-url", default = "default_base_url")]
    pub base_url: String,

    #[serde(rename = "user-agent", default = "default_user_agent")]
    pub user_agent: String,
}

impl Default for SearchConfig {
    fn default() -> Self {
        Self {
            base_url: default_base_url(),
            user_agent: default_user_agent(),
        }
    }
}

/// Delays applied by the discover subprocess, in seconds
#[derive(Debug, Clone, Deserialize)]
pub struct PacingConfig {
    #[serde(rename = "min-delay", default = "default_min_delay")]
    pub min_delay: u64,

    #[serde(rename = "max-delay", default = "default_max_delay")]
    pub max_delay: u64,

    #[serde(rename = "retry-pause", default = "default_retry_pause")]
    pub retry_pause: u64,

    #[serde(rename = "ban-cooldown", default = "default_ban_cooldown")]
    pub ban_cooldown: u64,
}

impl Default for PacingConfig {
    fn default() -> Self {
        Self {
            min_delay: default_min_delay(),
            max_delay: default_max_delay(),
            retry_pause: default_retry_pause(),
            ban_cooldown: default_ban_cooldown(),
        }
    }
}

impl PacingConfig {
    /// Discovery policy with these delays and the default attempt limit
    ///
    /// # Returns
    ///
    /// * `Ok(DiscoveryPolicy)` - The delays form a valid range
    /// * `Err(DiscoError::Precondition)` - `min-delay` exceeds `max-delay`
    pub fn policy(&self) -> Result<DiscoveryPolicy, DiscoError> {
        if self.min_delay > self.max_delay {
            return Err(DiscoError::Precondition(format!(
                "min-delay ({}s) must not exceed max-delay ({}s)",
                self.min_delay, self.max_delay
            )));
        }

        Ok(DiscoveryPolicy {
            min_request_delay: Duration::from_secs(self.min_delay),
            max_request_delay: Duration::from_secs(self.max_delay),
            retry_pause: Duration::from_secs(self.retry_pause),
            ban_cooldown: Duration::from_secs(self.ban_cooldown),
            ..DiscoveryPolicy::default()
        })
    }
}

/// Local work settings
#[derive(Debug, Clone, Deserialize)]
pub struct PipelineConfig {
    /// Directory holding per-item work directories and finished files
    #[serde(rename = "data-dir")]
    pub data_dir: PathBuf,

    /// Prefix of produced file names
    #[serde(rename = "file-prefix", default = "default_file_prefix")]
    pub file_prefix: String,

    /// Items processed at the same time
    #[serde(rename = "concurrent-items", default = "default_one")]
    pub concurrent_items: u32,

    /// Maximum number of concurrent uploads
    #[serde(rename = "rsync-threads", default = "default_one")]
    pub rsync_threads: u32,

    /// Attempts per item for the discover subprocess
    #[serde(rename = "scraper-max-tries", default = "default_scraper_max_tries")]
    pub scraper_max_tries: u32,

    /// Path to the discover binary (defaults to the one next to this executable)
    #[serde(rename = "discover-bin", default)]
    pub discover_bin: Option<PathBuf>,

    /// rsync executable used for uploads
    #[serde(rename = "rsync-bin", default = "default_rsync_bin")]
    pub rsync_bin: PathBuf,
}

fn default_base_url() -> String {
    DEFAULT_BASE_URL.to_string()
}

fn default_user_agent() -> String {
    DEFAULT_USER_AGENT.to_string()
}

fn default_file_prefix() -> String {
    "rapidsharedisco".to_string()
}

fn default_rsync_bin() -> PathBuf {
    PathBuf::from("rsync")
}

fn default_min_delay() -> u64 {
    30
}

fn default_max_delay() -> u64 {
    70
}

fn default_retry_pause() -> u64 {
    10
}

fn default_ban_cooldown() -> u64 {
    3000
}

fn default_one() -> u32 {
    1
}

fn default_scraper_max_tries() -> u32 {
    2
}
