//! Bounded-concurrency uploads of finished record files

use crate::crawler::Sleeper;
use crate::tracker::TrackerClient;
use crate::DiscoError;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tokio::process::Command;
use tokio::sync::Semaphore;

/// Times we ask the tracker for an upload target before giving up
const TARGET_ATTEMPTS: u32 = 10;

/// Uploads files with rsync to targets handed out by the tracker
///
/// Every clone shares the same semaphore, so the number of transfers in
/// flight across all items never exceeds the configured thread count.
#[derive(Clone)]
pub struct Uploader {
    tracker: TrackerClient,
    permits: Arc<Semaphore>,
    rsync_program: PathBuf,
    sleeper: Arc<dyn Sleeper>,
    target_retry_pause: Duration,
}

impl Uploader {
    pub fn new(
        tracker: TrackerClient,
        max_concurrent: u32,
        rsync_program: PathBuf,
        sleeper: Arc<dyn Sleeper>,
    ) -> Self {
        Self {
            tracker,
            permits: Arc::new(Semaphore::new(max_concurrent.max(1) as usize)),
            rsync_program,
            sleeper,
            target_retry_pause: Duration::from_secs(30),
        }
    }

    /// Transfers currently allowed to start
    pub fn available_slots(&self) -> usize {
        self.permits.available_permits()
    }

    /// rsync arguments for one file
    pub fn rsync_args(file: &Path, target: &str) -> Vec<String> {
        vec![
            "-av".to_string(),
            "--recursive".to_string(),
            "--partial".to_string(),
            "--partial-dir".to_string(),
            ".rsync-tmp".to_string(),
            file.display().to_string(),
            target.to_string(),
        ]
    }

    /// Uploads `file` and deletes it once the transfer succeeded
    pub async fn upload(&self, file: &Path) -> Result<(), DiscoError> {
        let _permit = self
            .permits
            .acquire()
            .await
            .map_err(|e| DiscoError::Upload(e.to_string()))?;

        let target = self.upload_target().await?;
        tracing::info!("Uploading {} to {}", file.display(), target);

        let status = Command::new(&self.rsync_program)
            .args(Self::rsync_args(file, &target))
            .kill_on_drop(true)
            .status()
            .await
            .map_err(|e| DiscoError::Subprocess {
                program: self.rsync_program.display().to_string(),
                message: e.to_string(),
            })?;

        if !status.success() {
            return Err(DiscoError::Subprocess {
                program: self.rsync_program.display().to_string(),
                message: format!("upload of {} failed with {}", file.display(), status),
            });
        }

        std::fs::remove_file(file)?;
        Ok(())
    }

    async fn upload_target(&self) -> Result<String, DiscoError> {
        for attempt in 1..=TARGET_ATTEMPTS {
            match self.tracker.request_upload_target().await? {
                Some(target) => return Ok(target),
                None if attempt < TARGET_ATTEMPTS => {
                    tracing::info!("No upload target available, waiting...");
                    self.sleeper.sleep(self.target_retry_pause).await;
                }
                None => {}
            }
        }

        Err(DiscoError::Upload(
            "tracker offered no upload target".to_string(),
        ))
    }
}
