//! Item processing and the claim loop

use crate::config::Config;
use crate::crawler::{build_http_client, Sleeper};
use crate::output::{file_stats, Accountability, ItemStats};
use crate::pipeline::item::{ItemPaths, WorkItem};
use crate::pipeline::netcheck::NetworkCheck;
use crate::pipeline::page_count::{probe_last_page, ProbePolicy};
use crate::pipeline::scraper::ScraperCommand;
use crate::pipeline::upload::Uploader;
use crate::tracker::{ClaimResult, DoneReport, TrackerClient};
use crate::DiscoError;
use reqwest::Client;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Semaphore;
use tokio::task::{JoinError, JoinSet};

/// Wait after the tracker reported no items
const NO_ITEMS_PAUSE: Duration = Duration::from_secs(60);

/// Wait after the tracker asked us to slow down or failed
const BACKOFF_PAUSE: Duration = Duration::from_secs(30);

/// Processes single items end to end
///
/// Shared between item tasks; holds nothing that changes per item.
pub struct ItemProcessor {
    config: Config,
    accountability: Accountability,
    tracker: TrackerClient,
    uploader: Uploader,
    scraper: ScraperCommand,
    http: Client,
    sleeper: Arc<dyn Sleeper>,
    probe: ProbePolicy,
}

impl ItemProcessor {
    /// Wires up the collaborators for `config`
    ///
    /// # Arguments
    ///
    /// * `config` - Loaded pipeline configuration
    /// * `accountability` - Build and config identity reported with each item
    /// * `discover_bin` - Path of the discover executable to run per item
    /// * `sleeper` - Used for every wait between retries
    pub fn new(
        config: Config,
        accountability: Accountability,
        discover_bin: PathBuf,
        sleeper: Arc<dyn Sleeper>,
    ) -> Result<Self, DiscoError> {
        let tracker = TrackerClient::new(
            &config.tracker.url(),
            &config.downloader.nick,
            &accountability.version,
        )?;

        let uploader = Uploader::new(
            tracker.clone(),
            config.pipeline.rsync_threads,
            config.pipeline.rsync_bin.clone(),
            sleeper.clone(),
        );

        let scraper = ScraperCommand::new(
            discover_bin,
            config.pipeline.scraper_max_tries,
            config.search.clone(),
            config.pacing.clone(),
        );

        let http = build_http_client(&config.search.user_agent)?;

        Ok(Self {
            config,
            accountability,
            tracker,
            uploader,
            scraper,
            http,
            sleeper,
            probe: ProbePolicy::default(),
        })
    }

    /// Replaces the page-count retry limits
    pub fn with_probe_policy(mut self, probe: ProbePolicy) -> Self {
        self.probe = probe;
        self
    }

    pub fn tracker(&self) -> &TrackerClient {
        &self.tracker
    }

    /// Runs every step for one item, from directory setup to the done report
    pub async fn process(&self, item_name: &str) -> Result<(), DiscoError> {
        let item = WorkItem::parse(item_name)?;
        let started = chrono::Local::now().naive_local();
        let paths = ItemPaths::new(
            &self.config.pipeline.data_dir,
            &self.config.pipeline.file_prefix,
            &item.name,
            started,
        );

        paths.prepare()?;

        let last_page = probe_last_page(
            &self.http,
            &self.config.search.base_url,
            &item.value,
            self.sleeper.as_ref(),
            &self.probe,
        )
        .await?;

        let output = paths.output_path();
        self.scraper
            .run(0, last_page, &item.value, &output, &paths.item_dir)
            .await?;

        let mut stats = ItemStats::default();
        stats.groups.insert("data".to_string(), file_stats(&output)?);

        let data_path = paths.move_files()?;
        self.uploader.upload(&data_path).await?;

        let report = DoneReport::new(
            self.tracker.downloader(),
            &item.name,
            &stats,
            &self.accountability,
        );
        self.tracker.send_done(&report).await?;

        tracing::info!(
            "Item '{}' done ({} bytes)",
            item.name,
            stats.total_bytes()
        );
        Ok(())
    }
}

/// Claims items from the tracker and processes them
pub struct Pipeline {
    processor: Arc<ItemProcessor>,
    netcheck: NetworkCheck,
    item_slots: Arc<Semaphore>,
}

impl Pipeline {
    pub fn new(processor: ItemProcessor, netcheck: NetworkCheck) -> Self {
        let slots = processor.config.pipeline.concurrent_items.max(1) as usize;
        Self {
            processor: Arc::new(processor),
            netcheck,
            item_slots: Arc::new(Semaphore::new(slots)),
        }
    }

    /// Claims and processes one item
    ///
    /// # Returns
    ///
    /// * `Ok(true)` - An item was processed
    /// * `Ok(false)` - The tracker had no item to give
    pub async fn run_once(&mut self) -> Result<bool, DiscoError> {
        self.netcheck.check().await?;

        match self.processor.tracker().request_item().await? {
            ClaimResult::Item(name) => {
                self.processor.process(&name).await?;
                Ok(true)
            }
            ClaimResult::NoItems | ClaimResult::RateLimited => {
                tracing::info!("No item received from tracker");
                Ok(false)
            }
        }
    }

    /// Claims items forever, running up to `concurrent-items` at once
    ///
    /// Item failures are logged and the loop moves on; the tracker hands
    /// unfinished items out again. Only a failed network check stops the loop,
    /// and items already running are allowed to finish before it returns.
    pub async fn run(&mut self) -> Result<(), DiscoError> {
        let mut items = JoinSet::new();
        let result = self.claim_loop(&mut items).await;

        if let Err(e) = &result {
            tracing::error!(
                "Stopping: {}. Waiting for {} running item(s)",
                e,
                items.len()
            );
        }

        while let Some(joined) = items.join_next().await {
            log_item_task(joined);
        }

        result
    }

    async fn claim_loop(&mut self, items: &mut JoinSet<()>) -> Result<(), DiscoError> {
        loop {
            while let Some(joined) = items.try_join_next() {
                log_item_task(joined);
            }

            let Ok(permit) = self.item_slots.clone().acquire_owned().await else {
                return Ok(());
            };

            self.netcheck.check().await?;

            let name = match self.processor.tracker().request_item().await {
                Ok(ClaimResult::Item(name)) => name,
                Ok(ClaimResult::NoItems) => {
                    tracing::info!("Tracker has no items, waiting...");
                    self.processor.sleeper.sleep(NO_ITEMS_PAUSE).await;
                    continue;
                }
                Ok(ClaimResult::RateLimited) => {
                    tracing::info!("Tracker rate limited us, waiting...");
                    self.processor.sleeper.sleep(BACKOFF_PAUSE).await;
                    continue;
                }
                Err(e) => {
                    tracing::warn!("Could not get an item from the tracker: {}", e);
                    self.processor.sleeper.sleep(BACKOFF_PAUSE).await;
                    continue;
                }
            };

            let processor = self.processor.clone();
            items.spawn(async move {
                let _permit = permit;
                if let Err(e) = processor.process(&name).await {
                    tracing::error!("Item '{}' failed: {}", name, e);
                }
            });
        }
    }
}

/// Logs an item task that ended abnormally
fn log_item_task(joined: Result<(), JoinError>) {
    if let Err(e) = joined {
        tracing::error!("Item task ended abnormally: {}", e);
    }
}
