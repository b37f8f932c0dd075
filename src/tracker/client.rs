//! HTTP client for the work tracker

use crate::tracker::types::{ClaimResult, DoneReport, ItemRequest, UploadRequest, API_VERSION};
use crate::tracker::TrackerError;
use reqwest::{Client, StatusCode};
use std::time::Duration;

/// Maps a non-200 answer of `POST /request` to a claim result
///
/// 404 means the queue is empty; 420 and 429 ask us to back off. Any other
/// status is not part of the protocol and yields `None`.
pub fn classify_request_status(status: u16) -> Option<ClaimResult> {
    match status {
        404 => Some(ClaimResult::NoItems),
        420 | 429 => Some(ClaimResult::RateLimited),
        _ => None,
    }
}

/// Talks to one tracker project on behalf of one downloader
#[derive(Debug, Clone)]
pub struct TrackerClient {
    client: Client,
    base_url: String,
    downloader: String,
    version: String,
}

impl TrackerClient {
    /// Creates a client for the project at `base_url`
    /// (e.g., `http://tracker.example.org/project`)
    pub fn new(base_url: &str, downloader: &str, version: &str) -> Result<Self, TrackerError> {
        let client = Client::builder()
            .timeout(Duration::from_secs(60))
            .connect_timeout(Duration::from_secs(15))
            .build()?;

        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            downloader: downloader.to_string(),
            version: version.to_string(),
        })
    }

    pub fn downloader(&self) -> &str {
        &self.downloader
    }

    fn endpoint(&self, name: &str) -> String {
        format!("{}/{}", self.base_url, name)
    }

    /// Asks the tracker for a work item
    pub async fn request_item(&self) -> Result<ClaimResult, TrackerError> {
        let body = ItemRequest {
            downloader: &self.downloader,
            api_version: API_VERSION,
            version: &self.version,
        };

        let response = self
            .client
            .post(self.endpoint("request"))
            .json(&body)
            .send()
            .await?;

        match response.status() {
            StatusCode::OK => {
                let item = response.text().await?.trim().to_string();
                if item.is_empty() {
                    return Err(TrackerError::UnexpectedResponse(
                        "empty item name".to_string(),
                    ));
                }
                tracing::info!("Received item '{}' from tracker", item);
                Ok(ClaimResult::Item(item))
            }
            status => classify_request_status(status.as_u16()).ok_or_else(|| {
                TrackerError::UnexpectedStatus {
                    endpoint: "request".to_string(),
                    status: status.as_u16(),
                }
            }),
        }
    }

    /// Asks the tracker where to upload finished files
    ///
    /// # Returns
    ///
    /// * `Ok(Some(target))` - rsync target with `:downloader` filled in
    /// * `Ok(None)` - No upload target is available right now
    pub async fn request_upload_target(&self) -> Result<Option<String>, TrackerError> {
        let body = UploadRequest {
            downloader: &self.downloader,
            version: &self.version,
        };

        let response = self
            .client
            .post(self.endpoint("upload"))
            .json(&body)
            .send()
            .await?;

        match response.status() {
            StatusCode::OK => {
                let target = response.text().await?.trim().to_string();
                if target.is_empty() {
                    return Ok(None);
                }
                Ok(Some(target.replace(":downloader", &self.downloader)))
            }
            StatusCode::NOT_FOUND | StatusCode::TOO_MANY_REQUESTS => Ok(None),
            status => Err(TrackerError::UnexpectedStatus {
                endpoint: "upload".to_string(),
                status: status.as_u16(),
            }),
        }
    }

    /// Reports a finished item
    pub async fn send_done(&self, report: &DoneReport) -> Result<(), TrackerError> {
        let response = self
            .client
            .post(self.endpoint("done"))
            .json(report)
            .send()
            .await?;

        let status = response.status();
        if status != StatusCode::OK {
            return Err(TrackerError::UnexpectedStatus {
                endpoint: "done".to_string(),
                status: status.as_u16(),
            });
        }

        let text = response.text().await?;
        if text.trim() != "OK" {
            return Err(TrackerError::UnexpectedResponse(format!(
                "done for '{}' answered '{}'",
                report.item,
                text.trim()
            )));
        }

        tracing::info!("Tracker confirmed item '{}'", report.item);
        Ok(())
    }
}
