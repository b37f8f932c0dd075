//! Tracker module for claiming and reporting work items
//!
//! The tracker hands out item names, tells us where to upload finished
//! files, and records completed items together with their stats.

mod client;
mod types;

pub use client::{classify_request_status, TrackerClient};
pub use types::{ClaimResult, DoneReport, ItemIdentity, ItemRequest, UploadRequest, API_VERSION};

use thiserror::Error;

/// Errors from talking to the tracker
#[derive(Debug, Error)]
pub enum TrackerError {
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Tracker endpoint '{endpoint}' answered HTTP {status}")]
    UnexpectedStatus { endpoint: String, status: u16 },

    #[error("Unexpected tracker response: {0}")]
    UnexpectedResponse(String),
}
