//! Page-count lookup run before an item's discovery
//!
//! The first result page for a term carries the pagination bar; the number
//! found there becomes the last offset handed to the discover subprocess.

use crate::crawler::{extract_page_count, search_url, Sleeper};
use crate::DiscoError;
use reqwest::{Client, StatusCode};
use std::time::Duration;

/// Retry limits for the page-count lookup
#[derive(Debug, Clone)]
pub struct ProbePolicy {
    pub max_attempts: u32,
    pub retry_pause: Duration,
}

impl Default for ProbePolicy {
    fn default() -> Self {
        Self {
            max_attempts: 20,
            retry_pause: Duration::from_secs(15),
        }
    }
}

/// Finds the last page offset to discover for `term`
///
/// Pages without any pagination markup have a single result page, so a
/// missing count yields offset 0.
///
/// # Returns
///
/// * `Ok(n)` - Last page offset
/// * `Err(DiscoError::PageCount)` - The first page never came back with content
pub async fn probe_last_page(
    client: &Client,
    base_url: &str,
    term: &str,
    sleeper: &dyn Sleeper,
    policy: &ProbePolicy,
) -> Result<u64, DiscoError> {
    let url = search_url(base_url, term, None);

    for attempt in 1..=policy.max_attempts {
        tracing::info!("Fetch {}", url);

        match client.get(&url).send().await {
            Ok(response) if response.status() == StatusCode::OK => match response.text().await {
                Ok(html) if !html.is_empty() => {
                    let last = extract_page_count(&html);
                    match last {
                        Some(n) => tracing::info!("Term '{}' has {} result pages", term, n),
                        None => tracing::info!("Term '{}' has no pagination, using page 0", term),
                    }
                    return Ok(last.unwrap_or(0));
                }
                Ok(_) => tracing::warn!("Empty first page for '{}'", term),
                Err(e) => tracing::warn!("Failed to read first page for '{}': {}", term, e),
            },
            Ok(response) => tracing::info!("Got {}", response.status()),
            Err(e) => tracing::warn!("Request to {} failed: {}", url, e),
        }

        if attempt < policy.max_attempts {
            tracing::info!("Sleeping for some time...");
            sleeper.sleep(policy.retry_pause).await;
        }
    }

    Err(DiscoError::PageCount(term.to_string()))
}
