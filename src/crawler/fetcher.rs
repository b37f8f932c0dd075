//! HTTP fetcher for search result pages
//!
//! This module handles all requests made by the discovery loop:
//! - Building the HTTP client with the identifying user agent
//! - Building result-page URLs for a search term and page offset
//! - Pacing every request with a random pre-request pause
//! - Classifying responses into an explicit [`FetchOutcome`]

use crate::crawler::pacing::{DiscoveryPolicy, Sleeper};
use crate::DiscoError;
use reqwest::{Client, StatusCode};
use std::fmt;
use std::sync::Arc;
use std::time::Duration;
use url::Url;

/// Default search endpoint
pub const DEFAULT_BASE_URL: &str = "http://rapid-search-engine.com";

/// User agent sent with every request
pub const DEFAULT_USER_AGENT: &str = "ArchiveTeam";

/// Result of a single fetch attempt
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FetchOutcome {
    /// The page exists and has a non-empty body
    Page(String),

    /// The page does not exist (HTTP 404)
    Absent,

    /// The attempt failed in a way that may succeed on retry
    Retry(FetchFault),

    /// The request could not be issued at all; retrying will not help
    Fatal(String),
}

/// Why a fetch attempt failed
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FetchFault {
    /// HTTP 200 with an empty body
    EmptyBody,

    /// HTTP 503, the endpoint is serving a captcha or ban page
    Banned,

    /// Any other status code
    UnexpectedStatus(u16),

    /// Connection, timeout or body read failure
    Network(String),
}

impl fmt::Display for FetchFault {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FetchFault::EmptyBody => write!(f, "empty response body"),
            FetchFault::Banned => write!(f, "banned (HTTP 503)"),
            FetchFault::UnexpectedStatus(code) => write!(f, "unexpected HTTP status {}", code),
            FetchFault::Network(error) => write!(f, "network error: {}", error),
        }
    }
}

/// Builds an HTTP client that identifies itself with `user_agent`
///
/// # Example
///
/// ```no_run
/// use search_disco::crawler::{build_http_client, DEFAULT_USER_AGENT};
///
/// let client = build_http_client(DEFAULT_USER_AGENT).unwrap();
/// ```
pub fn build_http_client(user_agent: &str) -> Result<Client, reqwest::Error> {
    Client::builder()
        .user_agent(user_agent)
        .timeout(Duration::from_secs(120))
        .connect_timeout(Duration::from_secs(30))
        .gzip(true)
        .brotli(true)
        .build()
}

/// Builds the result-page URL for a search term
///
/// The term is URL-escaped and wrapped in percent-encoded asterisks. With
/// `offset` set to `None` the URL points at the first page without an
/// explicit `start` parameter, which is what the page-count lookup uses.
///
/// # Example
///
/// ```
/// use search_disco::crawler::search_url;
///
/// let url = search_url("http://search.example", "aa", Some(3));
/// assert_eq!(url, "http://search.example/index-s=%2Aaa%2A&stype=0&start=3.html");
/// ```
pub fn search_url(base_url: &str, term: &str, offset: Option<u64>) -> String {
    let base = base_url.trim_end_matches('/');
    let term = urlencoding::encode(term);

    match offset {
        Some(offset) => format!(
            "{}/index-s=%2A{}%2A&stype=0&start={}.html",
            base, term, offset
        ),
        None => format!("{}/index-s=%2A{}%2A&stype=0.html", base, term),
    }
}

/// Fetches result pages one attempt at a time
pub struct PageFetcher {
    client: Client,
    base_url: String,
    policy: DiscoveryPolicy,
    sleeper: Arc<dyn Sleeper>,
}

impl PageFetcher {
    /// Creates a fetcher for the search endpoint at `base_url`
    ///
    /// # Returns
    ///
    /// * `Ok(PageFetcher)` - The base URL is a valid http(s) URL
    /// * `Err(DiscoError)` - The base URL could not be parsed
    pub fn new(
        client: Client,
        base_url: &str,
        policy: DiscoveryPolicy,
        sleeper: Arc<dyn Sleeper>,
    ) -> Result<Self, DiscoError> {
        let parsed = Url::parse(base_url)?;
        if parsed.scheme() != "http" && parsed.scheme() != "https" {
            return Err(DiscoError::Precondition(format!(
                "search endpoint must be http(s), got '{}'",
                base_url
            )));
        }

        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            policy,
            sleeper,
        })
    }

    /// URL of the result page at `offset` for `term`
    pub fn page_url(&self, term: &str, offset: u64) -> String {
        search_url(&self.base_url, term, Some(offset))
    }

    pub fn policy(&self) -> &DiscoveryPolicy {
        &self.policy
    }

    /// Waits for `duration` using the injected sleeper
    pub async fn pause(&self, duration: Duration) {
        self.sleeper.sleep(duration).await;
    }

    /// Performs one fetch attempt for `url`
    ///
    /// # Response Handling
    ///
    /// | Response | Outcome |
    /// |----------|---------|
    /// | 200, non-empty body | `Page(body)` |
    /// | 200, empty body | `Retry(EmptyBody)` |
    /// | 404 | `Absent` |
    /// | 503 | ban cooldown, then `Retry(Banned)` |
    /// | anything else | `Retry(UnexpectedStatus)` |
    /// | transport error | `Retry(Network)` |
    ///
    /// Every attempt starts with the random pre-request pause from the policy.
    pub async fn fetch_page(&self, url: &str) -> FetchOutcome {
        self.sleeper.sleep(self.policy.request_delay()).await;

        tracing::info!("Fetch {}", url);

        let response = match self.client.get(url).send().await {
            Ok(response) => response,
            Err(e) if e.is_builder() => return FetchOutcome::Fatal(e.to_string()),
            Err(e) => {
                tracing::warn!("Request to {} failed: {}", url, e);
                return FetchOutcome::Retry(FetchFault::Network(e.to_string()));
            }
        };

        let status = response.status();
        tracing::info!(
            "Got {} {}",
            status.as_u16(),
            status.canonical_reason().unwrap_or("")
        );

        match status {
            StatusCode::OK => match response.text().await {
                Ok(body) if body.is_empty() => FetchOutcome::Retry(FetchFault::EmptyBody),
                Ok(body) => FetchOutcome::Page(body),
                Err(e) => FetchOutcome::Retry(FetchFault::Network(e.to_string())),
            },
            StatusCode::NOT_FOUND => FetchOutcome::Absent,
            StatusCode::SERVICE_UNAVAILABLE => {
                tracing::warn!(
                    "You are banned from this site, cooling down for {}s. Keep concurrency low.",
                    self.policy.ban_cooldown.as_secs()
                );
                self.sleeper.sleep(self.policy.ban_cooldown).await;
                FetchOutcome::Retry(FetchFault::Banned)
            }
            other => FetchOutcome::Retry(FetchFault::UnexpectedStatus(other.as_u16())),
        }
    }
}
