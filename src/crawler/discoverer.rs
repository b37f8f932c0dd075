//! Range discovery loop
//!
//! Walks a closed range of page offsets in ascending order, fetching each
//! result page with retries and turning it into discovered records.

use crate::crawler::fetcher::{FetchFault, FetchOutcome, PageFetcher};
use crate::crawler::parser::extract_file_refs;
use crate::DiscoError;
use std::collections::VecDeque;
use std::fmt;

/// Inclusive range of page offsets
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PageRange {
    start: u64,
    end: u64,
}

impl PageRange {
    /// Creates a range, rejecting `start > end` before any work is done
    pub fn new(start: u64, end: u64) -> Result<Self, DiscoError> {
        if start > end {
            return Err(DiscoError::Precondition(format!(
                "start_num ({}) must not exceed end_num ({})",
                start, end
            )));
        }

        Ok(Self { start, end })
    }

    pub fn start(&self) -> u64 {
        self.start
    }

    pub fn end(&self) -> u64 {
        self.end
    }

    /// Number of offsets in the range
    pub fn offset_count(&self) -> u64 {
        self.end - self.start + 1
    }
}

/// One line of discovery output
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DiscoveredRecord {
    /// A result page that exists, rendered as `page:<term>:<offset>`
    PageMarker { term: String, offset: u64 },

    /// A file reference extracted from a result page
    FileRef(String),
}

impl DiscoveredRecord {
    /// Builds a file reference record, percent-encoding any non-ASCII bytes
    pub fn file_ref(link: &str) -> Self {
        if link.is_ascii() {
            return DiscoveredRecord::FileRef(link.to_string());
        }

        let mut encoded = String::with_capacity(link.len() * 3);
        for byte in link.bytes() {
            if byte.is_ascii() {
                encoded.push(byte as char);
            } else {
                encoded.push_str(&format!("%{:02X}", byte));
            }
        }
        DiscoveredRecord::FileRef(encoded)
    }

    pub fn is_page_marker(&self) -> bool {
        matches!(self, DiscoveredRecord::PageMarker { .. })
    }
}

impl fmt::Display for DiscoveredRecord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DiscoveredRecord::PageMarker { term, offset } => write!(f, "page:{}:{}", term, offset),
            DiscoveredRecord::FileRef(link) => f.write_str(link),
        }
    }
}

/// Records produced for a single page offset
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DiscoveredPage {
    pub offset: u64,

    /// Page marker followed by file references; empty when the page is absent
    pub records: Vec<DiscoveredRecord>,
}

impl DiscoveredPage {
    /// True if the endpoint reported the page as missing
    pub fn is_absent(&self) -> bool {
        self.records.is_empty()
    }

    /// Number of file references on the page
    pub fn file_ref_count(&self) -> usize {
        self.records.iter().filter(|r| !r.is_page_marker()).count()
    }
}

/// Pull-based discovery over a page range
///
/// Nothing is fetched until the caller asks for the next page or record.
/// The discoverer is single-pass: once it returns `None` or an error it stays
/// exhausted, and starting over means building a new one.
pub struct RangeDiscoverer {
    fetcher: PageFetcher,
    term: String,
    next_offset: Option<u64>,
    end: u64,
    pending: VecDeque<DiscoveredRecord>,
}

impl RangeDiscoverer {
    /// Creates a discoverer for `term` over `range`
    ///
    /// # Returns
    ///
    /// * `Ok(RangeDiscoverer)` - Ready to fetch the first offset
    /// * `Err(DiscoError::Precondition)` - The search term is not ASCII
    pub fn new(fetcher: PageFetcher, range: PageRange, term: &str) -> Result<Self, DiscoError> {
        if !term.is_ascii() {
            return Err(DiscoError::Precondition(format!(
                "search term must be ASCII, got '{}'",
                term
            )));
        }

        Ok(Self {
            fetcher,
            term: term.to_string(),
            next_offset: Some(range.start()),
            end: range.end(),
            pending: VecDeque::new(),
        })
    }

    pub fn term(&self) -> &str {
        &self.term
    }

    /// Fetches the next page offset and returns its records
    ///
    /// # Returns
    ///
    /// * `Ok(Some(page))` - The offset was processed (its records may be empty)
    /// * `Ok(None)` - The range is exhausted
    /// * `Err(DiscoError::AttemptsExhausted)` - The offset failed too many times
    pub async fn next_page(&mut self) -> Result<Option<DiscoveredPage>, DiscoError> {
        let Some(offset) = self.next_offset else {
            return Ok(None);
        };

        let body = match self.fetch_with_retries(offset).await {
            Ok(body) => body,
            Err(e) => {
                self.next_offset = None;
                self.pending.clear();
                return Err(e);
            }
        };

        self.next_offset = if offset < self.end {
            Some(offset + 1)
        } else {
            None
        };

        let Some(body) = body else {
            tracing::debug!("Page {} does not exist", offset);
            return Ok(Some(DiscoveredPage {
                offset,
                records: Vec::new(),
            }));
        };

        let marker = DiscoveredRecord::PageMarker {
            term: self.term.clone(),
            offset,
        };
        tracing::info!("{}", marker);

        let mut records = vec![marker];
        for link in extract_file_refs(&body) {
            let record = DiscoveredRecord::file_ref(link);
            tracing::info!("{}", record);
            records.push(record);
        }

        Ok(Some(DiscoveredPage { offset, records }))
    }

    /// Returns the next record, fetching further pages as needed
    pub async fn next_record(&mut self) -> Result<Option<DiscoveredRecord>, DiscoError> {
        loop {
            if let Some(record) = self.pending.pop_front() {
                return Ok(Some(record));
            }

            match self.next_page().await? {
                Some(page) => self.pending.extend(page.records),
                None => return Ok(None),
            }
        }
    }

    /// Runs the attempt loop for one offset
    ///
    /// `Ok(None)` means the page is absent.
    async fn fetch_with_retries(&self, offset: u64) -> Result<Option<String>, DiscoError> {
        let url = self.fetcher.page_url(&self.term, offset);
        let policy = self.fetcher.policy();
        let mut last_fault: Option<FetchFault> = None;

        for attempt in 1..=policy.max_attempts {
            match self.fetcher.fetch_page(&url).await {
                FetchOutcome::Page(body) => return Ok(Some(body)),
                FetchOutcome::Absent => return Ok(None),
                FetchOutcome::Fatal(message) => return Err(DiscoError::Fetch { url, message }),
                FetchOutcome::Retry(fault) => {
                    tracing::warn!(
                        "Attempt {}/{} for page {} failed: {}",
                        attempt,
                        policy.max_attempts,
                        offset,
                        fault
                    );
                    last_fault = Some(fault);

                    if attempt < policy.max_attempts {
                        tracing::info!("Sleeping {}s...", policy.retry_pause.as_secs());
                        self.fetcher.pause(policy.retry_pause).await;
                    }
                }
            }
        }

        Err(DiscoError::AttemptsExhausted {
            offset,
            attempts: policy.max_attempts,
            last_fault: last_fault.unwrap_or(FetchFault::EmptyBody),
        })
    }
}
