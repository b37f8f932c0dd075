//! Crawler module for result-page discovery
//!
//! This module contains the core discovery logic, including:
//! - HTTP fetching with pacing and ban detection
//! - File-reference and page-count extraction
//! - The retrying range loop that produces discovered records

mod discoverer;
mod fetcher;
mod pacing;
mod parser;

pub use discoverer::{DiscoveredPage, DiscoveredRecord, PageRange, RangeDiscoverer};
pub use fetcher::{
    build_http_client, search_url, FetchFault, FetchOutcome, PageFetcher, DEFAULT_BASE_URL,
    DEFAULT_USER_AGENT,
};
pub use pacing::{DiscoveryPolicy, Sleeper, TokioSleeper};
pub use parser::{extract_file_refs, extract_page_count};

use crate::output::RecordSink;
use crate::DiscoError;
use std::io::{self, Write};

/// Totals for a finished discovery run
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DiscoverySummary {
    /// Offsets whose page existed
    pub pages_found: u64,

    /// Offsets reported as missing
    pub pages_absent: u64,

    /// File references written
    pub file_refs: u64,
}

/// Drains a discoverer into a record sink
///
/// The sink is flushed after every page so that completed pages are on disk
/// before the next fetch starts. On a fatal error, whether from fetching or
/// from writing a record, the sink is still finished, leaving a valid gzip
/// file with every completed page, and the error is returned.
///
/// # Returns
///
/// * `Ok(DiscoverySummary)` - Every offset was processed and the sink closed
/// * `Err(DiscoError)` - Discovery aborted or the sink could not be written
pub async fn run_discovery<W: Write>(
    discoverer: &mut RangeDiscoverer,
    mut sink: RecordSink<W>,
) -> Result<DiscoverySummary, DiscoError> {
    let mut summary = DiscoverySummary::default();

    loop {
        let page = match discoverer.next_page().await {
            Ok(Some(page)) => page,
            Ok(None) => break,
            Err(e) => return Err(abort(sink, e)),
        };

        if page.is_absent() {
            summary.pages_absent += 1;
            continue;
        }

        summary.pages_found += 1;
        summary.file_refs += page.file_ref_count() as u64;

        if let Err(e) = write_page(&mut sink, &page.records) {
            return Err(abort(sink, e.into()));
        }
    }

    sink.finish()?;

    tracing::info!(
        "Discovery finished: {} pages, {} missing, {} file references",
        summary.pages_found,
        summary.pages_absent,
        summary.file_refs
    );

    Ok(summary)
}

fn write_page<W: Write>(sink: &mut RecordSink<W>, records: &[DiscoveredRecord]) -> io::Result<()> {
    for record in records {
        sink.write_record(record)?;
    }
    sink.flush()
}

/// Closes the sink after a fatal error and hands the error back
fn abort<W: Write>(sink: RecordSink<W>, error: DiscoError) -> DiscoError {
    tracing::error!("Discovery aborted: {}", error);
    if let Err(finish_err) = sink.finish() {
        tracing::error!("Failed to close output after abort: {}", finish_err);
    }
    error
}
