//! Job pipeline around the discover binary
//!
//! For every item claimed from the tracker the pipeline:
//! 1. Prepares a scratch directory
//! 2. Looks up how many result pages the search term has
//! 3. Runs `discover` over that range as a subprocess
//! 4. Records size and hash of the output
//! 5. Moves the output into the data directory
//! 6. Uploads it (bounded concurrency) and reports the item as done

mod item;
mod netcheck;
mod page_count;
mod runner;
mod scraper;
mod upload;

pub use item::{ItemKind, ItemPaths, WorkItem};
pub use netcheck::{evaluate_addresses, NetworkCheck, PROBE_HOSTS};
pub use page_count::{probe_last_page, ProbePolicy};
pub use runner::{ItemProcessor, Pipeline};
pub use scraper::ScraperCommand;
pub use upload::Uploader;

use std::path::PathBuf;

/// Locates the discover binary next to the running executable
pub fn default_discover_bin() -> std::io::Result<PathBuf> {
    let exe = std::env::current_exe()?;
    let dir = exe.parent().ok_or_else(|| {
        std::io::Error::new(std::io::ErrorKind::NotFound, "executable has no parent directory")
    })?;
    Ok(dir.join(format!("discover{}", std::env::consts::EXE_SUFFIX)))
}
