//! Runs the discover binary as an isolated subprocess

use crate::config::{PacingConfig, SearchConfig};
use crate::DiscoError;
use std::path::{Path, PathBuf};
use tokio::process::Command;

/// Invocation settings for the discover subprocess
#[derive(Debug, Clone)]
pub struct ScraperCommand {
    program: PathBuf,
    max_tries: u32,
    search: SearchConfig,
    pacing: PacingConfig,
}

impl ScraperCommand {
    pub fn new(program: PathBuf, max_tries: u32, search: SearchConfig, pacing: PacingConfig) -> Self {
        Self {
            program,
            max_tries,
            search,
            pacing,
        }
    }

    /// Arguments for one discover run
    ///
    /// Options come first and positionals follow `--`, so a term starting
    /// with `-` is not mistaken for a flag.
    pub fn args(&self, start: u64, end: u64, term: &str, output: &Path) -> Vec<String> {
        vec![
            "--base-url".to_string(),
            self.search.base_url.clone(),
            "--user-agent".to_string(),
            self.search.user_agent.clone(),
            "--min-delay".to_string(),
            self.pacing.min_delay.to_string(),
            "--max-delay".to_string(),
            self.pacing.max_delay.to_string(),
            "--retry-pause".to_string(),
            self.pacing.retry_pause.to_string(),
            "--ban-cooldown".to_string(),
            self.pacing.ban_cooldown.to_string(),
            "--".to_string(),
            start.to_string(),
            end.to_string(),
            term.to_string(),
            output.display().to_string(),
        ]
    }

    /// Runs discover until it exits with code 0, up to `max_tries` times
    ///
    /// Each attempt starts from scratch and truncates the output file.
    pub async fn run(
        &self,
        start: u64,
        end: u64,
        term: &str,
        output: &Path,
        item_dir: &Path,
    ) -> Result<(), DiscoError> {
        let args = self.args(start, end, term, output);
        let mut last_failure = String::from("never started");

        for attempt in 1..=self.max_tries {
            tracing::info!(
                "Running {} for '{}' pages {}..={} (attempt {}/{})",
                self.program.display(),
                term,
                start,
                end,
                attempt,
                self.max_tries
            );

            let status = Command::new(&self.program)
                .args(&args)
                .env("item_dir", item_dir)
                .kill_on_drop(true)
                .status()
                .await;

            match status {
                Ok(status) if status.success() => return Ok(()),
                Ok(status) => {
                    last_failure = match status.code() {
                        Some(code) => format!("exit code {}", code),
                        None => "terminated by signal".to_string(),
                    };
                }
                Err(e) => last_failure = e.to_string(),
            }

            tracing::warn!(
                "{} failed for '{}': {}",
                self.program.display(),
                term,
                last_failure
            );
        }

        Err(DiscoError::Subprocess {
            program: self.program.display().to_string(),
            message: format!("{} after {} attempts", last_failure, self.max_tries),
        })
    }
}
