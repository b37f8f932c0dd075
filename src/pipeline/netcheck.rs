//! Proxy detection before claiming work
//!
//! A transparent proxy or captive DNS tends to resolve unrelated hosts to the
//! same address. Results uploaded from behind one are useless, so the pipeline
//! refuses to run when well-known hosts do not resolve to distinct addresses.

use crate::DiscoError;
use std::collections::HashSet;
use std::net::IpAddr;

/// Hosts that must all resolve to different addresses
pub const PROBE_HOSTS: [&str; 6] = [
    "twitter.com",
    "facebook.com",
    "youtube.com",
    "microsoft.com",
    "icanhas.cheezburger.com",
    "archiveteam.org",
];

/// Calls skipped between two real checks
const CHECK_INTERVAL: u32 = 10;

/// Periodic network sanity check
#[derive(Debug, Clone)]
pub struct NetworkCheck {
    hosts: Vec<String>,
    countdown: u32,
}

impl Default for NetworkCheck {
    fn default() -> Self {
        Self::new(PROBE_HOSTS.iter().map(|h| h.to_string()).collect())
    }
}

impl NetworkCheck {
    pub fn new(hosts: Vec<String>) -> Self {
        Self { hosts, countdown: 0 }
    }

    /// Skips the first `calls` checks, e.g. when the caller just verified
    /// the network some other way
    pub fn with_first_check_after(mut self, calls: u32) -> Self {
        self.countdown = calls;
        self
    }

    /// Whether this call should resolve hosts; advances the countdown
    fn due(&mut self) -> bool {
        if self.countdown == 0 {
            self.countdown = CHECK_INTERVAL;
            true
        } else {
            self.countdown -= 1;
            false
        }
    }

    /// Resolves the probe hosts on the first call and every 11th call after it
    pub async fn check(&mut self) -> Result<(), DiscoError> {
        if !self.due() {
            return Ok(());
        }

        tracing::info!("Checking IP address.");

        let mut addresses = Vec::with_capacity(self.hosts.len());
        for host in &self.hosts {
            let mut resolved = tokio::net::lookup_host((host.as_str(), 80))
                .await
                .map_err(|e| DiscoError::NetworkCheck(format!("cannot resolve {}: {}", host, e)))?;

            if let Some(addr) = resolved.next() {
                addresses.push(addr.ip());
            }
        }

        evaluate_addresses(&addresses, self.hosts.len())
    }
}

/// Fails unless there are `expected` distinct addresses
pub fn evaluate_addresses(addresses: &[IpAddr], expected: usize) -> Result<(), DiscoError> {
    let distinct: HashSet<&IpAddr> = addresses.iter().collect();

    if distinct.len() != expected {
        tracing::error!("Got IP addresses: {:?}", distinct);
        return Err(DiscoError::NetworkCheck(
            "Are you behind a firewall/proxy? That is a big no-no!".to_string(),
        ));
    }

    Ok(())
}
