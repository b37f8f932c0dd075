//! Request pacing: delays, retry limits and the sleep dependency
//!
//! All waiting done by the discovery loop goes through a [`Sleeper`], so the
//! retry and cooldown paths can be exercised without real delays.

use async_trait::async_trait;
use rand::Rng;
use std::time::Duration;

/// Something that can wait for a given duration
#[async_trait]
pub trait Sleeper: Send + Sync {
    /// Waits for `duration` before returning
    async fn sleep(&self, duration: Duration);
}

/// Sleeper backed by the tokio timer
#[derive(Debug, Clone, Copy, Default)]
pub struct TokioSleeper;

#[async_trait]
impl Sleeper for TokioSleeper {
    async fn sleep(&self, duration: Duration) {
        tokio::time::sleep(duration).await;
    }
}

/// Timing and retry limits for one discovery run
///
/// The defaults keep the request rate low enough that the search endpoint
/// does not start answering with captcha pages.
#[derive(Debug, Clone)]
pub struct DiscoveryPolicy {
    /// Attempts per page offset, including the first one
    pub max_attempts: u32,

    /// Fixed pause after a failed attempt
    pub retry_pause: Duration,

    /// Lower bound of the random pause before every request (whole seconds)
    pub min_request_delay: Duration,

    /// Upper bound of the random pause before every request (whole seconds)
    pub max_request_delay: Duration,

    /// Cooldown after the endpoint signals a ban (HTTP 503)
    pub ban_cooldown: Duration,
}

impl Default for DiscoveryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            retry_pause: Duration::from_secs(10),
            min_request_delay: Duration::from_secs(30),
            max_request_delay: Duration::from_secs(70),
            ban_cooldown: Duration::from_secs(3000),
        }
    }
}

impl DiscoveryPolicy {
    /// Picks the pause before the next request, uniformly in whole seconds
    pub fn request_delay(&self) -> Duration {
        let min = self.min_request_delay.as_secs();
        let max = self.max_request_delay.as_secs();

        if max <= min {
            return Duration::from_secs(min);
        }

        Duration::from_secs(rand::thread_rng().gen_range(min..=max))
    }
}
