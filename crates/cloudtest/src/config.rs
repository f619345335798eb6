//! Driver configuration
//!
//! Tunables for suite execution: the event wait bound, the bounded timeout
//! retry policy, and concurrency limits.

use crate::subscriber::DEFAULT_EVENT_TIMEOUT;
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Bounded retry policy for transient (timeout) failures.
///
/// Applied by the suite driver only; the subscriber itself never retries.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RetryConfig {
    /// Whether timed-out cases are retried at all.
    pub auto_retry: bool,

    /// Maximum number of retries after the first attempt.
    pub max_retries: u32,

    /// Delay before the first retry.
    #[serde(with = "humantime_serde")]
    pub initial_delay: Duration,

    /// Upper bound on the backoff delay.
    #[serde(with = "humantime_serde")]
    pub max_delay: Duration,

    /// Multiplier applied to the delay after each retry.
    pub backoff_factor: f64,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            auto_retry: false,
            max_retries: 2,
            initial_delay: Duration::from_secs(5),
            max_delay: Duration::from_secs(60),
            backoff_factor: 2.0,
        }
    }
}

impl RetryConfig {
    /// Whether another retry is allowed after `attempts` completed attempts.
    #[must_use]
    pub fn should_retry(&self, attempts: u32) -> bool {
        self.auto_retry && attempts <= self.max_retries
    }

    /// Backoff delay before retry number `retry` (1-based).
    #[must_use]
    pub fn delay(&self, retry: u32) -> Duration {
        let exponent = retry.saturating_sub(1).try_into().unwrap_or(i32::MAX);
        let delay = self.initial_delay.mul_f64(self.backoff_factor.powi(exponent));
        delay.min(self.max_delay)
    }
}

/// Suite driver configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DriverConfig {
    /// Bound for one event wait.
    #[serde(with = "humantime_serde")]
    pub event_timeout: Duration,

    /// Maximum number of devices running cases concurrently.
    pub max_concurrent_devices: usize,

    /// Timeout retry policy.
    #[serde(default)]
    pub retry: RetryConfig,
}

impl Default for DriverConfig {
    fn default() -> Self {
        Self {
            event_timeout: DEFAULT_EVENT_TIMEOUT,
            max_concurrent_devices: 8,
            retry: RetryConfig::default(),
        }
    }
}

impl DriverConfig {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn with_event_timeout(mut self, timeout: Duration) -> Self {
        self.event_timeout = timeout;
        self
    }

    #[must_use]
    pub fn with_retry(mut self, retry: RetryConfig) -> Self {
        self.retry = retry;
        self
    }

    #[must_use]
    pub fn with_max_concurrent_devices(mut self, limit: usize) -> Self {
        self.max_concurrent_devices = limit.max(1);
        self
    }
}
