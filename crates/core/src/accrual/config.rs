//! Accrual engine configuration.

use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Configuration for the accrual reconciliation engine.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AccrualConfig {
    /// Base URL of the external accrual service, e.g. `http://localhost:8081`.
    pub base_url: String,

    /// Timeout for a single accrual request (seconds).
    #[serde(default = "default_request_timeout")]
    pub request_timeout_secs: u64,

    /// Number of concurrent workers draining the order queue.
    #[serde(default = "default_worker_count")]
    pub worker_count: usize,

    /// How long every worker pauses after the accrual service answers 429 (milliseconds).
    #[serde(default = "default_throttle_sleep")]
    pub throttle_sleep_ms: u64,

    /// How often unresolved orders are re-queued (milliseconds).
    #[serde(default = "default_recovery_interval")]
    pub recovery_interval_ms: u64,

    /// Bounded capacity of the order queue.
    #[serde(default = "default_queue_capacity")]
    pub queue_capacity: usize,
}

fn default_request_timeout() -> u64 {
    10
}

fn default_worker_count() -> usize {
    4
}

fn default_throttle_sleep() -> u64 {
    60_000 // 1 minute
}

fn default_recovery_interval() -> u64 {
    10_000 // 10 seconds
}

fn default_queue_capacity() -> usize {
    1024
}

impl AccrualConfig {
    /// Default settings pointed at `base_url`.
    pub fn with_base_url(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
            request_timeout_secs: default_request_timeout(),
            worker_count: default_worker_count(),
            throttle_sleep_ms: default_throttle_sleep(),
            recovery_interval_ms: default_recovery_interval(),
            queue_capacity: default_queue_capacity(),
        }
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }

    pub fn throttle_sleep(&self) -> Duration {
        Duration::from_millis(self.throttle_sleep_ms)
    }

    pub fn recovery_interval(&self) -> Duration {
        Duration::from_millis(self.recovery_interval_ms)
    }
}
