//! Process-wide rate-limit cooldown shared by all workers.

use std::sync::Mutex;
use std::time::Duration;

use tokio::time::{sleep, Instant};

use crate::metrics;

/// Cooldown deadline raised when the accrual service answers 429.
///
/// Workers call [`Throttle::wait`] before every remote request, so one
/// rate-limit response pauses the whole pool until the deadline passes.
#[derive(Debug)]
pub struct Throttle {
    sleep: Duration,
    until: Mutex<Option<Instant>>,
}

impl Throttle {
    /// Create a throttle whose cooldown lasts `sleep`.
    pub fn new(sleep: Duration) -> Self {
        Self {
            sleep,
            until: Mutex::new(None),
        }
    }

    /// Start a cooldown of the configured length.
    ///
    /// Returns `true` if this call opened a new cooldown window and `false`
    /// if one was already in effect.
    pub fn raise(&self) -> bool {
        self.raise_for(None)
    }

    /// Start a cooldown lasting at least `retry_after` (and never less than
    /// the configured sleep). An active cooldown is only ever extended.
    pub fn raise_for(&self, retry_after: Option<Duration>) -> bool {
        let window = retry_after.map_or(self.sleep, |d| d.max(self.sleep));
        let now = Instant::now();
        let deadline = now + window;

        let mut until = self.until.lock().unwrap();
        match *until {
            Some(current) if current > now => {
                if deadline > current && retry_after.is_some() {
                    *until = Some(deadline);
                }
                false
            }
            _ => {
                *until = Some(deadline);
                metrics::THROTTLE_ACTIVATIONS.inc();
                true
            }
        }
    }

    /// Time left in the current cooldown, if any.
    pub fn remaining(&self) -> Option<Duration> {
        let until = self.until.lock().unwrap();
        let now = Instant::now();
        match *until {
            Some(deadline) if deadline > now => Some(deadline - now),
            _ => None,
        }
    }

    pub fn is_active(&self) -> bool {
        self.remaining().is_some()
    }

    /// Sleep until no cooldown is in effect.
    pub async fn wait(&self) {
        // Loop: the deadline may be pushed out while we sleep.
        while let Some(remaining) = self.remaining() {
            sleep(remaining).await;
        }
    }
}
