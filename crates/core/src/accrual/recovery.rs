//! Periodic re-queueing of orders that never reached a terminal status.

use std::sync::Arc;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;
use tracing::{debug, info, warn};

use crate::metrics;
use crate::order::{OrderStore, OrderToAccrual, StoreError};

use super::{OrderQueue, QueueError, Throttle};

/// Result of a single recovery pass.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScanReport {
    /// Non-terminal orders found in the store.
    pub found: usize,
    /// Orders put back on the queue.
    pub enqueued: usize,
    /// Orders skipped because the queue was full or closed.
    pub dropped: usize,
}

/// Sweeps the store for NEW and PROCESSING orders and re-queues them.
///
/// Enqueueing never blocks: whatever does not fit is left for the next pass.
pub struct RecoveryScanner {
    store: Arc<dyn OrderStore>,
    queue: OrderQueue,
    throttle: Arc<Throttle>,
    interval: Duration,
}

impl RecoveryScanner {
    pub fn new(
        store: Arc<dyn OrderStore>,
        queue: OrderQueue,
        throttle: Arc<Throttle>,
        interval: Duration,
    ) -> Self {
        Self {
            store,
            queue,
            throttle,
            interval,
        }
    }

    /// Run one recovery pass.
    pub fn scan_once(&self) -> Result<ScanReport, StoreError> {
        let orders = self.store.get_unprocessed_orders()?;
        let mut report = ScanReport {
            found: orders.len(),
            ..Default::default()
        };

        for order in &orders {
            match self.queue.try_submit(OrderToAccrual::from(order)) {
                Ok(()) => report.enqueued += 1,
                Err(QueueError::Full) => report.dropped += 1,
                Err(QueueError::Closed) => {
                    report.dropped = report.found - report.enqueued;
                    break;
                }
            }
        }

        metrics::RECOVERY_ENQUEUED.inc_by(report.enqueued as u64);
        metrics::RECOVERY_DROPPED.inc_by(report.dropped as u64);

        Ok(report)
    }

    /// Scan immediately, then every interval, until shutdown or queue close.
    pub async fn run(self, mut shutdown_rx: broadcast::Receiver<()>) {
        info!("Recovery scanner started (interval {:?})", self.interval);

        loop {
            if let Some(remaining) = self.throttle.remaining() {
                debug!("Recovery waiting out rate-limit cooldown ({:?})", remaining);
                tokio::select! {
                    _ = shutdown_rx.recv() => break,
                    _ = self.queue.closed() => break,
                    _ = self.throttle.wait() => {}
                }
            }

            match self.scan_once() {
                Ok(report) if report.found > 0 => {
                    debug!(
                        "Recovery pass: found {}, enqueued {}, dropped {}",
                        report.found, report.enqueued, report.dropped
                    );
                }
                Ok(_) => {}
                Err(e) => warn!("Recovery pass failed: {}", e),
            }

            tokio::select! {
                _ = shutdown_rx.recv() => break,
                _ = self.queue.closed() => break,
                _ = tokio::time::sleep(self.interval) => {}
            }
        }

        info!("Recovery scanner stopped");
    }
}
