//! Per-order reconciliation protocol run by each worker.

use std::sync::Arc;

use tokio::sync::broadcast;
use tokio::time::Instant;
use tracing::{debug, warn};

use crate::metrics;
use crate::order::{OrderToAccrual, Transition};

use super::{
    AccrualClient, AccrualError, AccrualStatus, LedgerUpdater, OrderQueue, QueryOutcome, Throttle,
};

/// What happened to a single queue item.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum ProcessOutcome {
    /// Remote status written to the store.
    Applied(Transition),
    /// Remote service has no final answer yet (204 or REGISTERED).
    Pending,
    /// Service answered 429; the shared cooldown was raised.
    RateLimited,
    /// Remote or store failure; recovery will retry.
    Failed,
}

/// One consumer of the order queue.
pub(crate) struct Worker {
    pub(crate) id: usize,
    pub(crate) queue: OrderQueue,
    pub(crate) client: Arc<dyn AccrualClient>,
    pub(crate) throttle: Arc<Throttle>,
    pub(crate) ledger: LedgerUpdater,
}

impl Worker {
    /// Drain the queue until it closes or shutdown is signalled.
    pub(crate) async fn run(self, mut shutdown_rx: broadcast::Receiver<()>) {
        debug!("Accrual worker {} started", self.id);

        loop {
            let item = tokio::select! {
                _ = shutdown_rx.recv() => break,
                item = self.queue.recv() => match item {
                    Some(item) => item,
                    None => break,
                },
            };

            tokio::select! {
                _ = shutdown_rx.recv() => break,
                _ = self.process(&item) => {}
            }
        }

        debug!("Accrual worker {} stopped", self.id);
    }

    /// Query the accrual service for one order and apply the answer.
    pub(crate) async fn process(&self, item: &OrderToAccrual) -> ProcessOutcome {
        self.throttle.wait().await;

        let started = Instant::now();
        let result = self.client.query(&item.order_number).await;
        metrics::ACCRUAL_REQUEST_DURATION.observe(started.elapsed().as_secs_f64());

        match result {
            Ok(QueryOutcome::NotYetKnown) => {
                metrics::ACCRUAL_REQUESTS
                    .with_label_values(&["not_yet_known"])
                    .inc();
                debug!(order = %item.order_number, "Order not yet known to accrual service");
                ProcessOutcome::Pending
            }
            Ok(QueryOutcome::Quote(quote)) => {
                metrics::ACCRUAL_REQUESTS.with_label_values(&["quote"]).inc();

                if quote.status == AccrualStatus::Registered {
                    debug!(order = %item.order_number, "Order registered, waiting for processing");
                    return ProcessOutcome::Pending;
                }

                match self.ledger.apply(&quote, &item.owner_id) {
                    Ok(Some(transition)) => ProcessOutcome::Applied(transition),
                    Ok(None) => ProcessOutcome::Pending,
                    Err(_) => ProcessOutcome::Failed,
                }
            }
            Err(AccrualError::RateLimited { retry_after }) => {
                metrics::ACCRUAL_REQUESTS
                    .with_label_values(&["rate_limited"])
                    .inc();
                if self.throttle.raise_for(retry_after) {
                    let pause = self.throttle.remaining().unwrap_or_default();
                    warn!(
                        order = %item.order_number,
                        "Accrual service rate limit hit, pausing all workers for {:?}",
                        pause
                    );
                } else {
                    debug!(order = %item.order_number, "Rate limited during active cooldown");
                }
                ProcessOutcome::RateLimited
            }
            Err(e) => {
                metrics::ACCRUAL_REQUESTS
                    .with_label_values(&[e.kind()])
                    .inc();
                warn!(order = %item.order_number, "Accrual query failed: {}", e);
                ProcessOutcome::Failed
            }
        }
    }
}
