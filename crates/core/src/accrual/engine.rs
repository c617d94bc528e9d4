//! Accrual engine: worker pool, recovery scanner and shared throttle.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use futures::future::join_all;
use tokio::sync::broadcast;
use tokio::task::JoinHandle;
use tracing::{error, info, warn};

use crate::order::{OrderStore, OrderToAccrual};

use super::worker::Worker;
use super::{
    AccrualClient, AccrualConfig, EngineError, EngineStatus, LedgerUpdater, OrderQueue,
    QueueError, RecoveryScanner, Throttle,
};

/// How long [`AccrualEngine::stop`] lets workers drain before cancelling them.
pub const DEFAULT_SHUTDOWN_GRACE: Duration = Duration::from_secs(5);

/// Reconciles submitted orders with the external accrual service.
///
/// Workers pull orders off a shared queue, ask the accrual client about each
/// one and hand the answer to the [`LedgerUpdater`]. A recovery scanner
/// re-queues orders that are still NEW or PROCESSING, so a dropped or failed
/// item is retried on the next pass.
pub struct AccrualEngine {
    config: AccrualConfig,
    store: Arc<dyn OrderStore>,
    client: Arc<dyn AccrualClient>,
    queue: OrderQueue,
    throttle: Arc<Throttle>,

    // Runtime state
    running: Arc<AtomicBool>,
    shutdown_tx: broadcast::Sender<()>,
    handles: Mutex<Vec<JoinHandle<()>>>,
}

impl AccrualEngine {
    /// Create a new engine. Nothing runs until [`start`](Self::start).
    pub fn new(
        config: AccrualConfig,
        store: Arc<dyn OrderStore>,
        client: Arc<dyn AccrualClient>,
    ) -> Self {
        let (shutdown_tx, _) = broadcast::channel(1);
        let queue = OrderQueue::new(config.queue_capacity);
        let throttle = Arc::new(Throttle::new(config.throttle_sleep()));

        Self {
            config,
            store,
            client,
            queue,
            throttle,
            running: Arc::new(AtomicBool::new(false)),
            shutdown_tx,
            handles: Mutex::new(Vec::new()),
        }
    }

    pub fn queue(&self) -> &OrderQueue {
        &self.queue
    }

    pub fn throttle(&self) -> &Arc<Throttle> {
        &self.throttle
    }

    /// Start the worker pool and recovery scanner.
    pub async fn start(&self) {
        if self.queue.is_closed() {
            warn!("Accrual engine was stopped and cannot be restarted");
            return;
        }

        if self.running.swap(true, Ordering::SeqCst) {
            warn!("Accrual engine already running");
            return;
        }

        info!(
            "Starting accrual engine ({} workers, base url {})",
            self.config.worker_count, self.config.base_url
        );

        let mut handles = self.handles.lock().unwrap();

        for id in 0..self.config.worker_count {
            let worker = Worker {
                id,
                queue: self.queue.clone(),
                client: Arc::clone(&self.client),
                throttle: Arc::clone(&self.throttle),
                ledger: LedgerUpdater::new(Arc::clone(&self.store)),
            };
            handles.push(tokio::spawn(worker.run(self.shutdown_tx.subscribe())));
        }

        let scanner = RecoveryScanner::new(
            Arc::clone(&self.store),
            self.queue.clone(),
            Arc::clone(&self.throttle),
            self.config.recovery_interval(),
        );
        handles.push(tokio::spawn(scanner.run(self.shutdown_tx.subscribe())));

        info!("Accrual engine started");
    }

    /// Stop the engine, letting workers drain for [`DEFAULT_SHUTDOWN_GRACE`].
    pub async fn stop(&self) {
        self.stop_within(DEFAULT_SHUTDOWN_GRACE).await;
    }

    /// Stop the engine.
    ///
    /// Closes the queue so workers drain what is buffered, then cancels
    /// anything still running after `grace`. Orders left unprocessed stay
    /// NEW in the store and are picked up by recovery on the next start.
    pub async fn stop_within(&self, grace: Duration) {
        if !self.running.swap(false, Ordering::SeqCst) {
            warn!("Accrual engine not running");
            return;
        }

        info!("Stopping accrual engine");

        self.queue.close();

        let handles = std::mem::take(&mut *self.handles.lock().unwrap());
        let mut joined = join_all(handles);

        let results = match tokio::time::timeout(grace, &mut joined).await {
            Ok(results) => results,
            Err(_) => {
                warn!(
                    "Accrual workers still busy after {:?}, cancelling ({} orders left in queue)",
                    grace,
                    self.queue.len()
                );
                let _ = self.shutdown_tx.send(());
                joined.await
            }
        };

        for result in results {
            if let Err(e) = result {
                error!("Accrual task ended abnormally: {}", e);
            }
        }

        info!("Accrual engine stopped");
    }

    /// Queue an order for reconciliation, waiting for room if the queue is full.
    pub async fn submit(&self, item: OrderToAccrual) -> Result<(), EngineError> {
        self.queue.submit(item).await.map_err(|e| match e {
            QueueError::Closed => EngineError::Stopped,
            other => EngineError::Queue(other),
        })
    }

    /// Current runtime status.
    pub fn status(&self) -> EngineStatus {
        let remaining = self.throttle.remaining();

        EngineStatus {
            running: self.running.load(Ordering::Relaxed),
            workers: self.config.worker_count,
            queue_depth: self.queue.len(),
            throttled: remaining.is_some(),
            throttle_remaining_ms: remaining.map_or(0, |d| d.as_millis() as u64),
        }
    }
}
