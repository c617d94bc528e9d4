//! Bounded multi-producer, multi-consumer order queue.

use std::sync::Arc;

use thiserror::Error;
use tokio::sync::mpsc::{self, error::TrySendError};
use tokio::sync::{watch, Mutex};

use crate::metrics;
use crate::order::OrderToAccrual;

/// Errors returned when enqueueing work.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum QueueError {
    /// No free slot; only returned by the non-blocking path.
    #[error("order queue is full")]
    Full,

    /// The queue was closed for shutdown.
    #[error("order queue is closed")]
    Closed,
}

/// Queue handing orders from intake and recovery to the worker pool.
///
/// Clones share the same channel. Closing it stops new submissions while
/// consumers keep draining what is already buffered.
#[derive(Clone)]
pub struct OrderQueue {
    tx: mpsc::Sender<OrderToAccrual>,
    rx: Arc<Mutex<mpsc::Receiver<OrderToAccrual>>>,
    closed: Arc<watch::Sender<bool>>,
}

impl std::fmt::Debug for OrderQueue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OrderQueue")
            .field("len", &self.len())
            .field("capacity", &self.tx.max_capacity())
            .field("closed", &self.is_closed())
            .finish()
    }
}

impl OrderQueue {
    /// Create a queue holding at most `capacity` items.
    pub fn new(capacity: usize) -> Self {
        let (tx, rx) = mpsc::channel(capacity);
        let (closed, _) = watch::channel(false);

        Self {
            tx,
            rx: Arc::new(Mutex::new(rx)),
            closed: Arc::new(closed),
        }
    }

    /// Enqueue, waiting for a free slot.
    pub async fn submit(&self, item: OrderToAccrual) -> Result<(), QueueError> {
        if self.is_closed() {
            return Err(QueueError::Closed);
        }

        self.tx.send(item).await.map_err(|_| QueueError::Closed)?;
        metrics::QUEUE_DEPTH.set(self.len() as i64);
        Ok(())
    }

    /// Enqueue without waiting.
    pub fn try_submit(&self, item: OrderToAccrual) -> Result<(), QueueError> {
        if self.is_closed() {
            return Err(QueueError::Closed);
        }

        match self.tx.try_send(item) {
            Ok(()) => {
                metrics::QUEUE_DEPTH.set(self.len() as i64);
                Ok(())
            }
            Err(TrySendError::Full(_)) => Err(QueueError::Full),
            Err(TrySendError::Closed(_)) => Err(QueueError::Closed),
        }
    }

    /// Take the next item.
    ///
    /// Returns `None` once the queue is closed and fully drained.
    pub async fn recv(&self) -> Option<OrderToAccrual> {
        let mut closed = self.closed.subscribe();
        let mut rx = self.rx.lock().await;

        let item = tokio::select! {
            biased;
            item = rx.recv() => item,
            _ = closed.wait_for(|closed| *closed) => {
                rx.close();
                rx.try_recv().ok()
            }
        };

        metrics::QUEUE_DEPTH.set(self.len() as i64);
        item
    }

    /// Stop accepting new items. Buffered items stay available to [`recv`](Self::recv).
    pub fn close(&self) {
        self.closed.send_replace(true);
    }

    pub fn is_closed(&self) -> bool {
        *self.closed.borrow()
    }

    /// Resolves once [`close`](Self::close) has been called.
    pub async fn closed(&self) {
        let mut closed = self.closed.subscribe();
        let _ = closed.wait_for(|closed| *closed).await;
    }

    /// Number of buffered items.
    pub fn len(&self) -> usize {
        self.tx.max_capacity() - self.tx.capacity()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
