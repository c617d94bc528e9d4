//! Accrual reconciliation engine.
//!
//! Orders flow from intake (and the recovery scanner) through a bounded
//! queue to a fixed pool of workers:
//! - **Client**: asks the external accrual service about one order
//! - **Throttle**: shared cooldown raised on HTTP 429, obeyed before every call
//! - **Ledger**: writes the remote status and credits the balance exactly once
//! - **Recovery**: periodically re-queues orders still NEW or PROCESSING

mod client;
mod config;
mod engine;
mod ledger;
mod queue;
mod recovery;
mod throttle;
mod types;
mod worker;

pub use client::{AccrualClient, HttpAccrualClient};
pub use config::AccrualConfig;
pub use engine::{AccrualEngine, DEFAULT_SHUTDOWN_GRACE};
pub use ledger::LedgerUpdater;
pub use queue::{OrderQueue, QueueError};
pub use recovery::{RecoveryScanner, ScanReport};
pub use throttle::Throttle;
pub use types::{
    AccrualError, AccrualQuote, AccrualStatus, EngineError, EngineStatus, QueryOutcome,
};
pub use worker::ProcessOutcome;
