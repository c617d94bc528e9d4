//! Types for the accrual engine.

use std::time::Duration;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::order::OrderStatus;

/// Status of an order as reported by the accrual service.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum AccrualStatus {
    /// Known to the service but not yet looked at.
    Registered,
    Processing,
    Invalid,
    Processed,
}

impl AccrualStatus {
    /// Local status this remote status moves an order to.
    ///
    /// `Registered` maps to nothing: the order stays where it is.
    pub fn to_order_status(self) -> Option<OrderStatus> {
        match self {
            AccrualStatus::Registered => None,
            AccrualStatus::Processing => Some(OrderStatus::Processing),
            AccrualStatus::Invalid => Some(OrderStatus::Invalid),
            AccrualStatus::Processed => Some(OrderStatus::Processed),
        }
    }
}

/// Accrual service answer for one order.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AccrualQuote {
    pub order: String,
    pub status: AccrualStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub accrual: Option<f64>,
}

impl AccrualQuote {
    pub fn new(order: impl Into<String>, status: AccrualStatus, accrual: Option<f64>) -> Self {
        Self {
            order: order.into(),
            status,
            accrual,
        }
    }
}

/// Successful outcome of an accrual query.
#[derive(Debug, Clone, PartialEq)]
pub enum QueryOutcome {
    /// The service returned a status for the order.
    Quote(AccrualQuote),
    /// The service does not know the order yet (HTTP 204).
    NotYetKnown,
}

/// Errors returned by an accrual client.
#[derive(Debug, Error)]
pub enum AccrualError {
    /// The service asked us to slow down (HTTP 429).
    #[error("rate limited by accrual service")]
    RateLimited { retry_after: Option<Duration> },

    /// Any status other than 200, 204 or 429.
    #[error("unexpected status from accrual service: {status} - {message}")]
    UnexpectedStatus { status: u16, message: String },

    /// Request timed out.
    #[error("accrual request timed out")]
    Timeout,

    /// Could not connect to the service.
    #[error("connection to accrual service failed: {0}")]
    Connection(String),

    /// Body could not be decoded into a quote.
    #[error("failed to decode accrual response: {0}")]
    Decode(String),

    /// HTTP client error (builder, redirect, body read).
    #[error("accrual client error: {0}")]
    Client(String),
}

impl AccrualError {
    /// Short label used for metrics and logs.
    pub fn kind(&self) -> &'static str {
        match self {
            AccrualError::RateLimited { .. } => "rate_limited",
            AccrualError::UnexpectedStatus { .. } => "unexpected_status",
            AccrualError::Timeout => "timeout",
            AccrualError::Connection(_) => "connection",
            AccrualError::Decode(_) => "decode",
            AccrualError::Client(_) => "client",
        }
    }
}

/// Errors surfaced by the engine to its callers.
#[derive(Debug, Error)]
pub enum EngineError {
    /// The engine was stopped and accepts no more orders.
    #[error("accrual engine is stopped")]
    Stopped,

    /// Queue error.
    #[error("order queue error: {0}")]
    Queue(#[from] super::QueueError),
}

/// Snapshot of the engine's runtime state.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct EngineStatus {
    /// Whether workers and the recovery scanner are running.
    pub running: bool,
    /// Configured number of workers.
    pub workers: usize,
    /// Items waiting in the order queue.
    pub queue_depth: usize,
    /// Whether a rate-limit cooldown is in effect.
    pub throttled: bool,
    /// Milliseconds left in the current cooldown (0 if none).
    pub throttle_remaining_ms: u64,
}
