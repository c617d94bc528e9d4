//! Prometheus metrics for core components.
//!
//! This module provides metrics for:
//! - Accrual service calls (outcome, latency)
//! - Ledger (transitions, credited points, failures)
//! - Engine plumbing (throttle, recovery, queue depth)

use once_cell::sync::Lazy;
use prometheus::{Counter, Histogram, HistogramOpts, IntCounter, IntCounterVec, IntGauge, Opts};

// =============================================================================
// Accrual Service Metrics
// =============================================================================

/// Accrual requests total by outcome.
pub static ACCRUAL_REQUESTS: Lazy<IntCounterVec> = Lazy::new(|| {
    IntCounterVec::new(
        Opts::new(
            "loyalty_accrual_requests_total",
            "Total requests to the accrual service",
        ),
        &["outcome"], // "quote", "not_yet_known", "rate_limited", "timeout", ...
    )
    .unwrap()
});

/// Accrual request duration in seconds.
pub static ACCRUAL_REQUEST_DURATION: Lazy<Histogram> = Lazy::new(|| {
    Histogram::with_opts(
        HistogramOpts::new(
            "loyalty_accrual_request_duration_seconds",
            "Duration of accrual service requests",
        )
        .buckets(vec![0.01, 0.05, 0.1, 0.25, 0.5, 1.0, 2.5, 5.0, 10.0]),
    )
    .unwrap()
});

// =============================================================================
// Ledger Metrics
// =============================================================================

/// Order status transitions applied by the ledger.
pub static ORDER_TRANSITIONS: Lazy<IntCounterVec> = Lazy::new(|| {
    IntCounterVec::new(
        Opts::new(
            "loyalty_order_transitions_total",
            "Total order status transitions",
        ),
        &["status"], // "PROCESSING", "INVALID", "PROCESSED"
    )
    .unwrap()
});

/// Points credited to balances.
pub static POINTS_CREDITED: Lazy<Counter> = Lazy::new(|| {
    Counter::new(
        "loyalty_points_credited_total",
        "Total accrual points credited to balances",
    )
    .unwrap()
});

/// Ledger writes that failed and were left for recovery.
pub static LEDGER_FAILURES: Lazy<IntCounter> = Lazy::new(|| {
    IntCounter::new(
        "loyalty_ledger_failures_total",
        "Total failed ledger updates",
    )
    .unwrap()
});

// =============================================================================
// Engine Metrics
// =============================================================================

/// Rate-limit cooldowns started.
pub static THROTTLE_ACTIVATIONS: Lazy<IntCounter> = Lazy::new(|| {
    IntCounter::new(
        "loyalty_throttle_activations_total",
        "Total rate-limit cooldowns started",
    )
    .unwrap()
});

/// Orders re-queued by the recovery scanner.
pub static RECOVERY_ENQUEUED: Lazy<IntCounter> = Lazy::new(|| {
    IntCounter::new(
        "loyalty_recovery_enqueued_total",
        "Total unresolved orders re-queued by recovery",
    )
    .unwrap()
});

/// Orders recovery could not queue because the queue was full.
pub static RECOVERY_DROPPED: Lazy<IntCounter> = Lazy::new(|| {
    IntCounter::new(
        "loyalty_recovery_dropped_total",
        "Total unresolved orders skipped by recovery because the queue was full",
    )
    .unwrap()
});

/// Items waiting in the order queue.
pub static QUEUE_DEPTH: Lazy<IntGauge> = Lazy::new(|| {
    IntGauge::new("loyalty_queue_depth", "Orders waiting in the accrual queue").unwrap()
});

// =============================================================================
// Helper functions
// =============================================================================

/// Get all core metrics for registration in a registry.
pub fn all_metrics() -> Vec<Box<dyn prometheus::core::Collector>> {
    vec![
        // Accrual service
        Box::new(ACCRUAL_REQUESTS.clone()),
        Box::new(ACCRUAL_REQUEST_DURATION.clone()),
        // Ledger
        Box::new(ORDER_TRANSITIONS.clone()),
        Box::new(POINTS_CREDITED.clone()),
        Box::new(LEDGER_FAILURES.clone()),
        // Engine
        Box::new(THROTTLE_ACTIVATIONS.clone()),
        Box::new(RECOVERY_ENQUEUED.clone()),
        Box::new(RECOVERY_DROPPED.clone()),
        Box::new(QUEUE_DEPTH.clone()),
    ]
}
