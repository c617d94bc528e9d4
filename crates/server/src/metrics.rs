//! Prometheus metrics for observability.
//!
//! This module provides metrics for monitoring the loyalty server:
//! - HTTP request metrics (latency, counts, auth failures)
//! - Accrual engine status (collected dynamically)
//! - Everything exported by `loyalty_core::metrics`

use once_cell::sync::Lazy;
use prometheus::{
    self, Encoder, HistogramOpts, HistogramVec, IntCounterVec, IntGauge, Opts, Registry,
    TextEncoder,
};
use regex_lite::Regex;

/// Global metrics registry.
pub static REGISTRY: Lazy<Registry> = Lazy::new(|| {
    let registry = Registry::new();
    register_metrics(&registry);
    registry
});

// =============================================================================
// HTTP Request Metrics
// =============================================================================

/// HTTP request duration in seconds.
pub static HTTP_REQUEST_DURATION: Lazy<HistogramVec> = Lazy::new(|| {
    HistogramVec::new(
        HistogramOpts::new(
            "loyalty_http_request_duration_seconds",
            "HTTP request duration in seconds",
        )
        .buckets(vec![
            0.001, 0.005, 0.01, 0.025, 0.05, 0.1, 0.25, 0.5, 1.0, 2.5, 5.0, 10.0,
        ]),
        &["method", "path", "status"],
    )
    .unwrap()
});

/// HTTP requests total count.
pub static HTTP_REQUESTS_TOTAL: Lazy<IntCounterVec> = Lazy::new(|| {
    IntCounterVec::new(
        Opts::new("loyalty_http_requests_total", "Total HTTP requests"),
        &["method", "path", "status"],
    )
    .unwrap()
});

/// HTTP requests currently in flight.
pub static HTTP_REQUESTS_IN_FLIGHT: Lazy<IntGauge> = Lazy::new(|| {
    IntGauge::new(
        "loyalty_http_requests_in_flight",
        "Number of HTTP requests currently being processed",
    )
    .unwrap()
});

/// Authentication failures.
pub static AUTH_FAILURES_TOTAL: Lazy<IntCounterVec> = Lazy::new(|| {
    IntCounterVec::new(
        Opts::new(
            "loyalty_auth_failures_total",
            "Total authentication failures",
        ),
        &["reason"],
    )
    .unwrap()
});

/// Orders accepted by the intake endpoint.
pub static ORDERS_UPLOADED_TOTAL: Lazy<IntCounterVec> = Lazy::new(|| {
    IntCounterVec::new(
        Opts::new("loyalty_orders_uploaded_total", "Order uploads by result"),
        &["result"], // "accepted", "already_uploaded", "conflict", "invalid_number"
    )
    .unwrap()
});

// =============================================================================
// Engine Metrics (collected dynamically)
// =============================================================================

/// Engine running state (1 = running, 0 = stopped).
pub static ENGINE_RUNNING: Lazy<IntGauge> = Lazy::new(|| {
    IntGauge::new(
        "loyalty_accrual_engine_running",
        "Whether the accrual engine is running (1) or stopped (0)",
    )
    .unwrap()
});

/// Milliseconds left on the shared cooldown.
pub static THROTTLE_REMAINING_MS: Lazy<IntGauge> = Lazy::new(|| {
    IntGauge::new(
        "loyalty_accrual_throttle_remaining_ms",
        "Milliseconds until accrual requests resume (0 when not throttled)",
    )
    .unwrap()
});

// =============================================================================
// Registration
// =============================================================================

fn register_metrics(registry: &Registry) {
    // HTTP
    registry
        .register(Box::new(HTTP_REQUEST_DURATION.clone()))
        .unwrap();
    registry
        .register(Box::new(HTTP_REQUESTS_TOTAL.clone()))
        .unwrap();
    registry
        .register(Box::new(HTTP_REQUESTS_IN_FLIGHT.clone()))
        .unwrap();
    registry
        .register(Box::new(AUTH_FAILURES_TOTAL.clone()))
        .unwrap();
    registry
        .register(Box::new(ORDERS_UPLOADED_TOTAL.clone()))
        .unwrap();

    // Engine
    registry
        .register(Box::new(ENGINE_RUNNING.clone()))
        .unwrap();
    registry
        .register(Box::new(THROTTLE_REMAINING_MS.clone()))
        .unwrap();

    // Core metrics (accrual client, ledger, queue, recovery)
    for metric in loyalty_core::metrics::all_metrics() {
        registry.register(metric).unwrap();
    }
}

/// Encode all metrics as Prometheus text format.
pub fn encode_metrics() -> String {
    let encoder = TextEncoder::new();
    let metric_families = REGISTRY.gather();
    let mut buffer = Vec::new();
    encoder.encode(&metric_families, &mut buffer).unwrap();
    String::from_utf8(buffer).unwrap()
}

/// Refresh gauges that mirror the engine state right before a scrape.
pub fn collect_dynamic_metrics(state: &crate::state::AppState) {
    let status = state.engine().status();
    ENGINE_RUNNING.set(if status.running { 1 } else { 0 });
    THROTTLE_REMAINING_MS.set(status.throttle_remaining_ms as i64);
}

static NUMERIC_SEGMENT: Lazy<Regex> = Lazy::new(|| Regex::new(r"/\d+(/|$)").unwrap());

/// Normalize a path for metric labels (replace numeric segments with a placeholder).
pub fn normalize_path(path: &str) -> String {
    // Run twice: adjacent numeric segments share the separating slash.
    let once = NUMERIC_SEGMENT.replace_all(path, "/{id}$1");
    NUMERIC_SEGMENT.replace_all(&once, "/{id}$1").to_string()
}
