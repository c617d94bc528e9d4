//! Testing utilities and mock implementations.
//!
//! This module provides a scriptable accrual service and fixtures, allowing
//! the engine and the HTTP API to be tested without a real accrual backend.
//!
//! # Example
//!
//! ```rust,ignore
//! use loyalty_core::testing::{fixtures, MockAccrualClient};
//!
//! let client = MockAccrualClient::new();
//! client.set_quote(fixtures::processed("4677951650035254", 500.0)).await;
//!
//! // Use in AccrualEngine::new(...)
//! ```

mod mock_accrual_client;

pub use mock_accrual_client::{MockAccrualClient, MockResponse, RecordedQuery};

/// Test fixtures and helper functions.
pub mod fixtures {
    use crate::accrual::{AccrualConfig, AccrualQuote, AccrualStatus};
    use crate::order::Order;

    /// Order numbers passing the Luhn check.
    pub const VALID_ORDER_NUMBERS: [&str; 6] = [
        "79927398713",
        "4677951650035254",
        "12345678903",
        "2377225624",
        "9278923470",
        "346436439",
    ];

    /// Order numbers failing the Luhn check.
    pub const INVALID_ORDER_NUMBERS: [&str; 2] = ["79927398710", "4677951650035255"];

    /// A freshly uploaded order.
    pub fn order(owner_id: &str, number: &str) -> Order {
        Order::new(owner_id, number)
    }

    /// A PROCESSED quote worth `accrual` points.
    pub fn processed(number: &str, accrual: f64) -> AccrualQuote {
        AccrualQuote::new(number, AccrualStatus::Processed, Some(accrual))
    }

    /// A PROCESSING quote.
    pub fn processing(number: &str) -> AccrualQuote {
        AccrualQuote::new(number, AccrualStatus::Processing, None)
    }

    /// A REGISTERED quote.
    pub fn registered(number: &str) -> AccrualQuote {
        AccrualQuote::new(number, AccrualStatus::Registered, None)
    }

    /// An INVALID quote.
    pub fn invalid(number: &str) -> AccrualQuote {
        AccrualQuote::new(number, AccrualStatus::Invalid, None)
    }

    /// Engine settings with short intervals for tests.
    pub fn accrual_config() -> AccrualConfig {
        AccrualConfig {
            base_url: "http://accrual.test".to_string(),
            request_timeout_secs: 1,
            worker_count: 2,
            throttle_sleep_ms: 300,
            recovery_interval_ms: 100,
            queue_capacity: 64,
        }
    }
}
