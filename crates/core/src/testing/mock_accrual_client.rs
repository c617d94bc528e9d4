//! Mock accrual client for testing.

use async_trait::async_trait;
use std::collections::{HashMap, VecDeque};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::RwLock;

use crate::accrual::{AccrualClient, AccrualError, AccrualQuote, QueryOutcome};

/// Scripted answer of the mock accrual service.
#[derive(Debug, Clone, PartialEq)]
pub enum MockResponse {
    /// HTTP 200 with this quote.
    Quote(AccrualQuote),
    /// HTTP 204.
    NotYetKnown,
    /// HTTP 429, optionally with a `Retry-After` hint.
    RateLimited(Option<Duration>),
    /// Any other HTTP status.
    UnexpectedStatus(u16),
    /// Request timed out.
    Timeout,
}

impl MockResponse {
    fn into_result(self) -> Result<QueryOutcome, AccrualError> {
        match self {
            MockResponse::Quote(quote) => Ok(QueryOutcome::Quote(quote)),
            MockResponse::NotYetKnown => Ok(QueryOutcome::NotYetKnown),
            MockResponse::RateLimited(retry_after) => {
                Err(AccrualError::RateLimited { retry_after })
            }
            MockResponse::UnexpectedStatus(status) => Err(AccrualError::UnexpectedStatus {
                status,
                message: "mock failure".to_string(),
            }),
            MockResponse::Timeout => Err(AccrualError::Timeout),
        }
    }
}

/// A recorded query for test assertions.
#[derive(Debug, Clone)]
pub struct RecordedQuery {
    /// The order number that was queried.
    pub order_number: String,
    /// When the query was issued.
    pub timestamp: Instant,
}

/// Mock implementation of the AccrualClient trait.
///
/// Provides controllable behavior for testing:
/// - Standing responses per order number
/// - One-shot responses consumed before the standing one
/// - Call recording with timestamps
/// - Simulated latency
///
/// Orders without a configured response answer `NotYetKnown`.
///
/// # Example
///
/// ```rust,ignore
/// use loyalty_core::testing::{fixtures, MockAccrualClient, MockResponse};
///
/// let client = MockAccrualClient::new();
///
/// // First call is rate limited, later calls see the processed quote
/// client.push_response("4677951650035254", MockResponse::RateLimited(None)).await;
/// client.set_quote(fixtures::processed("4677951650035254", 500.0)).await;
///
/// // Check what was queried
/// let calls = client.recorded_calls().await;
/// ```
#[derive(Debug, Clone)]
pub struct MockAccrualClient {
    /// Standing responses by order number.
    responses: Arc<RwLock<HashMap<String, MockResponse>>>,
    /// One-shot responses by order number.
    scripted: Arc<RwLock<HashMap<String, VecDeque<MockResponse>>>>,
    /// Response for orders with nothing configured.
    default_response: Arc<RwLock<MockResponse>>,
    /// Recorded queries.
    calls: Arc<RwLock<Vec<RecordedQuery>>>,
    /// Simulated latency per call.
    delay: Arc<RwLock<Option<Duration>>>,
}

impl Default for MockAccrualClient {
    fn default() -> Self {
        Self::new()
    }
}

impl MockAccrualClient {
    /// Create a new mock client that answers `NotYetKnown` for everything.
    pub fn new() -> Self {
        Self {
            responses: Arc::new(RwLock::new(HashMap::new())),
            scripted: Arc::new(RwLock::new(HashMap::new())),
            default_response: Arc::new(RwLock::new(MockResponse::NotYetKnown)),
            calls: Arc::new(RwLock::new(Vec::new())),
            delay: Arc::new(RwLock::new(None)),
        }
    }

    /// Answer every query for `quote.order` with `quote`.
    pub async fn set_quote(&self, quote: AccrualQuote) {
        let order = quote.order.clone();
        self.set_response(&order, MockResponse::Quote(quote)).await;
    }

    /// Set the standing response for an order.
    pub async fn set_response(&self, order_number: &str, response: MockResponse) {
        self.responses
            .write()
            .await
            .insert(order_number.to_string(), response);
    }

    /// Answer every query for an order with HTTP 429.
    pub async fn set_rate_limited(&self, order_number: &str, retry_after: Option<Duration>) {
        self.set_response(order_number, MockResponse::RateLimited(retry_after))
            .await;
    }

    /// Queue a one-shot response, used before the standing response.
    pub async fn push_response(&self, order_number: &str, response: MockResponse) {
        self.scripted
            .write()
            .await
            .entry(order_number.to_string())
            .or_default()
            .push_back(response);
    }

    /// Response for orders with nothing configured.
    pub async fn set_default_response(&self, response: MockResponse) {
        *self.default_response.write().await = response;
    }

    /// Delay every answer by `delay`.
    pub async fn set_delay(&self, delay: Duration) {
        *self.delay.write().await = Some(delay);
    }

    /// Get recorded queries.
    pub async fn recorded_calls(&self) -> Vec<RecordedQuery> {
        self.calls.read().await.clone()
    }

    /// Recorded queries for one order.
    pub async fn calls_for(&self, order_number: &str) -> Vec<RecordedQuery> {
        self.calls
            .read()
            .await
            .iter()
            .filter(|call| call.order_number == order_number)
            .cloned()
            .collect()
    }

    /// Total number of queries made.
    pub async fn call_count(&self) -> usize {
        self.calls.read().await.len()
    }

    async fn next_response(&self, order_number: &str) -> MockResponse {
        if let Some(queue) = self.scripted.write().await.get_mut(order_number) {
            if let Some(response) = queue.pop_front() {
                return response;
            }
        }

        if let Some(response) = self.responses.read().await.get(order_number) {
            return response.clone();
        }

        self.default_response.read().await.clone()
    }
}

#[async_trait]
impl AccrualClient for MockAccrualClient {
    async fn query(&self, order_number: &str) -> Result<QueryOutcome, AccrualError> {
        self.calls.write().await.push(RecordedQuery {
            order_number: order_number.to_string(),
            timestamp: Instant::now(),
        });

        let delay = *self.delay.read().await;
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }

        self.next_response(order_number).await.into_result()
    }
}
