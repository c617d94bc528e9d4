//! Accrual engine lifecycle integration tests.
//!
//! These tests drive orders through the full engine against a scripted
//! accrual service:
//! submit -> worker -> accrual client -> ledger -> store (and recovery)

use std::sync::Arc;
use std::time::{Duration, Instant};

use tempfile::TempDir;

use loyalty_core::{
    testing::{fixtures, MockAccrualClient, MockResponse},
    AccrualConfig, AccrualEngine, OrderStatus, OrderStore, OrderToAccrual, SqliteOrderStore,
};

/// Test helper to create all dependencies for engine testing.
struct TestHarness {
    store: Arc<SqliteOrderStore>,
    client: Arc<MockAccrualClient>,
    _temp_dir: TempDir,
}

impl TestHarness {
    fn new() -> Self {
        let temp_dir = TempDir::new().expect("Failed to create temp dir");
        let db_path = temp_dir.path().join("test.db");

        let store = Arc::new(SqliteOrderStore::new(&db_path).expect("Failed to create store"));
        let client = Arc::new(MockAccrualClient::new());

        Self {
            store,
            client,
            _temp_dir: temp_dir,
        }
    }

    fn create_engine(&self, config: AccrualConfig) -> AccrualEngine {
        AccrualEngine::new(
            config,
            Arc::clone(&self.store) as Arc<dyn OrderStore>,
            Arc::clone(&self.client) as Arc<dyn loyalty_core::AccrualClient>,
        )
    }

    /// Engine whose recovery scanner effectively never fires during a test.
    fn create_engine_without_recovery(&self) -> AccrualEngine {
        let mut config = fixtures::accrual_config();
        config.recovery_interval_ms = 60_000;
        self.create_engine(config)
    }

    fn upload(&self, owner: &str, number: &str) -> OrderToAccrual {
        let order = fixtures::order(owner, number);
        self.store.put_order(&order).expect("Failed to store order");
        OrderToAccrual::from(&order)
    }

    fn status_of(&self, number: &str) -> Option<OrderStatus> {
        self.store
            .get_order_by_number(number)
            .ok()
            .flatten()
            .map(|o| o.status)
    }

    fn balance_of(&self, owner: &str) -> f64 {
        self.store.get_balance(owner).expect("balance").current
    }

    async fn wait_for_status(
        &self,
        number: &str,
        expected: OrderStatus,
        timeout: Duration,
    ) -> bool {
        let start = Instant::now();
        while start.elapsed() < timeout {
            if self.status_of(number) == Some(expected) {
                return true;
            }
            tokio::time::sleep(Duration::from_millis(20)).await;
        }
        false
    }

    async fn wait_for_calls(&self, number: &str, count: usize, timeout: Duration) -> bool {
        let start = Instant::now();
        while start.elapsed() < timeout {
            if self.client.calls_for(number).await.len() >= count {
                return true;
            }
            tokio::time::sleep(Duration::from_millis(20)).await;
        }
        false
    }
}

// =============================================================================
// Reconciliation
// =============================================================================

#[tokio::test]
async fn test_processed_order_is_credited() {
    let harness = TestHarness::new();
    harness
        .client
        .set_quote(fixtures::processed("4677951650035254", 500.0))
        .await;

    let engine = harness.create_engine_without_recovery();
    engine.start().await;

    let item = harness.upload("u1", "4677951650035254");
    engine.submit(item).await.unwrap();

    assert!(
        harness
            .wait_for_status("4677951650035254", OrderStatus::Processed, Duration::from_secs(2))
            .await
    );
    assert_eq!(harness.balance_of("u1"), 500.0);

    let order = harness
        .store
        .get_order_by_number("4677951650035254")
        .unwrap()
        .unwrap();
    assert_eq!(order.accrual, Some(500.0));

    engine.stop().await;
}

#[tokio::test]
async fn test_duplicate_submissions_credit_once() {
    let harness = TestHarness::new();
    harness
        .client
        .set_quote(fixtures::processed("79927398713", 120.5))
        .await;

    // Slow answers keep both workers holding the same order at once.
    let delay = Duration::from_millis(200);
    harness.client.set_delay(delay).await;

    let engine = harness.create_engine_without_recovery();
    engine.start().await;

    let item = harness.upload("u1", "79927398713");
    for _ in 0..5 {
        engine.submit(item.clone()).await.unwrap();
    }

    assert!(harness.wait_for_calls("79927398713", 5, Duration::from_secs(3)).await);
    assert!(
        harness
            .wait_for_status("79927398713", OrderStatus::Processed, Duration::from_secs(2))
            .await
    );
    engine.stop().await;

    let calls = harness.client.calls_for("79927398713").await;
    assert!(
        calls[1].timestamp.duration_since(calls[0].timestamp) < delay,
        "second worker did not pick up the order while the first was in flight"
    );
    assert_eq!(harness.status_of("79927398713"), Some(OrderStatus::Processed));
    assert_eq!(harness.balance_of("u1"), 120.5);
}

#[tokio::test]
async fn test_processing_then_processed() {
    let harness = TestHarness::new();
    harness
        .client
        .push_response(
            "12345678903",
            MockResponse::Quote(fixtures::processing("12345678903")),
        )
        .await;
    harness
        .client
        .set_quote(fixtures::processed("12345678903", 42.0))
        .await;

    let engine = harness.create_engine(fixtures::accrual_config());
    engine.start().await;

    let item = harness.upload("u1", "12345678903");
    engine.submit(item).await.unwrap();

    // PROCESSING is non-terminal, so recovery re-queues it until PROCESSED.
    assert!(
        harness
            .wait_for_status("12345678903", OrderStatus::Processed, Duration::from_secs(2))
            .await
    );
    assert_eq!(harness.balance_of("u1"), 42.0);

    engine.stop().await;
}

#[tokio::test]
async fn test_invalid_order_is_never_credited() {
    let harness = TestHarness::new();
    harness
        .client
        .set_quote(fixtures::invalid("2377225624"))
        .await;

    let engine = harness.create_engine(fixtures::accrual_config());
    engine.start().await;

    let item = harness.upload("u1", "2377225624");
    engine.submit(item).await.unwrap();

    assert!(
        harness
            .wait_for_status("2377225624", OrderStatus::Invalid, Duration::from_secs(2))
            .await
    );

    // Terminal orders drop out of recovery.
    tokio::time::sleep(Duration::from_millis(150)).await;
    let calls_after_invalid = harness.client.calls_for("2377225624").await.len();
    tokio::time::sleep(Duration::from_millis(400)).await;
    assert_eq!(
        harness.client.calls_for("2377225624").await.len(),
        calls_after_invalid
    );
    assert_eq!(harness.balance_of("u1"), 0.0);

    engine.stop().await;
}

// =============================================================================
// Pending remote state
// =============================================================================

#[tokio::test]
async fn test_not_yet_known_stays_new_and_is_redelivered() {
    let harness = TestHarness::new();

    let engine = harness.create_engine(fixtures::accrual_config());
    engine.start().await;

    let item = harness.upload("u1", "9278923470");
    engine.submit(item).await.unwrap();

    // Initial submission plus at least one recovery pass.
    assert!(harness.wait_for_calls("9278923470", 2, Duration::from_secs(2)).await);
    assert_eq!(harness.status_of("9278923470"), Some(OrderStatus::New));
    assert_eq!(harness.balance_of("u1"), 0.0);

    // Once the service knows the order, the next pass finishes it.
    harness
        .client
        .set_quote(fixtures::processed("9278923470", 7.0))
        .await;
    assert!(
        harness
            .wait_for_status("9278923470", OrderStatus::Processed, Duration::from_secs(2))
            .await
    );
    assert_eq!(harness.balance_of("u1"), 7.0);

    engine.stop().await;
}

#[tokio::test]
async fn test_registered_is_not_terminal() {
    let harness = TestHarness::new();
    harness
        .client
        .set_quote(fixtures::registered("346436439"))
        .await;

    let engine = harness.create_engine(fixtures::accrual_config());
    engine.start().await;

    let item = harness.upload("u1", "346436439");
    engine.submit(item).await.unwrap();

    assert!(harness.wait_for_calls("346436439", 3, Duration::from_secs(2)).await);
    assert_eq!(harness.status_of("346436439"), Some(OrderStatus::New));

    engine.stop().await;
}

// =============================================================================
// Rate limiting
// =============================================================================

#[tokio::test]
async fn test_rate_limit_pauses_whole_pool() {
    let harness = TestHarness::new();
    harness
        .client
        .push_response("4677951650035254", MockResponse::RateLimited(None))
        .await;
    harness
        .client
        .set_quote(fixtures::processed("4677951650035254", 500.0))
        .await;
    harness
        .client
        .set_quote(fixtures::processed("79927398713", 10.0))
        .await;

    let mut config = fixtures::accrual_config();
    config.worker_count = 3;
    config.recovery_interval_ms = 60_000;
    let throttle_sleep = config.throttle_sleep();
    let engine = harness.create_engine(config);
    engine.start().await;

    let first = harness.upload("u1", "4677951650035254");
    engine.submit(first).await.unwrap();
    assert!(harness.wait_for_calls("4677951650035254", 1, Duration::from_secs(2)).await);

    let rate_limited_at = harness.client.recorded_calls().await[0].timestamp;
    let start = Instant::now();
    while !engine.status().throttled && start.elapsed() < Duration::from_secs(1) {
        tokio::time::sleep(Duration::from_millis(5)).await;
    }
    assert!(engine.status().throttled);
    assert_eq!(harness.balance_of("u1"), 0.0);

    // Another worker picks this up but must wait out the cooldown too.
    let second = harness.upload("u1", "79927398713");
    engine.submit(second).await.unwrap();
    engine
        .submit(OrderToAccrual::new("4677951650035254", "u1"))
        .await
        .unwrap();

    assert!(
        harness
            .wait_for_status("79927398713", OrderStatus::Processed, Duration::from_secs(2))
            .await
    );
    assert!(
        harness
            .wait_for_status("4677951650035254", OrderStatus::Processed, Duration::from_secs(2))
            .await
    );

    let calls = harness.client.recorded_calls().await;
    assert!(calls.len() >= 3);
    for call in &calls[1..] {
        assert!(
            call.timestamp.duration_since(rate_limited_at) >= throttle_sleep,
            "call for {} happened during cooldown",
            call.order_number
        );
    }
    assert_eq!(harness.balance_of("u1"), 510.0);

    engine.stop().await;
}

// =============================================================================
// Recovery
// =============================================================================

#[tokio::test]
async fn test_recovery_picks_up_orders_left_new() {
    let harness = TestHarness::new();
    harness
        .client
        .set_quote(fixtures::processed("4677951650035254", 500.0))
        .await;

    // Uploaded before a crash: persisted but never submitted.
    harness.upload("u1", "4677951650035254");

    let engine = harness.create_engine(fixtures::accrual_config());
    engine.start().await;

    assert!(
        harness
            .wait_for_status("4677951650035254", OrderStatus::Processed, Duration::from_secs(2))
            .await
    );
    assert_eq!(harness.balance_of("u1"), 500.0);

    engine.stop().await;
}

#[tokio::test]
async fn test_transient_failure_is_retried_by_recovery() {
    let harness = TestHarness::new();
    harness
        .client
        .push_response("12345678903", MockResponse::UnexpectedStatus(500))
        .await;
    harness
        .client
        .push_response("12345678903", MockResponse::Timeout)
        .await;
    harness
        .client
        .set_quote(fixtures::processed("12345678903", 25.0))
        .await;

    let engine = harness.create_engine(fixtures::accrual_config());
    engine.start().await;

    let item = harness.upload("u2", "12345678903");
    engine.submit(item).await.unwrap();

    assert!(
        harness
            .wait_for_status("12345678903", OrderStatus::Processed, Duration::from_secs(2))
            .await
    );
    assert!(harness.client.calls_for("12345678903").await.len() >= 3);
    assert_eq!(harness.balance_of("u2"), 25.0);

    engine.stop().await;
}

#[tokio::test]
async fn test_many_orders_across_owners() {
    let harness = TestHarness::new();
    let owners = ["u1", "u2", "u3"];

    for (i, number) in fixtures::VALID_ORDER_NUMBERS.iter().enumerate() {
        harness
            .client
            .set_quote(fixtures::processed(number, (i + 1) as f64))
            .await;
    }

    let engine = harness.create_engine(fixtures::accrual_config());
    engine.start().await;

    for (i, number) in fixtures::VALID_ORDER_NUMBERS.iter().enumerate() {
        let item = harness.upload(owners[i % owners.len()], number);
        engine.submit(item).await.unwrap();
    }

    for number in fixtures::VALID_ORDER_NUMBERS {
        assert!(
            harness
                .wait_for_status(number, OrderStatus::Processed, Duration::from_secs(2))
                .await
        );
    }

    // u1: orders 1 and 4, u2: 2 and 5, u3: 3 and 6
    assert_eq!(harness.balance_of("u1"), 5.0);
    assert_eq!(harness.balance_of("u2"), 7.0);
    assert_eq!(harness.balance_of("u3"), 9.0);

    engine.stop().await;
}

// =============================================================================
// Shutdown
// =============================================================================

#[tokio::test]
async fn test_stop_cancels_workers_stuck_in_cooldown() {
    let harness = TestHarness::new();
    harness
        .client
        .set_rate_limited("79927398713", Some(Duration::from_secs(30)))
        .await;

    let engine = harness.create_engine_without_recovery();
    engine.start().await;

    let item = harness.upload("u1", "79927398713");
    engine.submit(item.clone()).await.unwrap();
    engine.submit(item).await.unwrap();

    assert!(harness.wait_for_calls("79927398713", 1, Duration::from_secs(2)).await);

    let start = Instant::now();
    engine.stop_within(Duration::from_millis(200)).await;
    assert!(start.elapsed() < Duration::from_secs(2));

    assert!(!engine.status().running);
    assert_eq!(harness.status_of("79927398713"), Some(OrderStatus::New));
}
