//! Common test utilities for API testing with mocks.
//!
//! This module provides a test fixture that creates an in-process server
//! backed by a temporary SQLite file and a scriptable accrual service.

#![allow(dead_code)]

use std::sync::Arc;
use std::time::Duration;

use axum::body::Body;
use axum::http::{Request, StatusCode};
use axum::Router;
use http_body_util::BodyExt;
use serde_json::Value;
use tempfile::TempDir;
use tower::ServiceExt;

use loyalty_core::testing::MockAccrualClient;
use loyalty_core::{
    create_authenticator, AccrualEngine, AuthConfig, AuthMethod, Authenticator, Balance, Config,
    DatabaseConfig, OrderStore, ServerConfig, SqliteOrderStore,
};
use loyalty_server::state::AppState;

/// Re-export fixtures for test convenience
pub use loyalty_core::testing::fixtures;

/// Header carrying the caller's user id in tests.
pub const USER_HEADER: &str = "x-user-id";

/// Test fixture for API testing with a mock accrual service.
///
/// # Example
///
/// ```rust,ignore
/// #[tokio::test]
/// async fn test_upload() {
///     let fixture = TestFixture::new().await;
///
///     let response = fixture.upload_order("alice", "79927398713").await;
///     assert_eq!(response.status, StatusCode::ACCEPTED);
/// }
/// ```
pub struct TestFixture {
    /// The Axum router for testing
    pub router: Router,
    /// Order store shared with the router
    pub store: Arc<SqliteOrderStore>,
    /// Mock accrual service - configure quotes
    pub accrual: MockAccrualClient,
    /// Engine wired into the router
    pub engine: Arc<AccrualEngine>,
    /// Temporary directory for the test database
    pub temp_dir: TempDir,
}

/// Response from a test request
#[derive(Debug)]
pub struct TestResponse {
    pub status: StatusCode,
    pub body: Value,
}

/// Configuration for test fixture.
#[derive(Debug, Clone, Default)]
pub struct TestConfig {
    /// Start the worker pool and recovery scanner
    pub start_engine: bool,
    /// Attribute every request to the anonymous user
    pub anonymous: bool,
}

impl TestConfig {
    /// Create config with the accrual engine running.
    pub fn with_engine() -> Self {
        Self {
            start_engine: true,
            anonymous: false,
        }
    }
}

impl TestFixture {
    /// Create a new test fixture with header auth and a stopped engine.
    pub async fn new() -> Self {
        Self::with_config(TestConfig::default()).await
    }

    /// Create a test fixture with custom configuration.
    pub async fn with_config(test_config: TestConfig) -> Self {
        let temp_dir = TempDir::new().expect("Failed to create temp dir");
        let db_path = temp_dir.path().join("test.db");

        let config = Config {
            auth: AuthConfig {
                method: if test_config.anonymous {
                    AuthMethod::None
                } else {
                    AuthMethod::Header
                },
                user_header: USER_HEADER.to_string(),
            },
            server: ServerConfig {
                host: std::net::IpAddr::V4(std::net::Ipv4Addr::LOCALHOST),
                port: 0, // Not used for in-process testing
            },
            database: DatabaseConfig {
                path: db_path.clone(),
            },
            accrual: fixtures::accrual_config(),
        };

        let store =
            Arc::new(SqliteOrderStore::new(&db_path).expect("Failed to create order store"));
        let accrual = MockAccrualClient::new();
        let engine = Arc::new(AccrualEngine::new(
            config.accrual.clone(),
            Arc::clone(&store) as Arc<dyn OrderStore>,
            Arc::new(accrual.clone()),
        ));

        if test_config.start_engine {
            engine.start().await;
        }

        let authenticator: Arc<dyn Authenticator> = Arc::from(
            create_authenticator(&config.auth).expect("Failed to create authenticator"),
        );

        let state = Arc::new(AppState::new(
            config,
            authenticator,
            Arc::clone(&store) as Arc<dyn OrderStore>,
            Arc::clone(&engine),
        ));

        let router = loyalty_server::api::create_router(state);

        Self {
            router,
            store,
            accrual,
            engine,
            temp_dir,
        }
    }

    /// Send a GET request without credentials.
    pub async fn get(&self, path: &str) -> TestResponse {
        self.send(Request::builder().method("GET").uri(path), Body::empty())
            .await
    }

    /// Send a GET request as `user`.
    pub async fn get_as(&self, user: &str, path: &str) -> TestResponse {
        self.send(
            Request::builder()
                .method("GET")
                .uri(path)
                .header(USER_HEADER, user),
            Body::empty(),
        )
        .await
    }

    /// Upload an order number as `user`.
    pub async fn upload_order(&self, user: &str, number: &str) -> TestResponse {
        self.post_with_content_type(user, "/api/user/orders", number, "text/plain")
            .await
    }

    /// Send a POST request with JSON body as `user`.
    pub async fn post_json(&self, user: &str, path: &str, body: Value) -> TestResponse {
        self.post_with_content_type(
            user,
            path,
            &serde_json::to_string(&body).unwrap(),
            "application/json",
        )
        .await
    }

    /// Send a POST request with custom content type (for testing wrong content types).
    pub async fn post_with_content_type(
        &self,
        user: &str,
        path: &str,
        body: &str,
        content_type: &str,
    ) -> TestResponse {
        self.send(
            Request::builder()
                .method("POST")
                .uri(path)
                .header(USER_HEADER, user)
                .header("Content-Type", content_type),
            Body::from(body.to_string()),
        )
        .await
    }

    /// Current balance of `user` straight from the store.
    pub fn balance(&self, user: &str) -> Balance {
        self.store.get_balance(user).expect("Failed to read balance")
    }

    /// Poll until `user` has at least `current` points or the timeout passes.
    pub async fn wait_for_balance(&self, user: &str, current: f64, timeout: Duration) -> bool {
        let deadline = tokio::time::Instant::now() + timeout;
        while tokio::time::Instant::now() < deadline {
            if self.balance(user).current >= current {
                return true;
            }
            tokio::time::sleep(Duration::from_millis(20)).await;
        }
        false
    }

    async fn send(&self, builder: axum::http::request::Builder, body: Body) -> TestResponse {
        let request = builder.body(body).unwrap();

        let response = self
            .router
            .clone()
            .oneshot(request)
            .await
            .expect("Failed to send request");

        let status = response.status();
        let body_bytes = response
            .into_body()
            .collect()
            .await
            .expect("Failed to collect body")
            .to_bytes();

        let body: Value = if body_bytes.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(&body_bytes)
                .unwrap_or_else(|_| Value::String(String::from_utf8_lossy(&body_bytes).into()))
        };

        TestResponse { status, body }
    }
}

/// Helper to assert a response has expected status.
#[macro_export]
macro_rules! assert_status {
    ($response:expr, $status:expr) => {
        assert_eq!(
            $response.status, $status,
            "Expected status {:?}, got {:?}. Body: {}",
            $status,
            $response.status,
            serde_json::to_string_pretty(&$response.body).unwrap_or_default()
        );
    };
}
