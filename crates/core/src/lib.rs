pub mod accrual;
pub mod auth;
pub mod config;
pub mod metrics;
pub mod order;
pub mod testing;

pub use accrual::{
    AccrualClient, AccrualConfig, AccrualEngine, AccrualError, AccrualQuote, AccrualStatus,
    EngineError, EngineStatus, HttpAccrualClient, LedgerUpdater, OrderQueue, QueryOutcome,
    QueueError, RecoveryScanner, ScanReport, Throttle,
};
pub use auth::{
    create_authenticator, AuthError, AuthRequest, Authenticator, HeaderAuthenticator, Identity,
    NoneAuthenticator,
};
pub use config::{
    load_config, load_config_from_str, validate_config, AuthConfig, AuthMethod, Config,
    ConfigError, DatabaseConfig, SanitizedConfig, ServerConfig,
};
pub use order::{
    is_valid_order_number, Balance, Order, OrderStatus, OrderStore, OrderToAccrual,
    SqliteOrderStore, StoreError, Transition, Withdrawal,
};
