//! Order repository trait and error type.

use thiserror::Error;

use super::{Balance, Order, OrderStatus, Transition, Withdrawal};

/// Error type for order repository operations.
#[derive(Debug, Error)]
pub enum StoreError {
    /// Order not found.
    #[error("Order not found: {0}")]
    NotFound(String),

    /// An order with this number already exists.
    #[error("Order already exists: {0}")]
    Duplicate(String),

    /// Withdrawal larger than the available balance.
    #[error("Insufficient funds: requested {requested}, available {available}")]
    InsufficientFunds { requested: f64, available: f64 },

    /// Database error.
    #[error("Database error: {0}")]
    Database(String),
}

impl From<rusqlite::Error> for StoreError {
    fn from(e: rusqlite::Error) -> Self {
        StoreError::Database(e.to_string())
    }
}

/// Persistence contract shared by order intake, the balance API and the
/// accrual engine.
pub trait OrderStore: Send + Sync {
    /// Insert a new order. Fails with [`StoreError::Duplicate`] if the number is taken.
    fn put_order(&self, order: &Order) -> Result<(), StoreError>;

    /// Get an order by number.
    fn get_order_by_number(&self, number: &str) -> Result<Option<Order>, StoreError>;

    /// Overwrite status and accrual of a non-terminal order.
    ///
    /// Returns `false` without writing when the order is already terminal,
    /// so repeating the same terminal write leaves the row as it was.
    fn update_order(
        &self,
        number: &str,
        status: OrderStatus,
        accrual: Option<f64>,
    ) -> Result<bool, StoreError>;

    /// Add the deltas to an owner's balance, creating the row if needed.
    fn update_balance(
        &self,
        owner_id: &str,
        accrual_delta: f64,
        withdrawn_delta: f64,
    ) -> Result<Balance, StoreError>;

    /// All orders still waiting on the accrual service (NEW or PROCESSING), oldest first.
    fn get_unprocessed_orders(&self) -> Result<Vec<Order>, StoreError>;

    /// Move a non-terminal order to `status` and, on the transition into
    /// PROCESSED, credit `accrual` to the owner, atomically.
    fn apply_accrual(
        &self,
        number: &str,
        owner_id: &str,
        status: OrderStatus,
        accrual: Option<f64>,
    ) -> Result<Transition, StoreError>;

    /// Orders uploaded by an owner, newest first.
    fn list_orders(&self, owner_id: &str) -> Result<Vec<Order>, StoreError>;

    /// Current balance of an owner (zeros if the owner never earned points).
    fn get_balance(&self, owner_id: &str) -> Result<Balance, StoreError>;

    /// Spend `sum` points against `order_number`.
    fn withdraw(&self, owner_id: &str, order_number: &str, sum: f64)
        -> Result<Balance, StoreError>;

    /// Withdrawals made by an owner, newest first.
    fn list_withdrawals(&self, owner_id: &str) -> Result<Vec<Withdrawal>, StoreError>;
}
