//! Orders, balances and withdrawals, plus their persistence.

mod number;
mod sqlite_store;
mod store;
mod types;

pub use number::is_valid_order_number;
pub use sqlite_store::SqliteOrderStore;
pub use store::{OrderStore, StoreError};
pub use types::{Balance, Order, OrderStatus, OrderToAccrual, Transition, Withdrawal};
