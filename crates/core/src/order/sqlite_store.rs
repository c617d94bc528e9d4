//! SQLite-backed order store implementation.

use std::path::Path;
use std::sync::Mutex;
use std::time::Duration;

use chrono::{DateTime, SecondsFormat, Utc};
use rusqlite::{params, Connection, OptionalExtension};

use super::{Balance, Order, OrderStatus, OrderStore, StoreError, Transition, Withdrawal};

const ORDER_COLUMNS: &str = "order_number, owner_id, status, accrual, uploaded_at";

/// SQLite-backed order store.
pub struct SqliteOrderStore {
    conn: Mutex<Connection>,
}

impl SqliteOrderStore {
    /// Create a new SQLite order store, creating the database file and tables if needed.
    pub fn new(path: &Path) -> Result<Self, StoreError> {
        let conn = Connection::open(path)?;
        conn.busy_timeout(Duration::from_secs(5))?;
        Self::initialize_schema(&conn)?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    /// Create an in-memory SQLite order store (useful for testing).
    pub fn in_memory() -> Result<Self, StoreError> {
        let conn = Connection::open_in_memory()?;
        Self::initialize_schema(&conn)?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    fn initialize_schema(conn: &Connection) -> Result<(), StoreError> {
        conn.execute_batch(
            r#"
            CREATE TABLE IF NOT EXISTS orders (
                order_number TEXT PRIMARY KEY,
                owner_id TEXT NOT NULL,
                status TEXT NOT NULL,
                accrual REAL,
                uploaded_at TEXT NOT NULL
            );

            CREATE INDEX IF NOT EXISTS idx_orders_owner ON orders(owner_id, uploaded_at DESC);
            CREATE INDEX IF NOT EXISTS idx_orders_status ON orders(status);

            CREATE TABLE IF NOT EXISTS balances (
                owner_id TEXT PRIMARY KEY,
                current REAL NOT NULL DEFAULT 0,
                withdrawn REAL NOT NULL DEFAULT 0
            );

            CREATE TABLE IF NOT EXISTS withdrawals (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                owner_id TEXT NOT NULL,
                order_number TEXT NOT NULL,
                sum REAL NOT NULL,
                processed_at TEXT NOT NULL
            );

            CREATE INDEX IF NOT EXISTS idx_withdrawals_owner ON withdrawals(owner_id, processed_at DESC);
            "#,
        )?;

        Ok(())
    }

    fn row_to_order(row: &rusqlite::Row) -> rusqlite::Result<Order> {
        let number: String = row.get(0)?;
        let owner_id: String = row.get(1)?;
        let status_str: String = row.get(2)?;
        let accrual: Option<f64> = row.get(3)?;
        let uploaded_at_str: String = row.get(4)?;

        let status = OrderStatus::parse(&status_str).ok_or_else(|| {
            rusqlite::Error::FromSqlConversionFailure(
                2,
                rusqlite::types::Type::Text,
                format!("unknown order status: {}", status_str).into(),
            )
        })?;

        Ok(Order {
            owner_id,
            number,
            status,
            accrual,
            uploaded_at: parse_timestamp(&uploaded_at_str),
        })
    }

    fn read_balance(conn: &Connection, owner_id: &str) -> rusqlite::Result<Balance> {
        let balance = conn
            .query_row(
                "SELECT current, withdrawn FROM balances WHERE owner_id = ?1",
                params![owner_id],
                |row| {
                    Ok(Balance {
                        current: row.get(0)?,
                        withdrawn: row.get(1)?,
                    })
                },
            )
            .optional()?;

        Ok(balance.unwrap_or_default())
    }

    fn upsert_balance(
        conn: &Connection,
        owner_id: &str,
        accrual_delta: f64,
        withdrawn_delta: f64,
    ) -> rusqlite::Result<()> {
        conn.execute(
            "INSERT INTO balances (owner_id, current, withdrawn) VALUES (?1, ?2, ?3)
             ON CONFLICT(owner_id) DO UPDATE SET
                current = current + excluded.current,
                withdrawn = withdrawn + excluded.withdrawn",
            params![owner_id, accrual_delta, withdrawn_delta],
        )?;
        Ok(())
    }
}

fn format_timestamp(ts: &DateTime<Utc>) -> String {
    ts.to_rfc3339_opts(SecondsFormat::Micros, true)
}

// Stored timestamps are always written by format_timestamp.
fn parse_timestamp(s: &str) -> DateTime<Utc> {
    DateTime::parse_from_rfc3339(s)
        .map(|dt| dt.with_timezone(&Utc))
        .unwrap_or_else(|_| Utc::now())
}

fn is_constraint_violation(e: &rusqlite::Error) -> bool {
    matches!(
        e,
        rusqlite::Error::SqliteFailure(err, _) if err.code == rusqlite::ErrorCode::ConstraintViolation
    )
}

impl OrderStore for SqliteOrderStore {
    fn put_order(&self, order: &Order) -> Result<(), StoreError> {
        let conn = self.conn.lock().unwrap();

        conn.execute(
            "INSERT INTO orders (order_number, owner_id, status, accrual, uploaded_at) VALUES (?1, ?2, ?3, ?4, ?5)",
            params![
                order.number,
                order.owner_id,
                order.status.as_str(),
                order.accrual,
                format_timestamp(&order.uploaded_at),
            ],
        )
        .map_err(|e| {
            if is_constraint_violation(&e) {
                StoreError::Duplicate(order.number.clone())
            } else {
                StoreError::from(e)
            }
        })?;

        Ok(())
    }

    fn get_order_by_number(&self, number: &str) -> Result<Option<Order>, StoreError> {
        let conn = self.conn.lock().unwrap();

        let order = conn
            .query_row(
                &format!("SELECT {} FROM orders WHERE order_number = ?1", ORDER_COLUMNS),
                params![number],
                Self::row_to_order,
            )
            .optional()?;

        Ok(order)
    }

    fn update_order(
        &self,
        number: &str,
        status: OrderStatus,
        accrual: Option<f64>,
    ) -> Result<bool, StoreError> {
        let conn = self.conn.lock().unwrap();

        let changed = conn.execute(
            "UPDATE orders SET status = ?1, accrual = ?2
             WHERE order_number = ?3 AND status IN ('NEW', 'PROCESSING')",
            params![status.as_str(), accrual, number],
        )?;

        if changed > 0 {
            return Ok(true);
        }

        let exists: Option<i64> = conn
            .query_row(
                "SELECT 1 FROM orders WHERE order_number = ?1",
                params![number],
                |row| row.get(0),
            )
            .optional()?;

        match exists {
            Some(_) => Ok(false),
            None => Err(StoreError::NotFound(number.to_string())),
        }
    }

    fn update_balance(
        &self,
        owner_id: &str,
        accrual_delta: f64,
        withdrawn_delta: f64,
    ) -> Result<Balance, StoreError> {
        let conn = self.conn.lock().unwrap();

        Self::upsert_balance(&conn, owner_id, accrual_delta, withdrawn_delta)?;
        Ok(Self::read_balance(&conn, owner_id)?)
    }

    fn get_unprocessed_orders(&self) -> Result<Vec<Order>, StoreError> {
        let conn = self.conn.lock().unwrap();

        let mut stmt = conn.prepare(&format!(
            "SELECT {} FROM orders WHERE status IN ('NEW', 'PROCESSING') ORDER BY uploaded_at ASC, rowid ASC",
            ORDER_COLUMNS
        ))?;

        let orders = stmt
            .query_map([], Self::row_to_order)?
            .collect::<Result<Vec<_>, _>>()?;

        Ok(orders)
    }

    fn apply_accrual(
        &self,
        number: &str,
        owner_id: &str,
        status: OrderStatus,
        accrual: Option<f64>,
    ) -> Result<Transition, StoreError> {
        let mut conn = self.conn.lock().unwrap();
        let tx = conn.transaction()?;

        let current: Option<(String, String)> = tx
            .query_row(
                "SELECT owner_id, status FROM orders WHERE order_number = ?1",
                params![number],
                |row| Ok((row.get(0)?, row.get(1)?)),
            )
            .optional()?;

        let Some((stored_owner, stored_status)) = current else {
            return Err(StoreError::NotFound(number.to_string()));
        };

        if stored_owner != owner_id {
            return Err(StoreError::NotFound(format!(
                "{} (owned by another user)",
                number
            )));
        }

        let from = OrderStatus::parse(&stored_status).ok_or_else(|| {
            StoreError::Database(format!("unknown order status: {}", stored_status))
        })?;

        if from.is_terminal() {
            return Ok(Transition::AlreadyTerminal(from));
        }

        // Never move backwards to NEW, and skip no-op rewrites.
        if status == from || status == OrderStatus::New {
            return Ok(Transition::Unchanged(from));
        }

        let (stored_accrual, credited) = if status == OrderStatus::Processed {
            let amount = accrual.unwrap_or(0.0).max(0.0);
            (Some(amount), amount)
        } else {
            (None, 0.0)
        };

        let changed = tx.execute(
            "UPDATE orders SET status = ?1, accrual = ?2
             WHERE order_number = ?3 AND status IN ('NEW', 'PROCESSING')",
            params![status.as_str(), stored_accrual, number],
        )?;

        if changed == 0 {
            return Ok(Transition::AlreadyTerminal(from));
        }

        if credited > 0.0 {
            Self::upsert_balance(&tx, owner_id, credited, 0.0)?;
        }

        tx.commit()?;

        Ok(Transition::Applied {
            from,
            to: status,
            credited,
        })
    }

    fn list_orders(&self, owner_id: &str) -> Result<Vec<Order>, StoreError> {
        let conn = self.conn.lock().unwrap();

        let mut stmt = conn.prepare(&format!(
            "SELECT {} FROM orders WHERE owner_id = ?1 ORDER BY uploaded_at DESC, rowid DESC",
            ORDER_COLUMNS
        ))?;

        let orders = stmt
            .query_map(params![owner_id], Self::row_to_order)?
            .collect::<Result<Vec<_>, _>>()?;

        Ok(orders)
    }

    fn get_balance(&self, owner_id: &str) -> Result<Balance, StoreError> {
        let conn = self.conn.lock().unwrap();
        Ok(Self::read_balance(&conn, owner_id)?)
    }

    fn withdraw(
        &self,
        owner_id: &str,
        order_number: &str,
        sum: f64,
    ) -> Result<Balance, StoreError> {
        let mut conn = self.conn.lock().unwrap();
        let tx = conn.transaction()?;

        let balance = Self::read_balance(&tx, owner_id)?;
        if balance.current < sum {
            return Err(StoreError::InsufficientFunds {
                requested: sum,
                available: balance.current,
            });
        }

        Self::upsert_balance(&tx, owner_id, -sum, sum)?;

        tx.execute(
            "INSERT INTO withdrawals (owner_id, order_number, sum, processed_at) VALUES (?1, ?2, ?3, ?4)",
            params![owner_id, order_number, sum, format_timestamp(&Utc::now())],
        )?;

        let updated = Self::read_balance(&tx, owner_id)?;
        tx.commit()?;

        Ok(updated)
    }

    fn list_withdrawals(&self, owner_id: &str) -> Result<Vec<Withdrawal>, StoreError> {
        let conn = self.conn.lock().unwrap();

        let mut stmt = conn.prepare(
            "SELECT order_number, sum, processed_at FROM withdrawals
             WHERE owner_id = ?1 ORDER BY processed_at DESC, id DESC",
        )?;

        let withdrawals = stmt
            .query_map(params![owner_id], |row| {
                let processed_at: String = row.get(2)?;
                Ok(Withdrawal {
                    order: row.get(0)?,
                    sum: row.get(1)?,
                    processed_at: parse_timestamp(&processed_at),
                })
            })?
            .collect::<Result<Vec<_>, _>>()?;

        Ok(withdrawals)
    }
}
