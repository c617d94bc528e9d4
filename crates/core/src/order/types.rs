//! Order, balance and withdrawal types.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Local processing status of an order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum OrderStatus {
    New,
    Processing,
    Invalid,
    Processed,
}

impl OrderStatus {
    /// Statuses the recovery scanner still has to chase.
    pub const NON_TERMINAL: [OrderStatus; 2] = [OrderStatus::New, OrderStatus::Processing];

    pub fn as_str(&self) -> &'static str {
        match self {
            OrderStatus::New => "NEW",
            OrderStatus::Processing => "PROCESSING",
            OrderStatus::Invalid => "INVALID",
            OrderStatus::Processed => "PROCESSED",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "NEW" => Some(OrderStatus::New),
            "PROCESSING" => Some(OrderStatus::Processing),
            "INVALID" => Some(OrderStatus::Invalid),
            "PROCESSED" => Some(OrderStatus::Processed),
            _ => None,
        }
    }

    /// INVALID and PROCESSED never change again.
    pub fn is_terminal(&self) -> bool {
        matches!(self, OrderStatus::Invalid | OrderStatus::Processed)
    }
}

impl fmt::Display for OrderStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A persisted loyalty order.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Order {
    pub owner_id: String,
    pub number: String,
    pub status: OrderStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub accrual: Option<f64>,
    pub uploaded_at: DateTime<Utc>,
}

impl Order {
    /// A freshly uploaded order, not yet seen by the accrual service.
    pub fn new(owner_id: impl Into<String>, number: impl Into<String>) -> Self {
        Self {
            owner_id: owner_id.into(),
            number: number.into(),
            status: OrderStatus::New,
            accrual: None,
            uploaded_at: Utc::now(),
        }
    }
}

/// Work item handed to the accrual engine.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderToAccrual {
    pub order_number: String,
    pub owner_id: String,
}

impl OrderToAccrual {
    pub fn new(order_number: impl Into<String>, owner_id: impl Into<String>) -> Self {
        Self {
            order_number: order_number.into(),
            owner_id: owner_id.into(),
        }
    }
}

impl From<&Order> for OrderToAccrual {
    fn from(order: &Order) -> Self {
        Self {
            order_number: order.number.clone(),
            owner_id: order.owner_id.clone(),
        }
    }
}

/// Points balance of a single owner.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct Balance {
    pub current: f64,
    pub withdrawn: f64,
}

/// A points withdrawal against an order number.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Withdrawal {
    pub order: String,
    pub sum: f64,
    pub processed_at: DateTime<Utc>,
}

/// Result of applying an accrual result to a stored order.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Transition {
    /// Status changed; `credited` points were added to the owner's balance.
    Applied {
        from: OrderStatus,
        to: OrderStatus,
        credited: f64,
    },
    /// Order already carried the requested non-terminal status.
    Unchanged(OrderStatus),
    /// Order was already terminal and was left untouched.
    AlreadyTerminal(OrderStatus),
}

impl Transition {
    pub fn credited(&self) -> f64 {
        match self {
            Transition::Applied { credited, .. } => *credited,
            _ => 0.0,
        }
    }
}
