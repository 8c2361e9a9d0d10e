//! Order types and the order lifecycle state machine types.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Order identifier, chosen by the caller (resubmitting the same id is
/// idempotent).
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct OrderId(pub String);

impl OrderId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }
}

impl fmt::Display for OrderId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Side {
    Buy,
    Sell,
}

/// What kind of order and its price parameters.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OrderKind {
    /// Fill at the previous bar's close.
    Market,
    /// Fill at the limit price once the previous bar's range contains it.
    Limit { limit_price: f64 },
}

/// Order lifecycle states. `Filled` and `Cancelled` are terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OrderStatus {
    New,
    Filled,
    Cancelled,
}

/// A resting or completed order.
///
/// The `initial_*` amounts are priced at placement (limit price if given,
/// else the current bar's close) and are what the balance ledger blocks.
/// The `executed_*` fields stay zero until the order fills.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Order {
    pub id: OrderId,
    pub instrument: String,
    pub side: Side,
    pub kind: OrderKind,
    pub status: OrderStatus,
    pub lots_requested: u64,
    pub lots_executed: u64,
    /// Per-unit price used for the initial amounts.
    pub initial_price: f64,
    /// initial_price * lots_requested * lot size.
    pub initial_order_amount: f64,
    pub initial_commission: f64,
    /// Order amount plus commission. Overwritten with the executed total on fill.
    pub total_amount: f64,
    pub executed_price: f64,
    pub executed_order_amount: f64,
    pub executed_commission: f64,
    /// Commission rate snapshot (% of the order amount) taken at placement.
    pub fee_percent: f64,
    pub created_at: DateTime<Utc>,
}

impl Order {
    pub fn is_terminal(&self) -> bool {
        matches!(self.status, OrderStatus::Filled | OrderStatus::Cancelled)
    }
}

/// A placement request, as the caller sees it.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OrderSpec {
    pub order_id: OrderId,
    pub instrument: String,
    pub side: Side,
    pub kind: OrderKind,
    pub lots: u64,
}
