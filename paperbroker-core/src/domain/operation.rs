//! Operations — the append-only trade and fee ledger entries.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OperationKind {
    Buy,
    Sell,
    BrokerFee,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OperationState {
    Executed,
}

/// One immutable ledger entry. Never mutated after creation.
///
/// Two are appended per filled order: the trade itself and a fee entry whose
/// `parent_id` references the trade.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Operation {
    pub id: String,
    pub parent_id: Option<String>,
    pub instrument: String,
    pub kind: OperationKind,
    pub state: OperationState,
    /// Signed cash effect: negative for buys and fees, positive for sells.
    pub payment: f64,
    /// Per-unit execution price (zero for fee entries).
    pub price: f64,
    /// Executed quantity in lots (zero for fee entries).
    pub quantity: u64,
    pub date: DateTime<Utc>,
}

impl Operation {
    pub fn is_trade(&self) -> bool {
        matches!(self.kind, OperationKind::Buy | OperationKind::Sell)
    }
}
