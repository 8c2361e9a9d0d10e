//! BalanceLedger — available/blocked buckets for cash and instruments.
//!
//! Blocking reserves a resource against a resting order without transferring
//! ownership; settlement applies the final effect of a fill. Callers always
//! unblock exactly what they blocked, so driving a blocked bucket below zero
//! is a programming error, not a user-facing one — it is debug-asserted.
//!
//! Insufficient balance is deliberately not rejected: the simulator explores
//! strategy behavior against the provided capital, so available cash may go
//! negative.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Which side of a balance a settlement targets.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Bucket {
    Available,
    Blocked,
}

/// One available/blocked pair.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct Balance {
    pub available: f64,
    pub blocked: f64,
}

impl Balance {
    pub fn total(&self) -> f64 {
        self.available + self.blocked
    }
}

/// Full balance state for reporting.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BalanceSnapshot {
    pub cash: Balance,
    pub instruments: HashMap<String, Balance>,
}

pub struct BalanceLedger {
    cash: Balance,
    instruments: HashMap<String, Balance>,
}

impl BalanceLedger {
    pub fn new(initial_capital: f64) -> Self {
        Self {
            cash: Balance {
                available: initial_capital,
                blocked: 0.0,
            },
            instruments: HashMap::new(),
        }
    }

    /// Move `amount` of cash from available to blocked. A negative amount
    /// reverses a prior block (cancel path).
    pub fn block_cash(&mut self, amount: f64) {
        self.cash.available -= amount;
        self.cash.blocked += amount;
        debug_assert!(
            self.cash.blocked >= -1e-9,
            "blocked cash driven negative: {}",
            self.cash.blocked
        );
    }

    /// Move `quantity` units of an instrument from available to blocked.
    /// A negative quantity reverses a prior block.
    pub fn block_instrument(&mut self, instrument: &str, quantity: f64) {
        let balance = self.instruments.entry(instrument.to_string()).or_default();
        balance.available -= quantity;
        balance.blocked += quantity;
        debug_assert!(
            balance.blocked >= -1e-9,
            "blocked quantity of {instrument} driven negative: {}",
            balance.blocked
        );
    }

    /// Apply a signed delta to the named cash bucket (fill settlement).
    pub fn settle_cash(&mut self, delta: f64, bucket: Bucket) {
        match bucket {
            Bucket::Available => self.cash.available += delta,
            Bucket::Blocked => self.cash.blocked += delta,
        }
    }

    /// Apply a signed delta to the named instrument bucket (fill settlement).
    pub fn settle_instrument(&mut self, instrument: &str, delta: f64, bucket: Bucket) {
        let balance = self.instruments.entry(instrument.to_string()).or_default();
        match bucket {
            Bucket::Available => balance.available += delta,
            Bucket::Blocked => balance.blocked += delta,
        }
    }

    pub fn cash(&self) -> Balance {
        self.cash
    }

    pub fn snapshot(&self) -> BalanceSnapshot {
        BalanceSnapshot {
            cash: self.cash,
            instruments: self.instruments.clone(),
        }
    }
}
