//! Position — a derived snapshot over the operation ledger.

use serde::{Deserialize, Serialize};

/// Point-in-time view of holdings in one instrument.
///
/// A position is a pure function of the operation ledger, recomputed after
/// every append for the instrument — it carries no identity of its own and
/// can never drift from the ledger.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Position {
    pub instrument: String,
    /// Net held lots: bought minus sold, signed.
    pub quantity_lots: i64,
    /// Net held units: quantity_lots * lot size.
    pub quantity: f64,
    pub current_price: f64,
    /// Average cost per unit, first-in-first-out convention.
    pub avg_price_fifo: f64,
    /// Average cost per unit, first-in-last-out convention.
    pub avg_price_filo: f64,
}

impl Position {
    pub fn is_flat(&self) -> bool {
        self.quantity_lots == 0
    }

    pub fn market_value(&self) -> f64 {
        self.quantity * self.current_price
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn market_value_uses_units_not_lots() {
        let pos = Position {
            instrument: "ACME".into(),
            quantity_lots: 2,
            quantity: 20.0, // lot size 10
            current_price: 101.0,
            avg_price_fifo: 100.0,
            avg_price_filo: 100.0,
        };
        assert!(!pos.is_flat());
        assert_eq!(pos.market_value(), 2020.0);
    }
}
