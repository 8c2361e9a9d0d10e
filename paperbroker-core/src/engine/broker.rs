//! Broker — the execution engine orchestrating feed, ledger, orders and
//! operations.
//!
//! One caller-owned instance per simulation run; `configure` resets all state.
//! On each tick the broker advances the bar feed, evaluates every pending
//! order against the *previous* bar (the no-lookahead rule: fills only use
//! information known one bar ago), settles balances, appends ledger
//! operations, and recomputes the affected position.

use crate::data::{BarSource, DataError};
use crate::domain::{
    BarInterval, Instrument, InstrumentError, InstrumentResolver, Operation, OperationKind,
    OperationState, Order, OrderId, OrderKind, OrderSpec, OrderStatus, Position, PriceBar, Side,
};
use crate::engine::clock::BarFeed;
use crate::engine::ledger::{BalanceLedger, BalanceSnapshot, Bucket};
use crate::engine::operations::{compute_position, OperationLedger};
use crate::engine::orders::{OrderAuditEntry, OrderError, OrderManager};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum EngineError {
    #[error("invalid simulation window: from {from} must precede to {to}")]
    InvalidWindow {
        from: DateTime<Utc>,
        to: DateTime<Utc>,
    },

    #[error("broker is not configured")]
    NotConfigured,

    #[error(transparent)]
    Data(#[from] DataError),

    #[error(transparent)]
    Instrument(#[from] InstrumentError),

    #[error(transparent)]
    Order(#[from] OrderError),
}

/// Configuration for one simulation run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BrokerOptions {
    /// The traded instrument for this run.
    pub instrument: String,
    pub from: DateTime<Utc>,
    pub to: DateTime<Utc>,
    pub interval: BarInterval,
    /// Starting cash.
    #[serde(default = "default_initial_capital")]
    pub initial_capital: f64,
    /// Broker commission, % of the order amount.
    #[serde(default = "default_fee_percent")]
    pub fee_percent: f64,
    /// Where bar-source adapters keep cached bars.
    #[serde(default = "default_cache_dir")]
    pub cache_dir: PathBuf,
}

fn default_initial_capital() -> f64 {
    100_000.0
}

fn default_fee_percent() -> f64 {
    0.3
}

fn default_cache_dir() -> PathBuf {
    PathBuf::from(".cache")
}

/// All mutable state of one configured run.
struct SimState {
    options: BrokerOptions,
    instrument: Instrument,
    feed: BarFeed,
    ledger: BalanceLedger,
    orders: OrderManager,
    operations: OperationLedger,
}

pub struct Broker {
    bar_source: Box<dyn BarSource>,
    instruments: Box<dyn InstrumentResolver>,
    state: Option<SimState>,
}

impl Broker {
    pub fn new(
        bar_source: Box<dyn BarSource>,
        instruments: Box<dyn InstrumentResolver>,
    ) -> Self {
        Self {
            bar_source,
            instruments,
            state: None,
        }
    }

    /// Load the bar window and reset all state. Fails on an inverted window,
    /// an unresolvable instrument, or an empty bar sequence.
    pub fn configure(&mut self, options: BrokerOptions) -> Result<(), EngineError> {
        if options.from >= options.to {
            return Err(EngineError::InvalidWindow {
                from: options.from,
                to: options.to,
            });
        }
        let instrument = self.instruments.resolve(&options.instrument)?;
        let bars = self.bar_source.load_bars(
            &options.instrument,
            options.interval,
            options.from,
            options.to,
        )?;
        if bars.is_empty() {
            return Err(DataError::NoBars {
                instrument: options.instrument.clone(),
            }
            .into());
        }

        log::debug!(
            "configured {} bars for {} over {} .. {}",
            bars.len(),
            options.instrument,
            options.from,
            options.to,
        );

        self.state = Some(SimState {
            ledger: BalanceLedger::new(options.initial_capital),
            feed: BarFeed::new(bars),
            orders: OrderManager::new(),
            operations: OperationLedger::new(),
            instrument,
            options,
        });
        Ok(())
    }

    /// Advance one bar and attempt fills. Returns `Ok(false)` once the window
    /// is exhausted; further ticks keep returning false with no state change.
    pub fn tick(&mut self) -> Result<bool, EngineError> {
        let state = self.state.as_mut().ok_or(EngineError::NotConfigured)?;
        if !state.feed.tick() {
            return Ok(false);
        }
        state.try_execute_orders()?;
        Ok(true)
    }

    /// Place an order. Idempotent: a request reusing an existing order id
    /// returns the stored order unchanged.
    pub fn place_order(&mut self, spec: OrderSpec) -> Result<Order, EngineError> {
        let state = self.state.as_mut().ok_or(EngineError::NotConfigured)?;

        if let Some(existing) = state.orders.get(&spec.order_id) {
            return Ok(existing.clone());
        }
        // One traded instrument per run; anything else is unknown here.
        if spec.instrument != state.instrument.id {
            return Err(InstrumentError::NotFound {
                id: spec.instrument,
            }
            .into());
        }

        let price = match spec.kind {
            OrderKind::Limit { limit_price } => limit_price,
            OrderKind::Market => state.current_price()?,
        };
        let lot = state.instrument.lot as f64;
        let initial_order_amount = price * spec.lots as f64 * lot;
        let initial_commission = initial_order_amount * state.options.fee_percent / 100.0;
        let total_amount = initial_order_amount + initial_commission;

        let order = Order {
            id: spec.order_id,
            instrument: spec.instrument,
            side: spec.side,
            kind: spec.kind,
            status: OrderStatus::New,
            lots_requested: spec.lots,
            lots_executed: 0,
            initial_price: price,
            initial_order_amount,
            initial_commission,
            total_amount,
            executed_price: 0.0,
            executed_order_amount: 0.0,
            executed_commission: 0.0,
            fee_percent: state.options.fee_percent,
            created_at: state.feed.current_time().unwrap_or(state.options.from),
        };

        match order.side {
            Side::Buy => state.ledger.block_cash(order.total_amount),
            Side::Sell => state
                .ledger
                .block_instrument(&order.instrument, order.lots_requested as f64 * lot),
        }

        Ok(state.orders.insert(order).clone())
    }

    /// Cancel a resting order, reversing exactly the block made at placement.
    pub fn cancel_order(&mut self, id: &OrderId) -> Result<(), EngineError> {
        let state = self.state.as_mut().ok_or(EngineError::NotConfigured)?;
        let time = state.feed.current_time();
        let order = state.orders.cancel(id, time)?.clone();

        match order.side {
            Side::Buy => state.ledger.block_cash(-order.total_amount),
            Side::Sell => {
                // Lot size may need re-resolving: cancellation can come long
                // after placement.
                let instrument = self.instruments.resolve(&order.instrument)?;
                state.ledger.block_instrument(
                    &order.instrument,
                    -(order.lots_requested as f64 * instrument.lot as f64),
                );
            }
        }
        Ok(())
    }

    pub fn get_order(&self, id: &OrderId) -> Result<Order, EngineError> {
        let state = self.state.as_ref().ok_or(EngineError::NotConfigured)?;
        state
            .orders
            .get(id)
            .cloned()
            .ok_or_else(|| OrderError::NotFound(id.clone()).into())
    }

    /// Orders still awaiting a fill, in placement order.
    pub fn pending_orders(&self) -> Vec<Order> {
        match &self.state {
            Some(state) => state.orders.pending().into_iter().cloned().collect(),
            None => Vec::new(),
        }
    }

    pub fn get_balance(&self) -> Result<BalanceSnapshot, EngineError> {
        let state = self.state.as_ref().ok_or(EngineError::NotConfigured)?;
        Ok(state.ledger.snapshot())
    }

    /// Current position snapshot for an instrument, if any trade has settled.
    pub fn get_position(&self, instrument: &str) -> Option<Position> {
        self.state.as_ref()?.operations.position(instrument).cloned()
    }

    /// All settled operations, in ledger order.
    pub fn operations(&self) -> &[Operation] {
        match &self.state {
            Some(state) => state.operations.operations(),
            None => &[],
        }
    }

    /// Every order state transition recorded so far.
    pub fn order_audit_trail(&self) -> &[OrderAuditEntry] {
        match &self.state {
            Some(state) => state.orders.audit_trail(),
            None => &[],
        }
    }

    /// Timestamp of the current bar; None before the first tick.
    pub fn current_time(&self) -> Option<DateTime<Utc>> {
        self.state.as_ref()?.feed.current_time()
    }
}

impl SimState {
    /// Price for initial order amounts: the current bar's close, or the
    /// window's first bar before the first tick (the sequence is already
    /// loaded, so the opening price is known).
    fn current_price(&self) -> Result<f64, EngineError> {
        if let Some(bar) = self.feed.bar(0) {
            return Ok(bar.close);
        }
        self.feed
            .bars()
            .first()
            .map(|b| b.close)
            .ok_or(EngineError::NotConfigured)
    }

    fn try_execute_orders(&mut self) -> Result<(), OrderError> {
        let prev = self.feed.bar(-1).cloned();
        let fillable: Vec<(OrderId, f64)> = self
            .orders
            .pending()
            .iter()
            .filter_map(|order| fill_price(order, prev.as_ref()).map(|p| (order.id.clone(), p)))
            .collect();

        log::debug!(
            "tick at {:?}: {} pending, {} fillable",
            self.feed.current_time(),
            self.orders.pending().len(),
            fillable.len(),
        );

        for (id, price) in fillable {
            self.execute_order(&id, price)?;
        }
        Ok(())
    }

    fn execute_order(&mut self, id: &OrderId, price: f64) -> Result<(), OrderError> {
        let (side, lots) = match self.orders.get(id) {
            Some(order) => (order.side, order.lots_requested),
            None => return Err(OrderError::NotFound(id.clone())),
        };
        let lot = self.instrument.lot as f64;
        let quantity = lots as f64 * lot;
        let executed_order_amount = price * quantity;
        let executed_commission = executed_order_amount * self.options.fee_percent / 100.0;
        let time = self.feed.current_time().unwrap_or(self.options.from);

        let order = self.orders.mark_filled(
            id,
            price,
            executed_order_amount,
            executed_commission,
            Some(time),
        )?;
        let total_amount = order.total_amount;

        // Settle: a buy consumes the blocked cash and credits the bought
        // quantity; a sell consumes the blocked quantity and credits the
        // proceeds net of commission.
        match side {
            Side::Buy => {
                self.ledger.settle_cash(-total_amount, Bucket::Blocked);
                self.ledger
                    .settle_instrument(&self.instrument.id, quantity, Bucket::Available);
            }
            Side::Sell => {
                self.ledger
                    .settle_instrument(&self.instrument.id, -quantity, Bucket::Blocked);
                self.ledger
                    .settle_cash(executed_order_amount - executed_commission, Bucket::Available);
            }
        }

        let kind = match side {
            Side::Buy => OperationKind::Buy,
            Side::Sell => OperationKind::Sell,
        };
        let payment = match side {
            Side::Buy => -executed_order_amount,
            Side::Sell => executed_order_amount,
        };
        let trade = Operation {
            id: id.0.clone(),
            parent_id: None,
            instrument: self.instrument.id.clone(),
            kind,
            state: OperationState::Executed,
            payment,
            price,
            quantity: lots,
            date: time,
        };
        let fee = Operation {
            id: format!("{}_fee", id.0),
            parent_id: Some(id.0.clone()),
            instrument: self.instrument.id.clone(),
            kind: OperationKind::BrokerFee,
            state: OperationState::Executed,
            payment: -executed_commission,
            price: 0.0,
            quantity: 0,
            date: time,
        };
        self.operations.append([trade, fee]);

        let position = {
            let ops = self.operations.operations_for(&self.instrument.id);
            compute_position(&self.instrument, &ops, price)
        };
        self.operations.replace_position(position);
        Ok(())
    }
}

/// Whether the order can fill against the previous bar, and at what price.
///
/// Market orders fill at the previous close. A limit order fills at its own
/// limit price once the previous bar's range contains it — the broker fills
/// exactly at the resting limit when the market trades through it. No
/// previous bar means nothing fills.
fn fill_price(order: &Order, prev: Option<&PriceBar>) -> Option<f64> {
    let bar = prev?;
    match order.kind {
        OrderKind::Market => Some(bar.close),
        OrderKind::Limit { limit_price } => {
            (bar.low <= limit_price && limit_price <= bar.high).then_some(limit_price)
        }
    }
}
