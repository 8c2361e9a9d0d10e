//! End-to-end broker scenarios: configure, place, tick, settle.
//!
//! Covers:
//! 1. Market orders fill at the previous bar's close
//! 2. Limit orders fill at exactly the limit price when the previous bar's
//!    range contains it
//! 3. Unfilled orders survive window exhaustion and can still be cancelled
//! 4. FIFO/FILO cost bases diverge after a partial sale
//! 5. Runs are deterministic
//! 6. Cash movements reconcile against the operation ledger

use chrono::{DateTime, TimeZone, Utc};
use paperbroker_core::data::{BarSource, DataError};
use paperbroker_core::domain::{
    BarInterval, Instrument, InstrumentResolver, OperationKind, OrderId, OrderKind, OrderSpec,
    OrderStatus, PriceBar, Side, StaticInstruments,
};
use paperbroker_core::engine::{Broker, BrokerOptions};

// ── Fixtures ─────────────────────────────────────────────────────────

/// Bar source over explicit (low, high, close) triples, one bar per interval.
struct SeqBars(Vec<(f64, f64, f64)>);

impl BarSource for SeqBars {
    fn name(&self) -> &str {
        "seq"
    }

    fn load_bars(
        &self,
        instrument: &str,
        interval: BarInterval,
        from: DateTime<Utc>,
        _to: DateTime<Utc>,
    ) -> Result<Vec<PriceBar>, DataError> {
        if self.0.is_empty() {
            return Err(DataError::NoBars {
                instrument: instrument.to_string(),
            });
        }
        Ok(self
            .0
            .iter()
            .enumerate()
            .map(|(i, &(low, high, close))| PriceBar {
                time: from + interval.duration() * i as i32,
                open: close,
                high,
                low,
                close,
                volume: 1_000,
            })
            .collect())
    }
}

fn resolver(lot: u32) -> Box<dyn InstrumentResolver> {
    Box::new(StaticInstruments::new([Instrument::new(
        "ACME",
        "Acme Corp",
        lot,
    )]))
}

fn options() -> BrokerOptions {
    let from = Utc.with_ymd_and_hms(2024, 1, 2, 10, 0, 0).unwrap();
    BrokerOptions {
        instrument: "ACME".into(),
        from,
        to: from + chrono::Duration::hours(1),
        interval: BarInterval::Min1,
        initial_capital: 100_000.0,
        fee_percent: 0.3,
        cache_dir: ".cache".into(),
    }
}

fn broker(bars: Vec<(f64, f64, f64)>, lot: u32) -> Broker {
    let mut b = Broker::new(Box::new(SeqBars(bars)), resolver(lot));
    b.configure(options()).unwrap();
    b
}

fn spec(id: &str, side: Side, kind: OrderKind, lots: u64) -> OrderSpec {
    OrderSpec {
        order_id: OrderId::new(id),
        instrument: "ACME".into(),
        side,
        kind,
        lots,
    }
}

// ── 1. Market fills at the previous close ────────────────────────────

#[test]
fn market_buy_fills_at_previous_close() {
    let mut b = broker(
        vec![(99.0, 101.0, 100.0), (109.0, 111.0, 110.0), (104.0, 106.0, 105.0)],
        1,
    );
    b.tick().unwrap(); // current bar closes at 100
    b.place_order(spec("o-1", Side::Buy, OrderKind::Market, 1)).unwrap();

    b.tick().unwrap(); // previous bar is the 100-close bar
    let order = b.get_order(&OrderId::new("o-1")).unwrap();
    assert_eq!(order.status, OrderStatus::Filled);
    assert_eq!(order.executed_price, 100.0);
    assert!((order.executed_commission - 0.3).abs() < 1e-9);
}

#[test]
fn order_placed_before_first_tick_waits_for_a_previous_bar() {
    let mut b = broker(vec![(99.0, 101.0, 100.0), (109.0, 111.0, 110.0)], 1);
    let order = b.place_order(spec("o-1", Side::Buy, OrderKind::Market, 1)).unwrap();
    // Initial amounts price off the window's first bar.
    assert_eq!(order.initial_price, 100.0);

    b.tick().unwrap(); // no previous bar yet
    assert_eq!(
        b.get_order(&OrderId::new("o-1")).unwrap().status,
        OrderStatus::New
    );

    b.tick().unwrap();
    let filled = b.get_order(&OrderId::new("o-1")).unwrap();
    assert_eq!(filled.status, OrderStatus::Filled);
    assert_eq!(filled.executed_price, 100.0);
}

// ── 2. Limit fills at exactly the limit price ────────────────────────

#[test]
fn limit_sell_fills_at_limit_not_at_close() {
    let mut b = broker(vec![(99.0, 101.0, 100.0), (105.0, 112.0, 106.0), (104.0, 106.0, 105.0)], 1);
    b.tick().unwrap();
    b.place_order(spec("b", Side::Buy, OrderKind::Market, 1)).unwrap();
    b.tick().unwrap(); // buy filled at 100; current bar spans 105..112

    b.place_order(spec("s", Side::Sell, OrderKind::Limit { limit_price: 108.0 }, 1))
        .unwrap();
    b.tick().unwrap(); // previous bar 105..112 contains 108

    let sell = b.get_order(&OrderId::new("s")).unwrap();
    assert_eq!(sell.status, OrderStatus::Filled);
    assert_eq!(sell.executed_price, 108.0); // not the 106 close
}

#[test]
fn limit_outside_previous_range_stays_pending() {
    let mut b = broker(
        vec![(99.0, 101.0, 100.0), (99.0, 101.0, 100.0), (99.0, 101.0, 100.0)],
        1,
    );
    b.tick().unwrap();
    b.place_order(spec("o-1", Side::Buy, OrderKind::Limit { limit_price: 90.0 }, 1))
        .unwrap();

    while b.tick().unwrap() {}
    assert_eq!(
        b.get_order(&OrderId::new("o-1")).unwrap().status,
        OrderStatus::New
    );
    assert_eq!(b.pending_orders().len(), 1);
}

// ── 3. Window exhaustion and late cancellation ───────────────────────

#[test]
fn pending_order_can_be_cancelled_after_exhaustion() {
    let mut b = broker(vec![(99.0, 101.0, 100.0), (99.0, 101.0, 100.0)], 1);
    b.tick().unwrap();
    b.place_order(spec("o-1", Side::Buy, OrderKind::Limit { limit_price: 90.0 }, 2))
        .unwrap();
    while b.tick().unwrap() {}
    assert!(!b.tick().unwrap()); // stays exhausted

    let blocked_before = b.get_balance().unwrap().cash.blocked;
    assert!(blocked_before > 0.0);

    b.cancel_order(&OrderId::new("o-1")).unwrap();
    let cash = b.get_balance().unwrap().cash;
    assert_eq!(cash.blocked, 0.0);
    assert_eq!(cash.available, 100_000.0);
}

// ── 4. FIFO/FILO divergence ──────────────────────────────────────────

#[test]
fn partial_sale_diverges_fifo_and_filo_averages() {
    // Buy 1 lot near 100, buy 1 lot near 200, sell 1 lot.
    let mut b = broker(
        vec![
            (99.0, 101.0, 100.0),
            (199.0, 201.0, 200.0),
            (149.0, 151.0, 150.0),
            (149.0, 151.0, 150.0),
            (149.0, 151.0, 150.0),
        ],
        1,
    );
    b.tick().unwrap();
    b.place_order(spec("b1", Side::Buy, OrderKind::Market, 1)).unwrap();
    b.tick().unwrap(); // b1 fills at 100
    b.place_order(spec("b2", Side::Buy, OrderKind::Market, 1)).unwrap();
    b.tick().unwrap(); // b2 fills at 200
    b.place_order(spec("s1", Side::Sell, OrderKind::Market, 1)).unwrap();
    b.tick().unwrap(); // s1 fills at 150

    let pos = b.get_position("ACME").unwrap();
    assert_eq!(pos.quantity_lots, 1);
    // FIFO sold the 100 lot, retaining the 200 one; FILO the reverse.
    assert_eq!(pos.avg_price_fifo, 200.0);
    assert_eq!(pos.avg_price_filo, 100.0);
    assert_eq!(pos.current_price, 150.0);
}

// ── 5. Determinism ───────────────────────────────────────────────────

#[test]
fn identical_runs_produce_identical_operations() {
    let bars = vec![
        (99.0, 101.0, 100.0),
        (109.0, 111.0, 110.0),
        (104.0, 106.0, 105.0),
        (107.0, 109.0, 108.0),
    ];
    let run = |bars: Vec<(f64, f64, f64)>| {
        let mut b = broker(bars, 10);
        b.tick().unwrap();
        b.place_order(spec("b", Side::Buy, OrderKind::Market, 2)).unwrap();
        b.tick().unwrap();
        b.place_order(spec("s", Side::Sell, OrderKind::Limit { limit_price: 105.0 }, 1))
            .unwrap();
        while b.tick().unwrap() {}
        (
            b.operations().to_vec(),
            b.get_balance().unwrap(),
            b.order_audit_trail().to_vec(),
        )
    };

    assert_eq!(run(bars.clone()), run(bars));
}

// ── 6. Ledger reconciliation ─────────────────────────────────────────

#[test]
fn cash_total_change_equals_sum_of_payments() {
    let mut b = broker(
        vec![
            (99.0, 101.0, 100.0),
            (109.0, 111.0, 110.0),
            (104.0, 106.0, 105.0),
            (107.0, 109.0, 108.0),
        ],
        10,
    );
    b.tick().unwrap();
    b.place_order(spec("b", Side::Buy, OrderKind::Market, 2)).unwrap();
    b.tick().unwrap();
    b.place_order(spec("s", Side::Sell, OrderKind::Market, 2)).unwrap();
    while b.tick().unwrap() {}

    let payments: f64 = b.operations().iter().map(|o| o.payment).sum();
    let cash = b.get_balance().unwrap().cash;
    assert!(
        (cash.total() - (100_000.0 + payments)).abs() < 1e-6,
        "cash {} vs initial + payments {}",
        cash.total(),
        100_000.0 + payments
    );
}

#[test]
fn every_fill_appends_a_trade_and_a_fee() {
    let mut b = broker(
        vec![(99.0, 101.0, 100.0), (109.0, 111.0, 110.0), (104.0, 106.0, 105.0)],
        1,
    );
    b.tick().unwrap();
    b.place_order(spec("b", Side::Buy, OrderKind::Market, 1)).unwrap();
    b.tick().unwrap();
    b.place_order(spec("s", Side::Sell, OrderKind::Market, 1)).unwrap();
    b.tick().unwrap();

    let ops = b.operations();
    let kinds: Vec<OperationKind> = ops.iter().map(|o| o.kind).collect();
    assert_eq!(
        kinds,
        vec![
            OperationKind::Buy,
            OperationKind::BrokerFee,
            OperationKind::Sell,
            OperationKind::BrokerFee,
        ]
    );
    // Fees reference their trade.
    assert_eq!(ops[1].parent_id.as_deref(), Some("b"));
    assert_eq!(ops[3].parent_id.as_deref(), Some("s"));
    // Trade timestamps come from the fill bar, not placement.
    assert_eq!(ops[2].date, options().from + chrono::Duration::minutes(2));
}
