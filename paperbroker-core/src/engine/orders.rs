//! OrderManager — the order lifecycle state machine.
//!
//! Transitions: New → Filled, New → Cancelled. Both are terminal; any
//! transition out of a terminal state is an InvalidState error. Orders are
//! stored in placement order, which is also the matching order on each tick.
//!
//! Every transition is recorded in an audit trail; adapters that need a push
//! stream of order state changes can drain it.

use crate::domain::{Order, OrderId, OrderStatus};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum OrderError {
    #[error("order not found: {0}")]
    NotFound(OrderId),

    #[error("order {id} is in terminal state {status:?}")]
    InvalidState { id: OrderId, status: OrderStatus },
}

/// Audit trail entry for one order state transition.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OrderAuditEntry {
    pub order_id: OrderId,
    pub from: OrderStatus,
    pub to: OrderStatus,
    pub time: Option<DateTime<Utc>>,
}

#[derive(Default)]
pub struct OrderManager {
    orders: Vec<Order>,
    audit_trail: Vec<OrderAuditEntry>,
}

impl OrderManager {
    pub fn new() -> Self {
        Self::default()
    }

    /// Store a freshly placed order. Idempotent on the order id: re-inserting
    /// an existing id returns the stored order unchanged.
    pub fn insert(&mut self, order: Order) -> &Order {
        debug_assert!(order.status == OrderStatus::New, "inserted order must be New");
        if let Some(i) = self.index_of(&order.id) {
            return &self.orders[i];
        }
        log::debug!(
            "order created: {:?} {} {} lot(s) @ {}",
            order.side,
            order.instrument,
            order.lots_requested,
            order.initial_price,
        );
        self.orders.push(order);
        self.orders.last().unwrap()
    }

    pub fn get(&self, id: &OrderId) -> Option<&Order> {
        self.index_of(id).map(|i| &self.orders[i])
    }

    /// Orders still awaiting a fill, in placement order.
    pub fn pending(&self) -> Vec<&Order> {
        self.orders
            .iter()
            .filter(|o| o.status == OrderStatus::New)
            .collect()
    }

    /// Cancel a resting order. The caller reverses the balance block.
    pub fn cancel(&mut self, id: &OrderId, time: Option<DateTime<Utc>>) -> Result<&Order, OrderError> {
        let i = self.index_of(id).ok_or_else(|| OrderError::NotFound(id.clone()))?;
        if self.orders[i].is_terminal() {
            return Err(OrderError::InvalidState {
                id: id.clone(),
                status: self.orders[i].status,
            });
        }
        self.transition(i, OrderStatus::Cancelled, time);
        log::debug!("order cancelled: {id}");
        Ok(&self.orders[i])
    }

    /// Transition an order to Filled, recording the executed amounts.
    /// The executed totals overwrite the initial `total_amount`.
    pub fn mark_filled(
        &mut self,
        id: &OrderId,
        executed_price: f64,
        executed_order_amount: f64,
        executed_commission: f64,
        time: Option<DateTime<Utc>>,
    ) -> Result<&Order, OrderError> {
        let i = self.index_of(id).ok_or_else(|| OrderError::NotFound(id.clone()))?;
        if self.orders[i].is_terminal() {
            return Err(OrderError::InvalidState {
                id: id.clone(),
                status: self.orders[i].status,
            });
        }

        {
            let order = &mut self.orders[i];
            order.lots_executed = order.lots_requested;
            order.executed_price = executed_price;
            order.executed_order_amount = executed_order_amount;
            order.executed_commission = executed_commission;
            order.total_amount = executed_order_amount + executed_commission;
        }
        self.transition(i, OrderStatus::Filled, time);

        let order = &self.orders[i];
        log::debug!(
            "order filled: {:?} {} {} lot(s) @ {}",
            order.side,
            order.instrument,
            order.lots_executed,
            order.executed_price,
        );
        Ok(order)
    }

    pub fn audit_trail(&self) -> &[OrderAuditEntry] {
        &self.audit_trail
    }

    fn index_of(&self, id: &OrderId) -> Option<usize> {
        self.orders.iter().position(|o| &o.id == id)
    }

    fn transition(&mut self, i: usize, to: OrderStatus, time: Option<DateTime<Utc>>) {
        let from = self.orders[i].status;
        self.orders[i].status = to;
        self.audit_trail.push(OrderAuditEntry {
            order_id: self.orders[i].id.clone(),
            from,
            to,
            time,
        });
    }
}
