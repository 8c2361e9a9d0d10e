//! Simulation engine: virtual clock, balance ledger, order lifecycle,
//! operation ledger, and the Broker that drives them.

pub mod broker;
pub mod clock;
pub mod ledger;
pub mod operations;
pub mod orders;

pub use broker::{Broker, BrokerOptions, EngineError};
pub use clock::BarFeed;
pub use ledger::{Balance, BalanceLedger, BalanceSnapshot, Bucket};
pub use operations::{compute_position, CostBasis, OperationLedger};
pub use orders::{OrderAuditEntry, OrderError, OrderManager};
