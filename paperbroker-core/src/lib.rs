//! paperbroker-core: a deterministic broker simulator for strategy testing.
//!
//! The engine replays a historical (or synthetic) bar window under a virtual
//! clock. Each `tick` advances one bar and matches every pending order
//! against the *previous* bar only, so a strategy can never trade on
//! information from the bar it is currently seeing. Fills settle through an
//! available/blocked balance ledger and land in an append-only operation
//! ledger, from which positions (FIFO and FILO cost basis) are recomputed.
//!
//! Entry points:
//! - [`engine::Broker`] — configure a run, place/cancel orders, tick.
//! - [`data::BarSource`] — pluggable bar providers ([`data::SyntheticSource`],
//!   [`data::CachedBarSource`]).
//!
//! Everything is single-threaded and deterministic: the same bar window and
//! the same order schedule always produce the same fills, balances, and
//! operations.

pub mod data;
pub mod domain;
pub mod engine;
