//! Domain types: bars, instruments, orders, operations, positions.

pub mod bar;
pub mod instrument;
pub mod operation;
pub mod order;
pub mod position;

pub use bar::{BarInterval, PriceBar};
pub use instrument::{Instrument, InstrumentError, InstrumentResolver, StaticInstruments};
pub use operation::{Operation, OperationKind, OperationState};
pub use order::{Order, OrderId, OrderKind, OrderSpec, OrderStatus, Side};
pub use position::Position;
