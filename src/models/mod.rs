//! Data models for signals, positions, orders and instrument filters.

mod filters;
mod order;
mod position;
mod signal;

pub use filters::InstrumentFilters;
pub use order::{OrderAck, OrderIntent, OrderKind, OrderQty, OrderRequest, OrderSide, TriggerDirection};
pub use position::{Position, PositionSide};
pub use signal::Signal;
