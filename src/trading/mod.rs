//! Trading logic: indicator, crossover detection, order building, execution.

mod config;
mod engine;
mod indicator;
mod order_builder;
mod position_reader;
mod signal_detector;

pub use config::TradingConfig;
pub use engine::{CycleOutcome, ExecutionEngine};
