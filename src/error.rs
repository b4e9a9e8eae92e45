//! Domain errors raised by the trading core.
//!
//! Transport and bootstrap failures travel as `anyhow::Error`; these variants
//! cover conditions the engine itself detects and that callers may want to
//! match on.

use rust_decimal::Decimal;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum TradingError {
    /// Fewer than two aligned indicator points were available.
    #[error("need at least 2 indicator points, got {0}")]
    InsufficientData(usize),

    /// Fast and signal lines are not index-aligned.
    #[error("indicator lines are misaligned: fast has {fast} points, signal has {signal}")]
    MisalignedLines { fast: usize, signal: usize },

    /// Rounded quantity fell below the instrument minimum.
    #[error("order quantity {qty} is too small (minimum {min_qty})")]
    OrderTooSmall { qty: Decimal, min_qty: Decimal },

    /// An intent that cannot produce a valid order (non-positive price, ...).
    #[error("invalid order: {0}")]
    InvalidOrder(String),

    /// An operation required an open position but the account is flat.
    #[error("no open position on {0}")]
    NoPosition(String),

    /// Instrument metadata is missing or unusable.
    #[error("invalid instrument filters: {0}")]
    InvalidFilters(String),

    /// Position snapshot reports a size but cannot be interpreted.
    #[error("malformed position snapshot: {0}")]
    MalformedPosition(String),
}
