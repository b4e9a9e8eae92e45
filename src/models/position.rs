//! Position model representing the bot's current exposure on the instrument.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use super::OrderSide;

/// Direction of an open position.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum PositionSide {
    Long,
    Short,
}

/// Open position on the traded instrument. Absence of a position is modelled
/// as `Option::None`, never as a zero-sized `Position`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Position {
    /// Long or short
    pub side: PositionSide,

    /// Position size in base currency, always positive
    pub qty: Decimal,

    /// Average entry price
    pub avg_price: Decimal,

    /// Unrealized P&L in quote currency
    pub unrealized_pnl: Decimal,
}

impl Position {
    /// Side of the order that reduces this position.
    pub fn reverse_side(&self) -> OrderSide {
        match self.side {
            PositionSide::Long => OrderSide::Sell,
            PositionSide::Short => OrderSide::Buy,
        }
    }

    /// Current notional at the entry price.
    pub fn entry_value(&self) -> Decimal {
        self.qty * self.avg_price
    }
}

impl std::fmt::Display for Position {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{:?} {} @ {} (uPnL {})",
            self.side, self.qty, self.avg_price, self.unrealized_pnl
        )
    }
}
