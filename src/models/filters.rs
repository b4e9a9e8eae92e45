//! Per-instrument precision and size constraints.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::error::TradingError;

/// Static precision/size filters for one instrument, loaded once at startup.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct InstrumentFilters {
    /// Maximum fractional digits accepted in prices
    pub price_decimals: u32,

    /// Maximum fractional digits accepted in quantities
    pub qty_decimals: u32,

    /// Minimum order quantity in base currency
    pub min_qty: Decimal,
}

impl InstrumentFilters {
    /// Build filters, rejecting a non-positive minimum quantity.
    pub fn new(price_decimals: u32, qty_decimals: u32, min_qty: Decimal) -> Result<Self, TradingError> {
        if min_qty <= Decimal::ZERO {
            return Err(TradingError::InvalidFilters(format!(
                "minimum order quantity must be positive, got {}",
                min_qty
            )));
        }
        // rust_decimal carries at most 28 fractional digits
        if price_decimals > 28 || qty_decimals > 28 {
            return Err(TradingError::InvalidFilters(format!(
                "precision out of range: price {} / qty {}",
                price_decimals, qty_decimals
            )));
        }

        Ok(Self {
            price_decimals,
            qty_decimals,
            min_qty,
        })
    }
}

impl std::fmt::Display for InstrumentFilters {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "price decimals {}, qty decimals {}, min qty {}",
            self.price_decimals, self.qty_decimals, self.min_qty
        )
    }
}
