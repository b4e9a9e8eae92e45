//! Interpret raw position snapshots.

use std::str::FromStr;

use rust_decimal::Decimal;

use crate::api::RawPosition;
use crate::error::TradingError;
use crate::models::{Position, PositionSide};

/// Turn an exchange snapshot into a typed position.
///
/// A missing snapshot or a size of zero or less means the account is flat and
/// yields `Ok(None)`.
pub fn read(snapshot: Option<&RawPosition>) -> Result<Option<Position>, TradingError> {
    let Some(raw) = snapshot else {
        return Ok(None);
    };

    let qty = parse_field(&raw.size, "size")?;
    if qty <= Decimal::ZERO {
        return Ok(None);
    }

    let side = match raw.side.as_str() {
        "Buy" => PositionSide::Long,
        "Sell" => PositionSide::Short,
        other => {
            return Err(TradingError::MalformedPosition(format!(
                "unknown side '{}' for size {}",
                other, qty
            )))
        }
    };

    Ok(Some(Position {
        side,
        qty,
        avg_price: parse_field(&raw.avg_price, "avgPrice")?,
        unrealized_pnl: parse_field(&raw.unrealised_pnl, "unrealisedPnl")?,
    }))
}

/// Empty fields read as zero; anything else must be a decimal.
fn parse_field(value: &str, name: &str) -> Result<Decimal, TradingError> {
    let value = value.trim();
    if value.is_empty() {
        return Ok(Decimal::ZERO);
    }
    Decimal::from_str(value)
        .or_else(|_| Decimal::from_scientific(value))
        .map_err(|_| TradingError::MalformedPosition(format!("invalid {} '{}'", name, value)))
}
