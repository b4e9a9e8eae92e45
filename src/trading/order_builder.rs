//! Order construction: precision rounding and client order ids.

use std::sync::atomic::{AtomicU64, Ordering};

use chrono::Utc;
use rust_decimal::{Decimal, RoundingStrategy};

use crate::error::TradingError;
use crate::models::{InstrumentFilters, OrderIntent, OrderKind, OrderQty, OrderRequest};

/// Longest client order id the exchange accepts.
pub const MAX_CLIENT_ORDER_ID_LEN: usize = 36;

/// Sequence numbers wrap at six digits to keep ids within the length limit.
const SEQUENCE_MODULUS: u64 = 1_000_000;

/// Truncate `value` toward zero to `decimals` fractional digits.
///
/// Exact decimal arithmetic: a quantity is never rounded up past the
/// available balance and a price never past a tighter tick.
pub fn round_down(value: Decimal, decimals: u32) -> Decimal {
    value.round_dp_with_strategy(decimals, RoundingStrategy::ToZero)
}

/// Turns order intents into exchange-ready requests for one instrument.
pub struct OrderBuilder {
    symbol: String,
    prefix: String,
    filters: InstrumentFilters,
    sequence: AtomicU64,
}

impl OrderBuilder {
    pub fn new(symbol: impl Into<String>, prefix: impl Into<String>, filters: InstrumentFilters) -> Self {
        Self {
            symbol: symbol.into(),
            prefix: prefix.into(),
            filters,
            sequence: AtomicU64::new(0),
        }
    }

    pub fn filters(&self) -> &InstrumentFilters {
        &self.filters
    }

    /// Round every numeric field of the intent and attach a fresh client id.
    ///
    /// Fails with `OrderTooSmall` when the rounded quantity is below the
    /// instrument minimum, and with `InvalidOrder` for prices that round to
    /// zero or less.
    pub fn build(&self, intent: &OrderIntent) -> Result<OrderRequest, TradingError> {
        let base_qty = match intent.qty {
            OrderQty::Base(qty) => qty,
            OrderQty::Quote { amount, price } => {
                if price <= Decimal::ZERO {
                    return Err(TradingError::InvalidOrder(format!(
                        "cannot convert quote amount at price {}",
                        price
                    )));
                }
                amount.checked_div(price).ok_or_else(|| {
                    TradingError::InvalidOrder(format!("cannot convert {} at price {}", amount, price))
                })?
            }
        };

        let qty = round_down(base_qty, self.filters.qty_decimals);
        if qty < self.filters.min_qty {
            return Err(TradingError::OrderTooSmall {
                qty,
                min_qty: self.filters.min_qty,
            });
        }

        let kind = match intent.kind {
            OrderKind::Market => OrderKind::Market,
            OrderKind::Limit { price } => OrderKind::Limit {
                price: self.round_price(price, "limit")?,
            },
            OrderKind::Conditional {
                trigger_price,
                direction,
                limit_price,
            } => OrderKind::Conditional {
                trigger_price: self.round_price(trigger_price, "trigger")?,
                direction,
                limit_price: limit_price
                    .map(|p| self.round_price(p, "limit"))
                    .transpose()?,
            },
        };

        Ok(OrderRequest {
            symbol: self.symbol.clone(),
            side: intent.side,
            qty,
            kind,
            reduce_only: intent.reduce_only,
            close_on_trigger: intent.reduce_only,
            client_order_id: self.next_client_order_id(),
        })
    }

    fn round_price(&self, price: Decimal, label: &str) -> Result<Decimal, TradingError> {
        let rounded = round_down(price, self.filters.price_decimals);
        if rounded <= Decimal::ZERO {
            return Err(TradingError::InvalidOrder(format!(
                "{} price {} rounds to {}",
                label, price, rounded
            )));
        }
        Ok(rounded)
    }

    /// `{prefix}_{symbol}_{unix_millis}_{seq}`. The per-process sequence keeps
    /// ids distinct when two orders share a millisecond.
    fn next_client_order_id(&self) -> String {
        let seq = (self.sequence.fetch_add(1, Ordering::Relaxed) + 1) % SEQUENCE_MODULUS;
        format!(
            "{}_{}_{}_{}",
            self.prefix,
            self.symbol,
            Utc::now().timestamp_millis(),
            seq
        )
    }
}
