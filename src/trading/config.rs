//! Trading configuration.

use anyhow::{bail, Result};
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde::{Deserialize, Serialize};
use tracing::warn;

use super::order_builder::MAX_CLIENT_ORDER_ID_LEN;
use crate::api::REQUEST_TIMEOUT;

/// Characters of a client order id taken by separators, the millisecond
/// timestamp and a six-digit sequence number.
const CLIENT_ORDER_ID_OVERHEAD: usize = 2 + 13 + 1 + 6;

/// Largest kline page Bybit serves.
const MAX_CANDLE_LIMIT: u32 = 1000;

/// Sequential exchange requests in a trading cycle: closes, position, order.
const REQUESTS_PER_CYCLE: u32 = 3;

/// Configuration for signal generation and order placement. Read once at
/// construction; changes need a restart.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TradingConfig {
    /// Instrument to trade (e.g. BTCUSDT)
    pub symbol: String,

    /// Seconds between cycles
    pub interval_secs: u64,

    /// Upper bound on a single cycle, in seconds
    pub cycle_timeout_secs: u64,

    /// Kline interval passed to the exchange (1, 5, 60, 240, D, ...)
    pub timeframe: String,

    /// Number of candles fetched per cycle
    pub candle_limit: u32,

    /// Fast EMA period
    pub macd_fast: usize,

    /// Slow EMA period
    pub macd_slow: usize,

    /// Signal line EMA period
    pub macd_signal: usize,

    /// Fixed order quantity in base currency
    pub trade_qty: Decimal,

    /// Prefix of generated client order ids
    pub order_prefix: String,
}

impl Default for TradingConfig {
    fn default() -> Self {
        Self {
            symbol: "BTCUSDT".to_string(),
            interval_secs: 30,
            cycle_timeout_secs: 30,
            timeframe: "240".to_string(),
            candle_limit: 200,
            macd_fast: 12,
            macd_slow: 26,
            macd_signal: 9,
            trade_qty: dec!(0.001),
            order_prefix: "macd".to_string(),
        }
    }
}

impl TradingConfig {
    /// Reject configurations the bot cannot run with.
    pub fn validate(&self) -> Result<()> {
        if self.symbol.trim().is_empty() {
            bail!("symbol must not be empty");
        }
        if self.interval_secs == 0 {
            bail!("cycle interval must be at least 1 second");
        }
        if self.cycle_timeout_secs == 0 {
            bail!("cycle timeout must be at least 1 second");
        }
        if self.macd_fast == 0 || self.macd_signal == 0 {
            bail!("MACD periods must be at least 1");
        }
        if self.macd_fast >= self.macd_slow {
            bail!(
                "MACD fast period ({}) must be shorter than the slow period ({})",
                self.macd_fast,
                self.macd_slow
            );
        }
        if self.candle_limit < 2 || self.candle_limit > MAX_CANDLE_LIMIT {
            bail!("candle limit must be between 2 and {}", MAX_CANDLE_LIMIT);
        }
        if self.trade_qty <= Decimal::ZERO {
            bail!("trade quantity must be positive, got {}", self.trade_qty);
        }
        if self.order_prefix.is_empty() {
            bail!("order prefix must not be empty");
        }
        let id_len = self.order_prefix.len() + self.symbol.len() + CLIENT_ORDER_ID_OVERHEAD;
        if id_len > MAX_CLIENT_ORDER_ID_LEN {
            bail!(
                "order prefix '{}' is too long for {}: client order ids would reach {} characters (max {})",
                self.order_prefix,
                self.symbol,
                id_len,
                MAX_CLIENT_ORDER_ID_LEN
            );
        }

        let warmup = self.macd_slow.saturating_add(self.macd_signal);
        if (self.candle_limit as usize) < warmup {
            warn!(
                candle_limit = self.candle_limit,
                warmup = warmup,
                "Candle limit is below the MACD warm-up length, signals will be unreliable"
            );
        }

        if !self.cycle_timeout_covers_requests() {
            warn!(
                cycle_timeout_secs = self.cycle_timeout_secs,
                request_timeout = ?REQUEST_TIMEOUT,
                "Cycle timeout is shorter than three request timeouts, a slow order may be reported as failed"
            );
        }

        Ok(())
    }

    /// Whether a cycle can wait out every request timeout it may hit.
    pub fn cycle_timeout_covers_requests(&self) -> bool {
        self.cycle_timeout() >= REQUEST_TIMEOUT * REQUESTS_PER_CYCLE
    }

    /// Cycle interval as a `Duration`.
    pub fn interval(&self) -> std::time::Duration {
        std::time::Duration::from_secs(self.interval_secs)
    }

    /// Cycle timeout as a `Duration`.
    pub fn cycle_timeout(&self) -> std::time::Duration {
        std::time::Duration::from_secs(self.cycle_timeout_secs)
    }
}
