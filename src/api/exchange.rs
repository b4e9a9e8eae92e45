//! Exchange capability consumed by the trading core.

use anyhow::Result;
use async_trait::async_trait;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::models::{InstrumentFilters, OrderAck, OrderRequest};

/// Raw position snapshot as reported by the exchange, before interpretation.
///
/// Fields are kept as strings: a flat account reports an empty side and may
/// report empty prices.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RawPosition {
    #[serde(default)]
    pub side: String,
    #[serde(default)]
    pub size: String,
    #[serde(default)]
    pub avg_price: String,
    #[serde(default)]
    pub unrealised_pnl: String,
}

/// Operations the engine needs from an exchange. Wire format, signing and
/// transport are the implementor's concern.
#[async_trait]
pub trait ExchangeClient: Send + Sync {
    /// Precision and minimum size for an instrument.
    async fn instrument_filters(&self, symbol: &str) -> Result<InstrumentFilters>;

    /// Closing prices of the most recent candles, oldest first.
    async fn recent_closes(&self, symbol: &str, interval: &str, limit: u32) -> Result<Vec<Decimal>>;

    /// Best ask price.
    async fn current_ask(&self, symbol: &str) -> Result<Decimal>;

    /// Current position snapshot, `None` when the exchange reports nothing.
    async fn position(&self, symbol: &str) -> Result<Option<RawPosition>>;

    async fn submit_order(&self, order: &OrderRequest) -> Result<OrderAck>;

    async fn cancel_order(&self, symbol: &str, client_order_id: &str) -> Result<OrderAck>;

    /// Cancel every open order on the symbol, returning the cancelled client ids.
    async fn cancel_all_orders(&self, symbol: &str) -> Result<Vec<String>>;

    /// Fail fast on invalid API keys.
    async fn check_credentials(&self) -> Result<()>;
}
