//! Request and response types for the Bybit v5 REST API.

use serde::{Deserialize, Serialize};

/// Common response envelope. `ret_code` 0 means success.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ApiResponse<T> {
    pub ret_code: i64,
    #[serde(default)]
    pub ret_msg: String,
    pub result: Option<T>,
}

/// `result` shape shared by list endpoints.
#[derive(Debug, Clone, Deserialize)]
pub struct ListResult<T> {
    #[serde(default = "Vec::new")]
    pub list: Vec<T>,
}

/// Entry from /v5/market/instruments-info.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InstrumentInfo {
    #[serde(default)]
    pub price_scale: String,
    #[serde(default)]
    pub lot_size_filter: LotSizeFilter,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LotSizeFilter {
    #[serde(default)]
    pub min_order_qty: String,
}

/// Kline row: `[startTime, open, high, low, close, volume, turnover]`.
pub type KlineRow = Vec<String>;

/// Index of the close price inside a kline row.
pub const KLINE_CLOSE_INDEX: usize = 4;

/// Entry from /v5/market/tickers.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TickerInfo {
    #[serde(default)]
    pub ask1_price: String,
}

/// Result of order create/cancel endpoints.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OrderResult {
    #[serde(default)]
    pub order_id: String,
    #[serde(default)]
    pub order_link_id: String,
}

/// Body of POST /v5/order/create.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateOrderBody {
    pub category: String,
    pub symbol: String,
    pub side: String,
    pub order_type: String,
    pub qty: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub price: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub trigger_price: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub trigger_direction: Option<u8>,
    pub order_link_id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reduce_only: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub close_on_trigger: Option<bool>,
}

/// Body of POST /v5/order/cancel.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CancelOrderBody {
    pub category: String,
    pub symbol: String,
    pub order_link_id: String,
}

/// Body of POST /v5/order/cancel-all.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CancelAllBody {
    pub category: String,
    pub symbol: String,
}
