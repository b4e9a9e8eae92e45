//! Bybit v5 REST client for the `linear` (USDT perpetual) category.
//!
//! This client handles:
//! - Public market data (instrument filters, klines, tickers)
//! - Signed private requests (positions, order placement and cancellation)
//! - Mapping between Bybit's wire format and the crate's order model

use std::str::FromStr;
use std::time::Duration;

use anyhow::{anyhow, bail, Context, Result};
use async_trait::async_trait;
use chrono::Utc;
use reqwest::header::CONTENT_TYPE;
use reqwest::{Client, Response};
use rust_decimal::Decimal;
use serde::de::DeserializeOwned;
use serde::Serialize;
use tracing::debug;

use crate::error::TradingError;
use crate::models::{InstrumentFilters, OrderAck, OrderKind, OrderRequest};

use super::auth::{signed_headers, Credentials, DEFAULT_RECV_WINDOW};
use super::exchange::{ExchangeClient, RawPosition};
use super::types::*;

/// Bybit API base URLs
pub const MAINNET_URL: &str = "https://api.bybit.com";
pub const TESTNET_URL: &str = "https://api-testnet.bybit.com";

/// Product category traded by the bot
const CATEGORY: &str = "linear";

/// Per-request HTTP timeout
pub const REQUEST_TIMEOUT: Duration = Duration::from_secs(10);

/// Bybit REST client.
pub struct BybitClient {
    http: Client,
    base_url: String,
    credentials: Credentials,
    recv_window: u64,
}

impl BybitClient {
    /// Create a client for mainnet or testnet.
    pub fn new(credentials: Credentials, testnet: bool) -> Result<Self> {
        let base_url = if testnet { TESTNET_URL } else { MAINNET_URL };
        Self::with_base_url(base_url.to_string(), credentials)
    }

    /// Create with custom base URL (for testing).
    pub fn with_base_url(base_url: String, credentials: Credentials) -> Result<Self> {
        let http = Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .build()
            .context("Failed to create HTTP client")?;

        Ok(Self {
            http,
            base_url,
            credentials,
            recv_window: DEFAULT_RECV_WINDOW,
        })
    }

    /// Create from environment variables:
    /// - API_KEY
    /// - SECRET
    /// - IS_TESTNET (defaults to true)
    pub fn from_env() -> Result<Self> {
        let api_key = std::env::var("API_KEY").context("API_KEY not set")?;
        let api_secret = std::env::var("SECRET").context("SECRET not set")?;
        let testnet = match std::env::var("IS_TESTNET") {
            Ok(v) => parse_bool(&v).with_context(|| format!("Invalid IS_TESTNET value '{}'", v))?,
            Err(_) => true,
        };

        Self::new(Credentials { api_key, api_secret }, testnet)
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    async fn public_get<T: DeserializeOwned>(&self, path: &str, params: &[(&str, String)]) -> Result<T> {
        let query = build_query(params);
        let url = format!("{}{}?{}", self.base_url, path, query);
        debug!(url = %url, "GET");

        let resp = self
            .http
            .get(&url)
            .send()
            .await
            .with_context(|| format!("Failed to send request to {}", path))?;

        read_envelope(resp, path).await
    }

    async fn private_get<T: DeserializeOwned>(&self, path: &str, params: &[(&str, String)]) -> Result<T> {
        let query = build_query(params);
        let url = format!("{}{}?{}", self.base_url, path, query);
        let headers = signed_headers(
            &self.credentials,
            Utc::now().timestamp_millis(),
            self.recv_window,
            &query,
        )?;
        debug!(url = %url, "GET (signed)");

        let resp = self
            .http
            .get(&url)
            .headers(headers)
            .send()
            .await
            .with_context(|| format!("Failed to send request to {}", path))?;

        read_envelope(resp, path).await
    }

    async fn private_post<T: DeserializeOwned, B: Serialize>(&self, path: &str, body: &B) -> Result<T> {
        let body = serde_json::to_string(body)?;
        let url = format!("{}{}", self.base_url, path);
        let headers = signed_headers(
            &self.credentials,
            Utc::now().timestamp_millis(),
            self.recv_window,
            &body,
        )?;
        debug!(url = %url, body = %body, "POST (signed)");

        let resp = self
            .http
            .post(&url)
            .headers(headers)
            .header(CONTENT_TYPE, "application/json")
            .body(body)
            .send()
            .await
            .with_context(|| format!("Failed to send request to {}", path))?;

        read_envelope(resp, path).await
    }
}

#[async_trait]
impl ExchangeClient for BybitClient {
    async fn instrument_filters(&self, symbol: &str) -> Result<InstrumentFilters> {
        let result: ListResult<InstrumentInfo> = self
            .public_get(
                "/v5/market/instruments-info",
                &[("category", CATEGORY.to_string()), ("symbol", symbol.to_string())],
            )
            .await?;

        let info = result
            .list
            .into_iter()
            .next()
            .ok_or_else(|| TradingError::InvalidFilters(format!("unknown instrument {}", symbol)))?;

        Ok(parse_filters(&info)?)
    }

    async fn recent_closes(&self, symbol: &str, interval: &str, limit: u32) -> Result<Vec<Decimal>> {
        let result: ListResult<KlineRow> = self
            .public_get(
                "/v5/market/kline",
                &[
                    ("category", CATEGORY.to_string()),
                    ("symbol", symbol.to_string()),
                    ("interval", interval.to_string()),
                    ("limit", limit.to_string()),
                ],
            )
            .await?;

        // Bybit returns the newest candle first
        let mut closes = result
            .list
            .iter()
            .map(|row| {
                let raw = row
                    .get(KLINE_CLOSE_INDEX)
                    .ok_or_else(|| anyhow!("Kline row has {} fields, expected at least 5", row.len()))?;
                Decimal::from_str(raw).with_context(|| format!("Invalid close price '{}'", raw))
            })
            .collect::<Result<Vec<_>>>()?;
        closes.reverse();

        Ok(closes)
    }

    async fn current_ask(&self, symbol: &str) -> Result<Decimal> {
        let result: ListResult<TickerInfo> = self
            .public_get(
                "/v5/market/tickers",
                &[("category", CATEGORY.to_string()), ("symbol", symbol.to_string())],
            )
            .await?;

        let ticker = result
            .list
            .into_iter()
            .next()
            .ok_or_else(|| anyhow!("No ticker for {}", symbol))?;

        let ask = Decimal::from_str(&ticker.ask1_price)
            .with_context(|| format!("Invalid ask price '{}'", ticker.ask1_price))?;
        debug!(symbol = %symbol, ask = %ask, "Current ask");

        Ok(ask)
    }

    async fn position(&self, symbol: &str) -> Result<Option<RawPosition>> {
        let result: ListResult<RawPosition> = self
            .private_get(
                "/v5/position/list",
                &[("category", CATEGORY.to_string()), ("symbol", symbol.to_string())],
            )
            .await?;

        Ok(result.list.into_iter().next())
    }

    async fn submit_order(&self, order: &OrderRequest) -> Result<OrderAck> {
        let body = create_order_body(order);
        let result: OrderResult = self.private_post("/v5/order/create", &body).await?;

        Ok(OrderAck {
            order_id: result.order_id,
            client_order_id: result.order_link_id,
        })
    }

    async fn cancel_order(&self, symbol: &str, client_order_id: &str) -> Result<OrderAck> {
        let body = CancelOrderBody {
            category: CATEGORY.to_string(),
            symbol: symbol.to_string(),
            order_link_id: client_order_id.to_string(),
        };
        let result: OrderResult = self.private_post("/v5/order/cancel", &body).await?;

        Ok(OrderAck {
            order_id: result.order_id,
            client_order_id: result.order_link_id,
        })
    }

    async fn cancel_all_orders(&self, symbol: &str) -> Result<Vec<String>> {
        let body = CancelAllBody {
            category: CATEGORY.to_string(),
            symbol: symbol.to_string(),
        };
        let result: ListResult<OrderResult> = self.private_post("/v5/order/cancel-all", &body).await?;

        Ok(result.list.into_iter().map(|o| o.order_link_id).collect())
    }

    async fn check_credentials(&self) -> Result<()> {
        let _: serde_json::Value = self
            .private_get(
                "/v5/account/wallet-balance",
                &[("accountType", "UNIFIED".to_string())],
            )
            .await
            .context("Credential check failed")?;

        Ok(())
    }
}

/// Unwrap the Bybit envelope, turning HTTP and `retCode` failures into errors.
async fn read_envelope<T: DeserializeOwned>(resp: Response, path: &str) -> Result<T> {
    if !resp.status().is_success() {
        let status = resp.status();
        let text = resp.text().await.unwrap_or_default();
        bail!("Request to {} failed: {} - {}", path, status, text);
    }

    let envelope: ApiResponse<T> = resp
        .json()
        .await
        .with_context(|| format!("Failed to parse {} response", path))?;

    if envelope.ret_code != 0 {
        bail!(
            "Request to {} rejected: retCode {} - {}",
            path,
            envelope.ret_code,
            envelope.ret_msg
        );
    }

    envelope
        .result
        .ok_or_else(|| anyhow!("Response from {} has no result", path))
}

fn build_query(params: &[(&str, String)]) -> String {
    params
        .iter()
        .map(|(k, v)| format!("{}={}", k, v))
        .collect::<Vec<_>>()
        .join("&")
}

/// Derive filters from instrument metadata. Quantity precision is the number
/// of fractional digits in the minimum order quantity.
fn parse_filters(info: &InstrumentInfo) -> Result<InstrumentFilters, TradingError> {
    let price_decimals: u32 = info.price_scale.parse().map_err(|_| {
        TradingError::InvalidFilters(format!("invalid priceScale '{}'", info.price_scale))
    })?;

    let raw_min = &info.lot_size_filter.min_order_qty;
    let min_qty = Decimal::from_str(raw_min)
        .map_err(|_| TradingError::InvalidFilters(format!("invalid minOrderQty '{}'", raw_min)))?;
    let qty_decimals = min_qty.normalize().scale();

    InstrumentFilters::new(price_decimals, qty_decimals, min_qty)
}

fn create_order_body(order: &OrderRequest) -> CreateOrderBody {
    let (order_type, price, trigger_price, trigger_direction) = match order.kind {
        OrderKind::Market => ("Market", None, None, None),
        OrderKind::Limit { price } => ("Limit", Some(price.to_string()), None, None),
        OrderKind::Conditional {
            trigger_price,
            direction,
            limit_price,
        } => (
            if limit_price.is_some() { "Limit" } else { "Market" },
            limit_price.map(|p| p.to_string()),
            Some(trigger_price.to_string()),
            Some(direction.code()),
        ),
    };

    CreateOrderBody {
        category: CATEGORY.to_string(),
        symbol: order.symbol.clone(),
        side: order.side.as_str().to_string(),
        order_type: order_type.to_string(),
        qty: order.qty.to_string(),
        price,
        trigger_price,
        trigger_direction,
        order_link_id: order.client_order_id.clone(),
        reduce_only: order.reduce_only.then_some(true),
        close_on_trigger: order.close_on_trigger.then_some(true),
    }
}

fn parse_bool(s: &str) -> Result<bool> {
    match s.trim().to_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "0" | "false" | "no" | "off" => Ok(false),
        _ => bail!("expected a boolean"),
    }
}
