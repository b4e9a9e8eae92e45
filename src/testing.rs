//! In-memory exchange used by engine and scheduler tests.

use std::sync::Mutex;
use std::time::Duration;

use anyhow::{bail, Result};
use async_trait::async_trait;
use rust_decimal::Decimal;
use rust_decimal_macros::dec;

use crate::api::{ExchangeClient, RawPosition};
use crate::models::{InstrumentFilters, OrderAck, OrderRequest};

#[derive(Debug)]
struct MockState {
    filters: InstrumentFilters,
    closes: Vec<Decimal>,
    ask: Decimal,
    position: Option<RawPosition>,
    submitted: Vec<OrderRequest>,
    cancelled: Vec<String>,
    open_orders: Vec<String>,
    closes_failures: usize,
    closes_calls: usize,
    closes_delay: Option<Duration>,
    order_spans: Vec<Option<String>>,
}

pub struct MockExchange {
    state: Mutex<MockState>,
}

impl MockExchange {
    pub fn new() -> Self {
        Self {
            state: Mutex::new(MockState {
                filters: InstrumentFilters {
                    price_decimals: 2,
                    qty_decimals: 3,
                    min_qty: dec!(0.001),
                },
                closes: Vec::new(),
                ask: dec!(30000),
                position: None,
                submitted: Vec::new(),
                cancelled: Vec::new(),
                open_orders: Vec::new(),
                closes_failures: 0,
                closes_calls: 0,
                closes_delay: None,
                order_spans: Vec::new(),
            }),
        }
    }

    pub fn with_closes(self, closes: &[f64]) -> Self {
        self.state.lock().unwrap().closes = closes
            .iter()
            .map(|c| Decimal::try_from(*c).unwrap())
            .collect();
        self
    }

    pub fn with_position(self, side: &str, size: &str) -> Self {
        self.state.lock().unwrap().position = Some(RawPosition {
            side: side.to_string(),
            size: size.to_string(),
            avg_price: "30000".to_string(),
            unrealised_pnl: "0".to_string(),
        });
        self
    }

    pub fn with_ask(self, ask: Decimal) -> Self {
        self.state.lock().unwrap().ask = ask;
        self
    }

    pub fn with_open_orders(self, ids: &[&str]) -> Self {
        self.state.lock().unwrap().open_orders = ids.iter().map(|s| s.to_string()).collect();
        self
    }

    /// Fail the next `n` close price requests.
    pub fn fail_closes(self, n: usize) -> Self {
        self.state.lock().unwrap().closes_failures = n;
        self
    }

    pub fn delay_closes(self, delay: Duration) -> Self {
        self.state.lock().unwrap().closes_delay = Some(delay);
        self
    }

    pub fn submitted(&self) -> Vec<OrderRequest> {
        self.state.lock().unwrap().submitted.clone()
    }

    pub fn cancelled(&self) -> Vec<String> {
        self.state.lock().unwrap().cancelled.clone()
    }

    pub fn closes_calls(&self) -> usize {
        self.state.lock().unwrap().closes_calls
    }

    /// Name of the span active at each order submission or cancellation.
    pub fn order_spans(&self) -> Vec<Option<String>> {
        self.state.lock().unwrap().order_spans.clone()
    }
}

#[async_trait]
impl ExchangeClient for MockExchange {
    async fn instrument_filters(&self, _symbol: &str) -> Result<InstrumentFilters> {
        Ok(self.state.lock().unwrap().filters)
    }

    async fn recent_closes(&self, _symbol: &str, _interval: &str, limit: u32) -> Result<Vec<Decimal>> {
        let delay = {
            let mut state = self.state.lock().unwrap();
            state.closes_calls += 1;
            if state.closes_failures > 0 {
                state.closes_failures -= 1;
                bail!("simulated network failure");
            }
            state.closes_delay
        };
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }

        let state = self.state.lock().unwrap();
        let skip = state.closes.len().saturating_sub(limit as usize);
        Ok(state.closes[skip..].to_vec())
    }

    async fn current_ask(&self, _symbol: &str) -> Result<Decimal> {
        Ok(self.state.lock().unwrap().ask)
    }

    async fn position(&self, _symbol: &str) -> Result<Option<RawPosition>> {
        Ok(self.state.lock().unwrap().position.clone())
    }

    async fn submit_order(&self, order: &OrderRequest) -> Result<OrderAck> {
        let mut state = self.state.lock().unwrap();
        state.order_spans.push(current_span_name());
        state.submitted.push(order.clone());
        Ok(OrderAck {
            order_id: format!("order-{}", state.submitted.len()),
            client_order_id: order.client_order_id.clone(),
        })
    }

    async fn cancel_order(&self, _symbol: &str, client_order_id: &str) -> Result<OrderAck> {
        let mut state = self.state.lock().unwrap();
        state.order_spans.push(current_span_name());
        state.cancelled.push(client_order_id.to_string());
        Ok(OrderAck {
            order_id: String::new(),
            client_order_id: client_order_id.to_string(),
        })
    }

    async fn cancel_all_orders(&self, _symbol: &str) -> Result<Vec<String>> {
        let mut state = self.state.lock().unwrap();
        state.order_spans.push(current_span_name());
        let ids = std::mem::take(&mut state.open_orders);
        state.cancelled.extend(ids.iter().cloned());
        Ok(ids)
    }

    async fn check_credentials(&self) -> Result<()> {
        Ok(())
    }
}

fn current_span_name() -> Option<String> {
    tracing::Span::current().metadata().map(|m| m.name().to_string())
}

/// Steady decline followed by a spike: MACD crosses above its signal line on
/// the last candle.
pub fn upward_cross_closes() -> Vec<f64> {
    let mut closes: Vec<f64> = (0..40).map(|i| 100.0 - i as f64).collect();
    closes.push(200.0);
    closes
}

/// Steady rise followed by a crash: MACD crosses below its signal line on the
/// last candle.
pub fn downward_cross_closes() -> Vec<f64> {
    let mut closes: Vec<f64> = (0..40).map(|i| 100.0 + i as f64).collect();
    closes.push(10.0);
    closes
}

/// Steady rise without a crossover on the last candle.
pub fn trending_closes() -> Vec<f64> {
    (0..41).map(|i| 100.0 + i as f64).collect()
}
