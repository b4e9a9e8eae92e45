//! Execution engine: turns signals and position state into orders.
//!
//! Handles:
//! - The per-cycle decision (fetch closes, detect crossover, read position,
//!   submit at most one order)
//! - Order lifecycle primitives (cancel, cancel all, close, reverse)
//! - Conditional, limit-by-percent and quote-sized market orders

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{anyhow, Context, Result};
use rust_decimal::prelude::ToPrimitive;
use rust_decimal::Decimal;
use tracing::{debug, error, info, warn, Instrument, Span};

use crate::api::ExchangeClient;
use crate::error::TradingError;
use crate::models::{
    InstrumentFilters, OrderAck, OrderIntent, OrderKind, OrderQty, OrderSide, Position, Signal,
    TriggerDirection,
};

use super::indicator::{Indicator, Macd};
use super::order_builder::OrderBuilder;
use super::{position_reader, signal_detector, TradingConfig};

/// Result of one scheduled cycle. Failures are values, never errors.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CycleOutcome {
    /// Nothing to do this cycle
    Idle(Signal),
    /// An order was accepted by the exchange
    Submitted(OrderAck),
    /// The cycle was abandoned; the message has already been logged
    Failed(String),
}

/// Latest indicator values and the signal they produce.
#[derive(Debug, Clone, PartialEq)]
pub struct SignalReading {
    pub signal: Signal,
    pub macd: f64,
    pub macd_signal: f64,
    pub samples: usize,
}

/// Decision table for one cycle.
///
/// Opening needs a flat account and a Buy signal. A Sell signal sends the
/// fixed quantity whenever any position exists, whatever its side.
pub fn decide(signal: Signal, position: Option<&Position>, trade_qty: Decimal) -> Option<OrderIntent> {
    match (signal, position) {
        (Signal::Buy, None) => Some(OrderIntent::market(OrderSide::Buy, trade_qty)),
        (Signal::Sell, Some(_)) => Some(OrderIntent::market(OrderSide::Sell, trade_qty)),
        _ => None,
    }
}

/// Signal-to-order engine for a single instrument.
pub struct ExecutionEngine {
    exchange: Arc<dyn ExchangeClient>,
    indicator: Box<dyn Indicator>,
    builder: OrderBuilder,
    config: TradingConfig,
    cycle_timeout: Duration,
    span: Span,
}

impl ExecutionEngine {
    /// Load instrument filters and build the engine. Any failure here is fatal
    /// for the caller.
    pub async fn connect(exchange: Arc<dyn ExchangeClient>, config: TradingConfig, span: Span) -> Result<Self> {
        let filters = exchange
            .instrument_filters(&config.symbol)
            .await
            .with_context(|| format!("Failed to load instrument filters for {}", config.symbol))?;

        info!(
            symbol = %config.symbol,
            price_decimals = filters.price_decimals,
            qty_decimals = filters.qty_decimals,
            min_qty = %filters.min_qty,
            "Instrument filters loaded"
        );

        Ok(Self::new(exchange, config, filters, span))
    }

    pub fn new(
        exchange: Arc<dyn ExchangeClient>,
        config: TradingConfig,
        filters: InstrumentFilters,
        span: Span,
    ) -> Self {
        let indicator = Macd::new(config.macd_fast, config.macd_slow, config.macd_signal);
        let builder = OrderBuilder::new(config.symbol.clone(), config.order_prefix.clone(), filters);

        Self {
            exchange,
            indicator: Box::new(indicator),
            builder,
            cycle_timeout: config.cycle_timeout(),
            config,
            span,
        }
    }

    #[cfg(test)]
    pub fn with_cycle_timeout(mut self, timeout: Duration) -> Self {
        self.cycle_timeout = timeout;
        self
    }

    pub fn config(&self) -> &TradingConfig {
        &self.config
    }

    pub fn filters(&self) -> &InstrumentFilters {
        self.builder.filters()
    }

    /// Run one decision cycle. Never fails: errors and timeouts are logged and
    /// reported as `CycleOutcome::Failed`.
    pub async fn run_cycle(&self) -> CycleOutcome {
        let cycle = async {
            match tokio::time::timeout(self.cycle_timeout, self.try_cycle()).await {
                Ok(Ok(outcome)) => outcome,
                Ok(Err(e)) => {
                    let message = format!("{:#}", e);
                    match e.downcast_ref::<TradingError>() {
                        Some(TradingError::OrderTooSmall { .. }) => {
                            warn!(error = %message, "Order rejected before submission")
                        }
                        _ => error!(error = %message, "Cycle failed"),
                    }
                    CycleOutcome::Failed(message)
                }
                Err(_) => {
                    error!(timeout = ?self.cycle_timeout, "Cycle timed out");
                    CycleOutcome::Failed(format!("cycle timed out after {:?}", self.cycle_timeout))
                }
            }
        };

        cycle.instrument(self.span.clone()).await
    }

    async fn try_cycle(&self) -> Result<CycleOutcome> {
        let reading = self.read_signal().await?;
        if reading.signal.is_none() {
            debug!(macd = reading.macd, signal = reading.macd_signal, "No crossover");
            return Ok(CycleOutcome::Idle(Signal::None));
        }

        let position = self.read_current_position().await?;
        let Some(intent) = decide(reading.signal, position.as_ref(), self.config.trade_qty) else {
            info!(
                signal = %reading.signal,
                in_position = position.is_some(),
                "Signal ignored for current position state"
            );
            return Ok(CycleOutcome::Idle(reading.signal));
        };

        let ack = self.submit(&intent).await?;
        Ok(CycleOutcome::Submitted(ack))
    }

    /// Run `fut` inside the engine span so its events carry the symbol.
    async fn in_span<F: Future>(&self, fut: F) -> F::Output {
        fut.instrument(self.span.clone()).await
    }

    /// Fetch closes, compute the indicator and detect a crossover.
    pub async fn evaluate_signal(&self) -> Result<SignalReading> {
        self.in_span(self.read_signal()).await
    }

    async fn read_signal(&self) -> Result<SignalReading> {
        let closes = self
            .exchange
            .recent_closes(&self.config.symbol, &self.config.timeframe, self.config.candle_limit)
            .await
            .context("Failed to fetch close prices")?;

        if closes.len() < self.indicator.warmup_periods() {
            debug!(
                samples = closes.len(),
                warmup = self.indicator.warmup_periods(),
                "Close series shorter than indicator warm-up"
            );
        }

        let closes = closes
            .iter()
            .map(|c| c.to_f64().ok_or_else(|| anyhow!("Close price {} out of range", c)))
            .collect::<Result<Vec<f64>>>()?;

        let lines = self.indicator.compute(&closes);
        let signal = signal_detector::detect(&lines.fast, &lines.signal)?;

        Ok(SignalReading {
            signal,
            macd: lines.fast.last().copied().unwrap_or_default(),
            macd_signal: lines.signal.last().copied().unwrap_or_default(),
            samples: closes.len(),
        })
    }

    /// Current position, `None` when flat.
    pub async fn current_position(&self) -> Result<Option<Position>> {
        self.in_span(self.read_current_position()).await
    }

    async fn read_current_position(&self) -> Result<Option<Position>> {
        let raw = self
            .exchange
            .position(&self.config.symbol)
            .await
            .context("Failed to fetch position")?;

        let position = position_reader::read(raw.as_ref())?;
        if let Some(p) = &position {
            debug!(position = %p, "Current position");
        }
        Ok(position)
    }

    /// Market order for a base-currency quantity.
    pub async fn place_market_order(&self, qty: Decimal, side: OrderSide) -> Result<OrderAck> {
        self.in_span(self.submit(&OrderIntent::market(side, qty))).await
    }

    /// Market order sized in quote currency, converted at the current ask.
    pub async fn place_market_order_by_quote(&self, amount: Decimal, side: OrderSide) -> Result<OrderAck> {
        self.in_span(async {
            let price = self.exchange.current_ask(&self.config.symbol).await?;
            let intent = OrderIntent {
                side,
                qty: OrderQty::Quote { amount, price },
                kind: OrderKind::Market,
                reduce_only: false,
            };
            self.submit(&intent).await
        })
        .await
    }

    /// Limit order `distance_pct` percent away from the current ask: above it
    /// for sells, below it for buys.
    pub async fn place_limit_order_by_percent(
        &self,
        qty: Decimal,
        side: OrderSide,
        distance_pct: Decimal,
    ) -> Result<OrderAck> {
        self.in_span(async {
            let current = self.exchange.current_ask(&self.config.symbol).await?;
            let price = limit_price_by_percent(current, side, distance_pct);
            self.submit(&OrderIntent::limit(side, qty, price)).await
        })
        .await
    }

    /// Conditional order armed when the market reaches `trigger_price`. The
    /// trigger direction follows from the trigger's position against the
    /// current ask.
    pub async fn place_conditional_order(
        &self,
        qty: Decimal,
        side: OrderSide,
        trigger_price: Decimal,
        limit_price: Option<Decimal>,
    ) -> Result<OrderAck> {
        self.in_span(async {
            let current = self.exchange.current_ask(&self.config.symbol).await?;
            let intent = OrderIntent {
                side,
                qty: OrderQty::Base(qty),
                kind: OrderKind::Conditional {
                    trigger_price,
                    direction: TriggerDirection::from_prices(trigger_price, current),
                    limit_price,
                },
                reduce_only: false,
            };
            self.submit(&intent).await
        })
        .await
    }

    pub async fn cancel_order(&self, client_order_id: &str) -> Result<OrderAck> {
        self.in_span(async {
            let ack = self
                .exchange
                .cancel_order(&self.config.symbol, client_order_id)
                .await
                .with_context(|| format!("Failed to cancel order {}", client_order_id))?;
            info!(client_order_id = %client_order_id, order_id = %ack.order_id, "Order cancelled");
            Ok::<_, anyhow::Error>(ack)
        })
        .await
    }

    /// Cancel every open order on the instrument.
    pub async fn cancel_all_open_orders(&self) -> Result<Vec<String>> {
        self.in_span(async {
            let cancelled = self
                .exchange
                .cancel_all_orders(&self.config.symbol)
                .await
                .context("Failed to cancel open orders")?;
            info!(count = cancelled.len(), "All open orders cancelled");
            Ok::<_, anyhow::Error>(cancelled)
        })
        .await
    }

    /// Flip the position: a market order on the reverse side for twice the
    /// current size.
    pub async fn reverse_position(&self) -> Result<OrderAck> {
        self.in_span(async {
            let position = self.require_position().await?;
            info!(position = %position, "Reversing position");
            self.submit(&OrderIntent::market(position.reverse_side(), position.qty * Decimal::TWO))
                .await
        })
        .await
    }

    /// Flatten the position with a reduce-only market order.
    pub async fn close_position(&self) -> Result<OrderAck> {
        self.in_span(async {
            let position = self.require_position().await?;
            info!(position = %position, "Closing position");
            self.submit(&OrderIntent::market(position.reverse_side(), position.qty).reduce_only())
                .await
        })
        .await
    }

    async fn require_position(&self) -> Result<Position> {
        self.read_current_position()
            .await?
            .ok_or_else(|| TradingError::NoPosition(self.config.symbol.clone()).into())
    }

    async fn submit(&self, intent: &OrderIntent) -> Result<OrderAck> {
        let request = self.builder.build(intent)?;
        info!(
            side = %request.side,
            kind = request.kind_label(),
            qty = %request.qty,
            reduce_only = request.reduce_only,
            client_order_id = %request.client_order_id,
            "Submitting order"
        );

        let ack = self
            .exchange
            .submit_order(&request)
            .await
            .with_context(|| format!("Order {} was not accepted", request.client_order_id))?;

        info!(order_id = %ack.order_id, client_order_id = %ack.client_order_id, "Order accepted");
        Ok(ack)
    }
}

/// `price * (100 ± distance_pct) / 100`, above the price for sells and below
/// it for buys.
pub fn limit_price_by_percent(price: Decimal, side: OrderSide, distance_pct: Decimal) -> Decimal {
    let hundred = Decimal::ONE_HUNDRED;
    match side {
        OrderSide::Sell => price * (hundred + distance_pct) / hundred,
        OrderSide::Buy => price * (hundred - distance_pct) / hundred,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::PositionSide;
    use crate::testing::{downward_cross_closes, trending_closes, upward_cross_closes, MockExchange};
    use rust_decimal_macros::dec;

    fn config() -> TradingConfig {
        TradingConfig {
            trade_qty: dec!(0.001),
            ..Default::default()
        }
    }

    async fn engine(mock: &Arc<MockExchange>, config: TradingConfig) -> ExecutionEngine {
        let exchange: Arc<dyn ExchangeClient> = mock.clone();
        ExecutionEngine::connect(exchange, config, Span::none()).await.unwrap()
    }

    fn position(side: PositionSide) -> Position {
        Position {
            side,
            qty: dec!(0.01),
            avg_price: dec!(30000),
            unrealized_pnl: Decimal::ZERO,
        }
    }

    #[test]
    fn test_decision_table() {
        let qty = dec!(0.001);
        let long = position(PositionSide::Long);
        let short = position(PositionSide::Short);

        let buy = Some(OrderIntent::market(OrderSide::Buy, qty));
        let sell = Some(OrderIntent::market(OrderSide::Sell, qty));

        assert_eq!(decide(Signal::Buy, None, qty), buy);
        assert_eq!(decide(Signal::Sell, None, qty), None);
        assert_eq!(decide(Signal::None, None, qty), None);

        assert_eq!(decide(Signal::Buy, Some(&long), qty), None);
        assert_eq!(decide(Signal::Sell, Some(&long), qty), sell);
        assert_eq!(decide(Signal::None, Some(&long), qty), None);

        // Short positions get the same fixed-size sell
        assert_eq!(decide(Signal::Buy, Some(&short), qty), None);
        assert_eq!(decide(Signal::Sell, Some(&short), qty), sell);
        assert_eq!(decide(Signal::None, Some(&short), qty), None);
    }

    #[test]
    fn test_limit_price_by_percent() {
        assert_eq!(limit_price_by_percent(dec!(30000), OrderSide::Sell, dec!(2)), dec!(30600));
        assert_eq!(limit_price_by_percent(dec!(30000), OrderSide::Buy, dec!(2)), dec!(29400));
    }

    #[tokio::test]
    async fn test_flat_buy_signal_opens_position() {
        let mock = Arc::new(MockExchange::new().with_closes(&upward_cross_closes()));
        let engine = engine(&mock, config()).await;

        let outcome = engine.run_cycle().await;

        let submitted = mock.submitted();
        assert_eq!(submitted.len(), 1);
        assert_eq!(submitted[0].side, OrderSide::Buy);
        assert_eq!(submitted[0].kind, OrderKind::Market);
        assert_eq!(submitted[0].qty, dec!(0.001));
        assert!(!submitted[0].reduce_only);
        assert!(matches!(outcome, CycleOutcome::Submitted(_)));
    }

    #[tokio::test]
    async fn test_sell_signal_with_position_sells_fixed_qty() {
        for side in ["Buy", "Sell"] {
            let mock = Arc::new(
                MockExchange::new()
                    .with_closes(&downward_cross_closes())
                    .with_position(side, "0.01"),
            );
            let engine = engine(&mock, config()).await;

            engine.run_cycle().await;

            let submitted = mock.submitted();
            assert_eq!(submitted.len(), 1);
            assert_eq!(submitted[0].side, OrderSide::Sell);
            assert_eq!(submitted[0].kind, OrderKind::Market);
            assert_eq!(submitted[0].qty, dec!(0.001));
        }
    }

    #[tokio::test]
    async fn test_buy_signal_with_position_is_ignored() {
        let mock = Arc::new(
            MockExchange::new()
                .with_closes(&upward_cross_closes())
                .with_position("Buy", "0.01"),
        );
        let engine = engine(&mock, config()).await;

        assert_eq!(engine.run_cycle().await, CycleOutcome::Idle(Signal::Buy));
        assert!(mock.submitted().is_empty());
    }

    #[tokio::test]
    async fn test_sell_signal_when_flat_is_ignored() {
        let mock = Arc::new(MockExchange::new().with_closes(&downward_cross_closes()));
        let engine = engine(&mock, config()).await;

        assert_eq!(engine.run_cycle().await, CycleOutcome::Idle(Signal::Sell));
        assert!(mock.submitted().is_empty());
    }

    #[tokio::test]
    async fn test_no_crossover_is_idle() {
        let mock = Arc::new(MockExchange::new().with_closes(&trending_closes()));
        let engine = engine(&mock, config()).await;

        assert_eq!(engine.run_cycle().await, CycleOutcome::Idle(Signal::None));
        assert!(mock.submitted().is_empty());
    }

    #[tokio::test]
    async fn test_too_small_quantity_is_not_submitted() {
        let mock = Arc::new(MockExchange::new().with_closes(&upward_cross_closes()));
        let config = TradingConfig {
            trade_qty: dec!(0.0005),
            ..Default::default()
        };
        let engine = engine(&mock, config).await;

        let outcome = engine.run_cycle().await;

        assert!(matches!(outcome, CycleOutcome::Failed(msg) if msg.contains("too small")));
        assert!(mock.submitted().is_empty());
    }

    #[tokio::test]
    async fn test_exchange_error_is_contained() {
        let mock = Arc::new(
            MockExchange::new()
                .with_closes(&upward_cross_closes())
                .fail_closes(1),
        );
        let engine = engine(&mock, config()).await;

        assert!(matches!(engine.run_cycle().await, CycleOutcome::Failed(_)));
        // Next cycle runs normally
        assert!(matches!(engine.run_cycle().await, CycleOutcome::Submitted(_)));
    }

    #[tokio::test]
    async fn test_insufficient_data_fails_cycle() {
        let mock = Arc::new(MockExchange::new().with_closes(&[100.0]));
        let engine = engine(&mock, config()).await;

        assert!(matches!(engine.run_cycle().await, CycleOutcome::Failed(_)));
    }

    #[tokio::test]
    async fn test_slow_cycle_times_out() {
        let mock = Arc::new(
            MockExchange::new()
                .with_closes(&upward_cross_closes())
                .delay_closes(Duration::from_millis(500)),
        );
        let engine = engine(&mock, config())
            .await
            .with_cycle_timeout(Duration::from_millis(20));

        let outcome = engine.run_cycle().await;

        assert!(matches!(outcome, CycleOutcome::Failed(msg) if msg.contains("timed out")));
        assert!(mock.submitted().is_empty());
    }

    #[tokio::test]
    async fn test_reverse_position_doubles_qty() {
        let mock = Arc::new(MockExchange::new().with_position("Buy", "0.01"));
        let engine = engine(&mock, config()).await;

        tokio_test::assert_ok!(engine.reverse_position().await);

        let submitted = mock.submitted();
        assert_eq!(submitted.len(), 1);
        assert_eq!(submitted[0].side, OrderSide::Sell);
        assert_eq!(submitted[0].qty, dec!(0.02));
        assert!(!submitted[0].reduce_only);
    }

    #[tokio::test]
    async fn test_reverse_when_flat_fails() {
        let mock = Arc::new(MockExchange::new());
        let engine = engine(&mock, config()).await;

        let err = tokio_test::assert_err!(engine.reverse_position().await);
        assert!(matches!(
            err.downcast_ref::<TradingError>(),
            Some(TradingError::NoPosition(_))
        ));
        assert!(mock.submitted().is_empty());
    }

    #[tokio::test]
    async fn test_close_position_is_reduce_only() {
        let mock = Arc::new(MockExchange::new().with_position("Sell", "0.5"));
        let engine = engine(&mock, config()).await;

        tokio_test::assert_ok!(engine.close_position().await);

        let submitted = mock.submitted();
        assert_eq!(submitted[0].side, OrderSide::Buy);
        assert_eq!(submitted[0].qty, dec!(0.5));
        assert!(submitted[0].reduce_only);
        assert!(submitted[0].close_on_trigger);
    }

    #[tokio::test]
    async fn test_conditional_trigger_direction() {
        let mock = Arc::new(MockExchange::new().with_ask(dec!(30000)));
        let engine = engine(&mock, config()).await;

        engine
            .place_conditional_order(dec!(0.01), OrderSide::Buy, dec!(31000), Some(dec!(31050)))
            .await
            .unwrap();
        engine
            .place_conditional_order(dec!(0.01), OrderSide::Sell, dec!(29000), None)
            .await
            .unwrap();

        let submitted = mock.submitted();
        assert_eq!(
            submitted[0].kind,
            OrderKind::Conditional {
                trigger_price: dec!(31000),
                direction: TriggerDirection::Rise,
                limit_price: Some(dec!(31050)),
            }
        );
        assert_eq!(
            submitted[1].kind,
            OrderKind::Conditional {
                trigger_price: dec!(29000),
                direction: TriggerDirection::Fall,
                limit_price: None,
            }
        );
    }

    #[tokio::test]
    async fn test_limit_order_by_percent() {
        let mock = Arc::new(MockExchange::new().with_ask(dec!(30000)));
        let engine = engine(&mock, config()).await;

        engine
            .place_limit_order_by_percent(dec!(0.01), OrderSide::Sell, dec!(2))
            .await
            .unwrap();

        assert_eq!(mock.submitted()[0].kind, OrderKind::Limit { price: dec!(30600) });
    }

    #[tokio::test]
    async fn test_market_order_by_quote() {
        let mock = Arc::new(MockExchange::new().with_ask(dec!(30000)));
        let engine = engine(&mock, config()).await;

        engine
            .place_market_order_by_quote(dec!(100), OrderSide::Buy)
            .await
            .unwrap();
        assert_eq!(mock.submitted()[0].qty, dec!(0.003));

        assert!(engine
            .place_market_order_by_quote(dec!(5), OrderSide::Buy)
            .await
            .is_err());
        assert_eq!(mock.submitted().len(), 1);
    }

    #[tokio::test]
    async fn test_operator_commands_log_inside_engine_span() {
        let _guard = tracing::subscriber::set_default(tracing_subscriber::registry());
        let mock = Arc::new(MockExchange::new().with_position("Buy", "0.01"));
        let exchange: Arc<dyn ExchangeClient> = mock.clone();
        let span = tracing::info_span!("macd", symbol = "BTCUSDT");
        let engine = ExecutionEngine::connect(exchange, config(), span).await.unwrap();

        engine.close_position().await.unwrap();
        engine.place_market_order(dec!(0.01), OrderSide::Buy).await.unwrap();
        engine.cancel_order("macd_BTCUSDT_1_1").await.unwrap();
        engine.cancel_all_open_orders().await.unwrap();

        assert_eq!(mock.order_spans(), vec![Some("macd".to_string()); 4]);
    }

    #[tokio::test]
    async fn test_cancel_operations() {
        let mock = Arc::new(MockExchange::new().with_open_orders(&["a", "b"]));
        let engine = engine(&mock, config()).await;

        engine.cancel_order("macd_BTCUSDT_1_1").await.unwrap();
        let cancelled = engine.cancel_all_open_orders().await.unwrap();

        assert_eq!(cancelled, vec!["a".to_string(), "b".to_string()]);
        assert_eq!(mock.cancelled(), vec!["macd_BTCUSDT_1_1", "a", "b"]);
    }
}
