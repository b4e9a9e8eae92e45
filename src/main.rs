//! MACD Crossover Trading Bot
//!
//! Trades a Bybit linear perpetual on MACD/signal line crossovers, with
//! operator commands for manual order placement and position management.

mod api;
mod bot;
mod error;
mod models;
mod trading;

#[cfg(test)]
mod testing;

use std::sync::Arc;

use anyhow::{bail, Context, Result};
use clap::{Args, Parser, Subcommand};
use rust_decimal::Decimal;
use tracing::{info, info_span, Level};
use tracing_subscriber::FmtSubscriber;

use crate::api::{BybitClient, ExchangeClient};
use crate::bot::Scheduler;
use crate::models::{OrderAck, OrderSide};
use crate::trading::{CycleOutcome, ExecutionEngine, TradingConfig};

/// MACD crossover trading bot CLI.
#[derive(Parser)]
#[command(name = "macdbot")]
#[command(about = "Trade MACD crossovers on Bybit linear perpetuals", long_about = None)]
struct Cli {
    /// Log level (trace, debug, info, warn, error)
    #[arg(short, long, default_value = "info")]
    log_level: String,

    #[command(flatten)]
    strategy: StrategyArgs,

    #[command(subcommand)]
    command: Commands,
}

/// Strategy settings, each overridable from the environment.
#[derive(Args)]
struct StrategyArgs {
    /// Instrument to trade
    #[arg(long, env = "SYMBOL", default_value = "BTCUSDT")]
    symbol: String,

    /// Seconds between cycles
    #[arg(long, env = "TIMEOUT", default_value = "30")]
    interval: u64,

    /// Upper bound on one cycle in seconds
    #[arg(long, env = "CYCLE_TIMEOUT", default_value = "30")]
    cycle_timeout: u64,

    /// Kline interval (1, 3, 5, 15, 30, 60, 120, 240, 360, 720, D, W, M)
    #[arg(long, env = "TIMEFRAME", default_value = "240")]
    timeframe: String,

    /// Candles fetched per cycle
    #[arg(long, env = "CANDLE_LIMIT", default_value = "200")]
    candle_limit: u32,

    /// Fast EMA period
    #[arg(long, env = "MACD_FAST", default_value = "12")]
    macd_fast: usize,

    /// Slow EMA period
    #[arg(long, env = "MACD_SLOW", default_value = "26")]
    macd_slow: usize,

    /// Signal line period
    #[arg(long, env = "MACD_SIGNAL", default_value = "9")]
    macd_signal: usize,

    /// Order quantity in base currency
    #[arg(long, env = "TRADE_QTY", default_value = "0.001")]
    trade_qty: Decimal,

    /// Client order id prefix
    #[arg(long, env = "ORDER_PREFIX", default_value = "macd")]
    order_prefix: String,
}

impl StrategyArgs {
    fn into_config(self) -> TradingConfig {
        TradingConfig {
            symbol: self.symbol,
            interval_secs: self.interval,
            cycle_timeout_secs: self.cycle_timeout,
            timeframe: self.timeframe,
            candle_limit: self.candle_limit,
            macd_fast: self.macd_fast,
            macd_slow: self.macd_slow,
            macd_signal: self.macd_signal,
            trade_qty: self.trade_qty,
            order_prefix: self.order_prefix,
        }
    }
}

#[derive(Subcommand)]
enum Commands {
    /// Start the trading loop (Ctrl+C to stop)
    Run,

    /// Run a single cycle and exit
    Check,

    /// Show instrument precision filters
    Filters,

    /// Show the current position
    Position,

    /// Show the latest MACD values and signal
    Signal,

    /// Place a market order for a base quantity
    Market {
        /// Quantity in base currency
        #[arg(short, long)]
        qty: Decimal,

        /// Buy or Sell
        #[arg(short, long)]
        side: OrderSide,
    },

    /// Place a market order sized in quote currency
    MarketQuote {
        /// Amount in quote currency (e.g. USDT)
        #[arg(short, long)]
        amount: Decimal,

        /// Buy or Sell
        #[arg(short, long)]
        side: OrderSide,
    },

    /// Place a limit order a percentage away from the current ask
    Limit {
        /// Quantity in base currency
        #[arg(short, long)]
        qty: Decimal,

        /// Buy or Sell
        #[arg(short, long)]
        side: OrderSide,

        /// Distance from the ask in percent (above for sells, below for buys)
        #[arg(short, long)]
        distance_pct: Decimal,
    },

    /// Place a conditional order
    Conditional {
        /// Quantity in base currency
        #[arg(short, long)]
        qty: Decimal,

        /// Buy or Sell
        #[arg(short, long)]
        side: OrderSide,

        /// Trigger price
        #[arg(short, long)]
        trigger: Decimal,

        /// Limit price once triggered (market if omitted)
        #[arg(short, long)]
        price: Option<Decimal>,
    },

    /// Cancel an order by client order id
    Cancel {
        /// Client order id
        #[arg(long)]
        order_link_id: String,
    },

    /// Cancel all open orders on the symbol
    CancelAll,

    /// Close the current position with a reduce-only market order
    Close,

    /// Reverse the current position
    Reverse,

    /// Show current configuration
    Config,
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();
    let cli = Cli::parse();

    // Setup logging
    let log_level = match cli.log_level.to_lowercase().as_str() {
        "trace" => Level::TRACE,
        "debug" => Level::DEBUG,
        "warn" => Level::WARN,
        "error" => Level::ERROR,
        _ => Level::INFO,
    };

    let subscriber = FmtSubscriber::builder()
        .with_max_level(log_level)
        .with_target(false)
        .finish();
    tracing::subscriber::set_global_default(subscriber)?;

    let config = cli.strategy.into_config();
    config.validate().context("Invalid configuration")?;

    if let Commands::Config = cli.command {
        print_config(&config);
        return Ok(());
    }

    let client = BybitClient::from_env()?;
    info!(base_url = %client.base_url(), symbol = %config.symbol, "Bybit client initialized");
    let exchange: Arc<dyn ExchangeClient> = Arc::new(client);

    if let Commands::Run = cli.command {
        exchange.check_credentials().await?;
    }

    let span = info_span!("macd", symbol = %config.symbol);
    let engine = ExecutionEngine::connect(exchange, config, span).await?;

    match cli.command {
        Commands::Run => {
            let config = engine.config();
            println!("\n=== MACD Crossover Bot ===");
            println!("Symbol:    {}", config.symbol);
            println!("Timeframe: {}", config.timeframe);
            println!("MACD:      {}/{}/{}", config.macd_fast, config.macd_slow, config.macd_signal);
            println!("Trade Qty: {}", config.trade_qty);
            println!("Interval:  {}s", config.interval_secs);
            println!("Filters:   {}", engine.filters());
            println!("\nPress Ctrl+C to stop.\n");

            let stats = Scheduler::new(engine).run().await;
            println!("\n{}", stats);
        }

        Commands::Check => match engine.run_cycle().await {
            CycleOutcome::Idle(signal) => println!("No order placed (signal: {})", signal),
            CycleOutcome::Submitted(ack) => print_ack("Order submitted", &ack),
            CycleOutcome::Failed(reason) => bail!("Cycle failed: {}", reason),
        },

        Commands::Position => match engine.current_position().await? {
            Some(position) => {
                println!("\n=== Position ===");
                println!("Side:           {:?}", position.side);
                println!("Size:           {}", position.qty);
                println!("Entry Price:    {}", position.avg_price);
                println!("Entry Value:    {}", position.entry_value());
                println!("Unrealized P&L: {}", position.unrealized_pnl);
            }
            None => println!("No open position on {}", engine.config().symbol),
        },

        Commands::Signal => {
            let reading = engine.evaluate_signal().await?;
            println!("\n=== MACD ({} candles) ===", reading.samples);
            println!("MACD:   {:.6}", reading.macd);
            println!("Signal: {:.6}", reading.macd_signal);
            println!("Cross:  {}", reading.signal);
        }

        Commands::Market { qty, side } => {
            let ack = engine.place_market_order(qty, side).await?;
            print_ack("Market order submitted", &ack);
        }

        Commands::MarketQuote { amount, side } => {
            let ack = engine.place_market_order_by_quote(amount, side).await?;
            print_ack("Market order submitted", &ack);
        }

        Commands::Limit {
            qty,
            side,
            distance_pct,
        } => {
            let ack = engine.place_limit_order_by_percent(qty, side, distance_pct).await?;
            print_ack("Limit order submitted", &ack);
        }

        Commands::Conditional {
            qty,
            side,
            trigger,
            price,
        } => {
            let ack = engine.place_conditional_order(qty, side, trigger, price).await?;
            print_ack("Conditional order submitted", &ack);
        }

        Commands::Cancel { order_link_id } => {
            let ack = engine.cancel_order(&order_link_id).await?;
            print_ack("Order cancelled", &ack);
        }

        Commands::CancelAll => {
            let cancelled = engine.cancel_all_open_orders().await?;
            println!("Cancelled {} order(s)", cancelled.len());
            for id in cancelled {
                println!("  {}", id);
            }
        }

        Commands::Close => {
            let ack = engine.close_position().await?;
            print_ack("Close order submitted", &ack);
        }

        Commands::Reverse => {
            let ack = engine.reverse_position().await?;
            print_ack("Reverse order submitted", &ack);
        }

        Commands::Filters => {
            let filters = engine.filters();
            println!("\n=== {} Filters ===", engine.config().symbol);
            println!("Price Decimals: {}", filters.price_decimals);
            println!("Qty Decimals:   {}", filters.qty_decimals);
            println!("Min Qty:        {}", filters.min_qty);
        }

        Commands::Config => print_config(engine.config()),
    }

    Ok(())
}

fn print_ack(label: &str, ack: &OrderAck) {
    println!("{}", label);
    println!("  Order ID:        {}", ack.order_id);
    println!("  Client Order ID: {}", ack.client_order_id);
}

fn print_config(config: &TradingConfig) {
    println!("\n=== Trading Configuration ===\n");
    println!("Market:");
    println!("  Symbol:               {}", config.symbol);
    println!("  Timeframe:            {}", config.timeframe);
    println!("  Candles per Cycle:    {}", config.candle_limit);

    println!("\nIndicator:");
    println!("  MACD Fast:            {}", config.macd_fast);
    println!("  MACD Slow:            {}", config.macd_slow);
    println!("  MACD Signal:          {}", config.macd_signal);

    println!("\nOrders:");
    println!("  Trade Qty:            {}", config.trade_qty);
    println!("  Order Prefix:         {}", config.order_prefix);

    println!("\nSchedule:");
    println!("  Interval:             {}s", config.interval_secs);
    println!("  Cycle Timeout:        {}s", config.cycle_timeout_secs);
}
