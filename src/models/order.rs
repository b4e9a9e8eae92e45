//! Order intents and exchange-ready order requests.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// Order direction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum OrderSide {
    Buy,
    Sell,
}

impl OrderSide {
    /// Wire representation used by the exchange.
    pub fn as_str(&self) -> &'static str {
        match self {
            OrderSide::Buy => "Buy",
            OrderSide::Sell => "Sell",
        }
    }
}

impl std::str::FromStr for OrderSide {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "buy" => Ok(OrderSide::Buy),
            "sell" => Ok(OrderSide::Sell),
            other => Err(format!("unknown order side '{}'", other)),
        }
    }
}

impl std::fmt::Display for OrderSide {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Price movement that arms a conditional order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum TriggerDirection {
    /// Triggers when the market rises to the trigger price
    Rise,
    /// Triggers when the market falls to the trigger price
    Fall,
}

impl TriggerDirection {
    /// Derive the direction from where the trigger sits relative to the market.
    pub fn from_prices(trigger_price: Decimal, market_price: Decimal) -> Self {
        if trigger_price > market_price {
            TriggerDirection::Rise
        } else {
            TriggerDirection::Fall
        }
    }

    /// Exchange code: 1 = rise, 2 = fall.
    pub fn code(&self) -> u8 {
        match self {
            TriggerDirection::Rise => 1,
            TriggerDirection::Fall => 2,
        }
    }
}

/// Order quantity, in base currency or as a quote amount to convert.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OrderQty {
    /// Quantity of the traded asset (BTC, XRP, ...)
    Base(Decimal),
    /// Amount of quote currency (USDT) converted at `price`
    Quote { amount: Decimal, price: Decimal },
}

/// Order type, each variant carrying only the fields it uses.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OrderKind {
    Market,
    Limit {
        price: Decimal,
    },
    Conditional {
        trigger_price: Decimal,
        direction: TriggerDirection,
        /// Limit price once triggered; market when absent
        limit_price: Option<Decimal>,
    },
}

/// Desired trade, produced by the engine and consumed once by the order builder.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct OrderIntent {
    pub side: OrderSide,
    pub qty: OrderQty,
    pub kind: OrderKind,
    /// Only decrease an existing position, close on trigger
    pub reduce_only: bool,
}

impl OrderIntent {
    /// Market order for a base-currency quantity.
    pub fn market(side: OrderSide, qty: Decimal) -> Self {
        Self {
            side,
            qty: OrderQty::Base(qty),
            kind: OrderKind::Market,
            reduce_only: false,
        }
    }

    /// Limit order for a base-currency quantity.
    pub fn limit(side: OrderSide, qty: Decimal, price: Decimal) -> Self {
        Self {
            side,
            qty: OrderQty::Base(qty),
            kind: OrderKind::Limit { price },
            reduce_only: false,
        }
    }

    pub fn reduce_only(mut self) -> Self {
        self.reduce_only = true;
        self
    }
}

/// Rounded, fully-qualified order ready for submission.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OrderRequest {
    pub symbol: String,
    pub side: OrderSide,
    /// Base-currency quantity, rounded down to the instrument's precision
    pub qty: Decimal,
    pub kind: OrderKind,
    pub reduce_only: bool,
    pub close_on_trigger: bool,
    pub client_order_id: String,
}

impl OrderRequest {
    /// Short label for logging.
    pub fn kind_label(&self) -> &'static str {
        match self.kind {
            OrderKind::Market => "market",
            OrderKind::Limit { .. } => "limit",
            OrderKind::Conditional { .. } => "conditional",
        }
    }
}

/// Exchange acknowledgement of an order operation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderAck {
    /// Exchange-assigned order id
    pub order_id: String,
    /// Our client order id, echoed back
    pub client_order_id: String,
}
