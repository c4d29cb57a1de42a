//! Order requests and broker acknowledgements.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// Order side (buy or sell).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Side {
    Buy,
    Sell,
}

impl Side {
    /// Get the opposite side.
    pub fn opposite(&self) -> Self {
        match self {
            Side::Buy => Side::Sell,
            Side::Sell => Side::Buy,
        }
    }
}

impl std::fmt::Display for Side {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Side::Buy => write!(f, "BUY"),
            Side::Sell => write!(f, "SELL"),
        }
    }
}

/// Market order request handed to a broker.
///
/// Only day market orders are submitted; the gate has already checked the
/// live quote, so `expected_price` is the ask (buys) or bid (sells) it matched.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OrderRequest {
    /// Symbol to trade
    pub symbol: String,
    /// Buy or sell
    pub side: Side,
    /// Whole-share quantity
    pub quantity: Decimal,
    /// Price the gate expects the order to fill near
    pub expected_price: Option<Decimal>,
    /// Client-provided order ID
    pub client_order_id: Option<String>,
}

impl OrderRequest {
    /// Create a market order request.
    pub fn market(symbol: impl Into<String>, side: Side, quantity: Decimal) -> Self {
        Self {
            symbol: symbol.into(),
            side,
            quantity,
            expected_price: None,
            client_order_id: None,
        }
    }

    /// Attach the quote price the order was validated against.
    pub fn with_expected_price(mut self, price: Decimal) -> Self {
        self.expected_price = Some(price);
        self
    }

    /// Set a client order ID.
    pub fn with_client_order_id(mut self, id: impl Into<String>) -> Self {
        self.client_order_id = Some(id.into());
        self
    }
}

/// Successful broker response to an order submission.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OrderAck {
    /// Broker-assigned order ID
    pub order_id: String,
    pub symbol: String,
    pub side: Side,
    pub quantity: Decimal,
    /// Average fill price, when the broker reports an immediate fill
    pub filled_price: Option<Decimal>,
    pub submitted_at: DateTime<Utc>,
}
