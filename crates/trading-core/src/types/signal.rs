//! Strategy signals.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use super::{IntentOrigin, Side, TradeIntent};

/// Direction of a strategy signal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SignalType {
    Buy,
    Sell,
}

impl SignalType {
    pub fn side(&self) -> Side {
        match self {
            SignalType::Buy => Side::Buy,
            SignalType::Sell => Side::Sell,
        }
    }
}

/// What caused the signal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SignalTrigger {
    /// Short SMA moved from at-or-below to strictly above the long SMA.
    GoldenCross,
    /// Short SMA is below the long SMA while long.
    CrossBelow,
    /// Unrealized gain retraced past the trailing fraction of its peak.
    TrailingStop,
    /// Final bar of a finite stream with a position still open.
    EndOfStream,
}

impl std::fmt::Display for SignalTrigger {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SignalTrigger::GoldenCross => write!(f, "golden cross"),
            SignalTrigger::CrossBelow => write!(f, "short SMA below long SMA"),
            SignalTrigger::TrailingStop => write!(f, "trailing stop"),
            SignalTrigger::EndOfStream => write!(f, "end of stream"),
        }
    }
}

/// A BUY or SELL emitted by a strategy for one bar.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Signal {
    pub symbol: String,
    pub signal_type: SignalType,
    pub trigger: SignalTrigger,
    /// Close of the bar that produced the signal
    pub price: f64,
    /// Whole shares to buy, or the full held quantity to sell
    pub quantity: Decimal,
    /// Bar timestamp (Unix milliseconds)
    pub timestamp: i64,
    pub short_sma: Option<f64>,
    pub long_sma: Option<f64>,
}

impl Signal {
    /// Bar timestamp as a DateTime.
    pub fn datetime(&self) -> DateTime<Utc> {
        DateTime::from_timestamp_millis(self.timestamp).unwrap_or_default()
    }

    /// Convert into a trade intent attributed to the named strategy.
    pub fn into_intent(self, strategy_name: &str) -> TradeIntent {
        TradeIntent {
            detected_at: self.datetime(),
            symbol: self.symbol,
            side: self.signal_type.side(),
            reference_price: self.price,
            origin: IntentOrigin::Strategy,
            source_id: strategy_name.to_string(),
            quantity: Some(self.quantity),
        }
    }
}
