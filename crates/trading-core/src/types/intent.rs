//! Trade intents and their journal keys.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use super::Side;

/// Where a trade intent came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum IntentOrigin {
    /// Emitted by a strategy state machine
    Strategy,
    /// Detected outside the system (e.g. extracted from an alert email)
    External,
}

/// A detected desire to trade, awaiting the execution gate.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TradeIntent {
    pub symbol: String,
    pub side: Side,
    /// Price observed when the intent was detected
    pub reference_price: f64,
    pub detected_at: DateTime<Utc>,
    #[serde(default = "default_origin")]
    pub origin: IntentOrigin,
    /// Strategy name or external message id
    pub source_id: String,
    /// Strategy sizing hint; the gate sizes buys from its cash limit
    #[serde(default)]
    pub quantity: Option<Decimal>,
}

fn default_origin() -> IntentOrigin {
    IntentOrigin::External
}

impl TradeIntent {
    /// Create an externally detected intent.
    pub fn external(
        symbol: impl Into<String>,
        side: Side,
        reference_price: f64,
        detected_at: DateTime<Utc>,
        source_id: impl Into<String>,
    ) -> Self {
        Self {
            symbol: symbol.into(),
            side,
            reference_price,
            detected_at,
            origin: IntentOrigin::External,
            source_id: source_id.into(),
            quantity: None,
        }
    }

    /// Journal key: symbol plus the originating timestamp at second precision.
    pub fn key(&self) -> JournalKey {
        JournalKey::new(&self.symbol, self.detected_at.timestamp())
    }
}

/// Identity of one executed attempt in the transaction journal.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct JournalKey {
    pub symbol: String,
    /// Unix seconds
    pub order_timestamp: i64,
}

impl JournalKey {
    pub fn new(symbol: impl Into<String>, order_timestamp: i64) -> Self {
        Self {
            symbol: symbol.into(),
            order_timestamp,
        }
    }

    pub fn datetime(&self) -> DateTime<Utc> {
        DateTime::from_timestamp(self.order_timestamp, 0).unwrap_or_default()
    }
}

impl std::fmt::Display for JournalKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}@{}", self.symbol, self.order_timestamp)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn test_key_truncates_to_seconds() {
        let at = Utc.with_ymd_and_hms(2020, 6, 16, 14, 30, 5).unwrap()
            + chrono::Duration::milliseconds(750);
        let intent = TradeIntent::external("TWK", Side::Buy, 2.5, at, "msg-1");

        let key = intent.key();
        assert_eq!(key.symbol, "TWK");
        assert_eq!(key.order_timestamp, at.timestamp());
        assert_eq!(key.datetime(), Utc.with_ymd_and_hms(2020, 6, 16, 14, 30, 5).unwrap());
    }

    #[test]
    fn test_external_intent_deserializes_without_origin() {
        let json = r#"{
            "symbol": "TWK",
            "side": "sell",
            "reference_price": 3.1,
            "detected_at": "2020-06-16T14:30:00Z",
            "source_id": "msg-9"
        }"#;
        let intent: TradeIntent = serde_json::from_str(json).unwrap();
        assert_eq!(intent.origin, IntentOrigin::External);
        assert_eq!(intent.side, Side::Sell);
        assert!(intent.quantity.is_none());
    }
}
