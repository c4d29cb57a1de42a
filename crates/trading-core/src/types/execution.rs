//! Execution gate outcomes.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use super::{Side, TradeIntent};
use crate::traits::Quote;

/// Why the gate did not get an order filled.
#[derive(Error, Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Rejection {
    /// Business rejection: the live quote drifted too far from the reference price.
    #[error("deviation exceeds limit")]
    DeviationExceeded { deviation: f64, limit: f64 },

    /// SELL intent for a symbol with nothing held.
    #[error("no position to sell")]
    NoPosition,

    /// Buy sized to zero shares under the cash limit.
    #[error("cash limit below one share")]
    ZeroQuantity,

    /// The broker answered the submission (or position lookup) with a failure.
    #[error("broker submission failed: {0}")]
    Broker(String),
}

impl Rejection {
    /// Broker faults are transient: the intent stays pending and the next
    /// poll retries it. Business rejections are final.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Rejection::Broker(_))
    }
}

/// Result of running one intent through the execution gate.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExecutionResult {
    pub intent: TradeIntent,
    pub matched_quote: Quote,
    /// max(quote, ref) / min(quote, ref) - 1, against the ask for buys and the bid for sells
    pub deviation_pct: f64,
    pub accepted: bool,
    pub rejection: Option<Rejection>,
    pub order_id: Option<String>,
    pub filled_price: Option<Decimal>,
    /// Shares submitted, when an order was sent
    pub quantity: Option<Decimal>,
}

impl ExecutionResult {
    /// Human-readable outcome for logs and the journal.
    pub fn reason(&self) -> String {
        match &self.rejection {
            Some(rejection) => rejection.to_string(),
            None => "accepted".to_string(),
        }
    }

    /// Price to record: the fill if reported, else the quote side matched.
    pub fn execution_price(&self) -> f64 {
        use rust_decimal::prelude::ToPrimitive;

        if let Some(price) = self.filled_price.and_then(|p| p.to_f64()) {
            return price;
        }
        match self.intent.side {
            Side::Buy => self.matched_quote.ask,
            Side::Sell => self.matched_quote.bid,
        }
    }

    /// Broker failures are not journaled so the next cycle can retry them.
    pub fn should_journal(&self) -> bool {
        self.accepted || !self.rejection.as_ref().is_some_and(Rejection::is_retryable)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use rust_decimal_macros::dec;

    fn result(side: Side, rejection: Option<Rejection>) -> ExecutionResult {
        ExecutionResult {
            intent: TradeIntent::external("AAPL", side, 10.0, Utc::now(), "test"),
            matched_quote: Quote::new("AAPL", 9.98, 10.02),
            deviation_pct: 0.002,
            accepted: rejection.is_none(),
            rejection,
            order_id: None,
            filled_price: None,
            quantity: Some(dec!(9)),
        }
    }

    #[test]
    fn test_reason_strings() {
        let rejected = result(
            Side::Buy,
            Some(Rejection::DeviationExceeded {
                deviation: 0.06,
                limit: 0.05,
            }),
        );
        assert_eq!(rejected.reason(), "deviation exceeds limit");
        assert_eq!(result(Side::Sell, Some(Rejection::NoPosition)).reason(), "no position to sell");
        assert_eq!(result(Side::Buy, None).reason(), "accepted");
    }

    #[test]
    fn test_execution_price_falls_back_to_quote_side() {
        assert_eq!(result(Side::Buy, None).execution_price(), 10.02);
        assert_eq!(result(Side::Sell, None).execution_price(), 9.98);

        let mut filled = result(Side::Buy, None);
        filled.filled_price = Some(dec!(10.01));
        assert_eq!(filled.execution_price(), 10.01);
    }

    #[test]
    fn test_broker_failures_are_not_journaled() {
        assert!(result(Side::Buy, None).should_journal());
        assert!(result(Side::Sell, Some(Rejection::NoPosition)).should_journal());
        assert!(!result(Side::Buy, Some(Rejection::Broker("503".into()))).should_journal());
    }
}
