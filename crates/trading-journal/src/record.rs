//! Persisted journal records.

use std::collections::BTreeMap;

use chrono::{DateTime, FixedOffset};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use trading_core::types::{ExecutionResult, Side};

/// One executed or attempted order.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JournalRecord {
    pub transaction_type: Side,
    pub price: f64,
    /// Recording time in the exchange's time zone
    pub transaction_time_exchange: DateTime<FixedOffset>,
    /// Recording time in the process's local time zone
    pub transaction_time_local: DateTime<FixedOffset>,
    /// "accepted" or the rejection reason
    #[serde(default = "accepted")]
    pub outcome: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub quantity: Option<Decimal>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub order_id: Option<String>,
}

fn accepted() -> String {
    "accepted".to_string()
}

impl JournalRecord {
    /// Record for a gate result, stamped with the given recording times.
    pub fn from_result(
        result: &ExecutionResult,
        exchange_time: DateTime<FixedOffset>,
        local_time: DateTime<FixedOffset>,
    ) -> Self {
        Self {
            transaction_type: result.intent.side,
            price: result.execution_price(),
            transaction_time_exchange: exchange_time,
            transaction_time_local: local_time,
            outcome: result.reason(),
            quantity: result.quantity,
            order_id: result.order_id.clone(),
        }
    }

    pub fn is_accepted(&self) -> bool {
        self.outcome == "accepted"
    }
}

/// A day's store: symbol, then exchange-local `YYYY-MM-DD HH:MM:SS` order
/// timestamp, then record.
pub type DayStore = BTreeMap<String, BTreeMap<String, JournalRecord>>;
