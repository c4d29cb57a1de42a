//! Market data and quote collaborator traits.

use crate::error::DataError;
use crate::types::{Bar, Timeframe};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A real-time top-of-book quote.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Quote {
    /// Symbol
    pub symbol: String,
    /// Best bid price
    pub bid: f64,
    /// Best ask price
    pub ask: f64,
    /// Timestamp (Unix milliseconds)
    pub timestamp: i64,
}

impl Quote {
    /// Create a quote stamped with the current time.
    pub fn new(symbol: impl Into<String>, bid: f64, ask: f64) -> Self {
        Self {
            symbol: symbol.into(),
            bid,
            ask,
            timestamp: Utc::now().timestamp_millis(),
        }
    }

    /// A quote with a non-positive side cannot be used to price an order.
    pub fn is_usable(&self) -> bool {
        self.bid > 0.0 && self.ask > 0.0 && self.bid.is_finite() && self.ask.is_finite()
    }
}

/// Trait for bar data collaborators.
#[async_trait]
pub trait MarketData: Send + Sync {
    /// Fetch bars for a symbol.
    ///
    /// # Arguments
    /// * `symbol` - The symbol to fetch
    /// * `start` - Start of the range (inclusive)
    /// * `end` - End of the range (inclusive)
    /// * `timeframe` - The bar interval
    ///
    /// # Returns
    /// Bars ordered from oldest to newest, gaps already forward-filled
    async fn get_bars(
        &self,
        symbol: &str,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
        timeframe: Timeframe,
    ) -> Result<Vec<Bar>, DataError>;

    /// Get the data source name.
    fn name(&self) -> &str;
}

/// Trait for live quote collaborators.
#[async_trait]
pub trait QuoteSource: Send + Sync {
    /// Get the latest quote for a symbol, or `None` if unavailable.
    async fn get_quote(&self, symbol: &str) -> Result<Option<Quote>, DataError>;

    /// Get the source name.
    fn name(&self) -> &str;
}
