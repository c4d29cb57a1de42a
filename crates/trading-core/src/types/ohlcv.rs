//! OHLCV (Open, High, Low, Close, Volume) data types.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// One OHLCV bar. Prices are f64; money amounts elsewhere use Decimal.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[repr(C)]
pub struct Bar {
    /// Unix timestamp in milliseconds
    pub timestamp: i64,
    /// Opening price
    pub open: f64,
    /// Highest price
    pub high: f64,
    /// Lowest price
    pub low: f64,
    /// Closing price
    pub close: f64,
    /// Trading volume
    pub volume: f64,
}

impl Bar {
    /// Create a new bar.
    pub fn new(timestamp: i64, open: f64, high: f64, low: f64, close: f64, volume: f64) -> Self {
        Self {
            timestamp,
            open,
            high,
            low,
            close,
            volume,
        }
    }

    /// Create a bar where every price is the close. Handy for replaying close-only feeds.
    pub fn from_close(timestamp: i64, close: f64) -> Self {
        Self::new(timestamp, close, close, close, close, 0.0)
    }

    /// Get the timestamp as a DateTime.
    pub fn datetime(&self) -> DateTime<Utc> {
        DateTime::from_timestamp_millis(self.timestamp).unwrap_or_default()
    }

    /// High minus low.
    #[inline]
    pub fn range(&self) -> f64 {
        self.high - self.low
    }
}

impl Default for Bar {
    fn default() -> Self {
        Self::new(0, 0.0, 0.0, 0.0, 0.0, 0.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_bar_datetime() {
        let bar = Bar::from_close(1_705_312_800_000, 100.0);
        assert_eq!(bar.datetime().timestamp(), 1_705_312_800);
        assert_eq!(bar.range(), 0.0);
    }
}
