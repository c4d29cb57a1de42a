//! Per-symbol position held by a strategy state machine.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// Coarse phase of a symbol's state machine, for monitoring.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum PositionPhase {
    Uninitialized,
    Flat,
    Long,
}

/// An open long position.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Position {
    pub symbol: String,
    pub entry_price: f64,
    /// Highest unrealized gain observed since entry, as a fraction
    pub peak_gain_pct: f64,
    pub quantity: Decimal,
    /// Timestamp of the entry bar (Unix milliseconds)
    pub opened_at: i64,
}

impl Position {
    /// Open a position at the given price.
    pub fn open(
        symbol: impl Into<String>,
        entry_price: f64,
        quantity: Decimal,
        opened_at: i64,
    ) -> Self {
        Self {
            symbol: symbol.into(),
            entry_price,
            peak_gain_pct: 0.0,
            quantity,
            opened_at,
        }
    }

    /// Unrealized gain at `price` as a fraction of the entry price.
    pub fn gain_pct(&self, price: f64) -> f64 {
        if self.entry_price == 0.0 {
            return 0.0;
        }
        (price - self.entry_price) / self.entry_price
    }

    /// Mark to `price`, raising the peak gain if exceeded. Returns the current gain.
    pub fn mark(&mut self, price: f64) -> f64 {
        let gain = self.gain_pct(price);
        self.peak_gain_pct = self.peak_gain_pct.max(gain);
        gain
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn test_peak_gain_never_decreases() {
        let mut position = Position::open("AAPL", 100.0, dec!(10), 0);

        assert!((position.mark(110.0) - 0.10).abs() < 1e-12);
        assert!((position.mark(105.0) - 0.05).abs() < 1e-12);
        assert!((position.peak_gain_pct - 0.10).abs() < 1e-12);

        position.mark(90.0);
        assert!((position.peak_gain_pct - 0.10).abs() < 1e-12);
    }

    #[test]
    fn test_zero_entry_price_has_no_gain() {
        let position = Position::open("AAPL", 0.0, dec!(1), 0);
        assert_eq!(position.gain_pct(5.0), 0.0);
    }
}
