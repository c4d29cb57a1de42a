//! Backtest statistics.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde::{Deserialize, Serialize};
use trading_core::types::{Side, SignalTrigger};

/// Record of a single fill.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TradeRecord {
    pub symbol: String,
    pub side: Side,
    pub quantity: Decimal,
    pub price: Decimal,
    pub timestamp: DateTime<Utc>,
    pub trigger: SignalTrigger,
    /// Realized profit, set on the closing leg
    pub pnl: Option<Decimal>,
}

/// Backtest statistics.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BacktestStats {
    /// Initial capital
    pub initial_capital: Decimal,
    /// Cash plus held shares at the last close
    pub final_value: Decimal,
    /// Total return percentage
    pub total_return_pct: Decimal,
    /// Maximum drawdown percentage
    pub max_drawdown_pct: Decimal,
    /// Number of fills (both legs)
    pub total_trades: usize,
    /// Closed round trips with positive P&L
    pub winning_trades: usize,
    /// Closed round trips with negative P&L
    pub losing_trades: usize,
    /// Win rate percentage over closed round trips
    pub win_rate_pct: Decimal,
    /// Average profit per winning trade
    pub avg_win: Decimal,
    /// Average loss per losing trade
    pub avg_loss: Decimal,
    /// Profit factor (gross profit / gross loss)
    pub profit_factor: Decimal,
    /// Number of bars processed
    pub bars_processed: usize,
    /// Equity curve
    pub equity_curve: Vec<(i64, Decimal)>,
    /// All trades
    pub trades: Vec<TradeRecord>,
    /// Peak equity (for drawdown)
    #[serde(skip)]
    peak_equity: Decimal,
}

impl BacktestStats {
    /// Create new stats tracker.
    pub fn new(initial_capital: Decimal) -> Self {
        Self {
            initial_capital,
            final_value: initial_capital,
            total_return_pct: Decimal::ZERO,
            max_drawdown_pct: Decimal::ZERO,
            total_trades: 0,
            winning_trades: 0,
            losing_trades: 0,
            win_rate_pct: Decimal::ZERO,
            avg_win: Decimal::ZERO,
            avg_loss: Decimal::ZERO,
            profit_factor: Decimal::ZERO,
            bars_processed: 0,
            equity_curve: Vec::new(),
            trades: Vec::new(),
            peak_equity: initial_capital,
        }
    }

    /// Record equity at a timestamp.
    pub fn record_equity(&mut self, timestamp: i64, equity: Decimal) {
        self.equity_curve.push((timestamp, equity));

        if equity > self.peak_equity {
            self.peak_equity = equity;
        }

        if self.peak_equity > Decimal::ZERO {
            let drawdown = (self.peak_equity - equity) / self.peak_equity * dec!(100);
            if drawdown > self.max_drawdown_pct {
                self.max_drawdown_pct = drawdown;
            }
        }

        self.bars_processed += 1;
    }

    /// Add a trade record.
    pub fn add_trade(&mut self, trade: TradeRecord) {
        self.trades.push(trade);
        self.total_trades += 1;
    }

    /// Calculate final statistics from the equity curve and trade list.
    pub fn finalize(&mut self) {
        if let Some((_, equity)) = self.equity_curve.last() {
            self.final_value = *equity;
        }

        if self.initial_capital > Decimal::ZERO {
            self.total_return_pct =
                (self.final_value - self.initial_capital) / self.initial_capital * dec!(100);
        }

        let mut total_profit = Decimal::ZERO;
        let mut total_loss = Decimal::ZERO;
        let mut closed = 0usize;

        for pnl in self.trades.iter().filter_map(|t| t.pnl) {
            closed += 1;
            if pnl > Decimal::ZERO {
                self.winning_trades += 1;
                total_profit += pnl;
            } else if pnl < Decimal::ZERO {
                self.losing_trades += 1;
                total_loss += pnl.abs();
            }
        }

        if closed > 0 {
            self.win_rate_pct = Decimal::from(self.winning_trades * 100) / Decimal::from(closed);
        }

        if self.winning_trades > 0 {
            self.avg_win = total_profit / Decimal::from(self.winning_trades);
        }
        if self.losing_trades > 0 {
            self.avg_loss = total_loss / Decimal::from(self.losing_trades);
        }

        if total_loss > Decimal::ZERO {
            self.profit_factor = total_profit / total_loss;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn closing(pnl: Decimal) -> TradeRecord {
        TradeRecord {
            symbol: "CCL".into(),
            side: Side::Sell,
            quantity: dec!(10),
            price: dec!(12),
            timestamp: Utc::now(),
            trigger: SignalTrigger::CrossBelow,
            pnl: Some(pnl),
        }
    }

    #[test]
    fn test_drawdown_tracks_peak() {
        let mut stats = BacktestStats::new(dec!(1000));
        stats.record_equity(0, dec!(1000));
        stats.record_equity(1, dec!(1200));
        stats.record_equity(2, dec!(900));
        stats.record_equity(3, dec!(1100));
        stats.finalize();

        assert_eq!(stats.max_drawdown_pct, dec!(25));
        assert_eq!(stats.final_value, dec!(1100));
        assert_eq!(stats.total_return_pct, dec!(10));
        assert_eq!(stats.bars_processed, 4);
    }

    #[test]
    fn test_win_loss_breakdown() {
        let mut stats = BacktestStats::new(dec!(1000));
        stats.add_trade(closing(dec!(30)));
        stats.add_trade(closing(dec!(-10)));
        stats.add_trade(closing(dec!(10)));
        stats.record_equity(0, dec!(1030));
        stats.finalize();

        assert_eq!(stats.winning_trades, 2);
        assert_eq!(stats.losing_trades, 1);
        assert_eq!(stats.avg_win, dec!(20));
        assert_eq!(stats.avg_loss, dec!(10));
        assert_eq!(stats.profit_factor, dec!(4));
    }
}
