//! Backtest report generation.

use serde::{Deserialize, Serialize};

use crate::{BacktestConfig, BacktestStats};

/// Complete backtest report for one symbol.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BacktestReport {
    pub symbol: String,
    /// Configuration used
    pub config: BacktestConfig,
    /// Statistics
    pub stats: BacktestStats,
}

impl BacktestReport {
    /// Generate a text summary.
    pub fn summary(&self) -> String {
        let mut s = String::new();

        s.push_str("═══════════════════════════════════════════════════════════\n");
        s.push_str(&format!("  BACKTEST REPORT: {}\n", self.symbol));
        s.push_str("═══════════════════════════════════════════════════════════\n\n");

        s.push_str("PERFORMANCE\n");
        s.push_str("───────────────────────────────────────────────────────────\n");
        s.push_str(&format!(
            "  Initial Capital:     ${:.2}\n",
            self.stats.initial_capital
        ));
        s.push_str(&format!(
            "  Final Value:         ${:.2}\n",
            self.stats.final_value
        ));
        s.push_str(&format!(
            "  Total Return:        {:.2}%\n",
            self.stats.total_return_pct
        ));
        s.push_str(&format!(
            "  Max Drawdown:        {:.2}%\n",
            self.stats.max_drawdown_pct
        ));
        s.push('\n');

        s.push_str("TRADE STATISTICS\n");
        s.push_str("───────────────────────────────────────────────────────────\n");
        s.push_str(&format!(
            "  Total Trades:        {}\n",
            self.stats.total_trades
        ));
        s.push_str(&format!(
            "  Winning Trades:      {}\n",
            self.stats.winning_trades
        ));
        s.push_str(&format!(
            "  Losing Trades:       {}\n",
            self.stats.losing_trades
        ));
        s.push_str(&format!(
            "  Win Rate:            {:.2}%\n",
            self.stats.win_rate_pct
        ));
        s.push_str(&format!(
            "  Avg Win:             ${:.2}\n",
            self.stats.avg_win
        ));
        s.push_str(&format!(
            "  Avg Loss:            ${:.2}\n",
            self.stats.avg_loss
        ));
        s.push_str(&format!(
            "  Profit Factor:       {:.2}\n",
            self.stats.profit_factor
        ));
        s.push_str(&format!(
            "  Bars Processed:      {}\n",
            self.stats.bars_processed
        ));
        s.push('\n');

        if !self.stats.trades.is_empty() {
            s.push_str("TRADES\n");
            s.push_str("───────────────────────────────────────────────────────────\n");
            for trade in &self.stats.trades {
                s.push_str(&format!(
                    "  {} {:<4} {:>6} @ {:.2}  ({})",
                    trade.timestamp.format("%Y-%m-%d %H:%M:%S"),
                    trade.side,
                    trade.quantity,
                    trade.price,
                    trade.trigger
                ));
                if let Some(pnl) = trade.pnl {
                    s.push_str(&format!("  P&L {:.2}", pnl));
                }
                s.push('\n');
            }
            s.push('\n');
        }

        s.push_str("═══════════════════════════════════════════════════════════\n");

        s
    }

    /// Export to JSON.
    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string_pretty(self)
    }

    /// Export to CSV (equity curve only).
    pub fn equity_to_csv(&self) -> String {
        let mut csv = String::from("timestamp,equity\n");
        for (ts, equity) in &self.stats.equity_curve {
            csv.push_str(&format!("{},{}\n", ts, equity));
        }
        csv
    }
}
