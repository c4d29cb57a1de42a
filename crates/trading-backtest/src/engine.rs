//! Backtesting engine.

use chrono::{DateTime, Utc};
use rust_decimal::prelude::ToPrimitive;
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde::{Deserialize, Serialize};
use tracing::{debug, info};
use trading_core::error::{DataError, TradingError};
use trading_core::traits::Strategy;
use trading_core::types::{Bar, Side, Signal};
use trading_strategies::{SmaTrailingConfig, SmaTrailingStrategy};

use crate::report::BacktestReport;
use crate::statistics::{BacktestStats, TradeRecord};

/// Backtest configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BacktestConfig {
    /// Initial capital
    pub initial_capital: Decimal,
    /// Commission per share
    pub commission: Decimal,
    /// Fraction added to buy fills and taken off sell fills
    pub slippage_pct: Decimal,
    /// Strategy parameters; the symbol is filled in per run
    pub strategy: SmaTrailingConfig,
}

impl Default for BacktestConfig {
    fn default() -> Self {
        Self {
            initial_capital: dec!(1000),
            commission: Decimal::ZERO,
            slippage_pct: Decimal::ZERO,
            strategy: SmaTrailingConfig::default(),
        }
    }
}

/// Open long in the simulated account.
struct Holding {
    quantity: Decimal,
    /// Cash paid including commission
    cost: Decimal,
}

/// Single-symbol backtesting engine.
#[derive(Debug, Clone)]
pub struct BacktestEngine {
    config: BacktestConfig,
}

impl BacktestEngine {
    /// Create a new backtest engine.
    pub fn new(config: BacktestConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &BacktestConfig {
        &self.config
    }

    /// Run one symbol's bars through a fresh strategy machine.
    ///
    /// Every signal is filled at the bar close adjusted for slippage. The
    /// last bar closes any open position.
    pub fn run(&self, symbol: &str, bars: &[Bar]) -> Result<BacktestReport, TradingError> {
        if bars.is_empty() {
            return Err(DataError::Unavailable {
                symbol: symbol.to_string(),
            }
            .into());
        }

        let mut strategy = SmaTrailingStrategy::new(SmaTrailingConfig {
            symbol: symbol.to_string(),
            ..self.config.strategy.clone()
        })?;

        let mut stats = BacktestStats::new(self.config.initial_capital);
        let mut cash = self.config.initial_capital;
        let mut holding: Option<Holding> = None;
        let last_index = bars.len() - 1;

        for (i, bar) in bars.iter().enumerate() {
            let signal = if i == last_index {
                strategy.on_final_bar(bar, cash)?
            } else {
                strategy.on_bar(bar, cash)?
            };

            if let Some(signal) = signal {
                match self.fill(&signal, &mut cash, &mut holding) {
                    Some(trade) => {
                        let fill = trade.price.to_f64();
                        strategy.confirm(signal.timestamp, fill, Some(trade.quantity));
                        stats.add_trade(trade);
                    }
                    None => {
                        debug!(
                            symbol,
                            timestamp = %signal.datetime(),
                            "Signal not fillable, reverting"
                        );
                        strategy.revert(signal.timestamp);
                    }
                }
            }

            let close = Decimal::try_from(bar.close).unwrap_or(Decimal::ZERO);
            let held = holding.as_ref().map_or(Decimal::ZERO, |h| h.quantity);
            stats.record_equity(bar.timestamp, cash + held * close);
        }

        stats.finalize();
        info!(
            symbol,
            final_value = %stats.final_value,
            trades = stats.total_trades,
            "Backtest complete"
        );

        Ok(BacktestReport {
            symbol: symbol.to_string(),
            config: self.config.clone(),
            stats,
        })
    }

    /// Apply a signal to the simulated account. Returns None when the account
    /// cannot take it.
    fn fill(
        &self,
        signal: &Signal,
        cash: &mut Decimal,
        holding: &mut Option<Holding>,
    ) -> Option<TradeRecord> {
        let close = Decimal::try_from(signal.price).ok()?;
        let side = signal.signal_type.side();
        let timestamp = DateTime::from_timestamp_millis(signal.timestamp).unwrap_or_else(Utc::now);

        match side {
            Side::Buy => {
                if holding.is_some() || signal.quantity <= Decimal::ZERO {
                    return None;
                }
                let price = close * (Decimal::ONE + self.config.slippage_pct);
                let cost = price * signal.quantity + self.config.commission * signal.quantity;
                if cost > *cash {
                    return None;
                }
                *cash -= cost;
                *holding = Some(Holding {
                    quantity: signal.quantity,
                    cost,
                });
                Some(TradeRecord {
                    symbol: signal.symbol.clone(),
                    side,
                    quantity: signal.quantity,
                    price,
                    timestamp,
                    trigger: signal.trigger,
                    pnl: None,
                })
            }
            Side::Sell => {
                let open = holding.take()?;
                let price = close * (Decimal::ONE - self.config.slippage_pct);
                let proceeds = price * open.quantity - self.config.commission * open.quantity;
                *cash += proceeds;
                Some(TradeRecord {
                    symbol: signal.symbol.clone(),
                    side,
                    quantity: open.quantity,
                    price,
                    timestamp,
                    trigger: signal.trigger,
                    pnl: Some(proceeds - open.cost),
                })
            }
        }
    }
}
