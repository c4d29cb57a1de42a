//! Orchestrator configuration.

use std::time::Duration;

use serde::{Deserialize, Serialize};
use trading_core::error::TradingError;
use trading_core::traits::StrategyConfig;
use trading_core::types::Timeframe;
use trading_execution::{GateConfig, MarketHours};
use trading_strategies::SmaTrailingConfig;

/// Everything the orchestrator needs, passed in at construction.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LiveConfig {
    /// Symbols with a strategy machine
    pub symbols: Vec<String>,
    pub poll_interval: Duration,
    pub timeframe: Timeframe,
    /// Bars of history requested on the first fetch
    pub history_bars: usize,
    /// Strategy parameters; the symbol is filled in per machine
    pub strategy: SmaTrailingConfig,
    pub gate: GateConfig,
    pub market_hours: MarketHours,
}

impl Default for LiveConfig {
    fn default() -> Self {
        Self {
            symbols: Vec::new(),
            poll_interval: Duration::from_secs(10),
            timeframe: Timeframe::Minute1,
            history_bars: 60,
            strategy: SmaTrailingConfig::default(),
            gate: GateConfig::default(),
            market_hours: MarketHours::default(),
        }
    }
}

impl LiveConfig {
    /// Strategy parameters for one symbol.
    pub fn strategy_for(&self, symbol: &str) -> SmaTrailingConfig {
        SmaTrailingConfig {
            symbol: symbol.to_string(),
            ..self.strategy.clone()
        }
    }

    /// Span of history requested on the first fetch.
    pub fn history_span(&self) -> chrono::Duration {
        let bars = self.history_bars.max(self.strategy.long_window) as i32;
        self.timeframe.as_duration() * bars
    }

    pub fn validate(&self) -> Result<(), TradingError> {
        if self.poll_interval.is_zero() {
            return Err(TradingError::Config("Poll interval must be greater than 0".into()));
        }
        if self.gate.percent_range_execute_limit <= 0.0 {
            return Err(TradingError::Config(
                "Execution deviation limit must be greater than 0".into(),
            ));
        }
        if self.gate.cash_limit <= rust_decimal::Decimal::ZERO {
            return Err(TradingError::Config("Cash limit must be greater than 0".into()));
        }
        for symbol in &self.symbols {
            self.strategy_for(symbol).validate()?;
        }
        Ok(())
    }
}
