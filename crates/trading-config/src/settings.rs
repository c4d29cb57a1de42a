//! Configuration structures.

use std::path::PathBuf;
use std::time::Duration;

use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde::{Deserialize, Serialize};
use trading_backtest::BacktestConfig;
use trading_core::error::TradingError;
use trading_core::types::Timeframe;
use trading_execution::{GateConfig, MarketHours};
use trading_live::LiveConfig;
use trading_monitor::LogFormat;
use trading_strategies::SmaTrailingConfig;

/// Main application configuration.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct AppConfig {
    #[serde(default)]
    pub app: AppSettings,
    #[serde(default)]
    pub logging: LoggingConfig,
    #[serde(default)]
    pub alpaca: AlpacaSettings,
    #[serde(default)]
    pub execution: ExecutionSettings,
    #[serde(default)]
    pub strategy: StrategySettings,
    #[serde(default)]
    pub live: LiveSettings,
    #[serde(default)]
    pub market_hours: MarketHoursSettings,
    #[serde(default)]
    pub backtest: BacktestSettings,
}

/// General app settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AppSettings {
    pub name: String,
    pub environment: String,
}

impl Default for AppSettings {
    fn default() -> Self {
        Self {
            name: "crossgate".to_string(),
            environment: "development".to_string(),
        }
    }
}

/// Logging configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    pub level: String,
    pub format: LogFormat,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            format: LogFormat::Pretty,
        }
    }
}

/// Alpaca API settings. Credentials themselves stay in the environment.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AlpacaSettings {
    pub api_key_env: String,
    pub api_secret_env: String,
    pub paper: bool,
    /// Market data feed (`iex` or `sip`)
    pub feed: String,
}

impl Default for AlpacaSettings {
    fn default() -> Self {
        Self {
            api_key_env: "ALPACA_API_KEY".to_string(),
            api_secret_env: "ALPACA_API_SECRET".to_string(),
            paper: true,
            feed: "iex".to_string(),
        }
    }
}

/// Execution gate settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ExecutionSettings {
    pub percent_range_execute_limit: f64,
    pub cash_limit: Decimal,
}

impl Default for ExecutionSettings {
    fn default() -> Self {
        Self {
            percent_range_execute_limit: 0.05,
            cash_limit: dec!(100),
        }
    }
}

/// Strategy parameters shared by every symbol.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct StrategySettings {
    pub short_window: usize,
    pub long_window: usize,
    pub trailing_stop_fraction: f64,
    pub slippage_buffer: f64,
}

impl Default for StrategySettings {
    fn default() -> Self {
        Self {
            short_window: 3,
            long_window: 15,
            trailing_stop_fraction: 0.02,
            slippage_buffer: 0.02,
        }
    }
}

/// Live orchestrator settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LiveSettings {
    pub symbols: Vec<String>,
    pub poll_interval_secs: u64,
    pub timeframe: Timeframe,
    pub history_bars: usize,
    pub journal_dir: PathBuf,
    /// JSON-lines inbox of externally detected intents
    pub intent_inbox: Option<PathBuf>,
}

impl Default for LiveSettings {
    fn default() -> Self {
        Self {
            symbols: Vec::new(),
            poll_interval_secs: 10,
            timeframe: Timeframe::Minute1,
            history_bars: 60,
            journal_dir: PathBuf::from("data/journal"),
            intent_inbox: None,
        }
    }
}

/// Exchange session settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct MarketHoursSettings {
    pub timezone: String,
    pub open: String,
    pub close: String,
}

impl Default for MarketHoursSettings {
    fn default() -> Self {
        Self {
            timezone: "America/New_York".to_string(),
            open: "09:30:00".to_string(),
            close: "16:00:00".to_string(),
        }
    }
}

/// Backtest settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct BacktestSettings {
    pub initial_capital: Decimal,
    pub commission: Decimal,
    pub slippage_pct: Decimal,
    /// Directory of `{SYMBOL}.csv` files for sweeps
    pub data_dir: PathBuf,
}

impl Default for BacktestSettings {
    fn default() -> Self {
        Self {
            initial_capital: dec!(1000),
            commission: Decimal::ZERO,
            slippage_pct: Decimal::ZERO,
            data_dir: PathBuf::from("data/bars"),
        }
    }
}

fn unit_fraction(name: &str, value: f64) -> Result<(), TradingError> {
    if !(0.0..1.0).contains(&value) {
        return Err(TradingError::Config(format!(
            "{name} must be in [0, 1), got {value}"
        )));
    }
    Ok(())
}

impl AppConfig {
    /// Check every section for values the components would reject later.
    pub fn validate(&self) -> Result<(), TradingError> {
        let strategy = &self.strategy;
        if strategy.short_window == 0 || strategy.long_window == 0 {
            return Err(TradingError::Config("SMA windows must be greater than 0".into()));
        }
        if strategy.short_window >= strategy.long_window {
            return Err(TradingError::Config(format!(
                "Short window {} must be less than long window {}",
                strategy.short_window, strategy.long_window
            )));
        }
        unit_fraction("strategy.trailing_stop_fraction", strategy.trailing_stop_fraction)?;
        unit_fraction("strategy.slippage_buffer", strategy.slippage_buffer)?;

        if self.execution.percent_range_execute_limit <= 0.0 {
            return Err(TradingError::Config(
                "execution.percent_range_execute_limit must be greater than 0".into(),
            ));
        }
        if self.execution.cash_limit <= Decimal::ZERO {
            return Err(TradingError::Config(
                "execution.cash_limit must be greater than 0".into(),
            ));
        }
        if self.live.poll_interval_secs == 0 {
            return Err(TradingError::Config(
                "live.poll_interval_secs must be greater than 0".into(),
            ));
        }
        if self.backtest.initial_capital <= Decimal::ZERO {
            return Err(TradingError::Config(
                "backtest.initial_capital must be greater than 0".into(),
            ));
        }
        unit_fraction("backtest.slippage_pct", decimal_to_f64(self.backtest.slippage_pct))?;

        self.market_hours()?;
        Ok(())
    }

    /// Configured symbols, trimmed and upper-cased.
    pub fn symbols(&self) -> Vec<String> {
        self.live
            .symbols
            .iter()
            .map(|s| s.trim().to_uppercase())
            .filter(|s| !s.is_empty())
            .collect()
    }

    pub fn market_hours(&self) -> Result<MarketHours, TradingError> {
        MarketHours::parse(
            &self.market_hours.timezone,
            &self.market_hours.open,
            &self.market_hours.close,
        )
    }

    /// Strategy parameters; `symbol` is left empty for per-symbol filling.
    pub fn strategy_config(&self) -> SmaTrailingConfig {
        SmaTrailingConfig {
            symbol: String::new(),
            short_window: self.strategy.short_window,
            long_window: self.strategy.long_window,
            trailing_stop_fraction: self.strategy.trailing_stop_fraction,
            slippage_buffer: self.strategy.slippage_buffer,
        }
    }

    pub fn gate_config(&self) -> GateConfig {
        GateConfig {
            percent_range_execute_limit: self.execution.percent_range_execute_limit,
            cash_limit: self.execution.cash_limit,
        }
    }

    /// Orchestrator configuration.
    pub fn live_config(&self) -> Result<LiveConfig, TradingError> {
        let live = LiveConfig {
            symbols: self.symbols(),
            poll_interval: Duration::from_secs(self.live.poll_interval_secs),
            timeframe: self.live.timeframe,
            history_bars: self.live.history_bars,
            strategy: self.strategy_config(),
            gate: self.gate_config(),
            market_hours: self.market_hours()?,
        };
        live.validate()?;
        Ok(live)
    }

    pub fn backtest_config(&self) -> BacktestConfig {
        BacktestConfig {
            initial_capital: self.backtest.initial_capital,
            commission: self.backtest.commission,
            slippage_pct: self.backtest.slippage_pct,
            strategy: self.strategy_config(),
        }
    }

    /// Effective configuration rendered as TOML.
    pub fn to_toml(&self) -> Result<String, toml::ser::Error> {
        toml::to_string_pretty(self)
    }
}

fn decimal_to_f64(value: Decimal) -> f64 {
    use rust_decimal::prelude::ToPrimitive;
    value.to_f64().unwrap_or(f64::NAN)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_is_valid() {
        assert!(AppConfig::default().validate().is_ok());
    }

    #[test]
    fn test_rejects_inverted_windows() {
        let mut config = AppConfig::default();
        config.strategy.short_window = 15;
        config.strategy.long_window = 3;
        assert!(config.validate().is_err());

        config.strategy.short_window = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_rejects_fractions_out_of_range() {
        let mut config = AppConfig::default();
        config.strategy.trailing_stop_fraction = 1.0;
        assert!(config.validate().is_err());

        let mut config = AppConfig::default();
        config.strategy.slippage_buffer = -0.1;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_rejects_gate_and_interval() {
        let mut config = AppConfig::default();
        config.execution.percent_range_execute_limit = 0.0;
        assert!(config.validate().is_err());

        let mut config = AppConfig::default();
        config.live.poll_interval_secs = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_rejects_bad_market_hours() {
        let mut config = AppConfig::default();
        config.market_hours.timezone = "Mars/Olympus_Mons".into();
        assert!(config.validate().is_err());

        let mut config = AppConfig::default();
        config.market_hours.open = "16:00:00".into();
        config.market_hours.close = "09:30:00".into();
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_live_config_conversion() {
        let mut config = AppConfig::default();
        config.live.symbols = vec![" ccl ".into(), "AAL".into(), "".into()];
        config.live.poll_interval_secs = 30;

        let live = config.live_config().unwrap();
        assert_eq!(live.symbols, vec!["CCL", "AAL"]);
        assert_eq!(live.poll_interval, Duration::from_secs(30));
        assert_eq!(live.strategy.long_window, 15);
        assert_eq!(live.gate.cash_limit, dec!(100));
        assert_eq!(live.market_hours, MarketHours::default());
    }

    #[test]
    fn test_backtest_config_conversion() {
        let mut config = AppConfig::default();
        config.backtest.initial_capital = dec!(5000);
        config.strategy.short_window = 5;

        let backtest = config.backtest_config();
        assert_eq!(backtest.initial_capital, dec!(5000));
        assert_eq!(backtest.strategy.short_window, 5);
    }

    #[test]
    fn test_round_trips_through_toml() {
        let rendered = AppConfig::default().to_toml().unwrap();
        assert!(rendered.contains("[market_hours]"));
        assert!(rendered.contains("percent_range_execute_limit = 0.05"));
    }
}
