//! Configuration management.

mod settings;

pub use settings::{
    AlpacaSettings, AppConfig, AppSettings, BacktestSettings, ExecutionSettings, LiveSettings,
    LoggingConfig, MarketHoursSettings, StrategySettings,
};

use config::{Config, ConfigError, Environment, File, FileFormat};
use std::path::Path;

fn environment() -> Environment {
    Environment::with_prefix("TRADING")
        .separator("__")
        .list_separator(",")
        .with_list_parse_key("live.symbols")
        .try_parsing(true)
}

/// Load configuration from file and environment.
pub fn load_config(path: &Path) -> Result<AppConfig, ConfigError> {
    let config = Config::builder()
        .add_source(File::from(path).required(true))
        .add_source(environment())
        .build()?;

    config.try_deserialize()
}

/// Load configuration from TOML text and environment.
pub fn load_config_str(toml: &str) -> Result<AppConfig, ConfigError> {
    let config = Config::builder()
        .add_source(File::from_str(toml, FileFormat::Toml))
        .add_source(environment())
        .build()?;

    config.try_deserialize()
}
