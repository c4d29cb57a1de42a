//! Validate configuration command.

use anyhow::{Context, Result};
use std::path::Path;
use trading_config::AppConfig;

use crate::cli::ValidateArgs;

pub fn run(args: ValidateArgs, config: &AppConfig, config_path: &Path) -> Result<()> {
    println!("Validating configuration: {:?}", config_path);

    if let Err(e) = config.validate().and_then(|_| config.live_config().map(|_| ())) {
        println!("Configuration error: {}", e);
        return Err(e.into());
    }

    println!("Configuration is valid!");
    println!();
    println!("App: {}", config.app.name);
    println!("Environment: {}", config.app.environment);
    println!("Log level: {}", config.logging.level);
    println!("Alpaca paper mode: {}", config.alpaca.paper);
    println!("Symbols: {}", config.symbols().join(", "));
    println!(
        "Strategy: SMA {}/{}, trailing stop {}",
        config.strategy.short_window,
        config.strategy.long_window,
        config.strategy.trailing_stop_fraction
    );
    println!(
        "Execution: deviation limit {}, cash limit ${}",
        config.execution.percent_range_execute_limit, config.execution.cash_limit
    );
    println!(
        "Market hours: {} {}-{}",
        config.market_hours.timezone, config.market_hours.open, config.market_hours.close
    );
    println!("Journal: {}", config.live.journal_dir.display());

    if args.print {
        println!();
        println!("{}", config.to_toml().context("Failed to render configuration")?);
    }

    Ok(())
}
