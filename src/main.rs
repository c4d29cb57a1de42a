//! crossgate CLI application.

mod cli;

use anyhow::{Context, Result};
use clap::Parser;
use cli::{Cli, Commands};
use trading_config::load_config;
use trading_monitor::{setup_logging, LogFormat};

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let config = load_config(&cli.config)
        .with_context(|| format!("Failed to load configuration from {}", cli.config.display()))?;

    let level = cli
        .log_level
        .map(|l| l.as_str().to_string())
        .unwrap_or_else(|| config.logging.level.clone());
    let format = if cli.json_logs {
        LogFormat::Json
    } else {
        config.logging.format
    };
    setup_logging(&level, format).context("Failed to set up logging")?;

    match cli.command {
        Commands::Backtest(args) => cli::commands::backtest::run(args, &config).await,
        Commands::Sweep(args) => cli::commands::sweep::run(args, &config).await,
        Commands::Live(args) => cli::commands::live::run(args, &config).await,
        Commands::Paper(args) => cli::commands::paper::run(args, &config).await,
        Commands::ValidateConfig(args) => cli::commands::validate::run(args, &config, &cli.config),
        Commands::Journal(args) => cli::commands::journal::run(args, &config),
    }
}
