//! CLI definitions.

pub mod commands;

use chrono::NaiveDate;
use clap::{Parser, Subcommand, ValueEnum};
use rust_decimal::Decimal;
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "crossgate")]
#[command(author, version, about = "SMA crossover signals with gated order execution")]
pub struct Cli {
    /// Configuration file path
    #[arg(short, long, default_value = "config/default.toml")]
    pub config: PathBuf,

    /// Log level (overrides the configured level)
    #[arg(short, long)]
    pub log_level: Option<LogLevel>,

    /// Enable JSON log format
    #[arg(long)]
    pub json_logs: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Clone, Copy, ValueEnum)]
pub enum LogLevel {
    Trace,
    Debug,
    Info,
    Warn,
    Error,
}

impl LogLevel {
    pub fn as_str(&self) -> &'static str {
        match self {
            LogLevel::Trace => "trace",
            LogLevel::Debug => "debug",
            LogLevel::Info => "info",
            LogLevel::Warn => "warn",
            LogLevel::Error => "error",
        }
    }
}

#[derive(Clone, Copy, Default, ValueEnum)]
pub enum OutputFormat {
    #[default]
    Text,
    Json,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Backtest one symbol from CSV history
    Backtest(BacktestArgs),
    /// Backtest every symbol in a CSV directory in parallel and rank them
    Sweep(SweepArgs),
    /// Trade through the Alpaca account
    Live(LiveArgs),
    /// Run the live loop against Alpaca data with simulated fills
    Paper(PaperArgs),
    /// Validate configuration
    ValidateConfig(ValidateArgs),
    /// Print one day of the transaction journal
    Journal(JournalArgs),
}

#[derive(clap::Args)]
pub struct BacktestArgs {
    /// Symbol to backtest (defaults to the data file's stem)
    #[arg(short = 'S', long)]
    pub symbol: Option<String>,

    /// CSV file, or directory of {SYMBOL}.csv files
    #[arg(long)]
    pub data: Option<PathBuf>,

    /// Initial capital (overrides backtest.initial_capital)
    #[arg(long)]
    pub capital: Option<Decimal>,

    /// Output format
    #[arg(long, value_enum, default_value_t = OutputFormat::Text)]
    pub output: OutputFormat,

    /// Save the JSON report to a file
    #[arg(long)]
    pub save: Option<PathBuf>,

    /// Write the equity curve as CSV
    #[arg(long)]
    pub equity_csv: Option<PathBuf>,
}

#[derive(clap::Args)]
pub struct SweepArgs {
    /// Directory of {SYMBOL}.csv files (overrides backtest.data_dir)
    #[arg(long)]
    pub data: Option<PathBuf>,

    /// Restrict the sweep to these symbols (comma-separated)
    #[arg(short = 'S', long, value_delimiter = ',')]
    pub symbols: Vec<String>,

    /// Output format
    #[arg(long, value_enum, default_value_t = OutputFormat::Text)]
    pub output: OutputFormat,

    /// Save the JSON results to a file
    #[arg(long)]
    pub save: Option<PathBuf>,
}

#[derive(clap::Args)]
pub struct LiveArgs {
    /// Symbols to trade (comma-separated, overrides live.symbols)
    #[arg(short = 'S', long, value_delimiter = ',')]
    pub symbols: Vec<String>,

    /// JSON-lines inbox of external intents (overrides live.intent_inbox)
    #[arg(long)]
    pub inbox: Option<PathBuf>,

    /// Run a single cycle and exit
    #[arg(long)]
    pub once: bool,
}

#[derive(clap::Args)]
pub struct PaperArgs {
    #[command(flatten)]
    pub live: LiveArgs,

    /// Simulated starting cash
    #[arg(long, default_value = "1000")]
    pub capital: Decimal,

    /// Commission per share (overrides backtest.commission)
    #[arg(long)]
    pub commission: Option<Decimal>,

    /// Fill slippage as a fraction (overrides backtest.slippage_pct)
    #[arg(long)]
    pub slippage: Option<Decimal>,
}

#[derive(clap::Args)]
pub struct ValidateArgs {
    /// Print the effective configuration as TOML
    #[arg(long)]
    pub print: bool,
}

#[derive(clap::Args)]
pub struct JournalArgs {
    /// Exchange-local date (YYYY-MM-DD), defaults to today
    #[arg(long)]
    pub date: Option<NaiveDate>,

    /// Journal directory (overrides live.journal_dir)
    #[arg(long)]
    pub dir: Option<PathBuf>,

    /// Output format
    #[arg(long, value_enum, default_value_t = OutputFormat::Text)]
    pub output: OutputFormat,
}
