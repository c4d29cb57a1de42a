//! Backtest command implementation.

use anyhow::{bail, Context, Result};
use std::path::Path;
use tracing::info;
use trading_backtest::BacktestEngine;
use trading_config::AppConfig;
use trading_data::CsvDataSource;

use crate::cli::{BacktestArgs, OutputFormat};

pub async fn run(args: BacktestArgs, config: &AppConfig) -> Result<()> {
    config.validate().context("Invalid configuration")?;

    let data_path = args
        .data
        .clone()
        .unwrap_or_else(|| config.backtest.data_dir.clone());
    if !data_path.exists() {
        bail!(
            "Data path '{}' does not exist. Pass --data with a CSV file or a directory of CSVs",
            data_path.display()
        );
    }

    let (source, symbol) = if data_path.is_file() {
        let symbol = match &args.symbol {
            Some(symbol) => symbol.clone(),
            None => file_stem(&data_path)?,
        };
        (CsvDataSource::from_file(&data_path)?, symbol)
    } else {
        let Some(symbol) = args.symbol.clone() else {
            bail!("--symbol is required when --data is a directory");
        };
        (CsvDataSource::new(&data_path)?, symbol)
    };
    let symbol = symbol.to_uppercase();

    let bars = source
        .load_symbol(&symbol)
        .with_context(|| format!("Failed to load bars for {symbol}"))?;
    info!(symbol = %symbol, bars = bars.len(), "Loaded history");

    let mut backtest_config = config.backtest_config();
    if let Some(capital) = args.capital {
        backtest_config.initial_capital = capital;
    }

    let engine = BacktestEngine::new(backtest_config);
    let report = engine.run(&symbol, &bars)?;

    match args.output {
        OutputFormat::Json => println!("{}", report.to_json()?),
        OutputFormat::Text => println!("{}", report.summary()),
    }

    if let Some(save_path) = &args.save {
        std::fs::write(save_path, report.to_json()?)
            .with_context(|| format!("Failed to write {}", save_path.display()))?;
        info!("Results saved to {:?}", save_path);
    }

    if let Some(csv_path) = &args.equity_csv {
        std::fs::write(csv_path, report.equity_to_csv())
            .with_context(|| format!("Failed to write {}", csv_path.display()))?;
        info!("Equity curve saved to {:?}", csv_path);
    }

    Ok(())
}

fn file_stem(path: &Path) -> Result<String> {
    path.file_stem()
        .and_then(|s| s.to_str())
        .map(str::to_string)
        .context("Cannot derive a symbol from the data file name; pass --symbol")
}
