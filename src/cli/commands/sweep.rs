//! Sweep command implementation.

use anyhow::{bail, Context, Result};
use tracing::info;
use trading_backtest::Sweep;
use trading_config::AppConfig;
use trading_data::CsvDataSource;

use crate::cli::{OutputFormat, SweepArgs};

pub async fn run(args: SweepArgs, config: &AppConfig) -> Result<()> {
    config.validate().context("Invalid configuration")?;

    let dir = args.data.clone().unwrap_or_else(|| config.backtest.data_dir.clone());
    let source = CsvDataSource::new(&dir)
        .with_context(|| format!("Cannot open data directory {}", dir.display()))?;

    let symbols = if args.symbols.is_empty() {
        source.symbols()?
    } else {
        args.symbols.iter().map(|s| s.trim().to_uppercase()).collect()
    };
    if symbols.is_empty() {
        bail!("No CSV files found in {}", dir.display());
    }
    info!(symbols = symbols.len(), dir = %dir.display(), "Sweeping");

    let sweep = Sweep::new(config.backtest_config());
    let results = tokio::task::spawn_blocking(move || {
        sweep.run(&symbols, |symbol| source.load_symbol(symbol))
    })
    .await
    .context("Sweep worker pool panicked")?;

    match args.output {
        OutputFormat::Json => println!("{}", results.to_json()?),
        OutputFormat::Text => print!("{}", results.summary()),
    }

    if let Some(save_path) = &args.save {
        std::fs::write(save_path, results.to_json()?)
            .with_context(|| format!("Failed to write {}", save_path.display()))?;
        info!("Results saved to {:?}", save_path);
    }

    Ok(())
}
