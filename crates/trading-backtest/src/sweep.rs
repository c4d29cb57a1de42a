//! Per-symbol sweep over a rayon pool.

use std::cmp::Ordering;

use rayon::prelude::*;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use tracing::{info, warn};
use trading_core::error::{DataError, TradingError};
use trading_core::types::Bar;

use crate::{BacktestConfig, BacktestEngine, BacktestReport};

/// Result of one symbol's backtest.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum SweepOutcome {
    Completed {
        final_value: Decimal,
        total_return_pct: Decimal,
        total_trades: usize,
    },
    Failed {
        error: String,
    },
}

impl SweepOutcome {
    fn from_report(report: &BacktestReport) -> Self {
        SweepOutcome::Completed {
            final_value: report.stats.final_value,
            total_return_pct: report.stats.total_return_pct,
            total_trades: report.stats.total_trades,
        }
    }

    pub fn final_value(&self) -> Option<Decimal> {
        match self {
            SweepOutcome::Completed { final_value, .. } => Some(*final_value),
            SweepOutcome::Failed { .. } => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SweepEntry {
    pub symbol: String,
    #[serde(flatten)]
    pub outcome: SweepOutcome,
}

/// Ranked sweep results: completed runs by final value descending, then
/// failures.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SweepResults {
    entries: Vec<SweepEntry>,
}

impl SweepResults {
    fn ranked(mut entries: Vec<SweepEntry>) -> Self {
        entries.sort_by(|a, b| {
            match (a.outcome.final_value(), b.outcome.final_value()) {
                (Some(x), Some(y)) => y.cmp(&x),
                (Some(_), None) => Ordering::Less,
                (None, Some(_)) => Ordering::Greater,
                (None, None) => Ordering::Equal,
            }
            .then_with(|| a.symbol.cmp(&b.symbol))
        });
        Self { entries }
    }

    pub fn entries(&self) -> &[SweepEntry] {
        &self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn get(&self, symbol: &str) -> Option<&SweepOutcome> {
        self.entries
            .iter()
            .find(|e| e.symbol == symbol)
            .map(|e| &e.outcome)
    }

    /// Export to JSON.
    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string_pretty(&self.entries)
    }

    /// One line per symbol in rank order.
    pub fn summary(&self) -> String {
        let mut s = String::new();
        for (rank, entry) in self.entries.iter().enumerate() {
            let line = match &entry.outcome {
                SweepOutcome::Completed {
                    final_value,
                    total_return_pct,
                    total_trades,
                } => format!(
                    "{:>4}. {:<8} ${:>12.2}  {:>8.2}%  {} trades\n",
                    rank + 1,
                    entry.symbol,
                    final_value,
                    total_return_pct,
                    total_trades
                ),
                SweepOutcome::Failed { error } => {
                    format!("{:>4}. {:<8} failed: {}\n", rank + 1, entry.symbol, error)
                }
            };
            s.push_str(&line);
        }
        s
    }
}

/// Runs one independent backtest per symbol in parallel.
pub struct Sweep {
    engine: BacktestEngine,
}

impl Sweep {
    pub fn new(config: BacktestConfig) -> Self {
        Self {
            engine: BacktestEngine::new(config),
        }
    }

    /// Load and backtest every symbol. Workers share nothing; a failing
    /// symbol becomes a `Failed` entry.
    pub fn run<F>(&self, symbols: &[String], load: F) -> SweepResults
    where
        F: Fn(&str) -> Result<Vec<Bar>, DataError> + Send + Sync,
    {
        info!(symbols = symbols.len(), "Starting sweep");

        let entries: Vec<SweepEntry> = symbols
            .par_iter()
            .map(|symbol| {
                let outcome = load(symbol.as_str())
                    .map_err(TradingError::from)
                    .and_then(|bars| self.engine.run(symbol, &bars));
                let outcome = match outcome {
                    Ok(report) => SweepOutcome::from_report(&report),
                    Err(e) => {
                        warn!(symbol = %symbol, error = %e, "Backtest failed");
                        SweepOutcome::Failed {
                            error: e.to_string(),
                        }
                    }
                };
                SweepEntry {
                    symbol: symbol.clone(),
                    outcome,
                }
            })
            .collect();

        SweepResults::ranked(entries)
    }
}
