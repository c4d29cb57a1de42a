//! Backtesting engine.
//!
//! Runs the SMA trailing strategy over a finite bar history per symbol, and
//! fans a symbol universe out over a rayon pool for ranked comparison.

mod engine;
mod statistics;
mod report;
mod sweep;

pub use engine::{BacktestEngine, BacktestConfig};
pub use statistics::{BacktestStats, TradeRecord};
pub use report::BacktestReport;
pub use sweep::{Sweep, SweepEntry, SweepOutcome, SweepResults};
