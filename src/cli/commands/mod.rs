//! CLI command implementations.

pub mod backtest;
pub mod journal;
pub mod live;
pub mod paper;
pub mod sweep;
pub mod validate;
