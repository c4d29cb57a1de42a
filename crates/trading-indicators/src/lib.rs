//! Moving-average indicators.

pub mod moving_average;

pub use moving_average::RollingSma;
