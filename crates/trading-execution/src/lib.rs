//! Order execution gating.
//!
//! Two checks stand between a detected trade intent and the broker:
//! - [`MarketHours`] decides whether an intent is still actionable
//! - [`ExecutionGate`] compares the intent's reference price with a live
//!   quote, sizes the order and submits it

mod gate;
mod market_hours;

pub use gate::{ExecutionGate, GateConfig};
pub use market_hours::{Clock, FixedClock, MarketHours, SystemClock};
