//! Live trading orchestrator.
//!
//! Polls a symbol set on a fixed interval. Each cycle advances every
//! symbol's strategy with new bars, gates strategy and external intents on
//! market hours, runs them through the execution gate and journals the
//! outcome. A failing symbol never stops the others.

mod config;
mod orchestrator;
mod stop;

pub use config::LiveConfig;
pub use orchestrator::{CycleSummary, Orchestrator};
pub use stop::StopHandle;
