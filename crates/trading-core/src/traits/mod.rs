//! Core traits for the trading system.

mod broker;
mod data_source;
mod indicator;
mod intent_source;
mod listener;
mod strategy;

pub use broker::Broker;
pub use data_source::{MarketData, Quote, QuoteSource};
pub use indicator::StreamingIndicator;
pub use intent_source::IntentSource;
pub use listener::ExecutionListener;
pub use strategy::{Strategy, StrategyConfig, StrategyState};
