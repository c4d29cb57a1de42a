//! Core types and traits for the trading system.
//!
//! This crate provides the foundational building blocks including:
//! - Market data types (Bar, Quote)
//! - Signals, trade intents and execution results
//! - Collaborator traits for market data, quotes, brokers and intent sources
//! - The strategy and indicator traits

pub mod types;
pub mod traits;
pub mod error;

pub use error::{TradingError, TradingResult};
pub use types::*;
pub use traits::*;
