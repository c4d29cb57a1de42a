//! Core data types for the trading system.

mod execution;
mod intent;
mod ohlcv;
mod order;
mod position;
mod signal;
mod timeframe;

pub use execution::{ExecutionResult, Rejection};
pub use intent::{IntentOrigin, JournalKey, TradeIntent};
pub use ohlcv::Bar;
pub use order::{OrderAck, OrderRequest, Side};
pub use position::{Position, PositionPhase};
pub use signal::{Signal, SignalTrigger, SignalType};
pub use timeframe::Timeframe;
