//! Strategy trait definitions.

use crate::error::StrategyError;
use crate::types::{Bar, Position, PositionPhase, Signal};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Configuration trait for strategies.
pub trait StrategyConfig: Send + Sync + Clone + 'static {
    /// Validate the configuration.
    fn validate(&self) -> Result<(), StrategyError>;
}

/// State of a strategy for monitoring and serialization.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StrategyState {
    /// Strategy name
    pub name: String,
    /// Symbol the machine tracks
    pub symbol: String,
    pub phase: PositionPhase,
    /// Whether the strategy has processed enough bars to generate signals
    pub is_warmed_up: bool,
    /// Number of bars processed
    pub bars_processed: usize,
    /// Number of signals generated
    pub signals_generated: usize,
    /// Current indicator values
    pub indicators: HashMap<String, f64>,
    /// Open position, if long
    pub position: Option<Position>,
    /// Custom strategy-specific state
    pub custom: serde_json::Value,
}

impl Default for StrategyState {
    fn default() -> Self {
        Self {
            name: String::new(),
            symbol: String::new(),
            phase: PositionPhase::Uninitialized,
            is_warmed_up: false,
            bars_processed: 0,
            signals_generated: 0,
            indicators: HashMap::new(),
            position: None,
            custom: serde_json::Value::Null,
        }
    }
}

/// Per-symbol trading state machine.
///
/// A strategy consumes one symbol's bars in timestamp order. When it emits a
/// signal its state moves as if the signal were executed; the caller then
/// either confirms the execution (with fill details) or reverts it.
pub trait Strategy: Send + Sync {
    /// Get the unique name of this strategy.
    fn name(&self) -> &str;

    /// Symbol this instance trades.
    fn symbol(&self) -> &str;

    /// Process the next bar and optionally emit a signal.
    ///
    /// # Arguments
    /// * `bar` - Next bar; its timestamp must be after the previous bar's
    /// * `available_cash` - Cash used to size an entry
    fn on_bar(
        &mut self,
        bar: &Bar,
        available_cash: Decimal,
    ) -> Result<Option<Signal>, StrategyError>;

    /// Process the last bar of a finite stream. Any open position is closed
    /// at this bar's close.
    fn on_final_bar(
        &mut self,
        bar: &Bar,
        available_cash: Decimal,
    ) -> Result<Option<Signal>, StrategyError>;

    /// Confirm that the signal emitted at `timestamp` executed.
    ///
    /// Fill details replace the bar close and sized quantity when given.
    fn confirm(&mut self, timestamp: i64, fill_price: Option<f64>, quantity: Option<Decimal>);

    /// Undo the state change of the signal emitted at `timestamp`, along with
    /// any unconfirmed signal emitted after it.
    ///
    /// Returns false if that signal is not awaiting confirmation.
    fn revert(&mut self, timestamp: i64) -> bool;

    /// Reset the strategy state.
    fn reset(&mut self);

    /// Get the current strategy state for monitoring.
    fn state(&self) -> StrategyState;

    /// Get the warmup period (number of bars needed before generating signals).
    fn warmup_period(&self) -> usize;

    /// Timestamp of the last bar processed.
    fn last_timestamp(&self) -> Option<i64>;

    /// Check if the strategy is warmed up (has enough data).
    fn is_warmed_up(&self, bars_available: usize) -> bool {
        bars_available >= self.warmup_period()
    }

    /// Get a description of the strategy.
    fn description(&self) -> &str {
        ""
    }
}
