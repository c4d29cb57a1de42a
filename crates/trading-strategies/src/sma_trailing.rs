//! SMA crossover with a trailing stop on unrealized gain.
//!
//! Enters long on the bar where the short SMA moves from at-or-below to
//! strictly above the long SMA, and exits on whichever comes first: the
//! short SMA dropping below the long SMA, the gain retracing a fixed
//! fraction from its peak, or the end of a finite bar stream.

use rust_decimal::prelude::FromPrimitive;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use tracing::debug;
use trading_core::{
    error::{IndicatorError, StrategyError},
    traits::{StreamingIndicator, Strategy, StrategyConfig, StrategyState},
    types::{Bar, Position, PositionPhase, Signal, SignalTrigger, SignalType},
};
use trading_indicators::RollingSma;

/// Configuration for the SMA trailing strategy.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SmaTrailingConfig {
    /// Symbol to trade
    pub symbol: String,
    /// Short SMA window in bars
    pub short_window: usize,
    /// Long SMA window in bars
    pub long_window: usize,
    /// Fraction of the peak gain that may be given back before exiting
    pub trailing_stop_fraction: f64,
    /// Assumed price markup when sizing an entry
    pub slippage_buffer: f64,
}

impl Default for SmaTrailingConfig {
    fn default() -> Self {
        Self {
            symbol: String::new(),
            short_window: 3,
            long_window: 15,
            trailing_stop_fraction: 0.02,
            slippage_buffer: 0.02,
        }
    }
}

impl SmaTrailingConfig {
    pub fn for_symbol(symbol: impl Into<String>) -> Self {
        Self {
            symbol: symbol.into(),
            ..Default::default()
        }
    }
}

impl StrategyConfig for SmaTrailingConfig {
    fn validate(&self) -> Result<(), StrategyError> {
        if self.symbol.is_empty() {
            return Err(StrategyError::InvalidConfig("Symbol required".into()));
        }
        if self.short_window == 0 {
            return Err(StrategyError::InvalidConfig(
                "Short window must be greater than 0".into(),
            ));
        }
        if self.short_window >= self.long_window {
            return Err(StrategyError::InvalidConfig(
                "Short window must be less than long window".into(),
            ));
        }
        if !(0.0..1.0).contains(&self.trailing_stop_fraction) {
            return Err(StrategyError::InvalidConfig(
                "Trailing stop fraction must be in [0, 1)".into(),
            ));
        }
        if !(0.0..1.0).contains(&self.slippage_buffer) {
            return Err(StrategyError::InvalidConfig(
                "Slippage buffer must be in [0, 1)".into(),
            ));
        }
        Ok(())
    }
}

/// Short and long SMA values for one bar.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SmaPair {
    pub short: f64,
    pub long: f64,
}

/// State of the per-symbol machine.
#[derive(Debug, Clone, PartialEq)]
pub enum MachineState {
    /// Fewer than `long_window` bars seen.
    Uninitialized,
    Flat,
    Long(Position),
}

impl MachineState {
    pub fn phase(&self) -> PositionPhase {
        match self {
            MachineState::Uninitialized => PositionPhase::Uninitialized,
            MachineState::Flat => PositionPhase::Flat,
            MachineState::Long(_) => PositionPhase::Long,
        }
    }

    pub fn position(&self) -> Option<&Position> {
        match self {
            MachineState::Long(position) => Some(position),
            _ => None,
        }
    }
}

/// Everything the transition function needs to know about one bar.
#[derive(Debug, Clone, Copy)]
pub struct BarInput<'a> {
    pub symbol: &'a str,
    pub bar: &'a Bar,
    /// SMAs as of the previous bar
    pub previous: Option<SmaPair>,
    /// SMAs including this bar; `None` until both windows are full
    pub current: Option<SmaPair>,
    pub available_cash: Decimal,
    /// Last bar of a finite stream
    pub is_final: bool,
}

/// Whole shares affordable at `close` marked up by `slippage_buffer`.
pub fn entry_quantity(available_cash: Decimal, close: f64, slippage_buffer: f64) -> Decimal {
    let Some(unit_cost) = Decimal::from_f64(close * (1.0 + slippage_buffer)) else {
        return Decimal::ZERO;
    };
    if unit_cost <= Decimal::ZERO || available_cash <= Decimal::ZERO {
        return Decimal::ZERO;
    }
    available_cash
        .checked_div(unit_cost)
        .map(|q| q.floor())
        .unwrap_or(Decimal::ZERO)
}

/// Advance the machine by one bar.
///
/// Pure: the returned state already reflects the emitted signal, if any.
pub fn transition(
    state: &MachineState,
    input: &BarInput<'_>,
    config: &SmaTrailingConfig,
) -> (MachineState, Option<Signal>) {
    let bar = input.bar;
    let Some(current) = input.current else {
        return (MachineState::Uninitialized, None);
    };

    let signal = |signal_type: SignalType, trigger: SignalTrigger, quantity: Decimal| Signal {
        symbol: input.symbol.to_string(),
        signal_type,
        trigger,
        price: bar.close,
        quantity,
        timestamp: bar.timestamp,
        short_sma: Some(current.short),
        long_sma: Some(current.long),
    };

    match state {
        MachineState::Uninitialized | MachineState::Flat => {
            let crossed_up = input
                .previous
                .is_some_and(|prev| prev.short <= prev.long && current.short > current.long);

            // An entry on the final bar would be liquidated immediately.
            if !crossed_up || input.is_final {
                return (MachineState::Flat, None);
            }

            let quantity = entry_quantity(input.available_cash, bar.close, config.slippage_buffer);
            if quantity.is_zero() {
                debug!(
                    symbol = input.symbol,
                    timestamp = bar.timestamp,
                    "Golden cross with no affordable quantity"
                );
                return (MachineState::Flat, None);
            }

            let position = Position::open(input.symbol, bar.close, quantity, bar.timestamp);
            (
                MachineState::Long(position),
                Some(signal(SignalType::Buy, SignalTrigger::GoldenCross, quantity)),
            )
        }
        MachineState::Long(position) => {
            let mut position = position.clone();
            let gain = position.mark(bar.close);

            let trigger = if input.is_final {
                Some(SignalTrigger::EndOfStream)
            } else if current.short < current.long {
                Some(SignalTrigger::CrossBelow)
            } else if position.peak_gain_pct > 0.0
                && gain < position.peak_gain_pct * (1.0 - config.trailing_stop_fraction)
            {
                Some(SignalTrigger::TrailingStop)
            } else {
                None
            };

            match trigger {
                Some(trigger) => (
                    MachineState::Flat,
                    Some(signal(SignalType::Sell, trigger, position.quantity)),
                ),
                None => (MachineState::Long(position), None),
            }
        }
    }
}

/// A signal whose execution has not been confirmed yet.
#[derive(Debug, Clone)]
struct Unconfirmed {
    timestamp: i64,
    before: MachineState,
}

fn invalid_window(e: IndicatorError) -> StrategyError {
    StrategyError::InvalidConfig(e.to_string())
}

/// SMA crossover strategy with a trailing stop on gain.
pub struct SmaTrailingStrategy {
    config: SmaTrailingConfig,
    short: RollingSma,
    long: RollingSma,
    previous: Option<SmaPair>,
    machine: MachineState,
    unconfirmed: Vec<Unconfirmed>,
    last_timestamp: Option<i64>,
    bars_processed: usize,
    signals_generated: usize,
}

impl SmaTrailingStrategy {
    /// Create a new strategy instance; the configuration is validated.
    pub fn new(config: SmaTrailingConfig) -> Result<Self, StrategyError> {
        config.validate()?;
        Ok(Self {
            short: RollingSma::new(config.short_window).map_err(invalid_window)?,
            long: RollingSma::new(config.long_window).map_err(invalid_window)?,
            config,
            previous: None,
            machine: MachineState::Uninitialized,
            unconfirmed: Vec::new(),
            last_timestamp: None,
            bars_processed: 0,
            signals_generated: 0,
        })
    }

    pub fn config(&self) -> &SmaTrailingConfig {
        &self.config
    }

    pub fn machine(&self) -> &MachineState {
        &self.machine
    }

    fn step(
        &mut self,
        bar: &Bar,
        available_cash: Decimal,
        is_final: bool,
    ) -> Result<Option<Signal>, StrategyError> {
        if let Some(last) = self.last_timestamp {
            if bar.timestamp <= last {
                return Err(StrategyError::OutOfOrder {
                    symbol: self.config.symbol.clone(),
                    timestamp: bar.timestamp,
                    last,
                });
            }
        }

        let short = self.short.update(bar.close);
        let long = self.long.update(bar.close);
        let current = short.zip(long).map(|(short, long)| SmaPair { short, long });

        let input = BarInput {
            symbol: &self.config.symbol,
            bar,
            previous: self.previous,
            current,
            available_cash,
            is_final,
        };
        let (next, signal) = transition(&self.machine, &input, &self.config);

        if signal.is_some() {
            self.signals_generated += 1;
            self.unconfirmed.push(Unconfirmed {
                timestamp: bar.timestamp,
                before: self.machine.clone(),
            });
        }

        self.machine = next;
        self.previous = current;
        self.last_timestamp = Some(bar.timestamp);
        self.bars_processed += 1;

        Ok(signal)
    }
}

impl Strategy for SmaTrailingStrategy {
    fn name(&self) -> &str {
        "sma_trailing"
    }

    fn description(&self) -> &str {
        "SMA golden-cross entries with cross-below and trailing-stop exits"
    }

    fn symbol(&self) -> &str {
        &self.config.symbol
    }

    fn on_bar(
        &mut self,
        bar: &Bar,
        available_cash: Decimal,
    ) -> Result<Option<Signal>, StrategyError> {
        self.step(bar, available_cash, false)
    }

    fn on_final_bar(
        &mut self,
        bar: &Bar,
        available_cash: Decimal,
    ) -> Result<Option<Signal>, StrategyError> {
        self.step(bar, available_cash, true)
    }

    fn confirm(&mut self, timestamp: i64, fill_price: Option<f64>, quantity: Option<Decimal>) {
        let Some(idx) = self.unconfirmed.iter().position(|u| u.timestamp == timestamp) else {
            return;
        };
        self.unconfirmed.remove(idx);

        if let MachineState::Long(position) = &mut self.machine {
            if position.opened_at == timestamp {
                if let Some(price) = fill_price {
                    position.entry_price = price;
                }
                if let Some(quantity) = quantity {
                    position.quantity = quantity;
                }
            }
        }
    }

    fn revert(&mut self, timestamp: i64) -> bool {
        let Some(idx) = self.unconfirmed.iter().position(|u| u.timestamp == timestamp) else {
            return false;
        };
        // Later signals were derived from the state being undone.
        self.machine = self.unconfirmed[idx].before.clone();
        self.unconfirmed.truncate(idx);
        true
    }

    fn reset(&mut self) {
        self.short.reset();
        self.long.reset();
        self.previous = None;
        self.machine = MachineState::Uninitialized;
        self.unconfirmed.clear();
        self.last_timestamp = None;
        self.bars_processed = 0;
        self.signals_generated = 0;
    }

    fn state(&self) -> StrategyState {
        let mut indicators = std::collections::HashMap::new();
        if let Some(pair) = self.previous {
            indicators.insert("short_sma".to_string(), pair.short);
            indicators.insert("long_sma".to_string(), pair.long);
        }

        StrategyState {
            name: self.name().to_string(),
            symbol: self.config.symbol.clone(),
            phase: self.machine.phase(),
            is_warmed_up: self.bars_processed >= self.warmup_period(),
            bars_processed: self.bars_processed,
            signals_generated: self.signals_generated,
            indicators,
            position: self.machine.position().cloned(),
            custom: serde_json::json!({
                "short_window": self.config.short_window,
                "long_window": self.config.long_window,
                "trailing_stop_fraction": self.config.trailing_stop_fraction,
                "unconfirmed_signals": self.unconfirmed.len(),
            }),
        }
    }

    fn warmup_period(&self) -> usize {
        self.config.short_window.max(self.config.long_window)
    }

    fn last_timestamp(&self) -> Option<i64> {
        self.last_timestamp
    }
}
