//! Per-symbol trading state machines.
//!
//! A strategy instance owns one symbol's bar history and position. Machines
//! share no mutable state, so symbols can be processed independently.

mod sma_trailing;

pub use sma_trailing::{
    entry_quantity, transition, BarInput, MachineState, SmaPair, SmaTrailingConfig,
    SmaTrailingStrategy,
};
