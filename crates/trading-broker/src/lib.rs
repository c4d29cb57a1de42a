//! Broker integrations.
//!
//! [`AlpacaBroker`] talks to Alpaca's REST API and also serves bars and
//! quotes; [`PaperBroker`] fills orders in memory.

mod alpaca;
mod paper;

pub use alpaca::{AlpacaBroker, AlpacaConfig};
pub use paper::PaperBroker;
