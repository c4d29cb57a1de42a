//! Logging setup and execution observers.

mod listener;
mod logging;

pub use listener::LoggingListener;
pub use logging::{setup_logging, LogFormat, LoggingError};
