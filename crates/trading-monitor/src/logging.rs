//! Logging setup.

use std::str::FromStr;

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

#[derive(Error, Debug)]
pub enum LoggingError {
    #[error("Unknown log format: {0} (expected pretty, compact or json)")]
    UnknownFormat(String),

    #[error("Invalid log filter {filter}: {message}")]
    InvalidFilter { filter: String, message: String },

    #[error("A global subscriber is already installed")]
    AlreadyInstalled,
}

/// Output format of the fmt layer.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    #[default]
    Pretty,
    Compact,
    Json,
}

impl FromStr for LogFormat {
    type Err = LoggingError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "pretty" => Ok(LogFormat::Pretty),
            "compact" => Ok(LogFormat::Compact),
            "json" => Ok(LogFormat::Json),
            other => Err(LoggingError::UnknownFormat(other.to_string())),
        }
    }
}

/// Build the level filter. `RUST_LOG` wins over the configured level.
fn build_filter(level: &str) -> Result<EnvFilter, LoggingError> {
    if let Ok(filter) = EnvFilter::try_from_default_env() {
        return Ok(filter);
    }
    EnvFilter::try_new(level).map_err(|e| LoggingError::InvalidFilter {
        filter: level.to_string(),
        message: e.to_string(),
    })
}

/// Install the global subscriber with the given level and format.
pub fn setup_logging(level: &str, format: LogFormat) -> Result<(), LoggingError> {
    let filter = build_filter(level)?;
    let registry = tracing_subscriber::registry().with(filter);

    let installed = match format {
        LogFormat::Json => registry.with(fmt::layer().json()).try_init(),
        LogFormat::Compact => registry.with(fmt::layer().compact()).try_init(),
        LogFormat::Pretty => registry.with(fmt::layer().pretty()).try_init(),
    };
    installed.map_err(|_| LoggingError::AlreadyInstalled)
}
