//! Error types for the trading system.

use std::path::PathBuf;
use thiserror::Error;

/// Top-level trading system error.
#[derive(Error, Debug)]
pub enum TradingError {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Strategy error: {0}")]
    Strategy(#[from] StrategyError),

    #[error("Broker error: {0}")]
    Broker(#[from] BrokerError),

    #[error("Data error: {0}")]
    Data(#[from] DataError),

    #[error("Journal error: {0}")]
    Journal(#[from] JournalError),

    #[error("Indicator error: {0}")]
    Indicator(#[from] IndicatorError),

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl TradingError {
    /// Journal failures abort the current orchestrator cycle; everything else
    /// stays scoped to the symbol that raised it.
    pub fn is_journal(&self) -> bool {
        matches!(self, TradingError::Journal(_))
    }
}

/// Strategy-specific errors.
#[derive(Error, Debug)]
pub enum StrategyError {
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("Out-of-order bar for {symbol}: {timestamp} is not after {last}")]
    OutOfOrder {
        symbol: String,
        timestamp: i64,
        last: i64,
    },

    #[error("Strategy error: {0}")]
    Internal(String),
}

/// Broker-specific errors.
#[derive(Error, Debug)]
pub enum BrokerError {
    #[error("Configuration error: {0}")]
    Configuration(String),

    #[error("Connection error: {0}")]
    Connection(String),

    /// Non-success response to an order submission.
    #[error("Order submission failed with status {status}: {message}")]
    Submission { status: u16, message: String },

    #[error("Insufficient funds: required {required}, available {available}")]
    InsufficientFunds {
        required: rust_decimal::Decimal,
        available: rust_decimal::Decimal,
    },

    #[error("Insufficient position in {symbol}: requested {requested}, held {held}")]
    InsufficientPosition {
        symbol: String,
        requested: rust_decimal::Decimal,
        held: rust_decimal::Decimal,
    },

    #[error("API error: {0}")]
    ApiError(String),
}

/// Data source errors.
#[derive(Error, Debug)]
pub enum DataError {
    /// The feed returned no bars (or a partial set) for the symbol.
    #[error("No bar data available for {symbol}")]
    Unavailable { symbol: String },

    /// No live quote could be obtained for the symbol.
    #[error("No quote available for {symbol}")]
    QuoteUnavailable { symbol: String },

    #[error("Invalid timeframe: {0}")]
    InvalidTimeframe(String),

    #[error("Connection error: {0}")]
    ConnectionError(String),

    #[error("Parse error: {0}")]
    ParseError(String),

    #[error("Data source error: {0}")]
    Internal(String),
}

/// Transaction journal errors.
#[derive(Error, Debug)]
pub enum JournalError {
    #[error("Journal I/O error on {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Corrupt journal store {path}: {source}")]
    Corrupt {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error("Journal serialization failed: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Journal lock poisoned")]
    LockPoisoned,
}

/// Indicator calculation errors.
#[derive(Error, Debug)]
pub enum IndicatorError {
    #[error("Invalid parameter: {0}")]
    InvalidParameter(String),
}

/// Result type alias for trading operations.
pub type TradingResult<T> = Result<T, TradingError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_journal_errors_are_flagged() {
        let err: TradingError = JournalError::LockPoisoned.into();
        assert!(err.is_journal());

        let err: TradingError = DataError::QuoteUnavailable {
            symbol: "AAPL".into(),
        }
        .into();
        assert!(!err.is_journal());
        assert_eq!(err.to_string(), "Data error: No quote available for AAPL");
    }

    #[test]
    fn test_submission_error_message() {
        let err = BrokerError::Submission {
            status: 403,
            message: "forbidden".into(),
        };
        assert_eq!(
            err.to_string(),
            "Order submission failed with status 403: forbidden"
        );
    }
}
