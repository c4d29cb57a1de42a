//! Bar interval definitions.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::error::DataError;

/// Interval of the bars requested from a market data collaborator.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
pub enum Timeframe {
    /// 1 minute bars
    #[serde(rename = "1m")]
    #[default]
    Minute1,
    /// 5 minute bars
    #[serde(rename = "5m")]
    Minute5,
    /// 15 minute bars
    #[serde(rename = "15m")]
    Minute15,
    /// 30 minute bars
    #[serde(rename = "30m")]
    Minute30,
    /// 1 hour bars
    #[serde(rename = "1h")]
    Hour1,
    /// Daily bars
    #[serde(rename = "1d")]
    Daily,
}

impl Timeframe {
    /// Get the duration of the timeframe in seconds.
    pub fn as_secs(&self) -> u64 {
        match self {
            Timeframe::Minute1 => 60,
            Timeframe::Minute5 => 300,
            Timeframe::Minute15 => 900,
            Timeframe::Minute30 => 1800,
            Timeframe::Hour1 => 3600,
            Timeframe::Daily => 86400,
        }
    }

    /// Get the duration as a chrono span, for lookback windows.
    pub fn as_duration(&self) -> chrono::Duration {
        chrono::Duration::seconds(self.as_secs() as i64)
    }
}

impl fmt::Display for Timeframe {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Timeframe::Minute1 => "1m",
            Timeframe::Minute5 => "5m",
            Timeframe::Minute15 => "15m",
            Timeframe::Minute30 => "30m",
            Timeframe::Hour1 => "1h",
            Timeframe::Daily => "1d",
        };
        write!(f, "{}", s)
    }
}

impl FromStr for Timeframe {
    type Err = DataError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "1m" | "1min" | "minute" => Ok(Timeframe::Minute1),
            "5m" | "5min" => Ok(Timeframe::Minute5),
            "15m" | "15min" => Ok(Timeframe::Minute15),
            "30m" | "30min" => Ok(Timeframe::Minute30),
            "1h" | "1hour" | "hour" => Ok(Timeframe::Hour1),
            "1d" | "day" | "daily" => Ok(Timeframe::Daily),
            _ => Err(DataError::InvalidTimeframe(s.to_string())),
        }
    }
}
