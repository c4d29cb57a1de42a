//! Exchange trading window.

use std::sync::Mutex;

use chrono::{DateTime, Datelike, Duration, NaiveDate, NaiveTime, TimeZone, Utc, Weekday};
use chrono_tz::Tz;
use serde::{Deserialize, Serialize};
use trading_core::error::TradingError;

/// Source of the current instant.
pub trait Clock: Send + Sync {
    fn now(&self) -> DateTime<Utc>;
}

/// Wall clock.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

/// Manually driven clock for replays and tests.
#[derive(Debug)]
pub struct FixedClock {
    now: Mutex<DateTime<Utc>>,
}

impl FixedClock {
    pub fn new(now: DateTime<Utc>) -> Self {
        Self { now: Mutex::new(now) }
    }

    pub fn set(&self, now: DateTime<Utc>) {
        if let Ok(mut guard) = self.now.lock() {
            *guard = now;
        }
    }

    pub fn advance(&self, by: Duration) {
        if let Ok(mut guard) = self.now.lock() {
            *guard += by;
        }
    }
}

impl Clock for FixedClock {
    fn now(&self) -> DateTime<Utc> {
        match self.now.lock() {
            Ok(guard) => *guard,
            Err(poisoned) => *poisoned.into_inner(),
        }
    }
}

/// Regular session of an exchange: weekdays between `open` (inclusive) and
/// `close` (exclusive), exchange-local time.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct MarketHours {
    pub timezone: Tz,
    pub open: NaiveTime,
    pub close: NaiveTime,
}

impl Default for MarketHours {
    fn default() -> Self {
        Self {
            timezone: chrono_tz::America::New_York,
            open: NaiveTime::from_hms_opt(9, 30, 0).unwrap_or_default(),
            close: NaiveTime::from_hms_opt(16, 0, 0).unwrap_or_default(),
        }
    }
}

impl MarketHours {
    pub fn new(timezone: Tz, open: NaiveTime, close: NaiveTime) -> Result<Self, TradingError> {
        if open >= close {
            return Err(TradingError::Config(format!(
                "Market open {open} must be before close {close}"
            )));
        }
        Ok(Self {
            timezone,
            open,
            close,
        })
    }

    /// Parse an IANA zone name and `HH:MM[:SS]` bounds.
    pub fn parse(timezone: &str, open: &str, close: &str) -> Result<Self, TradingError> {
        let tz: Tz = timezone
            .parse()
            .map_err(|_| TradingError::Config(format!("Unknown timezone: {timezone}")))?;
        Self::new(tz, parse_time(open)?, parse_time(close)?)
    }

    /// `instant` in exchange-local time.
    pub fn local(&self, instant: DateTime<Utc>) -> DateTime<Tz> {
        instant.with_timezone(&self.timezone)
    }

    /// Exchange-local calendar date of `instant`.
    pub fn exchange_date(&self, instant: DateTime<Utc>) -> NaiveDate {
        self.local(instant).date_naive()
    }

    pub fn is_trading_day(&self, date: NaiveDate) -> bool {
        !matches!(date.weekday(), Weekday::Sat | Weekday::Sun)
    }

    /// Weekday and open <= local time < close.
    pub fn is_trading_time(&self, instant: DateTime<Utc>) -> bool {
        let local = self.local(instant);
        let time = local.time();
        self.is_trading_day(local.date_naive()) && time >= self.open && time < self.close
    }

    /// Session open of `date` as an instant, if that local time exists.
    pub fn session_open(&self, date: NaiveDate) -> Option<DateTime<Utc>> {
        self.timezone
            .from_local_datetime(&date.and_time(self.open))
            .earliest()
            .map(|dt| dt.with_timezone(&Utc))
    }

    /// An intent detected at `intent_at` may be executed at `now` only if it
    /// was detected at or after the open of its exchange day and `now` is
    /// inside that same day's trading window.
    pub fn is_actionable(&self, intent_at: DateTime<Utc>, now: DateTime<Utc>) -> bool {
        let intent_date = self.exchange_date(intent_at);
        if intent_date != self.exchange_date(now) || !self.is_trading_time(now) {
            return false;
        }
        self.session_open(intent_date)
            .is_some_and(|open| intent_at >= open)
    }
}

fn parse_time(value: &str) -> Result<NaiveTime, TradingError> {
    NaiveTime::parse_from_str(value, "%H:%M:%S")
        .or_else(|_| NaiveTime::parse_from_str(value, "%H:%M"))
        .map_err(|_| TradingError::Config(format!("Invalid time of day: {value}")))
}
