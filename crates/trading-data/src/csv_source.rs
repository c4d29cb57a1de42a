//! CSV data source.

use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, NaiveDateTime, Utc};
use csv::ReaderBuilder;
use serde::Deserialize;
use std::path::{Path, PathBuf};
use tracing::debug;
use trading_core::error::DataError;
use trading_core::traits::MarketData;
use trading_core::types::{Bar, Timeframe};

/// CSV record format.
#[derive(Debug, Deserialize)]
struct CsvRecord {
    #[serde(alias = "Date", alias = "date", alias = "timestamp", alias = "Timestamp")]
    date: String,
    #[serde(alias = "Open", alias = "open")]
    open: f64,
    #[serde(alias = "High", alias = "high")]
    high: f64,
    #[serde(alias = "Low", alias = "low")]
    low: f64,
    #[serde(alias = "Close", alias = "close", alias = "Adj Close")]
    close: f64,
    #[serde(alias = "Volume", alias = "volume", default)]
    volume: f64,
}

/// Where the CSV files live.
#[derive(Debug, Clone)]
enum Layout {
    /// `{dir}/{SYMBOL}.csv`
    Directory(PathBuf),
    /// One file served for every symbol
    File(PathBuf),
}

/// CSV data source for historical data.
#[derive(Debug, Clone)]
pub struct CsvDataSource {
    layout: Layout,
}

impl CsvDataSource {
    /// Serve `{dir}/{SYMBOL}.csv`.
    pub fn new(dir: impl Into<PathBuf>) -> Result<Self, DataError> {
        let dir = dir.into();
        if !dir.is_dir() {
            return Err(DataError::Internal(format!(
                "CSV directory not found: {}",
                dir.display()
            )));
        }
        Ok(Self {
            layout: Layout::Directory(dir),
        })
    }

    /// Serve one file regardless of the requested symbol.
    pub fn from_file(path: impl Into<PathBuf>) -> Result<Self, DataError> {
        let path = path.into();
        if !path.is_file() {
            return Err(DataError::Internal(format!(
                "CSV file not found: {}",
                path.display()
            )));
        }
        Ok(Self {
            layout: Layout::File(path),
        })
    }

    /// Symbols available in a directory layout, sorted.
    pub fn symbols(&self) -> Result<Vec<String>, DataError> {
        let Layout::Directory(dir) = &self.layout else {
            return Ok(Vec::new());
        };
        let entries = std::fs::read_dir(dir).map_err(|e| DataError::Internal(e.to_string()))?;

        let mut symbols: Vec<String> = entries
            .filter_map(Result::ok)
            .map(|entry| entry.path())
            .filter(|path| path.extension().is_some_and(|ext| ext.eq_ignore_ascii_case("csv")))
            .filter_map(|path| path.file_stem().and_then(|s| s.to_str()).map(str::to_string))
            .collect();
        symbols.sort();
        Ok(symbols)
    }

    fn path_for(&self, symbol: &str) -> PathBuf {
        match &self.layout {
            Layout::Directory(dir) => dir.join(format!("{symbol}.csv")),
            Layout::File(path) => path.clone(),
        }
    }

    /// Load every bar for `symbol`, oldest first.
    pub fn load_symbol(&self, symbol: &str) -> Result<Vec<Bar>, DataError> {
        let path = self.path_for(symbol);
        if !path.exists() {
            return Err(DataError::Unavailable {
                symbol: symbol.to_string(),
            });
        }
        let bars = read_bars(&path)?;
        debug!(symbol, bars = bars.len(), path = %path.display(), "Loaded CSV bars");
        Ok(bars)
    }
}

#[async_trait]
impl MarketData for CsvDataSource {
    async fn get_bars(
        &self,
        symbol: &str,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
        _timeframe: Timeframe,
    ) -> Result<Vec<Bar>, DataError> {
        let (start, end) = (start.timestamp_millis(), end.timestamp_millis());
        let bars: Vec<Bar> = self
            .load_symbol(symbol)?
            .into_iter()
            .filter(|b| b.timestamp >= start && b.timestamp <= end)
            .collect();

        if bars.is_empty() {
            return Err(DataError::Unavailable {
                symbol: symbol.to_string(),
            });
        }
        Ok(bars)
    }

    fn name(&self) -> &str {
        "CSV"
    }
}

/// Read, sort and deduplicate the bars of one file.
pub(crate) fn read_bars(path: &Path) -> Result<Vec<Bar>, DataError> {
    let mut reader = ReaderBuilder::new()
        .has_headers(true)
        .flexible(true)
        .from_path(path)
        .map_err(|e| DataError::ParseError(e.to_string()))?;

    let mut bars = Vec::new();

    for result in reader.deserialize() {
        let record: CsvRecord = result.map_err(|e| DataError::ParseError(e.to_string()))?;
        let timestamp = parse_timestamp(&record.date)?;

        bars.push(Bar::new(
            timestamp,
            record.open,
            record.high,
            record.low,
            record.close,
            record.volume,
        ));
    }

    bars.sort_by_key(|b| b.timestamp);
    bars.dedup_by_key(|b| b.timestamp);

    Ok(bars)
}

/// Parse various timestamp formats into Unix milliseconds.
fn parse_timestamp(date_str: &str) -> Result<i64, DataError> {
    if let Ok(dt) = DateTime::parse_from_rfc3339(date_str) {
        return Ok(dt.timestamp_millis());
    }

    let datetime_formats = ["%Y-%m-%d %H:%M:%S", "%Y-%m-%d %H:%M", "%Y-%m-%dT%H:%M:%S"];
    for format in datetime_formats {
        if let Ok(dt) = NaiveDateTime::parse_from_str(date_str, format) {
            return Ok(dt.and_utc().timestamp_millis());
        }
    }

    let date_formats = ["%Y-%m-%d", "%Y/%m/%d", "%m/%d/%Y", "%d-%m-%Y"];
    for format in date_formats {
        if let Ok(d) = NaiveDate::parse_from_str(date_str, format) {
            return Ok(d.and_time(chrono::NaiveTime::MIN).and_utc().timestamp_millis());
        }
    }

    // Unix timestamp; milliseconds if > 10 digits
    if let Ok(ts) = date_str.parse::<i64>() {
        return Ok(if ts > 10_000_000_000 { ts } else { ts * 1000 });
    }

    Err(DataError::ParseError(format!(
        "Could not parse date: {}",
        date_str
    )))
}
