//! Data sources for trading.
//!
//! - [`CsvDataSource`]: historical bars from CSV files, one file per symbol
//! - [`FileIntentSource`] and [`ChannelIntentSource`]: externally detected
//!   trade intents

mod csv_source;
mod intents;

pub use csv_source::CsvDataSource;
pub use intents::{ChannelIntentSource, FileIntentSource};

use trading_core::error::DataError;
use trading_core::types::Bar;

/// Load every bar from a single CSV file.
pub fn load_csv(path: impl AsRef<std::path::Path>) -> Result<Vec<Bar>, DataError> {
    csv_source::read_bars(path.as_ref())
}
