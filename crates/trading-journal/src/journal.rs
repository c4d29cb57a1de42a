//! Journal store management.

use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use chrono::{DateTime, Local, NaiveDate, Utc};
use chrono_tz::Tz;
use tracing::{debug, info};
use trading_core::error::JournalError;
use trading_core::types::{ExecutionResult, JournalKey};

use crate::record::{DayStore, JournalRecord};

const KEY_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

/// Outcome of an upsert.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UpsertOutcome {
    Inserted,
    /// The key was already journaled; nothing was written.
    AlreadyPresent,
}

/// Date-partitioned JSON journal under a directory.
///
/// Every read-modify-write of a day's store runs under one lock, and stores
/// are replaced by writing a temporary file and renaming it into place.
#[derive(Debug)]
pub struct TransactionJournal {
    dir: PathBuf,
    timezone: Tz,
    lock: Mutex<()>,
}

impl TransactionJournal {
    /// Journal rooted at `dir`, partitioned by dates in `timezone`.
    pub fn new(dir: impl Into<PathBuf>, timezone: Tz) -> Self {
        Self {
            dir: dir.into(),
            timezone,
            lock: Mutex::new(()),
        }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Exchange-local date whose store holds `key`.
    pub fn partition_of(&self, key: &JournalKey) -> NaiveDate {
        key.datetime().with_timezone(&self.timezone).date_naive()
    }

    /// Store path for an exchange-local date.
    pub fn path_for(&self, date: NaiveDate) -> PathBuf {
        self.dir.join(format!("{}.json", date.format("%Y-%m-%d")))
    }

    /// Exchange-local timestamp string used as the record key.
    pub fn timestamp_key(&self, key: &JournalKey) -> String {
        key.datetime()
            .with_timezone(&self.timezone)
            .format(KEY_FORMAT)
            .to_string()
    }

    /// Whether `key` has been journaled.
    pub fn contains(&self, key: &JournalKey) -> Result<bool, JournalError> {
        let _guard = self.lock.lock().map_err(|_| JournalError::LockPoisoned)?;
        let store = read_store(&self.path_for(self.partition_of(key)))?;
        Ok(lookup(&store, &key.symbol, &self.timestamp_key(key)).is_some())
    }

    /// Load one day's store; a day with no store is empty.
    pub fn load_day(&self, date: NaiveDate) -> Result<DayStore, JournalError> {
        let _guard = self.lock.lock().map_err(|_| JournalError::LockPoisoned)?;
        read_store(&self.path_for(date))
    }

    /// Insert `record` under `key` unless the key already exists.
    pub fn upsert(
        &self,
        key: &JournalKey,
        record: JournalRecord,
    ) -> Result<UpsertOutcome, JournalError> {
        let _guard = self.lock.lock().map_err(|_| JournalError::LockPoisoned)?;

        let path = self.path_for(self.partition_of(key));
        let mut store = read_store(&path)?;
        let ts_key = self.timestamp_key(key);

        if lookup(&store, &key.symbol, &ts_key).is_some() {
            debug!(symbol = %key.symbol, timestamp = %ts_key, "Journal key already present");
            return Ok(UpsertOutcome::AlreadyPresent);
        }

        store
            .entry(key.symbol.clone())
            .or_default()
            .insert(ts_key.clone(), record);
        write_store(&self.dir, &path, &store)?;

        info!(
            symbol = %key.symbol,
            timestamp = %ts_key,
            store = %path.display(),
            "Journaled transaction"
        );
        Ok(UpsertOutcome::Inserted)
    }

    /// Journal a gate result under its intent's key, recorded at `recorded_at`.
    pub fn record(
        &self,
        result: &ExecutionResult,
        recorded_at: DateTime<Utc>,
    ) -> Result<UpsertOutcome, JournalError> {
        let record = JournalRecord::from_result(
            result,
            recorded_at.with_timezone(&self.timezone).fixed_offset(),
            recorded_at.with_timezone(&Local).fixed_offset(),
        );
        self.upsert(&result.intent.key(), record)
    }
}

fn lookup<'a>(store: &'a DayStore, symbol: &str, ts_key: &str) -> Option<&'a JournalRecord> {
    store.get(symbol).and_then(|records| records.get(ts_key))
}

fn read_store(path: &Path) -> Result<DayStore, JournalError> {
    match fs::read_to_string(path) {
        Ok(contents) if contents.trim().is_empty() => Ok(DayStore::new()),
        Ok(contents) => serde_json::from_str(&contents).map_err(|source| JournalError::Corrupt {
            path: path.to_path_buf(),
            source,
        }),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(DayStore::new()),
        Err(source) => Err(JournalError::Io {
            path: path.to_path_buf(),
            source,
        }),
    }
}

/// Replace the store at `path` atomically: write to .tmp then rename.
fn write_store(dir: &Path, path: &Path, store: &DayStore) -> Result<(), JournalError> {
    let io_err = |path: &Path| {
        let path = path.to_path_buf();
        move |source| JournalError::Io { path, source }
    };

    fs::create_dir_all(dir).map_err(io_err(dir))?;

    let json = serde_json::to_vec_pretty(store)?;
    let tmp_path = path.with_extension("json.tmp");

    let mut file = fs::File::create(&tmp_path).map_err(io_err(&tmp_path))?;
    file.write_all(&json).map_err(io_err(&tmp_path))?;
    file.sync_all().map_err(io_err(&tmp_path))?;
    drop(file);

    fs::rename(&tmp_path, path).map_err(|source| {
        let _ = fs::remove_file(&tmp_path);
        JournalError::Io {
            path: path.to_path_buf(),
            source,
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use rust_decimal_macros::dec;
    use trading_core::traits::Quote;
    use trading_core::types::{Rejection, Side, TradeIntent};

    fn journal(dir: &Path) -> TransactionJournal {
        TransactionJournal::new(dir, chrono_tz::America::New_York)
    }

    fn record(side: Side, price: f64) -> JournalRecord {
        let at = Utc.with_ymd_and_hms(2020, 6, 16, 14, 0, 0).unwrap();
        JournalRecord {
            transaction_type: side,
            price,
            transaction_time_exchange: at
                .with_timezone(&chrono_tz::America::New_York)
                .fixed_offset(),
            transaction_time_local: at.fixed_offset(),
            outcome: "accepted".into(),
            quantity: Some(dec!(9)),
            order_id: None,
        }
    }

    #[test]
    fn test_upsert_is_idempotent() {
        let dir = tempfile::tempdir().unwrap();
        let journal = journal(dir.path());
        let key = JournalKey::new("CCL", 1_592_316_000);

        assert_eq!(journal.upsert(&key, record(Side::Buy, 14.2)).unwrap(), UpsertOutcome::Inserted);
        assert_eq!(
            journal.upsert(&key, record(Side::Buy, 99.0)).unwrap(),
            UpsertOutcome::AlreadyPresent
        );

        let date = journal.partition_of(&key);
        let store = journal.load_day(date).unwrap();
        assert_eq!(store.len(), 1);
        let records = &store["CCL"];
        assert_eq!(records.len(), 1);
        // First write wins.
        assert_eq!(records.values().next().unwrap().price, 14.2);
        assert!(journal.contains(&key).unwrap());
    }

    #[test]
    fn test_partition_and_key_use_exchange_time() {
        let dir = tempfile::tempdir().unwrap();
        let journal = journal(dir.path());
        // 2020-06-17 02:30 UTC is 22:30 on the 16th in New York.
        let at = Utc.with_ymd_and_hms(2020, 6, 17, 2, 30, 0).unwrap();
        let key = JournalKey::new("CCL", at.timestamp());

        assert_eq!(journal.partition_of(&key), NaiveDate::from_ymd_opt(2020, 6, 16).unwrap());
        assert_eq!(journal.timestamp_key(&key), "2020-06-16 22:30:00");
        assert_eq!(
            journal.path_for(journal.partition_of(&key)),
            dir.path().join("2020-06-16.json")
        );
    }

    #[test]
    fn test_persisted_schema() {
        let dir = tempfile::tempdir().unwrap();
        let journal = journal(dir.path());
        let at = Utc.with_ymd_and_hms(2020, 6, 16, 14, 0, 0).unwrap();
        let key = JournalKey::new("TWK", at.timestamp());
        journal.upsert(&key, record(Side::Sell, 3.1)).unwrap();

        let raw = fs::read_to_string(dir.path().join("2020-06-16.json")).unwrap();
        let value: serde_json::Value = serde_json::from_str(&raw).unwrap();
        let entry = &value["TWK"]["2020-06-16 10:00:00"];
        assert_eq!(entry["transaction_type"], "sell");
        assert_eq!(entry["price"], 3.1);
        assert_eq!(entry["transaction_time_exchange"], "2020-06-16T10:00:00-04:00");
        assert!(entry["transaction_time_local"].is_string());

        assert!(!dir.path().join("2020-06-16.json.tmp").exists());
    }

    #[test]
    fn test_multiple_symbols_share_a_day() {
        let dir = tempfile::tempdir().unwrap();
        let journal = journal(dir.path());
        let ts = Utc.with_ymd_and_hms(2020, 6, 16, 15, 0, 0).unwrap().timestamp();

        journal.upsert(&JournalKey::new("CCL", ts), record(Side::Buy, 14.0)).unwrap();
        journal.upsert(&JournalKey::new("TWK", ts), record(Side::Buy, 2.5)).unwrap();
        journal.upsert(&JournalKey::new("CCL", ts + 60), record(Side::Sell, 14.5)).unwrap();

        let store = journal.load_day(NaiveDate::from_ymd_opt(2020, 6, 16).unwrap()).unwrap();
        assert_eq!(store["CCL"].len(), 2);
        assert_eq!(store["TWK"].len(), 1);
    }

    #[test]
    fn test_missing_day_is_empty() {
        let dir = tempfile::tempdir().unwrap();
        let journal = journal(&dir.path().join("not-yet-created"));
        let store = journal.load_day(NaiveDate::from_ymd_opt(2020, 1, 2).unwrap()).unwrap();
        assert!(store.is_empty());
        assert!(!journal.contains(&JournalKey::new("CCL", 0)).unwrap());
    }

    #[test]
    fn test_corrupt_store_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("2020-06-16.json"), "{ not json").unwrap();
        let journal = journal(dir.path());

        let at = Utc.with_ymd_and_hms(2020, 6, 16, 15, 0, 0).unwrap();
        let key = JournalKey::new("CCL", at.timestamp());
        assert!(matches!(journal.contains(&key), Err(JournalError::Corrupt { .. })));
        assert!(matches!(
            journal.upsert(&key, record(Side::Buy, 1.0)),
            Err(JournalError::Corrupt { .. })
        ));
    }

    #[test]
    fn test_record_execution_result() {
        let dir = tempfile::tempdir().unwrap();
        let journal = journal(dir.path());
        let detected = Utc.with_ymd_and_hms(2020, 6, 16, 15, 0, 0).unwrap();
        let result = ExecutionResult {
            intent: TradeIntent::external("TWK", Side::Buy, 10.0, detected, "msg-1"),
            matched_quote: Quote::new("TWK", 10.5, 10.6),
            deviation_pct: 0.06,
            accepted: false,
            rejection: Some(Rejection::DeviationExceeded {
                deviation: 0.06,
                limit: 0.05,
            }),
            order_id: None,
            filled_price: None,
            quantity: None,
        };

        journal.record(&result, detected).unwrap();
        let store = journal.load_day(NaiveDate::from_ymd_opt(2020, 6, 16).unwrap()).unwrap();
        let entry = &store["TWK"]["2020-06-16 11:00:00"];
        assert_eq!(entry.outcome, "deviation exceeds limit");
        assert_eq!(entry.price, 10.6);
        assert!(!entry.is_accepted());
    }
}
