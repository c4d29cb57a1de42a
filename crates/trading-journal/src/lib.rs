//! Transaction journal.
//!
//! One JSON store per exchange-local calendar date, keyed by symbol and
//! order timestamp. A key is written at most once; repeated upserts of the
//! same bar or intent are no-ops, which is what keeps the live loop from
//! submitting the same order twice.

mod journal;
mod record;

pub use journal::{TransactionJournal, UpsertOutcome};
pub use record::{DayStore, JournalRecord};
