//! Source of externally detected trade intents.

use crate::error::DataError;
use crate::types::TradeIntent;
use async_trait::async_trait;

/// Supplies trade intents detected outside the strategy machines, e.g. by an
/// email alert extractor. Symbol, side, reference price and detection time
/// arrive already extracted.
#[async_trait]
pub trait IntentSource: Send + Sync {
    /// Return intents that have arrived since the last poll.
    ///
    /// Sources may return the same intent more than once; the orchestrator
    /// deduplicates by journal key.
    async fn poll_intents(&self) -> Result<Vec<TradeIntent>, DataError>;

    fn name(&self) -> &str;
}
