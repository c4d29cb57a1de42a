//! External trade intent sources.

use async_trait::async_trait;
use std::path::PathBuf;
use std::sync::atomic::{AtomicUsize, Ordering};
use tokio::sync::{mpsc, Mutex};
use tracing::{debug, warn};
use trading_core::error::DataError;
use trading_core::traits::IntentSource;
use trading_core::types::TradeIntent;

/// Reads intents appended to a JSON-lines inbox file.
///
/// Each poll returns only the complete lines added since the previous poll.
/// Lines that fail to parse are logged and skipped.
#[derive(Debug)]
pub struct FileIntentSource {
    path: PathBuf,
    lines_consumed: AtomicUsize,
}

impl FileIntentSource {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            lines_consumed: AtomicUsize::new(0),
        }
    }
}

#[async_trait]
impl IntentSource for FileIntentSource {
    async fn poll_intents(&self) -> Result<Vec<TradeIntent>, DataError> {
        let contents = match tokio::fs::read_to_string(&self.path).await {
            Ok(contents) => contents,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => {
                return Err(DataError::Internal(format!(
                    "Failed to read intent inbox {}: {e}",
                    self.path.display()
                )))
            }
        };

        let lines: Vec<&str> = contents.lines().collect();
        // A trailing line without a newline may still be being written.
        let complete = if contents.ends_with('\n') {
            lines.len()
        } else {
            lines.len().saturating_sub(1)
        };
        let consumed = self.lines_consumed.load(Ordering::Acquire);
        // A truncated inbox starts over.
        let start = if complete < consumed { 0 } else { consumed };

        let mut intents = Vec::new();
        for (offset, line) in lines[start..complete].iter().enumerate() {
            let line = line.trim();
            if line.is_empty() {
                continue;
            }
            match serde_json::from_str::<TradeIntent>(line) {
                Ok(intent) => intents.push(intent),
                Err(e) => warn!(
                    inbox = %self.path.display(),
                    line = start + offset + 1,
                    error = %e,
                    "Skipping malformed intent"
                ),
            }
        }
        self.lines_consumed.store(complete, Ordering::Release);

        if !intents.is_empty() {
            debug!(count = intents.len(), inbox = %self.path.display(), "Read external intents");
        }
        Ok(intents)
    }

    fn name(&self) -> &str {
        "file inbox"
    }
}

/// Intents pushed over an in-process channel.
pub struct ChannelIntentSource {
    receiver: Mutex<mpsc::UnboundedReceiver<TradeIntent>>,
}

impl ChannelIntentSource {
    /// Create a source and the sender that feeds it.
    pub fn new() -> (Self, mpsc::UnboundedSender<TradeIntent>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (
            Self {
                receiver: Mutex::new(rx),
            },
            tx,
        )
    }
}

#[async_trait]
impl IntentSource for ChannelIntentSource {
    async fn poll_intents(&self) -> Result<Vec<TradeIntent>, DataError> {
        let mut receiver = self.receiver.lock().await;
        let mut intents = Vec::new();
        while let Ok(intent) = receiver.try_recv() {
            intents.push(intent);
        }
        Ok(intents)
    }

    fn name(&self) -> &str {
        "channel"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use std::io::Write;
    use trading_core::types::Side;

    fn line(symbol: &str, side: &str) -> String {
        format!(
            r#"{{"symbol":"{symbol}","side":"{side}","reference_price":2.5,"detected_at":"2020-06-16T14:30:00Z","source_id":"msg"}}"#
        )
    }

    #[tokio::test]
    async fn test_file_source_returns_only_new_lines() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("inbox.jsonl");
        let source = FileIntentSource::new(&path);

        assert!(source.poll_intents().await.unwrap().is_empty());

        let mut file = std::fs::File::create(&path).unwrap();
        writeln!(file, "{}", line("TWK", "buy")).unwrap();
        writeln!(file, "not json").unwrap();
        writeln!(file).unwrap();
        writeln!(file, "{}", line("CCL", "sell")).unwrap();
        file.flush().unwrap();

        let intents = source.poll_intents().await.unwrap();
        assert_eq!(intents.len(), 2);
        assert_eq!(intents[0].symbol, "TWK");
        assert_eq!(intents[1].side, Side::Sell);

        assert!(source.poll_intents().await.unwrap().is_empty());

        writeln!(file, "{}", line("AAPL", "buy")).unwrap();
        file.flush().unwrap();
        let intents = source.poll_intents().await.unwrap();
        assert_eq!(intents.len(), 1);
        assert_eq!(intents[0].symbol, "AAPL");
    }

    #[tokio::test]
    async fn test_channel_source_drains() {
        let (source, tx) = ChannelIntentSource::new();
        tx.send(TradeIntent::external("TWK", Side::Buy, 2.5, Utc::now(), "a")).unwrap();
        tx.send(TradeIntent::external("TWK", Side::Sell, 2.7, Utc::now(), "b")).unwrap();

        let intents = source.poll_intents().await.unwrap();
        assert_eq!(intents.len(), 2);
        assert!(source.poll_intents().await.unwrap().is_empty());
    }
}
