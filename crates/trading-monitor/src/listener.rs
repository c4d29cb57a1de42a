//! Execution observers.

use std::sync::atomic::{AtomicUsize, Ordering};

use tracing::info;
use trading_core::traits::ExecutionListener;
use trading_core::types::ExecutionResult;

/// Logs every accepted execution at `info`.
#[derive(Debug, Default)]
pub struct LoggingListener {
    seen: AtomicUsize,
}

impl LoggingListener {
    pub fn new() -> Self {
        Self::default()
    }

    /// Executions observed so far.
    pub fn count(&self) -> usize {
        self.seen.load(Ordering::Relaxed)
    }
}

impl ExecutionListener for LoggingListener {
    fn on_execution(&self, result: &ExecutionResult) {
        self.seen.fetch_add(1, Ordering::Relaxed);
        let intent = &result.intent;
        info!(
            symbol = %intent.symbol,
            timestamp = %intent.detected_at,
            side = %intent.side,
            origin = ?intent.origin,
            quantity = ?result.quantity,
            price = result.execution_price(),
            deviation_pct = result.deviation_pct,
            order_id = result.order_id.as_deref().unwrap_or("-"),
            "Order executed"
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use rust_decimal_macros::dec;
    use trading_core::traits::Quote;
    use trading_core::types::{Side, TradeIntent};

    #[test]
    fn test_counts_executions() {
        let listener = LoggingListener::new();
        let result = ExecutionResult {
            intent: TradeIntent::external("TWK", Side::Buy, 10.0, Utc::now(), "alert"),
            matched_quote: Quote::new("TWK", 10.0, 10.02),
            deviation_pct: 0.002,
            accepted: true,
            rejection: None,
            order_id: Some("ord-1".into()),
            filled_price: Some(dec!(10.02)),
            quantity: Some(dec!(9)),
        };

        listener.on_execution(&result);
        listener.on_execution(&result);
        assert_eq!(listener.count(), 2);
    }
}
