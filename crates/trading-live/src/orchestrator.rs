//! The poll loop.

use std::collections::{BTreeMap, VecDeque};
use std::sync::Arc;

use chrono::{DateTime, Utc};
use rust_decimal::prelude::ToPrimitive;
use rust_decimal::Decimal;
use tracing::{debug, error, info, warn};
use trading_core::error::TradingError;
use trading_core::traits::{
    Broker, ExecutionListener, IntentSource, MarketData, QuoteSource, Strategy, StrategyState,
};
use trading_core::types::{IntentOrigin, Rejection, TradeIntent};
use trading_execution::{Clock, ExecutionGate, SystemClock};
use trading_journal::TransactionJournal;
use trading_strategies::SmaTrailingStrategy;

use crate::{LiveConfig, StopHandle};

/// Counters for one cycle.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CycleSummary {
    pub bars_processed: usize,
    pub signals: usize,
    pub executed: usize,
    /// Journaled business rejections
    pub rejected: usize,
    /// Already journaled or outside market hours
    pub dropped: usize,
    /// Kept pending for the next cycle
    pub deferred: usize,
    pub failed_symbols: usize,
}

/// Per-symbol state: the strategy machine (absent for symbols that only
/// receive external intents) and intents awaiting execution.
struct SymbolSlot {
    strategy: Option<Box<dyn Strategy>>,
    warmed_up: bool,
    pending: Vec<TradeIntent>,
}

impl SymbolSlot {
    fn with_strategy(strategy: Box<dyn Strategy>) -> Self {
        Self {
            strategy: Some(strategy),
            warmed_up: false,
            pending: Vec::new(),
        }
    }

    fn external_only() -> Self {
        Self {
            strategy: None,
            warmed_up: true,
            pending: Vec::new(),
        }
    }

    fn enqueue(&mut self, intent: TradeIntent) {
        let key = intent.key();
        if !self.pending.iter().any(|p| p.key() == key) {
            self.pending.push(intent);
        }
    }

    /// Undo a strategy intent's state change. Later strategy intents were
    /// derived from the undone state, so they are discarded too.
    fn roll_back(&mut self, intent: &TradeIntent, queue: &mut VecDeque<TradeIntent>) {
        if intent.origin != IntentOrigin::Strategy {
            return;
        }
        let Some(strategy) = self.strategy.as_mut() else {
            return;
        };
        if strategy.revert(intent.detected_at.timestamp_millis()) {
            queue.retain(|i| {
                i.origin != IntentOrigin::Strategy || i.detected_at <= intent.detected_at
            });
        }
    }

    fn confirm(
        &mut self,
        intent: &TradeIntent,
        fill_price: Option<f64>,
        quantity: Option<Decimal>,
    ) {
        if intent.origin != IntentOrigin::Strategy {
            return;
        }
        if let Some(strategy) = self.strategy.as_mut() {
            strategy.confirm(intent.detected_at.timestamp_millis(), fill_price, quantity);
        }
    }
}

/// Collaborators shared by every symbol in a cycle.
struct Context {
    config: LiveConfig,
    market_data: Arc<dyn MarketData>,
    quotes: Arc<dyn QuoteSource>,
    broker: Arc<dyn Broker>,
    journal: Arc<TransactionJournal>,
    listeners: Vec<Arc<dyn ExecutionListener>>,
    gate: ExecutionGate,
}

/// Fixed-interval polling orchestrator.
pub struct Orchestrator {
    ctx: Context,
    clock: Arc<dyn Clock>,
    intent_sources: Vec<Arc<dyn IntentSource>>,
    slots: BTreeMap<String, SymbolSlot>,
    stop: StopHandle,
}

impl Orchestrator {
    /// Build an orchestrator with one strategy machine per configured symbol.
    pub fn new(
        config: LiveConfig,
        market_data: Arc<dyn MarketData>,
        quotes: Arc<dyn QuoteSource>,
        broker: Arc<dyn Broker>,
        journal: Arc<TransactionJournal>,
    ) -> Result<Self, TradingError> {
        config.validate()?;

        let mut slots = BTreeMap::new();
        for symbol in &config.symbols {
            let strategy = SmaTrailingStrategy::new(config.strategy_for(symbol))?;
            slots.insert(symbol.clone(), SymbolSlot::with_strategy(Box::new(strategy)));
        }

        Ok(Self {
            ctx: Context {
                gate: ExecutionGate::new(config.gate.clone()),
                config,
                market_data,
                quotes,
                broker,
                journal,
                listeners: Vec::new(),
            },
            clock: Arc::new(SystemClock),
            intent_sources: Vec::new(),
            slots,
            stop: StopHandle::new(),
        })
    }

    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    pub fn with_intent_source(mut self, source: Arc<dyn IntentSource>) -> Self {
        self.intent_sources.push(source);
        self
    }

    pub fn with_listener(mut self, listener: Arc<dyn ExecutionListener>) -> Self {
        self.ctx.listeners.push(listener);
        self
    }

    pub fn with_stop_handle(mut self, stop: StopHandle) -> Self {
        self.stop = stop;
        self
    }

    pub fn stop_handle(&self) -> StopHandle {
        self.stop.clone()
    }

    pub fn config(&self) -> &LiveConfig {
        &self.ctx.config
    }

    /// Snapshot of a symbol's strategy machine.
    pub fn strategy_state(&self, symbol: &str) -> Option<StrategyState> {
        self.slots
            .get(symbol)
            .and_then(|slot| slot.strategy.as_ref())
            .map(|strategy| strategy.state())
    }

    /// Intents waiting for a quote or a broker retry.
    pub fn pending(&self, symbol: &str) -> &[TradeIntent] {
        self.slots
            .get(symbol)
            .map(|slot| slot.pending.as_slice())
            .unwrap_or_default()
    }

    /// Poll until the stop handle fires. The flag is checked between cycles.
    pub async fn run(&mut self) {
        info!(
            symbols = ?self.ctx.config.symbols,
            interval = ?self.ctx.config.poll_interval,
            broker = self.ctx.broker.name(),
            "Starting orchestrator"
        );

        while !self.stop.is_stopped() {
            match self.run_cycle().await {
                Ok(summary) => debug!(?summary, "Cycle complete"),
                Err(e) => error!(error = %e, "Cycle aborted"),
            }
            self.stop.sleep(self.ctx.config.poll_interval).await;
        }

        info!("Orchestrator stopped");
    }

    /// Run one cycle over every symbol.
    ///
    /// Symbol faults are logged and counted; a journal failure aborts the
    /// cycle and is returned.
    pub async fn run_cycle(&mut self) -> Result<CycleSummary, TradingError> {
        let now = self.clock.now();
        let mut summary = CycleSummary::default();

        self.collect_external_intents().await;

        for (symbol, slot) in self.slots.iter_mut() {
            match process_symbol(&self.ctx, symbol, slot, now, &mut summary).await {
                Ok(()) => {}
                Err(e) if e.is_journal() => {
                    error!(symbol = %symbol, error = %e, "Journal failure, aborting cycle");
                    return Err(e);
                }
                Err(e) => {
                    summary.failed_symbols += 1;
                    error!(symbol = %symbol, error = %e, "Symbol processing failed");
                }
            }
        }

        Ok(summary)
    }

    async fn collect_external_intents(&mut self) {
        for source in &self.intent_sources {
            match source.poll_intents().await {
                Ok(intents) => {
                    for intent in intents {
                        self.slots
                            .entry(intent.symbol.clone())
                            .or_insert_with(SymbolSlot::external_only)
                            .enqueue(intent);
                    }
                }
                Err(e) => warn!(source = source.name(), error = %e, "Intent source poll failed"),
            }
        }
    }
}

async fn process_symbol(
    ctx: &Context,
    symbol: &str,
    slot: &mut SymbolSlot,
    now: DateTime<Utc>,
    summary: &mut CycleSummary,
) -> Result<(), TradingError> {
    // A feed fault must not hold back intents that are already queued.
    let feed = advance_strategy(ctx, symbol, slot, now, summary).await;
    process_pending(ctx, symbol, slot, now, summary).await?;
    feed
}

/// Feed bars newer than the last processed one to the symbol's strategy and
/// queue the resulting intents.
///
/// The first fetch only warms the machine up: signals on historical bars
/// are rolled back instead of traded. Intents from bars before a failing
/// bar are queued before the error is returned, and a fetch that fails
/// leaves the machine warming up.
async fn advance_strategy(
    ctx: &Context,
    symbol: &str,
    slot: &mut SymbolSlot,
    now: DateTime<Utc>,
    summary: &mut CycleSummary,
) -> Result<(), TradingError> {
    let Some(strategy) = slot.strategy.as_mut() else {
        return Ok(());
    };

    let last = strategy.last_timestamp();
    let start = last
        .and_then(DateTime::from_timestamp_millis)
        .unwrap_or_else(|| now - ctx.config.history_span());

    let bars = ctx
        .market_data
        .get_bars(symbol, start, now, ctx.config.timeframe)
        .await?;

    let cash = ctx.config.gate.cash_limit;
    let mut intents = Vec::new();
    let mut processed = 0;
    let mut failure = None;

    for bar in bars.iter().filter(|b| last.map_or(true, |l| b.timestamp > l)) {
        let signal = match strategy.on_bar(bar, cash) {
            Ok(signal) => signal,
            Err(e) => {
                failure = Some(e);
                break;
            }
        };
        processed += 1;
        let Some(signal) = signal else {
            continue;
        };

        if !slot.warmed_up {
            strategy.revert(signal.timestamp);
            continue;
        }

        info!(
            symbol,
            timestamp = %signal.datetime(),
            side = %signal.signal_type.side(),
            trigger = %signal.trigger,
            price = signal.price,
            "Strategy signal"
        );
        summary.signals += 1;
        intents.push(signal.into_intent(strategy.name()));
    }

    summary.bars_processed += processed;
    for intent in intents {
        slot.enqueue(intent);
    }

    match failure {
        Some(e) => Err(e.into()),
        None => {
            if !slot.warmed_up {
                debug!(symbol, bars = processed, "Strategy warmed up on history");
                slot.warmed_up = true;
            }
            Ok(())
        }
    }
}

/// Gate, execute and journal pending intents in arrival order. Stops at the
/// first intent that has to wait for the next cycle.
async fn process_pending(
    ctx: &Context,
    symbol: &str,
    slot: &mut SymbolSlot,
    now: DateTime<Utc>,
    summary: &mut CycleSummary,
) -> Result<(), TradingError> {
    let mut queue: VecDeque<TradeIntent> = std::mem::take(&mut slot.pending).into();

    while let Some(intent) = queue.pop_front() {
        let key = intent.key();

        let journaled = match ctx.journal.contains(&key) {
            Ok(journaled) => journaled,
            Err(e) => {
                queue.push_front(intent);
                slot.pending = queue.into();
                return Err(e.into());
            }
        };
        if journaled {
            debug!(symbol, key = %key, "Intent already journaled");
            slot.confirm(&intent, None, None);
            summary.dropped += 1;
            continue;
        }

        if !ctx.config.market_hours.is_actionable(intent.detected_at, now) {
            debug!(
                symbol,
                timestamp = %intent.detected_at,
                side = %intent.side,
                "Intent outside market hours, dropping"
            );
            slot.roll_back(&intent, &mut queue);
            summary.dropped += 1;
            continue;
        }

        let quote = match ctx.quotes.get_quote(symbol).await {
            Ok(Some(quote)) if quote.is_usable() => quote,
            Ok(_) => {
                warn!(symbol, timestamp = %intent.detected_at, "No usable quote, deferring");
                defer(slot, intent, queue, summary);
                return Ok(());
            }
            Err(e) => {
                warn!(
                    symbol,
                    timestamp = %intent.detected_at,
                    error = %e,
                    "Quote fetch failed, deferring"
                );
                defer(slot, intent, queue, summary);
                return Ok(());
            }
        };

        let result = ctx.gate.execute(&intent, quote, ctx.broker.as_ref()).await;
        if !result.should_journal() {
            defer(slot, intent, queue, summary);
            return Ok(());
        }

        if let Err(e) = ctx.journal.record(&result, now) {
            // The order may already be at the broker; re-queueing it could
            // submit it twice.
            error!(symbol, key = %key, accepted = result.accepted, "Execution not journaled");
            slot.pending = queue.into();
            return Err(e.into());
        }

        if result.accepted {
            summary.executed += 1;
            let fill = result.filled_price.and_then(|p| p.to_f64());
            slot.confirm(&intent, fill, result.quantity);
            for listener in &ctx.listeners {
                listener.on_execution(&result);
            }
        } else {
            summary.rejected += 1;
            match result.rejection {
                // The broker holds nothing, so the machine being flat is right.
                Some(Rejection::NoPosition) => slot.confirm(&intent, None, None),
                _ => slot.roll_back(&intent, &mut queue),
            }
        }
    }

    Ok(())
}

fn defer(
    slot: &mut SymbolSlot,
    intent: TradeIntent,
    queue: VecDeque<TradeIntent>,
    summary: &mut CycleSummary,
) {
    summary.deferred += 1;
    slot.pending = std::iter::once(intent).chain(queue).collect();
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use chrono::TimeZone;
    use rust_decimal_macros::dec;
    use std::collections::{HashMap, HashSet};
    use std::sync::Mutex;
    use std::time::Duration;
    use tempfile::TempDir;
    use trading_broker::PaperBroker;
    use trading_core::error::DataError;
    use trading_core::traits::Quote;
    use trading_core::types::{Bar, ExecutionResult, JournalKey, PositionPhase, Side, Timeframe};
    use trading_data::ChannelIntentSource;
    use trading_execution::{FixedClock, GateConfig};
    use trading_strategies::SmaTrailingConfig;

    #[derive(Default)]
    struct FakeMarketData {
        bars: Mutex<HashMap<String, Vec<Bar>>>,
        failing: Mutex<HashSet<String>>,
    }

    impl FakeMarketData {
        fn push(&self, symbol: &str, at: DateTime<Utc>, close: f64) {
            self.bars
                .lock()
                .unwrap()
                .entry(symbol.to_string())
                .or_default()
                .push(Bar::from_close(at.timestamp_millis(), close));
        }

        fn fail(&self, symbol: &str) {
            self.failing.lock().unwrap().insert(symbol.to_string());
        }
    }

    #[async_trait]
    impl MarketData for FakeMarketData {
        async fn get_bars(
            &self,
            symbol: &str,
            start: DateTime<Utc>,
            end: DateTime<Utc>,
            _timeframe: Timeframe,
        ) -> Result<Vec<Bar>, DataError> {
            if self.failing.lock().unwrap().contains(symbol) {
                return Err(DataError::ConnectionError("feed down".into()));
            }
            let (start, end) = (start.timestamp_millis(), end.timestamp_millis());
            let bars: Vec<Bar> = self
                .bars
                .lock()
                .unwrap()
                .get(symbol)
                .map(|bars| {
                    bars.iter()
                        .filter(|b| b.timestamp >= start && b.timestamp <= end)
                        .copied()
                        .collect()
                })
                .unwrap_or_default();
            if bars.is_empty() {
                return Err(DataError::Unavailable {
                    symbol: symbol.to_string(),
                });
            }
            Ok(bars)
        }

        fn name(&self) -> &str {
            "fake"
        }
    }

    #[derive(Default)]
    struct FakeQuotes {
        quotes: Mutex<HashMap<String, Quote>>,
    }

    impl FakeQuotes {
        fn set(&self, symbol: &str, bid: f64, ask: f64) {
            self.quotes
                .lock()
                .unwrap()
                .insert(symbol.to_string(), Quote::new(symbol, bid, ask));
        }
    }

    #[async_trait]
    impl QuoteSource for FakeQuotes {
        async fn get_quote(&self, symbol: &str) -> Result<Option<Quote>, DataError> {
            Ok(self.quotes.lock().unwrap().get(symbol).cloned())
        }

        fn name(&self) -> &str {
            "fake"
        }
    }

    /// Returns the same intents on every poll.
    struct RepeatingSource(Vec<TradeIntent>);

    #[async_trait]
    impl IntentSource for RepeatingSource {
        async fn poll_intents(&self) -> Result<Vec<TradeIntent>, DataError> {
            Ok(self.0.clone())
        }

        fn name(&self) -> &str {
            "repeating"
        }
    }

    #[derive(Default)]
    struct RecordingListener(Mutex<Vec<ExecutionResult>>);

    impl ExecutionListener for RecordingListener {
        fn on_execution(&self, result: &ExecutionResult) {
            self.0.lock().unwrap().push(result.clone());
        }
    }

    struct Harness {
        orchestrator: Orchestrator,
        data: Arc<FakeMarketData>,
        quotes: Arc<FakeQuotes>,
        broker: PaperBroker,
        journal: Arc<TransactionJournal>,
        clock: Arc<FixedClock>,
        _dir: TempDir,
    }

    /// 2020-06-16 is a Tuesday; the New York session opens at 13:30 UTC.
    fn tuesday(h: u32, m: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2020, 6, 16, h, m, 0).unwrap()
    }

    fn config(symbols: &[&str]) -> LiveConfig {
        LiveConfig {
            symbols: symbols.iter().map(|s| s.to_string()).collect(),
            poll_interval: Duration::from_millis(10),
            timeframe: Timeframe::Minute1,
            history_bars: 60,
            strategy: SmaTrailingConfig {
                short_window: 2,
                long_window: 3,
                ..Default::default()
            },
            gate: GateConfig {
                percent_range_execute_limit: 0.05,
                cash_limit: dec!(100),
            },
            ..Default::default()
        }
    }

    fn harness(config: LiveConfig, now: DateTime<Utc>) -> Harness {
        let dir = tempfile::tempdir().unwrap();
        let data = Arc::new(FakeMarketData::default());
        let quotes = Arc::new(FakeQuotes::default());
        let broker = PaperBroker::new(dec!(1000));
        let journal = Arc::new(TransactionJournal::new(
            dir.path(),
            config.market_hours.timezone,
        ));
        let clock = Arc::new(FixedClock::new(now));

        let orchestrator = Orchestrator::new(
            config,
            data.clone(),
            quotes.clone(),
            Arc::new(broker.clone()),
            journal.clone(),
        )
        .unwrap()
        .with_clock(clock.clone());

        Harness {
            orchestrator,
            data,
            quotes,
            broker,
            journal,
            clock,
            _dir: dir,
        }
    }

    fn external(symbol: &str, side: Side, price: f64, at: DateTime<Utc>) -> TradeIntent {
        TradeIntent::external(symbol, side, price, at, "alert")
    }

    fn journaled(journal: &TransactionJournal, symbol: &str, at: DateTime<Utc>) -> bool {
        journal.contains(&JournalKey::new(symbol, at.timestamp())).unwrap()
    }

    #[tokio::test]
    async fn test_weekend_intent_is_dropped() {
        let saturday = Utc.with_ymd_and_hms(2020, 6, 20, 15, 0, 0).unwrap();
        let h = harness(config(&[]), saturday);
        h.quotes.set("TWK", 10.0, 10.02);
        let intent_at = saturday - chrono::Duration::minutes(1);
        let mut orchestrator = h
            .orchestrator
            .with_intent_source(Arc::new(RepeatingSource(vec![
                external("TWK", Side::Buy, 10.0, intent_at),
            ])));

        let summary = orchestrator.run_cycle().await.unwrap();

        assert_eq!(summary.dropped, 1);
        assert_eq!(summary.executed, 0);
        assert!(h.broker.fills().is_empty());
        assert!(!journaled(&h.journal, "TWK", intent_at));
        assert!(orchestrator.pending("TWK").is_empty());
    }

    #[tokio::test]
    async fn test_intent_after_close_is_dropped() {
        // 17:00 in New York
        let after_close = tuesday(21, 0);
        let h = harness(config(&[]), after_close);
        h.quotes.set("TWK", 10.0, 10.02);
        let mut orchestrator = h.orchestrator.with_intent_source(Arc::new(RepeatingSource(vec![
            external("TWK", Side::Buy, 10.0, tuesday(19, 0)),
        ])));

        let summary = orchestrator.run_cycle().await.unwrap();
        assert_eq!(summary.dropped, 1);
        assert!(h.broker.fills().is_empty());
    }

    #[tokio::test]
    async fn test_failing_symbol_does_not_block_others() {
        let h = harness(config(&["BAD", "GOOD"]), tuesday(15, 0));
        h.data.fail("BAD");
        for (i, close) in [10.0, 10.1, 10.0].into_iter().enumerate() {
            h.data.push("GOOD", tuesday(14, i as u32), close);
        }
        h.quotes.set("GOOD", 10.0, 10.02);
        let intent_at = tuesday(14, 30);
        let mut orchestrator = h
            .orchestrator
            .with_intent_source(Arc::new(RepeatingSource(vec![
                external("GOOD", Side::Buy, 10.0, intent_at),
            ])));

        let summary = orchestrator.run_cycle().await.unwrap();

        assert_eq!(summary.failed_symbols, 1);
        assert_eq!(summary.executed, 1);
        assert_eq!(summary.bars_processed, 3);
        // floor(100 / 10.02)
        assert_eq!(h.broker.holding("GOOD"), dec!(9));
        assert!(journaled(&h.journal, "GOOD", intent_at));
    }

    #[tokio::test]
    async fn test_feed_fault_still_executes_queued_intents() {
        let h = harness(config(&["TWK"]), tuesday(15, 0));
        h.data.fail("TWK");
        h.quotes.set("TWK", 10.0, 10.02);
        let intent_at = tuesday(14, 30);
        let mut orchestrator = h.orchestrator.with_intent_source(Arc::new(RepeatingSource(vec![
            external("TWK", Side::Buy, 10.0, intent_at),
        ])));

        let summary = orchestrator.run_cycle().await.unwrap();

        assert_eq!(summary.failed_symbols, 1);
        assert_eq!(summary.executed, 1);
        assert_eq!(h.broker.holding("TWK"), dec!(9));
        assert!(journaled(&h.journal, "TWK", intent_at));
        assert!(orchestrator.pending("TWK").is_empty());
    }

    /// Warms CCL up on three flat bars, then queues a golden cross on 14:04
    /// followed by a duplicate 14:04 bar.
    async fn cross_then_duplicate_bar(h: &mut Harness) {
        for (i, close) in [10.0, 10.0, 10.0].into_iter().enumerate() {
            h.data.push("CCL", tuesday(14, i as u32), close);
        }
        h.orchestrator.run_cycle().await.unwrap();

        h.data.push("CCL", tuesday(14, 3), 9.0);
        h.data.push("CCL", tuesday(14, 4), 12.0);
        h.data.push("CCL", tuesday(14, 4), 12.5);
        h.clock.set(tuesday(14, 5));
    }

    #[tokio::test]
    async fn test_signal_before_bad_bar_is_executed() {
        let mut h = harness(config(&["CCL"]), tuesday(14, 3));
        h.quotes.set("CCL", 11.98, 12.02);
        cross_then_duplicate_bar(&mut h).await;

        let summary = h.orchestrator.run_cycle().await.unwrap();
        assert_eq!(summary.bars_processed, 2);
        assert_eq!(summary.signals, 1);
        assert_eq!(summary.executed, 1);
        assert_eq!(summary.failed_symbols, 1);
        assert_eq!(h.broker.holding("CCL"), dec!(8));
        assert!(journaled(&h.journal, "CCL", tuesday(14, 4)));

        let state = h.orchestrator.strategy_state("CCL").unwrap();
        assert_eq!(state.phase, PositionPhase::Long);
        assert_eq!(state.position.unwrap().quantity, dec!(8));

        // The duplicate bar is not replayed.
        h.clock.set(tuesday(14, 6));
        let summary = h.orchestrator.run_cycle().await.unwrap();
        assert_eq!(summary.signals, 0);
        assert_eq!(summary.failed_symbols, 0);
        assert_eq!(h.broker.fills().len(), 1);
    }

    #[tokio::test]
    async fn test_signal_before_bad_bar_stays_pending() {
        let mut h = harness(config(&["CCL"]), tuesday(14, 3));
        cross_then_duplicate_bar(&mut h).await;

        let summary = h.orchestrator.run_cycle().await.unwrap();
        assert_eq!(summary.failed_symbols, 1);
        assert_eq!(summary.deferred, 1);
        assert_eq!(h.orchestrator.pending("CCL").len(), 1);
        assert_eq!(
            h.orchestrator.strategy_state("CCL").unwrap().phase,
            PositionPhase::Long
        );

        h.quotes.set("CCL", 11.98, 12.02);
        h.clock.set(tuesday(14, 6));
        let summary = h.orchestrator.run_cycle().await.unwrap();
        assert_eq!(summary.executed, 1);
        assert!(h.orchestrator.pending("CCL").is_empty());
        assert_eq!(h.broker.holding("CCL"), dec!(8));
    }

    #[tokio::test]
    async fn test_repeated_intent_executes_once() {
        let h = harness(config(&[]), tuesday(15, 0));
        h.quotes.set("TWK", 10.0, 10.02);
        let intent_at = tuesday(14, 45);
        let mut orchestrator = h
            .orchestrator
            .with_intent_source(Arc::new(RepeatingSource(vec![
                external("TWK", Side::Buy, 10.0, intent_at),
            ])));

        let first = orchestrator.run_cycle().await.unwrap();
        assert_eq!(first.executed, 1);

        for _ in 0..2 {
            h.clock.advance(chrono::Duration::seconds(10));
            let summary = orchestrator.run_cycle().await.unwrap();
            assert_eq!(summary.executed, 0);
            assert_eq!(summary.dropped, 1);
        }

        assert_eq!(h.broker.fills().len(), 1);
        let store = h.journal.load_day(intent_at.date_naive()).unwrap();
        assert_eq!(store["TWK"].len(), 1);
    }

    #[tokio::test]
    async fn test_golden_cross_executes_and_notifies() {
        let h = harness(config(&["CCL"]), tuesday(14, 3));
        for (i, close) in [10.0, 10.0, 10.0].into_iter().enumerate() {
            h.data.push("CCL", tuesday(14, i as u32), close);
        }
        h.quotes.set("CCL", 11.98, 12.02);
        let listener = Arc::new(RecordingListener::default());
        let mut orchestrator = h.orchestrator.with_listener(listener.clone());

        let warmup = orchestrator.run_cycle().await.unwrap();
        assert_eq!(warmup.bars_processed, 3);
        assert_eq!(warmup.signals, 0);

        h.data.push("CCL", tuesday(14, 3), 9.0);
        h.data.push("CCL", tuesday(14, 4), 12.0);
        h.clock.set(tuesday(14, 5));

        let summary = orchestrator.run_cycle().await.unwrap();
        assert_eq!(summary.bars_processed, 2);
        assert_eq!(summary.signals, 1);
        assert_eq!(summary.executed, 1);

        // floor(100 / 12.02)
        assert_eq!(h.broker.holding("CCL"), dec!(8));
        assert!(journaled(&h.journal, "CCL", tuesday(14, 4)));

        let results = listener.0.lock().unwrap();
        assert_eq!(results.len(), 1);
        assert_eq!(results[0].intent.origin, IntentOrigin::Strategy);

        let state = orchestrator.strategy_state("CCL").unwrap();
        assert_eq!(state.phase, PositionPhase::Long);
        let position = state.position.unwrap();
        assert_eq!(position.entry_price, 12.02);
        assert_eq!(position.quantity, dec!(8));
    }

    #[tokio::test]
    async fn test_deviation_rejection_is_journaled_and_rolled_back() {
        let h = harness(config(&["CCL"]), tuesday(14, 3));
        for (i, close) in [10.0, 10.0, 10.0].into_iter().enumerate() {
            h.data.push("CCL", tuesday(14, i as u32), close);
        }
        let mut orchestrator = h.orchestrator;
        orchestrator.run_cycle().await.unwrap();

        // 13.00 against a 12.00 reference is 8.3% off.
        h.quotes.set("CCL", 12.9, 13.0);
        h.data.push("CCL", tuesday(14, 3), 9.0);
        h.data.push("CCL", tuesday(14, 4), 12.0);
        h.clock.set(tuesday(14, 5));

        let summary = orchestrator.run_cycle().await.unwrap();
        assert_eq!(summary.rejected, 1);
        assert!(h.broker.fills().is_empty());

        let store = h.journal.load_day(tuesday(14, 4).date_naive()).unwrap();
        let record = store["CCL"].values().next().unwrap();
        assert_eq!(record.outcome, "deviation exceeds limit");

        let state = orchestrator.strategy_state("CCL").unwrap();
        assert_eq!(state.phase, PositionPhase::Flat);
        assert!(orchestrator.pending("CCL").is_empty());
    }

    #[tokio::test]
    async fn test_missing_quote_defers_until_available() {
        let h = harness(config(&[]), tuesday(15, 0));
        let intent_at = tuesday(14, 50);
        let mut orchestrator = h
            .orchestrator
            .with_intent_source(Arc::new(RepeatingSource(vec![
                external("TWK", Side::Buy, 10.0, intent_at),
            ])));

        let summary = orchestrator.run_cycle().await.unwrap();
        assert_eq!(summary.deferred, 1);
        assert_eq!(orchestrator.pending("TWK").len(), 1);
        assert!(!journaled(&h.journal, "TWK", intent_at));

        h.quotes.set("TWK", 10.0, 10.02);
        h.clock.advance(chrono::Duration::seconds(10));
        let summary = orchestrator.run_cycle().await.unwrap();
        assert_eq!(summary.executed, 1);
        assert!(orchestrator.pending("TWK").is_empty());
        assert!(journaled(&h.journal, "TWK", intent_at));
    }

    #[tokio::test]
    async fn test_broker_failure_is_retried_next_cycle() {
        let h = harness(config(&[]), tuesday(15, 0));
        h.quotes.set("TWK", 10.0, 10.02);
        h.broker.fail_orders(503, "service unavailable");
        let (source, tx) = ChannelIntentSource::new();
        let intent_at = tuesday(14, 55);
        tx.send(external("TWK", Side::Buy, 10.0, intent_at)).unwrap();
        let mut orchestrator = h.orchestrator.with_intent_source(Arc::new(source));

        let summary = orchestrator.run_cycle().await.unwrap();
        assert_eq!(summary.deferred, 1);
        assert!(!journaled(&h.journal, "TWK", intent_at));

        h.broker.clear_failure();
        let summary = orchestrator.run_cycle().await.unwrap();
        assert_eq!(summary.executed, 1);
        assert_eq!(h.broker.fills().len(), 1);
        assert!(journaled(&h.journal, "TWK", intent_at));
    }

    #[tokio::test]
    async fn test_sell_without_position_is_journaled() {
        let h = harness(config(&[]), tuesday(15, 0));
        h.quotes.set("TWK", 10.0, 10.02);
        let intent_at = tuesday(14, 40);
        let mut orchestrator = h
            .orchestrator
            .with_intent_source(Arc::new(RepeatingSource(vec![
                external("TWK", Side::Sell, 10.0, intent_at),
            ])));

        let summary = orchestrator.run_cycle().await.unwrap();
        assert_eq!(summary.rejected, 1);
        assert!(journaled(&h.journal, "TWK", intent_at));
    }

    #[tokio::test]
    async fn test_expired_strategy_intent_is_rolled_back() {
        let h = harness(config(&["CCL"]), tuesday(14, 3));
        for (i, close) in [10.0, 10.0, 10.0].into_iter().enumerate() {
            h.data.push("CCL", tuesday(14, i as u32), close);
        }
        let mut orchestrator = h.orchestrator;
        orchestrator.run_cycle().await.unwrap();

        // No quote: the BUY waits.
        h.data.push("CCL", tuesday(14, 3), 9.0);
        h.data.push("CCL", tuesday(14, 4), 12.0);
        h.clock.set(tuesday(14, 5));
        let summary = orchestrator.run_cycle().await.unwrap();
        assert_eq!(summary.deferred, 1);
        assert_eq!(orchestrator.strategy_state("CCL").unwrap().phase, PositionPhase::Long);

        // Next morning the intent is stale.
        h.clock.set(Utc.with_ymd_and_hms(2020, 6, 17, 14, 0, 0).unwrap());
        h.quotes.set("CCL", 11.98, 12.02);
        let summary = orchestrator.run_cycle().await.unwrap();
        assert_eq!(summary.dropped, 1);
        assert!(h.broker.fills().is_empty());
        assert_eq!(orchestrator.strategy_state("CCL").unwrap().phase, PositionPhase::Flat);
    }

    #[tokio::test]
    async fn test_journal_failure_aborts_cycle() {
        let dir = tempfile::tempdir().unwrap();
        let not_a_dir = dir.path().join("journal");
        std::fs::write(&not_a_dir, "occupied").unwrap();

        let config = config(&[]);
        let quotes = Arc::new(FakeQuotes::default());
        quotes.set("TWK", 10.0, 10.02);
        let mut orchestrator = Orchestrator::new(
            config.clone(),
            Arc::new(FakeMarketData::default()),
            quotes,
            Arc::new(PaperBroker::new(dec!(1000))),
            Arc::new(TransactionJournal::new(&not_a_dir, config.market_hours.timezone)),
        )
        .unwrap()
        .with_clock(Arc::new(FixedClock::new(tuesday(15, 0))))
        .with_intent_source(Arc::new(RepeatingSource(vec![external(
            "TWK",
            Side::Buy,
            10.0,
            tuesday(14, 30),
        )])));

        let err = orchestrator.run_cycle().await.unwrap_err();
        assert!(err.is_journal());
        assert_eq!(orchestrator.pending("TWK").len(), 1);
    }

    #[tokio::test]
    async fn test_run_exits_when_stopped() {
        let h = harness(config(&[]), tuesday(15, 0));
        let mut orchestrator = h.orchestrator;
        let stop = orchestrator.stop_handle();

        let task = tokio::spawn(async move {
            orchestrator.run().await;
        });
        tokio::time::sleep(Duration::from_millis(30)).await;
        stop.stop();

        tokio::time::timeout(Duration::from_secs(5), task)
            .await
            .unwrap()
            .unwrap();
    }
}
