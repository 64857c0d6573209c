use std::collections::HashMap;
use std::sync::Arc;

use crate::api::ExchangeGateway;
use crate::cache::TtlCache;
use crate::execution::{debounce, passes_filters, reconcile, PositionLifecycle};
use crate::indicators::calculate_atr;
use crate::models::{LotFilter, PositionRecord, Side, Signal};
use crate::notify::Notifier;
use crate::persistence::SnapshotStore;
use crate::risk::{position_size, SizingConfig};
use crate::strategy::SignalSource;

/// Tunables the cycle runner needs, extracted from the app config
#[derive(Debug, Clone)]
pub struct EngineConfig {
    pub symbols: Vec<String>,
    pub kline_interval: String,
    pub kline_limit: u32,
    pub atr_period: usize,
    pub min_hold_seconds: i64,
    /// Fraction, not percent: 0.002 means 0.2%
    pub min_price_change_pct: f64,
    pub sizing: SizingConfig,
}

/// Per-cycle runner: reconcile, signal, debounce, filter, size, act
///
/// Symbols are processed sequentially; a failure on one symbol is logged and
/// notified but never stops the others. The snapshot map is persisted once at
/// the end of every cycle.
pub struct Engine {
    gateway: Arc<dyn ExchangeGateway>,
    signal_source: Arc<dyn SignalSource>,
    lifecycle: PositionLifecycle,
    store: Arc<dyn SnapshotStore>,
    notifier: Arc<dyn Notifier>,
    lot_cache: TtlCache<LotFilter>,
    config: EngineConfig,
    records: HashMap<String, PositionRecord>,
}

impl Engine {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        gateway: Arc<dyn ExchangeGateway>,
        signal_source: Arc<dyn SignalSource>,
        lifecycle: PositionLifecycle,
        store: Arc<dyn SnapshotStore>,
        notifier: Arc<dyn Notifier>,
        lot_cache: TtlCache<LotFilter>,
        config: EngineConfig,
    ) -> Self {
        Self {
            gateway,
            signal_source,
            lifecycle,
            store,
            notifier,
            lot_cache,
            config,
            records: HashMap::new(),
        }
    }

    /// Restore snapshots saved by a previous run
    pub async fn load_snapshots(&mut self) -> anyhow::Result<()> {
        self.records = self.store.load_all().await?;
        Ok(())
    }

    #[cfg(test)]
    pub(crate) fn record(&self, symbol: &str) -> Option<&PositionRecord> {
        self.records.get(symbol)
    }

    /// One full evaluation cycle over all configured symbols
    pub async fn run_cycle(&mut self) {
        for symbol in self.config.symbols.clone() {
            match self.run_symbol(&symbol).await {
                Ok(record) => {
                    if record.side != Side::None {
                        tracing::info!(
                            "[{}] position: {} qty={} entry={:.4}",
                            symbol,
                            record.side,
                            record.qty,
                            record.entry_price
                        );
                    }
                    self.records.insert(symbol, record);
                }
                Err(e) => {
                    tracing::error!("[{}] cycle failed: {:#}", symbol, e);
                    self.notifier
                        .notify_error(&symbol, &format!("cycle failed: {:#}", e))
                        .await;
                }
            }
        }

        if let Err(e) = self.store.save_all(&self.records).await {
            tracing::warn!("Failed to persist position snapshots: {:#}", e);
        }
    }

    async fn run_symbol(&self, symbol: &str) -> anyhow::Result<PositionRecord> {
        let ctx = self.gateway.account_context(symbol).await?;
        let now_ts = chrono::Utc::now().timestamp();

        let prior = self.records.get(symbol).cloned();
        let record = reconcile(prior, &ctx, self.gateway.as_ref(), symbol, now_ts).await;

        let klines = self
            .gateway
            .klines(symbol, &self.config.kline_interval, self.config.kline_limit)
            .await?;
        let current_price = klines
            .last()
            .map(|k| k.close)
            .filter(|p| *p > 0.0)
            .unwrap_or(ctx.position.mark_price);
        if current_price <= 0.0 {
            anyhow::bail!("no usable price for {}", symbol);
        }

        let raw = self.signal_source.generate_signal(symbol, &klines).await?;
        let (record, effective) = debounce(raw, record);
        let mut effective = match effective {
            Some(signal) => signal,
            None => {
                tracing::info!("[{}] {} debounced, waiting for confirmation", symbol, raw);
                Signal::Hold
            }
        };

        if effective.opposes(record.side)
            && !passes_filters(
                &record,
                now_ts,
                current_price,
                self.config.min_hold_seconds,
                self.config.min_price_change_pct,
            )
        {
            tracing::info!("[{}] reversal to {} blocked by entry filter", symbol, effective);
            effective = Signal::Hold;
        }

        let lot = match self.lot_cache.get(symbol) {
            Some(lot) => lot,
            None => {
                let lot = self.gateway.lot_filter(symbol).await?;
                self.lot_cache.insert(symbol, lot);
                lot
            }
        };

        let sized_qty = if effective.is_directional() {
            let atr = calculate_atr(&klines, self.config.atr_period).unwrap_or(0.0);
            position_size(
                symbol,
                ctx.balance,
                atr,
                current_price,
                &lot,
                &self.config.sizing,
            )
        } else {
            0.0
        };

        let record = self
            .lifecycle
            .apply(
                symbol,
                effective,
                record,
                &ctx,
                sized_qty,
                &lot,
                now_ts,
                current_price,
            )
            .await;

        Ok(record)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::execution::testutil::{long_context, MockGateway};
    use crate::execution::{LifecycleConfig, OrderExecutor};
    use crate::models::{Kline, OrderStatus};
    use crate::notify::testutil::RecordingNotifier;
    use crate::persistence::MemorySnapshotStore;
    use async_trait::async_trait;
    use std::sync::Mutex;
    use std::time::Duration;
    use tokio::sync::watch;

    /// Returns the same signal every cycle
    struct FixedSignal(Mutex<Signal>);

    impl FixedSignal {
        fn new(signal: Signal) -> Self {
            Self(Mutex::new(signal))
        }
    }

    #[async_trait]
    impl SignalSource for FixedSignal {
        async fn generate_signal(&self, _symbol: &str, _klines: &[Kline]) -> anyhow::Result<Signal> {
            Ok(*self.0.lock().unwrap())
        }

        fn name(&self) -> &str {
            "fixed"
        }

        fn min_klines_required(&self) -> usize {
            0
        }
    }

    fn trending_klines(n: usize, close: f64) -> Vec<Kline> {
        (0..n)
            .map(|i| Kline {
                open_time_ms: 1_700_000_000_000 + i as i64 * 60_000,
                open: close,
                high: close + 1.0,
                low: close - 1.0,
                close,
                volume: 10.0,
            })
            .collect()
    }

    struct Fixture {
        gateway: Arc<MockGateway>,
        notifier: Arc<RecordingNotifier>,
        engine: Engine,
        _shutdown: watch::Sender<bool>,
    }

    fn fixture(signal: Signal) -> Fixture {
        let gateway = Arc::new(MockGateway::new());
        let notifier = Arc::new(RecordingNotifier::new());
        let (tx, rx) = watch::channel(false);
        let executor = OrderExecutor::new(gateway.clone(), rx);
        let lifecycle =
            PositionLifecycle::new(executor, notifier.clone(), LifecycleConfig::default());

        let engine = Engine::new(
            gateway.clone(),
            Arc::new(FixedSignal::new(signal)),
            lifecycle,
            Arc::new(MemorySnapshotStore::new()),
            notifier.clone(),
            TtlCache::new(Duration::from_secs(3600)),
            EngineConfig {
                symbols: vec!["BTCUSDT".to_string()],
                kline_interval: "1m".to_string(),
                kline_limit: 50,
                atr_period: 14,
                min_hold_seconds: 300,
                min_price_change_pct: 0.002,
                sizing: SizingConfig::default(),
            },
        );

        Fixture {
            gateway,
            notifier,
            engine,
            _shutdown: tx,
        }
    }

    #[tokio::test]
    async fn test_long_signal_is_debounced_on_first_sight() {
        let mut f = fixture(Signal::Long);
        f.gateway.set_klines(trending_klines(30, 100.0));

        f.engine.run_cycle().await;

        // first cycle only records the signal, no order goes out
        assert!(f.gateway.submitted_calls().is_empty());
        let record = f.engine.record("BTCUSDT").unwrap();
        assert_eq!(record.last_signal, Signal::Long);
        assert_eq!(record.side, Side::None);
    }

    #[tokio::test]
    async fn test_confirmed_long_opens_position() {
        let mut f = fixture(Signal::Long);
        f.gateway.set_klines(trending_klines(30, 100.0));
        f.gateway
            .push_submit(MockGateway::update(OrderStatus::Filled, 50.0, 100.0));

        f.engine.run_cycle().await; // debounce
        f.engine.run_cycle().await; // confirmed, opens

        let calls = f.gateway.submitted_calls();
        assert_eq!(calls.len(), 1);
        assert_eq!(calls[0].0, "BTCUSDT");

        let record = f.engine.record("BTCUSDT").unwrap();
        assert_eq!(record.side, Side::Long);
        assert!(record.entry_time.is_some());
    }

    #[tokio::test]
    async fn test_gateway_failure_isolated_and_notified() {
        let mut f = fixture(Signal::Hold);
        *f.gateway.context_fails.lock().unwrap() = true;

        f.engine.run_cycle().await;

        assert!(f
            .notifier
            .messages()
            .iter()
            .any(|m| m.contains("cycle failed")));
        // nothing recorded for the failed symbol
        assert!(f.engine.record("BTCUSDT").is_none());
    }

    #[tokio::test]
    async fn test_lot_filter_is_cached_across_cycles() {
        let mut f = fixture(Signal::Hold);
        f.gateway.set_klines(trending_klines(30, 100.0));

        f.engine.run_cycle().await;
        f.engine.run_cycle().await;

        assert_eq!(*f.gateway.lot_filter_calls.lock().unwrap(), 1);
    }

    #[tokio::test]
    async fn test_fresh_reversal_blocked_by_hold_filter() {
        let mut f = fixture(Signal::Short);
        // open long position, entered just now so the hold gate applies
        f.gateway
            .set_context(long_context(10_000.0, 10.0, 100.0, 100.0, 0.0));
        f.gateway.set_klines(trending_klines(30, 100.0));

        f.engine.run_cycle().await; // debounce records SHORT
        f.engine.run_cycle().await; // confirmed SHORT, but filter blocks

        // reconcile sets entry_time to now (no matching history), so the 300s
        // hold gate rejects the reversal and no order is placed
        assert!(f.gateway.submitted_calls().is_empty());
        let record = f.engine.record("BTCUSDT").unwrap();
        assert_eq!(record.side, Side::Long);
    }

    #[tokio::test]
    async fn test_snapshot_saved_after_cycle() {
        let store = Arc::new(MemorySnapshotStore::new());
        let gateway = Arc::new(MockGateway::new());
        let notifier = Arc::new(RecordingNotifier::new());
        let (_tx, rx) = watch::channel(false);
        let executor = OrderExecutor::new(gateway.clone(), rx);
        let lifecycle =
            PositionLifecycle::new(executor, notifier.clone(), LifecycleConfig::default());

        let mut engine = Engine::new(
            gateway.clone(),
            Arc::new(FixedSignal::new(Signal::Hold)),
            lifecycle,
            store.clone(),
            notifier,
            TtlCache::new(Duration::from_secs(3600)),
            EngineConfig {
                symbols: vec!["BTCUSDT".to_string()],
                kline_interval: "1m".to_string(),
                kline_limit: 50,
                atr_period: 14,
                min_hold_seconds: 300,
                min_price_change_pct: 0.002,
                sizing: SizingConfig::default(),
            },
        );
        gateway.set_klines(trending_klines(30, 100.0));

        engine.run_cycle().await;

        let saved = store.load_all().await.unwrap();
        assert!(saved.contains_key("BTCUSDT"));
    }
}
