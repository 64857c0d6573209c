use std::sync::Arc;
use std::time::Duration;

use clap::Parser;
use tokio::sync::watch;
use tracing_subscriber::EnvFilter;

use perpbot::api::binance::BinanceFuturesClient;
use perpbot::cache::TtlCache;
use perpbot::config::Config;
use perpbot::engine::{Engine, EngineConfig};
use perpbot::execution::{LifecycleConfig, OrderExecutor, PositionLifecycle};
use perpbot::notify::{Notifier, NullNotifier, TelegramNotifier};
use perpbot::persistence::{MemorySnapshotStore, RedisSnapshotStore, SnapshotStore};
use perpbot::strategy::SmaCrossover;

#[derive(Parser, Debug)]
#[command(name = "perpbot", about = "Futures position controller")]
struct Args {
    /// Path to the TOML configuration file
    #[arg(long, default_value = "perpbot.toml")]
    config: String,

    /// Run a single evaluation cycle and exit
    #[arg(long)]
    once: bool,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("perpbot=info")),
        )
        .init();

    let args = Args::parse();
    let cfg = Config::load(&args.config)?;

    tracing::info!("perpbot starting");
    tracing::info!("  symbols: {:?}", cfg.symbols);
    tracing::info!("  cycle interval: {}s", cfg.cycle_interval_secs);
    tracing::info!(
        "  take-profit: full {}%, partial {}%",
        cfg.full_take_profit_pct,
        cfg.partial_take_profit_pct
    );

    let api_key = std::env::var("BINANCE_API_KEY")
        .map_err(|_| anyhow::anyhow!("BINANCE_API_KEY not set"))?;
    let api_secret = std::env::var("BINANCE_API_SECRET")
        .map_err(|_| anyhow::anyhow!("BINANCE_API_SECRET not set"))?;

    let gateway = Arc::new(BinanceFuturesClient::with_base_url(
        api_key,
        api_secret,
        cfg.binance_base_url.clone(),
    ));

    let notifier: Arc<dyn Notifier> = match &cfg.telegram {
        Some(tg) => {
            tracing::info!("Telegram notifications enabled");
            Arc::new(TelegramNotifier::new(
                tg.bot_token.clone(),
                tg.chat_id.clone(),
            ))
        }
        None => {
            tracing::info!("Telegram not configured, notifications disabled");
            Arc::new(NullNotifier)
        }
    };

    let store: Arc<dyn SnapshotStore> = match &cfg.redis_url {
        Some(url) => Arc::new(RedisSnapshotStore::new(url).await?),
        None => {
            tracing::warn!("No redis_url configured, snapshots will not survive restarts");
            Arc::new(MemorySnapshotStore::new())
        }
    };

    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    let executor = OrderExecutor::new(gateway.clone(), shutdown_rx);
    let lifecycle = PositionLifecycle::new(
        executor,
        notifier.clone(),
        LifecycleConfig {
            full_take_profit_pct: cfg.full_take_profit_pct,
            partial_take_profit_pct: cfg.partial_take_profit_pct,
        },
    );

    let mut engine = Engine::new(
        gateway,
        Arc::new(SmaCrossover::default()),
        lifecycle,
        store,
        notifier,
        TtlCache::new(Duration::from_secs(cfg.lot_filter_ttl_secs)),
        EngineConfig {
            symbols: cfg.symbols.clone(),
            kline_interval: cfg.kline_interval.clone(),
            kline_limit: cfg.kline_limit,
            atr_period: cfg.atr_period,
            min_hold_seconds: cfg.min_hold_seconds,
            min_price_change_pct: cfg.min_price_change_pct,
            sizing: cfg.sizing.clone(),
        },
    );

    engine.load_snapshots().await?;

    if args.once {
        engine.run_cycle().await;
        return Ok(());
    }

    let mut ticker = tokio::time::interval(Duration::from_secs(cfg.cycle_interval_secs));
    ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);

    loop {
        tokio::select! {
            _ = ticker.tick() => {
                engine.run_cycle().await;
            }
            _ = tokio::signal::ctrl_c() => {
                tracing::info!("Received Ctrl+C, shutting down...");
                // flips the watch channel so any in-flight order poll aborts
                let _ = shutdown_tx.send(true);
                break;
            }
        }
    }

    tracing::info!("perpbot stopped");
    Ok(())
}
