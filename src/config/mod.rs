use serde::Deserialize;

use crate::risk::SizingConfig;

/// Application configuration, TOML file plus `PERPBOT_`-prefixed env overrides
///
/// Exchange credentials never live in the file; they come from the environment
/// (`BINANCE_API_KEY` / `BINANCE_API_SECRET`), loaded via dotenv in main.
#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    /// Symbols traded each cycle, e.g. ["BTCUSDT", "ETHUSDT"]
    pub symbols: Vec<String>,

    #[serde(default = "default_cycle_interval_secs")]
    pub cycle_interval_secs: u64,

    #[serde(default = "default_kline_interval")]
    pub kline_interval: String,

    #[serde(default = "default_kline_limit")]
    pub kline_limit: u32,

    #[serde(default = "default_atr_period")]
    pub atr_period: usize,

    #[serde(default = "default_min_hold_seconds")]
    pub min_hold_seconds: i64,

    /// Fraction, not percent: 0.002 means 0.2%
    #[serde(default = "default_min_price_change_pct")]
    pub min_price_change_pct: f64,

    #[serde(default = "default_full_take_profit_pct")]
    pub full_take_profit_pct: f64,

    #[serde(default = "default_partial_take_profit_pct")]
    pub partial_take_profit_pct: f64,

    #[serde(default = "default_lot_filter_ttl_secs")]
    pub lot_filter_ttl_secs: u64,

    #[serde(default)]
    pub sizing: SizingConfig,

    #[serde(default)]
    pub redis_url: Option<String>,

    #[serde(default = "default_binance_base_url")]
    pub binance_base_url: String,

    #[serde(default)]
    pub telegram: Option<TelegramConfig>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct TelegramConfig {
    pub bot_token: String,
    pub chat_id: String,
}

fn default_cycle_interval_secs() -> u64 {
    60
}

fn default_kline_interval() -> String {
    "1m".to_string()
}

fn default_kline_limit() -> u32 {
    100
}

fn default_atr_period() -> usize {
    14
}

fn default_min_hold_seconds() -> i64 {
    300
}

fn default_min_price_change_pct() -> f64 {
    0.002
}

fn default_full_take_profit_pct() -> f64 {
    15.0
}

fn default_partial_take_profit_pct() -> f64 {
    10.0
}

fn default_lot_filter_ttl_secs() -> u64 {
    3600
}

fn default_binance_base_url() -> String {
    "https://fapi.binance.com".to_string()
}

impl Config {
    /// Load from a TOML file, then apply `PERPBOT_*` environment overrides
    /// (e.g. `PERPBOT_REDIS_URL`, `PERPBOT_CYCLE_INTERVAL_SECS`)
    pub fn load(path: &str) -> anyhow::Result<Self> {
        let settings = config::Config::builder()
            .add_source(config::File::with_name(path))
            .add_source(config::Environment::with_prefix("PERPBOT").separator("__"))
            .build()?;

        let cfg: Config = settings.try_deserialize()?;
        if cfg.symbols.is_empty() {
            anyhow::bail!("config: at least one symbol is required");
        }
        Ok(cfg)
    }
}
