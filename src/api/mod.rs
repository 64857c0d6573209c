// Exchange access: gateway trait + Binance USDT-M futures implementation
pub mod binance;

use async_trait::async_trait;
use thiserror::Error;

use crate::models::{AccountContext, Kline, LotFilter, OrderSide, OrderUpdate, PastOrder};

pub use binance::BinanceFuturesClient;

#[derive(Debug, Error)]
pub enum ExchangeError {
    #[error("transport error: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("exchange rejected request (code {code}): {message}")]
    Api { code: i64, message: String },

    #[error("unexpected response: {0}")]
    Malformed(String),
}

/// Exchange capability consumed by the core
///
/// The process entry point owns the concrete client; everything downstream
/// takes `Arc<dyn ExchangeGateway>` so tests can script responses.
#[async_trait]
pub trait ExchangeGateway: Send + Sync {
    /// Current balance and position for one symbol
    async fn account_context(&self, symbol: &str) -> Result<AccountContext, ExchangeError>;

    /// Lot constraints (min quantity, quantity step) for one symbol
    async fn lot_filter(&self, symbol: &str) -> Result<LotFilter, ExchangeError>;

    /// Submit a market order requesting immediate-result reporting
    async fn submit_market_order(
        &self,
        symbol: &str,
        side: OrderSide,
        qty: f64,
    ) -> Result<OrderUpdate, ExchangeError>;

    /// Query the current state of a previously submitted order
    async fn query_order(&self, symbol: &str, order_id: i64) -> Result<OrderUpdate, ExchangeError>;

    /// Most recent orders for a symbol, oldest first
    async fn recent_orders(&self, symbol: &str, limit: u32)
        -> Result<Vec<PastOrder>, ExchangeError>;

    /// OHLCV bars for a symbol
    async fn klines(
        &self,
        symbol: &str,
        interval: &str,
        limit: u32,
    ) -> Result<Vec<Kline>, ExchangeError>;
}
