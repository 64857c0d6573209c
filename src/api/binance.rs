use async_trait::async_trait;
use hmac::{Hmac, Mac};
use reqwest::Client;
use serde::Deserialize;
use serde_json::Value;
use sha2::Sha256;
use std::time::{SystemTime, UNIX_EPOCH};

use super::{ExchangeError, ExchangeGateway};
use crate::models::{
    AccountContext, ExchangePosition, Kline, LotFilter, OrderSide, OrderStatus, OrderUpdate,
    PastOrder, Side,
};

const BINANCE_FUTURES_BASE: &str = "https://fapi.binance.com";

type HmacSha256 = Hmac<Sha256>;

/// Signed REST client for Binance USDT-M futures
///
/// Only the endpoints the position controller needs: balance, position risk,
/// exchange info, order submit/query, order history, klines.
#[derive(Clone)]
pub struct BinanceFuturesClient {
    client: Client,
    base_url: String,
    api_key: String,
    api_secret: String,
}

// ============== Response Types ==============

#[derive(Debug, Deserialize)]
struct ApiErrorBody {
    code: i64,
    msg: String,
}

#[derive(Debug, Deserialize)]
struct BalanceEntry {
    asset: String,
    balance: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct PositionRisk {
    position_amt: String,
    entry_price: String,
    mark_price: String,
    un_realized_profit: String,
}

#[derive(Debug, Deserialize)]
struct ExchangeInfo {
    symbols: Vec<SymbolInfo>,
}

#[derive(Debug, Deserialize)]
struct SymbolInfo {
    symbol: String,
    filters: Vec<SymbolFilter>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct SymbolFilter {
    filter_type: String,
    min_qty: Option<String>,
    step_size: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct OrderResponse {
    order_id: i64,
    status: String,
    #[serde(default)]
    executed_qty: Option<String>,
    #[serde(default)]
    avg_price: Option<String>,
    #[serde(default)]
    price: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct HistoricalOrder {
    order_id: i64,
    side: String,
    status: String,
    #[serde(default)]
    avg_price: Option<String>,
    #[serde(default)]
    price: Option<String>,
    #[serde(default)]
    update_time: Option<i64>,
    #[serde(default)]
    time: Option<i64>,
}

fn parse_f64(s: Option<&str>) -> f64 {
    s.and_then(|v| v.parse::<f64>().ok()).unwrap_or(0.0)
}

impl OrderResponse {
    fn into_update(self) -> OrderUpdate {
        OrderUpdate {
            order_id: self.order_id,
            status: OrderStatus::from_wire(&self.status),
            executed_qty: parse_f64(self.executed_qty.as_deref()),
            avg_price: {
                let avg = parse_f64(self.avg_price.as_deref());
                if avg > 0.0 {
                    avg
                } else {
                    parse_f64(self.price.as_deref())
                }
            },
        }
    }
}

// ============== Implementation ==============

impl BinanceFuturesClient {
    pub fn new(api_key: String, api_secret: String) -> Self {
        Self::with_base_url(api_key, api_secret, BINANCE_FUTURES_BASE.to_string())
    }

    /// Custom base URL (testnet, local mock server)
    pub fn with_base_url(api_key: String, api_secret: String, base_url: String) -> Self {
        Self {
            client: Client::new(),
            base_url,
            api_key,
            api_secret,
        }
    }

    fn timestamp_ms() -> u128 {
        SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_millis())
            .unwrap_or(0)
    }

    fn sign(&self, query: &str) -> String {
        let mut mac = HmacSha256::new_from_slice(self.api_secret.as_bytes())
            .expect("HMAC accepts keys of any length");
        mac.update(query.as_bytes());
        hex::encode(mac.finalize().into_bytes())
    }

    fn signed_query(&self, params: &[(&str, String)]) -> String {
        let mut query = params
            .iter()
            .map(|(k, v)| format!("{}={}", k, urlencoding::encode(v)))
            .collect::<Vec<_>>()
            .join("&");
        if !query.is_empty() {
            query.push('&');
        }
        query.push_str(&format!("timestamp={}", Self::timestamp_ms()));
        let signature = self.sign(&query);
        format!("{}&signature={}", query, signature)
    }

    async fn get_signed<T: serde::de::DeserializeOwned>(
        &self,
        path: &str,
        params: &[(&str, String)],
    ) -> Result<T, ExchangeError> {
        let url = format!("{}{}?{}", self.base_url, path, self.signed_query(params));
        let response = self
            .client
            .get(&url)
            .header("X-MBX-APIKEY", &self.api_key)
            .send()
            .await?;
        Self::decode(response).await
    }

    async fn post_signed<T: serde::de::DeserializeOwned>(
        &self,
        path: &str,
        params: &[(&str, String)],
    ) -> Result<T, ExchangeError> {
        let url = format!("{}{}?{}", self.base_url, path, self.signed_query(params));
        let response = self
            .client
            .post(&url)
            .header("X-MBX-APIKEY", &self.api_key)
            .send()
            .await?;
        Self::decode(response).await
    }

    async fn get_public<T: serde::de::DeserializeOwned>(
        &self,
        path: &str,
        query: &str,
    ) -> Result<T, ExchangeError> {
        let url = if query.is_empty() {
            format!("{}{}", self.base_url, path)
        } else {
            format!("{}{}?{}", self.base_url, path, query)
        };
        let response = self.client.get(&url).send().await?;
        Self::decode(response).await
    }

    async fn decode<T: serde::de::DeserializeOwned>(
        response: reqwest::Response,
    ) -> Result<T, ExchangeError> {
        let status = response.status();
        let body = response.text().await?;

        if !status.is_success() {
            if let Ok(err) = serde_json::from_str::<ApiErrorBody>(&body) {
                return Err(ExchangeError::Api {
                    code: err.code,
                    message: err.msg,
                });
            }
            return Err(ExchangeError::Malformed(format!(
                "HTTP {}: {}",
                status, body
            )));
        }

        serde_json::from_str(&body)
            .map_err(|e| ExchangeError::Malformed(format!("{} (body: {})", e, body)))
    }
}

#[async_trait]
impl ExchangeGateway for BinanceFuturesClient {
    async fn account_context(&self, symbol: &str) -> Result<AccountContext, ExchangeError> {
        let balances: Vec<BalanceEntry> = self.get_signed("/fapi/v2/balance", &[]).await?;
        let balance = balances
            .iter()
            .find(|b| b.asset == "USDT")
            .map(|b| parse_f64(Some(&b.balance)))
            .unwrap_or(0.0);

        let positions: Vec<PositionRisk> = self
            .get_signed("/fapi/v2/positionRisk", &[("symbol", symbol.to_string())])
            .await?;

        let position = match positions.first() {
            Some(p) => {
                let amt = parse_f64(Some(&p.position_amt));
                let side = if amt > 0.0 {
                    Side::Long
                } else if amt < 0.0 {
                    Side::Short
                } else {
                    Side::None
                };
                ExchangePosition {
                    side,
                    qty: amt.abs(),
                    entry_price: parse_f64(Some(&p.entry_price)),
                    mark_price: parse_f64(Some(&p.mark_price)),
                    unrealized_pnl: parse_f64(Some(&p.un_realized_profit)),
                }
            }
            None => ExchangePosition::flat(),
        };

        Ok(AccountContext { balance, position })
    }

    async fn lot_filter(&self, symbol: &str) -> Result<LotFilter, ExchangeError> {
        let info: ExchangeInfo = self.get_public("/fapi/v1/exchangeInfo", "").await?;

        for s in &info.symbols {
            if s.symbol != symbol {
                continue;
            }
            for f in &s.filters {
                if f.filter_type == "LOT_SIZE" {
                    return Ok(LotFilter {
                        min_qty: parse_f64(f.min_qty.as_deref()),
                        step_size: parse_f64(f.step_size.as_deref()),
                    });
                }
            }
        }

        tracing::warn!("No LOT_SIZE filter for {}, using defaults", symbol);
        Ok(LotFilter::default())
    }

    async fn submit_market_order(
        &self,
        symbol: &str,
        side: OrderSide,
        qty: f64,
    ) -> Result<OrderUpdate, ExchangeError> {
        let params = [
            ("symbol", symbol.to_string()),
            ("side", side.as_str().to_string()),
            ("type", "MARKET".to_string()),
            ("quantity", format!("{}", qty)),
            ("newOrderRespType", "RESULT".to_string()),
        ];
        let response: OrderResponse = self.post_signed("/fapi/v1/order", &params).await?;
        Ok(response.into_update())
    }

    async fn query_order(&self, symbol: &str, order_id: i64) -> Result<OrderUpdate, ExchangeError> {
        let params = [
            ("symbol", symbol.to_string()),
            ("orderId", order_id.to_string()),
        ];
        let response: OrderResponse = self.get_signed("/fapi/v1/order", &params).await?;
        Ok(response.into_update())
    }

    async fn recent_orders(
        &self,
        symbol: &str,
        limit: u32,
    ) -> Result<Vec<PastOrder>, ExchangeError> {
        let params = [
            ("symbol", symbol.to_string()),
            ("limit", limit.to_string()),
        ];
        let orders: Vec<HistoricalOrder> = self.get_signed("/fapi/v1/allOrders", &params).await?;

        Ok(orders
            .into_iter()
            .map(|o| PastOrder {
                order_id: o.order_id,
                side: if o.side == "BUY" {
                    OrderSide::Buy
                } else {
                    OrderSide::Sell
                },
                status: OrderStatus::from_wire(&o.status),
                avg_price: {
                    let avg = parse_f64(o.avg_price.as_deref());
                    if avg > 0.0 {
                        avg
                    } else {
                        parse_f64(o.price.as_deref())
                    }
                },
                update_time_ms: o.update_time.or(o.time).unwrap_or(0),
            })
            .collect())
    }

    async fn klines(
        &self,
        symbol: &str,
        interval: &str,
        limit: u32,
    ) -> Result<Vec<Kline>, ExchangeError> {
        let query = format!("symbol={}&interval={}&limit={}", symbol, interval, limit);
        // Binance returns klines as positional arrays mixing numbers and strings
        let rows: Vec<Vec<Value>> = self.get_public("/fapi/v1/klines", &query).await?;

        let mut klines = Vec::with_capacity(rows.len());
        for row in rows {
            if row.len() < 6 {
                return Err(ExchangeError::Malformed(format!(
                    "kline row with {} fields",
                    row.len()
                )));
            }
            klines.push(Kline {
                open_time_ms: row[0].as_i64().unwrap_or(0),
                open: value_f64(&row[1]),
                high: value_f64(&row[2]),
                low: value_f64(&row[3]),
                close: value_f64(&row[4]),
                volume: value_f64(&row[5]),
            });
        }
        Ok(klines)
    }
}

fn value_f64(v: &Value) -> f64 {
    match v {
        Value::String(s) => s.parse().unwrap_or(0.0),
        Value::Number(n) => n.as_f64().unwrap_or(0.0),
        _ => 0.0,
    }
}
