use async_trait::async_trait;
use reqwest::Client;

use crate::models::{OrderSide, Side};

fn format_pnl(pnl: f64) -> String {
    let sign = if pnl >= 0.0 { "+" } else { "-" };
    format!("{}{:.4} USDT", sign, pnl.abs())
}

fn format_pct(pct: f64) -> String {
    let sign = if pct >= 0.0 { "+" } else { "-" };
    format!("{}{:.2}%", sign, pct.abs())
}

/// Fire-and-forget observability sink
///
/// Delivery failures are logged and swallowed; they must never affect trading
/// decisions. The formatted variants exist so operators can tell "order
/// rejected", "timed out unfilled", "partially filled" and "reversal left
/// position flat" apart without reading logs.
#[async_trait]
pub trait Notifier: Send + Sync {
    async fn send(&self, text: &str);

    async fn notify_open(&self, symbol: &str, side: OrderSide, qty: f64, price: f64, balance: f64) {
        self.send(&format!(
            "🚀 <b>Position opened</b>\n📌 {}: <b>{}</b> {} | entry: {:.2}\n💰 balance: {:.2} USDT",
            symbol, side, qty, price, balance
        ))
        .await;
    }

    #[allow(clippy::too_many_arguments)]
    async fn notify_close(
        &self,
        symbol: &str,
        side: Side,
        qty: f64,
        entry_price: f64,
        close_price: f64,
        pnl: f64,
        pnl_pct: f64,
        reason: &str,
        balance: f64,
    ) {
        self.send(&format!(
            "📤 <b>Position closed</b>\n📌 {}: {} {}\n⏳ entry: {:.2}\n🏁 exit: {:.2}\n💵 pnl: {} ({})\n📘 reason: {}\n💰 balance: {:.2} USDT",
            symbol,
            side,
            qty,
            entry_price,
            close_price,
            format_pnl(pnl),
            format_pct(pnl_pct),
            reason,
            balance
        ))
        .await;
    }

    async fn notify_reverse_open(&self, symbol: &str, side: OrderSide, qty: f64, price: f64) {
        self.send(&format!(
            "🔄 <b>Reversal opened</b>\n📌 {}: <b>{}</b> {} | entry: {:.2}",
            symbol, side, qty, price
        ))
        .await;
    }

    /// Distinct failure mode: the close succeeded but the reopen did not,
    /// leaving the account flat instead of reversed.
    async fn notify_reversal_left_flat(&self, symbol: &str, detail: &str) {
        self.send(&format!(
            "⚠️ <b>Reversal left {} FLAT</b>\nClose filled but the re-open failed: {}\nPosition is unexpectedly closed, manual review advised.",
            symbol, detail
        ))
        .await;
    }

    async fn notify_error(&self, symbol: &str, detail: &str) {
        self.send(&format!("❌ <b>{} error</b>\n{}", symbol, detail))
            .await;
    }
}

/// Telegram bot delivery
#[derive(Clone)]
pub struct TelegramNotifier {
    client: Client,
    base_url: String,
    token: String,
    chat_id: String,
}

impl TelegramNotifier {
    pub fn new(token: String, chat_id: String) -> Self {
        Self::with_base_url(token, chat_id, "https://api.telegram.org".to_string())
    }

    pub fn with_base_url(token: String, chat_id: String, base_url: String) -> Self {
        Self {
            client: Client::new(),
            base_url,
            token,
            chat_id,
        }
    }
}

#[async_trait]
impl Notifier for TelegramNotifier {
    async fn send(&self, text: &str) {
        let url = format!("{}/bot{}/sendMessage", self.base_url, self.token);
        let body = serde_json::json!({
            "chat_id": self.chat_id,
            "text": text,
            "parse_mode": "HTML",
        });

        match self.client.post(&url).json(&body).send().await {
            Ok(response) if !response.status().is_success() => {
                tracing::warn!("Telegram rejected notification: HTTP {}", response.status());
            }
            Ok(_) => {}
            Err(e) => {
                tracing::warn!("Telegram notification failed: {}", e);
            }
        }
    }
}

/// No-op sink for when Telegram is not configured
pub struct NullNotifier;

#[async_trait]
impl Notifier for NullNotifier {
    async fn send(&self, _text: &str) {}
}

#[cfg(test)]
pub(crate) mod testutil {
    use super::*;
    use std::sync::Mutex;

    /// Captures every message for assertions
    pub struct RecordingNotifier {
        pub messages: Mutex<Vec<String>>,
    }

    impl RecordingNotifier {
        pub fn new() -> Self {
            Self {
                messages: Mutex::new(Vec::new()),
            }
        }

        pub fn messages(&self) -> Vec<String> {
            self.messages.lock().unwrap().clone()
        }
    }

    #[async_trait]
    impl Notifier for RecordingNotifier {
        async fn send(&self, text: &str) {
            self.messages.lock().unwrap().push(text.to_string());
        }
    }
}
