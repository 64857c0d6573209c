use std::sync::Arc;
use tokio::sync::watch;
use tokio::time::{sleep, Duration};

use crate::api::{ExchangeError, ExchangeGateway};
use crate::models::{OrderOutcome, OrderSide, OrderUpdate};

/// Market orders on this venue usually fill synchronously; the bounded poll
/// absorbs the rare asynchronous fill without blocking indefinitely.
const POLL_ATTEMPTS: u32 = 20;
const POLL_INTERVAL: Duration = Duration::from_millis(200);

/// Submits market orders and resolves their final fill state
///
/// Never returns an error to the caller: transport failures, rejections, and
/// unfilled timeouts are all folded into the returned [`OrderOutcome`].
pub struct OrderExecutor {
    gateway: Arc<dyn ExchangeGateway>,
    shutdown: watch::Receiver<bool>,
}

impl OrderExecutor {
    pub fn new(gateway: Arc<dyn ExchangeGateway>, shutdown: watch::Receiver<bool>) -> Self {
        Self { gateway, shutdown }
    }

    /// Submit a market order and wait (bounded) for its fill state
    pub async fn submit_market_order(
        &self,
        symbol: &str,
        side: OrderSide,
        qty: f64,
    ) -> OrderOutcome {
        match self.submit_and_poll(symbol, side, qty).await {
            Ok(outcome) => outcome,
            Err(e) => {
                tracing::error!("Order failed: {} {} qty={} error={}", symbol, side, qty, e);
                OrderOutcome::failed(symbol, side, None, e.to_string())
            }
        }
    }

    async fn submit_and_poll(
        &self,
        symbol: &str,
        side: OrderSide,
        qty: f64,
    ) -> Result<OrderOutcome, ExchangeError> {
        let ack = self.gateway.submit_market_order(symbol, side, qty).await?;
        let order_id = ack.order_id;

        // Market orders with RESULT response type usually come back filled
        if ack.status == crate::models::OrderStatus::Filled {
            return Ok(self.filled_outcome(symbol, side, qty, &ack));
        }

        let mut shutdown = self.shutdown.clone();
        for _ in 0..POLL_ATTEMPTS {
            let update = self.gateway.query_order(symbol, order_id).await?;

            if update.status == crate::models::OrderStatus::Filled {
                return Ok(self.filled_outcome(symbol, side, qty, &update));
            }

            if update.status.is_dead() {
                tracing::error!(
                    "Order {}: {} {} qty={} orderId={}",
                    update.status,
                    symbol,
                    side,
                    qty,
                    order_id
                );
                return Ok(OrderOutcome::failed(
                    symbol,
                    side,
                    Some(order_id),
                    format!("order {}", update.status),
                ));
            }

            tokio::select! {
                _ = sleep(POLL_INTERVAL) => {}
                changed = shutdown.changed() => {
                    if changed.is_ok() {
                        if *shutdown.borrow() {
                            tracing::warn!(
                                "Shutdown during order confirmation: {} orderId={} (order may still be live)",
                                symbol,
                                order_id
                            );
                            return Ok(OrderOutcome::failed(
                                symbol,
                                side,
                                Some(order_id),
                                "shutdown requested while awaiting fill; order may still be live"
                                    .to_string(),
                            ));
                        }
                    } else {
                        // shutdown sender gone; keep the poll cadence
                        sleep(POLL_INTERVAL).await;
                    }
                }
            }
        }

        // Polling exhausted: one final status query decides the outcome
        let last = self.gateway.query_order(symbol, order_id).await?;
        if last.executed_qty > 0.0 {
            let executed = last.executed_qty.min(qty);
            tracing::warn!(
                "Order partially filled: {} {} executed={}/{} price={} status={}",
                symbol,
                side,
                executed,
                qty,
                last.avg_price,
                last.status
            );
            return Ok(OrderOutcome::partial(
                symbol,
                side,
                executed,
                last.avg_price,
                order_id,
                format!("partial fill, status {}", last.status),
            ));
        }

        tracing::error!(
            "Order did not fill: {} {} qty={} orderId={} status={}",
            symbol,
            side,
            qty,
            order_id,
            last.status
        );
        Ok(OrderOutcome::failed(
            symbol,
            side,
            Some(order_id),
            format!("order did not fill, status {}", last.status),
        ))
    }

    fn filled_outcome(
        &self,
        symbol: &str,
        side: OrderSide,
        requested_qty: f64,
        update: &OrderUpdate,
    ) -> OrderOutcome {
        // Some immediate-result responses omit executedQty; fall back to the request
        let executed = if update.executed_qty > 0.0 {
            update.executed_qty.min(requested_qty)
        } else {
            requested_qty
        };
        tracing::info!(
            "Order filled: {} {} qty={} price={}",
            symbol,
            side,
            executed,
            update.avg_price
        );
        OrderOutcome::filled(symbol, side, executed, update.avg_price, update.order_id)
    }
}
