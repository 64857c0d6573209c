use crate::api::ExchangeGateway;
use crate::models::{AccountContext, OrderSide, OrderStatus, PositionRecord, Side};

const RECENT_ORDER_LIMIT: u32 = 50;
const ENTRY_PRICE_TOLERANCE: f64 = 0.001;

/// Overwrite the record's side/qty/entry price with the exchange's authoritative
/// position, and recover a missing entry timestamp from order history.
///
/// The exchange is ground truth: whatever the record claimed, the reported
/// position wins. Entry-time recovery is best-effort and must never abort the
/// cycle; when it fails the current wall-clock time is used as an estimate.
pub async fn reconcile(
    record: Option<PositionRecord>,
    ctx: &AccountContext,
    gateway: &dyn ExchangeGateway,
    symbol: &str,
    now_ts: i64,
) -> PositionRecord {
    let mut record = record.unwrap_or_default();

    record.side = ctx.position.side;
    record.qty = ctx.position.qty;
    record.entry_price = ctx.position.entry_price;

    if ctx.position.side != Side::None && ctx.position.qty > 0.0 && record.entry_time.is_none() {
        match recover_entry_time(gateway, symbol, ctx.position.side, ctx.position.entry_price).await
        {
            Some(ts) => {
                tracing::info!("{}: recovered entry time {} from order history", symbol, ts);
                record.entry_time = Some(ts);
            }
            None => {
                tracing::info!(
                    "{}: could not recover entry time, using current time as estimate",
                    symbol
                );
                record.entry_time = Some(now_ts);
            }
        }
    }

    record
}

/// Scan recent filled orders, most recent first, for one matching the open
/// position's direction with an average price within 0.1% of the reported
/// entry price. `None` when no match or when the lookup itself fails.
async fn recover_entry_time(
    gateway: &dyn ExchangeGateway,
    symbol: &str,
    side: Side,
    entry_price: f64,
) -> Option<i64> {
    let target_side = match side {
        Side::Long => OrderSide::Buy,
        Side::Short => OrderSide::Sell,
        Side::None => return None,
    };

    let orders = match gateway.recent_orders(symbol, RECENT_ORDER_LIMIT).await {
        Ok(orders) => orders,
        Err(e) => {
            tracing::debug!("{}: order history lookup failed: {}", symbol, e);
            return None;
        }
    };

    let tolerance = entry_price * ENTRY_PRICE_TOLERANCE;
    for order in orders.iter().rev() {
        if order.status != OrderStatus::Filled {
            continue;
        }
        if order.side == target_side && (order.avg_price - entry_price).abs() <= tolerance {
            return Some(order.update_time_ms / 1000);
        }
    }

    None
}
