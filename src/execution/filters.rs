use crate::models::PositionRecord;

/// Gate an actionable signal by minimum holding time and minimum price
/// displacement since entry, to avoid round-tripping the same band on noise.
///
/// Both gates apply only when their inputs exist: the hold gate needs an
/// `entry_time`, the displacement gate needs a positive `entry_price`.
pub fn passes_filters(
    record: &PositionRecord,
    now_ts: i64,
    current_price: f64,
    min_hold_seconds: i64,
    min_price_change_pct: f64,
) -> bool {
    if let Some(entry_time) = record.entry_time {
        let hold_seconds = now_ts - entry_time;
        if hold_seconds < min_hold_seconds {
            tracing::info!(
                "Held only {}s < {}s, skipping to avoid churn",
                hold_seconds,
                min_hold_seconds
            );
            return false;
        }
    }

    if record.entry_price > 0.0 {
        let price_change_pct = (current_price - record.entry_price).abs() / record.entry_price;
        if price_change_pct < min_price_change_pct {
            tracing::info!(
                "Price moved only {:.4}% < {:.2}%, skipping to avoid churn",
                price_change_pct * 100.0,
                min_price_change_pct * 100.0
            );
            return false;
        }
    }

    true
}
