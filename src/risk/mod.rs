// Position sizing and trade arithmetic
pub mod sizer;

pub use sizer::{align_to_step, position_size, SizingConfig};

use crate::models::Side;

/// Realized/unrealized PnL in quote currency and signed price-change percent
///
/// The price percentage is for observability; take-profit thresholds compare
/// against the account-equity percentage computed by the lifecycle controller.
pub fn pnl_and_price_pct(side: Side, entry_price: f64, close_price: f64, qty: f64) -> (f64, f64) {
    if entry_price <= 0.0 {
        return (0.0, 0.0);
    }

    let diff = match side {
        Side::Long => close_price - entry_price,
        Side::Short => entry_price - close_price,
        Side::None => 0.0,
    };

    (diff * qty, diff / entry_price * 100.0)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_long_pnl() {
        let (pnl, pct) = pnl_and_price_pct(Side::Long, 100.0, 110.0, 2.0);
        assert_eq!(pnl, 20.0);
        assert_eq!(pct, 10.0);
    }

    #[test]
    fn test_short_pnl() {
        let (pnl, pct) = pnl_and_price_pct(Side::Short, 100.0, 90.0, 3.0);
        assert_eq!(pnl, 30.0);
        assert_eq!(pct, 10.0);
    }

    #[test]
    fn test_short_loss() {
        let (pnl, pct) = pnl_and_price_pct(Side::Short, 100.0, 105.0, 1.0);
        assert_eq!(pnl, -5.0);
        assert_eq!(pct, -5.0);
    }

    #[test]
    fn test_zero_entry_price_is_zero() {
        let (pnl, pct) = pnl_and_price_pct(Side::Long, 0.0, 110.0, 2.0);
        assert_eq!(pnl, 0.0);
        assert_eq!(pct, 0.0);
    }
}
