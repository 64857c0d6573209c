use serde::Deserialize;

use crate::models::LotFilter;

/// Risk parameters for position sizing
#[derive(Debug, Clone, Deserialize)]
pub struct SizingConfig {
    /// Fraction of balance risked per ATR unit
    pub risk_factor: f64,
    /// Cap on position notional as a fraction of levered balance
    pub max_position_ratio: f64,
    pub leverage: f64,
}

impl Default for SizingConfig {
    fn default() -> Self {
        Self {
            risk_factor: 0.01,
            max_position_ratio: 0.5,
            leverage: 5.0,
        }
    }
}

/// Align a quantity down to the exchange step size
///
/// Always rounds toward zero; never raises the quantity. The small epsilon
/// keeps exact multiples (0.5 with step 0.1) from losing a step to binary
/// float representation.
pub fn align_to_step(qty: f64, step: f64) -> f64 {
    if step <= 0.0 {
        return qty;
    }
    let steps = (qty / step + 1e-9).floor();
    steps * step
}

/// Convert balance/volatility/price into an order quantity
///
/// ATR risk budget capped by max notional, floored to the step size, then
/// raised to the exchange minimum. Returns 0 when the ATR is unusable.
pub fn position_size(
    symbol: &str,
    balance: f64,
    atr: f64,
    price: f64,
    lot: &LotFilter,
    config: &SizingConfig,
) -> f64 {
    if atr <= 0.0 {
        tracing::warn!("[{}] Invalid ATR {}, sizing to 0", symbol, atr);
        return 0.0;
    }
    if price <= 0.0 {
        tracing::warn!("[{}] Invalid price {}, sizing to 0", symbol, price);
        return 0.0;
    }

    let risk_value = balance * config.risk_factor;
    let qty_atr = risk_value / atr;

    let max_notional = balance * config.leverage * config.max_position_ratio;
    let qty_max = max_notional / price;

    tracing::debug!(
        "[{}] sizing: risk={:.4} atr={:.4} qty_atr={:.4} max_notional={:.2} qty_max={:.4}",
        symbol,
        risk_value,
        atr,
        qty_atr,
        max_notional,
        qty_max
    );

    let mut qty = qty_atr.min(qty_max);
    qty = align_to_step(qty, lot.step_size);
    if qty < lot.min_qty {
        qty = lot.min_qty;
    }

    qty
}
