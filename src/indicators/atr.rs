/// Average True Range (ATR) indicator
///
/// Measures volatility as the average of true ranges over a period. True Range
/// is the greatest of:
/// - Current High - Current Low
/// - Abs(Current High - Previous Close)
/// - Abs(Current Low - Previous Close)
///
/// Uses Wilder's smoothing for the moving average.
use crate::models::Kline;

/// Calculate ATR for the given bars
///
/// Returns the current ATR value, or None if insufficient data
pub fn calculate_atr(klines: &[Kline], period: usize) -> Option<f64> {
    if klines.len() < period + 1 {
        return None;
    }

    let mut true_ranges = Vec::new();
    for i in 1..klines.len() {
        let high = klines[i].high;
        let low = klines[i].low;
        let prev_close = klines[i - 1].close;

        let tr = (high - low)
            .max((high - prev_close).abs())
            .max((low - prev_close).abs());

        true_ranges.push(tr);
    }

    if true_ranges.len() < period {
        return None;
    }

    // First ATR is a simple average, then Wilder's smoothing
    let first_atr: f64 = true_ranges.iter().take(period).sum::<f64>() / period as f64;

    let mut atr = first_atr;
    for tr in &true_ranges[period..] {
        atr = (atr * (period as f64 - 1.0) + tr) / period as f64;
    }

    Some(atr)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn bars(prices: &[(f64, f64, f64, f64)]) -> Vec<Kline> {
        prices
            .iter()
            .enumerate()
            .map(|(i, &(open, high, low, close))| Kline {
                open_time_ms: 1_700_000_000_000 + i as i64 * 3_600_000,
                open,
                high,
                low,
                close,
                volume: 1000.0,
            })
            .collect()
    }

    #[test]
    fn test_calculate_atr_low_volatility() {
        let prices = vec![(100.0, 101.0, 99.0, 100.0); 15];
        let atr = calculate_atr(&bars(&prices), 14);

        assert!(atr.is_some());
        // steady 2-point range
        assert!((atr.unwrap() - 2.0).abs() < 1e-9);
    }

    #[test]
    fn test_calculate_atr_high_volatility() {
        let prices = vec![
            (100.0, 105.0, 95.0, 102.0),
            (102.0, 110.0, 98.0, 105.0),
            (105.0, 108.0, 92.0, 95.0),
            (95.0, 103.0, 88.0, 100.0),
            (100.0, 115.0, 97.0, 110.0),
            (110.0, 112.0, 95.0, 98.0),
            (98.0, 108.0, 90.0, 105.0),
            (105.0, 120.0, 100.0, 115.0),
            (115.0, 118.0, 105.0, 110.0),
            (110.0, 125.0, 108.0, 120.0),
            (120.0, 130.0, 115.0, 125.0),
            (125.0, 128.0, 110.0, 115.0),
            (115.0, 122.0, 105.0, 118.0),
            (118.0, 130.0, 115.0, 125.0),
            (125.0, 135.0, 120.0, 130.0),
        ];

        let atr = calculate_atr(&bars(&prices), 14);

        assert!(atr.is_some());
        assert!(atr.unwrap() > 10.0);
    }

    #[test]
    fn test_insufficient_data() {
        let prices = vec![(100.0, 101.0, 99.0, 100.0), (100.0, 101.0, 99.0, 100.0)];
        assert!(calculate_atr(&bars(&prices), 14).is_none());
    }
}
