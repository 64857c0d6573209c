// Signal generation module
//
// The execution pipeline treats signals as opaque input; any SignalSource can
// be plugged in. The SMA crossover below is the default so the binary runs end
// to end.

use async_trait::async_trait;

use crate::indicators::calculate_sma;
use crate::models::{Kline, Signal};

/// Source of directional signals, one per symbol per cycle
#[async_trait]
pub trait SignalSource: Send + Sync {
    async fn generate_signal(&self, symbol: &str, klines: &[Kline]) -> anyhow::Result<Signal>;

    fn name(&self) -> &str;

    /// Minimum bars required before a directional signal can be produced
    fn min_klines_required(&self) -> usize;
}

/// Fast/slow SMA crossover over close prices
pub struct SmaCrossover {
    fast_period: usize,
    slow_period: usize,
}

impl SmaCrossover {
    pub fn new(fast_period: usize, slow_period: usize) -> Self {
        Self {
            fast_period,
            slow_period,
        }
    }
}

impl Default for SmaCrossover {
    fn default() -> Self {
        Self::new(7, 25)
    }
}

#[async_trait]
impl SignalSource for SmaCrossover {
    async fn generate_signal(&self, symbol: &str, klines: &[Kline]) -> anyhow::Result<Signal> {
        if klines.len() < self.min_klines_required() {
            tracing::debug!(
                "[{}] {} bars, need {} for a signal",
                symbol,
                klines.len(),
                self.min_klines_required()
            );
            return Ok(Signal::Hold);
        }

        let closes: Vec<f64> = klines.iter().map(|k| k.close).collect();
        let fast = calculate_sma(&closes, self.fast_period);
        let slow = calculate_sma(&closes, self.slow_period);

        let signal = match (fast, slow) {
            (Some(fast), Some(slow)) if fast > slow => Signal::Long,
            (Some(fast), Some(slow)) if fast < slow => Signal::Short,
            _ => Signal::Hold,
        };

        tracing::debug!(
            "[{}] fast_sma={:?} slow_sma={:?} -> {}",
            symbol,
            fast,
            slow,
            signal
        );
        Ok(signal)
    }

    fn name(&self) -> &str {
        "sma_crossover"
    }

    fn min_klines_required(&self) -> usize {
        self.slow_period
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn bars(closes: &[f64]) -> Vec<Kline> {
        closes
            .iter()
            .enumerate()
            .map(|(i, &close)| Kline {
                open_time_ms: 1_700_000_000_000 + i as i64 * 60_000,
                open: close,
                high: close,
                low: close,
                close,
                volume: 1.0,
            })
            .collect()
    }

    #[tokio::test]
    async fn test_uptrend_signals_long() {
        let source = SmaCrossover::new(2, 4);
        let closes = vec![100.0, 101.0, 102.0, 103.0, 104.0, 105.0];
        let signal = source.generate_signal("BTCUSDT", &bars(&closes)).await.unwrap();
        assert_eq!(signal, Signal::Long);
    }

    #[tokio::test]
    async fn test_downtrend_signals_short() {
        let source = SmaCrossover::new(2, 4);
        let closes = vec![105.0, 104.0, 103.0, 102.0, 101.0, 100.0];
        let signal = source.generate_signal("BTCUSDT", &bars(&closes)).await.unwrap();
        assert_eq!(signal, Signal::Short);
    }

    #[tokio::test]
    async fn test_insufficient_data_holds() {
        let source = SmaCrossover::new(7, 25);
        let closes = vec![100.0, 101.0];
        let signal = source.generate_signal("BTCUSDT", &bars(&closes)).await.unwrap();
        assert_eq!(signal, Signal::Hold);
    }

    #[tokio::test]
    async fn test_flat_market_holds() {
        let source = SmaCrossover::new(2, 4);
        let closes = vec![100.0; 10];
        let signal = source.generate_signal("BTCUSDT", &bars(&closes)).await.unwrap();
        assert_eq!(signal, Signal::Hold);
    }
}
