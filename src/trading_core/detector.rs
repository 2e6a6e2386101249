//! Liquidity Sweep & Reclaim Detector
//!
//! Detects the "turtle soup" reversal pattern on the most recently closed
//! candle: price trades beyond the high/low of the prior liquidity window
//! (sweeping the stops resting there) and closes back inside the range with
//! a strong rejection wick.
//!
//! The detector is a pure function of its inputs. It holds no cross-candle
//! state, never retries, and emits at most one signal per evaluation.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::types::{Candle, Side};

/// Minimum close-location strength for a valid reclaim.
///
/// The close must sit in the top (buy) or bottom (sell) 30% of the candle's
/// own range - a rejection wick, not a weak reclaim.
pub const MIN_CLOSE_STRENGTH: f64 = 0.7;

/// High/low of the liquidity window preceding the evaluated candle.
///
/// Derived on every evaluation, never stored or mutated in place. The
/// evaluated candle is always excluded from its own reference range.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct LiquidityWindow {
    pub high_liq: f64,
    pub low_liq: f64,
}

/// Which raid fired.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ReasonCode {
    LiquidityRaidBuy,
    LiquidityRaidSell,
}

impl std::fmt::Display for ReasonCode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ReasonCode::LiquidityRaidBuy => write!(f, "LIQUIDITY_RAID_BUY"),
            ReasonCode::LiquidityRaidSell => write!(f, "LIQUIDITY_RAID_SELL"),
        }
    }
}

/// One-shot trade recommendation emitted by the detector.
///
/// Carries no identity and is never retried - each evaluation produces an
/// independent signal or none.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Signal {
    pub action: Side,
    pub price: f64,
    pub stop: f64,
    pub reason: ReasonCode,
    /// Open time of the candle that completed the pattern. Used by the scan
    /// loop as the one-trade-per-candle dedup key.
    pub timestamp: DateTime<Utc>,
}

/// Sweep & reclaim pattern matcher.
#[derive(Debug, Clone)]
pub struct SweepDetector {
    lookback: usize,
    stop_buffer: f64,
}

impl SweepDetector {
    /// `lookback` is the liquidity window size in candles; `stop_buffer` is
    /// added beyond the sweeping wick so spread noise cannot re-trigger the
    /// stop immediately.
    pub fn new(lookback: usize, stop_buffer: f64) -> Self {
        Self {
            lookback,
            stop_buffer,
        }
    }

    pub fn lookback(&self) -> usize {
        self.lookback
    }

    /// Evaluate the most recently closed candle.
    ///
    /// Returns the current liquidity window plus a signal if the candle
    /// completed a qualifying raid. Fewer than `lookback + 2` candles is the
    /// normal warm-up state: `(None, None)`, not an error.
    pub fn detect(&self, candles: &[Candle], trend_bias: i8) -> (Option<LiquidityWindow>, Option<Signal>) {
        if candles.len() < self.lookback + 2 {
            return (None, None);
        }
        let idx = candles.len() - 1;
        let window = self.window_at(candles, idx);
        let signal = self.evaluate_at(candles, idx, trend_bias);
        (window, signal)
    }

    /// Boolean signal-presence vector over an entire historical series.
    ///
    /// Each index is evaluated with the exact live-candle logic, seeing only
    /// strictly prior data, so the mask agrees bar-for-bar with `detect`.
    pub fn generate_mask(&self, candles: &[Candle], trend_bias: i8) -> Vec<bool> {
        self.generate_signals(candles, trend_bias)
            .iter()
            .map(|s| s.is_some())
            .collect()
    }

    /// Full signal vector over a historical series, for the backtest harness
    /// (which needs direction and stop, not just presence).
    pub fn generate_signals(&self, candles: &[Candle], trend_bias: i8) -> Vec<Option<Signal>> {
        (0..candles.len())
            .map(|idx| self.evaluate_at(candles, idx, trend_bias))
            .collect()
    }

    /// Liquidity window for the candle at `idx`, exclusive of that candle.
    fn window_at(&self, candles: &[Candle], idx: usize) -> Option<LiquidityWindow> {
        if idx < self.lookback {
            return None;
        }
        let window = &candles[idx - self.lookback..idx];
        let high_liq = window.iter().map(|c| c.high).fold(f64::MIN, f64::max);
        let low_liq = window.iter().map(|c| c.low).fold(f64::MAX, f64::min);
        Some(LiquidityWindow { high_liq, low_liq })
    }

    /// Check whether the candle at `idx` completed a sweep & reclaim.
    ///
    /// `trend_bias >= 0` permits BUY evaluation, `<= 0` permits SELL. BUY is
    /// checked first; the only case where both conditions could hold is a
    /// zero-width window swept both ways, and the buy-first order is the
    /// documented tie-break for it.
    fn evaluate_at(&self, candles: &[Candle], idx: usize, trend_bias: i8) -> Option<Signal> {
        // Need a full window before idx plus at least one candle before that,
        // matching the live warm-up precondition.
        if idx < self.lookback + 1 {
            return None;
        }
        let window = self.window_at(candles, idx)?;
        let current = &candles[idx];

        let range = current.range();
        if range <= 0.0 {
            return None;
        }

        // Bear trap: sellers swept below the range low, price reclaims and
        // closes bullish with the close in the top of its own range.
        if trend_bias >= 0
            && current.low < window.low_liq
            && current.close > window.low_liq
            && current.is_bullish()
        {
            let strength = (current.close - current.low) / range;
            if strength > MIN_CLOSE_STRENGTH {
                return Some(Signal {
                    action: Side::Buy,
                    price: current.close,
                    stop: current.low - self.stop_buffer,
                    reason: ReasonCode::LiquidityRaidBuy,
                    timestamp: current.open_time,
                });
            }
        }

        // Bull trap: buyers swept above the range high, price closes bearish
        // back inside with a rejection wick on top.
        if trend_bias <= 0
            && current.high > window.high_liq
            && current.close < window.high_liq
            && current.is_bearish()
        {
            let strength = (current.high - current.close) / range;
            if strength > MIN_CLOSE_STRENGTH {
                return Some(Signal {
                    action: Side::Sell,
                    price: current.close,
                    stop: current.high + self.stop_buffer,
                    reason: ReasonCode::LiquidityRaidSell,
                    timestamp: current.open_time,
                });
            }
        }

        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn candle(i: i64, open: f64, high: f64, low: f64, close: f64) -> Candle {
        Candle {
            open_time: Utc.timestamp_opt(1_700_000_000 + i * 900, 0).unwrap(),
            open,
            high,
            low,
            close,
            volume: 100,
        }
    }

    /// Gentle uptrend drifting 1 pip per candle, range 10 pips each.
    fn uptrend(n: usize) -> Vec<Candle> {
        (0..n as i64)
            .map(|i| {
                let base = 1.1000 + i as f64 * 0.0001;
                candle(i, base, base + 0.0010, base, base + 0.0008)
            })
            .collect()
    }

    #[test]
    fn test_warm_up_returns_nothing() {
        let det = SweepDetector::new(20, 0.0002);
        let candles = uptrend(21); // lookback + 1, one short of the minimum
        let (window, signal) = det.detect(&candles, 0);
        assert!(window.is_none());
        assert!(signal.is_none());
    }

    #[test]
    fn test_bullish_raid_fires_buy() {
        // Scenario A: 100-candle uptrend, lookback 20; last candle sweeps the
        // 20-bar low by 3 pips and closes bullish with strength 0.85.
        let mut candles = uptrend(100);
        let det = SweepDetector::new(20, 0.0002);

        let window_low = candles[79..99]
            .iter()
            .map(|c| c.low)
            .fold(f64::MAX, f64::min);
        let sweep_low = window_low - 0.0003;
        let range = 0.0020;
        // close at low + 0.85 * range -> strength 0.85
        let close = sweep_low + 0.85 * range;
        candles[99] = candle(99, sweep_low + 0.0001, sweep_low + range, sweep_low, close);

        let (window, signal) = det.detect(&candles, 0);
        let window = window.unwrap();
        assert!((window.low_liq - window_low).abs() < 1e-12);

        let signal = signal.expect("bullish raid should fire");
        assert_eq!(signal.action, Side::Buy);
        assert_eq!(signal.reason, ReasonCode::LiquidityRaidBuy);
        assert!((signal.price - close).abs() < 1e-12);
        // Stop beyond the sweeping wick plus the buffer.
        assert!((signal.stop - (sweep_low - 0.0002)).abs() < 1e-12);
    }

    #[test]
    fn test_weak_reclaim_is_rejected() {
        // Scenario B: same sweep but close strength 0.5.
        let mut candles = uptrend(100);
        let det = SweepDetector::new(20, 0.0002);

        let window_low = candles[79..99]
            .iter()
            .map(|c| c.low)
            .fold(f64::MAX, f64::min);
        let sweep_low = window_low - 0.0003;
        let range = 0.0020;
        let close = sweep_low + 0.5 * range;
        candles[99] = candle(99, sweep_low + 0.0001, sweep_low + range, sweep_low, close);

        let (_, signal) = det.detect(&candles, 0);
        assert!(signal.is_none());
    }

    #[test]
    fn test_bearish_raid_fires_sell() {
        let mut candles = uptrend(60);
        let det = SweepDetector::new(20, 0.0002);

        let window_high = candles[39..59]
            .iter()
            .map(|c| c.high)
            .fold(f64::MIN, f64::max);
        let sweep_high = window_high + 0.0004;
        let range = 0.0020;
        let close = sweep_high - 0.85 * range;
        candles[59] = candle(59, sweep_high - 0.0001, sweep_high, sweep_high - range, close);

        let (_, signal) = det.detect(&candles, 0);
        let signal = signal.expect("bearish raid should fire");
        assert_eq!(signal.action, Side::Sell);
        assert_eq!(signal.reason, ReasonCode::LiquidityRaidSell);
        assert!((signal.stop - (sweep_high + 0.0002)).abs() < 1e-12);
    }

    #[test]
    fn test_trend_bias_gates_direction() {
        let mut candles = uptrend(100);
        let det = SweepDetector::new(20, 0.0002);

        let window_low = candles[79..99]
            .iter()
            .map(|c| c.low)
            .fold(f64::MAX, f64::min);
        let sweep_low = window_low - 0.0003;
        candles[99] = candle(
            99,
            sweep_low + 0.0001,
            sweep_low + 0.0020,
            sweep_low,
            sweep_low + 0.0017,
        );

        // Bearish bias blocks the buy; neutral and bullish permit it.
        assert!(det.detect(&candles, -1).1.is_none());
        assert!(det.detect(&candles, 0).1.is_some());
        assert!(det.detect(&candles, 1).1.is_some());
    }

    #[test]
    fn test_window_excludes_evaluated_candle() {
        // P1: the evaluated candle's own extreme must not widen its window.
        let mut candles = uptrend(50);
        let det = SweepDetector::new(20, 0.0002);

        let window_low = candles[29..49]
            .iter()
            .map(|c| c.low)
            .fold(f64::MAX, f64::min);
        // Evaluated candle trades far below every prior low. If it leaked
        // into its own window, low_liq would equal its low and the sweep
        // condition (low < low_liq) could never hold.
        let sweep_low = window_low - 0.0050;
        candles[49] = candle(
            49,
            sweep_low + 0.0001,
            window_low + 0.0015,
            sweep_low,
            window_low + 0.0012,
        );

        let (window, _) = det.detect(&candles, 0);
        assert!((window.unwrap().low_liq - window_low).abs() < 1e-12);
    }

    #[test]
    fn test_live_batch_equivalence_random_series() {
        // P2: the batch mask agrees bar-for-bar with the live evaluator on
        // randomized data, for every valid prefix.
        use rand::{rngs::StdRng, Rng, SeedableRng};

        let mut rng = StdRng::seed_from_u64(42);
        let mut price = 1.1000;
        let candles: Vec<Candle> = (0..300)
            .map(|i| {
                let open = price;
                let drift: f64 = rng.gen_range(-0.0015..0.0015);
                let close = open + drift;
                let high = open.max(close) + rng.gen_range(0.0..0.0012);
                let low = open.min(close) - rng.gen_range(0.0..0.0012);
                price = close;
                candle(i, open, high, low, close)
            })
            .collect();

        for bias in [-1i8, 0, 1] {
            let det = SweepDetector::new(20, 0.0002);
            let mask = det.generate_mask(&candles, bias);
            assert_eq!(mask.len(), candles.len());

            for i in 0..candles.len() {
                let (_, live) = det.detect(&candles[..=i], bias);
                assert_eq!(
                    live.is_some(),
                    mask[i],
                    "live/batch disagree at index {} (bias {})",
                    i,
                    bias
                );
            }
        }
    }

    #[test]
    fn test_zero_range_candle_is_ignored() {
        let mut candles = uptrend(50);
        let det = SweepDetector::new(20, 0.0002);
        let flat = candles[48].close;
        candles[49] = candle(49, flat, flat, flat, flat);
        let (_, signal) = det.detect(&candles, 0);
        assert!(signal.is_none());
    }

    #[test]
    fn test_degenerate_window_tie_break_prefers_buy() {
        // Zero-width window (every candle flat at the same price). A bullish
        // candle sweeping both sides satisfies the buy leg; buy is evaluated
        // first by contract.
        let flat = 1.1000;
        let mut candles: Vec<Candle> =
            (0..22).map(|i| candle(i, flat, flat, flat, flat)).collect();
        candles[21] = candle(21, flat - 0.0001, flat + 0.0010, flat - 0.0010, flat + 0.0008);

        let det = SweepDetector::new(20, 0.0);
        let (window, signal) = det.detect(&candles, 0);
        let window = window.unwrap();
        assert!((window.high_liq - window.low_liq).abs() < 1e-12);
        assert_eq!(signal.unwrap().action, Side::Buy);
    }
}
