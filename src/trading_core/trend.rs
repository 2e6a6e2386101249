//! Higher-timeframe trend bias
//!
//! A simple EMA filter over structure-timeframe closes. The detector itself
//! has no cross-timeframe state; the bias is computed here and passed in.

/// Exponential moving average, seeded from the first value
/// (`ewm(adjust=false)` semantics). Returns `None` on an empty slice.
pub fn ema(values: &[f64], period: usize) -> Option<f64> {
    if values.is_empty() || period == 0 {
        return None;
    }
    let k = 2.0 / (period as f64 + 1.0);
    let mut ema = values[0];
    for v in &values[1..] {
        ema = v * k + ema * (1.0 - k);
    }
    Some(ema)
}

/// Directional bias from structure-timeframe closes.
///
/// Last close above the EMA permits buys only (+1), below permits sells
/// only (-1). With fewer closes than `period + 1` there is no reliable
/// structure read and the bias stays neutral (0, both directions allowed).
pub fn trend_bias(closes: &[f64], period: usize) -> i8 {
    if closes.len() <= period {
        return 0;
    }
    let Some(ema) = ema(closes, period) else {
        return 0;
    };
    let last = closes[closes.len() - 1];
    if last > ema {
        1
    } else {
        -1
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ema_constant_series() {
        let values = vec![1.1; 80];
        let ema = ema(&values, 50).unwrap();
        assert!((ema - 1.1).abs() < 1e-12);
    }

    #[test]
    fn test_rising_series_is_bullish() {
        let closes: Vec<f64> = (0..80).map(|i| 1.1000 + i as f64 * 0.001).collect();
        assert_eq!(trend_bias(&closes, 50), 1);
    }

    #[test]
    fn test_falling_series_is_bearish() {
        let closes: Vec<f64> = (0..80).map(|i| 1.2000 - i as f64 * 0.001).collect();
        assert_eq!(trend_bias(&closes, 50), -1);
    }

    #[test]
    fn test_short_history_is_neutral() {
        let closes: Vec<f64> = (0..50).map(|i| 1.1000 + i as f64 * 0.001).collect();
        assert_eq!(trend_bias(&closes, 50), 0);
    }
}
