//! Shared numeric helpers for the indicator catalog (component C6).
//!
//! Every series-producing helper returns a `Vec<f64>` the same length as
//! its input, with [`f64::NAN`] in prefix positions that don't yet have
//! enough history — the "natural unknown sentinel" spec §4.5 requires
//! instead of an error. Grounded on the rolling-window arithmetic in
//! `application/feature_engineering_service.rs`, generalized from the
//! `ta` crate's single-value `Next` step to whole-window recompute so a
//! fresh call is always numerically identical to a from-scratch replay.

pub fn sma(values: &[f64], period: usize) -> Vec<f64> {
    let mut out = vec![f64::NAN; values.len()];
    if period == 0 {
        return out;
    }
    for i in period - 1..values.len() {
        let window = &values[i + 1 - period..=i];
        out[i] = window.iter().sum::<f64>() / period as f64;
    }
    out
}

pub fn ema(values: &[f64], period: usize) -> Vec<f64> {
    let mut out = vec![f64::NAN; values.len()];
    if period == 0 || values.len() < period {
        return out;
    }
    let k = 2.0 / (period as f64 + 1.0);
    let seed: f64 = values[..period].iter().sum::<f64>() / period as f64;
    out[period - 1] = seed;
    let mut prev = seed;
    for i in period..values.len() {
        let next = values[i] * k + prev * (1.0 - k);
        out[i] = next;
        prev = next;
    }
    out
}

pub fn wma(values: &[f64], period: usize) -> Vec<f64> {
    let mut out = vec![f64::NAN; values.len()];
    if period == 0 {
        return out;
    }
    let denom = (period * (period + 1) / 2) as f64;
    for i in period - 1..values.len() {
        let window = &values[i + 1 - period..=i];
        let weighted: f64 = window
            .iter()
            .enumerate()
            .map(|(j, v)| v * (j as f64 + 1.0))
            .sum();
        out[i] = weighted / denom;
    }
    out
}

/// Wilder's smoothing (used by RSI, ADX, ATR, MFI in their classic form):
/// seed with a simple average of the first `period` values, then
/// `prev * (period - 1) / period + value / period`.
pub fn wilder_smooth(values: &[f64], period: usize) -> Vec<f64> {
    let mut out = vec![f64::NAN; values.len()];
    if period == 0 || values.len() < period {
        return out;
    }
    let seed: f64 = values[..period].iter().sum::<f64>() / period as f64;
    out[period - 1] = seed;
    let mut prev = seed;
    for i in period..values.len() {
        let next = (prev * (period as f64 - 1.0) + values[i]) / period as f64;
        out[i] = next;
        prev = next;
    }
    out
}

pub fn stdev(values: &[f64], period: usize) -> Vec<f64> {
    let mut out = vec![f64::NAN; values.len()];
    if period == 0 {
        return out;
    }
    for i in period - 1..values.len() {
        let window = &values[i + 1 - period..=i];
        let mean = window.iter().sum::<f64>() / period as f64;
        let variance = window.iter().map(|v| (v - mean).powi(2)).sum::<f64>() / period as f64;
        out[i] = variance.sqrt();
    }
    out
}

pub fn rolling_max(values: &[f64], period: usize) -> Vec<f64> {
    let mut out = vec![f64::NAN; values.len()];
    if period == 0 {
        return out;
    }
    for i in period - 1..values.len() {
        out[i] = values[i + 1 - period..=i]
            .iter()
            .cloned()
            .fold(f64::NEG_INFINITY, f64::max);
    }
    out
}

pub fn rolling_min(values: &[f64], period: usize) -> Vec<f64> {
    let mut out = vec![f64::NAN; values.len()];
    if period == 0 {
        return out;
    }
    for i in period - 1..values.len() {
        out[i] = values[i + 1 - period..=i]
            .iter()
            .cloned()
            .fold(f64::INFINITY, f64::min);
    }
    out
}

/// True range: `max(high-low, |high-prev_close|, |low-prev_close|)`. The
/// first bar has no previous close, so true range degenerates to
/// `high-low` there (spec §4.6's ATR formula has the same edge case).
pub fn true_range(high: &[f64], low: &[f64], close: &[f64]) -> Vec<f64> {
    let mut out = vec![0.0; high.len()];
    for i in 0..high.len() {
        if i == 0 {
            out[i] = high[i] - low[i];
        } else {
            out[i] = (high[i] - low[i])
                .max((high[i] - close[i - 1]).abs())
                .max((low[i] - close[i - 1]).abs());
        }
    }
    out
}

pub fn atr(high: &[f64], low: &[f64], close: &[f64], period: usize) -> Vec<f64> {
    let tr = true_range(high, low, close);
    wilder_smooth(&tr, period)
}

pub fn roc(values: &[f64], period: usize) -> Vec<f64> {
    let mut out = vec![f64::NAN; values.len()];
    for i in period..values.len() {
        let prev = values[i - period];
        if prev != 0.0 {
            out[i] = (values[i] - prev) / prev * 100.0;
        }
    }
    out
}

pub fn diff(values: &[f64]) -> Vec<f64> {
    let mut out = vec![f64::NAN; values.len()];
    for i in 1..values.len() {
        out[i] = values[i] - values[i - 1];
    }
    out
}

pub fn sub(a: &[f64], b: &[f64]) -> Vec<f64> {
    a.iter().zip(b).map(|(x, y)| x - y).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sma_has_nan_prefix_then_rolling_average() {
        let values = [1.0, 2.0, 3.0, 4.0, 5.0];
        let out = sma(&values, 3);
        assert!(out[0].is_nan());
        assert!(out[1].is_nan());
        assert_eq!(out[2], 2.0);
        assert_eq!(out[3], 3.0);
        assert_eq!(out[4], 4.0);
    }

    #[test]
    fn ema_seeds_with_sma_then_smooths() {
        let values = [1.0, 2.0, 3.0, 4.0, 5.0];
        let out = ema(&values, 3);
        assert!(out[1].is_nan());
        assert_eq!(out[2], 2.0);
        assert!(out[3] > 2.0 && out[3] < 4.0);
    }

    #[test]
    fn true_range_uses_high_low_on_first_bar() {
        let high = [10.0, 12.0];
        let low = [8.0, 9.0];
        let close = [9.0, 11.0];
        let tr = true_range(&high, &low, &close);
        assert_eq!(tr[0], 2.0);
        assert_eq!(tr[1], (12.0f64 - 9.0).max((12.0f64 - 9.0).abs()).max((9.0f64 - 9.0).abs()));
    }

    #[test]
    fn roc_is_nan_before_period_elapses() {
        let values = [10.0, 11.0, 12.0, 15.0];
        let out = roc(&values, 2);
        assert!(out[0].is_nan());
        assert!(out[1].is_nan());
        assert_eq!(out[2], 20.0);
    }
}
