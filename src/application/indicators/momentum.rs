//! Momentum/oscillator family: RSI, StochRSI, TSI, UO, Stoch, Williams %R,
//! AO, KAMA, ROC, PPO, STC, CCI, DPO, KST.

use super::math;
use super::moving_average::closes;
use crate::domain::candle::Candle;
use crate::domain::schemas::IndicatorValue;
use rust_decimal::prelude::ToPrimitive;
use std::collections::HashMap;

fn p(params: &HashMap<String, f64>, key: &str, default: f64) -> f64 {
    params.get(key).copied().unwrap_or(default)
}

fn highs(window: &[Candle]) -> Vec<f64> {
    window.iter().map(|c| c.high.to_f64().unwrap_or(0.0)).collect()
}

fn lows(window: &[Candle]) -> Vec<f64> {
    window.iter().map(|c| c.low.to_f64().unwrap_or(0.0)).collect()
}

fn volumes(window: &[Candle]) -> Vec<f64> {
    window.iter().map(|c| c.volume.to_f64().unwrap_or(0.0)).collect()
}

/// Wilder RSI: ratio of smoothed average gain to smoothed average loss.
pub fn rsi_series(values: &[f64], period: usize) -> Vec<f64> {
    let d = math::diff(values);
    let gains: Vec<f64> = d.iter().map(|x| if x.is_nan() { f64::NAN } else { x.max(0.0) }).collect();
    let losses: Vec<f64> = d.iter().map(|x| if x.is_nan() { f64::NAN } else { (-x).max(0.0) }).collect();
    // wilder_smooth needs a contiguous non-NaN slice; drop the leading NaN
    // from diff() by smoothing values[1..] and re-padding.
    let avg_gain = math::wilder_smooth(&gains[1..], period);
    let avg_loss = math::wilder_smooth(&losses[1..], period);
    let mut out = vec![f64::NAN; values.len()];
    for i in 0..avg_gain.len() {
        if avg_gain[i].is_nan() {
            continue;
        }
        out[i + 1] = if avg_loss[i] == 0.0 {
            100.0
        } else {
            let rs = avg_gain[i] / avg_loss[i];
            100.0 - 100.0 / (1.0 + rs)
        };
    }
    out
}

pub fn rsi(window: &[Candle], params: &HashMap<String, f64>) -> IndicatorValue {
    let period = p(params, "period", 14.0) as usize;
    IndicatorValue::Series(rsi_series(&closes(window), period))
}

pub fn stoch_rsi(window: &[Candle], params: &HashMap<String, f64>) -> IndicatorValue {
    let period = p(params, "period", 14.0) as usize;
    let k_period = p(params, "k_period", 3.0) as usize;
    let d_period = p(params, "d_period", 3.0) as usize;
    let rsi_vals = rsi_series(&closes(window), period);
    let lo = math::rolling_min(&rsi_vals, period);
    let hi = math::rolling_max(&rsi_vals, period);
    let stoch_rsi: Vec<f64> = rsi_vals
        .iter()
        .zip(lo.iter())
        .zip(hi.iter())
        .map(|((r, l), h)| {
            if r.is_nan() || l.is_nan() || h.is_nan() || (*h - *l) == 0.0 {
                f64::NAN
            } else {
                (r - l) / (h - l)
            }
        })
        .collect();
    let k = math::sma(&stoch_rsi, k_period);
    let d = math::sma(&k, d_period);
    let mut named = HashMap::new();
    named.insert("stoch_rsi".to_string(), stoch_rsi);
    named.insert("k".to_string(), k);
    named.insert("d".to_string(), d);
    IndicatorValue::Named(named)
}

/// True Strength Index: double-smoothed momentum over double-smoothed
/// absolute momentum.
pub fn tsi(window: &[Candle], params: &HashMap<String, f64>) -> IndicatorValue {
    let long = p(params, "long_period", 25.0) as usize;
    let short = p(params, "short_period", 13.0) as usize;
    let c = closes(window);
    let mom = math::diff(&c);
    let abs_mom: Vec<f64> = mom.iter().map(|v| v.abs()).collect();
    let smoothed_mom = double_ema(&mom, long, short);
    let smoothed_abs = double_ema(&abs_mom, long, short);
    let out = smoothed_mom
        .iter()
        .zip(smoothed_abs.iter())
        .map(|(m, a)| if *a == 0.0 || a.is_nan() { f64::NAN } else { 100.0 * m / a })
        .collect();
    IndicatorValue::Series(out)
}

fn double_ema(values: &[f64], long: usize, short: usize) -> Vec<f64> {
    let first = ema_skip_nan(values, long);
    ema_skip_nan(&first, short)
}

fn ema_skip_nan(values: &[f64], period: usize) -> Vec<f64> {
    let first_valid = values.iter().position(|v| !v.is_nan()).unwrap_or(values.len());
    let mut out = vec![f64::NAN; values.len()];
    if first_valid >= values.len() {
        return out;
    }
    let tail = math::ema(&values[first_valid..], period);
    out[first_valid..].copy_from_slice(&tail);
    out
}

/// Ultimate Oscillator over three lookback periods (default 7/14/28).
pub fn ultimate_oscillator(window: &[Candle], params: &HashMap<String, f64>) -> IndicatorValue {
    let p1 = p(params, "period1", 7.0) as usize;
    let p2 = p(params, "period2", 14.0) as usize;
    let p3 = p(params, "period3", 28.0) as usize;
    let h = highs(window);
    let l = lows(window);
    let c = closes(window);
    let tr = math::true_range(&h, &l, &c);
    let bp: Vec<f64> = (0..c.len())
        .map(|i| {
            let prev_close = if i == 0 { c[i] } else { c[i - 1] };
            c[i] - l[i].min(prev_close)
        })
        .collect();
    let avg = |period: usize| -> Vec<f64> {
        let bp_sum = rolling_sum(&bp, period);
        let tr_sum = rolling_sum(&tr, period);
        bp_sum
            .iter()
            .zip(tr_sum.iter())
            .map(|(b, t)| if t.is_nan() || *t == 0.0 { f64::NAN } else { b / t })
            .collect()
    };
    let a1 = avg(p1);
    let a2 = avg(p2);
    let a3 = avg(p3);
    let out = (0..c.len())
        .map(|i| {
            if a1[i].is_nan() || a2[i].is_nan() || a3[i].is_nan() {
                f64::NAN
            } else {
                100.0 * (4.0 * a1[i] + 2.0 * a2[i] + a3[i]) / 7.0
            }
        })
        .collect();
    IndicatorValue::Series(out)
}

fn rolling_sum(values: &[f64], period: usize) -> Vec<f64> {
    let mut out = vec![f64::NAN; values.len()];
    if period == 0 {
        return out;
    }
    for i in period - 1..values.len() {
        out[i] = values[i + 1 - period..=i].iter().sum();
    }
    out
}

/// Fast stochastic oscillator `{k, d}`.
pub fn stochastic(window: &[Candle], params: &HashMap<String, f64>) -> IndicatorValue {
    let period = p(params, "period", 14.0) as usize;
    let d_period = p(params, "d_period", 3.0) as usize;
    let h = highs(window);
    let l = lows(window);
    let c = closes(window);
    let hi = math::rolling_max(&h, period);
    let lo = math::rolling_min(&l, period);
    let k: Vec<f64> = c
        .iter()
        .zip(hi.iter())
        .zip(lo.iter())
        .map(|((close, h), l)| {
            if h.is_nan() || l.is_nan() || (*h - *l) == 0.0 {
                f64::NAN
            } else {
                100.0 * (close - l) / (h - l)
            }
        })
        .collect();
    let d = math::sma(&k, d_period);
    let mut named = HashMap::new();
    named.insert("k".to_string(), k);
    named.insert("d".to_string(), d);
    IndicatorValue::Named(named)
}

pub fn williams_r(window: &[Candle], params: &HashMap<String, f64>) -> IndicatorValue {
    let period = p(params, "period", 14.0) as usize;
    let h = highs(window);
    let l = lows(window);
    let c = closes(window);
    let hi = math::rolling_max(&h, period);
    let lo = math::rolling_min(&l, period);
    let out = c
        .iter()
        .zip(hi.iter())
        .zip(lo.iter())
        .map(|((close, h), l)| {
            if h.is_nan() || l.is_nan() || (*h - *l) == 0.0 {
                f64::NAN
            } else {
                -100.0 * (h - close) / (h - l)
            }
        })
        .collect();
    IndicatorValue::Series(out)
}

/// Awesome Oscillator: SMA(5) - SMA(34) of the median price.
pub fn awesome_oscillator(window: &[Candle], _params: &HashMap<String, f64>) -> IndicatorValue {
    let h = highs(window);
    let l = lows(window);
    let median: Vec<f64> = h.iter().zip(l.iter()).map(|(h, l)| (h + l) / 2.0).collect();
    let fast = math::sma(&median, 5);
    let slow = math::sma(&median, 34);
    let out = fast
        .iter()
        .zip(slow.iter())
        .map(|(f, s)| if f.is_nan() || s.is_nan() { f64::NAN } else { f - s })
        .collect();
    IndicatorValue::Series(out)
}

/// Kaufman Adaptive Moving Average.
pub fn kama(window: &[Candle], params: &HashMap<String, f64>) -> IndicatorValue {
    let period = p(params, "period", 10.0) as usize;
    let fast = p(params, "fast", 2.0);
    let slow = p(params, "slow", 30.0);
    let c = closes(window);
    let mut out = vec![f64::NAN; c.len()];
    if c.len() <= period {
        return IndicatorValue::Series(out);
    }
    let fast_sc = 2.0 / (fast + 1.0);
    let slow_sc = 2.0 / (slow + 1.0);
    out[period] = c[period];
    for i in (period + 1)..c.len() {
        let change = (c[i] - c[i - period]).abs();
        let volatility: f64 = (i - period + 1..=i).map(|j| (c[j] - c[j - 1]).abs()).sum();
        let er = if volatility == 0.0 { 0.0 } else { change / volatility };
        let sc = (er * (fast_sc - slow_sc) + slow_sc).powi(2);
        out[i] = out[i - 1] + sc * (c[i] - out[i - 1]);
    }
    IndicatorValue::Series(out)
}

pub fn roc(window: &[Candle], params: &HashMap<String, f64>) -> IndicatorValue {
    let period = p(params, "period", 12.0) as usize;
    IndicatorValue::Series(math::roc(&closes(window), period))
}

/// Percentage Price Oscillator `{line, signal, hist}`.
pub fn ppo(window: &[Candle], params: &HashMap<String, f64>) -> IndicatorValue {
    let fast = p(params, "fast", 12.0) as usize;
    let slow = p(params, "slow", 26.0) as usize;
    let signal_period = p(params, "signal", 9.0) as usize;
    percentage_oscillator(&closes(window), fast, slow, signal_period)
}

fn percentage_oscillator(values: &[f64], fast: usize, slow: usize, signal_period: usize) -> IndicatorValue {
    let ema_fast = math::ema(values, fast);
    let ema_slow = math::ema(values, slow);
    let line: Vec<f64> = ema_fast
        .iter()
        .zip(ema_slow.iter())
        .map(|(f, s)| if f.is_nan() || s.is_nan() || *s == 0.0 { f64::NAN } else { 100.0 * (f - s) / s })
        .collect();
    let signal = ema_skip_nan(&line, signal_period);
    let hist: Vec<f64> = line
        .iter()
        .zip(signal.iter())
        .map(|(l, s)| if l.is_nan() || s.is_nan() { f64::NAN } else { l - s })
        .collect();
    let mut named = HashMap::new();
    named.insert("line".to_string(), line);
    named.insert("signal".to_string(), signal);
    named.insert("hist".to_string(), hist);
    IndicatorValue::Named(named)
}

/// Percentage Volume Oscillator: PPO computed on volume instead of price.
pub fn pvo(window: &[Candle], params: &HashMap<String, f64>) -> IndicatorValue {
    let fast = p(params, "fast", 12.0) as usize;
    let slow = p(params, "slow", 26.0) as usize;
    let signal_period = p(params, "signal", 9.0) as usize;
    percentage_oscillator(&volumes(window), fast, slow, signal_period)
}

/// Commodity Channel Index.
pub fn cci(window: &[Candle], params: &HashMap<String, f64>) -> IndicatorValue {
    let period = p(params, "period", 20.0) as usize;
    let h = highs(window);
    let l = lows(window);
    let c = closes(window);
    let tp: Vec<f64> = (0..c.len()).map(|i| (h[i] + l[i] + c[i]) / 3.0).collect();
    let sma_tp = math::sma(&tp, period);
    let mut out = vec![f64::NAN; tp.len()];
    for i in period - 1..tp.len() {
        if sma_tp[i].is_nan() {
            continue;
        }
        let window_tp = &tp[i + 1 - period..=i];
        let mean_dev = window_tp.iter().map(|v| (v - sma_tp[i]).abs()).sum::<f64>() / period as f64;
        out[i] = if mean_dev == 0.0 { 0.0 } else { (tp[i] - sma_tp[i]) / (0.015 * mean_dev) };
    }
    IndicatorValue::Series(out)
}

/// Detrended Price Oscillator.
pub fn dpo(window: &[Candle], params: &HashMap<String, f64>) -> IndicatorValue {
    let period = p(params, "period", 20.0) as usize;
    let shift = period / 2 + 1;
    let c = closes(window);
    let sma_vals = math::sma(&c, period);
    let mut out = vec![f64::NAN; c.len()];
    for i in shift..c.len() {
        if sma_vals[i].is_nan() {
            continue;
        }
        out[i] = c[i - shift] - sma_vals[i];
    }
    IndicatorValue::Series(out)
}

/// Know Sure Thing: weighted sum of four SMA-smoothed ROC curves, plus a
/// 9-period signal line.
pub fn kst(window: &[Candle], _params: &HashMap<String, f64>) -> IndicatorValue {
    let c = closes(window);
    let roc1 = math::roc(&c, 10);
    let roc2 = math::roc(&c, 15);
    let roc3 = math::roc(&c, 20);
    let roc4 = math::roc(&c, 30);
    let s1 = math::sma(&roc1, 10);
    let s2 = math::sma(&roc2, 10);
    let s3 = math::sma(&roc3, 10);
    let s4 = math::sma(&roc4, 15);
    let kst: Vec<f64> = (0..c.len())
        .map(|i| {
            if s1[i].is_nan() || s2[i].is_nan() || s3[i].is_nan() || s4[i].is_nan() {
                f64::NAN
            } else {
                s1[i] * 1.0 + s2[i] * 2.0 + s3[i] * 3.0 + s4[i] * 4.0
            }
        })
        .collect();
    let signal = ema_skip_nan(&kst, 9);
    let mut named = HashMap::new();
    named.insert("kst".to_string(), kst);
    named.insert("signal".to_string(), signal);
    IndicatorValue::Named(named)
}

/// Schaff Trend Cycle: a double-stochastic smoothing of the MACD line.
pub fn stc(window: &[Candle], params: &HashMap<String, f64>) -> IndicatorValue {
    let fast = p(params, "fast", 23.0) as usize;
    let slow = p(params, "slow", 50.0) as usize;
    let cycle = p(params, "cycle", 10.0) as usize;
    let c = closes(window);
    let macd_line: Vec<f64> = math::ema(&c, fast)
        .iter()
        .zip(math::ema(&c, slow).iter())
        .map(|(f, s)| if f.is_nan() || s.is_nan() { f64::NAN } else { f - s })
        .collect();
    let k1 = stochastic_of(&macd_line, cycle);
    let d1 = ema_skip_nan(&k1, 3);
    let k2 = stochastic_of(&d1, cycle);
    let d2 = ema_skip_nan(&k2, 3);
    let out = d2.iter().map(|v| if v.is_nan() { f64::NAN } else { v * 100.0 }).collect();
    IndicatorValue::Series(out)
}

fn stochastic_of(values: &[f64], period: usize) -> Vec<f64> {
    let hi = math::rolling_max(values, period);
    let lo = math::rolling_min(values, period);
    values
        .iter()
        .zip(hi.iter())
        .zip(lo.iter())
        .map(|((v, h), l)| {
            if v.is_nan() || h.is_nan() || l.is_nan() || (*h - *l) == 0.0 {
                f64::NAN
            } else {
                (v - l) / (h - l)
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::timeframe::Timeframe;
    use chrono::{TimeZone, Utc};
    use rust_decimal::Decimal;
    use rust_decimal_macros::dec;

    fn candle(i: i64, close: f64, high: f64, low: f64, volume: f64) -> Candle {
        Candle {
            symbol: "AAPL".into(),
            timeframe: Timeframe::M1,
            bucket_start: Utc.timestamp_opt(1_700_000_000 + i * 60, 0).unwrap(),
            open: Decimal::try_from(close).unwrap(),
            high: Decimal::try_from(high).unwrap(),
            low: Decimal::try_from(low).unwrap(),
            close: Decimal::try_from(close).unwrap(),
            volume: Decimal::try_from(volume).unwrap_or(dec!(0)),
            vwap: Decimal::try_from(close).unwrap(),
            tick_count: 1,
        }
    }

    fn rising_window(n: usize) -> Vec<Candle> {
        (0..n as i64)
            .map(|i| candle(i, 100.0 + i as f64, 101.0 + i as f64, 99.0 + i as f64, 1000.0))
            .collect()
    }

    #[test]
    fn rsi_is_100_for_a_strictly_rising_series() {
        let window = rising_window(30);
        let value = rsi(&window, &HashMap::new());
        match value {
            IndicatorValue::Series(series) => {
                assert!(series[29].is_finite());
                assert!((series[29] - 100.0).abs() < 1e-6);
            }
            _ => panic!("expected series"),
        }
    }

    #[test]
    fn stoch_rsi_returns_named_triplet() {
        let window = rising_window(40);
        let value = stoch_rsi(&window, &HashMap::new());
        match value {
            IndicatorValue::Named(map) => {
                assert!(map.contains_key("stoch_rsi"));
                assert!(map.contains_key("k"));
                assert!(map.contains_key("d"));
            }
            _ => panic!("expected named"),
        }
    }

    #[test]
    fn williams_r_is_bounded_between_minus_100_and_0() {
        let window = rising_window(30);
        let value = williams_r(&window, &HashMap::new());
        if let IndicatorValue::Series(series) = value {
            for v in series.iter().filter(|v| !v.is_nan()) {
                assert!(*v <= 0.0 && *v >= -100.0);
            }
        }
    }

    #[test]
    fn ppo_hist_is_line_minus_signal() {
        let window = rising_window(60);
        let value = ppo(&window, &HashMap::new());
        if let IndicatorValue::Named(map) = value {
            let line = &map["line"];
            let signal = &map["signal"];
            let hist = &map["hist"];
            for i in 0..line.len() {
                if !line[i].is_nan() && !signal[i].is_nan() {
                    assert!((hist[i] - (line[i] - signal[i])).abs() < 1e-9);
                }
            }
        }
    }
}
