//! Trend family: MACD, ADX, Aroon, Vortex, TRIX, Mass Index, Ichimoku,
//! Parabolic SAR.

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

pub fn macd(window: &[Candle], params: &HashMap<String, f64>) -> IndicatorValue {
    let fast = p(params, "fast", 12.0) as usize;
    let slow = p(params, "slow", 26.0) as usize;
    let signal_period = p(params, "signal", 9.0) as usize;
    let c = closes(window);
    let ema_fast = math::ema(&c, fast);
    let ema_slow = math::ema(&c, slow);
    let macd_line: Vec<f64> = ema_fast
        .iter()
        .zip(ema_slow.iter())
        .map(|(f, s)| if f.is_nan() || s.is_nan() { f64::NAN } else { f - s })
        .collect();
    let signal = ema_skip_nan(&macd_line, signal_period);
    let diff: Vec<f64> = macd_line
        .iter()
        .zip(signal.iter())
        .map(|(m, s)| if m.is_nan() || s.is_nan() { f64::NAN } else { m - s })
        .collect();
    let mut named = HashMap::new();
    named.insert("macd".to_string(), macd_line);
    named.insert("signal".to_string(), signal);
    named.insert("diff".to_string(), diff);
    IndicatorValue::Named(named)
}

/// Average Directional Index, with the directional indicators it is
/// built from.
pub fn adx(window: &[Candle], params: &HashMap<String, f64>) -> IndicatorValue {
    let period = p(params, "period", 14.0) as usize;
    let h = highs(window);
    let l = lows(window);
    let c = closes(window);
    let n = h.len();

    let mut plus_dm = vec![0.0; n];
    let mut minus_dm = vec![0.0; n];
    for i in 1..n {
        let up_move = h[i] - h[i - 1];
        let down_move = l[i - 1] - l[i];
        plus_dm[i] = if up_move > down_move && up_move > 0.0 { up_move } else { 0.0 };
        minus_dm[i] = if down_move > up_move && down_move > 0.0 { down_move } else { 0.0 };
    }
    let tr = math::true_range(&h, &l, &c);
    let smoothed_tr = math::wilder_smooth(&tr, period);
    let smoothed_plus = math::wilder_smooth(&plus_dm, period);
    let smoothed_minus = math::wilder_smooth(&minus_dm, period);

    let plus_di: Vec<f64> = smoothed_plus
        .iter()
        .zip(smoothed_tr.iter())
        .map(|(p, t)| if t.is_nan() || *t == 0.0 { f64::NAN } else { 100.0 * p / t })
        .collect();
    let minus_di: Vec<f64> = smoothed_minus
        .iter()
        .zip(smoothed_tr.iter())
        .map(|(m, t)| if t.is_nan() || *t == 0.0 { f64::NAN } else { 100.0 * m / t })
        .collect();
    let dx: Vec<f64> = plus_di
        .iter()
        .zip(minus_di.iter())
        .map(|(p, m)| {
            if p.is_nan() || m.is_nan() || (p + m) == 0.0 {
                f64::NAN
            } else {
                100.0 * (p - m).abs() / (p + m)
            }
        })
        .collect();
    let adx = ema_skip_nan(&dx, period);

    let mut named = HashMap::new();
    named.insert("adx".to_string(), adx);
    named.insert("+di".to_string(), plus_di);
    named.insert("-di".to_string(), minus_di);
    IndicatorValue::Named(named)
}

/// Aroon `{up, down, indicator}`: how many bars since the period's
/// highest high / lowest low.
pub fn aroon(window: &[Candle], params: &HashMap<String, f64>) -> IndicatorValue {
    let period = p(params, "period", 25.0) as usize;
    let h = highs(window);
    let l = lows(window);
    let n = h.len();
    let mut up = vec![f64::NAN; n];
    let mut down = vec![f64::NAN; n];
    if period == 0 {
        return IndicatorValue::Named(HashMap::new());
    }
    for i in period..n {
        let win_h = &h[i - period..=i];
        let win_l = &l[i - period..=i];
        let since_high = win_h
            .iter()
            .enumerate()
            .max_by(|a, b| a.1.partial_cmp(b.1).unwrap())
            .map(|(idx, _)| period - idx)
            .unwrap_or(period);
        let since_low = win_l
            .iter()
            .enumerate()
            .min_by(|a, b| a.1.partial_cmp(b.1).unwrap())
            .map(|(idx, _)| period - idx)
            .unwrap_or(period);
        up[i] = 100.0 * (period as f64 - since_high as f64) / period as f64;
        down[i] = 100.0 * (period as f64 - since_low as f64) / period as f64;
    }
    let indicator: Vec<f64> = up
        .iter()
        .zip(down.iter())
        .map(|(u, d)| if u.is_nan() || d.is_nan() { f64::NAN } else { u - d })
        .collect();
    let mut named = HashMap::new();
    named.insert("up".to_string(), up);
    named.insert("down".to_string(), down);
    named.insert("indicator".to_string(), indicator);
    IndicatorValue::Named(named)
}

/// Vortex Indicator `{+, -}`.
pub fn vortex(window: &[Candle], params: &HashMap<String, f64>) -> IndicatorValue {
    let period = p(params, "period", 14.0) as usize;
    let h = highs(window);
    let l = lows(window);
    let c = closes(window);
    let n = h.len();
    let mut vm_plus = vec![0.0; n];
    let mut vm_minus = vec![0.0; n];
    for i in 1..n {
        vm_plus[i] = (h[i] - l[i - 1]).abs();
        vm_minus[i] = (l[i] - h[i - 1]).abs();
    }
    let tr = math::true_range(&h, &l, &c);
    let sum_vm_plus = rolling_sum(&vm_plus, period);
    let sum_vm_minus = rolling_sum(&vm_minus, period);
    let sum_tr = rolling_sum(&tr, period);
    let vi_plus: Vec<f64> = sum_vm_plus
        .iter()
        .zip(sum_tr.iter())
        .map(|(v, t)| if t.is_nan() || *t == 0.0 { f64::NAN } else { v / t })
        .collect();
    let vi_minus: Vec<f64> = sum_vm_minus
        .iter()
        .zip(sum_tr.iter())
        .map(|(v, t)| if t.is_nan() || *t == 0.0 { f64::NAN } else { v / t })
        .collect();
    let mut named = HashMap::new();
    named.insert("+".to_string(), vi_plus);
    named.insert("-".to_string(), vi_minus);
    IndicatorValue::Named(named)
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

/// Triple-smoothed EMA rate of change.
pub fn trix(window: &[Candle], params: &HashMap<String, f64>) -> IndicatorValue {
    let period = p(params, "period", 15.0) as usize;
    let c = closes(window);
    let e1 = ema_skip_nan(&c, period);
    let e2 = ema_skip_nan(&e1, period);
    let e3 = ema_skip_nan(&e2, period);
    let mut out = vec![f64::NAN; c.len()];
    for i in 1..c.len() {
        if e3[i].is_nan() || e3[i - 1].is_nan() || e3[i - 1] == 0.0 {
            continue;
        }
        out[i] = (e3[i] - e3[i - 1]) / e3[i - 1] * 100.0;
    }
    IndicatorValue::Series(out)
}

/// Mass Index: ratio of a single- to double-smoothed high-low range,
/// summed over 25 bars.
pub fn mass_index(window: &[Candle], params: &HashMap<String, f64>) -> IndicatorValue {
    let ema_period = p(params, "ema_period", 9.0) as usize;
    let sum_period = p(params, "sum_period", 25.0) as usize;
    let h = highs(window);
    let l = lows(window);
    let range: Vec<f64> = h.iter().zip(l.iter()).map(|(h, l)| h - l).collect();
    let single = math::ema(&range, ema_period);
    let double = ema_skip_nan(&single, ema_period);
    let ratio: Vec<f64> = single
        .iter()
        .zip(double.iter())
        .map(|(s, d)| if s.is_nan() || d.is_nan() || *d == 0.0 { f64::NAN } else { s / d })
        .collect();
    let mut out = vec![f64::NAN; ratio.len()];
    for i in sum_period - 1..ratio.len() {
        let w = &ratio[i + 1 - sum_period..=i];
        if w.iter().any(|v| v.is_nan()) {
            continue;
        }
        out[i] = w.iter().sum();
    }
    IndicatorValue::Series(out)
}

/// Ichimoku Kinko Hyo `{a, b, base, conversion}`. Senkou spans A/B are
/// reported at their own bar index rather than displaced 26 bars
/// forward, so every series stays aligned to the requesting window.
pub fn ichimoku(window: &[Candle], params: &HashMap<String, f64>) -> IndicatorValue {
    let conversion_period = p(params, "conversion_period", 9.0) as usize;
    let base_period = p(params, "base_period", 26.0) as usize;
    let span_b_period = p(params, "span_b_period", 52.0) as usize;
    let h = highs(window);
    let l = lows(window);
    let midpoint = |period: usize| -> Vec<f64> {
        let hi = math::rolling_max(&h, period);
        let lo = math::rolling_min(&l, period);
        hi.iter().zip(lo.iter()).map(|(h, l)| (h + l) / 2.0).collect()
    };
    let conversion = midpoint(conversion_period);
    let base = midpoint(base_period);
    let span_b = midpoint(span_b_period);
    let span_a: Vec<f64> = conversion
        .iter()
        .zip(base.iter())
        .map(|(c, b)| if c.is_nan() || b.is_nan() { f64::NAN } else { (c + b) / 2.0 })
        .collect();
    let mut named = HashMap::new();
    named.insert("a".to_string(), span_a);
    named.insert("b".to_string(), span_b);
    named.insert("base".to_string(), base);
    named.insert("conversion".to_string(), conversion);
    IndicatorValue::Named(named)
}

/// Parabolic SAR `{psar, up, down}`: `up`/`down` carry the SAR value only
/// on bars in that trend (NaN otherwise), matching how charting
/// libraries split the series for two-color rendering.
pub fn psar(window: &[Candle], params: &HashMap<String, f64>) -> IndicatorValue {
    let af_step = p(params, "af_step", 0.02);
    let af_max = p(params, "af_max", 0.2);
    let h = highs(window);
    let l = lows(window);
    let n = h.len();
    let mut psar = vec![f64::NAN; n];
    let mut up = vec![f64::NAN; n];
    let mut down = vec![f64::NAN; n];
    if n < 2 {
        return named_psar(psar, up, down);
    }

    let mut rising = h[1] >= h[0];
    let mut af = af_step;
    let mut ep = if rising { h[0] } else { l[0] };
    let mut sar = if rising { l[0] } else { h[0] };
    psar[0] = sar;

    for i in 1..n {
        sar = sar + af * (ep - sar);
        if rising {
            sar = sar.min(l[i - 1]).min(if i >= 2 { l[i - 2] } else { l[i - 1] });
            if l[i] < sar {
                rising = false;
                sar = ep;
                ep = l[i];
                af = af_step;
            } else {
                if h[i] > ep {
                    ep = h[i];
                    af = (af + af_step).min(af_max);
                }
            }
        } else {
            sar = sar.max(h[i - 1]).max(if i >= 2 { h[i - 2] } else { h[i - 1] });
            if h[i] > sar {
                rising = true;
                sar = ep;
                ep = h[i];
                af = af_step;
            } else {
                if l[i] < ep {
                    ep = l[i];
                    af = (af + af_step).min(af_max);
                }
            }
        }
        psar[i] = sar;
        if rising {
            up[i] = sar;
        } else {
            down[i] = sar;
        }
    }
    named_psar(psar, up, down)
}

fn named_psar(psar: Vec<f64>, up: Vec<f64>, down: Vec<f64>) -> IndicatorValue {
    let mut named = HashMap::new();
    named.insert("psar".to_string(), psar);
    named.insert("up".to_string(), up);
    named.insert("down".to_string(), down);
    IndicatorValue::Named(named)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::timeframe::Timeframe;
    use chrono::{TimeZone, Utc};
    use rust_decimal::Decimal;
    use rust_decimal_macros::dec;

    fn candle(i: i64, close: f64, high: f64, low: f64) -> Candle {
        Candle {
            symbol: "AAPL".into(),
            timeframe: Timeframe::M1,
            bucket_start: Utc.timestamp_opt(1_700_000_000 + i * 60, 0).unwrap(),
            open: Decimal::try_from(close).unwrap(),
            high: Decimal::try_from(high).unwrap(),
            low: Decimal::try_from(low).unwrap(),
            close: Decimal::try_from(close).unwrap(),
            volume: dec!(1000),
            vwap: Decimal::try_from(close).unwrap(),
            tick_count: 1,
        }
    }

    fn rising_window(n: usize) -> Vec<Candle> {
        (0..n as i64)
            .map(|i| candle(i, 100.0 + i as f64, 101.0 + i as f64, 99.0 + i as f64))
            .collect()
    }

    #[test]
    fn macd_diff_is_macd_minus_signal() {
        let window = rising_window(60);
        if let IndicatorValue::Named(map) = macd(&window, &HashMap::new()) {
            let m = &map["macd"];
            let s = &map["signal"];
            let d = &map["diff"];
            for i in 0..m.len() {
                if !m[i].is_nan() && !s[i].is_nan() {
                    assert!((d[i] - (m[i] - s[i])).abs() < 1e-9);
                }
            }
        } else {
            panic!("expected named");
        }
    }

    #[test]
    fn adx_plus_di_dominates_in_a_steady_uptrend() {
        let window = rising_window(60);
        if let IndicatorValue::Named(map) = adx(&window, &HashMap::new()) {
            let plus = &map["+di"];
            let minus = &map["-di"];
            let last = plus.len() - 1;
            assert!(plus[last] > minus[last]);
        } else {
            panic!("expected named");
        }
    }

    #[test]
    fn aroon_up_is_100_at_a_fresh_high() {
        let window = rising_window(30);
        if let IndicatorValue::Named(map) = aroon(&window, &HashMap::new()) {
            let up = &map["up"];
            assert_eq!(*up.last().unwrap(), 100.0);
        } else {
            panic!("expected named");
        }
    }

    #[test]
    fn psar_flips_direction_after_a_sharp_reversal() {
        let mut window = rising_window(20);
        for i in 0..10 {
            window.push(candle(20 + i, 120.0 - i as f64 * 3.0, 121.0 - i as f64 * 3.0, 100.0 - i as f64 * 3.0));
        }
        if let IndicatorValue::Named(map) = psar(&window, &HashMap::new()) {
            let down = &map["down"];
            assert!(down.iter().any(|v| v.is_finite()));
        } else {
            panic!("expected named");
        }
    }
}
