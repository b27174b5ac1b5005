//! Volume family: MFI, ADI (Accumulation/Distribution), OBV, CMF, Force
//! Index, Ease of Movement, VPT, NVI, cumulative VWAP.

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

fn typical_price(h: &[f64], l: &[f64], c: &[f64]) -> Vec<f64> {
    (0..c.len()).map(|i| (h[i] + l[i] + c[i]) / 3.0).collect()
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

/// Money Flow Index.
pub fn mfi(window: &[Candle], params: &HashMap<String, f64>) -> IndicatorValue {
    let period = p(params, "period", 14.0) as usize;
    let h = highs(window);
    let l = lows(window);
    let c = closes(window);
    let v = volumes(window);
    let tp = typical_price(&h, &l, &c);
    let raw: Vec<f64> = tp.iter().zip(v.iter()).map(|(t, v)| t * v).collect();
    let n = tp.len();
    let mut pos_flow = vec![0.0; n];
    let mut neg_flow = vec![0.0; n];
    for i in 1..n {
        if tp[i] > tp[i - 1] {
            pos_flow[i] = raw[i];
        } else if tp[i] < tp[i - 1] {
            neg_flow[i] = raw[i];
        }
    }
    let pos_sum = rolling_sum(&pos_flow, period);
    let neg_sum = rolling_sum(&neg_flow, period);
    let out = pos_sum
        .iter()
        .zip(neg_sum.iter())
        .map(|(pos, neg)| {
            if pos.is_nan() || neg.is_nan() {
                f64::NAN
            } else if *neg == 0.0 {
                100.0
            } else {
                let ratio = pos / neg;
                100.0 - 100.0 / (1.0 + ratio)
            }
        })
        .collect();
    IndicatorValue::Series(out)
}

/// Money flow multiplier × volume, used by both ADI and CMF.
fn money_flow_volume(window: &[Candle]) -> Vec<f64> {
    let h = highs(window);
    let l = lows(window);
    let c = closes(window);
    let v = volumes(window);
    (0..c.len())
        .map(|i| {
            let range = h[i] - l[i];
            if range == 0.0 {
                0.0
            } else {
                (((c[i] - l[i]) - (h[i] - c[i])) / range) * v[i]
            }
        })
        .collect()
}

/// Accumulation/Distribution Line: cumulative money flow volume.
pub fn adi(window: &[Candle], _params: &HashMap<String, f64>) -> IndicatorValue {
    let mfv = money_flow_volume(window);
    let mut out = vec![0.0; mfv.len()];
    let mut running = 0.0;
    for i in 0..mfv.len() {
        running += mfv[i];
        out[i] = running;
    }
    IndicatorValue::Series(out)
}

/// On-Balance Volume.
pub fn obv(window: &[Candle], _params: &HashMap<String, f64>) -> IndicatorValue {
    let c = closes(window);
    let v = volumes(window);
    let mut out = vec![0.0; c.len()];
    if !c.is_empty() {
        out[0] = v[0];
    }
    for i in 1..c.len() {
        out[i] = if c[i] > c[i - 1] {
            out[i - 1] + v[i]
        } else if c[i] < c[i - 1] {
            out[i - 1] - v[i]
        } else {
            out[i - 1]
        };
    }
    IndicatorValue::Series(out)
}

/// Chaikin Money Flow: rolling sum of money flow volume over rolling
/// sum of volume.
pub fn cmf(window: &[Candle], params: &HashMap<String, f64>) -> IndicatorValue {
    let period = p(params, "period", 20.0) as usize;
    let mfv = money_flow_volume(window);
    let v = volumes(window);
    let sum_mfv = rolling_sum(&mfv, period);
    let sum_v = rolling_sum(&v, period);
    let out = sum_mfv
        .iter()
        .zip(sum_v.iter())
        .map(|(m, v)| if v.is_nan() || *v == 0.0 { f64::NAN } else { m / v })
        .collect();
    IndicatorValue::Series(out)
}

/// Force Index: per-bar price change times volume, EMA-smoothed.
pub fn force_index(window: &[Candle], params: &HashMap<String, f64>) -> IndicatorValue {
    let period = p(params, "period", 13.0) as usize;
    let c = closes(window);
    let v = volumes(window);
    let mut raw = vec![f64::NAN; c.len()];
    for i in 1..c.len() {
        raw[i] = (c[i] - c[i - 1]) * v[i];
    }
    let smoothed = math::ema(&raw[1.min(raw.len())..], period);
    let mut out = vec![f64::NAN; c.len()];
    if !smoothed.is_empty() {
        out[1..].copy_from_slice(&smoothed);
    }
    IndicatorValue::Series(out)
}

/// Ease of Movement, SMA-smoothed.
pub fn ease_of_movement(window: &[Candle], params: &HashMap<String, f64>) -> IndicatorValue {
    let period = p(params, "period", 14.0) as usize;
    let h = highs(window);
    let l = lows(window);
    let v = volumes(window);
    let n = h.len();
    let mut raw = vec![f64::NAN; n];
    for i in 1..n {
        let distance = (h[i] + l[i]) / 2.0 - (h[i - 1] + l[i - 1]) / 2.0;
        let range = h[i] - l[i];
        if range == 0.0 || v[i] == 0.0 {
            raw[i] = 0.0;
            continue;
        }
        let box_ratio = (v[i] / 100_000_000.0) / range;
        raw[i] = distance / box_ratio;
    }
    let out = math::sma(&raw, period);
    IndicatorValue::Series(out)
}

/// Volume Price Trend.
pub fn vpt(window: &[Candle], _params: &HashMap<String, f64>) -> IndicatorValue {
    let c = closes(window);
    let v = volumes(window);
    let mut out = vec![0.0; c.len()];
    for i in 1..c.len() {
        let pct = if c[i - 1] == 0.0 { 0.0 } else { (c[i] - c[i - 1]) / c[i - 1] };
        out[i] = out[i - 1] + v[i] * pct;
    }
    IndicatorValue::Series(out)
}

/// Negative Volume Index: carries the classic seed value of 1000.
pub fn nvi(window: &[Candle], _params: &HashMap<String, f64>) -> IndicatorValue {
    let c = closes(window);
    let v = volumes(window);
    let mut out = vec![f64::NAN; c.len()];
    if c.is_empty() {
        return IndicatorValue::Series(out);
    }
    out[0] = 1000.0;
    for i in 1..c.len() {
        if v[i] < v[i - 1] {
            let pct = if c[i - 1] == 0.0 { 0.0 } else { (c[i] - c[i - 1]) / c[i - 1] };
            out[i] = out[i - 1] * (1.0 + pct);
        } else {
            out[i] = out[i - 1];
        }
    }
    IndicatorValue::Series(out)
}

/// Cumulative VWAP over the requesting window (resets at the window's
/// first bar, unlike the per-candle trade VWAP already on `Candle`).
pub fn vwap(window: &[Candle], _params: &HashMap<String, f64>) -> IndicatorValue {
    let h = highs(window);
    let l = lows(window);
    let c = closes(window);
    let v = volumes(window);
    let tp = typical_price(&h, &l, &c);
    let mut out = vec![f64::NAN; c.len()];
    let mut cum_pv = 0.0;
    let mut cum_v = 0.0;
    for i in 0..c.len() {
        cum_pv += tp[i] * v[i];
        cum_v += v[i];
        out[i] = if cum_v == 0.0 { tp[i] } else { cum_pv / cum_v };
    }
    IndicatorValue::Series(out)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::timeframe::Timeframe;
    use chrono::{TimeZone, Utc};
    use rust_decimal::Decimal;

    fn candle(i: i64, close: f64, high: f64, low: f64, volume: f64) -> Candle {
        Candle {
            symbol: "AAPL".into(),
            timeframe: Timeframe::M1,
            bucket_start: Utc.timestamp_opt(1_700_000_000 + i * 60, 0).unwrap(),
            open: Decimal::try_from(close).unwrap(),
            high: Decimal::try_from(high).unwrap(),
            low: Decimal::try_from(low).unwrap(),
            close: Decimal::try_from(close).unwrap(),
            volume: Decimal::try_from(volume).unwrap(),
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
    fn obv_accumulates_on_up_bars() {
        let window = rising_window(5);
        if let IndicatorValue::Series(series) = obv(&window, &HashMap::new()) {
            assert_eq!(series[0], 1000.0);
            assert_eq!(series[4], 5000.0);
        } else {
            panic!("expected series");
        }
    }

    #[test]
    fn nvi_seeds_at_1000() {
        let window = rising_window(10);
        if let IndicatorValue::Series(series) = nvi(&window, &HashMap::new()) {
            assert_eq!(series[0], 1000.0);
        } else {
            panic!("expected series");
        }
    }

    #[test]
    fn mfi_is_100_for_a_strictly_rising_series() {
        let window = rising_window(30);
        if let IndicatorValue::Series(series) = mfi(&window, &HashMap::new()) {
            let last = *series.last().unwrap();
            assert!((last - 100.0).abs() < 1e-6);
        } else {
            panic!("expected series");
        }
    }

    #[test]
    fn vwap_equals_typical_price_on_the_first_bar() {
        let window = rising_window(5);
        if let IndicatorValue::Series(series) = vwap(&window, &HashMap::new()) {
            assert_eq!(series[0], (101.0 + 99.0 + 100.0) / 3.0);
        } else {
            panic!("expected series");
        }
    }
}
