//! Volatility family: Bollinger Bands, Keltner Channel, Donchian
//! Channel, Ulcer Index.

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

/// Bollinger Bands `{high, mid, low, width, %b}`.
pub fn bollinger(window: &[Candle], params: &HashMap<String, f64>) -> IndicatorValue {
    let period = p(params, "period", 20.0) as usize;
    let std_dev_mult = p(params, "std_dev", 2.0);
    let c = closes(window);
    let mid = math::sma(&c, period);
    let dev = math::stdev(&c, period);
    let high: Vec<f64> = mid.iter().zip(dev.iter()).map(|(m, d)| m + std_dev_mult * d).collect();
    let low: Vec<f64> = mid.iter().zip(dev.iter()).map(|(m, d)| m - std_dev_mult * d).collect();
    let width: Vec<f64> = high
        .iter()
        .zip(low.iter())
        .zip(mid.iter())
        .map(|((h, l), m)| if m.is_nan() || *m == 0.0 { f64::NAN } else { (h - l) / m })
        .collect();
    let percent_b: Vec<f64> = c
        .iter()
        .zip(high.iter())
        .zip(low.iter())
        .map(|((close, h), l)| if h.is_nan() || l.is_nan() || (h - l) == 0.0 { f64::NAN } else { (close - l) / (h - l) })
        .collect();
    let mut named = HashMap::new();
    named.insert("high".to_string(), high);
    named.insert("mid".to_string(), mid);
    named.insert("low".to_string(), low);
    named.insert("width".to_string(), width);
    named.insert("%b".to_string(), percent_b);
    IndicatorValue::Named(named)
}

/// Keltner Channel `{high, mid, low}`: an EMA midline offset by a
/// multiple of ATR.
pub fn keltner(window: &[Candle], params: &HashMap<String, f64>) -> IndicatorValue {
    let ema_period = p(params, "period", 20.0) as usize;
    let atr_period = p(params, "atr_period", 10.0) as usize;
    let atr_mult = p(params, "atr_mult", 2.0);
    let h = highs(window);
    let l = lows(window);
    let c = closes(window);
    let mid = math::ema(&c, ema_period);
    let atr = math::atr(&h, &l, &c, atr_period);
    let high: Vec<f64> = mid.iter().zip(atr.iter()).map(|(m, a)| if m.is_nan() || a.is_nan() { f64::NAN } else { m + atr_mult * a }).collect();
    let low: Vec<f64> = mid.iter().zip(atr.iter()).map(|(m, a)| if m.is_nan() || a.is_nan() { f64::NAN } else { m - atr_mult * a }).collect();
    let mut named = HashMap::new();
    named.insert("high".to_string(), high);
    named.insert("mid".to_string(), mid);
    named.insert("low".to_string(), low);
    IndicatorValue::Named(named)
}

/// Donchian Channel `{high, mid, low}`: rolling high/low envelope.
pub fn donchian(window: &[Candle], params: &HashMap<String, f64>) -> IndicatorValue {
    let period = p(params, "period", 20.0) as usize;
    let h = highs(window);
    let l = lows(window);
    let high = math::rolling_max(&h, period);
    let low = math::rolling_min(&l, period);
    let mid: Vec<f64> = high.iter().zip(low.iter()).map(|(h, l)| if h.is_nan() || l.is_nan() { f64::NAN } else { (h + l) / 2.0 }).collect();
    let mut named = HashMap::new();
    named.insert("high".to_string(), high);
    named.insert("mid".to_string(), mid);
    named.insert("low".to_string(), low);
    IndicatorValue::Named(named)
}

/// Ulcer Index: RMS of the percentage drawdown from the rolling
/// `period`-bar high.
pub fn ulcer_index(window: &[Candle], params: &HashMap<String, f64>) -> IndicatorValue {
    let period = p(params, "period", 14.0) as usize;
    let c = closes(window);
    let rolling_high = math::rolling_max(&c, period);
    let drawdown_pct: Vec<f64> = c
        .iter()
        .zip(rolling_high.iter())
        .map(|(close, high)| {
            if high.is_nan() || *high == 0.0 {
                f64::NAN
            } else {
                100.0 * (close - high) / high
            }
        })
        .collect();
    let mut out = vec![f64::NAN; c.len()];
    for i in period - 1..c.len() {
        let w = &drawdown_pct[i + 1 - period..=i];
        if w.iter().any(|v| v.is_nan()) {
            continue;
        }
        let mean_sq = w.iter().map(|v| v * v).sum::<f64>() / period as f64;
        out[i] = mean_sq.sqrt();
    }
    IndicatorValue::Series(out)
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

    fn flat_window(n: usize) -> Vec<Candle> {
        (0..n as i64).map(|i| candle(i, 100.0, 100.5, 99.5)).collect()
    }

    #[test]
    fn bollinger_bands_collapse_to_mid_on_a_flat_series() {
        let window = flat_window(30);
        if let IndicatorValue::Named(map) = bollinger(&window, &HashMap::new()) {
            let high = &map["high"];
            let low = &map["low"];
            let last = high.len() - 1;
            assert!((high[last] - low[last]).abs() < 1e-9);
        } else {
            panic!("expected named");
        }
    }

    #[test]
    fn donchian_high_equals_rolling_max_high() {
        let window = flat_window(25);
        if let IndicatorValue::Named(map) = donchian(&window, &HashMap::new()) {
            let high = &map["high"];
            assert_eq!(*high.last().unwrap(), 100.5);
        } else {
            panic!("expected named");
        }
    }

    #[test]
    fn ulcer_index_is_zero_for_a_monotonically_rising_series() {
        let window: Vec<Candle> = (0..30i64).map(|i| candle(i, 100.0 + i as f64, 101.0 + i as f64, 99.0 + i as f64)).collect();
        if let IndicatorValue::Series(series) = ulcer_index(&window, &HashMap::new()) {
            let last = *series.last().unwrap();
            assert!(last.abs() < 1e-9);
        } else {
            panic!("expected series");
        }
    }
}
