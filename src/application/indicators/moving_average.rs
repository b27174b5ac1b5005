//! Moving-average family: SMA, EMA, WMA.

use super::math;
use crate::domain::candle::Candle;
use crate::domain::schemas::IndicatorValue;
use rust_decimal::prelude::ToPrimitive;
use std::collections::HashMap;

pub fn closes(window: &[Candle]) -> Vec<f64> {
    window.iter().map(|c| c.close.to_f64().unwrap_or(0.0)).collect()
}

fn period(params: &HashMap<String, f64>, default: usize) -> usize {
    params.get("period").copied().unwrap_or(default as f64) as usize
}

pub fn sma(window: &[Candle], params: &HashMap<String, f64>) -> IndicatorValue {
    IndicatorValue::Series(math::sma(&closes(window), period(params, 20)))
}

pub fn ema(window: &[Candle], params: &HashMap<String, f64>) -> IndicatorValue {
    IndicatorValue::Series(math::ema(&closes(window), period(params, 20)))
}

pub fn wma(window: &[Candle], params: &HashMap<String, f64>) -> IndicatorValue {
    IndicatorValue::Series(math::wma(&closes(window), period(params, 20)))
}

pub fn sma_min_periods(params: &HashMap<String, f64>) -> usize {
    period(params, 20)
}

pub fn ema_min_periods(params: &HashMap<String, f64>) -> usize {
    period(params, 20)
}

pub fn wma_min_periods(params: &HashMap<String, f64>) -> usize {
    period(params, 20)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::timeframe::Timeframe;
    use chrono::Utc;
    use rust_decimal_macros::dec;

    fn candle(close: rust_decimal::Decimal) -> Candle {
        Candle {
            symbol: "AAPL".into(),
            timeframe: Timeframe::M1,
            bucket_start: Utc::now(),
            open: close,
            high: close,
            low: close,
            close,
            volume: dec!(1),
            vwap: close,
            tick_count: 1,
        }
    }

    #[test]
    fn sma_matches_manual_average() {
        let window: Vec<Candle> = [1.0, 2.0, 3.0, 4.0]
            .iter()
            .map(|v| candle(rust_decimal::Decimal::try_from(*v).unwrap()))
            .collect();
        let mut params = HashMap::new();
        params.insert("period".to_string(), 2.0);
        let value = sma(&window, &params);
        match value {
            IndicatorValue::Series(series) => {
                assert!(series[0].is_nan());
                assert_eq!(series[1], 1.5);
                assert_eq!(series[3], 3.5);
            }
            _ => panic!("expected series"),
        }
    }
}
