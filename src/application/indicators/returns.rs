//! Return series: daily return, daily log return, cumulative return.
//! "Daily" here means "bar-over-bar" — the window's own timeframe, not
//! necessarily a calendar day; the naming follows the source catalog.

use super::moving_average::closes;
use crate::domain::candle::Candle;
use crate::domain::schemas::IndicatorValue;
use std::collections::HashMap;

pub fn daily_return(window: &[Candle], _params: &HashMap<String, f64>) -> IndicatorValue {
    let c = closes(window);
    let mut out = vec![f64::NAN; c.len()];
    for i in 1..c.len() {
        if c[i - 1] != 0.0 {
            out[i] = (c[i] - c[i - 1]) / c[i - 1];
        }
    }
    IndicatorValue::Series(out)
}

pub fn daily_log_return(window: &[Candle], _params: &HashMap<String, f64>) -> IndicatorValue {
    let c = closes(window);
    let mut out = vec![f64::NAN; c.len()];
    for i in 1..c.len() {
        if c[i - 1] > 0.0 && c[i] > 0.0 {
            out[i] = (c[i] / c[i - 1]).ln();
        }
    }
    IndicatorValue::Series(out)
}

pub fn cumulative_return(window: &[Candle], _params: &HashMap<String, f64>) -> IndicatorValue {
    let c = closes(window);
    let mut out = vec![f64::NAN; c.len()];
    if c.is_empty() || c[0] == 0.0 {
        return IndicatorValue::Series(out);
    }
    for i in 0..c.len() {
        out[i] = (c[i] - c[0]) / c[0];
    }
    IndicatorValue::Series(out)
}
