//! Indicator engine (component C6): a catalog of pure functions over a
//! candle window, dispatched by name.
//!
//! Grounded on `application/feature_engineering_service.rs`'s pattern of
//! wiring the `ta` crate's indicator structs behind a small facade, but
//! restructured as **stateless recompute over the whole window** rather
//! than incremental `Next` calls — spec §4.5 requires that a real-time
//! recompute over an extended window be numerically indistinguishable
//! from replaying it from scratch, which rules out carrying `ta`'s
//! internal ring-buffer state across calls. Unsupported-history
//! positions use `f64::NAN` as the "natural unknown sentinel", never an
//! error.

pub(crate) mod math;
mod momentum;
mod moving_average;
mod returns;
mod trend;
mod volatility;
mod volume;

use crate::domain::candle::Candle;
use crate::domain::errors::{IndicatorError, ValidationError};
use crate::domain::schemas::{IndicatorComputeError, IndicatorValue};
use std::collections::HashMap;

type ComputeFn = fn(&[Candle], &HashMap<String, f64>) -> IndicatorValue;

struct Entry {
    name: &'static str,
    category: &'static str,
    series_names: &'static [&'static str],
    default_params: &'static [(&'static str, f64)],
    compute: ComputeFn,
}

macro_rules! entry {
    ($name:expr, $category:expr, $series:expr, $params:expr, $f:path) => {
        Entry {
            name: $name,
            category: $category,
            series_names: $series,
            default_params: $params,
            compute: $f,
        }
    };
}

fn catalog() -> Vec<Entry> {
    vec![
        entry!("sma", "moving_average", &["value"], &[("period", 20.0)], moving_average::sma),
        entry!("ema", "moving_average", &["value"], &[("period", 20.0)], moving_average::ema),
        entry!("wma", "moving_average", &["value"], &[("period", 20.0)], moving_average::wma),
        entry!("macd", "trend", &["macd", "signal", "diff"], &[("fast", 12.0), ("slow", 26.0), ("signal", 9.0)], trend::macd),
        entry!("adx", "trend", &["adx", "+di", "-di"], &[("period", 14.0)], trend::adx),
        entry!("bollinger", "volatility", &["high", "mid", "low", "width", "%b"], &[("period", 20.0), ("std_dev", 2.0)], volatility::bollinger),
        entry!("keltner", "volatility", &["high", "mid", "low"], &[("period", 20.0), ("atr_period", 10.0), ("atr_mult", 2.0)], volatility::keltner),
        entry!("donchian", "volatility", &["high", "mid", "low"], &[("period", 20.0)], volatility::donchian),
        entry!("ulcer", "volatility", &["value"], &[("period", 14.0)], volatility::ulcer_index),
        entry!("rsi", "momentum", &["value"], &[("period", 14.0)], momentum::rsi),
        entry!("stoch_rsi", "momentum", &["stoch_rsi", "k", "d"], &[("period", 14.0), ("k_period", 3.0), ("d_period", 3.0)], momentum::stoch_rsi),
        entry!("tsi", "momentum", &["value"], &[("long_period", 25.0), ("short_period", 13.0)], momentum::tsi),
        entry!("uo", "momentum", &["value"], &[("period1", 7.0), ("period2", 14.0), ("period3", 28.0)], momentum::ultimate_oscillator),
        entry!("stoch", "momentum", &["k", "d"], &[("period", 14.0), ("d_period", 3.0)], momentum::stochastic),
        entry!("williams_r", "momentum", &["value"], &[("period", 14.0)], momentum::williams_r),
        entry!("ao", "momentum", &["value"], &[], momentum::awesome_oscillator),
        entry!("kama", "momentum", &["value"], &[("period", 10.0), ("fast", 2.0), ("slow", 30.0)], momentum::kama),
        entry!("roc", "momentum", &["value"], &[("period", 12.0)], momentum::roc),
        entry!("ppo", "momentum", &["line", "signal", "hist"], &[("fast", 12.0), ("slow", 26.0), ("signal", 9.0)], momentum::ppo),
        entry!("pvo", "volume", &["line", "signal", "hist"], &[("fast", 12.0), ("slow", 26.0), ("signal", 9.0)], momentum::pvo),
        entry!("ichimoku", "trend", &["a", "b", "base", "conversion"], &[("conversion_period", 9.0), ("base_period", 26.0), ("span_b_period", 52.0)], trend::ichimoku),
        entry!("psar", "trend", &["psar", "up", "down"], &[("af_step", 0.02), ("af_max", 0.2)], trend::psar),
        entry!("stc", "momentum", &["value"], &[("fast", 23.0), ("slow", 50.0), ("cycle", 10.0)], momentum::stc),
        entry!("aroon", "trend", &["up", "down", "indicator"], &[("period", 25.0)], trend::aroon),
        entry!("vortex", "trend", &["+", "-"], &[("period", 14.0)], trend::vortex),
        entry!("trix", "trend", &["value"], &[("period", 15.0)], trend::trix),
        entry!("mass_index", "trend", &["value"], &[("ema_period", 9.0), ("sum_period", 25.0)], trend::mass_index),
        entry!("cci", "momentum", &["value"], &[("period", 20.0)], momentum::cci),
        entry!("dpo", "momentum", &["value"], &[("period", 20.0)], momentum::dpo),
        entry!("kst", "momentum", &["kst", "signal"], &[], momentum::kst),
        entry!("mfi", "volume", &["value"], &[("period", 14.0)], volume::mfi),
        entry!("adi", "volume", &["value"], &[], volume::adi),
        entry!("obv", "volume", &["value"], &[], volume::obv),
        entry!("cmf", "volume", &["value"], &[("period", 20.0)], volume::cmf),
        entry!("force_index", "volume", &["value"], &[("period", 13.0)], volume::force_index),
        entry!("eom", "volume", &["value"], &[("period", 14.0)], volume::ease_of_movement),
        entry!("vpt", "volume", &["value"], &[], volume::vpt),
        entry!("nvi", "volume", &["value"], &[], volume::nvi),
        entry!("vwap", "volume", &["value"], &[], volume::vwap),
        entry!("daily_return", "returns", &["value"], &[], returns::daily_return),
        entry!("daily_log_return", "returns", &["value"], &[], returns::daily_log_return),
        entry!("cumulative_return", "returns", &["value"], &[], returns::cumulative_return),
    ]
}

/// Merges `overrides` onto `entry`'s documented defaults, per spec §4.5's
/// parameter-override policy: a key this indicator doesn't declare is a
/// forward-compatible no-op (ignored); a key it does declare must carry
/// a positive, finite value, since every declared parameter here is a
/// window length, smoothing step or multiplier for which zero, negative
/// or non-finite values change the indicator's mathematical definition
/// rather than merely tuning it (a zero-period average, a negative ATR
/// multiplier, and so on are not meaningful variants of the same
/// formula).
fn merged_params(entry: &Entry, overrides: Option<&HashMap<String, f64>>) -> Result<HashMap<String, f64>, ValidationError> {
    let mut params: HashMap<String, f64> = entry
        .default_params
        .iter()
        .map(|(k, v)| (k.to_string(), *v))
        .collect();
    if let Some(overrides) = overrides {
        for (k, v) in overrides {
            if !params.contains_key(k.as_str()) {
                continue;
            }
            if !v.is_finite() || *v <= 0.0 {
                return Err(ValidationError::InvalidIndicatorParam {
                    indicator: entry.name.to_string(),
                    param: k.clone(),
                    reason: "must be a positive, finite number".to_string(),
                });
            }
            params.insert(k.clone(), *v);
        }
    }
    Ok(params)
}

/// Which indicators a caller asked for.
pub enum Requested {
    All,
    Named(Vec<String>),
}

/// Result of a [`compute`] call: successfully-computed series plus any
/// per-indicator failures, so one bad name never blanks out the rest of
/// the response (spec §4.5 "Unknown indicator names are rejected").
#[derive(Debug, Default)]
pub struct ComputeResult {
    pub values: HashMap<String, IndicatorValue>,
    pub errors: Vec<IndicatorComputeError>,
}

/// Computes every requested indicator over `window`, recomputing from
/// scratch each call. `params` maps indicator name to its parameter
/// overrides; unspecified parameters take the documented defaults.
pub fn compute(
    window: &[Candle],
    requested: &Requested,
    params: &HashMap<String, HashMap<String, f64>>,
) -> ComputeResult {
    let catalog = catalog();
    let names: Vec<&str> = match requested {
        Requested::All => catalog.iter().map(|e| e.name).collect(),
        Requested::Named(names) => names.iter().map(|s| s.as_str()).collect(),
    };

    let mut result = ComputeResult::default();
    for name in names {
        match catalog.iter().find(|e| e.name == name) {
            Some(entry) => match merged_params(entry, params.get(name)) {
                Ok(merged) => {
                    let value = (entry.compute)(window, &merged);
                    result.values.insert(name.to_string(), value);
                }
                Err(err) => {
                    result.errors.push(IndicatorComputeError {
                        indicator: name.to_string(),
                        message: err.to_string(),
                    });
                }
            },
            None => {
                let err = IndicatorError::UnknownIndicator(name.to_string());
                result.errors.push(IndicatorComputeError {
                    indicator: name.to_string(),
                    message: err.to_string(),
                });
            }
        }
    }
    result
}

/// Parameter names that tune shape rather than warm-up length (a step size,
/// a width multiplier, a standard-deviation band) — excluded when picking
/// the longest period-like parameter for [`min_periods_for`].
const NON_WARMUP_PARAMS: &[&str] = &["af_step", "af_max", "std_dev", "atr_mult"];

/// The minimum candle count before an indicator produces a first
/// non-`NAN` value (spec §4.5), taken as the longest of its period-like
/// parameters. A few indicators need a hardcoded minimum instead: `kst`
/// and `ao` have no declared parameters but still smooth over a fixed
/// multi-bar window internally, and `psar`'s only parameters (`af_step`,
/// `af_max`) aren't warm-up lengths at all.
fn min_periods_for(entry: &Entry) -> usize {
    let longest_period_like = entry
        .default_params
        .iter()
        .filter(|(k, _)| !NON_WARMUP_PARAMS.contains(k))
        .map(|(_, v)| *v as usize)
        .max();
    match longest_period_like {
        Some(n) => n,
        None => match entry.name {
            "kst" => 45,
            "ao" => 34,
            "psar" => 2,
            "daily_return" | "daily_log_return" => 2,
            _ => 1,
        },
    }
}

/// The catalog listing for `GET /indicators/available` (spec §6).
pub fn catalog_entries() -> Vec<crate::domain::schemas::IndicatorCatalogEntry> {
    catalog()
        .into_iter()
        .map(|e| crate::domain::schemas::IndicatorCatalogEntry {
            name: e.name.to_string(),
            category: e.category.to_string(),
            parameters: e
                .default_params
                .iter()
                .map(|(k, v)| (k.to_string(), serde_json::json!(v)))
                .collect(),
            min_periods: min_periods_for(&e),
            series_names: e.series_names.iter().map(|s| s.to_string()).collect(),
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

    fn candle(i: i64, close: f64) -> Candle {
        Candle {
            symbol: "AAPL".into(),
            timeframe: Timeframe::M1,
            bucket_start: Utc.timestamp_opt(1_700_000_000 + i * 60, 0).unwrap(),
            open: Decimal::try_from(close).unwrap(),
            high: Decimal::try_from(close + 1.0).unwrap(),
            low: Decimal::try_from(close - 1.0).unwrap(),
            close: Decimal::try_from(close).unwrap(),
            volume: dec!(1000),
            vwap: Decimal::try_from(close).unwrap(),
            tick_count: 1,
        }
    }

    fn window(n: usize) -> Vec<Candle> {
        (0..n as i64).map(|i| candle(i, 100.0 + i as f64)).collect()
    }

    #[test]
    fn unknown_indicator_is_isolated_from_valid_ones() {
        let mut params = HashMap::new();
        params.insert(
            "sma".to_string(),
            [("period".to_string(), 5.0)].into_iter().collect(),
        );
        let result = compute(
            &window(30),
            &Requested::Named(vec!["sma".to_string(), "not_a_real_indicator".to_string()]),
            &params,
        );
        assert!(result.values.contains_key("sma"));
        assert_eq!(result.errors.len(), 1);
        assert_eq!(result.errors[0].indicator, "not_a_real_indicator");
    }

    #[test]
    fn parameter_override_changes_the_result() {
        let w = window(30);
        let mut short = HashMap::new();
        short.insert("sma".to_string(), [("period".to_string(), 5.0)].into_iter().collect());
        let mut long = HashMap::new();
        long.insert("sma".to_string(), [("period".to_string(), 20.0)].into_iter().collect());

        let r_short = compute(&w, &Requested::Named(vec!["sma".to_string()]), &short);
        let r_long = compute(&w, &Requested::Named(vec!["sma".to_string()]), &long);
        assert_ne!(r_short.values["sma"], r_long.values["sma"]);
    }

    #[test]
    fn requesting_all_returns_the_full_catalog() {
        let result = compute(&window(60), &Requested::All, &HashMap::new());
        assert_eq!(result.values.len(), catalog().len());
        assert!(result.errors.is_empty());
    }

    #[test]
    fn catalog_entries_cover_every_registered_indicator() {
        assert_eq!(catalog_entries().len(), catalog().len());
    }

    #[test]
    fn min_periods_reflects_each_indicators_real_warm_up() {
        let entries = catalog_entries();
        let find = |name: &str| entries.iter().find(|e| e.name == name).unwrap();
        assert_eq!(find("ichimoku").min_periods, 52);
        assert_eq!(find("macd").min_periods, 26);
        assert_eq!(find("tsi").min_periods, 25);
        assert_eq!(find("uo").min_periods, 28);
        assert_eq!(find("mass_index").min_periods, 25);
        assert_eq!(find("stc").min_periods, 50);
        assert_eq!(find("kst").min_periods, 45);
        assert_eq!(find("ao").min_periods, 34);
        assert_eq!(find("psar").min_periods, 2);
        assert_eq!(find("bollinger").min_periods, 20);
        assert_eq!(find("keltner").min_periods, 20);
    }

    #[test]
    fn invalid_parameter_override_is_reported_as_an_error_not_a_panic() {
        let w = window(30);
        let mut overrides = HashMap::new();
        overrides.insert("sma".to_string(), [("period".to_string(), 0.0)].into_iter().collect());
        let result = compute(&w, &Requested::Named(vec!["sma".to_string()]), &overrides);
        assert!(!result.values.contains_key("sma"));
        assert_eq!(result.errors.len(), 1);
        assert_eq!(result.errors[0].indicator, "sma");
        assert!(result.errors[0].message.contains("period"));
    }

    #[test]
    fn unknown_parameter_name_is_ignored_as_forward_compatible() {
        let w = window(30);
        let mut overrides = HashMap::new();
        overrides.insert("sma".to_string(), [("not_a_real_param".to_string(), -1.0)].into_iter().collect());
        let result = compute(&w, &Requested::Named(vec!["sma".to_string()]), &overrides);
        assert!(result.values.contains_key("sma"));
        assert!(result.errors.is_empty());
    }

    #[test]
    fn recompute_over_an_extended_window_matches_a_fresh_replay() {
        let w1 = window(30);
        let w2 = window(31);
        let r1 = compute(&w1, &Requested::Named(vec!["rsi".to_string()]), &HashMap::new());
        let r2 = compute(&w2, &Requested::Named(vec!["rsi".to_string()]), &HashMap::new());
        if let (IndicatorValue::Series(s1), IndicatorValue::Series(s2)) =
            (&r1.values["rsi"], &r2.values["rsi"])
        {
            for i in 0..s1.len() {
                if s1[i].is_nan() {
                    assert!(s2[i].is_nan());
                } else {
                    assert!((s1[i] - s2[i]).abs() < 1e-9);
                }
            }
        } else {
            panic!("expected series");
        }
    }
}
