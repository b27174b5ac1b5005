//! Support/Resistance engine (component C7) — the only non-trivial
//! numerical algorithm in the core: ATR-scaled swing-extrema detection
//! followed by recency/volume-weighted 1-D clustering.
//!
//! Grounded on the ATR usage in `application/feature_engineering_service.rs`
//! (the same Wilder true-range smoothing, here reimplemented over the
//! full window via [`crate::application::indicators::math`] rather than
//! the `ta` crate's incremental `Next`, since the peak-detection pass
//! needs the whole ATR series, not just its latest value) combined with
//! the weighted-clustering style of
//! `application/monitoring/correlation_service.rs`'s pairwise matrix
//! construction.

use crate::application::indicators::math;
use crate::domain::candle::Candle;
use crate::domain::sr::{LevelKind, SupportResistanceLevel, SupportResistanceResponse};
use rust_decimal::prelude::ToPrimitive;

#[derive(Debug, Clone, Copy)]
pub struct SrParams {
    pub window_w: usize,
    pub prominence_mult: f64,
    pub half_life_bars: f64,
    pub atr_mult: f64,
    pub max_levels: usize,
}

impl Default for SrParams {
    fn default() -> Self {
        Self {
            window_w: 3,
            prominence_mult: 0.5,
            half_life_bars: 200.0,
            atr_mult: 1.0,
            max_levels: 10,
        }
    }
}

struct Extremum {
    index: usize,
    price: f64,
    timestamp: chrono::DateTime<chrono::Utc>,
    volume: f64,
}

/// Finds local extrema of `values` using a symmetric window of radius
/// `window_w`: a point must be the max within its neighborhood and its
/// topographic prominence (rise above the higher of the two nearest
/// "key col" valleys) must be at least `min_prominence`.
fn find_peaks(values: &[f64], window_w: usize, min_prominence: f64) -> Vec<usize> {
    let n = values.len();
    if n == 0 || window_w == 0 {
        return Vec::new();
    }
    let mut peaks = Vec::new();
    for i in 0..n {
        let lo = i.saturating_sub(window_w);
        let hi = (i + window_w).min(n - 1);
        if lo == hi {
            continue;
        }
        let is_local_max = (lo..=hi).all(|j| j == i || values[j] <= values[i]);
        if !is_local_max {
            continue;
        }

        let mut left_min = values[i];
        let mut li = i;
        while li > 0 {
            li -= 1;
            if values[li] > values[i] {
                break;
            }
            left_min = left_min.min(values[li]);
        }

        let mut right_min = values[i];
        let mut ri = i;
        while ri < n - 1 {
            ri += 1;
            if values[ri] > values[i] {
                break;
            }
            right_min = right_min.min(values[ri]);
        }

        let key_col = left_min.max(right_min);
        let prominence = values[i] - key_col;
        if prominence >= min_prominence {
            peaks.push(i);
        }
    }
    peaks
}

fn cluster(mut extrema: Vec<Extremum>, n: usize, half_life_bars: f64, tol: f64, kind: LevelKind) -> Vec<(SupportResistanceLevel, f64)> {
    extrema.sort_by(|a, b| a.price.partial_cmp(&b.price).unwrap());

    let mut clusters: Vec<Vec<Extremum>> = Vec::new();
    for ext in extrema {
        match clusters.last_mut() {
            Some(run) if ext.price - run.last().unwrap().price <= tol => run.push(ext),
            _ => clusters.push(vec![ext]),
        }
    }

    clusters
        .into_iter()
        .map(|members| {
            let mut weighted_sum = 0.0;
            let mut weight_total = 0.0;
            let mut strength_raw = 0.0;
            let mut last_touch = members[0].timestamp;
            for m in &members {
                let recency = 0.5f64.powf((n as f64 - 1.0 - m.index as f64) / half_life_bars);
                let w = recency * m.volume;
                weighted_sum += m.price * w;
                weight_total += w;
                strength_raw += w;
                if m.timestamp > last_touch {
                    last_touch = m.timestamp;
                }
            }
            let price = if weight_total > 0.0 {
                weighted_sum / weight_total
            } else {
                members.iter().map(|m| m.price).sum::<f64>() / members.len() as f64
            };
            (
                SupportResistanceLevel {
                    price,
                    kind,
                    strength: 0.0,
                    touches: members.len() as u32,
                    last_touch,
                },
                strength_raw,
            )
        })
        .collect()
}

/// Runs the full swing-extrema → cluster → normalize → select pipeline
/// (spec §4.6 steps 1-6).
pub fn compute(window: &[Candle], params: SrParams, current_price: f64) -> SupportResistanceResponse {
    let n = window.len();
    let high: Vec<f64> = window.iter().map(|c| c.high.to_f64().unwrap_or(0.0)).collect();
    let low: Vec<f64> = window.iter().map(|c| c.low.to_f64().unwrap_or(0.0)).collect();
    let close: Vec<f64> = window.iter().map(|c| c.close.to_f64().unwrap_or(0.0)).collect();
    let volume: Vec<f64> = window.iter().map(|c| c.volume.to_f64().unwrap_or(0.0)).collect();

    let atr_series = math::atr(&high, &low, &close, 14);
    let atr = atr_series.iter().rev().find(|v| !v.is_nan()).copied().unwrap_or(0.0);
    let prominence = params.prominence_mult * atr;
    let tol = params.atr_mult * atr;

    if n == 0 || atr == 0.0 {
        return SupportResistanceResponse {
            support: Vec::new(),
            resistance: Vec::new(),
            tolerance: tol,
            current_price,
        };
    }

    let resistance_idx = find_peaks(&high, params.window_w, prominence);
    let inverted_low: Vec<f64> = low.iter().map(|v| -v).collect();
    let support_idx = find_peaks(&inverted_low, params.window_w, prominence);

    let resistance_extrema: Vec<Extremum> = resistance_idx
        .into_iter()
        .map(|i| Extremum {
            index: i,
            price: high[i],
            timestamp: window[i].bucket_start,
            volume: volume[i],
        })
        .collect();
    let support_extrema: Vec<Extremum> = support_idx
        .into_iter()
        .map(|i| Extremum {
            index: i,
            price: low[i],
            timestamp: window[i].bucket_start,
            volume: volume[i],
        })
        .collect();

    let mut resistance_clusters = cluster(resistance_extrema, n, params.half_life_bars, tol, LevelKind::Resistance);
    let mut support_clusters = cluster(support_extrema, n, params.half_life_bars, tol, LevelKind::Support);

    let max_strength = resistance_clusters
        .iter()
        .chain(support_clusters.iter())
        .map(|(_, raw)| *raw)
        .fold(0.0, f64::max);

    if max_strength <= 0.0 {
        return SupportResistanceResponse {
            support: Vec::new(),
            resistance: Vec::new(),
            tolerance: tol,
            current_price,
        };
    }

    for (level, raw) in resistance_clusters.iter_mut().chain(support_clusters.iter_mut()) {
        level.strength = (*raw / max_strength).clamp(0.0, 1.0);
    }

    let mut resistance: Vec<SupportResistanceLevel> = resistance_clusters.into_iter().map(|(l, _)| l).collect();
    let mut support: Vec<SupportResistanceLevel> = support_clusters.into_iter().map(|(l, _)| l).collect();

    resistance.sort_by(|a, b| b.strength.partial_cmp(&a.strength).unwrap());
    support.sort_by(|a, b| b.strength.partial_cmp(&a.strength).unwrap());
    resistance.truncate(params.max_levels);
    support.truncate(params.max_levels);

    SupportResistanceResponse {
        support,
        resistance,
        tolerance: tol,
        current_price,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::timeframe::Timeframe;
    use chrono::{TimeZone, Utc};
    use rust_decimal::Decimal;
    use rust_decimal_macros::dec;

    fn candle(i: i64, open: f64, high: f64, low: f64, close: f64) -> Candle {
        Candle {
            symbol: "AAPL".into(),
            timeframe: Timeframe::M1,
            bucket_start: Utc.timestamp_opt(1_700_000_000 + i * 60, 0).unwrap(),
            open: Decimal::try_from(open).unwrap(),
            high: Decimal::try_from(high).unwrap(),
            low: Decimal::try_from(low).unwrap(),
            close: Decimal::try_from(close).unwrap(),
            volume: dec!(1000),
            vwap: Decimal::try_from(close).unwrap(),
            tick_count: 1,
        }
    }

    /// A flat series has zero ATR, so per spec property 6 both lists must
    /// come back empty rather than dividing by a zero tolerance.
    #[test]
    fn flat_series_yields_empty_levels() {
        let window: Vec<Candle> = (0..30i64).map(|i| candle(i, 100.0, 100.0, 100.0, 100.0)).collect();
        let result = compute(&window, SrParams::default(), 100.0);
        assert!(result.support.is_empty());
        assert!(result.resistance.is_empty());
    }

    /// A series oscillating between two bands should surface one
    /// dominant resistance cluster near the upper band and one dominant
    /// support cluster near the lower band.
    #[test]
    fn oscillating_series_surfaces_known_support_and_resistance() {
        let mut window = Vec::new();
        let mut i = 0i64;
        for _ in 0..10 {
            window.push(candle(i, 100.0, 120.0, 99.0, 119.0));
            i += 1;
            window.push(candle(i, 119.0, 101.0, 80.0, 81.0));
            i += 1;
        }
        let result = compute(&window, SrParams::default(), 100.0);
        assert!(!result.resistance.is_empty());
        assert!(!result.support.is_empty());
        let top_resistance = &result.resistance[0];
        let top_support = &result.support[0];
        assert!(top_resistance.price > top_support.price);
        assert!((80.0..=120.0).contains(&top_resistance.price));
        assert!((80.0..=120.0).contains(&top_support.price));
    }

    #[test]
    fn strengths_are_normalized_into_zero_to_one() {
        let mut window = Vec::new();
        let mut i = 0i64;
        for _ in 0..10 {
            window.push(candle(i, 100.0, 120.0, 99.0, 119.0));
            i += 1;
            window.push(candle(i, 119.0, 101.0, 80.0, 81.0));
            i += 1;
        }
        let result = compute(&window, SrParams::default(), 100.0);
        for level in result.support.iter().chain(result.resistance.iter()) {
            assert!(level.strength >= 0.0 && level.strength <= 1.0);
        }
        assert!(result
            .support
            .iter()
            .chain(result.resistance.iter())
            .any(|l| (l.strength - 1.0).abs() < 1e-9));
    }

    #[test]
    fn levels_are_capped_at_max_levels() {
        let mut window = Vec::new();
        let mut i = 0i64;
        for k in 0..20 {
            let base = 100.0 + (k as f64) * 5.0;
            window.push(candle(i, base, base + 10.0, base - 1.0, base + 9.0));
            i += 1;
            window.push(candle(i, base + 9.0, base + 1.0, base - 10.0, base - 9.0));
            i += 1;
        }
        let params = SrParams { max_levels: 2, ..SrParams::default() };
        let result = compute(&window, params, 100.0);
        assert!(result.support.len() <= 2);
        assert!(result.resistance.len() <= 2);
    }
}
