//! Classic pivot points (component C13): a deterministic function of the
//! previous period's OHLC, plus nearest-level lookup over a
//! support/resistance level set. Grounded on the same small pure-function
//! style as `application/support_resistance.rs`'s clustering helpers.

use crate::domain::sr::{NearestLevel, PivotMethod, PivotSet, SupportResistanceLevel};

/// Standard, Fibonacci and Woodie pivots from the prior bar's `(high,
/// low, close)` — the woodie variant also needs the *current* bar's
/// open.
pub fn compute(method: PivotMethod, prev_high: f64, prev_low: f64, prev_close: f64, current_open: f64) -> PivotSet {
    match method {
        PivotMethod::Standard => standard(prev_high, prev_low, prev_close),
        PivotMethod::Fibonacci => fibonacci(prev_high, prev_low, prev_close),
        PivotMethod::Woodie => woodie(prev_high, prev_low, current_open),
    }
}

fn standard(high: f64, low: f64, close: f64) -> PivotSet {
    let pp = (high + low + close) / 3.0;
    let range = high - low;
    PivotSet {
        pp,
        r1: 2.0 * pp - low,
        r2: pp + range,
        r3: high + 2.0 * (pp - low),
        s1: 2.0 * pp - high,
        s2: pp - range,
        s3: low - 2.0 * (high - pp),
    }
}

fn fibonacci(high: f64, low: f64, close: f64) -> PivotSet {
    let pp = (high + low + close) / 3.0;
    let range = high - low;
    PivotSet {
        pp,
        r1: pp + 0.382 * range,
        r2: pp + 0.618 * range,
        r3: pp + 1.0 * range,
        s1: pp - 0.382 * range,
        s2: pp - 0.618 * range,
        s3: pp - 1.0 * range,
    }
}

fn woodie(high: f64, low: f64, current_open: f64) -> PivotSet {
    let pp = (high + low + 2.0 * current_open) / 4.0;
    let range = high - low;
    PivotSet {
        pp,
        r1: 2.0 * pp - low,
        r2: pp + range,
        r3: high + 2.0 * (pp - low),
        s1: 2.0 * pp - high,
        s2: pp - range,
        s3: low - 2.0 * (high - pp),
    }
}

/// The `k` levels (support and resistance combined) nearest to `price`,
/// ties broken by strength descending.
pub fn nearest_levels(levels: &[SupportResistanceLevel], price: f64, k: usize) -> Vec<NearestLevel> {
    let mut annotated: Vec<NearestLevel> = levels
        .iter()
        .map(|level| {
            let distance = level.price - price;
            let distance_pct = if price != 0.0 { distance / price } else { 0.0 };
            NearestLevel {
                level: level.clone(),
                distance,
                distance_pct,
            }
        })
        .collect();
    annotated.sort_by(|a, b| {
        a.distance
            .abs()
            .partial_cmp(&b.distance.abs())
            .unwrap()
            .then(b.level.strength.partial_cmp(&a.level.strength).unwrap())
    });
    annotated.truncate(k);
    annotated
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::sr::LevelKind;
    use chrono::Utc;

    #[test]
    fn standard_pivot_matches_the_textbook_formula() {
        let pivots = compute(PivotMethod::Standard, 110.0, 90.0, 100.0, 100.0);
        assert_eq!(pivots.pp, 100.0);
        assert_eq!(pivots.r1, 110.0);
        assert_eq!(pivots.s1, 90.0);
    }

    #[test]
    fn fibonacci_pivot_uses_fibonacci_ratios_of_the_range() {
        let pivots = compute(PivotMethod::Fibonacci, 110.0, 90.0, 100.0, 100.0);
        let range = 20.0;
        assert!((pivots.r1 - (pivots.pp + 0.382 * range)).abs() < 1e-9);
        assert!((pivots.s1 - (pivots.pp - 0.382 * range)).abs() < 1e-9);
    }

    #[test]
    fn woodie_pivot_weights_the_current_open() {
        let pivots = compute(PivotMethod::Woodie, 110.0, 90.0, 100.0, 120.0);
        assert_eq!(pivots.pp, (110.0 + 90.0 + 2.0 * 120.0) / 4.0);
    }

    fn level(price: f64, strength: f64) -> SupportResistanceLevel {
        SupportResistanceLevel {
            price,
            kind: LevelKind::Support,
            strength,
            touches: 1,
            last_touch: Utc::now(),
        }
    }

    #[test]
    fn nearest_levels_are_sorted_by_absolute_distance() {
        let levels = vec![level(90.0, 0.5), level(105.0, 0.3), level(101.0, 0.9)];
        let nearest = nearest_levels(&levels, 100.0, 2);
        assert_eq!(nearest.len(), 2);
        assert_eq!(nearest[0].level.price, 101.0);
        assert_eq!(nearest[1].level.price, 105.0);
    }

    #[test]
    fn ties_are_broken_by_strength_descending() {
        let levels = vec![level(95.0, 0.2), level(105.0, 0.8)];
        let nearest = nearest_levels(&levels, 100.0, 2);
        assert_eq!(nearest[0].level.price, 105.0);
    }
}
