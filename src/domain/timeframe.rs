//! Timeframe parsing, normalization and bucket alignment (component C1).
//!
//! A single definition of bucket alignment is a precondition for
//! reproducibility and for out-of-order handling to be deterministic:
//! every aggregator computes bucket boundaries exclusively through
//! [`Timeframe::bucket_start`].

use crate::domain::errors::ValidationError;
use chrono::{DateTime, Datelike, Duration, TimeZone, Utc, Weekday};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// A canonical, validated timeframe. Construct via [`Timeframe::normalize`]
/// or [`FromStr`]; there is no way to build one carrying a non-canonical
/// interval string.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Timeframe {
    M1,
    M3,
    M5,
    M10,
    M15,
    M30,
    H1,
    H2,
    H4,
    D1,
    W1,
    Mo1,
}

impl Timeframe {
    pub fn all() -> [Timeframe; 12] {
        [
            Timeframe::M1,
            Timeframe::M3,
            Timeframe::M5,
            Timeframe::M10,
            Timeframe::M15,
            Timeframe::M30,
            Timeframe::H1,
            Timeframe::H2,
            Timeframe::H4,
            Timeframe::D1,
            Timeframe::W1,
            Timeframe::Mo1,
        ]
    }

    pub fn canonical(&self) -> &'static str {
        match self {
            Timeframe::M1 => "1m",
            Timeframe::M3 => "3m",
            Timeframe::M5 => "5m",
            Timeframe::M10 => "10m",
            Timeframe::M15 => "15m",
            Timeframe::M30 => "30m",
            Timeframe::H1 => "1h",
            Timeframe::H2 => "2h",
            Timeframe::H4 => "4h",
            Timeframe::D1 => "1d",
            Timeframe::W1 => "1w",
            Timeframe::Mo1 => "1M",
        }
    }

    /// Bucket width in seconds for intraday/daily/weekly timeframes.
    /// `1M` has no constant width (calendar months vary); callers needing
    /// a width for `1M` should use [`Timeframe::bucket_start`] and measure
    /// the distance to the next one instead of relying on a fixed value.
    pub fn duration_seconds(&self) -> Option<i64> {
        match self {
            Timeframe::M1 => Some(60),
            Timeframe::M3 => Some(3 * 60),
            Timeframe::M5 => Some(5 * 60),
            Timeframe::M10 => Some(10 * 60),
            Timeframe::M15 => Some(15 * 60),
            Timeframe::M30 => Some(30 * 60),
            Timeframe::H1 => Some(3600),
            Timeframe::H2 => Some(2 * 3600),
            Timeframe::H4 => Some(4 * 3600),
            Timeframe::D1 => Some(86_400),
            Timeframe::W1 => Some(7 * 86_400),
            Timeframe::Mo1 => None,
        }
    }

    /// Normalizes a raw interval string (e.g. `"5m"`, `"min"`, `"daily"`,
    /// `"1H"`) into a canonical [`Timeframe`]. Accepts the documented
    /// aliases (`min -> m`, `hour -> h`, `daily -> 1d`, `weekly -> 1w`,
    /// `monthly -> 1M`).
    pub fn normalize(raw: &str) -> Result<Timeframe, ValidationError> {
        let trimmed = raw.trim();
        let lower = trimmed.to_lowercase();
        let tf = match lower.as_str() {
            "daily" => Timeframe::D1,
            "weekly" => Timeframe::W1,
            "monthly" => Timeframe::Mo1,
            _ => {
                let (num_part, unit_part) = split_numeric_suffix(&lower)
                    .ok_or_else(|| ValidationError::InvalidTimeframe(raw.to_string()))?;
                let n: u32 = if num_part.is_empty() {
                    1
                } else {
                    num_part
                        .parse()
                        .map_err(|_| ValidationError::InvalidTimeframe(raw.to_string()))?
                };
                let unit = normalize_unit(unit_part)
                    .ok_or_else(|| ValidationError::InvalidTimeframe(raw.to_string()))?;
                from_count_unit(n, unit)
                    .ok_or_else(|| ValidationError::InvalidTimeframe(raw.to_string()))?
            }
        };
        Ok(tf)
    }

    /// Computes the bucket start for `timestamp` under this timeframe.
    /// Pure: never mutates its input. For `1M` the result is aligned to
    /// the first instant of the containing UTC calendar month; for `1w`
    /// it is aligned to the preceding Monday 00:00 UTC; all other widths
    /// use `floor(timestamp_seconds / width) * width` in UTC.
    pub fn bucket_start(&self, timestamp: DateTime<Utc>) -> DateTime<Utc> {
        match self {
            Timeframe::Mo1 => {
                let naive = timestamp
                    .date_naive()
                    .with_day(1)
                    .expect("day 1 is always valid");
                naive
                    .and_hms_opt(0, 0, 0)
                    .expect("midnight is always valid")
                    .and_utc()
            }
            Timeframe::W1 => {
                let naive = timestamp.date_naive();
                let days_since_monday = naive.weekday().num_days_from_monday() as i64;
                let monday = naive - Duration::days(days_since_monday);
                monday
                    .and_hms_opt(0, 0, 0)
                    .expect("midnight is always valid")
                    .and_utc()
            }
            _ => {
                let width = self
                    .duration_seconds()
                    .expect("all non-1M timeframes have a fixed width");
                let secs = timestamp.timestamp();
                let floored = secs.div_euclid(width) * width;
                Utc.timestamp_opt(floored, 0)
                    .single()
                    .expect("floored timestamp is always in range")
            }
        }
    }

    /// The start of the bucket immediately following `bucket_start`
    /// (which must itself already be a bucket start). Used by the
    /// aggregator's optional synthetic-fill path to step across a gap
    /// one bucket at a time.
    pub fn next_bucket_start(&self, bucket_start: DateTime<Utc>) -> DateTime<Utc> {
        match self {
            Timeframe::Mo1 => {
                let naive = bucket_start.date_naive();
                let (year, month) = if naive.month() == 12 {
                    (naive.year() + 1, 1)
                } else {
                    (naive.year(), naive.month() + 1)
                };
                chrono::NaiveDate::from_ymd_opt(year, month, 1)
                    .expect("valid first-of-month")
                    .and_hms_opt(0, 0, 0)
                    .expect("midnight is always valid")
                    .and_utc()
            }
            _ => {
                let width = self
                    .duration_seconds()
                    .expect("all non-1M timeframes have a fixed width");
                bucket_start + Duration::seconds(width)
            }
        }
    }
}

impl fmt::Display for Timeframe {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.canonical())
    }
}

impl FromStr for Timeframe {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Timeframe::normalize(s)
    }
}

enum Unit {
    Minute,
    Hour,
    Day,
    Week,
    Month,
}

fn normalize_unit(raw: &str) -> Option<Unit> {
    match raw {
        "m" | "min" => Some(Unit::Minute),
        "h" | "hour" => Some(Unit::Hour),
        "d" => Some(Unit::Day),
        "w" => Some(Unit::Week),
        "M" => Some(Unit::Month),
        _ => None,
    }
}

fn from_count_unit(n: u32, unit: Unit) -> Option<Timeframe> {
    match (unit, n) {
        (Unit::Minute, 1) => Some(Timeframe::M1),
        (Unit::Minute, 3) => Some(Timeframe::M3),
        (Unit::Minute, 5) => Some(Timeframe::M5),
        (Unit::Minute, 10) => Some(Timeframe::M10),
        (Unit::Minute, 15) => Some(Timeframe::M15),
        (Unit::Minute, 30) => Some(Timeframe::M30),
        (Unit::Hour, 1) => Some(Timeframe::H1),
        (Unit::Hour, 2) => Some(Timeframe::H2),
        (Unit::Hour, 4) => Some(Timeframe::H4),
        (Unit::Day, 1) => Some(Timeframe::D1),
        (Unit::Week, 1) => Some(Timeframe::W1),
        (Unit::Month, 1) => Some(Timeframe::Mo1),
        _ => None,
    }
}

/// Splits `"15m"` into `("15", "m")`, `"m"` into `("", "m")`. The unit
/// suffix is case-sensitive only for `M` (month) vs `m` (minute) so we
/// special-case it before lower-casing the rest of the caller's input.
fn split_numeric_suffix(s: &str) -> Option<(&str, &str)> {
    let split_at = s.find(|c: char| !c.is_ascii_digit())?;
    Some((&s[..split_at], &s[split_at..]))
}
