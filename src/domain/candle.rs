//! Candle model (component C3): OHLCV + timeframe record, with a
//! `PartialCandle` variant for the currently-open bucket.
//!
//! Grounded on the teacher's `domain/trading/types.rs::Candle`, extended
//! with the fields spec §3 requires (`timeframe`, `bucket_start`,
//! `vwap`, `tick_count`) that the teacher's single-timeframe model
//! doesn't carry.

use crate::domain::timeframe::Timeframe;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// A single trade print. Prices and sizes are validated (non-negative)
/// before reaching an aggregator; see [`crate::domain::validation`].
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Tick {
    pub timestamp: DateTime<Utc>,
    pub price: Decimal,
    pub size: Decimal,
}

/// A completed, immutable candle. Once emitted it is exclusively read by
/// any number of concurrent subscribers; construction is the sole
/// responsibility of the owning [`crate::application::candle_aggregator::CandleAggregator`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Candle {
    pub symbol: String,
    pub timeframe: Timeframe,
    pub bucket_start: DateTime<Utc>,
    pub open: Decimal,
    pub high: Decimal,
    pub low: Decimal,
    pub close: Decimal,
    pub volume: Decimal,
    pub vwap: Decimal,
    pub tick_count: u64,
}

/// The currently-open candle for a bucket that has not yet closed.
/// Carries the same fields as [`Candle`] plus `is_complete = false`;
/// replaced in subscriber views by a [`Candle`] when the bucket closes.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PartialCandle {
    pub symbol: String,
    pub timeframe: Timeframe,
    pub bucket_start: DateTime<Utc>,
    pub open: Decimal,
    pub high: Decimal,
    pub low: Decimal,
    pub close: Decimal,
    pub volume: Decimal,
    pub vwap: Decimal,
    pub tick_count: u64,
    pub is_complete: bool,
}

impl PartialCandle {
    pub fn into_candle(self) -> Candle {
        Candle {
            symbol: self.symbol,
            timeframe: self.timeframe,
            bucket_start: self.bucket_start,
            open: self.open,
            high: self.high,
            low: self.low,
            close: self.close,
            volume: self.volume,
            vwap: self.vwap,
            tick_count: self.tick_count,
        }
    }
}

impl Candle {
    /// Checks the invariants of spec §3:
    /// `low <= min(open, close) <= max(open, close) <= high`,
    /// `volume >= 0`, `tick_count >= 1`, and
    /// `vwap in [low, high]` unless `volume == 0` (then `vwap == close`).
    pub fn check_invariants(&self) -> bool {
        if self.low > self.open.min(self.close) || self.open.max(self.close) > self.high {
            return false;
        }
        if self.low > self.high {
            return false;
        }
        if self.volume < Decimal::ZERO {
            return false;
        }
        if self.tick_count < 1 {
            return false;
        }
        if self.volume == Decimal::ZERO {
            self.vwap == self.close
        } else {
            self.vwap >= self.low && self.vwap <= self.high
        }
    }
}
