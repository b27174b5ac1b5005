//! CandleAggregator (component C4) — the hot loop.
//!
//! One instance is owned by exactly one (symbol, timeframe) pair and is
//! strictly single-producer: only one task calls [`CandleAggregator::on_tick`]
//! at a time. Grounded on the teacher's `CandleBuilder`/`on_quote` state
//! machine (`application/market_data/candle_aggregator.rs`) merged with
//! the period-rollover bookkeeping of `timeframe_aggregator.rs`'s
//! `TimeframeCandle::update`, since this spec's aggregator does both jobs
//! directly from ticks rather than composing 1-minute candles.

use crate::domain::candle::{Candle, PartialCandle, Tick};
use crate::domain::errors::TickError;
use crate::domain::timeframe::Timeframe;
use chrono::{DateTime, Duration, Utc};
use rust_decimal::Decimal;
use tracing::{debug, warn};

#[derive(Debug, Clone)]
struct OpenCandle {
    bucket_start: DateTime<Utc>,
    open: Decimal,
    high: Decimal,
    low: Decimal,
    close: Decimal,
    volume: Decimal,
    vwap: Decimal,
    tick_count: u64,
}

impl OpenCandle {
    fn start(bucket_start: DateTime<Utc>, tick: &Tick) -> Self {
        Self {
            bucket_start,
            open: tick.price,
            high: tick.price,
            low: tick.price,
            close: tick.price,
            volume: tick.size,
            vwap: tick.price,
            tick_count: 1,
        }
    }

    fn extend(&mut self, tick: &Tick) {
        if tick.price > self.high {
            self.high = tick.price;
        }
        if tick.price < self.low {
            self.low = tick.price;
        }
        self.close = tick.price;
        let new_volume = self.volume + tick.size;
        self.vwap = if new_volume > Decimal::ZERO {
            (self.vwap * self.volume + tick.price * tick.size) / new_volume
        } else {
            tick.price
        };
        self.volume = new_volume;
        self.tick_count += 1;
    }

    fn to_partial(&self, symbol: &str, timeframe: Timeframe) -> PartialCandle {
        PartialCandle {
            symbol: symbol.to_string(),
            timeframe,
            bucket_start: self.bucket_start,
            open: self.open,
            high: self.high,
            low: self.low,
            close: self.close,
            volume: self.volume,
            vwap: self.vwap,
            tick_count: self.tick_count,
            is_complete: false,
        }
    }

    fn into_candle(self, symbol: &str, timeframe: Timeframe) -> Candle {
        Candle {
            symbol: symbol.to_string(),
            timeframe,
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

    /// A synthetic flat fill candle for a bucket with no real ticks:
    /// OHLC = last close, volume = 0.
    fn synthetic(bucket_start: DateTime<Utc>, last_close: Decimal) -> Self {
        Self {
            bucket_start,
            open: last_close,
            high: last_close,
            low: last_close,
            close: last_close,
            volume: Decimal::ZERO,
            vwap: last_close,
            tick_count: 0,
        }
    }
}

/// Output of a single [`CandleAggregator::on_tick`] call.
#[derive(Debug, Clone, Default)]
pub struct TickOutcome {
    pub partial: Option<PartialCandle>,
    pub completed: Option<Candle>,
    /// Flat fill candles for buckets strictly between the previously
    /// open bucket and the new one, emitted only when synthetic fill is
    /// enabled (spec §9 open question, `SYNTHETIC_FILL_GAPS`).
    pub synthetic_fills: Vec<Candle>,
}

pub struct CandleAggregator {
    symbol: String,
    timeframe: Timeframe,
    open: Option<OpenCandle>,
    last_completed_bucket: Option<DateTime<Utc>>,
    tolerance: Duration,
    synthetic_fill: bool,
    pub late_dropped: u64,
    pub invalid_dropped: u64,
}

impl CandleAggregator {
    pub fn new(symbol: impl Into<String>, timeframe: Timeframe) -> Self {
        Self::with_policy(symbol, timeframe, Duration::zero(), false)
    }

    pub fn with_policy(
        symbol: impl Into<String>,
        timeframe: Timeframe,
        tolerance: Duration,
        synthetic_fill: bool,
    ) -> Self {
        Self {
            symbol: symbol.into(),
            timeframe,
            open: None,
            last_completed_bucket: None,
            tolerance,
            synthetic_fill,
            late_dropped: 0,
            invalid_dropped: 0,
        }
    }

    pub fn symbol(&self) -> &str {
        &self.symbol
    }

    pub fn timeframe(&self) -> Timeframe {
        self.timeframe
    }

    /// Processes one tick, returning partial/completed/synthetic events
    /// per spec §4.3. Rejects negative price/size as `InvalidTick`
    /// without mutating any state.
    pub fn on_tick(&mut self, tick: Tick) -> Result<TickOutcome, TickError> {
        if tick.price < Decimal::ZERO || tick.size < Decimal::ZERO {
            self.invalid_dropped += 1;
            return Err(TickError::InvalidTick {
                symbol: self.symbol.clone(),
                reason: "negative price or size".to_string(),
            });
        }

        let b = self.timeframe.bucket_start(tick.timestamp);

        let Some(open) = self.open.as_mut() else {
            let new_open = OpenCandle::start(b, &tick);
            let partial = new_open.to_partial(&self.symbol, self.timeframe);
            self.open = Some(new_open);
            debug!(symbol = %self.symbol, timeframe = %self.timeframe, "first tick, aggregation started");
            return Ok(TickOutcome {
                partial: Some(partial),
                completed: None,
                synthetic_fills: Vec::new(),
            });
        };

        if b == open.bucket_start {
            open.extend(&tick);
            let partial = open.to_partial(&self.symbol, self.timeframe);
            return Ok(TickOutcome {
                partial: Some(partial),
                completed: None,
                synthetic_fills: Vec::new(),
            });
        }

        if b > open.bucket_start {
            let closed = self.open.take().expect("checked Some above");
            let closed_bucket_start = closed.bucket_start;
            let last_close = closed.close;
            let completed = closed.into_candle(&self.symbol, self.timeframe);
            self.last_completed_bucket = Some(closed_bucket_start);

            let mut synthetic_fills = Vec::new();
            if self.synthetic_fill {
                let mut cursor = self.timeframe.next_bucket_start(closed_bucket_start);
                // Bounded: a pathological gap (e.g. months of silence on
                // a 1-minute timeframe) would otherwise allocate an
                // unbounded number of flat candles.
                const MAX_SYNTHETIC_FILLS: usize = 100_000;
                while cursor < b && synthetic_fills.len() < MAX_SYNTHETIC_FILLS {
                    let filler = OpenCandle::synthetic(cursor, last_close);
                    synthetic_fills.push(filler.into_candle(&self.symbol, self.timeframe));
                    self.last_completed_bucket = Some(cursor);
                    cursor = self.timeframe.next_bucket_start(cursor);
                }
            }

            let new_open = OpenCandle::start(b, &tick);
            let partial = new_open.to_partial(&self.symbol, self.timeframe);
            self.open = Some(new_open);

            return Ok(TickOutcome {
                partial: Some(partial),
                completed: Some(completed),
                synthetic_fills,
            });
        }

        // b < open.bucket_start: a tick for an already-closed bucket.
        // Never matches the open bucket (that case is handled above), so
        // per spec §4.3 rule 5/6 it is always dropped; we distinguish
        // only for the out-of-order tolerance window used elsewhere in
        // the pipeline's diagnostics.
        let within_tolerance = self
            .last_completed_bucket
            .map(|last| b >= last - self.tolerance)
            .unwrap_or(true);
        self.late_dropped += 1;
        if within_tolerance {
            warn!(symbol = %self.symbol, timeframe = %self.timeframe, "dropped late tick within tolerance window");
        } else {
            warn!(symbol = %self.symbol, timeframe = %self.timeframe, "dropped late tick outside tolerance window");
        }
        Ok(TickOutcome::default())
    }

    /// Emits the currently-open bucket as a final, still-incomplete
    /// partial (spec §4.9 shutdown drain: "emit any final partial as
    /// `complete: false` one last time").
    pub fn flush_partial(&self) -> Option<PartialCandle> {
        self.open
            .as_ref()
            .map(|o| o.to_partial(&self.symbol, self.timeframe))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use rust_decimal_macros::dec;

    fn tick(ts: DateTime<Utc>, price: Decimal, size: Decimal) -> Tick {
        Tick {
            timestamp: ts,
            price,
            size,
        }
    }

    fn t(h: u32, m: u32, s: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 1, 1, h, m, s).unwrap()
    }

    /// S1 — single-bucket aggregation, 1m.
    #[test]
    fn s1_single_bucket_aggregation() {
        let mut agg = CandleAggregator::new("AAPL", Timeframe::M1);

        let o1 = agg.on_tick(tick(t(9, 30, 5), dec!(100.0), dec!(10))).unwrap();
        assert!(o1.completed.is_none());
        assert_eq!(o1.partial.unwrap().tick_count, 1);

        let o2 = agg
            .on_tick(tick(t(9, 30, 20), dec!(101.5), dec!(5)))
            .unwrap();
        assert!(o2.completed.is_none());

        let o3 = agg
            .on_tick(tick(t(9, 30, 45), dec!(99.5), dec!(20)))
            .unwrap();
        assert!(o3.completed.is_none());
        let p3 = o3.partial.unwrap();
        assert_eq!(p3.tick_count, 3);

        let o4 = agg.on_tick(tick(t(9, 31, 2), dec!(102.0), dec!(1))).unwrap();
        let completed = o4.completed.unwrap();
        assert_eq!(completed.open, dec!(100.0));
        assert_eq!(completed.high, dec!(101.5));
        assert_eq!(completed.low, dec!(99.5));
        assert_eq!(completed.close, dec!(99.5));
        assert_eq!(completed.volume, dec!(35));
        assert_eq!(completed.tick_count, 3);
        // (100*10 + 101.5*5 + 99.5*20) / 35
        let expected_vwap = (dec!(100.0) * dec!(10) + dec!(101.5) * dec!(5) + dec!(99.5) * dec!(20))
            / dec!(35);
        assert_eq!(completed.vwap, expected_vwap);

        let new_partial = o4.partial.unwrap();
        assert_eq!(new_partial.open, dec!(102.0));
        assert_eq!(new_partial.volume, dec!(1));
        assert_eq!(new_partial.tick_count, 1);
        assert!(o4.synthetic_fills.is_empty());
    }

    /// S2 — gap handling: jumping far ahead closes in O(1), no fills by
    /// default.
    #[test]
    fn s2_gap_handling_no_synthetic_fill_by_default() {
        let mut agg = CandleAggregator::new("AAPL", Timeframe::M1);
        agg.on_tick(tick(t(9, 30, 5), dec!(100.0), dec!(10))).unwrap();
        agg.on_tick(tick(t(9, 31, 2), dec!(102.0), dec!(1))).unwrap();

        let outcome = agg.on_tick(tick(t(9, 45, 10), dec!(103.0), dec!(2))).unwrap();
        let completed = outcome.completed.unwrap();
        assert_eq!(completed.open, dec!(102.0));
        assert_eq!(completed.volume, dec!(1));
        assert!(outcome.synthetic_fills.is_empty());
        assert_eq!(outcome.partial.unwrap().open, dec!(103.0));
    }

    #[test]
    fn gap_with_synthetic_fill_enabled_fills_every_bucket() {
        let mut agg =
            CandleAggregator::with_policy("AAPL", Timeframe::M1, Duration::zero(), true);
        agg.on_tick(tick(t(9, 30, 0), dec!(100.0), dec!(10))).unwrap();
        let outcome = agg.on_tick(tick(t(9, 33, 0), dec!(105.0), dec!(1))).unwrap();
        // buckets 9:31 and 9:32 should be filled flat at last close (100.0)
        assert_eq!(outcome.synthetic_fills.len(), 2);
        for fill in &outcome.synthetic_fills {
            assert_eq!(fill.open, dec!(100.0));
            assert_eq!(fill.volume, dec!(0));
        }
    }

    /// S3 — out-of-order drop.
    #[test]
    fn s3_out_of_order_tick_is_dropped() {
        let mut agg = CandleAggregator::new("AAPL", Timeframe::M1);
        agg.on_tick(tick(t(9, 30, 5), dec!(100.0), dec!(10))).unwrap();
        agg.on_tick(tick(t(9, 31, 2), dec!(102.0), dec!(1))).unwrap();

        let outcome = agg
            .on_tick(tick(t(9, 30, 55), dec!(98.0), dec!(100)))
            .unwrap();
        assert!(outcome.completed.is_none());
        assert!(outcome.partial.is_none());
        assert_eq!(agg.late_dropped, 1);
    }

    #[test]
    fn zero_size_tick_updates_high_low_close_but_not_vwap_or_volume() {
        let mut agg = CandleAggregator::new("AAPL", Timeframe::M1);
        agg.on_tick(tick(t(9, 30, 0), dec!(100.0), dec!(10))).unwrap();
        let before_vwap = agg.open.as_ref().unwrap().vwap;
        let outcome = agg.on_tick(tick(t(9, 30, 5), dec!(105.0), dec!(0))).unwrap();
        let partial = outcome.partial.unwrap();
        assert_eq!(partial.high, dec!(105.0));
        assert_eq!(partial.close, dec!(105.0));
        assert_eq!(partial.volume, dec!(10));
        assert_eq!(partial.vwap, before_vwap);
    }

    #[test]
    fn negative_price_is_rejected_as_invalid_tick() {
        let mut agg = CandleAggregator::new("AAPL", Timeframe::M1);
        let err = agg.on_tick(tick(t(9, 30, 0), dec!(-1.0), dec!(1)));
        assert!(err.is_err());
        assert_eq!(agg.invalid_dropped, 1);
    }

    #[test]
    fn completed_candles_satisfy_invariants_and_monotonic_bucket_start() {
        let mut agg = CandleAggregator::new("AAPL", Timeframe::M1);
        agg.on_tick(tick(t(9, 30, 0), dec!(100.0), dec!(10))).unwrap();
        let first_completed = agg
            .on_tick(tick(t(9, 31, 0), dec!(101.0), dec!(5)))
            .unwrap()
            .completed
            .unwrap();
        assert!(first_completed.check_invariants());

        let second_completed = agg
            .on_tick(tick(t(9, 32, 0), dec!(102.0), dec!(1)))
            .unwrap()
            .completed
            .unwrap();
        assert!(second_completed.check_invariants());
        assert!(second_completed.bucket_start > first_completed.bucket_start);
    }

    #[test]
    fn flush_partial_emits_current_open_bucket_incomplete() {
        let mut agg = CandleAggregator::new("AAPL", Timeframe::M1);
        assert!(agg.flush_partial().is_none());
        agg.on_tick(tick(t(9, 30, 0), dec!(100.0), dec!(1))).unwrap();
        let flushed = agg.flush_partial().unwrap();
        assert!(!flushed.is_complete);
        assert_eq!(flushed.tick_count, 1);
    }
}
