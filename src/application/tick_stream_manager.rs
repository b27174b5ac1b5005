//! TickStreamManager (component C5).
//!
//! Owns the registry of [`CandleAggregator`]s keyed by `(symbol, timeframe)`,
//! grounded on the `Arc<RwLock<HashMap<...>>>` registry idiom of
//! `application/monitoring/correlation_service.rs::CorrelationService`
//! (background-refreshed matrix keyed by a symbol pair) combined with the
//! lazy-creation pattern of the teacher's `CandleBuilder` map in
//! `application/market_data/candle_aggregator.rs`. Subscriptions are
//! reference-counted per `(symbol, timeframe)` so an aggregator is only
//! torn down once every interested session has unsubscribed and the grace
//! period has elapsed (spec §4.4/§9).

use crate::domain::candle::{Candle, PartialCandle, Tick};
use crate::domain::errors::TickError;
use crate::domain::timeframe::Timeframe;
use chrono::{DateTime, Duration, Utc};
use std::collections::{HashMap, HashSet};
use std::sync::{Arc, Mutex};
use tokio::sync::RwLock;
use tracing::{debug, info};
use uuid::Uuid;

use crate::application::candle_aggregator::CandleAggregator;

type Key = (String, Timeframe);

/// Result of dispatching a tick to every aggregator subscribed to its
/// symbol: one outcome per `(symbol, timeframe)` pair that had an open
/// or newly-created aggregator for this tick.
#[derive(Debug, Clone)]
pub struct TickDispatchEntry {
    pub timeframe: Timeframe,
    pub partial: Option<PartialCandle>,
    pub completed: Option<Candle>,
    pub synthetic_fills: Vec<Candle>,
}

/// One aggregator's slot in the registry. `aggregator` carries its own
/// short-lived sync lock, grounded on the `Mutex`-per-field idiom of
/// `connection_manager.rs::Session`, so a caller that already resolved the
/// slot via a brief registry read lock can drive `on_tick` without holding
/// the registry lock — ticks for unrelated symbols never contend on it.
struct AggregatorSlot {
    aggregator: Mutex<CandleAggregator>,
    subscribers: Mutex<HashSet<Uuid>>,
    /// Set when `subscribers` became empty; the aggregator is retired
    /// once `now - retired_at >= grace period` (spec §4.4 "keep aggregators
    /// alive for a grace period after last unsubscribe").
    retired_at: Mutex<Option<DateTime<Utc>>>,
}

pub struct TickStreamManager {
    aggregators: RwLock<HashMap<Key, Arc<AggregatorSlot>>>,
    tolerance: Duration,
    synthetic_fill: bool,
    grace_period: Duration,
}

impl TickStreamManager {
    pub fn new(tolerance_seconds: i64, synthetic_fill: bool, grace_period_seconds: u64) -> Self {
        Self {
            aggregators: RwLock::new(HashMap::new()),
            tolerance: Duration::seconds(tolerance_seconds),
            synthetic_fill,
            grace_period: Duration::seconds(grace_period_seconds as i64),
        }
    }

    /// Registers `session_id` as interested in `(symbol, timeframe)`,
    /// creating the aggregator on first interest and un-retiring it if a
    /// grace-period teardown was pending.
    pub async fn subscribe(&self, session_id: Uuid, symbol: &str, timeframe: Timeframe) {
        let key = (symbol.to_string(), timeframe);
        let mut guard = self.aggregators.write().await;
        let slot = guard.entry(key).or_insert_with(|| {
            debug!(symbol, %timeframe, "creating aggregator for new subscription");
            Arc::new(AggregatorSlot {
                aggregator: Mutex::new(CandleAggregator::with_policy(
                    symbol,
                    timeframe,
                    self.tolerance,
                    self.synthetic_fill,
                )),
                subscribers: Mutex::new(HashSet::new()),
                retired_at: Mutex::new(None),
            })
        });
        slot.subscribers.lock().unwrap().insert(session_id);
        *slot.retired_at.lock().unwrap() = None;
    }

    /// Removes `session_id`'s interest in `(symbol, timeframe)`. The
    /// aggregator is marked retired (not dropped) once no subscriber
    /// remains; [`Self::reap_retired`] evicts it after the grace period.
    pub async fn unsubscribe(&self, session_id: Uuid, symbol: &str, timeframe: Timeframe) {
        let key = (symbol.to_string(), timeframe);
        let guard = self.aggregators.write().await;
        if let Some(slot) = guard.get(&key) {
            let mut subscribers = slot.subscribers.lock().unwrap();
            subscribers.remove(&session_id);
            if subscribers.is_empty() {
                *slot.retired_at.lock().unwrap() = Some(Utc::now());
            }
        }
    }

    /// Drops every aggregator retired for at least the grace period.
    /// Intended to run on a periodic tick from the lifecycle supervisor.
    pub async fn reap_retired(&self) -> usize {
        let now = Utc::now();
        let mut guard = self.aggregators.write().await;
        let before = guard.len();
        guard.retain(|_, slot| match *slot.retired_at.lock().unwrap() {
            Some(retired_at) => now - retired_at < self.grace_period,
            None => true,
        });
        before - guard.len()
    }

    /// Dispatches `tick` to every aggregator registered for `tick`'s
    /// symbol, across all subscribed timeframes, per spec §4.4: "look up
    /// every aggregator for tick.symbol (across all subscribed
    /// timeframes)". Per-aggregator validation errors are counted inside
    /// the aggregator and never abort the fan-out to the others.
    ///
    /// Only the registry lookup takes the registry lock, and only for as
    /// long as it takes to clone out the matching `Arc<AggregatorSlot>`s;
    /// the actual `on_tick` call runs through each slot's own aggregator
    /// lock, so a tick for one symbol never blocks on aggregators for a
    /// different symbol (cross-aggregator parallelism, spec §4.4/§9).
    pub async fn process_tick(&self, symbol: &str, tick: Tick) -> Vec<TickDispatchEntry> {
        let matching: Vec<(Timeframe, Arc<AggregatorSlot>)> = {
            let guard = self.aggregators.read().await;
            guard
                .iter()
                .filter(|(key, _)| key.0 == symbol)
                .map(|(key, slot)| (key.1, Arc::clone(slot)))
                .collect()
        };

        let mut out = Vec::new();
        for (timeframe, slot) in matching {
            let outcome = slot.aggregator.lock().unwrap().on_tick(tick);
            match outcome {
                Ok(outcome) => out.push(TickDispatchEntry {
                    timeframe,
                    partial: outcome.partial,
                    completed: outcome.completed,
                    synthetic_fills: outcome.synthetic_fills,
                }),
                Err(TickError::InvalidTick { reason, .. }) => {
                    debug!(symbol, %timeframe, reason, "tick rejected by aggregator");
                }
            }
        }
        out
    }

    /// Emits a final partial for every live aggregator (shutdown drain,
    /// spec §4.9).
    pub async fn flush_all(&self) -> Vec<(String, Timeframe, PartialCandle)> {
        let guard = self.aggregators.read().await;
        guard
            .iter()
            .filter_map(|((symbol, timeframe), slot)| {
                slot.aggregator
                    .lock()
                    .unwrap()
                    .flush_partial()
                    .map(|p| (symbol.clone(), *timeframe, p))
            })
            .collect()
    }

    pub async fn active_count(&self) -> usize {
        self.aggregators.read().await.len()
    }
}

impl Default for TickStreamManager {
    fn default() -> Self {
        info!("TickStreamManager: using default policy (no tolerance, no synthetic fill, 60s grace)");
        Self::new(0, false, 60)
    }
}
