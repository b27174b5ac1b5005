//! Application lifecycle (component C12): wires the tick pipeline,
//! connection registry and broadcaster together, drives the
//! subscribe/unsubscribe handshake, and drains state on shutdown.
//!
//! Grounded on the teacher's `application/system.rs::Application` —
//! a single struct owning every long-lived service and exposing
//! `build`/`start`/shutdown-on-signal — generalized from a portfolio/
//! broker wiring to this service's tick-ingestion/broadcast wiring.

use crate::application::broadcaster::Broadcaster;
use crate::application::connection_manager::ConnectionManager;
use crate::application::indicators;
use crate::application::support_resistance::{self, SrParams};
use crate::application::tick_stream_manager::TickStreamManager;
use crate::config::Config;
use crate::domain::candle::{Candle, Tick};
use crate::domain::errors::{SessionError, ValidationError};
use crate::domain::schemas::{AckAction, InboundMessage};
use crate::domain::timeframe::Timeframe;
use crate::domain::validation;
use crate::infrastructure::historical_source::HistoricalSource;
use std::collections::{HashMap, HashSet, VecDeque};
use std::sync::Arc;
use tokio::sync::RwLock;
use tokio::time::{interval, Duration as TokioDuration};
use tracing::{info, warn};
use uuid::Uuid;

/// Candles kept in memory per `(symbol, timeframe)` to feed indicator
/// and support/resistance recomputation on every close (spec §4.5/§4.6
/// both operate over "the trailing window", not the full history).
const HISTORY_CAPACITY: usize = 500;

pub struct Application {
    pub config: Config,
    pub ticks: Arc<TickStreamManager>,
    pub connections: Arc<ConnectionManager>,
    pub broadcaster: Broadcaster,
    pub historical: Arc<dyn HistoricalSource>,
    history: RwLock<HashMap<(String, Timeframe), VecDeque<Candle>>>,
}

impl Application {
    pub fn new(config: Config, historical: Arc<dyn HistoricalSource>) -> Arc<Self> {
        let ticks = Arc::new(TickStreamManager::new(
            config.out_of_order_tolerance_seconds,
            config.synthetic_fill_gaps,
            config.aggregator_grace_seconds,
        ));
        let connections = Arc::new(ConnectionManager::new(
            config.max_sessions,
            config.queue_depth,
            config.drop_threshold,
            config.heartbeat_seconds,
        ));
        let broadcaster = Broadcaster::new(connections.clone());

        Arc::new(Self {
            config,
            ticks,
            connections,
            broadcaster,
            historical,
            history: RwLock::new(HashMap::new()),
        })
    }

    /// Spawns the periodic aggregator-reap and heartbeat tasks. Intended
    /// to be called once after construction; the returned handles are
    /// aborted on shutdown.
    pub fn spawn_background_tasks(self: &Arc<Self>) -> Vec<tokio::task::JoinHandle<()>> {
        let reap_app = self.clone();
        let reap_handle = tokio::spawn(async move {
            let mut ticker = interval(TokioDuration::from_secs(reap_app.config.aggregator_grace_seconds.max(1)));
            loop {
                ticker.tick().await;
                let reaped = reap_app.ticks.reap_retired().await;
                if reaped > 0 {
                    info!(reaped, "retired aggregators reclaimed");
                }
            }
        });

        let heartbeat_app = self.clone();
        let heartbeat_handle = tokio::spawn(async move {
            let mut ticker = interval(TokioDuration::from_secs(heartbeat_app.config.heartbeat_seconds.max(1)));
            loop {
                ticker.tick().await;
                heartbeat_app.broadcaster.heartbeat_all().await;
                for stale in heartbeat_app.connections.stale_sessions().await {
                    warn!(session_id = %stale, "session missed heartbeat deadline, disconnecting");
                    heartbeat_app.connections.remove(stale).await;
                }
            }
        });

        vec![reap_handle, heartbeat_handle]
    }

    /// Processes an inbound tick for `symbol`: fans it out to every
    /// subscribed timeframe's aggregator, then broadcasts the resulting
    /// partial/completed candles and recomputes indicators for any bar
    /// that just closed (spec §4.4/§4.5/§9).
    pub async fn ingest_tick(&self, symbol: &str, tick: Tick) {
        let entries = self.ticks.process_tick(symbol, tick).await;
        for entry in entries {
            if let Some(completed) = entry.completed {
                self.on_completed_candle(symbol, entry.timeframe, completed).await;
            }
            for synthetic in entry.synthetic_fills {
                self.on_completed_candle(symbol, entry.timeframe, synthetic).await;
            }
            if let Some(partial) = entry.partial {
                self.broadcaster.broadcast_partial(symbol, entry.timeframe, partial).await;
            }
        }
    }

    async fn on_completed_candle(&self, symbol: &str, timeframe: Timeframe, candle: Candle) {
        self.broadcaster.broadcast_completed(symbol, timeframe, candle.clone()).await;

        let window = self.push_history(symbol, timeframe, candle).await;
        let result = indicators::compute(&window, &indicators::Requested::All, &HashMap::new());
        if !result.errors.is_empty() {
            warn!(symbol, %timeframe, errors = result.errors.len(), "some indicators failed to compute");
        }
        self.broadcaster.broadcast_indicators(symbol, timeframe, result.values).await;
    }

    async fn push_history(&self, symbol: &str, timeframe: Timeframe, candle: Candle) -> Vec<Candle> {
        let key = (symbol.to_string(), timeframe);
        let mut guard = self.history.write().await;
        let window = guard.entry(key).or_insert_with(VecDeque::new);
        window.push_back(candle);
        while window.len() > HISTORY_CAPACITY {
            window.pop_front();
        }
        window.iter().cloned().collect()
    }

    /// Computes support/resistance levels over a session's current
    /// in-memory history for `(symbol, timeframe)` (spec §4.6); returns
    /// `None` if no candles have been observed yet.
    pub async fn support_resistance_snapshot(
        &self,
        symbol: &str,
        timeframe: Timeframe,
        params: SrParams,
    ) -> Option<crate::domain::sr::SupportResistanceResponse> {
        let key = (symbol.to_string(), timeframe);
        let window: Vec<Candle> = {
            let guard = self.history.read().await;
            guard.get(&key)?.iter().cloned().collect()
        };
        let current_price = window.last().map(|c| c.close)?;
        use rust_decimal::prelude::ToPrimitive;
        Some(support_resistance::compute(&window, params, current_price.to_f64().unwrap_or(0.0)))
    }

    /// Applies a client's `subscribe`/`unsubscribe` request: validates
    /// every symbol/timeframe, updates the session's subscription set,
    /// registers/deregisters interest with the tick pipeline, and acks
    /// or errors the session (spec §4.7/§9 handshake).
    pub async fn handle_inbound(&self, session_id: Uuid, msg: InboundMessage) {
        let Some(session) = self.connections.session(session_id).await else {
            return;
        };

        match msg {
            InboundMessage::Subscribe { symbols, timeframes, indicators } => {
                match self.resolve_pairs(&symbols, &timeframes) {
                    Ok(pairs) => {
                        for (symbol, timeframe) in &pairs {
                            self.ticks.subscribe(session_id, symbol, *timeframe).await;
                        }
                        session.with_subscription(|sub| {
                            for (symbol, timeframe) in &pairs {
                                sub.add(symbol, *timeframe);
                            }
                            if let Some(names) = indicators {
                                sub.indicator_filter = Some(names.into_iter().collect::<HashSet<_>>());
                            }
                        });
                        let (syms, tfs) = split_pairs(&pairs);
                        self.broadcaster.send_ack(session_id, AckAction::Subscribed, syms, tfs).await;
                    }
                    Err(err) => self.broadcaster.send_error(session_id, &SessionError::BadRequest(err.to_string())).await,
                }
            }
            InboundMessage::Unsubscribe { symbols, timeframes } => {
                match self.resolve_pairs(&symbols, &timeframes) {
                    Ok(pairs) => {
                        for (symbol, timeframe) in &pairs {
                            self.ticks.unsubscribe(session_id, symbol, *timeframe).await;
                        }
                        session.with_subscription(|sub| {
                            for (symbol, timeframe) in &pairs {
                                sub.remove(symbol, *timeframe);
                            }
                        });
                        let (syms, tfs) = split_pairs(&pairs);
                        self.broadcaster.send_ack(session_id, AckAction::Unsubscribed, syms, tfs).await;
                    }
                    Err(err) => self.broadcaster.send_error(session_id, &SessionError::BadRequest(err.to_string())).await,
                }
            }
        }
    }

    fn resolve_pairs(&self, symbols: &[String], timeframes: &[String]) -> Result<Vec<(String, Timeframe)>, ValidationError> {
        let symbols: Vec<String> = symbols.iter().map(|s| validation::validate_symbol(s)).collect::<Result<_, _>>()?;
        let timeframes: Vec<Timeframe> = timeframes.iter().map(|t| validation::validate_timeframe(t)).collect::<Result<_, _>>()?;
        let mut pairs = Vec::with_capacity(symbols.len() * timeframes.len());
        for symbol in &symbols {
            for timeframe in &timeframes {
                pairs.push((symbol.clone(), *timeframe));
            }
        }
        Ok(pairs)
    }

    /// Graceful shutdown (spec §4.9): flush every open aggregator's
    /// partial candle to its subscribers, then stop accepting new
    /// sessions' work; callers are expected to stop the inbound accept
    /// loop separately before calling this.
    pub async fn shutdown(&self, deadline: TokioDuration) {
        info!("shutdown: flushing open candles");
        let flush_fut = async {
            for (symbol, timeframe, partial) in self.ticks.flush_all().await {
                self.broadcaster.broadcast_partial(&symbol, timeframe, partial).await;
            }
        };
        if tokio::time::timeout(deadline, flush_fut).await.is_err() {
            warn!("shutdown: flush did not complete within the deadline, proceeding anyway");
        }
        info!(sessions = self.connections.session_count().await, "shutdown: draining sessions");
    }
}

fn split_pairs(pairs: &[(String, Timeframe)]) -> (Vec<String>, Vec<Timeframe>) {
    let symbols: HashSet<String> = pairs.iter().map(|(s, _)| s.clone()).collect();
    let timeframes: HashSet<Timeframe> = pairs.iter().map(|(_, t)| *t).collect();
    (symbols.into_iter().collect(), timeframes.into_iter().collect())
}
