//! Connection manager (component C8): session registry, bounded
//! per-session outbound queues, backpressure, and heartbeat liveness.
//!
//! Grounded on the `Arc<RwLock<...>>` registry idiom already used for
//! [`crate::application::tick_stream_manager::TickStreamManager`], with
//! the task-cancellation-handle pattern from
//! `infrastructure/binance/websocket.rs`'s `BinanceWebSocketManager`
//! adapted to per-session outbound delivery instead of a single shared
//! broadcast channel, since each session needs its own bounded,
//! independently-pruned queue (spec §4.7).

use crate::domain::errors::SessionError;
use crate::domain::schemas::OutboundMessage;
use crate::domain::subscription::Subscription;
use crate::domain::timeframe::Timeframe;
use chrono::{DateTime, Duration, Utc};
use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};
use std::sync::{Arc, Mutex};
use tokio::sync::RwLock;
use tracing::{info, warn};
use uuid::Uuid;

/// `(type, symbol, timeframe)` identity used to dedupe latest-state
/// messages (spec §4.7's drop-oldest-same-type rule never applies to
/// `ack`/`error`, which are always delivered once each).
fn stream_key(msg: &OutboundMessage) -> Option<(&'static str, String, Timeframe)> {
    match msg {
        OutboundMessage::Candle { symbol, timeframe, .. } => Some(("candle", symbol.clone(), *timeframe)),
        OutboundMessage::Indicator { symbol, timeframe, .. } => Some(("indicator", symbol.clone(), *timeframe)),
        _ => None,
    }
}

pub struct Session {
    pub id: Uuid,
    queue: Mutex<VecDeque<OutboundMessage>>,
    capacity: usize,
    drop_window_start: Mutex<DateTime<Utc>>,
    drop_count: AtomicU32,
    terminal: AtomicBool,
    last_pong: Mutex<DateTime<Utc>>,
    subscription: Mutex<Subscription>,
}

impl Session {
    fn new(id: Uuid, capacity: usize) -> Self {
        Self {
            id,
            queue: Mutex::new(VecDeque::with_capacity(capacity)),
            capacity,
            drop_window_start: Mutex::new(Utc::now()),
            drop_count: AtomicU32::new(0),
            terminal: AtomicBool::new(false),
            last_pong: Mutex::new(Utc::now()),
            subscription: Mutex::new(Subscription::new()),
        }
    }

    pub fn is_terminal(&self) -> bool {
        self.terminal.load(Ordering::SeqCst)
    }

    pub fn subscription(&self) -> Subscription {
        self.subscription.lock().unwrap().clone()
    }

    pub fn with_subscription<R>(&self, f: impl FnOnce(&mut Subscription) -> R) -> R {
        f(&mut self.subscription.lock().unwrap())
    }

    pub fn touch_heartbeat(&self) {
        *self.last_pong.lock().unwrap() = Utc::now();
    }

    fn seconds_since_pong(&self) -> i64 {
        (Utc::now() - *self.last_pong.lock().unwrap()).num_seconds()
    }

    /// Drains every pending message for delivery by the session's
    /// outbound writer task.
    pub fn drain(&self) -> Vec<OutboundMessage> {
        self.queue.lock().unwrap().drain(..).collect()
    }
}

pub struct ConnectionManager {
    sessions: RwLock<HashMap<Uuid, Arc<Session>>>,
    max_sessions: usize,
    queue_depth: usize,
    drop_threshold: u32,
    drop_window: Duration,
    heartbeat_seconds: i64,
}

impl ConnectionManager {
    pub fn new(max_sessions: usize, queue_depth: usize, drop_threshold: u32, heartbeat_seconds: u64) -> Self {
        Self {
            sessions: RwLock::new(HashMap::new()),
            max_sessions,
            queue_depth,
            drop_threshold,
            drop_window: Duration::seconds(60),
            heartbeat_seconds: heartbeat_seconds as i64,
        }
    }

    /// Admits a new session, or refuses with `error{kind: "capacity"}`
    /// once `MAX_SESSIONS` is reached (spec §4.7 limits).
    pub async fn accept(&self) -> Result<Arc<Session>, SessionError> {
        let mut sessions = self.sessions.write().await;
        if sessions.len() >= self.max_sessions {
            return Err(SessionError::Capacity);
        }
        let id = Uuid::new_v4();
        let session = Arc::new(Session::new(id, self.queue_depth));
        sessions.insert(id, session.clone());
        info!(session_id = %id, total = sessions.len(), "session accepted");
        Ok(session)
    }

    pub async fn remove(&self, id: Uuid) {
        self.sessions.write().await.remove(&id);
    }

    pub async fn session(&self, id: Uuid) -> Option<Arc<Session>> {
        self.sessions.read().await.get(&id).cloned()
    }

    pub async fn session_count(&self) -> usize {
        self.sessions.read().await.len()
    }

    pub async fn all_sessions(&self) -> Vec<Arc<Session>> {
        self.sessions.read().await.values().cloned().collect()
    }

    /// Enqueues `msg` onto `session_id`'s outbound queue per the
    /// fan-out discipline in spec §4.7: if full, evict the oldest
    /// pending message of the same stream; if still full, drop the new
    /// message and count it against the slow-consumer threshold.
    pub async fn enqueue(&self, session_id: Uuid, msg: OutboundMessage) -> Result<(), SessionError> {
        let Some(session) = self.session(session_id).await else {
            return Ok(());
        };
        if session.is_terminal() {
            return Ok(());
        }

        let dropped = {
            let mut q = session.queue.lock().unwrap();
            if q.len() < session.capacity {
                q.push_back(msg);
                false
            } else if let Some(key) = stream_key(&msg) {
                if let Some(pos) = q.iter().position(|m| stream_key(m).as_ref() == Some(&key)) {
                    q.remove(pos);
                    q.push_back(msg);
                    false
                } else {
                    true
                }
            } else {
                true
            }
        };

        if !dropped {
            return Ok(());
        }

        let now = Utc::now();
        let mut window_start = session.drop_window_start.lock().unwrap();
        if now - *window_start > self.drop_window {
            *window_start = now;
            session.drop_count.store(0, Ordering::SeqCst);
        }
        drop(window_start);

        let count = session.drop_count.fetch_add(1, Ordering::SeqCst) + 1;
        if count > self.drop_threshold {
            session.terminal.store(true, Ordering::SeqCst);
            warn!(session_id = %session_id, drops = count, "session exceeded drop threshold, terminating");
            return Err(SessionError::SlowConsumer);
        }
        Ok(())
    }

    /// Returns the sessions a `(symbol, timeframe)` event should fan out
    /// to, optionally filtered by whether they also want `indicator_name`.
    pub async fn interested_sessions(&self, symbol: &str, timeframe: Timeframe) -> Vec<Arc<Session>> {
        self.all_sessions()
            .await
            .into_iter()
            .filter(|s| !s.is_terminal())
            .filter(|s| s.subscription().contains(symbol, timeframe))
            .collect()
    }

    /// Sessions whose last heartbeat response is older than `2 *
    /// heartbeat_seconds` (spec §4.7 liveness); callers should
    /// disconnect these.
    pub async fn stale_sessions(&self) -> Vec<Uuid> {
        self.all_sessions()
            .await
            .into_iter()
            .filter(|s| s.seconds_since_pong() > 2 * self.heartbeat_seconds)
            .map(|s| s.id)
            .collect()
    }
}
