//! Broadcaster (component C9): formats aggregator/indicator events into
//! the wire envelope and fans them out through the
//! [`crate::application::connection_manager::ConnectionManager`].
//!
//! Grounded on the publish/fan-out shape of the deleted-at-trim
//! `infrastructure/event_bus.rs::EventBus::publish` (iterate subscribers,
//! hand each one the event), generalized to per-session bounded queues
//! and subscription-set filtering instead of a single broadcast channel.

use crate::application::connection_manager::ConnectionManager;
use crate::domain::candle::{Candle, PartialCandle};
use crate::domain::errors::SessionError;
use crate::domain::schemas::{AckAction, CandlePayload, IndicatorValue, OutboundMessage};
use crate::domain::timeframe::Timeframe;
use chrono::Utc;
use std::collections::HashMap;
use std::sync::Arc;
use tracing::debug;
use uuid::Uuid;

pub struct Broadcaster {
    connections: Arc<ConnectionManager>,
}

impl Broadcaster {
    pub fn new(connections: Arc<ConnectionManager>) -> Self {
        Self { connections }
    }

    async fn fan_out(&self, symbol: &str, timeframe: Timeframe, msg: OutboundMessage) {
        for session in self.connections.interested_sessions(symbol, timeframe).await {
            if let Err(SessionError::SlowConsumer) = self.connections.enqueue(session.id, msg.clone()).await {
                debug!(session_id = %session.id, "session disconnected as a slow consumer");
            }
        }
    }

    pub async fn broadcast_partial(&self, symbol: &str, timeframe: Timeframe, partial: PartialCandle) {
        let msg = OutboundMessage::Candle {
            symbol: symbol.to_string(),
            timeframe,
            complete: false,
            data: CandlePayload::Partial(partial),
            timestamp: Utc::now(),
        };
        self.fan_out(symbol, timeframe, msg).await;
    }

    pub async fn broadcast_completed(&self, symbol: &str, timeframe: Timeframe, candle: Candle) {
        let msg = OutboundMessage::Candle {
            symbol: symbol.to_string(),
            timeframe,
            complete: true,
            data: CandlePayload::Complete(candle),
            timestamp: Utc::now(),
        };
        self.fan_out(symbol, timeframe, msg).await;
    }

    /// Fans out an indicator update, respecting each session's
    /// per-indicator filter (spec §4.7/§9: a session may narrow its
    /// `indicator` stream to a subset of names).
    pub async fn broadcast_indicators(&self, symbol: &str, timeframe: Timeframe, indicators: HashMap<String, IndicatorValue>) {
        for session in self.connections.interested_sessions(symbol, timeframe).await {
            let filtered: HashMap<String, IndicatorValue> = indicators
                .iter()
                .filter(|(name, _)| session.subscription().wants_indicator(name))
                .map(|(name, value)| (name.clone(), value.clone()))
                .collect();
            if filtered.is_empty() {
                continue;
            }
            let msg = OutboundMessage::Indicator {
                symbol: symbol.to_string(),
                timeframe,
                indicators: filtered,
                timestamp: Utc::now(),
            };
            if let Err(SessionError::SlowConsumer) = self.connections.enqueue(session.id, msg).await {
                debug!(session_id = %session.id, "session disconnected as a slow consumer");
            }
        }
    }

    pub async fn send_ack(&self, session_id: Uuid, action: AckAction, symbols: Vec<String>, timeframes: Vec<Timeframe>) {
        let msg = OutboundMessage::Ack {
            action,
            symbols,
            timeframes,
            timestamp: Utc::now(),
        };
        let _ = self.connections.enqueue(session_id, msg).await;
    }

    pub async fn send_error(&self, session_id: Uuid, err: &SessionError) {
        let msg = OutboundMessage::Error {
            message: err.to_string(),
            kind: err.kind().to_string(),
            timestamp: Utc::now(),
        };
        let _ = self.connections.enqueue(session_id, msg).await;
    }

    /// Sends an empty `ack` as a protocol-level heartbeat to every live
    /// session (spec §4.7 liveness).
    pub async fn heartbeat_all(&self) {
        for session in self.connections.all_sessions().await {
            if session.is_terminal() {
                continue;
            }
            let msg = OutboundMessage::Ack {
                action: AckAction::Subscribed,
                symbols: Vec::new(),
                timeframes: Vec::new(),
                timestamp: Utc::now(),
            };
            let _ = self.connections.enqueue(session.id, msg).await;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    fn partial_candle(symbol: &str) -> PartialCandle {
        PartialCandle {
            symbol: symbol.to_string(),
            timeframe: Timeframe::M1,
            bucket_start: Utc::now(),
            open: dec!(100),
            high: dec!(101),
            low: dec!(99),
            close: dec!(100.5),
            volume: dec!(10),
            vwap: dec!(100.2),
            tick_count: 3,
            is_complete: false,
        }
    }

    #[tokio::test]
    async fn broadcast_partial_only_reaches_subscribed_sessions() {
        let connections = Arc::new(ConnectionManager::new(10, 10, 64, 30));
        let subscribed = connections.accept().await.unwrap();
        subscribed.with_subscription(|s| s.add("AAPL", Timeframe::M1));
        let unsubscribed = connections.accept().await.unwrap();

        let broadcaster = Broadcaster::new(connections.clone());
        broadcaster.broadcast_partial("AAPL", Timeframe::M1, partial_candle("AAPL")).await;

        assert_eq!(subscribed.drain().len(), 1);
        assert_eq!(unsubscribed.drain().len(), 0);
    }

    #[tokio::test]
    async fn broadcast_indicators_respects_per_session_filter() {
        let connections = Arc::new(ConnectionManager::new(10, 10, 64, 30));
        let session = connections.accept().await.unwrap();
        session.with_subscription(|s| {
            s.add("AAPL", Timeframe::M1);
            s.indicator_filter = Some(["rsi".to_string()].into_iter().collect());
        });

        let broadcaster = Broadcaster::new(connections.clone());
        let mut indicators = HashMap::new();
        indicators.insert("rsi".to_string(), IndicatorValue::Scalar(55.0));
        indicators.insert("macd".to_string(), IndicatorValue::Scalar(1.2));
        broadcaster.broadcast_indicators("AAPL", Timeframe::M1, indicators).await;

        let drained = session.drain();
        assert_eq!(drained.len(), 1);
        if let OutboundMessage::Indicator { indicators, .. } = &drained[0] {
            assert!(indicators.contains_key("rsi"));
            assert!(!indicators.contains_key("macd"));
        } else {
            panic!("expected indicator message");
        }
    }

    #[tokio::test]
    async fn heartbeat_all_enqueues_an_ack_per_live_session() {
        let connections = Arc::new(ConnectionManager::new(10, 10, 64, 30));
        let session = connections.accept().await.unwrap();
        let broadcaster = Broadcaster::new(connections.clone());
        broadcaster.heartbeat_all().await;
        assert_eq!(session.drain().len(), 1);
    }
}
