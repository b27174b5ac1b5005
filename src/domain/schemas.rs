//! Request/response schemas (component C11): typed contracts for every
//! operation at the boundary (spec §6). Grounded on the teacher's tagged
//! enum for wire messages (`domain/trading/types.rs::MarketEvent`),
//! generalized to the `{type, ...payload, timestamp}` envelope spec §4.7
//! requires.

use crate::domain::candle::{Candle, PartialCandle};
use crate::domain::timeframe::Timeframe;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// A single indicator result: either a scalar (most recent value) or a
/// full series aligned to the requesting window's timestamps.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum IndicatorValue {
    Scalar(f64),
    Series(Vec<f64>),
    Named(HashMap<String, Vec<f64>>),
}

/// Candle payload carried in an outbound `candle` message: either the
/// currently-open bucket or a just-closed one.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum CandlePayload {
    Partial(PartialCandle),
    Complete(Candle),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum OutboundMessage {
    Candle {
        symbol: String,
        timeframe: Timeframe,
        complete: bool,
        data: CandlePayload,
        timestamp: DateTime<Utc>,
    },
    Indicator {
        symbol: String,
        timeframe: Timeframe,
        indicators: HashMap<String, IndicatorValue>,
        timestamp: DateTime<Utc>,
    },
    Ack {
        action: AckAction,
        symbols: Vec<String>,
        timeframes: Vec<Timeframe>,
        timestamp: DateTime<Utc>,
    },
    Error {
        message: String,
        kind: String,
        timestamp: DateTime<Utc>,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AckAction {
    Subscribed,
    Unsubscribed,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "action", rename_all = "snake_case")]
pub enum InboundMessage {
    Subscribe {
        symbols: Vec<String>,
        timeframes: Vec<String>,
        indicators: Option<Vec<String>>,
    },
    Unsubscribe {
        symbols: Vec<String>,
        timeframes: Vec<String>,
    },
}

/// `POST /indicators/calculate` request body.
#[derive(Debug, Clone, Deserialize)]
pub struct IndicatorCalculateRequest {
    pub symbol: String,
    pub exchange: String,
    pub interval: String,
    pub start_date: DateTime<Utc>,
    pub end_date: DateTime<Utc>,
    pub indicators: Option<Vec<String>>,
    pub indicator_params: Option<HashMap<String, HashMap<String, serde_json::Value>>>,
}

/// Response for a single-timeframe indicator calculation, and the
/// per-indicator series aligned to the fetched candle window.
#[derive(Debug, Clone, Serialize)]
pub struct IndicatorResponse {
    pub symbol: String,
    pub interval: String,
    pub timestamps: Vec<DateTime<Utc>>,
    pub series: HashMap<String, IndicatorValue>,
    pub errors: Vec<IndicatorComputeError>,
}

#[derive(Debug, Clone, Serialize)]
pub struct IndicatorComputeError {
    pub indicator: String,
    pub message: String,
}

/// `POST /indicators/multi-timeframe` response: per-timeframe map of
/// `IndicatorResponse`.
#[derive(Debug, Clone, Serialize)]
pub struct MultiTimeframeIndicatorResponse {
    pub symbol: String,
    pub by_timeframe: HashMap<String, IndicatorResponse>,
}

/// `GET /indicators/available` catalog entry.
#[derive(Debug, Clone, Serialize)]
pub struct IndicatorCatalogEntry {
    pub name: String,
    pub category: String,
    pub parameters: HashMap<String, serde_json::Value>,
    pub min_periods: usize,
    pub series_names: Vec<String>,
}
