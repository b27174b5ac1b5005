//! Data types shared by the support/resistance engine (C7) and the
//! classic-pivots glue (C13). See [`crate::application::support_resistance`]
//! and [`crate::application::pivots`] for the algorithms.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum LevelKind {
    Support,
    Resistance,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SupportResistanceLevel {
    pub price: f64,
    pub kind: LevelKind,
    pub strength: f64,
    pub touches: u32,
    pub last_touch: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SupportResistanceResponse {
    pub support: Vec<SupportResistanceLevel>,
    pub resistance: Vec<SupportResistanceLevel>,
    pub tolerance: f64,
    pub current_price: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PivotSet {
    pub pp: f64,
    pub r1: f64,
    pub r2: f64,
    pub r3: f64,
    pub s1: f64,
    pub s2: f64,
    pub s3: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum PivotMethod {
    Standard,
    Fibonacci,
    Woodie,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NearestLevel {
    pub level: SupportResistanceLevel,
    pub distance: f64,
    pub distance_pct: f64,
}
