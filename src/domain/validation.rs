//! Validators (component C2). Reject malformed input before any state
//! is touched, following the teacher's `FromStr`-as-validator idiom
//! (`config.rs::Mode::from_str`, `AssetClass::from_str`).

use crate::domain::errors::ValidationError;
use crate::domain::timeframe::Timeframe;
use chrono::{DateTime, Utc};

/// The closed set of exchanges this service recognizes.
pub const VALID_EXCHANGES: [&str; 6] = ["NSE", "BSE", "NFO", "BFO", "MCX", "CDS"];

/// Uppercases and trims `raw`, rejecting empty or whitespace-only input.
/// Leading/trailing whitespace is never accepted as meaningful data.
pub fn validate_symbol(raw: &str) -> Result<String, ValidationError> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return Err(ValidationError::InvalidSymbol(raw.to_string()));
    }
    if !trimmed
        .chars()
        .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '.' || c == '/')
    {
        return Err(ValidationError::InvalidSymbol(raw.to_string()));
    }
    Ok(trimmed.to_uppercase())
}

pub fn validate_exchange(raw: &str) -> Result<String, ValidationError> {
    let trimmed = raw.trim().to_uppercase();
    if VALID_EXCHANGES.contains(&trimmed.as_str()) {
        Ok(trimmed)
    } else {
        Err(ValidationError::InvalidExchange(raw.to_string()))
    }
}

pub fn validate_timeframe(raw: &str) -> Result<Timeframe, ValidationError> {
    Timeframe::normalize(raw)
}

pub fn validate_date_range(
    start: DateTime<Utc>,
    end: DateTime<Utc>,
) -> Result<(DateTime<Utc>, DateTime<Utc>), ValidationError> {
    if start < end {
        Ok((start, end))
    } else {
        Err(ValidationError::InvalidDateRange {
            start: start.to_rfc3339(),
            end: end.to_rfc3339(),
        })
    }
}
