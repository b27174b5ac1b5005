use thiserror::Error;

/// Rejections raised by the validators (component C2). Never retried;
/// these surface to callers as `bad_request`.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum ValidationError {
    #[error("invalid symbol: {0}")]
    InvalidSymbol(String),

    #[error("invalid exchange: {0}")]
    InvalidExchange(String),

    #[error("invalid timeframe: {0}")]
    InvalidTimeframe(String),

    #[error("invalid date range: start {start} must be before end {end}")]
    InvalidDateRange { start: String, end: String },

    #[error("invalid parameter {param} for indicator {indicator}: {reason}")]
    InvalidIndicatorParam {
        indicator: String,
        param: String,
        reason: String,
    },
}

/// Per-tick rejections inside an aggregator. Counted and dropped; never
/// terminates the aggregator (spec §7 propagation policy).
#[derive(Debug, Error, Clone, PartialEq)]
pub enum TickError {
    #[error("invalid tick for {symbol}: {reason}")]
    InvalidTick { symbol: String, reason: String },
}

/// Errors from the indicator engine (component C6).
#[derive(Debug, Error, Clone, PartialEq)]
pub enum IndicatorError {
    #[error("unknown indicator: {0}")]
    UnknownIndicator(String),
}

/// Errors from the historical source adapter (component C10).
#[derive(Debug, Error, Clone)]
pub enum HistoricalError {
    #[error("historical data unavailable: {reason}")]
    Unavailable { reason: String },

    #[error("invalid historical request: {reason}")]
    InvalidRequest { reason: String },
}

/// Session/connection-level errors (components C8/C9).
#[derive(Debug, Error, Clone, PartialEq)]
pub enum SessionError {
    #[error("connection capacity exceeded")]
    Capacity,

    #[error("session terminated: slow consumer")]
    SlowConsumer,

    #[error("bad request: {0}")]
    BadRequest(String),
}

impl SessionError {
    /// The `kind` string carried in the wire-level `error` envelope.
    pub fn kind(&self) -> &'static str {
        match self {
            SessionError::Capacity => "capacity",
            SessionError::SlowConsumer => "slow_consumer",
            SessionError::BadRequest(_) => "bad_request",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn validation_error_messages_carry_the_offending_value() {
        let err = ValidationError::InvalidSymbol("  ".to_string());
        assert!(err.to_string().contains("invalid symbol"));
    }

    #[test]
    fn session_error_kind_matches_wire_envelope() {
        assert_eq!(SessionError::Capacity.kind(), "capacity");
        assert_eq!(SessionError::SlowConsumer.kind(), "slow_consumer");
        assert_eq!(
            SessionError::BadRequest("bad action".into()).kind(),
            "bad_request"
        );
    }
}
