// HTTP-backed historical candle backfill adapter (C10)
pub mod historical_source;

// Prometheus metrics and structured-log reporting
pub mod observability;
