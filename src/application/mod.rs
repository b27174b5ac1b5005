// Tick -> OHLCV candle aggregation (C4)
pub mod candle_aggregator;

// Registry of per-(symbol, timeframe) aggregators (C5)
pub mod tick_stream_manager;

// Technical indicator catalog and dispatch engine (C6)
pub mod indicators;

// Swing-extrema support/resistance clustering (C7)
pub mod support_resistance;

// Classic pivot points and nearest-level lookup (C13)
pub mod pivots;

// Session registry, bounded outbound queues, backpressure (C8)
pub mod connection_manager;

// Candle/indicator event fan-out to subscribed sessions (C9)
pub mod broadcaster;

// Startup wiring and graceful shutdown drain (C12)
pub mod lifecycle;
