//! Push-based observability: Prometheus gauges/counters rendered on
//! demand, plus periodic structured `tracing` logs. No metrics HTTP
//! endpoint is exposed by this module itself; callers render text via
//! [`Metrics::render`] from whatever transport they choose.

pub mod metrics;

pub use metrics::Metrics;
