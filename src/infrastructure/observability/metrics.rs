//! Prometheus metric definitions, `candlestream_`-prefixed. No HTTP
//! `/metrics` endpoint is exposed (no HTTP transport is in scope); the
//! server binary periodically logs [`Metrics::render`]'s output instead,
//! following the teacher's push-based structured-log reporting.

use prometheus::{
    CounterVec, GaugeVec, Opts, Registry, TextEncoder,
    core::{AtomicF64, GenericGauge, GenericGaugeVec},
};
use std::sync::Arc;

#[derive(Clone)]
pub struct Metrics {
    registry: Arc<Registry>,
    /// Total ticks accepted across every symbol.
    pub ticks_total: GenericGauge<AtomicF64>,
    /// Ticks rejected, by reason (`late`, `invalid`).
    pub ticks_dropped_total: CounterVec,
    /// Candles closed, by symbol and timeframe.
    pub candles_completed_total: CounterVec,
    /// Aggregators currently live in the registry.
    pub active_aggregators: GenericGauge<AtomicF64>,
    /// Sessions currently connected.
    pub sessions_active: GenericGauge<AtomicF64>,
    /// Outbound messages dropped for slow consumers, cumulative.
    pub session_drops_total: GenericGauge<AtomicF64>,
    /// Per-session outbound queue depth at last sample.
    pub queue_depth: GaugeVec,
}

impl Metrics {
    pub fn new() -> anyhow::Result<Self> {
        let registry = Registry::new();

        let ticks_total = GenericGauge::with_opts(Opts::new(
            "candlestream_ticks_total",
            "Total ticks accepted across every symbol",
        ))?;
        registry.register(Box::new(ticks_total.clone()))?;

        let ticks_dropped_total = CounterVec::new(
            Opts::new("candlestream_ticks_dropped_total", "Ticks rejected by reason"),
            &["reason"],
        )?;
        registry.register(Box::new(ticks_dropped_total.clone()))?;

        let candles_completed_total = CounterVec::new(
            Opts::new("candlestream_candles_completed_total", "Candles closed by symbol and timeframe"),
            &["symbol", "timeframe"],
        )?;
        registry.register(Box::new(candles_completed_total.clone()))?;

        let active_aggregators = GenericGauge::with_opts(Opts::new(
            "candlestream_active_aggregators",
            "Aggregators currently live in the registry",
        ))?;
        registry.register(Box::new(active_aggregators.clone()))?;

        let sessions_active = GenericGauge::with_opts(Opts::new(
            "candlestream_sessions_active",
            "Sessions currently connected",
        ))?;
        registry.register(Box::new(sessions_active.clone()))?;

        let session_drops_total = GenericGauge::with_opts(Opts::new(
            "candlestream_session_drops_total",
            "Outbound messages dropped for slow consumers, cumulative",
        ))?;
        registry.register(Box::new(session_drops_total.clone()))?;

        let queue_depth = GaugeVec::new(
            Opts::new("candlestream_queue_depth", "Per-session outbound queue depth at last sample"),
            &["session"],
        )?;
        registry.register(Box::new(queue_depth.clone()))?;

        Ok(Self {
            registry: Arc::new(registry),
            ticks_total,
            ticks_dropped_total,
            candles_completed_total,
            active_aggregators,
            sessions_active,
            session_drops_total,
            queue_depth,
        })
    }

    pub fn render(&self) -> String {
        let encoder = TextEncoder::new();
        let metric_families = self.registry.gather();
        encoder.encode_to_string(&metric_families).unwrap_or_default()
    }

    pub fn inc_ticks(&self) {
        self.ticks_total.inc();
    }

    pub fn inc_ticks_dropped(&self, reason: &str) {
        self.ticks_dropped_total.with_label_values(&[reason]).inc();
    }

    pub fn inc_candles_completed(&self, symbol: &str, timeframe: &str) {
        self.candles_completed_total.with_label_values(&[symbol, timeframe]).inc();
    }

    pub fn set_active_aggregators(&self, count: f64) {
        self.active_aggregators.set(count);
    }

    pub fn set_sessions_active(&self, count: f64) {
        self.sessions_active.set(count);
    }

    pub fn inc_session_drops(&self) {
        self.session_drops_total.inc();
    }

    pub fn set_queue_depth(&self, session: &str, depth: f64) {
        self.queue_depth.with_label_values(&[session]).set(depth);
    }
}

impl Default for Metrics {
    fn default() -> Self {
        Self::new().expect("failed to create default Metrics")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn render_includes_the_candlestream_prefix() {
        let metrics = Metrics::new().expect("failed to create metrics");
        assert!(metrics.render().contains("candlestream_"));
    }

    #[test]
    fn ticks_dropped_is_labeled_by_reason() {
        let metrics = Metrics::new().expect("failed to create metrics");
        metrics.inc_ticks_dropped("late");
        metrics.inc_ticks_dropped("invalid");
        let output = metrics.render();
        assert!(output.contains("reason=\"late\""));
        assert!(output.contains("reason=\"invalid\""));
    }

    #[test]
    fn candles_completed_is_labeled_by_symbol_and_timeframe() {
        let metrics = Metrics::new().expect("failed to create metrics");
        metrics.inc_candles_completed("AAPL", "1m");
        let output = metrics.render();
        assert!(output.contains("symbol=\"AAPL\""));
        assert!(output.contains("timeframe=\"1m\""));
    }

    #[test]
    fn queue_depth_is_set_per_session() {
        let metrics = Metrics::new().expect("failed to create metrics");
        metrics.set_queue_depth("abc-123", 7.0);
        let output = metrics.render();
        assert!(output.contains("candlestream_queue_depth"));
    }
}
