//! candlestream server — headless process wiring the tick-aggregation
//! pipeline, indicator engine, support/resistance engine and session
//! broadcaster. No HTTP/WebSocket transport is wired up here (out of
//! scope per this service's own boundary); callers embed
//! `Application::ingest_tick`/`handle_inbound` behind whatever network
//! listener they run.
//!
//! # Environment Variables
//! See [`candlestream::config::Config`] for the full list.
//!
//! # Metrics
//! Rendered periodically into the log via `tracing`, in the teacher's
//! push-based style, rather than exposed over an HTTP `/metrics` route.

use anyhow::Result;
use candlestream::application::lifecycle::Application;
use candlestream::config::Config;
use candlestream::infrastructure::historical_source::HttpHistoricalSource;
use candlestream::infrastructure::observability::Metrics;
use std::sync::Arc;
use std::time::Duration;
use tracing::{Level, info};
use tracing_subscriber::prelude::*;

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();

    let stdout_layer = tracing_subscriber::fmt::layer().with_target(false);

    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::from_default_env().add_directive(Level::INFO.into()))
        .with(stdout_layer)
        .init();

    info!("candlestream server {} starting...", env!("CARGO_PKG_VERSION"));

    let config = Config::from_env()?;
    info!(
        max_sessions = config.max_sessions,
        queue_depth = config.queue_depth,
        default_timeframes = ?config.default_timeframes,
        "configuration loaded"
    );

    let historical = Arc::new(HttpHistoricalSource::new(
        config.historical_source_url.clone(),
        config.historical_timeout_ms,
    ));

    let app = Application::new(config.clone(), historical);
    let background = app.spawn_background_tasks();
    info!("background tasks started (aggregator reap, heartbeat)");

    let metrics = Metrics::new()?;
    let metrics_app = app.clone();
    let metrics_handle = tokio::spawn(async move {
        let mut ticker = tokio::time::interval(Duration::from_secs(30));
        loop {
            ticker.tick().await;
            metrics.set_active_aggregators(metrics_app.ticks.active_count().await as f64);
            metrics.set_sessions_active(metrics_app.connections.session_count().await as f64);
            info!(metrics = %metrics.render().lines().count(), "metrics sample taken");
        }
    });

    info!("candlestream running. Press Ctrl+C to shut down.");
    tokio::signal::ctrl_c().await?;
    info!("shutdown signal received, draining...");

    metrics_handle.abort();
    for handle in background {
        handle.abort();
    }
    app.shutdown(Duration::from_secs(config.historical_timeout_ms.min(10_000) / 1000 + 1)).await;

    info!("candlestream stopped.");
    Ok(())
}
