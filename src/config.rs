//! Process configuration (spec §6), loaded from the environment in the
//! teacher's `Config::from_env` idiom: `std::env::var` + `FromStr` +
//! `anyhow::Context`, with a `.env` file loaded first via `dotenvy`.

use anyhow::{Context, Result};
use std::env;

#[derive(Debug, Clone)]
pub struct Config {
    pub host: String,
    pub port: u16,
    pub max_sessions: usize,
    pub queue_depth: usize,
    pub heartbeat_seconds: u64,
    pub drop_threshold: u32,
    pub aggregator_grace_seconds: u64,
    pub default_timeframes: Vec<String>,
    pub tick_buffer_size: usize,
    pub historical_timeout_ms: u64,
    pub historical_source_url: String,
    pub cors_origins: Vec<String>,
    pub log_level: String,
    pub synthetic_fill_gaps: bool,
    pub out_of_order_tolerance_seconds: i64,
}

impl Config {
    pub fn from_env() -> Result<Self> {
        dotenvy::dotenv().ok();

        let host = env::var("HOST").unwrap_or_else(|_| "0.0.0.0".to_string());

        let port = env::var("PORT")
            .unwrap_or_else(|_| "8080".to_string())
            .parse::<u16>()
            .context("failed to parse PORT")?;

        let max_sessions = env::var("MAX_SESSIONS")
            .unwrap_or_else(|_| "100".to_string())
            .parse::<usize>()
            .context("failed to parse MAX_SESSIONS")?;

        let queue_depth = env::var("QUEUE_DEPTH")
            .unwrap_or_else(|_| "256".to_string())
            .parse::<usize>()
            .context("failed to parse QUEUE_DEPTH")?;

        let heartbeat_seconds = env::var("HEARTBEAT_SECONDS")
            .unwrap_or_else(|_| "30".to_string())
            .parse::<u64>()
            .context("failed to parse HEARTBEAT_SECONDS")?;

        let drop_threshold = env::var("DROP_THRESHOLD")
            .unwrap_or_else(|_| "64".to_string())
            .parse::<u32>()
            .context("failed to parse DROP_THRESHOLD")?;

        let aggregator_grace_seconds = env::var("AGGREGATOR_GRACE_SECONDS")
            .unwrap_or_else(|_| "60".to_string())
            .parse::<u64>()
            .context("failed to parse AGGREGATOR_GRACE_SECONDS")?;

        let default_timeframes_str = env::var("DEFAULT_TIMEFRAMES").unwrap_or_default();
        let default_timeframes: Vec<String> = default_timeframes_str
            .split(',')
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty())
            .collect();

        let tick_buffer_size = env::var("TICK_BUFFER_SIZE")
            .unwrap_or_else(|_| "512".to_string())
            .parse::<usize>()
            .context("failed to parse TICK_BUFFER_SIZE")?;

        let historical_timeout_ms = env::var("HISTORICAL_TIMEOUT_MS")
            .unwrap_or_else(|_| "10000".to_string())
            .parse::<u64>()
            .context("failed to parse HISTORICAL_TIMEOUT_MS")?;

        let historical_source_url =
            env::var("HISTORICAL_SOURCE_URL").unwrap_or_else(|_| "http://localhost:9000".to_string());

        let cors_origins_str = env::var("CORS_ORIGINS").unwrap_or_default();
        let cors_origins: Vec<String> = cors_origins_str
            .split(',')
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty())
            .collect();

        let log_level = env::var("LOG_LEVEL").unwrap_or_else(|_| "info".to_string());

        let synthetic_fill_gaps = env::var("SYNTHETIC_FILL_GAPS")
            .unwrap_or_else(|_| "false".to_string())
            .parse::<bool>()
            .unwrap_or(false);

        let out_of_order_tolerance_seconds = env::var("OUT_OF_ORDER_TOLERANCE_SECONDS")
            .unwrap_or_else(|_| "0".to_string())
            .parse::<i64>()
            .context("failed to parse OUT_OF_ORDER_TOLERANCE_SECONDS")?;

        Ok(Config {
            host,
            port,
            max_sessions,
            queue_depth,
            heartbeat_seconds,
            drop_threshold,
            aggregator_grace_seconds,
            default_timeframes,
            tick_buffer_size,
            historical_timeout_ms,
            historical_source_url,
            cors_origins,
            log_level,
            synthetic_fill_gaps,
            out_of_order_tolerance_seconds,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    static ENV_LOCK: Mutex<()> = Mutex::new(());

    #[test]
    fn defaults_match_spec_section_6() {
        let _guard = ENV_LOCK.lock().unwrap();
        for key in [
            "HOST",
            "PORT",
            "MAX_SESSIONS",
            "QUEUE_DEPTH",
            "HEARTBEAT_SECONDS",
            "DROP_THRESHOLD",
            "AGGREGATOR_GRACE_SECONDS",
            "DEFAULT_TIMEFRAMES",
            "TICK_BUFFER_SIZE",
            "HISTORICAL_TIMEOUT_MS",
            "HISTORICAL_SOURCE_URL",
            "CORS_ORIGINS",
            "LOG_LEVEL",
            "SYNTHETIC_FILL_GAPS",
            "OUT_OF_ORDER_TOLERANCE_SECONDS",
        ] {
            unsafe { env::remove_var(key) };
        }

        let cfg = Config::from_env().unwrap();
        assert_eq!(cfg.max_sessions, 100);
        assert_eq!(cfg.queue_depth, 256);
        assert_eq!(cfg.heartbeat_seconds, 30);
        assert_eq!(cfg.drop_threshold, 64);
        assert_eq!(cfg.aggregator_grace_seconds, 60);
        assert_eq!(cfg.historical_timeout_ms, 10000);
        assert_eq!(cfg.historical_source_url, "http://localhost:9000");
        assert!(!cfg.synthetic_fill_gaps);
        assert_eq!(cfg.out_of_order_tolerance_seconds, 0);
    }
}
