//! HistoricalSource adapter (component C10): fetches backfill candles
//! over HTTP with retry + per-call timeout, never merged into live
//! aggregator state (spec §4.8).
//!
//! Grounded on `infrastructure/http_client_factory.rs`'s
//! `ClientWithMiddleware` + `ExponentialBackoff` construction and the
//! query-building/JSON-decoding shape of
//! `infrastructure/alpaca/market_data.rs::fetch_historical_bars_internal`,
//! adapted to this service's own candle schema instead of Alpaca's bar
//! format.

use crate::domain::candle::Candle;
use crate::domain::errors::HistoricalError;
use crate::domain::timeframe::Timeframe;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use reqwest::Client;
use reqwest_middleware::{ClientBuilder, ClientWithMiddleware};
use reqwest_retry::{policies::ExponentialBackoff, RetryTransientMiddleware};
use rust_decimal::Decimal;
use serde::Deserialize;
use std::time::Duration;
use tracing::{debug, error};

#[async_trait]
pub trait HistoricalSource: Send + Sync {
    async fn fetch_candles(
        &self,
        symbol: &str,
        exchange: &str,
        interval: &str,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> Result<Vec<Candle>, HistoricalError>;
}

pub struct HttpHistoricalSource {
    client: ClientWithMiddleware,
    base_url: String,
    per_call_timeout: Duration,
}

impl HttpHistoricalSource {
    pub fn new(base_url: String, timeout_ms: u64) -> Self {
        // Spec §4.8: at most 3 retries, backing off 250ms/500ms/1s.
        let retry_policy = ExponentialBackoff::builder()
            .retry_bounds(Duration::from_millis(250), Duration::from_secs(1))
            .build_with_max_retries(3);

        let client = Client::builder()
            .pool_max_idle_per_host(5)
            .timeout(Duration::from_millis(timeout_ms))
            .connect_timeout(Duration::from_secs(10))
            .build()
            .unwrap_or_else(|_| Client::new());

        let client = ClientBuilder::new(client)
            .with(RetryTransientMiddleware::new_with_policy(retry_policy))
            .build();

        Self {
            client,
            base_url,
            per_call_timeout: Duration::from_millis(timeout_ms),
        }
    }
}

#[derive(Debug, Deserialize)]
struct HistoricalBar {
    timestamp: DateTime<Utc>,
    open: Decimal,
    high: Decimal,
    low: Decimal,
    close: Decimal,
    volume: Decimal,
}

#[async_trait]
impl HistoricalSource for HttpHistoricalSource {
    async fn fetch_candles(
        &self,
        symbol: &str,
        exchange: &str,
        interval: &str,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> Result<Vec<Candle>, HistoricalError> {
        let timeframe = Timeframe::normalize(interval).map_err(|e| HistoricalError::InvalidRequest {
            reason: e.to_string(),
        })?;

        let url = format!("{}/historical/candles", self.base_url);
        let query = [
            ("symbol", symbol.to_string()),
            ("exchange", exchange.to_string()),
            ("interval", interval.to_string()),
            ("start", start.to_rfc3339()),
            ("end", end.to_rfc3339()),
        ];

        debug!(symbol, exchange, interval, "fetching historical candles");

        let request = self.client.get(&url).query(&query).send();
        let response = tokio::time::timeout(self.per_call_timeout, request)
            .await
            .map_err(|_| HistoricalError::Unavailable {
                reason: "historical fetch timed out".to_string(),
            })?
            .map_err(|e| HistoricalError::Unavailable { reason: e.to_string() })?;

        if response.status() == reqwest::StatusCode::BAD_REQUEST {
            let body = response.text().await.unwrap_or_default();
            return Err(HistoricalError::InvalidRequest { reason: body });
        }
        if !response.status().is_success() {
            let status = response.status();
            error!(symbol, %status, "historical source returned an error status");
            return Err(HistoricalError::Unavailable {
                reason: format!("upstream returned {status}"),
            });
        }

        let bars: Vec<HistoricalBar> = response.json().await.map_err(|e| HistoricalError::Unavailable {
            reason: format!("failed to decode historical response: {e}"),
        })?;

        let mut candles: Vec<Candle> = bars
            .into_iter()
            .map(|b| Candle {
                symbol: symbol.to_string(),
                timeframe,
                bucket_start: b.timestamp,
                open: b.open,
                high: b.high,
                low: b.low,
                close: b.close,
                volume: b.volume,
                vwap: b.close,
                tick_count: 0,
            })
            .collect();
        candles.sort_by_key(|c| c.bucket_start);
        Ok(candles)
    }
}

/// A fixed, in-memory source used by tests and by the indicator/S-R
/// request handlers' own unit tests.
pub struct StaticHistoricalSource {
    candles: Vec<Candle>,
}

impl StaticHistoricalSource {
    pub fn new(candles: Vec<Candle>) -> Self {
        Self { candles }
    }
}

#[async_trait]
impl HistoricalSource for StaticHistoricalSource {
    async fn fetch_candles(
        &self,
        symbol: &str,
        _exchange: &str,
        _interval: &str,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> Result<Vec<Candle>, HistoricalError> {
        Ok(self
            .candles
            .iter()
            .filter(|c| c.symbol == symbol && c.bucket_start >= start && c.bucket_start <= end)
            .cloned()
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    fn candle(symbol: &str, bucket_start: DateTime<Utc>) -> Candle {
        Candle {
            symbol: symbol.to_string(),
            timeframe: Timeframe::D1,
            bucket_start,
            open: dec!(100),
            high: dec!(101),
            low: dec!(99),
            close: dec!(100.5),
            volume: dec!(1000),
            vwap: dec!(100.2),
            tick_count: 0,
        }
    }

    #[tokio::test]
    async fn static_source_filters_by_symbol_and_date_range() {
        let now = Utc::now();
        let source = StaticHistoricalSource::new(vec![
            candle("AAPL", now),
            candle("AAPL", now - chrono::Duration::days(10)),
            candle("MSFT", now),
        ]);

        let result = source
            .fetch_candles("AAPL", "NSE", "1d", now - chrono::Duration::days(1), now + chrono::Duration::days(1))
            .await
            .unwrap();
        assert_eq!(result.len(), 1);
        assert_eq!(result[0].symbol, "AAPL");
    }
}
