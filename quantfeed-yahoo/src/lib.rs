//! Yahoo Finance connector.
//!
//! Serves historical bars and latest prices from the public v8 chart API,
//! which needs no API key. Yahoo is the fallback of last resort: free,
//! unauthenticated, and rate-limited conservatively on our side since the
//! service publishes no official budget.
#![warn(missing_docs)]

use std::sync::Arc;

use async_trait::async_trait;
use chrono::{TimeZone, Utc};

use quantfeed_client::{RateLimiter, RetryingClient};
use quantfeed_core::{
    Bar, BarsProvider, BarsRequest, BarsResponse, ConnectorKey, FeedConnector, FeedError,
    LatestPricesProvider, PriceMap, RateLimitConfig, RetryConfig, Timeframe,
};

mod wire;

use wire::ChartEnvelope;

/// Key under which this connector registers.
pub const YAHOO: ConnectorKey = ConnectorKey::new("quantfeed-yahoo");

const DEFAULT_BASE_URL: &str = "https://query1.finance.yahoo.com";

/// Connector backed by the Yahoo Finance chart API.
pub struct YahooConnector {
    client: RetryingClient,
    base_url: String,
}

impl YahooConnector {
    /// Build a connector against the production endpoint.
    ///
    /// # Errors
    /// Returns a provider error if the HTTP client cannot be built.
    pub fn new() -> Result<Self, FeedError> {
        Self::with_base_url(DEFAULT_BASE_URL, RetryConfig::default())
    }

    /// Build a connector against an alternate base URL. Tests point this at
    /// a local server.
    ///
    /// # Errors
    /// Returns a provider error if the HTTP client cannot be built.
    pub fn with_base_url(
        base_url: impl Into<String>,
        retry: RetryConfig,
    ) -> Result<Self, FeedError> {
        let limiter = Arc::new(RateLimiter::new(
            YAHOO.as_str(),
            RateLimitConfig::per_minute(60),
        ));
        let client = RetryingClient::new(YAHOO.as_str(), limiter, retry)?;
        Ok(Self {
            client,
            base_url: base_url.into(),
        })
    }

    async fn chart(&self, symbol: &str, query: &[(&str, String)]) -> Result<ChartEnvelope, FeedError> {
        let url = format!("{}/v8/finance/chart/{symbol}", self.base_url);
        self.client.get_json(&url, query).await
    }
}

fn interval(timeframe: Timeframe) -> &'static str {
    match timeframe {
        Timeframe::OneMinute => "1m",
        Timeframe::FiveMinutes => "5m",
        Timeframe::FifteenMinutes => "15m",
        Timeframe::OneHour => "60m",
        Timeframe::OneDay => "1d",
    }
}

#[async_trait]
impl BarsProvider for YahooConnector {
    async fn historical_bars(&self, req: &BarsRequest) -> Result<BarsResponse, FeedError> {
        let mut response = BarsResponse::default();
        for symbol in req.symbols() {
            let query = [
                ("interval", interval(req.timeframe()).to_string()),
                ("period1", req.start().timestamp().to_string()),
                ("period2", req.end().timestamp().to_string()),
            ];
            let envelope = match self.chart(symbol, &query).await {
                Ok(envelope) => envelope,
                // Unknown ticker: empty series, not a failed request.
                Err(FeedError::NotFound { .. }) => {
                    response.bars.insert(symbol.clone(), Vec::new());
                    continue;
                }
                Err(e) => return Err(e),
            };
            let mut bars = Vec::new();
            if let Some(series) = envelope.into_series() {
                for point in series.points() {
                    let timestamp = Utc
                        .timestamp_opt(point.unix_seconds, 0)
                        .single()
                        .ok_or_else(|| {
                            FeedError::Data(format!("yahoo: bad timestamp {}", point.unix_seconds))
                        })?;
                    bars.push(Bar {
                        timestamp,
                        open: point.open,
                        high: point.high,
                        low: point.low,
                        close: point.close,
                        volume: point.volume,
                    });
                }
            }
            response.bars.insert(symbol.clone(), bars);
        }
        Ok(response)
    }
}

#[async_trait]
impl LatestPricesProvider for YahooConnector {
    async fn latest_prices(&self, symbols: &[String]) -> Result<PriceMap, FeedError> {
        let mut prices = PriceMap::new();
        for symbol in symbols {
            let query = [
                ("interval", "1d".to_string()),
                ("range", "1d".to_string()),
            ];
            let envelope = match self.chart(symbol, &query).await {
                Ok(envelope) => envelope,
                Err(FeedError::NotFound { .. }) => {
                    tracing::debug!(symbol, "yahoo has no chart for symbol");
                    continue;
                }
                Err(e) => return Err(e),
            };
            // Live price when the market is open, previous close otherwise.
            if let Some(price) = envelope.latest_price() {
                prices.insert(symbol.clone(), price);
            }
        }
        Ok(prices)
    }
}

#[async_trait]
impl FeedConnector for YahooConnector {
    fn name(&self) -> &'static str {
        YAHOO.as_str()
    }

    fn vendor(&self) -> &'static str {
        "Yahoo Finance"
    }

    fn as_bars_provider(&self) -> Option<&dyn BarsProvider> {
        Some(self)
    }

    fn as_latest_prices_provider(&self) -> Option<&dyn LatestPricesProvider> {
        Some(self)
    }

    async fn health_probe(&self) -> Result<(), FeedError> {
        let query = [
            ("interval", "1d".to_string()),
            ("range", "1d".to_string()),
        ];
        self.chart("SPY", &query).await.map(|_| ())
    }
}
