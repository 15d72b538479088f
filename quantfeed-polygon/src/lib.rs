//! Polygon.io connector.
//!
//! Serves every capability: historical aggregates, last trades, option
//! contract listings, crypto aggregates, and news. All requests carry the API
//! key both as a bearer header and as the `apiKey` query parameter, and flow
//! through the shared rate-limited retrying client.
#![warn(missing_docs)]

use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, TimeZone, Utc};
use reqwest::header::{AUTHORIZATION, HeaderMap, HeaderValue};

use quantfeed_client::{RateLimiter, RetryingClient};
use quantfeed_core::{
    Bar, BarsProvider, BarsRequest, BarsResponse, ConnectorKey, CryptoBarsProvider, CryptoPair,
    FeedConnector, FeedError, LatestPricesProvider, NewsArticle, NewsProvider, OptionChain,
    OptionChainFilters, OptionChainProvider, PriceMap, RateLimitConfig, RetryConfig, Timeframe,
};

mod wire;

use wire::{AggsEnvelope, ContractsEnvelope, LastTradeEnvelope, MarketStatus, NewsEnvelope};

/// Key under which this connector registers.
pub const POLYGON: ConnectorKey = ConnectorKey::new("quantfeed-polygon");

const DEFAULT_BASE_URL: &str = "https://api.polygon.io";
const AGG_PAGE_LIMIT: u32 = 50_000;
const CONTRACT_PAGE_LIMIT: u32 = 1_000;

/// Polygon subscription tier; decides the rate budget.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Tier {
    /// 5 calls per minute.
    #[default]
    Free,
    /// 100 calls per minute.
    Starter,
    /// 1000 calls per minute.
    Developer,
    /// 10000 calls per minute.
    Advanced,
}

impl Tier {
    /// The per-minute budget for this tier.
    #[must_use]
    pub const fn rate_limit(self) -> RateLimitConfig {
        match self {
            Self::Free => RateLimitConfig::per_minute(5),
            Self::Starter => RateLimitConfig::per_minute(100),
            Self::Developer => RateLimitConfig::per_minute(1_000),
            Self::Advanced => RateLimitConfig::per_minute(10_000),
        }
    }
}

/// Connector backed by the Polygon.io REST API.
pub struct PolygonConnector {
    client: RetryingClient,
    base_url: String,
    api_key: String,
}

impl PolygonConnector {
    /// Build a connector against the production API with default retry
    /// policy.
    ///
    /// # Errors
    /// Returns `InvalidArg` for an API key that cannot form a header value,
    /// or a provider error if the HTTP client cannot be built.
    pub fn new(api_key: impl Into<String>, tier: Tier) -> Result<Self, FeedError> {
        Self::with_base_url(api_key, tier, DEFAULT_BASE_URL, RetryConfig::default())
    }

    /// Build a connector against an alternate base URL. Tests point this at a
    /// local server.
    ///
    /// # Errors
    /// Same conditions as [`new`](Self::new).
    pub fn with_base_url(
        api_key: impl Into<String>,
        tier: Tier,
        base_url: impl Into<String>,
        retry: RetryConfig,
    ) -> Result<Self, FeedError> {
        let api_key = api_key.into();
        let mut bearer = HeaderValue::from_str(&format!("Bearer {api_key}"))
            .map_err(|_| FeedError::InvalidArg("api key is not a valid header value".into()))?;
        bearer.set_sensitive(true);
        let mut headers = HeaderMap::new();
        headers.insert(AUTHORIZATION, bearer);

        let limiter = Arc::new(RateLimiter::new(POLYGON.as_str(), tier.rate_limit()));
        let client = RetryingClient::with_headers(POLYGON.as_str(), limiter, retry, headers)?;
        Ok(Self {
            client,
            base_url: base_url.into(),
            api_key,
        })
    }

    fn url(&self, path: &str) -> String {
        format!("{}{path}", self.base_url)
    }

    fn auth_param(&self) -> (&'static str, String) {
        ("apiKey", self.api_key.clone())
    }

    /// Aggregates for one ticker. Polygon uses the same endpoint for equities
    /// and `X:`-prefixed crypto tickers.
    async fn aggregates(
        &self,
        ticker: &str,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
        timeframe: Timeframe,
    ) -> Result<Vec<Bar>, FeedError> {
        let (multiplier, span) = timespan(timeframe);
        let path = format!(
            "/v2/aggs/ticker/{ticker}/range/{multiplier}/{span}/{}/{}",
            start.timestamp_millis(),
            end.timestamp_millis()
        );
        let query = [
            ("adjusted", "true".to_string()),
            ("sort", "asc".to_string()),
            ("limit", AGG_PAGE_LIMIT.to_string()),
            self.auth_param(),
        ];
        let envelope: AggsEnvelope = self.client.get_json(&self.url(&path), &query).await?;
        envelope
            .results
            .unwrap_or_default()
            .into_iter()
            .map(|agg| {
                Ok(Bar {
                    timestamp: millis_to_utc(agg.t)?,
                    open: agg.o,
                    high: agg.h,
                    low: agg.l,
                    close: agg.c,
                    volume: agg.v,
                })
            })
            .collect()
    }
}

fn timespan(timeframe: Timeframe) -> (u32, &'static str) {
    match timeframe {
        Timeframe::OneMinute => (1, "minute"),
        Timeframe::FiveMinutes => (5, "minute"),
        Timeframe::FifteenMinutes => (15, "minute"),
        Timeframe::OneHour => (1, "hour"),
        Timeframe::OneDay => (1, "day"),
    }
}

fn millis_to_utc(ms: i64) -> Result<DateTime<Utc>, FeedError> {
    Utc.timestamp_millis_opt(ms)
        .single()
        .ok_or_else(|| FeedError::Data(format!("polygon: bad timestamp {ms}")))
}

#[async_trait]
impl BarsProvider for PolygonConnector {
    async fn historical_bars(&self, req: &BarsRequest) -> Result<BarsResponse, FeedError> {
        let mut response = BarsResponse::default();
        for symbol in req.symbols() {
            let bars = self
                .aggregates(symbol, req.start(), req.end(), req.timeframe())
                .await?;
            response.bars.insert(symbol.clone(), bars);
        }
        Ok(response)
    }
}

#[async_trait]
impl LatestPricesProvider for PolygonConnector {
    async fn latest_prices(&self, symbols: &[String]) -> Result<PriceMap, FeedError> {
        let mut prices = PriceMap::new();
        for symbol in symbols {
            let path = format!("/v2/last/trade/{symbol}");
            let result: Result<LastTradeEnvelope, FeedError> = self
                .client
                .get_json(&self.url(&path), &[self.auth_param()])
                .await;
            match result {
                Ok(envelope) => {
                    if let Some(trade) = envelope.results {
                        prices.insert(symbol.clone(), trade.p);
                    }
                }
                // No print for this symbol; leave it out of the map.
                Err(FeedError::NotFound { .. }) => {
                    tracing::debug!(symbol, "polygon has no last trade");
                }
                Err(e) => return Err(e),
            }
        }
        Ok(prices)
    }
}

#[async_trait]
impl OptionChainProvider for PolygonConnector {
    async fn option_chain(
        &self,
        underlying: &str,
        filters: &OptionChainFilters,
    ) -> Result<OptionChain, FeedError> {
        let underlying = underlying.trim().to_ascii_uppercase();
        let mut query = vec![
            ("underlying_ticker", underlying.clone()),
            ("limit", CONTRACT_PAGE_LIMIT.to_string()),
            self.auth_param(),
        ];
        if let Some(expiration) = filters.expiration {
            query.push(("expiration_date", expiration.to_string()));
        }
        if let Some(strike) = filters.strike {
            query.push(("strike_price", strike.normalize().to_string()));
        }
        if let Some(right) = filters.right {
            query.push(("contract_type", right.as_str().to_string()));
        }

        let envelope: ContractsEnvelope = self
            .client
            .get_json(&self.url("/v3/reference/options/contracts"), &query)
            .await?;
        let contracts = envelope
            .results
            .unwrap_or_default()
            .into_iter()
            .filter_map(|wire| match wire.into_contract() {
                Ok(contract) => Some(contract),
                Err(e) => {
                    tracing::debug!(error = %e, "skipping malformed option contract");
                    None
                }
            })
            .collect();
        Ok(OptionChain {
            underlying,
            contracts,
        })
    }
}

#[async_trait]
impl CryptoBarsProvider for PolygonConnector {
    async fn crypto_bars(
        &self,
        pair: &CryptoPair,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
        timeframe: Timeframe,
    ) -> Result<Vec<Bar>, FeedError> {
        let ticker = format!("X:{}", pair.code());
        self.aggregates(&ticker, start, end, timeframe).await
    }
}

#[async_trait]
impl NewsProvider for PolygonConnector {
    async fn news(
        &self,
        symbol: Option<&str>,
        limit: usize,
    ) -> Result<Vec<NewsArticle>, FeedError> {
        let mut query = vec![
            ("limit", limit.to_string()),
            ("order", "desc".to_string()),
            self.auth_param(),
        ];
        if let Some(symbol) = symbol {
            query.push(("ticker", symbol.trim().to_ascii_uppercase()));
        }
        let envelope: NewsEnvelope = self
            .client
            .get_json(&self.url("/v2/reference/news"), &query)
            .await?;
        Ok(envelope
            .results
            .unwrap_or_default()
            .into_iter()
            .map(wire::NewsWire::into_article)
            .collect())
    }
}

#[async_trait]
impl FeedConnector for PolygonConnector {
    fn name(&self) -> &'static str {
        POLYGON.as_str()
    }

    fn vendor(&self) -> &'static str {
        "Polygon.io"
    }

    fn as_bars_provider(&self) -> Option<&dyn BarsProvider> {
        Some(self)
    }

    fn as_latest_prices_provider(&self) -> Option<&dyn LatestPricesProvider> {
        Some(self)
    }

    fn as_option_chain_provider(&self) -> Option<&dyn OptionChainProvider> {
        Some(self)
    }

    fn as_crypto_bars_provider(&self) -> Option<&dyn CryptoBarsProvider> {
        Some(self)
    }

    fn as_news_provider(&self) -> Option<&dyn NewsProvider> {
        Some(self)
    }

    async fn health_probe(&self) -> Result<(), FeedError> {
        let _: MarketStatus = self
            .client
            .get_json(&self.url("/v1/marketstatus/now"), &[self.auth_param()])
            .await?;
        Ok(())
    }
}
