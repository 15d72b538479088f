//! Alpaca Market Data connector.
//!
//! Serves stock bars, latest prices, and crypto bars from the
//! `data.alpaca.markets` REST API. Latest prices come from the most recent
//! quote as the bid/ask midpoint, which is what Alpaca recommends for an
//! indicative price outside of a fill. Bars endpoints are paginated; pages
//! are followed until the token runs out.
#![warn(missing_docs)]

use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, SecondsFormat, Utc};
use reqwest::header::{HeaderMap, HeaderName, HeaderValue};
use rust_decimal::Decimal;

use quantfeed_client::{RateLimiter, RetryingClient};
use quantfeed_core::{
    Bar, BarsProvider, BarsRequest, BarsResponse, ConnectorKey, CryptoBarsProvider, CryptoPair,
    FeedConnector, FeedError, LatestPricesProvider, PriceMap, RateLimitConfig, RetryConfig,
    Timeframe,
};

mod wire;

use wire::{BarsEnvelope, LatestQuotesEnvelope};

/// Key under which this connector registers.
pub const ALPACA: ConnectorKey = ConnectorKey::new("quantfeed-alpaca");

const DEFAULT_BASE_URL: &str = "https://data.alpaca.markets";
const BAR_PAGE_LIMIT: u32 = 10_000;

/// Credentials for the data API.
#[derive(Debug, Clone)]
pub struct AlpacaCredentials {
    /// `APCA-API-KEY-ID` header value.
    pub key_id: String,
    /// `APCA-API-SECRET-KEY` header value.
    pub secret: String,
}

impl AlpacaCredentials {
    /// Bundle a key pair.
    pub fn new(key_id: impl Into<String>, secret: impl Into<String>) -> Self {
        Self {
            key_id: key_id.into(),
            secret: secret.into(),
        }
    }

    fn headers(&self) -> Result<HeaderMap, FeedError> {
        let mut headers = HeaderMap::new();
        for (name, value) in [
            ("apca-api-key-id", &self.key_id),
            ("apca-api-secret-key", &self.secret),
        ] {
            let mut value = HeaderValue::from_str(value).map_err(|_| {
                FeedError::InvalidArg(format!("{name} is not a valid header value"))
            })?;
            value.set_sensitive(true);
            headers.insert(HeaderName::from_static(name), value);
        }
        Ok(headers)
    }
}

/// Connector backed by the Alpaca Market Data REST API.
pub struct AlpacaConnector {
    client: RetryingClient,
    base_url: String,
}

impl AlpacaConnector {
    /// Build a connector against the production API. The free data plan
    /// allows 200 calls per minute.
    ///
    /// # Errors
    /// Returns `InvalidArg` for credentials that cannot form header values,
    /// or a provider error if the HTTP client cannot be built.
    pub fn new(credentials: &AlpacaCredentials) -> Result<Self, FeedError> {
        Self::with_base_url(credentials, DEFAULT_BASE_URL, RetryConfig::default())
    }

    /// Build a connector against an alternate base URL. Tests point this at
    /// a local server.
    ///
    /// # Errors
    /// Same conditions as [`new`](Self::new).
    pub fn with_base_url(
        credentials: &AlpacaCredentials,
        base_url: impl Into<String>,
        retry: RetryConfig,
    ) -> Result<Self, FeedError> {
        let limiter = Arc::new(RateLimiter::new(
            ALPACA.as_str(),
            RateLimitConfig::per_minute(200),
        ));
        let client = RetryingClient::with_headers(
            ALPACA.as_str(),
            limiter,
            retry,
            credentials.headers()?,
        )?;
        Ok(Self {
            client,
            base_url: base_url.into(),
        })
    }

    fn url(&self, path: &str) -> String {
        format!("{}{path}", self.base_url)
    }

    /// Fetch every page of a bars endpoint and fold series per symbol.
    async fn paged_bars(
        &self,
        path: &str,
        symbols: &str,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
        timeframe: Timeframe,
    ) -> Result<BarsResponse, FeedError> {
        let mut response = BarsResponse::default();
        let mut page_token: Option<String> = None;
        loop {
            let mut query = vec![
                ("symbols", symbols.to_string()),
                ("timeframe", timeframe.as_str().to_string()),
                ("start", rfc3339(start)),
                ("end", rfc3339(end)),
                ("limit", BAR_PAGE_LIMIT.to_string()),
            ];
            if let Some(token) = page_token.take() {
                query.push(("page_token", token));
            }
            let envelope: BarsEnvelope = self.client.get_json(&self.url(path), &query).await?;
            for (symbol, bars) in envelope.bars.unwrap_or_default() {
                let series = response.bars.entry(symbol).or_default();
                for bar in bars {
                    series.push(bar.into_bar());
                }
            }
            match envelope.next_page_token {
                Some(token) if !token.is_empty() => page_token = Some(token),
                _ => break,
            }
        }
        Ok(response)
    }
}

fn rfc3339(t: DateTime<Utc>) -> String {
    t.to_rfc3339_opts(SecondsFormat::Secs, true)
}

#[async_trait]
impl BarsProvider for AlpacaConnector {
    async fn historical_bars(&self, req: &BarsRequest) -> Result<BarsResponse, FeedError> {
        let symbols = req.symbols().join(",");
        let mut response = self
            .paged_bars(
                "/v2/stocks/bars",
                &symbols,
                req.start(),
                req.end(),
                req.timeframe(),
            )
            .await?;
        // Requested symbols with no data still get an entry.
        for symbol in req.symbols() {
            response.bars.entry(symbol.clone()).or_default();
        }
        Ok(response)
    }
}

#[async_trait]
impl LatestPricesProvider for AlpacaConnector {
    async fn latest_prices(&self, symbols: &[String]) -> Result<PriceMap, FeedError> {
        let query = [("symbols", symbols.join(","))];
        let envelope: LatestQuotesEnvelope = self
            .client
            .get_json(&self.url("/v2/stocks/quotes/latest"), &query)
            .await?;
        let mut prices = PriceMap::new();
        for (symbol, quote) in envelope.quotes.unwrap_or_default() {
            match quote.mid() {
                Some(mid) => {
                    prices.insert(symbol, mid);
                }
                None => {
                    tracing::debug!(symbol, "alpaca quote has no two-sided market");
                }
            }
        }
        Ok(prices)
    }
}

#[async_trait]
impl CryptoBarsProvider for AlpacaConnector {
    async fn crypto_bars(
        &self,
        pair: &CryptoPair,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
        timeframe: Timeframe,
    ) -> Result<Vec<Bar>, FeedError> {
        let symbol = format!("{}/{}", pair.base(), pair.quote());
        let response = self
            .paged_bars("/v1beta3/crypto/us/bars", &symbol, start, end, timeframe)
            .await?;
        Ok(response.bars.into_values().next().unwrap_or_default())
    }
}

#[async_trait]
impl FeedConnector for AlpacaConnector {
    fn name(&self) -> &'static str {
        ALPACA.as_str()
    }

    fn vendor(&self) -> &'static str {
        "Alpaca"
    }

    fn as_bars_provider(&self) -> Option<&dyn BarsProvider> {
        Some(self)
    }

    fn as_latest_prices_provider(&self) -> Option<&dyn LatestPricesProvider> {
        Some(self)
    }

    fn as_crypto_bars_provider(&self) -> Option<&dyn CryptoBarsProvider> {
        Some(self)
    }

    async fn health_probe(&self) -> Result<(), FeedError> {
        let query = [("symbols", "SPY".to_string())];
        let _: LatestQuotesEnvelope = self
            .client
            .get_json(&self.url("/v2/stocks/quotes/latest"), &query)
            .await?;
        Ok(())
    }
}

/// Indicative price from a two-sided quote.
pub(crate) fn midpoint(bid: Decimal, ask: Decimal) -> Option<Decimal> {
    if bid <= Decimal::ZERO || ask <= Decimal::ZERO {
        return None;
    }
    Some((bid + ask) / Decimal::from(2))
}
