//! The `FeedConnector` trait and focused capability role traits.
//!
//! Connectors advertise capabilities by returning `Some` from the matching
//! `as_*_provider` accessor. The router filters candidates on capability,
//! never on provider identity, so adding an operation to a connector is a
//! one-accessor change.

use async_trait::async_trait;

use chrono::{DateTime, Utc};

use crate::types::{
    Bar, BarsRequest, BarsResponse, CryptoPair, NewsArticle, OptionChain, OptionChainFilters,
    PriceMap, Timeframe,
};
use crate::{Capability, FeedError};

/// Typed key for identifying connectors in priority configuration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ConnectorKey(pub &'static str);

impl ConnectorKey {
    /// Construct a new typed connector key from a static name.
    #[must_use]
    pub const fn new(name: &'static str) -> Self {
        Self(name)
    }

    /// Returns the inner static string.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        self.0
    }
}

impl From<ConnectorKey> for &'static str {
    fn from(k: ConnectorKey) -> Self {
        k.0
    }
}

/// Focused role trait for connectors that serve historical equity bars.
#[async_trait]
pub trait BarsProvider: Send + Sync {
    /// Fetch OHLCV bars for every symbol in the request.
    ///
    /// Symbols with no data in the range appear with an empty bar list;
    /// partial upstream payloads never surface as parse errors.
    async fn historical_bars(&self, req: &BarsRequest) -> Result<BarsResponse, FeedError>;
}

/// Focused role trait for connectors that serve latest trade prices.
#[async_trait]
pub trait LatestPricesProvider: Send + Sync {
    /// Fetch the most recent trade price for each symbol.
    ///
    /// Symbols the provider has no print for are simply absent from the map.
    async fn latest_prices(&self, symbols: &[String]) -> Result<PriceMap, FeedError>;
}

/// Focused role trait for connectors that serve option chains.
#[async_trait]
pub trait OptionChainProvider: Send + Sync {
    /// Fetch the option chain for an underlying, applying any filters
    /// server-side where the provider supports it.
    async fn option_chain(
        &self,
        underlying: &str,
        filters: &OptionChainFilters,
    ) -> Result<OptionChain, FeedError>;
}

/// Focused role trait for connectors that serve crypto pair bars.
#[async_trait]
pub trait CryptoBarsProvider: Send + Sync {
    /// Fetch OHLCV bars for a crypto pair.
    async fn crypto_bars(
        &self,
        pair: &CryptoPair,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
        timeframe: Timeframe,
    ) -> Result<Vec<Bar>, FeedError>;
}

/// Focused role trait for connectors that serve market news.
#[async_trait]
pub trait NewsProvider: Send + Sync {
    /// Fetch up to `limit` recent articles, optionally filtered by symbol.
    async fn news(&self, symbol: Option<&str>, limit: usize)
    -> Result<Vec<NewsArticle>, FeedError>;
}

/// Main connector trait implemented by provider crates.
///
/// Exposes capability discovery via accessor methods returning trait-object
/// references; the default for every accessor is "unsupported".
#[async_trait]
pub trait FeedConnector: Send + Sync {
    /// A stable identifier for priority lists (e.g. "quantfeed-polygon").
    fn name(&self) -> &'static str;

    /// Canonical connector key constructed from the static name.
    fn key(&self) -> ConnectorKey {
        ConnectorKey::new(self.name())
    }

    /// Human-friendly vendor string.
    fn vendor(&self) -> &'static str {
        "unknown"
    }

    /// Advertise historical-bars capability.
    fn as_bars_provider(&self) -> Option<&dyn BarsProvider> {
        None
    }

    /// Advertise latest-prices capability.
    fn as_latest_prices_provider(&self) -> Option<&dyn LatestPricesProvider> {
        None
    }

    /// Advertise option-chain capability.
    fn as_option_chain_provider(&self) -> Option<&dyn OptionChainProvider> {
        None
    }

    /// Advertise crypto-bars capability.
    fn as_crypto_bars_provider(&self) -> Option<&dyn CryptoBarsProvider> {
        None
    }

    /// Advertise news capability.
    fn as_news_provider(&self) -> Option<&dyn NewsProvider> {
        None
    }

    /// Whether this connector advertises the given capability.
    fn supports(&self, cap: Capability) -> bool {
        match cap {
            Capability::Bars => self.as_bars_provider().is_some(),
            Capability::LatestPrices => self.as_latest_prices_provider().is_some(),
            Capability::OptionChain => self.as_option_chain_provider().is_some(),
            Capability::CryptoBars => self.as_crypto_bars_provider().is_some(),
            Capability::News => self.as_news_provider().is_some(),
        }
    }

    /// One cheap request against the provider to verify reachability.
    ///
    /// The default succeeds; HTTP connectors override this with a real probe.
    async fn health_probe(&self) -> Result<(), FeedError> {
        Ok(())
    }
}
