//! The `DataManager` facade and its builder.

use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::Serialize;
use serde::de::DeserializeOwned;

use quantfeed_cache::{CacheStats, DiskTtlCache};
use quantfeed_core::{
    Bar, BarsRequest, BarsResponse, CacheKey, Capability, ConnectorKey, CryptoPair, FeedConnector,
    FeedError, ManagerConfig, NewsArticle, OptionChain, OptionChainFilters, PriceMap, Timeframe,
    normalize_symbols,
};

use crate::health::ProviderHealth;
use crate::router::SourceRouter;

const MAX_NEWS_LIMIT: usize = 1_000;

/// A registered provider and what it can serve, as reported by
/// [`DataManager::available_sources`].
#[derive(Debug, Clone)]
pub struct SourceInfo {
    /// The provider's connector key.
    pub key: ConnectorKey,
    /// Vendor string from the connector.
    pub vendor: &'static str,
    /// Capabilities the provider advertises.
    pub capabilities: Vec<Capability>,
    /// Whether the router currently considers the provider available.
    pub available: bool,
}

/// Unified facade over every registered provider.
///
/// Each operation resolves a deterministic cache key, serves a fresh cached
/// record when one exists, and otherwise routes the request across providers
/// in priority order, caching the first success under the capability's TTL.
pub struct DataManager {
    router: SourceRouter,
    cache: DiskTtlCache,
    cfg: ManagerConfig,
}

impl std::fmt::Debug for DataManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let providers: Vec<&'static str> = self
            .router
            .connectors()
            .iter()
            .map(|c| c.name())
            .collect();
        f.debug_struct("DataManager")
            .field("providers", &providers)
            .field("cache", &self.cache)
            .finish_non_exhaustive()
    }
}

/// Builder for a [`DataManager`].
pub struct DataManagerBuilder {
    connectors: Vec<Arc<dyn FeedConnector>>,
    cfg: ManagerConfig,
}

impl Default for DataManagerBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl DataManagerBuilder {
    /// Start with defaults: no connectors, registration-order routing, the
    /// default cache tiers, 30s provider timeout, no overall deadline.
    #[must_use]
    pub fn new() -> Self {
        Self {
            connectors: vec![],
            cfg: ManagerConfig::default(),
        }
    }

    /// Register a provider connector. Registration order is the fallback
    /// attempt order for capabilities without an explicit preference.
    #[must_use]
    pub fn with_connector(mut self, c: Arc<dyn FeedConnector>) -> Self {
        self.connectors.push(c);
        self
    }

    /// Set the preferred provider order for one capability using connector
    /// instances. Unlisted connectors stay eligible after the listed ones.
    #[must_use]
    pub fn prefer(mut self, cap: Capability, connectors_desc: &[Arc<dyn FeedConnector>]) -> Self {
        let keys: Vec<ConnectorKey> = connectors_desc
            .iter()
            .map(|c| ConnectorKey::new(c.name()))
            .collect();
        self.cfg.routing = std::mem::take(&mut self.cfg.routing).prefer(cap, &keys);
        self
    }

    /// Set the cache directory.
    #[must_use]
    pub fn cache_dir(mut self, dir: impl Into<std::path::PathBuf>) -> Self {
        self.cfg.cache.dir = dir.into();
        self
    }

    /// Override the cache TTL for one capability. Zero disables caching for
    /// that capability.
    #[must_use]
    pub fn cache_ttl(mut self, cap: Capability, ttl: Duration) -> Self {
        self.cfg.cache.ttl.insert(cap, ttl);
        self
    }

    /// Bound each provider attempt.
    #[must_use]
    pub const fn provider_timeout(mut self, timeout: Duration) -> Self {
        self.cfg.provider_timeout = timeout;
        self
    }

    /// Bound each manager call end to end, across all failover attempts.
    /// When exceeded the caller gets `DeadlineExceeded` and no further
    /// providers are tried.
    #[must_use]
    pub const fn request_timeout(mut self, timeout: Duration) -> Self {
        self.cfg.request_timeout = Some(timeout);
        self
    }

    /// How long a failing provider sits out before being retried.
    #[must_use]
    pub const fn provider_cooldown(mut self, cooldown: Duration) -> Self {
        self.cfg.provider_cooldown = cooldown;
        self
    }

    /// Build the manager.
    ///
    /// Preference lists are validated against the registered connectors:
    /// unknown keys are dropped, duplicates keep their first position.
    ///
    /// # Errors
    /// Returns `InvalidArg` when no connectors are registered, or a cache
    /// error when the cache directory cannot be created.
    pub fn build(mut self) -> Result<DataManager, FeedError> {
        if self.connectors.is_empty() {
            return Err(FeedError::InvalidArg(
                "no connectors registered; add at least one via with_connector(...)".to_string(),
            ));
        }

        let known: HashSet<&'static str> = self.connectors.iter().map(|c| c.name()).collect();
        for keys in self.cfg.routing.priority_mut() {
            let mut seen: HashSet<&'static str> = HashSet::new();
            keys.retain(|k| known.contains(k.as_str()) && seen.insert(k.as_str()));
        }

        let cache = DiskTtlCache::new(&self.cfg.cache)?;
        let router = SourceRouter::new(
            self.connectors,
            self.cfg.routing.clone(),
            self.cfg.provider_cooldown,
            self.cfg.provider_timeout,
        );
        Ok(DataManager {
            router,
            cache,
            cfg: self.cfg,
        })
    }
}

impl DataManager {
    /// Start building a manager.
    #[must_use]
    pub fn builder() -> DataManagerBuilder {
        DataManagerBuilder::new()
    }

    async fn with_deadline<T, Fut>(&self, cap: Capability, fut: Fut) -> Result<T, FeedError>
    where
        Fut: Future<Output = Result<T, FeedError>>,
    {
        match self.cfg.request_timeout {
            Some(deadline) => (tokio::time::timeout(deadline, fut).await)
                .unwrap_or_else(|_| Err(FeedError::deadline_exceeded(cap.as_str()))),
            None => fut.await,
        }
    }

    /// Cache-aside wrapper shared by every operation.
    async fn cached<T, F, Fut>(
        &self,
        cap: Capability,
        key: CacheKey,
        fetch: F,
    ) -> Result<T, FeedError>
    where
        T: Serialize + DeserializeOwned + Send,
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<T, FeedError>>,
    {
        let ttl = self.cfg.cache.ttl_for(cap);
        if ttl.is_some()
            && let Some(hit) = self.cache.get::<T>(&key).await
        {
            tracing::debug!(capability = %cap, key = %key, "cache hit");
            return Ok(hit);
        }

        let value = self.with_deadline(cap, fetch()).await?;
        if let Some(ttl) = ttl
            && let Err(e) = self.cache.put(&key, &value, ttl).await
        {
            // A broken cache must not fail a successful fetch.
            tracing::warn!(capability = %cap, key = %key, error = %e, "cache write failed");
        }
        Ok(value)
    }

    /// Fetch historical OHLCV bars for the requested symbols.
    ///
    /// # Errors
    /// `Unsupported` when no provider serves bars, `DeadlineExceeded` when
    /// the overall deadline lapses, `AllProvidersFailed` when every eligible
    /// provider failed.
    pub async fn historical_bars(&self, req: &BarsRequest) -> Result<BarsResponse, FeedError> {
        let key = CacheKey::bars(req);
        self.cached(Capability::Bars, key, || {
            self.router.execute(Capability::Bars, "bars", |c| {
                c.as_bars_provider()?;
                let req = req.clone();
                Some(async move {
                    match c.as_bars_provider() {
                        Some(p) => p.historical_bars(&req).await,
                        None => Err(FeedError::provider(c.name(), "capability lost mid-call")),
                    }
                })
            })
        })
        .await
    }

    /// Fetch the most recent trade price per symbol. Symbols no provider has
    /// a print for are absent from the map.
    ///
    /// # Errors
    /// `InvalidArg` when the symbol set normalizes to empty; otherwise the
    /// same failure modes as [`historical_bars`](Self::historical_bars).
    pub async fn latest_prices<I, S>(&self, symbols: I) -> Result<PriceMap, FeedError>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let symbols = normalize_symbols(symbols);
        if symbols.is_empty() {
            return Err(FeedError::InvalidArg("no symbols given".to_string()));
        }
        let key = CacheKey::latest_prices(&symbols);
        self.cached(Capability::LatestPrices, key, || {
            self.router
                .execute(Capability::LatestPrices, "latest prices", |c| {
                    c.as_latest_prices_provider()?;
                    let symbols = symbols.clone();
                    Some(async move {
                        match c.as_latest_prices_provider() {
                            Some(p) => p.latest_prices(&symbols).await,
                            None => Err(FeedError::provider(c.name(), "capability lost mid-call")),
                        }
                    })
                })
        })
        .await
    }

    /// Fetch the option chain for an underlying, with optional server-side
    /// filters.
    ///
    /// # Errors
    /// `InvalidArg` for an empty underlying; otherwise the same failure
    /// modes as [`historical_bars`](Self::historical_bars).
    pub async fn option_chain(
        &self,
        underlying: &str,
        filters: &OptionChainFilters,
    ) -> Result<OptionChain, FeedError> {
        let underlying = underlying.trim().to_ascii_uppercase();
        if underlying.is_empty() {
            return Err(FeedError::InvalidArg("empty underlying".to_string()));
        }
        let key = CacheKey::option_chain(&underlying, filters);
        let label = format!("option chain for {underlying}");
        let filters = *filters;
        self.cached(Capability::OptionChain, key, || {
            self.router.execute(Capability::OptionChain, &label, |c| {
                c.as_option_chain_provider()?;
                let underlying = underlying.clone();
                Some(async move {
                    match c.as_option_chain_provider() {
                        Some(p) => p.option_chain(&underlying, &filters).await,
                        None => Err(FeedError::provider(c.name(), "capability lost mid-call")),
                    }
                })
            })
        })
        .await
    }

    /// Fetch OHLCV bars for a crypto pair.
    ///
    /// # Errors
    /// `InvalidArg` when `start` is not before `end`; otherwise the same
    /// failure modes as [`historical_bars`](Self::historical_bars).
    pub async fn crypto_bars(
        &self,
        pair: &CryptoPair,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
        timeframe: Timeframe,
    ) -> Result<Vec<Bar>, FeedError> {
        if start >= end {
            return Err(FeedError::InvalidArg(format!(
                "start {start} is not before end {end}"
            )));
        }
        let key = CacheKey::crypto_bars(pair, start, end, timeframe);
        let label = format!("crypto bars for {}", pair.code());
        self.cached(Capability::CryptoBars, key, || {
            self.router.execute(Capability::CryptoBars, &label, |c| {
                c.as_crypto_bars_provider()?;
                let pair = pair.clone();
                Some(async move {
                    match c.as_crypto_bars_provider() {
                        Some(p) => p.crypto_bars(&pair, start, end, timeframe).await,
                        None => Err(FeedError::provider(c.name(), "capability lost mid-call")),
                    }
                })
            })
        })
        .await
    }

    /// Fetch up to `limit` recent articles, optionally restricted to one
    /// symbol. `limit` is clamped to the provider maximum of 1000.
    ///
    /// # Errors
    /// `InvalidArg` for a zero limit; otherwise the same failure modes as
    /// [`historical_bars`](Self::historical_bars).
    pub async fn news(
        &self,
        symbol: Option<&str>,
        limit: usize,
    ) -> Result<Vec<NewsArticle>, FeedError> {
        if limit == 0 {
            return Err(FeedError::InvalidArg("news limit must be positive".to_string()));
        }
        let limit = limit.min(MAX_NEWS_LIMIT);
        let symbol = symbol.map(|s| s.trim().to_ascii_uppercase());
        let key = CacheKey::news(symbol.as_deref(), limit);
        self.cached(Capability::News, key, || {
            self.router.execute(Capability::News, "news", |c| {
                c.as_news_provider()?;
                let symbol = symbol.clone();
                Some(async move {
                    match c.as_news_provider() {
                        Some(p) => p.news(symbol.as_deref(), limit).await,
                        None => Err(FeedError::provider(c.name(), "capability lost mid-call")),
                    }
                })
            })
        })
        .await
    }

    /// Cache hit/miss counters.
    #[must_use]
    pub fn cache_stats(&self) -> CacheStats {
        self.cache.stats()
    }

    /// Drop every cached record.
    ///
    /// # Errors
    /// Propagates cache directory errors.
    pub async fn clear_cache(&self) -> Result<(), FeedError> {
        self.cache.clear().await
    }

    /// Probe every registered provider concurrently and report the result
    /// alongside its current routing availability.
    ///
    /// Probe outcomes feed the router's health registry: a failed probe can
    /// put the provider on cooldown, a successful one lifts it.
    pub async fn health_check(&self) -> Vec<ProviderHealth> {
        let probes = self.router.connectors().iter().map(|c| {
            let c = c.clone();
            async move {
                let outcome =
                    match tokio::time::timeout(self.cfg.provider_timeout, c.health_probe()).await {
                        Ok(outcome) => outcome,
                        Err(_) => Err(FeedError::provider_timeout(c.name(), "health probe")),
                    };
                (c, outcome)
            }
        });
        futures::future::join_all(probes)
            .await
            .into_iter()
            .map(|(c, outcome)| {
                match &outcome {
                    Ok(()) => self.router.health().record_success(c.name()),
                    Err(e) => self.router.health().record_failure(c.name(), e),
                }
                ProviderHealth {
                    key: c.key(),
                    vendor: c.vendor(),
                    healthy: outcome.is_ok(),
                    available: self.router.health().available(c.name()),
                    last_success_at: self.router.health().last_success_at(c.name()),
                    error: outcome.err(),
                }
            })
            .collect()
    }

    /// Every registered provider with its advertised capabilities.
    #[must_use]
    pub fn available_sources(&self) -> Vec<SourceInfo> {
        self.router
            .connectors()
            .iter()
            .map(|c| SourceInfo {
                key: c.key(),
                vendor: c.vendor(),
                capabilities: Capability::ALL
                    .into_iter()
                    .filter(|cap| c.supports(*cap))
                    .collect(),
                available: self.router.health().available(c.name()),
            })
            .collect()
    }
}
