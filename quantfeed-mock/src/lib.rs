//! Scripted connector for tests.
//!
//! Outcomes are queued per capability at build time and popped per call, so
//! a test can script "fail once, then succeed" sequences. A capability is
//! advertised as soon as anything is scripted for it. Call counts are
//! tracked per capability, which is how routing tests assert who was (and
//! was not) consulted.
#![warn(missing_docs)]

use std::collections::{HashMap, HashSet, VecDeque};
use std::sync::Mutex;
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use quantfeed_core::{
    Bar, BarsProvider, BarsRequest, BarsResponse, Capability, CryptoBarsProvider, CryptoPair,
    FeedConnector, FeedError, LatestPricesProvider, NewsArticle, NewsProvider, OptionChain,
    OptionChainFilters, OptionChainProvider, PriceMap, Timeframe,
};

type Script<T> = Mutex<VecDeque<Result<T, FeedError>>>;

fn pop<T>(name: &str, script: &Script<T>) -> Result<T, FeedError> {
    script
        .lock()
        .expect("mock script mutex poisoned")
        .pop_front()
        .unwrap_or_else(|| Err(FeedError::provider(name, "mock script exhausted")))
}

/// A connector whose every response is scripted.
pub struct MockConnector {
    name: &'static str,
    delay: Option<Duration>,
    advertised: Mutex<HashSet<Capability>>,
    bars: Script<BarsResponse>,
    prices: Script<PriceMap>,
    chains: Script<OptionChain>,
    crypto: Script<Vec<Bar>>,
    news: Script<Vec<NewsArticle>>,
    probes: Script<()>,
    calls: Mutex<HashMap<Capability, u64>>,
}

impl MockConnector {
    /// A mock with nothing scripted; it advertises no capabilities.
    #[must_use]
    pub fn new(name: &'static str) -> Self {
        Self {
            name,
            delay: None,
            advertised: Mutex::new(HashSet::new()),
            bars: Mutex::new(VecDeque::new()),
            prices: Mutex::new(VecDeque::new()),
            chains: Mutex::new(VecDeque::new()),
            crypto: Mutex::new(VecDeque::new()),
            news: Mutex::new(VecDeque::new()),
            probes: Mutex::new(VecDeque::new()),
            calls: Mutex::new(HashMap::new()),
        }
    }

    /// Sleep this long inside every call, for timeout tests.
    #[must_use]
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    /// Queue a historical-bars outcome.
    #[must_use]
    pub fn with_bars(self, outcome: Result<BarsResponse, FeedError>) -> Self {
        self.advertise(Capability::Bars);
        self.bars.lock().expect("mock script mutex poisoned").push_back(outcome);
        self
    }

    /// Queue a latest-prices outcome.
    #[must_use]
    pub fn with_latest_prices(self, outcome: Result<PriceMap, FeedError>) -> Self {
        self.advertise(Capability::LatestPrices);
        self.prices.lock().expect("mock script mutex poisoned").push_back(outcome);
        self
    }

    /// Queue an option-chain outcome.
    #[must_use]
    pub fn with_option_chain(self, outcome: Result<OptionChain, FeedError>) -> Self {
        self.advertise(Capability::OptionChain);
        self.chains.lock().expect("mock script mutex poisoned").push_back(outcome);
        self
    }

    /// Queue a crypto-bars outcome.
    #[must_use]
    pub fn with_crypto_bars(self, outcome: Result<Vec<Bar>, FeedError>) -> Self {
        self.advertise(Capability::CryptoBars);
        self.crypto.lock().expect("mock script mutex poisoned").push_back(outcome);
        self
    }

    /// Queue a news outcome.
    #[must_use]
    pub fn with_news(self, outcome: Result<Vec<NewsArticle>, FeedError>) -> Self {
        self.advertise(Capability::News);
        self.news.lock().expect("mock script mutex poisoned").push_back(outcome);
        self
    }

    /// Queue a health-probe outcome. Unscripted probes succeed.
    #[must_use]
    pub fn with_probe(self, outcome: Result<(), FeedError>) -> Self {
        self.probes.lock().expect("mock script mutex poisoned").push_back(outcome);
        self
    }

    /// How many times a capability was invoked.
    #[must_use]
    pub fn calls(&self, cap: Capability) -> u64 {
        *self
            .calls
            .lock()
            .expect("mock call counter mutex poisoned")
            .get(&cap)
            .unwrap_or(&0)
    }

    fn advertise(&self, cap: Capability) {
        self.advertised
            .lock()
            .expect("mock capability mutex poisoned")
            .insert(cap);
    }

    /// Whether anything was ever scripted for `cap`. Advertisement is sticky
    /// so an exhausted script still counts as a supported capability.
    fn scripted(&self, cap: Capability) -> bool {
        self.advertised
            .lock()
            .expect("mock capability mutex poisoned")
            .contains(&cap)
    }

    async fn enter(&self, cap: Capability) {
        *self
            .calls
            .lock()
            .expect("mock call counter mutex poisoned")
            .entry(cap)
            .or_insert(0) += 1;
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
    }
}

#[async_trait]
impl BarsProvider for MockConnector {
    async fn historical_bars(&self, _req: &BarsRequest) -> Result<BarsResponse, FeedError> {
        self.enter(Capability::Bars).await;
        pop(self.name, &self.bars)
    }
}

#[async_trait]
impl LatestPricesProvider for MockConnector {
    async fn latest_prices(&self, _symbols: &[String]) -> Result<PriceMap, FeedError> {
        self.enter(Capability::LatestPrices).await;
        pop(self.name, &self.prices)
    }
}

#[async_trait]
impl OptionChainProvider for MockConnector {
    async fn option_chain(
        &self,
        _underlying: &str,
        _filters: &OptionChainFilters,
    ) -> Result<OptionChain, FeedError> {
        self.enter(Capability::OptionChain).await;
        pop(self.name, &self.chains)
    }
}

#[async_trait]
impl CryptoBarsProvider for MockConnector {
    async fn crypto_bars(
        &self,
        _pair: &CryptoPair,
        _start: DateTime<Utc>,
        _end: DateTime<Utc>,
        _timeframe: Timeframe,
    ) -> Result<Vec<Bar>, FeedError> {
        self.enter(Capability::CryptoBars).await;
        pop(self.name, &self.crypto)
    }
}

#[async_trait]
impl NewsProvider for MockConnector {
    async fn news(
        &self,
        _symbol: Option<&str>,
        _limit: usize,
    ) -> Result<Vec<NewsArticle>, FeedError> {
        self.enter(Capability::News).await;
        pop(self.name, &self.news)
    }
}

#[async_trait]
impl FeedConnector for MockConnector {
    fn name(&self) -> &'static str {
        self.name
    }

    fn vendor(&self) -> &'static str {
        "mock"
    }

    fn as_bars_provider(&self) -> Option<&dyn BarsProvider> {
        self.scripted(Capability::Bars).then_some(self as _)
    }

    fn as_latest_prices_provider(&self) -> Option<&dyn LatestPricesProvider> {
        self.scripted(Capability::LatestPrices).then_some(self as _)
    }

    fn as_option_chain_provider(&self) -> Option<&dyn OptionChainProvider> {
        self.scripted(Capability::OptionChain).then_some(self as _)
    }

    fn as_crypto_bars_provider(&self) -> Option<&dyn CryptoBarsProvider> {
        self.scripted(Capability::CryptoBars).then_some(self as _)
    }

    fn as_news_provider(&self) -> Option<&dyn NewsProvider> {
        self.scripted(Capability::News).then_some(self as _)
    }

    async fn health_probe(&self) -> Result<(), FeedError> {
        if self.probes.lock().expect("mock script mutex poisoned").is_empty() {
            return Ok(());
        }
        pop(self.name, &self.probes)
    }
}
