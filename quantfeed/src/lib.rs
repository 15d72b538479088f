//! Quantfeed routes market data requests across multiple providers behind
//! one facade.
//!
//! Overview
//! - A `DataManager` owns the registered connectors, a durable TTL cache,
//!   and a router with per-capability provider ordering.
//! - Every operation is cache-aside: a deterministic key is derived from the
//!   request, a fresh record short-circuits the call, and the first provider
//!   success is cached under the capability's TTL.
//! - Failover is sequential and deterministic: preferred providers first,
//!   then registration order; providers on cooldown are skipped; the first
//!   success wins and a total failure aggregates every per-provider error.
//! - Rate limiting and retry live in the connectors, so the router never
//!   hammers a provider that is already throttling us.
//!
//! Examples
//! ```rust,ignore
//! use std::sync::Arc;
//! use quantfeed::{Capability, DataManager};
//! use quantfeed_alpaca::{AlpacaConnector, AlpacaCredentials};
//! use quantfeed_polygon::{PolygonConnector, Tier};
//! use quantfeed_yahoo::YahooConnector;
//!
//! let alpaca = Arc::new(AlpacaConnector::new(&AlpacaCredentials::new("id", "secret"))?);
//! let polygon = Arc::new(PolygonConnector::new("key", Tier::Starter)?);
//! let yahoo = Arc::new(YahooConnector::new()?);
//!
//! let manager = DataManager::builder()
//!     .with_connector(alpaca.clone())
//!     .with_connector(polygon.clone())
//!     .with_connector(yahoo)
//!     .prefer(Capability::OptionChain, &[polygon])
//!     .cache_dir(".cache/quantfeed")
//!     .build()?;
//!
//! let prices = manager.latest_prices(["AAPL", "MSFT"]).await?;
//! ```
#![warn(missing_docs)]

mod health;
mod manager;
mod router;

pub use health::ProviderHealth;
pub use manager::{DataManager, DataManagerBuilder, SourceInfo};

pub use quantfeed_cache::CacheStats;
pub use quantfeed_core::{
    Bar, BarsRequest, BarsResponse, CacheConfig, Capability, ConnectorKey, CryptoPair,
    FeedConnector, FeedError, ManagerConfig, NewsArticle, OptionChain, OptionChainFilters,
    OptionContract, OptionRight, PriceMap, RoutingConfig, Timeframe,
};
