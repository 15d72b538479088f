//! Core data types, errors, configuration, and connector traits shared across
//! the quantfeed workspace.
#![warn(missing_docs)]

mod capability;
mod config;
mod connector;
mod error;
mod key;
mod types;

pub use capability::Capability;
pub use config::{CacheConfig, ManagerConfig, RateLimitConfig, RetryConfig, RoutingConfig};
pub use connector::{
    BarsProvider, ConnectorKey, CryptoBarsProvider, FeedConnector, LatestPricesProvider,
    NewsProvider, OptionChainProvider,
};
pub use error::FeedError;
pub use key::CacheKey;
pub use types::{
    Bar, BarsRequest, BarsResponse, CryptoPair, NewsArticle, OptionChain, OptionChainFilters,
    OptionContract, OptionRight, PriceMap, Timeframe, normalize_symbols,
};
