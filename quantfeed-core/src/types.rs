//! Domain types shared by connectors, the router, and the manager.

use std::collections::BTreeMap;
use std::str::FromStr;

use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::FeedError;

/// Bar cadence supported across providers.
///
/// Connectors map each variant onto their own wire spelling with an
/// exhaustive match, so adding a variant is a breaking change.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Timeframe {
    /// One-minute bars.
    OneMinute,
    /// Five-minute bars.
    FiveMinutes,
    /// Fifteen-minute bars.
    FifteenMinutes,
    /// Hourly bars.
    OneHour,
    /// Daily bars.
    OneDay,
}

impl Timeframe {
    /// Canonical wire spelling, also used in cache keys.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::OneMinute => "1Min",
            Self::FiveMinutes => "5Min",
            Self::FifteenMinutes => "15Min",
            Self::OneHour => "1Hour",
            Self::OneDay => "1Day",
        }
    }
}

impl FromStr for Timeframe {
    type Err = FeedError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "1Min" => Ok(Self::OneMinute),
            "5Min" => Ok(Self::FiveMinutes),
            "15Min" => Ok(Self::FifteenMinutes),
            "1Hour" => Ok(Self::OneHour),
            "1Day" => Ok(Self::OneDay),
            other => Err(FeedError::InvalidArg(format!(
                "unknown timeframe: {other}"
            ))),
        }
    }
}

impl std::fmt::Display for Timeframe {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A single OHLCV bar.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Bar {
    /// Bar open timestamp (UTC).
    pub timestamp: DateTime<Utc>,
    /// Opening price.
    pub open: Decimal,
    /// High price.
    pub high: Decimal,
    /// Low price.
    pub low: Decimal,
    /// Closing price.
    pub close: Decimal,
    /// Traded volume. Fractional for crypto pairs.
    pub volume: Decimal,
}

/// Normalize a symbol list: trim, uppercase, sort, dedup.
///
/// Two requests for the same logical symbol set produce the same normalized
/// list regardless of argument order, which is what keeps cache keys stable.
pub fn normalize_symbols<I, S>(symbols: I) -> Vec<String>
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    let mut out: Vec<String> = symbols
        .into_iter()
        .map(|s| s.as_ref().trim().to_ascii_uppercase())
        .filter(|s| !s.is_empty())
        .collect();
    out.sort_unstable();
    out.dedup();
    out
}

/// Validated request for historical equity bars.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BarsRequest {
    symbols: Vec<String>,
    start: DateTime<Utc>,
    end: DateTime<Utc>,
    timeframe: Timeframe,
}

impl BarsRequest {
    /// Build a request, normalizing the symbol set and validating the range.
    ///
    /// # Errors
    /// Returns `InvalidArg` when the symbol set is empty after normalization
    /// or when `start >= end`.
    pub fn new<I, S>(
        symbols: I,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
        timeframe: Timeframe,
    ) -> Result<Self, FeedError>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let symbols = normalize_symbols(symbols);
        if symbols.is_empty() {
            return Err(FeedError::InvalidArg("no symbols given".to_string()));
        }
        if start >= end {
            return Err(FeedError::InvalidArg(format!(
                "start {start} is not before end {end}"
            )));
        }
        Ok(Self {
            symbols,
            start,
            end,
            timeframe,
        })
    }

    /// Normalized (sorted, deduped, upper-cased) symbol set.
    #[must_use]
    pub fn symbols(&self) -> &[String] {
        &self.symbols
    }

    /// Range start (inclusive).
    #[must_use]
    pub const fn start(&self) -> DateTime<Utc> {
        self.start
    }

    /// Range end (exclusive).
    #[must_use]
    pub const fn end(&self) -> DateTime<Utc> {
        self.end
    }

    /// Requested cadence.
    #[must_use]
    pub const fn timeframe(&self) -> Timeframe {
        self.timeframe
    }
}

/// Historical bars grouped per symbol.
///
/// A `BTreeMap` keeps serialization deterministic, which the cache relies on
/// for byte-identical replays of the same logical request.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct BarsResponse {
    /// Bars per symbol, ascending by timestamp.
    pub bars: BTreeMap<String, Vec<Bar>>,
}

impl BarsResponse {
    /// True when no symbol has any bars.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.bars.values().all(Vec::is_empty)
    }

    /// Total bar count across all symbols.
    #[must_use]
    pub fn len(&self) -> usize {
        self.bars.values().map(Vec::len).sum()
    }
}

/// Latest trade price per symbol.
pub type PriceMap = BTreeMap<String, Decimal>;

/// Option contract side.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum OptionRight {
    /// Call option.
    Call,
    /// Put option.
    Put,
}

impl OptionRight {
    /// Lowercase wire spelling ("call" / "put").
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Call => "call",
            Self::Put => "put",
        }
    }
}

impl FromStr for OptionRight {
    type Err = FeedError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "call" => Ok(Self::Call),
            "put" => Ok(Self::Put),
            other => Err(FeedError::Data(format!("unknown option right: {other}"))),
        }
    }
}

/// A single listed option contract.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OptionContract {
    /// Full contract ticker (e.g. "O:AAPL240315C00150000").
    pub ticker: String,
    /// Underlying symbol.
    pub underlying: String,
    /// Expiration date.
    pub expiration: NaiveDate,
    /// Strike price.
    pub strike: Decimal,
    /// Call or put.
    pub right: OptionRight,
    /// Shares per contract, usually 100.
    pub shares_per_contract: u32,
}

/// An option chain for one underlying.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct OptionChain {
    /// Underlying symbol the chain was requested for.
    pub underlying: String,
    /// Contracts, in the order the provider returned them.
    pub contracts: Vec<OptionContract>,
}

/// Server-side filters for an option chain request.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct OptionChainFilters {
    /// Restrict to a single expiration date.
    pub expiration: Option<NaiveDate>,
    /// Restrict to a single strike price.
    pub strike: Option<Decimal>,
    /// Restrict to calls or puts.
    pub right: Option<OptionRight>,
}

/// A crypto currency pair, e.g. BTC/USD.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct CryptoPair {
    base: String,
    quote: String,
}

impl CryptoPair {
    /// Build a pair, upper-casing both legs.
    ///
    /// # Errors
    /// Returns `InvalidArg` when either leg is empty.
    pub fn new(base: &str, quote: &str) -> Result<Self, FeedError> {
        let base = base.trim().to_ascii_uppercase();
        let quote = quote.trim().to_ascii_uppercase();
        if base.is_empty() || quote.is_empty() {
            return Err(FeedError::InvalidArg(
                "crypto pair legs must be non-empty".to_string(),
            ));
        }
        Ok(Self { base, quote })
    }

    /// Base currency (e.g. "BTC").
    #[must_use]
    pub fn base(&self) -> &str {
        &self.base
    }

    /// Quote currency (e.g. "USD").
    #[must_use]
    pub fn quote(&self) -> &str {
        &self.quote
    }

    /// Compact code without separator (e.g. "BTCUSD").
    #[must_use]
    pub fn code(&self) -> String {
        format!("{}{}", self.base, self.quote)
    }
}

/// A news article attached to zero or more tickers.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewsArticle {
    /// Provider-scoped article id.
    pub id: String,
    /// Headline.
    pub title: String,
    /// Publication timestamp (UTC).
    pub published_at: DateTime<Utc>,
    /// Canonical article URL.
    pub url: String,
    /// Tickers the article mentions.
    pub tickers: Vec<String>,
    /// Short description, when the provider supplies one.
    pub description: Option<String>,
}
