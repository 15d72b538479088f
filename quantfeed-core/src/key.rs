//! Deterministic cache keys.
//!
//! A key is derived from the capability plus order-normalized parameters, so
//! two calls describing the same logical request always collide on the same
//! key no matter how the caller spelled or ordered the arguments.

use chrono::{DateTime, SecondsFormat, Utc};

use crate::Capability;
use crate::types::{BarsRequest, CryptoPair, OptionChainFilters, Timeframe, normalize_symbols};

/// A deterministic cache key for one logical request.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CacheKey(String);

fn ts(t: DateTime<Utc>) -> String {
    t.to_rfc3339_opts(SecondsFormat::Secs, true)
}

impl CacheKey {
    /// Key for a historical-bars request. Symbols are already normalized by
    /// `BarsRequest::new`.
    #[must_use]
    pub fn bars(req: &BarsRequest) -> Self {
        Self(format!(
            "{}:{}:{}:{}:{}",
            Capability::Bars,
            req.symbols().join("-"),
            ts(req.start()),
            ts(req.end()),
            req.timeframe()
        ))
    }

    /// Key for a latest-prices request.
    #[must_use]
    pub fn latest_prices(symbols: &[String]) -> Self {
        Self(format!(
            "{}:{}",
            Capability::LatestPrices,
            normalize_symbols(symbols).join("-")
        ))
    }

    /// Key for an option-chain request, folding in every filter.
    #[must_use]
    pub fn option_chain(underlying: &str, filters: &OptionChainFilters) -> Self {
        let expiration = filters
            .expiration
            .map_or_else(|| "any".to_string(), |d| d.to_string());
        let strike = filters
            .strike
            .map_or_else(|| "any".to_string(), |s| s.normalize().to_string());
        let right = filters.right.map_or("any", |r| r.as_str());
        Self(format!(
            "{}:{}:{}:{}:{}",
            Capability::OptionChain,
            underlying.trim().to_ascii_uppercase(),
            expiration,
            strike,
            right
        ))
    }

    /// Key for a crypto-bars request.
    #[must_use]
    pub fn crypto_bars(
        pair: &CryptoPair,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
        timeframe: Timeframe,
    ) -> Self {
        Self(format!(
            "{}:{}:{}:{}:{}",
            Capability::CryptoBars,
            pair.code(),
            ts(start),
            ts(end),
            timeframe
        ))
    }

    /// Key for a news request.
    #[must_use]
    pub fn news(symbol: Option<&str>, limit: usize) -> Self {
        let sym = symbol.map_or_else(|| "all".to_string(), |s| s.trim().to_ascii_uppercase());
        Self(format!("{}:{}:{}", Capability::News, sym, limit))
    }

    /// The logical key string.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Filesystem-safe record name: bytes in `[A-Za-z0-9._-]` pass through,
    /// every other byte is written as `%XX`. A literal `%` is escaped too, so
    /// the encoding is injective and distinct keys never share a file.
    #[must_use]
    pub fn fs_name(&self) -> String {
        let mut out = String::with_capacity(self.0.len());
        for b in self.0.bytes() {
            if b.is_ascii_alphanumeric() || matches!(b, b'.' | b'_' | b'-') {
                out.push(b as char);
            } else {
                out.push_str(&format!("%{b:02X}"));
            }
        }
        out
    }
}

impl std::fmt::Display for CacheKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn bars_key_is_order_insensitive() {
        let start = Utc.with_ymd_and_hms(2024, 1, 2, 0, 0, 0).unwrap();
        let end = Utc.with_ymd_and_hms(2024, 2, 2, 0, 0, 0).unwrap();
        let a = BarsRequest::new(["MSFT", "AAPL"], start, end, Timeframe::OneDay).unwrap();
        let b = BarsRequest::new(["aapl", "msft", "AAPL"], start, end, Timeframe::OneDay).unwrap();
        assert_eq!(CacheKey::bars(&a), CacheKey::bars(&b));
    }

    #[test]
    fn latest_prices_key_normalizes_caller_order() {
        let a = CacheKey::latest_prices(&["tsla".to_string(), "AAPL".to_string()]);
        let b = CacheKey::latest_prices(&["AAPL".to_string(), "TSLA".to_string()]);
        assert_eq!(a, b);
    }

    #[test]
    fn fs_name_is_safe_and_distinct() {
        let start = Utc.with_ymd_and_hms(2024, 1, 2, 0, 0, 0).unwrap();
        let end = Utc.with_ymd_and_hms(2024, 2, 2, 0, 0, 0).unwrap();
        let req = BarsRequest::new(["AAPL"], start, end, Timeframe::OneDay).unwrap();
        let name = CacheKey::bars(&req).fs_name();
        assert!(
            name.chars()
                .all(|c| c.is_ascii_alphanumeric() || matches!(c, '.' | '_' | '-' | '%'))
        );
        assert!(name.starts_with("bars%3AAAPL%3A"));
    }

    #[test]
    fn fs_name_keeps_distinct_keys_distinct() {
        let a = CacheKey::latest_prices(&["AB:CD".to_string()]);
        let b = CacheKey::latest_prices(&["AB_CD".to_string()]);
        assert_ne!(a, b);
        assert_ne!(a.fs_name(), b.fs_name());
    }
}
