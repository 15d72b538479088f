use core::fmt;
use serde::{Deserialize, Serialize};

/// High-level capability labels for routing, caching, errors, and telemetry.
///
/// These map one-to-one with manager endpoints and allow consistent Display
/// formatting and match-exhaustive handling when adding new capabilities.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[non_exhaustive]
pub enum Capability {
    /// Historical OHLCV bars for one or more equity symbols.
    Bars,
    /// Most recent trade prices for a set of symbols.
    LatestPrices,
    /// Option chain (contract list) for an underlying.
    OptionChain,
    /// Historical OHLCV bars for a crypto currency pair.
    CryptoBars,
    /// Recent news articles, optionally filtered by symbol.
    News,
}

impl Capability {
    /// Stable, kebab-case identifier for logs, errors, and cache keys.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Bars => "bars",
            Self::LatestPrices => "latest-prices",
            Self::OptionChain => "option-chain",
            Self::CryptoBars => "crypto-bars",
            Self::News => "news",
        }
    }

    /// Every capability, in a fixed order. Useful for configuration loops.
    pub const ALL: [Self; 5] = [
        Self::Bars,
        Self::LatestPrices,
        Self::OptionChain,
        Self::CryptoBars,
        Self::News,
    ];
}

impl fmt::Display for Capability {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
