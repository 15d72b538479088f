use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Unified error type for the quantfeed workspace.
///
/// Covers capability mismatches, argument validation, provider-tagged
/// failures, rate limiting, retry exhaustion, deadlines, and an aggregate
/// for multi-provider attempts.
#[derive(Debug, Error, Serialize, Deserialize, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum FeedError {
    /// The requested capability is not implemented by the target connector.
    #[error("unsupported capability: {capability}")]
    Unsupported {
        /// Capability label describing what was requested (e.g. "option-chain").
        capability: String,
    },

    /// Invalid input argument.
    #[error("invalid argument: {0}")]
    InvalidArg(String),

    /// Issues with a returned payload (missing fields, unparseable values).
    #[error("data issue: {0}")]
    Data(String),

    /// A resource or symbol could not be found.
    #[error("not found: {what}")]
    NotFound {
        /// Description of the missing resource, e.g. "bars for AAPL".
        what: String,
    },

    /// A provider returned an error that is not worth retrying.
    #[error("{provider} failed: {msg}")]
    Provider {
        /// Provider name that failed.
        provider: String,
        /// Human-readable error message.
        msg: String,
    },

    /// Non-blocking admission was refused because the rate window is full.
    #[error("{provider} rate limited: retry in {retry_after_ms}ms")]
    RateLimited {
        /// Provider whose window is exhausted.
        provider: String,
        /// Milliseconds until the oldest call ages out of the window.
        retry_after_ms: u64,
    },

    /// All retry attempts against one provider were exhausted.
    #[error("{provider} unavailable after {attempts} attempts")]
    UpstreamUnavailable {
        /// Provider that kept failing.
        provider: String,
        /// Number of attempts made before giving up.
        attempts: u32,
        /// HTTP status of the last attempt, if one was received.
        last_status: Option<u16>,
    },

    /// An individual provider call exceeded the configured timeout.
    #[error("provider timed out: {capability} via {provider}")]
    ProviderTimeout {
        /// Provider that timed out.
        provider: String,
        /// Capability label (e.g. "bars", "latest-prices").
        capability: String,
    },

    /// The caller-imposed deadline elapsed before a result was produced.
    #[error("deadline exceeded: {capability}")]
    DeadlineExceeded {
        /// Capability label for which the deadline was hit.
        capability: String,
    },

    /// All selected providers failed; contains the individual failures.
    #[error("all providers failed: {0:?}")]
    AllProvidersFailed(Vec<FeedError>),
}

impl FeedError {
    /// Helper: build an `Unsupported` error for a capability label.
    #[must_use]
    pub fn unsupported(capability: impl Into<String>) -> Self {
        Self::Unsupported {
            capability: capability.into(),
        }
    }

    /// Helper: build a `Provider` error with the provider name and message.
    pub fn provider(provider: impl Into<String>, msg: impl Into<String>) -> Self {
        Self::Provider {
            provider: provider.into(),
            msg: msg.into(),
        }
    }

    /// Helper: build a `NotFound` error for a missing resource description.
    pub fn not_found(what: impl Into<String>) -> Self {
        Self::NotFound { what: what.into() }
    }

    /// Helper: build a `ProviderTimeout` error.
    pub fn provider_timeout(provider: impl Into<String>, capability: impl Into<String>) -> Self {
        Self::ProviderTimeout {
            provider: provider.into(),
            capability: capability.into(),
        }
    }

    /// Helper: build a `DeadlineExceeded` error.
    #[must_use]
    pub fn deadline_exceeded(capability: impl Into<String>) -> Self {
        Self::DeadlineExceeded {
            capability: capability.into(),
        }
    }

    /// Flatten nested `AllProvidersFailed` structures into a plain vector.
    ///
    /// Other error variants are preserved as-is; aggregates unwrap recursively.
    #[must_use]
    pub fn flatten(self) -> Vec<Self> {
        match self {
            Self::AllProvidersFailed(list) => list.into_iter().flat_map(Self::flatten).collect(),
            other => vec![other],
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn flatten_unwraps_nested_aggregates() {
        let e = FeedError::AllProvidersFailed(vec![
            FeedError::provider("polygon", "boom"),
            FeedError::AllProvidersFailed(vec![FeedError::not_found("bars for MSFT")]),
        ]);
        let flat = e.flatten();
        assert_eq!(flat.len(), 2);
        assert!(matches!(flat[1], FeedError::NotFound { .. }));
    }

    #[test]
    fn display_carries_provider_detail() {
        let e = FeedError::UpstreamUnavailable {
            provider: "alpaca".into(),
            attempts: 3,
            last_status: Some(503),
        };
        assert_eq!(e.to_string(), "alpaca unavailable after 3 attempts");
    }
}
