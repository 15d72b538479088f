//! Configuration types shared across the manager, router, and connectors.

use std::collections::HashMap;
use std::path::PathBuf;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::Capability;
use crate::connector::ConnectorKey;

/// Per-provider rate limit over a trailing window.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct RateLimitConfig {
    /// Maximum admitted calls inside a single trailing window.
    pub limit: u32,
    /// Window length.
    pub window: Duration,
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        // Polygon free tier: 5 calls per rolling minute.
        Self {
            limit: 5,
            window: Duration::from_secs(60),
        }
    }
}

impl RateLimitConfig {
    /// Convenience constructor for a calls-per-minute limit.
    #[must_use]
    pub const fn per_minute(limit: u32) -> Self {
        Self {
            limit,
            window: Duration::from_secs(60),
        }
    }
}

/// Retry and backoff policy for one provider's transport.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct RetryConfig {
    /// Total attempts before giving up (first try included).
    pub max_attempts: u32,
    /// First backoff delay; doubles per retryable failure.
    pub base_backoff: Duration,
    /// Upper bound on any single backoff sleep.
    pub max_backoff: Duration,
    /// Timeout applied to each individual HTTP request.
    pub request_timeout: Duration,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            base_backoff: Duration::from_millis(500),
            max_backoff: Duration::from_secs(30),
            request_timeout: Duration::from_secs(10),
        }
    }
}

/// Cache tiering: storage directory plus per-capability TTLs.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CacheConfig {
    /// Directory holding one JSON record per cache key.
    pub dir: PathBuf,
    /// Capacity of the in-memory tier.
    pub max_entries: u64,
    /// TTL per capability. A zero TTL disables caching for that capability.
    pub ttl: HashMap<Capability, Duration>,
}

impl Default for CacheConfig {
    fn default() -> Self {
        let mut ttl = HashMap::new();
        ttl.insert(Capability::Bars, Duration::from_secs(24 * 60 * 60));
        ttl.insert(Capability::OptionChain, Duration::from_secs(5 * 60));
        ttl.insert(Capability::CryptoBars, Duration::from_secs(60 * 60));
        ttl.insert(Capability::News, Duration::from_secs(5 * 60));
        // Live quotes are never cached.
        ttl.insert(Capability::LatestPrices, Duration::ZERO);
        Self {
            dir: PathBuf::from(".cache"),
            max_entries: 1024,
            ttl,
        }
    }
}

impl CacheConfig {
    /// Effective TTL for a capability; `None` means caching is disabled.
    #[must_use]
    pub fn ttl_for(&self, cap: Capability) -> Option<Duration> {
        match self.ttl.get(&cap) {
            Some(d) if d.is_zero() => None,
            Some(d) => Some(*d),
            None => None,
        }
    }
}

/// Ordered provider preference per capability.
///
/// Providers absent from a capability's list remain eligible after the
/// listed ones, in registration order, so the overall ordering stays
/// deterministic.
#[derive(Debug, Clone, Default)]
pub struct RoutingConfig {
    priority: HashMap<Capability, Vec<ConnectorKey>>,
}

impl RoutingConfig {
    /// Empty routing table: registration order decides everywhere.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the preferred provider order for one capability.
    #[must_use]
    pub fn prefer(mut self, cap: Capability, keys: &[ConnectorKey]) -> Self {
        self.priority.insert(cap, keys.to_vec());
        self
    }

    /// Preference list for a capability, if configured.
    #[must_use]
    pub fn priority_for(&self, cap: Capability) -> Option<&[ConnectorKey]> {
        self.priority.get(&cap).map(Vec::as_slice)
    }

    /// Mutable access used by the manager builder to validate keys.
    pub fn priority_mut(&mut self) -> impl Iterator<Item = &mut Vec<ConnectorKey>> {
        self.priority.values_mut()
    }
}

/// Global configuration for the `DataManager`.
#[derive(Debug, Clone)]
pub struct ManagerConfig {
    /// Provider ordering per capability.
    pub routing: RoutingConfig,
    /// Cache directory and TTL tiers.
    pub cache: CacheConfig,
    /// Timeout for a single provider attempt (admission + call).
    pub provider_timeout: Duration,
    /// Optional overall deadline per manager call. `None` leaves calls
    /// bounded only by per-provider timeouts.
    pub request_timeout: Option<Duration>,
    /// How long a failing provider stays unavailable before it is probed
    /// again by the router.
    pub provider_cooldown: Duration,
}

impl Default for ManagerConfig {
    fn default() -> Self {
        Self {
            routing: RoutingConfig::default(),
            cache: CacheConfig::default(),
            provider_timeout: Duration::from_secs(30),
            request_timeout: None,
            provider_cooldown: Duration::from_secs(30),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn zero_ttl_disables_caching() {
        let cfg = CacheConfig::default();
        assert!(cfg.ttl_for(Capability::LatestPrices).is_none());
        assert!(cfg.ttl_for(Capability::Bars).is_some());
    }
}
