//! Per-provider availability tracking.
//!
//! A provider that keeps failing is put on cooldown so the router stops
//! burning its budget (and the caller's latency) on it. Only infrastructure
//! failures trip the cooldown; a `NotFound` or bad argument says nothing
//! about provider health.

use std::collections::HashMap;
use std::sync::Mutex;
use std::time::{Duration, Instant};

use quantfeed_core::{ConnectorKey, FeedError};

/// Availability snapshot for one provider, as reported by
/// [`DataManager::health_check`](crate::DataManager::health_check).
#[derive(Debug, Clone)]
pub struct ProviderHealth {
    /// The provider's connector key.
    pub key: ConnectorKey,
    /// Vendor string from the connector.
    pub vendor: &'static str,
    /// Whether the live probe succeeded.
    pub healthy: bool,
    /// Whether the router currently considers the provider available
    /// (i.e. not on cooldown).
    pub available: bool,
    /// When the provider last answered a routed call successfully.
    pub last_success_at: Option<Instant>,
    /// The probe error, when unhealthy.
    pub error: Option<FeedError>,
}

#[derive(Debug, Default)]
struct ProviderState {
    cooldown_until: Option<Instant>,
    last_error: Option<String>,
    last_success_at: Option<Instant>,
}

/// Tracks cooldown state per provider. Shared by the router and the health
/// endpoint; only the router mutates it.
#[derive(Debug)]
pub(crate) struct HealthRegistry {
    cooldown: Duration,
    states: Mutex<HashMap<&'static str, ProviderState>>,
}

impl HealthRegistry {
    pub(crate) fn new(cooldown: Duration) -> Self {
        Self {
            cooldown,
            states: Mutex::new(HashMap::new()),
        }
    }

    /// Whether the provider may be attempted right now.
    pub(crate) fn available(&self, name: &'static str) -> bool {
        let states = self.states.lock().expect("health mutex poisoned");
        match states.get(name).and_then(|s| s.cooldown_until) {
            Some(until) => Instant::now() >= until,
            None => true,
        }
    }

    /// Record a successful call; lifts any cooldown.
    pub(crate) fn record_success(&self, name: &'static str) {
        let mut states = self.states.lock().expect("health mutex poisoned");
        let state = states.entry(name).or_default();
        state.cooldown_until = None;
        state.last_error = None;
        state.last_success_at = Some(Instant::now());
    }

    /// Record a failed call. Infrastructure failures start a cooldown;
    /// a rate-limit failure uses the provider's own retry hint when it is
    /// longer than the configured cooldown.
    pub(crate) fn record_failure(&self, name: &'static str, error: &FeedError) {
        let cooldown = match error {
            FeedError::UpstreamUnavailable { .. } | FeedError::ProviderTimeout { .. } => {
                Some(self.cooldown)
            }
            FeedError::RateLimited { retry_after_ms, .. } => {
                Some(self.cooldown.max(Duration::from_millis(*retry_after_ms)))
            }
            _ => None,
        };
        let mut states = self.states.lock().expect("health mutex poisoned");
        let state = states.entry(name).or_default();
        state.last_error = Some(error.to_string());
        if let Some(cooldown) = cooldown {
            tracing::warn!(
                provider = name,
                cooldown_ms = cooldown.as_millis() as u64,
                error = %error,
                "provider on cooldown"
            );
            state.cooldown_until = Some(Instant::now() + cooldown);
        }
    }

    /// Most recent error recorded for the provider, if any.
    pub(crate) fn last_error(&self, name: &'static str) -> Option<String> {
        let states = self.states.lock().expect("health mutex poisoned");
        states.get(name).and_then(|s| s.last_error.clone())
    }

    /// When the provider last answered successfully, if ever.
    pub(crate) fn last_success_at(&self, name: &'static str) -> Option<Instant> {
        let states = self.states.lock().expect("health mutex poisoned");
        states.get(name).and_then(|s| s.last_success_at)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unknown_provider_is_available() {
        let reg = HealthRegistry::new(Duration::from_secs(30));
        assert!(reg.available("p1"));
    }

    #[test]
    fn infrastructure_failure_starts_a_cooldown() {
        let reg = HealthRegistry::new(Duration::from_secs(30));
        reg.record_failure(
            "p1",
            &FeedError::UpstreamUnavailable {
                provider: "p1".to_string(),
                attempts: 3,
                last_status: Some(503),
            },
        );
        assert!(!reg.available("p1"));
        assert!(reg.last_error("p1").is_some());
    }

    #[test]
    fn not_found_does_not_trip_the_cooldown() {
        let reg = HealthRegistry::new(Duration::from_secs(30));
        reg.record_failure("p1", &FeedError::not_found("chart for ZZZQ"));
        assert!(reg.available("p1"));
    }

    #[test]
    fn success_timestamps_the_provider() {
        let reg = HealthRegistry::new(Duration::from_secs(30));
        assert!(reg.last_success_at("p1").is_none());
        reg.record_success("p1");
        assert!(reg.last_success_at("p1").is_some());
    }

    #[test]
    fn success_lifts_the_cooldown() {
        let reg = HealthRegistry::new(Duration::from_secs(30));
        reg.record_failure(
            "p1",
            &FeedError::provider_timeout("p1", "bars"),
        );
        assert!(!reg.available("p1"));
        reg.record_success("p1");
        assert!(reg.available("p1"));
        assert!(reg.last_error("p1").is_none());
    }

    #[test]
    fn cooldown_expires_on_its_own() {
        let reg = HealthRegistry::new(Duration::from_millis(10));
        reg.record_failure("p1", &FeedError::provider_timeout("p1", "bars"));
        assert!(!reg.available("p1"));
        std::thread::sleep(Duration::from_millis(20));
        assert!(reg.available("p1"));
    }

    #[test]
    fn rate_limit_hint_extends_the_cooldown() {
        let reg = HealthRegistry::new(Duration::from_millis(1));
        reg.record_failure(
            "p1",
            &FeedError::RateLimited {
                provider: "p1".to_string(),
                retry_after_ms: 60_000,
            },
        );
        assert!(!reg.available("p1"));
    }
}
