//! Provider selection and sequential failover.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use quantfeed_core::{Capability, FeedConnector, FeedError, RoutingConfig};

use crate::health::HealthRegistry;

/// Routes one capability call across the registered connectors.
///
/// Candidate order is deterministic: connectors named in the capability's
/// preference list come first in list order, everything else follows in
/// registration order. Providers on cooldown are skipped without being
/// called. The first success wins; when every candidate fails the errors are
/// aggregated so the caller sees what happened at each hop.
pub(crate) struct SourceRouter {
    connectors: Vec<Arc<dyn FeedConnector>>,
    routing: RoutingConfig,
    health: HealthRegistry,
    provider_timeout: Duration,
}

impl SourceRouter {
    pub(crate) fn new(
        connectors: Vec<Arc<dyn FeedConnector>>,
        routing: RoutingConfig,
        cooldown: Duration,
        provider_timeout: Duration,
    ) -> Self {
        Self {
            connectors,
            routing,
            health: HealthRegistry::new(cooldown),
            provider_timeout,
        }
    }

    pub(crate) fn connectors(&self) -> &[Arc<dyn FeedConnector>] {
        &self.connectors
    }

    pub(crate) fn health(&self) -> &HealthRegistry {
        &self.health
    }

    /// Connectors in attempt order for one capability.
    pub(crate) fn ordered(&self, cap: Capability) -> Vec<Arc<dyn FeedConnector>> {
        let mut out: Vec<(usize, Arc<dyn FeedConnector>)> =
            self.connectors.iter().cloned().enumerate().collect();
        if let Some(pref) = self.routing.priority_for(cap) {
            let pos: HashMap<_, _> = pref
                .iter()
                .enumerate()
                .map(|(i, k)| (k.as_str(), i))
                .collect();
            out.sort_by_key(|(orig_i, c)| {
                (pos.get(c.name()).copied().unwrap_or(usize::MAX), *orig_i)
            });
        }
        out.into_iter().map(|(_, c)| c).collect()
    }

    async fn provider_call_with_timeout<T, Fut>(
        &self,
        connector_name: &'static str,
        capability: Capability,
        fut: Fut,
    ) -> Result<T, FeedError>
    where
        Fut: Future<Output = Result<T, FeedError>>,
    {
        (tokio::time::timeout(self.provider_timeout, fut).await)
            .unwrap_or_else(|_| Err(FeedError::provider_timeout(connector_name, capability.as_str())))
    }

    /// Sequential failover over the ordered, capable, available connectors.
    ///
    /// `call` returns `None` when the connector does not serve the
    /// capability; everything else is an attempt. Attempt errors are tagged
    /// with the failing connector and fed to the health registry so repeat
    /// offenders land on cooldown.
    pub(crate) async fn execute<T, F, Fut>(
        &self,
        cap: Capability,
        not_found_label: &str,
        call: F,
    ) -> Result<T, FeedError>
    where
        T: Send,
        F: Fn(Arc<dyn FeedConnector>) -> Option<Fut>,
        Fut: Future<Output = Result<T, FeedError>> + Send,
    {
        let mut attempted_any = false;
        let mut supported_any = false;
        let mut errors: Vec<FeedError> = Vec::new();

        for c in self.ordered(cap) {
            let Some(fut) = call(c.clone()) else {
                continue;
            };
            supported_any = true;
            if !self.health.available(c.name()) {
                tracing::debug!(provider = c.name(), capability = %cap, "skipping provider on cooldown");
                errors.push(FeedError::provider(
                    c.name(),
                    self.health
                        .last_error(c.name())
                        .unwrap_or_else(|| "on cooldown".to_string()),
                ));
                continue;
            }
            attempted_any = true;
            match self
                .provider_call_with_timeout(c.name(), cap, fut)
                .await
            {
                Ok(v) => {
                    self.health.record_success(c.name());
                    return Ok(v);
                }
                Err(e) => {
                    tracing::warn!(provider = c.name(), capability = %cap, error = %e, "provider attempt failed");
                    self.health.record_failure(c.name(), &e);
                    errors.push(tag_err(c.name(), e));
                }
            }
        }

        if !supported_any {
            return Err(FeedError::unsupported(cap.as_str()));
        }
        if attempted_any
            && errors
                .iter()
                .all(|e| matches!(e, FeedError::NotFound { .. }))
        {
            return Err(FeedError::not_found(not_found_label));
        }
        Err(FeedError::AllProvidersFailed(errors))
    }
}

/// Attach the connector name to errors that do not already carry one.
fn tag_err(connector: &'static str, e: FeedError) -> FeedError {
    match e {
        e @ (FeedError::NotFound { .. }
        | FeedError::Provider { .. }
        | FeedError::ProviderTimeout { .. }
        | FeedError::RateLimited { .. }
        | FeedError::UpstreamUnavailable { .. }
        | FeedError::AllProvidersFailed(_)) => e,
        other => FeedError::provider(connector, other.to_string()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use quantfeed_core::{ConnectorKey, LatestPricesProvider, PriceMap};
    use quantfeed_mock::MockConnector;
    use rust_decimal::Decimal;

    fn price_map(symbol: &str, price: i64) -> PriceMap {
        let mut map = PriceMap::new();
        map.insert(symbol.to_string(), Decimal::from(price));
        map
    }

    fn router(connectors: Vec<Arc<dyn FeedConnector>>, routing: RoutingConfig) -> SourceRouter {
        SourceRouter::new(
            connectors,
            routing,
            Duration::from_secs(30),
            Duration::from_secs(5),
        )
    }

    fn latest_prices_call(
        c: Arc<dyn FeedConnector>,
    ) -> Option<impl Future<Output = Result<PriceMap, FeedError>>> {
        c.as_latest_prices_provider()?;
        Some(async move {
            match c.as_latest_prices_provider() {
                Some(p) => p.latest_prices(&["AAPL".to_string()]).await,
                None => Err(FeedError::provider(c.name(), "capability lost mid-call")),
            }
        })
    }

    #[tokio::test]
    async fn preference_list_overrides_registration_order() {
        let first = Arc::new(MockConnector::new("first").with_latest_prices(Ok(price_map("AAPL", 1))));
        let second =
            Arc::new(MockConnector::new("second").with_latest_prices(Ok(price_map("AAPL", 2))));
        let routing = RoutingConfig::new().prefer(
            Capability::LatestPrices,
            &[ConnectorKey::new("second"), ConnectorKey::new("first")],
        );
        let r = router(vec![first.clone() as Arc<dyn FeedConnector>, second.clone()], routing);

        let prices = r
            .execute(Capability::LatestPrices, "prices", latest_prices_call)
            .await
            .unwrap();
        assert_eq!(prices["AAPL"], Decimal::from(2));
        assert_eq!(second.calls(Capability::LatestPrices), 1);
        assert_eq!(first.calls(Capability::LatestPrices), 0);
    }

    #[tokio::test]
    async fn failover_stops_at_the_first_success() {
        let bad = Arc::new(MockConnector::new("bad").with_latest_prices(Err(
            FeedError::UpstreamUnavailable {
                provider: "bad".to_string(),
                attempts: 3,
                last_status: Some(500),
            },
        )));
        let good =
            Arc::new(MockConnector::new("good").with_latest_prices(Ok(price_map("AAPL", 7))));
        let spare =
            Arc::new(MockConnector::new("spare").with_latest_prices(Ok(price_map("AAPL", 9))));
        let r = router(
            vec![bad.clone() as Arc<dyn FeedConnector>, good.clone(), spare.clone()],
            RoutingConfig::new(),
        );

        let prices = r
            .execute(Capability::LatestPrices, "prices", latest_prices_call)
            .await
            .unwrap();
        assert_eq!(prices["AAPL"], Decimal::from(7));
        assert_eq!(spare.calls(Capability::LatestPrices), 0);
    }

    #[tokio::test]
    async fn rate_limited_provider_fails_over_without_waiting() {
        let throttled = Arc::new(MockConnector::new("throttled").with_latest_prices(Err(
            FeedError::RateLimited {
                provider: "throttled".to_string(),
                retry_after_ms: 60_000,
            },
        )));
        let open =
            Arc::new(MockConnector::new("open").with_latest_prices(Ok(price_map("AAPL", 4))));
        let r = router(
            vec![throttled as Arc<dyn FeedConnector>, open],
            RoutingConfig::new(),
        );

        let started = std::time::Instant::now();
        let prices = r
            .execute(Capability::LatestPrices, "prices", latest_prices_call)
            .await
            .unwrap();
        assert_eq!(prices["AAPL"], Decimal::from(4));
        assert!(started.elapsed() < Duration::from_millis(100));
        // The refusal also puts the throttled provider on cooldown for its
        // own retry hint.
        assert!(!r.health().available("throttled"));
    }

    #[tokio::test]
    async fn all_failures_aggregate_every_error() {
        let err = || FeedError::UpstreamUnavailable {
            provider: "x".to_string(),
            attempts: 3,
            last_status: Some(503),
        };
        let a = Arc::new(MockConnector::new("a").with_latest_prices(Err(err())));
        let b = Arc::new(MockConnector::new("b").with_latest_prices(Err(err())));
        let r = router(vec![a as Arc<dyn FeedConnector>, b], RoutingConfig::new());

        let out = r
            .execute::<PriceMap, _, _>(Capability::LatestPrices, "prices", latest_prices_call)
            .await;
        match out {
            Err(FeedError::AllProvidersFailed(errors)) => assert_eq!(errors.len(), 2),
            other => panic!("unexpected: {other:?}"),
        }
    }

    #[tokio::test]
    async fn no_capable_provider_is_unsupported() {
        let bars_only = Arc::new(
            MockConnector::new("bars-only").with_bars(Ok(Default::default())),
        );
        let r = router(vec![bars_only as Arc<dyn FeedConnector>], RoutingConfig::new());
        let out = r
            .execute::<PriceMap, _, _>(Capability::LatestPrices, "prices", latest_prices_call)
            .await;
        assert!(matches!(out, Err(FeedError::Unsupported { .. })));
    }

    #[tokio::test]
    async fn provider_on_cooldown_is_not_called_again() {
        let flaky = Arc::new(
            MockConnector::new("flaky")
                .with_latest_prices(Err(FeedError::UpstreamUnavailable {
                    provider: "flaky".to_string(),
                    attempts: 3,
                    last_status: Some(500),
                }))
                .with_latest_prices(Ok(price_map("AAPL", 1))),
        );
        let backup = Arc::new(
            MockConnector::new("backup")
                .with_latest_prices(Ok(price_map("AAPL", 5)))
                .with_latest_prices(Ok(price_map("AAPL", 5))),
        );
        let r = router(vec![flaky.clone() as Arc<dyn FeedConnector>, backup.clone()], RoutingConfig::new());

        for _ in 0..2 {
            let prices = r
                .execute(Capability::LatestPrices, "prices", latest_prices_call)
                .await
                .unwrap();
            assert_eq!(prices["AAPL"], Decimal::from(5));
        }
        // First round trips the cooldown; second round skips flaky entirely.
        assert_eq!(flaky.calls(Capability::LatestPrices), 1);
        assert_eq!(backup.calls(Capability::LatestPrices), 2);
    }

    #[tokio::test]
    async fn slow_provider_times_out_and_fails_over() {
        let slow = Arc::new(
            MockConnector::new("slow")
                .with_delay(Duration::from_millis(200))
                .with_latest_prices(Ok(price_map("AAPL", 1))),
        );
        let fast = Arc::new(MockConnector::new("fast").with_latest_prices(Ok(price_map("AAPL", 3))));
        let r = SourceRouter::new(
            vec![slow as Arc<dyn FeedConnector>, fast],
            RoutingConfig::new(),
            Duration::from_secs(30),
            Duration::from_millis(20),
        );

        let prices = r
            .execute(Capability::LatestPrices, "prices", latest_prices_call)
            .await
            .unwrap();
        assert_eq!(prices["AAPL"], Decimal::from(3));
    }
}
