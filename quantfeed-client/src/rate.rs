//! Sliding-window rate limiter.
//!
//! Tracks the timestamps of recent calls and blocks (or refuses) a new call
//! while the window is full. One limiter instance is shared by every clone of
//! a provider's client, so concurrent tasks draw from the same budget.

use std::collections::VecDeque;
use std::sync::Mutex;
use std::time::{Duration, Instant};

use quantfeed_core::{FeedError, RateLimitConfig};

/// Shared sliding-window limiter for one upstream provider.
pub struct RateLimiter {
    provider: &'static str,
    limit: usize,
    window: Duration,
    calls: Mutex<VecDeque<Instant>>,
}

impl RateLimiter {
    /// Create a limiter for `provider` with the given budget.
    #[must_use]
    pub fn new(provider: &'static str, config: RateLimitConfig) -> Self {
        Self {
            provider,
            limit: config.limit as usize,
            window: config.window,
            calls: Mutex::new(VecDeque::new()),
        }
    }

    /// The provider this limiter accounts for.
    #[must_use]
    pub fn provider(&self) -> &'static str {
        self.provider
    }

    /// The window length.
    #[must_use]
    pub fn window(&self) -> Duration {
        self.window
    }

    /// Drop timestamps that have aged out, then report how long until a slot
    /// frees up. `None` means a slot is free right now.
    fn purge_and_wait(&self, now: Instant) -> Option<Duration> {
        let mut calls = self.calls.lock().expect("rate limiter mutex poisoned");
        while let Some(front) = calls.front() {
            if now.duration_since(*front) >= self.window {
                calls.pop_front();
            } else {
                break;
            }
        }
        if calls.len() < self.limit {
            calls.push_back(now);
            return None;
        }
        let oldest = *calls.front().expect("window full implies non-empty");
        Some(self.window.saturating_sub(now.duration_since(oldest)))
    }

    /// Wait until a slot is free, then consume it. Never fails; callers that
    /// must not block use [`try_admit`](Self::try_admit) instead.
    pub async fn admit(&self) {
        loop {
            let Some(wait) = self.purge_and_wait(Instant::now()) else {
                return;
            };
            tracing::debug!(
                provider = self.provider,
                wait_ms = wait.as_millis() as u64,
                "rate window full, waiting"
            );
            tokio::time::sleep(wait).await;
        }
    }

    /// Consume a slot if one is free, otherwise fail with the time until the
    /// oldest call ages out.
    pub fn try_admit(&self) -> Result<(), FeedError> {
        match self.purge_and_wait(Instant::now()) {
            None => Ok(()),
            Some(wait) => Err(FeedError::RateLimited {
                provider: self.provider.to_string(),
                retry_after_ms: wait.as_millis().try_into().unwrap_or(u64::MAX),
            }),
        }
    }

    /// Time until the oldest recorded call leaves the window. Used to decide
    /// how long to back off after an upstream 429. Zero when the window has
    /// room.
    #[must_use]
    pub fn window_remaining(&self) -> Duration {
        let now = Instant::now();
        let calls = self.calls.lock().expect("rate limiter mutex poisoned");
        calls
            .front()
            .map(|oldest| self.window.saturating_sub(now.duration_since(*oldest)))
            .unwrap_or(Duration::ZERO)
    }
}

impl std::fmt::Debug for RateLimiter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RateLimiter")
            .field("provider", &self.provider)
            .field("limit", &self.limit)
            .field("window", &self.window)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn limiter(limit: u32, window: Duration) -> RateLimiter {
        RateLimiter::new("test", RateLimitConfig { limit, window })
    }

    #[test]
    fn admits_up_to_limit_then_refuses() {
        let rl = limiter(3, Duration::from_secs(60));
        for _ in 0..3 {
            rl.try_admit().unwrap();
        }
        let err = rl.try_admit().unwrap_err();
        match err {
            FeedError::RateLimited {
                provider,
                retry_after_ms,
            } => {
                assert_eq!(provider, "test");
                assert!(retry_after_ms <= 60_000);
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn slots_free_up_after_the_window() {
        let rl = limiter(2, Duration::from_millis(20));
        rl.try_admit().unwrap();
        rl.try_admit().unwrap();
        assert!(rl.try_admit().is_err());
        std::thread::sleep(Duration::from_millis(30));
        rl.try_admit().unwrap();
    }

    #[tokio::test]
    async fn admit_blocks_until_a_slot_frees() {
        let rl = limiter(1, Duration::from_millis(50));
        rl.admit().await;
        let started = Instant::now();
        rl.admit().await;
        assert!(started.elapsed() >= Duration::from_millis(40));
    }

    proptest::proptest! {
        #[test]
        fn never_admits_more_than_limit_per_window(limit in 1u32..20, calls in 1usize..100) {
            let rl = limiter(limit, Duration::from_secs(3600));
            let admitted = (0..calls).filter(|_| rl.try_admit().is_ok()).count();
            proptest::prop_assert_eq!(admitted, calls.min(limit as usize));
        }
    }

    #[test]
    fn window_remaining_is_zero_when_empty() {
        let rl = limiter(5, Duration::from_secs(60));
        assert_eq!(rl.window_remaining(), Duration::ZERO);
        rl.try_admit().unwrap();
        assert!(rl.window_remaining() > Duration::ZERO);
    }
}
