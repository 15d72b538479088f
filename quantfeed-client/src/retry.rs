//! HTTP fetch with retry, backoff, and rate-limit awareness.

use std::sync::Arc;
use std::time::Duration;

use quantfeed_core::{FeedError, RetryConfig};
use reqwest::header::HeaderMap;
use serde::de::DeserializeOwned;

use crate::RateLimiter;

/// A JSON-over-HTTP client that checks the rate limiter before every
/// request and retries transient failures.
///
/// Admission: the first attempt never blocks. A full window fails fast with
/// [`FeedError::RateLimited`] so a caller with another provider available
/// can fail over instead of waiting out the window. Retry attempts (the
/// client is already mid-call at that point) wait for a slot.
///
/// Response classification:
/// - 2xx: deserialize the body and return it.
/// - 429: the upstream disagrees with our accounting; sleep until the local
///   rate window drains, then retry.
/// - 5xx and transport errors (including timeouts): exponential backoff,
///   then retry.
/// - 404: fail immediately with [`FeedError::NotFound`] so callers can treat
///   a missing resource differently from a broken provider.
/// - any other 4xx: fail immediately, retrying cannot help.
///
/// When every attempt fails the caller gets
/// [`FeedError::UpstreamUnavailable`] carrying the attempt count and the last
/// HTTP status seen.
#[derive(Debug, Clone)]
pub struct RetryingClient {
    provider: &'static str,
    http: reqwest::Client,
    limiter: Arc<RateLimiter>,
    retry: RetryConfig,
}

impl RetryingClient {
    /// Build a client for `provider` with no default headers.
    ///
    /// # Errors
    /// Returns [`FeedError::Provider`] if the underlying HTTP client cannot
    /// be constructed.
    pub fn new(
        provider: &'static str,
        limiter: Arc<RateLimiter>,
        retry: RetryConfig,
    ) -> Result<Self, FeedError> {
        Self::with_headers(provider, limiter, retry, HeaderMap::new())
    }

    /// Build a client that attaches `headers` to every request. Connectors
    /// use this for authentication headers.
    ///
    /// # Errors
    /// Returns [`FeedError::Provider`] if the underlying HTTP client cannot
    /// be constructed.
    pub fn with_headers(
        provider: &'static str,
        limiter: Arc<RateLimiter>,
        retry: RetryConfig,
        headers: HeaderMap,
    ) -> Result<Self, FeedError> {
        let http = reqwest::Client::builder()
            .timeout(retry.request_timeout)
            .default_headers(headers)
            .build()
            .map_err(|e| FeedError::provider(provider, format!("http client init: {e}")))?;
        Ok(Self {
            provider,
            http,
            limiter,
            retry,
        })
    }

    /// The provider this client talks to.
    #[must_use]
    pub fn provider(&self) -> &'static str {
        self.provider
    }

    fn backoff(&self, attempt: u32) -> Duration {
        let exp = self
            .retry
            .base_backoff
            .saturating_mul(2u32.saturating_pow(attempt));
        exp.min(self.retry.max_backoff)
    }

    /// GET `url` with `query` appended and deserialize the JSON response.
    ///
    /// # Errors
    /// - [`FeedError::RateLimited`] when the local window is full on entry.
    /// - [`FeedError::Provider`] on a non-retriable 4xx.
    /// - [`FeedError::Data`] when the body is not valid JSON for `T`.
    /// - [`FeedError::UpstreamUnavailable`] once every attempt has failed.
    pub async fn get_json<T: DeserializeOwned>(
        &self,
        url: &str,
        query: &[(&str, String)],
    ) -> Result<T, FeedError> {
        let mut last_status: Option<u16> = None;
        for attempt in 0..self.retry.max_attempts {
            if attempt == 0 {
                self.limiter.try_admit()?;
            } else {
                self.limiter.admit().await;
            }
            let retries_left = attempt + 1 < self.retry.max_attempts;
            match self.http.get(url).query(query).send().await {
                Ok(resp) => {
                    let status = resp.status();
                    if status.is_success() {
                        return resp.json::<T>().await.map_err(|e| {
                            FeedError::Data(format!("{}: malformed response: {e}", self.provider))
                        });
                    }
                    last_status = Some(status.as_u16());
                    if status.as_u16() == 429 {
                        if retries_left {
                            let wait =
                                self.limiter.window_remaining().max(self.retry.base_backoff);
                            tracing::warn!(
                                provider = self.provider,
                                wait_ms = wait.as_millis() as u64,
                                "upstream rate limit hit, draining window"
                            );
                            tokio::time::sleep(wait).await;
                        }
                    } else if status.is_server_error() {
                        if retries_left {
                            let wait = self.backoff(attempt);
                            tracing::warn!(
                                provider = self.provider,
                                status = status.as_u16(),
                                attempt,
                                wait_ms = wait.as_millis() as u64,
                                "server error, backing off"
                            );
                            tokio::time::sleep(wait).await;
                        }
                    } else if status.as_u16() == 404 {
                        return Err(FeedError::not_found(url));
                    } else {
                        let body = resp.text().await.unwrap_or_default();
                        return Err(FeedError::provider(
                            self.provider,
                            format!("http {status}: {body}"),
                        ));
                    }
                }
                Err(err) => {
                    last_status = err.status().map(|s| s.as_u16());
                    if retries_left {
                        let wait = self.backoff(attempt);
                        tracing::warn!(
                            provider = self.provider,
                            error = %err,
                            attempt,
                            wait_ms = wait.as_millis() as u64,
                            "transport error, backing off"
                        );
                        tokio::time::sleep(wait).await;
                    }
                }
            }
        }
        Err(FeedError::UpstreamUnavailable {
            provider: self.provider.to_string(),
            attempts: self.retry.max_attempts,
            last_status,
        })
    }
}
