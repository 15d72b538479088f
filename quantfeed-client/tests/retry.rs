//! Retry and classification behavior of `RetryingClient` against a live mock
//! HTTP server.

use std::sync::Arc;
use std::time::{Duration, Instant};

use httpmock::prelude::*;
use quantfeed_client::{RateLimiter, RetryingClient};
use quantfeed_core::{FeedError, RateLimitConfig, RetryConfig};
use serde::Deserialize;

#[derive(Debug, Deserialize, PartialEq, Eq)]
struct Payload {
    value: u64,
}

fn fast_retry() -> RetryConfig {
    RetryConfig {
        max_attempts: 3,
        base_backoff: Duration::from_millis(5),
        max_backoff: Duration::from_millis(20),
        request_timeout: Duration::from_secs(2),
    }
}

fn roomy_limiter() -> Arc<RateLimiter> {
    Arc::new(RateLimiter::new(
        "test",
        RateLimitConfig {
            limit: 100,
            window: Duration::from_secs(60),
        },
    ))
}

fn client(limiter: Arc<RateLimiter>) -> RetryingClient {
    RetryingClient::new("test", limiter, fast_retry()).unwrap()
}

#[tokio::test]
async fn success_returns_parsed_body() {
    let server = MockServer::start_async().await;
    let mock = server
        .mock_async(|when, then| {
            when.method(GET).path("/v1/data").query_param("sym", "AAPL");
            then.status(200)
                .json_body(serde_json::json!({ "value": 7 }));
        })
        .await;

    let got: Payload = client(roomy_limiter())
        .get_json(&server.url("/v1/data"), &[("sym", "AAPL".to_string())])
        .await
        .unwrap();
    assert_eq!(got, Payload { value: 7 });
    mock.assert_async().await;
}

#[tokio::test]
async fn client_error_fails_without_retry() {
    let server = MockServer::start_async().await;
    let mock = server
        .mock_async(|when, then| {
            when.method(GET).path("/v1/data");
            then.status(400).body("bad request");
        })
        .await;

    let err = client(roomy_limiter())
        .get_json::<Payload>(&server.url("/v1/data"), &[])
        .await
        .unwrap_err();
    assert!(matches!(err, FeedError::Provider { .. }), "got {err:?}");
    assert_eq!(mock.hits_async().await, 1);
}

#[tokio::test]
async fn server_errors_exhaust_into_upstream_unavailable() {
    let server = MockServer::start_async().await;
    let mock = server
        .mock_async(|when, then| {
            when.method(GET).path("/v1/data");
            then.status(503);
        })
        .await;

    let err = client(roomy_limiter())
        .get_json::<Payload>(&server.url("/v1/data"), &[])
        .await
        .unwrap_err();
    match err {
        FeedError::UpstreamUnavailable {
            provider,
            attempts,
            last_status,
        } => {
            assert_eq!(provider, "test");
            assert_eq!(attempts, 3);
            assert_eq!(last_status, Some(503));
        }
        other => panic!("unexpected error: {other:?}"),
    }
    assert_eq!(mock.hits_async().await, 3);
}

#[tokio::test]
async fn missing_resource_maps_to_not_found() {
    let server = MockServer::start_async().await;
    let mock = server
        .mock_async(|when, then| {
            when.method(GET).path("/v1/data");
            then.status(404);
        })
        .await;

    let err = client(roomy_limiter())
        .get_json::<Payload>(&server.url("/v1/data"), &[])
        .await
        .unwrap_err();
    assert!(matches!(err, FeedError::NotFound { .. }), "got {err:?}");
    assert_eq!(mock.hits_async().await, 1);
}

#[tokio::test]
async fn upstream_429_retries_then_reports_unavailable() {
    let server = MockServer::start_async().await;
    let mock = server
        .mock_async(|when, then| {
            when.method(GET).path("/v1/data");
            then.status(429);
        })
        .await;

    // Short window so draining it between attempts stays fast.
    let limiter = Arc::new(RateLimiter::new(
        "test",
        RateLimitConfig {
            limit: 10,
            window: Duration::from_millis(30),
        },
    ));
    let err = client(limiter)
        .get_json::<Payload>(&server.url("/v1/data"), &[])
        .await
        .unwrap_err();
    assert!(
        matches!(
            err,
            FeedError::UpstreamUnavailable {
                last_status: Some(429),
                ..
            }
        ),
        "got {err:?}"
    );
    assert_eq!(mock.hits_async().await, 3);
}

#[tokio::test]
async fn full_window_fails_fast_instead_of_blocking() {
    let server = MockServer::start_async().await;
    let mock = server
        .mock_async(|when, then| {
            when.method(GET).path("/v1/data");
            then.status(200)
                .json_body(serde_json::json!({ "value": 1 }));
        })
        .await;

    let limiter = Arc::new(RateLimiter::new(
        "test",
        RateLimitConfig {
            limit: 1,
            window: Duration::from_secs(5),
        },
    ));
    let client = client(limiter.clone());

    let _: Payload = client.get_json(&server.url("/v1/data"), &[]).await.unwrap();
    // A second caller finds the window full and must get the refusal back
    // right away, leaving it free to try another provider.
    let started = Instant::now();
    let err = client
        .get_json::<Payload>(&server.url("/v1/data"), &[])
        .await
        .unwrap_err();
    assert!(
        matches!(err, FeedError::RateLimited { .. }),
        "got {err:?}"
    );
    assert!(started.elapsed() < Duration::from_millis(500));
    assert_eq!(mock.hits_async().await, 1);
}

#[tokio::test]
async fn exhaustion_is_reported_without_a_final_backoff_sleep() {
    let server = MockServer::start_async().await;
    server
        .mock_async(|when, then| {
            when.method(GET).path("/v1/data");
            then.status(503);
        })
        .await;

    let retry = RetryConfig {
        max_attempts: 3,
        base_backoff: Duration::from_millis(100),
        max_backoff: Duration::from_millis(400),
        request_timeout: Duration::from_secs(2),
    };
    let client = RetryingClient::new("test", roomy_limiter(), retry).unwrap();
    let started = Instant::now();
    let err = client
        .get_json::<Payload>(&server.url("/v1/data"), &[])
        .await
        .unwrap_err();
    assert!(matches!(err, FeedError::UpstreamUnavailable { .. }), "got {err:?}");
    // Only the two inter-attempt sleeps (100ms + 200ms) happen; the last
    // failure surfaces immediately.
    assert!(started.elapsed() < Duration::from_millis(450));
}
