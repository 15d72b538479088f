//! Wire-level behavior of the Yahoo connector against a mock server.

use std::str::FromStr;
use std::time::Duration;

use chrono::{TimeZone, Utc};
use httpmock::prelude::*;
use rust_decimal::Decimal;

use quantfeed_core::{BarsProvider, BarsRequest, LatestPricesProvider, RetryConfig, Timeframe};
use quantfeed_yahoo::YahooConnector;

fn connector(server: &MockServer) -> YahooConnector {
    let retry = RetryConfig {
        max_attempts: 2,
        base_backoff: Duration::from_millis(5),
        max_backoff: Duration::from_millis(20),
        request_timeout: Duration::from_secs(2),
    };
    YahooConnector::with_base_url(server.base_url(), retry).unwrap()
}

fn dec(s: &str) -> Decimal {
    Decimal::from_str(s).unwrap()
}

#[tokio::test]
async fn bars_zip_parallel_arrays_and_skip_holes() {
    let server = MockServer::start_async().await;
    let mock = server
        .mock_async(|when, then| {
            when.method(GET)
                .path("/v8/finance/chart/AAPL")
                .query_param("interval", "1d");
            then.status(200).json_body(serde_json::json!({
                "chart": { "result": [{
                    "meta": { "regularMarketPrice": 185.64 },
                    "timestamp": [1704171600, 1704258000, 1704344400],
                    "indicators": { "quote": [{
                        "open":   [187.15, null, 184.35],
                        "high":   [188.44, 185.88, 185.10],
                        "low":    [183.89, 183.43, 183.92],
                        "close":  [185.64, 184.25, 184.82],
                        "volume": [82488700, 58414500, 62303300]
                    }]}
                }], "error": null }
            }));
        })
        .await;

    let req = BarsRequest::new(
        ["AAPL"],
        Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap(),
        Utc.with_ymd_and_hms(2024, 1, 5, 0, 0, 0).unwrap(),
        Timeframe::OneDay,
    )
    .unwrap();
    let resp = connector(&server).historical_bars(&req).await.unwrap();

    // The null open at index 1 drops the whole bar.
    let bars = &resp.bars["AAPL"];
    assert_eq!(bars.len(), 2);
    assert_eq!(bars[0].timestamp, Utc.timestamp_opt(1_704_171_600, 0).unwrap());
    assert_eq!(bars[0].close, dec("185.64"));
    assert_eq!(bars[1].close, dec("184.82"));
    mock.assert_async().await;
}

#[tokio::test]
async fn unknown_ticker_yields_an_empty_series() {
    let server = MockServer::start_async().await;
    server
        .mock_async(|when, then| {
            when.method(GET).path("/v8/finance/chart/ZZZQ");
            then.status(404);
        })
        .await;

    let req = BarsRequest::new(
        ["ZZZQ"],
        Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap(),
        Utc.with_ymd_and_hms(2024, 1, 5, 0, 0, 0).unwrap(),
        Timeframe::OneDay,
    )
    .unwrap();
    let resp = connector(&server).historical_bars(&req).await.unwrap();
    assert_eq!(resp.bars["ZZZQ"], Vec::new());
}

#[tokio::test]
async fn latest_price_prefers_the_live_print() {
    let server = MockServer::start_async().await;
    server
        .mock_async(|when, then| {
            when.method(GET)
                .path("/v8/finance/chart/AAPL")
                .query_param("range", "1d");
            then.status(200).json_body(serde_json::json!({
                "chart": { "result": [{
                    "meta": { "regularMarketPrice": 190.21, "chartPreviousClose": 189.00 },
                    "indicators": { "quote": [] }
                }], "error": null }
            }));
        })
        .await;

    let prices = connector(&server)
        .latest_prices(&["AAPL".to_string()])
        .await
        .unwrap();
    assert_eq!(prices.get("AAPL"), Some(&dec("190.21")));
}

#[tokio::test]
async fn latest_price_falls_back_to_previous_close() {
    let server = MockServer::start_async().await;
    server
        .mock_async(|when, then| {
            when.method(GET).path("/v8/finance/chart/BRK-B");
            then.status(200).json_body(serde_json::json!({
                "chart": { "result": [{
                    "meta": { "chartPreviousClose": 414.50 },
                    "indicators": { "quote": [] }
                }], "error": null }
            }));
        })
        .await;

    let prices = connector(&server)
        .latest_prices(&["BRK-B".to_string()])
        .await
        .unwrap();
    assert_eq!(prices.get("BRK-B"), Some(&dec("414.5")));
}
