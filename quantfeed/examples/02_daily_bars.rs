use std::sync::Arc;

use chrono::{Duration, Utc};
use quantfeed::{BarsRequest, DataManager, Timeframe};
use quantfeed_yahoo::YahooConnector;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    // 1. Yahoo needs no credentials, which makes it handy for a quick look.
    let manager = DataManager::builder()
        .with_connector(Arc::new(YahooConnector::new()?))
        .cache_dir(std::env::temp_dir().join("quantfeed-example"))
        .build()?;

    // 2. Last thirty days of daily bars for two tickers.
    let end = Utc::now();
    let start = end - Duration::days(30);
    let req = BarsRequest::new(["AAPL", "MSFT"], start, end, Timeframe::OneDay)?;

    let bars = manager.historical_bars(&req).await?;
    for (symbol, series) in &bars.bars {
        let last = series.last();
        println!("{symbol}: {} bars, last close {:?}", series.len(), last.map(|b| b.close));
    }

    // 3. A second identical call is served from the on-disk cache.
    let stats_before = manager.cache_stats();
    manager.historical_bars(&req).await?;
    let stats = manager.cache_stats();
    println!(
        "cache hits {} -> {}, misses {}",
        stats_before.hits, stats.hits, stats.misses
    );

    Ok(())
}
