use std::sync::Arc;

use quantfeed::{DataManager, FeedConnector, FeedError};
use quantfeed_mock::MockConnector;
use rust_decimal::Decimal;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    // 1. Script two in-memory providers: a flaky primary and a healthy backup.
    let primary = Arc::new(
        MockConnector::new("primary")
            .with_latest_prices(Err(FeedError::provider("primary", "upstream down"))),
    ) as Arc<dyn FeedConnector>;
    let backup = Arc::new(MockConnector::new("backup").with_latest_prices(Ok([
        ("AAPL".to_string(), Decimal::new(19432, 2)),
        ("MSFT".to_string(), Decimal::new(41210, 2)),
    ]
    .into_iter()
    .collect())));

    // 2. Build the manager. The primary is tried first, the backup covers it.
    let manager = DataManager::builder()
        .with_connector(primary)
        .with_connector(backup)
        .cache_dir(std::env::temp_dir().join("quantfeed-example"))
        .build()?;

    // 3. Fetch. The primary's failure is absorbed by the failover.
    let prices = manager.latest_prices(["AAPL", "MSFT"]).await?;
    for (symbol, price) in &prices {
        println!("{symbol}: {price}");
    }

    Ok(())
}
