//! Behavior of the durable TTL cache: expiry, persistence, and corruption
//! handling.

use std::time::Duration;

use quantfeed_cache::DiskTtlCache;
use quantfeed_core::{CacheConfig, CacheKey};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
struct Snapshot {
    symbol: String,
    close: u64,
}

fn config(dir: &std::path::Path) -> CacheConfig {
    CacheConfig {
        dir: dir.to_path_buf(),
        ..CacheConfig::default()
    }
}

fn sample() -> Snapshot {
    Snapshot {
        symbol: "AAPL".to_string(),
        close: 190,
    }
}

fn key() -> CacheKey {
    CacheKey::latest_prices(&["AAPL".to_string()])
}

#[tokio::test]
async fn put_then_get_round_trips() {
    let dir = tempfile::tempdir().unwrap();
    let cache = DiskTtlCache::new(&config(dir.path())).unwrap();

    cache
        .put(&key(), &sample(), Duration::from_secs(60))
        .await
        .unwrap();
    let got: Snapshot = cache.get(&key()).await.unwrap();
    assert_eq!(got, sample());
}

#[tokio::test]
async fn expired_entry_is_a_miss() {
    let dir = tempfile::tempdir().unwrap();
    let cache = DiskTtlCache::new(&config(dir.path())).unwrap();

    cache
        .put(&key(), &sample(), Duration::from_millis(20))
        .await
        .unwrap();
    tokio::time::sleep(Duration::from_millis(40)).await;
    assert_eq!(cache.get::<Snapshot>(&key()).await, None);
    // The stale record is gone, not just skipped.
    assert!(!dir.path().join(format!("{}.json", key().fs_name())).exists());
}

#[tokio::test]
async fn entries_survive_a_new_instance() {
    let dir = tempfile::tempdir().unwrap();
    {
        let cache = DiskTtlCache::new(&config(dir.path())).unwrap();
        cache
            .put(&key(), &sample(), Duration::from_secs(60))
            .await
            .unwrap();
    }
    let reopened = DiskTtlCache::new(&config(dir.path())).unwrap();
    let got: Snapshot = reopened.get(&key()).await.unwrap();
    assert_eq!(got, sample());
    assert_eq!(reopened.stats().hits, 1);
}

#[tokio::test]
async fn corrupt_record_is_discarded() {
    let dir = tempfile::tempdir().unwrap();
    let cache = DiskTtlCache::new(&config(dir.path())).unwrap();

    let path = dir.path().join(format!("{}.json", key().fs_name()));
    std::fs::write(&path, b"not json at all").unwrap();

    assert_eq!(cache.get::<Snapshot>(&key()).await, None);
    assert!(!path.exists());
    assert_eq!(cache.stats().misses, 1);
}

#[tokio::test]
async fn zero_ttl_disables_caching() {
    let dir = tempfile::tempdir().unwrap();
    let cache = DiskTtlCache::new(&config(dir.path())).unwrap();

    cache.put(&key(), &sample(), Duration::ZERO).await.unwrap();
    assert_eq!(cache.get::<Snapshot>(&key()).await, None);
    assert!(!dir.path().join(format!("{}.json", key().fs_name())).exists());
}

#[tokio::test]
async fn stats_track_hits_and_misses() {
    let dir = tempfile::tempdir().unwrap();
    let cache = DiskTtlCache::new(&config(dir.path())).unwrap();

    assert_eq!(cache.get::<Snapshot>(&key()).await, None);
    cache
        .put(&key(), &sample(), Duration::from_secs(60))
        .await
        .unwrap();
    let _: Snapshot = cache.get(&key()).await.unwrap();
    let _: Snapshot = cache.get(&key()).await.unwrap();

    let stats = cache.stats();
    assert_eq!(stats.hits, 2);
    assert_eq!(stats.misses, 1);
    assert!((stats.hit_rate() - 2.0 / 3.0).abs() < 1e-9);
}

#[tokio::test]
async fn clear_removes_everything() {
    let dir = tempfile::tempdir().unwrap();
    let cache = DiskTtlCache::new(&config(dir.path())).unwrap();

    cache
        .put(&key(), &sample(), Duration::from_secs(60))
        .await
        .unwrap();
    cache.get::<Snapshot>(&key()).await;
    cache.clear().await.unwrap();
    let stats = cache.stats();
    assert_eq!((stats.hits, stats.misses), (0, 0));
    assert_eq!(cache.get::<Snapshot>(&key()).await, None);
    assert!(!dir.path().join(format!("{}.json", key().fs_name())).exists());
}
