//! Durable TTL cache.
//!
//! Two tiers share one TTL policy: a bounded in-memory map for the hot path,
//! and one JSON record per key on disk so entries survive process restarts.
//! Expiry is lazy; a stale record is treated as a miss and removed when it is
//! next touched. Writes go through a temp file and an atomic rename, so a
//! crash mid-write leaves either the old record or none, never a torn one.
#![warn(missing_docs)]

use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

use quantfeed_core::{CacheConfig, CacheKey, FeedError};

/// Hit/miss counters for one cache instance.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct CacheStats {
    /// Lookups answered from cache.
    pub hits: u64,
    /// Lookups that fell through to the provider.
    pub misses: u64,
}

impl CacheStats {
    /// Fraction of lookups answered from cache. Zero when nothing has been
    /// looked up yet.
    #[must_use]
    pub fn hit_rate(&self) -> f64 {
        let total = self.hits + self.misses;
        if total == 0 {
            0.0
        } else {
            self.hits as f64 / total as f64
        }
    }
}

/// On-disk and in-memory record: payload plus the freshness envelope.
#[derive(Debug, Clone, Serialize, Deserialize)]
struct Record {
    payload: serde_json::Value,
    created_at_ms: u64,
    ttl_ms: u64,
}

impl Record {
    fn is_fresh(&self, now_ms: u64) -> bool {
        now_ms.saturating_sub(self.created_at_ms) <= self.ttl_ms
    }
}

fn now_ms() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis().try_into().unwrap_or(u64::MAX))
        .unwrap_or(0)
}

/// TTL cache with a moka front and a JSON file per key behind it.
pub struct DiskTtlCache {
    dir: PathBuf,
    mem: moka::future::Cache<String, Record>,
    hits: AtomicU64,
    misses: AtomicU64,
}

impl DiskTtlCache {
    /// Open (or create) a cache rooted at `config.dir`.
    ///
    /// # Errors
    /// Returns [`FeedError::Data`] when the directory cannot be created.
    pub fn new(config: &CacheConfig) -> Result<Self, FeedError> {
        std::fs::create_dir_all(&config.dir).map_err(|e| {
            FeedError::Data(format!(
                "cache dir {}: {e}",
                config.dir.display()
            ))
        })?;
        Ok(Self {
            dir: config.dir.clone(),
            mem: moka::future::Cache::new(config.max_entries),
            hits: AtomicU64::new(0),
            misses: AtomicU64::new(0),
        })
    }

    fn record_path(&self, key: &CacheKey) -> PathBuf {
        self.dir.join(format!("{}.json", key.fs_name()))
    }

    fn hit(&self) {
        self.hits.fetch_add(1, Ordering::Relaxed);
    }

    fn miss(&self) {
        self.misses.fetch_add(1, Ordering::Relaxed);
    }

    async fn remove_record(&self, key: &CacheKey, path: &Path) {
        self.mem.invalidate(key.as_str()).await;
        if let Err(e) = tokio::fs::remove_file(path).await
            && e.kind() != std::io::ErrorKind::NotFound
        {
            tracing::debug!(key = %key, error = %e, "failed to remove cache record");
        }
    }

    /// Look up `key`. Expired or unreadable records count as misses and are
    /// removed. A decode failure against `T` also counts as a miss.
    pub async fn get<T: DeserializeOwned>(&self, key: &CacheKey) -> Option<T> {
        let now = now_ms();
        let path = self.record_path(key);

        let record = match self.mem.get(key.as_str()).await {
            Some(rec) => Some(rec),
            None => match tokio::fs::read(&path).await {
                Ok(bytes) => match serde_json::from_slice::<Record>(&bytes) {
                    Ok(rec) => Some(rec),
                    Err(e) => {
                        tracing::warn!(key = %key, error = %e, "corrupt cache record, discarding");
                        self.remove_record(key, &path).await;
                        None
                    }
                },
                Err(_) => None,
            },
        };

        let Some(record) = record else {
            self.miss();
            return None;
        };
        if !record.is_fresh(now) {
            self.remove_record(key, &path).await;
            self.miss();
            return None;
        }

        match serde_json::from_value::<T>(record.payload.clone()) {
            Ok(value) => {
                self.mem.insert(key.as_str().to_string(), record).await;
                self.hit();
                Some(value)
            }
            Err(e) => {
                tracing::warn!(key = %key, error = %e, "cache record has wrong shape, discarding");
                self.remove_record(key, &path).await;
                self.miss();
                None
            }
        }
    }

    /// Store `value` under `key` for `ttl`. A zero TTL disables caching for
    /// the key, so the call is a no-op.
    ///
    /// # Errors
    /// Returns [`FeedError::Data`] when the value cannot be serialized or the
    /// record cannot be written.
    pub async fn put<T: Serialize>(
        &self,
        key: &CacheKey,
        value: &T,
        ttl: Duration,
    ) -> Result<(), FeedError> {
        if ttl.is_zero() {
            return Ok(());
        }
        let record = Record {
            payload: serde_json::to_value(value)
                .map_err(|e| FeedError::Data(format!("cache encode {key}: {e}")))?,
            created_at_ms: now_ms(),
            ttl_ms: ttl.as_millis().try_into().unwrap_or(u64::MAX),
        };
        let bytes = serde_json::to_vec(&record)
            .map_err(|e| FeedError::Data(format!("cache encode {key}: {e}")))?;

        let path = self.record_path(key);
        let tmp = path.with_extension("json.tmp");
        tokio::fs::write(&tmp, &bytes)
            .await
            .map_err(|e| FeedError::Data(format!("cache write {}: {e}", tmp.display())))?;
        tokio::fs::rename(&tmp, &path)
            .await
            .map_err(|e| FeedError::Data(format!("cache rename {}: {e}", path.display())))?;

        self.mem.insert(key.as_str().to_string(), record).await;
        Ok(())
    }

    /// Current hit/miss counters.
    #[must_use]
    pub fn stats(&self) -> CacheStats {
        CacheStats {
            hits: self.hits.load(Ordering::Relaxed),
            misses: self.misses.load(Ordering::Relaxed),
        }
    }

    /// Drop every entry, in memory and on disk, and reset the counters.
    ///
    /// # Errors
    /// Returns [`FeedError::Data`] when the cache directory cannot be read.
    pub async fn clear(&self) -> Result<(), FeedError> {
        self.mem.invalidate_all();
        self.hits.store(0, Ordering::Relaxed);
        self.misses.store(0, Ordering::Relaxed);
        let mut entries = tokio::fs::read_dir(&self.dir)
            .await
            .map_err(|e| FeedError::Data(format!("cache dir {}: {e}", self.dir.display())))?;
        while let Ok(Some(entry)) = entries.next_entry().await {
            let path = entry.path();
            if path.extension().is_some_and(|ext| ext == "json")
                && let Err(e) = tokio::fs::remove_file(&path).await
            {
                tracing::debug!(path = %path.display(), error = %e, "failed to remove cache record");
            }
        }
        Ok(())
    }
}

impl std::fmt::Debug for DiskTtlCache {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DiskTtlCache")
            .field("dir", &self.dir)
            .field("stats", &self.stats())
            .finish_non_exhaustive()
    }
}
