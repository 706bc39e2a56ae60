//! Response cache keyed by canonical ingredient set.
//!
//! Entries never expire. With no `max_entries` bound the cache grows for the
//! life of the process; a bound turns it into a size-limited cache. Reads
//! take no exclusive lock.

use chrono::{DateTime, Utc};
use moka::future::Cache;

use carcinoscan_core::{CanonicalKey, Verdict};

/// Verdicts stored for one canonical key.
#[derive(Debug, Clone, PartialEq)]
pub struct CacheEntry {
    /// Verdicts in the order of the request that populated the entry
    pub verdicts: Vec<Verdict>,
    pub stored_at: DateTime<Utc>,
}

/// Process-wide verdict cache using moka.
pub struct VerdictCache {
    cache: Cache<CanonicalKey, CacheEntry>,
}

impl VerdictCache {
    /// Create a cache, optionally bounded to `max_entries`.
    pub fn new(max_entries: Option<u64>) -> Self {
        let builder = Cache::builder();
        let cache = match max_entries {
            Some(max) => builder.max_capacity(max).build(),
            None => builder.build(),
        };
        Self { cache }
    }

    pub async fn get(&self, key: &CanonicalKey) -> Option<CacheEntry> {
        self.cache.get(key).await
    }

    /// Store verdicts, replacing any previous entry for the key.
    pub async fn put(&self, key: CanonicalKey, verdicts: Vec<Verdict>) {
        let entry = CacheEntry {
            verdicts,
            stored_at: Utc::now(),
        };
        self.cache.insert(key, entry).await;
    }

    /// Number of entries once pending maintenance has run.
    pub async fn entry_count(&self) -> u64 {
        self.cache.run_pending_tasks().await;
        self.cache.entry_count()
    }
}
