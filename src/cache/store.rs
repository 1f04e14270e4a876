//! Cache storage backends.
//!
//! A [`CacheStore`] holds serialized payloads under string keys with a
//! time-to-live. [`MemoryStore`] is the in-process implementation: a bounded
//! LRU map whose entries expire lazily when read after their deadline.

use std::sync::{Arc, RwLock};
use std::time::Duration;

use async_trait::async_trait;
use bytes::Bytes;
use lru::LruCache;
use metrics::counter;
use thiserror::Error;
use time::OffsetDateTime;
use tracing::debug;

use crate::util::clock::Clock;

use super::config::CacheConfig;
use super::lock::{rw_read, rw_write};

const SOURCE: &str = "cache::store";
pub(crate) const METRIC_CACHE_EVICT: &str = "bookshelf_cache_evict_total";

#[derive(Debug, Error)]
pub enum CacheError {
    #[error("cache backend unavailable: {0}")]
    Unavailable(String),
    #[error("failed to serialize cache payload for `{key}`: {message}")]
    Serialize { key: String, message: String },
}

impl CacheError {
    pub fn unavailable(message: impl Into<String>) -> Self {
        Self::Unavailable(message.into())
    }
}

/// Key/value storage with per-entry expiry.
#[async_trait]
pub trait CacheStore: Send + Sync {
    /// The payload stored under `key`, or `None` when absent or expired.
    async fn get(&self, key: &str) -> Result<Option<Bytes>, CacheError>;

    /// Store `value` under `key`, replacing any previous entry.
    async fn put(&self, key: &str, value: Bytes, ttl: Duration) -> Result<(), CacheError>;

    /// Remove `key`. Returns whether a live entry was removed.
    async fn forget(&self, key: &str) -> Result<bool, CacheError>;
}

#[derive(Clone)]
struct Entry {
    value: Bytes,
    /// `None` when the deadline is past the representable calendar.
    expires_at: Option<OffsetDateTime>,
}

impl Entry {
    fn is_expired(&self, now: OffsetDateTime) -> bool {
        self.expires_at.is_some_and(|deadline| now >= deadline)
    }
}

/// In-memory [`CacheStore`] bounded by [`CacheConfig::capacity`].
pub struct MemoryStore {
    entries: RwLock<LruCache<String, Entry>>,
    clock: Arc<dyn Clock>,
}

impl MemoryStore {
    pub fn new(config: &CacheConfig, clock: Arc<dyn Clock>) -> Self {
        Self {
            entries: RwLock::new(LruCache::new(config.capacity_non_zero())),
            clock,
        }
    }

    /// Number of stored entries, including expired ones not yet read.
    pub fn len(&self) -> usize {
        rw_read(&self.entries, SOURCE, "len").len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn contains(&self, key: &str) -> bool {
        let now = self.clock.now();
        rw_read(&self.entries, SOURCE, "contains")
            .peek(key)
            .is_some_and(|entry| !entry.is_expired(now))
    }

    fn lookup(&self, key: &str) -> Option<Bytes> {
        let now = self.clock.now();
        let mut entries = rw_write(&self.entries, SOURCE, "get");
        let entry = entries.get(key)?.clone();
        if entry.is_expired(now) {
            entries.pop(key);
            debug!(key, "Dropped expired cache entry");
            return None;
        }
        Some(entry.value)
    }

    fn store(&self, key: &str, value: Bytes, ttl: Duration) {
        let expires_at = time::Duration::try_from(ttl)
            .ok()
            .and_then(|ttl| self.clock.now().checked_add(ttl));
        let evicted = rw_write(&self.entries, SOURCE, "put")
            .push(key.to_string(), Entry { value, expires_at });

        // `push` also hands back the previous value when overwriting the same key.
        if let Some((evicted_key, _)) = evicted
            && evicted_key != key
        {
            counter!(METRIC_CACHE_EVICT).increment(1);
            debug!(key = %evicted_key, "Evicted cache entry at capacity");
        }
    }

    fn remove(&self, key: &str) -> bool {
        let now = self.clock.now();
        rw_write(&self.entries, SOURCE, "forget")
            .pop(key)
            .is_some_and(|entry| !entry.is_expired(now))
    }
}

#[async_trait]
impl CacheStore for MemoryStore {
    async fn get(&self, key: &str) -> Result<Option<Bytes>, CacheError> {
        Ok(self.lookup(key))
    }

    async fn put(&self, key: &str, value: Bytes, ttl: Duration) -> Result<(), CacheError> {
        self.store(key, value, ttl);
        Ok(())
    }

    async fn forget(&self, key: &str) -> Result<bool, CacheError> {
        Ok(self.remove(key))
    }
}

#[cfg(test)]
mod tests {
    use std::panic::{AssertUnwindSafe, catch_unwind};

    use time::macros::datetime;

    use super::*;
    use crate::util::clock::ManualClock;

    const TTL: Duration = Duration::from_secs(3600);

    fn store_with(capacity: usize) -> (MemoryStore, ManualClock) {
        let clock = ManualClock::new(datetime!(2024-05-01 00:00 UTC));
        let config = CacheConfig {
            capacity,
            ..Default::default()
        };
        (MemoryStore::new(&config, Arc::new(clock.clone())), clock)
    }

    #[tokio::test]
    async fn put_then_get_returns_payload() {
        let (store, _clock) = store_with(8);

        assert_eq!(store.get("book:1").await.expect("get"), None);
        store
            .put("book:1", Bytes::from_static(b"{}"), TTL)
            .await
            .expect("put");
        assert_eq!(
            store.get("book:1").await.expect("get"),
            Some(Bytes::from_static(b"{}"))
        );
    }

    #[tokio::test]
    async fn entries_expire_at_deadline() {
        let (store, clock) = store_with(8);
        store
            .put("book:1", Bytes::from_static(b"1"), TTL)
            .await
            .expect("put");

        clock.advance(Duration::from_secs(3599));
        assert!(store.get("book:1").await.expect("get").is_some());

        clock.advance(Duration::from_secs(1));
        assert!(store.get("book:1").await.expect("get").is_none());
        assert!(store.is_empty());
    }

    #[tokio::test]
    async fn forget_is_idempotent() {
        let (store, _clock) = store_with(8);
        store
            .put("book:1", Bytes::from_static(b"1"), TTL)
            .await
            .expect("put");

        assert!(store.forget("book:1").await.expect("forget"));
        assert!(!store.forget("book:1").await.expect("forget"));
        assert!(!store.forget("book:2").await.expect("forget"));
    }

    #[tokio::test]
    async fn forgetting_an_expired_entry_reports_absent() {
        let (store, clock) = store_with(8);
        store
            .put("book:1", Bytes::from_static(b"1"), TTL)
            .await
            .expect("put");
        clock.advance(Duration::from_secs(2 * 3600));

        assert!(!store.forget("book:1").await.expect("forget"));
    }

    #[tokio::test]
    async fn capacity_evicts_least_recently_used() {
        let (store, _clock) = store_with(2);
        store.put("a", Bytes::from_static(b"a"), TTL).await.expect("put");
        store.put("b", Bytes::from_static(b"b"), TTL).await.expect("put");

        // Touch `a` so `b` becomes the eviction candidate.
        assert!(store.get("a").await.expect("get").is_some());
        store.put("c", Bytes::from_static(b"c"), TTL).await.expect("put");

        assert!(store.contains("a"));
        assert!(!store.contains("b"));
        assert!(store.contains("c"));
    }

    #[tokio::test]
    async fn overwrite_replaces_value_and_deadline() {
        let (store, clock) = store_with(2);
        store.put("k", Bytes::from_static(b"old"), TTL).await.expect("put");
        clock.advance(Duration::from_secs(50 * 60));
        store.put("k", Bytes::from_static(b"new"), TTL).await.expect("put");
        clock.advance(Duration::from_secs(50 * 60));

        assert_eq!(
            store.get("k").await.expect("get"),
            Some(Bytes::from_static(b"new"))
        );
        assert_eq!(store.len(), 1);
    }

    #[test]
    fn store_recovers_from_poisoned_lock() {
        let (store, _clock) = store_with(2);

        let _ = catch_unwind(AssertUnwindSafe(|| {
            let _guard = store
                .entries
                .write()
                .expect("entries lock should be acquired");
            panic!("poison entries lock");
        }));

        store.store("k", Bytes::from_static(b"v"), TTL);
        assert!(store.contains("k"));
    }
}
