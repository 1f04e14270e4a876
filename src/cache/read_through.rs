//! Read-through memoization over a [`CacheStore`].

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use bytes::Bytes;
use metrics::counter;
use serde::{Serialize, de::DeserializeOwned};
use tracing::{debug, warn};

use super::config::CacheConfig;
use super::store::{CacheError, CacheStore};

pub(crate) const METRIC_CACHE_HIT: &str = "bookshelf_cache_hit_total";
pub(crate) const METRIC_CACHE_MISS: &str = "bookshelf_cache_miss_total";
pub(crate) const METRIC_CACHE_FORGET: &str = "bookshelf_cache_forget_total";

/// Memoizes producer results as JSON under string keys.
///
/// Every hit deserializes a fresh value, so callers own what they get back and
/// cannot alter the stored copy. Concurrent misses on one key may each run
/// their producer; the last write wins.
#[derive(Clone)]
pub struct ReadThroughCache {
    store: Arc<dyn CacheStore>,
    config: CacheConfig,
}

impl ReadThroughCache {
    pub fn new(store: Arc<dyn CacheStore>, config: CacheConfig) -> Self {
        Self { store, config }
    }

    /// Configured entry lifetime.
    pub fn ttl(&self) -> Duration {
        self.config.ttl()
    }

    /// Return the value cached under `key`, or run `producer` and cache its result.
    ///
    /// A producer error is returned as-is and leaves the cache untouched.
    /// Store failures are returned as `E::from(CacheError)`.
    pub async fn remember<T, E, F, Fut>(&self, key: &str, ttl: Duration, producer: F) -> Result<T, E>
    where
        T: Serialize + DeserializeOwned,
        E: From<CacheError>,
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<T, E>>,
    {
        if !self.config.enabled {
            return producer().await;
        }

        if let Some(payload) = self.store.get(key).await? {
            match serde_json::from_slice::<T>(&payload) {
                Ok(value) => {
                    counter!(METRIC_CACHE_HIT).increment(1);
                    debug!(key, "Cache hit");
                    return Ok(value);
                }
                Err(err) => {
                    warn!(key, error = %err, "Discarding undecodable cache entry");
                }
            }
        }

        counter!(METRIC_CACHE_MISS).increment(1);
        debug!(key, "Cache miss");

        let value = producer().await?;
        let payload = serde_json::to_vec(&value).map_err(|err| CacheError::Serialize {
            key: key.to_string(),
            message: err.to_string(),
        })?;
        self.store.put(key, Bytes::from(payload), ttl).await?;
        Ok(value)
    }

    /// Evict `key`. Returns whether a live entry was removed.
    pub async fn forget(&self, key: &str) -> Result<bool, CacheError> {
        let existed = self.store.forget(key).await?;
        if existed {
            counter!(METRIC_CACHE_FORGET).increment(1);
        }
        debug!(key, existed, "Cache entry forgotten");
        Ok(existed)
    }
}
