//! Cache invalidation driven by committed writes.

use async_trait::async_trait;
use tracing::{debug, info};

use super::events::{EventKind, WriteEvent};
use super::keys::{book_write_key, detail_key};
use super::observers::WriteObserver;
use super::read_through::ReadThroughCache;
use super::store::CacheError;

/// Evicts the cache entries a committed write makes stale.
///
/// Review writes drop the owning book's detail entry. Book writes drop
/// [`book_write_key`], which no listing entry uses, so listings stay cached
/// until they expire.
pub struct InvalidationHook {
    cache: ReadThroughCache,
}

impl InvalidationHook {
    pub fn new(cache: ReadThroughCache) -> Self {
        Self { cache }
    }

    /// Keys evicted for `kind`.
    pub fn keys_for(kind: &EventKind) -> Vec<String> {
        match *kind {
            EventKind::ReviewCreated { book_id, .. }
            | EventKind::ReviewUpdated { book_id, .. }
            | EventKind::ReviewDeleted { book_id, .. } => vec![detail_key(book_id)],
            EventKind::BookUpdated { book_id } | EventKind::BookDeleted { book_id } => {
                vec![book_write_key(book_id)]
            }
        }
    }
}

#[async_trait]
impl WriteObserver for InvalidationHook {
    async fn on_committed(&self, event: &WriteEvent) -> Result<(), CacheError> {
        let keys = Self::keys_for(&event.kind);
        let mut evicted = 0usize;
        for key in &keys {
            if self.cache.forget(key).await? {
                evicted += 1;
            } else {
                debug!(event_id = %event.id, key = %key, "Nothing cached under key");
            }
        }
        info!(
            event_id = %event.id,
            event_kind = event.kind.name(),
            keys = ?keys,
            evicted,
            "Cache invalidated"
        );
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn review_events_target_detail_key() {
        for kind in [
            EventKind::ReviewCreated {
                review_id: 1,
                book_id: 9,
            },
            EventKind::ReviewUpdated {
                review_id: 1,
                book_id: 9,
            },
            EventKind::ReviewDeleted {
                review_id: 1,
                book_id: 9,
            },
        ] {
            assert_eq!(InvalidationHook::keys_for(&kind), vec!["book:9".to_string()]);
        }
    }

    #[test]
    fn book_events_target_write_key() {
        assert_eq!(
            InvalidationHook::keys_for(&EventKind::BookUpdated { book_id: 4 }),
            vec!["books:4".to_string()]
        );
        assert_eq!(
            InvalidationHook::keys_for(&EventKind::BookDeleted { book_id: 4 }),
            vec!["books:4".to_string()]
        );
    }
}
