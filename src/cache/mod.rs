//! Bookshelf read-through cache.
//!
//! Listing and detail results are memoized as JSON in a [`CacheStore`] under
//! keys derived from the request ([`listing_key`], [`detail_key`]). Entries
//! live for a fixed TTL and are evicted early by [`InvalidationHook`], which
//! observes committed writes.
//!
//! ## Configuration
//!
//! ```toml
//! [cache]
//! enabled = true
//! ttl_seconds = 3600
//! capacity = 1024
//! ```

mod config;
mod events;
mod hook;
mod keys;
mod lock;
mod observers;
mod read_through;
mod store;

pub use config::CacheConfig;
pub use events::{EventKind, WriteEvent};
pub use hook::InvalidationHook;
pub use keys::{book_write_key, detail_key, listing_key};
pub use observers::{WriteObserver, WriteObservers};
pub use read_through::ReadThroughCache;
pub use store::{CacheError, CacheStore, MemoryStore};

pub(crate) use read_through::{METRIC_CACHE_FORGET, METRIC_CACHE_HIT, METRIC_CACHE_MISS};
pub(crate) use store::METRIC_CACHE_EVICT;
