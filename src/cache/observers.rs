//! Post-commit observer registry.

use std::sync::Arc;

use async_trait::async_trait;
use tracing::info;

use super::events::WriteEvent;
use super::store::CacheError;

/// Reacts to a write after it has been committed.
#[async_trait]
pub trait WriteObserver: Send + Sync {
    async fn on_committed(&self, event: &WriteEvent) -> Result<(), CacheError>;
}

/// Ordered list of observers notified after every committed write.
#[derive(Clone, Default)]
pub struct WriteObservers {
    observers: Vec<Arc<dyn WriteObserver>>,
}

impl WriteObservers {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, observer: Arc<dyn WriteObserver>) -> Self {
        self.observers.push(observer);
        self
    }

    /// Run every observer once, in registration order, stopping at the first failure.
    pub async fn notify(&self, event: &WriteEvent) -> Result<(), CacheError> {
        info!(
            event_id = %event.id,
            event_kind = event.kind.name(),
            book_id = event.kind.book_id(),
            observers = self.observers.len(),
            "Write committed"
        );
        for observer in &self.observers {
            observer.on_committed(event).await?;
        }
        Ok(())
    }
}
