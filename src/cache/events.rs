//! Committed write events.

use time::OffsetDateTime;
use uuid::Uuid;

/// A write that has been committed to storage.
#[derive(Debug, Clone)]
pub struct WriteEvent {
    /// Unique identifier, useful for correlating log lines.
    pub id: Uuid,
    pub kind: EventKind,
    /// Commit time as seen by the writer's clock.
    pub timestamp: OffsetDateTime,
}

impl WriteEvent {
    pub fn new(kind: EventKind, timestamp: OffsetDateTime) -> Self {
        Self {
            id: Uuid::new_v4(),
            kind,
            timestamp,
        }
    }
}

/// Types of committed writes that observers react to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EventKind {
    ReviewCreated { review_id: i64, book_id: i64 },
    ReviewUpdated { review_id: i64, book_id: i64 },
    ReviewDeleted { review_id: i64, book_id: i64 },
    BookUpdated { book_id: i64 },
    BookDeleted { book_id: i64 },
}

impl EventKind {
    /// The book the written row belongs to.
    pub fn book_id(&self) -> i64 {
        match *self {
            EventKind::ReviewCreated { book_id, .. }
            | EventKind::ReviewUpdated { book_id, .. }
            | EventKind::ReviewDeleted { book_id, .. }
            | EventKind::BookUpdated { book_id }
            | EventKind::BookDeleted { book_id } => book_id,
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            EventKind::ReviewCreated { .. } => "review.created",
            EventKind::ReviewUpdated { .. } => "review.updated",
            EventKind::ReviewDeleted { .. } => "review.deleted",
            EventKind::BookUpdated { .. } => "book.updated",
            EventKind::BookDeleted { .. } => "book.deleted",
        }
    }
}
