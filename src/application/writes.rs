//! Catalog writes and their post-commit notifications.

use std::sync::Arc;

use tracing::{info, instrument};

use crate::{
    application::{
        error::AppError,
        repos::{
            BooksWriteRepo, CreateBookParams, CreateReviewParams, RepoError, ReviewsWriteRepo,
            UpdateBookParams, UpdateReviewParams,
        },
    },
    cache::{EventKind, WriteEvent, WriteObservers},
    domain::{
        entities::{BookRecord, ReviewRecord},
        error::DomainError,
        reviews::{normalize_review_text, normalize_title, validate_rating},
    },
    util::clock::Clock,
};

#[derive(Debug, Clone)]
pub struct ReviewInput {
    pub review: String,
    pub rating: i16,
}

/// Validates writes, commits them and notifies observers before returning.
///
/// A caller that sees `Ok` can rely on every observer having run. When an
/// observer fails the write is already committed; the error is still returned.
#[derive(Clone)]
pub struct CatalogWriter {
    books: Arc<dyn BooksWriteRepo>,
    reviews: Arc<dyn ReviewsWriteRepo>,
    observers: WriteObservers,
    clock: Arc<dyn Clock>,
}

impl CatalogWriter {
    pub fn new(
        books: Arc<dyn BooksWriteRepo>,
        reviews: Arc<dyn ReviewsWriteRepo>,
        observers: WriteObservers,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            books,
            reviews,
            observers,
            clock,
        }
    }

    /// New books have no cached detail or listing keyed to them, so nothing is notified.
    #[instrument(skip(self))]
    pub async fn create_book(&self, title: &str) -> Result<BookRecord, AppError> {
        let title = normalize_title(title)?;
        let book = self
            .books
            .create_book(CreateBookParams {
                title,
                created_at: self.clock.now(),
            })
            .await?;
        info!(book_id = book.id, "Book created");
        Ok(book)
    }

    #[instrument(skip(self))]
    pub async fn update_book(&self, id: i64, title: &str) -> Result<BookRecord, AppError> {
        let title = normalize_title(title)?;
        let book = self
            .books
            .update_book(UpdateBookParams {
                id,
                title,
                updated_at: self.clock.now(),
            })
            .await
            .map_err(|err| not_found_as(err, DomainError::book_not_found(id)))?;
        self.committed(EventKind::BookUpdated { book_id: book.id })
            .await?;
        Ok(book)
    }

    /// Reviews go with the book; their deletion raises no review events.
    #[instrument(skip(self))]
    pub async fn delete_book(&self, id: i64) -> Result<BookRecord, AppError> {
        let book = self
            .books
            .delete_book(id)
            .await
            .map_err(|err| not_found_as(err, DomainError::book_not_found(id)))?;
        self.committed(EventKind::BookDeleted { book_id: book.id })
            .await?;
        Ok(book)
    }

    #[instrument(skip(self, input), fields(rating = input.rating))]
    pub async fn create_review(
        &self,
        book_id: i64,
        input: ReviewInput,
    ) -> Result<ReviewRecord, AppError> {
        let rating = validate_rating(input.rating)?;
        let review = normalize_review_text(&input.review)?;
        let record = self
            .reviews
            .create_review(CreateReviewParams {
                book_id,
                review,
                rating,
                created_at: self.clock.now(),
            })
            .await
            .map_err(|err| not_found_as(err, DomainError::book_not_found(book_id)))?;
        self.committed(EventKind::ReviewCreated {
            review_id: record.id,
            book_id: record.book_id,
        })
        .await?;
        Ok(record)
    }

    #[instrument(skip(self, input), fields(rating = input.rating))]
    pub async fn update_review(
        &self,
        id: i64,
        input: ReviewInput,
    ) -> Result<ReviewRecord, AppError> {
        let rating = validate_rating(input.rating)?;
        let review = normalize_review_text(&input.review)?;
        let record = self
            .reviews
            .update_review(UpdateReviewParams {
                id,
                review,
                rating,
                updated_at: self.clock.now(),
            })
            .await
            .map_err(|err| not_found_as(err, DomainError::review_not_found(id)))?;
        self.committed(EventKind::ReviewUpdated {
            review_id: record.id,
            book_id: record.book_id,
        })
        .await?;
        Ok(record)
    }

    #[instrument(skip(self))]
    pub async fn delete_review(&self, id: i64) -> Result<ReviewRecord, AppError> {
        let record = self
            .reviews
            .delete_review(id)
            .await
            .map_err(|err| not_found_as(err, DomainError::review_not_found(id)))?;
        self.committed(EventKind::ReviewDeleted {
            review_id: record.id,
            book_id: record.book_id,
        })
        .await?;
        Ok(record)
    }

    async fn committed(&self, kind: EventKind) -> Result<(), AppError> {
        let event = WriteEvent::new(kind, self.clock.now());
        self.observers.notify(&event).await?;
        Ok(())
    }
}

fn not_found_as(err: RepoError, not_found: DomainError) -> AppError {
    match err {
        RepoError::NotFound => not_found.into(),
        other => other.into(),
    }
}
