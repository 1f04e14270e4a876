//! Repository traits describing persistence adapters.

use async_trait::async_trait;
use thiserror::Error;
use time::OffsetDateTime;

use crate::application::query::{BookQuery, QueryError};
use crate::domain::entities::{BookDetail, BookRecord, BookSummary, ReviewRecord};

#[derive(Debug, Error)]
pub enum RepoError {
    #[error("persistence error: {0}")]
    Persistence(String),
    #[error("duplicate record violates unique constraint `{constraint}`")]
    Duplicate { constraint: String },
    #[error("resource not found")]
    NotFound,
    #[error("invalid input: {message}")]
    InvalidInput { message: String },
    #[error("integrity error: {message}")]
    Integrity { message: String },
    #[error("database timeout")]
    Timeout,
    #[error(transparent)]
    Query(#[from] QueryError),
}

impl RepoError {
    pub fn from_persistence(err: impl std::fmt::Display) -> Self {
        Self::Persistence(err.to_string())
    }
}

#[derive(Debug, Clone)]
pub struct CreateBookParams {
    pub title: String,
    pub created_at: OffsetDateTime,
}

#[derive(Debug, Clone)]
pub struct UpdateBookParams {
    pub id: i64,
    pub title: String,
    pub updated_at: OffsetDateTime,
}

#[derive(Debug, Clone)]
pub struct CreateReviewParams {
    pub book_id: i64,
    pub review: String,
    pub rating: i16,
    pub created_at: OffsetDateTime,
}

#[derive(Debug, Clone)]
pub struct UpdateReviewParams {
    pub id: i64,
    pub review: String,
    pub rating: i16,
    pub updated_at: OffsetDateTime,
}

/// Read access to books and their reviews.
///
/// Implementations call [`BookQuery::validate`] before executing a query and
/// surface a rejection as [`RepoError::Query`].
#[async_trait]
pub trait BooksRepo: Send + Sync {
    /// All books matching `query`, in the query's order with `id` as the final tie-breaker.
    async fn list_books(&self, query: &BookQuery) -> Result<Vec<BookSummary>, RepoError>;

    /// A single book annotated with the aggregates `query` requests.
    ///
    /// Only the aggregate requests of `query` are honoured; its title filter,
    /// orderings and `min_reviews` do not apply to a lookup by id.
    async fn find_book(
        &self,
        id: i64,
        query: &BookQuery,
    ) -> Result<Option<BookSummary>, RepoError>;

    /// Reviews of `book_id`, newest first.
    async fn list_reviews_for_book(&self, book_id: i64) -> Result<Vec<ReviewRecord>, RepoError>;

    /// [`find_book`](Self::find_book) and [`list_reviews_for_book`](Self::list_reviews_for_book)
    /// read from one snapshot, so the aggregates describe exactly the returned reviews.
    async fn find_book_detail(
        &self,
        id: i64,
        query: &BookQuery,
    ) -> Result<Option<BookDetail>, RepoError>;
}

#[async_trait]
pub trait BooksWriteRepo: Send + Sync {
    async fn create_book(&self, params: CreateBookParams) -> Result<BookRecord, RepoError>;

    /// Fails with [`RepoError::NotFound`] when the book does not exist.
    async fn update_book(&self, params: UpdateBookParams) -> Result<BookRecord, RepoError>;

    /// Removes the book and, through the storage cascade, its reviews.
    async fn delete_book(&self, id: i64) -> Result<BookRecord, RepoError>;
}

#[async_trait]
pub trait ReviewsWriteRepo: Send + Sync {
    /// Fails with [`RepoError::NotFound`] when the book does not exist.
    async fn create_review(&self, params: CreateReviewParams) -> Result<ReviewRecord, RepoError>;

    async fn update_review(&self, params: UpdateReviewParams) -> Result<ReviewRecord, RepoError>;

    /// Returns the deleted row so callers still know which book it belonged to.
    async fn delete_review(&self, id: i64) -> Result<ReviewRecord, RepoError>;
}
