//! Book listing and detail reads behind the read-through cache.

use std::sync::Arc;

use tracing::{debug, instrument};

use crate::{
    application::{
        error::AppError,
        listing::{self, ListingFilter},
        query::BookQuery,
        repos::BooksRepo,
    },
    cache::{ReadThroughCache, detail_key, listing_key},
    domain::{
        entities::{BookDetail, BookSummary},
        error::DomainError,
        window::DateWindow,
    },
    util::clock::Clock,
};

#[derive(Clone)]
pub struct BookService {
    books: Arc<dyn BooksRepo>,
    cache: ReadThroughCache,
    clock: Arc<dyn Clock>,
}

impl BookService {
    pub fn new(books: Arc<dyn BooksRepo>, cache: ReadThroughCache, clock: Arc<dyn Clock>) -> Self {
        Self {
            books,
            cache,
            clock,
        }
    }

    /// Books for a listing request.
    ///
    /// `title` and `filter` are the raw request strings; they form the cache
    /// key verbatim. An unknown or empty `filter` selects the latest-first
    /// listing.
    #[instrument(skip(self))]
    pub async fn list(&self, title: Option<&str>, filter: &str) -> Result<Vec<BookSummary>, AppError> {
        let key = listing_key(title.unwrap_or_default(), filter);
        let parsed = ListingFilter::parse(filter);
        self.cache
            .remember(&key, self.cache.ttl(), || async {
                let query = listing::resolve(title, parsed, self.clock.now());
                debug!(filter = parsed.as_str(), "Resolved listing query");
                self.books.list_books(&query).await.map_err(AppError::from)
            })
            .await
    }

    /// A book with both aggregates over all of its reviews and the reviews themselves.
    #[instrument(skip(self))]
    pub async fn detail(&self, id: i64) -> Result<BookDetail, AppError> {
        self.cache
            .remember(&detail_key(id), self.cache.ttl(), || self.load_detail(id))
            .await
    }

    async fn load_detail(&self, id: i64) -> Result<BookDetail, AppError> {
        let query = BookQuery::new()
            .with_avg_rating(DateWindow::unbounded())
            .with_reviews_count(DateWindow::unbounded());
        let detail = self
            .books
            .find_book_detail(id, &query)
            .await?
            .ok_or_else(|| DomainError::book_not_found(id))?;
        if detail.book.reviews_count.is_none() {
            return Err(DomainError::invariant(format!(
                "book #{id} was loaded without its reviews_count"
            ))
            .into());
        }
        Ok(detail)
    }
}
