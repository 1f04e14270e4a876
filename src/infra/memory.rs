//! In-process repositories used when no database is configured, and by tests.
//!
//! Queries are evaluated directly over the stored rows with the same
//! semantics as the SQL compiled in [`crate::infra::db`]: case-insensitive
//! title matching, windowed aggregates, `min_reviews` after aggregation, and
//! `NULLS LAST` orderings with `id` as the final tie-breaker.

use std::cmp::Ordering as CmpOrdering;
use std::collections::BTreeMap;

use async_trait::async_trait;
use tokio::sync::RwLock;

use crate::{
    application::{
        query::{Aggregate, BookQuery, Ordering, SortDirection, SortKey},
        repos::{
            BooksRepo, BooksWriteRepo, CreateBookParams, CreateReviewParams, RepoError,
            ReviewsWriteRepo, UpdateBookParams, UpdateReviewParams,
        },
    },
    domain::{
        entities::{BookDetail, BookRecord, BookSummary, ReviewRecord},
        reviews::{MAX_RATING, MIN_RATING},
    },
};

#[derive(Default)]
struct Tables {
    books: BTreeMap<i64, BookRecord>,
    reviews: BTreeMap<i64, ReviewRecord>,
    last_book_id: i64,
    last_review_id: i64,
}

impl Tables {
    fn summarize(&self, book: &BookRecord, query: &BookQuery) -> BookSummary {
        let reviews_in = |aggregate| {
            query.aggregate_window(aggregate).map(|window| {
                self.reviews
                    .values()
                    .filter(|review| {
                        review.book_id == book.id && window.contains(review.created_at)
                    })
                    .map(|review| review.rating)
                    .collect::<Vec<_>>()
            })
        };

        let reviews_count =
            reviews_in(Aggregate::ReviewsCount).map(|ratings| ratings.len() as i64);
        let reviews_avg_rating = reviews_in(Aggregate::AvgRating).and_then(|ratings| {
            (!ratings.is_empty()).then(|| {
                let total: f64 = ratings.iter().map(|rating| f64::from(*rating)).sum();
                total / ratings.len() as f64
            })
        });

        BookSummary {
            id: book.id,
            title: book.title.clone(),
            created_at: book.created_at,
            updated_at: book.updated_at,
            reviews_count,
            reviews_avg_rating,
        }
    }

    fn reviews_for(&self, book_id: i64) -> Vec<ReviewRecord> {
        let mut reviews: Vec<ReviewRecord> = self
            .reviews
            .values()
            .filter(|review| review.book_id == book_id)
            .cloned()
            .collect();
        reviews.sort_by(|a, b| b.created_at.cmp(&a.created_at).then(b.id.cmp(&a.id)));
        reviews
    }
}

#[derive(Default)]
pub struct InMemoryRepositories {
    tables: RwLock<Tables>,
}

impl InMemoryRepositories {
    pub fn new() -> Self {
        Self::default()
    }
}

fn title_matches(title: &str, needle: Option<&str>) -> bool {
    needle.is_none_or(|needle| title.to_lowercase().contains(&needle.to_lowercase()))
}

fn compare(a: &BookSummary, b: &BookSummary, ordering: &Ordering) -> CmpOrdering {
    let descending = ordering.direction == SortDirection::Desc;
    match ordering.key {
        SortKey::CreatedAt => directed(a.created_at.cmp(&b.created_at), descending),
        SortKey::Aggregate(Aggregate::ReviewsCount) => {
            nulls_last(a.reviews_count, b.reviews_count, descending, |x, y| x.cmp(&y))
        }
        SortKey::Aggregate(Aggregate::AvgRating) => nulls_last(
            a.reviews_avg_rating,
            b.reviews_avg_rating,
            descending,
            |x, y| x.total_cmp(&y),
        ),
    }
}

fn directed(order: CmpOrdering, descending: bool) -> CmpOrdering {
    if descending { order.reverse() } else { order }
}

fn nulls_last<T>(
    a: Option<T>,
    b: Option<T>,
    descending: bool,
    cmp: impl Fn(T, T) -> CmpOrdering,
) -> CmpOrdering {
    match (a, b) {
        (None, None) => CmpOrdering::Equal,
        (None, Some(_)) => CmpOrdering::Greater,
        (Some(_), None) => CmpOrdering::Less,
        (Some(x), Some(y)) => directed(cmp(x, y), descending),
    }
}

fn check_rating(rating: i16) -> Result<(), RepoError> {
    if (MIN_RATING..=MAX_RATING).contains(&rating) {
        Ok(())
    } else {
        Err(RepoError::InvalidInput {
            message: format!("rating {rating} violates reviews_rating_check"),
        })
    }
}

#[async_trait]
impl BooksRepo for InMemoryRepositories {
    async fn list_books(&self, query: &BookQuery) -> Result<Vec<BookSummary>, RepoError> {
        query.validate()?;
        let tables = self.tables.read().await;
        let min_reviews = query.min_reviews_filter();

        let mut books: Vec<BookSummary> = tables
            .books
            .values()
            .filter(|book| title_matches(&book.title, query.title_filter()))
            .map(|book| tables.summarize(book, query))
            .filter(|summary| {
                min_reviews.is_none_or(|min| summary.reviews_count.is_some_and(|n| n >= min))
            })
            .collect();

        books.sort_by(|a, b| {
            query
                .orderings()
                .iter()
                .map(|ordering| compare(a, b, ordering))
                .find(|order| order.is_ne())
                .unwrap_or_else(|| a.id.cmp(&b.id))
        });
        Ok(books)
    }

    async fn find_book(
        &self,
        id: i64,
        query: &BookQuery,
    ) -> Result<Option<BookSummary>, RepoError> {
        let tables = self.tables.read().await;
        Ok(tables
            .books
            .get(&id)
            .map(|book| tables.summarize(book, query)))
    }

    async fn list_reviews_for_book(&self, book_id: i64) -> Result<Vec<ReviewRecord>, RepoError> {
        Ok(self.tables.read().await.reviews_for(book_id))
    }

    async fn find_book_detail(
        &self,
        id: i64,
        query: &BookQuery,
    ) -> Result<Option<BookDetail>, RepoError> {
        let tables = self.tables.read().await;
        Ok(tables.books.get(&id).map(|book| BookDetail {
            book: tables.summarize(book, query),
            reviews: tables.reviews_for(id),
        }))
    }
}

#[async_trait]
impl BooksWriteRepo for InMemoryRepositories {
    async fn create_book(&self, params: CreateBookParams) -> Result<BookRecord, RepoError> {
        let mut tables = self.tables.write().await;
        tables.last_book_id += 1;
        let book = BookRecord {
            id: tables.last_book_id,
            title: params.title,
            created_at: params.created_at,
            updated_at: params.created_at,
        };
        tables.books.insert(book.id, book.clone());
        Ok(book)
    }

    async fn update_book(&self, params: UpdateBookParams) -> Result<BookRecord, RepoError> {
        let mut tables = self.tables.write().await;
        let book = tables
            .books
            .get_mut(&params.id)
            .ok_or(RepoError::NotFound)?;
        book.title = params.title;
        book.updated_at = params.updated_at;
        Ok(book.clone())
    }

    async fn delete_book(&self, id: i64) -> Result<BookRecord, RepoError> {
        let mut tables = self.tables.write().await;
        let book = tables.books.remove(&id).ok_or(RepoError::NotFound)?;
        tables.reviews.retain(|_, review| review.book_id != id);
        Ok(book)
    }
}

#[async_trait]
impl ReviewsWriteRepo for InMemoryRepositories {
    async fn create_review(&self, params: CreateReviewParams) -> Result<ReviewRecord, RepoError> {
        check_rating(params.rating)?;
        let mut tables = self.tables.write().await;
        if !tables.books.contains_key(&params.book_id) {
            return Err(RepoError::NotFound);
        }
        tables.last_review_id += 1;
        let review = ReviewRecord {
            id: tables.last_review_id,
            book_id: params.book_id,
            review: params.review,
            rating: params.rating,
            created_at: params.created_at,
            updated_at: params.created_at,
        };
        tables.reviews.insert(review.id, review.clone());
        Ok(review)
    }

    async fn update_review(&self, params: UpdateReviewParams) -> Result<ReviewRecord, RepoError> {
        check_rating(params.rating)?;
        let mut tables = self.tables.write().await;
        let review = tables
            .reviews
            .get_mut(&params.id)
            .ok_or(RepoError::NotFound)?;
        review.review = params.review;
        review.rating = params.rating;
        review.updated_at = params.updated_at;
        Ok(review.clone())
    }

    async fn delete_review(&self, id: i64) -> Result<ReviewRecord, RepoError> {
        self.tables
            .write()
            .await
            .reviews
            .remove(&id)
            .ok_or(RepoError::NotFound)
    }
}
