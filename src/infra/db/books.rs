use async_trait::async_trait;
use sqlx::{Postgres, QueryBuilder};
use time::OffsetDateTime;

use crate::{
    application::{
        query::BookQuery,
        repos::{BooksRepo, BooksWriteRepo, CreateBookParams, RepoError, UpdateBookParams},
    },
    domain::entities::{BookDetail, BookRecord, BookSummary, ReviewRecord},
};

use super::{
    PostgresRepositories,
    query::{BookSummaryRow, Scope, push_book_query},
    reviews::ReviewRow,
    util::map_sqlx_error,
};

const REVIEWS_FOR_BOOK: &str = r#"
    SELECT id, book_id, review, rating, created_at, updated_at
    FROM reviews
    WHERE book_id = $1
    ORDER BY created_at DESC, id DESC
"#;

#[derive(sqlx::FromRow)]
struct BookRow {
    id: i64,
    title: String,
    created_at: OffsetDateTime,
    updated_at: OffsetDateTime,
}

impl From<BookRow> for BookRecord {
    fn from(row: BookRow) -> Self {
        Self {
            id: row.id,
            title: row.title,
            created_at: row.created_at,
            updated_at: row.updated_at,
        }
    }
}

#[async_trait]
impl BooksRepo for PostgresRepositories {
    async fn list_books(&self, query: &BookQuery) -> Result<Vec<BookSummary>, RepoError> {
        query.validate()?;
        let mut qb = QueryBuilder::<Postgres>::new("");
        push_book_query(&mut qb, query, Scope::Listing);
        let rows = qb
            .build_query_as::<BookSummaryRow>()
            .fetch_all(self.pool())
            .await
            .map_err(map_sqlx_error)?;
        Ok(rows.into_iter().map(BookSummary::from).collect())
    }

    async fn find_book(
        &self,
        id: i64,
        query: &BookQuery,
    ) -> Result<Option<BookSummary>, RepoError> {
        let mut qb = QueryBuilder::<Postgres>::new("");
        push_book_query(&mut qb, query, Scope::Single(id));
        let row = qb
            .build_query_as::<BookSummaryRow>()
            .fetch_optional(self.pool())
            .await
            .map_err(map_sqlx_error)?;
        Ok(row.map(BookSummary::from))
    }

    async fn list_reviews_for_book(&self, book_id: i64) -> Result<Vec<ReviewRecord>, RepoError> {
        let rows = sqlx::query_as::<_, ReviewRow>(REVIEWS_FOR_BOOK)
            .bind(book_id)
            .fetch_all(self.pool())
            .await
            .map_err(map_sqlx_error)?;
        Ok(rows.into_iter().map(ReviewRecord::from).collect())
    }

    async fn find_book_detail(
        &self,
        id: i64,
        query: &BookQuery,
    ) -> Result<Option<BookDetail>, RepoError> {
        let mut tx = self.pool().begin().await.map_err(map_sqlx_error)?;
        sqlx::query("SET TRANSACTION ISOLATION LEVEL REPEATABLE READ READ ONLY")
            .execute(&mut *tx)
            .await
            .map_err(map_sqlx_error)?;

        let mut qb = QueryBuilder::<Postgres>::new("");
        push_book_query(&mut qb, query, Scope::Single(id));
        let Some(row) = qb
            .build_query_as::<BookSummaryRow>()
            .fetch_optional(&mut *tx)
            .await
            .map_err(map_sqlx_error)?
        else {
            tx.commit().await.map_err(map_sqlx_error)?;
            return Ok(None);
        };

        let reviews = sqlx::query_as::<_, ReviewRow>(REVIEWS_FOR_BOOK)
            .bind(id)
            .fetch_all(&mut *tx)
            .await
            .map_err(map_sqlx_error)?;
        tx.commit().await.map_err(map_sqlx_error)?;

        Ok(Some(BookDetail {
            book: row.into(),
            reviews: reviews.into_iter().map(ReviewRecord::from).collect(),
        }))
    }
}

#[async_trait]
impl BooksWriteRepo for PostgresRepositories {
    async fn create_book(&self, params: CreateBookParams) -> Result<BookRecord, RepoError> {
        let row = sqlx::query_as::<_, BookRow>(
            r#"
            INSERT INTO books (title, created_at, updated_at)
            VALUES ($1, $2, $2)
            RETURNING id, title, created_at, updated_at
            "#,
        )
        .bind(params.title)
        .bind(params.created_at)
        .fetch_one(self.pool())
        .await
        .map_err(map_sqlx_error)?;
        Ok(row.into())
    }

    async fn update_book(&self, params: UpdateBookParams) -> Result<BookRecord, RepoError> {
        let row = sqlx::query_as::<_, BookRow>(
            r#"
            UPDATE books
            SET title = $2, updated_at = $3
            WHERE id = $1
            RETURNING id, title, created_at, updated_at
            "#,
        )
        .bind(params.id)
        .bind(params.title)
        .bind(params.updated_at)
        .fetch_optional(self.pool())
        .await
        .map_err(map_sqlx_error)?;
        row.map(BookRecord::from).ok_or(RepoError::NotFound)
    }

    async fn delete_book(&self, id: i64) -> Result<BookRecord, RepoError> {
        let row = sqlx::query_as::<_, BookRow>(
            r#"
            DELETE FROM books
            WHERE id = $1
            RETURNING id, title, created_at, updated_at
            "#,
        )
        .bind(id)
        .fetch_optional(self.pool())
        .await
        .map_err(map_sqlx_error)?;
        row.map(BookRecord::from).ok_or(RepoError::NotFound)
    }
}
