use async_trait::async_trait;
use time::OffsetDateTime;

use crate::{
    application::repos::{CreateReviewParams, RepoError, ReviewsWriteRepo, UpdateReviewParams},
    domain::entities::ReviewRecord,
};

use super::{
    PostgresRepositories,
    util::{map_sqlx_error, map_sqlx_error_missing_parent},
};

#[derive(sqlx::FromRow)]
pub(super) struct ReviewRow {
    id: i64,
    book_id: i64,
    review: String,
    rating: i16,
    created_at: OffsetDateTime,
    updated_at: OffsetDateTime,
}

impl From<ReviewRow> for ReviewRecord {
    fn from(row: ReviewRow) -> Self {
        Self {
            id: row.id,
            book_id: row.book_id,
            review: row.review,
            rating: row.rating,
            created_at: row.created_at,
            updated_at: row.updated_at,
        }
    }
}

#[async_trait]
impl ReviewsWriteRepo for PostgresRepositories {
    async fn create_review(&self, params: CreateReviewParams) -> Result<ReviewRecord, RepoError> {
        let row = sqlx::query_as::<_, ReviewRow>(
            r#"
            INSERT INTO reviews (book_id, review, rating, created_at, updated_at)
            VALUES ($1, $2, $3, $4, $4)
            RETURNING id, book_id, review, rating, created_at, updated_at
            "#,
        )
        .bind(params.book_id)
        .bind(params.review)
        .bind(params.rating)
        .bind(params.created_at)
        .fetch_one(self.pool())
        .await
        .map_err(map_sqlx_error_missing_parent)?;
        Ok(row.into())
    }

    async fn update_review(&self, params: UpdateReviewParams) -> Result<ReviewRecord, RepoError> {
        let row = sqlx::query_as::<_, ReviewRow>(
            r#"
            UPDATE reviews
            SET review = $2, rating = $3, updated_at = $4
            WHERE id = $1
            RETURNING id, book_id, review, rating, created_at, updated_at
            "#,
        )
        .bind(params.id)
        .bind(params.review)
        .bind(params.rating)
        .bind(params.updated_at)
        .fetch_optional(self.pool())
        .await
        .map_err(map_sqlx_error)?;
        row.map(ReviewRecord::from).ok_or(RepoError::NotFound)
    }

    async fn delete_review(&self, id: i64) -> Result<ReviewRecord, RepoError> {
        let row = sqlx::query_as::<_, ReviewRow>(
            r#"
            DELETE FROM reviews
            WHERE id = $1
            RETURNING id, book_id, review, rating, created_at, updated_at
            "#,
        )
        .bind(id)
        .fetch_optional(self.pool())
        .await
        .map_err(map_sqlx_error)?;
        row.map(ReviewRecord::from).ok_or(RepoError::NotFound)
    }
}
