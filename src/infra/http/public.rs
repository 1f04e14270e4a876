use std::sync::Arc;

use axum::{
    Json, Router,
    extract::{Path, Query, State},
    http::StatusCode,
    middleware,
    response::{IntoResponse, Response},
    routing::{get, post, put},
};
use serde::Deserialize;

use crate::{
    application::{
        books::BookService,
        writes::{CatalogWriter, ReviewInput},
    },
    domain::entities::{BookDetail, BookSummary, ReviewRecord},
};

use super::{
    error::ApiError,
    middleware::{log_responses, set_request_context},
};

#[derive(Clone)]
pub struct HttpState {
    pub books: Arc<BookService>,
    pub writer: Arc<CatalogWriter>,
}

pub fn build_router(state: HttpState) -> Router {
    Router::new()
        .route("/books", get(list_books))
        .route("/books/{id}", get(book_detail))
        .route("/books/{id}/reviews", post(create_review))
        .route("/reviews/{id}", put(update_review).delete(delete_review))
        .route("/_health", get(health))
        .with_state(state)
        .layer(middleware::from_fn(log_responses))
        .layer(middleware::from_fn(set_request_context))
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct ListingParams {
    title: Option<String>,
    filter: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ReviewPayload {
    review: String,
    rating: i16,
}

impl From<ReviewPayload> for ReviewInput {
    fn from(payload: ReviewPayload) -> Self {
        Self {
            review: payload.review,
            rating: payload.rating,
        }
    }
}

async fn list_books(
    State(state): State<HttpState>,
    Query(params): Query<ListingParams>,
) -> Result<Json<Vec<BookSummary>>, ApiError> {
    let books = state
        .books
        .list(params.title.as_deref(), params.filter.as_deref().unwrap_or(""))
        .await?;
    Ok(Json(books))
}

async fn book_detail(
    State(state): State<HttpState>,
    Path(id): Path<i64>,
) -> Result<Json<BookDetail>, ApiError> {
    Ok(Json(state.books.detail(id).await?))
}

async fn create_review(
    State(state): State<HttpState>,
    Path(book_id): Path<i64>,
    Json(payload): Json<ReviewPayload>,
) -> Result<(StatusCode, Json<ReviewRecord>), ApiError> {
    let review = state.writer.create_review(book_id, payload.into()).await?;
    Ok((StatusCode::CREATED, Json(review)))
}

async fn update_review(
    State(state): State<HttpState>,
    Path(id): Path<i64>,
    Json(payload): Json<ReviewPayload>,
) -> Result<Json<ReviewRecord>, ApiError> {
    Ok(Json(state.writer.update_review(id, payload.into()).await?))
}

async fn delete_review(
    State(state): State<HttpState>,
    Path(id): Path<i64>,
) -> Result<StatusCode, ApiError> {
    state.writer.delete_review(id).await?;
    Ok(StatusCode::NO_CONTENT)
}

async fn health() -> Response {
    StatusCode::NO_CONTENT.into_response()
}
