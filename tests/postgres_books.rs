//! Repository queries against a live Postgres database.
//!
//! Run with `DATABASE_URL` pointing at a disposable server and `--ignored`.

use bookshelf::{
    application::{
        listing::{self, ListingFilter},
        query::BookQuery,
        repos::{
            BooksRepo, BooksWriteRepo, CreateBookParams, CreateReviewParams, RepoError,
            ReviewsWriteRepo, UpdateReviewParams,
        },
    },
    domain::{entities::BookRecord, window::DateWindow},
    infra::db::PostgresRepositories,
};
use sqlx::PgPool;
use time::{Duration, OffsetDateTime, macros::datetime};

const NOW: OffsetDateTime = datetime!(2024-06-15 12:00 UTC);

async fn book(repos: &PostgresRepositories, title: &str, created_at: OffsetDateTime) -> BookRecord {
    repos
        .create_book(CreateBookParams {
            title: title.to_string(),
            created_at,
        })
        .await
        .expect("create book")
}

async fn review(repos: &PostgresRepositories, book_id: i64, rating: i16, created_at: OffsetDateTime) {
    repos
        .create_review(CreateReviewParams {
            book_id,
            review: format!("rated {rating}"),
            rating,
            created_at,
        })
        .await
        .expect("create review");
}

#[sqlx::test(migrations = "./migrations")]
#[ignore = "requires DATABASE_URL"]
async fn popular_listing_matches_windowed_counts(pool: PgPool) {
    let repos = PostgresRepositories::new(pool);
    let busy = book(&repos, "Busy", NOW - Duration::days(200)).await;
    let steady = book(&repos, "Steady", NOW - Duration::days(200)).await;
    let faded = book(&repos, "Faded", NOW - Duration::days(200)).await;

    for days in [1, 2, 3] {
        review(&repos, busy.id, 4, NOW - Duration::days(days)).await;
    }
    review(&repos, steady.id, 2, NOW - Duration::days(5)).await;
    review(&repos, steady.id, 4, NOW - Duration::days(6)).await;
    for days in [40, 50, 60, 70] {
        review(&repos, faded.id, 5, NOW - Duration::days(days)).await;
    }

    let query = listing::resolve(None, ListingFilter::PopularLastMonth, NOW);
    let books = repos.list_books(&query).await.expect("listing");

    let ids: Vec<i64> = books.iter().map(|book| book.id).collect();
    assert_eq!(ids, vec![busy.id, steady.id]);
    assert_eq!(books[0].reviews_count, Some(3));
    assert_eq!(books[1].reviews_avg_rating, Some(3.0));
}

#[sqlx::test(migrations = "./migrations")]
#[ignore = "requires DATABASE_URL"]
async fn title_filter_escapes_like_wildcards(pool: PgPool) {
    let repos = PostgresRepositories::new(pool);
    let literal = book(&repos, "100% Dune", NOW).await;
    book(&repos, "100 Dunes", NOW).await;

    let query = BookQuery::new()
        .title(Some("100%"))
        .with_reviews_count(DateWindow::unbounded());
    let books = repos.list_books(&query).await.expect("listing");

    assert_eq!(books.len(), 1);
    assert_eq!(books[0].id, literal.id);
}

#[sqlx::test(migrations = "./migrations")]
#[ignore = "requires DATABASE_URL"]
async fn find_book_without_reviews_has_null_average(pool: PgPool) {
    let repos = PostgresRepositories::new(pool);
    let quiet = book(&repos, "Quiet", NOW).await;

    let query = BookQuery::new()
        .with_avg_rating(DateWindow::unbounded())
        .with_reviews_count(DateWindow::unbounded());
    let found = repos
        .find_book(quiet.id, &query)
        .await
        .expect("lookup")
        .expect("book exists");

    assert_eq!(found.reviews_count, Some(0));
    assert_eq!(found.reviews_avg_rating, None);
    assert!(
        repos
            .find_book(quiet.id + 1000, &query)
            .await
            .expect("lookup")
            .is_none()
    );
}

#[sqlx::test(migrations = "./migrations")]
#[ignore = "requires DATABASE_URL"]
async fn review_writes_enforce_constraints(pool: PgPool) {
    let repos = PostgresRepositories::new(pool);
    let target = book(&repos, "Target", NOW).await;

    let orphan = repos
        .create_review(CreateReviewParams {
            book_id: target.id + 1000,
            review: "orphan".to_string(),
            rating: 3,
            created_at: NOW,
        })
        .await;
    assert!(matches!(orphan, Err(RepoError::NotFound)));

    let missing = repos
        .update_review(UpdateReviewParams {
            id: 9999,
            review: "ghost".to_string(),
            rating: 3,
            updated_at: NOW,
        })
        .await;
    assert!(matches!(missing, Err(RepoError::NotFound)));

    review(&repos, target.id, 5, NOW).await;
    let deleted = repos.delete_book(target.id).await.expect("delete book");
    assert_eq!(deleted.id, target.id);
    assert!(
        repos
            .list_reviews_for_book(target.id)
            .await
            .expect("reviews")
            .is_empty()
    );
}

#[sqlx::test(migrations = "./migrations")]
#[ignore = "requires DATABASE_URL"]
async fn book_detail_counts_match_returned_reviews(pool: PgPool) {
    let repos = PostgresRepositories::new(pool);
    let target = book(&repos, "Target", NOW - Duration::days(10)).await;
    review(&repos, target.id, 2, NOW - Duration::days(2)).await;
    review(&repos, target.id, 5, NOW - Duration::days(1)).await;

    let query = BookQuery::new()
        .with_avg_rating(DateWindow::unbounded())
        .with_reviews_count(DateWindow::unbounded());
    let detail = repos
        .find_book_detail(target.id, &query)
        .await
        .expect("lookup")
        .expect("book exists");

    assert_eq!(detail.book.reviews_count, Some(detail.reviews.len() as i64));
    assert_eq!(detail.book.reviews_avg_rating, Some(3.5));
    assert_eq!(detail.reviews[0].rating, 5);
    assert!(
        repos
            .find_book_detail(target.id + 1000, &query)
            .await
            .expect("lookup")
            .is_none()
    );
}
