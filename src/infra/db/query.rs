//! Compiles a [`BookQuery`] into Postgres SQL.
//!
//! Aggregates are correlated subqueries so each can carry its own review
//! window. The aggregated rows are wrapped in an outer select so the
//! `min_reviews` filter and orderings can refer to the aggregate aliases.

use sqlx::{Postgres, QueryBuilder};
use time::OffsetDateTime;

use crate::application::query::{Aggregate, BookQuery, SortDirection, SortKey};
use crate::domain::window::DateWindow;

#[derive(sqlx::FromRow)]
pub(super) struct BookSummaryRow {
    pub id: i64,
    pub title: String,
    pub created_at: OffsetDateTime,
    pub updated_at: OffsetDateTime,
    pub reviews_count: Option<i64>,
    pub reviews_avg_rating: Option<f64>,
}

impl From<BookSummaryRow> for crate::domain::entities::BookSummary {
    fn from(row: BookSummaryRow) -> Self {
        Self {
            id: row.id,
            title: row.title,
            created_at: row.created_at,
            updated_at: row.updated_at,
            reviews_count: row.reviews_count,
            reviews_avg_rating: row.reviews_avg_rating,
        }
    }
}

/// Restriction on which books the compiled statement selects.
#[derive(Debug, Clone, Copy)]
pub(super) enum Scope {
    /// Honour the title filter, `min_reviews` and orderings.
    Listing,
    /// A single book; only the aggregate requests apply.
    Single(i64),
}

pub(super) fn push_book_query(
    qb: &mut QueryBuilder<'_, Postgres>,
    query: &BookQuery,
    scope: Scope,
) {
    qb.push("SELECT * FROM (SELECT b.id, b.title, b.created_at, b.updated_at, ");
    push_aggregate_column(qb, query, Aggregate::ReviewsCount);
    qb.push(", ");
    push_aggregate_column(qb, query, Aggregate::AvgRating);
    qb.push(" FROM books b WHERE 1=1");

    match scope {
        Scope::Single(id) => {
            qb.push(" AND b.id = ");
            qb.push_bind(id);
            qb.push(") AS q");
        }
        Scope::Listing => {
            if let Some(title) = query.title_filter() {
                qb.push(" AND b.title ILIKE ");
                qb.push_bind(like_pattern(title));
            }
            qb.push(") AS q WHERE 1=1");
            if let Some(min) = query.min_reviews_filter() {
                qb.push(" AND q.reviews_count >= ");
                qb.push_bind(min);
            }
            push_orderings(qb, query);
        }
    }
}

fn push_aggregate_column(
    qb: &mut QueryBuilder<'_, Postgres>,
    query: &BookQuery,
    aggregate: Aggregate,
) {
    let Some(window) = query.aggregate_window(aggregate) else {
        let null = match aggregate {
            Aggregate::ReviewsCount => "NULL::BIGINT",
            Aggregate::AvgRating => "NULL::DOUBLE PRECISION",
        };
        qb.push(null);
        qb.push(" AS ");
        qb.push(aggregate.alias());
        return;
    };

    let expr = match aggregate {
        Aggregate::ReviewsCount => "COUNT(*)",
        Aggregate::AvgRating => "AVG(r.rating)::DOUBLE PRECISION",
    };
    qb.push("(SELECT ");
    qb.push(expr);
    qb.push(" FROM reviews r WHERE r.book_id = b.id");
    push_window(qb, window);
    qb.push(") AS ");
    qb.push(aggregate.alias());
}

fn push_window(qb: &mut QueryBuilder<'_, Postgres>, window: DateWindow) {
    if let Some(from) = window.from {
        qb.push(" AND r.created_at >= ");
        qb.push_bind(from);
    }
    if let Some(to) = window.to {
        qb.push(" AND r.created_at <= ");
        qb.push_bind(to);
    }
}

fn push_orderings(qb: &mut QueryBuilder<'_, Postgres>, query: &BookQuery) {
    qb.push(" ORDER BY ");
    for ordering in query.orderings() {
        let column = match ordering.key {
            SortKey::CreatedAt => "q.created_at",
            SortKey::Aggregate(Aggregate::ReviewsCount) => "q.reviews_count",
            SortKey::Aggregate(Aggregate::AvgRating) => "q.reviews_avg_rating",
        };
        let direction = match ordering.direction {
            SortDirection::Asc => " ASC",
            SortDirection::Desc => " DESC",
        };
        qb.push(column);
        qb.push(direction);
        qb.push(" NULLS LAST, ");
    }
    qb.push("q.id ASC");
}

/// `%text%` with LIKE metacharacters escaped, so the title matches literally.
fn like_pattern(text: &str) -> String {
    let mut pattern = String::with_capacity(text.len() + 2);
    pattern.push('%');
    for ch in text.chars() {
        if matches!(ch, '\\' | '%' | '_') {
            pattern.push('\\');
        }
        pattern.push(ch);
    }
    pattern.push('%');
    pattern
}

#[cfg(test)]
mod tests {
    use time::macros::datetime;

    use super::*;

    fn compile(query: &BookQuery, scope: Scope) -> String {
        let mut qb = QueryBuilder::new("");
        push_book_query(&mut qb, query, scope);
        qb.sql().to_string()
    }

    #[test]
    fn default_listing_shape() {
        let query = BookQuery::new()
            .title(Some("Dune"))
            .latest()
            .with_avg_rating(DateWindow::unbounded())
            .with_reviews_count(DateWindow::unbounded());

        assert_eq!(
            compile(&query, Scope::Listing),
            "SELECT * FROM (SELECT b.id, b.title, b.created_at, b.updated_at, \
             (SELECT COUNT(*) FROM reviews r WHERE r.book_id = b.id) AS reviews_count, \
             (SELECT AVG(r.rating)::DOUBLE PRECISION FROM reviews r WHERE r.book_id = b.id) AS reviews_avg_rating \
             FROM books b WHERE 1=1 AND b.title ILIKE $1) AS q WHERE 1=1 \
             ORDER BY q.created_at DESC NULLS LAST, q.id ASC"
        );
    }

    #[test]
    fn windowed_aggregates_bind_bounds_inside_subqueries() {
        let window = DateWindow::new(
            Some(datetime!(2024-04-15 12:00 UTC)),
            Some(datetime!(2024-05-15 12:00 UTC)),
        );
        let query = BookQuery::new()
            .popular(window)
            .highest_rated(window)
            .min_reviews(2);

        assert_eq!(
            compile(&query, Scope::Listing),
            "SELECT * FROM (SELECT b.id, b.title, b.created_at, b.updated_at, \
             (SELECT COUNT(*) FROM reviews r WHERE r.book_id = b.id \
             AND r.created_at >= $1 AND r.created_at <= $2) AS reviews_count, \
             (SELECT AVG(r.rating)::DOUBLE PRECISION FROM reviews r WHERE r.book_id = b.id \
             AND r.created_at >= $3 AND r.created_at <= $4) AS reviews_avg_rating \
             FROM books b WHERE 1=1) AS q WHERE 1=1 AND q.reviews_count >= $5 \
             ORDER BY q.reviews_count DESC NULLS LAST, q.reviews_avg_rating DESC NULLS LAST, q.id ASC"
        );
    }

    #[test]
    fn half_open_window_binds_one_bound() {
        let query = BookQuery::new()
            .with_reviews_count(DateWindow::new(None, Some(datetime!(2024-01-01 00:00 UTC))));
        let sql = compile(&query, Scope::Listing);

        assert!(sql.contains("WHERE r.book_id = b.id AND r.created_at <= $1) AS reviews_count"));
        assert!(sql.contains("NULL::DOUBLE PRECISION AS reviews_avg_rating"));
    }

    #[test]
    fn single_scope_ignores_listing_clauses() {
        let query = BookQuery::new()
            .title(Some("Dune"))
            .popular(DateWindow::unbounded())
            .min_reviews(3);
        let sql = compile(&query, Scope::Single(7));

        assert!(sql.ends_with("FROM books b WHERE 1=1 AND b.id = $1) AS q"));
        assert!(!sql.contains("ILIKE"));
        assert!(!sql.contains("ORDER BY"));
    }

    #[test]
    fn like_pattern_escapes_metacharacters() {
        assert_eq!(like_pattern("Dune"), "%Dune%");
        assert_eq!(like_pattern("100%_a\\b"), "%100\\%\\_a\\\\b%");
    }
}
