//! Composable book query specifications.
//!
//! A [`BookQuery`] is a plain value describing what a listing wants: a title
//! filter, review aggregates over date windows, orderings and a minimum review
//! count. Each combinator consumes the query and returns the extended one, so
//! composition order is explicit. Storage adapters compile the finished value
//! once (SQL for Postgres, direct evaluation for the in-memory store).

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::domain::window::DateWindow;

/// A computed per-book value derived from its reviews.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Aggregate {
    ReviewsCount,
    AvgRating,
}

impl Aggregate {
    /// Column name the aggregate is exposed under.
    pub fn alias(self) -> &'static str {
        match self {
            Aggregate::ReviewsCount => "reviews_count",
            Aggregate::AvgRating => "reviews_avg_rating",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct AggregateRequest {
    pub aggregate: Aggregate,
    pub window: DateWindow,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SortKey {
    CreatedAt,
    Aggregate(Aggregate),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SortDirection {
    Asc,
    Desc,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Ordering {
    pub key: SortKey,
    pub direction: SortDirection,
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum QueryError {
    #[error("min_reviews({0}) requires a reviews_count aggregate in the same query")]
    MinReviewsWithoutCount(i64),
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct BookQuery {
    title: Option<String>,
    aggregates: Vec<AggregateRequest>,
    orderings: Vec<Ordering>,
    min_reviews: Option<i64>,
}

impl BookQuery {
    pub fn new() -> Self {
        Self::default()
    }

    /// Keep books whose title contains `substring`. Empty or absent is a no-op.
    pub fn title(mut self, substring: Option<&str>) -> Self {
        if let Some(substring) = substring.filter(|value| !value.is_empty()) {
            self.title = Some(substring.to_string());
        }
        self
    }

    pub fn with_reviews_count(self, window: DateWindow) -> Self {
        self.with_aggregate(Aggregate::ReviewsCount, window)
    }

    pub fn with_avg_rating(self, window: DateWindow) -> Self {
        self.with_aggregate(Aggregate::AvgRating, window)
    }

    pub fn popular(self, window: DateWindow) -> Self {
        self.with_reviews_count(window).order_by(
            SortKey::Aggregate(Aggregate::ReviewsCount),
            SortDirection::Desc,
        )
    }

    pub fn highest_rated(self, window: DateWindow) -> Self {
        self.with_avg_rating(window)
            .order_by(SortKey::Aggregate(Aggregate::AvgRating), SortDirection::Desc)
    }

    /// Newest books first.
    pub fn latest(self) -> Self {
        self.order_by(SortKey::CreatedAt, SortDirection::Desc)
    }

    /// Post-aggregation filter on `reviews_count >= n`.
    pub fn min_reviews(mut self, n: i64) -> Self {
        self.min_reviews = Some(n);
        self
    }

    pub fn order_by(mut self, key: SortKey, direction: SortDirection) -> Self {
        self.orderings.push(Ordering { key, direction });
        self
    }

    fn with_aggregate(mut self, aggregate: Aggregate, window: DateWindow) -> Self {
        // One column per alias; a repeated request replaces the earlier window.
        match self
            .aggregates
            .iter_mut()
            .find(|request| request.aggregate == aggregate)
        {
            Some(existing) => existing.window = window,
            None => self.aggregates.push(AggregateRequest { aggregate, window }),
        }
        self
    }

    pub fn title_filter(&self) -> Option<&str> {
        self.title.as_deref()
    }

    pub fn aggregates(&self) -> &[AggregateRequest] {
        &self.aggregates
    }

    pub fn aggregate_window(&self, aggregate: Aggregate) -> Option<DateWindow> {
        self.aggregates
            .iter()
            .find(|request| request.aggregate == aggregate)
            .map(|request| request.window)
    }

    pub fn orderings(&self) -> &[Ordering] {
        &self.orderings
    }

    pub fn min_reviews_filter(&self) -> Option<i64> {
        self.min_reviews
    }

    /// Check the query can be executed by a storage adapter.
    pub fn validate(&self) -> Result<(), QueryError> {
        if let Some(n) = self.min_reviews
            && self.aggregate_window(Aggregate::ReviewsCount).is_none()
        {
            return Err(QueryError::MinReviewsWithoutCount(n));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use time::macros::datetime;

    use super::*;

    fn month_window() -> DateWindow {
        DateWindow::new(
            Some(datetime!(2024-04-01 00:00 UTC)),
            Some(datetime!(2024-05-01 00:00 UTC)),
        )
    }

    #[test]
    fn empty_title_is_a_no_op() {
        assert_eq!(BookQuery::new().title(Some("")), BookQuery::new());
        assert_eq!(BookQuery::new().title(None), BookQuery::new());
        assert_eq!(
            BookQuery::new().title(Some("Dune")).title_filter(),
            Some("Dune")
        );
    }

    #[test]
    fn popular_adds_count_and_descending_order() {
        let query = BookQuery::new().popular(month_window());

        assert_eq!(
            query.aggregate_window(Aggregate::ReviewsCount),
            Some(month_window())
        );
        assert_eq!(query.aggregate_window(Aggregate::AvgRating), None);
        assert_eq!(
            query.orderings(),
            &[Ordering {
                key: SortKey::Aggregate(Aggregate::ReviewsCount),
                direction: SortDirection::Desc,
            }]
        );
    }

    #[test]
    fn highest_rated_adds_average_and_descending_order() {
        let query = BookQuery::new().highest_rated(DateWindow::unbounded());

        assert_eq!(
            query.aggregate_window(Aggregate::AvgRating),
            Some(DateWindow::unbounded())
        );
        assert_eq!(
            query.orderings()[0].key,
            SortKey::Aggregate(Aggregate::AvgRating)
        );
    }

    #[test]
    fn orderings_accumulate_in_call_order() {
        let query = BookQuery::new()
            .popular(month_window())
            .highest_rated(month_window());

        let keys: Vec<SortKey> = query.orderings().iter().map(|o| o.key).collect();
        assert_eq!(
            keys,
            vec![
                SortKey::Aggregate(Aggregate::ReviewsCount),
                SortKey::Aggregate(Aggregate::AvgRating),
            ]
        );
    }

    #[test]
    fn repeated_aggregate_replaces_window() {
        let query = BookQuery::new()
            .with_reviews_count(DateWindow::unbounded())
            .with_reviews_count(month_window());

        assert_eq!(query.aggregates().len(), 1);
        assert_eq!(
            query.aggregate_window(Aggregate::ReviewsCount),
            Some(month_window())
        );
    }

    #[test]
    fn combinators_leave_the_original_untouched() {
        let base = BookQuery::new().title(Some("Dune"));
        let extended = base.clone().popular(month_window()).min_reviews(2);

        assert!(base.aggregates().is_empty());
        assert_eq!(base.min_reviews_filter(), None);
        assert_eq!(extended.min_reviews_filter(), Some(2));
    }

    #[test]
    fn min_reviews_requires_count_aggregate() {
        let invalid = BookQuery::new()
            .with_avg_rating(DateWindow::unbounded())
            .min_reviews(2);
        assert_eq!(invalid.validate(), Err(QueryError::MinReviewsWithoutCount(2)));

        let valid = BookQuery::new()
            .with_reviews_count(DateWindow::unbounded())
            .min_reviews(2);
        assert_eq!(valid.validate(), Ok(()));
    }
}
