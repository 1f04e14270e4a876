//! Named listing filters and their query compositions.

use time::OffsetDateTime;

use crate::{application::query::BookQuery, domain::window::DateWindow};

const ONE_MONTH: u8 = 1;
const SIX_MONTHS: u8 = 6;
const MIN_REVIEWS_LAST_MONTH: i64 = 2;
const MIN_REVIEWS_LAST_6_MONTHS: i64 = 5;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ListingFilter {
    Latest,
    PopularLastMonth,
    PopularLast6Months,
    HighestRatedLastMonth,
    HighestRatedLast6Months,
}

impl ListingFilter {
    /// Unrecognised names, including the empty string, select [`ListingFilter::Latest`].
    pub fn parse(name: &str) -> Self {
        match name {
            "popular_last_month" => Self::PopularLastMonth,
            "popular_last_6months" => Self::PopularLast6Months,
            "highest_rated_last_month" => Self::HighestRatedLastMonth,
            "highest_rated_last_6months" => Self::HighestRatedLast6Months,
            _ => Self::Latest,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Latest => "latest",
            Self::PopularLastMonth => "popular_last_month",
            Self::PopularLast6Months => "popular_last_6months",
            Self::HighestRatedLastMonth => "highest_rated_last_month",
            Self::HighestRatedLast6Months => "highest_rated_last_6months",
        }
    }
}

/// Compose the query for a listing request.
///
/// Windows end at `now` and start the given number of calendar months
/// earlier, so two resolutions at different instants may select different
/// reviews.
pub fn resolve(title: Option<&str>, filter: ListingFilter, now: OffsetDateTime) -> BookQuery {
    let query = BookQuery::new().title(title);
    let last_month = || DateWindow::trailing_months(now, ONE_MONTH);
    let last_six_months = || DateWindow::trailing_months(now, SIX_MONTHS);

    match filter {
        ListingFilter::PopularLastMonth => query
            .popular(last_month())
            .highest_rated(last_month())
            .min_reviews(MIN_REVIEWS_LAST_MONTH),
        ListingFilter::PopularLast6Months => query
            .popular(last_six_months())
            .highest_rated(last_six_months())
            .min_reviews(MIN_REVIEWS_LAST_6_MONTHS),
        ListingFilter::HighestRatedLastMonth => query
            .highest_rated(last_month())
            .popular(last_month())
            .min_reviews(MIN_REVIEWS_LAST_MONTH),
        ListingFilter::HighestRatedLast6Months => query
            .highest_rated(last_six_months())
            .popular(last_six_months())
            .min_reviews(MIN_REVIEWS_LAST_6_MONTHS),
        ListingFilter::Latest => query
            .latest()
            .with_avg_rating(DateWindow::unbounded())
            .with_reviews_count(DateWindow::unbounded()),
    }
}

#[cfg(test)]
mod tests {
    use time::macros::datetime;

    use super::*;
    use crate::application::query::{Aggregate, SortDirection, SortKey};

    const NOW: OffsetDateTime = datetime!(2024-05-15 12:00 UTC);

    #[test]
    fn parse_known_and_unknown_names() {
        assert_eq!(
            ListingFilter::parse("popular_last_month"),
            ListingFilter::PopularLastMonth
        );
        assert_eq!(
            ListingFilter::parse("highest_rated_last_6months"),
            ListingFilter::HighestRatedLast6Months
        );
        assert_eq!(ListingFilter::parse(""), ListingFilter::Latest);
        assert_eq!(ListingFilter::parse("bogus"), ListingFilter::Latest);
        assert_eq!(ListingFilter::parse("Popular_Last_Month"), ListingFilter::Latest);
    }

    #[test]
    fn names_round_trip_for_windowed_filters() {
        for filter in [
            ListingFilter::PopularLastMonth,
            ListingFilter::PopularLast6Months,
            ListingFilter::HighestRatedLastMonth,
            ListingFilter::HighestRatedLast6Months,
        ] {
            assert_eq!(ListingFilter::parse(filter.as_str()), filter);
        }
    }

    #[test]
    fn default_branch_orders_by_recency_with_unbounded_aggregates() {
        let query = resolve(Some("Dune"), ListingFilter::Latest, NOW);

        assert_eq!(query.title_filter(), Some("Dune"));
        assert_eq!(query.orderings()[0].key, SortKey::CreatedAt);
        assert_eq!(query.orderings()[0].direction, SortDirection::Desc);
        assert_eq!(
            query.aggregate_window(Aggregate::AvgRating),
            Some(DateWindow::unbounded())
        );
        assert_eq!(
            query.aggregate_window(Aggregate::ReviewsCount),
            Some(DateWindow::unbounded())
        );
        assert_eq!(query.min_reviews_filter(), None);
    }

    #[test]
    fn popular_last_month_orders_count_then_rating() {
        let query = resolve(None, ListingFilter::PopularLastMonth, NOW);
        let expected = DateWindow::new(Some(datetime!(2024-04-15 12:00 UTC)), Some(NOW));

        assert_eq!(query.title_filter(), None);
        assert_eq!(query.aggregate_window(Aggregate::ReviewsCount), Some(expected));
        assert_eq!(query.aggregate_window(Aggregate::AvgRating), Some(expected));
        let keys: Vec<SortKey> = query.orderings().iter().map(|o| o.key).collect();
        assert_eq!(
            keys,
            vec![
                SortKey::Aggregate(Aggregate::ReviewsCount),
                SortKey::Aggregate(Aggregate::AvgRating),
            ]
        );
        assert_eq!(query.min_reviews_filter(), Some(2));
    }

    #[test]
    fn highest_rated_last_6months_orders_rating_then_count() {
        let query = resolve(Some(""), ListingFilter::HighestRatedLast6Months, NOW);
        let expected = DateWindow::new(Some(datetime!(2023-11-15 12:00 UTC)), Some(NOW));

        assert_eq!(query.title_filter(), None);
        assert_eq!(query.aggregate_window(Aggregate::AvgRating), Some(expected));
        let keys: Vec<SortKey> = query.orderings().iter().map(|o| o.key).collect();
        assert_eq!(
            keys,
            vec![
                SortKey::Aggregate(Aggregate::AvgRating),
                SortKey::Aggregate(Aggregate::ReviewsCount),
            ]
        );
        assert_eq!(query.min_reviews_filter(), Some(5));
    }

    #[test]
    fn every_branch_is_executable() {
        for name in [
            "",
            "popular_last_month",
            "popular_last_6months",
            "highest_rated_last_month",
            "highest_rated_last_6months",
        ] {
            let query = resolve(None, ListingFilter::parse(name), NOW);
            assert!(query.validate().is_ok(), "{name} should validate");
        }
    }
}
