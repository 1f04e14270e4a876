//! Date windows restricting which reviews feed an aggregate.

use serde::{Deserialize, Serialize};
use time::{Date, Month, OffsetDateTime, util::days_in_year_month};

/// An inclusive `[from, to]` range over review `created_at`.
///
/// Either bound may be open. A window never filters book rows; it only limits
/// the reviews counted or averaged for a book.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct DateWindow {
    pub from: Option<OffsetDateTime>,
    pub to: Option<OffsetDateTime>,
}

impl DateWindow {
    pub fn new(from: Option<OffsetDateTime>, to: Option<OffsetDateTime>) -> Self {
        Self { from, to }
    }

    pub fn unbounded() -> Self {
        Self::default()
    }

    /// `[now - months, now]` using calendar months.
    pub fn trailing_months(now: OffsetDateTime, months: u8) -> Self {
        // A lower bound outside the representable calendar leaves the window open.
        Self::new(months_before(now, months), Some(now))
    }

    pub fn contains(&self, instant: OffsetDateTime) -> bool {
        let after_start = self.from.is_none_or(|from| instant >= from);
        let before_end = self.to.is_none_or(|to| instant <= to);
        after_start && before_end
    }
}

/// Step `months` calendar months back, clamping the day to the target month.
///
/// `2024-03-31` minus one month is `2024-02-29`. Returns `None` when the
/// result falls outside the supported calendar.
pub fn months_before(instant: OffsetDateTime, months: u8) -> Option<OffsetDateTime> {
    let date = instant.date();
    let index = date.year() * 12 + i32::from(u8::from(date.month())) - 1 - i32::from(months);
    let year = index.div_euclid(12);
    let month = Month::try_from(u8::try_from(index.rem_euclid(12) + 1).ok()?).ok()?;
    let day = date.day().min(days_in_year_month(year, month));
    let target = Date::from_calendar_date(year, month, day).ok()?;
    Some(instant.replace_date(target))
}
