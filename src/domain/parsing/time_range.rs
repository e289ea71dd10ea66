//! Reporting periods named in queries ("this week", "last month").

use chrono::{Datelike, Duration, NaiveDate};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TimeRange {
    Today,
    Yesterday,
    ThisWeek,
    LastWeek,
    #[default]
    ThisMonth,
    LastMonth,
}

impl TimeRange {
    /// Inclusive first and last day of the period, relative to `today`.
    ///
    /// Weeks start on Monday.
    pub fn bounds(&self, today: NaiveDate) -> (NaiveDate, NaiveDate) {
        let weekday_offset = i64::from(today.weekday().num_days_from_monday());
        let month_start = today.with_day(1).unwrap_or(today);
        match self {
            TimeRange::Today => (today, today),
            TimeRange::Yesterday => {
                let y = today - Duration::days(1);
                (y, y)
            }
            TimeRange::ThisWeek => (today - Duration::days(weekday_offset), today),
            TimeRange::LastWeek => {
                let end = today - Duration::days(weekday_offset + 1);
                (end - Duration::days(6), end)
            }
            TimeRange::ThisMonth => (month_start, today),
            TimeRange::LastMonth => {
                let end = month_start - Duration::days(1);
                (end.with_day(1).unwrap_or(end), end)
            }
        }
    }

    /// Phrase used in replies.
    pub fn label(&self) -> &'static str {
        match self {
            TimeRange::Today => "today",
            TimeRange::Yesterday => "yesterday",
            TimeRange::ThisWeek => "this week",
            TimeRange::LastWeek => "last week",
            TimeRange::ThisMonth => "this month",
            TimeRange::LastMonth => "last month",
        }
    }
}
