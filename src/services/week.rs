use chrono::{Datelike, Days, Local, NaiveDate};

/// Monday on or before `date`, `None` when that Monday is before the first
/// representable date.
///
/// Sunday counts as day 7 so it resolves to the Monday of the same week,
/// six days earlier, never to the following Monday.
pub fn week_start(date: NaiveDate) -> Option<NaiveDate> {
    let day_of_week = date.weekday().num_days_from_sunday();
    let offset = if day_of_week == 0 { 7 } else { day_of_week };
    date.checked_sub_days(Days::new(u64::from(offset - 1)))
}

/// Natural key of the weekly plan covering `date`, as an ISO calendar date.
pub fn week_key(date: NaiveDate) -> Option<String> {
    week_start(date).map(|monday| monday.format("%Y-%m-%d").to_string())
}

/// The server's local calendar date.
pub fn today() -> NaiveDate {
    Local::now().date_naive()
}

/// Week start for an optional client-supplied date, defaulting to today.
pub fn resolve(requested: Option<NaiveDate>) -> Option<NaiveDate> {
    week_start(requested.unwrap_or_else(today))
}
