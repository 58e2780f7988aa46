// 📅 Calendar helpers
// Day-first date parsing, month boundaries and zero-guarded percentages

use chrono::{Datelike, NaiveDate, NaiveDateTime};

/// Accepted textual date layouts, day-first before ISO.
const DATE_FORMATS: &[&str] = &["%d/%m/%Y", "%d.%m.%Y", "%d-%m-%Y", "%Y-%m-%d"];

/// Same layouts followed by a time of day (spreadsheets and pandas exports add one).
const DATETIME_FORMATS: &[&str] = &[
    "%d/%m/%Y %H:%M:%S",
    "%d.%m.%Y %H:%M:%S",
    "%d-%m-%Y %H:%M:%S",
    "%Y-%m-%d %H:%M:%S",
    "%Y-%m-%dT%H:%M:%S",
];

/// Parse a date written day-first (`15/03/2024`, `15.03.2024`) or ISO (`2024-03-15`).
///
/// A trailing time component is accepted and dropped.
pub fn parse_day_first(text: &str) -> Option<NaiveDate> {
    let text = text.trim();
    if text.is_empty() {
        return None;
    }

    DATE_FORMATS
        .iter()
        .find_map(|fmt| NaiveDate::parse_from_str(text, fmt).ok())
        .or_else(|| {
            DATETIME_FORMATS
                .iter()
                .find_map(|fmt| NaiveDateTime::parse_from_str(text, fmt).ok())
                .map(|dt| dt.date())
        })
}

pub fn month_start(date: NaiveDate) -> NaiveDate {
    date.with_day(1).unwrap_or(date)
}

/// Last day of the month: the day before the first day of the next month.
pub fn month_end(year: i32, month: u32) -> Option<NaiveDate> {
    let (next_year, next_month) = if month == 12 {
        (year + 1, 1)
    } else {
        (year, month + 1)
    };
    NaiveDate::from_ymd_opt(next_year, next_month, 1)?.pred_opt()
}

/// Inclusive `[first, last]` range of a calendar month.
pub fn month_range(year: i32, month: u32) -> Option<(NaiveDate, NaiveDate)> {
    let first = NaiveDate::from_ymd_opt(year, month, 1)?;
    let last = month_end(year, month)?;
    Some((first, last))
}

/// The twelve month ranges of `year`, or `None` when any of them falls
/// outside the representable calendar.
pub fn year_months(year: i32) -> Option<Vec<(NaiveDate, NaiveDate)>> {
    (1..=12).map(|month| month_range(year, month)).collect()
}

/// `YYYY-MM` label used by the report views.
pub fn month_label(date: NaiveDate) -> String {
    date.format("%Y-%m").to_string()
}

pub fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

/// `part / whole * 100`, rounded to 2 decimals; 0 unless `whole` is positive.
pub fn percentage(part: f64, whole: f64) -> f64 {
    if whole <= 0.0 || !whole.is_finite() {
        return 0.0;
    }
    round2(part / whole * 100.0)
}
