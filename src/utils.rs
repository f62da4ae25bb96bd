use crate::error::{InsightsError, Result};
use chrono::{DateTime, Datelike, Days, Months, NaiveDate, NaiveDateTime};

/// Length of a sale window in calendar months.
pub const SALE_WINDOW_MONTHS: u32 = 3;

const DATETIME_FORMATS: &[&str] = &[
    "%Y-%m-%d %H:%M:%S%.f",
    "%Y-%m-%dT%H:%M:%S%.f",
    "%Y-%m-%d %H:%M",
    "%Y-%m-%dT%H:%M",
    "%Y/%m/%d %H:%M:%S",
];

const DATE_FORMATS: &[&str] = &["%Y-%m-%d", "%Y/%m/%d"];

/// Parses the timestamp shapes found in complaint, to-do and payment exports.
/// Offsets are converted to UTC. Returns `None` for anything unparseable.
pub fn parse_timestamp(raw: &str) -> Option<NaiveDateTime> {
    let raw = raw.trim();
    if raw.is_empty() {
        return None;
    }

    if let Ok(dt) = DateTime::parse_from_rfc3339(raw) {
        return Some(dt.naive_utc());
    }

    for format in DATETIME_FORMATS {
        if let Ok(dt) = NaiveDateTime::parse_from_str(raw, format) {
            return Some(dt);
        }
    }

    for format in DATE_FORMATS {
        if let Ok(date) = NaiveDate::parse_from_str(raw, format) {
            return date.and_hms_opt(0, 0, 0);
        }
    }

    None
}

pub fn parse_date(raw: &str) -> Option<NaiveDate> {
    parse_timestamp(raw).map(|dt| dt.date())
}

/// Strict variant of [`parse_timestamp`] for callers that want an error.
pub fn require_timestamp(raw: &str) -> Result<NaiveDateTime> {
    parse_timestamp(raw).ok_or_else(|| InsightsError::InvalidTimestamp(raw.to_string()))
}

/// True when `candidate` falls in `[start, start + months]` using calendar
/// month arithmetic. A day that does not exist in the target month clamps to
/// that month's last day, so Nov 30 + 3 months is Feb 28 (or 29).
pub fn within_calendar_months(start: NaiveDateTime, candidate: NaiveDateTime, months: u32) -> bool {
    if candidate < start {
        return false;
    }

    match start.checked_add_months(Months::new(months)) {
        Some(limit) => candidate <= limit,
        None => true,
    }
}

pub fn within_sale_window(start: NaiveDateTime, candidate: NaiveDateTime) -> bool {
    within_calendar_months(start, candidate, SALE_WINDOW_MONTHS)
}

/// Calendar month key in `YYYY-MM` form.
pub fn month_key(date: NaiveDate) -> String {
    format!("{:04}-{:02}", date.year(), date.month())
}

pub fn last_day_of_month(year: i32, month: u32) -> Option<NaiveDate> {
    let next_month = if month == 12 { 1 } else { month + 1 };
    let next_year = if month == 12 { year + 1 } else { year };

    NaiveDate::from_ymd_opt(next_year, next_month, 1)?.checked_sub_days(Days::new(1))
}

/// Parses a `YYYY-MM` key into the first and last day of that month.
pub fn parse_month_key(key: &str) -> Result<(NaiveDate, NaiveDate)> {
    let start_str = format!("{}-01", key.trim());
    let start = NaiveDate::parse_from_str(&start_str, "%Y-%m-%d")
        .map_err(|_| InsightsError::InvalidMonthKey(key.to_string()))?;

    let end = last_day_of_month(start.year(), start.month())
        .ok_or_else(|| InsightsError::InvalidMonthKey(key.to_string()))?;

    Ok((start, end))
}
