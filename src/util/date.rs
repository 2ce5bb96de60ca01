use chrono::{DateTime, NaiveDate, NaiveDateTime, SecondsFormat, Utc};

/// Naive date-time layouts seen in upstream data, interpreted as UTC.
const NAIVE_DATETIME_FORMATS: &[&str] = &[
    "%Y-%m-%dT%H:%M:%S%.f",
    "%Y-%m-%dT%H:%MZ",
    "%Y-%m-%dT%H:%M",
    "%Y-%m-%d %H:%M:%S%.f",
    "%Y-%m-%d %H:%M",
];

/// Date-only layouts, midnight UTC.
const NAIVE_DATE_FORMATS: &[&str] = &[
    "%Y-%m-%d",
    "%d %b %Y",
    "%d %B %Y",
    "%b %d, %Y",
    "%B %d, %Y",
    "%b %d %Y",
    "%B %d %Y",
    "%m/%d/%Y",
    "%Y/%m/%d",
];

/// Parses the date formats advisory sources publish.
///
/// Accepts RFC 3339, RFC 2822, ISO dates with or without a time component,
/// and the spelled-out forms used on vendor pages (`09 Oct 2024`,
/// `October 9, 2024`). Anything else returns `None`; callers treat that as
/// "no timestamp", never as an error.
pub fn parse_date(raw: &str) -> Option<DateTime<Utc>> {
    let s = raw.trim();
    if s.is_empty() {
        return None;
    }

    if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
        return Some(dt.with_timezone(&Utc));
    }
    if let Ok(dt) = DateTime::parse_from_rfc2822(s) {
        return Some(dt.with_timezone(&Utc));
    }
    // RFC 3339 with a space separator ("2024-01-05 10:00:00+00:00")
    if let Ok(dt) = DateTime::parse_from_str(s, "%Y-%m-%d %H:%M:%S%.f%:z") {
        return Some(dt.with_timezone(&Utc));
    }

    for format in NAIVE_DATETIME_FORMATS {
        if let Ok(naive) = NaiveDateTime::parse_from_str(s, format) {
            return Some(naive.and_utc());
        }
    }
    for format in NAIVE_DATE_FORMATS {
        if let Ok(date) = NaiveDate::parse_from_str(s, format) {
            return date.and_hms_opt(0, 0, 0).map(|naive| naive.and_utc());
        }
    }

    None
}

/// ISO-8601 UTC with millisecond precision (`2021-01-01T00:00:00.000Z`).
///
/// Every timestamp in a feed goes through this so that entry ordering can
/// compare the strings directly.
pub fn format_iso(dt: &DateTime<Utc>) -> String {
    dt.to_rfc3339_opts(SecondsFormat::Millis, true)
}

/// [`parse_date`] followed by [`format_iso`].
pub fn normalize_date(raw: &str) -> Option<String> {
    parse_date(raw).map(|dt| format_iso(&dt))
}
