use chrono::{DateTime, Datelike, Duration, NaiveDate, NaiveDateTime, Utc};

use crate::error::{Error, Result};

/// Parse an upstream timestamp.
///
/// Accepts RFC 3339 (`2024-12-01T10:00:00.000Z`), a naive
/// `YYYY-MM-DDTHH:MM:SS`, or a bare `YYYY-MM-DD` (midnight UTC).
/// Returns `None` for anything else so callers can skip just the
/// derivation that needed the value.
pub fn parse_timestamp(s: &str) -> Option<DateTime<Utc>> {
    let s = s.trim();
    if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
        return Some(dt.with_timezone(&Utc));
    }
    if let Ok(naive) = NaiveDateTime::parse_from_str(s, "%Y-%m-%dT%H:%M:%S%.f") {
        return Some(naive.and_utc());
    }
    parse_date(s).and_then(|d| d.and_hms_opt(0, 0, 0)).map(|n| n.and_utc())
}

/// Parse an optional timestamp field; absent and unparseable are both `None`.
pub fn parse_opt(s: Option<&str>) -> Option<DateTime<Utc>> {
    s.and_then(parse_timestamp)
}

/// Parse a `YYYY-MM-DD` calendar date.
pub fn parse_date(s: &str) -> Option<NaiveDate> {
    NaiveDate::parse_from_str(s.trim(), "%Y-%m-%d").ok()
}

/// Parse a user-supplied `YYYY-MM-DD` date, rejecting anything else.
pub fn parse_date_arg(s: &str) -> Result<NaiveDate> {
    parse_date(s).ok_or_else(|| Error::DateParse(format!("'{s}' (expected YYYY-MM-DD)")))
}

/// Fractional days from `start` to `end`.
pub fn days_between(start: DateTime<Utc>, end: DateTime<Utc>) -> f64 {
    (end - start).num_seconds() as f64 / 86_400.0
}

/// Fractional hours from `start` to `end`.
pub fn hours_between(start: DateTime<Utc>, end: DateTime<Utc>) -> f64 {
    (end - start).num_seconds() as f64 / 3_600.0
}

/// True when `ts` falls on a day in `(today - days, today]`.
pub fn within_last_days(ts: DateTime<Utc>, today: NaiveDate, days: i64) -> bool {
    let date = ts.date_naive();
    date > today - Duration::days(days) && date <= today
}

/// The Monday on or before `date`.
///
/// Plain date arithmetic, so weeks that straddle a year boundary stay in
/// one bucket (2024-12-30 and 2025-01-02 share Monday 2024-12-30) and a
/// Sunday belongs to the week that started six days earlier.
pub fn week_start(date: NaiveDate) -> NaiveDate {
    date - Duration::days(date.weekday().num_days_from_monday() as i64)
}

/// Convert a 0=Sunday weekday number to the 0=Monday convention.
pub fn monday_based_weekday(sunday_based: u32) -> u32 {
    (sunday_based + 6) % 7
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Weekday};

    fn d(y: i32, m: u32, day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, day).unwrap()
    }

    #[test]
    fn test_parse_timestamp_rfc3339() {
        let ts = parse_timestamp("2024-12-01T10:30:00.000Z").unwrap();
        assert_eq!(ts, Utc.with_ymd_and_hms(2024, 12, 1, 10, 30, 0).unwrap());
    }

    #[test]
    fn test_parse_timestamp_offset_normalized() {
        let ts = parse_timestamp("2024-12-01T12:00:00+02:00").unwrap();
        assert_eq!(ts, Utc.with_ymd_and_hms(2024, 12, 1, 10, 0, 0).unwrap());
    }

    #[test]
    fn test_parse_timestamp_date_only() {
        let ts = parse_timestamp("2025-01-02").unwrap();
        assert_eq!(ts.date_naive(), d(2025, 1, 2));
    }

    #[test]
    fn test_parse_timestamp_garbage() {
        assert!(parse_timestamp("yesterday").is_none());
        assert!(parse_opt(None).is_none());
        assert!(parse_opt(Some("")).is_none());
    }

    #[test]
    fn test_parse_date_arg() {
        assert_eq!(parse_date_arg("2025-01-10").unwrap(), d(2025, 1, 10));
        assert!(matches!(parse_date_arg("10/01/2025"), Err(Error::DateParse(_))));
    }

    #[test]
    fn test_days_and_hours_between() {
        let a = Utc.with_ymd_and_hms(2025, 1, 1, 0, 0, 0).unwrap();
        let b = Utc.with_ymd_and_hms(2025, 1, 2, 12, 0, 0).unwrap();
        assert_eq!(days_between(a, b), 1.5);
        assert_eq!(hours_between(a, b), 36.0);
    }

    #[test]
    fn test_within_last_days() {
        let today = d(2025, 1, 10);
        let at = |day| Utc.with_ymd_and_hms(2025, 1, day, 9, 0, 0).unwrap();
        assert!(within_last_days(at(10), today, 7));
        assert!(within_last_days(at(4), today, 7));
        assert!(!within_last_days(at(3), today, 7));
        assert!(!within_last_days(at(11), today, 7));
    }

    #[test]
    fn test_week_start_year_boundary() {
        assert_eq!(week_start(d(2024, 12, 30)), d(2024, 12, 30));
        assert_eq!(week_start(d(2025, 1, 2)), d(2024, 12, 30));
        assert_eq!(week_start(d(2025, 1, 5)), d(2024, 12, 30));
    }

    #[test]
    fn test_week_start_sunday_belongs_to_previous_monday() {
        assert_eq!(week_start(d(2024, 12, 1)), d(2024, 11, 25));
        assert_eq!(week_start(d(2024, 12, 2)), d(2024, 12, 2));
        assert_eq!(week_start(d(2024, 12, 1)).weekday(), Weekday::Mon);
    }

    #[test]
    fn test_monday_based_weekday() {
        assert_eq!(monday_based_weekday(0), 6); // Sunday
        assert_eq!(monday_based_weekday(1), 0); // Monday
        assert_eq!(monday_based_weekday(6), 5); // Saturday
    }
}
