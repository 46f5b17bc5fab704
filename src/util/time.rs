//! Time and date parsing utilities.
//!
//! All timestamps handled by cadence carry an explicit offset. Naive local
//! timestamps are rejected at the boundary instead of guessed at.

use crate::error::{CadenceError, Result};
use chrono::{DateTime, Datelike, FixedOffset, NaiveDate, TimeZone, Utc};

/// Jira's changelog/field timestamp format: `2024-03-15T10:30:00.000-0500`.
const JIRA_TIMESTAMP_FORMAT: &str = "%Y-%m-%dT%H:%M:%S%.3f%z";

/// Parse a user-supplied range bound into a `DateTime<Utc>`.
///
/// Supports:
/// - RFC3339: `2024-03-15T00:00:00Z`, `2024-03-15T00:00:00+02:00`
/// - Simple date: `2024-03-15` (midnight UTC)
///
/// # Errors
///
/// Returns [`CadenceError::InvalidTimestamp`] for anything else, including
/// offset-less datetime strings.
pub fn parse_range_bound(s: &str, field_name: &str) -> Result<DateTime<Utc>> {
    let s = s.trim();

    if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
        return Ok(dt.with_timezone(&Utc));
    }

    if let Ok(date) = NaiveDate::parse_from_str(s, "%Y-%m-%d") {
        let midnight = date
            .and_hms_opt(0, 0, 0)
            .ok_or_else(|| invalid(field_name, "not a representable instant"))?;
        return Ok(Utc.from_utc_datetime(&midnight));
    }

    Err(invalid(
        field_name,
        "expected RFC3339 with offset or YYYY-MM-DD",
    ))
}

/// Parse a remote-reported timestamp in Jira's millisecond+offset format,
/// falling back to RFC3339, normalized to UTC.
///
/// # Errors
///
/// Returns [`CadenceError::InvalidTimestamp`] when neither format matches.
pub fn parse_remote_timestamp(s: &str, field_name: &str) -> Result<DateTime<Utc>> {
    if let Ok(dt) = DateTime::parse_from_str(s, JIRA_TIMESTAMP_FORMAT) {
        return Ok(dt.with_timezone(&Utc));
    }
    if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
        return Ok(dt.with_timezone(&Utc));
    }
    Err(invalid(field_name, "unrecognized remote timestamp format"))
}

/// Parse a remote timestamp keeping its original offset, used once at client
/// startup to learn the server's UTC offset from `serverInfo`.
///
/// # Errors
///
/// Returns [`CadenceError::ServerTimeUnavailable`] when the string does not
/// parse, since a broken server time makes delta queries unsafe.
pub fn parse_server_time(s: &str) -> Result<DateTime<FixedOffset>> {
    DateTime::parse_from_str(s, JIRA_TIMESTAMP_FORMAT)
        .or_else(|_| DateTime::parse_from_rfc3339(s))
        .map_err(|e| CadenceError::ServerTimeUnavailable {
            reason: format!("cannot parse serverTime '{s}': {e}"),
        })
}

/// Format a UTC instant as the remote's local time at minute precision, for
/// use inside a JQL `updated > "..."` clause.
#[must_use]
pub fn format_jql_minute(instant: DateTime<Utc>, server_offset: FixedOffset) -> String {
    instant
        .with_timezone(&server_offset)
        .format("%Y-%m-%d %H:%M")
        .to_string()
}

/// Inclusive start and exclusive end of a `YYYY-MM` month token, in UTC.
///
/// # Errors
///
/// Returns [`CadenceError::InvalidTimestamp`] when the token is malformed.
pub fn month_bounds(token: &str) -> Result<(DateTime<Utc>, DateTime<Utc>)> {
    let date = NaiveDate::parse_from_str(&format!("{token}-01"), "%Y-%m-%d")
        .map_err(|_| invalid("month", "expected YYYY-MM"))?;

    let next = if date.month() == 12 {
        NaiveDate::from_ymd_opt(date.year() + 1, 1, 1)
    } else {
        NaiveDate::from_ymd_opt(date.year(), date.month() + 1, 1)
    }
    .ok_or_else(|| invalid("month", "not a representable month"))?;

    let start = Utc.from_utc_datetime(&date.and_hms_opt(0, 0, 0).unwrap_or_default());
    let end = Utc.from_utc_datetime(&next.and_hms_opt(0, 0, 0).unwrap_or_default());
    Ok((start, end))
}

fn invalid(field: &str, reason: &str) -> CadenceError {
    CadenceError::InvalidTimestamp {
        field: field.to_string(),
        reason: reason.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_range_bound_rfc3339() {
        let dt = parse_range_bound("2024-03-15T12:30:00+02:00", "from").unwrap();
        assert_eq!(dt, Utc.with_ymd_and_hms(2024, 3, 15, 10, 30, 0).unwrap());
    }

    #[test]
    fn test_parse_range_bound_simple_date_is_midnight_utc() {
        let dt = parse_range_bound("2024-03-15", "from").unwrap();
        assert_eq!(dt, Utc.with_ymd_and_hms(2024, 3, 15, 0, 0, 0).unwrap());
    }

    #[test]
    fn test_parse_range_bound_rejects_naive_datetime() {
        assert!(parse_range_bound("2024-03-15T12:30:00", "from").is_err());
        assert!(parse_range_bound("yesterday", "from").is_err());
    }

    #[test]
    fn test_parse_remote_timestamp_jira_millis() {
        let dt = parse_remote_timestamp("2024-03-15T10:30:00.000-0500", "updated").unwrap();
        assert_eq!(dt, Utc.with_ymd_and_hms(2024, 3, 15, 15, 30, 0).unwrap());
    }

    #[test]
    fn test_parse_server_time_offset() {
        let dt = parse_server_time("2024-06-01T09:00:00.000+1000").unwrap();
        assert_eq!(dt.offset().local_minus_utc(), 10 * 3600);
    }

    #[test]
    fn test_format_jql_minute_applies_offset() {
        let utc = Utc.with_ymd_and_hms(2024, 3, 15, 23, 45, 30).unwrap();
        let offset = FixedOffset::east_opt(2 * 3600).unwrap();
        assert_eq!(format_jql_minute(utc, offset), "2024-03-16 01:45");
    }

    #[test]
    fn test_month_bounds() {
        let (start, end) = month_bounds("2024-12").unwrap();
        assert_eq!(start, Utc.with_ymd_and_hms(2024, 12, 1, 0, 0, 0).unwrap());
        assert_eq!(end, Utc.with_ymd_and_hms(2025, 1, 1, 0, 0, 0).unwrap());
    }

    #[test]
    fn test_month_bounds_rejects_garbage() {
        assert!(month_bounds("2024").is_err());
        assert!(month_bounds("2024-13").is_err());
    }
}
