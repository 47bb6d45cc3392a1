//! Registry date parsing.
//!
//! A date only gets an instant when the registry stated its timezone, either
//! with a `Z`/`UTC`/`GMT` marker or a numeric offset. Anything else is kept for
//! display and left without an instant.

use crate::types::DateField;
use chrono::{DateTime, FixedOffset, NaiveDateTime, TimeZone, Utc};

/// Layouts that carry a numeric offset.
const OFFSET_FORMATS: &[&str] = &[
    "%Y-%m-%d %H:%M:%S%:z",
    "%Y-%m-%d %H:%M:%S %:z",
    "%Y-%m-%d %H:%M:%S%z",
    "%Y-%m-%d %H:%M:%S %z",
    "%Y-%m-%dT%H:%M:%S%.f%z",
];

/// Layouts without offset, used after a UTC marker has been removed.
const UTC_FORMATS: &[&str] = &[
    "%Y-%m-%dT%H:%M:%S%.f",
    "%Y-%m-%d %H:%M:%S%.f",
    "%Y-%m-%dT%H:%M:%S",
    "%Y-%m-%d %H:%M:%S",
    "%Y-%m-%dT%H:%M",
    "%Y-%m-%d %H:%M",
    "%d-%b-%Y %H:%M:%S",
    "%Y.%m.%d %H:%M:%S",
    "%Y/%m/%d %H:%M:%S",
];

const UTC_MARKERS: &[&str] = &[" UTC", " GMT", "UTC", "GMT", "Z", "z"];

/// Parse a registry date value.
///
/// Returns `None` for empty input. The display string is the trimmed input.
pub fn parse_date(value: &str) -> Option<DateField> {
    let display = value.trim();
    if display.is_empty() {
        return None;
    }

    Some(DateField {
        display: display.to_string(),
        instant: parse_instant(display),
    })
}

/// The UTC instant of a date value that states its timezone.
pub fn parse_instant(value: &str) -> Option<DateTime<Utc>> {
    let value = value.trim();

    if let Ok(dt) = DateTime::parse_from_rfc3339(value) {
        return Some(dt.with_timezone(&Utc));
    }

    for format in OFFSET_FORMATS {
        if let Ok(dt) = DateTime::<FixedOffset>::parse_from_str(value, format) {
            return Some(dt.with_timezone(&Utc));
        }
    }

    let naive = strip_utc_marker(value)?;
    UTC_FORMATS
        .iter()
        .find_map(|format| NaiveDateTime::parse_from_str(naive, format).ok())
        .map(|dt| Utc.from_utc_datetime(&dt))
}

/// Remove a trailing UTC marker; `None` when there is none.
fn strip_utc_marker(value: &str) -> Option<&str> {
    let value = value.trim_end_matches(['.', ' ']);

    value
        .strip_suffix("(UTC)")
        .or_else(|| value.strip_suffix("(GMT)"))
        .or_else(|| UTC_MARKERS.iter().find_map(|marker| value.strip_suffix(marker)))
        .map(str::trim_end)
        .filter(|rest| rest.chars().last().is_some_and(|c| c.is_ascii_digit()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn utc(y: i32, m: u32, d: u32, h: u32, min: u32, s: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(y, m, d, h, min, s).unwrap()
    }

    #[test]
    fn test_utc_marked_values_get_instant() {
        let expected = utc(1995, 8, 14, 4, 0, 0);
        for value in [
            "1995-08-14T04:00:00Z",
            "1995-08-14T04:00:00.000Z",
            "1995-08-14 04:00:00 UTC",
            "1995-08-14 04:00:00Z",
            "1995-08-14T04:00:00+00:00",
            "1995-08-14 04:00:00 (UTC)",
            "14-Aug-1995 04:00:00 UTC",
        ] {
            assert_eq!(parse_instant(value), Some(expected), "{}", value);
        }
    }

    #[test]
    fn test_offsets_converted_to_utc() {
        assert_eq!(
            parse_instant("2003-03-17 12:20:05+08:00"),
            Some(utc(2003, 3, 17, 4, 20, 5))
        );
        assert_eq!(
            parse_instant("2020-01-01T00:00:00-05:00"),
            Some(utc(2020, 1, 1, 5, 0, 0))
        );
    }

    #[test]
    fn test_values_without_timezone_are_display_only() {
        for value in ["2020-01-01", "2020-01-01 12:00:00", "14-Aug-1995", "20200101", "before 1995"] {
            let field = parse_date(value).unwrap();
            assert_eq!(field.display, value);
            assert!(field.instant.is_none(), "{}", value);
        }
    }

    #[test]
    fn test_empty_value() {
        assert!(parse_date("   ").is_none());
        assert!(parse_date("").is_none());
    }

    #[test]
    fn test_display_is_trimmed() {
        let field = parse_date("  2026-08-13T04:00:00Z ").unwrap();
        assert_eq!(field.display, "2026-08-13T04:00:00Z");
        assert!(field.has_instant());
    }
}
