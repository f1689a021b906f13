//! Timestamp text as stored in `metadata.db`.
//!
//! Rows written by this crate (and by calibre) look like
//! `2024-01-15 10:20:30.123456+00:00`. Column defaults produce the shorter
//! `CURRENT_TIMESTAMP` form (`2024-01-15 10:20:30`, implicitly UTC), and some
//! tools write RFC 3339 with a `T` separator. All three are accepted.

use time::format_description::BorrowedFormatItem;
use time::format_description::well_known::Rfc3339;
use time::macros::format_description;
use time::{Duration, OffsetDateTime, PrimitiveDateTime, UtcOffset};

const WITH_OFFSET: &[BorrowedFormatItem<'_>] = format_description!(
    "[year]-[month]-[day] [hour]:[minute]:[second][optional [.[subsecond]]][offset_hour sign:mandatory]:[offset_minute]"
);
const WITHOUT_OFFSET: &[BorrowedFormatItem<'_>] =
    format_description!("[year]-[month]-[day] [hour]:[minute]:[second][optional [.[subsecond]]]");
const STORED: &[BorrowedFormatItem<'_>] = format_description!(
    "[year]-[month]-[day] [hour]:[minute]:[second].[subsecond digits:6][offset_hour sign:mandatory]:[offset_minute]"
);

/// Parses a stored timestamp, normalizing it to UTC.
pub fn parse(value: &str) -> Option<OffsetDateTime> {
    let value = value.trim();
    if value.is_empty() {
        return None;
    }
    OffsetDateTime::parse(value, WITH_OFFSET)
        .or_else(|_| OffsetDateTime::parse(value, &Rfc3339))
        .or_else(|_| PrimitiveDateTime::parse(value, WITHOUT_OFFSET).map(PrimitiveDateTime::assume_utc))
        .ok()
        .map(|dt| dt.to_offset(UtcOffset::UTC))
}

/// Formats a timestamp the way it is stored, with microsecond precision.
pub fn format(value: OffsetDateTime) -> String {
    // Formatting a valid OffsetDateTime against a static description can only
    // fail on an I/O error, which cannot happen when writing to a String.
    value.to_offset(UtcOffset::UTC).format(STORED).unwrap_or_default()
}

/// Drops everything below whole seconds.
pub fn truncate(value: OffsetDateTime) -> OffsetDateTime {
    value - Duration::nanoseconds(i64::from(value.nanosecond()))
}

/// The "unknown publication date" sentinel used for books without one.
pub fn undefined() -> OffsetDateTime {
    time::macros::datetime!(0101-01-01 00:00:00 UTC)
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;
    use time::macros::datetime;

    #[rstest]
    #[case("2024-01-15 10:20:30.123456+00:00", datetime!(2024-01-15 10:20:30.123456 UTC))]
    #[case("2024-01-15 10:20:30+00:00", datetime!(2024-01-15 10:20:30 UTC))]
    #[case("2024-01-15 12:20:30+02:00", datetime!(2024-01-15 10:20:30 UTC))]
    #[case("2024-01-15 10:20:30", datetime!(2024-01-15 10:20:30 UTC))]
    #[case("2024-01-15T10:20:30.5+00:00", datetime!(2024-01-15 10:20:30.5 UTC))]
    #[case("0101-01-01 00:00:00+00:00", datetime!(0101-01-01 00:00:00 UTC))]
    fn test_parse(#[case] input: &str, #[case] expected: OffsetDateTime) {
        assert_eq!(parse(input), Some(expected));
    }

    #[rstest]
    #[case("")]
    #[case("yesterday")]
    #[case("2024-13-01 00:00:00")]
    fn test_parse_rejects(#[case] input: &str) {
        assert_eq!(parse(input), None);
    }

    #[test]
    fn test_format_then_parse() {
        let value = datetime!(2024-01-15 10:20:30.123456 UTC);
        let stored = format(value);
        assert_eq!(stored, "2024-01-15 10:20:30.123456+00:00");
        assert_eq!(parse(&stored), Some(value));
    }

    #[test]
    fn test_truncate_drops_subseconds() {
        assert_eq!(truncate(datetime!(2024-01-15 10:20:30.999999 UTC)), datetime!(2024-01-15 10:20:30 UTC));
    }
}
