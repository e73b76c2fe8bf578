use time::{Date, Month, OffsetDateTime};

/// Returns the instant `months` calendar months before `at`.
///
/// The day of month is clamped to the last valid day of the target month,
/// so `2024-05-31` minus three months is `2024-02-29`. Time of day and
/// offset are preserved.
pub fn months_before(at: OffsetDateTime, months: u32) -> OffsetDateTime {
    let date = at.date();
    let month_index = i64::from(date.year()) * 12 + i64::from(u8::from(date.month())) - 1
        - i64::from(months);
    let year = month_index.div_euclid(12) as i32;
    let month = match Month::try_from((month_index.rem_euclid(12) + 1) as u8) {
        Ok(month) => month,
        Err(_) => return at,
    };

    (1..=date.day())
        .rev()
        .find_map(|day| Date::from_calendar_date(year, month, day).ok())
        .map(|target| at.replace_date(target))
        .unwrap_or(at)
}

/// Milliseconds since the Unix epoch, as carried in event payloads.
pub fn unix_millis(at: OffsetDateTime) -> i64 {
    (at.unix_timestamp_nanos() / 1_000_000) as i64
}

#[cfg(test)]
mod tests {
    use super::*;
    use time::macros::datetime;

    #[test]
    fn test_simple_month_subtraction() {
        assert_eq!(
            months_before(datetime!(2024-06-15 10:30 UTC), 3),
            datetime!(2024-03-15 10:30 UTC)
        );
    }

    #[test]
    fn test_crosses_year_boundary() {
        assert_eq!(
            months_before(datetime!(2023-02-10 00:00 UTC), 3),
            datetime!(2022-11-10 00:00 UTC)
        );
        assert_eq!(
            months_before(datetime!(2023-01-01 00:00 UTC), 12),
            datetime!(2022-01-01 00:00 UTC)
        );
    }

    #[test]
    fn test_clamps_to_end_of_month() {
        assert_eq!(
            months_before(datetime!(2024-05-31 08:00 UTC), 3),
            datetime!(2024-02-29 08:00 UTC)
        );
        assert_eq!(
            months_before(datetime!(2023-05-31 08:00 UTC), 3),
            datetime!(2023-02-28 08:00 UTC)
        );
    }

    #[test]
    fn test_zero_months_is_identity() {
        let at = datetime!(2025-07-04 12:00 UTC);
        assert_eq!(months_before(at, 0), at);
    }

    #[test]
    fn test_unix_millis_truncates_sub_millisecond() {
        assert_eq!(unix_millis(OffsetDateTime::UNIX_EPOCH), 0);
        assert_eq!(
            unix_millis(datetime!(2024-05-31 10:00:00.123456 UTC)),
            1_717_149_600_123
        );
    }
}
