use chrono::{DateTime, FixedOffset, NaiveDate, NaiveDateTime, Offset, Utc};

use crate::error::{Error, Result};

/// Clinic local time, UTC+8.
pub const CLINIC_UTC_OFFSET_SECS: i32 = 8 * 3600;

const NAIVE_FORMATS: [&str; 5] = [
    "%Y-%m-%dT%H:%M:%S",
    "%Y-%m-%dT%H:%M:%S%.f",
    "%Y-%m-%d %H:%M:%S",
    "%Y-%m-%d %H:%M:%S%.f",
    "%Y-%m-%dT%H:%M",
];

/// Maps timestamps onto calendar days in one fixed timezone.
///
/// Offset-aware timestamps are shifted into the calendar's zone before the
/// time of day is dropped. Naive timestamps are read as wall-clock time in
/// that zone already.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DayCalendar {
    offset: FixedOffset,
}

impl DayCalendar {
    pub fn new(offset: FixedOffset) -> Self {
        Self { offset }
    }

    pub fn utc() -> Self {
        Self::new(Utc.fix())
    }

    pub fn offset(&self) -> FixedOffset {
        self.offset
    }

    pub fn day_of(&self, timestamp: &str) -> Option<NaiveDate> {
        let timestamp = timestamp.trim();
        if timestamp.is_empty() {
            return None;
        }

        if let Ok(aware) = DateTime::parse_from_rfc3339(timestamp) {
            return Some(aware.with_timezone(&self.offset).date_naive());
        }

        for format in NAIVE_FORMATS {
            if let Ok(naive) = NaiveDateTime::parse_from_str(timestamp, format) {
                return Some(naive.date());
            }
        }

        NaiveDate::parse_from_str(timestamp, "%Y-%m-%d").ok()
    }

    pub fn today(&self) -> NaiveDate {
        Utc::now().with_timezone(&self.offset).date_naive()
    }
}

/// Buckets days in clinic local time.
impl Default for DayCalendar {
    fn default() -> Self {
        FixedOffset::east_opt(CLINIC_UTC_OFFSET_SECS)
            .map(Self::new)
            .unwrap_or_else(Self::utc)
    }
}

/// Accepts `Z`, `UTC`, `+08:00`, `-0530` and `+8`.
pub fn parse_offset(value: &str) -> Result<FixedOffset> {
    let value = value.trim();
    if value.eq_ignore_ascii_case("z") || value.eq_ignore_ascii_case("utc") {
        return Ok(Utc.fix());
    }

    let invalid = || Error::Parse(format!("invalid UTC offset '{value}'"));
    let (sign, rest) = match value.chars().next() {
        Some('+') => (1, &value[1..]),
        Some('-') => (-1, &value[1..]),
        _ => return Err(invalid()),
    };

    if !rest.bytes().all(|b| b.is_ascii_digit() || b == b':') {
        return Err(invalid());
    }

    let (hours, minutes) = match rest.split_once(':') {
        Some((h, m)) => (h, m),
        None if rest.len() == 4 => rest.split_at(2),
        None => (rest, "0"),
    };
    let digits = |part: &str| -> Result<i32> {
        if part.is_empty() || part.len() > 2 || !part.bytes().all(|b| b.is_ascii_digit()) {
            return Err(invalid());
        }
        part.parse().map_err(|_| invalid())
    };
    let hours = digits(hours)?;
    let minutes = digits(minutes)?;
    if hours > 14 || minutes > 59 {
        return Err(invalid());
    }

    FixedOffset::east_opt(sign * (hours * 3600 + minutes * 60)).ok_or_else(invalid)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    #[test]
    fn naive_timestamps_keep_their_wall_clock_day() {
        let calendar = DayCalendar::new(parse_offset("+08:00").unwrap());
        assert_eq!(calendar.day_of("2024-01-01T23:30:00"), Some(date(2024, 1, 1)));
        assert_eq!(calendar.day_of("2024-01-01 08:15:02.123"), Some(date(2024, 1, 1)));
        assert_eq!(calendar.day_of("2024-01-01"), Some(date(2024, 1, 1)));
    }

    #[test]
    fn aware_timestamps_shift_into_calendar_zone() {
        let taipei = DayCalendar::new(parse_offset("+08:00").unwrap());
        assert_eq!(taipei.day_of("2024-01-01T18:00:00Z"), Some(date(2024, 1, 2)));
        assert_eq!(DayCalendar::utc().day_of("2024-01-01T18:00:00Z"), Some(date(2024, 1, 1)));
        assert_eq!(
            DayCalendar::utc().day_of("2024-01-02T01:00:00+08:00"),
            Some(date(2024, 1, 1))
        );
    }

    #[test]
    fn garbage_timestamps_have_no_day() {
        let calendar = DayCalendar::utc();
        assert_eq!(calendar.day_of(""), None);
        assert_eq!(calendar.day_of("yesterday"), None);
        assert_eq!(calendar.day_of("2024-13-40"), None);
    }

    #[test]
    fn parses_offset_spellings() {
        assert_eq!(parse_offset("Z").unwrap().local_minus_utc(), 0);
        assert_eq!(parse_offset("+08:00").unwrap().local_minus_utc(), 8 * 3600);
        assert_eq!(parse_offset("-0530").unwrap().local_minus_utc(), -(5 * 3600 + 30 * 60));
        assert_eq!(parse_offset("+8").unwrap().local_minus_utc(), 8 * 3600);
        assert!(parse_offset("08:00").is_err());
        assert!(parse_offset("+25:00").is_err());
    }

    #[test]
    fn rejects_signed_or_non_ascii_parts() {
        assert!(parse_offset("+1é2").is_err());
        assert!(parse_offset("+é").is_err());
        assert!(parse_offset("+-8").is_err());
        assert!(parse_offset("-+0800").is_err());
        assert!(parse_offset("+").is_err());
        assert!(parse_offset("+08:").is_err());
        assert!(parse_offset("+08:00:00").is_err());
    }

    #[test]
    fn default_calendar_uses_clinic_time() {
        assert_eq!(DayCalendar::default().offset().local_minus_utc(), CLINIC_UTC_OFFSET_SECS);
        assert_eq!(
            DayCalendar::default().day_of("2024-01-01T18:00:00Z"),
            Some(date(2024, 1, 2))
        );
    }
}
