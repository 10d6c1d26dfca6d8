//! Canonical per-field equality
//!
//! Comparing serialized values produces false positives: "08:00" vs "8:00",
//! the same instant rendered in two timezones, a medication schedule with
//! its times reordered. Change detection therefore compares each field class
//! in its canonical form.

use chrono::{DateTime, NaiveTime, Utc};

use longcare_core::{Error, Result};

/// Parse a time of day in "HH:MM" form.
pub fn parse_time_of_day(s: &str) -> Result<NaiveTime> {
    NaiveTime::parse_from_str(s, "%H:%M")
        .map_err(|_| Error::Validation(format!("Invalid time of day (expected HH:MM): {:?}", s)))
}

/// Whether two time-of-day strings denote the same time.
///
/// Falls back to literal comparison when either side does not parse, so a
/// legacy malformed value still registers as changed when corrected.
pub fn same_time_of_day(a: &str, b: &str) -> bool {
    match (parse_time_of_day(a), parse_time_of_day(b)) {
        (Ok(a), Ok(b)) => a == b,
        _ => a == b,
    }
}

/// Whether two timestamps denote the same instant, regardless of the offset
/// they were supplied in.
pub fn same_instant<Tz1, Tz2>(a: &DateTime<Tz1>, b: &DateTime<Tz2>) -> bool
where
    Tz1: chrono::TimeZone,
    Tz2: chrono::TimeZone,
{
    a.with_timezone(&Utc) == b.with_timezone(&Utc)
}

/// Whether two schedules contain the same times of day, order-insensitively.
pub fn same_schedule(a: &[String], b: &[String]) -> bool {
    if a.len() != b.len() {
        return false;
    }
    let mut left: Vec<Option<NaiveTime>> = a.iter().map(|t| parse_time_of_day(t).ok()).collect();
    let mut right: Vec<Option<NaiveTime>> = b.iter().map(|t| parse_time_of_day(t).ok()).collect();
    left.sort();
    right.sort();
    left == right
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::FixedOffset;

    #[test]
    fn test_time_of_day_parsing() {
        assert!(parse_time_of_day("14:30").is_ok());
        assert!(parse_time_of_day("00:00").is_ok());
        assert!(parse_time_of_day("24:00").is_err());
        assert!(parse_time_of_day("2pm").is_err());
        assert!(parse_time_of_day("").is_err());
    }

    #[test]
    fn test_same_time_of_day_normalizes() {
        assert!(same_time_of_day("8:00", "08:00"));
        assert!(!same_time_of_day("14:00", "14:30"));
    }

    #[test]
    fn test_same_instant_across_offsets() {
        let utc: DateTime<Utc> = "2026-03-10T17:00:00Z".parse().unwrap();
        let sao_paulo: DateTime<FixedOffset> = "2026-03-10T14:00:00-03:00".parse().unwrap();
        assert!(same_instant(&utc, &sao_paulo));

        let later: DateTime<FixedOffset> = "2026-03-10T15:00:00-03:00".parse().unwrap();
        assert!(!same_instant(&utc, &later));
    }

    #[test]
    fn test_schedule_order_insensitive() {
        let a = vec!["08:00".to_string(), "20:00".to_string()];
        let b = vec!["20:00".to_string(), "8:00".to_string()];
        assert!(same_schedule(&a, &b));

        let c = vec!["08:00".to_string(), "21:00".to_string()];
        assert!(!same_schedule(&a, &c));
        assert!(!same_schedule(&a, &a[..1].to_vec()));
    }
}
