use std::str::FromStr;

use chrono::{DateTime, Utc};
use chrono_tz::Tz;
use cron::Schedule;

use crate::error::{Result, SchedulerError};

/// Parse a five-field cron expression and optional IANA timezone.
///
/// The `cron` crate wants a seconds field, so `*/5 * * * *` becomes
/// `0 */5 * * * *` before parsing. Six- and seven-field expressions pass
/// through untouched.
pub fn parse_cron(expression: &str, timezone: Option<&str>) -> Result<(Schedule, Tz)> {
    let fields = expression.split_whitespace().count();
    let normalized = if fields == 5 {
        format!("0 {expression}")
    } else {
        expression.to_string()
    };

    let schedule = Schedule::from_str(&normalized).map_err(|e| SchedulerError::InvalidCron {
        expression: expression.to_string(),
        reason: e.to_string(),
    })?;

    let tz = match timezone {
        Some(name) => name
            .parse::<Tz>()
            .map_err(|_| SchedulerError::UnknownTimezone(name.to_string()))?,
        None => Tz::UTC,
    };

    Ok((schedule, tz))
}

/// Next fire instant strictly after `after`, in UTC.
pub fn next_fire(schedule: &Schedule, tz: Tz, after: DateTime<Utc>) -> Option<DateTime<Utc>> {
    schedule
        .after(&after.with_timezone(&tz))
        .next()
        .map(|t| t.with_timezone(&Utc))
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn five_field_expressions_are_accepted() {
        let (schedule, tz) = parse_cron("*/5 * * * *", None).unwrap();
        let after = Utc.with_ymd_and_hms(2026, 3, 1, 12, 1, 0).unwrap();
        let next = next_fire(&schedule, tz, after).unwrap();
        assert_eq!(next, Utc.with_ymd_and_hms(2026, 3, 1, 12, 5, 0).unwrap());
    }

    #[test]
    fn daily_nine_am_fires_at_nine() {
        let (schedule, tz) = parse_cron("0 9 * * *", None).unwrap();
        let after = Utc.with_ymd_and_hms(2026, 3, 1, 10, 0, 0).unwrap();
        let next = next_fire(&schedule, tz, after).unwrap();
        assert_eq!(next, Utc.with_ymd_and_hms(2026, 3, 2, 9, 0, 0).unwrap());
    }

    #[test]
    fn timezone_shifts_the_utc_instant() {
        let (schedule, tz) = parse_cron("0 9 * * *", Some("Europe/Stockholm")).unwrap();
        // 2026-01-15: Stockholm is UTC+1, so 09:00 local is 08:00 UTC.
        let after = Utc.with_ymd_and_hms(2026, 1, 15, 0, 0, 0).unwrap();
        let next = next_fire(&schedule, tz, after).unwrap();
        assert_eq!(next, Utc.with_ymd_and_hms(2026, 1, 15, 8, 0, 0).unwrap());
    }

    #[test]
    fn garbage_expressions_are_rejected() {
        assert!(matches!(
            parse_cron("not a cron", None).unwrap_err(),
            SchedulerError::InvalidCron { .. }
        ));
        assert!(matches!(
            parse_cron("0 9 * * *", Some("Mars/Olympus")).unwrap_err(),
            SchedulerError::UnknownTimezone(_)
        ));
    }
}
