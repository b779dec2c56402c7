use std::str::FromStr;
use cron::Schedule;
use crate::error::{Error, Result};

/// Parses a cron expression. Standard five-field expressions (minute
/// resolution) are accepted alongside the six/seven-field form with a
/// leading seconds column and optional trailing year.
pub fn parse_schedule(expression: &str) -> Result<Schedule> {
    let invalid = |reason: String| Error::InvalidSchedule {
        expression: expression.to_string(),
        reason,
    };

    let fields = expression.split_whitespace().count();
    let normalized = match fields {
        5 => format!("0 {}", expression.trim()),
        6 | 7 => expression.trim().to_string(),
        n => return Err(invalid(format!("expected 5 to 7 fields, got {}", n))),
    };

    Schedule::from_str(&normalized).map_err(|e| invalid(e.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};

    #[test]
    fn five_field_expressions_fire_on_the_minute() {
        let schedule = parse_schedule("*/15 * * * *").unwrap();
        let start = Utc.with_ymd_and_hms(2026, 1, 1, 12, 1, 30).unwrap();
        let next = schedule.after(&start).next().unwrap();
        assert_eq!(next, Utc.with_ymd_and_hms(2026, 1, 1, 12, 15, 0).unwrap());
    }

    #[test]
    fn seconds_field_is_honoured() {
        let schedule = parse_schedule("*/10 * * * * *").unwrap();
        let start = Utc.with_ymd_and_hms(2026, 1, 1, 0, 0, 1).unwrap();
        let next = schedule.after(&start).next().unwrap();
        assert_eq!(next, Utc.with_ymd_and_hms(2026, 1, 1, 0, 0, 10).unwrap());
    }

    #[test]
    fn malformed_expressions_are_rejected() {
        for bad in ["", "every minute", "* * *", "61 * * * *", "* * * * * * * *"] {
            assert!(
                matches!(parse_schedule(bad), Err(Error::InvalidSchedule { .. })),
                "accepted {:?}",
                bad
            );
        }
    }
}
