//! Recurrence rules: fixed intervals or cron expressions.

use std::fmt;
use std::str::FromStr;
use std::time::Duration;

use chrono::{DateTime, Utc};
use cron::Schedule as CronSchedule;

use crate::error::CoreError;

const DAY: Duration = Duration::from_secs(24 * 60 * 60);

/// Shortest interval an `Every` recurrence advances by.
const MIN_INTERVAL: Duration = Duration::from_millis(1);

/// When an application should run again.
#[derive(Debug, Clone)]
pub enum Recurrence {
    /// A fixed delay measured from the end of the previous run.
    Every(Duration),
    /// A cron expression with a seconds field, e.g. `0 0 3 * * *`.
    Cron {
        expr: String,
        schedule: Box<CronSchedule>,
    },
}

impl Recurrence {
    /// Once per day.
    pub fn daily() -> Self {
        Recurrence::Every(DAY)
    }

    /// Intervals below one millisecond are raised to one millisecond.
    pub fn every(interval: Duration) -> Self {
        Recurrence::Every(interval.max(MIN_INTERVAL))
    }

    pub fn cron(expr: &str) -> Result<Self, CoreError> {
        let schedule = CronSchedule::from_str(expr).map_err(|e| CoreError::Recurrence {
            expr: expr.to_string(),
            reason: e.to_string(),
        })?;
        Ok(Recurrence::Cron {
            expr: expr.to_string(),
            schedule: Box::new(schedule),
        })
    }

    /// First occurrence strictly after `after`, if there is one.
    pub fn next_after(&self, after: DateTime<Utc>) -> Option<DateTime<Utc>> {
        match self {
            Recurrence::Every(interval) => chrono::Duration::from_std((*interval).max(MIN_INTERVAL))
                .ok()
                .and_then(|d| after.checked_add_signed(d)),
            Recurrence::Cron { schedule, .. } => schedule.after(&after).next(),
        }
    }
}

impl Default for Recurrence {
    fn default() -> Self {
        Self::daily()
    }
}

impl fmt::Display for Recurrence {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Recurrence::Every(interval) => {
                let secs = interval.as_secs();
                if secs == 0 || interval.subsec_millis() != 0 {
                    write!(f, "every {} ms", interval.as_millis())
                } else if secs % DAY.as_secs() == 0 {
                    write!(f, "every {} day(s)", secs / DAY.as_secs())
                } else if secs % 3600 == 0 {
                    write!(f, "every {} hour(s)", secs / 3600)
                } else if secs % 60 == 0 {
                    write!(f, "every {} minute(s)", secs / 60)
                } else {
                    write!(f, "every {} second(s)", secs)
                }
            }
            Recurrence::Cron { expr, .. } => write!(f, "cron `{}`", expr),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn test_default_is_daily() {
        let start = Utc.with_ymd_and_hms(2024, 5, 1, 12, 0, 0).unwrap();
        let next = Recurrence::default().next_after(start).unwrap();
        assert_eq!(next, Utc.with_ymd_and_hms(2024, 5, 2, 12, 0, 0).unwrap());
        assert_eq!(Recurrence::default().to_string(), "every 1 day(s)");
    }

    #[test]
    fn test_cron_next() {
        let r = Recurrence::cron("0 30 3 * * *").unwrap();
        let start = Utc.with_ymd_and_hms(2024, 5, 1, 12, 0, 0).unwrap();
        assert_eq!(
            r.next_after(start).unwrap(),
            Utc.with_ymd_and_hms(2024, 5, 2, 3, 30, 0).unwrap()
        );
    }

    #[test]
    fn test_invalid_cron() {
        assert!(matches!(
            Recurrence::cron("not a schedule"),
            Err(CoreError::Recurrence { .. })
        ));
    }

    #[test]
    fn test_display_units() {
        assert_eq!(Recurrence::every(Duration::from_secs(90)).to_string(), "every 90 second(s)");
        assert_eq!(Recurrence::every(Duration::from_secs(300)).to_string(), "every 5 minute(s)");
        assert_eq!(Recurrence::every(Duration::from_millis(250)).to_string(), "every 250 ms");
        assert_eq!(Recurrence::every(Duration::from_millis(1500)).to_string(), "every 1500 ms");
        assert_eq!(Recurrence::every(Duration::from_millis(60_500)).to_string(), "every 60500 ms");
    }

    #[test]
    fn test_zero_interval_still_advances() {
        let start = Utc.with_ymd_and_hms(2024, 5, 1, 12, 0, 0).unwrap();
        let clamped = Recurrence::every(Duration::ZERO);
        assert_eq!(clamped.to_string(), "every 1 ms");
        assert!(clamped.next_after(start).unwrap() > start);

        let raw = Recurrence::Every(Duration::ZERO);
        assert_eq!(
            raw.next_after(start).unwrap(),
            start + chrono::Duration::milliseconds(1)
        );
    }
}
