//! Fire-time policies for scheduled jobs

use crate::error::SchedulerError;
use chrono::{DateTime, Utc, Weekday};
use cron::Schedule;
use std::fmt;
use std::str::FromStr;
use std::time::Duration;

#[derive(Debug, Clone)]
pub enum Trigger {
    /// Fires every `every`, first fire one period after the anchor (scheduler start)
    Interval { every: Duration },
    /// Fires at hour:minute UTC, every day or on a single weekday
    Calendar {
        hour: u32,
        minute: u32,
        weekday: Option<Weekday>,
        schedule: Box<Schedule>,
    },
}

impl Trigger {
    pub fn interval(every: Duration) -> Result<Self, SchedulerError> {
        if every < Duration::from_millis(1) {
            return Err(SchedulerError::InvalidTrigger(format!(
                "interval must be at least 1ms, got {:?}",
                every
            )));
        }
        Ok(Trigger::Interval { every })
    }

    pub fn daily_at(hour: u32, minute: u32) -> Result<Self, SchedulerError> {
        Self::calendar(hour, minute, None)
    }

    pub fn weekly_at(weekday: Weekday, hour: u32, minute: u32) -> Result<Self, SchedulerError> {
        Self::calendar(hour, minute, Some(weekday))
    }

    fn calendar(hour: u32, minute: u32, weekday: Option<Weekday>) -> Result<Self, SchedulerError> {
        if hour > 23 || minute > 59 {
            return Err(SchedulerError::InvalidTrigger(format!(
                "time of day {:02}:{:02} is out of range",
                hour, minute
            )));
        }

        // Cron format: second minute hour day-of-month month day-of-week
        let day_of_week = weekday
            .map(|d| d.to_string())
            .unwrap_or_else(|| "*".to_string());
        let expr = format!("0 {} {} * * {}", minute, hour, day_of_week);
        let schedule = Schedule::from_str(&expr).map_err(|e| {
            SchedulerError::InvalidTrigger(format!("invalid cron expression '{}': {}", expr, e))
        })?;

        Ok(Trigger::Calendar {
            hour,
            minute,
            weekday,
            schedule: Box::new(schedule),
        })
    }

    /// First occurrence strictly after `after`; interval occurrences are
    /// aligned to `anchor + k * every` with k >= 1
    pub fn next_after(
        &self,
        after: DateTime<Utc>,
        anchor: DateTime<Utc>,
    ) -> Option<DateTime<Utc>> {
        match self {
            Trigger::Interval { every } => {
                let every = chrono::Duration::from_std(*every).ok()?;
                let every_ms = every.num_milliseconds();
                if every_ms <= 0 {
                    return None;
                }
                let elapsed_ms = (after - anchor).num_milliseconds();
                let periods = if elapsed_ms < 0 {
                    1
                } else {
                    elapsed_ms / every_ms + 1
                };
                Some(anchor + chrono::Duration::milliseconds(periods * every_ms))
            }
            Trigger::Calendar { schedule, .. } => schedule.after(&after).next(),
        }
    }

    /// First fire after the scheduler (re)starts at `start`
    pub fn first_fire(&self, start: DateTime<Utc>) -> Option<DateTime<Utc>> {
        self.next_after(start, start)
    }
}

impl fmt::Display for Trigger {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Trigger::Interval { every } => write!(f, "interval[{}s]", every.as_secs()),
            Trigger::Calendar {
                hour,
                minute,
                weekday: Some(day),
                ..
            } => write!(f, "calendar[{} {:02}:{:02} UTC]", day, hour, minute),
            Trigger::Calendar {
                hour,
                minute,
                weekday: None,
                ..
            } => write!(f, "calendar[daily {:02}:{:02} UTC]", hour, minute),
        }
    }
}
