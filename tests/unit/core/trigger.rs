//! Unit tests for job triggers

use chrono::{DateTime, Datelike, TimeZone, Timelike, Utc, Weekday};
use std::time::Duration;
use stockpulse::core::trigger::Trigger;
use stockpulse::error::SchedulerError;

fn at(y: i32, mo: u32, d: u32, h: u32, mi: u32, s: u32) -> DateTime<Utc> {
    Utc.with_ymd_and_hms(y, mo, d, h, mi, s).unwrap()
}

#[test]
fn test_interval_rejects_zero() {
    let result = Trigger::interval(Duration::ZERO);
    assert!(matches!(result, Err(SchedulerError::InvalidTrigger(_))));
}

#[test]
fn test_interval_rejects_sub_millisecond_period() {
    let result = Trigger::interval(Duration::from_micros(999));
    assert!(matches!(result, Err(SchedulerError::InvalidTrigger(_))));
    let result = Trigger::interval(Duration::from_nanos(1));
    assert!(matches!(result, Err(SchedulerError::InvalidTrigger(_))));

    let trigger = Trigger::interval(Duration::from_millis(1)).unwrap();
    let start = at(2024, 1, 1, 0, 0, 0);
    assert_eq!(
        trigger.first_fire(start),
        Some(start + chrono::Duration::milliseconds(1))
    );
}

#[test]
fn test_interval_first_fire_is_one_period_after_start() {
    let trigger = Trigger::interval(Duration::from_secs(3600)).unwrap();
    let start = at(2024, 3, 1, 10, 0, 0);
    assert_eq!(trigger.first_fire(start), Some(at(2024, 3, 1, 11, 0, 0)));
}

#[test]
fn test_interval_stays_aligned_to_anchor() {
    let trigger = Trigger::interval(Duration::from_secs(300)).unwrap();
    let anchor = at(2024, 3, 1, 10, 0, 0);

    // Exactly on an occurrence: the next one is strictly later
    assert_eq!(
        trigger.next_after(at(2024, 3, 1, 10, 5, 0), anchor),
        Some(at(2024, 3, 1, 10, 10, 0))
    );
    // Between occurrences, several periods late
    assert_eq!(
        trigger.next_after(at(2024, 3, 1, 10, 22, 30), anchor),
        Some(at(2024, 3, 1, 10, 25, 0))
    );
}

#[test]
fn test_daily_calendar_fires_at_hour() {
    let trigger = Trigger::daily_at(9, 0).unwrap();

    let before = at(2024, 3, 1, 8, 59, 0);
    assert_eq!(trigger.first_fire(before), Some(at(2024, 3, 1, 9, 0, 0)));

    let after = at(2024, 3, 1, 9, 0, 1);
    assert_eq!(trigger.first_fire(after), Some(at(2024, 3, 2, 9, 0, 0)));
}

#[test]
fn test_weekly_calendar_fires_on_weekday() {
    let trigger = Trigger::weekly_at(Weekday::Sun, 2, 0).unwrap();
    // 2024-03-06 is a Wednesday
    let next = trigger.first_fire(at(2024, 3, 6, 12, 0, 0)).unwrap();
    assert_eq!(next.weekday(), Weekday::Sun);
    assert_eq!(next.hour(), 2);
    assert_eq!(next, at(2024, 3, 10, 2, 0, 0));
}

#[test]
fn test_calendar_rejects_out_of_range_time() {
    assert!(Trigger::daily_at(24, 0).is_err());
    assert!(Trigger::daily_at(12, 60).is_err());
}

#[test]
fn test_trigger_display() {
    let interval = Trigger::interval(Duration::from_secs(3600)).unwrap();
    assert_eq!(interval.to_string(), "interval[3600s]");

    let daily = Trigger::daily_at(9, 30).unwrap();
    assert_eq!(daily.to_string(), "calendar[daily 09:30 UTC]");

    let weekly = Trigger::weekly_at(Weekday::Sun, 2, 0).unwrap();
    assert_eq!(weekly.to_string(), "calendar[Sun 02:00 UTC]");
}
