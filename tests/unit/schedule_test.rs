//! Tests for cron schedule parsing

use chrono::{TimeZone, Utc};
use prometheus_cron_jobs::core::{CronSchedule, SchedulerError};

#[test]
fn test_quartz_expression_next_fire() {
    let schedule = CronSchedule::parse("0 0 * * * ?").unwrap();
    let after = Utc.with_ymd_and_hms(2024, 5, 1, 10, 15, 0).unwrap();
    assert_eq!(
        schedule.next_after(&after),
        Some(Utc.with_ymd_and_hms(2024, 5, 1, 11, 0, 0).unwrap())
    );
}

#[test]
fn test_unix_expression_is_widened() {
    let schedule = CronSchedule::parse("30 2 * * *").unwrap();
    let after = Utc.with_ymd_and_hms(2024, 5, 1, 10, 0, 0).unwrap();
    assert_eq!(
        schedule.next_after(&after),
        Some(Utc.with_ymd_and_hms(2024, 5, 2, 2, 30, 0).unwrap())
    );
    assert_eq!(schedule.expression(), "30 2 * * *");
}

#[test]
fn test_expression_is_trimmed() {
    let schedule: CronSchedule = "  0 0 3 * * ?  ".parse().unwrap();
    assert_eq!(schedule.expression(), "0 0 3 * * ?");
}

#[test]
fn test_invalid_expressions() {
    for bad in ["", "   ", "every day", "0 0 25 * * ?", "* * *"] {
        let err = CronSchedule::validate(bad).unwrap_err();
        assert!(
            matches!(err, SchedulerError::InvalidSchedule { .. }),
            "expected InvalidSchedule for {bad:?}"
        );
    }
}

#[test]
fn test_schedule_with_year_ends() {
    let schedule = CronSchedule::parse("0 0 12 1 5 ? 2024").unwrap();
    let after = Utc.with_ymd_and_hms(2024, 5, 1, 12, 0, 0).unwrap();
    assert_eq!(schedule.next_after(&after), None);
}
