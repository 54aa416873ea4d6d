//! Cron expression parsing and next-fire computation.
//!
//! Expressions use the seconds-first layout
//! `sec min hour day-of-month month day-of-week [year]`. A `?` field means
//! "no specific value" and five-field Unix expressions are widened with a
//! leading `0` seconds field. All times are UTC.

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use cron::Schedule;

use crate::core::error::SchedulerError;

/// A parsed, validated cron schedule.
#[derive(Clone)]
pub struct CronSchedule {
    expression: String,
    schedule: Schedule,
}

impl CronSchedule {
    /// Parse and validate an expression.
    ///
    /// # Errors
    ///
    /// Returns `SchedulerError::InvalidSchedule` if the expression is empty or
    /// cannot be parsed.
    pub fn parse(expression: &str) -> Result<Self, SchedulerError> {
        let trimmed = expression.trim();
        if trimmed.is_empty() {
            return Err(SchedulerError::InvalidSchedule {
                expression: expression.to_string(),
                reason: "expression is empty".into(),
            });
        }

        let normalized = normalize(trimmed);
        let schedule =
            Schedule::from_str(&normalized).map_err(|e| SchedulerError::InvalidSchedule {
                expression: expression.to_string(),
                reason: e.to_string(),
            })?;

        Ok(Self {
            expression: trimmed.to_string(),
            schedule,
        })
    }

    /// Validate an expression without keeping the parsed form.
    ///
    /// # Errors
    ///
    /// Same as [`CronSchedule::parse`].
    pub fn validate(expression: &str) -> Result<(), SchedulerError> {
        Self::parse(expression).map(|_| ())
    }

    /// The expression as supplied (trimmed).
    #[must_use]
    pub fn expression(&self) -> &str {
        &self.expression
    }

    /// First occurrence strictly after `after`, if any.
    #[must_use]
    pub fn next_after(&self, after: &DateTime<Utc>) -> Option<DateTime<Utc>> {
        self.schedule.after(after).next()
    }
}

impl FromStr for CronSchedule {
    type Err = SchedulerError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl fmt::Debug for CronSchedule {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CronSchedule")
            .field("expression", &self.expression)
            .finish()
    }
}

impl PartialEq for CronSchedule {
    fn eq(&self, other: &Self) -> bool {
        self.expression == other.expression
    }
}

fn normalize(expression: &str) -> String {
    let fields: Vec<&str> = expression
        .split_whitespace()
        .map(|field| if field == "?" { "*" } else { field })
        .collect();

    if fields.len() == 5 {
        format!("0 {}", fields.join(" "))
    } else {
        fields.join(" ")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Timelike};

    #[test]
    fn test_quartz_style_expression() {
        let schedule = CronSchedule::parse("0 0 * * * ?").unwrap();
        let from = Utc.with_ymd_and_hms(2024, 5, 1, 10, 15, 0).unwrap();
        let next = schedule.next_after(&from).unwrap();
        assert_eq!(next, Utc.with_ymd_and_hms(2024, 5, 1, 11, 0, 0).unwrap());
    }

    #[test]
    fn test_five_field_expression_is_widened() {
        let schedule = CronSchedule::parse("*/15 * * * *").unwrap();
        let from = Utc.with_ymd_and_hms(2024, 5, 1, 10, 1, 30).unwrap();
        let next = schedule.next_after(&from).unwrap();
        assert_eq!(next.minute(), 15);
        assert_eq!(next.second(), 0);
    }

    #[test]
    fn test_invalid_expression() {
        let err = CronSchedule::parse("not a cron").unwrap_err();
        assert!(matches!(err, SchedulerError::InvalidSchedule { .. }));

        let err = CronSchedule::parse("   ").unwrap_err();
        assert!(matches!(err, SchedulerError::InvalidSchedule { .. }));
    }

    #[test]
    fn test_expression_is_trimmed() {
        let schedule = CronSchedule::parse("  0 0 * * * ?  ").unwrap();
        assert_eq!(schedule.expression(), "0 0 * * * ?");
    }
}
