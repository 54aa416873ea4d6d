//! Wall-clock helpers.

use std::time::Duration;

use chrono::{DateTime, Utc};

/// Current UTC time.
#[must_use]
pub fn now() -> DateTime<Utc> {
    Utc::now()
}

/// Time left from `from` until `at`; zero if `at` is not in the future.
#[must_use]
pub fn duration_until(at: DateTime<Utc>, from: DateTime<Utc>) -> Duration {
    (at - from).to_std().unwrap_or(Duration::ZERO)
}
