//! Tests for utility functions

use std::time::Duration;

use prometheus_cron_jobs::util::{duration_until, init_tracing, now};

#[test]
fn test_duration_until_future_instant() {
    let from = now();
    let at = from + chrono::Duration::milliseconds(1500);
    assert_eq!(duration_until(at, from), Duration::from_millis(1500));
    assert_eq!(duration_until(from, at), Duration::ZERO);
}

#[test]
fn test_init_tracing_is_idempotent() {
    init_tracing();
    init_tracing();
    tracing::info!("tracing initialised twice without panicking");
}
