//! Tests for error types

use prometheus_cron_jobs::core::{JobKey, PoolError, SchedulerError};

#[test]
fn test_duplicate_job_error() {
    let err = SchedulerError::DuplicateJob(JobKey::new("ReportJob", "default"));
    assert_eq!(format!("{}", err), "job already exists: default.ReportJob");
}

#[test]
fn test_invalid_schedule_error() {
    let err = SchedulerError::InvalidSchedule {
        expression: "bogus".to_string(),
        reason: "invalid field".to_string(),
    };
    assert_eq!(format!("{}", err), "invalid cron expression `bogus`: invalid field");
}

#[test]
fn test_queue_full_error() {
    let err = SchedulerError::QueueFull("worker pool".to_string());
    assert_eq!(format!("{}", err), "queue full: worker pool");
}

#[test]
fn test_backend_error() {
    let err = SchedulerError::Backend("connection failed".to_string());
    assert_eq!(format!("{}", err), "backend error: connection failed");
}

#[test]
fn test_not_registered_error() {
    let err = SchedulerError::NotRegistered(JobKey::new("ReportJob", "reports"));
    assert_eq!(format!("{}", err), "job not registered in engine: reports.ReportJob");
}

#[test]
fn test_pool_error_conversion() {
    let err: SchedulerError = PoolError::Internal("spawn failed".into()).into();
    assert!(matches!(err, SchedulerError::Backend(ref msg) if msg == "spawn failed"));

    let err: SchedulerError = PoolError::InvalidConfig("worker_count".into()).into();
    assert!(matches!(err, SchedulerError::InvalidConfig(_)));
}

#[test]
fn test_error_into_anyhow() {
    let err: anyhow::Error = SchedulerError::NotFound("job id 7".into()).into();
    assert_eq!(err.to_string(), "job not found: job id 7");
    assert!(err.downcast_ref::<SchedulerError>().is_some());
}
