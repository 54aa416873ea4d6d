//! Tests for transport-facing API models

use std::sync::Arc;

use prometheus_cron_jobs::config::{EngineConfig, UpdateStatusRule};
use prometheus_cron_jobs::core::{
    EngineStatus, JobDefinition, JobKey, JobStatus, LoggingExecutor, ReconciliationService,
    SchedulerError, SchedulingEngine,
};
use prometheus_cron_jobs::infra::InMemoryJobStore;
use prometheus_cron_jobs::runtime::{health, ErrorBody, JobKeyParams, JobRequest};

fn key() -> JobKey {
    JobKey::new("ReportJob", "default")
}

#[test]
fn test_status_codes() {
    let cases = [
        (SchedulerError::DuplicateJob(key()), 400),
        (
            SchedulerError::InvalidSchedule {
                expression: "x".into(),
                reason: "y".into(),
            },
            400,
        ),
        (SchedulerError::InvalidConfig("worker_count".into()), 400),
        (SchedulerError::NotFound("job id 1".into()), 404),
        (SchedulerError::NotRegistered(key()), 404),
        (SchedulerError::EngineUnavailable("not started".into()), 503),
        (SchedulerError::QueueFull("worker pool".into()), 503),
        (SchedulerError::Backend("disk".into()), 500),
    ];
    for (err, code) in cases {
        assert_eq!(err.status_code(), code, "{err}");
    }
}

#[test]
fn test_error_body_serializes() {
    let body = ErrorBody::from(&SchedulerError::NotFound("job id 3".into()));
    let json = serde_json::to_value(&body).unwrap();
    assert_eq!(json["status"], 404);
    assert_eq!(json["error"], "not_found");
    assert_eq!(json["message"], "job not found: job id 3");
}

#[test]
fn test_job_request_with_status_and_id() {
    let req: JobRequest = serde_json::from_str(
        r#"{"id":7,"jobName":"ReportJob","jobGroup":"default","cronExpression":"0 0 * * * ?","status":"PAUSED","exclusive":true}"#,
    )
    .unwrap();
    let job = JobDefinition::from(req);
    assert_eq!(job.id, Some(7));
    assert_eq!(job.status, Some(JobStatus::Paused));
    assert!(job.exclusive);
    assert_eq!(job.description, "");
}

#[test]
fn test_job_key_params() {
    let params: JobKeyParams =
        serde_json::from_str(r#"{"jobName":"ReportJob","jobGroup":"default"}"#).unwrap();
    assert_eq!(params.key(), key());
}

#[test]
fn test_health_follows_engine_lifecycle() {
    let engine = SchedulingEngine::new(EngineConfig::new().with_worker_count(1), LoggingExecutor).unwrap();
    let service = ReconciliationService::new(
        Arc::new(engine),
        Arc::new(InMemoryJobStore::new()),
        UpdateStatusRule::ForcePause,
    );

    let standby = health(&service);
    assert!(!standby.ok);
    assert_eq!(standby.engine_status, EngineStatus::Standby);

    service.engine().start().unwrap();
    service
        .create_job(JobDefinition::new("ReportJob", "default", "0 0 * * * ?"))
        .unwrap();
    let started = health(&service);
    assert!(started.ok);
    assert_eq!(started.job_count, 1);

    service.engine().shutdown();
    let stopped = health(&service);
    assert!(!stopped.ok);
    assert_eq!(stopped.engine_status, EngineStatus::ShutDown);
}
