//! Tests for builder modules

use std::sync::Arc;
use std::time::Duration;

use prometheus_cron_jobs::builders::{build_service, build_service_with_store, build_store};
use prometheus_cron_jobs::config::{EngineConfig, ServiceConfig, StoreBackendConfig};
use prometheus_cron_jobs::core::{
    EngineStatus, JobDefinition, JobKey, JobStatus, JobStore, LoggingExecutor, SchedulerError,
};
use prometheus_cron_jobs::infra::InMemoryJobStore;
use tempfile::TempDir;

fn small_config() -> ServiceConfig {
    ServiceConfig {
        engine: EngineConfig::new().with_worker_count(1),
        ..ServiceConfig::default()
    }
}

#[test]
fn test_build_in_memory_store() {
    let store = build_store(&StoreBackendConfig::InMemory).unwrap();
    assert!(store.find_all().unwrap().is_empty());
}

#[test]
fn test_build_file_store() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("data").join("jobs.jsonl");
    let store = build_store(&StoreBackendConfig::File { path: path.clone() }).unwrap();
    store
        .save(JobDefinition::new("ReportJob", "default", "0 0 * * * ?"))
        .unwrap();
    assert!(path.exists());
}

#[test]
fn test_build_service_starts_engine() {
    let handle = build_service(&small_config(), LoggingExecutor).unwrap();
    assert_eq!(handle.service().engine().status(), EngineStatus::Started);
    assert!(handle.startup_report().is_clean());
    assert!(!handle.has_repair_loop());

    let engine = Arc::clone(handle.service().engine());
    assert!(handle.shutdown());
    assert_eq!(engine.status(), EngineStatus::ShutDown);
}

#[test]
fn test_build_service_reconciles_existing_store() {
    let store = Arc::new(InMemoryJobStore::new());
    store
        .save(JobDefinition::new("ReportJob", "default", "0 0 * * * ?").with_status(JobStatus::Paused))
        .unwrap();

    let handle = build_service_with_store(&small_config(), store, LoggingExecutor).unwrap();
    let key = JobKey::new("ReportJob", "default");
    assert_eq!(handle.startup_report().registered, vec![key.clone()]);
    assert!(handle.service().engine().is_job_paused(&key));
    handle.shutdown();
}

#[test]
fn test_build_service_with_repair_loop() {
    let config = ServiceConfig {
        repair_interval_secs: Some(3600),
        ..small_config()
    };
    let handle = build_service(&config, LoggingExecutor).unwrap();
    assert!(handle.has_repair_loop());
    // Stopping must not wait for the interval to elapse.
    let start = std::time::Instant::now();
    assert!(handle.shutdown());
    assert!(start.elapsed() < Duration::from_secs(10));
}

#[test]
fn test_build_service_rejects_invalid_config() {
    let config = ServiceConfig {
        engine: EngineConfig::new().with_worker_count(0),
        ..ServiceConfig::default()
    };
    let err = build_service(&config, LoggingExecutor).err().unwrap();
    assert!(matches!(err, SchedulerError::InvalidConfig(_)));
}
