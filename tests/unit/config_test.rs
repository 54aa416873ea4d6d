//! Tests for configuration validation and loading

use std::collections::HashMap;
use std::path::PathBuf;
use std::time::Duration;

use prometheus_cron_jobs::config::{
    EngineConfig, ServiceConfig, StoreBackendConfig, UpdateStatusRule,
};

fn lookup(vars: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
    let map: HashMap<String, String> = vars
        .iter()
        .map(|(k, v)| ((*k).to_string(), (*v).to_string()))
        .collect();
    move |name| map.get(name).cloned()
}

#[test]
fn test_engine_config_defaults() {
    let config = EngineConfig::default();
    assert_eq!(config.worker_count, 10);
    assert_eq!(config.max_queue_depth, 256);
    assert_eq!(config.misfire_threshold_ms, 60_000);
    assert_eq!(config.shutdown_timeout(), Duration::from_secs(30));
    assert_eq!(config.misfire_threshold(), chrono::Duration::seconds(60));
    assert!(config.validate().is_ok());
}

#[test]
fn test_engine_config_invalid_worker_count() {
    let invalid = EngineConfig::new().with_worker_count(0);
    assert!(invalid.validate().is_err());
}

#[test]
fn test_engine_config_invalid_queue_depth() {
    let invalid = EngineConfig::new().with_max_queue_depth(0);
    assert!(invalid.validate().is_err());
}

#[test]
fn test_engine_config_invalid_stack_size() {
    let invalid = EngineConfig::new().with_thread_stack_size(1024);
    assert!(invalid.validate().is_err());
}

#[test]
fn test_service_config_from_json() {
    let json = r#"{
        "engine": {"worker_count": 4, "misfire_threshold_ms": 5000},
        "store": {"kind": "file", "path": "/var/lib/cron/jobs.jsonl"},
        "update_rule": "preserve_status",
        "repair_interval_secs": 30
    }"#;
    let config = ServiceConfig::from_json_str(json).unwrap();

    assert_eq!(config.engine.worker_count, 4);
    assert_eq!(config.engine.max_queue_depth, 256);
    assert_eq!(config.engine.misfire_threshold_ms, 5000);
    assert_eq!(
        config.store,
        StoreBackendConfig::File {
            path: PathBuf::from("/var/lib/cron/jobs.jsonl")
        }
    );
    assert_eq!(config.update_rule, UpdateStatusRule::PreserveStatus);
    assert_eq!(config.repair_interval(), Some(Duration::from_secs(30)));
}

#[test]
fn test_service_config_json_defaults() {
    let config = ServiceConfig::from_json_str("{}").unwrap();
    assert_eq!(config, ServiceConfig::default());
    assert_eq!(config.store, StoreBackendConfig::InMemory);
    assert_eq!(config.update_rule, UpdateStatusRule::ForcePause);
    assert_eq!(config.repair_interval(), None);
}

#[test]
fn test_service_config_rejects_zero_repair_interval() {
    assert!(ServiceConfig::from_json_str(r#"{"repair_interval_secs": 0}"#).is_err());
}

#[test]
fn test_service_config_rejects_bad_json() {
    let err = ServiceConfig::from_json_str("{not json").unwrap_err();
    assert!(err.starts_with("parse error"));
}

#[test]
fn test_service_config_from_lookup() {
    let config = ServiceConfig::from_lookup(lookup(&[
        ("CRON_JOBS_WORKER_COUNT", "3"),
        ("CRON_JOBS_MISFIRE_THRESHOLD_MS", "1500"),
        ("CRON_JOBS_STORE_PATH", "/tmp/jobs.jsonl"),
        ("CRON_JOBS_UPDATE_RULE", "preserve_status"),
        ("CRON_JOBS_REPAIR_INTERVAL_SECS", "60"),
    ]))
    .unwrap();

    assert_eq!(config.engine.worker_count, 3);
    assert_eq!(config.engine.misfire_threshold_ms, 1500);
    assert_eq!(
        config.store,
        StoreBackendConfig::File {
            path: PathBuf::from("/tmp/jobs.jsonl")
        }
    );
    assert_eq!(config.update_rule, UpdateStatusRule::PreserveStatus);
    assert_eq!(config.repair_interval_secs, Some(60));
}

#[test]
fn test_service_config_from_lookup_reports_bad_variable() {
    let err = ServiceConfig::from_lookup(lookup(&[("CRON_JOBS_WORKER_COUNT", "many")])).unwrap_err();
    assert!(err.contains("CRON_JOBS_WORKER_COUNT"));

    let err = ServiceConfig::from_lookup(lookup(&[("CRON_JOBS_UPDATE_RULE", "sometimes")])).unwrap_err();
    assert!(err.contains("CRON_JOBS_UPDATE_RULE"));
}

#[test]
fn test_service_config_from_empty_lookup() {
    let config = ServiceConfig::from_lookup(lookup(&[])).unwrap();
    assert_eq!(config, ServiceConfig::default());
}
