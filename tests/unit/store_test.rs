//! Tests for job store backends through the JobStore trait

use std::sync::Arc;

use prometheus_cron_jobs::core::{JobDefinition, JobKey, JobStatus, JobStore, SchedulerError};
use prometheus_cron_jobs::infra::{FileJobStore, InMemoryJobStore};
use tempfile::TempDir;

fn exercise_store(store: &dyn JobStore) {
    let report = store
        .save(JobDefinition::new("ReportJob", "default", "0 0 * * * ?"))
        .unwrap();
    let cleanup = store
        .save(JobDefinition::new("CleanupJob", "ops", "0 0 3 * * ?"))
        .unwrap();
    assert!(cleanup.id > report.id);

    let key = JobKey::new("ReportJob", "default");
    assert_eq!(store.find_by_name_and_group(&key).unwrap(), Some(report.clone()));
    assert_eq!(store.find_by_id(cleanup.id.unwrap()).unwrap(), Some(cleanup.clone()));
    assert_eq!(store.find_by_id(999).unwrap(), None);

    // Same name in another group is a different key.
    store
        .save(JobDefinition::new("ReportJob", "reports", "0 0 * * * ?"))
        .unwrap();
    let err = store
        .save(JobDefinition::new("ReportJob", "default", "0 0 * * * ?"))
        .unwrap_err();
    assert!(matches!(err, SchedulerError::DuplicateJob(_)));

    // Renaming onto a taken key is rejected too.
    let mut renamed = cleanup.clone();
    renamed.job_name = "ReportJob".into();
    renamed.job_group = "default".into();
    assert!(matches!(store.save(renamed), Err(SchedulerError::DuplicateJob(_))));

    let mut paused = report.clone();
    paused.status = Some(JobStatus::Paused);
    store.save(paused).unwrap();
    assert!(store.find_by_name_and_group(&key).unwrap().unwrap().is_paused());

    store.delete(&report).unwrap();
    store.delete(&report).unwrap();
    assert_eq!(store.find_all().unwrap().len(), 2);
}

#[test]
fn test_in_memory_store_contract() {
    exercise_store(&InMemoryJobStore::new());
}

#[test]
fn test_file_store_contract() {
    let dir = TempDir::new().unwrap();
    let store = FileJobStore::open(dir.path().join("jobs.jsonl")).unwrap();
    exercise_store(&store);
    assert_eq!(store.path(), dir.path().join("jobs.jsonl"));
}

#[test]
fn test_file_store_rejects_corrupt_snapshot() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("jobs.jsonl");
    std::fs::write(&path, "{\"jobName\": \n").unwrap();

    let err = FileJobStore::open(&path).err().unwrap();
    assert!(matches!(err, SchedulerError::Backend(_)));
}

#[test]
fn test_store_shared_across_threads() {
    let store: Arc<dyn JobStore> = Arc::new(InMemoryJobStore::new());
    let handles: Vec<_> = (0..8)
        .map(|i| {
            let store = Arc::clone(&store);
            std::thread::spawn(move || {
                store
                    .save(JobDefinition::new(format!("Job{i}"), "default", "0 0 * * * ?"))
                    .unwrap()
            })
        })
        .collect();
    for handle in handles {
        handle.join().unwrap();
    }

    let mut ids: Vec<_> = store
        .find_all()
        .unwrap()
        .into_iter()
        .filter_map(|job| job.id)
        .collect();
    ids.dedup();
    assert_eq!(ids, (1..=8).collect::<Vec<_>>());
}
