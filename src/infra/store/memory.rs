//! In-memory job store.

use std::collections::BTreeMap;

use chrono::Utc;
use parking_lot::RwLock;

use crate::core::error::SchedulerError;
use crate::core::job::{JobDefinition, JobId, JobKey};
use crate::core::store::JobStore;

/// Id-ordered table of definitions with the unique-key constraint.
///
/// Shared by the in-memory and file backends.
#[derive(Debug, Default, Clone)]
pub(crate) struct JobTable {
    rows: BTreeMap<JobId, JobDefinition>,
    next_id: JobId,
}

impl JobTable {
    /// Rebuild a table from persisted rows. `high_water` is the largest id
    /// ever handed out, so ids of deleted rows are not reused.
    pub(crate) fn from_rows(
        rows: impl IntoIterator<Item = JobDefinition>,
        high_water: JobId,
    ) -> Result<Self, SchedulerError> {
        let mut table = Self {
            rows: BTreeMap::new(),
            next_id: high_water,
        };
        for row in rows {
            let id = row
                .id
                .ok_or_else(|| SchedulerError::Backend(format!("stored job {} has no id", row.key())))?;
            if table.find_by_key(&row.key()).is_some() {
                return Err(SchedulerError::DuplicateJob(row.key()));
            }
            table.next_id = table.next_id.max(id);
            table.rows.insert(id, row);
        }
        Ok(table)
    }

    pub(crate) const fn high_water(&self) -> JobId {
        self.next_id
    }

    pub(crate) fn rows(&self) -> impl Iterator<Item = &JobDefinition> {
        self.rows.values()
    }

    pub(crate) fn find_by_key(&self, key: &JobKey) -> Option<&JobDefinition> {
        self.rows
            .values()
            .find(|row| row.job_name == key.name && row.job_group == key.group)
    }

    pub(crate) fn find_by_id(&self, id: JobId) -> Option<&JobDefinition> {
        self.rows.get(&id)
    }

    pub(crate) fn upsert(&mut self, mut job: JobDefinition) -> Result<JobDefinition, SchedulerError> {
        let key = job.key();
        if let Some(owner) = self.find_by_key(&key) {
            if owner.id != job.id {
                return Err(SchedulerError::DuplicateJob(key));
            }
        }

        let now = Utc::now();
        if let Some(id) = job.id {
            let existing = self
                .rows
                .get(&id)
                .ok_or_else(|| SchedulerError::NotFound(format!("job id {id}")))?;
            job.created_at = existing.created_at.or(Some(now));
        } else {
            self.next_id += 1;
            job.id = Some(self.next_id);
            job.created_at = Some(now);
        }
        job.updated_at = Some(now);

        if let Some(id) = job.id {
            self.rows.insert(id, job.clone());
        }
        Ok(job)
    }

    pub(crate) fn remove(&mut self, job: &JobDefinition) -> bool {
        match job.id {
            Some(id) => self.rows.remove(&id).is_some(),
            None => {
                let id = self.find_by_key(&job.key()).and_then(|row| row.id);
                id.is_some_and(|id| self.rows.remove(&id).is_some())
            }
        }
    }
}

/// In-memory job store for development and testing.
#[derive(Debug, Default)]
pub struct InMemoryJobStore {
    table: RwLock<JobTable>,
}

impl InMemoryJobStore {
    /// Create an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of stored definitions.
    #[must_use]
    pub fn len(&self) -> usize {
        self.table.read().rows.len()
    }

    /// Whether the store is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl JobStore for InMemoryJobStore {
    fn find_all(&self) -> Result<Vec<JobDefinition>, SchedulerError> {
        Ok(self.table.read().rows().cloned().collect())
    }

    fn find_by_name_and_group(&self, key: &JobKey) -> Result<Option<JobDefinition>, SchedulerError> {
        Ok(self.table.read().find_by_key(key).cloned())
    }

    fn find_by_id(&self, id: JobId) -> Result<Option<JobDefinition>, SchedulerError> {
        Ok(self.table.read().find_by_id(id).cloned())
    }

    fn save(&self, job: JobDefinition) -> Result<JobDefinition, SchedulerError> {
        self.table.write().upsert(job)
    }

    fn delete(&self, job: &JobDefinition) -> Result<(), SchedulerError> {
        self.table.write().remove(job);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::job::JobStatus;

    fn report_job() -> JobDefinition {
        JobDefinition::new("ReportJob", "default", "0 0 * * * ?").with_description("daily report")
    }

    #[test]
    fn test_save_assigns_ids_and_timestamps() {
        let store = InMemoryJobStore::new();
        let first = store.save(report_job()).unwrap();
        let second = store
            .save(JobDefinition::new("CleanupJob", "default", "0 0 3 * * ?"))
            .unwrap();

        assert_eq!(first.id, Some(1));
        assert_eq!(second.id, Some(2));
        assert!(first.created_at.is_some());
        assert_eq!(first.created_at, first.updated_at);
        assert_eq!(store.len(), 2);
    }

    #[test]
    fn test_unique_key_constraint() {
        let store = InMemoryJobStore::new();
        store.save(report_job()).unwrap();

        let err = store.save(report_job()).unwrap_err();
        assert!(matches!(err, SchedulerError::DuplicateJob(_)));
        assert_eq!(store.len(), 1);
    }

    #[test]
    fn test_update_keeps_created_at() {
        let store = InMemoryJobStore::new();
        let saved = store.save(report_job()).unwrap();

        let mut changed = saved.clone();
        changed.status = Some(JobStatus::Paused);
        let updated = store.save(changed).unwrap();

        assert_eq!(updated.id, saved.id);
        assert_eq!(updated.created_at, saved.created_at);
        assert!(updated.updated_at >= saved.updated_at);
        assert_eq!(
            store.find_by_id(1).unwrap().unwrap().status,
            Some(JobStatus::Paused)
        );
    }

    #[test]
    fn test_save_unknown_id() {
        let store = InMemoryJobStore::new();
        let err = store.save(report_job().with_id(42)).unwrap_err();
        assert!(matches!(err, SchedulerError::NotFound(_)));
    }

    #[test]
    fn test_delete_is_idempotent() {
        let store = InMemoryJobStore::new();
        let saved = store.save(report_job()).unwrap();
        store.delete(&saved).unwrap();
        store.delete(&saved).unwrap();
        assert!(store.is_empty());
        assert!(store
            .find_by_name_and_group(&JobKey::new("ReportJob", "default"))
            .unwrap()
            .is_none());
    }
}
