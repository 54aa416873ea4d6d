//! Persistence boundary for job definitions.

use crate::core::error::SchedulerError;
use crate::core::job::{JobDefinition, JobId, JobKey};

/// Abstraction for job definition storage.
///
/// Implementations enforce the unique `(job_name, job_group)` constraint and
/// manage `id`, `created_at`, and `updated_at`. Calls are blocking.
pub trait JobStore: Send + Sync {
    /// All stored definitions, ordered by id.
    fn find_all(&self) -> Result<Vec<JobDefinition>, SchedulerError>;

    /// Lookup by compound key.
    fn find_by_name_and_group(&self, key: &JobKey) -> Result<Option<JobDefinition>, SchedulerError>;

    /// Lookup by surrogate id.
    fn find_by_id(&self, id: JobId) -> Result<Option<JobDefinition>, SchedulerError>;

    /// Insert (no id) or overwrite (with id) a definition and return the
    /// stored form.
    ///
    /// Fails with `DuplicateJob` if another definition owns the key and with
    /// `NotFound` if an id is given that does not exist.
    fn save(&self, job: JobDefinition) -> Result<JobDefinition, SchedulerError>;

    /// Remove a definition; removing an absent one is a no-op.
    fn delete(&self, job: &JobDefinition) -> Result<(), SchedulerError>;
}
