//! Job execution trait and firing context.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::error::AppResult;
use super::job::JobKey;

/// Why a firing happened.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FireKind {
    /// The trigger matured on schedule.
    Scheduled,
    /// Requested through `fire_now`.
    Manual,
    /// Catch-up firing after a missed window (`FireAndProceed`).
    MisfireRecovery,
}

/// Context handed to the executor for one firing.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FiringContext {
    /// Unique id of this firing.
    pub fire_instance_id: Uuid,
    /// Job being fired.
    pub job_key: JobKey,
    /// Job description registered with the engine.
    pub description: String,
    /// When the firing was dispatched.
    pub fired_at: DateTime<Utc>,
    /// Occurrence this firing stands for; `None` for manual firings.
    pub scheduled_fire_time: Option<DateTime<Utc>>,
    /// What caused the firing.
    pub kind: FireKind,
}

impl FiringContext {
    /// Build a context stamped with a fresh id and the current time.
    #[must_use]
    pub fn new(
        job_key: JobKey,
        description: impl Into<String>,
        scheduled_fire_time: Option<DateTime<Utc>>,
        kind: FireKind,
    ) -> Self {
        Self {
            fire_instance_id: Uuid::new_v4(),
            job_key,
            description: description.into(),
            fired_at: Utc::now(),
            scheduled_fire_time,
            kind,
        }
    }
}

/// The unit of work invoked when a job fires.
///
/// The engine calls this from a dedicated worker thread with its own
/// single-threaded tokio runtime, so blocking or CPU-heavy work does not stall
/// the caller's runtime. Errors and panics are logged by the worker pool and
/// never change the job's persisted status.
///
/// # Example
///
/// ```rust,ignore
/// use async_trait::async_trait;
/// use prometheus_cron_jobs::core::{AppResult, FiringContext, JobExecutor};
///
/// #[derive(Clone)]
/// struct ReportExecutor;
///
/// #[async_trait]
/// impl JobExecutor for ReportExecutor {
///     async fn execute(&self, ctx: FiringContext) -> AppResult<()> {
///         println!("building report for {}", ctx.job_key);
///         Ok(())
///     }
/// }
/// ```
#[async_trait]
pub trait JobExecutor: Send + Sync + Clone + 'static {
    /// Run one firing of a job.
    async fn execute(&self, ctx: FiringContext) -> AppResult<()>;
}

/// Default executor that only records the firing in the log.
#[derive(Debug, Clone, Copy, Default)]
pub struct LoggingExecutor;

#[async_trait]
impl JobExecutor for LoggingExecutor {
    async fn execute(&self, ctx: FiringContext) -> AppResult<()> {
        tracing::info!(
            job = %ctx.job_key,
            description = %ctx.description,
            fired_at = %ctx.fired_at,
            kind = ?ctx.kind,
            "job fired"
        );
        Ok(())
    }
}
