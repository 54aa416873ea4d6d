//! API-facing request/response models.

use serde::{Deserialize, Serialize};

use crate::core::{
    EngineStatus, JobDefinition, JobExecutor, JobId, JobKey, JobStatus, ReconciliationService,
    SchedulerError,
};

/// Create/update request body.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct JobRequest {
    /// Required for update, ignored on create.
    #[serde(default)]
    pub id: Option<JobId>,
    /// Job name.
    pub job_name: String,
    /// Job group.
    pub job_group: String,
    /// Description.
    #[serde(default)]
    pub description: String,
    /// Cron expression.
    pub cron_expression: String,
    /// Desired status on create; defaults to RUNNING.
    #[serde(default)]
    pub status: Option<JobStatus>,
    /// Skip overlapping firings.
    #[serde(default)]
    pub exclusive: bool,
}

impl From<JobRequest> for JobDefinition {
    fn from(req: JobRequest) -> Self {
        Self {
            id: req.id,
            job_name: req.job_name,
            job_group: req.job_group,
            description: req.description,
            cron_expression: req.cron_expression,
            status: req.status,
            exclusive: req.exclusive,
            created_at: None,
            updated_at: None,
        }
    }
}

/// Key parameters of run/delete/pause/resume requests.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct JobKeyParams {
    /// Job name.
    pub job_name: String,
    /// Job group.
    pub job_group: String,
}

impl JobKeyParams {
    /// The job key addressed by these parameters.
    #[must_use]
    pub fn key(&self) -> JobKey {
        JobKey::new(self.job_name.clone(), self.job_group.clone())
    }
}

/// Error response body.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorBody {
    /// HTTP-style status code.
    pub status: u16,
    /// Stable error kind.
    pub error: String,
    /// Human-readable message.
    pub message: String,
}

impl From<&SchedulerError> for ErrorBody {
    fn from(err: &SchedulerError) -> Self {
        Self {
            status: err.status_code(),
            error: err.kind().to_string(),
            message: err.to_string(),
        }
    }
}

impl SchedulerError {
    /// HTTP-style status code for transports.
    #[must_use]
    pub const fn status_code(&self) -> u16 {
        match self {
            Self::DuplicateJob(_) | Self::InvalidSchedule { .. } | Self::InvalidConfig(_) => 400,
            Self::NotFound(_) | Self::NotRegistered(_) => 404,
            Self::EngineUnavailable(_) | Self::QueueFull(_) => 503,
            Self::Backend(_) => 500,
        }
    }

    /// Stable snake_case name of the error kind.
    #[must_use]
    pub const fn kind(&self) -> &'static str {
        match self {
            Self::DuplicateJob(_) => "duplicate_job",
            Self::NotFound(_) => "not_found",
            Self::InvalidSchedule { .. } => "invalid_schedule",
            Self::EngineUnavailable(_) => "engine_unavailable",
            Self::NotRegistered(_) => "not_registered",
            Self::QueueFull(_) => "queue_full",
            Self::Backend(_) => "backend",
            Self::InvalidConfig(_) => "invalid_config",
        }
    }
}

/// Health response.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Health {
    /// Engine started and store readable.
    pub ok: bool,
    /// Engine lifecycle state.
    pub engine_status: EngineStatus,
    /// Stored job definitions; zero if the store is unreadable.
    pub job_count: usize,
}

/// Return a health payload.
pub fn health<E>(service: &ReconciliationService<E>) -> Health
where
    E: JobExecutor,
{
    let engine_status = service.engine().status();
    let stored = service.list_jobs();
    Health {
        ok: engine_status == EngineStatus::Started && stored.is_ok(),
        engine_status,
        job_count: stored.map_or(0, |jobs| jobs.len()),
    }
}
