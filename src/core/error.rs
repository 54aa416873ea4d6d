//! Error types for scheduler operations.

use thiserror::Error;

use crate::core::job::JobKey;

/// Errors produced by scheduler components.
#[derive(Debug, Error)]
pub enum SchedulerError {
    /// A job with the same (name, group) is already persisted.
    #[error("job already exists: {0}")]
    DuplicateJob(JobKey),
    /// The referenced job definition does not exist.
    #[error("job not found: {0}")]
    NotFound(String),
    /// The cron expression could not be parsed.
    #[error("invalid cron expression `{expression}`: {reason}")]
    InvalidSchedule {
        /// Expression as supplied by the caller.
        expression: String,
        /// Parser diagnostic.
        reason: String,
    },
    /// The engine is not started or has already been shut down.
    #[error("scheduling engine unavailable: {0}")]
    EngineUnavailable(String),
    /// The job key is not registered in the engine.
    #[error("job not registered in engine: {0}")]
    NotRegistered(JobKey),
    /// The worker pool queue cannot accept another firing.
    #[error("queue full: {0}")]
    QueueFull(String),
    /// Backend-specific failure with context.
    #[error("backend error: {0}")]
    Backend(String),
    /// Configuration validation failed.
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),
}

/// Application-facing result using anyhow for higher-level contexts.
pub type AppResult<T> = Result<T, anyhow::Error>;
