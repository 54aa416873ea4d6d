//! Fixed-size worker pool executing job firings on dedicated threads.
//!
//! Each worker is an OS thread with its own single-threaded tokio runtime, so
//! executor work never blocks the engine's timer thread or the caller's
//! runtime. Firings are handed over through a bounded channel; a full channel
//! rejects the firing instead of spawning more work.

mod native;

use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};

use crate::core::error::SchedulerError;
use crate::core::executor::FiringContext;

pub use native::WorkerPool;

/// Errors that can occur when using a `WorkerPool`.
#[derive(Debug)]
pub enum PoolError {
    /// The firing queue is full; no more firings can be accepted.
    QueueFull,

    /// The pool has been shut down.
    PoolShutdown,

    /// Configuration validation failed.
    InvalidConfig(String),

    /// Internal error (thread spawn failure, runtime construction, etc.).
    Internal(String),
}

impl fmt::Display for PoolError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::QueueFull => write!(f, "firing queue is full"),
            Self::PoolShutdown => write!(f, "pool has been shut down"),
            Self::InvalidConfig(msg) => write!(f, "invalid configuration: {msg}"),
            Self::Internal(msg) => write!(f, "internal error: {msg}"),
        }
    }
}

impl std::error::Error for PoolError {}

impl From<PoolError> for SchedulerError {
    fn from(err: PoolError) -> Self {
        match err {
            PoolError::QueueFull => Self::QueueFull("worker pool".into()),
            PoolError::PoolShutdown => Self::EngineUnavailable("worker pool shut down".into()),
            PoolError::InvalidConfig(msg) => Self::InvalidConfig(msg),
            PoolError::Internal(msg) => Self::Backend(msg),
        }
    }
}

/// Statistics about pool utilization.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PoolStats {
    /// Number of worker threads.
    pub worker_count: usize,

    /// Firings currently executing.
    pub active_firings: u64,

    /// Firings waiting for a worker.
    pub queued_firings: u64,

    /// Firings whose executor returned `Ok`.
    pub completed_firings: u64,

    /// Firings whose executor returned an error or panicked.
    pub failed_firings: u64,

    /// Firings skipped because an exclusive job was already executing.
    pub skipped_firings: u64,

    /// Total firings accepted by the pool.
    pub submitted_firings: u64,
}

/// Internal counters for pool statistics (thread-safe).
#[derive(Debug, Default)]
pub(crate) struct PoolCounters {
    pub active_firings: AtomicU64,
    pub queued_firings: AtomicU64,
    pub completed_firings: AtomicU64,
    pub failed_firings: AtomicU64,
    pub skipped_firings: AtomicU64,
    pub submitted_firings: AtomicU64,
}

impl PoolCounters {
    /// Get a snapshot of current statistics.
    pub fn snapshot(&self, worker_count: usize) -> PoolStats {
        PoolStats {
            worker_count,
            active_firings: self.active_firings.load(Ordering::Relaxed),
            queued_firings: self.queued_firings.load(Ordering::Relaxed),
            completed_firings: self.completed_firings.load(Ordering::Relaxed),
            failed_firings: self.failed_firings.load(Ordering::Relaxed),
            skipped_firings: self.skipped_firings.load(Ordering::Relaxed),
            submitted_firings: self.submitted_firings.load(Ordering::Relaxed),
        }
    }
}

/// A firing handed to the worker pool.
#[derive(Debug, Clone)]
pub(crate) struct Firing {
    /// Context passed to the executor.
    pub ctx: FiringContext,
    /// Skip this firing if the same job is already executing.
    pub exclusive: bool,
}
