//! Core scheduling abstractions: jobs, triggers, the engine and reconciliation.

pub mod engine;
pub mod error;
pub mod executor;
pub mod job;
pub mod reconcile;
pub mod schedule;
pub mod store;
pub mod trigger;
pub mod worker_pool;

pub use engine::{EngineStatus, JobRegistration, SchedulingEngine};
pub use error::{AppResult, SchedulerError};
pub use executor::{FireKind, FiringContext, JobExecutor, LoggingExecutor};
pub use job::{JobDefinition, JobId, JobKey, JobStatus, MisfirePolicy, TriggerKey};
pub use reconcile::{ReconciliationService, RepairLoopHandle, RepairReport};
pub use schedule::CronSchedule;
pub use store::JobStore;
pub use trigger::{EngineTrigger, TriggerInfo, TriggerState};
pub use worker_pool::{PoolError, PoolStats, WorkerPool};
