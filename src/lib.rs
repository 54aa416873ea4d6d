//! # Prometheus Cron Jobs
//!
//! Cron job scheduling with persisted job definitions kept in step with a live,
//! in-process scheduling engine.
//!
//! Clients submit job definitions (name, group, cron expression, description,
//! desired run/pause state). The crate persists them through a [`JobStore`]
//! and keeps a [`SchedulingEngine`] synchronized so that jobs fire according to
//! their cron expressions on a bounded worker pool.
//!
//! ## Key Features
//!
//! - **Reconciliation**: create, update, delete, pause, resume and manual runs
//!   drive the store and the engine together; startup registers every stored
//!   job the engine does not know yet
//! - **Misfire Handling**: per-operation choice between skipping a missed
//!   firing and firing once on recovery
//! - **Repair Pass**: on-demand or periodic diff of store against engine
//! - **Worker Pool**: dedicated OS threads, bounded queue, bounded drain on
//!   shutdown, optional per-job exclusivity
//! - **Pluggable Executor**: any `JobExecutor` runs the actual work
//!
//! ## Example
//!
//! ```rust,ignore
//! use std::sync::Arc;
//! use prometheus_cron_jobs::config::{EngineConfig, UpdateStatusRule};
//! use prometheus_cron_jobs::core::{
//!     JobDefinition, JobKey, LoggingExecutor, ReconciliationService, SchedulingEngine,
//! };
//! use prometheus_cron_jobs::infra::InMemoryJobStore;
//!
//! let engine = SchedulingEngine::new(EngineConfig::new(), LoggingExecutor)?;
//! engine.start()?;
//! let service = ReconciliationService::new(
//!     Arc::new(engine),
//!     Arc::new(InMemoryJobStore::new()),
//!     UpdateStatusRule::ForcePause,
//! );
//! service.initialize()?;
//!
//! service.create_job(
//!     JobDefinition::new("ReportJob", "default", "0 0 * * * ?").with_description("daily report"),
//! )?;
//! service.pause_job(&JobKey::new("ReportJob", "default"))?;
//! ```
//!
//! With configuration from the environment, use
//! [`builders::build_service`] instead.
//!
//! [`JobStore`]: core::JobStore
//! [`SchedulingEngine`]: core::SchedulingEngine

#![deny(warnings)]
#![deny(missing_docs)]
#![deny(unsafe_code)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![warn(clippy::nursery)]

/// Core scheduling abstractions: jobs, triggers, the engine and reconciliation.
pub mod core;
/// Configuration models for the engine, store backends and service.
pub mod config;
/// Builders to construct services from configuration.
pub mod builders;
/// Infrastructure adapters for job storage.
pub mod infra;
/// Transport-facing API surface.
pub mod runtime;
/// Shared utilities.
pub mod util;
