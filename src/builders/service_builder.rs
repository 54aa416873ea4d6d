//! Builders to construct the reconciliation service from configuration.

use std::sync::Arc;

use tracing::info;

use crate::config::{ServiceConfig, StoreBackendConfig};
use crate::core::{
    JobExecutor, JobStore, ReconciliationService, RepairLoopHandle, RepairReport, SchedulerError,
    SchedulingEngine,
};
use crate::infra::store::{FileJobStore, InMemoryJobStore};

/// Build the configured job store backend.
///
/// # Errors
///
/// Returns `SchedulerError::Backend` if a file store cannot be opened.
pub fn build_store(cfg: &StoreBackendConfig) -> Result<Arc<dyn JobStore>, SchedulerError> {
    match cfg {
        StoreBackendConfig::InMemory => Ok(Arc::new(InMemoryJobStore::new())),
        StoreBackendConfig::File { path } => Ok(Arc::new(FileJobStore::open(path)?)),
    }
}

/// A started service together with its optional repair loop.
///
/// Dropping the handle stops the repair loop and signals the engine to shut
/// down without waiting; [`ServiceHandle::shutdown`] waits for in-flight
/// firings.
pub struct ServiceHandle<E>
where
    E: JobExecutor,
{
    service: Arc<ReconciliationService<E>>,
    startup: RepairReport,
    repair_loop: Option<RepairLoopHandle>,
}

impl<E> ServiceHandle<E>
where
    E: JobExecutor,
{
    /// The reconciliation service.
    #[must_use]
    pub const fn service(&self) -> &Arc<ReconciliationService<E>> {
        &self.service
    }

    /// What startup reconciliation registered.
    #[must_use]
    pub const fn startup_report(&self) -> &RepairReport {
        &self.startup
    }

    /// Whether a background repair loop is running.
    #[must_use]
    pub fn has_repair_loop(&self) -> bool {
        self.repair_loop.as_ref().is_some_and(RepairLoopHandle::is_running)
    }

    /// Stop the repair loop, then shut the engine down with a bounded drain.
    /// Returns `true` if all in-flight firings finished in time.
    pub fn shutdown(mut self) -> bool {
        if let Some(repair_loop) = self.repair_loop.take() {
            repair_loop.stop();
        }
        self.service.engine().shutdown()
    }
}

/// Build a started service: store from config, engine, startup
/// reconciliation, and the repair loop if an interval is configured.
///
/// # Errors
///
/// Configuration, store, engine, or reconciliation failures.
pub fn build_service<E>(cfg: &ServiceConfig, executor: E) -> Result<ServiceHandle<E>, SchedulerError>
where
    E: JobExecutor,
{
    cfg.validate().map_err(SchedulerError::InvalidConfig)?;
    let store = build_store(&cfg.store)?;
    build_service_with_store(cfg, store, executor)
}

/// Like [`build_service`], with a caller-supplied store.
///
/// # Errors
///
/// Configuration, engine, or reconciliation failures.
pub fn build_service_with_store<E>(
    cfg: &ServiceConfig,
    store: Arc<dyn JobStore>,
    executor: E,
) -> Result<ServiceHandle<E>, SchedulerError>
where
    E: JobExecutor,
{
    cfg.validate().map_err(SchedulerError::InvalidConfig)?;

    let engine = SchedulingEngine::new(cfg.engine.clone(), executor)?;
    engine.start()?;
    let service = Arc::new(ReconciliationService::new(Arc::new(engine), store, cfg.update_rule));
    let startup = service.initialize()?;

    let repair_loop = cfg
        .repair_interval()
        .map(|interval| service.spawn_repair_loop(interval))
        .transpose()?;

    info!(
        update_rule = ?cfg.update_rule,
        repair_loop = repair_loop.is_some(),
        "Cron job service ready"
    );
    Ok(ServiceHandle {
        service,
        startup,
        repair_loop,
    })
}
