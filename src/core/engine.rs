//! In-process scheduling engine.
//!
//! The engine owns the registry of durable jobs and their cron triggers, a
//! timer thread, and the worker pool that runs firings. The timer thread sleeps
//! on a condition variable until the earliest next fire time or until the
//! registry changes, then hands due firings to the pool.
//!
//! Lifecycle: [`SchedulingEngine::new`] leaves the engine in standby, where
//! only reads are allowed. [`SchedulingEngine::start`] arms the timer.
//! [`SchedulingEngine::shutdown`] stops the timer and drains in-flight firings
//! for at most `shutdown_timeout_secs`.

use std::collections::HashMap;
use std::sync::Arc;
use std::thread::{self, JoinHandle};

use chrono::{DateTime, Utc};
use parking_lot::{Condvar, Mutex, MutexGuard};
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::config::EngineConfig;
use crate::core::error::SchedulerError;
use crate::core::executor::{FireKind, FiringContext, JobExecutor};
use crate::core::job::{JobDefinition, JobKey, MisfirePolicy, TriggerKey};
use crate::core::schedule::CronSchedule;
use crate::core::trigger::{DueAction, EngineTrigger, TriggerInfo, TriggerState};
use crate::core::worker_pool::{Firing, PoolStats, WorkerPool};
use crate::util::clock;

/// Lifecycle state of the engine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EngineStatus {
    /// Created; registry readable, nothing fires.
    Standby,
    /// Timer armed; triggers fire.
    Started,
    /// Stopped for good.
    ShutDown,
}

/// Everything needed to register a job and its cron trigger.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct JobRegistration {
    /// Job identity.
    pub key: JobKey,
    /// Description passed to the executor.
    pub description: String,
    /// Cron expression of the trigger.
    pub cron_expression: String,
    /// Misfire policy of the trigger.
    pub misfire_policy: MisfirePolicy,
    /// Skip overlapping firings of this job.
    pub exclusive: bool,
}

impl JobRegistration {
    /// Registration with an empty description.
    pub fn new(key: JobKey, cron_expression: impl Into<String>, misfire_policy: MisfirePolicy) -> Self {
        Self {
            key,
            description: String::new(),
            cron_expression: cron_expression.into(),
            misfire_policy,
            exclusive: false,
        }
    }

    /// Registration mirroring a stored definition.
    #[must_use]
    pub fn from_definition(job: &JobDefinition, misfire_policy: MisfirePolicy) -> Self {
        Self {
            key: job.key(),
            description: job.description.clone(),
            cron_expression: job.cron_expression.clone(),
            misfire_policy,
            exclusive: job.exclusive,
        }
    }

    /// Set the description.
    #[must_use]
    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }

    /// Set the exclusivity flag.
    #[must_use]
    pub const fn with_exclusive(mut self, exclusive: bool) -> Self {
        self.exclusive = exclusive;
        self
    }
}

/// Durable job entry; survives without a trigger.
#[derive(Debug, Clone)]
struct JobEntry {
    description: String,
    exclusive: bool,
}

struct Registry {
    status: EngineStatus,
    jobs: HashMap<JobKey, JobEntry>,
    triggers: HashMap<TriggerKey, EngineTrigger>,
}

impl Registry {
    fn ensure_started(&self) -> Result<(), SchedulerError> {
        match self.status {
            EngineStatus::Started => Ok(()),
            EngineStatus::Standby => Err(SchedulerError::EngineUnavailable("engine not started".into())),
            EngineStatus::ShutDown => {
                Err(SchedulerError::EngineUnavailable("engine already shut down".into()))
            }
        }
    }

    fn triggers_of<'a>(&'a mut self, job: &'a JobKey) -> impl Iterator<Item = &'a mut EngineTrigger> + 'a {
        self.triggers
            .values_mut()
            .filter(move |trigger| trigger.job_key() == job)
    }

    fn next_wakeup(&self) -> Option<DateTime<Utc>> {
        self.triggers
            .values()
            .filter_map(EngineTrigger::wakeup_time)
            .min()
    }

    /// Advance every due trigger and collect the firings to dispatch.
    fn collect_due(&mut self, now: DateTime<Utc>, misfire_threshold: chrono::Duration) -> Vec<Firing> {
        let mut firings = Vec::new();
        let mut completed = Vec::new();

        for (trigger_key, trigger) in &mut self.triggers {
            let Some(action) = trigger.advance(now, misfire_threshold) else {
                if trigger.is_complete() {
                    completed.push(trigger_key.clone());
                }
                continue;
            };
            let job_key = trigger.job_key().clone();
            match action {
                DueAction::Fire { scheduled, kind } => {
                    if let Some(entry) = self.jobs.get(&job_key) {
                        if kind == FireKind::MisfireRecovery {
                            info!(job = %job_key, missed = %scheduled, "Trigger misfired; firing once to recover");
                        }
                        firings.push(Firing {
                            ctx: FiringContext::new(job_key, entry.description.clone(), Some(scheduled), kind),
                            exclusive: entry.exclusive,
                        });
                    }
                }
                DueAction::Skip { missed } => {
                    info!(job = %job_key, missed = %missed, "Trigger misfired; skipping to next occurrence");
                }
            }
            if trigger.is_complete() {
                completed.push(trigger_key.clone());
            }
        }

        for trigger_key in completed {
            self.triggers.remove(&trigger_key);
            info!(trigger = %trigger_key, "Trigger has no further occurrences; removed");
        }
        firings
    }
}

struct EngineShared {
    registry: Mutex<Registry>,
    wake: Condvar,
    misfire_threshold: chrono::Duration,
}

/// Scheduling engine owning job/trigger registrations and a worker pool.
pub struct SchedulingEngine<E>
where
    E: JobExecutor,
{
    config: EngineConfig,
    shared: Arc<EngineShared>,
    pool: Arc<WorkerPool<E>>,
    timer: Mutex<Option<JoinHandle<()>>>,
}

impl<E> SchedulingEngine<E>
where
    E: JobExecutor,
{
    /// Create an engine in standby with its worker pool.
    ///
    /// # Errors
    ///
    /// Returns `SchedulerError::InvalidConfig` for an invalid configuration or
    /// `SchedulerError::Backend` if worker threads cannot be spawned.
    pub fn new(config: EngineConfig, executor: E) -> Result<Self, SchedulerError> {
        config.validate().map_err(SchedulerError::InvalidConfig)?;
        let pool = WorkerPool::new(&config, executor)?;

        Ok(Self {
            shared: Arc::new(EngineShared {
                registry: Mutex::new(Registry {
                    status: EngineStatus::Standby,
                    jobs: HashMap::new(),
                    triggers: HashMap::new(),
                }),
                wake: Condvar::new(),
                misfire_threshold: config.misfire_threshold(),
            }),
            config,
            pool: Arc::new(pool),
            timer: Mutex::new(None),
        })
    }

    /// Arm the timer. Starting a started engine is a no-op.
    ///
    /// # Errors
    ///
    /// Returns `EngineUnavailable` after shutdown, or `Backend` if the timer
    /// thread cannot be spawned.
    pub fn start(&self) -> Result<(), SchedulerError> {
        let mut registry = self.shared.registry.lock();
        match registry.status {
            EngineStatus::Started => return Ok(()),
            EngineStatus::ShutDown => {
                return Err(SchedulerError::EngineUnavailable("engine already shut down".into()))
            }
            EngineStatus::Standby => {}
        }

        let shared = Arc::clone(&self.shared);
        let pool = Arc::clone(&self.pool);
        let handle = thread::Builder::new()
            .name("cron-timer".into())
            .spawn(move || run_timer(&shared, &pool))
            .map_err(|e| SchedulerError::Backend(format!("failed to spawn timer thread: {e}")))?;

        registry.status = EngineStatus::Started;
        *self.timer.lock() = Some(handle);
        info!(
            worker_count = self.config.worker_count,
            jobs = registry.jobs.len(),
            "Scheduling engine started"
        );
        Ok(())
    }

    /// Current lifecycle state.
    #[must_use]
    pub fn status(&self) -> EngineStatus {
        self.shared.registry.lock().status
    }

    /// Register a durable job and its cron trigger.
    ///
    /// The cron expression is parsed before the registry is touched.
    ///
    /// # Errors
    ///
    /// - `InvalidSchedule` if the expression does not parse or never fires
    /// - `EngineUnavailable` if the engine is not started
    /// - `DuplicateJob` if the key is already registered
    pub fn register_job(&self, registration: JobRegistration) -> Result<(), SchedulerError> {
        let schedule = CronSchedule::parse(&registration.cron_expression)?;

        let mut registry = self.shared.registry.lock();
        registry.ensure_started()?;
        if registry.jobs.contains_key(&registration.key) {
            return Err(SchedulerError::DuplicateJob(registration.key));
        }

        let trigger_key = registration.key.trigger_key();
        let trigger = EngineTrigger::new(
            trigger_key.clone(),
            registration.key.clone(),
            schedule,
            registration.misfire_policy,
            clock::now(),
        );
        if trigger.is_complete() {
            return Err(SchedulerError::InvalidSchedule {
                expression: registration.cron_expression,
                reason: "schedule has no future occurrences".into(),
            });
        }
        debug!(
            job = %registration.key,
            trigger = %trigger_key,
            next_fire_time = ?trigger.next_fire_time(),
            misfire_policy = ?registration.misfire_policy,
            "Registering job"
        );

        registry.jobs.insert(
            registration.key,
            JobEntry {
                description: registration.description,
                exclusive: registration.exclusive,
            },
        );
        registry.triggers.insert(trigger_key, trigger);
        self.shared.wake.notify_all();
        Ok(())
    }

    /// Whether a job is registered under `key`.
    #[must_use]
    pub fn exists(&self, key: &JobKey) -> bool {
        self.shared.registry.lock().jobs.contains_key(key)
    }

    /// Remove a job and all of its triggers. Returns whether anything was
    /// removed; an absent key is not an error.
    ///
    /// # Errors
    ///
    /// Returns `EngineUnavailable` if the engine is not started.
    pub fn unregister(&self, key: &JobKey) -> Result<bool, SchedulerError> {
        let mut registry = self.shared.registry.lock();
        registry.ensure_started()?;

        let removed_job = registry.jobs.remove(key).is_some();
        let before = registry.triggers.len();
        registry.triggers.retain(|_, trigger| trigger.job_key() != key);
        let removed_triggers = before - registry.triggers.len();

        if removed_job || removed_triggers > 0 {
            debug!(job = %key, triggers = removed_triggers, "Unregistered job");
            self.shared.wake.notify_all();
        }
        Ok(removed_job || removed_triggers > 0)
    }

    /// Freeze every trigger of a job without removing the registration.
    /// Pausing an unknown job is a no-op.
    ///
    /// # Errors
    ///
    /// Returns `EngineUnavailable` if the engine is not started.
    pub fn pause(&self, key: &JobKey) -> Result<(), SchedulerError> {
        let mut registry = self.shared.registry.lock();
        registry.ensure_started()?;

        let mut paused = 0usize;
        for trigger in registry.triggers_of(key) {
            trigger.pause();
            paused += 1;
        }
        debug!(job = %key, triggers = paused, "Paused job triggers");
        self.shared.wake.notify_all();
        Ok(())
    }

    /// Atomically replace a trigger with a new one under the same key.
    ///
    /// The replacement is in the normal state and continues from the old
    /// trigger's watermark, so occurrences missed while it was paused are
    /// handled by `misfire_policy`.
    ///
    /// # Errors
    ///
    /// - `InvalidSchedule` if the expression does not parse
    /// - `EngineUnavailable` if the engine is not started
    /// - `NotFound` if no trigger exists under `trigger_key`
    pub fn reschedule(
        &self,
        trigger_key: &TriggerKey,
        cron_expression: &str,
        misfire_policy: MisfirePolicy,
    ) -> Result<(), SchedulerError> {
        let schedule = CronSchedule::parse(cron_expression)?;

        let mut registry = self.shared.registry.lock();
        registry.ensure_started()?;
        let old = registry
            .triggers
            .get(trigger_key)
            .ok_or_else(|| SchedulerError::NotFound(format!("trigger {trigger_key}")))?;

        let replacement = EngineTrigger::replacing(old, schedule, misfire_policy);
        debug!(
            trigger = %trigger_key,
            cron = %replacement.cron_expression(),
            next_fire_time = ?replacement.next_fire_time(),
            misfire_policy = ?misfire_policy,
            "Rescheduled trigger"
        );
        registry.triggers.insert(trigger_key.clone(), replacement);
        self.shared.wake.notify_all();
        Ok(())
    }

    /// Run a job once, immediately, outside its schedule. The schedule is not
    /// altered and paused triggers do not prevent the firing.
    ///
    /// # Errors
    ///
    /// - `EngineUnavailable` if the engine is not started
    /// - `NotRegistered` if the job is unknown
    /// - `QueueFull` if the worker pool cannot accept the firing
    pub fn fire_now(&self, key: &JobKey) -> Result<(), SchedulerError> {
        let firing = {
            let registry = self.shared.registry.lock();
            registry.ensure_started()?;
            let entry = registry
                .jobs
                .get(key)
                .ok_or_else(|| SchedulerError::NotRegistered(key.clone()))?;
            Firing {
                ctx: FiringContext::new(key.clone(), entry.description.clone(), None, FireKind::Manual),
                exclusive: entry.exclusive,
            }
        };
        self.pool.submit(firing)?;
        Ok(())
    }

    /// Cron expression of a trigger, if it exists.
    #[must_use]
    pub fn trigger_cron_expression(&self, trigger_key: &TriggerKey) -> Option<String> {
        self.shared
            .registry
            .lock()
            .triggers
            .get(trigger_key)
            .map(|trigger| trigger.cron_expression().to_string())
    }

    /// Snapshot of a trigger, if it exists.
    #[must_use]
    pub fn trigger_info(&self, trigger_key: &TriggerKey) -> Option<TriggerInfo> {
        self.shared
            .registry
            .lock()
            .triggers
            .get(trigger_key)
            .map(EngineTrigger::info)
    }

    /// Keys of all registered jobs, sorted.
    #[must_use]
    pub fn job_keys(&self) -> Vec<JobKey> {
        let mut keys: Vec<JobKey> = self.shared.registry.lock().jobs.keys().cloned().collect();
        keys.sort();
        keys
    }

    /// Whether the job has at least one trigger and all of them are paused.
    #[must_use]
    pub fn is_job_paused(&self, key: &JobKey) -> bool {
        let registry = self.shared.registry.lock();
        let mut states = registry
            .triggers
            .values()
            .filter(|trigger| trigger.job_key() == key)
            .map(EngineTrigger::state)
            .peekable();
        states.peek().is_some() && states.all(|state| state == TriggerState::Paused)
    }

    /// Worker pool statistics.
    #[must_use]
    pub fn stats(&self) -> PoolStats {
        self.pool.stats()
    }

    /// Engine configuration.
    #[must_use]
    pub const fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// Stop the timer and wait for in-flight firings, bounded by the
    /// configured shutdown timeout. Returns `true` if the pool drained.
    /// Calling it again is a no-op.
    pub fn shutdown(&self) -> bool {
        {
            let mut registry = self.shared.registry.lock();
            if registry.status == EngineStatus::ShutDown {
                return true;
            }
            registry.status = EngineStatus::ShutDown;
            self.shared.wake.notify_all();
        }
        info!("Shutting down scheduling engine");

        if let Some(timer) = self.timer.lock().take() {
            if timer.join().is_err() {
                warn!("Timer thread panicked");
            }
        }
        self.pool.shutdown(self.config.shutdown_timeout())
    }
}

impl<E> Drop for SchedulingEngine<E>
where
    E: JobExecutor,
{
    fn drop(&mut self) {
        // Signal the timer to exit but don't join in Drop
        let mut registry = self.shared.registry.lock();
        if registry.status != EngineStatus::ShutDown {
            registry.status = EngineStatus::ShutDown;
            self.shared.wake.notify_all();
            debug!("SchedulingEngine dropped without explicit shutdown");
        }
    }
}

fn run_timer<E>(shared: &EngineShared, pool: &WorkerPool<E>)
where
    E: JobExecutor,
{
    debug!("Timer thread started");
    let mut registry = shared.registry.lock();
    loop {
        if registry.status == EngineStatus::ShutDown {
            break;
        }

        let now = clock::now();
        let firings = registry.collect_due(now, shared.misfire_threshold);
        if !firings.is_empty() {
            MutexGuard::unlocked(&mut registry, || dispatch(pool, firings));
            continue;
        }

        match registry.next_wakeup() {
            Some(at) => {
                shared.wake.wait_for(&mut registry, clock::duration_until(at, now));
            }
            None => shared.wake.wait(&mut registry),
        }
    }
    debug!("Timer thread exiting");
}

fn dispatch<E>(pool: &WorkerPool<E>, firings: Vec<Firing>)
where
    E: JobExecutor,
{
    for firing in firings {
        let job = firing.ctx.job_key.clone();
        if let Err(e) = pool.submit(firing) {
            warn!(job = %job, error = %e, "Dropping scheduled firing");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::executor::LoggingExecutor;

    fn engine() -> SchedulingEngine<LoggingExecutor> {
        SchedulingEngine::new(EngineConfig::new().with_worker_count(2), LoggingExecutor).unwrap()
    }

    fn hourly(name: &str) -> JobRegistration {
        JobRegistration::new(JobKey::new(name, "default"), "0 0 * * * ?", MisfirePolicy::DoNothing)
    }

    #[test]
    fn test_mutations_require_started_engine() {
        let engine = engine();
        assert_eq!(engine.status(), EngineStatus::Standby);
        let err = engine.register_job(hourly("ReportJob")).unwrap_err();
        assert!(matches!(err, SchedulerError::EngineUnavailable(_)));

        engine.start().unwrap();
        engine.start().unwrap();
        engine.register_job(hourly("ReportJob")).unwrap();

        assert!(engine.shutdown());
        assert_eq!(engine.status(), EngineStatus::ShutDown);
        let err = engine.pause(&JobKey::new("ReportJob", "default")).unwrap_err();
        assert!(matches!(err, SchedulerError::EngineUnavailable(_)));
        assert!(matches!(engine.start(), Err(SchedulerError::EngineUnavailable(_))));
    }

    #[test]
    fn test_invalid_schedule_leaves_registry_untouched() {
        let engine = engine();
        engine.start().unwrap();
        let registration = JobRegistration::new(JobKey::new("Bad", "default"), "every day", MisfirePolicy::DoNothing);
        let err = engine.register_job(registration).unwrap_err();
        assert!(matches!(err, SchedulerError::InvalidSchedule { .. }));
        assert!(engine.job_keys().is_empty());
        engine.shutdown();
    }

    #[test]
    fn test_duplicate_registration_rejected() {
        let engine = engine();
        engine.start().unwrap();
        engine.register_job(hourly("ReportJob")).unwrap();
        let err = engine.register_job(hourly("ReportJob")).unwrap_err();
        assert!(matches!(err, SchedulerError::DuplicateJob(_)));
        engine.shutdown();
    }

    #[test]
    fn test_unregister_is_idempotent() {
        let engine = engine();
        engine.start().unwrap();
        let key = JobKey::new("ReportJob", "default");
        engine.register_job(hourly("ReportJob")).unwrap();

        assert!(engine.unregister(&key).unwrap());
        assert!(!engine.exists(&key));
        assert!(engine.trigger_info(&key.trigger_key()).is_none());
        assert!(!engine.unregister(&key).unwrap());
        engine.shutdown();
    }

    #[test]
    fn test_reschedule_unknown_trigger() {
        let engine = engine();
        engine.start().unwrap();
        let err = engine
            .reschedule(&TriggerKey::new("MissingTrigger", "default"), "0 0 * * * ?", MisfirePolicy::FireAndProceed)
            .unwrap_err();
        assert!(matches!(err, SchedulerError::NotFound(_)));
        engine.shutdown();
    }
}
