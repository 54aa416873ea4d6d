//! Keeps persisted job definitions and the scheduling engine in step.
//!
//! Every control operation is a dual write: the engine is mutated first and
//! the store second, without a transaction spanning both. A failed second
//! write leaves the two sides diverged; [`ReconciliationService::repair`]
//! (on demand or from [`ReconciliationService::spawn_repair_loop`]) compares
//! the store's desired state with the engine's live state and fixes the
//! difference.
//!
//! Mutating operations and repair passes are serialised on one operation
//! lock, so a pass never observes a dual write half done.

use std::collections::HashSet;
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use parking_lot::{Condvar, Mutex};
use serde::Serialize;
use tracing::{debug, error, info, warn};

use crate::config::UpdateStatusRule;
use crate::core::engine::{JobRegistration, SchedulingEngine};
use crate::core::error::SchedulerError;
use crate::core::executor::JobExecutor;
use crate::core::job::{JobDefinition, JobKey, JobStatus, MisfirePolicy};
use crate::core::schedule::CronSchedule;
use crate::core::store::JobStore;
use crate::util::clock;

/// What a startup or repair pass changed in the engine.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct RepairReport {
    /// Jobs registered because the engine did not know them.
    pub registered: Vec<JobKey>,
    /// Jobs paused to match a PAUSED definition.
    pub paused: Vec<JobKey>,
    /// Jobs resumed to match a RUNNING definition.
    pub resumed: Vec<JobKey>,
    /// Jobs whose trigger was replaced because the cron expression drifted.
    pub rescheduled: Vec<JobKey>,
    /// Engine jobs with no stored definition, unregistered.
    pub removed_orphans: Vec<JobKey>,
    /// Definitions left alone because their schedule cannot be registered.
    pub skipped: Vec<JobKey>,
}

impl RepairReport {
    /// Whether the pass found nothing to fix.
    #[must_use]
    pub fn is_clean(&self) -> bool {
        self.registered.is_empty()
            && self.paused.is_empty()
            && self.resumed.is_empty()
            && self.rescheduled.is_empty()
            && self.removed_orphans.is_empty()
            && self.skipped.is_empty()
    }
}

/// Orchestrates the job store and the scheduling engine.
pub struct ReconciliationService<E>
where
    E: JobExecutor,
{
    engine: Arc<SchedulingEngine<E>>,
    store: Arc<dyn JobStore>,
    update_rule: UpdateStatusRule,
    ops: Mutex<()>,
}

impl<E> ReconciliationService<E>
where
    E: JobExecutor,
{
    /// Create a service over an engine and a store.
    pub fn new(engine: Arc<SchedulingEngine<E>>, store: Arc<dyn JobStore>, update_rule: UpdateStatusRule) -> Self {
        Self {
            engine,
            store,
            update_rule,
            ops: Mutex::new(()),
        }
    }

    /// The scheduling engine.
    #[must_use]
    pub const fn engine(&self) -> &Arc<SchedulingEngine<E>> {
        &self.engine
    }

    /// The job store.
    #[must_use]
    pub const fn store(&self) -> &Arc<dyn JobStore> {
        &self.store
    }

    /// Status rule applied by [`Self::update_job`].
    #[must_use]
    pub const fn update_rule(&self) -> UpdateStatusRule {
        self.update_rule
    }

    /// Startup reconciliation.
    ///
    /// Jobs already registered in the engine are left untouched. Missing ones
    /// are registered with [`MisfirePolicy::FireAndProceed`] and paused
    /// straight away if their stored status is PAUSED. Definitions whose cron
    /// expression no longer parses are logged and reported as skipped.
    ///
    /// # Errors
    ///
    /// Store read failures and engine errors other than an invalid schedule.
    pub fn initialize(&self) -> Result<RepairReport, SchedulerError> {
        let _ops = self.ops.lock();
        let mut report = RepairReport::default();
        let jobs = self.store.find_all()?;
        info!(jobs = jobs.len(), "Reconciling stored jobs with the scheduling engine");

        for job in jobs {
            let key = job.key();
            if self.engine.exists(&key) {
                info!(job = %key, "Job already registered; leaving it untouched");
                continue;
            }

            match self
                .engine
                .register_job(JobRegistration::from_definition(&job, MisfirePolicy::FireAndProceed))
            {
                Ok(()) => report.registered.push(key.clone()),
                Err(SchedulerError::InvalidSchedule { expression, reason }) => {
                    error!(job = %key, cron = %expression, reason = %reason, "Stored job has an invalid cron expression; not scheduled");
                    report.skipped.push(key);
                    continue;
                }
                Err(e) => return Err(e),
            }

            if job.is_paused() {
                self.engine.pause(&key)?;
                report.paused.push(key);
            }
        }

        info!(
            registered = report.registered.len(),
            paused = report.paused.len(),
            skipped = report.skipped.len(),
            "Startup reconciliation complete"
        );
        Ok(report)
    }

    /// Persist a new job and schedule it.
    ///
    /// The trigger uses [`MisfirePolicy::DoNothing`]. A missing status
    /// defaults to RUNNING; a job created PAUSED is paused in the engine too.
    ///
    /// # Errors
    ///
    /// - `InvalidSchedule` before anything is touched
    /// - `DuplicateJob` if the key is already persisted; the engine is not
    ///   touched
    /// - engine and store failures
    pub fn create_job(&self, mut job: JobDefinition) -> Result<JobDefinition, SchedulerError> {
        let key = job.key();
        CronSchedule::validate(&job.cron_expression)?;
        let _ops = self.ops.lock();
        if self.store.find_by_name_and_group(&key)?.is_some() {
            warn!(job = %key, "Create rejected; job already exists");
            return Err(SchedulerError::DuplicateJob(key));
        }

        job.id = None;
        job.status = Some(job.effective_status());

        self.engine
            .register_job(JobRegistration::from_definition(&job, MisfirePolicy::DoNothing))?;
        if job.is_paused() {
            self.engine.pause(&key)?;
        }

        let saved = self
            .store
            .save(job)
            .inspect_err(|e| error!(job = %key, error = %e, "Job scheduled but not persisted"))?;
        info!(job = %key, id = ?saved.id, status = %saved.effective_status(), "Created job");
        Ok(saved)
    }

    /// All stored definitions.
    ///
    /// # Errors
    ///
    /// Store read failures.
    pub fn list_jobs(&self) -> Result<Vec<JobDefinition>, SchedulerError> {
        self.store.find_all()
    }

    /// Fire a job once, immediately.
    ///
    /// A job that is not stored, is PAUSED, or is missing from the engine is
    /// a logged no-op rather than an error.
    ///
    /// # Errors
    ///
    /// Store read failures, `EngineUnavailable`, and `QueueFull`.
    pub fn run_job_now(&self, key: &JobKey) -> Result<(), SchedulerError> {
        let Some(job) = self.store.find_by_name_and_group(key)? else {
            warn!(job = %key, "Run now ignored; job not found");
            return Ok(());
        };
        if job.is_paused() {
            warn!(job = %key, "Run now ignored; job is paused");
            return Ok(());
        }

        match self.engine.fire_now(key) {
            Ok(()) => {
                info!(job = %key, "Job fired manually");
                Ok(())
            }
            Err(SchedulerError::NotRegistered(_)) => {
                warn!(job = %key, "Run now ignored; job not registered in engine");
                Ok(())
            }
            Err(e) => Err(e),
        }
    }

    /// Remove a job from the engine and the store. Unknown keys are not an
    /// error.
    ///
    /// # Errors
    ///
    /// Store failures and `EngineUnavailable`.
    pub fn delete_job(&self, key: &JobKey) -> Result<(), SchedulerError> {
        let _ops = self.ops.lock();
        let existing = self.store.find_by_name_and_group(key)?;
        let unregistered = self.engine.unregister(key)?;

        match existing {
            Some(job) => {
                self.store
                    .delete(&job)
                    .inspect_err(|e| error!(job = %key, error = %e, "Job unscheduled but not deleted from store"))?;
                info!(job = %key, "Deleted job");
            }
            None => debug!(job = %key, unregistered, "Delete of unknown job"),
        }
        Ok(())
    }

    /// Pause a job in the engine and mark it PAUSED.
    ///
    /// # Errors
    ///
    /// `NotFound` if the job is not stored (nothing is touched), plus engine
    /// and store failures.
    pub fn pause_job(&self, key: &JobKey) -> Result<(), SchedulerError> {
        let _ops = self.ops.lock();
        let mut job = self
            .store
            .find_by_name_and_group(key)?
            .ok_or_else(|| SchedulerError::NotFound(key.to_string()))?;

        self.engine.pause(key)?;

        job.status = Some(JobStatus::Paused);
        self.store
            .save(job)
            .inspect_err(|e| error!(job = %key, error = %e, "Job paused in engine but status not persisted"))?;
        info!(job = %key, "Paused job");
        Ok(())
    }

    /// Resume a job by replacing its trigger with one on the same cron
    /// expression and [`MisfirePolicy::FireAndProceed`], then mark it RUNNING.
    ///
    /// If the engine lacks the job or its trigger the call logs a warning
    /// and changes nothing.
    ///
    /// # Errors
    ///
    /// `NotFound` if the job is not stored, plus engine and store failures.
    pub fn resume_job(&self, key: &JobKey) -> Result<(), SchedulerError> {
        let _ops = self.ops.lock();
        let trigger_key = key.trigger_key();
        if !self.engine.exists(key) {
            warn!(job = %key, "Resume aborted; job not registered in engine");
            return Ok(());
        }
        let Some(cron_expression) = self.engine.trigger_cron_expression(&trigger_key) else {
            warn!(job = %key, trigger = %trigger_key, "Resume aborted; trigger not registered in engine");
            return Ok(());
        };

        let mut job = self
            .store
            .find_by_name_and_group(key)?
            .ok_or_else(|| SchedulerError::NotFound(key.to_string()))?;

        self.engine
            .reschedule(&trigger_key, &cron_expression, MisfirePolicy::FireAndProceed)?;

        job.status = Some(JobStatus::Running);
        self.store
            .save(job)
            .inspect_err(|e| error!(job = %key, error = %e, "Job resumed in engine but status not persisted"))?;
        info!(job = %key, cron = %cron_expression, "Resumed job");
        Ok(())
    }

    /// Overwrite a stored job by id and re-register it, possibly under a new
    /// key.
    ///
    /// Name, group, cron expression, description and the exclusivity flag
    /// are taken from `job`. The resulting status follows the configured
    /// [`UpdateStatusRule`]: PAUSED under `ForcePause`, unchanged under
    /// `PreserveStatus`.
    ///
    /// # Errors
    ///
    /// - `NotFound` if `job.id` is missing or unknown
    /// - `InvalidSchedule` before anything is touched
    /// - `DuplicateJob` if the new key belongs to another job
    /// - engine and store failures
    pub fn update_job(&self, job: JobDefinition) -> Result<JobDefinition, SchedulerError> {
        let id = job
            .id
            .ok_or_else(|| SchedulerError::NotFound("job id missing".into()))?;
        let _ops = self.ops.lock();
        let existing = self
            .store
            .find_by_id(id)?
            .ok_or_else(|| SchedulerError::NotFound(format!("job id {id}")))?;
        CronSchedule::validate(&job.cron_expression)?;

        let old_key = existing.key();
        let new_key = job.key();
        if new_key != old_key {
            if let Some(owner) = self.store.find_by_name_and_group(&new_key)? {
                if owner.id != Some(id) {
                    warn!(job = %old_key, target = %new_key, "Update rejected; target key taken");
                    return Err(SchedulerError::DuplicateJob(new_key));
                }
            }
            if self.engine.exists(&new_key) {
                warn!(job = %old_key, target = %new_key, "Update rejected; target key registered in engine");
                return Err(SchedulerError::DuplicateJob(new_key));
            }
        }

        let status = match self.update_rule {
            UpdateStatusRule::ForcePause => JobStatus::Paused,
            UpdateStatusRule::PreserveStatus => existing.effective_status(),
        };
        let updated = JobDefinition {
            job_name: job.job_name,
            job_group: job.job_group,
            description: job.description,
            cron_expression: job.cron_expression,
            exclusive: job.exclusive,
            status: Some(status),
            ..existing
        };

        self.engine.unregister(&old_key)?;
        self.engine
            .register_job(JobRegistration::from_definition(&updated, MisfirePolicy::FireAndProceed))?;
        if status == JobStatus::Paused {
            self.engine.pause(&new_key)?;
        }

        let saved = self
            .store
            .save(updated)
            .inspect_err(|e| error!(job = %new_key, error = %e, "Job re-registered but update not persisted"))?;
        info!(id, from = %old_key, to = %new_key, status = %status, "Updated job");
        Ok(saved)
    }

    /// Diff the store against the engine and repair the engine.
    ///
    /// Definitions whose schedule does not parse or has no future occurrence
    /// are reported as skipped and their engine entry is left in place.
    ///
    /// # Errors
    ///
    /// Store read failures and engine errors; repairs made before the error
    /// stay in place.
    pub fn repair(&self) -> Result<RepairReport, SchedulerError> {
        let _ops = self.ops.lock();
        let mut report = RepairReport::default();
        let jobs = self.store.find_all()?;
        let mut desired = HashSet::with_capacity(jobs.len());

        for job in jobs {
            let key = job.key();
            desired.insert(key.clone());
            let schedulable = CronSchedule::parse(&job.cron_expression)
                .is_ok_and(|schedule| schedule.next_after(&clock::now()).is_some());
            if !schedulable {
                // Left as is: an exhausted job keeps its durable entry.
                report.skipped.push(key);
                continue;
            }
            self.repair_job(&job, key, &mut report)?;
        }

        for key in self.engine.job_keys() {
            if !desired.contains(&key) {
                self.engine.unregister(&key)?;
                report.removed_orphans.push(key);
            }
        }

        if report.is_clean() {
            debug!("Repair pass found engine and store in sync");
        } else {
            info!(
                registered = report.registered.len(),
                paused = report.paused.len(),
                resumed = report.resumed.len(),
                rescheduled = report.rescheduled.len(),
                removed_orphans = report.removed_orphans.len(),
                skipped = report.skipped.len(),
                "Repair pass applied changes"
            );
        }
        Ok(report)
    }

    fn repair_job(&self, job: &JobDefinition, key: JobKey, report: &mut RepairReport) -> Result<(), SchedulerError> {
        let trigger_key = key.trigger_key();
        let live_cron = self.engine.trigger_cron_expression(&trigger_key);

        if !self.engine.exists(&key) || live_cron.is_none() {
            // Durable entry without a trigger is re-registered from scratch.
            // The schedule was checked for a future occurrence above.
            self.engine.unregister(&key)?;
            match self
                .engine
                .register_job(JobRegistration::from_definition(job, MisfirePolicy::FireAndProceed))
            {
                Ok(()) => {}
                Err(SchedulerError::InvalidSchedule { reason, .. }) => {
                    debug!(job = %key, reason = %reason, "Repair skipped job");
                    report.skipped.push(key);
                    return Ok(());
                }
                Err(e) => return Err(e),
            }
            if job.is_paused() {
                self.engine.pause(&key)?;
            }
            report.registered.push(key);
            return Ok(());
        }

        let desired_cron = job.cron_expression.trim();
        if live_cron.as_deref() != Some(desired_cron) {
            self.engine
                .reschedule(&trigger_key, desired_cron, MisfirePolicy::FireAndProceed)?;
            report.rescheduled.push(key.clone());
        }

        let live_paused = self.engine.is_job_paused(&key);
        if job.is_paused() && !live_paused {
            self.engine.pause(&key)?;
            report.paused.push(key);
        } else if !job.is_paused() && live_paused {
            self.engine
                .reschedule(&trigger_key, desired_cron, MisfirePolicy::FireAndProceed)?;
            report.resumed.push(key);
        }
        Ok(())
    }

    /// Run [`Self::repair`] every `interval` on a dedicated thread.
    ///
    /// # Errors
    ///
    /// `InvalidConfig` for a zero interval, `Backend` if the thread cannot be
    /// spawned.
    pub fn spawn_repair_loop(self: &Arc<Self>, interval: Duration) -> Result<RepairLoopHandle, SchedulerError> {
        if interval.is_zero() {
            return Err(SchedulerError::InvalidConfig("repair interval must be > 0".into()));
        }

        let signal = Arc::new(StopSignal::default());
        let thread_signal = Arc::clone(&signal);
        let service = Arc::clone(self);
        let thread = thread::Builder::new()
            .name("cron-repair".into())
            .spawn(move || {
                debug!(interval_ms = interval.as_millis(), "Repair loop started");
                while !thread_signal.wait(interval) {
                    if let Err(e) = service.repair() {
                        warn!(error = %e, "Repair pass failed");
                    }
                }
                debug!("Repair loop stopped");
            })
            .map_err(|e| SchedulerError::Backend(format!("failed to spawn repair thread: {e}")))?;

        Ok(RepairLoopHandle {
            signal,
            thread: Some(thread),
        })
    }
}

#[derive(Default)]
struct StopSignal {
    stopped: Mutex<bool>,
    cond: Condvar,
}

impl StopSignal {
    /// Sleep for `interval` or until stopped. Returns `true` once stopped.
    fn wait(&self, interval: Duration) -> bool {
        let deadline = Instant::now() + interval;
        let mut stopped = self.stopped.lock();
        while !*stopped {
            if self.cond.wait_until(&mut stopped, deadline).timed_out() {
                break;
            }
        }
        *stopped
    }

    fn stop(&self) {
        *self.stopped.lock() = true;
        self.cond.notify_all();
    }
}

/// Handle to a running repair loop. Dropping it stops the loop.
pub struct RepairLoopHandle {
    signal: Arc<StopSignal>,
    thread: Option<JoinHandle<()>>,
}

impl RepairLoopHandle {
    /// Whether the loop thread is still running.
    #[must_use]
    pub fn is_running(&self) -> bool {
        self.thread.as_ref().is_some_and(|t| !t.is_finished())
    }

    /// Stop the loop and wait for an in-progress pass to finish.
    pub fn stop(mut self) {
        self.stop_and_join();
    }

    fn stop_and_join(&mut self) {
        self.signal.stop();
        if let Some(thread) = self.thread.take() {
            if thread.join().is_err() {
                warn!("Repair loop thread panicked");
            }
        }
    }
}

impl Drop for RepairLoopHandle {
    fn drop(&mut self) {
        self.stop_and_join();
    }
}
