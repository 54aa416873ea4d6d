//! Native implementation of `WorkerPool` using OS threads.
//!
//! # Design Principles
//!
//! - **No polling**: workers block on channel recv
//! - **Bounded**: fixed thread count and bounded hand-off queue
//! - **Drain on shutdown**: dropping the sender unblocks idle workers while
//!   in-flight firings run to completion; queued firings are discarded

use std::collections::HashSet;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Duration;

use crossbeam_channel::{bounded, Receiver, Sender, TrySendError};
use parking_lot::Mutex;
use tracing::{debug, error, info, warn};

use crate::config::EngineConfig;
use crate::core::executor::JobExecutor;
use crate::core::job::JobKey;

use super::{Firing, PoolCounters, PoolError, PoolStats};

/// Shared state every worker thread needs.
struct WorkerShared<E> {
    executor: E,
    counters: Arc<PoolCounters>,
    shutdown: Arc<AtomicBool>,
    in_flight: Arc<Mutex<HashSet<JobKey>>>,
}

impl<E: Clone> Clone for WorkerShared<E> {
    fn clone(&self) -> Self {
        Self {
            executor: self.executor.clone(),
            counters: Arc::clone(&self.counters),
            shutdown: Arc::clone(&self.shutdown),
            in_flight: Arc::clone(&self.in_flight),
        }
    }
}

/// Worker pool with dedicated OS threads for job firings.
///
/// Each worker thread has its own single-threaded tokio runtime.
pub struct WorkerPool<E>
where
    E: JobExecutor,
{
    /// Number of worker threads.
    worker_count: usize,

    /// Firing sender (to workers). Option allows clean shutdown by dropping.
    task_tx: Mutex<Option<Sender<Firing>>>,

    /// Pool statistics counters (lock-free atomics).
    counters: Arc<PoolCounters>,

    /// Shutdown flag (lock-free atomic).
    shutdown: Arc<AtomicBool>,

    /// Worker thread handles.
    workers: Mutex<Vec<JoinHandle<()>>>,

    /// Phantom data for executor type.
    _executor: std::marker::PhantomData<E>,
}

impl<E> WorkerPool<E>
where
    E: JobExecutor,
{
    /// Create a new worker pool and spawn `config.worker_count` threads.
    ///
    /// # Errors
    ///
    /// Returns `PoolError::InvalidConfig` if the configuration is invalid, or
    /// `PoolError::Internal` if a worker thread cannot be spawned.
    pub fn new(config: &EngineConfig, executor: E) -> Result<Self, PoolError> {
        config.validate().map_err(PoolError::InvalidConfig)?;

        let (task_tx, task_rx) = bounded::<Firing>(config.max_queue_depth);
        let shared = WorkerShared {
            executor,
            counters: Arc::new(PoolCounters::default()),
            shutdown: Arc::new(AtomicBool::new(false)),
            in_flight: Arc::new(Mutex::new(HashSet::new())),
        };

        let mut workers = Vec::with_capacity(config.worker_count);
        for worker_id in 0..config.worker_count {
            match spawn_worker(
                worker_id,
                task_rx.clone(),
                shared.clone(),
                config.thread_stack_size,
            ) {
                Ok(handle) => workers.push(handle),
                Err(e) => {
                    shared.shutdown.store(true, Ordering::Release);
                    drop(task_tx);
                    return Err(PoolError::Internal(format!(
                        "failed to spawn worker {worker_id}: {e}"
                    )));
                }
            }
        }

        info!(
            worker_count = config.worker_count,
            max_queue_depth = config.max_queue_depth,
            "WorkerPool initialized with dedicated OS threads"
        );

        Ok(Self {
            worker_count: config.worker_count,
            task_tx: Mutex::new(Some(task_tx)),
            counters: shared.counters,
            shutdown: shared.shutdown,
            workers: Mutex::new(workers),
            _executor: std::marker::PhantomData,
        })
    }

    /// Hand a firing to the workers without blocking.
    ///
    /// # Errors
    ///
    /// - `PoolError::QueueFull` if every worker is busy and the queue is full
    /// - `PoolError::PoolShutdown` if the pool has been shut down
    pub(crate) fn submit(&self, firing: Firing) -> Result<(), PoolError> {
        if self.shutdown.load(Ordering::Acquire) {
            return Err(PoolError::PoolShutdown);
        }

        let task_tx_guard = self.task_tx.lock();
        let Some(task_tx) = task_tx_guard.as_ref() else {
            return Err(PoolError::PoolShutdown);
        };

        let job = firing.ctx.job_key.clone();
        // Count before sending so a fast worker never decrements below zero.
        self.counters.queued_firings.fetch_add(1, Ordering::Relaxed);
        match task_tx.try_send(firing) {
            Ok(()) => {
                self.counters.submitted_firings.fetch_add(1, Ordering::Relaxed);
                debug!(job = %job, "Firing submitted to worker pool");
                Ok(())
            }
            Err(TrySendError::Full(_)) => {
                self.counters.queued_firings.fetch_sub(1, Ordering::Relaxed);
                warn!(job = %job, "Worker pool queue is full");
                Err(PoolError::QueueFull)
            }
            Err(TrySendError::Disconnected(_)) => {
                self.counters.queued_firings.fetch_sub(1, Ordering::Relaxed);
                Err(PoolError::PoolShutdown)
            }
        }
    }

    /// Get current pool statistics.
    #[must_use]
    pub fn stats(&self) -> PoolStats {
        self.counters.snapshot(self.worker_count)
    }

    /// Whether `shutdown` has been requested.
    #[must_use]
    pub fn is_shutdown(&self) -> bool {
        self.shutdown.load(Ordering::Acquire)
    }

    /// Shut down the pool, waiting up to `timeout` for in-flight firings.
    ///
    /// Queued firings that have not started are discarded. Returns `true` if
    /// every worker exited within the timeout; workers still running after
    /// that are detached.
    pub fn shutdown(&self, timeout: Duration) -> bool {
        if self.shutdown.swap(true, Ordering::AcqRel) {
            return true;
        }

        info!("Shutting down worker pool");

        // Drop the sender to unblock all workers waiting on recv()
        {
            let mut task_tx = self.task_tx.lock();
            *task_tx = None;
        }

        let workers: Vec<JoinHandle<()>> = self.workers.lock().drain(..).collect();
        let worker_count = workers.len();

        let (tx, rx) = std::sync::mpsc::channel();
        let joiner = thread::spawn(move || {
            let mut panicked = 0usize;
            for worker in workers {
                if worker.join().is_err() {
                    panicked += 1;
                }
            }
            let _ = tx.send(panicked);
        });

        match rx.recv_timeout(timeout) {
            Ok(panicked) => {
                let _ = joiner.join();
                if panicked > 0 {
                    warn!(panicked = panicked, "Worker threads panicked");
                }
                info!(worker_count = worker_count, "Worker pool shut down complete");
                true
            }
            Err(_) => {
                warn!(
                    timeout_ms = u64::try_from(timeout.as_millis()).unwrap_or(u64::MAX),
                    "Worker pool did not drain within timeout - detaching"
                );
                false
            }
        }
    }
}

impl<E> Drop for WorkerPool<E>
where
    E: JobExecutor,
{
    fn drop(&mut self) {
        // Signal shutdown but don't join workers in Drop
        if !self.shutdown.swap(true, Ordering::AcqRel) {
            let mut task_tx = self.task_tx.lock();
            *task_tx = None;
            debug!("WorkerPool dropped without explicit shutdown - workers will be detached");
        }
    }
}

/// Spawn a worker thread.
fn spawn_worker<E>(
    worker_id: usize,
    task_rx: Receiver<Firing>,
    shared: WorkerShared<E>,
    stack_size: usize,
) -> std::io::Result<JoinHandle<()>>
where
    E: JobExecutor,
{
    thread::Builder::new()
        .name(format!("cron-worker-{worker_id}"))
        .stack_size(stack_size)
        .spawn(move || {
            debug!(worker_id = worker_id, "Worker thread started");

            let rt = match tokio::runtime::Builder::new_current_thread()
                .enable_all()
                .build()
            {
                Ok(rt) => rt,
                Err(e) => {
                    error!(
                        worker_id = worker_id,
                        error = %e,
                        "Failed to create worker runtime"
                    );
                    return;
                }
            };

            // When the sender is dropped, recv() drains what is left and then
            // returns Err.
            while let Ok(firing) = task_rx.recv() {
                shared.counters.queued_firings.fetch_sub(1, Ordering::Relaxed);

                if shared.shutdown.load(Ordering::Acquire) {
                    debug!(
                        worker_id = worker_id,
                        job = %firing.ctx.job_key,
                        "Discarding queued firing during shutdown"
                    );
                    continue;
                }

                run_firing(worker_id, &rt, &shared, firing);
            }

            debug!(worker_id = worker_id, "Worker thread exiting");
        })
}

fn run_firing<E>(worker_id: usize, rt: &tokio::runtime::Runtime, shared: &WorkerShared<E>, firing: Firing)
where
    E: JobExecutor,
{
    let job = firing.ctx.job_key.clone();

    if firing.exclusive && !shared.in_flight.lock().insert(job.clone()) {
        shared.counters.skipped_firings.fetch_add(1, Ordering::Relaxed);
        info!(
            worker_id = worker_id,
            job = %job,
            "Skipping firing: exclusive job is already executing"
        );
        return;
    }

    shared.counters.active_firings.fetch_add(1, Ordering::Relaxed);
    debug!(
        worker_id = worker_id,
        job = %job,
        fire_instance_id = %firing.ctx.fire_instance_id,
        kind = ?firing.ctx.kind,
        "Worker executing firing"
    );

    // Spawned so a panicking executor surfaces as a JoinError instead of
    // unwinding through the worker thread.
    let executor = shared.executor.clone();
    let ctx = firing.ctx;
    let outcome = rt.block_on(async move { tokio::spawn(async move { executor.execute(ctx).await }).await });

    match outcome {
        Ok(Ok(())) => {
            shared.counters.completed_firings.fetch_add(1, Ordering::Relaxed);
            debug!(worker_id = worker_id, job = %job, "Worker completed firing");
        }
        Ok(Err(e)) => {
            shared.counters.failed_firings.fetch_add(1, Ordering::Relaxed);
            error!(worker_id = worker_id, job = %job, error = %e, "Job execution failed");
        }
        Err(e) => {
            shared.counters.failed_firings.fetch_add(1, Ordering::Relaxed);
            error!(worker_id = worker_id, job = %job, error = %e, "Job execution panicked");
        }
    }

    shared.counters.active_firings.fetch_sub(1, Ordering::Relaxed);
    if firing.exclusive {
        shared.in_flight.lock().remove(&job);
    }
}
