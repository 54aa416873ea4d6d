//! Scheduling engine and worker pool configuration.

use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Engine configuration: worker pool sizing, misfire detection, and drain.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Number of worker threads executing firings.
    pub worker_count: usize,
    /// Maximum firings waiting for a free worker.
    pub max_queue_depth: usize,
    /// Stack size for each worker thread in bytes.
    pub thread_stack_size: usize,
    /// How late a firing may be before it counts as a misfire.
    pub misfire_threshold_ms: u64,
    /// Upper bound for waiting on in-flight firings during shutdown.
    pub shutdown_timeout_secs: u64,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            worker_count: 10,
            max_queue_depth: 256,
            thread_stack_size: 2 * 1024 * 1024,
            misfire_threshold_ms: 60_000,
            shutdown_timeout_secs: 30,
        }
    }
}

impl EngineConfig {
    /// Create a configuration with default values.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the number of worker threads.
    #[must_use]
    pub const fn with_worker_count(mut self, worker_count: usize) -> Self {
        self.worker_count = worker_count;
        self
    }

    /// Set the maximum queue depth.
    #[must_use]
    pub const fn with_max_queue_depth(mut self, max_queue_depth: usize) -> Self {
        self.max_queue_depth = max_queue_depth;
        self
    }

    /// Set the worker thread stack size.
    #[must_use]
    pub const fn with_thread_stack_size(mut self, thread_stack_size: usize) -> Self {
        self.thread_stack_size = thread_stack_size;
        self
    }

    /// Set the misfire threshold.
    #[must_use]
    #[allow(clippy::cast_possible_truncation)]
    pub const fn with_misfire_threshold(mut self, threshold: Duration) -> Self {
        self.misfire_threshold_ms = threshold.as_millis() as u64;
        self
    }

    /// Set the shutdown drain timeout.
    #[must_use]
    pub const fn with_shutdown_timeout(mut self, timeout: Duration) -> Self {
        self.shutdown_timeout_secs = timeout.as_secs();
        self
    }

    /// Misfire threshold as a `chrono` duration.
    #[must_use]
    #[allow(clippy::cast_possible_wrap)]
    pub const fn misfire_threshold(&self) -> chrono::Duration {
        chrono::Duration::milliseconds(self.misfire_threshold_ms as i64)
    }

    /// Shutdown drain timeout.
    #[must_use]
    pub const fn shutdown_timeout(&self) -> Duration {
        Duration::from_secs(self.shutdown_timeout_secs)
    }

    /// Validate configuration values.
    ///
    /// # Errors
    ///
    /// Returns a description of the first invalid field.
    pub fn validate(&self) -> Result<(), String> {
        if self.worker_count == 0 {
            return Err("worker_count must be greater than 0".into());
        }
        if self.max_queue_depth == 0 {
            return Err("max_queue_depth must be greater than 0".into());
        }
        if self.thread_stack_size < 64 * 1024 {
            return Err("thread_stack_size must be at least 64 KiB".into());
        }
        if self.misfire_threshold_ms > i64::MAX as u64 {
            return Err("misfire_threshold_ms is out of range".into());
        }
        Ok(())
    }
}
