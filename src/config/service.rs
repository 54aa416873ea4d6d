//! Service-level configuration: store backend, update rule, repair cadence.

use std::fmt::Display;
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use super::engine::EngineConfig;

/// Prefix of every environment variable read by [`ServiceConfig::from_env`].
pub const ENV_PREFIX: &str = "CRON_JOBS_";

/// Job store backend selection.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", tag = "kind")]
pub enum StoreBackendConfig {
    /// In-memory store for development/testing.
    #[default]
    InMemory,
    /// JSON-lines file store.
    File {
        /// Path of the snapshot file.
        path: PathBuf,
    },
}

/// Status applied to a job after a successful update.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum UpdateStatusRule {
    /// Every update leaves the job paused until explicitly resumed.
    #[default]
    ForcePause,
    /// A running job keeps running after update; a paused one stays paused.
    PreserveStatus,
}

impl FromStr for UpdateStatusRule {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "force_pause" => Ok(Self::ForcePause),
            "preserve_status" => Ok(Self::PreserveStatus),
            other => Err(format!("unknown update rule `{other}`")),
        }
    }
}

/// Root configuration for the reconciliation service.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ServiceConfig {
    /// Scheduling engine settings.
    pub engine: EngineConfig,
    /// Store backend.
    pub store: StoreBackendConfig,
    /// Status rule applied by `update_job`.
    pub update_rule: UpdateStatusRule,
    /// Period of the background repair pass; disabled when `None`.
    pub repair_interval_secs: Option<u64>,
}

impl ServiceConfig {
    /// Validate engine settings and service-level values.
    ///
    /// # Errors
    ///
    /// Returns a description of the first invalid field.
    pub fn validate(&self) -> Result<(), String> {
        self.engine
            .validate()
            .map_err(|e| format!("engine invalid: {e}"))?;
        if let StoreBackendConfig::File { path } = &self.store {
            if path.as_os_str().is_empty() {
                return Err("store path must not be empty".into());
            }
        }
        if self.repair_interval_secs == Some(0) {
            return Err("repair_interval_secs must be greater than 0".into());
        }
        Ok(())
    }

    /// Repair loop period, if enabled.
    #[must_use]
    pub fn repair_interval(&self) -> Option<Duration> {
        self.repair_interval_secs.map(Duration::from_secs)
    }

    /// Parse configuration from a JSON string and validate.
    ///
    /// # Errors
    ///
    /// Returns a parse or validation message.
    pub fn from_json_str(input: &str) -> Result<Self, String> {
        let cfg: Self = serde_json::from_str(input).map_err(|e| format!("parse error: {e}"))?;
        cfg.validate()?;
        Ok(cfg)
    }

    /// Load configuration from the process environment, reading a `.env` file
    /// first when one exists.
    ///
    /// # Errors
    ///
    /// Returns a message naming the variable that failed to parse, or a
    /// validation message.
    pub fn from_env() -> Result<Self, String> {
        if let Ok(path) = dotenvy::dotenv() {
            tracing::debug!(path = %path.display(), "loaded .env file");
        }
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Build configuration from an arbitrary variable lookup.
    ///
    /// Recognised variables (all prefixed with `CRON_JOBS_`): `WORKER_COUNT`,
    /// `MAX_QUEUE_DEPTH`, `THREAD_STACK_SIZE`, `MISFIRE_THRESHOLD_MS`,
    /// `SHUTDOWN_TIMEOUT_SECS`, `STORE_PATH`, `UPDATE_RULE`,
    /// `REPAIR_INTERVAL_SECS`.
    ///
    /// # Errors
    ///
    /// Returns a message naming the variable that failed to parse, or a
    /// validation message.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, String>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |suffix: &str| lookup(&format!("{ENV_PREFIX}{suffix}"));
        let mut cfg = Self::default();

        if let Some(v) = parse_var(&get, "WORKER_COUNT")? {
            cfg.engine.worker_count = v;
        }
        if let Some(v) = parse_var(&get, "MAX_QUEUE_DEPTH")? {
            cfg.engine.max_queue_depth = v;
        }
        if let Some(v) = parse_var(&get, "THREAD_STACK_SIZE")? {
            cfg.engine.thread_stack_size = v;
        }
        if let Some(v) = parse_var(&get, "MISFIRE_THRESHOLD_MS")? {
            cfg.engine.misfire_threshold_ms = v;
        }
        if let Some(v) = parse_var(&get, "SHUTDOWN_TIMEOUT_SECS")? {
            cfg.engine.shutdown_timeout_secs = v;
        }
        if let Some(path) = get("STORE_PATH") {
            cfg.store = StoreBackendConfig::File { path: path.into() };
        }
        if let Some(rule) = parse_var(&get, "UPDATE_RULE")? {
            cfg.update_rule = rule;
        }
        if let Some(secs) = parse_var(&get, "REPAIR_INTERVAL_SECS")? {
            cfg.repair_interval_secs = Some(secs);
        }

        cfg.validate()?;
        Ok(cfg)
    }
}

fn parse_var<T, G>(get: &G, suffix: &str) -> Result<Option<T>, String>
where
    T: FromStr,
    T::Err: Display,
    G: Fn(&str) -> Option<String>,
{
    get(suffix)
        .map(|raw| {
            raw.trim()
                .parse::<T>()
                .map_err(|e| format!("{ENV_PREFIX}{suffix}: {e}"))
        })
        .transpose()
}
