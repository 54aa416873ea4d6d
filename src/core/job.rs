//! Job identity, persisted definition, and run state.

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Surrogate key assigned by the job store.
pub type JobId = u64;

/// Compound job identifier `(name, group)`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct JobKey {
    /// Job name, unique within its group.
    pub name: String,
    /// Job group.
    pub group: String,
}

impl JobKey {
    /// Create a key from name and group.
    pub fn new(name: impl Into<String>, group: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            group: group.into(),
        }
    }

    /// Key of the cron trigger attached to this job.
    #[must_use]
    pub fn trigger_key(&self) -> TriggerKey {
        TriggerKey::for_job(self)
    }
}

impl fmt::Display for JobKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}", self.group, self.name)
    }
}

/// Identifier of an engine trigger.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct TriggerKey {
    /// Trigger name.
    pub name: String,
    /// Trigger group (same as the job's group).
    pub group: String,
}

impl TriggerKey {
    /// Suffix appended to the job name to form its trigger name.
    pub const SUFFIX: &'static str = "Trigger";

    /// Create a trigger key from name and group.
    pub fn new(name: impl Into<String>, group: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            group: group.into(),
        }
    }

    /// Trigger key derived from a job key: `(name + "Trigger", group)`.
    #[must_use]
    pub fn for_job(job: &JobKey) -> Self {
        Self {
            name: format!("{}{}", job.name, Self::SUFFIX),
            group: job.group.clone(),
        }
    }
}

impl fmt::Display for TriggerKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}", self.group, self.name)
    }
}

/// Desired run state of a persisted job.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum JobStatus {
    /// Job fires according to its schedule.
    #[default]
    Running,
    /// Job is registered but does not fire.
    Paused,
}

impl JobStatus {
    /// Wire/storage name of the status.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Running => "RUNNING",
            Self::Paused => "PAUSED",
        }
    }
}

impl fmt::Display for JobStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// What a trigger does when its firing window was missed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum MisfirePolicy {
    /// Skip the missed firing and wait for the next natural occurrence.
    DoNothing,
    /// Fire once immediately on recovery, then resume the normal cadence.
    FireAndProceed,
}

/// Persisted job definition.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct JobDefinition {
    /// Surrogate key; `None` until first saved.
    #[serde(default)]
    pub id: Option<JobId>,
    /// Job name.
    pub job_name: String,
    /// Job group.
    pub job_group: String,
    /// Free-form description handed to the executor.
    #[serde(default)]
    pub description: String,
    /// Cron expression driving the trigger.
    pub cron_expression: String,
    /// Desired state; defaults to running when absent on create.
    #[serde(default)]
    pub status: Option<JobStatus>,
    /// Skip firings that overlap a running firing of the same job.
    #[serde(default)]
    pub exclusive: bool,
    /// Set by the store on first save.
    #[serde(default)]
    pub created_at: Option<DateTime<Utc>>,
    /// Set by the store on every save.
    #[serde(default)]
    pub updated_at: Option<DateTime<Utc>>,
}

impl JobDefinition {
    /// Create an unsaved definition with no explicit status.
    pub fn new(
        job_name: impl Into<String>,
        job_group: impl Into<String>,
        cron_expression: impl Into<String>,
    ) -> Self {
        Self {
            id: None,
            job_name: job_name.into(),
            job_group: job_group.into(),
            description: String::new(),
            cron_expression: cron_expression.into(),
            status: None,
            exclusive: false,
            created_at: None,
            updated_at: None,
        }
    }

    /// Set the description.
    #[must_use]
    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }

    /// Set the desired status.
    #[must_use]
    pub const fn with_status(mut self, status: JobStatus) -> Self {
        self.status = Some(status);
        self
    }

    /// Set the id (used for updates).
    #[must_use]
    pub const fn with_id(mut self, id: JobId) -> Self {
        self.id = Some(id);
        self
    }

    /// Mark the job as non-reentrant.
    #[must_use]
    pub const fn with_exclusive(mut self, exclusive: bool) -> Self {
        self.exclusive = exclusive;
        self
    }

    /// The `(name, group)` key of this definition.
    #[must_use]
    pub fn key(&self) -> JobKey {
        JobKey::new(self.job_name.clone(), self.job_group.clone())
    }

    /// Effective status, treating an unset status as running.
    #[must_use]
    pub fn effective_status(&self) -> JobStatus {
        self.status.unwrap_or_default()
    }

    /// Whether the stored status is paused.
    #[must_use]
    pub fn is_paused(&self) -> bool {
        self.effective_status() == JobStatus::Paused
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_trigger_key_for_job() {
        let key = JobKey::new("ReportJob", "default");
        let trigger = key.trigger_key();
        assert_eq!(trigger.name, "ReportJobTrigger");
        assert_eq!(trigger.group, "default");
        assert_eq!(trigger.to_string(), "default.ReportJobTrigger");
    }

    #[test]
    fn test_status_wire_format() {
        assert_eq!(serde_json::to_string(&JobStatus::Paused).unwrap(), "\"PAUSED\"");
        let status: JobStatus = serde_json::from_str("\"RUNNING\"").unwrap();
        assert_eq!(status, JobStatus::Running);
    }

    #[test]
    fn test_definition_camel_case() {
        let json = r#"{"jobName":"ReportJob","jobGroup":"default","cronExpression":"0 0 * * * ?","description":"daily report"}"#;
        let def: JobDefinition = serde_json::from_str(json).unwrap();
        assert_eq!(def.key(), JobKey::new("ReportJob", "default"));
        assert_eq!(def.status, None);
        assert_eq!(def.effective_status(), JobStatus::Running);
        assert!(!def.exclusive);
    }
}
