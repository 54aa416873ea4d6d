//! Cron triggers and misfire handling.
//!
//! A trigger tracks the next occurrence of its schedule and a watermark: every
//! occurrence at or before the watermark has either fired or been skipped on
//! purpose. A replacement trigger continues from the old watermark, so
//! occurrences missed while a job was paused surface as a misfire and the
//! replacement's policy decides what happens to them.

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

use crate::core::executor::FireKind;
use crate::core::job::{JobKey, MisfirePolicy, TriggerKey};
use crate::core::schedule::CronSchedule;

/// Whether a trigger is allowed to fire.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TriggerState {
    /// Fires on schedule.
    Normal,
    /// Registered but frozen.
    Paused,
}

/// Read-only view of a trigger.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TriggerInfo {
    /// Trigger identity.
    pub key: TriggerKey,
    /// Job the trigger fires.
    pub job_key: JobKey,
    /// Cron expression of the trigger.
    pub cron_expression: String,
    /// Misfire policy chosen when the trigger was installed.
    pub misfire_policy: MisfirePolicy,
    /// Normal or paused.
    pub state: TriggerState,
    /// Next occurrence, if the schedule has one.
    pub next_fire_time: Option<DateTime<Utc>>,
    /// Last time this trigger fired.
    pub previous_fire_time: Option<DateTime<Utc>>,
}

/// Outcome of evaluating a due trigger.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum DueAction {
    /// Dispatch a firing for the given occurrence.
    Fire {
        scheduled: DateTime<Utc>,
        kind: FireKind,
    },
    /// The occurrence was missed and the policy drops it.
    Skip { missed: DateTime<Utc> },
}

/// A cron trigger registered in the engine.
#[derive(Debug, Clone)]
pub struct EngineTrigger {
    key: TriggerKey,
    job_key: JobKey,
    schedule: CronSchedule,
    misfire_policy: MisfirePolicy,
    state: TriggerState,
    next_fire_time: Option<DateTime<Utc>>,
    previous_fire_time: Option<DateTime<Utc>>,
    watermark: DateTime<Utc>,
}

impl EngineTrigger {
    /// Create a trigger whose first occurrence follows `now`.
    #[must_use]
    pub fn new(
        key: TriggerKey,
        job_key: JobKey,
        schedule: CronSchedule,
        misfire_policy: MisfirePolicy,
        now: DateTime<Utc>,
    ) -> Self {
        let next_fire_time = schedule.next_after(&now);
        Self {
            key,
            job_key,
            schedule,
            misfire_policy,
            state: TriggerState::Normal,
            next_fire_time,
            previous_fire_time: None,
            watermark: now,
        }
    }

    /// Create a replacement for `old` that continues from its watermark.
    #[must_use]
    pub fn replacing(old: &Self, schedule: CronSchedule, misfire_policy: MisfirePolicy) -> Self {
        let next_fire_time = schedule.next_after(&old.watermark);
        Self {
            key: old.key.clone(),
            job_key: old.job_key.clone(),
            schedule,
            misfire_policy,
            state: TriggerState::Normal,
            next_fire_time,
            previous_fire_time: old.previous_fire_time,
            watermark: old.watermark,
        }
    }

    /// Trigger identity.
    #[must_use]
    pub const fn key(&self) -> &TriggerKey {
        &self.key
    }

    /// Job fired by this trigger.
    #[must_use]
    pub const fn job_key(&self) -> &JobKey {
        &self.job_key
    }

    /// Cron expression of this trigger.
    #[must_use]
    pub fn cron_expression(&self) -> &str {
        self.schedule.expression()
    }

    /// Misfire policy of this trigger.
    #[must_use]
    pub const fn misfire_policy(&self) -> MisfirePolicy {
        self.misfire_policy
    }

    /// Current state.
    #[must_use]
    pub const fn state(&self) -> TriggerState {
        self.state
    }

    /// Next occurrence.
    #[must_use]
    pub const fn next_fire_time(&self) -> Option<DateTime<Utc>> {
        self.next_fire_time
    }

    /// Freeze firing; the next occurrence is kept.
    pub fn pause(&mut self) {
        self.state = TriggerState::Paused;
    }

    /// Whether the schedule has no further occurrences.
    #[must_use]
    pub const fn is_complete(&self) -> bool {
        self.next_fire_time.is_none()
    }

    /// Next instant the timer must wake up for this trigger.
    #[must_use]
    pub fn wakeup_time(&self) -> Option<DateTime<Utc>> {
        match self.state {
            TriggerState::Normal => self.next_fire_time,
            TriggerState::Paused => None,
        }
    }

    /// Evaluate the trigger at `now` and advance it past the due occurrence.
    ///
    /// Returns `None` if the trigger is paused or not yet due.
    pub(crate) fn advance(&mut self, now: DateTime<Utc>, misfire_threshold: Duration) -> Option<DueAction> {
        if self.state == TriggerState::Paused {
            return None;
        }
        let scheduled = self.next_fire_time?;
        if scheduled > now {
            return None;
        }

        if now - scheduled > misfire_threshold {
            self.next_fire_time = self.schedule.next_after(&now);
            self.watermark = now;
            return match self.misfire_policy {
                MisfirePolicy::DoNothing => Some(DueAction::Skip { missed: scheduled }),
                MisfirePolicy::FireAndProceed => {
                    self.previous_fire_time = Some(now);
                    Some(DueAction::Fire {
                        scheduled,
                        kind: FireKind::MisfireRecovery,
                    })
                }
            };
        }

        self.previous_fire_time = Some(scheduled);
        self.watermark = scheduled;
        self.next_fire_time = self.schedule.next_after(&scheduled);
        Some(DueAction::Fire {
            scheduled,
            kind: FireKind::Scheduled,
        })
    }

    /// Snapshot for callers outside the engine.
    #[must_use]
    pub fn info(&self) -> TriggerInfo {
        TriggerInfo {
            key: self.key.clone(),
            job_key: self.job_key.clone(),
            cron_expression: self.schedule.expression().to_string(),
            misfire_policy: self.misfire_policy,
            state: self.state,
            next_fire_time: self.next_fire_time,
            previous_fire_time: self.previous_fire_time,
        }
    }
}
