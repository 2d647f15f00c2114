//! Job data model.
//!
//! Lifecycle: `Waiting | Delayed → Active → Completed | Failed`. A failed
//! attempt with attempts remaining goes back to `Delayed` until its backoff
//! elapses.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::time::Duration;
use uuid::Uuid;

use crate::names::QueueName;

// ---------------------------------------------------------------------------
// JobState
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JobState {
    Waiting,
    Delayed,
    Active,
    Completed,
    Failed,
}

// ---------------------------------------------------------------------------
// Backoff
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Backoff {
    Fixed { delay_ms: u64 },
    /// `delay_ms * 2^(attempts_made - 1)`.
    Exponential { delay_ms: u64 },
}

impl Default for Backoff {
    fn default() -> Self {
        Backoff::Exponential { delay_ms: 1000 }
    }
}

impl Backoff {
    /// Delay before the retry that follows failed attempt number `attempts_made`.
    pub fn delay(&self, attempts_made: u32) -> Duration {
        match *self {
            Backoff::Fixed { delay_ms } => Duration::from_millis(delay_ms),
            Backoff::Exponential { delay_ms } => {
                let exp = attempts_made.saturating_sub(1).min(20);
                Duration::from_millis(delay_ms.saturating_mul(1u64 << exp))
            }
        }
    }
}

// ---------------------------------------------------------------------------
// JobOptions
// ---------------------------------------------------------------------------

/// Per-job overrides applied when a job is added.
#[derive(Debug, Clone, Default)]
pub struct JobOptions {
    /// Explicit job id. A job with the same id already in the queue is
    /// returned instead of inserting a new one.
    pub job_id: Option<String>,
    pub delay: Option<Duration>,
    pub attempts: Option<u32>,
    pub backoff: Option<Backoff>,
}

// ---------------------------------------------------------------------------
// Job
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Job {
    pub id: String,
    pub queue: QueueName,
    pub data: serde_json::Value,
    pub state: JobState,
    pub attempts_made: u32,
    pub max_attempts: u32,
    pub backoff: Backoff,
    /// Not claimable before this instant.
    pub available_at: DateTime<Utc>,
    /// Insertion order within the store; assigned on insert.
    #[serde(default)]
    pub seq: u64,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub failed_reason: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub return_value: Option<serde_json::Value>,
}

impl Job {
    pub fn new(
        queue: QueueName,
        data: serde_json::Value,
        opts: JobOptions,
        default_attempts: u32,
        default_backoff: Backoff,
    ) -> Self {
        let now = Utc::now();
        let (state, available_at) = match opts.delay {
            Some(d) if !d.is_zero() => (JobState::Delayed, now + to_chrono(d)),
            _ => (JobState::Waiting, now),
        };
        Self {
            id: opts.job_id.unwrap_or_else(|| Uuid::new_v4().to_string()),
            queue,
            data,
            state,
            attempts_made: 0,
            max_attempts: opts.attempts.unwrap_or(default_attempts).max(1),
            backoff: opts.backoff.unwrap_or(default_backoff),
            available_at,
            seq: 0,
            created_at: now,
            updated_at: now,
            failed_reason: None,
            return_value: None,
        }
    }

    /// Whether a worker may pick this job up at `now`.
    pub fn is_claimable(&self, now: DateTime<Utc>) -> bool {
        match self.state {
            JobState::Waiting => true,
            JobState::Delayed => self.available_at <= now,
            _ => false,
        }
    }

    pub fn activate(&mut self, now: DateTime<Utc>) {
        self.state = JobState::Active;
        self.updated_at = now;
    }

    pub fn complete(&mut self, value: serde_json::Value) {
        self.attempts_made += 1;
        self.state = JobState::Completed;
        self.return_value = Some(value);
        self.failed_reason = None;
        self.updated_at = Utc::now();
    }

    /// Record a failed attempt. Returns `true` if the job will be retried.
    pub fn fail(&mut self, reason: impl Into<String>) -> bool {
        let now = Utc::now();
        self.attempts_made += 1;
        self.failed_reason = Some(reason.into());
        self.updated_at = now;
        if self.attempts_made < self.max_attempts {
            self.state = JobState::Delayed;
            self.available_at = now + to_chrono(self.backoff.delay(self.attempts_made));
            true
        } else {
            self.state = JobState::Failed;
            false
        }
    }
}

fn to_chrono(d: Duration) -> chrono::Duration {
    chrono::Duration::from_std(d).unwrap_or_else(|_| chrono::Duration::days(36_500))
}

// ---------------------------------------------------------------------------
// JobCounts
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct JobCounts {
    pub waiting: u64,
    pub active: u64,
    pub completed: u64,
    pub failed: u64,
    pub delayed: u64,
}

impl JobCounts {
    pub fn record(&mut self, state: JobState) {
        match state {
            JobState::Waiting => self.waiting += 1,
            JobState::Active => self.active += 1,
            JobState::Completed => self.completed += 1,
            JobState::Failed => self.failed += 1,
            JobState::Delayed => self.delayed += 1,
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
