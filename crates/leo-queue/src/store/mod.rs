//! Job persistence.
//!
//! Stores are synchronous and each operation is atomic: `claim_next` picks
//! the oldest claimable job and marks it active in one step, so two workers
//! never run the same job.

use chrono::{DateTime, Utc};

use crate::error::Result;
use crate::job::{Job, JobCounts};
use crate::names::QueueName;

pub mod memory;
pub mod redb;

pub use self::memory::MemoryJobStore;
pub use self::redb::RedbJobStore;

/// Result of [`JobStore::insert`].
#[derive(Debug, Clone, PartialEq)]
pub enum InsertOutcome {
    Inserted(Job),
    /// A job with the same id was already in the queue; nothing was written.
    Existing(Job),
}

impl InsertOutcome {
    pub fn job(&self) -> &Job {
        match self {
            InsertOutcome::Inserted(j) | InsertOutcome::Existing(j) => j,
        }
    }

    pub fn into_job(self) -> Job {
        match self {
            InsertOutcome::Inserted(j) | InsertOutcome::Existing(j) => j,
        }
    }

    pub fn is_duplicate(&self) -> bool {
        matches!(self, InsertOutcome::Existing(_))
    }
}

pub trait JobStore: Send + Sync {
    /// Insert `job` unless its id already exists in the same queue.
    /// Assigns `job.seq`.
    fn insert(&self, job: Job) -> Result<InsertOutcome>;

    /// Mark the next claimable job of `queue` active and return it.
    ///
    /// Ordering is by `(available_at, seq)`.
    fn claim_next(&self, queue: QueueName, now: DateTime<Utc>) -> Result<Option<Job>>;

    /// Overwrite a job previously returned by this store.
    fn update(&self, job: &Job) -> Result<()>;

    fn get(&self, queue: QueueName, id: &str) -> Result<Option<Job>>;

    fn counts(&self, queue: QueueName) -> Result<JobCounts>;

    /// Move every `Active` job back to `Waiting`. Returns how many moved.
    fn recover_stalled(&self) -> Result<usize>;
}

/// The best claimable job among `jobs`.
pub(crate) fn pick_next<'a>(
    jobs: impl Iterator<Item = &'a Job>,
    now: DateTime<Utc>,
) -> Option<&'a Job> {
    jobs.filter(|j| j.is_claimable(now))
        .min_by_key(|j| (j.available_at, j.seq))
}
