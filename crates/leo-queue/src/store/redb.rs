//! Durable [`JobStore`] backed by redb.
//!
//! # Table design
//!
//! `JOBS` maps `"<queue>\0<job id>"` to the JSON-encoded [`Job`]. The queue
//! name prefix makes every per-queue operation a single range scan from
//! `"<queue>\0"` up to `"<queue>\x01"`. `META` holds the insertion sequence
//! counter.

use std::path::Path;

use ::redb::{Database, ReadableTable, TableDefinition};
use chrono::{DateTime, Utc};

use super::{pick_next, InsertOutcome, JobStore};
use crate::error::Result;
use crate::job::{Job, JobCounts, JobState};
use crate::names::QueueName;

// ---------------------------------------------------------------------------
// Table definitions
// ---------------------------------------------------------------------------

const JOBS: TableDefinition<&str, &[u8]> = TableDefinition::new("jobs");
const META: TableDefinition<&str, u64> = TableDefinition::new("meta");
const SEQ_KEY: &str = "seq";

fn job_key(queue: QueueName, id: &str) -> String {
    format!("{}\0{}", queue.as_str(), id)
}

fn queue_range(queue: QueueName) -> (String, String) {
    (
        format!("{}\0", queue.as_str()),
        format!("{}\u{1}", queue.as_str()),
    )
}

// ---------------------------------------------------------------------------
// RedbJobStore
// ---------------------------------------------------------------------------

pub struct RedbJobStore {
    db: Database,
}

impl RedbJobStore {
    /// Open or create the database at `path`, creating parent directories.
    ///
    /// Jobs left `Active` by a previous process are moved back to `Waiting`.
    pub fn open(path: &Path) -> Result<Self> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let db = Database::create(path)?;
        let wt = db.begin_write()?;
        wt.open_table(JOBS)?;
        wt.open_table(META)?;
        wt.commit()?;

        let store = Self { db };
        let recovered = store.recover_stalled()?;
        if recovered > 0 {
            tracing::warn!(recovered, path = %path.display(), "requeued stalled jobs");
        }
        Ok(store)
    }

    fn queue_jobs(&self, queue: QueueName) -> Result<Vec<Job>> {
        let (start, end) = queue_range(queue);
        let rt = self.db.begin_read()?;
        let table = rt.open_table(JOBS)?;
        let mut jobs = Vec::new();
        for entry in table.range(start.as_str()..end.as_str())? {
            let (_, v) = entry?;
            jobs.push(serde_json::from_slice(v.value())?);
        }
        Ok(jobs)
    }
}

impl JobStore for RedbJobStore {
    fn insert(&self, mut job: Job) -> Result<InsertOutcome> {
        let key = job_key(job.queue, &job.id);
        let wt = self.db.begin_write()?;
        let outcome = {
            let mut jobs = wt.open_table(JOBS)?;
            let existing: Option<Job> = match jobs.get(key.as_str())? {
                Some(v) => Some(serde_json::from_slice(v.value())?),
                None => None,
            };
            match existing {
                Some(existing) => InsertOutcome::Existing(existing),
                None => {
                    let mut meta = wt.open_table(META)?;
                    let seq = meta.get(SEQ_KEY)?.map(|v| v.value()).unwrap_or(0) + 1;
                    meta.insert(SEQ_KEY, seq)?;
                    job.seq = seq;
                    let value = serde_json::to_vec(&job)?;
                    jobs.insert(key.as_str(), value.as_slice())?;
                    InsertOutcome::Inserted(job)
                }
            }
        };
        wt.commit()?;
        Ok(outcome)
    }

    fn claim_next(&self, queue: QueueName, now: DateTime<Utc>) -> Result<Option<Job>> {
        let (start, end) = queue_range(queue);
        let wt = self.db.begin_write()?;
        let claimed = {
            let mut table = wt.open_table(JOBS)?;
            let mut candidates = Vec::new();
            for entry in table.range(start.as_str()..end.as_str())? {
                let (_, v) = entry?;
                let job: Job = serde_json::from_slice(v.value())?;
                if job.is_claimable(now) {
                    candidates.push(job);
                }
            }
            match pick_next(candidates.iter(), now).cloned() {
                Some(mut job) => {
                    job.activate(now);
                    let value = serde_json::to_vec(&job)?;
                    table
                        .insert(job_key(queue, &job.id).as_str(), value.as_slice())?;
                    Some(job)
                }
                None => None,
            }
        };
        wt.commit()?;
        Ok(claimed)
    }

    fn update(&self, job: &Job) -> Result<()> {
        let value = serde_json::to_vec(job)?;
        let wt = self.db.begin_write()?;
        {
            let mut table = wt.open_table(JOBS)?;
            table
                .insert(job_key(job.queue, &job.id).as_str(), value.as_slice())?;
        }
        wt.commit()?;
        Ok(())
    }

    fn get(&self, queue: QueueName, id: &str) -> Result<Option<Job>> {
        let rt = self.db.begin_read()?;
        let table = rt.open_table(JOBS)?;
        let key = job_key(queue, id);
        match table.get(key.as_str())? {
            Some(v) => Ok(Some(serde_json::from_slice(v.value())?)),
            None => Ok(None),
        }
    }

    fn counts(&self, queue: QueueName) -> Result<JobCounts> {
        let mut counts = JobCounts::default();
        for job in self.queue_jobs(queue)? {
            counts.record(job.state);
        }
        Ok(counts)
    }

    fn recover_stalled(&self) -> Result<usize> {
        let wt = self.db.begin_write()?;
        let recovered = {
            let mut table = wt.open_table(JOBS)?;
            let mut stalled = Vec::new();
            for entry in table.iter()? {
                let (k, v) = entry?;
                let job: Job = serde_json::from_slice(v.value())?;
                if job.state == JobState::Active {
                    stalled.push((k.value().to_string(), job));
                }
            }
            for (key, mut job) in stalled.iter().cloned() {
                job.state = JobState::Waiting;
                job.updated_at = Utc::now();
                let value = serde_json::to_vec(&job)?;
                table
                    .insert(key.as_str(), value.as_slice())?;
            }
            stalled.len()
        };
        wt.commit()?;
        Ok(recovered)
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
