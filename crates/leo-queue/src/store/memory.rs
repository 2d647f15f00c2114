use std::collections::BTreeMap;
use std::sync::Mutex;

use chrono::{DateTime, Utc};

use super::{pick_next, InsertOutcome, JobStore};
use crate::error::Result;
use crate::job::{Job, JobCounts, JobState};
use crate::names::QueueName;

#[derive(Default)]
struct State {
    jobs: BTreeMap<(QueueName, String), Job>,
    seq: u64,
}

/// In-process [`JobStore`]. Nothing survives the process.
#[derive(Default)]
pub struct MemoryJobStore {
    state: Mutex<State>,
}

impl MemoryJobStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, State> {
        self.state.lock().unwrap_or_else(|e| e.into_inner())
    }
}

impl JobStore for MemoryJobStore {
    fn insert(&self, mut job: Job) -> Result<InsertOutcome> {
        let mut st = self.lock();
        let key = (job.queue, job.id.clone());
        if let Some(existing) = st.jobs.get(&key) {
            return Ok(InsertOutcome::Existing(existing.clone()));
        }
        st.seq += 1;
        job.seq = st.seq;
        st.jobs.insert(key, job.clone());
        Ok(InsertOutcome::Inserted(job))
    }

    fn claim_next(&self, queue: QueueName, now: DateTime<Utc>) -> Result<Option<Job>> {
        let mut st = self.lock();
        let Some(key) = pick_next(st.jobs.values().filter(|j| j.queue == queue), now)
            .map(|j| (j.queue, j.id.clone()))
        else {
            return Ok(None);
        };
        let job = st.jobs.get_mut(&key).map(|j| {
            j.activate(now);
            j.clone()
        });
        Ok(job)
    }

    fn update(&self, job: &Job) -> Result<()> {
        self.lock()
            .jobs
            .insert((job.queue, job.id.clone()), job.clone());
        Ok(())
    }

    fn get(&self, queue: QueueName, id: &str) -> Result<Option<Job>> {
        Ok(self.lock().jobs.get(&(queue, id.to_string())).cloned())
    }

    fn counts(&self, queue: QueueName) -> Result<JobCounts> {
        let mut counts = JobCounts::default();
        for job in self.lock().jobs.values().filter(|j| j.queue == queue) {
            counts.record(job.state);
        }
        Ok(counts)
    }

    fn recover_stalled(&self) -> Result<usize> {
        let mut n = 0;
        for job in self.lock().jobs.values_mut() {
            if job.state == JobState::Active {
                job.state = JobState::Waiting;
                job.updated_at = Utc::now();
                n += 1;
            }
        }
        Ok(n)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::job::{Backoff, JobOptions};
    use serde_json::json;

    fn job(queue: QueueName, id: Option<&str>) -> Job {
        Job::new(
            queue,
            json!({}),
            JobOptions {
                job_id: id.map(String::from),
                ..Default::default()
            },
            3,
            Backoff::default(),
        )
    }

    #[test]
    fn duplicate_id_returns_existing() {
        let store = MemoryJobStore::new();
        let first = store.insert(job(QueueName::PublishX, Some("k1"))).unwrap();
        assert!(!first.is_duplicate());
        let second = store.insert(job(QueueName::PublishX, Some("k1"))).unwrap();
        assert!(second.is_duplicate());
        assert_eq!(second.job().seq, first.job().seq);
        assert_eq!(store.counts(QueueName::PublishX).unwrap().waiting, 1);
    }

    #[test]
    fn same_id_in_different_queues_is_distinct() {
        let store = MemoryJobStore::new();
        store.insert(job(QueueName::PublishX, Some("k1"))).unwrap();
        let other = store
            .insert(job(QueueName::PublishBluesky, Some("k1")))
            .unwrap();
        assert!(!other.is_duplicate());
    }

    #[test]
    fn claim_is_fifo_and_marks_active() {
        let store = MemoryJobStore::new();
        let a = store
            .insert(job(QueueName::DailyRollup, None))
            .unwrap()
            .into_job();
        let b = store
            .insert(job(QueueName::DailyRollup, None))
            .unwrap()
            .into_job();
        let now = Utc::now() + chrono::Duration::seconds(1);

        let first = store.claim_next(QueueName::DailyRollup, now).unwrap().unwrap();
        assert_eq!(first.id, a.id);
        assert_eq!(first.state, JobState::Active);
        let second = store.claim_next(QueueName::DailyRollup, now).unwrap().unwrap();
        assert_eq!(second.id, b.id);
        assert!(store.claim_next(QueueName::DailyRollup, now).unwrap().is_none());
        assert_eq!(store.counts(QueueName::DailyRollup).unwrap().active, 2);
    }

    #[test]
    fn recover_stalled_requeues_active_jobs() {
        let store = MemoryJobStore::new();
        store.insert(job(QueueName::ContentReview, None)).unwrap();
        store
            .claim_next(QueueName::ContentReview, Utc::now())
            .unwrap()
            .unwrap();
        assert_eq!(store.recover_stalled().unwrap(), 1);
        assert_eq!(store.counts(QueueName::ContentReview).unwrap().waiting, 1);
    }
}
