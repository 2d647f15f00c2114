use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use serde_json::Value;
use tokio::sync::Notify;

use crate::error::{QueueError, Result};
use crate::job::{Backoff, Job, JobCounts, JobOptions};
use crate::names::QueueName;
use crate::store::{InsertOutcome, JobStore};

struct Inner {
    name: QueueName,
    concurrency: usize,
    attempts: u32,
    backoff: Backoff,
    store: Arc<dyn JobStore>,
    notify: Notify,
    closed: AtomicBool,
}

/// A named job queue. Cloning yields another handle to the same queue.
#[derive(Clone)]
pub struct Queue {
    inner: Arc<Inner>,
}

impl Queue {
    pub fn new(
        name: QueueName,
        store: Arc<dyn JobStore>,
        concurrency: usize,
        attempts: u32,
        backoff: Backoff,
    ) -> Self {
        Self {
            inner: Arc::new(Inner {
                name,
                concurrency: concurrency.max(1),
                attempts,
                backoff,
                store,
                notify: Notify::new(),
                closed: AtomicBool::new(false),
            }),
        }
    }

    pub fn name(&self) -> QueueName {
        self.inner.name
    }

    pub fn concurrency(&self) -> usize {
        self.inner.concurrency
    }

    pub fn default_attempts(&self) -> u32 {
        self.inner.attempts
    }

    pub fn default_backoff(&self) -> Backoff {
        self.inner.backoff
    }

    pub fn store(&self) -> &Arc<dyn JobStore> {
        &self.inner.store
    }

    /// Enqueue `data`. If `opts.job_id` names a job already in this queue,
    /// that job is returned and nothing is inserted.
    pub fn add(&self, data: Value, opts: JobOptions) -> Result<InsertOutcome> {
        if self.is_closed() {
            return Err(QueueError::Closed(self.name().to_string()));
        }
        let job = Job::new(
            self.name(),
            data,
            opts,
            self.inner.attempts,
            self.inner.backoff,
        );
        let outcome = self.inner.store.insert(job)?;
        match &outcome {
            InsertOutcome::Inserted(job) => {
                tracing::debug!(queue = %self.name(), job_id = %job.id, "job added");
                self.inner.notify.notify_one();
            }
            InsertOutcome::Existing(job) => {
                tracing::info!(queue = %self.name(), job_id = %job.id, "duplicate job id, not re-added");
            }
        }
        Ok(outcome)
    }

    pub fn get_job(&self, id: &str) -> Result<Option<Job>> {
        self.inner.store.get(self.name(), id)
    }

    pub fn counts(&self) -> Result<JobCounts> {
        self.inner.store.counts(self.name())
    }

    /// Stop accepting jobs. Jobs already stored are kept.
    pub fn close(&self) {
        self.inner.closed.store(true, Ordering::SeqCst);
        self.inner.notify.notify_waiters();
        tracing::debug!(queue = %self.name(), "queue closed");
    }

    pub fn is_closed(&self) -> bool {
        self.inner.closed.load(Ordering::SeqCst)
    }

    /// Resolves when a job is added (or the queue is closed).
    pub(crate) async fn notified(&self) {
        self.inner.notify.notified().await
    }
}

impl std::fmt::Debug for Queue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Queue")
            .field("name", &self.inner.name)
            .field("concurrency", &self.inner.concurrency)
            .field("closed", &self.is_closed())
            .finish()
    }
}
