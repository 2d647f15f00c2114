use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chrono::Utc;
use serde_json::Value;
use tokio::sync::{watch, Semaphore};
use tokio::task::JoinHandle;

use crate::job::Job;
use crate::names::QueueName;
use crate::queue::Queue;
use crate::store::JobStore;

pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_millis(500);

// ---------------------------------------------------------------------------
// JobHandler
// ---------------------------------------------------------------------------

/// Processes one job. `Ok` completes the job with the returned value; `Err`
/// (or a panic) counts as a failed attempt.
#[async_trait]
pub trait JobHandler: Send + Sync {
    async fn handle(&self, job: &Job) -> anyhow::Result<Value>;
}

struct FnHandler<F>(F);

#[async_trait]
impl<F, Fut> JobHandler for FnHandler<F>
where
    F: Fn(Job) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = anyhow::Result<Value>> + Send + 'static,
{
    async fn handle(&self, job: &Job) -> anyhow::Result<Value> {
        (self.0)(job.clone()).await
    }
}

/// Wrap an async closure as a [`JobHandler`].
pub fn handler_fn<F, Fut>(f: F) -> Arc<dyn JobHandler>
where
    F: Fn(Job) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = anyhow::Result<Value>> + Send + 'static,
{
    Arc::new(FnHandler(f))
}

// ---------------------------------------------------------------------------
// Worker
// ---------------------------------------------------------------------------

/// Consumes one queue with up to `queue.concurrency()` jobs in flight.
pub struct Worker {
    queue: QueueName,
    stop: watch::Sender<bool>,
    task: Option<JoinHandle<()>>,
}

impl Worker {
    /// Start consuming `queue`. Must be called inside a tokio runtime.
    pub fn start(queue: &Queue, handler: Arc<dyn JobHandler>) -> Self {
        Self::with_poll_interval(queue, handler, DEFAULT_POLL_INTERVAL)
    }

    /// Like [`Worker::start`], re-checking for due delayed jobs every `poll`.
    pub fn with_poll_interval(queue: &Queue, handler: Arc<dyn JobHandler>, poll: Duration) -> Self {
        let (stop, stop_rx) = watch::channel(false);
        let task = tokio::spawn(run(queue.clone(), handler, stop_rx, poll));
        tracing::info!(queue = %queue.name(), concurrency = queue.concurrency(), "worker started");
        Self {
            queue: queue.name(),
            stop,
            task: Some(task),
        }
    }

    pub fn queue(&self) -> QueueName {
        self.queue
    }

    /// Stop claiming new jobs and wait for in-flight jobs to finish.
    pub async fn close(&mut self) {
        let _ = self.stop.send(true);
        if let Some(task) = self.task.take() {
            if let Err(e) = task.await {
                tracing::error!(queue = %self.queue, error = %e, "worker task ended abnormally");
            }
        }
        tracing::info!(queue = %self.queue, "worker closed");
    }
}

impl Drop for Worker {
    fn drop(&mut self) {
        let _ = self.stop.send(true);
    }
}

async fn run(
    queue: Queue,
    handler: Arc<dyn JobHandler>,
    mut stop: watch::Receiver<bool>,
    poll: Duration,
) {
    let slots = queue.concurrency();
    let permits = Arc::new(Semaphore::new(slots));

    loop {
        if *stop.borrow() {
            break;
        }

        let permit = tokio::select! {
            p = Arc::clone(&permits).acquire_owned() => match p {
                Ok(p) => p,
                Err(_) => break,
            },
            _ = stop.changed() => break,
        };

        match queue.store().claim_next(queue.name(), Utc::now()) {
            Ok(Some(job)) => {
                let store = Arc::clone(queue.store());
                let handler = Arc::clone(&handler);
                tokio::spawn(async move {
                    let _permit = permit;
                    process(job, handler, store).await;
                });
            }
            Ok(None) => {
                drop(permit);
                tokio::select! {
                    _ = queue.notified() => {}
                    _ = tokio::time::sleep(poll) => {}
                    _ = stop.changed() => break,
                }
            }
            Err(e) => {
                drop(permit);
                tracing::error!(queue = %queue.name(), error = %e, "failed to claim job");
                tokio::select! {
                    _ = tokio::time::sleep(poll) => {}
                    _ = stop.changed() => break,
                }
            }
        }
    }

    // Every permit back means every in-flight job has finished.
    let _ = permits.acquire_many(slots as u32).await;
}

async fn process(mut job: Job, handler: Arc<dyn JobHandler>, store: Arc<dyn JobStore>) {
    let input = job.clone();
    let outcome = tokio::spawn(async move { handler.handle(&input).await }).await;

    match outcome {
        Ok(Ok(value)) => {
            job.complete(value);
            tracing::info!(queue = %job.queue, job_id = %job.id, attempt = job.attempts_made, "job completed");
        }
        Ok(Err(e)) => record_failure(&mut job, format!("{e:#}")),
        Err(e) if e.is_panic() => record_failure(&mut job, "handler panicked".to_string()),
        Err(e) => record_failure(&mut job, format!("handler task failed: {e}")),
    }

    if let Err(e) = store.update(&job) {
        tracing::error!(queue = %job.queue, job_id = %job.id, error = %e, "failed to persist job result");
    }
}

fn record_failure(job: &mut Job, reason: String) {
    let retry = job.fail(reason);
    let reason = job.failed_reason.as_deref().unwrap_or_default();
    if retry {
        tracing::warn!(
            queue = %job.queue,
            job_id = %job.id,
            attempt = job.attempts_made,
            max_attempts = job.max_attempts,
            %reason,
            "job failed, will retry"
        );
    } else {
        tracing::error!(queue = %job.queue, job_id = %job.id, %reason, "job failed permanently");
    }
}
