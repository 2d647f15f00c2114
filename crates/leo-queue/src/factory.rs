//! Queue and worker construction plus the operations callers use day to day.

use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;

use serde::Serialize;
use serde_json::Value;

use crate::error::{QueueError, Result};
use crate::job::{Backoff, JobCounts, JobOptions};
use crate::names::QueueName;
use crate::queue::Queue;
use crate::store::{InsertOutcome, JobStore};
use crate::worker::{JobHandler, Worker};

// ---------------------------------------------------------------------------
// QueueSettings
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq)]
pub struct QueueSettings {
    /// Overrides [`QueueName::default_concurrency`] per queue.
    pub concurrency: BTreeMap<QueueName, usize>,
    pub attempts: u32,
    pub backoff: Backoff,
}

impl Default for QueueSettings {
    fn default() -> Self {
        Self {
            concurrency: BTreeMap::new(),
            attempts: 3,
            backoff: Backoff::default(),
        }
    }
}

impl QueueSettings {
    pub fn concurrency_for(&self, name: QueueName) -> usize {
        self.concurrency
            .get(&name)
            .copied()
            .unwrap_or_else(|| name.default_concurrency())
    }
}

// ---------------------------------------------------------------------------
// QueueSet
// ---------------------------------------------------------------------------

/// Every pipeline queue, keyed by name.
#[derive(Debug, Clone)]
pub struct QueueSet {
    queues: BTreeMap<QueueName, Queue>,
}

impl QueueSet {
    pub fn get(&self, name: QueueName) -> &Queue {
        // Constructed from `QueueName::all()`, so every name is present.
        &self.queues[&name]
    }

    /// Look a queue up by its string name.
    pub fn by_name(&self, name: &str) -> Result<&Queue> {
        let name: QueueName = name.parse()?;
        self.queues
            .get(&name)
            .ok_or_else(|| QueueError::UnknownQueue(name.to_string()))
    }

    pub fn iter(&self) -> impl Iterator<Item = &Queue> {
        self.queues.values()
    }

    pub fn names(&self) -> impl Iterator<Item = QueueName> + '_ {
        self.queues.keys().copied()
    }

    pub fn len(&self) -> usize {
        self.queues.len()
    }

    pub fn is_empty(&self) -> bool {
        self.queues.is_empty()
    }
}

pub fn create_queues(store: Arc<dyn JobStore>) -> QueueSet {
    create_queues_with(store, &QueueSettings::default())
}

pub fn create_queues_with(store: Arc<dyn JobStore>, settings: &QueueSettings) -> QueueSet {
    let queues = QueueName::all()
        .iter()
        .map(|&name| {
            let queue = Queue::new(
                name,
                Arc::clone(&store),
                settings.concurrency_for(name),
                settings.attempts,
                settings.backoff,
            );
            (name, queue)
        })
        .collect();
    QueueSet { queues }
}

// ---------------------------------------------------------------------------
// Jobs
// ---------------------------------------------------------------------------

/// Add a job to the queue called `name`.
///
/// On publish queues a string `data.idempotencyKey` becomes the job id, so
/// re-adding the same post returns the job already queued.
pub fn add_job(queues: &QueueSet, name: &str, data: Value) -> Result<InsertOutcome> {
    let queue = queues.by_name(name)?;
    let job_id = if queue.name().is_publish() {
        data.get("idempotencyKey")
            .and_then(Value::as_str)
            .map(String::from)
    } else {
        None
    };
    queue.add(
        data,
        JobOptions {
            job_id,
            ..Default::default()
        },
    )
}

/// Per-queue job counts keyed by queue name.
pub fn get_queue_health(queues: &QueueSet) -> Result<BTreeMap<String, JobCounts>> {
    queues
        .iter()
        .map(|q| Ok((q.name().to_string(), q.counts()?)))
        .collect()
}

// ---------------------------------------------------------------------------
// Workers
// ---------------------------------------------------------------------------

pub type Handlers = HashMap<QueueName, Arc<dyn JobHandler>>;

/// Start a worker for each queue that has a handler. Queues without a
/// handler are left unconsumed.
pub fn create_workers(queues: &QueueSet, handlers: &Handlers) -> Vec<Worker> {
    queues
        .iter()
        .filter_map(|q| {
            handlers
                .get(&q.name())
                .map(|h| Worker::start(q, Arc::clone(h)))
        })
        .collect()
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", content = "queue", rename_all = "snake_case")]
pub enum Closed {
    Worker(QueueName),
    Queue(QueueName),
}

/// Close every worker (draining in-flight jobs), then every queue.
/// Returns what was closed, in order.
pub async fn shutdown(queues: &QueueSet, workers: Vec<Worker>) -> Vec<Closed> {
    let mut order = Vec::with_capacity(workers.len() + queues.len());
    for mut worker in workers {
        worker.close().await;
        order.push(Closed::Worker(worker.queue()));
    }
    for queue in queues.iter() {
        queue.close();
        order.push(Closed::Queue(queue.name()));
    }
    tracing::info!(closed = order.len(), "queues shut down");
    order
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::job::JobState;
    use crate::store::MemoryJobStore;
    use crate::worker::handler_fn;
    use serde_json::json;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    struct Panics;

    #[async_trait::async_trait]
    impl JobHandler for Panics {
        async fn handle(&self, _job: &crate::job::Job) -> anyhow::Result<Value> {
            panic!("rollup bug")
        }
    }

    fn memory_queues() -> QueueSet {
        create_queues(Arc::new(MemoryJobStore::new()))
    }

    fn fast_settings() -> QueueSettings {
        QueueSettings {
            backoff: Backoff::Fixed { delay_ms: 1 },
            ..Default::default()
        }
    }

    async fn wait_for(queue: &Queue, pred: impl Fn(JobCounts) -> bool) -> JobCounts {
        for _ in 0..200 {
            let counts = queue.counts().unwrap();
            if pred(counts) {
                return counts;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        panic!("condition not reached: {:?}", queue.counts().unwrap());
    }

    #[test]
    fn create_queues_returns_six_named_queues() {
        let queues = memory_queues();
        assert_eq!(queues.len(), 6);
        let names: Vec<_> = queues.names().map(|n| n.as_str()).collect();
        for expected in [
            "content-generation",
            "content-review",
            "publish-x",
            "publish-bluesky",
            "attribution-sync",
            "daily-rollup",
        ] {
            assert!(names.contains(&expected), "missing {expected}");
        }
        assert_eq!(queues.get(QueueName::ContentGeneration).concurrency(), 2);
        assert_eq!(queues.get(QueueName::PublishX).concurrency(), 1);
    }

    #[test]
    fn settings_override_concurrency() {
        let mut settings = QueueSettings::default();
        settings.concurrency.insert(QueueName::PublishX, 4);
        let queues = create_queues_with(Arc::new(MemoryJobStore::new()), &settings);
        assert_eq!(queues.get(QueueName::PublishX).concurrency(), 4);
        assert_eq!(queues.get(QueueName::DailyRollup).concurrency(), 1);
    }

    #[test]
    fn add_job_to_unknown_queue_names_it() {
        let queues = memory_queues();
        let err = add_job(&queues, "publish-threads", json!({})).unwrap_err();
        assert!(matches!(&err, QueueError::UnknownQueue(n) if n == "publish-threads"));
        assert!(err.to_string().contains("publish-threads"));
    }

    #[test]
    fn publish_queues_dedupe_on_idempotency_key() {
        let queues = memory_queues();
        let data = json!({"idempotencyKey": "post-42", "text": "hello"});
        let first = add_job(&queues, "publish-x", data.clone()).unwrap();
        let second = add_job(&queues, "publish-x", data).unwrap();
        assert_eq!(first.job().id, "post-42");
        assert!(second.is_duplicate());
        assert_eq!(queues.get(QueueName::PublishX).counts().unwrap().waiting, 1);
    }

    #[test]
    fn non_publish_queues_ignore_idempotency_key() {
        let queues = memory_queues();
        let data = json!({"idempotencyKey": "same"});
        let a = add_job(&queues, "content-generation", data.clone()).unwrap();
        let b = add_job(&queues, "content-generation", data).unwrap();
        assert_ne!(a.job().id, b.job().id);
        assert!(!b.is_duplicate());
    }

    #[test]
    fn health_reports_every_queue() {
        let queues = memory_queues();
        add_job(&queues, "daily-rollup", json!({})).unwrap();
        let health = get_queue_health(&queues).unwrap();
        assert_eq!(health.len(), 6);
        assert_eq!(health["daily-rollup"].waiting, 1);
        assert_eq!(health["publish-x"], JobCounts::default());
    }

    #[tokio::test]
    async fn workers_only_for_present_handlers() {
        let queues = memory_queues();
        let mut handlers = Handlers::new();
        handlers.insert(
            QueueName::ContentReview,
            handler_fn(|_job| async { Ok::<_, anyhow::Error>(json!("ok")) }),
        );
        let workers = create_workers(&queues, &handlers);
        assert_eq!(workers.len(), 1);
        assert_eq!(workers[0].queue(), QueueName::ContentReview);
        shutdown(&queues, workers).await;
    }

    #[tokio::test]
    async fn worker_completes_jobs_with_return_value() {
        let queues = memory_queues();
        let mut handlers = Handlers::new();
        handlers.insert(
            QueueName::ContentGeneration,
            handler_fn(|job| async move { Ok::<_, anyhow::Error>(json!({"echo": job.data["topic"]})) }),
        );
        let workers = create_workers(&queues, &handlers);

        let added = add_job(&queues, "content-generation", json!({"topic": "rust"}))
            .unwrap()
            .into_job();
        let queue = queues.get(QueueName::ContentGeneration);
        wait_for(queue, |c| c.completed == 1).await;

        let job = queue.get_job(&added.id).unwrap().unwrap();
        assert_eq!(job.state, JobState::Completed);
        assert_eq!(job.return_value, Some(json!({"echo": "rust"})));
        shutdown(&queues, workers).await;
    }

    #[tokio::test]
    async fn failing_job_retries_then_fails() {
        let queues = create_queues_with(Arc::new(MemoryJobStore::new()), &fast_settings());
        let calls = Arc::new(AtomicUsize::new(0));
        let seen = Arc::clone(&calls);
        let mut handlers = Handlers::new();
        handlers.insert(
            QueueName::AttributionSync,
            handler_fn(move |_job| {
                let seen = Arc::clone(&seen);
                async move {
                    seen.fetch_add(1, Ordering::SeqCst);
                    Err::<Value, _>(anyhow::anyhow!("analytics API unavailable"))
                }
            }),
        );
        let queue = queues.get(QueueName::AttributionSync).clone();
        let worker = Worker::with_poll_interval(
            &queue,
            Arc::clone(&handlers[&QueueName::AttributionSync]),
            Duration::from_millis(5),
        );

        let job = add_job(&queues, "attribution-sync", json!({}))
            .unwrap()
            .into_job();
        wait_for(&queue, |c| c.failed == 1).await;

        assert_eq!(calls.load(Ordering::SeqCst), 3);
        let job = queue.get_job(&job.id).unwrap().unwrap();
        assert_eq!(job.attempts_made, 3);
        assert_eq!(
            job.failed_reason.as_deref(),
            Some("analytics API unavailable")
        );
        shutdown(&queues, vec![worker]).await;
    }

    #[tokio::test]
    async fn panicking_handler_counts_as_failure() {
        let mut settings = fast_settings();
        settings.attempts = 1;
        let queues = create_queues_with(Arc::new(MemoryJobStore::new()), &settings);
        let mut handlers = Handlers::new();
        handlers.insert(QueueName::DailyRollup, Arc::new(Panics));
        let workers = create_workers(&queues, &handlers);

        add_job(&queues, "daily-rollup", json!({})).unwrap();
        let counts = wait_for(queues.get(QueueName::DailyRollup), |c| c.failed == 1).await;
        assert_eq!(counts.active, 0);
        shutdown(&queues, workers).await;
    }

    #[tokio::test]
    async fn shutdown_closes_workers_before_queues_and_drains() {
        let queues = memory_queues();
        let finished = Arc::new(AtomicUsize::new(0));
        let done = Arc::clone(&finished);
        let mut handlers = Handlers::new();
        handlers.insert(
            QueueName::ContentGeneration,
            handler_fn(move |_job| {
                let done = Arc::clone(&done);
                async move {
                    tokio::time::sleep(Duration::from_millis(50)).await;
                    done.fetch_add(1, Ordering::SeqCst);
                    Ok::<_, anyhow::Error>(Value::Null)
                }
            }),
        );
        handlers.insert(
            QueueName::PublishX,
            handler_fn(|_job| async { Ok::<_, anyhow::Error>(Value::Null) }),
        );
        let workers = create_workers(&queues, &handlers);

        add_job(&queues, "content-generation", json!({})).unwrap();
        wait_for(queues.get(QueueName::ContentGeneration), |c| c.active == 1).await;

        let order = shutdown(&queues, workers).await;

        assert_eq!(finished.load(Ordering::SeqCst), 1, "in-flight job drained");
        assert_eq!(order.len(), 2 + 6);
        let first_queue = order
            .iter()
            .position(|c| matches!(c, Closed::Queue(_)))
            .unwrap();
        assert!(order[..first_queue]
            .iter()
            .all(|c| matches!(c, Closed::Worker(_))));
        assert!(order[first_queue..]
            .iter()
            .all(|c| matches!(c, Closed::Queue(_))));
        assert!(queues.iter().all(|q| q.is_closed()));

        let err = add_job(&queues, "content-generation", json!({})).unwrap_err();
        assert!(matches!(err, QueueError::Closed(_)));
    }
}
