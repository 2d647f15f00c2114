//! Named job queues for the LEO content pipeline.
//!
//! ```text
//! add_job ──► Queue ──► JobStore (memory | redb) ◄── Worker ──► JobHandler
//! ```
//!
//! Six queues exist, one per pipeline stage (see [`QueueName`]). Jobs are
//! retried with backoff until `max_attempts` is reached. Publish queues use
//! the payload's `idempotencyKey` as the job id so a post is queued once.

pub mod error;
pub mod factory;
pub mod job;
pub mod names;
pub mod queue;
pub mod store;
pub mod worker;

pub use error::{QueueError, Result};
pub use factory::{
    add_job, create_queues, create_queues_with, create_workers, get_queue_health, shutdown,
    Closed, Handlers, QueueSet, QueueSettings,
};
pub use job::{Backoff, Job, JobCounts, JobOptions, JobState};
pub use names::QueueName;
pub use queue::Queue;
pub use store::{InsertOutcome, JobStore, MemoryJobStore, RedbJobStore};
pub use worker::{handler_fn, JobHandler, Worker};
