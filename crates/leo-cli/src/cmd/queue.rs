use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use clap::Subcommand;
use leo_agent::{AnthropicClient, MessagesApi, TaskOptions};
use leo_core::config::{Config, QueuesConfig};
use leo_core::paths;
use leo_queue::{
    add_job, create_queues_with, create_workers, get_queue_health, shutdown, Backoff, JobCounts,
    QueueName, QueueSet, QueueSettings, RedbJobStore,
};

use crate::cmd::runtime;
use crate::handlers;
use crate::output::{print_json, print_table};

const DRAIN_POLL: Duration = Duration::from_millis(200);

// ---------------------------------------------------------------------------
// Subcommand types
// ---------------------------------------------------------------------------

#[derive(Subcommand)]
pub enum QueueSubcommand {
    /// List the pipeline queues
    List,

    /// Add a job to a queue
    Add {
        /// Queue name, e.g. content-generation
        name: String,
        /// Job payload as JSON
        #[arg(long, default_value = "{}")]
        data: String,
    },

    /// Show job counts per queue
    Health,

    /// Run workers until Ctrl-C, then shut down in order
    Work {
        /// Only consume these queues (repeatable; default: every queue with a handler)
        #[arg(long = "queue", value_name = "NAME")]
        queues: Vec<QueueName>,
        /// Exit once the consumed queues have no waiting, delayed or active jobs
        #[arg(long)]
        drain: bool,
    },
}

// ---------------------------------------------------------------------------
// Entry point
// ---------------------------------------------------------------------------

pub fn run(root: &Path, subcmd: QueueSubcommand, json: bool) -> anyhow::Result<()> {
    let config = Config::load_or_default(root).context("failed to load config")?;
    let settings = settings(&config.queues);

    match subcmd {
        QueueSubcommand::List => list(&settings, json),
        QueueSubcommand::Add { name, data } => {
            add(&open_queues(root, &settings)?, &name, &data, json)
        }
        QueueSubcommand::Health => health(&open_queues(root, &settings)?, json),
        QueueSubcommand::Work {
            queues: wanted,
            drain,
        } => {
            let queues = open_queues(root, &settings)?;
            runtime()?.block_on(work(&queues, &config, &wanted, drain, json))
        }
    }
}

fn open_queues(root: &Path, settings: &QueueSettings) -> anyhow::Result<QueueSet> {
    let path = paths::queue_db_path(root);
    let store = RedbJobStore::open(&path)
        .with_context(|| format!("failed to open job store {}", path.display()))?;
    Ok(create_queues_with(Arc::new(store), settings))
}

/// Map `queues:` from the config file onto queue settings. Unknown queue
/// names are dropped; `leo config validate` reports them.
pub(crate) fn settings(config: &QueuesConfig) -> QueueSettings {
    let concurrency = config
        .concurrency
        .iter()
        .filter_map(|(name, &n)| match name.parse::<QueueName>() {
            Ok(q) => Some((q, n)),
            Err(_) => {
                tracing::warn!(queue = %name, "ignoring concurrency for unknown queue");
                None
            }
        })
        .collect();
    QueueSettings {
        concurrency,
        attempts: config.attempts,
        backoff: Backoff::Exponential {
            delay_ms: config.backoff_ms,
        },
    }
}

// ---------------------------------------------------------------------------
// list / add / health
// ---------------------------------------------------------------------------

fn list(settings: &QueueSettings, json: bool) -> anyhow::Result<()> {
    let queues: Vec<_> = QueueName::all()
        .iter()
        .map(|&q| (q, settings.concurrency_for(q)))
        .collect();

    if json {
        let value: Vec<_> = queues
            .iter()
            .map(|(q, c)| {
                serde_json::json!({ "name": q, "concurrency": c, "publish": q.is_publish() })
            })
            .collect();
        return print_json(&value);
    }
    let rows: Vec<Vec<String>> = queues
        .iter()
        .map(|(q, c)| vec![q.to_string(), c.to_string()])
        .collect();
    print_table(&["QUEUE", "CONCURRENCY"], &rows);
    Ok(())
}

fn add(queues: &QueueSet, name: &str, data: &str, json: bool) -> anyhow::Result<()> {
    let data: serde_json::Value =
        serde_json::from_str(data).context("--data must be valid JSON")?;
    let outcome = add_job(queues, name, data)?;

    if json {
        return print_json(&serde_json::json!({
            "duplicate": outcome.is_duplicate(),
            "job": outcome.job(),
        }));
    }
    let job = outcome.job();
    if outcome.is_duplicate() {
        println!("{name}: job {} already queued ({:?})", job.id, job.state);
    } else {
        println!("{name}: added job {}", job.id);
    }
    Ok(())
}

fn health(queues: &QueueSet, json: bool) -> anyhow::Result<()> {
    let health = get_queue_health(queues)?;
    if json {
        return print_json(&health);
    }
    let rows: Vec<Vec<String>> = health
        .iter()
        .map(|(name, c)| {
            vec![
                name.clone(),
                c.waiting.to_string(),
                c.delayed.to_string(),
                c.active.to_string(),
                c.completed.to_string(),
                c.failed.to_string(),
            ]
        })
        .collect();
    print_table(
        &["QUEUE", "WAITING", "DELAYED", "ACTIVE", "COMPLETED", "FAILED"],
        &rows,
    );
    Ok(())
}

// ---------------------------------------------------------------------------
// work
// ---------------------------------------------------------------------------

async fn work(
    queues: &QueueSet,
    config: &Config,
    wanted: &[QueueName],
    drain: bool,
    json: bool,
) -> anyhow::Result<()> {
    let client: Option<Arc<dyn MessagesApi>> = match AnthropicClient::from_env() {
        Ok(c) => Some(Arc::new(c)),
        Err(e) => {
            tracing::debug!(error = %e, "no model client");
            None
        }
    };
    let mut options = TaskOptions {
        max_turns: config.agent.max_turns,
        max_tokens: config.agent.max_tokens,
        system_prompt: config.agent.system_prompt.clone(),
        ..Default::default()
    };
    if let Some(model) = &config.agent.model {
        options.model = model.clone();
    }

    let handlers = handlers::build(queues, wanted, client, &options)?;
    if handlers.is_empty() {
        anyhow::bail!("no queue has a handler; nothing to work on");
    }
    let consumed: Vec<QueueName> = queues.names().filter(|q| handlers.contains_key(q)).collect();
    let workers = create_workers(queues, &handlers);
    tracing::info!(workers = workers.len(), "workers running; Ctrl-C to stop");

    if drain {
        tokio::select! {
            res = wait_until_idle(queues, &consumed) => res?,
            _ = tokio::signal::ctrl_c() => {}
        }
    } else {
        tokio::signal::ctrl_c()
            .await
            .context("failed to listen for Ctrl-C")?;
    }

    let closed = shutdown(queues, workers).await;
    if json {
        print_json(&serde_json::json!({
            "closed": closed,
            "health": get_queue_health(queues)?,
        }))?;
    } else {
        println!("Shut down {} workers and {} queues.", consumed.len(), queues.len());
    }
    Ok(())
}

async fn wait_until_idle(queues: &QueueSet, consumed: &[QueueName]) -> anyhow::Result<()> {
    loop {
        let mut busy = false;
        for &q in consumed {
            busy |= has_pending(&queues.get(q).counts()?);
        }
        if !busy {
            return Ok(());
        }
        tokio::time::sleep(DRAIN_POLL).await;
    }
}

fn has_pending(c: &JobCounts) -> bool {
    c.waiting + c.delayed + c.active > 0
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::BTreeMap;

    #[test]
    fn settings_map_known_queues_only() {
        let config = QueuesConfig {
            concurrency: BTreeMap::from([
                ("publish-x".to_string(), 3),
                ("publish-threads".to_string(), 9),
            ]),
            attempts: 5,
            backoff_ms: 250,
        };
        let s = settings(&config);
        assert_eq!(s.concurrency.len(), 1);
        assert_eq!(s.concurrency_for(QueueName::PublishX), 3);
        assert_eq!(s.concurrency_for(QueueName::ContentGeneration), 2);
        assert_eq!(s.attempts, 5);
        assert_eq!(s.backoff, Backoff::Exponential { delay_ms: 250 });
    }

    #[test]
    fn pending_excludes_finished_jobs() {
        let mut c = JobCounts::default();
        assert!(!has_pending(&c));
        c.completed = 4;
        c.failed = 1;
        assert!(!has_pending(&c));
        c.delayed = 1;
        assert!(has_pending(&c));
    }
}
