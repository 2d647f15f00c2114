//! Job handlers `leo queue work` registers.
//!
//! The two content queues run a programmatic task per job. `daily-rollup`
//! snapshots queue health. Publishing and attribution integrations are not
//! part of this tool, so those queues get no handler and are left for an
//! external consumer.

use std::sync::Arc;

use anyhow::Context;
use async_trait::async_trait;
use leo_agent::{run_programmatic_task, MessagesApi, TaskOptions, ToolSet};
use leo_queue::{get_queue_health, Handlers, Job, JobHandler, QueueName, QueueSet};
use serde_json::{json, Value};

const REVIEW_SYSTEM_PROMPT: &str = "You review marketing content for a software product. \
Check factual claims, tone and length. Answer with a verdict line (APPROVE or REVISE) \
followed by concrete suggestions.";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ContentKind {
    Generate,
    Review,
}

/// Runs one model task per job; tools are not offered.
struct ContentTask {
    kind: ContentKind,
    client: Arc<dyn MessagesApi>,
    options: TaskOptions,
}

impl ContentTask {
    fn prompt(&self, data: &Value) -> anyhow::Result<String> {
        let field = |key: &str| {
            data.get(key)
                .and_then(Value::as_str)
                .filter(|s| !s.trim().is_empty())
                .with_context(|| format!("job data is missing string field '{key}'"))
        };
        match self.kind {
            ContentKind::Generate => Ok(field("prompt")?.to_string()),
            ContentKind::Review => {
                let content = field("content")?;
                let mut prompt = format!("Review this content:\n\n{content}");
                if let Some(guidelines) = data.get("guidelines").and_then(Value::as_str) {
                    prompt.push_str(&format!("\n\nGuidelines:\n{guidelines}"));
                }
                Ok(prompt)
            }
        }
    }
}

#[async_trait]
impl JobHandler for ContentTask {
    async fn handle(&self, job: &Job) -> anyhow::Result<Value> {
        let prompt = self.prompt(&job.data)?;
        let mut options = self.options.clone();
        if self.kind == ContentKind::Review && options.system_prompt.is_none() {
            options.system_prompt = Some(REVIEW_SYSTEM_PROMPT.to_string());
        }
        let result =
            run_programmatic_task(self.client.as_ref(), &prompt, &ToolSet::empty(), &options)
                .await?;
        Ok(json!({
            "text": result.text,
            "turns": result.turns,
            "stop": result.stop,
            "usage": result.usage,
        }))
    }
}

/// Records per-queue counts at the time the job runs.
struct DailyRollup {
    queues: QueueSet,
}

#[async_trait]
impl JobHandler for DailyRollup {
    async fn handle(&self, _job: &Job) -> anyhow::Result<Value> {
        let health = get_queue_health(&self.queues)?;
        Ok(json!({
            "generated_at": chrono::Utc::now(),
            "queues": health,
        }))
    }
}

/// Handlers for `wanted` (all queues when empty).
///
/// Content queues need a model client; when `client` is `None` they are
/// skipped unless named explicitly in `wanted`, which is an error.
pub fn build(
    queues: &QueueSet,
    wanted: &[QueueName],
    client: Option<Arc<dyn MessagesApi>>,
    options: &TaskOptions,
) -> anyhow::Result<Handlers> {
    let selected = |q: QueueName| wanted.is_empty() || wanted.contains(&q);
    let mut handlers = Handlers::new();

    for (queue, kind) in [
        (QueueName::ContentGeneration, ContentKind::Generate),
        (QueueName::ContentReview, ContentKind::Review),
    ] {
        if !selected(queue) {
            continue;
        }
        match &client {
            Some(client) => {
                let task = ContentTask {
                    kind,
                    client: Arc::clone(client),
                    options: options.clone(),
                };
                handlers.insert(queue, Arc::new(task));
            }
            None if wanted.contains(&queue) => {
                anyhow::bail!("queue '{queue}' needs ANTHROPIC_API_KEY to run its jobs");
            }
            None => tracing::warn!(%queue, "ANTHROPIC_API_KEY not set; not consuming queue"),
        }
    }

    if selected(QueueName::DailyRollup) {
        handlers.insert(
            QueueName::DailyRollup,
            Arc::new(DailyRollup {
                queues: queues.clone(),
            }),
        );
    }

    for &queue in wanted {
        if !handlers.contains_key(&queue) {
            anyhow::bail!("no handler is available for queue '{queue}'");
        }
    }
    Ok(handlers)
}

#[cfg(test)]
mod tests {
    use super::*;
    use leo_agent::{ContentBlock, MessagesRequest, MessagesResponse, StopReason, Usage};
    use leo_queue::{create_queues, JobOptions, MemoryJobStore};
    use std::sync::Mutex;

    struct Echo {
        requests: Mutex<Vec<MessagesRequest>>,
    }

    #[async_trait]
    impl MessagesApi for Echo {
        async fn create_message(
            &self,
            request: &MessagesRequest,
        ) -> leo_agent::Result<MessagesResponse> {
            self.requests.lock().unwrap().push(request.clone());
            Ok(MessagesResponse {
                id: "msg_1".into(),
                model: request.model.clone(),
                content: vec![ContentBlock::Text {
                    text: "APPROVE".into(),
                }],
                stop_reason: Some(StopReason::EndTurn),
                usage: Usage::default(),
            })
        }
    }

    fn echo() -> Arc<Echo> {
        Arc::new(Echo {
            requests: Mutex::new(Vec::new()),
        })
    }

    fn job(queue: QueueName, data: Value) -> Job {
        Job::new(queue, data, JobOptions::default(), 1, Default::default())
    }

    #[test]
    fn without_client_only_rollup_is_registered() {
        let queues = create_queues(Arc::new(MemoryJobStore::new()));
        let handlers = build(&queues, &[], None, &TaskOptions::default()).unwrap();
        assert_eq!(handlers.len(), 1);
        assert!(handlers.contains_key(&QueueName::DailyRollup));
    }

    #[test]
    fn explicit_content_queue_without_client_errors() {
        let queues = create_queues(Arc::new(MemoryJobStore::new()));
        let err = build(
            &queues,
            &[QueueName::ContentReview],
            None,
            &TaskOptions::default(),
        )
        .err().unwrap();
        assert!(err.to_string().contains("ANTHROPIC_API_KEY"));
    }

    #[test]
    fn publish_queues_have_no_handler() {
        let queues = create_queues(Arc::new(MemoryJobStore::new()));
        let err = build(&queues, &[QueueName::PublishX], None, &TaskOptions::default())
            .err().unwrap();
        assert!(err.to_string().contains("publish-x"));
    }

    #[tokio::test]
    async fn review_job_uses_review_system_prompt() {
        let client = echo();
        let task = ContentTask {
            kind: ContentKind::Review,
            client: client.clone(),
            options: TaskOptions::default(),
        };
        let out = task
            .handle(&job(
                QueueName::ContentReview,
                json!({"content": "Ship faster with LEO.", "guidelines": "No superlatives."}),
            ))
            .await
            .unwrap();
        assert_eq!(out["text"], "APPROVE");

        let requests = client.requests.lock().unwrap();
        assert_eq!(requests.len(), 1);
        assert_eq!(requests[0].system.as_deref(), Some(REVIEW_SYSTEM_PROMPT));
        assert!(requests[0].tools.is_empty());
    }

    #[tokio::test]
    async fn generation_job_requires_prompt() {
        let task = ContentTask {
            kind: ContentKind::Generate,
            client: echo(),
            options: TaskOptions::default(),
        };
        let err = task
            .handle(&job(QueueName::ContentGeneration, json!({"topic": "x"})))
            .await
            .unwrap_err();
        assert!(err.to_string().contains("'prompt'"));
    }

    #[tokio::test]
    async fn rollup_reports_every_queue() {
        let queues = create_queues(Arc::new(MemoryJobStore::new()));
        let rollup = DailyRollup {
            queues: queues.clone(),
        };
        let out = rollup
            .handle(&job(QueueName::DailyRollup, json!({})))
            .await
            .unwrap();
        assert_eq!(out["queues"].as_object().unwrap().len(), 6);
    }
}
