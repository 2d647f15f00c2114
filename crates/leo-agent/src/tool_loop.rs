use serde::Serialize;
use serde_json::Value;

use crate::client::MessagesApi;
use crate::model::{thinking_for, Effort, ModelTier};
use crate::tool::{ToolContext, ToolSet};
use crate::types::{ContentBlock, Message, MessagesRequest, Role, StopReason, Usage};
use crate::Result;

pub const DEFAULT_MAX_TURNS: u32 = 20;
pub const DEFAULT_MAX_TOKENS: u32 = 4096;

// ─── Options ──────────────────────────────────────────────────────────────

#[derive(Debug, Clone)]
pub struct TaskOptions {
    /// Forwarded to every tool handler as [`ToolContext::dry_run`].
    pub dry_run: bool,
    pub model: String,
    pub max_tokens: u32,
    /// Upper bound on model calls for the task.
    pub max_turns: u32,
    pub system_prompt: Option<String>,
    pub effort: Option<Effort>,
}

impl Default for TaskOptions {
    fn default() -> Self {
        Self {
            dry_run: false,
            model: ModelTier::default().default_model().to_string(),
            max_tokens: DEFAULT_MAX_TOKENS,
            max_turns: DEFAULT_MAX_TURNS,
            system_prompt: None,
            effort: None,
        }
    }
}

// ─── Result ───────────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "kind", content = "reason", rename_all = "snake_case")]
pub enum TaskStop {
    EndTurn,
    TurnLimit,
    /// The model stopped for another reason (max_tokens, refusal, ...).
    Model(StopReason),
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ToolCallRecord {
    pub turn: u32,
    pub tool_use_id: String,
    pub name: String,
    pub input: Value,
    pub output: String,
    pub is_error: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TaskResult {
    /// Concatenated text of the final model response.
    pub text: String,
    /// Model calls made.
    pub turns: u32,
    pub stop: TaskStop,
    pub tool_calls: Vec<ToolCallRecord>,
    pub usage: Usage,
}

// ─── Loop ─────────────────────────────────────────────────────────────────

/// Drive `prompt` to a final answer, dispatching tool calls locally.
///
/// Tool handler failures and unknown tool names are reported back to the
/// model as error tool results; only the client can make this fail.
pub async fn run_programmatic_task(
    client: &dyn MessagesApi,
    prompt: &str,
    tools: &ToolSet,
    options: &TaskOptions,
) -> Result<TaskResult> {
    let (thinking, max_tokens) = thinking_for(options.effort, options.max_tokens);
    let ctx = ToolContext {
        dry_run: options.dry_run,
    };

    let mut request = MessagesRequest {
        model: options.model.clone(),
        max_tokens,
        messages: vec![Message::user_text(prompt)],
        system: options.system_prompt.clone(),
        tools: tools.definitions(),
        thinking,
    };
    let mut usage = Usage::default();
    let mut tool_calls = Vec::new();
    let mut last_text = String::new();

    for turn in 1..=options.max_turns {
        tracing::debug!(turn, messages = request.messages.len(), "calling model");
        let response = client.create_message(&request).await?;
        usage.add(&response.usage);
        last_text = response.text();

        let calls: Vec<(String, String, Value)> = response
            .tool_uses()
            .map(|(id, name, input)| (id.to_string(), name.to_string(), input.clone()))
            .collect();

        let stop = match response.stop_reason {
            Some(StopReason::ToolUse) if !calls.is_empty() => None,
            Some(StopReason::EndTurn) | None => Some(TaskStop::EndTurn),
            Some(other) => Some(TaskStop::Model(other)),
        };
        if let Some(stop) = stop {
            tracing::debug!(turn, ?stop, "task finished");
            return Ok(TaskResult {
                text: last_text,
                turns: turn,
                stop,
                tool_calls,
                usage,
            });
        }

        request.messages.push(Message {
            role: Role::Assistant,
            content: response
                .content
                .into_iter()
                .filter(|b| !matches!(b, ContentBlock::Unknown))
                .collect(),
        });

        let mut results = Vec::with_capacity(calls.len());
        for (id, name, input) in calls {
            let (output, is_error) = match tools.get(&name) {
                Some(tool) => match tool.call(input.clone(), ctx).await {
                    Ok(out) => (out, false),
                    Err(e) => {
                        tracing::warn!(turn, tool = %name, error = %e, "tool handler failed");
                        (format!("Error: {e:#}"), true)
                    }
                },
                None => {
                    tracing::warn!(turn, tool = %name, "model called an unknown tool");
                    (format!("Unknown tool: {name}"), true)
                }
            };
            tracing::info!(turn, tool = %name, is_error, "tool call");

            results.push(ContentBlock::ToolResult {
                tool_use_id: id.clone(),
                content: output.clone(),
                is_error,
            });
            tool_calls.push(ToolCallRecord {
                turn,
                tool_use_id: id,
                name,
                input,
                output,
                is_error,
            });
        }
        request.messages.push(Message {
            role: Role::User,
            content: results,
        });
    }

    tracing::warn!(max_turns = options.max_turns, "turn limit reached");
    Ok(TaskResult {
        text: last_text,
        turns: options.max_turns,
        stop: TaskStop::TurnLimit,
        tool_calls,
        usage,
    })
}

// ─── Tests ────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::VecDeque;
    use std::sync::{Arc, Mutex};

    use async_trait::async_trait;
    use serde_json::json;

    use crate::error::AgentError;
    use crate::tool::Tool;
    use crate::types::{MessagesResponse, ToolDefinition};

    /// Replays canned responses and records every request it receives.
    /// Once the script runs out it repeats the last response.
    struct ScriptedClient {
        script: Mutex<VecDeque<MessagesResponse>>,
        last: Mutex<Option<MessagesResponse>>,
        requests: Mutex<Vec<MessagesRequest>>,
    }

    impl ScriptedClient {
        fn new(responses: Vec<MessagesResponse>) -> Self {
            Self {
                script: Mutex::new(responses.into()),
                last: Mutex::new(None),
                requests: Mutex::new(Vec::new()),
            }
        }

        fn calls(&self) -> usize {
            self.requests.lock().unwrap().len()
        }

        fn request(&self, i: usize) -> MessagesRequest {
            self.requests.lock().unwrap()[i].clone()
        }
    }

    #[async_trait]
    impl MessagesApi for ScriptedClient {
        async fn create_message(&self, request: &MessagesRequest) -> Result<MessagesResponse> {
            self.requests.lock().unwrap().push(request.clone());
            let next = self.script.lock().unwrap().pop_front();
            let mut last = self.last.lock().unwrap();
            if let Some(r) = next {
                *last = Some(r);
            }
            Ok(last.clone().expect("script must not be empty"))
        }
    }

    struct FailingClient;

    #[async_trait]
    impl MessagesApi for FailingClient {
        async fn create_message(&self, _request: &MessagesRequest) -> Result<MessagesResponse> {
            Err(AgentError::Api {
                status: 401,
                kind: "authentication_error".into(),
                message: "invalid x-api-key".into(),
            })
        }
    }

    fn text_response(text: &str) -> MessagesResponse {
        MessagesResponse {
            id: "msg".into(),
            model: "test".into(),
            content: vec![ContentBlock::Text { text: text.into() }],
            stop_reason: Some(StopReason::EndTurn),
            usage: Usage {
                input_tokens: 10,
                output_tokens: 5,
                ..Default::default()
            },
        }
    }

    fn tool_response(id: &str, name: &str, input: Value) -> MessagesResponse {
        MessagesResponse {
            id: "msg".into(),
            model: "test".into(),
            content: vec![
                ContentBlock::Text {
                    text: "Let me check.".into(),
                },
                ContentBlock::ToolUse {
                    id: id.into(),
                    name: name.into(),
                    input,
                },
            ],
            stop_reason: Some(StopReason::ToolUse),
            usage: Usage::default(),
        }
    }

    fn def(name: &str) -> ToolDefinition {
        ToolDefinition {
            name: name.into(),
            description: String::new(),
            input_schema: json!({"type": "object"}),
        }
    }

    /// A tool that records each (input, ctx) it is called with.
    fn recording_tool(name: &str, seen: Arc<Mutex<Vec<(Value, ToolContext)>>>) -> Tool {
        Tool::from_fn(def(name), move |input, ctx| {
            let seen = Arc::clone(&seen);
            async move {
                seen.lock().unwrap().push((input, ctx));
                Ok("recorded".to_string())
            }
        })
    }

    fn tool_results(request: &MessagesRequest) -> Vec<(String, String, bool)> {
        let last = request.messages.last().unwrap();
        assert_eq!(last.role, Role::User);
        last.content
            .iter()
            .filter_map(|b| match b {
                ContentBlock::ToolResult {
                    tool_use_id,
                    content,
                    is_error,
                } => Some((tool_use_id.clone(), content.clone(), *is_error)),
                _ => None,
            })
            .collect()
    }

    #[tokio::test]
    async fn end_turn_returns_text_after_one_call() {
        let client = ScriptedClient::new(vec![text_response("All directives are on track.")]);
        let result =
            run_programmatic_task(&client, "status?", &ToolSet::empty(), &TaskOptions::default())
                .await
                .unwrap();

        assert_eq!(result.text, "All directives are on track.");
        assert_eq!(result.stop, TaskStop::EndTurn);
        assert_eq!(result.turns, 1);
        assert_eq!(client.calls(), 1);
        assert_eq!(result.usage.input_tokens, 10);
    }

    #[tokio::test]
    async fn tool_use_then_end_turn_calls_model_twice_and_handler_once() {
        let input = json!({"sd_id": "SD-LEO-001", "include": ["handoffs"]});
        let client = ScriptedClient::new(vec![
            tool_response("toolu_1", "get_strategic_directive", input.clone()),
            text_response("SD-LEO-001 is in PLAN."),
        ]);
        let seen = Arc::new(Mutex::new(Vec::new()));
        let tools =
            ToolSet::new(vec![recording_tool("get_strategic_directive", Arc::clone(&seen))])
                .unwrap();

        let result = run_programmatic_task(&client, "where is it?", &tools, &TaskOptions::default())
            .await
            .unwrap();

        assert_eq!(client.calls(), 2);
        assert_eq!(result.text, "SD-LEO-001 is in PLAN.");
        let seen = seen.lock().unwrap();
        assert_eq!(seen.len(), 1);
        assert_eq!(seen[0].0, input);

        let results = tool_results(&client.request(1));
        assert_eq!(
            results,
            vec![("toolu_1".to_string(), "recorded".to_string(), false)]
        );
        assert_eq!(result.tool_calls.len(), 1);
        assert_eq!(result.tool_calls[0].name, "get_strategic_directive");
    }

    #[tokio::test]
    async fn unknown_tool_is_reported_to_the_model() {
        let client = ScriptedClient::new(vec![
            tool_response("toolu_x", "delete_everything", json!({})),
            text_response("Sorry, I cannot do that."),
        ]);
        let result =
            run_programmatic_task(&client, "go", &ToolSet::empty(), &TaskOptions::default())
                .await
                .unwrap();

        assert_eq!(result.stop, TaskStop::EndTurn);
        let results = tool_results(&client.request(1));
        assert_eq!(results.len(), 1);
        assert_eq!(results[0].0, "toolu_x");
        assert!(results[0].1.contains("Unknown tool: delete_everything"));
        assert!(results[0].2);
    }

    #[tokio::test]
    async fn handler_error_message_reaches_the_model() {
        let client = ScriptedClient::new(vec![
            tool_response("toolu_1", "flaky", json!({})),
            text_response("Recovered."),
        ]);
        let tools = ToolSet::new(vec![Tool::from_fn(def("flaky"), |_input, _ctx| async {
            Err(anyhow::anyhow!("connection refused by database"))
        })])
        .unwrap();

        let result = run_programmatic_task(&client, "go", &tools, &TaskOptions::default())
            .await
            .unwrap();

        assert_eq!(result.text, "Recovered.");
        let results = tool_results(&client.request(1));
        assert!(results[0].1.contains("connection refused by database"));
        assert!(results[0].2);
        assert!(result.tool_calls[0].is_error);
    }

    struct OutOfBounds;

    #[async_trait]
    impl crate::tool::ToolHandler for OutOfBounds {
        async fn call(&self, input: Value, _ctx: ToolContext) -> anyhow::Result<String> {
            let picked: Vec<String> = Vec::new();
            let i = input["index"].as_u64().unwrap_or(3) as usize;
            Ok(picked[i].clone())
        }
    }

    #[tokio::test]
    async fn panicking_handler_is_reported_and_the_loop_continues() {
        let client = ScriptedClient::new(vec![
            tool_response("toolu_1", "pick", json!({"index": 3})),
            text_response("Handled."),
        ]);
        let tools = ToolSet::new(vec![Tool::new(def("pick"), OutOfBounds)]).unwrap();

        let result = run_programmatic_task(&client, "go", &tools, &TaskOptions::default())
            .await
            .unwrap();

        assert_eq!(result.text, "Handled.");
        assert_eq!(result.stop, TaskStop::EndTurn);
        let results = tool_results(&client.request(1));
        assert_eq!(
            results[0],
            (
                "toolu_1".to_string(),
                "Error: tool handler panicked".to_string(),
                true
            )
        );
    }

    #[tokio::test]
    async fn unknown_blocks_are_not_sent_back() {
        let mut first = tool_response("toolu_1", "lookup", json!({}));
        first.content.push(ContentBlock::Unknown);
        let client = ScriptedClient::new(vec![first, text_response("Done.")]);
        let seen = Arc::new(Mutex::new(Vec::new()));
        let tools = ToolSet::new(vec![recording_tool("lookup", seen)]).unwrap();

        run_programmatic_task(&client, "go", &tools, &TaskOptions::default())
            .await
            .unwrap();

        let second = client.request(1);
        let assistant = &second.messages[1];
        assert_eq!(assistant.role, Role::Assistant);
        assert_eq!(assistant.content.len(), 2);
        assert!(!assistant.content.contains(&ContentBlock::Unknown));
    }

    #[tokio::test]
    async fn dry_run_is_forwarded_to_every_handler() {
        let client = ScriptedClient::new(vec![
            tool_response("t1", "a", json!({"n": 1})),
            tool_response("t2", "b", json!({"n": 2})),
            text_response("done"),
        ]);
        let seen = Arc::new(Mutex::new(Vec::new()));
        let tools = ToolSet::new(vec![
            recording_tool("a", Arc::clone(&seen)),
            recording_tool("b", Arc::clone(&seen)),
        ])
        .unwrap();
        let options = TaskOptions {
            dry_run: true,
            ..Default::default()
        };

        run_programmatic_task(&client, "go", &tools, &options)
            .await
            .unwrap();

        let seen = seen.lock().unwrap();
        assert_eq!(seen.len(), 2);
        assert!(seen.iter().all(|(_, ctx)| ctx.dry_run));
    }

    #[tokio::test]
    async fn turn_cap_bounds_model_calls() {
        let client =
            ScriptedClient::new(vec![tool_response("t", "nonexistent_tool", json!({}))]);
        let result =
            run_programmatic_task(&client, "loop", &ToolSet::empty(), &TaskOptions::default())
                .await
                .unwrap();

        assert_eq!(client.calls(), DEFAULT_MAX_TURNS as usize);
        assert_eq!(result.stop, TaskStop::TurnLimit);
        assert_eq!(result.turns, DEFAULT_MAX_TURNS);
        assert_eq!(result.text, "Let me check.");
    }

    #[tokio::test]
    async fn custom_turn_cap_is_honoured() {
        let client = ScriptedClient::new(vec![tool_response("t", "missing", json!({}))]);
        let options = TaskOptions {
            max_turns: 3,
            ..Default::default()
        };
        run_programmatic_task(&client, "loop", &ToolSet::empty(), &options)
            .await
            .unwrap();
        assert_eq!(client.calls(), 3);
    }

    #[tokio::test]
    async fn multiple_tool_calls_in_one_turn_share_one_user_message() {
        let mut response = tool_response("t1", "a", json!({}));
        response.content.push(ContentBlock::ToolUse {
            id: "t2".into(),
            name: "missing".into(),
            input: json!({}),
        });
        let client = ScriptedClient::new(vec![response, text_response("ok")]);
        let seen = Arc::new(Mutex::new(Vec::new()));
        let tools = ToolSet::new(vec![recording_tool("a", seen)]).unwrap();

        run_programmatic_task(&client, "go", &tools, &TaskOptions::default())
            .await
            .unwrap();

        let second = client.request(1);
        assert_eq!(second.messages.len(), 3);
        let ids: Vec<_> = tool_results(&second).into_iter().map(|r| r.0).collect();
        assert_eq!(ids, vec!["t1", "t2"]);
    }

    #[tokio::test]
    async fn history_and_tools_are_sent_each_turn() {
        let client = ScriptedClient::new(vec![
            tool_response("t1", "a", json!({})),
            text_response("ok"),
        ]);
        let tools = ToolSet::new(vec![recording_tool("a", Arc::default())]).unwrap();
        let options = TaskOptions {
            system_prompt: Some("You are the LEAD agent.".into()),
            ..Default::default()
        };

        run_programmatic_task(&client, "first prompt", &tools, &options)
            .await
            .unwrap();

        let first = client.request(0);
        assert_eq!(first.messages, vec![Message::user_text("first prompt")]);
        assert_eq!(first.system.as_deref(), Some("You are the LEAD agent."));
        assert_eq!(first.tools.len(), 1);

        let second = client.request(1);
        assert_eq!(second.messages[0], Message::user_text("first prompt"));
        assert_eq!(second.messages[1].role, Role::Assistant);
    }

    #[tokio::test]
    async fn other_stop_reasons_end_the_task() {
        let mut response = text_response("truncated ans");
        response.stop_reason = Some(StopReason::MaxTokens);
        let client = ScriptedClient::new(vec![response]);
        let result =
            run_programmatic_task(&client, "go", &ToolSet::empty(), &TaskOptions::default())
                .await
                .unwrap();
        assert_eq!(result.stop, TaskStop::Model(StopReason::MaxTokens));
        assert_eq!(result.text, "truncated ans");
    }

    #[tokio::test]
    async fn effort_enables_thinking() {
        let client = ScriptedClient::new(vec![text_response("ok")]);
        let options = TaskOptions {
            effort: Some(Effort::Medium),
            ..Default::default()
        };
        run_programmatic_task(&client, "go", &ToolSet::empty(), &options)
            .await
            .unwrap();
        let req = client.request(0);
        assert!(req.thinking.is_some());
        assert!(req.max_tokens > Effort::Medium.budget_tokens());
    }

    #[tokio::test]
    async fn client_errors_propagate() {
        let err =
            run_programmatic_task(&FailingClient, "go", &ToolSet::empty(), &TaskOptions::default())
                .await
                .unwrap_err();
        assert!(matches!(err, AgentError::Api { status: 401, .. }));
    }
}
