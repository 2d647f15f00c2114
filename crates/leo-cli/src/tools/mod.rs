//! Tools `leo run` exposes to the model, backed by a [`DirectiveStore`].

use std::sync::Arc;

use async_trait::async_trait;
use leo_agent::{Tool, ToolContext, ToolDefinition, ToolHandler, ToolSet};
use leo_core::store::DirectiveStore;
use serde_json::Value;

pub mod create_directive;
pub mod create_handoff;
pub mod get_directive;
pub mod list_directives;
pub mod record_result;
pub mod update_status;

#[async_trait]
pub trait LeoTool: Send + Sync {
    fn name(&self) -> &str;
    fn description(&self) -> &str;
    fn schema(&self) -> Value;
    /// Mutating tools must not write when `dry_run` is set.
    async fn call(&self, args: Value, store: &dyn DirectiveStore, dry_run: bool)
        -> anyhow::Result<Value>;
}

pub fn all_tools() -> Vec<Arc<dyn LeoTool>> {
    vec![
        Arc::new(get_directive::GetDirectiveTool),
        Arc::new(list_directives::ListDirectivesTool),
        Arc::new(create_directive::CreateDirectiveTool),
        Arc::new(create_handoff::CreateHandoffTool),
        Arc::new(update_status::UpdateStatusTool),
        Arc::new(record_result::RecordResultTool),
    ]
}

/// Every LEO tool bound to `store`, ready for the tool loop.
pub fn tool_set(store: Arc<dyn DirectiveStore>) -> leo_agent::Result<ToolSet> {
    let tools = all_tools()
        .into_iter()
        .map(|tool| {
            let definition = ToolDefinition {
                name: tool.name().to_string(),
                description: tool.description().to_string(),
                input_schema: tool.schema(),
            };
            Tool::new(
                definition,
                Bound {
                    tool,
                    store: Arc::clone(&store),
                },
            )
        })
        .collect();
    ToolSet::new(tools)
}

struct Bound {
    tool: Arc<dyn LeoTool>,
    store: Arc<dyn DirectiveStore>,
}

#[async_trait]
impl ToolHandler for Bound {
    async fn call(&self, input: Value, ctx: ToolContext) -> anyhow::Result<String> {
        let value = self
            .tool
            .call(input, self.store.as_ref(), ctx.dry_run)
            .await?;
        Ok(serde_json::to_string_pretty(&value)?)
    }
}

// ---------------------------------------------------------------------------
// Argument helpers
// ---------------------------------------------------------------------------

pub(crate) fn required_str<'a>(args: &'a Value, key: &str) -> anyhow::Result<&'a str> {
    args.get(key)
        .and_then(Value::as_str)
        .filter(|s| !s.trim().is_empty())
        .ok_or_else(|| anyhow::anyhow!("missing required argument: {key}"))
}

pub(crate) fn optional_str<'a>(args: &'a Value, key: &str) -> Option<&'a str> {
    args.get(key).and_then(Value::as_str)
}

pub(crate) fn string_list(args: &Value, key: &str) -> Vec<String> {
    args.get(key)
        .and_then(Value::as_array)
        .map(|items| {
            items
                .iter()
                .filter_map(Value::as_str)
                .map(String::from)
                .collect()
        })
        .unwrap_or_default()
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
