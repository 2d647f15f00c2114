use async_trait::async_trait;
use leo_core::store::DirectiveStore;
use serde_json::{json, Value};

use super::{required_str, LeoTool};

pub struct GetDirectiveTool;

#[async_trait]
impl LeoTool for GetDirectiveTool {
    fn name(&self) -> &str {
        "get_strategic_directive"
    }

    fn description(&self) -> &str {
        "Get a strategic directive by id or sd_key, with its handoffs and sub-agent results"
    }

    fn schema(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "sd_id": {
                    "type": "string",
                    "description": "Directive id or sd_key, e.g. SD-LEO-001"
                }
            },
            "required": ["sd_id"]
        })
    }

    async fn call(&self, args: Value, store: &dyn DirectiveStore, _dry_run: bool) -> anyhow::Result<Value> {
        let key = required_str(&args, "sd_id")?;
        let sd = store
            .get_directive(key)
            .await?
            .ok_or_else(|| anyhow::anyhow!("strategic directive '{key}' not found"))?;
        let handoffs = store.list_handoffs(&sd.id).await?;
        let results = store.list_sub_agent_results(&sd.id).await?;
        Ok(json!({
            "directive": sd,
            "handoffs": handoffs,
            "sub_agent_results": results,
        }))
    }
}
