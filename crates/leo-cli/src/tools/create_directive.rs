use async_trait::async_trait;
use leo_core::directive::StrategicDirective;
use leo_core::store::DirectiveStore;
use leo_core::types::Priority;
use leo_core::workflow;
use serde_json::{json, Value};

use super::{optional_str, required_str, LeoTool};

pub struct CreateDirectiveTool;

#[async_trait]
impl LeoTool for CreateDirectiveTool {
    fn name(&self) -> &str {
        "create_strategic_directive"
    }

    fn description(&self) -> &str {
        "Create a draft strategic directive in the LEAD phase. Fails if the key is already taken."
    }

    fn schema(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "sd_key": {"type": "string", "description": "e.g. SD-LEO-INFRA-001"},
                "title": {"type": "string"},
                "description": {"type": "string"},
                "priority": {"type": "string", "enum": ["critical", "high", "medium", "low"]},
                "sd_type": {"type": "string"}
            },
            "required": ["sd_key", "title"]
        })
    }

    async fn call(&self, args: Value, store: &dyn DirectiveStore, dry_run: bool) -> anyhow::Result<Value> {
        let mut sd = StrategicDirective::new(
            required_str(&args, "sd_key")?,
            required_str(&args, "title")?,
        );
        if let Some(p) = optional_str(&args, "priority") {
            sd.priority = p.parse::<Priority>()?;
        }
        sd.description = optional_str(&args, "description").unwrap_or_default().to_string();
        sd.sd_type = optional_str(&args, "sd_type").map(String::from);

        let sd = workflow::create(store, sd, dry_run).await?;
        Ok(json!({ "dry_run": dry_run, "directive": sd }))
    }
}
