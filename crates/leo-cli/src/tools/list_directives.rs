use async_trait::async_trait;
use leo_core::store::{DirectiveFilter, DirectiveStore};
use leo_core::types::{Phase, SdStatus};
use serde_json::{json, Value};

use super::{optional_str, LeoTool};

const DEFAULT_LIMIT: usize = 25;

pub struct ListDirectivesTool;

#[async_trait]
impl LeoTool for ListDirectivesTool {
    fn name(&self) -> &str {
        "list_strategic_directives"
    }

    fn description(&self) -> &str {
        "List strategic directives, optionally filtered by status and phase"
    }

    fn schema(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "status": {
                    "type": "string",
                    "enum": ["draft", "active", "in_progress", "pending_approval",
                             "completed", "deferred", "cancelled"]
                },
                "phase": {
                    "type": "string",
                    "enum": ["LEAD", "PLAN", "EXEC", "PLAN_VERIFY", "LEAD_FINAL", "COMPLETED"]
                },
                "limit": {
                    "type": "integer",
                    "minimum": 1,
                    "description": "Maximum rows (default 25)"
                }
            }
        })
    }

    async fn call(&self, args: Value, store: &dyn DirectiveStore, _dry_run: bool) -> anyhow::Result<Value> {
        let filter = DirectiveFilter {
            status: optional_str(&args, "status")
                .map(str::parse::<SdStatus>)
                .transpose()?,
            phase: optional_str(&args, "phase")
                .map(str::parse::<Phase>)
                .transpose()?,
            limit: Some(
                args.get("limit")
                    .and_then(Value::as_u64)
                    .map_or(DEFAULT_LIMIT, |n| n as usize),
            ),
        };
        let sds = store.list_directives(&filter).await?;
        let rows: Vec<Value> = sds
            .iter()
            .map(|sd| {
                json!({
                    "id": sd.id,
                    "sd_key": sd.sd_key,
                    "title": sd.title,
                    "status": sd.status,
                    "current_phase": sd.current_phase,
                    "priority": sd.priority,
                    "progress": sd.progress,
                })
            })
            .collect();
        Ok(json!({ "count": rows.len(), "directives": rows }))
    }
}
