use async_trait::async_trait;
use leo_core::directive::HandoffDraft;
use leo_core::store::DirectiveStore;
use leo_core::types::HandoffType;
use leo_core::workflow;
use serde_json::{json, Value};

use super::{optional_str, required_str, string_list, LeoTool};

pub struct CreateHandoffTool;

#[async_trait]
impl LeoTool for CreateHandoffTool {
    fn name(&self) -> &str {
        "create_handoff"
    }

    fn description(&self) -> &str {
        "Record a phase handoff for a strategic directive and advance it to the next phase. \
         The handoff type defaults to the only legal one for the directive's current phase."
    }

    fn schema(&self) -> Value {
        let list = json!({"type": "array", "items": {"type": "string"}});
        json!({
            "type": "object",
            "properties": {
                "sd_id": {"type": "string"},
                "handoff_type": {
                    "type": "string",
                    "enum": ["LEAD-TO-PLAN", "PLAN-TO-EXEC", "EXEC-TO-PLAN",
                             "PLAN-TO-LEAD", "LEAD-FINAL-APPROVAL"]
                },
                "executive_summary": {"type": "string"},
                "completeness_report": {"type": "string"},
                "deliverables_manifest": list,
                "key_decisions": list,
                "known_issues": list,
                "resource_utilization": {"type": "string"},
                "action_items": list,
                "created_by": {"type": "string"}
            },
            "required": ["sd_id", "executive_summary"]
        })
    }

    async fn call(&self, args: Value, store: &dyn DirectiveStore, dry_run: bool) -> anyhow::Result<Value> {
        let sd_id = required_str(&args, "sd_id")?;
        let draft = HandoffDraft {
            executive_summary: required_str(&args, "executive_summary")?.to_string(),
            completeness_report: optional_str(&args, "completeness_report")
                .unwrap_or_default()
                .to_string(),
            deliverables_manifest: string_list(&args, "deliverables_manifest"),
            key_decisions: string_list(&args, "key_decisions"),
            known_issues: string_list(&args, "known_issues"),
            resource_utilization: optional_str(&args, "resource_utilization")
                .unwrap_or_default()
                .to_string(),
            action_items: string_list(&args, "action_items"),
            created_by: optional_str(&args, "created_by").map(String::from),
        };

        let handoff_type = match optional_str(&args, "handoff_type") {
            Some(s) => s.parse::<HandoffType>()?,
            None => {
                let sd = store
                    .get_directive(sd_id)
                    .await?
                    .ok_or_else(|| anyhow::anyhow!("strategic directive '{sd_id}' not found"))?;
                HandoffType::for_transition(sd.current_phase).ok_or_else(|| {
                    anyhow::anyhow!("directive '{sd_id}' is {}; no handoff follows", sd.current_phase)
                })?
            }
        };

        let advanced = workflow::advance(store, sd_id, handoff_type, draft, dry_run).await?;
        Ok(json!({
            "dry_run": dry_run,
            "handoff": advanced.handoff,
            "directive": {
                "sd_key": advanced.directive.sd_key,
                "current_phase": advanced.directive.current_phase,
                "status": advanced.directive.status,
                "progress": advanced.directive.progress,
            },
        }))
    }
}
