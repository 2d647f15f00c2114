use async_trait::async_trait;
use leo_core::directive::SubAgentResult;
use leo_core::store::DirectiveStore;
use leo_core::types::Verdict;
use leo_core::workflow;
use serde_json::{json, Value};

use super::{optional_str, required_str, string_list, LeoTool};

pub struct RecordResultTool;

#[async_trait]
impl LeoTool for RecordResultTool {
    fn name(&self) -> &str {
        "record_sub_agent_result"
    }

    fn description(&self) -> &str {
        "Record a sub-agent verdict (e.g. TESTING, SECURITY, DATABASE) for a strategic directive"
    }

    fn schema(&self) -> Value {
        let list = json!({"type": "array", "items": {"type": "string"}});
        json!({
            "type": "object",
            "properties": {
                "sd_id": {"type": "string"},
                "sub_agent_code": {"type": "string"},
                "verdict": {
                    "type": "string",
                    "enum": ["PASS", "CONDITIONAL_PASS", "FAIL", "BLOCKED", "ESCALATE", "ERROR"]
                },
                "confidence": {"type": "integer", "minimum": 0, "maximum": 100},
                "summary": {"type": "string"},
                "critical_issues": list,
                "warnings": list,
                "recommendations": list
            },
            "required": ["sd_id", "sub_agent_code", "verdict", "confidence"]
        })
    }

    async fn call(&self, args: Value, store: &dyn DirectiveStore, dry_run: bool) -> anyhow::Result<Value> {
        let verdict: Verdict = required_str(&args, "verdict")?.parse()?;
        let confidence = args
            .get("confidence")
            .and_then(Value::as_i64)
            .ok_or_else(|| anyhow::anyhow!("missing required argument: confidence"))?;

        let mut result = SubAgentResult::new(
            required_str(&args, "sd_id")?,
            required_str(&args, "sub_agent_code")?,
            verdict,
            confidence,
            optional_str(&args, "summary").unwrap_or_default(),
        )?;
        result.critical_issues = string_list(&args, "critical_issues");
        result.warnings = string_list(&args, "warnings");
        result.recommendations = string_list(&args, "recommendations");

        let recorded = workflow::record_verdict(store, result, dry_run).await?;
        Ok(json!({ "dry_run": dry_run, "result": recorded }))
    }
}
