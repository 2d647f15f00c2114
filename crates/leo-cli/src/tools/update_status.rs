use async_trait::async_trait;
use leo_core::store::DirectiveStore;
use leo_core::types::SdStatus;
use leo_core::workflow;
use serde_json::{json, Value};

use super::{required_str, LeoTool};

pub struct UpdateStatusTool;

#[async_trait]
impl LeoTool for UpdateStatusTool {
    fn name(&self) -> &str {
        "update_directive_status"
    }

    fn description(&self) -> &str {
        "Defer, cancel or reactivate a strategic directive. Other statuses follow the phase and \
         change only through handoffs."
    }

    fn schema(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "sd_id": {"type": "string"},
                "status": {"type": "string", "enum": ["deferred", "cancelled", "active"]}
            },
            "required": ["sd_id", "status"]
        })
    }

    async fn call(&self, args: Value, store: &dyn DirectiveStore, dry_run: bool) -> anyhow::Result<Value> {
        let sd_id = required_str(&args, "sd_id")?;
        let status: SdStatus = required_str(&args, "status")?.parse()?;
        let sd = workflow::set_status(store, sd_id, status, dry_run).await?;
        Ok(json!({
            "dry_run": dry_run,
            "sd_key": sd.sd_key,
            "status": sd.status,
            "current_phase": sd.current_phase,
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tools::tests::{sd, store_with};
    use leo_core::types::Phase;

    #[tokio::test]
    async fn defers_directive() {
        let store = store_with(vec![sd("SD-LEO-020", Phase::Exec)]);
        let out = UpdateStatusTool
            .call(json!({"sd_id": "SD-LEO-020", "status": "deferred"}), store.as_ref(), false)
            .await
            .unwrap();
        assert_eq!(out["status"], "deferred");
        let stored = store.get_directive("SD-LEO-020").await.unwrap().unwrap();
        assert_eq!(stored.status, SdStatus::Deferred);
    }

    #[tokio::test]
    async fn dry_run_keeps_status() {
        let store = store_with(vec![sd("SD-LEO-021", Phase::Plan)]);
        UpdateStatusTool
            .call(json!({"sd_id": "SD-LEO-021", "status": "cancelled"}), store.as_ref(), true)
            .await
            .unwrap();
        let stored = store.get_directive("SD-LEO-021").await.unwrap().unwrap();
        assert_eq!(stored.status, SdStatus::Active);
    }

    #[tokio::test]
    async fn phase_driven_status_is_refused() {
        let store = store_with(vec![sd("SD-LEO-022", Phase::Plan)]);
        let err = UpdateStatusTool
            .call(json!({"sd_id": "SD-LEO-022", "status": "completed"}), store.as_ref(), false)
            .await
            .unwrap_err();
        assert!(err.to_string().contains("record a handoff"));
    }
}
