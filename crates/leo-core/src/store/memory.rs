use std::sync::Mutex;

use async_trait::async_trait;

use super::{DirectiveFilter, DirectiveStore};
use crate::directive::{Handoff, StrategicDirective, SubAgentResult};
use crate::error::{LeoError, Result};

#[derive(Default)]
struct Tables {
    directives: Vec<StrategicDirective>,
    handoffs: Vec<Handoff>,
    results: Vec<SubAgentResult>,
}

impl Tables {
    fn replace(&mut self, sd: &StrategicDirective) -> Result<()> {
        let slot = self
            .directives
            .iter_mut()
            .find(|d| d.id == sd.id)
            .ok_or_else(|| LeoError::DirectiveNotFound(sd.id.clone()))?;
        *slot = sd.clone();
        Ok(())
    }
}

/// In-process [`DirectiveStore`]. Nothing survives the process.
#[derive(Default)]
pub struct MemoryStore {
    tables: Mutex<Tables>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// A store pre-populated with `directives`.
    pub fn with_directives(directives: impl IntoIterator<Item = StrategicDirective>) -> Self {
        let store = Self::new();
        store.lock().directives.extend(directives);
        store
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, Tables> {
        self.tables.lock().unwrap_or_else(|e| e.into_inner())
    }
}

#[async_trait]
impl DirectiveStore for MemoryStore {
    async fn get_directive(&self, key: &str) -> Result<Option<StrategicDirective>> {
        Ok(self
            .lock()
            .directives
            .iter()
            .find(|sd| sd.matches_key(key))
            .cloned())
    }

    async fn list_directives(&self, filter: &DirectiveFilter) -> Result<Vec<StrategicDirective>> {
        let mut out: Vec<_> = self
            .lock()
            .directives
            .iter()
            .filter(|sd| filter.matches(sd))
            .cloned()
            .collect();
        out.sort_by(|a, b| b.updated_at.cmp(&a.updated_at));
        if let Some(limit) = filter.limit {
            out.truncate(limit);
        }
        Ok(out)
    }

    async fn create_directive(&self, sd: &StrategicDirective) -> Result<()> {
        let mut t = self.lock();
        if t
            .directives
            .iter()
            .any(|d| d.matches_key(&sd.id) || d.matches_key(&sd.sd_key))
        {
            return Err(LeoError::DirectiveExists(sd.sd_key.clone()));
        }
        t.directives.push(sd.clone());
        Ok(())
    }

    async fn update_directive(&self, sd: &StrategicDirective) -> Result<()> {
        self.lock().replace(sd)
    }

    async fn apply_handoff(&self, sd: &StrategicDirective, handoff: &Handoff) -> Result<()> {
        let mut t = self.lock();
        t.replace(sd)?;
        t.handoffs.push(handoff.clone());
        Ok(())
    }

    async fn list_handoffs(&self, sd_id: &str) -> Result<Vec<Handoff>> {
        Ok(self
            .lock()
            .handoffs
            .iter()
            .filter(|h| h.sd_id == sd_id)
            .cloned()
            .collect())
    }

    async fn record_sub_agent_result(&self, result: &SubAgentResult) -> Result<()> {
        self.lock().results.push(result.clone());
        Ok(())
    }

    async fn list_sub_agent_results(&self, sd_id: &str) -> Result<Vec<SubAgentResult>> {
        let mut out: Vec<_> = self
            .lock()
            .results
            .iter()
            .filter(|r| r.sd_id == sd_id)
            .cloned()
            .collect();
        out.reverse();
        Ok(out)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{Phase, SdStatus};

    #[tokio::test]
    async fn get_by_id_or_key() {
        let mut sd = StrategicDirective::new("SD-KEY-001", "Keyed");
        sd.id = "4f1c".into();
        let store = MemoryStore::with_directives([sd]);
        assert!(store.get_directive("4f1c").await.unwrap().is_some());
        assert!(store.get_directive("SD-KEY-001").await.unwrap().is_some());
        assert!(store.get_directive("SD-NOPE").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn create_rejects_duplicates() {
        let store = MemoryStore::new();
        let sd = StrategicDirective::new("SD-DUP-001", "Dup");
        store.create_directive(&sd).await.unwrap();
        let err = store.create_directive(&sd).await.unwrap_err();
        assert!(matches!(err, LeoError::DirectiveExists(_)));
    }

    #[tokio::test]
    async fn list_applies_filter_and_limit() {
        let mut a = StrategicDirective::new("SD-A", "A");
        a.status = SdStatus::Active;
        a.current_phase = Phase::Plan;
        let b = StrategicDirective::new("SD-B", "B");
        let c = StrategicDirective::new("SD-C", "C");
        let store = MemoryStore::with_directives([a, b, c]);

        let active = store
            .list_directives(&DirectiveFilter {
                status: Some(SdStatus::Active),
                ..Default::default()
            })
            .await
            .unwrap();
        assert_eq!(active.len(), 1);
        assert_eq!(active[0].sd_key, "SD-A");

        let limited = store
            .list_directives(&DirectiveFilter {
                limit: Some(2),
                ..Default::default()
            })
            .await
            .unwrap();
        assert_eq!(limited.len(), 2);
    }

    #[tokio::test]
    async fn update_missing_directive_fails() {
        let store = MemoryStore::new();
        let sd = StrategicDirective::new("SD-GHOST", "Ghost");
        let err = store.update_directive(&sd).await.unwrap_err();
        assert!(matches!(err, LeoError::DirectiveNotFound(_)));
    }

    #[tokio::test]
    async fn apply_handoff_for_missing_directive_records_nothing() {
        use crate::directive::HandoffDraft;
        use crate::types::HandoffType;

        let store = MemoryStore::new();
        let sd = StrategicDirective::new("SD-GHOST", "Ghost");
        let handoff = Handoff::new(sd.id.clone(), HandoffType::LeadToPlan, HandoffDraft::default());
        let err = store.apply_handoff(&sd, &handoff).await.unwrap_err();
        assert!(matches!(err, LeoError::DirectiveNotFound(_)));
        assert!(store.list_handoffs("SD-GHOST").await.unwrap().is_empty());
    }
}
