//! Persistence for directives, handoffs and sub-agent results.
//!
//! Callers hold an `Arc<dyn DirectiveStore>` and pass it down explicitly;
//! [`PgStore`] talks to the LEO Postgres schema, [`MemoryStore`] backs tests
//! and dry local runs.

use async_trait::async_trait;

use crate::directive::{Handoff, StrategicDirective, SubAgentResult};
use crate::error::Result;
use crate::types::{Phase, SdStatus};

pub mod memory;
pub mod postgres;

pub use memory::MemoryStore;
pub use postgres::PgStore;

/// Filter for [`DirectiveStore::list_directives`]. Empty fields match all.
#[derive(Debug, Clone, Default)]
pub struct DirectiveFilter {
    pub status: Option<SdStatus>,
    pub phase: Option<Phase>,
    pub limit: Option<usize>,
}

impl DirectiveFilter {
    pub fn matches(&self, sd: &StrategicDirective) -> bool {
        self.status.map_or(true, |s| sd.status == s)
            && self.phase.map_or(true, |p| sd.current_phase == p)
    }
}

#[async_trait]
pub trait DirectiveStore: Send + Sync {
    /// Look up an SD by `id` or `sd_key`.
    async fn get_directive(&self, key: &str) -> Result<Option<StrategicDirective>>;

    /// Directives matching `filter`, most recently updated first.
    async fn list_directives(&self, filter: &DirectiveFilter) -> Result<Vec<StrategicDirective>>;

    async fn create_directive(&self, sd: &StrategicDirective) -> Result<()>;

    /// Persist status, phase, progress and metadata of an existing SD.
    async fn update_directive(&self, sd: &StrategicDirective) -> Result<()>;

    /// Persist `sd` after a transition together with the handoff recording
    /// it. Either both writes land or neither does.
    async fn apply_handoff(&self, sd: &StrategicDirective, handoff: &Handoff) -> Result<()>;

    /// Handoffs for an SD, oldest first.
    async fn list_handoffs(&self, sd_id: &str) -> Result<Vec<Handoff>>;

    async fn record_sub_agent_result(&self, result: &SubAgentResult) -> Result<()>;

    /// Sub-agent results for an SD, newest first.
    async fn list_sub_agent_results(&self, sd_id: &str) -> Result<Vec<SubAgentResult>>;
}
