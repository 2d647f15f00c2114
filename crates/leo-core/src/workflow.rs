//! Store-backed workflow operations.
//!
//! Each operation loads the directive, validates the change in memory, and
//! only then writes. With `dry_run` set nothing is written; the returned
//! values describe what would have been persisted.

use chrono::Utc;

use crate::directive::{Handoff, HandoffDraft, StrategicDirective, SubAgentResult};
use crate::error::{LeoError, Result};
use crate::store::DirectiveStore;
use crate::types::{HandoffStatus, HandoffType, SdStatus};

/// Outcome of [`advance`]: the directive after the transition and the
/// handoff that records it.
#[derive(Debug, Clone)]
pub struct Advanced {
    pub directive: StrategicDirective,
    pub handoff: Handoff,
}

async fn load(store: &dyn DirectiveStore, sd_id: &str) -> Result<StrategicDirective> {
    store
        .get_directive(sd_id)
        .await?
        .ok_or_else(|| LeoError::DirectiveNotFound(sd_id.to_string()))
}

/// Insert a new draft directive. Its key and title must be non-blank and
/// neither its `id` nor its `sd_key` may name an existing directive.
pub async fn create(
    store: &dyn DirectiveStore,
    sd: StrategicDirective,
    dry_run: bool,
) -> Result<StrategicDirective> {
    if sd.sd_key.trim().is_empty() {
        return Err(LeoError::InvalidDirective("sd_key is empty".into()));
    }
    if sd.title.trim().is_empty() {
        return Err(LeoError::InvalidDirective("title is empty".into()));
    }
    for key in [&sd.id, &sd.sd_key] {
        if store.get_directive(key).await?.is_some() {
            return Err(LeoError::DirectiveExists(key.clone()));
        }
    }

    if dry_run {
        tracing::info!(sd = %sd.sd_key, "dry run: directive not created");
    } else {
        store.create_directive(&sd).await?;
        tracing::info!(sd = %sd.sd_key, priority = %sd.priority, "directive created");
    }
    Ok(sd)
}

/// Move `sd_id` through `handoff_type`, recording an accepted handoff.
pub async fn advance(
    store: &dyn DirectiveStore,
    sd_id: &str,
    handoff_type: HandoffType,
    draft: HandoffDraft,
    dry_run: bool,
) -> Result<Advanced> {
    let mut sd = load(store, sd_id).await?;
    sd.apply_handoff(handoff_type)?;

    let mut handoff = Handoff::new(sd.id.clone(), handoff_type, draft);
    handoff.status = HandoffStatus::Accepted;

    if dry_run {
        tracing::info!(sd = %sd.sd_key, handoff = %handoff_type, "dry run: handoff not recorded");
    } else {
        store.apply_handoff(&sd, &handoff).await?;
        tracing::info!(sd = %sd.sd_key, handoff = %handoff_type, phase = %sd.current_phase, "handoff recorded");
    }

    Ok(Advanced {
        directive: sd,
        handoff,
    })
}

/// Set a directive's status by hand.
///
/// Only `deferred`, `cancelled` and `active` are accepted; `active` is only
/// valid for a deferred directive. Terminal directives never change.
pub async fn set_status(
    store: &dyn DirectiveStore,
    sd_id: &str,
    status: SdStatus,
    dry_run: bool,
) -> Result<StrategicDirective> {
    let mut sd = load(store, sd_id).await?;

    let reject = |reason: String| LeoError::InvalidTransition {
        from: sd.status.to_string(),
        to: status.to_string(),
        reason,
    };

    if sd.status.is_terminal() {
        return Err(reject(format!("directive is {}", sd.status)));
    }
    match status {
        SdStatus::Deferred | SdStatus::Cancelled => {}
        SdStatus::Active if sd.status == SdStatus::Deferred => {}
        SdStatus::Active => {
            return Err(reject("only a deferred directive can be reactivated".into()));
        }
        _ => {
            return Err(reject(
                "status follows the phase; record a handoff instead".into(),
            ));
        }
    }

    sd.status = status;
    sd.updated_at = Utc::now();

    if !dry_run {
        store.update_directive(&sd).await?;
        tracing::info!(sd = %sd.sd_key, %status, "status updated");
    }
    Ok(sd)
}

/// Persist a sub-agent verdict for an existing directive.
pub async fn record_verdict(
    store: &dyn DirectiveStore,
    mut result: SubAgentResult,
    dry_run: bool,
) -> Result<SubAgentResult> {
    if result.confidence > 100 {
        return Err(LeoError::InvalidConfidence(i64::from(result.confidence)));
    }
    let sd = load(store, &result.sd_id).await?;
    result.sd_id = sd.id;

    if !dry_run {
        store.record_sub_agent_result(&result).await?;
        tracing::info!(
            sd = %result.sd_id,
            agent = %result.sub_agent_code,
            verdict = %result.verdict,
            "sub-agent result recorded"
        );
    }
    Ok(result)
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
