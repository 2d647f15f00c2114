use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::{LeoError, Result};
use crate::types::{HandoffStatus, HandoffType, Phase, Priority, SdStatus, Verdict};

// ---------------------------------------------------------------------------
// StrategicDirective
// ---------------------------------------------------------------------------

/// A row of `strategic_directives_v2`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StrategicDirective {
    pub id: String,
    /// Human-facing key such as `SD-LEO-INFRA-001`. Often equal to `id`.
    pub sd_key: String,
    pub title: String,
    #[serde(default)]
    pub description: String,
    pub status: SdStatus,
    pub current_phase: Phase,
    #[serde(default)]
    pub priority: Priority,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sd_type: Option<String>,
    #[serde(default)]
    pub progress: u8,
    #[serde(default)]
    pub metadata: serde_json::Value,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl StrategicDirective {
    /// A fresh draft SD in the LEAD phase.
    pub fn new(sd_key: impl Into<String>, title: impl Into<String>) -> Self {
        let sd_key = sd_key.into();
        let now = Utc::now();
        Self {
            id: sd_key.clone(),
            sd_key,
            title: title.into(),
            description: String::new(),
            status: SdStatus::Draft,
            current_phase: Phase::Lead,
            priority: Priority::default(),
            sd_type: None,
            progress: 0,
            metadata: serde_json::json!({}),
            created_at: now,
            updated_at: now,
        }
    }

    /// Whether `key` names this SD by either `id` or `sd_key`.
    pub fn matches_key(&self, key: &str) -> bool {
        self.id == key || self.sd_key == key
    }

    /// Move the SD through `handoff`, updating phase, status and progress.
    ///
    /// Fails without mutating if the SD is terminal or not in the handoff's
    /// source phase.
    pub fn apply_handoff(&mut self, handoff: HandoffType) -> Result<()> {
        let to = handoff.to_phase();
        if self.status.is_terminal() {
            return Err(LeoError::InvalidTransition {
                from: self.current_phase.to_string(),
                to: to.to_string(),
                reason: format!("directive is {}", self.status),
            });
        }
        if self.status == SdStatus::Deferred {
            return Err(LeoError::InvalidTransition {
                from: self.current_phase.to_string(),
                to: to.to_string(),
                reason: "directive is deferred; reactivate it first".into(),
            });
        }
        if self.current_phase != handoff.from_phase() {
            let expected = HandoffType::for_transition(self.current_phase)
                .map(|h| h.to_string())
                .unwrap_or_else(|| "none".into());
            return Err(LeoError::InvalidTransition {
                from: self.current_phase.to_string(),
                to: to.to_string(),
                reason: format!(
                    "{handoff} requires phase {}, expected handoff {expected}",
                    handoff.from_phase()
                ),
            });
        }

        self.current_phase = to;
        self.status = to.entry_status();
        self.progress = self.progress.max(to.progress());
        self.updated_at = Utc::now();
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Handoff
// ---------------------------------------------------------------------------

/// The caller-supplied part of a handoff: the seven handoff elements.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct HandoffDraft {
    pub executive_summary: String,
    #[serde(default)]
    pub completeness_report: String,
    #[serde(default)]
    pub deliverables_manifest: Vec<String>,
    #[serde(default)]
    pub key_decisions: Vec<String>,
    #[serde(default)]
    pub known_issues: Vec<String>,
    #[serde(default)]
    pub resource_utilization: String,
    #[serde(default)]
    pub action_items: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created_by: Option<String>,
}

/// A row of `sd_phase_handoffs`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Handoff {
    pub id: Uuid,
    pub sd_id: String,
    pub handoff_type: HandoffType,
    pub from_phase: Phase,
    pub to_phase: Phase,
    pub status: HandoffStatus,
    #[serde(flatten)]
    pub content: HandoffDraft,
    pub created_at: DateTime<Utc>,
}

impl Handoff {
    pub fn new(sd_id: impl Into<String>, handoff_type: HandoffType, content: HandoffDraft) -> Self {
        Self {
            id: Uuid::new_v4(),
            sd_id: sd_id.into(),
            handoff_type,
            from_phase: handoff_type.from_phase(),
            to_phase: handoff_type.to_phase(),
            status: HandoffStatus::PendingAcceptance,
            content,
            created_at: Utc::now(),
        }
    }
}

// ---------------------------------------------------------------------------
// SubAgentResult
// ---------------------------------------------------------------------------

/// A row of `sub_agent_execution_results`: one sub-agent's verdict on an SD.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SubAgentResult {
    pub id: Uuid,
    pub sd_id: String,
    /// Sub-agent code, e.g. `DATABASE`, `TESTING`, `SECURITY`.
    pub sub_agent_code: String,
    pub verdict: Verdict,
    pub confidence: u8,
    #[serde(default)]
    pub summary: String,
    #[serde(default)]
    pub critical_issues: Vec<String>,
    #[serde(default)]
    pub warnings: Vec<String>,
    #[serde(default)]
    pub recommendations: Vec<String>,
    pub created_at: DateTime<Utc>,
}

impl SubAgentResult {
    pub fn new(
        sd_id: impl Into<String>,
        sub_agent_code: impl Into<String>,
        verdict: Verdict,
        confidence: i64,
        summary: impl Into<String>,
    ) -> Result<Self> {
        if !(0..=100).contains(&confidence) {
            return Err(LeoError::InvalidConfidence(confidence));
        }
        Ok(Self {
            id: Uuid::new_v4(),
            sd_id: sd_id.into(),
            sub_agent_code: sub_agent_code.into().to_ascii_uppercase(),
            verdict,
            confidence: confidence as u8,
            summary: summary.into(),
            critical_issues: Vec::new(),
            warnings: Vec::new(),
            recommendations: Vec::new(),
            created_at: Utc::now(),
        })
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn new_directive_starts_in_lead_draft() {
        let sd = StrategicDirective::new("SD-TEST-001", "Test");
        assert_eq!(sd.current_phase, Phase::Lead);
        assert_eq!(sd.status, SdStatus::Draft);
        assert!(sd.matches_key("SD-TEST-001"));
    }

    #[test]
    fn full_workflow_reaches_completed() {
        let mut sd = StrategicDirective::new("SD-TEST-001", "Test");
        for h in HandoffType::all() {
            sd.apply_handoff(*h).unwrap();
        }
        assert_eq!(sd.current_phase, Phase::Completed);
        assert_eq!(sd.status, SdStatus::Completed);
        assert_eq!(sd.progress, 100);
    }

    #[test]
    fn apply_handoff_sets_entry_status_and_progress() {
        let mut sd = StrategicDirective::new("SD-TEST-001", "Test");
        sd.apply_handoff(HandoffType::LeadToPlan).unwrap();
        assert_eq!(sd.status, SdStatus::Active);
        sd.apply_handoff(HandoffType::PlanToExec).unwrap();
        assert_eq!(sd.status, SdStatus::InProgress);
        assert_eq!(sd.progress, 40);
    }

    #[test]
    fn skipping_a_phase_is_rejected_without_mutation() {
        let mut sd = StrategicDirective::new("SD-TEST-001", "Test");
        let before = sd.clone();
        let err = sd.apply_handoff(HandoffType::PlanToExec).unwrap_err();
        assert!(matches!(err, LeoError::InvalidTransition { .. }));
        assert!(err.to_string().contains("LEAD-TO-PLAN"));
        assert_eq!(sd, before);
    }

    #[test]
    fn terminal_directive_cannot_move() {
        let mut sd = StrategicDirective::new("SD-TEST-001", "Test");
        sd.status = SdStatus::Cancelled;
        assert!(sd.apply_handoff(HandoffType::LeadToPlan).is_err());
    }

    #[test]
    fn deferred_directive_cannot_move() {
        let mut sd = StrategicDirective::new("SD-TEST-001", "Test");
        sd.status = SdStatus::Deferred;
        let err = sd.apply_handoff(HandoffType::LeadToPlan).unwrap_err();
        assert!(err.to_string().contains("deferred"));
    }

    #[test]
    fn sub_agent_result_rejects_out_of_range_confidence() {
        let err = SubAgentResult::new("SD-1", "testing", Verdict::Pass, 101, "").unwrap_err();
        assert!(matches!(err, LeoError::InvalidConfidence(101)));
        let ok = SubAgentResult::new("SD-1", "testing", Verdict::Pass, 90, "ok").unwrap();
        assert_eq!(ok.sub_agent_code, "TESTING");
    }

    #[test]
    fn handoff_json_flattens_content() {
        let h = Handoff::new(
            "SD-1",
            HandoffType::LeadToPlan,
            HandoffDraft {
                executive_summary: "Approved".into(),
                ..Default::default()
            },
        );
        let v = serde_json::to_value(&h).unwrap();
        assert_eq!(v["executive_summary"], "Approved");
        assert_eq!(v["handoff_type"], "LEAD-TO-PLAN");
        assert_eq!(v["from_phase"], "LEAD");
    }
}
