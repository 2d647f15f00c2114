use serde::{Deserialize, Serialize};
use std::fmt;

use crate::error::LeoError;

// ---------------------------------------------------------------------------
// Phase
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Phase {
    #[serde(alias = "LEAD_APPROVAL")]
    Lead,
    Plan,
    Exec,
    #[serde(alias = "PLAN_VERIFICATION")]
    PlanVerify,
    #[serde(alias = "LEAD_FINAL_APPROVAL")]
    LeadFinal,
    #[serde(alias = "COMPLETE")]
    Completed,
}

impl Phase {
    pub fn all() -> &'static [Phase] {
        &[
            Phase::Lead,
            Phase::Plan,
            Phase::Exec,
            Phase::PlanVerify,
            Phase::LeadFinal,
            Phase::Completed,
        ]
    }

    /// Progress percentage an SD reaches on entering this phase.
    pub fn progress(self) -> u8 {
        match self {
            Phase::Lead => 0,
            Phase::Plan => 20,
            Phase::Exec => 40,
            Phase::PlanVerify => 70,
            Phase::LeadFinal => 85,
            Phase::Completed => 100,
        }
    }

    /// Status an SD takes on entering this phase.
    pub fn entry_status(self) -> SdStatus {
        match self {
            Phase::Lead => SdStatus::Draft,
            Phase::Plan => SdStatus::Active,
            Phase::Exec | Phase::PlanVerify => SdStatus::InProgress,
            Phase::LeadFinal => SdStatus::PendingApproval,
            Phase::Completed => SdStatus::Completed,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Phase::Lead => "LEAD",
            Phase::Plan => "PLAN",
            Phase::Exec => "EXEC",
            Phase::PlanVerify => "PLAN_VERIFY",
            Phase::LeadFinal => "LEAD_FINAL",
            Phase::Completed => "COMPLETED",
        }
    }
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for Phase {
    type Err = LeoError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_uppercase().replace('-', "_").as_str() {
            "LEAD" | "LEAD_APPROVAL" => Ok(Phase::Lead),
            "PLAN" => Ok(Phase::Plan),
            "EXEC" => Ok(Phase::Exec),
            "PLAN_VERIFY" | "PLAN_VERIFICATION" => Ok(Phase::PlanVerify),
            "LEAD_FINAL" | "LEAD_FINAL_APPROVAL" => Ok(Phase::LeadFinal),
            "COMPLETED" | "COMPLETE" => Ok(Phase::Completed),
            _ => Err(LeoError::InvalidPhase(s.to_string())),
        }
    }
}

// ---------------------------------------------------------------------------
// SdStatus
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SdStatus {
    Draft,
    Active,
    InProgress,
    PendingApproval,
    Completed,
    Deferred,
    Cancelled,
}

impl SdStatus {
    pub fn is_terminal(self) -> bool {
        matches!(self, SdStatus::Completed | SdStatus::Cancelled)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            SdStatus::Draft => "draft",
            SdStatus::Active => "active",
            SdStatus::InProgress => "in_progress",
            SdStatus::PendingApproval => "pending_approval",
            SdStatus::Completed => "completed",
            SdStatus::Deferred => "deferred",
            SdStatus::Cancelled => "cancelled",
        }
    }
}

impl fmt::Display for SdStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for SdStatus {
    type Err = LeoError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().replace('-', "_").as_str() {
            "draft" => Ok(SdStatus::Draft),
            "active" => Ok(SdStatus::Active),
            "in_progress" => Ok(SdStatus::InProgress),
            "pending_approval" => Ok(SdStatus::PendingApproval),
            "completed" | "complete" => Ok(SdStatus::Completed),
            "deferred" => Ok(SdStatus::Deferred),
            "cancelled" | "canceled" => Ok(SdStatus::Cancelled),
            _ => Err(LeoError::InvalidStatus(s.to_string())),
        }
    }
}

// ---------------------------------------------------------------------------
// Priority
// ---------------------------------------------------------------------------

#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize,
)]
#[serde(rename_all = "snake_case")]
pub enum Priority {
    Critical,
    High,
    #[default]
    Medium,
    Low,
}

impl Priority {
    pub fn as_str(self) -> &'static str {
        match self {
            Priority::Critical => "critical",
            Priority::High => "high",
            Priority::Medium => "medium",
            Priority::Low => "low",
        }
    }
}

impl fmt::Display for Priority {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for Priority {
    type Err = LeoError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "critical" | "immediate" => Ok(Priority::Critical),
            "high" => Ok(Priority::High),
            "medium" => Ok(Priority::Medium),
            "low" => Ok(Priority::Low),
            _ => Err(LeoError::InvalidPriority(s.to_string())),
        }
    }
}

// ---------------------------------------------------------------------------
// HandoffType
// ---------------------------------------------------------------------------

/// A phase transition. Each variant has exactly one source and target phase.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum HandoffType {
    #[serde(rename = "LEAD-TO-PLAN")]
    LeadToPlan,
    #[serde(rename = "PLAN-TO-EXEC")]
    PlanToExec,
    #[serde(rename = "EXEC-TO-PLAN")]
    ExecToPlan,
    #[serde(rename = "PLAN-TO-LEAD")]
    PlanToLead,
    #[serde(rename = "LEAD-FINAL-APPROVAL")]
    LeadFinalApproval,
}

impl HandoffType {
    pub fn all() -> &'static [HandoffType] {
        &[
            HandoffType::LeadToPlan,
            HandoffType::PlanToExec,
            HandoffType::ExecToPlan,
            HandoffType::PlanToLead,
            HandoffType::LeadFinalApproval,
        ]
    }

    pub fn from_phase(self) -> Phase {
        match self {
            HandoffType::LeadToPlan => Phase::Lead,
            HandoffType::PlanToExec => Phase::Plan,
            HandoffType::ExecToPlan => Phase::Exec,
            HandoffType::PlanToLead => Phase::PlanVerify,
            HandoffType::LeadFinalApproval => Phase::LeadFinal,
        }
    }

    pub fn to_phase(self) -> Phase {
        match self {
            HandoffType::LeadToPlan => Phase::Plan,
            HandoffType::PlanToExec => Phase::Exec,
            HandoffType::ExecToPlan => Phase::PlanVerify,
            HandoffType::PlanToLead => Phase::LeadFinal,
            HandoffType::LeadFinalApproval => Phase::Completed,
        }
    }

    /// The only handoff allowed out of `phase`, if any.
    pub fn for_transition(phase: Phase) -> Option<HandoffType> {
        HandoffType::all()
            .iter()
            .copied()
            .find(|h| h.from_phase() == phase)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            HandoffType::LeadToPlan => "LEAD-TO-PLAN",
            HandoffType::PlanToExec => "PLAN-TO-EXEC",
            HandoffType::ExecToPlan => "EXEC-TO-PLAN",
            HandoffType::PlanToLead => "PLAN-TO-LEAD",
            HandoffType::LeadFinalApproval => "LEAD-FINAL-APPROVAL",
        }
    }
}

impl fmt::Display for HandoffType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for HandoffType {
    type Err = LeoError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_uppercase().replace('_', "-").as_str() {
            "LEAD-TO-PLAN" => Ok(HandoffType::LeadToPlan),
            "PLAN-TO-EXEC" => Ok(HandoffType::PlanToExec),
            "EXEC-TO-PLAN" => Ok(HandoffType::ExecToPlan),
            "PLAN-TO-LEAD" => Ok(HandoffType::PlanToLead),
            "LEAD-FINAL-APPROVAL" | "LEAD-FINAL" => Ok(HandoffType::LeadFinalApproval),
            _ => Err(LeoError::InvalidHandoffType(s.to_string())),
        }
    }
}

// ---------------------------------------------------------------------------
// HandoffStatus
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum HandoffStatus {
    PendingAcceptance,
    Accepted,
    Rejected,
}

impl HandoffStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            HandoffStatus::PendingAcceptance => "pending_acceptance",
            HandoffStatus::Accepted => "accepted",
            HandoffStatus::Rejected => "rejected",
        }
    }
}

impl fmt::Display for HandoffStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for HandoffStatus {
    type Err = LeoError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "pending_acceptance" | "pending" => Ok(HandoffStatus::PendingAcceptance),
            "accepted" => Ok(HandoffStatus::Accepted),
            "rejected" => Ok(HandoffStatus::Rejected),
            _ => Err(LeoError::InvalidStatus(s.to_string())),
        }
    }
}

// ---------------------------------------------------------------------------
// Verdict
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Verdict {
    Pass,
    ConditionalPass,
    Fail,
    Blocked,
    Escalate,
    Error,
}

impl Verdict {
    pub fn is_passing(self) -> bool {
        matches!(self, Verdict::Pass | Verdict::ConditionalPass)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Verdict::Pass => "PASS",
            Verdict::ConditionalPass => "CONDITIONAL_PASS",
            Verdict::Fail => "FAIL",
            Verdict::Blocked => "BLOCKED",
            Verdict::Escalate => "ESCALATE",
            Verdict::Error => "ERROR",
        }
    }
}

impl fmt::Display for Verdict {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for Verdict {
    type Err = LeoError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_uppercase().replace('-', "_").as_str() {
            "PASS" => Ok(Verdict::Pass),
            "CONDITIONAL_PASS" => Ok(Verdict::ConditionalPass),
            "FAIL" => Ok(Verdict::Fail),
            "BLOCKED" => Ok(Verdict::Blocked),
            "ESCALATE" => Ok(Verdict::Escalate),
            "ERROR" => Ok(Verdict::Error),
            _ => Err(LeoError::InvalidVerdict(s.to_string())),
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
