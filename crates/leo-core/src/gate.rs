use serde::{Deserialize, Serialize};

// ---------------------------------------------------------------------------
// GateDefinition
// ---------------------------------------------------------------------------

/// A shell check run before a handoff is accepted.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct GateDefinition {
    pub name: String,
    pub command: String,
    #[serde(default = "default_weight")]
    pub weight: f64,
    #[serde(default = "default_required")]
    pub required: bool,
    /// Retries after the first attempt. `0` means one attempt total.
    #[serde(default)]
    pub max_retries: u32,
    #[serde(default = "default_timeout")]
    pub timeout_seconds: u32,
}

fn default_weight() -> f64 {
    1.0
}

fn default_required() -> bool {
    true
}

fn default_timeout() -> u32 {
    120
}

impl GateDefinition {
    pub fn new(name: impl Into<String>, command: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            command: command.into(),
            weight: default_weight(),
            required: default_required(),
            max_retries: 0,
            timeout_seconds: default_timeout(),
        }
    }
}

// ---------------------------------------------------------------------------
// GateResult
// ---------------------------------------------------------------------------

pub const PASS_SCORE: u32 = 100;

/// Final outcome of one gate after all attempts.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GateResult {
    pub gate_name: String,
    pub passed: bool,
    /// `100` on pass, `0` on fail.
    pub score: u32,
    pub weight: f64,
    pub required: bool,
    pub output: String,
    /// 1-indexed attempt that produced this result.
    pub attempt: u32,
    pub duration_ms: u64,
}

impl GateResult {
    pub fn new(gate: &GateDefinition, passed: bool, output: String, attempt: u32) -> Self {
        Self {
            gate_name: gate.name.clone(),
            passed,
            score: if passed { PASS_SCORE } else { 0 },
            weight: gate.weight,
            required: gate.required,
            output,
            attempt,
            duration_ms: 0,
        }
    }
}

// ---------------------------------------------------------------------------
// Scoring
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GateReport {
    /// Rounded weighted average of the evaluated gates' scores.
    pub normalized_score: u32,
    pub passed: bool,
    /// First required gate that failed. Evaluation stops there.
    pub failed_gate: Option<String>,
    pub warnings: Vec<String>,
    pub evaluated: usize,
}

impl GateReport {
    pub fn meets(&self, threshold: u32) -> bool {
        self.passed && self.normalized_score >= threshold
    }
}

/// Score gate results in order.
///
/// An empty result list scores 100 and passes.
pub fn score_gates(results: &[GateResult]) -> GateReport {
    let mut weighted = 0.0;
    let mut total_weight = 0.0;
    let mut warnings = Vec::new();
    let mut failed_gate = None;
    let mut evaluated = 0;

    for result in results {
        evaluated += 1;
        weighted += result.weight * f64::from(result.score);
        total_weight += result.weight;

        if !result.passed {
            if result.required {
                failed_gate = Some(result.gate_name.clone());
                break;
            }
            warnings.push(format!("optional gate '{}' failed", result.gate_name));
        }
    }

    let normalized_score = if total_weight > 0.0 {
        (weighted / total_weight).round() as u32
    } else {
        PASS_SCORE
    };

    GateReport {
        normalized_score,
        passed: failed_gate.is_none(),
        failed_gate,
        warnings,
        evaluated,
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    fn result(name: &str, passed: bool, weight: f64, required: bool) -> GateResult {
        let mut gate = GateDefinition::new(name, "true");
        gate.weight = weight;
        gate.required = required;
        GateResult::new(&gate, passed, String::new(), 1)
    }

    #[test]
    fn gate_defaults() {
        let yaml = "name: lint\ncommand: npm run lint\n";
        let gate: GateDefinition = serde_yaml::from_str(yaml).unwrap();
        assert_eq!(gate.weight, 1.0);
        assert!(gate.required);
        assert_eq!(gate.max_retries, 0);
        assert_eq!(gate.timeout_seconds, 120);
    }

    #[test]
    fn gate_definition_rejects_unknown_fields() {
        let yaml = "name: lint\ncommand: npm run lint\ntimout_seconds: 30\n";
        assert!(serde_yaml::from_str::<GateDefinition>(yaml).is_err());
    }

    #[test]
    fn all_passing_scores_100() {
        let report = score_gates(&[result("a", true, 1.0, true), result("b", true, 2.0, true)]);
        assert_eq!(report.normalized_score, 100);
        assert!(report.passed);
        assert!(report.meets(100));
    }

    #[test]
    fn optional_failure_is_weighted_and_warned() {
        let report = score_gates(&[result("a", true, 3.0, true), result("b", false, 1.0, false)]);
        assert_eq!(report.normalized_score, 75);
        assert!(report.passed);
        assert_eq!(report.warnings.len(), 1);
        assert!(!report.meets(80));
    }

    #[test]
    fn required_failure_stops_evaluation() {
        let report = score_gates(&[
            result("a", true, 1.0, true),
            result("b", false, 1.0, true),
            result("c", true, 1.0, true),
        ]);
        assert_eq!(report.failed_gate.as_deref(), Some("b"));
        assert_eq!(report.evaluated, 2);
        assert_eq!(report.normalized_score, 50);
        assert!(!report.meets(0));
    }

    #[test]
    fn rounding_is_to_nearest() {
        let report = score_gates(&[
            result("a", true, 1.0, false),
            result("b", true, 1.0, false),
            result("c", false, 1.0, false),
        ]);
        assert_eq!(report.normalized_score, 67);
    }

    #[test]
    fn no_gates_passes() {
        let report = score_gates(&[]);
        assert_eq!(report.normalized_score, 100);
        assert!(report.passed);
    }
}
