use crate::error::Result;
use crate::gate::GateDefinition;
use crate::paths;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::Path;

// ---------------------------------------------------------------------------
// ConfigWarning / WarnLevel
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConfigWarning {
    pub level: WarnLevel,
    pub message: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WarnLevel {
    Warning,
    Error,
}

impl ConfigWarning {
    fn warning(message: String) -> Self {
        Self {
            level: WarnLevel::Warning,
            message,
        }
    }

    fn error(message: String) -> Self {
        Self {
            level: WarnLevel::Error,
            message,
        }
    }
}

// ---------------------------------------------------------------------------
// AgentConfig
// ---------------------------------------------------------------------------

pub const DEFAULT_MAX_TURNS: u32 = 20;
pub const DEFAULT_MAX_TOKENS: u32 = 4096;

/// Defaults for `leo run` and the agent-backed queue handlers.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AgentConfig {
    /// Full model id. Unset means the client's default tier.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub model: Option<String>,
    #[serde(default = "default_max_turns")]
    pub max_turns: u32,
    #[serde(default = "default_max_tokens")]
    pub max_tokens: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub system_prompt: Option<String>,
}

fn default_max_turns() -> u32 {
    DEFAULT_MAX_TURNS
}

fn default_max_tokens() -> u32 {
    DEFAULT_MAX_TOKENS
}

impl Default for AgentConfig {
    fn default() -> Self {
        Self {
            model: None,
            max_turns: DEFAULT_MAX_TURNS,
            max_tokens: DEFAULT_MAX_TOKENS,
            system_prompt: None,
        }
    }
}

// ---------------------------------------------------------------------------
// QueuesConfig
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QueuesConfig {
    /// Per-queue concurrency overrides, keyed by queue name.
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub concurrency: BTreeMap<String, usize>,
    #[serde(default = "default_attempts")]
    pub attempts: u32,
    #[serde(default = "default_backoff_ms")]
    pub backoff_ms: u64,
}

fn default_attempts() -> u32 {
    3
}

fn default_backoff_ms() -> u64 {
    1000
}

impl Default for QueuesConfig {
    fn default() -> Self {
        Self {
            concurrency: BTreeMap::new(),
            attempts: default_attempts(),
            backoff_ms: default_backoff_ms(),
        }
    }
}

// ---------------------------------------------------------------------------
// Config (top-level)
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub agent: AgentConfig,
    #[serde(default)]
    pub queues: QueuesConfig,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub gates: Vec<GateDefinition>,
}

impl Config {
    /// Load `.leo/config.yaml`, or defaults when the file does not exist.
    pub fn load_or_default(root: &Path) -> Result<Self> {
        let path = paths::config_path(root);
        if !path.exists() {
            tracing::debug!(path = %path.display(), "no config file, using defaults");
            return Ok(Self::default());
        }
        let data = std::fs::read_to_string(&path)?;
        Ok(serde_yaml::from_str(&data)?)
    }

    pub fn save(&self, root: &Path) -> Result<()> {
        let path = paths::config_path(root);
        let data = serde_yaml::to_string(self)?;
        crate::io::atomic_write(&path, data.as_bytes())
    }

    // -----------------------------------------------------------------------
    // Validation
    // -----------------------------------------------------------------------

    /// Check the config against the queue names the caller knows about.
    pub fn validate(&self, known_queues: &[&str]) -> Vec<ConfigWarning> {
        let mut warnings = Vec::new();

        if self.agent.max_turns == 0 {
            warnings.push(ConfigWarning::error(
                "agent.max_turns is 0; no model call would ever be made".into(),
            ));
        }

        for (name, concurrency) in &self.queues.concurrency {
            if !known_queues.contains(&name.as_str()) {
                warnings.push(ConfigWarning::warning(format!(
                    "unknown queue '{name}' in queues.concurrency"
                )));
            }
            if *concurrency == 0 {
                warnings.push(ConfigWarning::error(format!(
                    "queue '{name}' has concurrency 0 and would never run a job"
                )));
            }
        }

        if self.queues.attempts == 0 {
            warnings.push(ConfigWarning::warning(
                "queues.attempts is 0; jobs still get one attempt".into(),
            ));
        }

        for gate in &self.gates {
            if gate.command.trim().is_empty() {
                warnings.push(ConfigWarning::warning(format!(
                    "gate '{}' has an empty command",
                    gate.name
                )));
            }
            if gate.weight <= 0.0 {
                warnings.push(ConfigWarning::warning(format!(
                    "gate '{}' has non-positive weight {}",
                    gate.name, gate.weight
                )));
            }
            if gate.max_retries > 10 {
                warnings.push(ConfigWarning::warning(format!(
                    "gate '{}' has max_retries={} (>10 is unusual)",
                    gate.name, gate.max_retries
                )));
            }
        }

        warnings
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
