//! Model tiers and reasoning effort.
//!
//! Callers pick a tier (`haiku`, `sonnet`, `opus`) rather than hard-coding
//! model ids; an explicit model id always wins over the tier.

use std::fmt;
use std::str::FromStr;

use crate::error::AgentError;
use crate::types::ThinkingConfig;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub enum ModelTier {
    Haiku,
    #[default]
    Sonnet,
    Opus,
}

impl ModelTier {
    pub fn default_model(self) -> &'static str {
        match self {
            ModelTier::Haiku => "claude-haiku-3-5-20241022",
            ModelTier::Sonnet => "claude-sonnet-4-20250514",
            ModelTier::Opus => "claude-opus-4-5-20251101",
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            ModelTier::Haiku => "haiku",
            ModelTier::Sonnet => "sonnet",
            ModelTier::Opus => "opus",
        }
    }
}

impl fmt::Display for ModelTier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ModelTier {
    type Err = AgentError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "haiku" | "fast" => Ok(ModelTier::Haiku),
            "sonnet" | "balanced" => Ok(ModelTier::Sonnet),
            "opus" | "quality" => Ok(ModelTier::Opus),
            _ => Err(AgentError::UnknownTier(s.to_string())),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Effort {
    Low,
    Medium,
    High,
}

impl Effort {
    /// Extended-thinking token budget for this effort level.
    pub fn budget_tokens(self) -> u32 {
        match self {
            Effort::Low => 1024,
            Effort::Medium => 4096,
            Effort::High => 16384,
        }
    }
}

impl FromStr for Effort {
    type Err = AgentError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "low" => Ok(Effort::Low),
            "medium" => Ok(Effort::Medium),
            "high" => Ok(Effort::High),
            _ => Err(AgentError::UnknownEffort(s.to_string())),
        }
    }
}

/// Thinking config for `effort`, with `max_tokens` raised so it always
/// exceeds the thinking budget.
pub fn thinking_for(effort: Option<Effort>, max_tokens: u32) -> (Option<ThinkingConfig>, u32) {
    match effort {
        None => (None, max_tokens),
        Some(e) => {
            let budget = e.budget_tokens();
            let max_tokens = max_tokens.max(budget + 1024);
            (
                Some(ThinkingConfig::Enabled {
                    budget_tokens: budget,
                }),
                max_tokens,
            )
        }
    }
}
