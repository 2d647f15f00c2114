use thiserror::Error;

#[derive(Debug, Error)]
pub enum AgentError {
    #[error("ANTHROPIC_API_KEY is not set")]
    MissingApiKey,

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("API error {status} ({kind}): {message}")]
    Api {
        status: u16,
        kind: String,
        message: String,
    },

    #[error("Failed to parse API response: {source}\n  body: {body}")]
    Parse {
        body: String,
        #[source]
        source: serde_json::Error,
    },

    #[error("duplicate tool name: {0}")]
    DuplicateTool(String),

    #[error("unknown model tier: {0} (expected haiku, sonnet or opus)")]
    UnknownTier(String),

    #[error("unknown effort level: {0} (expected low, medium or high)")]
    UnknownEffort(String),
}
