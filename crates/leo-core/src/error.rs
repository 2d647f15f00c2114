use thiserror::Error;

#[derive(Debug, Error)]
pub enum LeoError {
    #[error("strategic directive not found: {0}")]
    DirectiveNotFound(String),

    #[error("strategic directive already exists: {0}")]
    DirectiveExists(String),

    #[error("invalid strategic directive: {0}")]
    InvalidDirective(String),

    #[error("invalid transition from {from} to {to}: {reason}")]
    InvalidTransition {
        from: String,
        to: String,
        reason: String,
    },

    #[error("invalid phase: {0}")]
    InvalidPhase(String),

    #[error("invalid status: {0}")]
    InvalidStatus(String),

    #[error("invalid priority: {0}")]
    InvalidPriority(String),

    #[error("invalid handoff type: {0}")]
    InvalidHandoffType(String),

    #[error("invalid verdict: {0}")]
    InvalidVerdict(String),

    #[error("confidence must be between 0 and 100, got {0}")]
    InvalidConfidence(i64),

    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Yaml(#[from] serde_yaml::Error),

    #[error(transparent)]
    Json(#[from] serde_json::Error),
}

pub type Result<T> = std::result::Result<T, LeoError>;
