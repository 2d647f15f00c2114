//! `leo-agent` — Anthropic Messages API client and the tool-calling loop.
//!
//! ```text
//! run_programmatic_task(prompt, ToolSet, TaskOptions)
//!     │
//!     ▼
//! MessagesApi::create_message   ← AnthropicClient (reqwest) or a test double
//!     │
//!     ├─ stop_reason = tool_use → ToolSet lookup → ToolHandler::call
//!     │                            results appended as one user message
//!     └─ end_turn / other       → TaskResult { text, turns, stop, .. }
//! ```
//!
//! # Quick start
//!
//! ```rust,ignore
//! use leo_agent::{run_programmatic_task, AnthropicClient, TaskOptions, ToolSet};
//!
//! let client = AnthropicClient::from_env()?;
//! let result = run_programmatic_task(
//!     &client,
//!     "Summarise SD-LEO-001",
//!     &ToolSet::empty(),
//!     &TaskOptions::default(),
//! )
//! .await?;
//! println!("{}", result.text);
//! ```

pub mod client;
pub mod error;
pub mod model;
pub mod tool;
pub mod tool_loop;
pub mod types;


pub use client::{AnthropicClient, MessagesApi};
pub use error::AgentError;
pub use model::{Effort, ModelTier};
pub use tool::{Tool, ToolContext, ToolHandler, ToolSet};
pub use tool_loop::{
    run_programmatic_task, TaskOptions, TaskResult, TaskStop, ToolCallRecord, DEFAULT_MAX_TURNS,
};
pub use types::{
    ContentBlock, Message, MessagesRequest, MessagesResponse, Role, StopReason, ToolDefinition,
    Usage,
};

/// Convenience `Result` alias for this crate.
pub type Result<T> = std::result::Result<T, AgentError>;
