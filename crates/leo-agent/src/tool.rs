use std::collections::HashSet;
use std::future::Future;
use std::sync::Arc;

use async_trait::async_trait;
use serde_json::Value;

use crate::error::AgentError;
use crate::types::ToolDefinition;
use crate::Result;

/// Per-call context handed to every tool handler.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ToolContext {
    /// When set, handlers must not write anything; they report what they
    /// would have done instead.
    pub dry_run: bool,
}

/// A local function the model can invoke.
///
/// The returned string is sent back to the model verbatim. An `Err` is sent
/// back as an error-flagged tool result carrying the error's message.
#[async_trait]
pub trait ToolHandler: Send + Sync {
    async fn call(&self, input: Value, ctx: ToolContext) -> anyhow::Result<String>;
}

struct FnHandler<F>(F);

#[async_trait]
impl<F, Fut> ToolHandler for FnHandler<F>
where
    F: Fn(Value, ToolContext) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = anyhow::Result<String>> + Send + 'static,
{
    async fn call(&self, input: Value, ctx: ToolContext) -> anyhow::Result<String> {
        (self.0)(input, ctx).await
    }
}

#[derive(Clone)]
pub struct Tool {
    pub definition: ToolDefinition,
    handler: Arc<dyn ToolHandler>,
}

impl Tool {
    pub fn new(definition: ToolDefinition, handler: impl ToolHandler + 'static) -> Self {
        Self {
            definition,
            handler: Arc::new(handler),
        }
    }

    /// Build a tool from an async closure.
    pub fn from_fn<F, Fut>(definition: ToolDefinition, f: F) -> Self
    where
        F: Fn(Value, ToolContext) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = anyhow::Result<String>> + Send + 'static,
    {
        Self::new(definition, FnHandler(f))
    }

    pub fn name(&self) -> &str {
        &self.definition.name
    }

    /// Run the handler on its own task; a panic comes back as an `Err`.
    pub async fn call(&self, input: Value, ctx: ToolContext) -> anyhow::Result<String> {
        let handler = Arc::clone(&self.handler);
        match tokio::spawn(async move { handler.call(input, ctx).await }).await {
            Ok(out) => out,
            Err(e) if e.is_panic() => Err(anyhow::anyhow!("tool handler panicked")),
            Err(e) => Err(anyhow::Error::new(e).context("tool handler was cancelled")),
        }
    }
}

impl std::fmt::Debug for Tool {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Tool")
            .field("name", &self.definition.name)
            .finish_non_exhaustive()
    }
}

/// The tools available to one task. Names are unique.
#[derive(Debug, Clone, Default)]
pub struct ToolSet {
    tools: Vec<Tool>,
}

impl ToolSet {
    pub fn new(tools: Vec<Tool>) -> Result<Self> {
        let mut seen = HashSet::new();
        for tool in &tools {
            if !seen.insert(tool.name().to_string()) {
                return Err(AgentError::DuplicateTool(tool.name().to_string()));
            }
        }
        Ok(Self { tools })
    }

    pub fn empty() -> Self {
        Self::default()
    }

    pub fn get(&self, name: &str) -> Option<&Tool> {
        self.tools.iter().find(|t| t.name() == name)
    }

    pub fn definitions(&self) -> Vec<ToolDefinition> {
        self.tools.iter().map(|t| t.definition.clone()).collect()
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.tools.iter().map(|t| t.name())
    }

    pub fn len(&self) -> usize {
        self.tools.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tools.is_empty()
    }
}
