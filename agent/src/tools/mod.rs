//! Tools the research agent can call.
//!
//! The registry is fixed when the agent is built. Dispatch never fails: an
//! unknown tool, unusable input or a tool error all come back as text for
//! the agent to read as its observation.

mod corpus_search;
mod web_search;

pub use corpus_search::CorpusSearchTool;
pub use web_search::WebSearchTool;

use std::collections::BTreeMap;
use std::sync::Arc;

use async_trait::async_trait;
use serde::Deserialize;
use tracing::{info, warn};

use crate::error::ToolError;

/// Arguments of a tool call.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct ToolInput {
    pub query: String,

    /// Corpus to search, for tools that read indexed documents.
    #[serde(default, alias = "db_name", alias = "corpus")]
    pub corpus_id: Option<String>,
}

impl ToolInput {
    /// Input with only a query.
    pub fn query(query: impl Into<String>) -> Self {
        Self {
            query: query.into(),
            corpus_id: None,
        }
    }

    /// Set the corpus.
    pub fn with_corpus(mut self, corpus_id: impl Into<String>) -> Self {
        self.corpus_id = Some(corpus_id.into());
        self
    }

    /// Parse an `Action Input` line: a JSON object, or the query as plain text.
    pub fn parse(raw: &str) -> Result<Self, ToolError> {
        let trimmed = raw
            .trim()
            .trim_matches('`')
            .trim();
        if trimmed.starts_with('{') {
            let input: ToolInput = serde_json::from_str(trimmed)
                .map_err(|e| ToolError::InvalidInput(format!("{e}: {trimmed}")))?;
            if input.query.trim().is_empty() {
                return Err(ToolError::InvalidInput("empty query".to_string()));
            }
            return Ok(input);
        }

        let query = trimmed.trim_matches('"').trim();
        if query.is_empty() {
            return Err(ToolError::InvalidInput("empty query".to_string()));
        }
        Ok(Self::query(query))
    }
}

/// A capability the research agent can invoke by name.
#[async_trait]
pub trait Tool: Send + Sync {
    /// Name used in `Action:` lines.
    fn name(&self) -> &str;

    /// One-line description shown to the model.
    fn description(&self) -> &str;

    async fn invoke(&self, input: ToolInput) -> Result<String, ToolError>;
}

/// The fixed set of tools available to one agent.
#[derive(Default, Clone)]
pub struct ToolRegistry {
    tools: BTreeMap<String, Arc<dyn Tool>>,
}

impl ToolRegistry {
    /// Create an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a tool, replacing any tool with the same name.
    pub fn with_tool(mut self, tool: Arc<dyn Tool>) -> Self {
        self.tools.insert(tool.name().to_string(), tool);
        self
    }

    /// Tool names in sorted order.
    pub fn names(&self) -> Vec<&str> {
        self.tools.keys().map(String::as_str).collect()
    }

    pub fn is_empty(&self) -> bool {
        self.tools.is_empty()
    }

    /// `name: description` lines for the agent prompt.
    pub fn describe(&self) -> String {
        self.tools
            .values()
            .map(|tool| format!("{}: {}", tool.name(), tool.description()))
            .collect::<Vec<_>>()
            .join("\n")
    }

    /// Call a tool with raw input and return its observation.
    pub async fn dispatch(&self, name: &str, raw_input: &str) -> String {
        match self.try_dispatch(name, raw_input).await {
            Ok(output) => output,
            Err(e) => {
                warn!(tool = name, "Tool call failed: {e}");
                format!("Error: {e}")
            }
        }
    }

    async fn try_dispatch(&self, name: &str, raw_input: &str) -> Result<String, ToolError> {
        let tool = self
            .tools
            .get(name.trim())
            .ok_or_else(|| ToolError::UnknownTool(name.trim().to_string()))?;
        let input = ToolInput::parse(raw_input)?;
        info!(tool = name, query = %input.query, corpus_id = ?input.corpus_id, "Invoking tool");
        tool.invoke(input).await
    }
}
