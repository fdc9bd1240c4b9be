//! Error types for the agent pipeline.

use thiserror::Error;

use crate::state::PlanExecutionState;

/// Result type alias for agent operations.
pub type Result<T> = std::result::Result<T, AgentError>;

/// Errors from a language model call.
#[derive(Error, Debug)]
pub enum LlmError {
    /// Transport failure.
    #[error("http error: {0}")]
    Http(#[from] reqwest::Error),

    /// The endpoint answered with an error or an unexpected body.
    #[error("response error: {0}")]
    Response(String),

    /// The completion did not match the requested structure.
    #[error("malformed output: {0}")]
    MalformedOutput(String),
}

/// Errors from a tool invocation.
#[derive(Error, Debug)]
pub enum ToolError {
    /// No tool is registered under the name.
    #[error("unknown tool: {0}")]
    UnknownTool(String),

    /// The tool input could not be used.
    #[error("invalid input: {0}")]
    InvalidInput(String),

    /// The tool lacks required configuration, such as an API key.
    #[error("tool not configured: {0}")]
    NotConfigured(String),

    /// The tool ran but failed.
    #[error("execution failed: {0}")]
    ExecutionFailed(String),

    /// Corpus retrieval failed.
    #[error(transparent)]
    Retrieval(#[from] marag_retrieval::RetrievalError),

    /// Transport failure.
    #[error("http error: {0}")]
    Http(#[from] reqwest::Error),
}

/// Errors that abort an orchestrator invocation.
#[derive(Error, Debug)]
pub enum AgentError {
    /// The planner could not produce a plan.
    #[error("planner failed: {0}")]
    PlannerFailed(#[source] LlmError),

    /// The plan did not finish within the iteration ceiling.
    #[error("plan execution exceeded {max_iterations} iterations with {remaining} steps left")]
    ExecutionOverrun {
        max_iterations: usize,
        remaining: usize,
        state: Box<PlanExecutionState>,
    },

    /// The summarizer could not produce a final answer.
    #[error("summarizer failed: {0}")]
    SummarizerFailed(#[source] LlmError),
}

impl AgentError {
    /// Name of the orchestrator stage that failed.
    pub fn stage(&self) -> &'static str {
        match self {
            AgentError::PlannerFailed(_) => "planner",
            AgentError::ExecutionOverrun { .. } => "plan_executor",
            AgentError::SummarizerFailed(_) => "summarizer",
        }
    }
}
