//! # Agent
//!
//! Multi-agent question answering over web search and indexed corpora:
//!
//! - **Planner**: breaks the question into ordered, non-overlapping steps
//! - **Plan executor**: defines and runs one task per step, within an
//!   iteration ceiling
//! - **Single task executor**: ReAct research, note extraction, answer
//! - **Summarizer**: combines the step answers into the final answer
//!
//! ## Architecture
//!
//! ```text
//! question ─► Planner ─► PlanExecutor ─► Summarizer ─► RunReport
//!                          │   ▲
//!              TaskDefiner ┘   └ SingleTaskExecutor ─► ResearchAgent ─► tools
//! ```
//!
//! ## Usage
//!
//! ```rust,ignore
//! use marag_agent::{LlmConfig, OpenAiChatClient, Orchestrator};
//!
//! let config = LlmConfig::default();
//! let llm = Arc::new(OpenAiChatClient::new(&config)?);
//! let orchestrator = Orchestrator::builder(llm, config)
//!     .with_web_search(WebSearchConfig::default())
//!     .with_corpus_search(pipeline)
//!     .build();
//!
//! let report = orchestrator.ask("What is the capital of France?").await?;
//! println!("{}", report.summary.answer);
//! ```

pub mod config;
pub mod error;
pub mod executor;
pub mod llm;
pub mod orchestrator;
pub mod plan_executor;
pub mod planner;
pub mod prompts;
pub mod research;
pub mod rewriter;
pub mod state;
pub mod summarizer;
pub mod task_definer;
pub mod tools;

pub use config::{AgentConfig, LlmConfig, WebSearchConfig};
pub use error::{AgentError, LlmError, Result, ToolError};
pub use executor::{SingleTaskExecutor, TaskExecutor};
pub use llm::{LlmClient, LlmRequest, OpenAiChatClient, complete_json};
pub use orchestrator::{Node, Orchestrator, OrchestratorBuilder, OrchestratorEvent, RunReport, Stage};
pub use plan_executor::{Phase, PlanExecutor, PlanRun};
pub use planner::{Plan, Planner};
pub use research::{ITERATION_LIMIT_MESSAGE, ResearchAgent};
pub use rewriter::LlmQueryRewriter;
pub use state::{
    FinalSummary, NO_RELATED_INFORMATION, NoteSet, PlanExecutionState, StepAnswer, StepKind,
    StepTask,
};
pub use summarizer::{INSUFFICIENT_DECOMPOSITION, Summarizer};
pub use task_definer::{LlmTaskDefiner, TaskDefiner};
pub use tools::{CorpusSearchTool, Tool, ToolInput, ToolRegistry, WebSearchTool};
