//! Turns a plan step into a concrete task.

use std::sync::Arc;

use async_trait::async_trait;
use serde::Deserialize;
use tracing::debug;

use crate::config::LlmConfig;
use crate::error::LlmError;
use crate::llm::{LlmClient, LlmRequest, complete_validated};
use crate::prompts::TASK_DEFINER_SYSTEM;
use crate::state::{StepKind, StepTask};

/// Decides the task for the current plan step.
#[async_trait]
pub trait TaskDefiner: Send + Sync {
    /// `remaining` is the plan after `step`; `memory` holds earlier answers
    /// as `- answer` lines.
    async fn define(
        &self,
        remaining: &[String],
        step: &str,
        memory: &str,
    ) -> Result<StepTask, LlmError>;
}

#[async_trait]
impl TaskDefiner for Arc<dyn TaskDefiner> {
    async fn define(
        &self,
        remaining: &[String],
        step: &str,
        memory: &str,
    ) -> Result<StepTask, LlmError> {
        (**self).define(remaining, step, memory).await
    }
}

#[derive(Deserialize)]
struct TaskOutput {
    #[serde(rename = "type")]
    kind: StepKind,
    task: String,
}

/// [`TaskDefiner`] backed by the chat model.
pub struct LlmTaskDefiner {
    llm: Arc<dyn LlmClient>,
    config: LlmConfig,
}

impl LlmTaskDefiner {
    pub fn new(llm: Arc<dyn LlmClient>, config: LlmConfig) -> Self {
        Self { llm, config }
    }
}

#[async_trait]
impl TaskDefiner for LlmTaskDefiner {
    async fn define(
        &self,
        remaining: &[String],
        step: &str,
        memory: &str,
    ) -> Result<StepTask, LlmError> {
        let plan = if remaining.is_empty() {
            "(none)".to_string()
        } else {
            remaining
                .iter()
                .map(|s| format!("- {s}"))
                .collect::<Vec<_>>()
                .join("\n")
        };
        let memory = if memory.is_empty() { "(none)" } else { memory };
        let user = format!(
            "Remaining plan:\n{plan}\n\nCurrent step: {step}\n\nResults of finished steps:\n{memory}"
        );

        let task = complete_validated(
            self.llm.as_ref(),
            LlmRequest::new(&self.config, TASK_DEFINER_SYSTEM, user),
            |output: TaskOutput| StepTask::new(output.kind, output.task),
        )
        .await?;
        debug!(kind = %task.kind, detail = %task.detail, "Defined step task");
        Ok(task)
    }
}
