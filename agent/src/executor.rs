//! Resolution of a single step task: retrieve, extract, answer.

use std::sync::Arc;

use async_trait::async_trait;
use serde::Deserialize;
use tracing::{info, warn};

use crate::config::LlmConfig;
use crate::error::LlmError;
use crate::llm::{LlmClient, LlmRequest, complete_json, complete_validated};
use crate::prompts::{ANSWER_SYSTEM, EXTRACTOR_SYSTEM};
use crate::research::ResearchAgent;
use crate::state::{NO_RELATED_INFORMATION, NoteSet, StepAnswer, StepKind, StepTask};

/// Runs one step task to completion.
///
/// Execution never fails: any failure along the way is reported as an
/// unsuccessful [`StepAnswer`].
#[async_trait]
pub trait TaskExecutor: Send + Sync {
    async fn execute(&self, task: &StepTask) -> (NoteSet, StepAnswer);
}

#[async_trait]
impl TaskExecutor for Arc<dyn TaskExecutor> {
    async fn execute(&self, task: &StepTask) -> (NoteSet, StepAnswer) {
        (**self).execute(task).await
    }
}

#[derive(Deserialize)]
struct ExtractedNotes {
    notes: Vec<String>,
}

#[derive(Deserialize)]
struct AnswerOutput {
    #[serde(default)]
    analysis: String,
    answer: String,
    success: bool,
    rating: i64,
}

/// Retrieves evidence with the research agent, condenses it into notes and
/// answers the task from the notes alone.
pub struct SingleTaskExecutor {
    llm: Arc<dyn LlmClient>,
    config: LlmConfig,
    research: ResearchAgent,
}

impl SingleTaskExecutor {
    pub fn new(llm: Arc<dyn LlmClient>, config: LlmConfig, research: ResearchAgent) -> Self {
        Self {
            llm,
            config,
            research,
        }
    }

    /// Evidence for the task. Aggregate tasks carry their inputs in the
    /// detail and make no tool calls.
    async fn retrieve(&self, task: &StepTask) -> Result<String, LlmError> {
        match task.kind {
            StepKind::Search => self.research.run(&task.detail).await,
            StepKind::Aggregate => Ok(task.detail.clone()),
        }
    }

    async fn extract(&self, task: &StepTask, evidence: &str) -> Result<NoteSet, LlmError> {
        let user = format!("Passage:\n{evidence}\n\nQuestion: {}", task.detail);
        let extracted: ExtractedNotes = complete_json(
            self.llm.as_ref(),
            LlmRequest::new(&self.config, EXTRACTOR_SYSTEM, user),
        )
        .await?;
        Ok(NoteSet::new(extracted.notes))
    }

    async fn answer(&self, task: &StepTask, notes: &NoteSet) -> Result<StepAnswer, LlmError> {
        if notes.is_empty() {
            return Ok(StepAnswer::failed(NO_RELATED_INFORMATION));
        }
        let user = format!("Context:\n{}\n\nQuestion: {}", notes.render(), task.detail);
        complete_validated(
            self.llm.as_ref(),
            LlmRequest::new(&self.config, ANSWER_SYSTEM, user),
            |output: AnswerOutput| {
                StepAnswer::new(output.analysis, output.answer, output.success, output.rating)
            },
        )
        .await
    }
}

#[async_trait]
impl TaskExecutor for SingleTaskExecutor {
    async fn execute(&self, task: &StepTask) -> (NoteSet, StepAnswer) {
        let evidence = match self.retrieve(task).await {
            Ok(evidence) => evidence,
            Err(e) => {
                warn!(kind = %task.kind, "Retrieval failed: {e}");
                return (NoteSet::default(), StepAnswer::failed(format!("retrieval failed: {e}")));
            }
        };

        let notes = match self.extract(task, &evidence).await {
            Ok(notes) => notes,
            Err(e) => {
                warn!("Note extraction failed: {e}");
                return (NoteSet::default(), StepAnswer::failed(format!("note extraction failed: {e}")));
            }
        };

        let answer = match self.answer(task, &notes).await {
            Ok(answer) => answer,
            Err(e) => {
                warn!("Answering failed: {e}");
                StepAnswer::failed(format!("answering failed: {e}"))
            }
        };
        info!(
            kind = %task.kind,
            notes = notes.len(),
            success = answer.success,
            rating = answer.rating,
            "Executed step task"
        );
        (notes, answer)
    }
}
