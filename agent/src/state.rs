//! Records passed between the agents.
//!
//! Every record is validated when it is constructed and never modified
//! afterwards. Logs only grow, in arrival order.

use std::collections::HashSet;
use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::LlmError;

/// Shown in place of notes when extraction found nothing relevant.
pub const NO_RELATED_INFORMATION: &str = "No related information from this document.";

/// Lowest and highest confidence a step answer can report.
pub const RATING_RANGE: std::ops::RangeInclusive<u8> = 1..=5;

/// How a step is resolved.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StepKind {
    /// Look something up with the research tools.
    #[serde(alias = "Search", alias = "SEARCH")]
    Search,
    /// Combine results of earlier steps without new lookups.
    #[serde(alias = "Aggregate", alias = "AGGREGATE")]
    Aggregate,
}

impl fmt::Display for StepKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StepKind::Search => write!(f, "search"),
            StepKind::Aggregate => write!(f, "aggregate"),
        }
    }
}

/// The concrete task for one plan step.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StepTask {
    pub kind: StepKind,

    /// Self-contained query, with values from earlier answers filled in.
    pub detail: String,
}

impl StepTask {
    /// Create a task, rejecting an empty detail.
    pub fn new(kind: StepKind, detail: impl Into<String>) -> Result<Self, LlmError> {
        let detail = detail.into();
        if detail.trim().is_empty() {
            return Err(LlmError::MalformedOutput("step task has no detail".to_string()));
        }
        Ok(Self {
            kind,
            detail: detail.trim().to_string(),
        })
    }

    /// A search task for the raw step text, used when task definition fails.
    pub fn fallback(step: &str) -> Self {
        Self {
            kind: StepKind::Search,
            detail: step.to_string(),
        }
    }
}

/// The answer to one step, with a self-reported confidence.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StepAnswer {
    pub analysis: String,
    pub answer: String,
    pub success: bool,

    /// Confidence from 1 (guess) to 5 (certain).
    pub rating: u8,
}

impl StepAnswer {
    /// Create an answer, rejecting ratings outside 1 to 5.
    pub fn new(
        analysis: impl Into<String>,
        answer: impl Into<String>,
        success: bool,
        rating: i64,
    ) -> Result<Self, LlmError> {
        let rating = u8::try_from(rating)
            .ok()
            .filter(|r| RATING_RANGE.contains(r))
            .ok_or_else(|| {
                LlmError::MalformedOutput(format!("rating {rating} is outside 1..=5"))
            })?;
        Ok(Self {
            analysis: analysis.into(),
            answer: answer.into(),
            success,
            rating,
        })
    }

    /// An unsuccessful answer with the lowest rating.
    pub fn failed(reason: impl Into<String>) -> Self {
        let reason = reason.into();
        Self {
            analysis: reason.clone(),
            answer: reason,
            success: false,
            rating: *RATING_RANGE.start(),
        }
    }

    /// Whether the answer is successful and rated at least `min_rating`.
    pub fn is_confident(&self, min_rating: u8) -> bool {
        self.success && self.rating >= min_rating
    }
}

/// Notes extracted for one step, in order, without duplicates.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct NoteSet {
    notes: Vec<String>,
}

impl NoteSet {
    /// Collect notes, dropping blanks, the no-information sentinel and
    /// repeats that differ only in case or whitespace.
    pub fn new<I, S>(notes: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut seen = HashSet::new();
        let notes = notes
            .into_iter()
            .filter_map(|note| {
                let note = note.as_ref().trim();
                let note = note.strip_prefix("- ").unwrap_or(note).trim();
                if note.is_empty() || note == NO_RELATED_INFORMATION {
                    return None;
                }
                let key = note
                    .split_whitespace()
                    .collect::<Vec<_>>()
                    .join(" ")
                    .to_lowercase();
                seen.insert(key).then(|| note.to_string())
            })
            .collect();
        Self { notes }
    }

    pub fn notes(&self) -> &[String] {
        &self.notes
    }

    pub fn is_empty(&self) -> bool {
        self.notes.is_empty()
    }

    pub fn len(&self) -> usize {
        self.notes.len()
    }

    /// One note per line, or the sentinel when there are none.
    pub fn render(&self) -> String {
        if self.notes.is_empty() {
            NO_RELATED_INFORMATION.to_string()
        } else {
            self.notes.join("\n")
        }
    }
}

/// The synthesized answer to the original question.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FinalSummary {
    /// Account of how the steps led to the answer.
    pub narrative: String,
    pub answer: String,

    /// Overall quality from 0 (no evidence) to 5.
    pub score: u8,
}

/// Everything the plan executor knows about one plan.
///
/// `tasks`, `answers` and `notes` have one entry per completed step and are
/// only appended to, through [`PlanExecutionState::record`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlanExecutionState {
    pub question: String,
    pub remaining: Vec<String>,
    pub current_step: Option<String>,
    pub current_task: Option<StepTask>,
    tasks: Vec<StepTask>,
    answers: Vec<StepAnswer>,
    notes: Vec<NoteSet>,
}

impl PlanExecutionState {
    /// Start executing `plan` for `question`.
    pub fn new(question: impl Into<String>, plan: Vec<String>) -> Self {
        Self {
            question: question.into(),
            remaining: plan,
            current_step: None,
            current_task: None,
            tasks: Vec::new(),
            answers: Vec::new(),
            notes: Vec::new(),
        }
    }

    /// Append the outcome of one step to every log.
    pub fn record(&mut self, task: StepTask, notes: NoteSet, answer: StepAnswer) {
        self.tasks.push(task);
        self.notes.push(notes);
        self.answers.push(answer);
    }

    pub fn tasks(&self) -> &[StepTask] {
        &self.tasks
    }

    pub fn answers(&self) -> &[StepAnswer] {
        &self.answers
    }

    pub fn notes(&self) -> &[NoteSet] {
        &self.notes
    }

    /// Number of steps completed.
    pub fn completed(&self) -> usize {
        self.answers.len()
    }

    /// Earlier answers as `- answer` lines, for the task definer.
    pub fn memory(&self) -> String {
        self.answers
            .iter()
            .map(|a| format!("- {}", a.answer))
            .collect::<Vec<_>>()
            .join("\n")
    }

    /// Consume the state, returning the answer log.
    pub fn into_answers(self) -> Vec<StepAnswer> {
        self.answers
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_step_answer_rating_bounds() {
        assert!(StepAnswer::new("a", "b", true, 1).is_ok());
        assert!(StepAnswer::new("a", "b", true, 5).is_ok());
        assert!(matches!(
            StepAnswer::new("a", "b", true, 0),
            Err(LlmError::MalformedOutput(_))
        ));
        assert!(StepAnswer::new("a", "b", true, 6).is_err());
        assert!(StepAnswer::new("a", "b", true, -3).is_err());
    }

    #[test]
    fn test_failed_answer() {
        let answer = StepAnswer::failed("no evidence");
        assert!(!answer.success);
        assert_eq!(answer.rating, 1);
        assert!(!answer.is_confident(1));
    }

    #[test]
    fn test_step_task_requires_detail() {
        assert!(StepTask::new(StepKind::Search, "   ").is_err());
        assert_eq!(
            StepTask::new(StepKind::Aggregate, " sum 1 and 2 ").unwrap().detail,
            "sum 1 and 2"
        );
    }

    #[test]
    fn test_note_set_dedupes() {
        let notes = NoteSet::new([
            "- Paris is the capital of France.",
            "paris is the  capital of France.",
            "",
            "Population is 2.1 million.",
        ]);
        assert_eq!(
            notes.notes(),
            &[
                "Paris is the capital of France.".to_string(),
                "Population is 2.1 million.".to_string()
            ]
        );
    }

    #[test]
    fn test_empty_note_set_renders_sentinel() {
        let notes = NoteSet::new([NO_RELATED_INFORMATION]);
        assert!(notes.is_empty());
        assert_eq!(notes.render(), NO_RELATED_INFORMATION);
    }

    #[test]
    fn test_record_keeps_logs_aligned() {
        let mut state = PlanExecutionState::new("q", vec!["s1".into(), "s2".into()]);
        state.record(
            StepTask::fallback("s1"),
            NoteSet::new(["n1"]),
            StepAnswer::new("a", "first", true, 4).unwrap(),
        );
        state.record(
            StepTask::fallback("s2"),
            NoteSet::default(),
            StepAnswer::failed("none"),
        );

        assert_eq!(state.completed(), 2);
        assert_eq!(state.tasks().len(), 2);
        assert_eq!(state.notes().len(), 2);
        assert_eq!(state.memory(), "- first\n- none");
    }
}
