//! Final answer synthesis.

use std::sync::Arc;

use serde::Deserialize;
use tracing::{info, warn};

use crate::config::LlmConfig;
use crate::error::LlmError;
use crate::llm::{LlmClient, LlmRequest, complete_json};
use crate::prompts::SUMMARIZER_SYSTEM;
use crate::state::{FinalSummary, RATING_RANGE, StepAnswer};

/// Narrative used when the plan produced no steps.
pub const INSUFFICIENT_DECOMPOSITION: &str =
    "The question could not be decomposed into answerable steps.";

const NO_VERIFIED_EVIDENCE: &str = "No step produced verified evidence.";

#[derive(Deserialize)]
struct SummaryOutput {
    #[serde(default)]
    output: String,
    answer: String,
    score: i64,
}

/// Combines step answers into the final answer.
pub struct Summarizer {
    llm: Arc<dyn LlmClient>,
    config: LlmConfig,
    min_confident_rating: u8,
}

impl Summarizer {
    pub fn new(llm: Arc<dyn LlmClient>, config: LlmConfig, min_confident_rating: u8) -> Self {
        Self {
            llm,
            config,
            min_confident_rating,
        }
    }

    /// Summarize `answers` for `question`.
    ///
    /// Answers that failed or are rated below the confidence threshold are
    /// shown to the model as unverified. When every step failed the score is
    /// capped at the lowest rating.
    pub async fn summarize(
        &self,
        question: &str,
        answers: &[StepAnswer],
    ) -> Result<FinalSummary, LlmError> {
        if answers.is_empty() {
            info!("No step answers to summarize");
            return Ok(FinalSummary {
                narrative: INSUFFICIENT_DECOMPOSITION.to_string(),
                answer: String::new(),
                score: 0,
            });
        }

        let user = format!(
            "Question: {question}\n\nStep answers:\n{}",
            self.render_answers(answers)
        );
        let output: SummaryOutput = complete_json(
            self.llm.as_ref(),
            LlmRequest::new(&self.config, SUMMARIZER_SYSTEM, user),
        )
        .await?;

        let mut score = output
            .score
            .clamp(i64::from(*RATING_RANGE.start()), i64::from(*RATING_RANGE.end()))
            as u8;
        let mut narrative = output.output;
        if answers.iter().all(|a| !a.success) {
            warn!("Every step failed; capping summary score");
            score = *RATING_RANGE.start();
            narrative = if narrative.is_empty() {
                NO_VERIFIED_EVIDENCE.to_string()
            } else {
                format!("{NO_VERIFIED_EVIDENCE} {narrative}")
            };
        }

        Ok(FinalSummary {
            narrative,
            answer: output.answer,
            score,
        })
    }

    fn render_answers(&self, answers: &[StepAnswer]) -> String {
        answers
            .iter()
            .enumerate()
            .map(|(i, a)| {
                if a.is_confident(self.min_confident_rating) {
                    format!("Step {}: {}", i + 1, a.answer)
                } else {
                    format!("Step {} (unverified, rating {}/5): {}", i + 1, a.rating, a.answer)
                }
            })
            .collect::<Vec<_>>()
            .join("\n")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use pretty_assertions::assert_eq;
    use std::sync::Mutex;

    struct Recording {
        reply: &'static str,
        prompts: Mutex<Vec<String>>,
    }

    #[async_trait]
    impl LlmClient for Recording {
        async fn complete(&self, request: LlmRequest) -> Result<String, LlmError> {
            self.prompts.lock().unwrap().push(request.user);
            Ok(self.reply.to_string())
        }
    }

    fn summarizer(reply: &'static str) -> (Summarizer, Arc<Recording>) {
        let llm = Arc::new(Recording {
            reply,
            prompts: Mutex::new(Vec::new()),
        });
        (Summarizer::new(llm.clone(), LlmConfig::default(), 3), llm)
    }

    #[tokio::test]
    async fn test_empty_answers_skip_the_model() {
        let (summarizer, llm) = summarizer("unused");
        let summary = summarizer.summarize("q", &[]).await.unwrap();

        assert_eq!(summary.narrative, INSUFFICIENT_DECOMPOSITION);
        assert_eq!(summary.score, 0);
        assert!(llm.prompts.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_low_confidence_steps_are_flagged() {
        let (summarizer, llm) =
            summarizer(r#"{"output": "combined", "answer": "Paris, about 2.1 million", "score": 9}"#);
        let answers = [
            StepAnswer::new("", "Paris", true, 5).unwrap(),
            StepAnswer::new("", "about 2.1 million", true, 2).unwrap(),
        ];

        let summary = summarizer.summarize("q", &answers).await.unwrap();
        assert_eq!(summary.score, 5);
        assert_eq!(summary.answer, "Paris, about 2.1 million");

        let prompt = &llm.prompts.lock().unwrap()[0];
        assert!(prompt.contains("Step 1: Paris\nStep 2 (unverified, rating 2/5): about 2.1 million"));
    }

    #[tokio::test]
    async fn test_all_failed_caps_score() {
        let (summarizer, _) =
            summarizer(r#"{"output": "nothing found", "answer": "unknown", "score": 4}"#);
        let summary = summarizer
            .summarize("q", &[StepAnswer::failed("no evidence")])
            .await
            .unwrap();

        assert_eq!(summary.score, 1);
        assert_eq!(summary.narrative, "No step produced verified evidence. nothing found");
    }

    #[tokio::test]
    async fn test_malformed_summary_is_an_error() {
        let (summarizer, _) = summarizer("not json");
        let err = summarizer
            .summarize("q", &[StepAnswer::new("", "a", true, 5).unwrap()])
            .await
            .unwrap_err();
        assert!(matches!(err, LlmError::MalformedOutput(_)));
    }
}
