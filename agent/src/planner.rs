//! Question decomposition.

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tracing::info;

use crate::config::LlmConfig;
use crate::error::LlmError;
use crate::llm::{LlmClient, LlmRequest, complete_json};
use crate::prompts::PLANNER_SYSTEM;

/// Ordered sub-tasks for one question.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Plan {
    #[serde(default)]
    pub analysis: String,
    pub steps: Vec<String>,
}

/// Breaks a question into simpler steps.
pub struct Planner {
    llm: Arc<dyn LlmClient>,
    config: LlmConfig,
}

impl Planner {
    pub fn new(llm: Arc<dyn LlmClient>, config: LlmConfig) -> Self {
        Self { llm, config }
    }

    /// Produce the plan for `question`. Blank steps are dropped; an empty
    /// plan is returned as is.
    pub async fn plan(&self, question: &str) -> Result<Plan, LlmError> {
        let request = LlmRequest::new(&self.config, PLANNER_SYSTEM, format!("Question: {question}"));
        let mut plan: Plan = complete_json(self.llm.as_ref(), request).await?;
        plan.steps = plan
            .steps
            .into_iter()
            .map(|step| step.trim().to_string())
            .filter(|step| !step.is_empty())
            .collect();

        info!(steps = plan.steps.len(), "Planned question");
        Ok(plan)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use pretty_assertions::assert_eq;
    use std::collections::VecDeque;
    use std::sync::Mutex;

    struct Scripted(Mutex<VecDeque<&'static str>>);

    #[async_trait]
    impl LlmClient for Scripted {
        async fn complete(&self, _request: LlmRequest) -> Result<String, LlmError> {
            Ok(self.0.lock().unwrap().pop_front().unwrap_or("").to_string())
        }
    }

    fn planner(replies: &[&'static str]) -> Planner {
        Planner::new(
            Arc::new(Scripted(Mutex::new(replies.iter().copied().collect()))),
            LlmConfig::default(),
        )
    }

    #[tokio::test]
    async fn test_plan_keeps_order() {
        let plan = planner(&[
            r#"{"analysis": "two parts", "steps": ["Find the capital of France", " ", "Find its population"]}"#,
        ])
        .plan("What is the capital of France and its population?")
        .await
        .unwrap();

        assert_eq!(
            plan.steps,
            vec!["Find the capital of France", "Find its population"]
        );
    }

    #[tokio::test]
    async fn test_empty_plan_is_not_an_error() {
        let plan = planner(&[r#"{"steps": []}"#]).plan("?").await.unwrap();
        assert!(plan.steps.is_empty());
    }

    #[tokio::test]
    async fn test_malformed_plan_fails_after_retry() {
        let err = planner(&["no plan", r#"{"steps": "one"}"#])
            .plan("?")
            .await
            .unwrap_err();
        assert!(matches!(err, LlmError::MalformedOutput(_)));
    }
}
