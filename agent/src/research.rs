//! ReAct research agent.
//!
//! The model alternates `Thought`/`Action`/`Action Input` lines with tool
//! observations until it writes a `Final Answer`. Replies that follow neither
//! form are answered with a format reminder instead of failing the run.

use std::sync::Arc;

use regex_lite::Regex;
use tracing::{debug, info, warn};

use crate::config::LlmConfig;
use crate::error::LlmError;
use crate::llm::{LlmClient, LlmRequest};
use crate::prompts::RESEARCH_TEMPLATE;
use crate::tools::ToolRegistry;

/// Returned when the agent runs out of iterations.
pub const ITERATION_LIMIT_MESSAGE: &str = "Agent stopped due to iteration limit or time limit.";

const OBSERVATION_STOP: &str = "\nObservation:";
const FINAL_ANSWER: &str = "Final Answer:";

/// One parsed model turn.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AgentStep {
    Action { tool: String, input: String },
    Finish(String),
}

const ACTION_PATTERN: &str =
    r"(?s)Action\s*\d*\s*:\s*(.*?)\s*Action\s*\d*\s*Input\s*\d*\s*:\s*(.*)";

/// Parses ReAct-formatted model output.
pub struct ReactParser {
    action: Option<Regex>,
}

impl ReactParser {
    pub fn new() -> Self {
        Self {
            action: Regex::new(ACTION_PATTERN).ok(),
        }
    }

    /// Parse a model turn, or describe what is wrong with it.
    pub fn parse(&self, text: &str) -> Result<AgentStep, String> {
        if let Some(captures) = self.action.as_ref().and_then(|re| re.captures(text)) {
            let tool = captures
                .get(1)
                .map(|m| m.as_str().trim().trim_matches('*').trim())
                .unwrap_or_default();
            let input = captures.get(2).map(|m| m.as_str()).unwrap_or_default();
            let input = input
                .split(OBSERVATION_STOP)
                .next()
                .unwrap_or_default()
                .trim()
                .trim_matches('"')
                .trim();

            if tool.is_empty() {
                return Err("Invalid Format: Missing tool name after 'Action:'".to_string());
            }
            return Ok(AgentStep::Action {
                tool: tool.to_string(),
                input: input.to_string(),
            });
        }

        if let Some((_, answer)) = text.split_once(FINAL_ANSWER) {
            return Ok(AgentStep::Finish(answer.trim().to_string()));
        }

        if text.contains("Action") {
            Err("Invalid Format: Missing 'Action Input:' after 'Action:'".to_string())
        } else {
            Err("Invalid Format: Missing 'Action:' after 'Thought:'".to_string())
        }
    }
}

impl Default for ReactParser {
    fn default() -> Self {
        Self::new()
    }
}

/// Answers a question by reasoning over tool observations.
pub struct ResearchAgent {
    llm: Arc<dyn LlmClient>,
    config: LlmConfig,
    tools: ToolRegistry,
    parser: ReactParser,
    max_iterations: usize,
}

impl ResearchAgent {
    pub fn new(
        llm: Arc<dyn LlmClient>,
        config: LlmConfig,
        tools: ToolRegistry,
        max_iterations: usize,
    ) -> Self {
        Self {
            llm,
            config,
            tools,
            parser: ReactParser::new(),
            max_iterations,
        }
    }

    fn system_prompt(&self) -> String {
        RESEARCH_TEMPLATE
            .replace("{tools}", &self.tools.describe())
            .replace("{tool_names}", &self.tools.names().join(", "))
    }

    /// Run the loop for `question` and return the final answer text.
    ///
    /// Running out of iterations is not an error; the fixed limit message is
    /// returned instead. Only model transport failures are errors.
    pub async fn run(&self, question: &str) -> Result<String, LlmError> {
        let system = self.system_prompt();
        let mut scratchpad = String::new();

        for iteration in 0..self.max_iterations {
            let user = format!("Question: {question}\nThought:{scratchpad}");
            let request =
                LlmRequest::new(&self.config, system.clone(), user).with_stop(OBSERVATION_STOP);
            let output = self.llm.complete(request).await?;

            let observation = match self.parser.parse(&output) {
                Ok(AgentStep::Finish(answer)) => {
                    info!(iterations = iteration + 1, "Research agent finished");
                    return Ok(answer);
                }
                Ok(AgentStep::Action { tool, input }) => {
                    debug!(iteration, tool = %tool, input = %input, "Research agent action");
                    self.tools.dispatch(&tool, &input).await
                }
                Err(reason) => {
                    warn!(iteration, "Unparseable agent output: {reason}");
                    reason
                }
            };

            let turn = output.split(OBSERVATION_STOP).next().unwrap_or_default();
            scratchpad.push_str(turn.trim_end());
            scratchpad.push_str(&format!("\nObservation: {observation}\nThought:"));
        }

        warn!(max_iterations = self.max_iterations, "Research agent hit iteration limit");
        Ok(ITERATION_LIMIT_MESSAGE.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ToolError;
    use crate::tools::{Tool, ToolInput};
    use async_trait::async_trait;
    use pretty_assertions::assert_eq;
    use std::collections::VecDeque;
    use std::sync::Mutex;

    #[test]
    fn test_parse_action() {
        let parser = ReactParser::new();
        let step = parser
            .parse(" I should search.\nAction: web_search\nAction Input: \"capital of France\"")
            .unwrap();
        assert_eq!(
            step,
            AgentStep::Action {
                tool: "web_search".to_string(),
                input: "capital of France".to_string()
            }
        );
    }

    #[test]
    fn test_parse_action_ignores_hallucinated_observation() {
        let parser = ReactParser::new();
        let step = parser
            .parse("Action: corpus_search\nAction Input: {\"query\": \"q\", \"corpus_id\": \"r\"}\nObservation: made up")
            .unwrap();
        assert_eq!(
            step,
            AgentStep::Action {
                tool: "corpus_search".to_string(),
                input: "{\"query\": \"q\", \"corpus_id\": \"r\"}".to_string()
            }
        );
    }

    #[test]
    fn test_action_pattern_compiles() {
        assert!(ReactParser::new().action.is_some());
    }

    #[test]
    fn test_parse_final_answer() {
        let parser = ReactParser::new();
        assert_eq!(
            parser
                .parse(" I now know the final answer\nFinal Answer: Paris")
                .unwrap(),
            AgentStep::Finish("Paris".to_string())
        );
    }

    #[test]
    fn test_parse_errors() {
        let parser = ReactParser::new();
        assert!(parser.parse("I am thinking").unwrap_err().contains("Missing 'Action:'"));
        assert!(
            parser
                .parse("Action: web_search")
                .unwrap_err()
                .contains("Missing 'Action Input:'")
        );
    }

    struct Scripted {
        replies: Mutex<VecDeque<String>>,
        prompts: Mutex<Vec<String>>,
    }

    impl Scripted {
        fn new(replies: &[&str]) -> Arc<Self> {
            Arc::new(Self {
                replies: Mutex::new(replies.iter().map(ToString::to_string).collect()),
                prompts: Mutex::new(Vec::new()),
            })
        }
    }

    #[async_trait]
    impl LlmClient for Scripted {
        async fn complete(&self, request: LlmRequest) -> Result<String, LlmError> {
            self.prompts.lock().unwrap().push(request.user);
            Ok(self
                .replies
                .lock()
                .unwrap()
                .pop_front()
                .unwrap_or_else(|| "Thought: still thinking".to_string()))
        }
    }

    struct Capital;

    #[async_trait]
    impl Tool for Capital {
        fn name(&self) -> &str {
            "web_search"
        }

        fn description(&self) -> &str {
            "Searches the web."
        }

        async fn invoke(&self, _input: ToolInput) -> Result<String, ToolError> {
            Ok("Paris is the capital of France.".to_string())
        }
    }

    fn agent(llm: Arc<Scripted>, max_iterations: usize) -> ResearchAgent {
        ResearchAgent::new(
            llm,
            LlmConfig::default(),
            ToolRegistry::new().with_tool(Arc::new(Capital)),
            max_iterations,
        )
    }

    #[tokio::test]
    async fn test_run_uses_tool_then_answers() {
        let llm = Scripted::new(&[
            " I need to look this up.\nAction: web_search\nAction Input: capital of France",
            " I now know the final answer\nFinal Answer: Paris",
        ]);
        let answer = agent(llm.clone(), 5).run("What is the capital of France?").await.unwrap();

        assert_eq!(answer, "Paris");
        let prompts = llm.prompts.lock().unwrap();
        assert_eq!(prompts.len(), 2);
        assert!(prompts[1].contains("Observation: Paris is the capital of France.\nThought:"));
    }

    #[tokio::test]
    async fn test_parse_error_is_fed_back() {
        let llm = Scripted::new(&["rambling", "Final Answer: Paris"]);
        let answer = agent(llm.clone(), 5).run("q").await.unwrap();

        assert_eq!(answer, "Paris");
        assert!(llm.prompts.lock().unwrap()[1].contains("Observation: Invalid Format"));
    }

    #[tokio::test]
    async fn test_iteration_limit() {
        let llm = Scripted::new(&[]);
        let answer = agent(llm.clone(), 3).run("q").await.unwrap();

        assert_eq!(answer, ITERATION_LIMIT_MESSAGE);
        assert_eq!(llm.prompts.lock().unwrap().len(), 3);
    }
}
