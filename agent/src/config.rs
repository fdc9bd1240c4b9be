//! Configuration for the agents and their collaborators.

use serde::{Deserialize, Serialize};

/// Connection settings for an OpenAI-compatible chat endpoint.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LlmConfig {
    /// Base URL including the API version, e.g. `http://localhost:8003/v1`.
    pub base_url: String,

    /// Bearer token. Local vLLM servers accept any value.
    pub api_key: Option<String>,

    /// Model served at the endpoint.
    pub model: String,

    /// Sampling temperature.
    pub temperature: f32,

    /// Request timeout in seconds.
    pub timeout_secs: u64,
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            base_url: "http://localhost:8003/v1".to_string(),
            api_key: None,
            model: "openai/gpt-oss-20b".to_string(),
            temperature: 0.0,
            timeout_secs: 120,
        }
    }
}

/// Settings for the Tavily web search tool.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct WebSearchConfig {
    pub base_url: String,
    pub api_key: Option<String>,
    pub max_results: usize,
    pub search_depth: String,

    /// Upper bound on the observation length in characters.
    pub max_output_chars: usize,
}

impl Default for WebSearchConfig {
    fn default() -> Self {
        Self {
            base_url: "https://api.tavily.com".to_string(),
            api_key: None,
            max_results: 5,
            search_depth: "advanced".to_string(),
            max_output_chars: 5000,
        }
    }
}

/// Limits and policies of the plan, execute and summarize loop.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AgentConfig {
    /// Ceiling on plan steps executed in one invocation.
    pub max_iterations: usize,

    /// Ceiling on thought/action rounds of the research agent.
    pub max_react_iterations: usize,

    /// Step answers rated below this are flagged as unverified.
    pub min_confident_rating: u8,

    /// Corpus searched when a tool call names none.
    pub default_corpus: Option<String>,
}

impl Default for AgentConfig {
    fn default() -> Self {
        Self {
            max_iterations: 25,
            max_react_iterations: 15,
            min_confident_rating: 3,
            default_corpus: None,
        }
    }
}

impl AgentConfig {
    /// Set the plan iteration ceiling.
    pub fn with_max_iterations(mut self, max_iterations: usize) -> Self {
        self.max_iterations = max_iterations;
        self
    }

    /// Set the corpus used when a tool call names none.
    pub fn with_default_corpus(mut self, corpus_id: impl Into<String>) -> Self {
        self.default_corpus = Some(corpus_id.into());
        self
    }
}
