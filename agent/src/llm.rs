//! Language model access.
//!
//! Every agent talks to the model through [`LlmClient`], so tests can swap
//! the HTTP client for scripted responses. Structured outputs go through
//! [`complete_json`], which extracts and validates a JSON object and retries
//! once when the model replies with something else.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::config::LlmConfig;
use crate::error::LlmError;

const MAX_LOG_CHARS: usize = 4_000;

/// A single chat completion request.
#[derive(Debug, Clone, Default)]
pub struct LlmRequest {
    pub system: String,
    pub user: String,
    pub model: String,
    pub temperature: f32,

    /// Generation stops before any of these strings.
    pub stop: Vec<String>,
}

impl LlmRequest {
    /// Create a request with the model settings from `config`.
    pub fn new(config: &LlmConfig, system: impl Into<String>, user: impl Into<String>) -> Self {
        Self {
            system: system.into(),
            user: user.into(),
            model: config.model.clone(),
            temperature: config.temperature,
            stop: Vec::new(),
        }
    }

    /// Add a stop sequence.
    pub fn with_stop(mut self, stop: impl Into<String>) -> Self {
        self.stop.push(stop.into());
        self
    }
}

/// A chat model.
#[async_trait]
pub trait LlmClient: Send + Sync {
    async fn complete(&self, request: LlmRequest) -> Result<String, LlmError>;
}

#[async_trait]
impl LlmClient for Arc<dyn LlmClient> {
    async fn complete(&self, request: LlmRequest) -> Result<String, LlmError> {
        (**self).complete(request).await
    }
}

#[derive(Debug, Serialize)]
struct ChatMessage<'a> {
    role: &'a str,
    content: &'a str,
}

#[derive(Debug, Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: Vec<ChatMessage<'a>>,
    temperature: f32,
    #[serde(skip_serializing_if = "Option::is_none")]
    stop: Option<&'a [String]>,
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    choices: Vec<ChatChoice>,
}

#[derive(Debug, Deserialize)]
struct ChatChoice {
    message: ChatMessageResponse,
}

#[derive(Debug, Deserialize)]
struct ChatMessageResponse {
    #[serde(default)]
    content: Option<String>,
}

/// Client for an OpenAI-compatible `/chat/completions` endpoint, such as vLLM.
pub struct OpenAiChatClient {
    client: reqwest::Client,
    base_url: String,
    api_key: Option<String>,
}

impl OpenAiChatClient {
    /// Create a client from configuration.
    pub fn new(config: &LlmConfig) -> Result<Self, LlmError> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()?;
        Ok(Self {
            client,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            api_key: config.api_key.clone(),
        })
    }
}

#[async_trait]
impl LlmClient for OpenAiChatClient {
    async fn complete(&self, request: LlmRequest) -> Result<String, LlmError> {
        let body = ChatRequest {
            model: &request.model,
            messages: vec![
                ChatMessage {
                    role: "system",
                    content: &request.system,
                },
                ChatMessage {
                    role: "user",
                    content: &request.user,
                },
            ],
            temperature: request.temperature,
            stop: (!request.stop.is_empty()).then_some(request.stop.as_slice()),
        };

        let mut builder = self
            .client
            .post(format!("{}/chat/completions", self.base_url))
            .json(&body);
        if let Some(key) = &self.api_key {
            builder = builder.bearer_auth(key);
        }

        let response = builder.send().await?;
        if !response.status().is_success() {
            let status = response.status();
            let text = response.text().await.unwrap_or_default();
            return Err(LlmError::Response(format!("HTTP {status}: {text}")));
        }

        let parsed: ChatResponse = response.json().await?;
        let content = parsed
            .choices
            .into_iter()
            .next()
            .and_then(|choice| choice.message.content)
            .ok_or_else(|| LlmError::Response("missing choices".to_string()))?;

        debug!(output = %truncate_for_log(&content, MAX_LOG_CHARS), "llm completion");
        Ok(content)
    }
}

/// Request a JSON object and deserialize it into `T`.
///
/// Markdown code fences and surrounding prose are ignored. A reply that still
/// does not parse is retried once with a reminder of the expected format;
/// a second failure is [`LlmError::MalformedOutput`]. Transport errors are
/// not retried.
pub async fn complete_json<T, C>(client: &C, request: LlmRequest) -> Result<T, LlmError>
where
    T: DeserializeOwned,
    C: LlmClient + ?Sized,
{
    complete_validated(client, request, Ok).await
}

/// Like [`complete_json`], with `validate` turning the parsed value into the
/// final record. A validation failure is retried the same way as a parse
/// failure.
pub async fn complete_validated<T, U, C, F>(
    client: &C,
    request: LlmRequest,
    validate: F,
) -> Result<U, LlmError>
where
    T: DeserializeOwned,
    C: LlmClient + ?Sized,
    F: Fn(T) -> Result<U, LlmError> + Send + Sync,
{
    let output = client.complete(request.clone()).await?;
    let first_error = match parse_json::<T>(&output).and_then(&validate) {
        Ok(value) => return Ok(value),
        Err(e) => e,
    };
    warn!("Retrying malformed structured output: {first_error}");

    let mut retry = request;
    retry.user.push_str(&format!(
        "\n\nYour previous reply was rejected ({first_error}). Reply with only the JSON object, no other text."
    ));
    let output = client.complete(retry).await?;
    parse_json(&output).and_then(validate)
}

/// Parse the JSON object embedded in a model reply.
pub fn parse_json<T: DeserializeOwned>(output: &str) -> Result<T, LlmError> {
    let json = extract_json(output).ok_or_else(|| {
        LlmError::MalformedOutput(format!(
            "no JSON object in output: {}",
            truncate_for_log(output, 200)
        ))
    })?;
    serde_json::from_str(json).map_err(|e| LlmError::MalformedOutput(e.to_string()))
}

fn extract_json(text: &str) -> Option<&str> {
    let start = text.find('{')?;
    let end = text.rfind('}')?;
    if end <= start {
        return None;
    }
    Some(&text[start..=end])
}

/// Cut `input` to `max_chars` characters, noting the original length.
pub(crate) fn truncate_for_log(input: &str, max_chars: usize) -> String {
    let char_count = input.chars().count();
    if char_count <= max_chars {
        return input.to_string();
    }
    let mut preview: String = input.chars().take(max_chars).collect();
    preview.push_str(&format!("... [truncated, total_chars={char_count}]"));
    preview
}
