//! Web search through the Tavily API.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use super::{Tool, ToolInput};
use crate::config::WebSearchConfig;
use crate::error::ToolError;

#[derive(Serialize)]
struct SearchRequest<'a> {
    api_key: &'a str,
    query: &'a str,
    max_results: usize,
    search_depth: &'a str,
}

#[derive(Deserialize)]
struct SearchResponse {
    #[serde(default)]
    results: Vec<SearchResult>,
}

#[derive(Deserialize)]
struct SearchResult {
    url: String,
    content: String,
}

/// Searches the web for current information.
pub struct WebSearchTool {
    client: reqwest::Client,
    config: WebSearchConfig,
}

impl WebSearchTool {
    pub fn new(config: WebSearchConfig) -> Self {
        Self {
            client: reqwest::Client::new(),
            config,
        }
    }
}

#[async_trait]
impl Tool for WebSearchTool {
    fn name(&self) -> &str {
        "web_search"
    }

    fn description(&self) -> &str {
        "Searches the web for up-to-date information. Input: the search query."
    }

    async fn invoke(&self, input: ToolInput) -> Result<String, ToolError> {
        let api_key = self
            .config
            .api_key
            .as_deref()
            .ok_or_else(|| ToolError::NotConfigured("TAVILY_API_KEY is not set".to_string()))?;

        let response = self
            .client
            .post(format!("{}/search", self.config.base_url.trim_end_matches('/')))
            .json(&SearchRequest {
                api_key,
                query: &input.query,
                max_results: self.config.max_results,
                search_depth: &self.config.search_depth,
            })
            .send()
            .await?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(ToolError::ExecutionFailed(format!("HTTP {status}: {body}")));
        }

        let parsed: SearchResponse = response.json().await?;
        if parsed.results.is_empty() {
            return Ok(format!("No web results for '{}'.", input.query));
        }

        let context = parsed
            .results
            .iter()
            .map(|r| format!("URL: {}\nContent: {}", r.url, r.content))
            .collect::<Vec<_>>()
            .join("\n\n");
        Ok(truncate_chars(&context, self.config.max_output_chars))
    }
}

fn truncate_chars(text: &str, max_chars: usize) -> String {
    match text.char_indices().nth(max_chars) {
        Some((end, _)) => text[..end].to_string(),
        None => text.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use serde_json::json;
    use wiremock::matchers::{body_partial_json, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn tool(server: &MockServer, max_output_chars: usize) -> WebSearchTool {
        WebSearchTool::new(WebSearchConfig {
            base_url: server.uri(),
            api_key: Some("tvly-test".to_string()),
            max_output_chars,
            ..WebSearchConfig::default()
        })
    }

    #[tokio::test]
    async fn test_formats_results() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/search"))
            .and(body_partial_json(json!({
                "query": "capital of France",
                "max_results": 5,
                "search_depth": "advanced"
            })))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "results": [
                    {"url": "https://a.example", "content": "Paris is the capital."},
                    {"url": "https://b.example", "content": "France's capital is Paris."}
                ]
            })))
            .mount(&server)
            .await;

        let output = tool(&server, 5000)
            .invoke(ToolInput::query("capital of France"))
            .await
            .unwrap();
        assert_eq!(
            output,
            "URL: https://a.example\nContent: Paris is the capital.\n\nURL: https://b.example\nContent: France's capital is Paris."
        );
    }

    #[tokio::test]
    async fn test_output_is_capped() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "results": [{"url": "u", "content": "é".repeat(100)}]
            })))
            .mount(&server)
            .await;

        let output = tool(&server, 20).invoke(ToolInput::query("q")).await.unwrap();
        assert_eq!(output.chars().count(), 20);
    }

    #[tokio::test]
    async fn test_missing_api_key() {
        let err = WebSearchTool::new(WebSearchConfig::default())
            .invoke(ToolInput::query("q"))
            .await
            .unwrap_err();
        assert!(matches!(err, ToolError::NotConfigured(_)));
    }

    #[test]
    fn test_truncate_chars() {
        assert_eq!(truncate_chars("abcdef", 3), "abc");
        assert_eq!(truncate_chars("ab", 3), "ab");
    }
}
