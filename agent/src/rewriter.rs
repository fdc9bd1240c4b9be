//! Query paraphrasing for corpus search expansion.

use std::sync::Arc;

use async_trait::async_trait;
use marag_retrieval::{QueryRewriter, RetrievalError};

use crate::config::LlmConfig;
use crate::llm::{LlmClient, LlmRequest};
use crate::prompts::QUERY_REWRITER_SYSTEM;

/// Asks the chat model for alternative phrasings of a query.
pub struct LlmQueryRewriter {
    llm: Arc<dyn LlmClient>,
    config: LlmConfig,
}

impl LlmQueryRewriter {
    pub fn new(llm: Arc<dyn LlmClient>, config: LlmConfig) -> Self {
        Self { llm, config }
    }
}

#[async_trait]
impl QueryRewriter for LlmQueryRewriter {
    async fn rewrite(&self, query: &str, n: usize) -> marag_retrieval::Result<Vec<String>> {
        let user = format!("Write {n} alternative versions of this search query:\n{query}");
        let output = self
            .llm
            .complete(LlmRequest::new(&self.config, QUERY_REWRITER_SYSTEM, user))
            .await
            .map_err(|e| RetrievalError::Expansion(e.to_string()))?;

        Ok(parse_variants(&output).take(n).collect())
    }
}

/// One query per non-empty line, without list markers.
fn parse_variants(output: &str) -> impl Iterator<Item = String> + '_ {
    output
        .lines()
        .map(|line| strip_list_marker(line.trim()).trim().trim_matches('"').trim())
        .filter(|line| !line.is_empty())
        .map(str::to_string)
}

fn strip_list_marker(line: &str) -> &str {
    let unnumbered = line.trim_start_matches(|c: char| c.is_ascii_digit());
    if unnumbered.len() < line.len()
        && let Some(rest) = unnumbered.strip_prefix(['.', ')'])
    {
        return rest;
    }
    line.strip_prefix(['-', '*']).unwrap_or(line)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::LlmError;
    use pretty_assertions::assert_eq;

    struct Fixed(&'static str);

    #[async_trait]
    impl LlmClient for Fixed {
        async fn complete(&self, _request: LlmRequest) -> Result<String, LlmError> {
            Ok(self.0.to_string())
        }
    }

    struct Down;

    #[async_trait]
    impl LlmClient for Down {
        async fn complete(&self, _request: LlmRequest) -> Result<String, LlmError> {
            Err(LlmError::Response("HTTP 503".to_string()))
        }
    }

    #[test]
    fn test_parse_variants_strips_markers() {
        let variants: Vec<String> =
            parse_variants("1. first query\n\n- second query\n3) \"third query\"\n2024 revenue\n").collect();
        assert_eq!(
            variants,
            vec!["first query", "second query", "third query", "2024 revenue"]
        );
    }

    #[tokio::test]
    async fn test_rewrite_limits_count() {
        let rewriter = LlmQueryRewriter::new(Arc::new(Fixed("a\nb\nc\nd")), LlmConfig::default());
        assert_eq!(rewriter.rewrite("q", 2).await.unwrap(), vec!["a", "b"]);
    }

    #[tokio::test]
    async fn test_rewrite_error_maps_to_expansion() {
        let rewriter = LlmQueryRewriter::new(Arc::new(Down), LlmConfig::default());
        assert!(matches!(
            rewriter.rewrite("q", 3).await,
            Err(RetrievalError::Expansion(_))
        ));
    }
}
