//! Search over an indexed document corpus.

use std::sync::Arc;

use async_trait::async_trait;
use marag_retrieval::AdvancedQueryPipeline;

use super::{Tool, ToolInput};
use crate::error::ToolError;

/// Searches a pre-indexed corpus through the retrieval pipeline.
pub struct CorpusSearchTool {
    pipeline: Arc<AdvancedQueryPipeline>,
    default_corpus: Option<String>,
}

impl CorpusSearchTool {
    pub fn new(pipeline: Arc<AdvancedQueryPipeline>) -> Self {
        Self {
            pipeline,
            default_corpus: None,
        }
    }

    /// Corpus searched when the call names none.
    pub fn with_default_corpus(mut self, corpus_id: Option<String>) -> Self {
        self.default_corpus = corpus_id;
        self
    }
}

#[async_trait]
impl Tool for CorpusSearchTool {
    fn name(&self) -> &str {
        "corpus_search"
    }

    fn description(&self) -> &str {
        "Searches a pre-indexed document corpus. Input: a JSON object {\"query\": \"what to find\", \"corpus_id\": \"document file name without extension\"}."
    }

    async fn invoke(&self, input: ToolInput) -> Result<String, ToolError> {
        let corpus_id = input
            .corpus_id
            .or_else(|| self.default_corpus.clone())
            .ok_or_else(|| ToolError::InvalidInput("corpus_id is required".to_string()))?;

        let results = self.pipeline.search(&corpus_id, &input.query).await?;
        if results.is_empty() {
            return Ok(format!("No relevant content found in corpus '{corpus_id}'."));
        }

        Ok(results
            .iter()
            .enumerate()
            .map(|(i, scored)| {
                let candidate = &scored.candidate;
                format!(
                    "[{}] source: {}\ncontent: {}",
                    i + 1,
                    candidate.source_id,
                    candidate.render().replace('\n', " ").trim()
                )
            })
            .collect::<Vec<_>>()
            .join("\n\n"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use marag_embeddings::HashingProvider;
    use marag_retrieval::{CorpusIndexer, FsIndexLoader, IndexCache, RetrieverConfig, StorageConfig};
    use pretty_assertions::assert_eq;
    use tempfile::TempDir;

    async fn pipeline(dir: &TempDir) -> Arc<AdvancedQueryPipeline> {
        let provider = Arc::new(HashingProvider::new());
        let indexer = CorpusIndexer::new(
            provider.clone(),
            StorageConfig {
                base_dir: dir.path().to_path_buf(),
                ..StorageConfig::default()
            },
        );
        indexer
            .index_text("france", "france.md", "# France\nParis is the capital of France.")
            .await
            .unwrap();

        let loader = FsIndexLoader::new(dir.path(), provider, RetrieverConfig::default());
        Arc::new(AdvancedQueryPipeline::new(Arc::new(IndexCache::new(
            Arc::new(loader),
        ))))
    }

    #[tokio::test]
    async fn test_search_formats_results() {
        let dir = TempDir::new().unwrap();
        let tool = CorpusSearchTool::new(pipeline(&dir).await);

        let output = tool
            .invoke(ToolInput::query("capital of France").with_corpus("france"))
            .await
            .unwrap();
        assert_eq!(
            output,
            "[1] source: france.md\ncontent: [France] Paris is the capital of France."
        );
    }

    #[tokio::test]
    async fn test_unindexed_corpus_is_an_error() {
        let dir = TempDir::new().unwrap();
        let tool = CorpusSearchTool::new(pipeline(&dir).await);

        let err = tool
            .invoke(ToolInput::query("anything").with_corpus("unindexed"))
            .await
            .unwrap_err();
        assert_eq!(err.to_string(), "index not found for corpus 'unindexed'");
    }

    #[tokio::test]
    async fn test_default_corpus() {
        let dir = TempDir::new().unwrap();
        let tool = CorpusSearchTool::new(pipeline(&dir).await)
            .with_default_corpus(Some("france".to_string()));
        assert!(tool.invoke(ToolInput::query("Paris")).await.is_ok());

        let bare = CorpusSearchTool::new(pipeline(&dir).await);
        assert!(matches!(
            bare.invoke(ToolInput::query("Paris")).await,
            Err(ToolError::InvalidInput(_))
        ));
    }
}
