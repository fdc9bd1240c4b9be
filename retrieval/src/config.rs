//! Configuration for the retrieval pipeline.

use std::path::PathBuf;

use serde::{Deserialize, Serialize};

/// Configuration for hybrid retrieval over one corpus.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RetrieverConfig {
    /// Weight for the lexical (BM25) score.
    pub lexical_weight: f32,

    /// Weight for the vector similarity score.
    pub vector_weight: f32,

    /// Number of candidates taken from the lexical ranker.
    pub lexical_top_k: usize,

    /// Number of candidates taken from the vector ranker.
    pub vector_top_k: usize,
}

impl RetrieverConfig {
    /// Set the fusion weights.
    pub fn with_weights(mut self, lexical: f32, vector: f32) -> Self {
        self.lexical_weight = lexical;
        self.vector_weight = vector;
        self
    }

    /// Set both ranker depths.
    pub fn with_top_k(mut self, lexical: usize, vector: usize) -> Self {
        self.lexical_top_k = lexical;
        self.vector_top_k = vector;
        self
    }
}

impl Default for RetrieverConfig {
    fn default() -> Self {
        Self {
            lexical_weight: 0.5,
            vector_weight: 0.5,
            lexical_top_k: 5,
            vector_top_k: 10,
        }
    }
}

/// Configuration for cross-encoder reranking.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RerankConfig {
    /// Number of candidates kept after reranking.
    pub top_n: usize,

    /// Base URL of a `/rerank` service. Reranking is skipped when unset.
    pub endpoint: Option<String>,

    /// Model name sent to the service, if it serves several.
    pub model: Option<String>,
}

impl Default for RerankConfig {
    fn default() -> Self {
        Self {
            top_n: 5,
            endpoint: None,
            model: Some("mixedbread-ai/mxbai-rerank-xsmall-v1".to_string()),
        }
    }
}

/// Configuration for multi-query expansion.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ExpansionConfig {
    /// Whether expansion runs at all.
    pub enabled: bool,

    /// Number of paraphrases requested.
    pub variants: usize,

    /// Whether the original query is searched alongside its paraphrases.
    pub include_original: bool,
}

impl Default for ExpansionConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            variants: 3,
            include_original: true,
        }
    }
}

/// Configuration for corpus storage and ingestion.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct StorageConfig {
    /// Directory holding one sub-directory per corpus.
    pub base_dir: PathBuf,

    /// Target chunk size in characters.
    pub chunk_size: usize,

    /// Overlap between neighbouring chunks in characters.
    pub chunk_overlap: usize,

    /// Texts per embedding request while indexing.
    pub embed_batch_size: usize,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            base_dir: dirs::data_dir()
                .unwrap_or_default()
                .join("marag/vector_stores"),
            chunk_size: 500,
            chunk_overlap: 50,
            embed_batch_size: 64,
        }
    }
}
