//! Error types for the retrieval pipeline.

use thiserror::Error;

/// Result type alias for retrieval operations.
pub type Result<T> = std::result::Result<T, RetrievalError>;

/// Errors that can occur in the retrieval pipeline.
#[derive(Error, Debug)]
pub enum RetrievalError {
    /// Embedding error.
    #[error("embedding error: {0}")]
    Embedding(#[from] marag_embeddings::EmbeddingError),

    /// No persisted index exists for the corpus.
    #[error("index not found for corpus '{0}'")]
    IndexNotFound(String),

    /// Corpus identifier is not a plain directory name.
    #[error("invalid corpus id: {0:?}")]
    InvalidCorpusId(String),

    /// Persisted index exists but cannot be used.
    #[error("corrupt index for corpus '{corpus_id}': {reason}")]
    CorruptIndex { corpus_id: String, reason: String },

    /// Document type the indexer cannot read.
    #[error("unsupported document: {0}")]
    UnsupportedDocument(String),

    /// Rerank service error.
    #[error("rerank error: {0}")]
    Rerank(String),

    /// Query rewriting error.
    #[error("query expansion error: {0}")]
    Expansion(String),

    /// HTTP error.
    #[error("http error: {0}")]
    Http(#[from] reqwest::Error),

    /// Serialization error.
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// IO error.
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}
