//! Persisted corpus artifacts.
//!
//! A corpus lives in `{base_dir}/{corpus_id}/` and holds exactly two files:
//! the vector index (`vectors.json`) and the ordered chunk list
//! (`chunks.json`). Only the indexer writes them; retrieval reads them.

use std::collections::HashSet;
use std::path::{Path, PathBuf};

use marag_embeddings::SimilarityIndex;
use serde::{Deserialize, Serialize};
use tokio::fs;
use tracing::{debug, info};

use crate::error::{Result, RetrievalError};

/// File name of the vector index artifact.
pub const VECTORS_FILE: &str = "vectors.json";

/// File name of the chunk list artifact.
pub const CHUNKS_FILE: &str = "chunks.json";

/// A searchable text chunk.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Chunk {
    /// Unique identifier within the corpus.
    pub id: String,

    /// Chunk text.
    pub text: String,

    /// Identifier of the document the chunk came from.
    pub source_id: String,

    /// Markdown headers the chunk was split under, outermost first.
    #[serde(default)]
    pub header_path: Vec<String>,
}

impl Chunk {
    /// Create a chunk without header metadata.
    pub fn new(id: impl Into<String>, text: impl Into<String>, source_id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            text: text.into(),
            source_id: source_id.into(),
            header_path: Vec::new(),
        }
    }

    /// Set the header path.
    pub fn with_header_path(mut self, header_path: Vec<String>) -> Self {
        self.header_path = header_path;
        self
    }
}

/// Reject identifiers that would escape the base directory.
pub fn validate_corpus_id(corpus_id: &str) -> Result<()> {
    let trimmed = corpus_id.trim();
    if trimmed.is_empty()
        || trimmed != corpus_id
        || corpus_id == "."
        || corpus_id.contains("..")
        || corpus_id.contains(['/', '\\'])
    {
        return Err(RetrievalError::InvalidCorpusId(corpus_id.to_string()));
    }
    Ok(())
}

/// Directory of a corpus under `base_dir`.
pub fn corpus_dir(base_dir: &Path, corpus_id: &str) -> PathBuf {
    base_dir.join(corpus_id)
}

/// The loaded contents of a corpus directory.
#[derive(Debug, Clone)]
pub struct CorpusArtifacts {
    /// Chunks in ingestion order.
    pub chunks: Vec<Chunk>,

    /// Vector index keyed by chunk id.
    pub index: SimilarityIndex,
}

impl CorpusArtifacts {
    /// Create artifacts, checking every chunk has an embedding.
    pub fn new(corpus_id: &str, chunks: Vec<Chunk>, index: SimilarityIndex) -> Result<Self> {
        let mut seen = HashSet::new();
        for chunk in &chunks {
            if !seen.insert(chunk.id.as_str()) {
                return Err(RetrievalError::CorruptIndex {
                    corpus_id: corpus_id.to_string(),
                    reason: format!("duplicate chunk id {}", chunk.id),
                });
            }
            if !index.contains(&chunk.id) {
                return Err(RetrievalError::CorruptIndex {
                    corpus_id: corpus_id.to_string(),
                    reason: format!("chunk {} has no embedding", chunk.id),
                });
            }
        }
        Ok(Self { chunks, index })
    }

    /// Load a corpus from `{base_dir}/{corpus_id}/`.
    pub async fn load(base_dir: &Path, corpus_id: &str) -> Result<Self> {
        validate_corpus_id(corpus_id)?;
        let dir = corpus_dir(base_dir, corpus_id);
        if !fs::try_exists(&dir).await? {
            return Err(RetrievalError::IndexNotFound(corpus_id.to_string()));
        }

        let read = |name: &'static str| {
            let path = dir.join(name);
            async move {
                fs::read_to_string(&path)
                    .await
                    .map_err(|e| RetrievalError::CorruptIndex {
                        corpus_id: corpus_id.to_string(),
                        reason: format!("cannot read {}: {e}", path.display()),
                    })
            }
        };

        let vectors = read(VECTORS_FILE).await?;
        let chunks = read(CHUNKS_FILE).await?;

        let index = SimilarityIndex::from_json(&vectors).map_err(|e| {
            RetrievalError::CorruptIndex {
                corpus_id: corpus_id.to_string(),
                reason: e.to_string(),
            }
        })?;
        let chunks: Vec<Chunk> = serde_json::from_str(&chunks)?;

        info!(corpus_id, chunks = chunks.len(), "Loaded corpus artifacts");
        Self::new(corpus_id, chunks, index)
    }

    /// Write the artifacts to `{base_dir}/{corpus_id}/`, returning the directory.
    pub async fn save(&self, base_dir: &Path, corpus_id: &str) -> Result<PathBuf> {
        validate_corpus_id(corpus_id)?;
        let dir = corpus_dir(base_dir, corpus_id);
        fs::create_dir_all(&dir).await?;

        fs::write(dir.join(VECTORS_FILE), self.index.to_json()?).await?;
        fs::write(dir.join(CHUNKS_FILE), serde_json::to_string(&self.chunks)?).await?;

        debug!("Saved {} chunks to {}", self.chunks.len(), dir.display());
        Ok(dir)
    }
}
