//! Similarity index for fast embedding lookups.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::Embedding;
use crate::error::{EmbeddingError, Result};
use crate::similarity::{SimilarityResult, cosine_similarity, find_top_k, normalize};

/// An entry in the similarity index.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IndexEntry {
    /// Unique identifier (the chunk id for corpus indices).
    pub id: String,

    /// The embedding vector (normalized).
    pub embedding: Embedding,
}

/// On-disk layout of a similarity index.
#[derive(Debug, Serialize, Deserialize)]
struct IndexFile {
    model: String,
    dimension: usize,
    entries: Vec<IndexEntry>,
}

/// A similarity index for fast vector lookups.
///
/// The index stores embeddings and supports similarity search
/// using cosine similarity. It remembers which model produced the
/// embeddings so queries can be embedded the same way after a reload.
#[derive(Debug, Clone)]
pub struct SimilarityIndex {
    /// Stored entries.
    entries: HashMap<String, IndexEntry>,

    /// Expected dimension of embeddings.
    dimension: usize,

    /// Model that produced the stored embeddings.
    model: String,
}

impl SimilarityIndex {
    /// Create a new similarity index.
    pub fn new(dimension: usize, model: impl Into<String>) -> Self {
        Self {
            entries: HashMap::new(),
            dimension,
            model: model.into(),
        }
    }

    /// Add an embedding to the index.
    pub fn add(&mut self, id: impl Into<String>, mut embedding: Embedding) -> Result<()> {
        let id = id.into();

        if embedding.len() != self.dimension {
            return Err(EmbeddingError::DimensionMismatch {
                expected: self.dimension,
                actual: embedding.len(),
            });
        }

        normalize(&mut embedding);
        debug!("Added embedding to index: {id}");
        self.entries.insert(id.clone(), IndexEntry { id, embedding });

        Ok(())
    }

    /// Get an embedding by ID.
    pub fn get(&self, id: &str) -> Option<&IndexEntry> {
        self.entries.get(id)
    }

    /// Check if an ID exists in the index.
    pub fn contains(&self, id: &str) -> bool {
        self.entries.contains_key(id)
    }

    /// Get the number of entries in the index.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Check if the index is empty.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Dimension of the stored embeddings.
    pub fn dimension(&self) -> usize {
        self.dimension
    }

    /// Model that produced the stored embeddings.
    pub fn model(&self) -> &str {
        &self.model
    }

    /// Search for the `k` most similar embeddings.
    pub fn search(&self, query: &[f32], k: usize, min_score: f32) -> Result<Vec<SimilarityResult>> {
        if query.len() != self.dimension {
            return Err(EmbeddingError::DimensionMismatch {
                expected: self.dimension,
                actual: query.len(),
            });
        }

        let mut query = query.to_vec();
        normalize(&mut query);

        find_top_k(
            &query,
            self.entries
                .values()
                .map(|e| (e.id.as_str(), e.embedding.as_slice())),
            k,
            min_score,
        )
    }

    /// Compute similarity between two IDs in the index.
    pub fn similarity(&self, id1: &str, id2: &str) -> Result<f32> {
        let entry1 = self
            .entries
            .get(id1)
            .ok_or_else(|| EmbeddingError::EntryNotFound(id1.to_string()))?;
        let entry2 = self
            .entries
            .get(id2)
            .ok_or_else(|| EmbeddingError::EntryNotFound(id2.to_string()))?;

        cosine_similarity(&entry1.embedding, &entry2.embedding)
    }

    /// Serialize the index to JSON. Entries are written in id order.
    pub fn to_json(&self) -> Result<String> {
        let mut entries: Vec<IndexEntry> = self.entries.values().cloned().collect();
        entries.sort_by(|a, b| a.id.cmp(&b.id));

        let file = IndexFile {
            model: self.model.clone(),
            dimension: self.dimension,
            entries,
        };
        Ok(serde_json::to_string(&file)?)
    }

    /// Load an index from JSON written by [`SimilarityIndex::to_json`].
    pub fn from_json(json: &str) -> Result<Self> {
        let file: IndexFile = serde_json::from_str(json)?;

        let mut index = Self::new(file.dimension, file.model);
        for entry in file.entries {
            if entry.embedding.len() != file.dimension {
                return Err(EmbeddingError::DimensionMismatch {
                    expected: file.dimension,
                    actual: entry.embedding.len(),
                });
            }
            index.entries.insert(entry.id.clone(), entry);
        }

        info!("Loaded {} entries into similarity index", index.len());
        Ok(index)
    }
}
