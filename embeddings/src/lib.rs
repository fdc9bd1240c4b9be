//! # Embeddings
//!
//! Dense embedding generation and vector similarity search for marag corpora.
//!
//! ## Features
//!
//! - **Embedding Generation**: Convert text to dense vectors through an
//!   OpenAI-compatible endpoint, or offline with feature hashing
//! - **Similarity Search**: Top-k cosine search over a persisted vector index
//! - **Caching**: Memoize embeddings so repeated queries skip the provider
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────┐
//! │                    Embeddings System                            │
//! ├─────────────────────────────────────────────────────────────────┤
//! │  EmbeddingProvider ──► Embedding ──► SimilarityIndex            │
//! │       │                                   │                     │
//! │       ▼                                   ▼                     │
//! │  OpenAI/Hashing ◄── CachedProvider    vectors.json              │
//! └─────────────────────────────────────────────────────────────────┘
//! ```

pub mod cache;
pub mod error;
pub mod index;
pub mod provider;
pub mod similarity;

pub use cache::{CachedProvider, EmbeddingCache};
pub use error::{EmbeddingError, Result};
pub use index::{IndexEntry, SimilarityIndex};
pub use provider::{
    EmbeddingProvider, EmbeddingRequest, EmbeddingResponse, HashingProvider, OpenAIProvider,
};
pub use similarity::{SimilarityResult, cosine_similarity};

/// A dense vector embedding.
pub type Embedding = Vec<f32>;

/// Dimension used by the offline hashing provider.
pub const DEFAULT_HASHING_DIMENSION: usize = 384;
