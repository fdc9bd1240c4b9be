//! # Retrieval
//!
//! Hybrid document retrieval over indexed corpora:
//!
//! - **Indexing**: markdown-aware splitting and embedding of documents into
//!   per-corpus artifacts on disk
//! - **Hybrid search**: BM25 and vector similarity fused by weighted sum
//! - **Query expansion**: paraphrases searched separately and unioned
//! - **Reranking**: cross-encoder scoring of the fused candidates
//! - **Reordering**: strongest candidates placed at both ends of the context
//!
//! ## Architecture
//!
//! ```text
//! query ─► QueryExpander ─► HybridRetriever (per variant) ─► Reranker ─► reorder
//!                                  ▲
//!                              IndexCache ◄── FsIndexLoader ◄── {base}/{corpus}/
//! ```
//!
//! ## Usage
//!
//! ```rust,ignore
//! use marag_retrieval::{AdvancedQueryPipeline, FsIndexLoader, IndexCache};
//!
//! let loader = FsIndexLoader::new(base_dir, provider, RetrieverConfig::default());
//! let cache = Arc::new(IndexCache::new(Arc::new(loader)));
//! let pipeline = AdvancedQueryPipeline::new(cache);
//!
//! let results = pipeline.search("annual-report", "What was the revenue?").await?;
//! ```

pub mod cache;
pub mod config;
pub mod corpus;
pub mod error;
pub mod expansion;
pub mod hybrid;
pub mod indexer;
pub mod lexical;
pub mod pipeline;
pub mod reorder;
pub mod rerank;
pub mod splitter;

pub use cache::{FsIndexLoader, IndexCache, IndexLoader};
pub use config::{ExpansionConfig, RerankConfig, RetrieverConfig, StorageConfig};
pub use corpus::{Chunk, CorpusArtifacts};
pub use error::{Result, RetrievalError};
pub use expansion::{QueryExpander, QueryRewriter};
pub use hybrid::{HybridRetriever, RetrievedCandidate, fuse};
pub use indexer::{CorpusIndexer, IndexReport};
pub use lexical::{Bm25Index, LexicalHit};
pub use pipeline::AdvancedQueryPipeline;
pub use reorder::reorder_for_context;
pub use rerank::{CrossEncoder, HttpCrossEncoder, Reranker, ScoredCandidate};
pub use splitter::MarkdownSplitter;
