//! The full query pipeline: expand, retrieve, rerank, reorder.

use std::sync::Arc;

use tracing::{info, warn};

use crate::cache::IndexCache;
use crate::error::Result;
use crate::expansion::QueryExpander;
use crate::hybrid::RetrievedCandidate;
use crate::reorder::reorder_for_context;
use crate::rerank::{Reranker, ScoredCandidate};

/// Candidates kept when no reranker is configured.
pub const DEFAULT_TOP_N: usize = 5;

/// Runs a query against a cached corpus through every enabled stage.
pub struct AdvancedQueryPipeline {
    cache: Arc<IndexCache>,
    expander: Option<QueryExpander>,
    reranker: Option<Reranker>,
    reorder: bool,
    top_n: usize,
}

impl AdvancedQueryPipeline {
    /// A pipeline doing hybrid retrieval and reordering only.
    pub fn new(cache: Arc<IndexCache>) -> Self {
        Self {
            cache,
            expander: None,
            reranker: None,
            reorder: true,
            top_n: DEFAULT_TOP_N,
        }
    }

    /// Enable multi-query expansion.
    pub fn with_expander(mut self, expander: QueryExpander) -> Self {
        self.expander = Some(expander);
        self
    }

    /// Enable cross-encoder reranking; its `top_n` replaces the default.
    pub fn with_reranker(mut self, reranker: Reranker) -> Self {
        self.top_n = reranker.top_n();
        self.reranker = Some(reranker);
        self
    }

    /// Enable or disable lost-in-the-middle reordering.
    pub fn with_reorder(mut self, reorder: bool) -> Self {
        self.reorder = reorder;
        self
    }

    /// Set how many candidates survive when no reranker runs.
    pub fn with_top_n(mut self, top_n: usize) -> Self {
        self.top_n = top_n;
        self
    }

    /// The cache this pipeline reads corpora from.
    pub fn cache(&self) -> &Arc<IndexCache> {
        &self.cache
    }

    /// Search `corpus_id` for `query`.
    ///
    /// Fails with `IndexNotFound` when the corpus has not been indexed. A
    /// failing reranker degrades to fused-score order.
    pub async fn search(&self, corpus_id: &str, query: &str) -> Result<Vec<ScoredCandidate>> {
        let retriever = self.cache.get_or_build(corpus_id).await?;

        let candidates = match &self.expander {
            Some(expander) => expander.search(&retriever, query).await?,
            None => retriever.search(query).await?,
        };
        let retrieved = candidates.len();

        let ranked = match &self.reranker {
            Some(reranker) => match reranker.rerank(query, candidates.clone()).await {
                Ok(scored) => scored,
                Err(e) => {
                    warn!("Reranking failed, falling back to fusion scores: {e}");
                    self.by_fusion(candidates)
                }
            },
            None => self.by_fusion(candidates),
        };

        let ranked = if self.reorder {
            reorder_for_context(ranked)
        } else {
            ranked
        };

        info!(
            corpus_id,
            retrieved,
            returned = ranked.len(),
            "Query pipeline complete"
        );
        Ok(ranked)
    }

    fn by_fusion(&self, mut candidates: Vec<RetrievedCandidate>) -> Vec<ScoredCandidate> {
        // Expansion unions several ranked lists; restore a single ranking.
        candidates.sort_by(|a, b| b.fusion_score.total_cmp(&a.fusion_score));
        candidates
            .into_iter()
            .take(self.top_n)
            .map(|candidate| ScoredCandidate {
                relevance: candidate.fusion_score,
                candidate,
            })
            .collect()
    }
}
