//! Multi-query expansion.
//!
//! A query is rewritten into several paraphrases, each paraphrase is searched,
//! and the results are merged so that wording differences between the
//! question and the corpus matter less.

use std::collections::HashSet;
use std::sync::Arc;

use async_trait::async_trait;
use tracing::{debug, warn};

use crate::config::ExpansionConfig;
use crate::error::Result;
use crate::hybrid::{HybridRetriever, RetrievedCandidate};

/// Produces alternative phrasings of a query.
#[async_trait]
pub trait QueryRewriter: Send + Sync {
    /// Return up to `n` paraphrases of `query`, not including `query` itself.
    async fn rewrite(&self, query: &str, n: usize) -> Result<Vec<String>>;
}

#[async_trait]
impl QueryRewriter for Arc<dyn QueryRewriter> {
    async fn rewrite(&self, query: &str, n: usize) -> Result<Vec<String>> {
        (**self).rewrite(query, n).await
    }
}

/// Expands a query and searches every variant.
pub struct QueryExpander {
    rewriter: Arc<dyn QueryRewriter>,
    config: ExpansionConfig,
}

impl QueryExpander {
    /// Create a new expander.
    pub fn new(rewriter: Arc<dyn QueryRewriter>, config: ExpansionConfig) -> Self {
        Self { rewriter, config }
    }

    /// The queries to search: the original first, then distinct paraphrases.
    ///
    /// A failing rewriter degrades to the original query alone.
    pub async fn variants(&self, query: &str) -> Vec<String> {
        let mut variants = Vec::new();
        let mut seen = HashSet::new();

        if self.config.include_original || !self.config.enabled {
            seen.insert(query.trim().to_lowercase());
            variants.push(query.to_string());
        }
        if !self.config.enabled || self.config.variants == 0 {
            return variants;
        }

        let rewrites = match self.rewriter.rewrite(query, self.config.variants).await {
            Ok(rewrites) => rewrites,
            Err(e) => {
                warn!("Query rewriting failed, searching the original query only: {e}");
                Vec::new()
            }
        };

        for rewrite in rewrites.into_iter().take(self.config.variants) {
            let trimmed = rewrite.trim();
            if !trimmed.is_empty() && seen.insert(trimmed.to_lowercase()) {
                variants.push(trimmed.to_string());
            }
        }

        if variants.is_empty() {
            variants.push(query.to_string());
        }
        debug!("Expanded query into {} variants", variants.len());
        variants
    }

    /// Search every variant and return the union, first occurrence of each chunk kept.
    pub async fn search(
        &self,
        retriever: &HybridRetriever,
        query: &str,
    ) -> Result<Vec<RetrievedCandidate>> {
        let mut seen = HashSet::new();
        let mut union = Vec::new();

        for variant in self.variants(query).await {
            for candidate in retriever.search(&variant).await? {
                if seen.insert(candidate.chunk_id.clone()) {
                    union.push(candidate);
                }
            }
        }
        Ok(union)
    }
}
