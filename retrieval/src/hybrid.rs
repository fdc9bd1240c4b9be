//! Hybrid lexical + vector retrieval over a single corpus.

use std::cmp::{Ordering, Reverse};
use std::collections::HashMap;
use std::sync::Arc;

use marag_embeddings::{EmbeddingProvider, EmbeddingRequest, SimilarityIndex, SimilarityResult};
use ordered_float::OrderedFloat;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::config::RetrieverConfig;
use crate::corpus::{Chunk, CorpusArtifacts};
use crate::error::Result;
use crate::lexical::{Bm25Index, LexicalHit};

/// A chunk returned by retrieval together with the scores that ranked it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RetrievedCandidate {
    pub chunk_id: String,
    pub text: String,
    pub source_id: String,
    pub header_path: Vec<String>,

    /// Normalized BM25 score, if the lexical ranker returned the chunk.
    pub lexical_score: Option<f32>,

    /// Cosine similarity, if the vector ranker returned the chunk.
    pub vector_score: Option<f32>,

    /// Weighted sum of both scores, missing sides counted as zero.
    pub fusion_score: f32,
}

impl RetrievedCandidate {
    fn from_chunk(chunk: &Chunk) -> Self {
        Self {
            chunk_id: chunk.id.clone(),
            text: chunk.text.clone(),
            source_id: chunk.source_id.clone(),
            header_path: chunk.header_path.clone(),
            lexical_score: None,
            vector_score: None,
            fusion_score: 0.0,
        }
    }

    /// Text prefixed with its header trail, as shown to a language model.
    pub fn render(&self) -> String {
        if self.header_path.is_empty() {
            self.text.clone()
        } else {
            format!("[{}] {}", self.header_path.join(" > "), self.text)
        }
    }
}

/// Merge lexical and vector hits into one ranked list.
///
/// Hits whose id is not in `chunks` are ignored. Ordering is by fused score,
/// then lexical score, then `source_id`, then `chunk_id`.
pub fn fuse(
    chunks: &HashMap<String, Chunk>,
    lexical: &[LexicalHit],
    vector: &[SimilarityResult],
    config: &RetrieverConfig,
) -> Vec<RetrievedCandidate> {
    let mut merged: HashMap<&str, RetrievedCandidate> = HashMap::new();

    for hit in lexical {
        if let Some(chunk) = chunks.get(&hit.id) {
            merged
                .entry(chunk.id.as_str())
                .or_insert_with(|| RetrievedCandidate::from_chunk(chunk))
                .lexical_score = Some(hit.score);
        }
    }
    for hit in vector {
        if let Some(chunk) = chunks.get(&hit.id) {
            merged
                .entry(chunk.id.as_str())
                .or_insert_with(|| RetrievedCandidate::from_chunk(chunk))
                .vector_score = Some(hit.score);
        }
    }

    let mut candidates: Vec<RetrievedCandidate> = merged
        .into_values()
        .map(|mut candidate| {
            candidate.fusion_score = config.lexical_weight * candidate.lexical_score.unwrap_or(0.0)
                + config.vector_weight * candidate.vector_score.unwrap_or(0.0);
            candidate
        })
        .collect();

    candidates.sort_by(compare_candidates);
    candidates
}

fn compare_candidates(a: &RetrievedCandidate, b: &RetrievedCandidate) -> Ordering {
    let key = |c: &RetrievedCandidate| {
        (
            Reverse(OrderedFloat(c.fusion_score)),
            Reverse(OrderedFloat(c.lexical_score.unwrap_or(0.0))),
        )
    };
    key(a)
        .cmp(&key(b))
        .then_with(|| a.source_id.cmp(&b.source_id))
        .then_with(|| a.chunk_id.cmp(&b.chunk_id))
}

/// Searches one corpus with BM25 and embeddings and fuses the two rankings.
///
/// Built once per corpus and shared read-only.
pub struct HybridRetriever {
    corpus_id: String,
    chunks: HashMap<String, Chunk>,
    lexical: Bm25Index,
    vectors: SimilarityIndex,
    provider: Arc<dyn EmbeddingProvider>,
    config: RetrieverConfig,
}

impl HybridRetriever {
    /// Build a retriever from loaded corpus artifacts.
    pub fn new(
        corpus_id: impl Into<String>,
        artifacts: CorpusArtifacts,
        provider: Arc<dyn EmbeddingProvider>,
        config: RetrieverConfig,
    ) -> Self {
        let CorpusArtifacts { chunks, index } = artifacts;
        let lexical = Bm25Index::build(chunks.iter().map(|c| (c.id.as_str(), c.text.as_str())));
        let chunks = chunks.into_iter().map(|c| (c.id.clone(), c)).collect();

        Self {
            corpus_id: corpus_id.into(),
            chunks,
            lexical,
            vectors: index,
            provider,
            config,
        }
    }

    /// Corpus this retriever searches.
    pub fn corpus_id(&self) -> &str {
        &self.corpus_id
    }

    /// Number of chunks in the corpus.
    pub fn len(&self) -> usize {
        self.chunks.len()
    }

    /// Whether the corpus has no chunks.
    pub fn is_empty(&self) -> bool {
        self.chunks.is_empty()
    }

    /// Retrieve fused candidates for `query`.
    pub async fn search(&self, query: &str) -> Result<Vec<RetrievedCandidate>> {
        if self.is_empty() {
            return Ok(Vec::new());
        }

        let lexical = self.lexical.search(query, self.config.lexical_top_k);

        // Queries must be embedded with the model the corpus was indexed with.
        let request =
            EmbeddingRequest::new(query).with_model(self.vectors.model().to_string());
        let embedding = self.provider.embed(request).await?.embedding;
        let vector =
            self.vectors
                .search(&embedding, self.config.vector_top_k, f32::NEG_INFINITY)?;

        let fused = fuse(&self.chunks, &lexical, &vector, &self.config);
        debug!(
            corpus_id = %self.corpus_id,
            lexical = lexical.len(),
            vector = vector.len(),
            fused = fused.len(),
            "Hybrid search complete"
        );
        Ok(fused)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use marag_embeddings::HashingProvider;
    use pretty_assertions::assert_eq;

    fn chunk_map(chunks: &[Chunk]) -> HashMap<String, Chunk> {
        chunks.iter().map(|c| (c.id.clone(), c.clone())).collect()
    }

    #[test]
    fn test_fuse_weighted_sum() {
        let chunks = chunk_map(&[
            Chunk::new("a", "alpha", "doc.md"),
            Chunk::new("b", "beta", "doc.md"),
            Chunk::new("c", "gamma", "doc.md"),
        ]);
        let lexical = vec![
            LexicalHit { id: "a".into(), score: 1.0 },
            LexicalHit { id: "b".into(), score: 0.4 },
        ];
        let vector = vec![SimilarityResult::new("b", 0.9), SimilarityResult::new("c", 0.6)];

        let fused = fuse(&chunks, &lexical, &vector, &RetrieverConfig::default());
        let ids: Vec<&str> = fused.iter().map(|c| c.chunk_id.as_str()).collect();
        assert_eq!(ids, vec!["b", "a", "c"]);

        assert!((fused[0].fusion_score - 0.65).abs() < 1e-6);
        assert!((fused[1].fusion_score - 0.5).abs() < 1e-6);
        assert!((fused[2].fusion_score - 0.3).abs() < 1e-6);
        assert_eq!(fused[1].vector_score, None);
        assert_eq!(fused[2].lexical_score, None);
    }

    #[test]
    fn test_fuse_tie_breaks() {
        let chunks = chunk_map(&[
            Chunk::new("x2", "one", "b.md"),
            Chunk::new("x1", "two", "b.md"),
            Chunk::new("y", "three", "a.md"),
            Chunk::new("z", "four", "c.md"),
        ]);
        let lexical = vec![LexicalHit { id: "z".into(), score: 0.5 }];
        let vector = vec![
            SimilarityResult::new("x2", 0.5),
            SimilarityResult::new("x1", 0.5),
            SimilarityResult::new("y", 0.5),
        ];

        let fused = fuse(&chunks, &lexical, &vector, &RetrieverConfig::default());
        let ids: Vec<&str> = fused.iter().map(|c| c.chunk_id.as_str()).collect();
        // Equal fused scores: lexical score first, then source id, then chunk id.
        assert_eq!(ids, vec!["z", "y", "x1", "x2"]);
    }

    #[test]
    fn test_fuse_respects_weights() {
        let chunks = chunk_map(&[Chunk::new("a", "alpha", "doc.md")]);
        let lexical = vec![LexicalHit { id: "a".into(), score: 1.0 }];
        let vector = vec![SimilarityResult::new("a", 0.5)];
        let config = RetrieverConfig::default().with_weights(0.2, 0.8);

        let fused = fuse(&chunks, &lexical, &vector, &config);
        assert!((fused[0].fusion_score - 0.6).abs() < 1e-6);
    }

    async fn build(chunks: Vec<Chunk>) -> HybridRetriever {
        let provider = HashingProvider::new().with_dimension(64);
        let mut index = SimilarityIndex::new(64, HashingProvider::MODEL);
        for chunk in &chunks {
            let response = provider.embed(EmbeddingRequest::new(&chunk.text)).await.unwrap();
            index.add(&chunk.id, response.embedding).unwrap();
        }
        let artifacts = CorpusArtifacts::new("test", chunks, index).unwrap();
        HybridRetriever::new("test", artifacts, Arc::new(provider), RetrieverConfig::default())
    }

    #[tokio::test]
    async fn test_search_ranks_matching_chunk_first() {
        let retriever = build(vec![
            Chunk::new("c0", "Paris is the capital of France.", "france.md"),
            Chunk::new("c1", "The Rhine flows through Germany.", "germany.md"),
        ])
        .await;

        let results = retriever.search("capital of France").await.unwrap();
        assert_eq!(results[0].chunk_id, "c0");
        assert!(results[0].lexical_score.is_some());
        assert!(results[0].vector_score.is_some());
    }

    #[tokio::test]
    async fn test_empty_corpus_returns_nothing() {
        let retriever = build(Vec::new()).await;
        assert!(retriever.search("anything").await.unwrap().is_empty());
    }

    #[test]
    fn test_render_includes_headers() {
        let candidate = RetrievedCandidate {
            header_path: vec!["Europe".into(), "France".into()],
            ..RetrievedCandidate::from_chunk(&Chunk::new("c", "Paris.", "doc.md"))
        };
        assert_eq!(candidate.render(), "[Europe > France] Paris.");
    }
}
