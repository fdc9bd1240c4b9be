//! Cross-encoder reranking.

use std::sync::Arc;

use async_trait::async_trait;
use ordered_float::OrderedFloat;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::config::RerankConfig;
use crate::error::{Result, RetrievalError};
use crate::hybrid::RetrievedCandidate;

/// Scores texts for relevance to a query, jointly encoding each pair.
#[async_trait]
pub trait CrossEncoder: Send + Sync {
    /// One score per text, in input order. Higher is more relevant.
    async fn score(&self, query: &str, texts: &[String]) -> Result<Vec<f32>>;
}

#[async_trait]
impl CrossEncoder for Arc<dyn CrossEncoder> {
    async fn score(&self, query: &str, texts: &[String]) -> Result<Vec<f32>> {
        (**self).score(query, texts).await
    }
}

#[derive(Serialize)]
struct RerankRequest<'a> {
    query: &'a str,
    texts: &'a [String],
    #[serde(skip_serializing_if = "Option::is_none")]
    model: Option<&'a str>,
}

#[derive(Deserialize)]
struct RerankHit {
    index: usize,
    score: f32,
}

/// Client for a `/rerank` service speaking the text-embeddings-inference format.
pub struct HttpCrossEncoder {
    client: reqwest::Client,
    base_url: String,
    model: Option<String>,
}

impl HttpCrossEncoder {
    /// Create a client for the service at `base_url`.
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            client: reqwest::Client::new(),
            base_url: base_url.into().trim_end_matches('/').to_string(),
            model: None,
        }
    }

    /// Set the model name sent with each request.
    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.model = Some(model.into());
        self
    }
}

#[async_trait]
impl CrossEncoder for HttpCrossEncoder {
    async fn score(&self, query: &str, texts: &[String]) -> Result<Vec<f32>> {
        if texts.is_empty() {
            return Ok(Vec::new());
        }

        let response = self
            .client
            .post(format!("{}/rerank", self.base_url))
            .json(&RerankRequest {
                query,
                texts,
                model: self.model.as_deref(),
            })
            .send()
            .await?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(RetrievalError::Rerank(format!("{status}: {body}")));
        }

        let hits: Vec<RerankHit> = response.json().await?;
        let mut scores = vec![None; texts.len()];
        for hit in hits {
            let slot = scores.get_mut(hit.index).ok_or_else(|| {
                RetrievalError::Rerank(format!("score for unknown index {}", hit.index))
            })?;
            *slot = Some(hit.score);
        }

        scores
            .into_iter()
            .enumerate()
            .map(|(i, score)| {
                score.ok_or_else(|| RetrievalError::Rerank(format!("no score for text {i}")))
            })
            .collect()
    }
}

/// A candidate with its cross-encoder relevance.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScoredCandidate {
    pub candidate: RetrievedCandidate,
    pub relevance: f32,
}

/// Keeps the most relevant candidates according to a cross-encoder.
pub struct Reranker {
    encoder: Arc<dyn CrossEncoder>,
    top_n: usize,
}

impl Reranker {
    /// Create a reranker keeping `top_n` candidates.
    pub fn new(encoder: Arc<dyn CrossEncoder>, top_n: usize) -> Self {
        Self { encoder, top_n }
    }

    /// Create a reranker from configuration, or `None` when no endpoint is set.
    pub fn from_config(config: &RerankConfig) -> Option<Self> {
        let endpoint = config.endpoint.as_deref()?;
        let mut encoder = HttpCrossEncoder::new(endpoint);
        if let Some(model) = &config.model {
            encoder = encoder.with_model(model.clone());
        }
        Some(Self::new(Arc::new(encoder), config.top_n))
    }

    /// Number of candidates kept.
    pub fn top_n(&self) -> usize {
        self.top_n
    }

    /// Score, sort descending and keep `min(top_n, candidates.len())`.
    ///
    /// Candidates with equal relevance keep their input order.
    pub async fn rerank(
        &self,
        query: &str,
        candidates: Vec<RetrievedCandidate>,
    ) -> Result<Vec<ScoredCandidate>> {
        if candidates.is_empty() {
            return Ok(Vec::new());
        }

        let texts: Vec<String> = candidates.iter().map(|c| c.text.clone()).collect();
        let scores = self.encoder.score(query, &texts).await?;
        if scores.len() != candidates.len() {
            return Err(RetrievalError::Rerank(format!(
                "expected {} scores, got {}",
                candidates.len(),
                scores.len()
            )));
        }

        let mut scored: Vec<ScoredCandidate> = candidates
            .into_iter()
            .zip(scores)
            .map(|(candidate, relevance)| ScoredCandidate {
                candidate,
                relevance,
            })
            .collect();

        // `sort_by` is stable, which keeps ties in input order.
        scored.sort_by(|a, b| OrderedFloat(b.relevance).cmp(&OrderedFloat(a.relevance)));
        scored.truncate(self.top_n);

        debug!("Reranked to {} candidates", scored.len());
        Ok(scored)
    }
}
