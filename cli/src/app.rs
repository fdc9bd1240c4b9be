//! Builds the runtime components from configuration.

use std::sync::Arc;

use marag_agent::{LlmClient, LlmQueryRewriter, OpenAiChatClient, Orchestrator, OrchestratorEvent};
use marag_embeddings::{
    CachedProvider, EmbeddingCache, EmbeddingProvider, HashingProvider, OpenAIProvider,
};
use marag_retrieval::{
    AdvancedQueryPipeline, CorpusIndexer, FsIndexLoader, IndexCache, QueryExpander, Reranker,
};
use tokio::sync::mpsc;
use tracing::warn;

use crate::config::{EmbeddingBackend, MaragConfig};

pub(crate) fn llm_client(config: &MaragConfig) -> anyhow::Result<Arc<dyn LlmClient>> {
    Ok(Arc::new(OpenAiChatClient::new(&config.llm)?))
}

pub(crate) fn embedding_provider(config: &MaragConfig) -> Arc<dyn EmbeddingProvider> {
    let embeddings = &config.embeddings;
    let provider: Arc<dyn EmbeddingProvider> = match embeddings.backend {
        EmbeddingBackend::OpenAi => {
            let mut provider = OpenAIProvider::new()
                .with_base_url(embeddings.base_url.clone())
                .with_model(embeddings.model.clone());
            if let Some(key) = &embeddings.api_key {
                provider = provider.with_api_key(key.clone());
            }
            Arc::new(provider)
        }
        EmbeddingBackend::Hashing => Arc::new(HashingProvider::new()),
    };
    Arc::new(CachedProvider::new(
        provider,
        EmbeddingCache::new(embeddings.cache_entries),
    ))
}

pub(crate) fn indexer(config: &MaragConfig) -> CorpusIndexer {
    CorpusIndexer::new(embedding_provider(config), config.storage.clone())
}

/// One cache over the corpora in the storage directory, shared by every
/// pipeline built for a run.
pub(crate) fn index_cache(config: &MaragConfig) -> Arc<IndexCache> {
    let loader = FsIndexLoader::new(
        &config.storage.base_dir,
        embedding_provider(config),
        config.retriever.clone(),
    );
    Arc::new(IndexCache::new(Arc::new(loader)))
}

/// The cross-encoder stage, if a rerank endpoint is configured.
pub(crate) fn reranker(config: &MaragConfig) -> Option<Reranker> {
    let reranker = Reranker::from_config(&config.rerank);
    if reranker.is_none() {
        warn!("Reranking is off: no rerank endpoint configured, results keep fusion order");
    }
    reranker
}

/// Hybrid retrieval, optional reranking and reordering without query
/// expansion. The research agent already rephrases its own queries.
pub(crate) fn corpus_pipeline(
    cache: Arc<IndexCache>,
    reranker: Option<Reranker>,
) -> AdvancedQueryPipeline {
    let mut pipeline = AdvancedQueryPipeline::new(cache);
    if let Some(reranker) = reranker {
        pipeline = pipeline.with_reranker(reranker);
    }
    pipeline
}

/// The corpus pipeline plus LLM query expansion, for direct searches.
pub(crate) fn query_pipeline(
    config: &MaragConfig,
    cache: Arc<IndexCache>,
    reranker: Option<Reranker>,
    llm: Arc<dyn LlmClient>,
) -> AdvancedQueryPipeline {
    let pipeline = corpus_pipeline(cache, reranker);
    if !config.expansion.enabled {
        return pipeline;
    }
    let rewriter = LlmQueryRewriter::new(llm, config.llm.clone());
    pipeline.with_expander(QueryExpander::new(
        Arc::new(rewriter),
        config.expansion.clone(),
    ))
}

pub(crate) fn orchestrator(
    config: &MaragConfig,
    events: mpsc::UnboundedSender<OrchestratorEvent>,
) -> anyhow::Result<Orchestrator> {
    let llm = llm_client(config)?;
    let pipeline = corpus_pipeline(index_cache(config), reranker(config));

    Ok(Orchestrator::builder(llm, config.llm.clone())
        .with_config(config.agent.clone())
        .with_web_search(config.web_search.clone())
        .with_corpus_search(Arc::new(pipeline))
        .with_events(events)
        .build())
}
