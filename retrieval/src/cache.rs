//! Process-wide cache of built retrievers, keyed by corpus id.

use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Arc;

use async_trait::async_trait;
use marag_embeddings::EmbeddingProvider;
use tokio::sync::{Mutex, OnceCell};
use tracing::{debug, info};

use crate::config::RetrieverConfig;
use crate::corpus::{CorpusArtifacts, validate_corpus_id};
use crate::error::Result;
use crate::hybrid::HybridRetriever;

/// Builds a retriever for a corpus from persistent storage.
#[async_trait]
pub trait IndexLoader: Send + Sync {
    async fn load(&self, corpus_id: &str) -> Result<HybridRetriever>;
}

/// Loads corpora written by the indexer under a base directory.
pub struct FsIndexLoader {
    base_dir: PathBuf,
    provider: Arc<dyn EmbeddingProvider>,
    config: RetrieverConfig,
}

impl FsIndexLoader {
    /// Create a loader reading `{base_dir}/{corpus_id}/`.
    pub fn new(
        base_dir: impl Into<PathBuf>,
        provider: Arc<dyn EmbeddingProvider>,
        config: RetrieverConfig,
    ) -> Self {
        Self {
            base_dir: base_dir.into(),
            provider,
            config,
        }
    }
}

#[async_trait]
impl IndexLoader for FsIndexLoader {
    async fn load(&self, corpus_id: &str) -> Result<HybridRetriever> {
        let artifacts = CorpusArtifacts::load(&self.base_dir, corpus_id).await?;
        Ok(HybridRetriever::new(
            corpus_id,
            artifacts,
            Arc::clone(&self.provider),
            self.config.clone(),
        ))
    }
}

type Slot = Arc<OnceCell<Arc<HybridRetriever>>>;

/// Hands out one shared retriever per corpus.
///
/// The first request for a corpus loads it; concurrent requests for the same
/// corpus wait for that load instead of starting their own. A failed load is
/// not remembered, so the next request tries again.
pub struct IndexCache {
    loader: Arc<dyn IndexLoader>,
    slots: Mutex<HashMap<String, Slot>>,
}

impl IndexCache {
    /// Create an empty cache.
    pub fn new(loader: Arc<dyn IndexLoader>) -> Self {
        Self {
            loader,
            slots: Mutex::new(HashMap::new()),
        }
    }

    /// Return the retriever for `corpus_id`, building it on first use.
    pub async fn get_or_build(&self, corpus_id: &str) -> Result<Arc<HybridRetriever>> {
        validate_corpus_id(corpus_id)?;

        let slot = {
            let mut slots = self.slots.lock().await;
            Arc::clone(slots.entry(corpus_id.to_string()).or_default())
        };

        let built = slot
            .get_or_try_init(|| async {
                info!(corpus_id, "Building retriever");
                self.loader.load(corpus_id).await.map(Arc::new)
            })
            .await;

        match built {
            Ok(retriever) => {
                debug!(corpus_id, "Retriever ready");
                Ok(Arc::clone(retriever))
            }
            Err(e) => {
                self.forget_unbuilt(corpus_id, &slot).await;
                Err(e)
            }
        }
    }

    /// Drop the slot for `corpus_id` unless another request has since
    /// replaced or filled it.
    async fn forget_unbuilt(&self, corpus_id: &str, slot: &Slot) {
        let mut slots = self.slots.lock().await;
        if slots
            .get(corpus_id)
            .is_some_and(|current| Arc::ptr_eq(current, slot) && !current.initialized())
        {
            slots.remove(corpus_id);
        }
    }

    /// Whether a built retriever is cached for `corpus_id`.
    pub async fn is_cached(&self, corpus_id: &str) -> bool {
        self.slots
            .lock()
            .await
            .get(corpus_id)
            .is_some_and(|slot| slot.initialized())
    }

    /// Number of built retrievers.
    pub async fn len(&self) -> usize {
        self.slots
            .lock()
            .await
            .values()
            .filter(|slot| slot.initialized())
            .count()
    }

    /// Whether nothing has been built yet.
    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::corpus::Chunk;
    use crate::error::RetrievalError;
    use marag_embeddings::{HashingProvider, SimilarityIndex};
    use pretty_assertions::assert_eq;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;
    use tempfile::TempDir;

    struct CountingLoader {
        loads: AtomicUsize,
        fail_first: bool,
    }

    #[async_trait]
    impl IndexLoader for CountingLoader {
        async fn load(&self, corpus_id: &str) -> Result<HybridRetriever> {
            let n = self.loads.fetch_add(1, Ordering::SeqCst);
            tokio::time::sleep(Duration::from_millis(20)).await;
            if self.fail_first && n == 0 {
                return Err(RetrievalError::IndexNotFound(corpus_id.to_string()));
            }
            let artifacts =
                CorpusArtifacts::new(corpus_id, Vec::new(), SimilarityIndex::new(8, "test"))?;
            Ok(HybridRetriever::new(
                corpus_id,
                artifacts,
                Arc::new(HashingProvider::new().with_dimension(8)),
                RetrieverConfig::default(),
            ))
        }
    }

    fn counting(fail_first: bool) -> Arc<CountingLoader> {
        Arc::new(CountingLoader {
            loads: AtomicUsize::new(0),
            fail_first,
        })
    }

    #[tokio::test]
    async fn test_concurrent_requests_build_once() {
        let loader = counting(false);
        let cache = Arc::new(IndexCache::new(loader.clone()));

        let mut handles = Vec::new();
        for _ in 0..8 {
            let cache = Arc::clone(&cache);
            handles.push(tokio::spawn(async move {
                cache.get_or_build("report").await.unwrap()
            }));
        }
        let mut retrievers = Vec::new();
        for handle in handles {
            retrievers.push(handle.await.unwrap());
        }

        assert_eq!(loader.loads.load(Ordering::SeqCst), 1);
        assert!(retrievers.iter().all(|r| Arc::ptr_eq(r, &retrievers[0])));
        assert!(cache.is_cached("report").await);
        assert_eq!(cache.len().await, 1);
    }

    #[tokio::test]
    async fn test_failed_build_is_retried() {
        let loader = counting(true);
        let cache = IndexCache::new(loader.clone());

        assert!(cache.get_or_build("report").await.is_err());
        assert!(!cache.is_cached("report").await);
        assert!(cache.get_or_build("report").await.is_ok());
        assert_eq!(loader.loads.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_unknown_corpora_leave_no_slots() {
        let dir = TempDir::new().unwrap();
        let loader = FsIndexLoader::new(
            dir.path(),
            Arc::new(HashingProvider::new()),
            RetrieverConfig::default(),
        );
        let cache = IndexCache::new(Arc::new(loader));

        for corpus_id in ["made-up", "also-made-up", "made-up"] {
            assert!(cache.get_or_build(corpus_id).await.is_err());
        }
        assert!(cache.slots.lock().await.is_empty());
    }

    #[tokio::test]
    async fn test_rejects_path_like_ids() {
        let cache = IndexCache::new(counting(false));
        let err = cache.get_or_build("../etc").await.err().unwrap();
        assert!(matches!(err, RetrievalError::InvalidCorpusId(_)));
        assert!(cache.is_empty().await);
    }

    #[tokio::test]
    async fn test_fs_loader_missing_corpus() {
        let dir = TempDir::new().unwrap();
        let loader = FsIndexLoader::new(
            dir.path(),
            Arc::new(HashingProvider::new()),
            RetrieverConfig::default(),
        );
        let cache = IndexCache::new(Arc::new(loader));
        let err = cache.get_or_build("unindexed").await.err().unwrap();
        assert!(matches!(err, RetrievalError::IndexNotFound(_)));
    }

    #[tokio::test]
    async fn test_fs_loader_builds_from_disk() {
        let dir = TempDir::new().unwrap();
        let mut index = SimilarityIndex::new(2, "test");
        index.add("c0", vec![1.0, 0.0]).unwrap();
        CorpusArtifacts::new("notes", vec![Chunk::new("c0", "hello", "notes.md")], index)
            .unwrap()
            .save(dir.path(), "notes")
            .await
            .unwrap();

        let loader = FsIndexLoader::new(
            dir.path(),
            Arc::new(HashingProvider::new()),
            RetrieverConfig::default(),
        );
        let retriever = IndexCache::new(Arc::new(loader))
            .get_or_build("notes")
            .await
            .unwrap();
        assert_eq!(retriever.corpus_id(), "notes");
        assert_eq!(retriever.len(), 1);
    }
}
