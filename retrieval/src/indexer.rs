//! Corpus ingestion: split documents, embed the pieces, persist the artifacts.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use marag_embeddings::{EmbeddingProvider, EmbeddingRequest, SimilarityIndex};
use serde::Serialize;
use tracing::{info, warn};
use walkdir::WalkDir;

use crate::config::StorageConfig;
use crate::corpus::{Chunk, CorpusArtifacts, validate_corpus_id};
use crate::error::{Result, RetrievalError};
use crate::splitter::MarkdownSplitter;

/// File extensions the indexer reads.
const SUPPORTED_EXTENSIONS: [&str; 3] = ["md", "markdown", "txt"];

/// Outcome of indexing one document.
#[derive(Debug, Clone, Serialize)]
pub struct IndexReport {
    pub corpus_id: String,
    pub source_id: String,
    pub chunks: usize,
    pub directory: PathBuf,
}

/// Builds one corpus per document under the storage base directory.
pub struct CorpusIndexer {
    provider: Arc<dyn EmbeddingProvider>,
    splitter: MarkdownSplitter,
    config: StorageConfig,
}

impl CorpusIndexer {
    /// Create an indexer using `config` for chunking and storage.
    pub fn new(provider: Arc<dyn EmbeddingProvider>, config: StorageConfig) -> Self {
        Self {
            provider,
            splitter: MarkdownSplitter::new(config.chunk_size, config.chunk_overlap),
            config,
        }
    }

    /// Directory corpora are written to.
    pub fn base_dir(&self) -> &Path {
        &self.config.base_dir
    }

    /// Index a single file; the corpus id is the file stem.
    pub async fn index_file(&self, path: &Path) -> Result<IndexReport> {
        if !is_supported(path) {
            return Err(RetrievalError::UnsupportedDocument(path.display().to_string()));
        }
        let (Some(stem), Some(name)) = (
            path.file_stem().and_then(std::ffi::OsStr::to_str),
            path.file_name().and_then(std::ffi::OsStr::to_str),
        ) else {
            return Err(RetrievalError::UnsupportedDocument(path.display().to_string()));
        };

        let text = tokio::fs::read_to_string(path).await?;
        self.index_text(stem, name, &text).await
    }

    /// Index a file, or every supported file below a directory.
    ///
    /// Files that fail are logged and skipped.
    pub async fn index_path(&self, path: &Path) -> Result<Vec<IndexReport>> {
        if path.is_file() {
            return Ok(vec![self.index_file(path).await?]);
        }

        let mut files: Vec<PathBuf> = WalkDir::new(path)
            .follow_links(true)
            .into_iter()
            .filter_map(std::result::Result::ok)
            .filter(|entry| entry.file_type().is_file() && is_supported(entry.path()))
            .map(walkdir::DirEntry::into_path)
            .collect();
        files.sort();

        let mut reports = Vec::new();
        for file in files {
            match self.index_file(&file).await {
                Ok(report) => reports.push(report),
                Err(e) => warn!("Skipping {}: {e}", file.display()),
            }
        }
        Ok(reports)
    }

    /// Index already-loaded text as corpus `corpus_id`.
    pub async fn index_text(
        &self,
        corpus_id: &str,
        source_id: &str,
        text: &str,
    ) -> Result<IndexReport> {
        validate_corpus_id(corpus_id)?;

        let chunks: Vec<Chunk> = self
            .splitter
            .split(text)
            .into_iter()
            .enumerate()
            .map(|(n, piece)| {
                Chunk::new(format!("{corpus_id}#{n}"), piece.text, source_id)
                    .with_header_path(piece.header_path)
            })
            .collect();

        let mut index =
            SimilarityIndex::new(self.provider.default_dimension(), self.provider.default_model());
        let batch_size = self.config.embed_batch_size.max(1);
        for batch in chunks.chunks(batch_size) {
            let requests = batch
                .iter()
                .map(|chunk| EmbeddingRequest::new(chunk.text.clone()))
                .collect();
            let responses = self.provider.embed_batch(requests).await?;
            for (chunk, response) in batch.iter().zip(responses) {
                index.add(chunk.id.clone(), response.embedding)?;
            }
        }

        let count = chunks.len();
        let directory = CorpusArtifacts::new(corpus_id, chunks, index)?
            .save(&self.config.base_dir, corpus_id)
            .await?;

        info!(corpus_id, source_id, chunks = count, "Indexed document");
        Ok(IndexReport {
            corpus_id: corpus_id.to_string(),
            source_id: source_id.to_string(),
            chunks: count,
            directory,
        })
    }
}

fn is_supported(path: &Path) -> bool {
    path.extension()
        .and_then(std::ffi::OsStr::to_str)
        .is_some_and(|ext| {
            SUPPORTED_EXTENSIONS
                .iter()
                .any(|supported| ext.eq_ignore_ascii_case(supported))
        })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::{FsIndexLoader, IndexCache};
    use crate::config::RetrieverConfig;
    use marag_embeddings::HashingProvider;
    use pretty_assertions::assert_eq;
    use tempfile::TempDir;

    fn indexer(base_dir: &Path) -> CorpusIndexer {
        CorpusIndexer::new(
            Arc::new(HashingProvider::new().with_dimension(128)),
            StorageConfig {
                base_dir: base_dir.to_path_buf(),
                chunk_size: 80,
                chunk_overlap: 10,
                embed_batch_size: 2,
            },
        )
    }

    #[tokio::test]
    async fn test_index_file_and_search() {
        let docs = TempDir::new().unwrap();
        let store = TempDir::new().unwrap();
        let file = docs.path().join("france.md");
        std::fs::write(
            &file,
            "# France\nParis is the capital of France.\n\n## People\nAbout 68 million people live in France.\n",
        )
        .unwrap();

        let report = indexer(store.path()).index_file(&file).await.unwrap();
        assert_eq!(report.corpus_id, "france");
        assert_eq!(report.source_id, "france.md");
        assert_eq!(report.chunks, 2);

        let loader = FsIndexLoader::new(
            store.path(),
            Arc::new(HashingProvider::new().with_dimension(128)),
            RetrieverConfig::default(),
        );
        let retriever = IndexCache::new(Arc::new(loader))
            .get_or_build("france")
            .await
            .unwrap();
        let results = retriever.search("capital of France").await.unwrap();
        assert_eq!(results[0].chunk_id, "france#0");
        assert_eq!(results[0].header_path, vec!["France".to_string()]);
    }

    #[tokio::test]
    async fn test_index_directory_skips_unsupported() {
        let docs = TempDir::new().unwrap();
        let store = TempDir::new().unwrap();
        std::fs::write(docs.path().join("a.md"), "alpha").unwrap();
        std::fs::create_dir_all(docs.path().join("nested")).unwrap();
        std::fs::write(docs.path().join("nested/b.txt"), "beta").unwrap();
        std::fs::write(docs.path().join("image.png"), [0u8, 1, 2]).unwrap();

        let reports = indexer(store.path()).index_path(docs.path()).await.unwrap();
        let ids: Vec<&str> = reports.iter().map(|r| r.corpus_id.as_str()).collect();
        assert_eq!(ids, vec!["a", "b"]);
    }

    #[tokio::test]
    async fn test_unsupported_file() {
        let store = TempDir::new().unwrap();
        let err = indexer(store.path())
            .index_file(Path::new("scan.pdf"))
            .await
            .unwrap_err();
        assert!(matches!(err, RetrievalError::UnsupportedDocument(_)));
    }
}
