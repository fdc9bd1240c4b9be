//! `config.toml` loading.

use std::path::{Path, PathBuf};

use anyhow::Context;
use marag_agent::{AgentConfig, LlmConfig, WebSearchConfig};
use marag_retrieval::{ExpansionConfig, RerankConfig, RetrieverConfig, StorageConfig};
use serde::{Deserialize, Serialize};
use tracing::debug;

/// Where corpus embeddings come from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EmbeddingBackend {
    /// An OpenAI-compatible `/embeddings` endpoint.
    #[default]
    OpenAi,
    /// Offline feature hashing; needs no server.
    Hashing,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct EmbeddingsConfig {
    pub backend: EmbeddingBackend,
    pub base_url: String,
    pub model: String,
    pub api_key: Option<String>,

    /// Embeddings kept in memory for repeated texts.
    pub cache_entries: usize,
}

impl Default for EmbeddingsConfig {
    fn default() -> Self {
        Self {
            backend: EmbeddingBackend::default(),
            base_url: "https://api.openai.com/v1".to_string(),
            model: "text-embedding-3-small".to_string(),
            api_key: None,
            cache_entries: 10_000,
        }
    }
}

/// Settings for every component, one table each.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct MaragConfig {
    pub llm: LlmConfig,
    pub agent: AgentConfig,
    pub web_search: WebSearchConfig,
    pub embeddings: EmbeddingsConfig,
    pub retriever: RetrieverConfig,
    pub expansion: ExpansionConfig,
    pub rerank: RerankConfig,
    pub storage: StorageConfig,
}

impl MaragConfig {
    /// `$CONFIG_DIR/marag/config.toml`.
    pub fn default_path() -> Option<PathBuf> {
        dirs::config_dir().map(|dir| dir.join("marag").join("config.toml"))
    }

    /// Load `path`, or the default path when `None`. An explicit path must
    /// exist; a missing default file yields the defaults. Environment
    /// overrides are applied afterwards.
    pub fn load(path: Option<&Path>) -> anyhow::Result<Self> {
        let mut config = match path {
            Some(path) => Self::from_file(path)?,
            None => match Self::default_path() {
                Some(path) if path.exists() => Self::from_file(&path)?,
                _ => Self::default(),
            },
        };
        config.apply_env(|key| std::env::var(key).ok());
        Ok(config)
    }

    pub fn from_file(path: &Path) -> anyhow::Result<Self> {
        let contents = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read config file {}", path.display()))?;
        let config = toml::from_str(&contents)
            .with_context(|| format!("failed to parse config file {}", path.display()))?;
        debug!(path = %path.display(), "Loaded config");
        Ok(config)
    }

    /// Fill API keys from `OPENAI_API_KEY` and `TAVILY_API_KEY`. Keys set in
    /// the file take precedence.
    pub fn apply_env(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        if let Some(key) = lookup("OPENAI_API_KEY") {
            self.llm.api_key.get_or_insert_with(|| key.clone());
            self.embeddings.api_key.get_or_insert(key);
        }
        if let Some(key) = lookup("TAVILY_API_KEY") {
            self.web_search.api_key.get_or_insert(key);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use tempfile::TempDir;

    #[test]
    fn test_partial_file_keeps_defaults() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(
            &path,
            r#"
[llm]
model = "local-model"

[agent]
max_iterations = 4

[embeddings]
backend = "hashing"

[storage]
base_dir = "/tmp/marag"
"#,
        )
        .unwrap();

        let config = MaragConfig::from_file(&path).unwrap();
        assert_eq!(config.llm.model, "local-model");
        assert_eq!(config.llm.base_url, "http://localhost:8003/v1");
        assert_eq!(config.agent.max_iterations, 4);
        assert_eq!(config.agent.min_confident_rating, 3);
        assert_eq!(config.embeddings.backend, EmbeddingBackend::Hashing);
        assert_eq!(config.storage.base_dir, PathBuf::from("/tmp/marag"));
        assert_eq!(config.storage.chunk_size, 500);
        assert_eq!(config.rerank.top_n, 5);
    }

    #[test]
    fn test_missing_explicit_file_is_an_error() {
        let dir = TempDir::new().unwrap();
        assert!(MaragConfig::load(Some(&dir.path().join("absent.toml"))).is_err());
    }

    #[test]
    fn test_env_overrides_fill_missing_keys() {
        let mut config = MaragConfig::default();
        config.llm.api_key = Some("from-file".to_string());
        config.apply_env(|key| match key {
            "OPENAI_API_KEY" => Some("sk-env".to_string()),
            "TAVILY_API_KEY" => Some("tvly-env".to_string()),
            _ => None,
        });

        assert_eq!(config.llm.api_key.as_deref(), Some("from-file"));
        assert_eq!(config.embeddings.api_key.as_deref(), Some("sk-env"));
        assert_eq!(config.web_search.api_key.as_deref(), Some("tvly-env"));
    }
}
