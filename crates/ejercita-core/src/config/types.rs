use std::path::PathBuf;

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct Config {
    #[serde(default)]
    pub embedding: EmbeddingConfig,
    #[serde(default)]
    pub chunking: ChunkingConfig,
    #[serde(default)]
    pub index: IndexConfig,
    #[serde(default)]
    pub retrieval: RetrievalConfig,
    #[serde(default)]
    pub loader: LoaderConfig,
    #[serde(default)]
    pub log: LogConfig,
    #[serde(skip)]
    pub secrets: ResolvedSecrets,
}

/// Embedding backend selector.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum EmbeddingProviderKind {
    #[default]
    Ollama,
    OpenAi,
    Hashing,
}

impl EmbeddingProviderKind {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Ollama => "ollama",
            Self::OpenAi => "openai",
            Self::Hashing => "hashing",
        }
    }
}

impl std::fmt::Display for EmbeddingProviderKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

fn default_embedding_model() -> String {
    "all-minilm".into()
}

fn default_embedding_dimensions() -> usize {
    ejercita_llm::hashing::DEFAULT_DIMENSIONS
}

pub(crate) const OLLAMA_BASE_URL: &str = "http://localhost:11434";
pub(crate) const OPENAI_BASE_URL: &str = "https://api.openai.com/v1";

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct EmbeddingConfig {
    #[serde(default)]
    pub provider: EmbeddingProviderKind,
    #[serde(default = "default_embedding_model")]
    pub model: String,
    /// Falls back to the provider's usual endpoint when unset.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub base_url: Option<String>,
    /// Output size of the hashing embedder. Other providers report their own.
    #[serde(default = "default_embedding_dimensions")]
    pub dimensions: usize,
}

impl EmbeddingConfig {
    #[must_use]
    pub fn effective_base_url(&self) -> &str {
        match (&self.base_url, self.provider) {
            (Some(url), _) => url,
            (None, EmbeddingProviderKind::OpenAi) => OPENAI_BASE_URL,
            (None, _) => OLLAMA_BASE_URL,
        }
    }
}

impl Default for EmbeddingConfig {
    fn default() -> Self {
        Self {
            provider: EmbeddingProviderKind::default(),
            model: default_embedding_model(),
            base_url: None,
            dimensions: default_embedding_dimensions(),
        }
    }
}

fn default_chunk_size() -> usize {
    1000
}

fn default_chunk_overlap() -> usize {
    200
}

#[derive(Debug, Clone, Copy, Deserialize, Serialize)]
pub struct ChunkingConfig {
    #[serde(default = "default_chunk_size")]
    pub chunk_size: usize,
    #[serde(default = "default_chunk_overlap")]
    pub chunk_overlap: usize,
}

impl Default for ChunkingConfig {
    fn default() -> Self {
        Self {
            chunk_size: default_chunk_size(),
            chunk_overlap: default_chunk_overlap(),
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum VectorBackend {
    #[default]
    Sqlite,
    Qdrant,
    Memory,
}

impl VectorBackend {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Sqlite => "sqlite",
            Self::Qdrant => "qdrant",
            Self::Memory => "memory",
        }
    }
}

fn default_index_path() -> PathBuf {
    PathBuf::from("./data/processed/index")
}

fn default_collection() -> String {
    ejercita_memory::index_store::DEFAULT_COLLECTION.into()
}

fn default_qdrant_url() -> String {
    "http://localhost:6334".into()
}

fn default_batch_size() -> usize {
    ejercita_memory::index_store::DEFAULT_BATCH_SIZE
}

fn default_max_content_chars() -> usize {
    ejercita_memory::sanitize::DEFAULT_MAX_CONTENT_CHARS
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct IndexConfig {
    #[serde(default)]
    pub backend: VectorBackend,
    /// Directory holding the SQLite index file.
    #[serde(default = "default_index_path")]
    pub path: PathBuf,
    #[serde(default = "default_collection")]
    pub collection: String,
    #[serde(default = "default_qdrant_url")]
    pub qdrant_url: String,
    #[serde(default = "default_batch_size")]
    pub batch_size: usize,
    #[serde(default = "default_max_content_chars")]
    pub max_content_chars: usize,
}

impl Default for IndexConfig {
    fn default() -> Self {
        Self {
            backend: VectorBackend::default(),
            path: default_index_path(),
            collection: default_collection(),
            qdrant_url: default_qdrant_url(),
            batch_size: default_batch_size(),
            max_content_chars: default_max_content_chars(),
        }
    }
}

fn default_k() -> usize {
    ejercita_memory::retriever::DEFAULT_K
}

#[derive(Debug, Clone, Copy, Deserialize, Serialize)]
pub struct RetrievalConfig {
    #[serde(default = "default_k")]
    pub k: usize,
    #[serde(default)]
    pub score_threshold: f32,
}

impl Default for RetrievalConfig {
    fn default() -> Self {
        Self {
            k: default_k(),
            score_threshold: ejercita_memory::retriever::DEFAULT_SCORE_THRESHOLD,
        }
    }
}

fn default_max_file_size() -> u64 {
    ejercita_memory::document::DEFAULT_MAX_FILE_SIZE
}

#[derive(Debug, Clone, Copy, Deserialize, Serialize)]
pub struct LoaderConfig {
    #[serde(default = "default_max_file_size")]
    pub max_file_size: u64,
}

impl Default for LoaderConfig {
    fn default() -> Self {
        Self {
            max_file_size: default_max_file_size(),
        }
    }
}

fn default_log_level() -> String {
    "info".into()
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct LogConfig {
    #[serde(default = "default_log_level")]
    pub level: String,
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
        }
    }
}

/// Credentials taken from the environment only.
#[derive(Clone, Default)]
pub struct ResolvedSecrets {
    pub openai_api_key: Option<String>,
}

impl std::fmt::Debug for ResolvedSecrets {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ResolvedSecrets")
            .field(
                "openai_api_key",
                &self.openai_api_key.as_ref().map(|_| "[REDACTED]"),
            )
            .finish()
    }
}
