//! Embedder and vector store construction from [`Config`].

use anyhow::Context;
use ejercita_llm::AnyEmbedder;
use ejercita_llm::hashing::HashingEmbedder;
use ejercita_llm::ollama::OllamaEmbedder;
use ejercita_llm::openai::OpenAiEmbedder;
use ejercita_memory::{InMemoryVectorStore, QdrantVectorStore, SqliteVectorStore, VectorStore};

use crate::config::{Config, EmbeddingProviderKind, VectorBackend};

/// # Errors
///
/// Returns an error if the selected provider cannot be configured.
pub fn create_embedder(config: &Config) -> anyhow::Result<AnyEmbedder> {
    let embedding = &config.embedding;
    let embedder = match embedding.provider {
        EmbeddingProviderKind::Ollama => AnyEmbedder::Ollama(OllamaEmbedder::new(
            embedding.effective_base_url(),
            embedding.model.clone(),
        )),
        EmbeddingProviderKind::OpenAi => {
            let api_key = config
                .secrets
                .openai_api_key
                .clone()
                .context("EJERCITA_OPENAI_API_KEY not found")?;
            AnyEmbedder::OpenAi(
                OpenAiEmbedder::new(
                    api_key,
                    embedding.effective_base_url().to_owned(),
                    embedding.model.clone(),
                )
                .context("failed to create openai embedder")?,
            )
        }
        EmbeddingProviderKind::Hashing => {
            AnyEmbedder::Hashing(HashingEmbedder::new(embedding.dimensions))
        }
    };
    tracing::debug!(
        provider = %embedding.provider,
        model = %embedding.model,
        "embedder configured"
    );
    Ok(embedder)
}

/// # Errors
///
/// Returns an error if the SQLite index cannot be opened or the Qdrant client cannot
/// be created.
pub async fn create_vector_store(config: &Config) -> anyhow::Result<Box<dyn VectorStore>> {
    let store: Box<dyn VectorStore> = match config.index.backend {
        VectorBackend::Sqlite => Box::new(
            SqliteVectorStore::open(&config.index.path)
                .await
                .with_context(|| {
                    format!("failed to open index at {}", config.index.path.display())
                })?,
        ),
        VectorBackend::Qdrant => Box::new(
            QdrantVectorStore::new(&config.index.qdrant_url)
                .context("failed to create qdrant client")?,
        ),
        VectorBackend::Memory => Box::new(InMemoryVectorStore::new()),
    };
    tracing::debug!(
        backend = config.index.backend.as_str(),
        location = %store.location(),
        "vector store ready"
    );
    Ok(store)
}

#[cfg(test)]
mod tests {
    use super::*;
    use ejercita_llm::EmbeddingProvider;

    #[test]
    fn hashing_embedder_uses_configured_dimensions() {
        let mut config = Config::default();
        config.embedding.provider = EmbeddingProviderKind::Hashing;
        config.embedding.dimensions = 48;
        let embedder = create_embedder(&config).unwrap();
        assert_eq!(embedder.name(), "hashing");
        assert_eq!(embedder.model(), "hashing-48");
    }

    #[test]
    fn ollama_embedder_uses_configured_model() {
        let config = Config::default();
        let embedder = create_embedder(&config).unwrap();
        assert_eq!(embedder.name(), "ollama");
        assert_eq!(embedder.model(), "all-minilm");
    }

    #[test]
    fn openai_without_key_errors() {
        let mut config = Config::default();
        config.embedding.provider = EmbeddingProviderKind::OpenAi;
        assert!(create_embedder(&config).is_err());
    }

    #[tokio::test]
    async fn sqlite_store_created_under_index_path() {
        let dir = tempfile::tempdir().unwrap();
        let mut config = Config::default();
        config.index.path = dir.path().join("index");
        let store = create_vector_store(&config).await.unwrap();
        assert!(store.location().starts_with(&*dir.path().to_string_lossy()));
        assert!(dir.path().join("index").is_dir());
    }

    #[tokio::test]
    async fn memory_store_selected() {
        let mut config = Config::default();
        config.index.backend = VectorBackend::Memory;
        let store = create_vector_store(&config).await.unwrap();
        assert_eq!(store.location(), "memory");
    }

    #[tokio::test]
    async fn qdrant_store_points_at_configured_url() {
        let mut config = Config::default();
        config.index.backend = VectorBackend::Qdrant;
        config.index.qdrant_url = "http://qdrant.internal:6334".into();
        let store = create_vector_store(&config).await.unwrap();
        assert_eq!(store.location(), "http://qdrant.internal:6334");
    }
}
