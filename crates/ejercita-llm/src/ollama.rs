use ollama_rs::Ollama;
use ollama_rs::generation::embeddings::request::{EmbeddingsInput, GenerateEmbeddingsRequest};
use reqwest::Url;

use crate::error::LlmError;
use crate::provider::EmbeddingProvider;

const PROVIDER: &str = "ollama";
const DEFAULT_PORT: u16 = 11434;

/// Embeddings served by a local or remote Ollama instance.
#[derive(Debug, Clone)]
pub struct OllamaEmbedder {
    client: Ollama,
    model: String,
}

impl OllamaEmbedder {
    #[must_use]
    pub fn new(base_url: &str, model: String) -> Self {
        let (host, port) = split_endpoint(base_url);
        Self {
            client: Ollama::new(host, port),
            model,
        }
    }

    async fn request(
        &self,
        input: EmbeddingsInput,
        expected: usize,
    ) -> Result<Vec<Vec<f32>>, LlmError> {
        let request = GenerateEmbeddingsRequest::new(self.model.clone(), input);
        let response = self
            .client
            .generate_embeddings(request)
            .await
            .map_err(|e| LlmError::Request {
                provider: PROVIDER,
                message: e.to_string(),
            })?;
        LlmError::check_count(PROVIDER, response.embeddings, expected)
    }
}

impl EmbeddingProvider for OllamaEmbedder {
    async fn embed(&self, text: &str) -> Result<Vec<f32>, LlmError> {
        let mut vectors = self.request(EmbeddingsInput::from(text), 1).await?;
        vectors
            .pop()
            .ok_or(LlmError::EmptyResponse { provider: PROVIDER })
    }

    async fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, LlmError> {
        if texts.is_empty() {
            return Ok(Vec::new());
        }
        self.request(EmbeddingsInput::Multiple(texts.to_vec()), texts.len())
            .await
    }

    fn name(&self) -> &'static str {
        PROVIDER
    }

    fn model(&self) -> &str {
        &self.model
    }
}

/// Split `scheme://host[:port]` into the pieces the Ollama client wants.
/// Unparseable input is passed through with the default port.
fn split_endpoint(base_url: &str) -> (String, u16) {
    let trimmed = base_url.trim_end_matches('/');
    let Ok(url) = Url::parse(trimmed) else {
        return (trimmed.to_owned(), DEFAULT_PORT);
    };
    match url.host_str() {
        Some(host) => (
            format!("{}://{host}", url.scheme()),
            url.port().unwrap_or(DEFAULT_PORT),
        ),
        None => (trimmed.to_owned(), DEFAULT_PORT),
    }
}
