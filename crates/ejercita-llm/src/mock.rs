//! Test-only embedder with injectable failures.

use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use crate::error::LlmError;
use crate::hashing::HashingEmbedder;
use crate::provider::EmbeddingProvider;

/// Embeds like [`HashingEmbedder`] but fails on texts containing any marker in `fail_on`.
///
/// A batch containing a poisoned text fails as a whole, so callers exercise their
/// per-item fallback path.
#[derive(Debug, Clone)]
pub struct MockEmbedder {
    inner: HashingEmbedder,
    pub fail_on: Vec<String>,
    /// Reject batch calls carrying more than one text. Single-text calls still succeed.
    pub fail_batches: bool,
    calls: Arc<AtomicUsize>,
}

impl Default for MockEmbedder {
    fn default() -> Self {
        Self {
            inner: HashingEmbedder::new(64),
            fail_on: Vec::new(),
            fail_batches: false,
            calls: Arc::new(AtomicUsize::new(0)),
        }
    }
}

impl MockEmbedder {
    #[must_use]
    pub fn failing_on(marker: impl Into<String>) -> Self {
        Self {
            fail_on: vec![marker.into()],
            ..Self::default()
        }
    }

    #[must_use]
    pub fn with_failing_batches(mut self) -> Self {
        self.fail_batches = true;
        self
    }

    /// Number of `embed`/`embed_batch` calls seen so far.
    #[must_use]
    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::Relaxed)
    }

    fn check(&self, text: &str) -> Result<(), LlmError> {
        if let Some(marker) = self.fail_on.iter().find(|m| text.contains(m.as_str())) {
            return Err(LlmError::Other(format!("mock embedder rejects marker {marker:?}")));
        }
        Ok(())
    }
}

impl EmbeddingProvider for MockEmbedder {
    async fn embed(&self, text: &str) -> Result<Vec<f32>, LlmError> {
        self.calls.fetch_add(1, Ordering::Relaxed);
        self.check(text)?;
        Ok(self.inner.embed_sync(text))
    }

    async fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, LlmError> {
        self.calls.fetch_add(1, Ordering::Relaxed);
        if self.fail_batches && texts.len() > 1 {
            return Err(LlmError::Other(format!(
                "mock embedder rejects a batch of {}",
                texts.len()
            )));
        }
        for text in texts {
            self.check(text)?;
        }
        Ok(texts.iter().map(|t| self.inner.embed_sync(t)).collect())
    }

    fn name(&self) -> &'static str {
        "mock"
    }

    fn model(&self) -> &str {
        self.inner.model()
    }
}
