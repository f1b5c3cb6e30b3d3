use std::future::Future;

use crate::error::LlmError;

/// A backend that turns text into dense vectors.
///
/// Implementations must return vectors of a fixed dimension for a given model.
pub trait EmbeddingProvider: Send + Sync {
    /// Embed a single text.
    ///
    /// # Errors
    ///
    /// Returns an error if the backend cannot be reached or the response is malformed.
    fn embed(&self, text: &str) -> impl Future<Output = Result<Vec<f32>, LlmError>> + Send;

    /// Embed several texts, preserving input order.
    ///
    /// The default implementation embeds sequentially; backends with a native batch
    /// endpoint override it.
    ///
    /// # Errors
    ///
    /// Returns an error if any text fails to embed. The whole batch is rejected.
    fn embed_batch(
        &self,
        texts: &[String],
    ) -> impl Future<Output = Result<Vec<Vec<f32>>, LlmError>> + Send {
        async move {
            let mut out = Vec::with_capacity(texts.len());
            for text in texts {
                out.push(self.embed(text).await?);
            }
            Ok(out)
        }
    }

    fn name(&self) -> &'static str;

    /// Identifier of the embedding model, reported in collection info.
    fn model(&self) -> &str;
}
