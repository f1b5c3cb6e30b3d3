//! Embedding capability for the ingestion and retrieval pipeline.
//!
//! Every backend implements [`EmbeddingProvider`]; [`AnyEmbedder`] selects one at runtime.

pub mod any;
pub mod error;
pub mod hashing;
pub mod http;
#[cfg(feature = "mock")]
pub mod mock;
pub mod ollama;
pub mod openai;
pub mod provider;

pub use any::AnyEmbedder;
pub use error::LlmError;
pub use provider::EmbeddingProvider;
