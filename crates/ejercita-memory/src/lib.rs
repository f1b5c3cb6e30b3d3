//! Ingestion and retrieval over a hierarchy of academic documents.
//!
//! Files are loaded and labeled by [`document`], split into annotated chunks,
//! embedded and persisted by [`index_store::IndexStore`], and searched through
//! [`retriever::Retriever`] with filters canonicalized by [`query`].

pub mod document;
pub mod in_memory_store;
pub mod index_store;
pub mod qdrant_store;
pub mod query;
pub mod retriever;
pub mod sanitize;
pub mod sqlite_store;
pub mod vector_store;

pub use document::{Chunk, Document, DocumentError, DocumentMetadata};
pub use in_memory_store::InMemoryVectorStore;
pub use index_store::{
    AddReport, ChunkOutcome, CollectionInfo, IndexStore, IndexStoreError, IngestionError,
    IngestionStats, MetadataFilter, SearchResult,
};
pub use qdrant_store::QdrantVectorStore;
pub use query::{SearchParams, build_filter, build_search_query, normalize};
pub use retriever::Retriever;
pub use sqlite_store::SqliteVectorStore;
pub use vector_store::{VectorStore, VectorStoreError};
