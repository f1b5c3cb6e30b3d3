//! Chunk persistence on top of a [`VectorStore`] with per-chunk failure isolation.
//!
//! [`IndexStore::add`] never fails as a whole: every chunk gets its own
//! [`ChunkOutcome`], a rejected batch is retried one chunk at a time, and only the
//! chunks that still fail are reported as errors.

use std::collections::{BTreeMap, HashMap};

use ejercita_llm::{EmbeddingProvider, LlmError};
use uuid::Uuid;

use crate::document::{Chunk, ChunkMetadata, DocumentMetadata};
use crate::query::{MATERIA_KEY, normalize};
use crate::sanitize::{CleaningProvenance, DEFAULT_MAX_CONTENT_CHARS, clean_content};
use crate::vector_store::{
    FieldCondition, FieldValue, VectorFilter, VectorPoint, VectorStore, VectorStoreError,
};

pub const DEFAULT_COLLECTION: &str = "itba_ejercicios_collection";
pub const DEFAULT_BATCH_SIZE: usize = 100;

/// Payload key holding the (cleaned) chunk text.
pub const CONTENT_KEY: &str = "content";
/// Payload key preserving `materia` as written, since [`MATERIA_KEY`] stores the normalized token.
pub const MATERIA_DISPLAY_KEY: &str = "materia_display";

const CHUNK_ID_NAMESPACE: Uuid = Uuid::from_u128(0x8f2c_6a41_0d3e_5b7f_9c18_4e6a_2b0d_71f3);

/// Equality constraints on stored metadata, combined with AND. Empty means no filter.
pub type MetadataFilter = BTreeMap<String, serde_json::Value>;

pub type ChunkId = String;

#[derive(Debug, thiserror::Error)]
pub enum IndexStoreError {
    #[error("embedding failed: {0}")]
    Embedding(#[from] LlmError),

    #[error("vector store error: {0}")]
    Store(#[from] VectorStoreError),

    #[error("invalid filter: {0}")]
    InvalidFilter(String),

    #[error("embedder returned {got} vectors for {expected} texts")]
    EmbeddingCount { expected: usize, got: usize },

    #[error("embedder returned an empty vector")]
    EmptyEmbedding,

    #[error("stored payload is malformed: {0}")]
    Payload(String),
}

/// Why a single chunk was not inserted.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum IngestionError {
    #[error("content preparation failed: {0}")]
    Cleaning(String),

    #[error("insertion failed after batch {batch} was rejected ({batch_error}): {error}")]
    Insertion {
        batch: usize,
        batch_error: String,
        error: String,
    },
}

/// Result for the chunk at `position` in the input slice.
#[derive(Debug, Clone, PartialEq)]
pub struct ChunkOutcome {
    pub position: usize,
    pub result: Result<ChunkId, IngestionError>,
    /// Present when cleaning changed the content length.
    pub cleaning: Option<CleaningProvenance>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct IngestionStats {
    pub attempted: usize,
    pub succeeded: usize,
    pub failed: usize,
    /// Chunks whose content was altered by cleaning.
    pub cleaned: usize,
    pub cleaning_failures: usize,
    /// Batches rejected as a whole and retried per chunk.
    pub batch_failures: usize,
    pub individual_failures: usize,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct AddReport {
    pub outcomes: Vec<ChunkOutcome>,
    pub stats: IngestionStats,
}

impl AddReport {
    #[must_use]
    pub fn inserted_ids(&self) -> Vec<&str> {
        self.outcomes
            .iter()
            .filter_map(|o| o.result.as_deref().ok())
            .collect()
    }

    pub fn failures(&self) -> impl Iterator<Item = (usize, &IngestionError)> {
        self.outcomes
            .iter()
            .filter_map(|o| o.result.as_ref().err().map(|e| (o.position, e)))
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CollectionInfo {
    pub name: String,
    pub location: String,
    pub count: u64,
    pub embedding_model: String,
}

/// A retrieved chunk with its decoded metadata.
#[derive(Debug, Clone, PartialEq)]
pub struct SearchResult {
    pub id: ChunkId,
    pub content: String,
    pub metadata: DocumentMetadata,
    pub chunk: ChunkMetadata,
    /// Cosine similarity, set by score-returning searches.
    pub score: Option<f32>,
}

struct PreparedChunk {
    position: usize,
    id: ChunkId,
    content: String,
    payload: HashMap<String, serde_json::Value>,
}

/// Stable id for a chunk: re-ingesting unchanged content overwrites instead of duplicating.
#[must_use]
pub fn chunk_id(chunk: &Chunk) -> ChunkId {
    let digest = blake3::hash(chunk.content.as_bytes());
    let name = format!(
        "{}\u{0}{}\u{0}{}",
        chunk.metadata.source,
        chunk.chunk.chunk_index,
        digest.to_hex()
    );
    Uuid::new_v5(&CHUNK_ID_NAMESPACE, name.as_bytes()).to_string()
}

fn condition(field: &str, value: &serde_json::Value) -> Result<FieldCondition, IndexStoreError> {
    if field.trim().is_empty() {
        return Err(IndexStoreError::InvalidFilter("empty field name".into()));
    }
    let value = match value {
        serde_json::Value::String(s) if field == MATERIA_KEY => FieldValue::Text(normalize(s)),
        serde_json::Value::String(s) => FieldValue::Text(s.clone()),
        serde_json::Value::Bool(b) => FieldValue::Bool(*b),
        serde_json::Value::Number(n) => n.as_i64().map(FieldValue::Integer).ok_or_else(|| {
            IndexStoreError::InvalidFilter(format!("{field}: only integer numbers supported"))
        })?,
        other => {
            return Err(IndexStoreError::InvalidFilter(format!(
                "{field}: unsupported value {other}"
            )));
        }
    };
    Ok(FieldCondition {
        field: field.to_owned(),
        value,
    })
}

/// Translate a metadata filter into store conditions. `materia` values are normalized.
///
/// # Errors
///
/// Returns [`IndexStoreError::InvalidFilter`] for empty keys or values that are not
/// strings, booleans or integers.
pub fn to_vector_filter(filter: &MetadataFilter) -> Result<Option<VectorFilter>, IndexStoreError> {
    if filter.is_empty() {
        return Ok(None);
    }
    let must = filter
        .iter()
        .map(|(field, value)| condition(field, value))
        .collect::<Result<Vec<_>, _>>()?;
    Ok(Some(VectorFilter { must }))
}

fn decode(
    id: String,
    mut payload: HashMap<String, serde_json::Value>,
    score: Option<f32>,
) -> Result<SearchResult, IndexStoreError> {
    let content = match payload.remove(CONTENT_KEY) {
        Some(serde_json::Value::String(s)) => s,
        _ => return Err(IndexStoreError::Payload(format!("{id}: missing content"))),
    };
    if let Some(display) = payload.remove(MATERIA_DISPLAY_KEY) {
        payload.insert(MATERIA_KEY.to_owned(), display);
    }
    let object = serde_json::Value::Object(payload.into_iter().collect());
    let metadata: DocumentMetadata = serde_json::from_value(object.clone())
        .map_err(|e| IndexStoreError::Payload(format!("{id}: {e}")))?;
    let chunk: ChunkMetadata = serde_json::from_value(object)
        .map_err(|e| IndexStoreError::Payload(format!("{id}: {e}")))?;
    Ok(SearchResult {
        id,
        content,
        metadata,
        chunk,
        score,
    })
}

/// Persisted, searchable chunks in one collection of a [`VectorStore`].
pub struct IndexStore<E> {
    store: Box<dyn VectorStore>,
    embedder: E,
    collection: String,
    max_content_chars: usize,
}

impl<E> std::fmt::Debug for IndexStore<E> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("IndexStore")
            .field("collection", &self.collection)
            .field("location", &self.store.location())
            .field("max_content_chars", &self.max_content_chars)
            .finish_non_exhaustive()
    }
}

impl<E: EmbeddingProvider> IndexStore<E> {
    #[must_use]
    pub fn new(store: Box<dyn VectorStore>, embedder: E, collection: impl Into<String>) -> Self {
        Self {
            store,
            embedder,
            collection: collection.into(),
            max_content_chars: DEFAULT_MAX_CONTENT_CHARS,
        }
    }

    #[must_use]
    pub fn with_max_content_chars(mut self, max_content_chars: usize) -> Self {
        self.max_content_chars = max_content_chars;
        self
    }

    #[must_use]
    pub fn collection(&self) -> &str {
        &self.collection
    }

    fn prepare(
        position: usize,
        chunk: &Chunk,
        content: String,
    ) -> Result<PreparedChunk, IngestionError> {
        let mut payload = chunk
            .payload()
            .map_err(|e| IngestionError::Cleaning(e.to_string()))?;
        payload.insert(
            MATERIA_DISPLAY_KEY.to_owned(),
            chunk.metadata.materia.clone().into(),
        );
        payload.insert(
            MATERIA_KEY.to_owned(),
            normalize(&chunk.metadata.materia).into(),
        );
        payload.insert(CONTENT_KEY.to_owned(), content.clone().into());
        Ok(PreparedChunk {
            position,
            id: chunk_id(chunk),
            content,
            payload,
        })
    }

    async fn insert(&self, batch: &[&PreparedChunk]) -> Result<(), IndexStoreError> {
        let texts: Vec<String> = batch.iter().map(|p| p.content.clone()).collect();
        let vectors = self.embedder.embed_batch(&texts).await?;
        if vectors.len() != batch.len() {
            return Err(IndexStoreError::EmbeddingCount {
                expected: batch.len(),
                got: vectors.len(),
            });
        }
        let Some(dim) = vectors.first().map(Vec::len) else {
            return Ok(());
        };
        if dim == 0 {
            return Err(IndexStoreError::EmptyEmbedding);
        }

        self.store
            .ensure_collection(&self.collection, dim as u64)
            .await?;
        let points = batch
            .iter()
            .zip(vectors)
            .map(|(p, vector)| VectorPoint {
                id: p.id.clone(),
                vector,
                payload: p.payload.clone(),
            })
            .collect();
        self.store.upsert(&self.collection, points).await?;
        Ok(())
    }

    /// Clean, embed and store `chunks` in batches of `batch_size`.
    ///
    /// A failed batch is retried chunk by chunk; chunks that still fail are reported in
    /// their [`ChunkOutcome`] and do not affect the rest of the run.
    pub async fn add(&self, chunks: &[Chunk], batch_size: usize) -> AddReport {
        let batch_size = batch_size.max(1);
        let mut stats = IngestionStats {
            attempted: chunks.len(),
            ..IngestionStats::default()
        };
        let mut outcomes = Vec::with_capacity(chunks.len());
        let mut cleaning = vec![None; chunks.len()];
        let mut prepared = Vec::with_capacity(chunks.len());

        for (position, chunk) in chunks.iter().enumerate() {
            let cleaned = clean_content(&chunk.content, self.max_content_chars);
            if let Some(prov) = cleaned.provenance {
                stats.cleaned += 1;
                tracing::debug!(
                    position,
                    original_chars = prov.original_chars,
                    cleaned_chars = prov.cleaned_chars,
                    truncated = prov.truncated,
                    "chunk content cleaned"
                );
            }
            cleaning[position] = cleaned.provenance;

            match Self::prepare(position, chunk, cleaned.content) {
                Ok(p) => prepared.push(p),
                Err(e) => {
                    tracing::warn!(position, error = %e, "chunk preparation failed");
                    stats.cleaning_failures += 1;
                    outcomes.push((position, Err(e)));
                }
            }
        }

        let total_batches = prepared.len().div_ceil(batch_size);
        for (batch_no, batch) in prepared.chunks(batch_size).enumerate() {
            let refs: Vec<&PreparedChunk> = batch.iter().collect();
            match self.insert(&refs).await {
                Ok(()) => {
                    tracing::debug!(
                        batch = batch_no + 1,
                        total_batches,
                        size = batch.len(),
                        "batch inserted"
                    );
                    outcomes.extend(batch.iter().map(|p| (p.position, Ok(p.id.clone()))));
                }
                Err(batch_err) => {
                    stats.batch_failures += 1;
                    tracing::warn!(
                        batch = batch_no + 1,
                        total_batches,
                        error = %batch_err,
                        "batch rejected, retrying chunks individually"
                    );
                    for p in batch {
                        match self.insert(&[p]).await {
                            Ok(()) => outcomes.push((p.position, Ok(p.id.clone()))),
                            Err(e) => {
                                stats.individual_failures += 1;
                                tracing::warn!(
                                    position = p.position,
                                    source = %p.payload.get("source").and_then(|v| v.as_str()).unwrap_or_default(),
                                    error = %e,
                                    "chunk insertion failed"
                                );
                                outcomes.push((
                                    p.position,
                                    Err(IngestionError::Insertion {
                                        batch: batch_no,
                                        batch_error: batch_err.to_string(),
                                        error: e.to_string(),
                                    }),
                                ));
                            }
                        }
                    }
                }
            }
        }

        outcomes.sort_by_key(|(position, _)| *position);
        let outcomes: Vec<ChunkOutcome> = outcomes
            .into_iter()
            .map(|(position, result)| ChunkOutcome {
                position,
                result,
                cleaning: cleaning[position],
            })
            .collect();

        stats.failed = stats.cleaning_failures + stats.individual_failures;
        stats.succeeded = stats.attempted - stats.failed;
        tracing::info!(
            collection = %self.collection,
            attempted = stats.attempted,
            succeeded = stats.succeeded,
            failed = stats.failed,
            cleaned = stats.cleaned,
            batch_failures = stats.batch_failures,
            "chunks indexed"
        );
        AddReport { outcomes, stats }
    }

    async fn query(
        &self,
        query: &str,
        k: usize,
        filter: Option<&MetadataFilter>,
        with_score: bool,
    ) -> Result<Vec<SearchResult>, IndexStoreError> {
        let vector_filter = match filter {
            Some(f) => to_vector_filter(f)?,
            None => None,
        };
        if k == 0 || !self.store.collection_exists(&self.collection).await? {
            return Ok(Vec::new());
        }

        let vector = self.embedder.embed(query).await?;
        let hits = self
            .store
            .search(&self.collection, vector, k as u64, vector_filter)
            .await?;
        tracing::debug!(query, k, hits = hits.len(), "similarity search");

        hits.into_iter()
            .map(|hit| decode(hit.id, hit.payload, with_score.then_some(hit.score)))
            .collect()
    }

    /// Nearest chunks to `query`, optionally narrowed by an equality filter.
    ///
    /// # Errors
    ///
    /// Returns an error for a malformed filter, or if embedding or the store fails.
    pub async fn search(
        &self,
        query: &str,
        k: usize,
        filter: Option<&MetadataFilter>,
    ) -> Result<Vec<SearchResult>, IndexStoreError> {
        self.query(query, k, filter, false).await
    }

    /// Like [`search`](Self::search) with the similarity score set on every result.
    ///
    /// # Errors
    ///
    /// Returns an error for a malformed filter, or if embedding or the store fails.
    pub async fn search_with_score(
        &self,
        query: &str,
        k: usize,
        filter: Option<&MetadataFilter>,
    ) -> Result<Vec<SearchResult>, IndexStoreError> {
        self.query(query, k, filter, true).await
    }

    /// # Errors
    ///
    /// Returns an error if the store cannot be queried.
    pub async fn count(&self) -> Result<u64, IndexStoreError> {
        Ok(self.store.count(&self.collection).await?)
    }

    /// # Errors
    ///
    /// Returns an error if the store cannot be queried.
    pub async fn info(&self) -> Result<CollectionInfo, IndexStoreError> {
        Ok(CollectionInfo {
            name: self.collection.clone(),
            location: self.store.location(),
            count: self.count().await?,
            embedding_model: format!("{}:{}", self.embedder.name(), self.embedder.model()),
        })
    }

    /// Drop every stored chunk. The collection is recreated by the next [`add`](Self::add).
    ///
    /// # Errors
    ///
    /// Returns an error if the collection cannot be deleted.
    pub async fn reset(&self) -> Result<(), IndexStoreError> {
        if self.store.collection_exists(&self.collection).await? {
            self.store.delete_collection(&self.collection).await?;
        }
        tracing::info!(collection = %self.collection, "index reset");
        Ok(())
    }
}
