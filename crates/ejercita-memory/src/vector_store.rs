use std::collections::HashMap;
use std::future::Future;
use std::pin::Pin;

#[derive(Debug, thiserror::Error)]
pub enum VectorStoreError {
    #[error("connection error: {0}")]
    Connection(String),
    #[error("collection error: {0}")]
    Collection(String),
    #[error("upsert error: {0}")]
    Upsert(String),
    #[error("search error: {0}")]
    Search(String),
    #[error("delete error: {0}")]
    Delete(String),
    #[error("count error: {0}")]
    Count(String),
    #[error("serialization error: {0}")]
    Serialization(String),
}

#[derive(Debug, Clone)]
pub struct VectorPoint {
    pub id: String,
    pub vector: Vec<f32>,
    pub payload: HashMap<String, serde_json::Value>,
}

/// Conjunction of field equalities.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct VectorFilter {
    pub must: Vec<FieldCondition>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct FieldCondition {
    pub field: String,
    pub value: FieldValue,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FieldValue {
    Integer(i64),
    Text(String),
    Bool(bool),
}

impl FieldValue {
    #[must_use]
    pub fn matches(&self, value: &serde_json::Value) -> bool {
        match self {
            Self::Integer(i) => value.as_i64() == Some(*i),
            Self::Text(s) => value.as_str() == Some(s.as_str()),
            Self::Bool(b) => value.as_bool() == Some(*b),
        }
    }
}

impl VectorFilter {
    /// Whether a stored payload satisfies every condition.
    #[must_use]
    pub fn matches(&self, payload: &HashMap<String, serde_json::Value>) -> bool {
        self.must.iter().all(|cond| {
            payload
                .get(&cond.field)
                .is_some_and(|val| cond.value.matches(val))
        })
    }
}

#[derive(Debug, Clone)]
pub struct ScoredVectorPoint {
    pub id: String,
    pub score: f32,
    pub payload: HashMap<String, serde_json::Value>,
}

/// Reject a query vector whose length differs from the collection's.
pub(crate) fn check_query_dimensions(
    collection: &str,
    query: usize,
    stored: usize,
) -> Result<(), VectorStoreError> {
    if query == stored {
        return Ok(());
    }
    Err(VectorStoreError::Search(format!(
        "query has {query} dimensions, collection {collection} expects {stored}"
    )))
}

pub(crate) type BoxFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;

/// Cosine similarity in `[-1, 1]`; zero when either vector has no magnitude.
pub(crate) fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    let dot: f32 = a.iter().zip(b.iter()).map(|(x, y)| x * y).sum();
    let norm_a: f32 = a.iter().map(|x| x * x).sum::<f32>().sqrt();
    let norm_b: f32 = b.iter().map(|x| x * x).sum::<f32>().sqrt();
    if norm_a == 0.0 || norm_b == 0.0 {
        return 0.0;
    }
    dot / (norm_a * norm_b)
}

/// Highest score first, at most `limit` entries.
pub(crate) fn rank(mut scored: Vec<ScoredVectorPoint>, limit: u64) -> Vec<ScoredVectorPoint> {
    scored.sort_by(|a, b| {
        b.score
            .partial_cmp(&a.score)
            .unwrap_or(std::cmp::Ordering::Equal)
            .then_with(|| a.id.cmp(&b.id))
    });
    scored.truncate(usize::try_from(limit).unwrap_or(usize::MAX));
    scored
}

/// Similarity-searchable point storage organised in named collections.
pub trait VectorStore: Send + Sync {
    fn ensure_collection(
        &self,
        collection: &str,
        vector_size: u64,
    ) -> BoxFuture<'_, Result<(), VectorStoreError>>;

    fn collection_exists(&self, collection: &str) -> BoxFuture<'_, Result<bool, VectorStoreError>>;

    fn delete_collection(&self, collection: &str) -> BoxFuture<'_, Result<(), VectorStoreError>>;

    /// Insert or replace points by id. Vectors must match the collection size.
    fn upsert(
        &self,
        collection: &str,
        points: Vec<VectorPoint>,
    ) -> BoxFuture<'_, Result<(), VectorStoreError>>;

    fn search(
        &self,
        collection: &str,
        vector: Vec<f32>,
        limit: u64,
        filter: Option<VectorFilter>,
    ) -> BoxFuture<'_, Result<Vec<ScoredVectorPoint>, VectorStoreError>>;

    /// Number of points in the collection; zero if it does not exist.
    fn count(&self, collection: &str) -> BoxFuture<'_, Result<u64, VectorStoreError>>;

    /// Human-readable location of the backing storage.
    fn location(&self) -> String;
}
