use std::collections::{BTreeMap, HashMap};
use std::sync::{RwLock, RwLockReadGuard, RwLockWriteGuard};

use crate::vector_store::{
    BoxFuture, ScoredVectorPoint, VectorFilter, VectorPoint, VectorStore, VectorStoreError,
    check_query_dimensions, cosine_similarity, rank,
};

type Payload = HashMap<String, serde_json::Value>;

struct Collection {
    dimensions: usize,
    points: BTreeMap<String, (Vec<f32>, Payload)>,
}

type Collections = HashMap<String, Collection>;

/// Process-local vector store. Contents are lost when dropped.
#[derive(Default)]
pub struct InMemoryVectorStore {
    collections: RwLock<Collections>,
}

impl InMemoryVectorStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    fn read<E>(&self, err: E) -> Result<RwLockReadGuard<'_, Collections>, VectorStoreError>
    where
        E: FnOnce(String) -> VectorStoreError,
    {
        self.collections.read().map_err(|e| err(e.to_string()))
    }

    fn write<E>(&self, err: E) -> Result<RwLockWriteGuard<'_, Collections>, VectorStoreError>
    where
        E: FnOnce(String) -> VectorStoreError,
    {
        self.collections.write().map_err(|e| err(e.to_string()))
    }
}

impl std::fmt::Debug for InMemoryVectorStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let collections = self.collections.read().map(|c| c.len()).unwrap_or_default();
        f.debug_struct("InMemoryVectorStore")
            .field("collections", &collections)
            .finish()
    }
}

fn missing(collection: &str) -> String {
    format!("collection {collection} not found")
}

impl VectorStore for InMemoryVectorStore {
    fn ensure_collection(
        &self,
        collection: &str,
        vector_size: u64,
    ) -> BoxFuture<'_, Result<(), VectorStoreError>> {
        let name = collection.to_owned();
        Box::pin(async move {
            let dimensions = usize::try_from(vector_size)
                .map_err(|e| VectorStoreError::Collection(e.to_string()))?;
            self.write(VectorStoreError::Collection)?
                .entry(name)
                .or_insert_with(|| Collection {
                    dimensions,
                    points: BTreeMap::new(),
                });
            Ok(())
        })
    }

    fn collection_exists(&self, collection: &str) -> BoxFuture<'_, Result<bool, VectorStoreError>> {
        let name = collection.to_owned();
        Box::pin(async move { Ok(self.read(VectorStoreError::Collection)?.contains_key(&name)) })
    }

    fn delete_collection(&self, collection: &str) -> BoxFuture<'_, Result<(), VectorStoreError>> {
        let name = collection.to_owned();
        Box::pin(async move {
            self.write(VectorStoreError::Delete)?.remove(&name);
            Ok(())
        })
    }

    fn upsert(
        &self,
        collection: &str,
        points: Vec<VectorPoint>,
    ) -> BoxFuture<'_, Result<(), VectorStoreError>> {
        let name = collection.to_owned();
        Box::pin(async move {
            let mut guard = self.write(VectorStoreError::Upsert)?;
            let target = guard
                .get_mut(&name)
                .ok_or_else(|| VectorStoreError::Upsert(missing(&name)))?;
            // all-or-nothing, like the persistent backends
            if let Some(bad) = points.iter().find(|p| p.vector.len() != target.dimensions) {
                return Err(VectorStoreError::Upsert(format!(
                    "point {} has {} dimensions, collection expects {}",
                    bad.id,
                    bad.vector.len(),
                    target.dimensions
                )));
            }
            target
                .points
                .extend(points.into_iter().map(|p| (p.id, (p.vector, p.payload))));
            Ok(())
        })
    }

    fn search(
        &self,
        collection: &str,
        vector: Vec<f32>,
        limit: u64,
        filter: Option<VectorFilter>,
    ) -> BoxFuture<'_, Result<Vec<ScoredVectorPoint>, VectorStoreError>> {
        let name = collection.to_owned();
        Box::pin(async move {
            let guard = self.read(VectorStoreError::Search)?;
            let source = guard
                .get(&name)
                .ok_or_else(|| VectorStoreError::Search(missing(&name)))?;
            check_query_dimensions(&name, vector.len(), source.dimensions)?;
            let filter = filter.unwrap_or_default();
            let candidates = source
                .points
                .iter()
                .filter(|(_, (_, payload))| filter.matches(payload))
                .map(|(id, (stored, payload))| ScoredVectorPoint {
                    id: id.clone(),
                    score: cosine_similarity(&vector, stored),
                    payload: payload.clone(),
                })
                .collect();
            Ok(rank(candidates, limit))
        })
    }

    fn count(&self, collection: &str) -> BoxFuture<'_, Result<u64, VectorStoreError>> {
        let name = collection.to_owned();
        Box::pin(async move {
            let guard = self.read(VectorStoreError::Count)?;
            Ok(guard.get(&name).map_or(0, |c| c.points.len() as u64))
        })
    }

    fn location(&self) -> String {
        "memory".to_owned()
    }
}
