//! Qdrant-backed [`VectorStore`].

use std::collections::HashMap;

use qdrant_client::qdrant::{
    Condition, CountPointsBuilder, CreateCollectionBuilder, Distance, Filter, PointStruct,
    ScoredPoint, SearchPointsBuilder, UpsertPointsBuilder, VectorParamsBuilder,
    point_id::PointIdOptions, value::Kind,
};
use qdrant_client::{Payload, Qdrant, QdrantError};

use crate::vector_store::{
    BoxFuture, FieldCondition, FieldValue, ScoredVectorPoint, VectorFilter, VectorPoint,
    VectorStore, VectorStoreError,
};

/// Chunk collections stored in a Qdrant server, cosine distance.
#[derive(Clone)]
pub struct QdrantVectorStore {
    client: Qdrant,
    url: String,
}

impl std::fmt::Debug for QdrantVectorStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("QdrantVectorStore")
            .field("url", &self.url)
            .finish_non_exhaustive()
    }
}

impl QdrantVectorStore {
    /// Build a client for `url`. No request is made until the first operation.
    ///
    /// # Errors
    ///
    /// Returns an error if the client configuration is invalid.
    pub fn new(url: &str) -> Result<Self, VectorStoreError> {
        let client = Qdrant::from_url(url)
            .build()
            .map_err(|e| VectorStoreError::Connection(e.to_string()))?;
        Ok(Self {
            client,
            url: url.to_owned(),
        })
    }

    async fn exists(&self, collection: &str) -> Result<bool, VectorStoreError> {
        self.client
            .collection_exists(collection)
            .await
            .map_err(failed(VectorStoreError::Connection))
    }
}

fn failed(variant: fn(String) -> VectorStoreError) -> impl Fn(QdrantError) -> VectorStoreError {
    move |e| variant(e.to_string())
}

fn to_point(point: VectorPoint) -> Result<PointStruct, VectorStoreError> {
    let object = serde_json::Value::Object(point.payload.into_iter().collect());
    let payload =
        Payload::try_from(object).map_err(|e| VectorStoreError::Serialization(e.to_string()))?;
    Ok(PointStruct::new(point.id, point.vector, payload))
}

fn to_condition(cond: FieldCondition) -> Condition {
    match cond.value {
        FieldValue::Integer(v) => Condition::matches(cond.field, v),
        FieldValue::Text(v) => Condition::matches(cond.field, v),
        FieldValue::Bool(v) => Condition::matches(cond.field, v),
    }
}

fn to_filter(filter: VectorFilter) -> Filter {
    Filter::must(filter.must.into_iter().map(to_condition))
}

fn scalar_to_json(kind: Kind) -> Option<serde_json::Value> {
    Some(match kind {
        Kind::StringValue(s) => serde_json::Value::String(s),
        Kind::IntegerValue(i) => i.into(),
        Kind::DoubleValue(d) => serde_json::Number::from_f64(d)?.into(),
        Kind::BoolValue(b) => b.into(),
        Kind::NullValue(_) => serde_json::Value::Null,
        _ => return None,
    })
}

fn from_scored(point: ScoredPoint) -> ScoredVectorPoint {
    let id = match point.id.and_then(|pid| pid.point_id_options) {
        Some(PointIdOptions::Uuid(u)) => u,
        Some(PointIdOptions::Num(n)) => n.to_string(),
        None => String::new(),
    };
    let payload: HashMap<String, serde_json::Value> = point
        .payload
        .into_iter()
        .filter_map(|(key, value)| Some((key, scalar_to_json(value.kind?)?)))
        .collect();
    ScoredVectorPoint {
        id,
        score: point.score,
        payload,
    }
}

impl VectorStore for QdrantVectorStore {
    fn ensure_collection(
        &self,
        collection: &str,
        vector_size: u64,
    ) -> BoxFuture<'_, Result<(), VectorStoreError>> {
        let collection = collection.to_owned();
        Box::pin(async move {
            if self.exists(&collection).await? {
                return Ok(());
            }
            self.client
                .create_collection(
                    CreateCollectionBuilder::new(&collection)
                        .vectors_config(VectorParamsBuilder::new(vector_size, Distance::Cosine)),
                )
                .await
                .map_err(failed(VectorStoreError::Collection))?;
            tracing::info!(%collection, vector_size, "qdrant collection created");
            Ok(())
        })
    }

    fn collection_exists(&self, collection: &str) -> BoxFuture<'_, Result<bool, VectorStoreError>> {
        let collection = collection.to_owned();
        Box::pin(async move { self.exists(&collection).await })
    }

    fn delete_collection(&self, collection: &str) -> BoxFuture<'_, Result<(), VectorStoreError>> {
        let collection = collection.to_owned();
        Box::pin(async move {
            self.client
                .delete_collection(collection.as_str())
                .await
                .map_err(failed(VectorStoreError::Collection))?;
            Ok(())
        })
    }

    fn upsert(
        &self,
        collection: &str,
        points: Vec<VectorPoint>,
    ) -> BoxFuture<'_, Result<(), VectorStoreError>> {
        let collection = collection.to_owned();
        Box::pin(async move {
            let points = points
                .into_iter()
                .map(to_point)
                .collect::<Result<Vec<_>, _>>()?;
            self.client
                .upsert_points(UpsertPointsBuilder::new(collection, points).wait(true))
                .await
                .map_err(failed(VectorStoreError::Upsert))?;
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
        let collection = collection.to_owned();
        Box::pin(async move {
            let mut request =
                SearchPointsBuilder::new(collection, vector, limit).with_payload(true);
            if let Some(filter) = filter {
                request = request.filter(to_filter(filter));
            }
            let response = self
                .client
                .search_points(request)
                .await
                .map_err(failed(VectorStoreError::Search))?;
            Ok(response.result.into_iter().map(from_scored).collect())
        })
    }

    fn count(&self, collection: &str) -> BoxFuture<'_, Result<u64, VectorStoreError>> {
        let collection = collection.to_owned();
        Box::pin(async move {
            if !self.exists(&collection).await? {
                return Ok(0);
            }
            let response = self
                .client
                .count(CountPointsBuilder::new(collection).exact(true))
                .await
                .map_err(failed(VectorStoreError::Count))?;
            Ok(response.result.map_or(0, |r| r.count))
        })
    }

    fn location(&self) -> String {
        self.url.clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn client_creation_is_lazy() {
        let store = QdrantVectorStore::new("http://localhost:6334").unwrap();
        assert_eq!(store.location(), "http://localhost:6334");
        assert!(format!("{store:?}").contains("localhost:6334"));
    }

    #[test]
    fn chunk_payload_converts_to_point() {
        let point = to_point(VectorPoint {
            id: "6b1f3c2e-8d4a-5f9b-a1c2-0e3d4f5a6b7c".into(),
            vector: vec![0.1, 0.2],
            payload: HashMap::from([
                ("materia".to_owned(), json!("algebra")),
                ("chunk_index".to_owned(), json!(3)),
                ("contains_math".to_owned(), json!(true)),
            ]),
        })
        .unwrap();
        assert_eq!(point.payload.len(), 3);
        assert!(matches!(
            point.payload["chunk_index"].kind,
            Some(Kind::IntegerValue(3))
        ));
    }

    #[test]
    fn filter_keeps_every_condition() {
        let filter = to_filter(VectorFilter {
            must: vec![
                FieldCondition {
                    field: "materia".into(),
                    value: FieldValue::Text("algebra".into()),
                },
                FieldCondition {
                    field: "contains_math".into(),
                    value: FieldValue::Bool(true),
                },
                FieldCondition {
                    field: "chunk_index".into(),
                    value: FieldValue::Integer(0),
                },
            ],
        });
        assert_eq!(filter.must.len(), 3);
        assert!(filter.must_not.is_empty());
        assert!(filter.should.is_empty());
    }

    #[test]
    fn scored_point_back_to_json() {
        let point = to_point(VectorPoint {
            id: "6b1f3c2e-8d4a-5f9b-a1c2-0e3d4f5a6b7c".into(),
            vector: vec![1.0],
            payload: HashMap::from([
                ("content".to_owned(), json!("texto")),
                ("file_size".to_owned(), json!(2048)),
                ("ratio".to_owned(), json!(0.5)),
            ]),
        })
        .unwrap();
        let scored = ScoredPoint {
            id: point.id,
            payload: point.payload,
            score: 0.75,
            ..ScoredPoint::default()
        };
        let converted = from_scored(scored);
        assert_eq!(converted.id, "6b1f3c2e-8d4a-5f9b-a1c2-0e3d4f5a6b7c");
        assert!((converted.score - 0.75).abs() < f32::EPSILON);
        assert_eq!(converted.payload["content"], "texto");
        assert_eq!(converted.payload["file_size"], 2048);
        assert_eq!(converted.payload["ratio"], 0.5);
    }
}
