//! File-backed [`VectorStore`] on `SQLite`. Similarity is computed in process.

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use sqlx::SqlitePool;
use sqlx::sqlite::{SqliteConnectOptions, SqlitePoolOptions};

use crate::vector_store::{
    BoxFuture, ScoredVectorPoint, VectorFilter, VectorPoint, VectorStore, VectorStoreError,
    check_query_dimensions, cosine_similarity, rank,
};

pub const DB_FILE_NAME: &str = "index.db";

#[derive(Debug, Clone)]
pub struct SqliteVectorStore {
    pool: SqlitePool,
    path: PathBuf,
}

fn encode_vector(vector: &[f32]) -> Vec<u8> {
    vector.iter().flat_map(|v| v.to_le_bytes()).collect()
}

fn decode_vector(bytes: &[u8]) -> Vec<f32> {
    bytes
        .chunks_exact(4)
        .map(|b| f32::from_le_bytes([b[0], b[1], b[2], b[3]]))
        .collect()
}

impl SqliteVectorStore {
    /// Open (or create) `<dir>/index.db` and run migrations.
    ///
    /// # Errors
    ///
    /// Returns an error if the directory cannot be created, the database cannot be
    /// opened, or migrations fail.
    pub async fn open(dir: &Path) -> Result<Self, VectorStoreError> {
        tokio::fs::create_dir_all(dir)
            .await
            .map_err(|e| VectorStoreError::Connection(format!("{}: {e}", dir.display())))?;
        let path = dir.join(DB_FILE_NAME);

        let opts = SqliteConnectOptions::new()
            .filename(&path)
            .create_if_missing(true)
            .foreign_keys(true)
            .journal_mode(sqlx::sqlite::SqliteJournalMode::Wal)
            .synchronous(sqlx::sqlite::SqliteSynchronous::Normal);

        let pool = SqlitePoolOptions::new()
            .max_connections(5)
            .connect_with(opts)
            .await
            .map_err(|e| VectorStoreError::Connection(e.to_string()))?;

        sqlx::migrate!("../../migrations")
            .run(&pool)
            .await
            .map_err(|e| VectorStoreError::Connection(e.to_string()))?;

        tracing::debug!(path = %path.display(), "sqlite index opened");
        Ok(Self { pool, path })
    }

    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    async fn vector_size(&self, collection: &str) -> Result<Option<u64>, sqlx::Error> {
        let size: Option<(i64,)> =
            sqlx::query_as("SELECT vector_size FROM collections WHERE name = ?")
                .bind(collection)
                .fetch_optional(&self.pool)
                .await?;
        Ok(size.and_then(|(s,)| u64::try_from(s).ok()))
    }
}

impl VectorStore for SqliteVectorStore {
    fn ensure_collection(
        &self,
        collection: &str,
        vector_size: u64,
    ) -> BoxFuture<'_, Result<(), VectorStoreError>> {
        let collection = collection.to_owned();
        Box::pin(async move {
            let size = i64::try_from(vector_size)
                .map_err(|e| VectorStoreError::Collection(e.to_string()))?;
            sqlx::query(
                "INSERT INTO collections (name, vector_size) VALUES (?, ?) \
                 ON CONFLICT(name) DO NOTHING",
            )
            .bind(&collection)
            .bind(size)
            .execute(&self.pool)
            .await
            .map_err(|e| VectorStoreError::Collection(e.to_string()))?;
            Ok(())
        })
    }

    fn collection_exists(&self, collection: &str) -> BoxFuture<'_, Result<bool, VectorStoreError>> {
        let collection = collection.to_owned();
        Box::pin(async move {
            self.vector_size(&collection)
                .await
                .map(|size| size.is_some())
                .map_err(|e| VectorStoreError::Collection(e.to_string()))
        })
    }

    fn delete_collection(&self, collection: &str) -> BoxFuture<'_, Result<(), VectorStoreError>> {
        let collection = collection.to_owned();
        Box::pin(async move {
            let map_err = |e: sqlx::Error| VectorStoreError::Collection(e.to_string());
            let mut tx = self.pool.begin().await.map_err(map_err)?;
            sqlx::query("DELETE FROM points WHERE collection = ?")
                .bind(&collection)
                .execute(&mut *tx)
                .await
                .map_err(map_err)?;
            sqlx::query("DELETE FROM collections WHERE name = ?")
                .bind(&collection)
                .execute(&mut *tx)
                .await
                .map_err(map_err)?;
            tx.commit().await.map_err(map_err)?;
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
            let map_err = |e: sqlx::Error| VectorStoreError::Upsert(e.to_string());
            let vector_size = self
                .vector_size(&collection)
                .await
                .map_err(map_err)?
                .ok_or_else(|| {
                    VectorStoreError::Upsert(format!("collection {collection} not found"))
                })?;

            let mut rows = Vec::with_capacity(points.len());
            for p in points {
                if p.vector.len() as u64 != vector_size {
                    return Err(VectorStoreError::Upsert(format!(
                        "point {} has {} dimensions, collection expects {vector_size}",
                        p.id,
                        p.vector.len()
                    )));
                }
                let payload = serde_json::to_string(&p.payload)
                    .map_err(|e| VectorStoreError::Serialization(e.to_string()))?;
                rows.push((p.id, encode_vector(&p.vector), payload));
            }

            let mut tx = self.pool.begin().await.map_err(map_err)?;
            for (id, vector, payload) in rows {
                sqlx::query(
                    "INSERT INTO points (collection, id, vector, payload) VALUES (?, ?, ?, ?) \
                     ON CONFLICT(collection, id) DO UPDATE SET \
                     vector = excluded.vector, payload = excluded.payload",
                )
                .bind(&collection)
                .bind(id)
                .bind(vector)
                .bind(payload)
                .execute(&mut *tx)
                .await
                .map_err(map_err)?;
            }
            tx.commit().await.map_err(map_err)?;
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
            let map_err = |e: sqlx::Error| VectorStoreError::Search(e.to_string());
            let Some(vector_size) = self.vector_size(&collection).await.map_err(map_err)? else {
                return Err(VectorStoreError::Search(format!(
                    "collection {collection} not found"
                )));
            };
            let expected = usize::try_from(vector_size)
                .map_err(|e| VectorStoreError::Search(e.to_string()))?;
            check_query_dimensions(&collection, vector.len(), expected)?;

            let rows: Vec<(String, Vec<u8>, String)> =
                sqlx::query_as("SELECT id, vector, payload FROM points WHERE collection = ?")
                    .bind(&collection)
                    .fetch_all(&self.pool)
                    .await
                    .map_err(map_err)?;

            let filter = filter.unwrap_or_default();
            let mut scored = Vec::new();
            for (id, stored, payload) in rows {
                let payload: HashMap<String, serde_json::Value> = serde_json::from_str(&payload)
                    .map_err(|e| VectorStoreError::Serialization(e.to_string()))?;
                if !filter.matches(&payload) {
                    continue;
                }
                scored.push(ScoredVectorPoint {
                    score: cosine_similarity(&vector, &decode_vector(&stored)),
                    id,
                    payload,
                });
            }
            Ok(rank(scored, limit))
        })
    }

    fn count(&self, collection: &str) -> BoxFuture<'_, Result<u64, VectorStoreError>> {
        let collection = collection.to_owned();
        Box::pin(async move {
            let (count,): (i64,) =
                sqlx::query_as("SELECT COUNT(*) FROM points WHERE collection = ?")
                    .bind(&collection)
                    .fetch_one(&self.pool)
                    .await
                    .map_err(|e| VectorStoreError::Count(e.to_string()))?;
            Ok(u64::try_from(count).unwrap_or(0))
        })
    }

    fn location(&self) -> String {
        self.path.display().to_string()
    }
}
