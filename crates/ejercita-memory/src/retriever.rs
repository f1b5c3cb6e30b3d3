//! Default-parameter retrieval on top of an [`IndexStore`].

use std::sync::Arc;

use ejercita_llm::EmbeddingProvider;

use crate::index_store::{IndexStore, IndexStoreError, MetadataFilter, SearchResult};

pub const DEFAULT_K: usize = 10;
pub const DEFAULT_SCORE_THRESHOLD: f32 = 0.0;

/// Search parameters fixed when the retriever is configured.
#[derive(Debug, Clone, Copy, PartialEq)]
struct BoundSearch {
    k: usize,
    score_threshold: f32,
}

impl BoundSearch {
    async fn run<E: EmbeddingProvider>(
        self,
        store: &IndexStore<E>,
        query: &str,
    ) -> Result<Vec<SearchResult>, IndexStoreError> {
        let hits = store.search_with_score(query, self.k, None).await?;
        Ok(hits
            .into_iter()
            .filter(|hit| hit.score.is_some_and(|s| s >= self.score_threshold))
            .map(|hit| SearchResult { score: None, ..hit })
            .collect())
    }
}

/// Retrieves chunks with a configured default `k` and score threshold.
///
/// Queries using the defaults go through a pre-bound similarity-threshold search;
/// a custom `k` or filter falls back to a plain search.
pub struct Retriever<E> {
    store: Arc<IndexStore<E>>,
    k: usize,
    score_threshold: f32,
    default: BoundSearch,
}

impl<E> std::fmt::Debug for Retriever<E> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Retriever")
            .field("k", &self.k)
            .field("score_threshold", &self.score_threshold)
            .finish_non_exhaustive()
    }
}

impl<E: EmbeddingProvider> Retriever<E> {
    #[must_use]
    pub fn new(store: Arc<IndexStore<E>>, k: usize, score_threshold: f32) -> Self {
        Self {
            store,
            k,
            score_threshold,
            default: BoundSearch { k, score_threshold },
        }
    }

    #[must_use]
    pub fn k(&self) -> usize {
        self.k
    }

    #[must_use]
    pub fn score_threshold(&self) -> f32 {
        self.score_threshold
    }

    pub fn set_k(&mut self, k: usize) {
        self.k = k;
        self.rebind();
    }

    pub fn set_score_threshold(&mut self, score_threshold: f32) {
        self.score_threshold = score_threshold;
        self.rebind();
    }

    fn rebind(&mut self) {
        self.default = BoundSearch {
            k: self.k,
            score_threshold: self.score_threshold,
        };
        tracing::debug!(
            k = self.k,
            score_threshold = self.score_threshold,
            "retriever defaults updated"
        );
    }

    /// Retrieve chunks relevant to `query`.
    ///
    /// `k` defaults to the configured value when absent or zero. With `include_scores` every result carries
    /// its similarity and results under the threshold are dropped.
    ///
    /// # Errors
    ///
    /// Returns an error for a malformed filter, or if embedding or the store fails.
    pub async fn retrieve(
        &self,
        query: &str,
        k: Option<usize>,
        filter: Option<&MetadataFilter>,
        include_scores: bool,
    ) -> Result<Vec<SearchResult>, IndexStoreError> {
        let k = k.filter(|&k| k > 0).unwrap_or(self.k);
        let results = if include_scores {
            let hits = self.store.search_with_score(query, k, filter).await?;
            hits.into_iter()
                .filter(|hit| hit.score.is_some_and(|s| s >= self.score_threshold))
                .collect()
        } else if filter.is_none() && k == self.k {
            self.default.run(&self.store, query).await?
        } else {
            self.store.search(query, k, filter).await?
        };
        tracing::debug!(query, k, results = results.len(), "retrieved");
        Ok(results)
    }
}
