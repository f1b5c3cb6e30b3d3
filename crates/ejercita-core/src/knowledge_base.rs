//! Load, index and retrieve academic documents through one handle.

use std::path::Path;
use std::sync::Arc;
use std::time::Instant;

use anyhow::Context;
use ejercita_llm::{AnyEmbedder, EmbeddingProvider};
use ejercita_memory::document::{
    ChunkAnalysis, DirectoryLoader, Document, SplitterConfig, TextSplitter, analyze_chunks,
};
use ejercita_memory::{
    AddReport, CollectionInfo, IndexStore, MetadataFilter, Retriever, SearchParams,
    SearchResult, VectorStore, build_filter, build_search_query,
};

use crate::bootstrap::{create_embedder, create_vector_store};
use crate::config::Config;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IngestionStatus {
    /// Everything found was loaded, split and indexed.
    Success,
    /// Some files, splits or chunks failed; the rest was indexed.
    Partial,
    /// No document was loaded.
    Empty,
}

impl IngestionStatus {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Success => "success",
            Self::Partial => "partial",
            Self::Empty => "empty",
        }
    }
}

impl std::fmt::Display for IngestionStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone)]
pub struct IngestionReport {
    pub status: IngestionStatus,
    pub files_found: usize,
    pub documents_loaded: usize,
    pub files_skipped: usize,
    pub files_failed: usize,
    pub chunks_created: usize,
    pub split_failures: usize,
    pub chunks_indexed: usize,
    pub chunks_failed: usize,
    /// Chunks already in the index before this run.
    pub existing_chunks: u64,
    pub duration_ms: u128,
    pub errors: Vec<String>,
}

#[derive(Debug, Default)]
struct IndexRun {
    chunks_created: usize,
    split_failures: usize,
    add: AddReport,
    errors: Vec<String>,
}

pub struct KnowledgeBase<E = AnyEmbedder> {
    store: Arc<IndexStore<E>>,
    retriever: Retriever<E>,
    splitter: TextSplitter,
    loader: DirectoryLoader,
    batch_size: usize,
}

impl<E> std::fmt::Debug for KnowledgeBase<E> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("KnowledgeBase")
            .field("store", &self.store)
            .field("retriever", &self.retriever)
            .field("batch_size", &self.batch_size)
            .finish_non_exhaustive()
    }
}

impl KnowledgeBase<AnyEmbedder> {
    /// Build the embedder and vector store selected by `config`.
    ///
    /// # Errors
    ///
    /// Returns an error if the embedder, the vector store or the splitter cannot be
    /// configured.
    pub async fn from_config(config: &Config) -> anyhow::Result<Self> {
        let embedder = create_embedder(config)?;
        let store = create_vector_store(config).await?;
        Self::with_parts(config, store, embedder)
    }
}

impl<E: EmbeddingProvider> KnowledgeBase<E> {
    /// # Errors
    ///
    /// Returns an error if the chunking settings are invalid.
    pub fn with_parts(
        config: &Config,
        store: Box<dyn VectorStore>,
        embedder: E,
    ) -> anyhow::Result<Self> {
        let splitter = TextSplitter::new(SplitterConfig {
            chunk_size: config.chunking.chunk_size,
            chunk_overlap: config.chunking.chunk_overlap,
        })
        .context("invalid chunking configuration")?;
        let store = Arc::new(
            IndexStore::new(store, embedder, config.index.collection.clone())
                .with_max_content_chars(config.index.max_content_chars),
        );
        let retriever = Retriever::new(
            Arc::clone(&store),
            config.retrieval.k,
            config.retrieval.score_threshold,
        );
        Ok(Self {
            store,
            retriever,
            splitter,
            loader: DirectoryLoader::new(config.loader.max_file_size),
            batch_size: config.index.batch_size,
        })
    }

    #[must_use]
    pub fn retriever(&self) -> &Retriever<E> {
        &self.retriever
    }

    async fn index_documents(&self, documents: &[Document]) -> IndexRun {
        let split = self.splitter.split_documents(documents);
        let mut errors: Vec<String> = split
            .failed
            .iter()
            .map(|f| format!("{}: {}", f.source, f.error))
            .collect();

        let add = self.store.add(&split.chunks, self.batch_size).await;
        errors.extend(
            add.failures()
                .map(|(position, e)| format!("{}: {e}", split.chunks[position].metadata.source)),
        );
        IndexRun {
            chunks_created: split.chunks.len(),
            split_failures: split.failed.len(),
            add,
            errors,
        }
    }

    /// Load every supported file under `directory`, split and index it.
    ///
    /// # Errors
    ///
    /// Returns an error if `directory` does not exist or the index cannot be queried.
    /// Per-file, per-split and per-chunk failures are reported in the result.
    pub async fn load(&self, directory: &Path) -> anyhow::Result<IngestionReport> {
        let started = Instant::now();
        let existing_chunks = self.store.count().await?;
        let loaded = self.loader.load_directory(directory).await?;

        let mut errors: Vec<String> = loaded
            .failed
            .iter()
            .map(|f| format!("{}: {}", f.path.display(), f.error))
            .collect();
        let run = if loaded.documents.is_empty() {
            IndexRun::default()
        } else {
            self.index_documents(&loaded.documents).await
        };
        errors.extend(run.errors);

        let chunks_failed = run.add.stats.failed;
        let status = if loaded.documents.is_empty() {
            IngestionStatus::Empty
        } else if loaded.failed.is_empty() && run.split_failures == 0 && chunks_failed == 0 {
            IngestionStatus::Success
        } else {
            IngestionStatus::Partial
        };

        let report = IngestionReport {
            status,
            files_found: loaded.files_found,
            documents_loaded: loaded.documents.len(),
            files_skipped: loaded.skipped.len(),
            files_failed: loaded.failed.len(),
            chunks_created: run.chunks_created,
            split_failures: run.split_failures,
            chunks_indexed: run.add.stats.succeeded,
            chunks_failed,
            existing_chunks,
            duration_ms: started.elapsed().as_millis(),
            errors,
        };
        tracing::info!(
            directory = %directory.display(),
            status = %report.status,
            documents = report.documents_loaded,
            chunks = report.chunks_indexed,
            failed = report.chunks_failed,
            duration_ms = report.duration_ms,
            "ingestion finished"
        );
        Ok(report)
    }

    /// Split and index already-loaded documents, returning the number of chunks stored.
    pub async fn index(&self, documents: &[Document]) -> usize {
        let run = self.index_documents(documents).await;
        for error in &run.errors {
            tracing::warn!(%error, "indexing failure");
        }
        run.add.stats.succeeded
    }

    /// # Errors
    ///
    /// Returns an error for a malformed filter, or if embedding or the store fails.
    pub async fn retrieve(
        &self,
        query: &str,
        k: Option<usize>,
        filter: Option<&MetadataFilter>,
        include_scores: bool,
    ) -> anyhow::Result<Vec<SearchResult>> {
        Ok(self
            .retriever
            .retrieve(query, k, filter, include_scores)
            .await?)
    }

    /// Retrieve study material for a subject, unit or exercise type.
    ///
    /// # Errors
    ///
    /// Returns an error if embedding or the store fails.
    pub async fn search_materials(
        &self,
        params: &SearchParams,
        k: Option<usize>,
    ) -> anyhow::Result<Vec<SearchResult>> {
        let query = build_search_query(params);
        let filter = build_filter(params);
        tracing::debug!(%query, filtered = !filter.is_empty(), "searching materials");
        let filter = (!filter.is_empty()).then_some(&filter);
        self.retrieve(&query, k, filter, false).await
    }

    /// # Errors
    ///
    /// Returns an error if the store cannot be queried.
    pub async fn info(&self) -> anyhow::Result<CollectionInfo> {
        Ok(self.store.info().await?)
    }

    /// # Errors
    ///
    /// Returns an error if the collection cannot be deleted.
    pub async fn reset(&self) -> anyhow::Result<()> {
        Ok(self.store.reset().await?)
    }

    pub fn update_retriever_settings(&mut self, k: Option<usize>, score_threshold: Option<f32>) {
        if let Some(k) = k {
            self.retriever.set_k(k);
        }
        if let Some(threshold) = score_threshold {
            self.retriever.set_score_threshold(threshold);
        }
    }

    /// Chunk `documents` without indexing them and summarize the result.
    #[must_use]
    pub fn analyze(&self, documents: &[Document]) -> ChunkAnalysis {
        analyze_chunks(&self.splitter.split_documents(documents).chunks)
    }

    /// Load `directory` and summarize how it would be chunked. Nothing is indexed.
    ///
    /// # Errors
    ///
    /// Returns an error if `directory` does not exist.
    pub async fn analyze_directory(&self, directory: &Path) -> anyhow::Result<ChunkAnalysis> {
        let loaded = self
            .loader
            .load_directory(directory)
            .await
            .with_context(|| format!("failed to load {}", directory.display()))?;
        for failed in &loaded.failed {
            tracing::warn!(path = %failed.path.display(), error = %failed.error, "file not analyzed");
        }
        Ok(self.analyze(&loaded.documents))
    }
}
