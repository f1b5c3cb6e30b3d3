use super::Config;

impl Config {
    pub(crate) fn apply_env_overrides(&mut self) {
        self.apply_env_overrides_embedding();
        self.apply_env_overrides_index();
        if let Ok(v) = std::env::var("EJERCITA_OPENAI_API_KEY")
            && !v.trim().is_empty()
        {
            self.secrets.openai_api_key = Some(v);
        }
    }

    fn apply_env_overrides_embedding(&mut self) {
        if let Ok(v) = std::env::var("EJERCITA_EMBEDDING_PROVIDER") {
            if let Ok(kind) = serde_json::from_value(serde_json::Value::String(v.clone())) {
                self.embedding.provider = kind;
            } else {
                tracing::warn!("ignoring invalid EJERCITA_EMBEDDING_PROVIDER value: {v}");
            }
        }
        if let Ok(v) = std::env::var("EJERCITA_EMBEDDING_MODEL") {
            self.embedding.model = v;
        }
        if let Ok(v) = std::env::var("EJERCITA_EMBEDDING_BASE_URL") {
            self.embedding.base_url = Some(v);
        }
        if let Ok(v) = std::env::var("EJERCITA_EMBEDDING_DIMENSIONS")
            && let Ok(dims) = v.parse::<usize>()
        {
            self.embedding.dimensions = dims;
        }
        if let Ok(v) = std::env::var("EJERCITA_CHUNK_SIZE")
            && let Ok(size) = v.parse::<usize>()
        {
            self.chunking.chunk_size = size;
        }
        if let Ok(v) = std::env::var("EJERCITA_CHUNK_OVERLAP")
            && let Ok(overlap) = v.parse::<usize>()
        {
            self.chunking.chunk_overlap = overlap;
        }
    }

    fn apply_env_overrides_index(&mut self) {
        if let Ok(v) = std::env::var("EJERCITA_VECTOR_BACKEND") {
            if let Ok(backend) = serde_json::from_value(serde_json::Value::String(v.clone())) {
                self.index.backend = backend;
            } else {
                tracing::warn!("ignoring invalid EJERCITA_VECTOR_BACKEND value: {v}");
            }
        }
        if let Ok(v) = std::env::var("EJERCITA_INDEX_PATH") {
            self.index.path = v.into();
        }
        if let Ok(v) = std::env::var("EJERCITA_COLLECTION") {
            self.index.collection = v;
        }
        if let Ok(v) = std::env::var("EJERCITA_QDRANT_URL") {
            self.index.qdrant_url = v;
        }
        if let Ok(v) = std::env::var("EJERCITA_BATCH_SIZE")
            && let Ok(size) = v.parse::<usize>()
        {
            self.index.batch_size = size;
        }
        if let Ok(v) = std::env::var("EJERCITA_RETRIEVAL_K")
            && let Ok(k) = v.parse::<usize>()
        {
            self.retrieval.k = k;
        }
        if let Ok(v) = std::env::var("EJERCITA_SCORE_THRESHOLD")
            && let Ok(threshold) = v.parse::<f32>()
        {
            self.retrieval.score_threshold = threshold;
        }
    }
}
