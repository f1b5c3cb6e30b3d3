mod env;
mod types;


pub use types::*;

use std::path::{Path, PathBuf};

use anyhow::{Context, bail};

impl Config {
    /// Load configuration from a TOML file with env var overrides, then validate it.
    ///
    /// Falls back to defaults when the file does not exist.
    ///
    /// # Errors
    ///
    /// Returns an error if the file exists but cannot be read or parsed, or if the
    /// resulting values are inconsistent.
    pub fn load(path: &Path) -> anyhow::Result<Self> {
        let mut config = if path.exists() {
            let content = std::fs::read_to_string(path)
                .with_context(|| format!("failed to read config file {}", path.display()))?;
            toml::from_str::<Self>(&content).context("failed to parse config file")?
        } else {
            tracing::debug!(path = %path.display(), "config file not found, using defaults");
            Self::default()
        };

        config.apply_env_overrides();
        config.validate()?;
        Ok(config)
    }

    /// # Errors
    ///
    /// Returns an error describing the first invalid setting.
    pub fn validate(&self) -> anyhow::Result<()> {
        if self.chunking.chunk_size == 0 {
            bail!("chunking.chunk_size must be greater than zero");
        }
        if self.chunking.chunk_overlap >= self.chunking.chunk_size {
            bail!(
                "chunking.chunk_overlap ({}) must be smaller than chunking.chunk_size ({})",
                self.chunking.chunk_overlap,
                self.chunking.chunk_size
            );
        }
        if self.index.batch_size == 0 {
            bail!("index.batch_size must be greater than zero");
        }
        if self.retrieval.k == 0 {
            bail!("retrieval.k must be greater than zero");
        }
        if !(0.0..=1.0).contains(&self.retrieval.score_threshold) {
            bail!(
                "retrieval.score_threshold must be within [0, 1], got {}",
                self.retrieval.score_threshold
            );
        }
        if self.embedding.provider == EmbeddingProviderKind::OpenAi
            && self.secrets.openai_api_key.is_none()
        {
            bail!("openai embedding provider requires EJERCITA_OPENAI_API_KEY");
        }
        Ok(())
    }
}

/// `--config` argument, then `EJERCITA_CONFIG`, then `config/default.toml`.
#[must_use]
pub fn resolve_config_path(cli: Option<&Path>) -> PathBuf {
    if let Some(path) = cli {
        return path.to_path_buf();
    }
    if let Ok(path) = std::env::var("EJERCITA_CONFIG") {
        return PathBuf::from(path);
    }
    PathBuf::from("config/default.toml")
}
