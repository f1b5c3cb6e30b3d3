use std::path::Path;

use super::{BoxFuture, ContentLoader, check_size};
use crate::document::{DEFAULT_MAX_FILE_SIZE, DocumentError};

/// Plain UTF-8 text files.
#[derive(Debug, Clone)]
pub struct TextLoader {
    pub max_file_size: u64,
}

impl Default for TextLoader {
    fn default() -> Self {
        Self {
            max_file_size: DEFAULT_MAX_FILE_SIZE,
        }
    }
}

impl ContentLoader for TextLoader {
    fn load(&self, path: &Path) -> BoxFuture<'_, Result<String, DocumentError>> {
        let path = path.to_path_buf();
        let max_size = self.max_file_size;
        Box::pin(async move {
            check_size(&path, max_size).await?;
            let content = tokio::fs::read_to_string(&path).await?;
            Ok(content)
        })
    }
}
