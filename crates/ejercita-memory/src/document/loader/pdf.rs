use std::path::Path;

use super::{BoxFuture, ContentLoader, check_size};
use crate::document::{DEFAULT_MAX_FILE_SIZE, DocumentError};

/// Text extracted from PDF files on the blocking pool.
#[derive(Debug, Clone)]
pub struct PdfLoader {
    pub max_file_size: u64,
}

impl Default for PdfLoader {
    fn default() -> Self {
        Self {
            max_file_size: DEFAULT_MAX_FILE_SIZE,
        }
    }
}

impl ContentLoader for PdfLoader {
    fn load(&self, path: &Path) -> BoxFuture<'_, Result<String, DocumentError>> {
        let path = path.to_path_buf();
        let max_size = self.max_file_size;
        Box::pin(async move {
            check_size(&path, max_size).await?;

            tokio::task::spawn_blocking(move || {
                pdf_extract::extract_text(&path).map_err(|e| DocumentError::Pdf(e.to_string()))
            })
            .await
            .map_err(|e| DocumentError::Io(std::io::Error::other(e)))?
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn corrupt_pdf_errors() {
        let dir = tempfile::tempdir().unwrap();
        let file = dir.path().join("roto.pdf");
        std::fs::write(&file, b"not a pdf").unwrap();

        assert!(PdfLoader::default().load(&file).await.is_err());
    }

    #[tokio::test]
    async fn missing_pdf_is_io_error() {
        let result = PdfLoader::default().load(Path::new("/nonexistent/a.pdf")).await;
        assert!(matches!(result, Err(DocumentError::Io(_))));
    }
}
