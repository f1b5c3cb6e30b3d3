//! Per-format content loaders.

#[cfg(feature = "pdf")]
mod pdf;
mod tex;
mod text;

use std::future::Future;
use std::path::Path;
use std::pin::Pin;

#[cfg(feature = "pdf")]
pub use pdf::PdfLoader;
pub use tex::TexLoader;
pub use text::TextLoader;

use super::DocumentError;
#[cfg(test)]
use super::DEFAULT_MAX_FILE_SIZE;

type BoxFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;

/// Reads the textual content of a single file.
pub trait ContentLoader: Send + Sync {
    fn load(&self, path: &Path) -> BoxFuture<'_, Result<String, DocumentError>>;
}

/// File formats accepted by the pipeline.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SourceFormat {
    Pdf,
    Txt,
    Tex,
}

impl SourceFormat {
    #[must_use]
    pub fn from_path(path: &Path) -> Option<Self> {
        let ext = path.extension()?.to_str()?.to_ascii_lowercase();
        match ext.as_str() {
            "pdf" => Some(Self::Pdf),
            "txt" => Some(Self::Txt),
            "tex" => Some(Self::Tex),
            _ => None,
        }
    }
}

/// One loader per supported format, selected by file extension.
#[derive(Debug, Clone)]
pub enum AnyLoader {
    #[cfg(feature = "pdf")]
    Pdf(PdfLoader),
    Txt(TextLoader),
    Tex(TexLoader),
}

impl AnyLoader {
    /// # Errors
    ///
    /// Returns [`DocumentError::UnsupportedFormat`] for extensions other than
    /// pdf, txt and tex, or for PDF when built without the `pdf` feature.
    pub fn for_path(path: &Path, max_file_size: u64) -> Result<Self, DocumentError> {
        let format = SourceFormat::from_path(path)
            .ok_or_else(|| DocumentError::UnsupportedFormat(path.display().to_string()))?;
        Self::for_format(format, max_file_size)
    }

    /// # Errors
    ///
    /// Returns [`DocumentError::UnsupportedFormat`] if the format was compiled out.
    pub fn for_format(format: SourceFormat, max_file_size: u64) -> Result<Self, DocumentError> {
        match format {
            #[cfg(feature = "pdf")]
            SourceFormat::Pdf => Ok(Self::Pdf(PdfLoader { max_file_size })),
            #[cfg(not(feature = "pdf"))]
            SourceFormat::Pdf => Err(DocumentError::UnsupportedFormat(
                "pdf support not compiled in".into(),
            )),
            SourceFormat::Txt => Ok(Self::Txt(TextLoader { max_file_size })),
            SourceFormat::Tex => Ok(Self::Tex(TexLoader { max_file_size })),
        }
    }

    fn inner(&self) -> &dyn ContentLoader {
        match self {
            #[cfg(feature = "pdf")]
            Self::Pdf(l) => l,
            Self::Txt(l) => l,
            Self::Tex(l) => l,
        }
    }
}

impl ContentLoader for AnyLoader {
    fn load(&self, path: &Path) -> BoxFuture<'_, Result<String, DocumentError>> {
        self.inner().load(path)
    }
}

/// Reject files above `max_size` before reading them.
async fn check_size(path: &Path, max_size: u64) -> Result<u64, DocumentError> {
    let meta = tokio::fs::metadata(path).await?;
    if meta.len() > max_size {
        return Err(DocumentError::FileTooLarge(meta.len()));
    }
    Ok(meta.len())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn format_from_extension_case_insensitive() {
        assert_eq!(SourceFormat::from_path(Path::new("a/B.PDF")), Some(SourceFormat::Pdf));
        assert_eq!(SourceFormat::from_path(Path::new("notas.txt")), Some(SourceFormat::Txt));
        assert_eq!(SourceFormat::from_path(Path::new("tp.tex")), Some(SourceFormat::Tex));
        assert_eq!(SourceFormat::from_path(Path::new("foto.png")), None);
        assert_eq!(SourceFormat::from_path(Path::new("README")), None);
    }

    #[test]
    fn unsupported_extension_rejected() {
        let err = AnyLoader::for_path(Path::new("slides.pptx"), DEFAULT_MAX_FILE_SIZE).unwrap_err();
        assert!(matches!(err, DocumentError::UnsupportedFormat(_)));
    }

    #[test]
    fn loader_variant_matches_format() {
        let loader = AnyLoader::for_path(Path::new("x.tex"), 10).unwrap();
        assert!(matches!(loader, AnyLoader::Tex(_)));
    }

    #[tokio::test]
    async fn dispatches_to_text_loader() {
        let dir = tempfile::tempdir().unwrap();
        let file = dir.path().join("apunte.txt");
        std::fs::write(&file, "la distribución normal").unwrap();
        let loader = AnyLoader::for_path(&file, DEFAULT_MAX_FILE_SIZE).unwrap();
        assert_eq!(loader.load(&file).await.unwrap(), "la distribución normal");
    }
}
