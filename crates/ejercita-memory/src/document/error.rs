#[derive(Debug, thiserror::Error)]
pub enum DocumentError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("unsupported format: {0}")]
    UnsupportedFormat(String),

    #[error("file too large: {0} bytes")]
    FileTooLarge(u64),

    #[error("directory not found: {0}")]
    MissingDirectory(String),

    #[cfg(feature = "pdf")]
    #[error("PDF error: {0}")]
    Pdf(String),

    #[error("invalid splitter configuration: {0}")]
    InvalidSplitter(String),

    #[error("failed to split {path}: {reason}")]
    Split { path: String, reason: String },
}
