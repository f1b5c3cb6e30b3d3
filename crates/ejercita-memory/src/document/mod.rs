pub mod classify;
pub mod directory;
pub mod error;
pub mod layout;
pub mod loader;
pub mod metadata;
pub mod splitter;
pub mod types;

pub use classify::{ChunkAnalysis, ContentProfile, analyze_chunks, classify};
pub use directory::{DirectoryLoader, FailedFile, LoadReport, SkippedFile};
pub use error::DocumentError;
pub use layout::{LayoutIssue, LayoutReport, Severity, validate_layout};
pub use loader::{AnyLoader, ContentLoader, SourceFormat, TexLoader, TextLoader};
pub use metadata::{extract_academic_metadata, extract_exam_info, extract_metadata};
pub use splitter::{SplitFailure, SplitReport, SplitterConfig, TextSplitter};
pub use types::{
    Chunk, ChunkMetadata, Difficulty, Document, DocumentMetadata, ExamInfo, ExamKind, Placement,
    UnitInfo,
};

#[cfg(feature = "pdf")]
pub use loader::PdfLoader;

/// Default maximum file size: 50 MiB.
pub const DEFAULT_MAX_FILE_SIZE: u64 = 50 * 1024 * 1024;
