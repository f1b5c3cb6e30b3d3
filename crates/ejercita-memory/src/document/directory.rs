//! Walks a documents tree and loads every supported file with its metadata.

use std::path::{Path, PathBuf};

use super::loader::{AnyLoader, ContentLoader};
use super::metadata::extract_metadata;
use super::{DEFAULT_MAX_FILE_SIZE, Document, DocumentError};

/// A file that was intentionally not loaded.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SkippedFile {
    pub path: PathBuf,
    pub reason: String,
}

/// A file whose content could not be read.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FailedFile {
    pub path: PathBuf,
    pub error: String,
}

/// Outcome of a directory load. Skips and failures never abort the walk.
#[derive(Debug, Default)]
pub struct LoadReport {
    pub documents: Vec<Document>,
    pub files_found: usize,
    pub skipped: Vec<SkippedFile>,
    pub failed: Vec<FailedFile>,
}

#[derive(Debug, Clone, Copy)]
pub struct DirectoryLoader {
    pub max_file_size: u64,
}

impl Default for DirectoryLoader {
    fn default() -> Self {
        Self {
            max_file_size: DEFAULT_MAX_FILE_SIZE,
        }
    }
}

impl DirectoryLoader {
    #[must_use]
    pub fn new(max_file_size: u64) -> Self {
        Self { max_file_size }
    }

    /// Load every supported file under `root`, in path order. Hidden entries are ignored.
    ///
    /// # Errors
    ///
    /// Returns [`DocumentError::MissingDirectory`] if `root` is not a directory.
    /// Per-file problems are reported in the [`LoadReport`] instead.
    pub async fn load_directory(&self, root: &Path) -> Result<LoadReport, DocumentError> {
        if !tokio::fs::metadata(root)
            .await
            .is_ok_and(|m| m.is_dir())
        {
            return Err(DocumentError::MissingDirectory(root.display().to_string()));
        }

        let mut report = LoadReport::default();
        for path in walk_files(root) {
            report.files_found += 1;
            match self.load_file(&path).await {
                Ok(document) => {
                    tracing::debug!(
                        file = %path.display(),
                        chars = document.content.chars().count(),
                        "document loaded"
                    );
                    report.documents.push(document);
                }
                Err(e @ (DocumentError::UnsupportedFormat(_) | DocumentError::FileTooLarge(_))) => {
                    tracing::warn!(file = %path.display(), reason = %e, "file skipped");
                    report.skipped.push(SkippedFile {
                        path,
                        reason: e.to_string(),
                    });
                }
                Err(e) => {
                    tracing::warn!(file = %path.display(), error = %e, "failed to load file");
                    report.failed.push(FailedFile {
                        path,
                        error: e.to_string(),
                    });
                }
            }
        }

        tracing::info!(
            root = %root.display(),
            files_found = report.files_found,
            loaded = report.documents.len(),
            skipped = report.skipped.len(),
            failed = report.failed.len(),
            "directory load finished"
        );
        Ok(report)
    }

    /// Load a single file and attach its path-derived metadata.
    ///
    /// # Errors
    ///
    /// Returns an error if the format is unsupported, the file exceeds
    /// `max_file_size`, or its content cannot be read.
    pub async fn load_file(&self, path: &Path) -> Result<Document, DocumentError> {
        let loader = AnyLoader::for_path(path, self.max_file_size)?;
        let file_size = tokio::fs::metadata(path).await?.len();
        let content = loader.load(path).await?;
        Ok(Document {
            path: path.to_path_buf(),
            content,
            metadata: extract_metadata(path, file_size),
        })
    }
}

/// Regular files below `root`, hidden entries excluded, sorted by path.
pub(crate) fn walk_files(root: &Path) -> Vec<PathBuf> {
    ignore::WalkBuilder::new(root)
        .hidden(true)
        .git_ignore(false)
        .git_global(false)
        .git_exclude(false)
        .ignore(false)
        .parents(false)
        .sort_by_file_path(|a, b| a.cmp(b))
        .build()
        .filter_map(|entry| match entry {
            Ok(entry) => Some(entry),
            Err(e) => {
                tracing::warn!(error = %e, "walk error");
                None
            }
        })
        .filter(|e| e.file_type().is_some_and(|ft| ft.is_file()))
        .map(ignore::DirEntry::into_path)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::document::Placement;

    fn write(root: &Path, rel: &str, content: &str) {
        let path = root.join(rel);
        std::fs::create_dir_all(path.parent().unwrap()).unwrap();
        std::fs::write(path, content).unwrap();
    }

    #[tokio::test]
    async fn missing_root_is_error() {
        let dir = tempfile::tempdir().unwrap();
        let result = DirectoryLoader::default()
            .load_directory(&dir.path().join("nope"))
            .await;
        assert!(matches!(result, Err(DocumentError::MissingDirectory(_))));
    }

    #[tokio::test]
    async fn loads_supported_files_with_metadata() {
        let dir = tempfile::tempdir().unwrap();
        let docs = dir.path().join("docs");
        write(
            &docs,
            "Probabilidad_y_estadistica/Unidad_05_Test/apuntes/normal.txt",
            "la distribución normal",
        );
        write(
            &docs,
            "Probabilidad_y_estadistica/examenes/2023_Q1_2P_A.tex",
            "% encabezado\nEjercicio 1\n",
        );

        let report = DirectoryLoader::default()
            .load_directory(&docs)
            .await
            .unwrap();
        assert_eq!(report.files_found, 2);
        assert_eq!(report.documents.len(), 2);
        assert!(report.skipped.is_empty());
        assert!(report.failed.is_empty());

        let notes = &report.documents[0];
        assert_eq!(notes.metadata.materia, "Probabilidad y estadistica");
        assert_eq!(notes.metadata.unidad_numero(), Some(5));
        assert_eq!(notes.metadata.file_type, ".txt");
        assert_eq!(notes.metadata.file_size, "la distribución normal".len() as u64);

        let exam = &report.documents[1];
        assert_eq!(exam.content, "Ejercicio 1\n");
        assert_eq!(exam.metadata.tipo_documento, "examenes");
        assert!(matches!(exam.metadata.placement, Placement::Exam(_)));
    }

    #[tokio::test]
    async fn unsupported_and_hidden_files() {
        let dir = tempfile::tempdir().unwrap();
        let docs = dir.path().join("docs");
        write(&docs, "Algebra/apuntes/notas.txt", "vectores");
        write(&docs, "Algebra/apuntes/imagen.png", "png");
        write(&docs, "Algebra/apuntes/.oculto.txt", "secreto");
        write(&docs, ".cache/otro.txt", "cache");

        let report = DirectoryLoader::default()
            .load_directory(&docs)
            .await
            .unwrap();
        assert_eq!(report.files_found, 2);
        assert_eq!(report.documents.len(), 1);
        assert_eq!(report.skipped.len(), 1);
        assert!(report.skipped[0].path.ends_with("imagen.png"));
    }

    #[tokio::test]
    async fn oversized_file_is_skipped() {
        let dir = tempfile::tempdir().unwrap();
        let docs = dir.path().join("docs");
        write(&docs, "Algebra/apuntes/grande.txt", "0123456789");

        let report = DirectoryLoader::new(4).load_directory(&docs).await.unwrap();
        assert!(report.documents.is_empty());
        assert_eq!(report.skipped.len(), 1);
        assert!(report.skipped[0].reason.contains("too large"));
    }

    #[tokio::test]
    async fn unreadable_file_is_failed_not_fatal() {
        let dir = tempfile::tempdir().unwrap();
        let docs = dir.path().join("docs");
        write(&docs, "Algebra/apuntes/bien.txt", "matrices");
        let bad = docs.join("Algebra/apuntes/mal.txt");
        std::fs::write(&bad, [0xff, 0xfe, 0x00, 0xc3]).unwrap();

        let report = DirectoryLoader::default()
            .load_directory(&docs)
            .await
            .unwrap();
        assert_eq!(report.documents.len(), 1);
        assert_eq!(report.failed.len(), 1);
        assert!(report.failed[0].path.ends_with("mal.txt"));
    }

    #[test]
    fn walk_is_sorted() {
        let dir = tempfile::tempdir().unwrap();
        write(dir.path(), "b/2.txt", "");
        write(dir.path(), "a/1.txt", "");
        write(dir.path(), "a/0.txt", "");
        let files: Vec<_> = walk_files(dir.path())
            .into_iter()
            .map(|p| p.strip_prefix(dir.path()).unwrap().to_path_buf())
            .collect();
        assert_eq!(
            files,
            vec![
                PathBuf::from("a/0.txt"),
                PathBuf::from("a/1.txt"),
                PathBuf::from("b/2.txt"),
            ]
        );
    }
}
