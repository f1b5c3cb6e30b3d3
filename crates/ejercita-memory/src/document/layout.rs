//! Checks a documents tree against the `<materia>/[Unidad_NN_tema/]<tipo>/<file>` convention.

use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use std::path::{Component, Path, PathBuf};
use std::sync::LazyLock;

use regex::Regex;

use super::DocumentError;
use super::directory::walk_files;
use super::metadata::is_unit_folder;

static STANDARD_UNIT_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[Uu]nidad[_\s]?\d+[_\s]?.+").unwrap());

const STANDARD_TYPES: [&str; 10] = [
    "apuntes",
    "ejercicios",
    "guias",
    "examenes",
    "parciales",
    "finales",
    "practicas",
    "teoria",
    "laboratorio",
    "proyectos",
];

const USUAL_EXTENSIONS: [&str; 4] = ["pdf", "txt", "tex", "md"];

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum Severity {
    Error,
    Warning,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LayoutIssue {
    SubjectWithSpaces(String),
    NonStandardUnit(String),
    NonStandardType(String),
    NoHierarchy(PathBuf),
    UnusualExtension(PathBuf),
}

impl LayoutIssue {
    #[must_use]
    pub fn severity(&self) -> Severity {
        match self {
            Self::SubjectWithSpaces(_) => Severity::Error,
            _ => Severity::Warning,
        }
    }
}

impl fmt::Display for LayoutIssue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::SubjectWithSpaces(s) => write!(f, "subject folder with spaces: {s} (use underscores)"),
            Self::NonStandardUnit(u) => write!(f, "non-standard unit folder: {u}"),
            Self::NonStandardType(t) => write!(f, "non-standard document type folder: {t}"),
            Self::NoHierarchy(p) => write!(f, "file without hierarchy: {}", p.display()),
            Self::UnusualExtension(p) => write!(f, "unusual extension: {}", p.display()),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct LayoutReport {
    pub subjects: BTreeSet<String>,
    pub units: BTreeSet<String>,
    pub document_types: BTreeSet<String>,
    pub total_files: usize,
    pub files_per_subject: BTreeMap<String, usize>,
    pub files_per_type: BTreeMap<String, usize>,
    /// Number of files by directory depth below the root.
    pub files_per_depth: BTreeMap<usize, usize>,
    /// Files placed under subject, unit and type folders.
    pub full_structure_files: usize,
    pub issues: Vec<LayoutIssue>,
}

impl LayoutReport {
    #[must_use]
    pub fn is_valid(&self) -> bool {
        self.errors().next().is_none()
    }

    pub fn errors(&self) -> impl Iterator<Item = &LayoutIssue> {
        self.issues
            .iter()
            .filter(|i| i.severity() == Severity::Error)
    }

    pub fn warnings(&self) -> impl Iterator<Item = &LayoutIssue> {
        self.issues
            .iter()
            .filter(|i| i.severity() == Severity::Warning)
    }

    /// Percentage of files with the full three-level structure.
    #[must_use]
    pub fn coverage(&self) -> Option<f64> {
        if self.total_files == 0 {
            return None;
        }
        #[expect(clippy::cast_precision_loss)]
        let ratio = self.full_structure_files as f64 / self.total_files as f64;
        Some(ratio * 100.0)
    }

    fn push_issue(&mut self, issue: LayoutIssue) {
        if !self.issues.contains(&issue) {
            self.issues.push(issue);
        }
    }

    fn record_type(&mut self, folder: &str) {
        self.document_types.insert(folder.to_owned());
        *self.files_per_type.entry(folder.to_owned()).or_default() += 1;
        if !is_standard_type(folder) {
            self.push_issue(LayoutIssue::NonStandardType(folder.to_owned()));
        }
    }

    fn record(&mut self, relative: &Path) {
        self.total_files += 1;

        let dirs: Vec<String> = relative
            .parent()
            .map(|p| {
                p.components()
                    .filter_map(|c| match c {
                        Component::Normal(s) => Some(s.to_string_lossy().into_owned()),
                        _ => None,
                    })
                    .collect()
            })
            .unwrap_or_default();
        *self.files_per_depth.entry(dirs.len()).or_default() += 1;

        match dirs.as_slice() {
            [] => self.push_issue(LayoutIssue::NoHierarchy(relative.to_path_buf())),
            [subject, rest @ ..] => {
                self.subjects.insert(subject.clone());
                *self.files_per_subject.entry(subject.clone()).or_default() += 1;
                if subject.contains(' ') {
                    self.push_issue(LayoutIssue::SubjectWithSpaces(subject.clone()));
                }

                match rest {
                    [] => {}
                    [second, rest @ ..] if is_unit_folder(second) => {
                        self.units.insert(second.clone());
                        if !STANDARD_UNIT_RE.is_match(second) {
                            self.push_issue(LayoutIssue::NonStandardUnit(second.clone()));
                        }
                        if let Some(tipo) = rest.first() {
                            self.full_structure_files += 1;
                            self.record_type(tipo);
                        }
                    }
                    [tipo, ..] => self.record_type(tipo),
                }
            }
        }

        let usual = relative
            .extension()
            .and_then(|e| e.to_str())
            .is_some_and(|e| USUAL_EXTENSIONS.contains(&e.to_ascii_lowercase().as_str()));
        if !usual {
            self.push_issue(LayoutIssue::UnusualExtension(relative.to_path_buf()));
        }
    }
}

fn is_standard_type(folder: &str) -> bool {
    STANDARD_TYPES.contains(&folder.to_lowercase().as_str())
}

/// Walk `root` and report how well it follows the folder convention.
///
/// Hidden files and folders are ignored.
///
/// # Errors
///
/// Returns [`DocumentError::MissingDirectory`] if `root` is not a directory.
pub fn validate_layout(root: &Path) -> Result<LayoutReport, DocumentError> {
    if !root.is_dir() {
        return Err(DocumentError::MissingDirectory(root.display().to_string()));
    }

    let mut report = LayoutReport::default();
    for path in walk_files(root) {
        let relative = path.strip_prefix(root).unwrap_or(&path);
        report.record(relative);
    }

    tracing::info!(
        root = %root.display(),
        files = report.total_files,
        subjects = report.subjects.len(),
        errors = report.errors().count(),
        warnings = report.warnings().count(),
        "layout validated"
    );
    Ok(report)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn touch(root: &Path, rel: &str) {
        let path = root.join(rel);
        std::fs::create_dir_all(path.parent().unwrap()).unwrap();
        std::fs::write(path, "x").unwrap();
    }

    #[test]
    fn missing_root() {
        let dir = tempfile::tempdir().unwrap();
        assert!(matches!(
            validate_layout(&dir.path().join("nada")),
            Err(DocumentError::MissingDirectory(_))
        ));
    }

    #[test]
    fn conventional_tree_is_valid() {
        let dir = tempfile::tempdir().unwrap();
        touch(dir.path(), "Probabilidad/Unidad_01_Intro/apuntes/a.pdf");
        touch(dir.path(), "Probabilidad/Unidad_02_Variables/ejercicios/b.txt");
        touch(dir.path(), "Probabilidad/examenes/2023_Q1_1P.pdf");

        let report = validate_layout(dir.path()).unwrap();
        assert!(report.is_valid());
        assert!(report.issues.is_empty(), "{:?}", report.issues);
        assert_eq!(report.total_files, 3);
        assert_eq!(report.subjects.len(), 1);
        assert_eq!(report.units.len(), 2);
        assert_eq!(report.files_per_subject["Probabilidad"], 3);
        assert_eq!(report.files_per_type["examenes"], 1);
        assert_eq!(report.files_per_depth[&3], 2);
        assert_eq!(report.files_per_depth[&2], 1);
        assert_eq!(report.full_structure_files, 2);
        let coverage = report.coverage().unwrap();
        assert!((coverage - 200.0 / 3.0).abs() < 1e-9);
    }

    #[test]
    fn subject_with_spaces_is_error() {
        let dir = tempfile::tempdir().unwrap();
        touch(dir.path(), "Analisis Matematico/apuntes/a.pdf");

        let report = validate_layout(dir.path()).unwrap();
        assert!(!report.is_valid());
        assert_eq!(
            report.errors().collect::<Vec<_>>(),
            vec![&LayoutIssue::SubjectWithSpaces("Analisis Matematico".into())]
        );
    }

    #[test]
    fn warnings_do_not_invalidate() {
        let dir = tempfile::tempdir().unwrap();
        touch(dir.path(), "suelto.pdf");
        touch(dir.path(), "Algebra/Tema_03/resumenes/a.pdf");
        touch(dir.path(), "Algebra/Tema_03/resumenes/b.docx");

        let report = validate_layout(dir.path()).unwrap();
        assert!(report.is_valid());
        let warnings: Vec<_> = report.warnings().cloned().collect();
        assert!(warnings.contains(&LayoutIssue::NoHierarchy("suelto.pdf".into())));
        assert!(warnings.contains(&LayoutIssue::NonStandardUnit("Tema_03".into())));
        assert!(warnings.contains(&LayoutIssue::NonStandardType("resumenes".into())));
        assert!(warnings.contains(&LayoutIssue::UnusualExtension(
            "Algebra/Tema_03/resumenes/b.docx".into()
        )));
        assert_eq!(
            warnings
                .iter()
                .filter(|w| matches!(w, LayoutIssue::NonStandardType(_)))
                .count(),
            1
        );
    }

    #[test]
    fn hidden_entries_ignored() {
        let dir = tempfile::tempdir().unwrap();
        touch(dir.path(), "Algebra/apuntes/.DS_Store");
        touch(dir.path(), ".git/config");

        let report = validate_layout(dir.path()).unwrap();
        assert_eq!(report.total_files, 0);
        assert!(report.coverage().is_none());
    }

    #[test]
    fn markdown_is_usual_extension() {
        let dir = tempfile::tempdir().unwrap();
        touch(dir.path(), "Algebra/apuntes/README.md");
        let report = validate_layout(dir.path()).unwrap();
        assert!(report.issues.is_empty());
    }
}
