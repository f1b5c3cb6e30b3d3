//! Recursive separator-based splitting with overlapping windows.
//!
//! Sizes and offsets are measured in characters, not bytes.

use std::collections::VecDeque;

use super::classify::classify;
use super::error::DocumentError;
use super::types::{Chunk, ChunkMetadata, Document};

/// Separators from coarsest to finest. The empty separator splits into characters.
pub const SEPARATORS: [&str; 5] = ["\n\n", "\n", ". ", " ", ""];

/// Share of replacement or control characters above which content is rejected.
const MAX_GARBAGE_RATIO: f64 = 0.3;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SplitterConfig {
    pub chunk_size: usize,
    pub chunk_overlap: usize,
}

impl Default for SplitterConfig {
    fn default() -> Self {
        Self {
            chunk_size: 1000,
            chunk_overlap: 200,
        }
    }
}

#[derive(Debug)]
pub struct SplitFailure {
    pub source: String,
    pub error: DocumentError,
}

/// Chunks from every document that split cleanly, plus the documents that did not.
#[derive(Debug, Default)]
pub struct SplitReport {
    pub chunks: Vec<Chunk>,
    pub failed: Vec<SplitFailure>,
}

#[derive(Debug, Clone)]
pub struct TextSplitter {
    config: SplitterConfig,
}

fn char_len(text: &str) -> usize {
    text.chars().count()
}

impl TextSplitter {
    /// # Errors
    ///
    /// Returns [`DocumentError::InvalidSplitter`] if `chunk_size` is zero or
    /// `chunk_overlap` is not smaller than `chunk_size`.
    pub fn new(config: SplitterConfig) -> Result<Self, DocumentError> {
        if config.chunk_size == 0 {
            return Err(DocumentError::InvalidSplitter(
                "chunk_size must be positive".into(),
            ));
        }
        if config.chunk_overlap >= config.chunk_size {
            return Err(DocumentError::InvalidSplitter(format!(
                "chunk_overlap ({}) must be smaller than chunk_size ({})",
                config.chunk_overlap, config.chunk_size
            )));
        }
        Ok(Self { config })
    }

    #[must_use]
    pub fn config(&self) -> SplitterConfig {
        self.config
    }

    /// Split raw text into trimmed, non-empty pieces of at most `chunk_size` characters.
    #[must_use]
    pub fn split_text(&self, text: &str) -> Vec<String> {
        self.split_recursive(text, &SEPARATORS)
    }

    fn split_recursive(&self, text: &str, separators: &[&str]) -> Vec<String> {
        let (separator, finer) = pick_separator(text, separators);
        let mut chunks = Vec::new();
        let mut pending: Vec<&str> = Vec::new();

        for piece in split_keep_separator(text, separator) {
            if char_len(piece) < self.config.chunk_size {
                pending.push(piece);
                continue;
            }
            if !pending.is_empty() {
                chunks.extend(self.merge(&pending));
                pending.clear();
            }
            if finer.is_empty() {
                let trimmed = piece.trim();
                if !trimmed.is_empty() {
                    chunks.push(trimmed.to_owned());
                }
            } else {
                chunks.extend(self.split_recursive(piece, finer));
            }
        }

        if !pending.is_empty() {
            chunks.extend(self.merge(&pending));
        }
        chunks
    }

    /// Greedily pack pieces into windows, carrying at most `chunk_overlap`
    /// characters of trailing pieces into the next window.
    fn merge(&self, pieces: &[&str]) -> Vec<String> {
        let SplitterConfig {
            chunk_size,
            chunk_overlap,
        } = self.config;
        let mut out = Vec::new();
        let mut window: VecDeque<(&str, usize)> = VecDeque::new();
        let mut total = 0usize;

        for &piece in pieces {
            let len = char_len(piece);
            if total + len > chunk_size && !window.is_empty() {
                push_window(&mut out, &window);
                while total > chunk_overlap || (total > 0 && total + len > chunk_size) {
                    let Some((_, front_len)) = window.pop_front() else {
                        break;
                    };
                    total -= front_len;
                }
            }
            window.push_back((piece, len));
            total += len;
        }

        push_window(&mut out, &window);
        out
    }

    /// Split one document into annotated chunks inheriting its metadata.
    ///
    /// # Errors
    ///
    /// Returns [`DocumentError::Split`] if the content is mostly undecodable or a
    /// chunk cannot be located in the parent text.
    pub fn split_document(&self, document: &Document) -> Result<Vec<Chunk>, DocumentError> {
        let text = document.content.as_str();
        check_decodable(text).map_err(|reason| DocumentError::Split {
            path: document.metadata.source.clone(),
            reason,
        })?;

        let pieces = self.split_text(text);
        let mut locator = OffsetLocator::new(text, self.config.chunk_overlap);
        let mut chunks = Vec::with_capacity(pieces.len());

        for (chunk_index, content) in pieces.into_iter().enumerate() {
            let start_index = locator.locate(&content).ok_or_else(|| DocumentError::Split {
                path: document.metadata.source.clone(),
                reason: format!("chunk {chunk_index} not found in parent content"),
            })?;
            let profile = classify(&content);
            chunks.push(Chunk {
                metadata: document.metadata.clone(),
                chunk: ChunkMetadata {
                    chunk_index,
                    chunk_length: char_len(&content),
                    start_index,
                    contains_math: profile.contains_math,
                    contains_definitions: profile.contains_definitions,
                    contains_exercises: profile.contains_exercises,
                    difficulty_hint: profile.difficulty_hint,
                },
                content,
            });
        }

        Ok(chunks)
    }

    /// Split every document; a failing document is logged and skipped.
    #[must_use]
    pub fn split_documents(&self, documents: &[Document]) -> SplitReport {
        let mut report = SplitReport::default();
        for document in documents {
            match self.split_document(document) {
                Ok(chunks) => {
                    tracing::debug!(
                        source = %document.metadata.source,
                        chunks = chunks.len(),
                        "document split"
                    );
                    report.chunks.extend(chunks);
                }
                Err(error) => {
                    tracing::warn!(
                        source = %document.metadata.source,
                        %error,
                        "skipping document that failed to split"
                    );
                    report.failed.push(SplitFailure {
                        source: document.metadata.source.clone(),
                        error,
                    });
                }
            }
        }
        tracing::info!(
            documents = documents.len(),
            chunks = report.chunks.len(),
            failed = report.failed.len(),
            "splitting complete"
        );
        report
    }
}

fn pick_separator<'s>(text: &str, separators: &'s [&'s str]) -> (&'s str, &'s [&'s str]) {
    for (i, separator) in separators.iter().enumerate() {
        if separator.is_empty() {
            return ("", &[]);
        }
        if text.contains(separator) {
            return (separator, &separators[i + 1..]);
        }
    }
    ("", &[])
}

/// Split on `separator`, attaching each separator to the start of the following piece.
fn split_keep_separator<'t>(text: &'t str, separator: &str) -> Vec<&'t str> {
    if separator.is_empty() {
        return text
            .char_indices()
            .map(|(i, c)| &text[i..i + c.len_utf8()])
            .collect();
    }

    let mut pieces = Vec::new();
    let mut start = 0;
    for (idx, _) in text.match_indices(separator) {
        if idx > start {
            pieces.push(&text[start..idx]);
        }
        start = idx;
    }
    if start < text.len() {
        pieces.push(&text[start..]);
    }
    pieces
}

fn push_window(out: &mut Vec<String>, window: &VecDeque<(&str, usize)>) {
    let joined: String = window.iter().map(|(piece, _)| *piece).collect();
    let trimmed = joined.trim();
    if !trimmed.is_empty() {
        out.push(trimmed.to_owned());
    }
}

fn check_decodable(text: &str) -> Result<(), String> {
    let total = char_len(text);
    if total == 0 {
        return Ok(());
    }
    let garbage = text
        .chars()
        .filter(|c| *c == char::REPLACEMENT_CHARACTER || (c.is_control() && !c.is_whitespace()))
        .count();
    #[expect(clippy::cast_precision_loss)]
    let ratio = garbage as f64 / total as f64;
    if ratio > MAX_GARBAGE_RATIO {
        return Err(format!(
            "{:.0}% of the content is undecodable",
            ratio * 100.0
        ));
    }
    Ok(())
}

/// Finds successive chunks in the parent text, searching from just before the end
/// of the previous chunk so overlapping windows resolve to their own occurrence.
struct OffsetLocator<'t> {
    text: &'t str,
    overlap: usize,
    last_byte: Option<usize>,
    last_len_bytes: usize,
    cursor: (usize, usize),
}

impl<'t> OffsetLocator<'t> {
    fn new(text: &'t str, overlap: usize) -> Self {
        Self {
            text,
            overlap,
            last_byte: None,
            last_len_bytes: 0,
            cursor: (0, 0),
        }
    }

    fn search_start(&self) -> usize {
        let Some(last) = self.last_byte else {
            return 0;
        };
        let end = (last + self.last_len_bytes).min(self.text.len());
        if self.overlap == 0 {
            return end;
        }
        self.text[..end]
            .char_indices()
            .rev()
            .nth(self.overlap - 1)
            .map_or(0, |(i, _)| i)
    }

    fn char_index(&mut self, byte: usize) -> usize {
        let (cursor_byte, cursor_char) = self.cursor;
        let chars = if byte >= cursor_byte {
            cursor_char + char_len(&self.text[cursor_byte..byte])
        } else {
            char_len(&self.text[..byte])
        };
        self.cursor = (byte, chars);
        chars
    }

    /// Character offset of `chunk`, or `None` if it does not occur in the text.
    fn locate(&mut self, chunk: &str) -> Option<usize> {
        let from = self.search_start();
        let byte = self.text[from..]
            .find(chunk)
            .map(|i| i + from)
            .or_else(|| self.text.find(chunk))?;
        self.last_byte = Some(byte);
        self.last_len_bytes = chunk.len();
        Some(self.char_index(byte))
    }
}

#[cfg(test)]
mod tests {
    use std::path::PathBuf;

    use super::*;
    use crate::document::types::{DocumentMetadata, Placement};

    fn make_doc(content: &str) -> Document {
        Document {
            path: PathBuf::from("docs/SIA/apuntes/test.txt"),
            content: content.to_owned(),
            metadata: DocumentMetadata {
                source: "docs/SIA/apuntes/test.txt".into(),
                filename: "test.txt".into(),
                file_type: ".txt".into(),
                file_size: content.len() as u64,
                parent_dir: "apuntes".into(),
                materia: "SIA".into(),
                tipo_documento: "apuntes".into(),
                nivel_sugerido: None,
                placement: Placement::General,
            },
        }
    }

    fn splitter(chunk_size: usize, chunk_overlap: usize) -> TextSplitter {
        TextSplitter::new(SplitterConfig {
            chunk_size,
            chunk_overlap,
        })
        .unwrap()
    }

    fn char_slice(text: &str, start: usize, len: usize) -> String {
        text.chars().skip(start).take(len).collect()
    }

    #[test]
    fn rejects_overlap_not_smaller_than_size() {
        let err = TextSplitter::new(SplitterConfig {
            chunk_size: 100,
            chunk_overlap: 100,
        })
        .unwrap_err();
        assert!(matches!(err, DocumentError::InvalidSplitter(_)));
        assert!(
            TextSplitter::new(SplitterConfig {
                chunk_size: 0,
                chunk_overlap: 0,
            })
            .is_err()
        );
    }

    #[test]
    fn short_text_single_chunk() {
        let chunks = splitter(1000, 200)
            .split_document(&make_doc("La media es un estimador."))
            .unwrap();
        assert_eq!(chunks.len(), 1);
        assert_eq!(chunks[0].content, "La media es un estimador.");
        assert_eq!(chunks[0].chunk.chunk_index, 0);
        assert_eq!(chunks[0].chunk.start_index, 0);
    }

    #[test]
    fn empty_content_yields_no_chunks() {
        let chunks = splitter(100, 10).split_document(&make_doc("")).unwrap();
        assert!(chunks.is_empty());
    }

    #[test]
    fn paragraphs_preferred_over_finer_separators() {
        let text = "Primer párrafo corto.\n\nSegundo párrafo corto.";
        let pieces = splitter(30, 0).split_text(text);
        assert_eq!(pieces, vec!["Primer párrafo corto.", "Segundo párrafo corto."]);
    }

    #[test]
    fn long_paragraph_descends_to_words() {
        let text = "uno dos tres cuatro cinco seis siete ocho nueve diez";
        let pieces = splitter(15, 0).split_text(text);
        assert!(pieces.len() > 1);
        assert!(pieces.iter().all(|p| p.chars().count() <= 15));
        assert_eq!(pieces.join(" "), text);
    }

    #[test]
    fn consecutive_chunks_share_overlap() {
        let text = "alfa beta gama delta epsilon zeta eta theta iota kappa lambda";
        let pieces = splitter(20, 10).split_text(text);
        assert!(pieces.len() > 2);
        for pair in pieces.windows(2) {
            let last_word = pair[0].split_whitespace().last().unwrap();
            assert!(pair[1].contains(last_word), "{pair:?}");
        }
    }

    #[test]
    fn start_index_points_into_parent() {
        let text = "Definición de varianza.\n\nEjercicio: calcular la varianza de 2 + 3.\n\nTeorema final con demostración extensa.";
        let doc = make_doc(text);
        let chunks = splitter(45, 10).split_document(&doc).unwrap();
        assert!(chunks.len() >= 3);
        for chunk in &chunks {
            assert_eq!(
                char_slice(text, chunk.chunk.start_index, chunk.chunk.chunk_length),
                chunk.content
            );
        }
    }

    #[test]
    fn chunks_are_annotated() {
        let text = "Definición: llamamos varianza a E[(X - m)^2].\n\nEjercicio 1: calcular 2 + 3.";
        let chunks = splitter(60, 0).split_document(&make_doc(text)).unwrap();
        assert_eq!(chunks.len(), 2);
        assert!(chunks[0].chunk.contains_definitions);
        assert!(chunks[1].chunk.contains_exercises);
        assert!(chunks[1].chunk.contains_math);
    }

    #[test]
    fn undecodable_document_fails() {
        let text = "\u{FFFD}\u{FFFD}\u{FFFD}\u{0001}ab";
        let err = splitter(100, 0).split_document(&make_doc(text)).unwrap_err();
        assert!(matches!(err, DocumentError::Split { .. }));
    }

    #[test]
    fn failing_document_skipped_in_batch() {
        let docs = vec![
            make_doc("\u{FFFD}\u{FFFD}\u{FFFD}"),
            make_doc("contenido válido"),
        ];
        let report = splitter(100, 0).split_documents(&docs);
        assert_eq!(report.failed.len(), 1);
        assert_eq!(report.chunks.len(), 1);
        assert_eq!(report.chunks[0].content, "contenido válido");
    }

    #[test]
    fn separator_attached_to_following_piece() {
        assert_eq!(split_keep_separator("a. b. c", ". "), vec!["a", ". b", ". c"]);
        assert_eq!(split_keep_separator("\n\nx", "\n\n"), vec!["\n\nx"]);
        assert_eq!(split_keep_separator("añb", ""), vec!["a", "ñ", "b"]);
    }

    mod proptest_splitter {
        use super::*;
        use proptest::prelude::*;

        proptest! {
            #![proptest_config(ProptestConfig::with_cases(200))]

            #[test]
            fn splitting_is_deterministic(
                content in "[a-zñáé .\n]{0,600}",
                chunk_size in 2usize..120,
                overlap_pct in 0usize..90,
            ) {
                let overlap = chunk_size * overlap_pct / 100;
                let s = splitter(chunk_size, overlap);
                let doc = make_doc(&content);
                prop_assert_eq!(s.split_document(&doc).unwrap(), s.split_document(&doc).unwrap());
            }

            #[test]
            fn chunks_inherit_document_metadata(
                content in "[a-z .\n]{1,400}",
                chunk_size in 2usize..80,
            ) {
                let doc = make_doc(&content);
                let chunks = splitter(chunk_size, chunk_size / 4).split_document(&doc).unwrap();
                for (i, chunk) in chunks.iter().enumerate() {
                    prop_assert_eq!(&chunk.metadata, &doc.metadata);
                    prop_assert_eq!(chunk.chunk.chunk_index, i);
                }
            }

            #[test]
            fn chunks_respect_size_and_offsets(
                content in "[a-zé ,.\n]{1,500}",
                chunk_size in 2usize..100,
            ) {
                let doc = make_doc(&content);
                let chunks = splitter(chunk_size, chunk_size / 3).split_document(&doc).unwrap();
                for chunk in &chunks {
                    prop_assert!(chunk.chunk.chunk_length <= chunk_size);
                    prop_assert!(!chunk.content.is_empty());
                    prop_assert_eq!(
                        char_slice(&content, chunk.chunk.start_index, chunk.chunk.chunk_length),
                        chunk.content.clone()
                    );
                }
            }
        }
    }
}
