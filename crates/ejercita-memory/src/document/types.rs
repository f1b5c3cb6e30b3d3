use std::collections::HashMap;
use std::fmt;
use std::path::PathBuf;

use serde::{Deserialize, Serialize};

/// Difficulty label shared by document-level suggestions and chunk-level hints.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Difficulty {
    Introductorio,
    Intermedio,
    Avanzado,
}

impl Difficulty {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Introductorio => "introductorio",
            Self::Intermedio => "intermedio",
            Self::Avanzado => "avanzado",
        }
    }
}

impl fmt::Display for Difficulty {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExamKind {
    Recuperatorio,
    Final,
    PrimerParcial,
    SegundoParcial,
}

impl ExamKind {
    #[must_use]
    pub fn parcial(number: u8) -> Self {
        if number == 2 {
            Self::SegundoParcial
        } else {
            Self::PrimerParcial
        }
    }

    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Recuperatorio => "recuperatorio",
            Self::Final => "final",
            Self::PrimerParcial => "primer_parcial",
            Self::SegundoParcial => "segundo_parcial",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct UnitInfo {
    pub number: Option<u32>,
    pub topic: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExamInfo {
    pub year: Option<u16>,
    pub term: Option<u8>,
    pub kind: ExamKind,
    /// Exam variant marker such as `A` or `2`.
    pub variant: Option<String>,
}

/// Where a document sits in the course structure.
///
/// Unit and exam information are mutually exclusive.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum Placement {
    #[default]
    General,
    Unit(UnitInfo),
    Exam(ExamInfo),
}

#[derive(Debug, thiserror::Error)]
pub enum MetadataError {
    #[error("document carries both unit and exam fields")]
    UnitAndExam,
    #[error("exam fields present without tipo_examen")]
    IncompleteExam,
}

/// Metadata attached to a loaded document and inherited by each of its chunks.
///
/// Serializes to a flat record with the keys `source`, `filename`, `file_type`,
/// `file_size`, `parent_dir`, `materia`, `tipo_documento` and, when present,
/// `nivel_sugerido`, `unidad_numero`, `unidad_tema`, `año`, `cuatrimestre`,
/// `tipo_examen`, `tema`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(into = "MetadataRecord", try_from = "MetadataRecord")]
pub struct DocumentMetadata {
    pub source: String,
    pub filename: String,
    pub file_type: String,
    pub file_size: u64,
    pub parent_dir: String,
    pub materia: String,
    pub tipo_documento: String,
    pub nivel_sugerido: Option<Difficulty>,
    pub placement: Placement,
}

impl DocumentMetadata {
    #[must_use]
    pub fn unit(&self) -> Option<&UnitInfo> {
        match &self.placement {
            Placement::Unit(unit) => Some(unit),
            _ => None,
        }
    }

    #[must_use]
    pub fn exam(&self) -> Option<&ExamInfo> {
        match &self.placement {
            Placement::Exam(exam) => Some(exam),
            _ => None,
        }
    }

    #[must_use]
    pub fn unidad_numero(&self) -> Option<u32> {
        self.unit().and_then(|u| u.number)
    }

    #[must_use]
    pub fn unidad_tema(&self) -> Option<&str> {
        self.unit().and_then(|u| u.topic.as_deref())
    }

    /// Flatten into a JSON object keyed by metadata field names.
    ///
    /// # Errors
    ///
    /// Returns an error if serialization fails.
    pub fn to_payload(&self) -> Result<HashMap<String, serde_json::Value>, serde_json::Error> {
        match serde_json::to_value(self)? {
            serde_json::Value::Object(map) => Ok(map.into_iter().collect()),
            other => Err(serde::ser::Error::custom(format!(
                "metadata serialized to non-object {other}"
            ))),
        }
    }
}

#[derive(Serialize, Deserialize)]
struct MetadataRecord {
    source: String,
    filename: String,
    file_type: String,
    file_size: u64,
    parent_dir: String,
    materia: String,
    tipo_documento: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    nivel_sugerido: Option<Difficulty>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    unidad_numero: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    unidad_tema: Option<String>,
    #[serde(rename = "año", default, skip_serializing_if = "Option::is_none")]
    anio: Option<u16>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    cuatrimestre: Option<u8>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    tipo_examen: Option<ExamKind>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    tema: Option<String>,
}

impl From<DocumentMetadata> for MetadataRecord {
    fn from(meta: DocumentMetadata) -> Self {
        let mut record = Self {
            source: meta.source,
            filename: meta.filename,
            file_type: meta.file_type,
            file_size: meta.file_size,
            parent_dir: meta.parent_dir,
            materia: meta.materia,
            tipo_documento: meta.tipo_documento,
            nivel_sugerido: meta.nivel_sugerido,
            unidad_numero: None,
            unidad_tema: None,
            anio: None,
            cuatrimestre: None,
            tipo_examen: None,
            tema: None,
        };
        match meta.placement {
            Placement::General => {}
            Placement::Unit(unit) => {
                record.unidad_numero = unit.number;
                record.unidad_tema = unit.topic;
            }
            Placement::Exam(exam) => {
                record.anio = exam.year;
                record.cuatrimestre = exam.term;
                record.tipo_examen = Some(exam.kind);
                record.tema = exam.variant;
            }
        }
        record
    }
}

impl TryFrom<MetadataRecord> for DocumentMetadata {
    type Error = MetadataError;

    fn try_from(record: MetadataRecord) -> Result<Self, Self::Error> {
        let has_unit = record.unidad_numero.is_some() || record.unidad_tema.is_some();
        let has_exam_detail =
            record.anio.is_some() || record.cuatrimestre.is_some() || record.tema.is_some();

        let placement = match record.tipo_examen {
            Some(_) if has_unit => return Err(MetadataError::UnitAndExam),
            Some(kind) => Placement::Exam(ExamInfo {
                year: record.anio,
                term: record.cuatrimestre,
                kind,
                variant: record.tema,
            }),
            None if has_exam_detail => return Err(MetadataError::IncompleteExam),
            None if has_unit => Placement::Unit(UnitInfo {
                number: record.unidad_numero,
                topic: record.unidad_tema,
            }),
            None => Placement::General,
        };

        Ok(Self {
            source: record.source,
            filename: record.filename,
            file_type: record.file_type,
            file_size: record.file_size,
            parent_dir: record.parent_dir,
            materia: record.materia,
            tipo_documento: record.tipo_documento,
            nivel_sugerido: record.nivel_sugerido,
            placement,
        })
    }
}

#[derive(Debug, Clone)]
pub struct Document {
    pub path: PathBuf,
    pub content: String,
    pub metadata: DocumentMetadata,
}

/// Chunk-specific annotations added on top of the inherited document metadata.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChunkMetadata {
    pub chunk_index: usize,
    pub chunk_length: usize,
    /// Character offset of the chunk inside the parent document content.
    pub start_index: usize,
    pub contains_math: bool,
    pub contains_definitions: bool,
    pub contains_exercises: bool,
    pub difficulty_hint: Difficulty,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Chunk {
    pub content: String,
    pub metadata: DocumentMetadata,
    pub chunk: ChunkMetadata,
}

impl Chunk {
    /// Document metadata and chunk annotations merged into one flat object.
    ///
    /// # Errors
    ///
    /// Returns an error if serialization fails.
    pub fn payload(&self) -> Result<HashMap<String, serde_json::Value>, serde_json::Error> {
        let mut payload = self.metadata.to_payload()?;
        if let serde_json::Value::Object(chunk) = serde_json::to_value(&self.chunk)? {
            payload.extend(chunk);
        }
        Ok(payload)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_metadata(placement: Placement) -> DocumentMetadata {
        DocumentMetadata {
            source: "docs/SIA/Unidad_01_Clustering/apuntes/kmeans.pdf".into(),
            filename: "kmeans.pdf".into(),
            file_type: ".pdf".into(),
            file_size: 2048,
            parent_dir: "apuntes".into(),
            materia: "SIA".into(),
            tipo_documento: "apuntes".into(),
            nivel_sugerido: None,
            placement,
        }
    }

    #[test]
    fn unit_placement_serializes_unit_fields_only() {
        let meta = sample_metadata(Placement::Unit(UnitInfo {
            number: Some(1),
            topic: Some("Clustering".into()),
        }));
        let payload = meta.to_payload().unwrap();
        assert_eq!(payload["unidad_numero"], 1);
        assert_eq!(payload["unidad_tema"], "Clustering");
        assert!(!payload.contains_key("tipo_examen"));
        assert!(!payload.contains_key("año"));
    }

    #[test]
    fn exam_placement_uses_spanish_keys() {
        let meta = sample_metadata(Placement::Exam(ExamInfo {
            year: Some(2023),
            term: Some(1),
            kind: ExamKind::SegundoParcial,
            variant: Some("A".into()),
        }));
        let payload = meta.to_payload().unwrap();
        assert_eq!(payload["año"], 2023);
        assert_eq!(payload["cuatrimestre"], 1);
        assert_eq!(payload["tipo_examen"], "segundo_parcial");
        assert_eq!(payload["tema"], "A");
        assert!(!payload.contains_key("unidad_numero"));
    }

    #[test]
    fn payload_parses_back() {
        let meta = sample_metadata(Placement::Exam(ExamInfo {
            year: None,
            term: None,
            kind: ExamKind::Final,
            variant: None,
        }));
        let value = serde_json::to_value(&meta).unwrap();
        let parsed: DocumentMetadata = serde_json::from_value(value).unwrap();
        assert_eq!(parsed, meta);
    }

    #[test]
    fn unit_and_exam_fields_rejected() {
        let value = serde_json::json!({
            "source": "s", "filename": "f", "file_type": ".pdf", "file_size": 1,
            "parent_dir": "p", "materia": "m", "tipo_documento": "examenes",
            "unidad_numero": 3, "tipo_examen": "final"
        });
        assert!(serde_json::from_value::<DocumentMetadata>(value).is_err());
    }

    #[test]
    fn exam_detail_without_kind_rejected() {
        let value = serde_json::json!({
            "source": "s", "filename": "f", "file_type": ".pdf", "file_size": 1,
            "parent_dir": "p", "materia": "m", "tipo_documento": "examenes",
            "año": 2022
        });
        assert!(serde_json::from_value::<DocumentMetadata>(value).is_err());
    }

    #[test]
    fn unknown_keys_ignored_on_parse() {
        let value = serde_json::json!({
            "source": "s", "filename": "f", "file_type": ".txt", "file_size": 1,
            "parent_dir": "p", "materia": "m", "tipo_documento": "apuntes",
            "chunk_index": 4, "content": "texto"
        });
        let meta: DocumentMetadata = serde_json::from_value(value).unwrap();
        assert_eq!(meta.placement, Placement::General);
    }

    #[test]
    fn chunk_payload_merges_annotations() {
        let chunk = Chunk {
            content: "x = 3".into(),
            metadata: sample_metadata(Placement::General),
            chunk: ChunkMetadata {
                chunk_index: 2,
                chunk_length: 5,
                start_index: 40,
                contains_math: true,
                contains_definitions: false,
                contains_exercises: false,
                difficulty_hint: Difficulty::Intermedio,
            },
        };
        let payload = chunk.payload().unwrap();
        assert_eq!(payload["chunk_index"], 2);
        assert_eq!(payload["difficulty_hint"], "intermedio");
        assert_eq!(payload["materia"], "SIA");
    }

    #[test]
    fn exam_kind_parcial_numbers() {
        assert_eq!(ExamKind::parcial(1), ExamKind::PrimerParcial);
        assert_eq!(ExamKind::parcial(2), ExamKind::SegundoParcial);
        assert_eq!(ExamKind::SegundoParcial.as_str(), "segundo_parcial");
    }
}
