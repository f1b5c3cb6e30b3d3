//! Academic metadata inferred from a document's location and file name.
//!
//! The expected layout is `<root>/<materia>/[Unidad_NN_<tema>/]<tipo>/<file>`. Every
//! attribute is resolved through an ordered list of strategies; the first one that
//! yields a value wins and a missing attribute is a valid outcome.

use std::path::{Component, Path};
use std::sync::LazyLock;

use regex::Regex;

use super::types::{Difficulty, DocumentMetadata, ExamInfo, ExamKind, Placement, UnitInfo};
use crate::query::fold;

pub const UNKNOWN_MATERIA: &str = "No especificada";
pub const GENERIC_DOCUMENT_TYPE: &str = "documento";

const ANCHORS: [&str; 2] = ["docs", "data"];
const FALLBACK_SEGMENTS: usize = 4;
const EXAM_KINDS: [&str; 3] = ["examenes", "parciales", "finales"];

type Strategy<T> = fn(&str) -> Option<T>;

fn first_match<T>(strategies: &[Strategy<T>], input: &str) -> Option<T> {
    strategies.iter().find_map(|strategy| strategy(input))
}

fn compile(patterns: &[&str]) -> Vec<Regex> {
    patterns.iter().map(|p| Regex::new(p).unwrap()).collect()
}

fn first_capture<'a>(patterns: &[Regex], input: &'a str) -> Option<&'a str> {
    patterns
        .iter()
        .find_map(|re| re.captures(input).and_then(|c| c.get(1)))
        .map(|m| m.as_str())
}

static UNIT_FOLDER_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?:unidad|tema|capitulo|modulo)[_\s]?\d+|^\d+[_\s]").unwrap()
});
static FIRST_INTEGER_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\d+").unwrap());
static UNIT_PREFIX_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)^(?:(?:unidad|tema|capitulo|modulo)[_\s]?)?\d+[_\s\-]*").unwrap()
});

static FILENAME_UNIT_LEADING_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^(\d+)\s*[-_\s]").unwrap());
static FILENAME_UNIT_KEYWORD_RES: LazyLock<Vec<Regex>> = LazyLock::new(|| {
    compile(&[
        r"unidad[_\s]?(\d+)",
        r"tema[_\s]?(\d+)",
        r"capitulo[_\s]?(\d+)",
        r"cap[_\s]?(\d+)",
        r"u(\d+)[_\s]",
    ])
});
static FILENAME_TOPIC_RES: LazyLock<Vec<Regex>> = LazyLock::new(|| {
    compile(&[
        r"^\d+\s*[-_\s]+(.+)$",
        r"(?i)^(?:unidad|tema|capitulo)[_\s]?\d+\s*[-_\s]+(.+)$",
    ])
});

static YEAR_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?:^|\D)(20\d{2})(?:\D|$)").unwrap());
static TERM_RES: LazyLock<Vec<Regex>> = LazyLock::new(|| {
    compile(&[
        r"q[_\s]?([12])",
        r"cuat(?:rimestre|ri)?[_\s]?([12])",
        r"c([12])",
    ])
});
static PARCIAL_RES: LazyLock<Vec<Regex>> = LazyLock::new(|| {
    compile(&[
        r"(?:^|[_\s])([12])[_\s]?p(?:[_\s.\-]|$)",
        r"p[_\s]?([12])(?:[_\s.\-]|$)",
        r"parcial[_\s]?([12])",
        r"([12])[erdo]*[_\s]?parcial",
    ])
});
static VARIANT_RES: LazyLock<Vec<Regex>> = LazyLock::new(|| {
    compile(&[r"(?i)tema[_\s]?([a-d1-4])", r"[_\s]([A-D])(?:\.|$)"])
});

const MATERIA_KEYWORDS: [(&str, &str); 6] = [
    ("probabilidad", "Probabilidad y estadística"),
    ("estadistica", "Probabilidad y estadística"),
    ("sia", "Sistemas de Inteligencia Artificial"),
    ("inteligencia", "Sistemas de Inteligencia Artificial"),
    ("ai", "Sistemas de Inteligencia Artificial"),
    ("machine learning", "Sistemas de Inteligencia Artificial"),
];

const TYPE_SYNONYMS: [(&str, &str); 21] = [
    ("apunte", "apuntes"),
    ("apuntes", "apuntes"),
    ("teorica", "apuntes"),
    ("teoricas", "apuntes"),
    ("teoria", "apuntes"),
    ("ejercicio", "ejercicios"),
    ("ejercicios", "ejercicios"),
    ("practica", "ejercicios"),
    ("practicas", "ejercicios"),
    ("guia", "guias"),
    ("guias", "guias"),
    ("examen", "examenes"),
    ("examenes", "examenes"),
    ("parcial", "parciales"),
    ("parciales", "parciales"),
    ("final", "finales"),
    ("finales", "finales"),
    ("laboratorio", "laboratorios"),
    ("laboratorios", "laboratorios"),
    ("proyecto", "proyectos"),
    ("proyectos", "proyectos"),
];

const FILENAME_TYPE_KEYWORDS: [(&str, &str); 7] = [
    ("apunte", "apuntes"),
    ("guia", "guias"),
    ("examen", "examenes"),
    ("parcial", "parciales"),
    ("final", "finales"),
    ("ejercicio", "ejercicios"),
    ("practica", "ejercicios"),
];

const LEVEL_KEYWORDS: [(&str, Difficulty); 6] = [
    ("basico", Difficulty::Introductorio),
    ("introductorio", Difficulty::Introductorio),
    ("intro", Difficulty::Introductorio),
    ("avanzado", Difficulty::Avanzado),
    ("intermedio", Difficulty::Intermedio),
    ("medio", Difficulty::Intermedio),
];

const RECOVERY_KEYWORDS: [&str; 3] = ["recup", "recuperatorio", "recuperacion"];

/// Academic attributes derived from a path, without file-system facts.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AcademicMetadata {
    pub materia: String,
    pub tipo_documento: String,
    pub nivel_sugerido: Option<Difficulty>,
    pub placement: Placement,
}

fn segments(path: &Path) -> Vec<String> {
    path.components()
        .filter_map(|c| match c {
            Component::Normal(s) => Some(s.to_string_lossy().into_owned()),
            _ => None,
        })
        .collect()
}

/// Directory segments below the anchor, excluding the file name itself.
fn hierarchy(path: &Path) -> Vec<String> {
    let parts = segments(path);
    let after_anchor = ANCHORS
        .iter()
        .find_map(|anchor| parts.iter().position(|p| p == *anchor))
        .map_or_else(
            || parts[parts.len().saturating_sub(FALLBACK_SEGMENTS)..].to_vec(),
            |idx| parts[idx + 1..].to_vec(),
        );

    match after_anchor.split_last() {
        Some((_, dirs)) => dirs.to_vec(),
        None => Vec::new(),
    }
}

fn materia_from_keywords(filename: &str, parent: &str) -> Option<String> {
    let filename = fold(filename);
    let parent = fold(parent);
    MATERIA_KEYWORDS
        .iter()
        .find(|(kw, _)| filename.contains(kw) || parent.contains(kw))
        .map(|(_, materia)| (*materia).to_owned())
}

#[must_use]
pub fn is_unit_folder(name: &str) -> bool {
    UNIT_FOLDER_RE.is_match(&fold(name))
}

fn unit_from_folder(name: &str) -> Placement {
    let number = FIRST_INTEGER_RE
        .find(name)
        .and_then(|m| m.as_str().parse::<u32>().ok());
    let topic = UNIT_PREFIX_RE.replace(name, "").replace('_', " ");
    let topic = topic.trim();
    unit_placement(number, (!topic.is_empty()).then(|| topic.to_owned()))
}

fn unit_placement(number: Option<u32>, topic: Option<String>) -> Placement {
    if number.is_none() && topic.is_none() {
        Placement::General
    } else {
        Placement::Unit(UnitInfo { number, topic })
    }
}

/// Map a type-folder name through the synonym table, keeping unknown names as-is.
#[must_use]
pub fn normalize_document_type(raw: &str) -> String {
    let key = fold(raw);
    TYPE_SYNONYMS
        .iter()
        .find(|(synonym, _)| *synonym == key)
        .map_or_else(|| raw.to_owned(), |(_, canonical)| (*canonical).to_owned())
}

fn document_type_from_filename(filename: &str) -> String {
    let name = fold(filename);
    FILENAME_TYPE_KEYWORDS
        .iter()
        .find(|(kw, _)| name.contains(kw))
        .map_or(GENERIC_DOCUMENT_TYPE, |(_, tipo)| *tipo)
        .to_owned()
}

fn unit_number_leading(filename: &str) -> Option<u32> {
    FILENAME_UNIT_LEADING_RE
        .captures(filename)
        .and_then(|c| c.get(1))
        .and_then(|m| m.as_str().parse().ok())
}

fn unit_number_keyword(filename: &str) -> Option<u32> {
    first_capture(&FILENAME_UNIT_KEYWORD_RES, &fold(filename)).and_then(|n| n.parse().ok())
}

fn unit_topic(stem: &str) -> Option<String> {
    let topic = first_capture(&FILENAME_TOPIC_RES, stem)?;
    let topic = topic
        .replace('_', " ")
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ");
    (!topic.is_empty()).then_some(topic)
}

fn unit_from_filename(filename: &str) -> Placement {
    let Some(number) = first_match(&[unit_number_leading, unit_number_keyword], filename) else {
        return Placement::General;
    };
    let stem = Path::new(filename)
        .file_stem()
        .map_or_else(|| filename.to_owned(), |s| s.to_string_lossy().into_owned());
    unit_placement(Some(number), unit_topic(&stem))
}

fn suggested_level(filename: &str) -> Option<Difficulty> {
    let name = fold(filename);
    LEVEL_KEYWORDS
        .iter()
        .find(|(kw, _)| name.contains(kw))
        .map(|(_, level)| *level)
}

#[must_use]
pub fn is_exam_kind(tipo_documento: &str) -> bool {
    EXAM_KINDS.contains(&tipo_documento)
}

fn exam_year(name: &str) -> Option<u16> {
    YEAR_RE
        .captures(name)
        .and_then(|c| c.get(1))
        .and_then(|m| m.as_str().parse().ok())
}

fn exam_term(name: &str) -> Option<u8> {
    first_capture(&TERM_RES, name).and_then(|n| n.parse().ok())
}

fn recovery_exam(name: &str) -> Option<ExamKind> {
    RECOVERY_KEYWORDS
        .iter()
        .any(|kw| name.contains(kw))
        .then_some(ExamKind::Recuperatorio)
}

fn final_exam(name: &str) -> Option<ExamKind> {
    name.contains("final").then_some(ExamKind::Final)
}

fn numbered_parcial(name: &str) -> Option<ExamKind> {
    first_capture(&PARCIAL_RES, name)
        .and_then(|n| n.parse::<u8>().ok())
        .map(ExamKind::parcial)
}

fn exam_variant(filename: &str) -> Option<String> {
    first_capture(&VARIANT_RES, filename).map(str::to_uppercase)
}

/// Exam attributes parsed from a file name such as `2023_Q1_2P_A.pdf`.
#[must_use]
pub fn extract_exam_info(filename: &str) -> ExamInfo {
    let name = fold(filename);
    let kind = first_match(&[recovery_exam, final_exam, numbered_parcial], &name)
        .unwrap_or(ExamKind::PrimerParcial);
    ExamInfo {
        year: exam_year(&name),
        term: exam_term(&name),
        kind,
        variant: exam_variant(filename),
    }
}

fn file_name(path: &Path) -> String {
    path.file_name()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_default()
}

fn parent_name(path: &Path) -> String {
    path.parent()
        .and_then(Path::file_name)
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_default()
}

/// Infer subject, document kind, unit or exam details and suggested level from a path.
#[must_use]
pub fn extract_academic_metadata(path: &Path) -> AcademicMetadata {
    let filename = file_name(path);
    let dirs = hierarchy(path);

    let materia = dirs
        .first()
        .map(|level1| level1.replace('_', " "))
        .or_else(|| materia_from_keywords(&filename, &parent_name(path)))
        .unwrap_or_else(|| UNKNOWN_MATERIA.to_owned());

    let (tipo_documento, placement) = match dirs.get(1) {
        Some(level2) if is_unit_folder(level2) => {
            let tipo = dirs.get(2).map_or_else(
                || document_type_from_filename(&filename),
                |level3| normalize_document_type(level3),
            );
            (tipo, unit_from_folder(level2))
        }
        Some(level2) => (normalize_document_type(level2), unit_from_filename(&filename)),
        None => (document_type_from_filename(&filename), Placement::General),
    };

    let placement = if is_exam_kind(&tipo_documento) {
        Placement::Exam(extract_exam_info(&filename))
    } else {
        placement
    };

    AcademicMetadata {
        materia,
        tipo_documento,
        nivel_sugerido: suggested_level(&filename),
        placement,
    }
}

/// Build the full metadata record for a file on disk.
#[must_use]
pub fn extract_metadata(path: &Path, file_size: u64) -> DocumentMetadata {
    let academic = extract_academic_metadata(path);
    let file_type = path
        .extension()
        .map(|e| format!(".{}", e.to_string_lossy().to_lowercase()))
        .unwrap_or_default();

    let metadata = DocumentMetadata {
        source: path.display().to_string(),
        filename: file_name(path),
        file_type,
        file_size,
        parent_dir: parent_name(path),
        materia: academic.materia,
        tipo_documento: academic.tipo_documento,
        nivel_sugerido: academic.nivel_sugerido,
        placement: academic.placement,
    };
    report_missing_fields(&metadata);
    metadata
}

fn report_missing_fields(metadata: &DocumentMetadata) {
    let mut missing = Vec::new();
    match metadata.tipo_documento.as_str() {
        tipo if is_exam_kind(tipo) => {
            let exam = metadata.exam();
            if exam.and_then(|e| e.year).is_none() {
                missing.push("año");
            }
            if exam.and_then(|e| e.term).is_none() {
                missing.push("cuatrimestre");
            }
        }
        "apuntes" | "ejercicios" | "guias" => {
            if metadata.unidad_numero().is_none() {
                missing.push("unidad_numero");
            }
        }
        _ => {}
    }
    if metadata.materia == UNKNOWN_MATERIA {
        missing.push("materia");
    }
    if !missing.is_empty() {
        tracing::debug!(
            file = %metadata.filename,
            tipo = %metadata.tipo_documento,
            missing = ?missing,
            "metadata incomplete"
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn extract(path: &str) -> AcademicMetadata {
        extract_academic_metadata(Path::new(path))
    }

    #[test]
    fn three_level_unit_layout() {
        let meta = extract("docs/Probabilidad_y_estadistica/Unidad_05_Test/apuntes/x.pdf");
        assert_eq!(meta.materia, "Probabilidad y estadistica");
        assert_eq!(meta.tipo_documento, "apuntes");
        assert_eq!(
            meta.placement,
            Placement::Unit(UnitInfo {
                number: Some(5),
                topic: Some("Test".into()),
            })
        );
    }

    #[test]
    fn exam_file_under_examenes() {
        let meta = extract("docs/Probabilidad_y_estadistica/examenes/2023_Q1_2P_A.pdf");
        assert_eq!(meta.tipo_documento, "examenes");
        let Placement::Exam(exam) = meta.placement else {
            panic!("expected exam placement");
        };
        assert_eq!(exam.year, Some(2023));
        assert_eq!(exam.term, Some(1));
        assert_eq!(exam.kind, ExamKind::SegundoParcial);
        assert_eq!(exam.variant.as_deref(), Some("A"));
    }

    #[test]
    fn exam_inside_unit_folder_drops_unit_fields() {
        let meta = extract("docs/SIA/Unidad_02_Redes/parciales/parcial_1.pdf");
        assert_eq!(meta.tipo_documento, "parciales");
        assert!(matches!(meta.placement, Placement::Exam(_)));
    }

    #[test]
    fn unit_topic_with_multiple_words() {
        let meta = extract("docs/SIA/Unidad_03_Machine_Learning_Supervisado/ejercicios/tp.pdf");
        assert_eq!(
            meta.placement,
            Placement::Unit(UnitInfo {
                number: Some(3),
                topic: Some("Machine Learning Supervisado".into()),
            })
        );
    }

    #[test]
    fn leading_integer_folder_is_a_unit() {
        assert!(is_unit_folder("01_Introduccion"));
        assert!(is_unit_folder("Tema_4"));
        assert!(is_unit_folder("capitulo 2"));
        assert!(!is_unit_folder("apuntes"));
        let meta = extract("docs/SIA/01_Introduccion/guias/g.pdf");
        assert_eq!(meta.tipo_documento, "guias");
        assert_eq!(meta.placement, unit_placement(Some(1), Some("Introduccion".into())));
    }

    #[test]
    fn unit_folder_without_type_folder_uses_filename() {
        let meta = extract("docs/SIA/Unidad_01_Clustering/guia_kmeans.pdf");
        assert_eq!(meta.tipo_documento, "guias");
        assert_eq!(meta.placement, unit_placement(Some(1), Some("Clustering".into())));
    }

    #[test]
    fn type_folder_synonyms_normalized() {
        assert_eq!(extract("docs/SIA/teorica/x.pdf").tipo_documento, "apuntes");
        assert_eq!(extract("docs/SIA/Practicas/x.pdf").tipo_documento, "ejercicios");
        assert_eq!(extract("docs/SIA/laboratorio/x.pdf").tipo_documento, "laboratorios");
        assert_eq!(extract("docs/SIA/Resumenes/x.pdf").tipo_documento, "Resumenes");
    }

    #[test]
    fn type_folder_recovers_unit_from_leading_number() {
        let meta = extract("docs/SIA/apuntes/02 - Redes Neuronales.pdf");
        assert_eq!(meta.tipo_documento, "apuntes");
        assert_eq!(
            meta.placement,
            unit_placement(Some(2), Some("Redes Neuronales".into()))
        );
    }

    #[test]
    fn type_folder_recovers_unit_from_keyword() {
        let meta = extract("docs/SIA/apuntes/Unidad3_Perceptron.txt");
        assert_eq!(meta.placement, unit_placement(Some(3), Some("Perceptron".into())));
    }

    #[test]
    fn type_folder_without_unit_hint_is_general() {
        let meta = extract("docs/SIA/apuntes/resumen.txt");
        assert_eq!(meta.placement, Placement::General);
    }

    #[test]
    fn materia_only_uses_filename_type() {
        let meta = extract("docs/Probabilidad_y_estadistica/ejercicios_varios.pdf");
        assert_eq!(meta.materia, "Probabilidad y estadistica");
        assert_eq!(meta.tipo_documento, "ejercicios");
    }

    #[test]
    fn file_directly_under_anchor_uses_keyword_materia() {
        let meta = extract("docs/probabilidad_resumen.pdf");
        assert_eq!(meta.materia, "Probabilidad y estadística");
        assert_eq!(meta.tipo_documento, GENERIC_DOCUMENT_TYPE);
    }

    #[test]
    fn unknown_materia_default() {
        let meta = extract("docs/notas.txt");
        assert_eq!(meta.materia, UNKNOWN_MATERIA);
    }

    #[test]
    fn data_anchor_used_when_docs_absent() {
        let meta = extract("/srv/data/SIA/apuntes/x.pdf");
        assert_eq!(meta.materia, "SIA");
        assert_eq!(meta.tipo_documento, "apuntes");
    }

    #[test]
    fn docs_anchor_takes_priority_over_data() {
        let meta = extract("/data/docs/SIA/guias/x.pdf");
        assert_eq!(meta.materia, "SIA");
    }

    #[test]
    fn no_anchor_falls_back_to_last_segments() {
        let meta = extract("/home/u/cursos/SIA/Unidad_01_Clustering/apuntes/k.pdf");
        assert_eq!(meta.materia, "SIA");
        assert_eq!(meta.tipo_documento, "apuntes");
        assert_eq!(meta.placement, unit_placement(Some(1), Some("Clustering".into())));
    }

    #[test]
    fn suggested_level_keywords() {
        assert_eq!(
            extract("docs/SIA/guias/guia_basica_intro.pdf").nivel_sugerido,
            Some(Difficulty::Introductorio)
        );
        assert_eq!(
            extract("docs/SIA/guias/guia_avanzado.pdf").nivel_sugerido,
            Some(Difficulty::Avanzado)
        );
        assert_eq!(
            extract("docs/SIA/guias/nivel_medio.pdf").nivel_sugerido,
            Some(Difficulty::Intermedio)
        );
        assert_eq!(extract("docs/SIA/guias/guia.pdf").nivel_sugerido, None);
    }

    #[test]
    fn exam_kinds_by_keyword() {
        assert_eq!(extract_exam_info("recuperatorio_2022.pdf").kind, ExamKind::Recuperatorio);
        assert_eq!(extract_exam_info("Final_2021_Diciembre.pdf").kind, ExamKind::Final);
        assert_eq!(extract_exam_info("parcial2_2022.pdf").kind, ExamKind::SegundoParcial);
        assert_eq!(extract_exam_info("2do_parcial.pdf").kind, ExamKind::SegundoParcial);
        assert_eq!(extract_exam_info("examen.pdf").kind, ExamKind::PrimerParcial);
    }

    #[test]
    fn ordinal_suffix_before_parcial_is_loose() {
        assert_eq!(extract_exam_info("2ro_parcial.pdf").kind, ExamKind::SegundoParcial);
        assert_eq!(extract_exam_info("2eo parcial.pdf").kind, ExamKind::SegundoParcial);
        assert_eq!(extract_exam_info("1eo parcial.pdf").kind, ExamKind::PrimerParcial);
    }

    #[test]
    fn exam_term_patterns_in_order() {
        assert_eq!(extract_exam_info("2022_q2.pdf").term, Some(2));
        assert_eq!(extract_exam_info("2022_cuatrimestre_1.pdf").term, Some(1));
        assert_eq!(extract_exam_info("2022_c2_parcial.pdf").term, Some(2));
        assert_eq!(extract_exam_info("parcial.pdf").term, None);
    }

    #[test]
    fn exam_year_requires_20xx_token() {
        assert_eq!(extract_exam_info("1999_final.pdf").year, None);
        assert_eq!(extract_exam_info("final_2019.pdf").year, Some(2019));
    }

    #[test]
    fn exam_variant_patterns() {
        assert_eq!(extract_exam_info("parcial_tema_b.pdf").variant.as_deref(), Some("B"));
        assert_eq!(extract_exam_info("parcial_tema3.pdf").variant.as_deref(), Some("3"));
        assert_eq!(extract_exam_info("parcial_C.pdf").variant.as_deref(), Some("C"));
        assert_eq!(extract_exam_info("parcial.pdf").variant, None);
    }

    #[test]
    fn full_metadata_has_file_facts() {
        let meta = extract_metadata(
            Path::new("docs/SIA/Unidad_01_Clustering/apuntes/KMeans.PDF"),
            1234,
        );
        assert_eq!(meta.filename, "KMeans.PDF");
        assert_eq!(meta.file_type, ".pdf");
        assert_eq!(meta.file_size, 1234);
        assert_eq!(meta.parent_dir, "apuntes");
        assert_eq!(meta.unidad_numero(), Some(1));
        assert_eq!(meta.unidad_tema(), Some("Clustering"));
    }

    #[test]
    fn extraction_is_deterministic() {
        let path = Path::new("docs/SIA/examenes/2021_c1_recup_tema_a.pdf");
        assert_eq!(extract_academic_metadata(path), extract_academic_metadata(path));
    }
}
