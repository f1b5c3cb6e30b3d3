//! Query-side helpers: canonical filter tokens and boosted search strings.

use unicode_normalization::UnicodeNormalization;
use unicode_normalization::char::is_combining_mark;

use crate::index_store::MetadataFilter;

/// Metadata key whose values are canonicalized with [`normalize`] at store and query time.
pub const MATERIA_KEY: &str = "materia";

/// Lower-case and strip diacritics, keeping every other character.
#[must_use]
pub fn fold(text: &str) -> String {
    text.nfd()
        .filter(|c| !is_combining_mark(*c))
        .flat_map(char::to_lowercase)
        .collect()
}

/// Canonical token for filter equality: folded, alphanumerics only.
///
/// `"Probabilidad y Estadística"` and `"probabilidad_y_estadistica"` both become
/// `"probabilidadyestadistica"`.
#[must_use]
pub fn normalize(text: &str) -> String {
    fold(&text.to_lowercase())
        .chars()
        .filter(|c| c.is_alphanumeric())
        .collect()
}

/// Structured search request from the exercise generator.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SearchParams {
    pub materia: Option<String>,
    /// Unit number or topic.
    pub unidad: Option<String>,
    pub tipo_ejercicio: Option<String>,
    /// Free text appended after the structured fields.
    pub query: Option<String>,
}

impl SearchParams {
    #[must_use]
    pub fn new(query: impl Into<String>) -> Self {
        Self {
            query: Some(query.into()),
            ..Self::default()
        }
    }

    #[must_use]
    pub fn with_materia(mut self, materia: impl Into<String>) -> Self {
        self.materia = Some(materia.into());
        self
    }

    #[must_use]
    pub fn with_unidad(mut self, unidad: impl Into<String>) -> Self {
        self.unidad = Some(unidad.into());
        self
    }

    #[must_use]
    pub fn with_tipo_ejercicio(mut self, tipo: impl Into<String>) -> Self {
        self.tipo_ejercicio = Some(tipo.into());
        self
    }
}

fn non_empty(field: Option<&String>) -> Option<&str> {
    field.map(|s| s.trim()).filter(|s| !s.is_empty())
}

fn boost_terms(tipo_ejercicio: &str) -> &'static [&'static str] {
    match tipo_ejercicio {
        "multiple_choice" => &["conceptos", "definiciones"],
        "practico" => &["ejercicios", "problemas", "cálculos"],
        "desarrollo" => &["teoría", "explicaciones"],
        _ => &[],
    }
}

/// Join the non-empty fields in fixed order and append exercise-type boosts.
#[must_use]
pub fn build_search_query(params: &SearchParams) -> String {
    let tipo = non_empty(params.tipo_ejercicio.as_ref());
    let mut parts: Vec<&str> = [
        non_empty(params.materia.as_ref()),
        non_empty(params.unidad.as_ref()),
        tipo,
        non_empty(params.query.as_ref()),
    ]
    .into_iter()
    .flatten()
    .collect();

    if let Some(tipo) = tipo {
        parts.extend_from_slice(boost_terms(tipo));
    }
    parts.join(" ")
}

/// Filter narrowing a search to the requested subject, if any.
#[must_use]
pub fn build_filter(params: &SearchParams) -> MetadataFilter {
    let mut filter = MetadataFilter::new();
    if let Some(materia) = non_empty(params.materia.as_ref()) {
        filter.insert(MATERIA_KEY.to_owned(), normalize(materia).into());
    }
    filter
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn normalize_examples() {
        assert_eq!(
            normalize("Probabilidad y Estadística"),
            "probabilidadyestadistica"
        );
        assert_eq!(
            normalize("probabilidad_y_estadistica"),
            "probabilidadyestadistica"
        );
        assert_eq!(normalize("  Álgebra-II  "), "algebraii");
        assert_eq!(normalize(""), "");
    }

    #[test]
    fn fold_keeps_separators() {
        assert_eq!(fold("Unidad_05 Tema Ñandú"), "unidad_05 tema nandu");
    }

    #[test]
    fn query_fields_in_fixed_order() {
        let params = SearchParams {
            materia: Some("Probabilidad".into()),
            unidad: Some("Variables aleatorias".into()),
            tipo_ejercicio: None,
            query: Some("esperanza".into()),
        };
        assert_eq!(
            build_search_query(&params),
            "Probabilidad Variables aleatorias esperanza"
        );
    }

    #[test]
    fn multiple_choice_boost() {
        let params = SearchParams::default()
            .with_materia("Probabilidad")
            .with_tipo_ejercicio("multiple_choice");
        assert_eq!(
            build_search_query(&params),
            "Probabilidad multiple_choice conceptos definiciones"
        );
    }

    #[test]
    fn practico_and_desarrollo_boosts() {
        let practico = SearchParams::default().with_tipo_ejercicio("practico");
        assert_eq!(
            build_search_query(&practico),
            "practico ejercicios problemas cálculos"
        );
        let desarrollo = SearchParams::default().with_tipo_ejercicio("desarrollo");
        assert_eq!(
            build_search_query(&desarrollo),
            "desarrollo teoría explicaciones"
        );
    }

    #[test]
    fn blank_fields_skipped() {
        let params = SearchParams {
            materia: Some("   ".into()),
            unidad: Some(String::new()),
            tipo_ejercicio: Some("otro".into()),
            query: None,
        };
        assert_eq!(build_search_query(&params), "otro");
    }

    #[test]
    fn filter_normalizes_materia() {
        let filter = build_filter(&SearchParams::new("x").with_materia("Probabilidad Y Estadística"));
        assert_eq!(filter.len(), 1);
        assert_eq!(filter[MATERIA_KEY], "probabilidadyestadistica");
    }

    #[test]
    fn filter_empty_without_materia() {
        let filter = build_filter(&SearchParams::new("x").with_unidad("3"));
        assert!(filter.is_empty());
    }

    proptest! {
        #[test]
        fn normalize_idempotent(s in "[\\x{20}-\\x{24F}\\x{370}-\\x{3FF}]{0,48}") {
            let once = normalize(&s);
            prop_assert_eq!(normalize(&once), once);
        }

        #[test]
        fn normalize_output_is_alphanumeric(s in "\\PC{0,32}") {
            let out = normalize(&s);
            prop_assert!(out.chars().all(char::is_alphanumeric));
        }
    }
}
