//! Lightweight content heuristics attached to every chunk.

use std::collections::BTreeMap;
use std::sync::LazyLock;

use regex::Regex;

use super::types::{Chunk, Difficulty};
use crate::query::fold;

static MATH_RES: LazyLock<Vec<Regex>> = LazyLock::new(|| {
    [
        r"\$.*?\$",
        r"[a-zA-Z]\s*=\s*[0-9]",
        r"[0-9]+\s*[+\-*/]\s*[0-9]+",
    ]
    .iter()
    .map(|p| Regex::new(p).unwrap())
    .collect()
});

const DEFINITION_KEYWORDS: [&str; 8] = [
    "definicion",
    "definir",
    "se define",
    "es aquel",
    "es aquella",
    "llamamos",
    "denominamos",
    "entendemos por",
];

const EXERCISE_KEYWORDS: [&str; 9] = [
    "ejercicio",
    "problema",
    "calcular",
    "determinar",
    "encontrar",
    "resolver",
    "demostrar",
    "probar",
    "verificar",
];

const BEGINNER_KEYWORDS: [&str; 8] = [
    "basico",
    "simple",
    "elemental",
    "introduccion",
    "concepto",
    "definicion",
    "ejemplo",
    "caso simple",
];

const ADVANCED_KEYWORDS: [&str; 10] = [
    "avanzado",
    "complejo",
    "sofisticado",
    "teorema",
    "demostracion",
    "corolario",
    "lema",
    "proposicion",
    "analisis",
    "sintesis",
];

/// Heuristic labels for a piece of text.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ContentProfile {
    pub contains_math: bool,
    pub contains_definitions: bool,
    pub contains_exercises: bool,
    pub difficulty_hint: Difficulty,
}

fn keyword_hits(text: &str, keywords: &[&str]) -> usize {
    keywords.iter().filter(|kw| text.contains(*kw)).count()
}

#[must_use]
pub fn contains_math(text: &str) -> bool {
    MATH_RES.iter().any(|re| re.is_match(text))
}

/// Difficulty from keyword presence: advanced dominance first, then any beginner signal.
#[must_use]
pub fn difficulty_hint(text: &str) -> Difficulty {
    let folded = fold(text);
    difficulty_from_counts(
        keyword_hits(&folded, &BEGINNER_KEYWORDS),
        keyword_hits(&folded, &ADVANCED_KEYWORDS),
    )
}

fn difficulty_from_counts(beginner: usize, advanced: usize) -> Difficulty {
    if advanced > beginner {
        Difficulty::Avanzado
    } else if beginner > 0 {
        Difficulty::Introductorio
    } else {
        Difficulty::Intermedio
    }
}

#[must_use]
pub fn classify(text: &str) -> ContentProfile {
    let folded = fold(text);
    ContentProfile {
        contains_math: contains_math(text),
        contains_definitions: keyword_hits(&folded, &DEFINITION_KEYWORDS) > 0,
        contains_exercises: keyword_hits(&folded, &EXERCISE_KEYWORDS) > 0,
        difficulty_hint: difficulty_from_counts(
            keyword_hits(&folded, &BEGINNER_KEYWORDS),
            keyword_hits(&folded, &ADVANCED_KEYWORDS),
        ),
    }
}

/// Summary statistics over a set of chunks.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ChunkAnalysis {
    pub total_chunks: usize,
    pub avg_length: f64,
    pub min_length: usize,
    pub max_length: usize,
    pub with_math: usize,
    pub with_definitions: usize,
    pub with_exercises: usize,
    pub difficulty: BTreeMap<Difficulty, usize>,
}

#[must_use]
pub fn analyze_chunks(chunks: &[Chunk]) -> ChunkAnalysis {
    if chunks.is_empty() {
        return ChunkAnalysis::default();
    }

    let mut analysis = ChunkAnalysis {
        total_chunks: chunks.len(),
        min_length: usize::MAX,
        ..ChunkAnalysis::default()
    };
    let mut total_length = 0usize;

    for chunk in chunks {
        let len = chunk.chunk.chunk_length;
        total_length += len;
        analysis.min_length = analysis.min_length.min(len);
        analysis.max_length = analysis.max_length.max(len);
        analysis.with_math += usize::from(chunk.chunk.contains_math);
        analysis.with_definitions += usize::from(chunk.chunk.contains_definitions);
        analysis.with_exercises += usize::from(chunk.chunk.contains_exercises);
        *analysis
            .difficulty
            .entry(chunk.chunk.difficulty_hint)
            .or_default() += 1;
    }

    #[expect(clippy::cast_precision_loss)]
    let avg_length = total_length as f64 / chunks.len() as f64;
    analysis.avg_length = avg_length;
    analysis
}
