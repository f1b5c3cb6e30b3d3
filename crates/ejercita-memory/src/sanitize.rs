//! Content cleanup applied to every chunk right before it is embedded.

pub const TRUNCATION_MARKER: &str = "... [contenido truncado]";
pub const EMPTY_PLACEHOLDER: &str = "[contenido vacío]";
pub const DEFAULT_MAX_CONTENT_CHARS: usize = 8000;

/// Record of how cleaning changed a chunk's content.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CleaningProvenance {
    pub original_chars: usize,
    pub cleaned_chars: usize,
    pub truncated: bool,
    pub placeholder: bool,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Cleaned {
    pub content: String,
    /// `None` when the content length was left untouched.
    pub provenance: Option<CleaningProvenance>,
}

fn marker_chars() -> usize {
    TRUNCATION_MARKER.chars().count()
}

/// Drop control characters, turn other whitespace into spaces and unify line endings.
fn strip_controls(text: &str) -> String {
    let text = text.replace("\r\n", "\n");
    text.chars()
        .filter_map(|c| match c {
            '\n' | '\r' => Some('\n'),
            c if c.is_whitespace() => Some(' '),
            c if c.is_control() => None,
            c => Some(c),
        })
        .collect()
}

/// Single spaces inside lines, no trailing or leading blanks, at most one empty line in a row.
fn collapse_whitespace(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    let mut pending_newlines = 0usize;
    for line in text.split('\n') {
        let line = line.split(' ').filter(|w| !w.is_empty()).collect::<Vec<_>>().join(" ");
        if line.is_empty() {
            pending_newlines += 1;
            continue;
        }
        if !out.is_empty() {
            out.push_str(if pending_newlines > 0 { "\n\n" } else { "\n" });
        }
        out.push_str(&line);
        pending_newlines = 0;
    }
    out
}

fn truncate(text: &str, max_chars: usize) -> String {
    let keep = max_chars - marker_chars();
    let head: String = text.chars().take(keep).collect();
    let mut out = head.trim_end().to_owned();
    out.push_str(TRUNCATION_MARKER);
    out
}

/// Clean `text` so that it embeds and stores safely.
///
/// `max_chars` is raised to fit at least the truncation marker plus one character.
#[must_use]
pub fn clean_content(text: &str, max_chars: usize) -> Cleaned {
    let max_chars = max_chars.max(marker_chars() + 1);
    let original_chars = text.chars().count();

    let mut content = collapse_whitespace(&strip_controls(text));
    let truncated = content.chars().count() > max_chars;
    if truncated {
        content = truncate(&content, max_chars);
    }
    let placeholder = content.is_empty();
    if placeholder {
        content = EMPTY_PLACEHOLDER.to_owned();
    }

    let cleaned_chars = content.chars().count();
    let provenance = (cleaned_chars != original_chars || truncated || placeholder).then_some(
        CleaningProvenance {
            original_chars,
            cleaned_chars,
            truncated,
            placeholder,
        },
    );
    Cleaned {
        content,
        provenance,
    }
}
