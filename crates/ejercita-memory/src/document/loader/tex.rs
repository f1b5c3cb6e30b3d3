use std::path::Path;

use super::{BoxFuture, ContentLoader, check_size};
use crate::document::{DEFAULT_MAX_FILE_SIZE, DocumentError};

/// LaTeX sources, read as text with `%` comments removed.
#[derive(Debug, Clone)]
pub struct TexLoader {
    pub max_file_size: u64,
}

impl Default for TexLoader {
    fn default() -> Self {
        Self {
            max_file_size: DEFAULT_MAX_FILE_SIZE,
        }
    }
}

impl ContentLoader for TexLoader {
    fn load(&self, path: &Path) -> BoxFuture<'_, Result<String, DocumentError>> {
        let path = path.to_path_buf();
        let max_size = self.max_file_size;
        Box::pin(async move {
            check_size(&path, max_size).await?;
            let raw = tokio::fs::read_to_string(&path).await?;
            Ok(strip_comments(&raw))
        })
    }
}

/// Drop everything after an unescaped `%` on each line; comment-only lines vanish.
fn strip_comments(source: &str) -> String {
    let mut out = String::with_capacity(source.len());
    for line in source.lines() {
        let mut escaped = false;
        let mut cut = line.len();
        for (i, c) in line.char_indices() {
            match c {
                '\\' => escaped = !escaped,
                '%' if !escaped => {
                    cut = i;
                    break;
                }
                _ => escaped = false,
            }
        }
        let kept = &line[..cut];
        if cut < line.len() && kept.trim().is_empty() {
            continue;
        }
        out.push_str(kept.trim_end());
        out.push('\n');
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn comments_removed_escaped_percent_kept() {
        let src = "% preambulo\nLa tasa es 5\\% anual. % nota\n\\section{Varianza}\n";
        assert_eq!(strip_comments(src), "La tasa es 5\\% anual.\n\\section{Varianza}\n");
    }

    #[test]
    fn blank_lines_preserved() {
        assert_eq!(strip_comments("a\n\nb"), "a\n\nb\n");
    }

    #[tokio::test]
    async fn load_tex_file() {
        let dir = tempfile::tempdir().unwrap();
        let file = dir.path().join("guia.tex");
        std::fs::write(&file, "% comentario\n$x = 2$\n").unwrap();

        let content = TexLoader::default().load(&file).await.unwrap();
        assert_eq!(content, "$x = 2$\n");
    }
}
