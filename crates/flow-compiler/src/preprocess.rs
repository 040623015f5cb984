//! Source normalization ahead of lexing.
//!
//! The lexer expects LF line endings, no tabs, no trailing whitespace and a
//! final newline. Everything here is pure text in, text out.

use flow_lexer::directive::{classify, DirectiveHead, Keyword};
use indexmap::IndexMap;
use serde::Serialize;

const TAB_WIDTH: usize = 4;

/// Only this many leading lines are scanned for `# key: value` headers.
const HEADER_LINES: usize = 10;

/// Normalize raw source text.
///
/// Strips byte order marks, converts CRLF and CR to LF, expands tabs to
/// four-column stops, right-trims every line and leaves exactly one trailing
/// newline. Input with no visible content becomes the empty string.
/// Applying it twice yields the same text as applying it once.
pub fn preprocess(raw: &str) -> String {
    let text = raw.trim_start_matches('\u{feff}');
    let text = text.replace("\r\n", "\n").replace('\r', "\n");

    let mut out = String::with_capacity(text.len() + 1);
    for line in text.split('\n') {
        out.push_str(expand_tabs(line).trim_end());
        out.push('\n');
    }

    let content_len = out.trim_end_matches('\n').len();
    if content_len == 0 {
        return String::new();
    }
    out.truncate(content_len);
    out.push('\n');
    out
}

fn expand_tabs(line: &str) -> String {
    let mut out = String::with_capacity(line.len());
    let mut column = 0;
    for c in line.chars() {
        if c == '\t' {
            let width = TAB_WIDTH - column % TAB_WIDTH;
            out.extend(std::iter::repeat(' ').take(width));
            column += width;
        } else {
            out.push(c);
            column += 1;
        }
    }
    out
}

/// Read `# key: value` comment lines from the file header.
///
/// Blank lines and comments without a colon are skipped; the first line
/// that is not a comment ends the header.
pub fn extract_metadata(text: &str) -> IndexMap<String, String> {
    let mut metadata = IndexMap::new();
    for line in text.lines().take(HEADER_LINES) {
        let line = line.trim();
        if line.is_empty() {
            continue;
        }
        let Some(comment) = line.strip_prefix('#') else {
            break;
        };
        if let Some((key, value)) = comment.split_once(':') {
            let key = key.trim();
            if !key.is_empty() {
                metadata.insert(key.to_string(), value.trim().to_string());
            }
        }
    }
    metadata
}

/// Shape summary of a source file
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct Complexity {
    /// Non-blank lines
    pub lines: usize,
    /// Known directives outside code fences
    pub directives: usize,
    /// Deepest indentation, in four-space levels
    pub max_indent_depth: usize,
    /// `@if` directives
    pub conditionals: usize,
}

pub fn complexity(text: &str) -> Complexity {
    let mut summary = Complexity::default();
    let mut in_fence = false;
    for line in text.lines() {
        let trimmed = line.trim_start();
        if trimmed.is_empty() {
            continue;
        }
        summary.lines += 1;
        let indent = line.len() - trimmed.len();
        summary.max_indent_depth = summary.max_indent_depth.max(indent / TAB_WIDTH);

        match classify(trimmed) {
            Some(DirectiveHead::Fence(_)) => in_fence = !in_fence,
            Some(DirectiveHead::Keyword(keyword, _)) if !in_fence => {
                summary.directives += 1;
                if keyword == Keyword::If {
                    summary.conditionals += 1;
                }
            }
            _ => {}
        }
    }
    summary
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_preprocess_normalizes() {
        assert_eq!(preprocess("\u{feff}@task a\r\n\tdo it  \r\n"), "@task a\n    do it\n");
        assert_eq!(preprocess("a\rb"), "a\nb\n");
        assert_eq!(preprocess("ab\tc"), "ab  c\n");
        assert_eq!(preprocess("x\n\n\n"), "x\n");
        assert_eq!(preprocess("x\n\ny\n"), "x\n\ny\n");
    }

    #[test]
    fn test_preprocess_empty_stays_empty() {
        assert_eq!(preprocess(""), "");
        assert_eq!(preprocess("  \n\t\n"), "");
    }

    #[test]
    fn test_preprocess_is_idempotent() {
        let inputs = [
            "\u{feff}\u{feff}@task a\r\n\t\tbody\t\r\n\r\n",
            "@var x = 1\r@task t\r  ${x}\r",
            "no newline at end",
            "\t@if ok\n\t\tyes \n",
        ];
        for input in inputs {
            let once = preprocess(input);
            assert_eq!(preprocess(&once), once, "input: {:?}", input);
        }
    }

    #[test]
    fn test_extract_metadata() {
        let text = "# title: Daily report\n#   author : ops team\n# just a note\n\n# version: 2\n@task a\n# late: ignored\n";
        let metadata = extract_metadata(text);
        assert_eq!(
            metadata.into_iter().collect::<Vec<_>>(),
            vec![
                ("title".to_string(), "Daily report".to_string()),
                ("author".to_string(), "ops team".to_string()),
                ("version".to_string(), "2".to_string()),
            ]
        );
        assert!(extract_metadata("@task a\n# title: x\n").is_empty());
    }

    #[test]
    fn test_complexity() {
        let text = "@var x = 1\n@task a\n    @if ok\n        yes\n    @else\n        no\n    @endif\n    ```\n    @task not_a_directive\n    ```\n";
        assert_eq!(
            complexity(text),
            Complexity {
                lines: 10,
                directives: 5,
                max_indent_depth: 2,
                conditionals: 1,
            }
        );
    }
}
