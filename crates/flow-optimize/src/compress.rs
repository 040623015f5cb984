//! Text compression for long text nodes.
//!
//! - `a  \n b` → `a b`
//! - `wait!!!` → `wait.`, `好。。` → `好。`
//! - `the the cat` → `the cat`

use flow_ast::{Ast, NodeKind};
use regex::Regex;
use std::sync::OnceLock;

/// Result of one compression sweep
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Compression {
    /// Text nodes whose content changed
    pub nodes: usize,
    pub chars_saved: usize,
}

/// Compress every text node of at least `threshold` characters.
pub fn compress_text(ast: &mut Ast, threshold: usize) -> Compression {
    let mut result = Compression::default();
    for id in ast.walk() {
        if let NodeKind::Text {
            content,
            compressed_from,
        } = ast.kind_mut(id)
        {
            let before = content.chars().count();
            if before < threshold {
                continue;
            }
            let compressed = compress(content);
            if compressed == *content {
                continue;
            }
            let after = compressed.chars().count();
            *content = compressed;
            *compressed_from = Some(before);
            result.nodes += 1;
            result.chars_saved += before.saturating_sub(after);
        }
    }
    result
}

/// `(pattern, replacement)` pairs applied in order
fn substitutions() -> &'static [(Regex, &'static str)] {
    static SUBSTITUTIONS: OnceLock<Vec<(Regex, &'static str)>> = OnceLock::new();
    SUBSTITUTIONS.get_or_init(|| {
        [
            (r"\s+", " "),
            (r"[。！？]{2,}", "。"),
            (r"[.,!?]{2,}", "."),
        ]
        .into_iter()
        .filter_map(|(pattern, replacement)| Regex::new(pattern).ok().map(|re| (re, replacement)))
        .collect()
    })
}

/// Compress one piece of text regardless of its length.
pub fn compress(text: &str) -> String {
    let mut out = text.trim().to_string();
    for (pattern, replacement) in substitutions() {
        out = pattern.replace_all(&out, *replacement).into_owned();
    }
    collapse_repeated_words(&out)
}

fn is_word_char(c: char) -> bool {
    c.is_alphanumeric() || c == '_'
}

/// Drop a word that repeats the previous word with only whitespace between.
fn collapse_repeated_words(text: &str) -> String {
    let mut segments: Vec<(bool, &str)> = Vec::new();
    let mut start = 0;
    let mut in_word = None;
    for (i, c) in text.char_indices() {
        let word = is_word_char(c);
        match in_word {
            Some(w) if w == word => {}
            Some(w) => {
                segments.push((w, &text[start..i]));
                start = i;
                in_word = Some(word);
            }
            None => in_word = Some(word),
        }
    }
    if let Some(w) = in_word {
        segments.push((w, &text[start..]));
    }

    let mut out = String::with_capacity(text.len());
    let mut i = 0;
    while i < segments.len() {
        let (is_word, segment) = segments[i];
        out.push_str(segment);
        if is_word {
            while i + 2 < segments.len()
                && segments[i + 1].1.chars().all(char::is_whitespace)
                && segments[i + 2].1 == segment
            {
                i += 2;
            }
        }
        i += 1;
    }
    out
}
