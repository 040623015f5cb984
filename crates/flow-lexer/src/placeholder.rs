//! `${name}` / `@{name}` placeholders inside text lines.

use std::ops::Range;

/// A reference found in a piece of text
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Placeholder<'a> {
    /// `$` or `@`
    pub sigil: char,
    pub name: &'a str,
    /// Byte range of the whole placeholder, sigil and braces included
    pub range: Range<usize>,
}

/// True if `text` matches `[A-Za-z_][A-Za-z0-9_]*`.
pub fn is_identifier(text: &str) -> bool {
    let mut chars = text.chars();
    match chars.next() {
        Some(c) if c.is_ascii_alphabetic() || c == '_' => {}
        _ => return false,
    }
    chars.all(|c| c.is_ascii_alphanumeric() || c == '_')
}

/// Find every well-formed placeholder in `text`, in order of appearance.
pub fn placeholders(text: &str) -> Vec<Placeholder<'_>> {
    let bytes = text.as_bytes();
    let mut found = Vec::new();
    let mut i = 0;

    while i + 1 < bytes.len() {
        let sigil = bytes[i];
        if (sigil == b'$' || sigil == b'@') && bytes[i + 1] == b'{' {
            let start = i + 2;
            if let Some(len) = text[start..].find('}') {
                let name = &text[start..start + len];
                if is_identifier(name) {
                    let end = start + len + 1;
                    found.push(Placeholder {
                        sigil: sigil as char,
                        name,
                        range: i..end,
                    });
                    i = end;
                    continue;
                }
            }
        }
        i += 1;
    }

    found
}

/// Replace placeholders for which `lookup` returns a value.
pub fn substitute<F>(text: &str, mut lookup: F) -> String
where
    F: FnMut(&Placeholder<'_>) -> Option<String>,
{
    let mut out = String::with_capacity(text.len());
    let mut last = 0;
    for placeholder in placeholders(text) {
        if let Some(value) = lookup(&placeholder) {
            out.push_str(&text[last..placeholder.range.start]);
            out.push_str(&value);
            last = placeholder.range.end;
        }
    }
    out.push_str(&text[last..]);
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_find_placeholders() {
        let found = placeholders("use ${input} with @{config} and ${bad-name} or ${}");
        let names: Vec<(char, &str)> = found.iter().map(|p| (p.sigil, p.name)).collect();
        assert_eq!(names, vec![('$', "input"), ('@', "config")]);
        assert_eq!(found[0].range, 4..12);
    }

    #[test]
    fn test_identifier_shape() {
        assert!(is_identifier("load_data"));
        assert!(is_identifier("_x1"));
        assert!(!is_identifier("1abc"));
        assert!(!is_identifier(""));
        assert!(!is_identifier("a-b"));
    }

    #[test]
    fn test_substitute_only_known() {
        let out = substitute("value is ${x}, keep ${y}", |p| (p.name == "x").then(|| "10".to_string()));
        assert_eq!(out, "value is 10, keep ${y}");
    }
}
