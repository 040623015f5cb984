//! Flow Script Lexer
//!
//! Turns normalized script text into a flat token stream. The language is
//! line oriented: every line is a directive (`@task`, `@var`, ...), plain
//! text, or a code fence. Block structure is expressed purely through
//! indentation, which the lexer converts into `Indent`/`Dedent` tokens.
//!
//! The input is expected to be normalized already: LF line endings, tabs
//! expanded and trailing whitespace stripped.

pub mod directive;
pub mod expr;
pub mod placeholder;

pub use directive::{DirectiveHead, DirectiveParams, Keyword};

use serde::Serialize;
use std::collections::BTreeMap;
use std::fmt;
use thiserror::Error;

/// Opening and closing marker of a code fence.
pub const FENCE: &str = "```";

/// All token types produced by the line lexer
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum TokenKind {
    Directive,
    Text,
    Indent,
    Dedent,
    Newline,
    Eof,
}

impl fmt::Display for TokenKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            TokenKind::Directive => "directive",
            TokenKind::Text => "text",
            TokenKind::Indent => "indent",
            TokenKind::Dedent => "dedent",
            TokenKind::Newline => "newline",
            TokenKind::Eof => "end of file",
        };
        f.write_str(name)
    }
}

impl TokenKind {
    /// Tokens the parser skips between items
    pub fn is_trivia(&self) -> bool {
        matches!(self, TokenKind::Newline)
    }

    /// Tokens that only carry block structure
    pub fn is_structural(&self) -> bool {
        matches!(self, TokenKind::Indent | TokenKind::Dedent)
    }
}

/// A token with its kind, text and 1-based position
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Token {
    pub kind: TokenKind,
    pub value: String,
    pub line: usize,
    pub column: usize,
}

impl Token {
    pub fn new(kind: TokenKind, value: impl Into<String>, line: usize, column: usize) -> Self {
        Self {
            kind,
            value: value.into(),
            line,
            column,
        }
    }

    /// True for text tokens that hold nothing but whitespace.
    pub fn is_blank_text(&self) -> bool {
        self.kind == TokenKind::Text && self.value.trim().is_empty()
    }

    /// The directive keyword, for `Directive` tokens that are not fences.
    pub fn keyword(&self) -> Option<Keyword> {
        if self.kind != TokenKind::Directive {
            return None;
        }
        match directive::classify(&self.value)? {
            DirectiveHead::Keyword(keyword, _) => Some(keyword),
            _ => None,
        }
    }
}

impl fmt::Display for Token {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:>4}:{:<3} {:<9} {:?}", self.line, self.column, self.kind.to_string(), self.value)
    }
}

/// Lexer error type
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum LexError {
    #[error("line {line}: unindent to width {width} does not match any outer indentation level")]
    InconsistentDedent { line: usize, width: usize },

    #[error("line {line}: {message}")]
    MalformedLine { line: usize, message: String },
}

impl LexError {
    pub fn line(&self) -> usize {
        match self {
            LexError::InconsistentDedent { line, .. } | LexError::MalformedLine { line, .. } => *line,
        }
    }

    /// The message without the line prefix.
    pub fn message(&self) -> String {
        match self {
            LexError::InconsistentDedent { width, .. } => {
                format!("unindent to width {} does not match any outer indentation level", width)
            }
            LexError::MalformedLine { message, .. } => message.clone(),
        }
    }
}

/// Result type for lexer operations
pub type LexResult<T> = Result<T, LexError>;

/// Line lexer for flow scripts
pub struct Lexer<'src> {
    source: &'src str,
    tokens: Vec<Token>,
    indent_stack: Vec<usize>,
    in_fence: bool,
}

impl<'src> Lexer<'src> {
    /// Create a new lexer for the given normalized text
    pub fn new(source: &'src str) -> Self {
        Self {
            source,
            tokens: Vec::new(),
            indent_stack: vec![0],
            in_fence: false,
        }
    }

    /// Get the source text being lexed
    pub fn source(&self) -> &'src str {
        self.source
    }

    /// Tokenize the entire source.
    ///
    /// The stream always ends with a single `Eof`, and every `Indent` is
    /// matched by a `Dedent` before it.
    pub fn tokenize(mut self) -> LexResult<Vec<Token>> {
        let lines: Vec<&str> = self.source.split('\n').collect();
        let count = lines.len();

        for (index, line) in lines.iter().enumerate() {
            let line_no = index + 1;
            self.lex_line(line, line_no)?;
            if line_no < count {
                let column = line.chars().count() + 1;
                self.push(TokenKind::Newline, "\n", line_no, column);
            }
        }

        while self.indent_stack.len() > 1 {
            self.indent_stack.pop();
            self.push(TokenKind::Dedent, "", count, 1);
        }
        self.push(TokenKind::Eof, "", count + 1, 1);

        Ok(self.tokens)
    }

    fn push(&mut self, kind: TokenKind, value: impl Into<String>, line: usize, column: usize) {
        self.tokens.push(Token::new(kind, value, line, column));
    }

    fn current_indent(&self) -> usize {
        self.indent_stack.last().copied().unwrap_or(0)
    }

    fn lex_line(&mut self, line: &str, line_no: usize) -> LexResult<()> {
        let trimmed = line.trim_start();
        let width = line.chars().take_while(|c| c.is_whitespace()).count();

        // Fenced content is passed through verbatim and never changes indentation.
        if self.in_fence {
            if trimmed == FENCE {
                self.in_fence = false;
                self.push(TokenKind::Directive, FENCE, line_no, width + 1);
            } else {
                self.push(TokenKind::Text, line, line_no, 1);
            }
            return Ok(());
        }

        if let Some(language) = fence_language(trimmed) {
            // An opening fence is indented like any other body line; the
            // content and the closing fence leave the stack alone.
            self.indent_to(width, line_no)?;
            self.in_fence = true;
            self.push(TokenKind::Directive, format!("{}{}", FENCE, language), line_no, width + 1);
            return Ok(());
        }

        if trimmed.is_empty() {
            self.push(TokenKind::Text, "", line_no, 1);
            return Ok(());
        }

        check_line(line, line_no)?;
        self.indent_to(width, line_no)?;

        let column = width + 1;
        if directive::keyword_of(trimmed).is_some() {
            self.push(TokenKind::Directive, trimmed.trim_end(), line_no, column);
        } else if trimmed.starts_with('#') {
            self.push(TokenKind::Text, trimmed.trim_end(), line_no, column);
        } else {
            self.push(TokenKind::Text, trimmed, line_no, column);
        }
        Ok(())
    }

    fn indent_to(&mut self, width: usize, line_no: usize) -> LexResult<()> {
        if width > self.current_indent() {
            self.indent_stack.push(width);
            self.push(TokenKind::Indent, " ".repeat(width), line_no, 1);
            return Ok(());
        }

        while width < self.current_indent() {
            self.indent_stack.pop();
            self.push(TokenKind::Dedent, "", line_no, 1);
        }

        if width != self.current_indent() {
            return Err(LexError::InconsistentDedent {
                line: line_no,
                width,
            });
        }
        Ok(())
    }
}

/// Returns the language tag (possibly empty) when `trimmed` opens a fence.
fn fence_language(trimmed: &str) -> Option<&str> {
    let rest = trimmed.strip_prefix(FENCE)?;
    if rest.chars().all(|c| c.is_alphanumeric() || c == '_') {
        Some(rest)
    } else {
        None
    }
}

/// Rejects lines that normalization should have removed.
fn check_line(line: &str, line_no: usize) -> LexResult<()> {
    let indentation: String = line.chars().take_while(|c| c.is_whitespace()).collect();
    if indentation.contains('\t') {
        return Err(LexError::MalformedLine {
            line: line_no,
            message: "tab character in indentation".to_string(),
        });
    }
    if let Some(c) = line.chars().find(|c| c.is_control() && *c != '\t') {
        return Err(LexError::MalformedLine {
            line: line_no,
            message: format!("control character {:?} in line", c),
        });
    }
    Ok(())
}

/// Tokenize normalized text.
pub fn tokenize(source: &str) -> LexResult<Vec<Token>> {
    Lexer::new(source).tokenize()
}

/// Token counts per kind, plus a breakdown of directive keywords.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct TokenStats {
    pub total: usize,
    pub directives: usize,
    pub text: usize,
    pub indents: usize,
    pub dedents: usize,
    pub newlines: usize,
    pub keywords: BTreeMap<String, usize>,
}

impl TokenStats {
    pub fn from_tokens(tokens: &[Token]) -> Self {
        let mut stats = TokenStats {
            total: tokens.len(),
            ..Default::default()
        };
        for token in tokens {
            match token.kind {
                TokenKind::Directive => {
                    stats.directives += 1;
                    let name = token.keyword().map_or(FENCE, |k| k.as_str());
                    *stats.keywords.entry(name.to_string()).or_insert(0) += 1;
                }
                TokenKind::Text => stats.text += 1,
                TokenKind::Indent => stats.indents += 1,
                TokenKind::Dedent => stats.dedents += 1,
                TokenKind::Newline => stats.newlines += 1,
                TokenKind::Eof => {}
            }
        }
        stats
    }
}

impl fmt::Display for TokenStats {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "tokens: {}", self.total)?;
        writeln!(f, "  directive: {}", self.directives)?;
        for (keyword, count) in &self.keywords {
            writeln!(f, "    {}: {}", keyword, count)?;
        }
        writeln!(f, "  text: {}", self.text)?;
        writeln!(f, "  indent: {}", self.indents)?;
        writeln!(f, "  dedent: {}", self.dedents)?;
        write!(f, "  newline: {}", self.newlines)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn kinds(source: &str) -> Vec<TokenKind> {
        tokenize(source).unwrap().into_iter().map(|t| t.kind).collect()
    }

    #[test]
    fn test_task_with_body() {
        use TokenKind::*;
        assert_eq!(
            kinds("@task t\n    hello\n"),
            vec![Directive, Newline, Indent, Text, Newline, Text, Dedent, Eof]
        );
    }

    #[test]
    fn test_token_values_and_positions() {
        let tokens = tokenize("@task t Title\n    do it\n").unwrap();
        assert_eq!(tokens[0], Token::new(TokenKind::Directive, "@task t Title", 1, 1));
        assert_eq!(tokens[1], Token::new(TokenKind::Newline, "\n", 1, 14));
        assert_eq!(tokens[3], Token::new(TokenKind::Text, "do it", 2, 5));
        let eof = tokens.last().unwrap();
        assert_eq!((eof.kind, eof.line), (TokenKind::Eof, 4));
    }

    #[test]
    fn test_indent_dedent_balance() {
        let source = "@task a\n    one\n        deeper\n    back\n@task b\n    x\n            y\n";
        let tokens = tokenize(source).unwrap();
        let indents = tokens.iter().filter(|t| t.kind == TokenKind::Indent).count();
        let dedents = tokens.iter().filter(|t| t.kind == TokenKind::Dedent).count();
        assert_eq!(indents, dedents);
        assert_eq!(indents, 4);
        assert_eq!(tokens.iter().filter(|t| t.kind == TokenKind::Eof).count(), 1);
    }

    #[test]
    fn test_inconsistent_dedent() {
        let err = tokenize("@task a\n        deep\n    half\n").unwrap_err();
        assert_eq!(err, LexError::InconsistentDedent { line: 3, width: 4 });
        assert_eq!(err.line(), 3);
    }

    #[test]
    fn test_fenced_lines_are_never_directives() {
        let source = "@task t\n    ```python\n@task fake\n    @var x = 1\n    ```\n    after\n";
        let tokens = tokenize(source).unwrap();
        let directives: Vec<&str> = tokens
            .iter()
            .filter(|t| t.kind == TokenKind::Directive)
            .map(|t| t.value.as_str())
            .collect();
        assert_eq!(directives, vec!["@task t", "```python", "```"]);
        assert_eq!(tokens[2].kind, TokenKind::Indent);
        assert!(tokens
            .iter()
            .any(|t| t.kind == TokenKind::Text && t.value == "@task fake"));
        assert!(tokens
            .iter()
            .any(|t| t.kind == TokenKind::Text && t.value == "    @var x = 1"));
    }

    #[test]
    fn test_comments_and_unknown_directives_are_text() {
        let tokens = tokenize("  # a comment\n@unknown thing\n").unwrap();
        let texts: Vec<&str> = tokens
            .iter()
            .filter(|t| t.kind == TokenKind::Text)
            .map(|t| t.value.as_str())
            .collect();
        assert_eq!(texts, vec!["# a comment", "@unknown thing", ""]);
    }

    #[test]
    fn test_blank_lines_do_not_dedent() {
        use TokenKind::*;
        assert_eq!(
            kinds("@task t\n    a\n\n    b\n"),
            vec![Directive, Newline, Indent, Text, Newline, Text, Newline, Text, Newline, Text, Dedent, Eof]
        );
    }

    #[test]
    fn test_tab_in_indentation_is_malformed() {
        let err = tokenize("@task t\n\tbody\n").unwrap_err();
        assert!(matches!(err, LexError::MalformedLine { line: 2, .. }));
    }

    #[test]
    fn test_token_stats() {
        let tokens = tokenize("@var x = 1\n@task t\n    @next u\n").unwrap();
        let stats = TokenStats::from_tokens(&tokens);
        assert_eq!(stats.directives, 3);
        assert_eq!(stats.indents, 1);
        assert_eq!(stats.dedents, 1);
        assert_eq!(stats.keywords.get("var"), Some(&1));
        assert_eq!(stats.keywords.get("next"), Some(&1));
    }

    #[test]
    fn test_token_keyword() {
        let tokens = tokenize("@include \"other.flow\"\n```\n```\n").unwrap();
        assert_eq!(tokens[0].keyword(), Some(Keyword::Include));
        assert_eq!(tokens[2].keyword(), None);
    }
}
