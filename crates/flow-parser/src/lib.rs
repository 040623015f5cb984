//! Flow Script Parser
//!
//! Recursive descent parser that turns the lexer's token stream into an
//! arena `Ast`. Every directive keyword has its own grammar (see
//! `flow_lexer::directive`); bodies are indented regions opened by an
//! `Indent` token and closed by the matching `Dedent`.

mod program;

pub use program::to_program;

use flow_ast::{Ast, IndexMap, Literal, NodeId, NodeKind, VarScope};
use flow_lexer::directive::{self, DirectiveHead, DirectiveParams, Keyword};
use flow_lexer::{Token, TokenKind, FENCE};
use thiserror::Error;

/// Parser error type
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ParseError {
    #[error("line {line}: unknown directive '{token}'")]
    UnknownDirective {
        line: usize,
        column: usize,
        token: String,
    },

    #[error("line {line}: malformed {keyword} directive, expected `{usage}`")]
    GrammarMismatch {
        line: usize,
        column: usize,
        token: String,
        keyword: Keyword,
        usage: &'static str,
    },

    #[error("line {line}: unexpected {found} {context}")]
    UnexpectedToken {
        line: usize,
        column: usize,
        token: String,
        found: TokenKind,
        context: &'static str,
    },
}

impl ParseError {
    pub fn line(&self) -> usize {
        match self {
            ParseError::UnknownDirective { line, .. }
            | ParseError::GrammarMismatch { line, .. }
            | ParseError::UnexpectedToken { line, .. } => *line,
        }
    }

    pub fn column(&self) -> usize {
        match self {
            ParseError::UnknownDirective { column, .. }
            | ParseError::GrammarMismatch { column, .. }
            | ParseError::UnexpectedToken { column, .. } => *column,
        }
    }

    /// Text of the offending token
    pub fn token(&self) -> &str {
        match self {
            ParseError::UnknownDirective { token, .. }
            | ParseError::GrammarMismatch { token, .. }
            | ParseError::UnexpectedToken { token, .. } => token,
        }
    }

    /// The message without the line prefix.
    pub fn message(&self) -> String {
        match self {
            ParseError::UnknownDirective { token, .. } => format!("unknown directive '{}'", token),
            ParseError::GrammarMismatch { keyword, usage, .. } => {
                format!("malformed {} directive, expected `{}`", keyword, usage)
            }
            ParseError::UnexpectedToken { found, context, .. } => {
                format!("unexpected {} {}", found, context)
            }
        }
    }
}

/// Result type for parser operations
pub type ParseResult<T> = Result<T, ParseError>;

/// Usage line for a keyword, shown when its parameters do not parse.
pub fn usage(keyword: Keyword) -> &'static str {
    match keyword {
        Keyword::Task => "@task <id> [title]",
        Keyword::Tool => "@tool <name> [description]",
        Keyword::Var => "@var <name>[ = <value>]",
        Keyword::If => "@if <condition>",
        Keyword::Else => "@else",
        Keyword::Endif => "@endif",
        Keyword::Include => "@include <path>",
        Keyword::Agent => "@agent <Name>[(<params>)]",
        Keyword::Lang => "@lang <tag>",
        Keyword::Next => "@next <target>",
    }
}

/// Parser state
pub struct Parser {
    tokens: Vec<Token>,
    pos: usize,
    ast: Ast,
}

impl Parser {
    pub fn new(tokens: Vec<Token>) -> Self {
        Self {
            tokens,
            pos: 0,
            ast: Ast::new(),
        }
    }

    /// Parse the whole token stream into a tree.
    pub fn parse(mut self) -> ParseResult<Ast> {
        let root = self.ast.root();
        loop {
            self.skip_trivia();
            match self.current_kind() {
                None => break,
                Some(TokenKind::Eof) => {
                    if self.pos + 1 == self.tokens.len() {
                        break;
                    }
                    return Err(self.unexpected("before the end of the token stream"));
                }
                Some(TokenKind::Dedent) => return Err(self.unexpected("at top level")),
                Some(_) => self.parse_item(root)?,
            }
        }
        Ok(self.ast)
    }

    // ========================================================================
    // Token Navigation
    // ========================================================================

    fn current(&self) -> Option<&Token> {
        self.tokens.get(self.pos)
    }

    fn current_kind(&self) -> Option<TokenKind> {
        self.current().map(|t| t.kind)
    }

    fn check(&self, kind: TokenKind) -> bool {
        self.current_kind() == Some(kind)
    }

    fn advance(&mut self) -> Option<Token> {
        let token = self.tokens.get(self.pos).cloned();
        if token.is_some() {
            self.pos += 1;
        }
        token
    }

    /// Skip newlines and blank text lines.
    fn skip_trivia(&mut self) {
        while let Some(token) = self.current() {
            if token.kind.is_trivia() || token.is_blank_text() {
                self.pos += 1;
            } else {
                break;
            }
        }
    }

    fn unexpected(&self, context: &'static str) -> ParseError {
        match self.current() {
            Some(token) => ParseError::UnexpectedToken {
                line: token.line,
                column: token.column,
                token: token.value.clone(),
                found: token.kind,
                context,
            },
            None => ParseError::UnexpectedToken {
                line: self.tokens.last().map_or(1, |t| t.line),
                column: 1,
                token: String::new(),
                found: TokenKind::Eof,
                context,
            },
        }
    }

    // ========================================================================
    // Items and Bodies
    // ========================================================================

    fn parse_item(&mut self, owner: NodeId) -> ParseResult<()> {
        let Some(kind) = self.current_kind() else {
            return Ok(());
        };

        match kind {
            TokenKind::Newline => {
                self.advance();
                Ok(())
            }
            TokenKind::Text => {
                if let Some(token) = self.advance() {
                    self.parse_text(owner, token);
                }
                Ok(())
            }
            TokenKind::Directive => self.parse_directive(owner),
            TokenKind::Indent => {
                if let Some(token) = self.advance() {
                    let block = self.ast.add_child(owner, NodeKind::Block, token.line, token.column);
                    self.parse_block_contents(block)?;
                }
                Ok(())
            }
            TokenKind::Dedent | TokenKind::Eof => Err(self.unexpected("in body position")),
        }
    }

    fn parse_text(&mut self, owner: NodeId, token: Token) {
        if let NodeKind::Tool { parameters, .. } = self.ast.kind_mut(owner) {
            if let Some((key, value)) = tool_parameter(&token.value) {
                parameters.insert(key.to_string(), value.to_string());
                return;
            }
        }
        self.ast
            .add_child(owner, NodeKind::text(token.value), token.line, token.column);
    }

    /// Optional indented body following a directive.
    fn parse_body(&mut self, owner: NodeId) -> ParseResult<()> {
        self.skip_trivia();
        if !self.check(TokenKind::Indent) {
            return Ok(());
        }
        self.advance();
        self.parse_block_contents(owner)
    }

    /// Items up to and including the closing `Dedent`.
    fn parse_block_contents(&mut self, owner: NodeId) -> ParseResult<()> {
        loop {
            self.skip_trivia();
            match self.current_kind() {
                None | Some(TokenKind::Eof) => return Ok(()),
                Some(TokenKind::Dedent) => {
                    self.advance();
                    return Ok(());
                }
                Some(_) => self.parse_item(owner)?,
            }
        }
    }

    // ========================================================================
    // Directives
    // ========================================================================

    fn parse_directive(&mut self, owner: NodeId) -> ParseResult<()> {
        let Some(token) = self.advance() else {
            return Ok(());
        };

        match directive::classify(&token.value) {
            Some(DirectiveHead::Fence(language)) => {
                let language = language.map(str::to_string);
                self.parse_fence(owner, &token, language);
                Ok(())
            }
            Some(DirectiveHead::Keyword(keyword, rest)) => {
                let params = directive::parse_params(keyword, rest).ok_or_else(|| {
                    ParseError::GrammarMismatch {
                        line: token.line,
                        column: token.column,
                        token: token.value.clone(),
                        keyword,
                        usage: usage(keyword),
                    }
                })?;
                let kind = self.node_kind(params, owner);
                let node = self.ast.add_child(owner, kind, token.line, token.column);
                if keyword.has_body() {
                    self.parse_body(node)?;
                }
                Ok(())
            }
            Some(DirectiveHead::Unknown(_)) | None => Err(ParseError::UnknownDirective {
                line: token.line,
                column: token.column,
                token: token.value.clone(),
            }),
        }
    }

    fn node_kind(&self, params: DirectiveParams, owner: NodeId) -> NodeKind {
        match params {
            DirectiveParams::Task { id, title } => NodeKind::Task {
                id: id.into(),
                title,
                needs_default_body: false,
            },
            DirectiveParams::Tool { name, description } => NodeKind::Tool {
                name: name.into(),
                description,
                parameters: IndexMap::new(),
            },
            DirectiveParams::Var { name, value } => NodeKind::Var {
                name: name.into(),
                value: value.as_deref().map(infer_literal),
                ty: None,
                scope: if owner == self.ast.root() {
                    VarScope::Global
                } else {
                    VarScope::Local
                },
            },
            DirectiveParams::If { condition } => NodeKind::If { condition },
            DirectiveParams::Else => NodeKind::Else,
            DirectiveParams::Endif => NodeKind::Endif,
            DirectiveParams::Include { path } => NodeKind::Include { path },
            DirectiveParams::Agent { name, params } => NodeKind::Agent {
                name: name.into(),
                params,
            },
            DirectiveParams::Lang { language } => NodeKind::Lang { language },
            DirectiveParams::Next { target } => NodeKind::Next {
                target: target.into(),
            },
        }
    }

    /// Fence content up to the closing fence, or to the end of input when
    /// the fence is never closed.
    fn parse_fence(&mut self, owner: NodeId, open: &Token, language: Option<String>) {
        let indent = open.column.saturating_sub(1);
        let mut lines: Vec<String> = Vec::new();
        let mut closed = false;

        loop {
            let Some(token) = self.current() else { break };
            match token.kind {
                TokenKind::Text => lines.push(strip_indent(&token.value, indent).to_string()),
                TokenKind::Newline => {}
                TokenKind::Directive if token.value == FENCE => {
                    self.advance();
                    closed = true;
                    break;
                }
                _ => break,
            }
            self.advance();
        }

        if !closed {
            while lines.last().is_some_and(|l| l.is_empty()) {
                lines.pop();
            }
        }

        self.ast.add_child(
            owner,
            NodeKind::Code {
                language,
                content: lines.join("\n"),
            },
            open.line,
            open.column,
        );
    }
}

/// Remove up to `width` leading spaces.
fn strip_indent(line: &str, width: usize) -> &str {
    let spaces = line.bytes().take(width).take_while(|&b| b == b' ').count();
    &line[spaces..]
}

/// `key: value` lines inside a tool body. The key is a single lowercase word
/// (`_` and `-` allowed), so capitalized prose such as `Note: retry twice`
/// stays description text.
fn tool_parameter(line: &str) -> Option<(&str, &str)> {
    let (key, rest) = line.split_once(':')?;
    if !is_parameter_key(key) {
        return None;
    }
    if !rest.starts_with(char::is_whitespace) {
        return None;
    }
    let value = rest.trim();
    if value.is_empty() {
        return None;
    }
    Some((key, value))
}

fn is_parameter_key(key: &str) -> bool {
    let mut chars = key.chars();
    match chars.next() {
        Some(c) if c.is_ascii_lowercase() || c == '_' => {}
        _ => return false,
    }
    chars.all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '-')
}

/// Infer a typed literal from the raw text of a `@var` value.
///
/// Tried in order: integer, float, boolean, null, quoted string, bare string.
pub fn infer_literal(raw: &str) -> Literal {
    let text = raw.trim();

    if let Ok(n) = text.parse::<i64>() {
        return Literal::Int(n);
    }
    if looks_numeric(text) {
        if let Ok(x) = text.parse::<f64>() {
            if x.is_finite() {
                return Literal::Float(x);
            }
        }
    }

    let lower = text.to_ascii_lowercase();
    match lower.as_str() {
        "true" => return Literal::Bool(true),
        "false" => return Literal::Bool(false),
        "null" | "none" => return Literal::None,
        _ => {}
    }

    let unquoted = directive::strip_quotes(text);
    if unquoted.len() != text.len() {
        return Literal::Str(unquoted.to_string());
    }
    Literal::Str(text.to_string())
}

fn looks_numeric(text: &str) -> bool {
    text.bytes().any(|b| b.is_ascii_digit())
        && text
            .bytes()
            .all(|b| b.is_ascii_digit() || matches!(b, b'.' | b'-' | b'+' | b'e' | b'E'))
}

/// Parse a token stream.
pub fn parse(tokens: Vec<Token>) -> ParseResult<Ast> {
    Parser::new(tokens).parse()
}

#[cfg(test)]
mod tests {
    use super::*;
    use flow_lexer::tokenize;
    use pretty_assertions::assert_eq;

    fn parse_source(source: &str) -> Ast {
        parse(tokenize(source).unwrap()).unwrap()
    }

    fn parse_err(source: &str) -> ParseError {
        parse(tokenize(source).unwrap()).unwrap_err()
    }

    #[test]
    fn test_parse_task_with_body() {
        let ast = parse_source("@task load_data Load the data\n    read the file\n    @next clean\n");
        insta::assert_snapshot!(ast.dump(), @r###"
        root
          task load_data "Load the data"
            text "read the file"
            next clean
        "###);
    }

    #[test]
    fn test_parse_conditional_runs() {
        let source = "\
@task check
    @if ${ready}
        go
    @else
        wait
    @endif
";
        insta::assert_snapshot!(parse_source(source).dump(), @r###"
        root
          task check
            if ${ready}
              text "go"
            else
              text "wait"
            endif
        "###);
    }

    #[test]
    fn test_var_literal_inference() {
        let ast = parse_source("@var a = 10\n@var b = 2.5\n@var c = TRUE\n@var d = none\n@var e = 'hi'\n@var f = plain words\n@var g\n");
        let values: Vec<Option<Literal>> = ast
            .children(ast.root())
            .iter()
            .map(|&id| match ast.kind(id) {
                NodeKind::Var { value, .. } => value.clone(),
                other => panic!("unexpected node {}", other),
            })
            .collect();
        assert_eq!(
            values,
            vec![
                Some(Literal::Int(10)),
                Some(Literal::Float(2.5)),
                Some(Literal::Bool(true)),
                Some(Literal::None),
                Some(Literal::Str("hi".into())),
                Some(Literal::Str("plain words".into())),
                None,
            ]
        );
    }

    #[test]
    fn test_infer_literal_edge_cases() {
        assert_eq!(infer_literal("-3"), Literal::Int(-3));
        assert_eq!(infer_literal("1e3"), Literal::Float(1000.0));
        assert_eq!(infer_literal("inf"), Literal::Str("inf".into()));
        assert_eq!(infer_literal("\"quoted\""), Literal::Str("quoted".into()));
        assert_eq!(infer_literal("2 + 3"), Literal::Str("2 + 3".into()));
    }

    #[test]
    fn test_nested_var_is_local() {
        let ast = parse_source("@var x = 1\n@task t\n    @var x = 2\n");
        let task = ast.find_task("t").unwrap();
        let inner = ast.children(task)[0];
        assert!(matches!(ast.kind(inner), NodeKind::Var { scope: VarScope::Local, .. }));
        let outer = ast.children(ast.root())[0];
        assert!(matches!(ast.kind(outer), NodeKind::Var { scope: VarScope::Global, .. }));
    }

    #[test]
    fn test_tool_parameters() {
        let ast = parse_source("@tool http Fetch pages\n    port: 8080\n    timeout: 30s\n    Fetches a page.\n");
        let tool = ast.children(ast.root())[0];
        match ast.kind(tool) {
            NodeKind::Tool { parameters, .. } => {
                let pairs: Vec<(&str, &str)> =
                    parameters.iter().map(|(k, v)| (k.as_str(), v.as_str())).collect();
                assert_eq!(pairs, vec![("port", "8080"), ("timeout", "30s")]);
            }
            other => panic!("expected tool, got {}", other),
        }
        assert_eq!(ast.text_children(tool), vec!["Fetches a page."]);
    }

    #[test]
    fn test_prose_with_colon_stays_text() {
        let source = "@tool http
    Note: retry twice
    see also: the docs
    max-retries: 3
    port: 8080
";
        let ast = parse_source(source);
        let tool = ast.children(ast.root())[0];
        match ast.kind(tool) {
            NodeKind::Tool { parameters, .. } => {
                let keys: Vec<&str> = parameters.keys().map(|k| k.as_str()).collect();
                assert_eq!(keys, vec!["max-retries", "port"]);
            }
            other => panic!("expected tool, got {}", other),
        }
        assert_eq!(ast.text_children(tool), vec!["Note: retry twice", "see also: the docs"]);
    }

    #[test]
    fn test_fenced_code_becomes_code_node() {
        let source = "@task t\n    ```python\n    print('hi')\n    @task fake\n    ```\n    after\n";
        let ast = parse_source(source);
        insta::assert_snapshot!(ast.dump(), @r###"
        root
          task t
            code python "print('hi')\n@task fake"
            text "after"
        "###);
    }

    #[test]
    fn test_unclosed_fence_runs_to_end() {
        let ast = parse_source("```\nline one\n");
        let code = ast.children(ast.root())[0];
        assert_eq!(
            ast.kind(code),
            &NodeKind::Code {
                language: None,
                content: "line one".into()
            }
        );
    }

    #[test]
    fn test_top_level_indent_is_block() {
        let ast = parse_source("intro\n    indented note\n");
        insta::assert_snapshot!(ast.dump(), @r###"
        root
          text "intro"
          block
            text "indented note"
        "###);
    }

    #[test]
    fn test_blank_lines_are_skipped() {
        let ast = parse_source("@task a\n    one\n\n    two\n\n@task b\n");
        let a = ast.find_task("a").unwrap();
        assert_eq!(ast.text_children(a), vec!["one", "two"]);
        assert_eq!(ast.tasks().len(), 2);
    }

    #[test]
    fn test_grammar_mismatch() {
        let err = parse_err("@task my-task\n");
        assert!(matches!(
            err,
            ParseError::GrammarMismatch {
                line: 1,
                keyword: Keyword::Task,
                ..
            }
        ));
        assert_eq!(err.token(), "@task my-task");
        assert_eq!(err.message(), "malformed @task directive, expected `@task <id> [title]`");
    }

    #[test]
    fn test_unknown_directive_in_hand_built_stream() {
        let tokens = vec![
            Token::new(TokenKind::Directive, "@bogus x", 1, 1),
            Token::new(TokenKind::Eof, "", 2, 1),
        ];
        let err = parse(tokens).unwrap_err();
        assert_eq!(
            err,
            ParseError::UnknownDirective {
                line: 1,
                column: 1,
                token: "@bogus x".into()
            }
        );
    }

    #[test]
    fn test_unexpected_tokens() {
        let dedent_first = vec![
            Token::new(TokenKind::Dedent, "", 1, 1),
            Token::new(TokenKind::Eof, "", 2, 1),
        ];
        assert!(matches!(
            parse(dedent_first),
            Err(ParseError::UnexpectedToken {
                found: TokenKind::Dedent,
                ..
            })
        ));

        let early_eof = vec![
            Token::new(TokenKind::Eof, "", 1, 1),
            Token::new(TokenKind::Text, "late", 2, 1),
        ];
        assert!(matches!(
            parse(early_eof),
            Err(ParseError::UnexpectedToken {
                found: TokenKind::Eof,
                ..
            })
        ));
    }
}
