//! Tokenizer for `@if` condition expressions.
//!
//! Conditions are never evaluated by the compiler; they are tokenized so that
//! tooling can inspect them and so the validator can flag characters outside
//! the small expression alphabet.

use logos::Logos;
use std::fmt;

/// Tokens of a condition expression
#[derive(Logos, Debug, Clone, PartialEq)]
#[logos(skip r"[ \t]+")]
pub enum ExprToken {
    // ========== Operators ==========
    #[token("==")]
    Eq,
    #[token("!=")]
    NotEq,
    #[token("<=")]
    LtEq,
    #[token(">=")]
    GtEq,
    #[token("<")]
    Lt,
    #[token(">")]
    Gt,
    #[token("&&")]
    And,
    #[token("||")]
    Or,
    #[token("!")]
    Not,

    // ========== Delimiters ==========
    #[token("(")]
    LParen,
    #[token(")")]
    RParen,

    // ========== Operands ==========
    /// `${name}` or `@{name}`
    #[regex(r"[$@]\{[A-Za-z_][A-Za-z0-9_]*\}", |lex| {
        let slice = lex.slice();
        slice[2..slice.len() - 1].to_string()
    })]
    Placeholder(String),

    #[regex(r"-?[0-9]+(\.[0-9]+)?", |lex| lex.slice().to_string())]
    Number(String),

    #[regex(r#""[^"]*"|'[^']*'"#, |lex| {
        let slice = lex.slice();
        slice[1..slice.len() - 1].to_string()
    })]
    Str(String),

    #[regex(r"[A-Za-z_][A-Za-z0-9_.]*", |lex| lex.slice().to_string())]
    Ident(String),
}

impl ExprToken {
    pub fn is_operator(&self) -> bool {
        matches!(
            self,
            ExprToken::Eq
                | ExprToken::NotEq
                | ExprToken::LtEq
                | ExprToken::GtEq
                | ExprToken::Lt
                | ExprToken::Gt
                | ExprToken::And
                | ExprToken::Or
                | ExprToken::Not
        )
    }
}

impl fmt::Display for ExprToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ExprToken::Eq => write!(f, "=="),
            ExprToken::NotEq => write!(f, "!="),
            ExprToken::LtEq => write!(f, "<="),
            ExprToken::GtEq => write!(f, ">="),
            ExprToken::Lt => write!(f, "<"),
            ExprToken::Gt => write!(f, ">"),
            ExprToken::And => write!(f, "&&"),
            ExprToken::Or => write!(f, "||"),
            ExprToken::Not => write!(f, "!"),
            ExprToken::LParen => write!(f, "("),
            ExprToken::RParen => write!(f, ")"),
            ExprToken::Placeholder(name) => write!(f, "${{{}}}", name),
            ExprToken::Number(n) => write!(f, "{}", n),
            ExprToken::Str(s) => write!(f, "{:?}", s),
            ExprToken::Ident(name) => write!(f, "{}", name),
        }
    }
}

/// Expression tokenizer error
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ExprError {
    #[error("unexpected character '{1}' at offset {0}")]
    UnexpectedCharacter(usize, char),
}

/// Tokenize a condition, collecting errors instead of stopping at the first one.
pub fn tokenize_expression(source: &str) -> (Vec<ExprToken>, Vec<ExprError>) {
    let mut tokens = Vec::new();
    let mut errors = Vec::new();

    for (result, span) in ExprToken::lexer(source).spanned() {
        match result {
            Ok(token) => tokens.push(token),
            Err(_) => {
                let bad_char = source[span.clone()].chars().next().unwrap_or('?');
                errors.push(ExprError::UnexpectedCharacter(span.start, bad_char));
            }
        }
    }

    (tokens, errors)
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_comparison_operators() {
        let (tokens, errors) = tokenize_expression("a == 1 && b != 'x' || !done");
        assert!(errors.is_empty());
        assert_eq!(
            tokens,
            vec![
                ExprToken::Ident("a".into()),
                ExprToken::Eq,
                ExprToken::Number("1".into()),
                ExprToken::And,
                ExprToken::Ident("b".into()),
                ExprToken::NotEq,
                ExprToken::Str("x".into()),
                ExprToken::Or,
                ExprToken::Not,
                ExprToken::Ident("done".into()),
            ]
        );
    }

    #[test]
    fn test_relational_and_grouping() {
        let (tokens, _) = tokenize_expression("(retries <= 3) && (score >= 0.5)");
        let operators: Vec<String> = tokens
            .iter()
            .filter(|t| t.is_operator())
            .map(|t| t.to_string())
            .collect();
        assert_eq!(operators, vec!["<=", "&&", ">="]);
    }

    #[test]
    fn test_placeholder_operand() {
        let (tokens, _) = tokenize_expression("${status} == ready");
        assert_eq!(tokens[0], ExprToken::Placeholder("status".into()));
    }

    #[test]
    fn test_unexpected_character() {
        let (tokens, errors) = tokenize_expression("a = b");
        assert_eq!(tokens.len(), 2);
        assert_eq!(errors, vec![ExprError::UnexpectedCharacter(2, '=')]);
    }
}
