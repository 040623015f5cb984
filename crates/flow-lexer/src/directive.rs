//! Directive keywords and their parameter grammars.
//!
//! Each keyword has a pure sub-parser that turns the text after the keyword
//! into typed fields. A sub-parser returns `None` when the text does not fit
//! the keyword's grammar; the parser reports that as a `ParseError`.

use serde::Serialize;
use std::fmt;

/// The fixed set of directive keywords.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Keyword {
    Task,
    Tool,
    Var,
    If,
    Else,
    Endif,
    Include,
    Agent,
    Lang,
    Next,
}

impl Keyword {
    pub const ALL: [Keyword; 10] = [
        Keyword::Task,
        Keyword::Tool,
        Keyword::Var,
        Keyword::If,
        Keyword::Else,
        Keyword::Endif,
        Keyword::Include,
        Keyword::Agent,
        Keyword::Lang,
        Keyword::Next,
    ];

    pub fn from_word(word: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|k| k.as_str() == word)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Keyword::Task => "task",
            Keyword::Tool => "tool",
            Keyword::Var => "var",
            Keyword::If => "if",
            Keyword::Else => "else",
            Keyword::Endif => "endif",
            Keyword::Include => "include",
            Keyword::Agent => "agent",
            Keyword::Lang => "lang",
            Keyword::Next => "next",
        }
    }

    /// Keywords followed by an optional indented body.
    pub fn has_body(&self) -> bool {
        matches!(self, Keyword::Task | Keyword::Tool | Keyword::If | Keyword::Else)
    }
}

impl fmt::Display for Keyword {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "@{}", self.as_str())
    }
}

/// What the text of a directive token denotes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DirectiveHead<'a> {
    /// `@keyword rest`, with leading whitespace trimmed from `rest`
    Keyword(Keyword, &'a str),
    /// A code fence; the tag is `None` for a bare fence
    Fence(Option<&'a str>),
    /// `@word` where `word` is outside the keyword set
    Unknown(&'a str),
}

/// Classify the text of a directive line.
pub fn classify(text: &str) -> Option<DirectiveHead<'_>> {
    let text = text.trim();
    if let Some(tag) = text.strip_prefix(crate::FENCE) {
        return Some(DirectiveHead::Fence(if tag.is_empty() { None } else { Some(tag) }));
    }

    let body = text.strip_prefix('@')?;
    let end = body.find(char::is_whitespace).unwrap_or(body.len());
    let (word, rest) = body.split_at(end);
    Some(match Keyword::from_word(word) {
        Some(keyword) => DirectiveHead::Keyword(keyword, rest.trim_start()),
        None => DirectiveHead::Unknown(word),
    })
}

pub(crate) fn keyword_of(line: &str) -> Option<Keyword> {
    match classify(line)? {
        DirectiveHead::Keyword(keyword, _) => Some(keyword),
        _ => None,
    }
}

/// Structured fields of a directive, one variant per keyword.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DirectiveParams {
    Task { id: String, title: Option<String> },
    Tool { name: String, description: Option<String> },
    Var { name: String, value: Option<String> },
    If { condition: String },
    Else,
    Endif,
    Include { path: String },
    Agent { name: String, params: Option<String> },
    Lang { language: String },
    Next { target: String },
}

/// Parse the text following `keyword` according to that keyword's grammar.
pub fn parse_params(keyword: Keyword, rest: &str) -> Option<DirectiveParams> {
    match keyword {
        Keyword::Task => parse_task(rest),
        Keyword::Tool => parse_tool(rest),
        Keyword::Var => parse_var(rest),
        Keyword::If => parse_if(rest),
        Keyword::Else => Some(DirectiveParams::Else),
        Keyword::Endif => Some(DirectiveParams::Endif),
        Keyword::Include => parse_include(rest),
        Keyword::Agent => parse_agent(rest),
        Keyword::Lang => non_empty(rest).map(|language| DirectiveParams::Lang { language }),
        Keyword::Next => non_empty(rest).map(|target| DirectiveParams::Next { target }),
    }
}

/// `<id> [title...]`
pub fn parse_task(rest: &str) -> Option<DirectiveParams> {
    let (id, tail) = leading_word(rest.trim())?;
    let title = optional_tail(tail)?;
    Some(DirectiveParams::Task {
        id: id.to_string(),
        title,
    })
}

/// `<name> [description...]`
pub fn parse_tool(rest: &str) -> Option<DirectiveParams> {
    let (name, tail) = leading_word(rest.trim())?;
    let description = optional_tail(tail)?;
    Some(DirectiveParams::Tool {
        name: name.to_string(),
        description,
    })
}

/// `<name>[ = <value>]`
pub fn parse_var(rest: &str) -> Option<DirectiveParams> {
    let (name, tail) = leading_word(rest.trim())?;
    let tail = tail.trim_start();
    let value = if tail.is_empty() {
        None
    } else {
        non_empty(tail.strip_prefix('=')?)
    };
    Some(DirectiveParams::Var {
        name: name.to_string(),
        value,
    })
}

/// `<condition...>`
pub fn parse_if(rest: &str) -> Option<DirectiveParams> {
    non_empty(rest).map(|condition| DirectiveParams::If { condition })
}

/// `<path>`, optionally quoted
pub fn parse_include(rest: &str) -> Option<DirectiveParams> {
    let path = non_empty(strip_quotes(rest.trim()))?;
    Some(DirectiveParams::Include { path })
}

/// `<Name>[(<params>)]`
pub fn parse_agent(rest: &str) -> Option<DirectiveParams> {
    let (name, tail) = leading_word(rest.trim())?;
    let tail = tail.trim();
    let params = if tail.is_empty() {
        None
    } else {
        let inner = tail.strip_prefix('(')?.strip_suffix(')')?;
        non_empty(inner)
    };
    Some(DirectiveParams::Agent {
        name: name.to_string(),
        params,
    })
}

/// Remove one layer of matching single or double quotes.
pub fn strip_quotes(text: &str) -> &str {
    for quote in ['"', '\''] {
        if text.len() >= 2 && text.starts_with(quote) && text.ends_with(quote) {
            return &text[1..text.len() - 1];
        }
    }
    text
}

fn is_word_char(c: char) -> bool {
    c.is_alphanumeric() || c == '_'
}

/// Split a leading `\w+` word off `text`.
fn leading_word(text: &str) -> Option<(&str, &str)> {
    let end = text.find(|c: char| !is_word_char(c)).unwrap_or(text.len());
    if end == 0 {
        return None;
    }
    Some(text.split_at(end))
}

/// What may follow a word: nothing, or whitespace and free text.
fn optional_tail(tail: &str) -> Option<Option<String>> {
    if tail.is_empty() {
        return Some(None);
    }
    if !tail.starts_with(char::is_whitespace) {
        return None;
    }
    Some(non_empty(tail))
}

fn non_empty(text: &str) -> Option<String> {
    let text = text.trim();
    if text.is_empty() {
        None
    } else {
        Some(text.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_classify() {
        assert_eq!(
            classify("@task build Build it"),
            Some(DirectiveHead::Keyword(Keyword::Task, "build Build it"))
        );
        assert_eq!(classify("```rust"), Some(DirectiveHead::Fence(Some("rust"))));
        assert_eq!(classify("```"), Some(DirectiveHead::Fence(None)));
        assert_eq!(classify("@tasks x"), Some(DirectiveHead::Unknown("tasks")));
        assert_eq!(classify("plain"), None);
    }

    #[test]
    fn test_task_params() {
        assert_eq!(
            parse_task("load_data Load the data"),
            Some(DirectiveParams::Task {
                id: "load_data".into(),
                title: Some("Load the data".into()),
            })
        );
        assert_eq!(
            parse_task("t"),
            Some(DirectiveParams::Task {
                id: "t".into(),
                title: None
            })
        );
        assert_eq!(parse_task("my-task"), None);
        assert_eq!(parse_task(""), None);
    }

    #[test]
    fn test_var_params() {
        assert_eq!(
            parse_var("x = 10"),
            Some(DirectiveParams::Var {
                name: "x".into(),
                value: Some("10".into()),
            })
        );
        assert_eq!(
            parse_var("greeting=\"hi there\""),
            Some(DirectiveParams::Var {
                name: "greeting".into(),
                value: Some("\"hi there\"".into()),
            })
        );
        assert_eq!(
            parse_var("empty"),
            Some(DirectiveParams::Var {
                name: "empty".into(),
                value: None
            })
        );
        assert_eq!(parse_var("x 10"), None);
    }

    #[test]
    fn test_agent_params() {
        assert_eq!(
            parse_agent("Reviewer(strict, depth=2)"),
            Some(DirectiveParams::Agent {
                name: "Reviewer".into(),
                params: Some("strict, depth=2".into()),
            })
        );
        assert_eq!(
            parse_agent("Reviewer"),
            Some(DirectiveParams::Agent {
                name: "Reviewer".into(),
                params: None
            })
        );
        assert_eq!(parse_agent("Reviewer extra"), None);
    }

    #[test]
    fn test_single_value_params() {
        assert_eq!(
            parse_include("'shared/common.flow'"),
            Some(DirectiveParams::Include {
                path: "shared/common.flow".into()
            })
        );
        assert_eq!(parse_if("   "), None);
        assert_eq!(
            parse_params(Keyword::Next, "deploy"),
            Some(DirectiveParams::Next {
                target: "deploy".into()
            })
        );
        assert_eq!(parse_params(Keyword::Lang, ""), None);
        assert_eq!(parse_params(Keyword::Endif, "trailing"), Some(DirectiveParams::Endif));
    }

    #[test]
    fn test_keyword_roundtrip() {
        for keyword in Keyword::ALL {
            assert_eq!(Keyword::from_word(keyword.as_str()), Some(keyword));
        }
        assert_eq!(Keyword::If.to_string(), "@if");
    }
}
