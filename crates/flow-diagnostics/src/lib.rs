//! Flow Diagnostics - structured error and warning records for the flow script compiler.
//!
//! Every phase of the pipeline reports problems through the same record so
//! that the CLI, the serializer and the tests can treat them uniformly:
//!
//! - `Diagnostic` - kind, severity, message, location, optional rule tag and suggestions
//! - `DiagnosticKind` - the pipeline phase that produced the record
//! - `Severity` - Error or Warning
//! - `SourceLocation` - file, line and column (1-based)
//! - `render` - terminal rendering with color support
//!
//! # Example
//!
//! ```rust
//! use flow_diagnostics::{Diagnostic, DiagnosticKind, Severity, SourceLocation};
//!
//! let diagnostic = Diagnostic::error(DiagnosticKind::Validation, "circular dependency detected: a -> b")
//!     .at(SourceLocation::new(3, 5))
//!     .with_rule("no_cycles")
//!     .with_suggestion("check the task flow and remove the circular @next reference");
//!
//! assert_eq!(diagnostic.severity, Severity::Error);
//! assert_eq!(diagnostic.rule.as_deref(), Some("no_cycles"));
//! ```

pub mod render;

use serde::Serialize;
use std::fmt;
use std::path::PathBuf;

/// The severity level of a diagnostic.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    /// A problem that fails compilation (always for lex/parse/semantic, in strict mode for validation).
    #[default]
    Error,
    /// Advisory output; compilation continues.
    Warning,
}

impl Severity {
    /// Returns the text prefix for this severity level.
    pub fn prefix(&self) -> &'static str {
        match self {
            Severity::Error => "error",
            Severity::Warning => "warning",
        }
    }

    /// Returns the underline character used by the terminal renderer.
    pub fn underline_char(&self) -> char {
        match self {
            Severity::Error => '^',
            Severity::Warning => '~',
        }
    }

    /// Returns true if this severity level blocks compilation.
    pub fn blocks_compilation(&self) -> bool {
        matches!(self, Severity::Error)
    }
}

/// The pipeline phase a diagnostic originates from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum DiagnosticKind {
    Lex,
    Parse,
    Semantic,
    Validation,
    /// Invariant violation inside the compiler itself.
    Internal,
}

impl DiagnosticKind {
    /// Human-readable phase name.
    pub fn name(&self) -> &'static str {
        match self {
            DiagnosticKind::Lex => "lex",
            DiagnosticKind::Parse => "parse",
            DiagnosticKind::Semantic => "semantic",
            DiagnosticKind::Validation => "validation",
            DiagnosticKind::Internal => "internal",
        }
    }

    /// Short code used in report headers (`L`, `P`, `S`, `V`, `I`).
    pub fn code(&self) -> &'static str {
        match self {
            DiagnosticKind::Lex => "L0001",
            DiagnosticKind::Parse => "P0001",
            DiagnosticKind::Semantic => "S0001",
            DiagnosticKind::Validation => "V0001",
            DiagnosticKind::Internal => "I0001",
        }
    }

    /// Phases whose failures always abort the pipeline.
    pub fn is_fatal(&self) -> bool {
        !matches!(self, DiagnosticKind::Validation)
    }
}

impl fmt::Display for DiagnosticKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// A 1-based position in a source file.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Default, Serialize)]
pub struct SourceLocation {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub file: Option<PathBuf>,
    pub line: usize,
    pub column: usize,
}

impl SourceLocation {
    /// Creates a location without a file.
    pub fn new(line: usize, column: usize) -> Self {
        Self {
            file: None,
            line,
            column,
        }
    }

    /// Attaches a source file path.
    pub fn with_file(mut self, file: impl Into<PathBuf>) -> Self {
        self.file = Some(file.into());
        self
    }

    /// Returns true when no line information is available.
    pub fn is_unknown(&self) -> bool {
        self.line == 0
    }
}

impl fmt::Display for SourceLocation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.file {
            Some(file) => write!(f, "{}:{}:{}", file.display(), self.line, self.column),
            None => write!(f, "{}:{}", self.line, self.column),
        }
    }
}

/// A compiler diagnostic (error or warning).
///
/// Lex, parse and semantic failures become a single error diagnostic each;
/// the validator produces a list of them, each tagged with the rule that
/// fired and free-text remediation suggestions.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Diagnostic {
    pub kind: DiagnosticKind,
    pub severity: Severity,
    pub message: String,
    pub location: SourceLocation,
    /// The validation rule that produced this diagnostic, if any.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub rule: Option<String>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub suggestions: Vec<String>,
}

impl Diagnostic {
    /// Creates a new diagnostic with the given kind, severity and message.
    pub fn new(kind: DiagnosticKind, severity: Severity, message: impl Into<String>) -> Self {
        Self {
            kind,
            severity,
            message: message.into(),
            location: SourceLocation::default(),
            rule: None,
            suggestions: Vec::new(),
        }
    }

    /// Creates an error diagnostic.
    pub fn error(kind: DiagnosticKind, message: impl Into<String>) -> Self {
        Self::new(kind, Severity::Error, message)
    }

    /// Creates a warning diagnostic.
    pub fn warning(kind: DiagnosticKind, message: impl Into<String>) -> Self {
        Self::new(kind, Severity::Warning, message)
    }

    /// Sets the location of this diagnostic.
    pub fn at(mut self, location: SourceLocation) -> Self {
        self.location = location;
        self
    }

    /// Sets the source file, keeping line and column.
    pub fn in_file(mut self, file: impl Into<PathBuf>) -> Self {
        self.location.file = Some(file.into());
        self
    }

    /// Tags the diagnostic with a validation rule id.
    pub fn with_rule(mut self, rule: impl Into<String>) -> Self {
        self.rule = Some(rule.into());
        self
    }

    /// Adds a remediation suggestion.
    pub fn with_suggestion(mut self, suggestion: impl Into<String>) -> Self {
        self.suggestions.push(suggestion.into());
        self
    }

    /// Adds multiple suggestions.
    pub fn with_suggestions<I, S>(mut self, suggestions: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.suggestions.extend(suggestions.into_iter().map(Into::into));
        self
    }

    pub fn is_error(&self) -> bool {
        self.severity.blocks_compilation()
    }

    /// The code shown in report headers: the rule tag if present, otherwise the phase code.
    pub fn code(&self) -> &str {
        self.rule.as_deref().unwrap_or_else(|| self.kind.code())
    }
}

impl fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}[{}]: {}", self.severity.prefix(), self.code(), self.message)?;
        if !self.location.is_unknown() {
            write!(f, " at {}", self.location)?;
        }
        Ok(())
    }
}

/// Counts of diagnostics by severity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct DiagnosticSummary {
    pub errors: usize,
    pub warnings: usize,
}

impl DiagnosticSummary {
    pub fn from_diagnostics<'a>(diagnostics: impl IntoIterator<Item = &'a Diagnostic>) -> Self {
        let mut summary = Self::default();
        for diagnostic in diagnostics {
            match diagnostic.severity {
                Severity::Error => summary.errors += 1,
                Severity::Warning => summary.warnings += 1,
            }
        }
        summary
    }

    pub fn has_errors(&self) -> bool {
        self.errors > 0
    }
}

impl fmt::Display for DiagnosticSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let plural = |n: usize| if n == 1 { "" } else { "s" };
        match (self.errors, self.warnings) {
            (0, 0) => write!(f, "no problems found"),
            (e, 0) => write!(f, "{} error{}", e, plural(e)),
            (0, w) => write!(f, "{} warning{}", w, plural(w)),
            (e, w) => write!(f, "{} error{} and {} warning{}", e, plural(e), w, plural(w)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_diagnostic_builder() {
        let diagnostic = Diagnostic::warning(DiagnosticKind::Validation, "task 'a' has no content")
            .at(SourceLocation::new(4, 1).with_file("flow.txt"))
            .with_rule("task_content")
            .with_suggestions(["add body text", "remove the task"]);

        assert_eq!(diagnostic.severity, Severity::Warning);
        assert!(!diagnostic.is_error());
        assert_eq!(diagnostic.code(), "task_content");
        assert_eq!(diagnostic.suggestions.len(), 2);
        assert_eq!(diagnostic.location.to_string(), "flow.txt:4:1");
    }

    #[test]
    fn test_diagnostic_display_without_rule_uses_phase_code() {
        let diagnostic =
            Diagnostic::error(DiagnosticKind::Semantic, "undefined reference: missing").at(SourceLocation::new(2, 5));
        assert_eq!(
            diagnostic.to_string(),
            "error[S0001]: undefined reference: missing at 2:5"
        );
    }

    #[test]
    fn test_unknown_location_is_omitted() {
        let diagnostic = Diagnostic::error(DiagnosticKind::Internal, "optimizer invariant broken");
        assert_eq!(diagnostic.to_string(), "error[I0001]: optimizer invariant broken");
    }

    #[test]
    fn test_kind_fatality() {
        assert!(DiagnosticKind::Lex.is_fatal());
        assert!(DiagnosticKind::Semantic.is_fatal());
        assert!(!DiagnosticKind::Validation.is_fatal());
    }

    #[test]
    fn test_summary() {
        let diagnostics = vec![
            Diagnostic::error(DiagnosticKind::Validation, "a"),
            Diagnostic::warning(DiagnosticKind::Validation, "b"),
            Diagnostic::warning(DiagnosticKind::Validation, "c"),
        ];
        let summary = DiagnosticSummary::from_diagnostics(&diagnostics);
        assert_eq!(summary, DiagnosticSummary { errors: 1, warnings: 2 });
        assert_eq!(summary.to_string(), "1 error and 2 warnings");
        assert_eq!(DiagnosticSummary::default().to_string(), "no problems found");
    }
}
