//! Validation of Analyzed Flow Scripts
//!
//! A rule-based checker that runs after semantic analysis. Unlike the
//! analyzer it never stops at the first problem: every rule runs over the
//! whole tree and the findings are accumulated into a `ValidationReport`.
//! Whether errors in the report fail a compilation is the caller's decision.
//!
//! # Adding a New Rule
//!
//! 1. Create a new file in `rules/`
//! 2. Implement `ValidationRule` for your struct
//! 3. Add it to `Validator::with_default_rules()`

pub mod rules;

pub use flow_diagnostics::Severity;

use flow_ast::{Ast, NodeId, NodeKind};
use flow_diagnostics::{Diagnostic, DiagnosticKind, SourceLocation};
use rustc_hash::FxHashMap;
use serde::Serialize;
use std::fmt;

// ============================================================================
// Validation Error Types
// ============================================================================

/// One finding produced by a rule
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ValidationError {
    pub severity: Severity,
    /// Which rule produced this finding
    pub rule: &'static str,
    pub message: String,
    pub line: usize,
    pub column: usize,
    #[serde(skip)]
    pub node: Option<NodeId>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub suggestions: Vec<String>,
}

impl ValidationError {
    pub fn error(rule: &'static str, ast: &Ast, node: NodeId, message: impl Into<String>) -> Self {
        Self::new(Severity::Error, rule, ast, node, message)
    }

    pub fn warning(rule: &'static str, ast: &Ast, node: NodeId, message: impl Into<String>) -> Self {
        Self::new(Severity::Warning, rule, ast, node, message)
    }

    fn new(severity: Severity, rule: &'static str, ast: &Ast, node: NodeId, message: impl Into<String>) -> Self {
        let (line, column) = ast.position(node);
        Self {
            severity,
            rule,
            message: message.into(),
            line,
            column,
            node: Some(node),
            suggestions: Vec::new(),
        }
    }

    pub fn with_suggestion(mut self, suggestion: impl Into<String>) -> Self {
        self.suggestions.push(suggestion.into());
        self
    }

    pub fn is_error(&self) -> bool {
        self.severity == Severity::Error
    }

    pub fn to_diagnostic(&self) -> Diagnostic {
        Diagnostic::new(DiagnosticKind::Validation, self.severity, self.message.clone())
            .at(SourceLocation::new(self.line, self.column))
            .with_rule(self.rule)
            .with_suggestions(self.suggestions.iter().cloned())
    }
}

impl fmt::Display for ValidationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} at line {}, col {}: {} [{}]",
            self.severity.prefix(),
            self.line,
            self.column,
            self.message,
            self.rule
        )
    }
}

impl std::error::Error for ValidationError {}

// ============================================================================
// ValidationRule Trait
// ============================================================================

/// Trait that all validation rules implement.
///
/// Rules are independent of each other and only read the tree.
pub trait ValidationRule: Send + Sync {
    /// Unique identifier, also used as the `rule` tag of findings
    fn id(&self) -> &'static str;

    /// Human-readable description of what this rule checks
    fn description(&self) -> &'static str;

    fn validate(&self, ast: &Ast) -> Vec<ValidationError>;
}

// ============================================================================
// Validator
// ============================================================================

/// Runs a list of rules in order
pub struct Validator {
    rules: Vec<Box<dyn ValidationRule>>,
}

impl Validator {
    /// A validator with no rules installed.
    pub fn empty() -> Self {
        Self { rules: Vec::new() }
    }

    /// A validator with every built-in rule.
    pub fn with_default_rules() -> Self {
        Self {
            rules: vec![
                Box::new(rules::NoCyclesRule),
                Box::new(rules::IsolatedTaskRule),
                Box::new(rules::TypeCompatibilityRule),
                Box::new(rules::UniqueTaskIdRule),
                Box::new(rules::UniqueToolIdRule),
                Box::new(rules::UniqueNameRule),
                Box::new(rules::UniquePortRule),
                Box::new(rules::UndefinedReferenceRule),
                Box::new(rules::TaskContentRule),
                Box::new(rules::InvalidParameterRule),
                Box::new(rules::ConditionSyntaxRule),
                Box::new(rules::HasTasksRule),
            ],
        }
    }

    pub fn with_rule(mut self, rule: impl ValidationRule + 'static) -> Self {
        self.rules.push(Box::new(rule));
        self
    }

    pub fn validate(&self, ast: &Ast) -> ValidationReport {
        ValidationReport {
            findings: self.rules.iter().flat_map(|rule| rule.validate(ast)).collect(),
        }
    }

    /// `(id, description)` of every installed rule
    pub fn rules(&self) -> impl Iterator<Item = (&'static str, &'static str)> + '_ {
        self.rules.iter().map(|r| (r.id(), r.description()))
    }
}

impl Default for Validator {
    fn default() -> Self {
        Self::with_default_rules()
    }
}

/// Run every built-in rule over `ast`.
pub fn validate(ast: &Ast) -> ValidationReport {
    Validator::with_default_rules().validate(ast)
}

// ============================================================================
// Report
// ============================================================================

/// Everything the rules found, in rule order
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ValidationReport {
    findings: Vec<ValidationError>,
}

impl ValidationReport {
    pub fn findings(&self) -> &[ValidationError] {
        &self.findings
    }

    pub fn errors(&self) -> impl Iterator<Item = &ValidationError> {
        self.findings.iter().filter(|f| f.is_error())
    }

    pub fn warnings(&self) -> impl Iterator<Item = &ValidationError> {
        self.findings.iter().filter(|f| !f.is_error())
    }

    pub fn has_errors(&self) -> bool {
        self.findings.iter().any(ValidationError::is_error)
    }

    /// No errors and no warnings.
    pub fn is_clean(&self) -> bool {
        self.findings.is_empty()
    }

    pub fn by_rule<'a>(&'a self, rule: &'a str) -> impl Iterator<Item = &'a ValidationError> + 'a {
        self.findings.iter().filter(move |f| f.rule == rule)
    }

    pub fn to_diagnostics(&self) -> Vec<Diagnostic> {
        self.findings.iter().map(ValidationError::to_diagnostic).collect()
    }

    pub fn into_findings(self) -> Vec<ValidationError> {
        self.findings
    }
}

// ============================================================================
// Task Graph
// ============================================================================

/// Attached tasks and their `@next` edges, in source order.
pub(crate) struct TaskGraph<'a> {
    pub tasks: Vec<(&'a str, NodeId)>,
    pub edges: FxHashMap<&'a str, Vec<&'a str>>,
}

impl<'a> TaskGraph<'a> {
    pub fn build(ast: &'a Ast) -> Self {
        let mut tasks = Vec::new();
        let mut edges = FxHashMap::default();
        for node in ast.tasks() {
            if let NodeKind::Task { id, .. } = ast.kind(node) {
                tasks.push((id.as_str(), node));
                edges
                    .entry(id.as_str())
                    .or_insert_with(Vec::new)
                    .extend(ast.next_targets(node));
            }
        }
        Self { tasks, edges }
    }

    pub fn targets(&self, task: &str) -> &[&'a str] {
        self.edges.get(task).map(Vec::as_slice).unwrap_or(&[])
    }

    pub fn contains(&self, task: &str) -> bool {
        self.edges.contains_key(task)
    }
}
