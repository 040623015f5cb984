//! Task bodies, tool parameters and condition syntax.

use flow_ast::{Ast, NodeKind};
use flow_lexer::expr::tokenize_expression;
use flow_lexer::placeholder::is_identifier;
use flow_semantic::has_body_content;

use crate::{ValidationError, ValidationRule};

/// Tasks without text or code.
pub struct TaskContentRule;

impl ValidationRule for TaskContentRule {
    fn id(&self) -> &'static str {
        "task_content"
    }

    fn description(&self) -> &'static str {
        "Tasks should have body content"
    }

    fn validate(&self, ast: &Ast) -> Vec<ValidationError> {
        ast.tasks()
            .into_iter()
            .filter(|&node| !has_body_content(ast, node))
            .filter_map(|node| {
                let id = ast.kind(node).task_id()?;
                Some(ValidationError::warning(
                    self.id(),
                    ast,
                    node,
                    format!("task '{}' has no content", id),
                ))
            })
            .collect()
    }
}

/// Tool parameter names must be identifiers.
pub struct InvalidParameterRule;

impl ValidationRule for InvalidParameterRule {
    fn id(&self) -> &'static str {
        "invalid_parameter"
    }

    fn description(&self) -> &'static str {
        "Tool parameter names must be identifiers"
    }

    fn validate(&self, ast: &Ast) -> Vec<ValidationError> {
        let mut errors = Vec::new();
        for node in ast.walk() {
            let NodeKind::Tool { parameters, .. } = ast.kind(node) else {
                continue;
            };
            for key in parameters.keys().filter(|k| !is_identifier(k)) {
                errors.push(
                    ValidationError::error(
                        self.id(),
                        ast,
                        node,
                        format!("invalid tool parameter name: {}", key),
                    )
                    .with_suggestion("use letters, digits and underscores only"),
                );
            }
        }
        errors
    }
}

/// Conditions should only use the expression alphabet.
pub struct ConditionSyntaxRule;

impl ValidationRule for ConditionSyntaxRule {
    fn id(&self) -> &'static str {
        "condition_syntax"
    }

    fn description(&self) -> &'static str {
        "Conditions should tokenize as expressions"
    }

    fn validate(&self, ast: &Ast) -> Vec<ValidationError> {
        let mut errors = Vec::new();
        for node in ast.walk() {
            let NodeKind::If { condition } = ast.kind(node) else {
                continue;
            };
            let (_, problems) = tokenize_expression(condition);
            for problem in problems {
                errors.push(
                    ValidationError::warning(
                        self.id(),
                        ast,
                        node,
                        format!("condition `{}`: {}", condition, problem),
                    )
                    .with_suggestion("comparisons use ==, !=, <, <=, > or >="),
                );
            }
        }
        errors
    }
}
