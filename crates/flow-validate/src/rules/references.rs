//! Rule: Undefined Reference
//!
//! Every `${name}` / `@{name}` placeholder in text must name a task, tool,
//! variable or builtin. This repeats the analyzer's check as accumulated
//! findings so trees that skipped analysis are still covered.

use flow_ast::{Ast, NodeKind};
use flow_lexer::placeholder::placeholders;
use flow_semantic::BUILTIN_REFERENCES;
use rustc_hash::FxHashSet;

use crate::{ValidationError, ValidationRule};

pub struct UndefinedReferenceRule;

impl ValidationRule for UndefinedReferenceRule {
    fn id(&self) -> &'static str {
        "undefined_reference"
    }

    fn description(&self) -> &'static str {
        "Placeholders must refer to a defined task, tool or variable"
    }

    fn validate(&self, ast: &Ast) -> Vec<ValidationError> {
        let nodes = ast.walk();
        let defined: FxHashSet<&str> = nodes
            .iter()
            .filter_map(|&id| match ast.kind(id) {
                NodeKind::Task { id, .. } => Some(id.as_str()),
                NodeKind::Tool { name, .. } | NodeKind::Var { name, .. } => Some(name.as_str()),
                _ => None,
            })
            .chain(BUILTIN_REFERENCES)
            .collect();

        let mut errors = Vec::new();
        for &id in &nodes {
            let Some(content) = ast.kind(id).text_content() else {
                continue;
            };
            for placeholder in placeholders(content) {
                if defined.contains(placeholder.name) {
                    continue;
                }
                errors.push(
                    ValidationError::error(
                        self.id(),
                        ast,
                        id,
                        format!("unresolved reference: {}", placeholder.name),
                    )
                    .with_suggestion(format!(
                        "define a variable, tool or task named '{}'",
                        placeholder.name
                    ))
                    .with_suggestion("check the spelling of the reference"),
                );
            }
        }
        errors
    }
}
