//! Rule: Type Compatibility
//!
//! Compares the declared type of a variable with the runtime type of its
//! value using the lenient compatibility table of `ValueType::accepts`.
//! Mismatches are warnings; input handling is intentionally permissive.

use flow_ast::{Ast, NodeKind};

use crate::{ValidationError, ValidationRule};

pub struct TypeCompatibilityRule;

impl ValidationRule for TypeCompatibilityRule {
    fn id(&self) -> &'static str {
        "type_compatibility"
    }

    fn description(&self) -> &'static str {
        "Variable values should match their declared type"
    }

    fn validate(&self, ast: &Ast) -> Vec<ValidationError> {
        let mut errors = Vec::new();
        for id in ast.walk() {
            if let NodeKind::Var {
                name,
                value: Some(value),
                ty: Some(declared),
                ..
            } = ast.kind(id)
            {
                let actual = value.value_type();
                if !declared.accepts(actual) {
                    errors.push(ValidationError::warning(
                        self.id(),
                        ast,
                        id,
                        format!("variable '{}' declared as {} but holds {}", name, declared, actual),
                    ));
                }
            }
        }
        errors
    }
}
