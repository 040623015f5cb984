//! Id, name and resource collisions.
//!
//! After a successful semantic analysis the task-id and duplicate-variable
//! checks cannot fire; they keep the validator usable on any parsed tree.
//! Cross-namespace collisions (a tool named like a task or a variable) are
//! only found here.

use flow_ast::{Ast, NodeId, NodeKind, VarScope};
use rustc_hash::FxHashMap;

use crate::{ValidationError, ValidationRule};

pub struct UniqueTaskIdRule;

impl ValidationRule for UniqueTaskIdRule {
    fn id(&self) -> &'static str {
        "unique_task_id"
    }

    fn description(&self) -> &'static str {
        "Task ids must be unique"
    }

    fn validate(&self, ast: &Ast) -> Vec<ValidationError> {
        let mut seen: FxHashMap<&str, NodeId> = FxHashMap::default();
        let mut errors = Vec::new();
        for node in ast.tasks() {
            let Some(id) = ast.kind(node).task_id() else {
                continue;
            };
            if let Some(&first) = seen.get(id) {
                errors.push(
                    ValidationError::error(self.id(), ast, node, format!("duplicate task id '{}'", id))
                        .with_suggestion(format!(
                            "use a unique task id; '{}' is first defined on line {}",
                            id,
                            ast.position(first).0
                        )),
                );
            } else {
                seen.insert(id, node);
            }
        }
        errors
    }
}

/// A tool's name is its id in the tree; it may not clash with a task id or another tool.
pub struct UniqueToolIdRule;

impl ValidationRule for UniqueToolIdRule {
    fn id(&self) -> &'static str {
        "unique_tool_id"
    }

    fn description(&self) -> &'static str {
        "Tool ids must not collide with task ids or other tools"
    }

    fn validate(&self, ast: &Ast) -> Vec<ValidationError> {
        let mut ids: FxHashMap<&str, NodeId> = ast
            .tasks()
            .into_iter()
            .filter_map(|node| ast.kind(node).task_id().map(|id| (id, node)))
            .collect();

        let mut errors = Vec::new();
        for node in ast.walk() {
            let NodeKind::Tool { name, .. } = ast.kind(node) else {
                continue;
            };
            if ids.contains_key(name.as_str()) {
                errors.push(
                    ValidationError::error(
                        self.id(),
                        ast,
                        node,
                        format!("tool '{}' conflicts with another task or tool", name),
                    )
                    .with_suggestion("use a unique tool name"),
                );
            } else {
                ids.insert(name.as_str(), node);
            }
        }
        errors
    }
}

/// Global variable names are unique, and no tool shares a name with a variable.
pub struct UniqueNameRule;

impl ValidationRule for UniqueNameRule {
    fn id(&self) -> &'static str {
        "unique_name"
    }

    fn description(&self) -> &'static str {
        "Variable names must be unique and distinct from tool names"
    }

    fn validate(&self, ast: &Ast) -> Vec<ValidationError> {
        let mut variables: FxHashMap<&str, NodeId> = FxHashMap::default();
        let mut errors = Vec::new();
        let nodes = ast.walk();

        for &node in &nodes {
            if let NodeKind::Var { name, scope, .. } = ast.kind(node) {
                if *scope == VarScope::Local {
                    continue;
                }
                if variables.contains_key(name.as_str()) {
                    errors.push(
                        ValidationError::error(
                            self.id(),
                            ast,
                            node,
                            format!("variable name '{}' is defined more than once", name),
                        )
                        .with_suggestion("use a unique variable name"),
                    );
                } else {
                    variables.insert(name.as_str(), node);
                }
            }
        }

        for &node in &nodes {
            if let NodeKind::Tool { name, .. } = ast.kind(node) {
                if variables.contains_key(name.as_str()) {
                    errors.push(
                        ValidationError::error(
                            self.id(),
                            ast,
                            node,
                            format!("tool name '{}' conflicts with a variable name", name),
                        )
                        .with_suggestion("use a different tool name"),
                    );
                }
            }
        }
        errors
    }
}

/// Two tools may not declare the same `port` parameter.
pub struct UniquePortRule;

impl ValidationRule for UniquePortRule {
    fn id(&self) -> &'static str {
        "unique_port"
    }

    fn description(&self) -> &'static str {
        "Tools must not declare the same port"
    }

    fn validate(&self, ast: &Ast) -> Vec<ValidationError> {
        let mut ports: FxHashMap<&str, &str> = FxHashMap::default();
        let mut errors = Vec::new();
        for node in ast.walk() {
            let NodeKind::Tool { name, parameters, .. } = ast.kind(node) else {
                continue;
            };
            let Some(port) = parameters.get("port") else {
                continue;
            };
            if let Some(owner) = ports.get(port.as_str()) {
                errors.push(
                    ValidationError::error(
                        self.id(),
                        ast,
                        node,
                        format!("port {} is already used by tool '{}'", port, owner),
                    )
                    .with_suggestion("use a different port number"),
                );
            } else {
                ports.insert(port.as_str(), name.as_str());
            }
        }
        errors
    }
}
