//! Rules over the `@next` task graph.

use flow_ast::Ast;
use rustc_hash::{FxHashMap, FxHashSet};

use crate::{TaskGraph, ValidationError, ValidationRule};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Color {
    White,
    Gray,
    Black,
}

/// Every `@next` edge that closes a cycle is an error.
pub struct NoCyclesRule;

impl ValidationRule for NoCyclesRule {
    fn id(&self) -> &'static str {
        "no_cycles"
    }

    fn description(&self) -> &'static str {
        "The task graph formed by @next edges must be acyclic"
    }

    fn validate(&self, ast: &Ast) -> Vec<ValidationError> {
        let graph = TaskGraph::build(ast);
        let mut colors: FxHashMap<&str, Color> = FxHashMap::default();
        let mut back_edges = Vec::new();

        for &(task, _) in &graph.tasks {
            if colors.get(task).copied().unwrap_or(Color::White) == Color::White {
                visit(&graph, task, &mut colors, &mut back_edges);
            }
        }

        back_edges
            .into_iter()
            .filter_map(|(from, to)| {
                let node = graph.tasks.iter().find(|(id, _)| *id == from)?.1;
                Some(
                    ValidationError::error(
                        self.id(),
                        ast,
                        node,
                        format!("circular dependency detected: {} -> {}", from, to),
                    )
                    .with_suggestion("check the task flow and remove the circular @next reference"),
                )
            })
            .collect()
    }
}

fn visit<'a>(
    graph: &TaskGraph<'a>,
    task: &'a str,
    colors: &mut FxHashMap<&'a str, Color>,
    back_edges: &mut Vec<(&'a str, &'a str)>,
) {
    colors.insert(task, Color::Gray);
    for &target in graph.targets(task) {
        if !graph.contains(target) {
            continue;
        }
        match colors.get(target).copied().unwrap_or(Color::White) {
            Color::Gray => back_edges.push((task, target)),
            Color::White => visit(graph, target, colors, back_edges),
            Color::Black => {}
        }
    }
    colors.insert(task, Color::Black);
}

/// Tasks with no inbound and no outbound edge.
pub struct IsolatedTaskRule;

impl ValidationRule for IsolatedTaskRule {
    fn id(&self) -> &'static str {
        "isolated_task"
    }

    fn description(&self) -> &'static str {
        "Tasks should be connected to the flow by @next edges"
    }

    fn validate(&self, ast: &Ast) -> Vec<ValidationError> {
        let graph = TaskGraph::build(ast);
        let targeted: FxHashSet<&str> = graph.edges.values().flatten().copied().collect();

        graph
            .tasks
            .iter()
            .filter(|(id, _)| graph.targets(id).is_empty() && !targeted.contains(id))
            .map(|&(id, node)| {
                ValidationError::warning(
                    self.id(),
                    ast,
                    node,
                    format!("task '{}' may be an isolated node", id),
                )
                .with_suggestion(format!("add an @next edge to or from '{}'", id))
            })
            .collect()
    }
}

/// A script without tasks does nothing.
pub struct HasTasksRule;

impl ValidationRule for HasTasksRule {
    fn id(&self) -> &'static str {
        "has_tasks"
    }

    fn description(&self) -> &'static str {
        "A script should define at least one task"
    }

    fn validate(&self, ast: &Ast) -> Vec<ValidationError> {
        if ast.tasks().is_empty() {
            vec![ValidationError::warning(self.id(), ast, ast.root(), "no tasks defined")]
        } else {
            Vec::new()
        }
    }
}
