//! Duplicate elimination.
//!
//! A variable with the same name and value as an earlier one, or a tool
//! with the same name and description, is removed when the earlier
//! definition is visible from it: declared in the same body or in an
//! enclosing one. The first occurrence is kept.

use flow_ast::{Ast, Literal, NodeId, NodeKind};

/// Returns the number of definitions removed.
pub fn eliminate_duplicates(ast: &mut Ast) -> usize {
    let mut variables: Vec<(NodeId, &str, Option<Literal>)> = Vec::new();
    let mut tools: Vec<(NodeId, &str, Option<&str>)> = Vec::new();
    let mut duplicates = Vec::new();

    let nodes = ast.walk();
    for &id in &nodes {
        match ast.kind(id) {
            NodeKind::Var { name, value, .. } => {
                let seen = variables
                    .iter()
                    .any(|(first, n, v)| {
                        *n == name.as_str() && v == value && visible(ast, *first, id) && !shadowed(ast, *first, id, n)
                    });
                if seen {
                    duplicates.push(id);
                } else {
                    variables.push((id, name.as_str(), value.clone()));
                }
            }
            NodeKind::Tool {
                name, description, ..
            } => {
                let description = description.as_deref();
                let seen = tools
                    .iter()
                    .any(|(first, n, d)| *n == name.as_str() && *d == description && visible(ast, *first, id));
                if seen {
                    duplicates.push(id);
                } else {
                    tools.push((id, name.as_str(), description));
                }
            }
            _ => {}
        }
    }

    let removed = duplicates.len();
    for id in duplicates {
        ast.detach(id);
    }
    removed
}

/// True if `first` is declared in the body holding `later` or in an enclosing one.
fn visible(ast: &Ast, first: NodeId, later: NodeId) -> bool {
    match (ast.parent(first), ast.parent(later)) {
        (Some(scope), Some(parent)) => scope == parent || ast.ancestors(parent).any(|a| a == scope),
        _ => false,
    }
}

/// True if a same-named variable between the two declarations hides `first` from `later`.
fn shadowed(ast: &Ast, first: NodeId, later: NodeId, name: &str) -> bool {
    let (Some(scope), Some(parent)) = (ast.parent(first), ast.parent(later)) else {
        return false;
    };
    std::iter::once(parent)
        .chain(ast.ancestors(parent))
        .take_while(|&body| body != scope)
        .any(|body| {
            ast.children(body).iter().any(|&c| {
                c != later && matches!(ast.kind(c), NodeKind::Var { name: n, .. } if n.as_str() == name)
            })
        })
}

#[cfg(test)]
mod tests {
    use super::*;
    use flow_ast::VarScope;
    use pretty_assertions::assert_eq;

    fn var(ast: &mut Ast, parent: NodeId, name: &str, value: i64) -> NodeId {
        let scope = if parent == ast.root() { VarScope::Global } else { VarScope::Local };
        ast.add_child(
            parent,
            NodeKind::Var {
                name: name.into(),
                value: Some(Literal::Int(value)),
                ty: None,
                scope,
            },
            1,
            1,
        )
    }

    fn tool(ast: &mut Ast, name: &str, description: Option<&str>) -> NodeId {
        let root = ast.root();
        ast.add_child(
            root,
            NodeKind::Tool {
                name: name.into(),
                description: description.map(String::from),
                parameters: Default::default(),
            },
            1,
            1,
        )
    }

    fn task(ast: &mut Ast, id: &str) -> NodeId {
        let root = ast.root();
        ast.add_child(
            root,
            NodeKind::Task {
                id: id.into(),
                title: None,
                needs_default_body: false,
            },
            1,
            1,
        )
    }

    #[test]
    fn test_removes_exact_duplicates() {
        let mut ast = Ast::new();
        let root = ast.root();
        var(&mut ast, root, "x", 1);
        let dup = var(&mut ast, root, "x", 1);
        var(&mut ast, root, "x", 2);
        tool(&mut ast, "http", Some("Fetch"));
        let dup_tool = tool(&mut ast, "http", Some("Fetch"));
        tool(&mut ast, "http", Some("Post"));

        assert_eq!(eliminate_duplicates(&mut ast), 2);
        assert!(!ast.is_attached(dup));
        assert!(!ast.is_attached(dup_tool));
        assert_eq!(ast.children(root).len(), 4);
        assert_eq!(eliminate_duplicates(&mut ast), 0);
    }

    #[test]
    fn test_sibling_scopes_are_independent() {
        let mut ast = Ast::new();
        let a = task(&mut ast, "a");
        let b = task(&mut ast, "b");
        var(&mut ast, a, "y", 2);
        let in_b = var(&mut ast, b, "y", 2);

        assert_eq!(eliminate_duplicates(&mut ast), 0);
        assert!(ast.is_attached(in_b));
    }

    #[test]
    fn test_local_repeating_global_is_removed() {
        let mut ast = Ast::new();
        let root = ast.root();
        var(&mut ast, root, "x", 1);
        let t = task(&mut ast, "t");
        let local = var(&mut ast, t, "x", 1);

        assert_eq!(eliminate_duplicates(&mut ast), 1);
        assert!(!ast.is_attached(local));
    }

    #[test]
    fn test_intervening_shadow_keeps_inner_definition() {
        let mut ast = Ast::new();
        let root = ast.root();
        var(&mut ast, root, "x", 1);
        let t = task(&mut ast, "t");
        var(&mut ast, t, "x", 2);
        let branch = ast.add_child(t, NodeKind::If { condition: "ok".into() }, 3, 5);
        let inner = var(&mut ast, branch, "x", 1);

        assert_eq!(eliminate_duplicates(&mut ast), 0);
        assert!(ast.is_attached(inner));
    }
}
