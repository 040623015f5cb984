//! Structural normalization.

use flow_ast::{Ast, NodeId, NodeKind};

/// Absorb a single child of the same kind into its parent.
///
/// - `Block { Block { .. } }` → `Block { .. }`
/// - `If c { If c { .. } }` → `If c { .. }`
///
/// Tasks and tools are never flattened; their identity is a symbol.
/// Returns the number of nodes absorbed.
pub fn flatten(ast: &mut Ast) -> usize {
    let mut flattened = 0;
    for id in ast.walk() {
        while let Some(child) = absorbable_child(ast, id) {
            let grandchildren = ast.children(child).to_vec();
            ast.set_children(id, grandchildren);
            flattened += 1;
        }
    }
    flattened
}

fn absorbable_child(ast: &Ast, id: NodeId) -> Option<NodeId> {
    let &[child] = ast.children(id) else {
        return None;
    };
    let same = match (ast.kind(id), ast.kind(child)) {
        (NodeKind::Block, NodeKind::Block) => true,
        (NodeKind::If { condition: outer }, NodeKind::If { condition: inner }) => outer == inner,
        _ => false,
    };
    same.then_some(child)
}

/// Sort priority of a child: variables, tools, tasks, text, then the rest.
pub fn priority(kind: &NodeKind) -> u8 {
    match kind {
        NodeKind::Var { .. } => 0,
        NodeKind::Tool { .. } => 1,
        NodeKind::Task { .. } => 2,
        NodeKind::Text { .. } => 3,
        _ => 4,
    }
}

/// Stable-sort every child list by `priority`. Runs of equal priority,
/// such as `@if`/`@else`/`@endif`, keep their relative order.
/// Returns the number of child lists that changed.
pub fn reorder(ast: &mut Ast) -> usize {
    let mut reordered = 0;
    for id in ast.walk() {
        let children = ast.children(id);
        let mut sorted = children.to_vec();
        sorted.sort_by_key(|&c| priority(ast.kind(c)));
        if sorted.as_slice() != children {
            ast.set_children(id, sorted);
            reordered += 1;
        }
    }
    reordered
}
