//! Dead code elimination.
//!
//! Mark and sweep: everything reachable from the root through child edges
//! and `@next` task references is live, the rest of the arena is dropped.
//! Before marking, nodes that can never execute are unlinked from their
//! bodies:
//!
//! - blank `Text`
//! - `Block` without children
//! - `@else` not directly after an `@if`, `@endif` not directly after an `@if` or `@else`

use flow_ast::{Ast, NodeId, NodeKind};
use rustc_hash::FxHashSet;

use crate::{OptimizeError, OptimizeResult};

/// Returns the number of nodes removed from the arena.
pub fn eliminate_dead_code(ast: &mut Ast) -> OptimizeResult<usize> {
    prune_unexecutable(ast);

    let live = mark(ast);
    let removed = ast.compact();

    if ast.arena_len() != live {
        return Err(OptimizeError::Internal {
            pass: "dead code elimination",
            message: format!("{} nodes marked live but {} survived the sweep", live, ast.arena_len()),
        });
    }
    Ok(removed)
}

/// Unlink unexecutable children, deepest bodies first so that a block
/// emptied by pruning is itself pruned in the same sweep.
fn prune_unexecutable(ast: &mut Ast) {
    for parent in ast.walk().into_iter().rev() {
        let children = ast.children(parent).to_vec();
        let mut kept: Vec<NodeId> = Vec::with_capacity(children.len());

        for child in children.iter().copied() {
            let previous = kept.last().map(|&k| ast.kind(k));
            let dead = match ast.kind(child) {
                NodeKind::Text { content, .. } => content.trim().is_empty(),
                NodeKind::Block => ast.children(child).is_empty(),
                NodeKind::Else => !matches!(previous, Some(NodeKind::If { .. })),
                NodeKind::Endif => !matches!(previous, Some(NodeKind::If { .. } | NodeKind::Else)),
                _ => false,
            };
            if !dead {
                kept.push(child);
            }
        }

        if kept.len() != children.len() {
            ast.set_children(parent, kept);
        }
    }
}

/// Count the live nodes.
fn mark(ast: &Ast) -> usize {
    let mut live: FxHashSet<NodeId> = FxHashSet::default();
    let mut stack = vec![ast.root()];

    while let Some(node) = stack.pop() {
        if !live.insert(node) {
            continue;
        }
        stack.extend(ast.children(node).iter().copied());
        if matches!(ast.kind(node), NodeKind::Task { .. }) {
            stack.extend(
                ast.next_targets(node)
                    .into_iter()
                    .filter_map(|target| ast.find_task(target)),
            );
        }
    }
    live.len()
}
