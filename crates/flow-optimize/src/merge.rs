//! Node merging.

use flow_ast::{Ast, NodeId, NodeKind, SmolStr};
use rustc_hash::FxHashSet;
use tracing::debug;

/// Join runs of adjacent text siblings into the first node of each run,
/// separated by a single space. Returns the number of nodes absorbed.
pub fn merge_text_siblings(ast: &mut Ast) -> usize {
    let mut merged = 0;
    for parent in ast.walk() {
        let children = ast.children(parent).to_vec();
        if children.len() < 2 {
            continue;
        }

        let mut kept: Vec<NodeId> = Vec::with_capacity(children.len());
        let mut absorbed = Vec::new();
        for &child in &children {
            let Some(content) = ast.kind(child).text_content() else {
                kept.push(child);
                continue;
            };
            match kept.last() {
                Some(&head) if ast.kind(head).is_text() => absorbed.push((head, content.to_string())),
                _ => kept.push(child),
            }
        }
        if absorbed.is_empty() {
            continue;
        }

        for (head, tail) in absorbed {
            if let NodeKind::Text {
                content,
                compressed_from,
            } = ast.kind_mut(head)
            {
                content.push(' ');
                content.push_str(&tail);
                *compressed_from = None;
                merged += 1;
            }
        }
        ast.set_children(parent, kept);
    }
    merged
}

/// Ratio of shared to total distinct lower-cased words. Empty input scores 0.
pub fn jaccard(a: &str, b: &str) -> f64 {
    let left: FxHashSet<String> = a.split_whitespace().map(str::to_lowercase).collect();
    let right: FxHashSet<String> = b.split_whitespace().map(str::to_lowercase).collect();
    if left.is_empty() || right.is_empty() {
        return 0.0;
    }
    let shared = left.intersection(&right).count();
    let total = left.union(&right).count();
    shared as f64 / total as f64
}

/// Merge tasks whose body text is more similar than `threshold` to the
/// first task of their group.
///
/// The first task keeps its identity and receives the text of the others.
/// `@next` references to a merged task are redirected to the survivor, and
/// references that would make the survivor jump to itself are dropped.
/// Returns the number of tasks merged away.
pub fn merge_similar_tasks(ast: &mut Ast, threshold: f64) -> usize {
    let groups = group_similar(ast, threshold);
    let mut merged = 0;

    for group in groups.into_iter().filter(|g| g.len() > 1) {
        let base = group[0];
        let Some(base_id) = ast.kind(base).task_id().map(SmolStr::new) else {
            continue;
        };

        for &task in &group[1..] {
            let Some(task_id) = ast.kind(task).task_id().map(SmolStr::new) else {
                continue;
            };
            let texts: Vec<NodeId> = ast
                .children(task)
                .iter()
                .copied()
                .filter(|&c| ast.kind(c).is_text())
                .collect();
            for text in texts {
                ast.append_child(base, text);
            }
            ast.detach(task);
            redirect(ast, &task_id, &base_id);
            debug!(from = %task_id, into = %base_id, "merged similar task");
            merged += 1;
        }

        for next in ast.next_nodes(base) {
            if matches!(ast.kind(next), NodeKind::Next { target } if *target == base_id) {
                ast.detach(next);
            }
        }
    }
    merged
}

fn group_similar(ast: &Ast, threshold: f64) -> Vec<Vec<NodeId>> {
    let mut groups: Vec<(String, Vec<NodeId>)> = Vec::new();
    for task in ast.tasks() {
        let content = ast.text_children(task).join(" ");
        let related = |other: NodeId| {
            ast.ancestors(task).any(|a| a == other) || ast.ancestors(other).any(|a| a == task)
        };
        let group = groups.iter_mut().find(|(first, members)| {
            !content.is_empty() && jaccard(&content, first) > threshold && !related(members[0])
        });
        match group {
            Some((_, members)) => members.push(task),
            None => groups.push((content, vec![task])),
        }
    }
    groups.into_iter().map(|(_, members)| members).collect()
}

fn redirect(ast: &mut Ast, from: &str, to: &SmolStr) {
    for id in ast.walk() {
        if let NodeKind::Next { target } = ast.kind_mut(id) {
            if target.as_str() == from {
                *target = to.clone();
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn task(ast: &mut Ast, id: &str, texts: &[&str]) -> NodeId {
        let root = ast.root();
        let node = ast.add_child(
            root,
            NodeKind::Task {
                id: id.into(),
                title: None,
                needs_default_body: false,
            },
            1,
            1,
        );
        for text in texts {
            ast.add_child(node, NodeKind::text(*text), 2, 5);
        }
        node
    }

    #[test]
    fn test_merge_text_runs() {
        let mut ast = Ast::new();
        let t = task(&mut ast, "t", &["one", "two"]);
        ast.add_child(t, NodeKind::Next { target: "u".into() }, 3, 5);
        ast.add_child(t, NodeKind::text("three"), 4, 5);
        ast.add_child(t, NodeKind::text("four"), 5, 5);

        assert_eq!(merge_text_siblings(&mut ast), 2);
        assert_eq!(ast.text_children(t), vec!["one two", "three four"]);
        assert_eq!(ast.children(t).len(), 3);
        assert_eq!(merge_text_siblings(&mut ast), 0);
    }

    #[test]
    fn test_jaccard() {
        assert_eq!(jaccard("a b c", "A B C"), 1.0);
        assert_eq!(jaccard("a b", "b c"), 1.0 / 3.0);
        assert_eq!(jaccard("", "a"), 0.0);
    }

    #[test]
    fn test_merge_similar_tasks() {
        let mut ast = Ast::new();
        let a = task(&mut ast, "a", &["load the daily sales report"]);
        ast.add_child(a, NodeKind::Next { target: "b".into() }, 3, 5);
        task(&mut ast, "b", &["Load the daily sales report"]);
        let c = task(&mut ast, "c", &["send an email"]);
        ast.add_child(c, NodeKind::Next { target: "b".into() }, 3, 5);

        assert_eq!(merge_similar_tasks(&mut ast, 0.8), 1);
        assert_eq!(ast.find_task("b"), None);
        assert_eq!(
            ast.text_children(a),
            vec!["load the daily sales report", "Load the daily sales report"]
        );
        assert!(ast.next_targets(a).is_empty());
        assert_eq!(ast.next_targets(c), vec!["a"]);
    }

    #[test]
    fn test_dissimilar_tasks_stay() {
        let mut ast = Ast::new();
        task(&mut ast, "a", &["load the daily sales report"]);
        task(&mut ast, "b", &["load the weekly inventory"]);
        task(&mut ast, "c", &[]);
        task(&mut ast, "d", &[]);
        assert_eq!(merge_similar_tasks(&mut ast, 0.8), 0);
        assert_eq!(ast.tasks().len(), 4);
    }
}
