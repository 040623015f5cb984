//! Flow Script Abstract Syntax Tree
//!
//! The tree is stored in an arena (`Ast`) and nodes are addressed by stable
//! `NodeId` indices. Every node records its parent as an index rather than an
//! owning pointer, so the tree cannot form ownership cycles and upward
//! traversal stays available for diagnostics.
//!
//! Rewrites never free arena slots. A removed subtree is detached from its
//! parent and is no longer reachable from the root; `walk`, `tree` and every
//! query below only ever look at attached nodes.

pub mod literal;
pub mod program;

pub use indexmap::IndexMap;
pub use literal::{Literal, ValueType, VarScope};
pub use smol_str::SmolStr;

use serde::Serialize;
use std::fmt;

/// Stable index of a node in the arena
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub struct NodeId(usize);

impl NodeId {
    pub fn index(self) -> usize {
        self.0
    }
}

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

// ============================================================================
// Node Kinds
// ============================================================================

/// One variant per node kind, each with its own fields
#[derive(Debug, Clone, PartialEq)]
pub enum NodeKind {
    Root,
    Task {
        id: SmolStr,
        title: Option<String>,
        /// Set by semantic analysis when the body has no content yet
        needs_default_body: bool,
    },
    Tool {
        name: SmolStr,
        description: Option<String>,
        parameters: IndexMap<String, String>,
    },
    Var {
        name: SmolStr,
        value: Option<Literal>,
        ty: Option<ValueType>,
        scope: VarScope,
    },
    If {
        condition: String,
    },
    Else,
    Endif,
    Text {
        content: String,
        /// Length in characters before text compression rewrote the content
        compressed_from: Option<usize>,
    },
    /// A fenced code region, passed through verbatim
    Code {
        language: Option<String>,
        content: String,
    },
    Agent {
        name: SmolStr,
        params: Option<String>,
    },
    Lang {
        language: String,
    },
    Next {
        target: SmolStr,
    },
    Include {
        path: String,
    },
    /// An indented region not owned by a directive
    Block,
}

impl NodeKind {
    pub fn text(content: impl Into<String>) -> Self {
        NodeKind::Text {
            content: content.into(),
            compressed_from: None,
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            NodeKind::Root => "root",
            NodeKind::Task { .. } => "task",
            NodeKind::Tool { .. } => "tool",
            NodeKind::Var { .. } => "var",
            NodeKind::If { .. } => "if",
            NodeKind::Else => "else",
            NodeKind::Endif => "endif",
            NodeKind::Text { .. } => "text",
            NodeKind::Code { .. } => "code",
            NodeKind::Agent { .. } => "agent",
            NodeKind::Lang { .. } => "lang",
            NodeKind::Next { .. } => "next",
            NodeKind::Include { .. } => "include",
            NodeKind::Block => "block",
        }
    }

    pub fn same_kind(&self, other: &NodeKind) -> bool {
        std::mem::discriminant(self) == std::mem::discriminant(other)
    }

    pub fn is_text(&self) -> bool {
        matches!(self, NodeKind::Text { .. })
    }

    /// Content of a text node
    pub fn text_content(&self) -> Option<&str> {
        match self {
            NodeKind::Text { content, .. } => Some(content),
            _ => None,
        }
    }

    /// Id of a task node
    pub fn task_id(&self) -> Option<&str> {
        match self {
            NodeKind::Task { id, .. } => Some(id),
            _ => None,
        }
    }

    /// Kinds that push a variable scope frame
    pub fn opens_scope(&self) -> bool {
        matches!(
            self,
            NodeKind::Task { .. } | NodeKind::Tool { .. } | NodeKind::If { .. } | NodeKind::Else
        )
    }
}

impl fmt::Display for NodeKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            NodeKind::Root | NodeKind::Else | NodeKind::Endif | NodeKind::Block => {
                write!(f, "{}", self.name())
            }
            NodeKind::Task { id, title, .. } => {
                write!(f, "task {}", id)?;
                if let Some(title) = title {
                    write!(f, " {:?}", title)?;
                }
                Ok(())
            }
            NodeKind::Tool {
                name,
                description,
                parameters,
            } => {
                write!(f, "tool {}", name)?;
                if let Some(description) = description {
                    write!(f, " {:?}", description)?;
                }
                if !parameters.is_empty() {
                    let params: Vec<String> =
                        parameters.iter().map(|(k, v)| format!("{}={}", k, v)).collect();
                    write!(f, " [{}]", params.join(", "))?;
                }
                Ok(())
            }
            NodeKind::Var {
                name,
                value,
                ty,
                scope,
            } => {
                write!(f, "var {}", name)?;
                match value {
                    Some(Literal::Str(s)) => write!(f, " = {:?}", s)?,
                    Some(value) => write!(f, " = {}", value)?,
                    None => {}
                }
                if let Some(ty) = ty {
                    write!(f, " : {}", ty)?;
                }
                if *scope == VarScope::Local {
                    write!(f, " (local)")?;
                }
                Ok(())
            }
            NodeKind::If { condition } => write!(f, "if {}", condition),
            NodeKind::Text { content, .. } => write!(f, "text {:?}", content),
            NodeKind::Code { language, content } => {
                write!(f, "code")?;
                if let Some(language) = language {
                    write!(f, " {}", language)?;
                }
                write!(f, " {:?}", content)
            }
            NodeKind::Agent { name, params } => match params {
                Some(params) => write!(f, "agent {}({})", name, params),
                None => write!(f, "agent {}", name),
            },
            NodeKind::Lang { language } => write!(f, "lang {}", language),
            NodeKind::Next { target } => write!(f, "next {}", target),
            NodeKind::Include { path } => write!(f, "include {}", path),
        }
    }
}

// ============================================================================
// Arena
// ============================================================================

/// A node and its position in the tree
#[derive(Debug, Clone, PartialEq)]
pub struct Node {
    pub kind: NodeKind,
    pub line: usize,
    pub column: usize,
    parent: Option<NodeId>,
    children: Vec<NodeId>,
}

impl Node {
    pub fn parent(&self) -> Option<NodeId> {
        self.parent
    }

    pub fn children(&self) -> &[NodeId] {
        &self.children
    }
}

/// Owned snapshot of the attached tree, independent of arena indices.
///
/// Two trees are structurally equal when their snapshots are equal.
#[derive(Debug, Clone, PartialEq)]
pub struct TreeNode {
    pub kind: NodeKind,
    pub line: usize,
    pub column: usize,
    pub children: Vec<TreeNode>,
}

/// The syntax tree arena
#[derive(Debug, Clone)]
pub struct Ast {
    nodes: Vec<Node>,
}

impl Default for Ast {
    fn default() -> Self {
        Self::new()
    }
}

impl Ast {
    /// An empty tree holding only the root node.
    pub fn new() -> Self {
        Self {
            nodes: vec![Node {
                kind: NodeKind::Root,
                line: 1,
                column: 1,
                parent: None,
                children: Vec::new(),
            }],
        }
    }

    pub fn root(&self) -> NodeId {
        NodeId(0)
    }

    /// Allocate a detached node.
    pub fn alloc(&mut self, kind: NodeKind, line: usize, column: usize) -> NodeId {
        let id = NodeId(self.nodes.len());
        self.nodes.push(Node {
            kind,
            line,
            column,
            parent: None,
            children: Vec::new(),
        });
        id
    }

    /// Allocate a node and append it to `parent`.
    pub fn add_child(&mut self, parent: NodeId, kind: NodeKind, line: usize, column: usize) -> NodeId {
        let id = self.alloc(kind, line, column);
        self.append_child(parent, id);
        id
    }

    /// Move `child` to the end of `parent`'s children.
    pub fn append_child(&mut self, parent: NodeId, child: NodeId) {
        self.detach(child);
        self.nodes[child.0].parent = Some(parent);
        self.nodes[parent.0].children.push(child);
    }

    /// Move `child` to position `index` among `parent`'s children.
    pub fn insert_child(&mut self, parent: NodeId, index: usize, child: NodeId) {
        self.detach(child);
        self.nodes[child.0].parent = Some(parent);
        let children = &mut self.nodes[parent.0].children;
        let index = index.min(children.len());
        children.insert(index, child);
    }

    /// Unlink `id` from its parent. The subtree stays in the arena.
    pub fn detach(&mut self, id: NodeId) {
        if let Some(parent) = self.nodes[id.0].parent.take() {
            self.nodes[parent.0].children.retain(|&c| c != id);
        }
    }

    /// Replace the child list of `parent`. Children dropped from the list become detached.
    pub fn set_children(&mut self, parent: NodeId, children: Vec<NodeId>) {
        let old = std::mem::take(&mut self.nodes[parent.0].children);
        for child in old {
            self.nodes[child.0].parent = None;
        }
        for &child in &children {
            self.detach(child);
            self.nodes[child.0].parent = Some(parent);
        }
        self.nodes[parent.0].children = children;
    }

    pub fn node(&self, id: NodeId) -> &Node {
        &self.nodes[id.0]
    }

    pub fn get(&self, id: NodeId) -> Option<&Node> {
        self.nodes.get(id.0)
    }

    pub fn kind(&self, id: NodeId) -> &NodeKind {
        &self.nodes[id.0].kind
    }

    pub fn kind_mut(&mut self, id: NodeId) -> &mut NodeKind {
        &mut self.nodes[id.0].kind
    }

    pub fn children(&self, id: NodeId) -> &[NodeId] {
        &self.nodes[id.0].children
    }

    pub fn parent(&self, id: NodeId) -> Option<NodeId> {
        self.nodes[id.0].parent
    }

    /// `(line, column)` of a node
    pub fn position(&self, id: NodeId) -> (usize, usize) {
        let node = &self.nodes[id.0];
        (node.line, node.column)
    }

    /// Parents of `id`, nearest first.
    pub fn ancestors(&self, id: NodeId) -> impl Iterator<Item = NodeId> + '_ {
        std::iter::successors(self.parent(id), move |&p| self.parent(p))
    }

    /// True if `id` is the root or hangs off it.
    pub fn is_attached(&self, id: NodeId) -> bool {
        id == self.root() || self.ancestors(id).last() == Some(self.root())
    }

    /// The nearest enclosing task of `id`, if any.
    pub fn enclosing_task(&self, id: NodeId) -> Option<NodeId> {
        self.ancestors(id)
            .find(|&p| matches!(self.kind(p), NodeKind::Task { .. }))
    }

    /// Pre-order list of `id` and everything below it.
    pub fn descendants(&self, id: NodeId) -> Vec<NodeId> {
        let mut out = Vec::new();
        let mut stack = vec![id];
        while let Some(node) = stack.pop() {
            out.push(node);
            stack.extend(self.children(node).iter().rev().copied());
        }
        out
    }

    /// Pre-order list of every attached node, root first.
    pub fn walk(&self) -> Vec<NodeId> {
        self.descendants(self.root())
    }

    /// Number of attached nodes, root included.
    pub fn node_count(&self) -> usize {
        self.walk().len()
    }

    /// Number of arena slots, detached nodes included.
    pub fn arena_len(&self) -> usize {
        self.nodes.len()
    }

    /// All attached task nodes in source order.
    pub fn tasks(&self) -> Vec<NodeId> {
        self.walk()
            .into_iter()
            .filter(|&id| matches!(self.kind(id), NodeKind::Task { .. }))
            .collect()
    }

    pub fn find_task(&self, task_id: &str) -> Option<NodeId> {
        self.tasks()
            .into_iter()
            .find(|&id| self.kind(id).task_id() == Some(task_id))
    }

    /// `@next` nodes belonging to `task`, including those inside conditional
    /// branches but not those of nested tasks.
    pub fn next_nodes(&self, task: NodeId) -> Vec<NodeId> {
        let mut out = Vec::new();
        let mut stack: Vec<NodeId> = self.children(task).iter().rev().copied().collect();
        while let Some(node) = stack.pop() {
            match self.kind(node) {
                NodeKind::Next { .. } => out.push(node),
                NodeKind::Task { .. } => continue,
                _ => {}
            }
            stack.extend(self.children(node).iter().rev().copied());
        }
        out
    }

    /// Target ids of `next_nodes(task)`.
    pub fn next_targets(&self, task: NodeId) -> Vec<&str> {
        self.next_nodes(task)
            .into_iter()
            .filter_map(|id| match self.kind(id) {
                NodeKind::Next { target } => Some(target.as_str()),
                _ => None,
            })
            .collect()
    }

    /// Contents of the direct text children of `id`.
    pub fn text_children(&self, id: NodeId) -> Vec<&str> {
        self.children(id)
            .iter()
            .filter_map(|&c| self.kind(c).text_content())
            .collect()
    }

    /// Drop detached nodes from the arena and renumber the rest in pre-order.
    ///
    /// Returns the number of slots freed. Every `NodeId` obtained before the
    /// call is invalidated; the root stays at index 0.
    pub fn compact(&mut self) -> usize {
        let order = self.walk();
        let before = self.nodes.len();
        let mut remap = vec![None; before];
        for (new, old) in order.iter().enumerate() {
            remap[old.0] = Some(NodeId(new));
        }

        let mut old_nodes: Vec<Option<Node>> = std::mem::take(&mut self.nodes).into_iter().map(Some).collect();
        let mut nodes = Vec::with_capacity(order.len());
        for old in &order {
            if let Some(mut node) = old_nodes[old.0].take() {
                node.parent = node.parent.and_then(|p| remap[p.0]);
                node.children = node.children.iter().filter_map(|c| remap[c.0]).collect();
                nodes.push(node);
            }
        }
        self.nodes = nodes;
        before - self.nodes.len()
    }

    /// Owned snapshot of the attached tree.
    pub fn tree(&self) -> TreeNode {
        self.subtree(self.root())
    }

    pub fn subtree(&self, id: NodeId) -> TreeNode {
        let node = self.node(id);
        TreeNode {
            kind: node.kind.clone(),
            line: node.line,
            column: node.column,
            children: node.children.iter().map(|&c| self.subtree(c)).collect(),
        }
    }

    /// Indented one-node-per-line rendering of the attached tree.
    pub fn dump(&self) -> String {
        let mut out = String::new();
        self.dump_into(self.root(), 0, &mut out);
        out
    }

    fn dump_into(&self, id: NodeId, depth: usize, out: &mut String) {
        out.push_str(&"  ".repeat(depth));
        out.push_str(&self.kind(id).to_string());
        out.push('\n');
        for &child in self.children(id) {
            self.dump_into(child, depth + 1, out);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn task(id: &str) -> NodeKind {
        NodeKind::Task {
            id: id.into(),
            title: None,
            needs_default_body: false,
        }
    }

    fn sample() -> Ast {
        let mut ast = Ast::new();
        let root = ast.root();
        ast.add_child(
            root,
            NodeKind::Var {
                name: "x".into(),
                value: Some(Literal::Int(10)),
                ty: Some(ValueType::Integer),
                scope: VarScope::Global,
            },
            1,
            1,
        );
        let a = ast.add_child(root, task("a"), 2, 1);
        ast.add_child(a, NodeKind::text("value is ${x}"), 3, 5);
        let cond = ast.add_child(a, NodeKind::If { condition: "ready".into() }, 4, 5);
        ast.add_child(cond, NodeKind::Next { target: "b".into() }, 5, 9);
        ast.add_child(root, task("b"), 6, 1);
        ast
    }

    #[test]
    fn test_parent_links() {
        let ast = sample();
        let a = ast.find_task("a").unwrap();
        let text = ast.children(a)[0];
        assert_eq!(ast.parent(text), Some(a));
        assert_eq!(ast.parent(a), Some(ast.root()));
        assert_eq!(ast.enclosing_task(text), Some(a));
        assert!(ast.is_attached(text));
    }

    #[test]
    fn test_next_targets_include_branches() {
        let ast = sample();
        let a = ast.find_task("a").unwrap();
        assert_eq!(ast.next_targets(a), vec!["b"]);
    }

    #[test]
    fn test_detach_removes_subtree_from_walk() {
        let mut ast = sample();
        let before = ast.node_count();
        let a = ast.find_task("a").unwrap();
        ast.detach(a);
        assert!(!ast.is_attached(a));
        assert_eq!(ast.node_count(), before - 4);
        assert_eq!(ast.arena_len(), before);
        assert_eq!(ast.find_task("a"), None);
    }

    #[test]
    fn test_compact_frees_detached_slots() {
        let mut ast = sample();
        let snapshot_without_a = {
            let mut copy = ast.clone();
            let a = copy.find_task("a").unwrap();
            copy.detach(a);
            copy.tree()
        };

        let a = ast.find_task("a").unwrap();
        ast.detach(a);
        assert_eq!(ast.compact(), 4);
        assert_eq!(ast.arena_len(), ast.node_count());
        assert_eq!(ast.tree(), snapshot_without_a);

        let b = ast.find_task("b").unwrap();
        assert_eq!(ast.parent(b), Some(ast.root()));
        assert_eq!(ast.compact(), 0);
    }

    #[test]
    fn test_set_children_reorders_and_detaches() {
        let mut ast = sample();
        let root = ast.root();
        let children = ast.children(root).to_vec();
        ast.set_children(root, vec![children[2], children[0]]);
        assert_eq!(ast.children(root), &[children[2], children[0]]);
        assert!(!ast.is_attached(children[1]));
        assert_eq!(ast.parent(children[2]), Some(root));
    }

    #[test]
    fn test_tree_equality_ignores_arena_indices() {
        let mut first = sample();
        let second = sample();
        // Garbage in the arena does not affect the snapshot.
        first.alloc(NodeKind::text("garbage"), 9, 1);
        assert_eq!(first.tree(), second.tree());
    }

    #[test]
    fn test_dump() {
        insta::assert_snapshot!(sample().dump(), @r###"
        root
          var x = 10 : integer
          task a
            text "value is ${x}"
            if ready
              next b
          task b
        "###);
    }
}
