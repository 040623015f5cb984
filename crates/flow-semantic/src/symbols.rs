//! Symbol table, scope stack and the state threaded through analysis.

use flow_ast::{IndexMap, NodeId, SmolStr, VarScope};
use rustc_hash::FxHashMap;

/// Namespace a symbol lives in
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SymbolKind {
    Task,
    Tool,
    Variable,
}

impl SymbolKind {
    pub fn name(&self) -> &'static str {
        match self {
            SymbolKind::Task => "task",
            SymbolKind::Tool => "tool",
            SymbolKind::Variable => "variable",
        }
    }
}

/// A definition site
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Symbol {
    pub kind: SymbolKind,
    pub node: NodeId,
    pub line: usize,
    pub scope: VarScope,
}

/// Task ids, tool names and variable names, each in its own namespace.
#[derive(Debug, Clone, Default)]
pub struct SymbolTable {
    tasks: IndexMap<SmolStr, Symbol>,
    tools: IndexMap<SmolStr, Symbol>,
    variables: IndexMap<SmolStr, Symbol>,
}

impl SymbolTable {
    pub fn new() -> Self {
        Self::default()
    }

    fn namespace(&self, kind: SymbolKind) -> &IndexMap<SmolStr, Symbol> {
        match kind {
            SymbolKind::Task => &self.tasks,
            SymbolKind::Tool => &self.tools,
            SymbolKind::Variable => &self.variables,
        }
    }

    /// Register a task or tool. Returns the earlier definition on a duplicate.
    pub fn define(&mut self, kind: SymbolKind, name: &str, node: NodeId, line: usize) -> Result<(), Symbol> {
        let namespace = match kind {
            SymbolKind::Task => &mut self.tasks,
            SymbolKind::Tool => &mut self.tools,
            SymbolKind::Variable => &mut self.variables,
        };
        if let Some(existing) = namespace.get(name) {
            return Err(*existing);
        }
        namespace.insert(
            SmolStr::new(name),
            Symbol {
                kind,
                node,
                line,
                scope: VarScope::Global,
            },
        );
        Ok(())
    }

    /// Register a variable.
    ///
    /// Only two global definitions of one name collide; a local definition
    /// never replaces an existing entry, and a global one replaces a local.
    pub fn define_variable(&mut self, name: &str, node: NodeId, line: usize, scope: VarScope) -> Result<(), Symbol> {
        let symbol = Symbol {
            kind: SymbolKind::Variable,
            node,
            line,
            scope,
        };
        match self.variables.get_mut(name) {
            None => {
                self.variables.insert(SmolStr::new(name), symbol);
                Ok(())
            }
            Some(existing) => match (existing.scope, scope) {
                (VarScope::Global, VarScope::Global) => Err(*existing),
                (VarScope::Local, VarScope::Global) => {
                    *existing = symbol;
                    Ok(())
                }
                _ => Ok(()),
            },
        }
    }

    pub fn get(&self, kind: SymbolKind, name: &str) -> Option<&Symbol> {
        self.namespace(kind).get(name)
    }

    /// True if `name` is defined in any namespace.
    pub fn contains(&self, name: &str) -> bool {
        self.tasks.contains_key(name) || self.tools.contains_key(name) || self.variables.contains_key(name)
    }

    /// Every defined name, tasks first, then tools, then variables.
    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.tasks
            .keys()
            .chain(self.tools.keys())
            .chain(self.variables.keys())
            .map(SmolStr::as_str)
    }

    pub fn tasks(&self) -> &IndexMap<SmolStr, Symbol> {
        &self.tasks
    }

    pub fn tools(&self) -> &IndexMap<SmolStr, Symbol> {
        &self.tools
    }

    pub fn variables(&self) -> &IndexMap<SmolStr, Symbol> {
        &self.variables
    }

    pub fn len(&self) -> usize {
        self.tasks.len() + self.tools.len() + self.variables.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Stack of variable frames. The bottom frame is the global scope.
#[derive(Debug, Clone)]
pub struct ScopeStack {
    frames: Vec<FxHashMap<SmolStr, NodeId>>,
}

impl Default for ScopeStack {
    fn default() -> Self {
        Self::new()
    }
}

impl ScopeStack {
    pub fn new() -> Self {
        Self {
            frames: vec![FxHashMap::default()],
        }
    }

    pub fn push(&mut self) {
        self.frames.push(FxHashMap::default());
    }

    /// Pop the innermost frame. The global frame is never popped.
    pub fn pop(&mut self) {
        if self.frames.len() > 1 {
            self.frames.pop();
        }
    }

    /// Bind `name` in the innermost frame, returning the node already bound
    /// to it in that same frame.
    pub fn define(&mut self, name: &str, node: NodeId) -> Option<NodeId> {
        let frame = self.frames.last_mut()?;
        if let Some(&existing) = frame.get(name) {
            return Some(existing);
        }
        frame.insert(SmolStr::new(name), node);
        None
    }

    /// Innermost binding of `name`.
    pub fn resolve(&self, name: &str) -> Option<NodeId> {
        self.frames.iter().rev().find_map(|frame| frame.get(name).copied())
    }

    pub fn depth(&self) -> usize {
        self.frames.len()
    }
}

/// Everything the analyzer accumulates for one compilation.
///
/// Owned by the caller and passed by exclusive reference, so independent
/// compilations never share it.
#[derive(Debug, Clone, Default)]
pub struct AnalysisState {
    pub(crate) symbols: SymbolTable,
    pub(crate) scopes: ScopeStack,
}

impl AnalysisState {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn symbols(&self) -> &SymbolTable {
        &self.symbols
    }

    pub fn scopes(&self) -> &ScopeStack {
        &self.scopes
    }
}
