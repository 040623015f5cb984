//! Flow Script Semantic Analysis
//!
//! Six passes over the parsed tree, run in a fixed order:
//!
//! 1. symbol table construction
//! 2. identifier and condition shape checks, variable type inference
//! 3. placeholder reference resolution
//! 4. default completion (titles, descriptions, empty bodies)
//! 5. scope checking
//! 6. `@next` cycle detection
//!
//! The first problem found is fatal and stops analysis.

pub mod symbols;

pub use symbols::{AnalysisState, ScopeStack, Symbol, SymbolKind, SymbolTable};

use flow_ast::{Ast, Literal, NodeId, NodeKind, ValueType};
use flow_lexer::placeholder::{is_identifier, placeholders};
use rustc_hash::FxHashSet;
use thiserror::Error;
use tracing::debug;

/// Names that may be referenced without a definition.
pub const BUILTIN_REFERENCES: [&str; 6] = ["env", "config", "context", "result", "input", "output"];

/// Characters that may not appear in an `@if` condition.
pub const FORBIDDEN_CONDITION_CHARS: [char; 5] = [';', '&', '|', '`', '$'];

/// Minimum Jaro-Winkler similarity for a "did you mean" hint.
const SUGGESTION_THRESHOLD: f64 = 0.8;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SemanticErrorKind {
    DuplicateDefinition,
    InvalidIdentifier,
    InvalidCondition,
    UndefinedReference,
    ScopeRedefinition,
    CircularReference,
}

/// A fatal semantic problem
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("line {line}: {message}")]
pub struct SemanticError {
    pub kind: SemanticErrorKind,
    pub node_id: Option<NodeId>,
    pub line: usize,
    pub message: String,
    /// "did you mean" suggestion for undefined references
    pub hint: Option<String>,
}

impl SemanticError {
    fn new(kind: SemanticErrorKind, ast: &Ast, node: NodeId, message: String) -> Self {
        Self {
            kind,
            node_id: Some(node),
            line: ast.position(node).0,
            message,
            hint: None,
        }
    }
}

/// Result type for semantic analysis
pub type SemanticResult<T> = Result<T, SemanticError>;

/// Run every pass over `ast`, rebuilding `state` from scratch.
pub fn analyze(ast: &mut Ast, state: &mut AnalysisState) -> SemanticResult<()> {
    *state = AnalysisState::new();

    build_symbol_table(ast, state)?;
    debug!(
        tasks = state.symbols.tasks().len(),
        tools = state.symbols.tools().len(),
        variables = state.symbols.variables().len(),
        "symbol table built"
    );

    check_shapes(ast)?;
    debug!("shape checks passed");

    resolve_references(ast, state)?;
    debug!("references resolved");

    let completed = complete_defaults(ast);
    debug!(completed, "defaults completed");

    check_scopes(ast, state)?;
    debug!("scope check passed");

    check_cycles(ast, state)?;
    debug!("no circular references");

    Ok(())
}

// ============================================================================
// Pass 1: Symbol Table
// ============================================================================

fn build_symbol_table(ast: &Ast, state: &mut AnalysisState) -> SemanticResult<()> {
    for id in ast.walk() {
        let line = ast.position(id).0;
        let duplicate = match ast.kind(id) {
            NodeKind::Task { id: task_id, .. } => state
                .symbols
                .define(SymbolKind::Task, task_id, id, line)
                .err()
                .map(|_| format!("duplicate task id: {}", task_id)),
            NodeKind::Tool { name, .. } => state
                .symbols
                .define(SymbolKind::Tool, name, id, line)
                .err()
                .map(|_| format!("duplicate tool name: {}", name)),
            NodeKind::Var { name, scope, .. } => state
                .symbols
                .define_variable(name, id, line, *scope)
                .err()
                .map(|_| format!("duplicate variable name: {}", name)),
            _ => None,
        };
        if let Some(message) = duplicate {
            return Err(SemanticError::new(
                SemanticErrorKind::DuplicateDefinition,
                ast,
                id,
                message,
            ));
        }
    }
    Ok(())
}

// ============================================================================
// Pass 2: Shapes and Types
// ============================================================================

fn check_shapes(ast: &mut Ast) -> SemanticResult<()> {
    for id in ast.walk() {
        let has_content = has_body_content(ast, id);
        let invalid = match ast.kind_mut(id) {
            NodeKind::Task {
                id: task_id,
                needs_default_body,
                ..
            } => {
                *needs_default_body = !has_content;
                (!is_identifier(task_id))
                    .then(|| (SemanticErrorKind::InvalidIdentifier, format!("invalid task id: {}", task_id)))
            }
            NodeKind::Tool { name, .. } => (!is_identifier(name))
                .then(|| (SemanticErrorKind::InvalidIdentifier, format!("invalid tool name: {}", name))),
            NodeKind::Var { name, value, ty, .. } => {
                if let Some(value) = value {
                    *ty = Some(value.value_type());
                }
                (!is_identifier(name)).then(|| {
                    (
                        SemanticErrorKind::InvalidIdentifier,
                        format!("invalid variable name: {}", name),
                    )
                })
            }
            NodeKind::If { condition } => {
                check_condition(condition).map(|message| (SemanticErrorKind::InvalidCondition, message))
            }
            _ => None,
        };
        if let Some((kind, message)) = invalid {
            return Err(SemanticError::new(kind, ast, id, message));
        }
    }
    Ok(())
}

/// A task body has content when it holds non-blank text or a code block.
pub fn has_body_content(ast: &Ast, id: NodeId) -> bool {
    ast.children(id).iter().any(|&child| match ast.kind(child) {
        NodeKind::Text { content, .. } => !content.trim().is_empty(),
        NodeKind::Code { .. } => true,
        _ => false,
    })
}

/// Returns the error message for a rejected condition.
pub fn check_condition(condition: &str) -> Option<String> {
    if condition.trim().is_empty() {
        return Some("empty condition".to_string());
    }
    condition
        .chars()
        .find(|c| FORBIDDEN_CONDITION_CHARS.contains(c))
        .map(|c| format!("condition contains forbidden character '{}'", c))
}

// ============================================================================
// Pass 3: References
// ============================================================================

fn resolve_references(ast: &Ast, state: &AnalysisState) -> SemanticResult<()> {
    for id in ast.walk() {
        let Some(content) = ast.kind(id).text_content() else {
            continue;
        };
        for placeholder in placeholders(content) {
            let name = placeholder.name;
            if state.symbols.contains(name) || BUILTIN_REFERENCES.contains(&name) {
                continue;
            }
            let line = ast
                .enclosing_task(id)
                .map_or_else(|| ast.position(id).0, |task| ast.position(task).0);
            return Err(SemanticError {
                kind: SemanticErrorKind::UndefinedReference,
                node_id: Some(id),
                line,
                message: format!("undefined reference: {}", name),
                hint: suggest(name, &state.symbols).map(|s| format!("did you mean `{}`?", s)),
            });
        }
    }
    Ok(())
}

/// Closest known name to `name`, if any is close enough.
pub fn suggest<'a>(name: &str, symbols: &'a SymbolTable) -> Option<&'a str> {
    symbols
        .names()
        .chain(BUILTIN_REFERENCES)
        .map(|candidate| (candidate, strsim::jaro_winkler(name, candidate)))
        .filter(|&(_, score)| score >= SUGGESTION_THRESHOLD)
        .max_by(|a, b| a.1.total_cmp(&b.1))
        .map(|(candidate, _)| candidate)
}

// ============================================================================
// Pass 4: Default Completion
// ============================================================================

/// Fill in missing titles, descriptions and values. Returns how many nodes changed.
fn complete_defaults(ast: &mut Ast) -> usize {
    let mut completed = 0;
    for id in ast.walk() {
        let (line, column) = ast.position(id);
        let mut synthesized = None;

        match ast.kind_mut(id) {
            NodeKind::Task {
                id: task_id,
                title,
                needs_default_body,
            } => {
                let title = title.get_or_insert_with(|| {
                    completed += 1;
                    humanize(task_id)
                });
                if *needs_default_body {
                    *needs_default_body = false;
                    synthesized = Some(format!("Execute task: {}", title));
                }
            }
            NodeKind::Tool { name, description, .. } => {
                if description.is_none() {
                    *description = Some(format!("Tool: {}", name));
                    completed += 1;
                }
            }
            NodeKind::Var { value, ty, .. } => {
                if value.is_none() {
                    *value = Some(Literal::None);
                    *ty = Some(ValueType::None);
                    completed += 1;
                }
            }
            _ => {}
        }

        if let Some(content) = synthesized {
            ast.add_child(id, NodeKind::text(content), line, column);
            completed += 1;
        }
    }
    completed
}

/// `load_data` -> `Load Data`
pub fn humanize(id: &str) -> String {
    let mut out = String::with_capacity(id.len());
    let mut previous_alpha = false;
    for c in id.chars() {
        let c = if c == '_' { ' ' } else { c };
        if c.is_alphabetic() {
            if previous_alpha {
                out.extend(c.to_lowercase());
            } else {
                out.extend(c.to_uppercase());
            }
            previous_alpha = true;
        } else {
            out.push(c);
            previous_alpha = false;
        }
    }
    out
}

// ============================================================================
// Pass 5: Scopes
// ============================================================================

fn check_scopes(ast: &Ast, state: &mut AnalysisState) -> SemanticResult<()> {
    for &child in ast.children(ast.root()) {
        check_scope_node(ast, child, state)?;
    }
    Ok(())
}

fn check_scope_node(ast: &Ast, id: NodeId, state: &mut AnalysisState) -> SemanticResult<()> {
    let kind = ast.kind(id);
    if kind.opens_scope() {
        state.scopes.push();
    }

    if let NodeKind::Var { name, .. } = kind {
        if state.scopes.define(name, id).is_some() {
            return Err(SemanticError::new(
                SemanticErrorKind::ScopeRedefinition,
                ast,
                id,
                format!("variable redefined in the same scope: {}", name),
            ));
        }
    }

    for &child in ast.children(id) {
        check_scope_node(ast, child, state)?;
    }

    if kind.opens_scope() {
        state.scopes.pop();
    }
    Ok(())
}

// ============================================================================
// Pass 6: Cycles
// ============================================================================

fn check_cycles(ast: &Ast, state: &AnalysisState) -> SemanticResult<()> {
    let mut finished = FxHashSet::default();
    for (task_id, symbol) in state.symbols.tasks() {
        let mut in_progress = FxHashSet::default();
        if let Some(at) = find_cycle(ast, state, task_id, symbol.node, &mut in_progress, &mut finished) {
            let node = state
                .symbols
                .get(SymbolKind::Task, &at)
                .map_or(symbol.node, |s| s.node);
            return Err(SemanticError::new(
                SemanticErrorKind::CircularReference,
                ast,
                node,
                format!("circular reference detected at task: {}", at),
            ));
        }
    }
    Ok(())
}

/// Depth-first search over `@next` edges. Returns the task at which a back
/// edge was found.
fn find_cycle(
    ast: &Ast,
    state: &AnalysisState,
    task_id: &str,
    node: NodeId,
    in_progress: &mut FxHashSet<String>,
    finished: &mut FxHashSet<String>,
) -> Option<String> {
    if finished.contains(task_id) {
        return None;
    }
    in_progress.insert(task_id.to_string());

    for target in ast.next_targets(node) {
        if in_progress.contains(target) {
            return Some(target.to_string());
        }
        if let Some(symbol) = state.symbols.get(SymbolKind::Task, target) {
            if let Some(at) = find_cycle(ast, state, target, symbol.node, in_progress, finished) {
                return Some(at);
            }
        }
    }

    in_progress.remove(task_id);
    finished.insert(task_id.to_string());
    None
}
