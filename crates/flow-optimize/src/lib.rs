//! AST optimization passes.
//!
//! Rewrites an analyzed tree in place into a smaller, normalized one.
//!
//! # Passes
//!
//! Run in this order, each over the whole tree:
//!
//! - **Dead code elimination**: prune nodes that can never execute, sweep detached ones
//! - **Constant folding**: evaluate arithmetic variable values, substitute constants into text
//! - **Text compression**: squeeze whitespace, punctuation and repeated words in long text
//! - **Node merging**: join adjacent text, optionally merge near-identical tasks
//! - **Duplicate elimination**: drop repeated variable and tool definitions
//! - **Structural normalization**: flatten same-kind nesting, reorder children by kind
//!
//! The sequence repeats until an iteration changes nothing, so optimizing an
//! optimized tree is a no-op.

pub mod compress;
pub mod dce;
pub mod dedup;
pub mod fold;
pub mod merge;
pub mod structure;

use flow_ast::Ast;
use serde::Serialize;
use std::fmt;
use thiserror::Error;
use tracing::{debug, trace};

/// Upper bound on pass-sequence iterations
pub const MAX_ITERATIONS: usize = 8;

// ============================================================================
// Errors
// ============================================================================

/// Optimizer failures. These signal a broken tree invariant, never bad input.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum OptimizeError {
    #[error("internal optimizer error in {pass}: {message}")]
    Internal { pass: &'static str, message: String },
}

pub type OptimizeResult<T> = Result<T, OptimizeError>;

// ============================================================================
// Options
// ============================================================================

/// Tuning knobs for the pass sequence
#[derive(Debug, Clone, PartialEq)]
pub struct OptimizeOptions {
    /// Merge tasks whose body text is nearly identical. Off by default: the
    /// heuristic can merge unrelated tasks that share vocabulary.
    pub merge_similar_tasks: bool,
    /// Jaccard similarity a task must exceed to join a group
    pub similarity_threshold: f64,
    /// Text nodes shorter than this many characters are left alone
    pub compression_threshold: usize,
}

impl Default for OptimizeOptions {
    fn default() -> Self {
        Self {
            merge_similar_tasks: false,
            similarity_threshold: 0.8,
            compression_threshold: 100,
        }
    }
}

// ============================================================================
// Report
// ============================================================================

/// How often each rewrite was applied, accumulated over all iterations
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct OptimizeReport {
    pub nodes_before: usize,
    pub nodes_after: usize,
    pub iterations: usize,
    pub dead_code_removed: usize,
    pub constants_folded: usize,
    pub text_compressed: usize,
    pub nodes_merged: usize,
    pub duplicates_removed: usize,
    pub nodes_flattened: usize,
    pub nodes_reordered: usize,
    /// Characters removed by text compression
    pub chars_saved: usize,
}

impl OptimizeReport {
    /// `nodes_before / nodes_after`; above 1.0 when the tree shrank.
    pub fn compression_ratio(&self) -> f64 {
        self.nodes_before as f64 / self.nodes_after.max(1) as f64
    }

    /// Total number of rewrites applied.
    pub fn changes(&self) -> usize {
        self.dead_code_removed
            + self.constants_folded
            + self.text_compressed
            + self.nodes_merged
            + self.duplicates_removed
            + self.nodes_flattened
            + self.nodes_reordered
    }

    /// One line per rewrite kind that did something
    pub fn applied(&self) -> Vec<String> {
        let entries = [
            ("Dead code elimination: removed", self.dead_code_removed, "nodes"),
            ("Constant folding: folded", self.constants_folded, "constants"),
            ("Text compression: compressed", self.text_compressed, "text nodes"),
            ("Node merging: merged", self.nodes_merged, "nodes"),
            ("Duplicate elimination: removed", self.duplicates_removed, "nodes"),
            ("Flattening: flattened", self.nodes_flattened, "nodes"),
            ("Reordering: reordered", self.nodes_reordered, "child lists"),
        ];
        entries
            .iter()
            .filter(|(_, count, _)| *count > 0)
            .map(|(what, count, unit)| format!("{} {} {}", what, count, unit))
            .collect()
    }

    fn absorb(&mut self, other: &OptimizeReport) {
        self.dead_code_removed += other.dead_code_removed;
        self.constants_folded += other.constants_folded;
        self.text_compressed += other.text_compressed;
        self.nodes_merged += other.nodes_merged;
        self.duplicates_removed += other.duplicates_removed;
        self.nodes_flattened += other.nodes_flattened;
        self.nodes_reordered += other.nodes_reordered;
        self.chars_saved += other.chars_saved;
    }
}

impl fmt::Display for OptimizeReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} -> {} nodes in {} iteration(s)",
            self.nodes_before, self.nodes_after, self.iterations
        )?;
        for line in self.applied() {
            write!(f, "\n  {}", line)?;
        }
        Ok(())
    }
}

// ============================================================================
// Driver
// ============================================================================

/// Runs the pass sequence to a fixed point
#[derive(Debug, Clone, Default)]
pub struct Optimizer {
    options: OptimizeOptions,
}

impl Optimizer {
    pub fn new(options: OptimizeOptions) -> Self {
        Self { options }
    }

    pub fn options(&self) -> &OptimizeOptions {
        &self.options
    }

    pub fn run(&self, ast: &mut Ast) -> OptimizeResult<OptimizeReport> {
        let mut report = OptimizeReport {
            nodes_before: ast.node_count(),
            ..OptimizeReport::default()
        };

        loop {
            if report.iterations == MAX_ITERATIONS {
                return Err(OptimizeError::Internal {
                    pass: "optimizer",
                    message: format!("no fixed point after {} iterations", MAX_ITERATIONS),
                });
            }
            report.iterations += 1;

            let step = self.iterate(ast)?;
            trace!(iteration = report.iterations, changes = step.changes(), "optimizer iteration");
            report.absorb(&step);
            if step.changes() == 0 {
                break;
            }
        }

        report.nodes_after = ast.node_count();
        debug!(
            before = report.nodes_before,
            after = report.nodes_after,
            iterations = report.iterations,
            "optimization complete"
        );
        Ok(report)
    }

    /// One pass over all six passes.
    fn iterate(&self, ast: &mut Ast) -> OptimizeResult<OptimizeReport> {
        let mut step = OptimizeReport {
            dead_code_removed: dce::eliminate_dead_code(ast)?,
            constants_folded: fold::fold_constants(ast),
            ..OptimizeReport::default()
        };

        let compression = compress::compress_text(ast, self.options.compression_threshold);
        step.text_compressed = compression.nodes;
        step.chars_saved = compression.chars_saved;

        step.nodes_merged = merge::merge_text_siblings(ast);
        if self.options.merge_similar_tasks {
            step.nodes_merged += merge::merge_similar_tasks(ast, self.options.similarity_threshold);
        }

        step.duplicates_removed = dedup::eliminate_duplicates(ast);
        step.nodes_flattened = structure::flatten(ast);
        step.nodes_reordered = structure::reorder(ast);

        // Nodes unlinked by merging and dedup are already counted.
        ast.compact();
        Ok(step)
    }
}

/// Optimize with default options.
pub fn optimize(ast: &mut Ast) -> OptimizeResult<OptimizeReport> {
    Optimizer::default().run(ast)
}
