//! The compilation pipeline.
//!
//! Lex, parse and semantic failures abort immediately. Validation findings
//! are collected; in strict mode any error among them fails the run.
//! Optimizer failures are internal compiler errors.

use crate::config::{CompilerConfig, ConfigError};
use crate::preprocess::{complexity, extract_metadata, preprocess, Complexity};
use crate::serialize::OutputFormat;
use flow_ast::program::Program;
use flow_ast::Ast;
use flow_diagnostics::{Diagnostic, DiagnosticKind, SourceLocation};
use flow_lexer::{LexError, TokenStats};
use flow_optimize::{OptimizeOptions, OptimizeReport, Optimizer};
use flow_parser::ParseError;
use flow_semantic::{AnalysisState, SemanticError};
use flow_validate::{ValidationError, ValidationReport, Validator};
use indexmap::IndexMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::mpsc::{self, RecvTimeoutError};
use std::thread;
use thiserror::Error;
use tracing::{debug, instrument, warn, Span};

// ============================================================================
// Errors
// ============================================================================

/// Pipeline errors
#[derive(Debug, Error)]
pub enum CompileError {
    #[error("failed to read {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("source is {size} bytes, over the limit of {limit}")]
    FileTooLarge { size: usize, limit: usize },

    #[error("source produced {count} tokens, over the limit of {limit}")]
    TooManyTokens { count: usize, limit: usize },

    #[error("lex error: {0}")]
    Lex(#[from] LexError),

    #[error("parse error: {0}")]
    Parse(#[from] ParseError),

    #[error("semantic error: {0}")]
    Semantic(#[from] SemanticError),

    #[error("validation failed with {} error(s)", .errors.len())]
    Validation { errors: Vec<ValidationError> },

    #[error("internal compiler error: {0}")]
    Internal(String),

    #[error("compilation timed out after {seconds}s")]
    Timeout { seconds: u64 },

    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error("failed to write {format} output: {message}")]
    Serialize { format: OutputFormat, message: String },
}

pub type CompileResult<T> = Result<T, CompileError>;

impl CompileError {
    /// Source line the error points at, if any.
    pub fn line(&self) -> Option<usize> {
        match self {
            CompileError::Lex(e) => Some(e.line()),
            CompileError::Parse(e) => Some(e.line()),
            CompileError::Semantic(e) => Some(e.line),
            CompileError::Validation { errors } => errors.first().map(|e| e.line),
            _ => None,
        }
    }

    /// Structured diagnostics for this error, tagged with `file` when given.
    pub fn to_diagnostics(&self, file: Option<&Path>) -> Vec<Diagnostic> {
        let diagnostics = match self {
            CompileError::Lex(e) => vec![
                Diagnostic::error(DiagnosticKind::Lex, e.message()).at(SourceLocation::new(e.line(), 1)),
            ],
            CompileError::Parse(e) => vec![Diagnostic::error(DiagnosticKind::Parse, e.message())
                .at(SourceLocation::new(e.line(), e.column()))],
            CompileError::Semantic(e) => vec![Diagnostic::error(DiagnosticKind::Semantic, e.message.clone())
                .at(SourceLocation::new(e.line, 1))
                .with_suggestions(e.hint.clone())],
            CompileError::Validation { errors } => errors.iter().map(ValidationError::to_diagnostic).collect(),
            other => vec![Diagnostic::error(DiagnosticKind::Internal, other.to_string())],
        };
        match file {
            Some(file) => diagnostics.into_iter().map(|d| d.in_file(file)).collect(),
            None => diagnostics,
        }
    }
}

// ============================================================================
// Augmentation Seam
// ============================================================================

/// A rewrite run on the analyzed tree before validation.
///
/// External augmentation (for example a model-backed rewriter) plugs in
/// here. The tree it leaves behind is validated like any other.
pub trait AstPass: Send {
    fn name(&self) -> &str;

    fn run(&mut self, ast: &mut Ast) -> CompileResult<()>;
}

// ============================================================================
// Results
// ============================================================================

/// Output of the front half of the pipeline
#[derive(Debug, Clone)]
pub struct Check {
    pub ast: Ast,
    pub validation: ValidationReport,
    pub metadata: IndexMap<String, String>,
    pub complexity: Complexity,
    pub tokens: TokenStats,
}

/// Output of a full compilation
#[derive(Debug, Clone)]
pub struct Compilation {
    pub ast: Ast,
    pub program: Program,
    pub validation: ValidationReport,
    /// `None` when optimization is disabled
    pub optimize_report: Option<OptimizeReport>,
    pub metadata: IndexMap<String, String>,
    pub complexity: Complexity,
}

impl Compilation {
    /// Warnings, and errors tolerated outside strict mode.
    pub fn diagnostics(&self, file: Option<&Path>) -> Vec<Diagnostic> {
        report_diagnostics(&self.validation, file)
    }
}

impl Check {
    pub fn diagnostics(&self, file: Option<&Path>) -> Vec<Diagnostic> {
        report_diagnostics(&self.validation, file)
    }
}

fn report_diagnostics(report: &ValidationReport, file: Option<&Path>) -> Vec<Diagnostic> {
    report
        .to_diagnostics()
        .into_iter()
        .map(|d| match file {
            Some(file) => d.in_file(file),
            None => d,
        })
        .collect()
}

// ============================================================================
// Compiler
// ============================================================================

type Passes = Vec<Box<dyn AstPass>>;

/// Pipeline driver
pub struct Compiler {
    config: CompilerConfig,
    passes: Passes,
}

impl Default for Compiler {
    fn default() -> Self {
        Self::new(CompilerConfig::default())
    }
}

impl Compiler {
    pub fn new(config: CompilerConfig) -> Self {
        Self {
            config,
            passes: Vec::new(),
        }
    }

    pub fn config(&self) -> &CompilerConfig {
        &self.config
    }

    /// Register a pass to run after semantic analysis.
    pub fn with_pass(mut self, pass: impl AstPass + 'static) -> Self {
        self.passes.push(Box::new(pass));
        self
    }

    pub fn pass_names(&self) -> Vec<&str> {
        self.passes.iter().map(|p| p.name()).collect()
    }

    /// Compile `source` down to a `Program`.
    ///
    /// A compilation that times out keeps running on its worker thread and
    /// takes the registered passes with it.
    #[instrument(skip(self, source), fields(bytes = source.len()))]
    pub fn compile_str(&mut self, source: &str, file: Option<&Path>) -> CompileResult<Compilation> {
        let config = self.config.clone();
        let source = source.to_string();
        self.with_timeout(move |passes| {
            let check = front_end(&source, &config, passes)?;
            back_end(check, &config)
        })
    }

    /// Run everything up to and including validation.
    #[instrument(skip(self, source), fields(bytes = source.len()))]
    pub fn check_str(&mut self, source: &str, file: Option<&Path>) -> CompileResult<Check> {
        let config = self.config.clone();
        let source = source.to_string();
        self.with_timeout(move |passes| front_end(&source, &config, passes))
    }

    pub fn compile_file(&mut self, path: &Path) -> CompileResult<Compilation> {
        let source = read_source(path, self.config.max_file_size)?;
        self.compile_str(&source, Some(path))
    }

    pub fn check_file(&mut self, path: &Path) -> CompileResult<Check> {
        let source = read_source(path, self.config.max_file_size)?;
        self.check_str(&source, Some(path))
    }

    fn with_timeout<T, F>(&mut self, job: F) -> CompileResult<T>
    where
        T: Send + 'static,
        F: FnOnce(&mut Passes) -> CompileResult<T> + Send + 'static,
    {
        let mut passes = std::mem::take(&mut self.passes);
        let Some(timeout) = self.config.parse_timeout() else {
            let result = job(&mut passes);
            self.passes = passes;
            return result;
        };

        let (tx, rx) = mpsc::channel();
        let span = Span::current();
        thread::Builder::new()
            .name("flow-compile".to_string())
            .spawn(move || {
                let _entered = span.enter();
                let result = job(&mut passes);
                let _ = tx.send((result, passes));
            })
            .map_err(|e| CompileError::Internal(format!("failed to start compiler thread: {}", e)))?;

        match rx.recv_timeout(timeout) {
            Ok((result, passes)) => {
                self.passes = passes;
                result
            }
            Err(RecvTimeoutError::Timeout) => {
                warn!(seconds = timeout.as_secs(), "compilation timed out");
                Err(CompileError::Timeout {
                    seconds: timeout.as_secs(),
                })
            }
            Err(RecvTimeoutError::Disconnected) => {
                Err(CompileError::Internal("compiler thread stopped without a result".to_string()))
            }
        }
    }
}

/// Read a source file, rejecting it from its metadata when it is over `limit` bytes.
pub fn read_source(path: &Path, limit: usize) -> CompileResult<String> {
    let io = |source| CompileError::Io {
        path: path.to_path_buf(),
        source,
    };
    let size = fs::metadata(path).map_err(io)?.len();
    let size = usize::try_from(size).unwrap_or(usize::MAX);
    if size > limit {
        return Err(CompileError::FileTooLarge { size, limit });
    }
    fs::read_to_string(path).map_err(io)
}

fn front_end(source: &str, config: &CompilerConfig, passes: &mut Passes) -> CompileResult<Check> {
    if source.len() > config.max_file_size {
        return Err(CompileError::FileTooLarge {
            size: source.len(),
            limit: config.max_file_size,
        });
    }

    let text = preprocess(source);
    let metadata = extract_metadata(&text);
    let complexity = complexity(&text);
    debug!(?complexity, metadata = metadata.len(), "preprocessed");

    let tokens = flow_lexer::tokenize(&text)?;
    if tokens.len() > config.max_tokens {
        return Err(CompileError::TooManyTokens {
            count: tokens.len(),
            limit: config.max_tokens,
        });
    }
    let stats = TokenStats::from_tokens(&tokens);
    debug!(tokens = stats.total, directives = stats.directives, "lexed");

    let mut ast = flow_parser::parse(tokens)?;
    debug!(nodes = ast.node_count(), "parsed");

    let mut state = AnalysisState::new();
    flow_semantic::analyze(&mut ast, &mut state)?;
    debug!(symbols = state.symbols().len(), "analyzed");

    for pass in passes.iter_mut() {
        debug!(pass = pass.name(), "running pass");
        pass.run(&mut ast)?;
    }

    let validation = Validator::with_default_rules().validate(&ast);
    for finding in validation.findings() {
        warn!(rule = finding.rule, line = finding.line, "{}", finding.message);
    }
    if config.strict && validation.has_errors() {
        return Err(CompileError::Validation {
            errors: validation.errors().cloned().collect(),
        });
    }

    Ok(Check {
        ast,
        validation,
        metadata,
        complexity,
        tokens: stats,
    })
}

fn back_end(check: Check, config: &CompilerConfig) -> CompileResult<Compilation> {
    let Check {
        mut ast,
        validation,
        metadata,
        complexity,
        ..
    } = check;

    let optimize_report = if config.optimize {
        let optimizer = Optimizer::new(OptimizeOptions {
            merge_similar_tasks: config.merge_similar_tasks,
            ..OptimizeOptions::default()
        });
        let report = optimizer
            .run(&mut ast)
            .map_err(|e| CompileError::Internal(e.to_string()))?;
        debug!(%report, "optimized");
        Some(report)
    } else {
        None
    };

    let program = flow_parser::to_program(&ast);
    debug!(
        tasks = program.tasks.len(),
        tools = program.tools.len(),
        variables = program.variables.len(),
        entry = program.entry_point.as_deref().unwrap_or("-"),
        "lowered"
    );

    Ok(Compilation {
        ast,
        program,
        validation,
        optimize_report,
        metadata,
        complexity,
    })
}
