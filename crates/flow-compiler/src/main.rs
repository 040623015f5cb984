//! Flow Script Compiler
//!
//! Command-line interface for compiling flow scripts.

use anyhow::Context;
use ariadne::{Color, Label, Report, ReportKind, Source};
use clap::{ArgAction, Parser, Subcommand};
use flow_compiler::{
    logging, preprocess, read_source, CompileError, CompiledOutput, Compiler, CompilerConfig, OutputFormat,
};
use flow_diagnostics::{Diagnostic, DiagnosticSummary, Severity};
use flow_lexer::TokenStats;
use std::fs;
use std::ops::Range;
use std::path::{Path, PathBuf};
use std::process::ExitCode;

#[derive(Parser)]
#[command(name = "flowc")]
#[command(version)]
#[command(about = "Compiler for directive-based flow scripts", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Configuration file (TOML)
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Enable debug logging
    #[arg(long, global = true)]
    debug: bool,

    /// Increase log verbosity (-v info, -vv debug, -vvv trace)
    #[arg(short, long, action = ArgAction::Count, global = true)]
    verbose: u8,
}

#[derive(Subcommand)]
enum Commands {
    /// Compile a flow script to JSON, YAML or TOML
    Compile {
        /// Source file to compile
        file: PathBuf,
        /// Output file path (stdout if omitted)
        #[arg(short, long)]
        output: Option<PathBuf>,
        /// Output format: json, yaml or toml
        #[arg(short, long)]
        format: Option<OutputFormat>,
        /// Write compact output
        #[arg(long)]
        compact: bool,
        /// Fail on validation errors
        #[arg(long, overrides_with = "no_strict")]
        strict: bool,
        /// Report validation errors without failing
        #[arg(long)]
        no_strict: bool,
        /// Skip the optimizer
        #[arg(long)]
        no_optimize: bool,
        /// Merge tasks with near-identical bodies
        #[arg(long)]
        merge_similar: bool,
    },
    /// Check a flow script for errors without compiling
    Check {
        /// Source file to check
        file: PathBuf,
        /// Treat warnings as errors
        #[arg(long)]
        strict: bool,
    },
    /// Lex a flow script and display tokens
    Lex {
        /// Source file to lex
        file: PathBuf,
    },
    /// Parse a flow script and display the tree
    Parse {
        /// Source file to parse
        file: PathBuf,
        /// Run semantic analysis before printing
        #[arg(long)]
        analyze: bool,
    },
    /// Show configuration
    Config {
        /// Print the effective configuration as TOML
        #[arg(long)]
        show: bool,
        /// List supported output formats
        #[arg(long)]
        list_formats: bool,
    },
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    match run(cli) {
        Ok(code) => code,
        Err(err) => {
            eprintln!("error: {:#}", err);
            ExitCode::FAILURE
        }
    }
}

fn run(cli: Cli) -> anyhow::Result<ExitCode> {
    let mut config = CompilerConfig::load(cli.config.as_deref()).context("failed to load configuration")?;
    config.debug |= cli.debug;
    match cli.verbose {
        0 => {}
        1 => config.log_level = "info".to_string(),
        2 => config.log_level = "debug".to_string(),
        _ => config.log_level = "trace".to_string(),
    }
    logging::init(config.effective_log_level(), config.debug);

    match cli.command {
        Commands::Compile {
            file,
            output,
            format,
            compact,
            strict,
            no_strict,
            no_optimize,
            merge_similar,
        } => {
            if let Some(format) = format {
                config.output_format = format;
            }
            config.compact |= compact;
            if strict {
                config.strict = true;
            }
            if no_strict {
                config.strict = false;
            }
            config.optimize &= !no_optimize;
            config.merge_similar_tasks |= merge_similar;
            compile_file(&file, output.as_deref(), config)
        }
        Commands::Check { file, strict } => Ok(check_file(&file, strict, config)),
        Commands::Lex { file } => Ok(lex_file(&file, config.max_file_size)),
        Commands::Parse { file, analyze } => Ok(parse_file(&file, analyze, config.max_file_size)),
        Commands::Config { show, list_formats } => {
            show_config(&config, show || !list_formats, list_formats);
            Ok(ExitCode::SUCCESS)
        }
    }
}

/// Read `path` unless its metadata reports more than `limit` bytes.
fn read_file(path: &Path, limit: usize) -> Option<String> {
    match read_source(path, limit) {
        Ok(s) => Some(s),
        Err(CompileError::Io { source, .. }) => {
            eprintln!("Error reading file '{}': {}", path.display(), source);
            None
        }
        Err(e) => {
            eprintln!("Error reading file '{}': {}", path.display(), e);
            None
        }
    }
}

/// Compile a source file and write the output document
fn compile_file(path: &Path, output: Option<&Path>, config: CompilerConfig) -> anyhow::Result<ExitCode> {
    let Some(source) = read_file(path, config.max_file_size) else {
        return Ok(ExitCode::FAILURE);
    };
    let shown = ReportSource::new(path, &source);
    let (format, compact, debug) = (config.output_format, config.compact, config.debug);

    let mut compiler = Compiler::new(config);
    let compilation = match compiler.compile_str(&source, Some(path)) {
        Ok(compilation) => compilation,
        Err(err) => {
            report_compile_error(&shown, &err);
            eprintln!("\nCompilation failed with errors.");
            return Ok(ExitCode::FAILURE);
        }
    };

    for diagnostic in compilation.diagnostics(Some(path)) {
        report_diagnostic(&shown, &diagnostic);
    }
    if let Some(report) = &compilation.optimize_report {
        if debug {
            eprintln!("Optimization: {}", report);
        }
    }

    let document = CompiledOutput::from_compilation(&compilation, Some(path));
    for problem in document.validate_dag() {
        eprintln!("warning: {}", problem);
    }
    let text = document.render(format, compact)?;

    match output {
        Some(out) => {
            fs::write(out, text).with_context(|| format!("failed to write {}", out.display()))?;
            println!("Compiled {} -> {}", path.display(), out.display());
        }
        None => println!("{}", text),
    }
    Ok(ExitCode::SUCCESS)
}

/// Check a source file for errors and warnings
fn check_file(path: &Path, strict: bool, mut config: CompilerConfig) -> ExitCode {
    let Some(source) = read_file(path, config.max_file_size) else {
        return ExitCode::FAILURE;
    };
    let shown = ReportSource::new(path, &source);

    config.strict = false;
    let mut compiler = Compiler::new(config);
    let diagnostics = match compiler.check_str(&source, Some(path)) {
        Ok(check) => check.diagnostics(Some(path)),
        Err(err) => err.to_diagnostics(Some(path)),
    };
    for diagnostic in &diagnostics {
        report_diagnostic(&shown, diagnostic);
    }

    let summary = DiagnosticSummary::from_diagnostics(&diagnostics);
    if summary.errors > 0 || (strict && summary.warnings > 0) {
        eprintln!(
            "\nCheck failed: {} error(s), {} warning(s).",
            summary.errors, summary.warnings
        );
        ExitCode::FAILURE
    } else {
        println!("Check passed: {}", path.display());
        ExitCode::SUCCESS
    }
}

/// Lex a source file and display tokens
fn lex_file(path: &Path, limit: usize) -> ExitCode {
    let Some(source) = read_file(path, limit) else {
        return ExitCode::FAILURE;
    };
    let shown = ReportSource::new(path, &source);

    match flow_lexer::tokenize(&shown.text) {
        Ok(tokens) => {
            println!("Tokens ({}):", tokens.len());
            for token in &tokens {
                println!("  {}", token);
            }
            println!();
            print!("{}", TokenStats::from_tokens(&tokens));
            ExitCode::SUCCESS
        }
        Err(err) => {
            report_compile_error(&shown, &CompileError::Lex(err));
            ExitCode::FAILURE
        }
    }
}

/// Parse a source file and display the tree
fn parse_file(path: &Path, analyze: bool, limit: usize) -> ExitCode {
    let Some(source) = read_file(path, limit) else {
        return ExitCode::FAILURE;
    };
    let shown = ReportSource::new(path, &source);

    let result = flow_lexer::tokenize(&shown.text)
        .map_err(CompileError::from)
        .and_then(|tokens| flow_parser::parse(tokens).map_err(CompileError::from))
        .and_then(|mut ast| {
            if analyze {
                let mut state = flow_semantic::AnalysisState::new();
                flow_semantic::analyze(&mut ast, &mut state)?;
            }
            Ok(ast)
        });

    match result {
        Ok(ast) => {
            println!("Tree ({} nodes):", ast.node_count());
            print!("{}", ast.dump());
            ExitCode::SUCCESS
        }
        Err(err) => {
            report_compile_error(&shown, &err);
            ExitCode::FAILURE
        }
    }
}

fn show_config(config: &CompilerConfig, show: bool, list_formats: bool) {
    if show {
        print!("{}", config.to_toml());
    }
    if list_formats {
        println!("Output formats:");
        for format in OutputFormat::ALL {
            let marker = if format == config.output_format { " (default)" } else { "" };
            println!("  {}{}", format, marker);
        }
    }
}

// ============================================================================
// Reports
// ============================================================================

/// A file as the compiler saw it. Diagnostic lines count lines of the
/// preprocessed text, so reports are rendered against that text.
struct ReportSource {
    filename: String,
    text: String,
}

impl ReportSource {
    fn new(path: &Path, raw: &str) -> Self {
        Self {
            filename: path.display().to_string(),
            text: preprocess(raw),
        }
    }

    fn line_span(&self, line: usize) -> Option<Range<usize>> {
        line_span(&self.text, line)
    }
}

fn report_compile_error(shown: &ReportSource, error: &CompileError) {
    for diagnostic in error.to_diagnostics(None) {
        report_diagnostic(shown, &diagnostic);
    }
}

fn report_diagnostic(shown: &ReportSource, diagnostic: &Diagnostic) {
    let filename = shown.filename.as_str();
    let (kind, color) = match diagnostic.severity {
        Severity::Error => (ReportKind::Error, Color::Red),
        Severity::Warning => (ReportKind::Warning, Color::Yellow),
    };

    let span = shown.line_span(diagnostic.location.line);
    let mut report = Report::build(kind, filename, span.as_ref().map_or(0, |s| s.start))
        .with_code(diagnostic.code())
        .with_message(&diagnostic.message);
    if let Some(span) = span {
        report = report.with_label(
            Label::new((filename, span))
                .with_message(format!("{} {}", diagnostic.kind, diagnostic.severity.prefix()))
                .with_color(color),
        );
    }
    if !diagnostic.suggestions.is_empty() {
        report = report.with_help(diagnostic.suggestions.join("\n"));
    }

    if let Err(e) = report.finish().eprint((filename, Source::from(shown.text.as_str()))) {
        eprintln!("{}", diagnostic);
        tracing::debug!("failed to render report: {}", e);
    }
}

/// Character range of the 1-based `line` of `source`, without its newline.
fn line_span(source: &str, line: usize) -> Option<Range<usize>> {
    if line == 0 {
        return None;
    }
    let mut start = 0;
    for (index, text) in source.split('\n').enumerate() {
        let len = text.trim_end_matches('\r').chars().count();
        if index + 1 == line {
            return Some(start..start + len);
        }
        start += text.chars().count() + 1;
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_line_span() {
        let source = "@task a\n    héllo\r\n@task b\n";
        assert_eq!(line_span(source, 0), None);
        assert_eq!(line_span(source, 1), Some(0..7));
        assert_eq!(line_span(source, 2), Some(8..17));
        assert_eq!(line_span(source, 3), Some(19..26));
        assert_eq!(line_span(source, 9), None);
    }

    #[test]
    fn test_report_lines_follow_preprocessed_text() {
        let raw = "\u{feff}@task a\r\tfirst\r\tsecond\r\n";
        assert_eq!(line_span(raw, 3), None);

        let shown = ReportSource::new(Path::new("demo.flow"), raw);
        let span = shown.line_span(3).unwrap();
        let line: String = shown.text.chars().skip(span.start).take(span.len()).collect();
        assert_eq!(line, "    second");
        assert_eq!(shown.filename, "demo.flow");
    }

    #[test]
    fn test_read_file_checks_size_first() {
        let path = std::env::temp_dir().join(format!("flowc-size-{}.flow", std::process::id()));
        fs::write(&path, "@task t\n    do it\n").unwrap();

        assert_eq!(read_file(&path, 8), None);
        assert_eq!(read_file(&path, 1024).as_deref(), Some("@task t\n    do it\n"));
        assert_eq!(read_file(&path.with_extension("missing"), 1024), None);
        fs::remove_file(&path).unwrap();
    }

    #[test]
    fn test_cli_flags() {
        let cli = Cli::parse_from([
            "flowc", "compile", "demo.flow", "-f", "toml", "--no-strict", "--merge-similar", "-vv",
        ]);
        assert_eq!(cli.verbose, 2);
        match cli.command {
            Commands::Compile {
                file,
                format,
                no_strict,
                merge_similar,
                ..
            } => {
                assert_eq!(file, PathBuf::from("demo.flow"));
                assert_eq!(format, Some(OutputFormat::Toml));
                assert!(no_strict);
                assert!(merge_similar);
            }
            _ => panic!("expected compile"),
        }
    }

    #[test]
    fn test_yaml_format_flag() {
        let cli = Cli::parse_from(["flowc", "compile", "demo.flow", "--format", "yaml"]);
        match cli.command {
            Commands::Compile { format, .. } => assert_eq!(format, Some(OutputFormat::Yaml)),
            _ => panic!("expected compile"),
        }
        assert!(Cli::try_parse_from(["flowc", "compile", "demo.flow", "-f", "proto"]).is_err());
    }
}
