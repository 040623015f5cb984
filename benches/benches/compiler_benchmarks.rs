//! Compiler Performance Benchmarks
//!
//! Benchmarks the flow script pipeline phase by phase:
//! - Lexer throughput
//! - Parser throughput
//! - Semantic analysis and validation
//! - Optimizer fixed point
//! - Full compilation

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};
use flow_benchmarks::generate_flow;
use flow_compiler::{preprocess, Compiler, CompilerConfig};

const SIZES: [(&str, usize); 3] = [("small", 10), ("medium", 100), ("large", 1000)];

fn inputs() -> Vec<(&'static str, String)> {
    SIZES
        .iter()
        .map(|&(name, tasks)| (name, preprocess(&generate_flow(tasks))))
        .collect()
}

fn analyzed(source: &str) -> flow_ast::Ast {
    let tokens = flow_lexer::tokenize(source).unwrap_or_default();
    let mut ast = flow_parser::parse(tokens).unwrap_or_default();
    let mut state = flow_semantic::AnalysisState::new();
    let _ = flow_semantic::analyze(&mut ast, &mut state);
    ast
}

// ============================================================================
// Front End
// ============================================================================

fn bench_lexer(c: &mut Criterion) {
    let mut group = c.benchmark_group("lexer");
    for (name, source) in inputs() {
        group.throughput(Throughput::Bytes(source.len() as u64));
        group.bench_with_input(BenchmarkId::new("tokenize", name), &source, |b, source| {
            b.iter(|| flow_lexer::tokenize(black_box(source)))
        });
    }
    group.finish();
}

fn bench_parser(c: &mut Criterion) {
    let mut group = c.benchmark_group("parser");
    for (name, source) in inputs() {
        let tokens = flow_lexer::tokenize(&source).unwrap_or_default();
        group.throughput(Throughput::Elements(tokens.len() as u64));
        group.bench_with_input(BenchmarkId::new("parse", name), &tokens, |b, tokens| {
            b.iter(|| flow_parser::parse(black_box(tokens.clone())))
        });
    }
    group.finish();
}

fn bench_analysis(c: &mut Criterion) {
    let mut group = c.benchmark_group("analysis");
    for (name, source) in inputs() {
        let tokens = flow_lexer::tokenize(&source).unwrap_or_default();
        let parsed = flow_parser::parse(tokens).unwrap_or_default();
        group.bench_with_input(BenchmarkId::new("analyze", name), &parsed, |b, parsed| {
            b.iter(|| {
                let mut ast = parsed.clone();
                let mut state = flow_semantic::AnalysisState::new();
                let _ = flow_semantic::analyze(black_box(&mut ast), &mut state);
                ast
            })
        });

        let ast = analyzed(&source);
        group.bench_with_input(BenchmarkId::new("validate", name), &ast, |b, ast| {
            b.iter(|| flow_validate::validate(black_box(ast)))
        });
    }
    group.finish();
}

// ============================================================================
// Optimizer and Pipeline
// ============================================================================

fn bench_optimizer(c: &mut Criterion) {
    let mut group = c.benchmark_group("optimizer");
    for (name, source) in inputs() {
        let ast = analyzed(&source);
        group.throughput(Throughput::Elements(ast.node_count() as u64));
        group.bench_with_input(BenchmarkId::new("optimize", name), &ast, |b, ast| {
            b.iter(|| {
                let mut ast = ast.clone();
                let _ = flow_optimize::optimize(black_box(&mut ast));
                ast
            })
        });
    }
    group.finish();
}

fn bench_compile(c: &mut Criterion) {
    let mut group = c.benchmark_group("compile");
    for (name, source) in inputs() {
        group.throughput(Throughput::Bytes(source.len() as u64));
        group.bench_with_input(BenchmarkId::new("compile_str", name), &source, |b, source| {
            let mut compiler = Compiler::new(CompilerConfig {
                parse_timeout_secs: 0,
                ..CompilerConfig::default()
            });
            b.iter(|| compiler.compile_str(black_box(source), None))
        });
    }
    group.finish();
}

criterion_group!(
    benches,
    bench_lexer,
    bench_parser,
    bench_analysis,
    bench_optimizer,
    bench_compile
);
criterion_main!(benches);
