//! Flow Benchmarks
//!
//! Performance benchmarks for the flow script compiler.
//! Run with: cargo bench -p flow-benchmarks
//!
//! The library part only generates benchmark inputs.

use std::fmt::Write;

/// A chain of `tasks` tasks, each with a local variable, a conditional and
/// an `@next` edge to the following task. Every fifth task repeats the body
/// of the previous one so the optimizer has duplicates to work on.
pub fn generate_flow(tasks: usize) -> String {
    let mut out = String::new();
    let _ = writeln!(out, "# title: generated");
    let _ = writeln!(out, "@var limit = 10 * 4");
    let _ = writeln!(out, "@tool fetch Download a page");
    for i in 0..tasks {
        let subject = if i % 5 == 4 { i - 1 } else { i };
        let _ = writeln!(out, "@task step_{}", i);
        let _ = writeln!(out, "    @var attempt = {}", i);
        let _ = writeln!(out, "    fetch up to ${{limit}} rows for item {}", subject);
        let _ = writeln!(out, "    then  check   the result!!");
        let _ = writeln!(out, "    @if attempt < limit");
        let _ = writeln!(out, "        retry later");
        let _ = writeln!(out, "    @else");
        let _ = writeln!(out, "        give up");
        let _ = writeln!(out, "    @endif");
        if i + 1 < tasks {
            let _ = writeln!(out, "    @next step_{}", i + 1);
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_generated_flow_compiles() {
        let source = generate_flow(12);
        let mut compiler = flow_compiler::Compiler::new(flow_compiler::CompilerConfig {
            parse_timeout_secs: 0,
            ..Default::default()
        });
        let compilation = compiler.compile_str(&source, None).unwrap();
        assert_eq!(compilation.program.tasks.len(), 12);
        assert_eq!(compilation.program.entry_point.as_deref(), Some("step_0"));
    }
}
