//! Diagnostic rendering for terminal output.
//!
//! `TerminalRenderer` writes diagnostics in a compact rustc-like layout:
//! a colored header, the location arrow, the offending source line with an
//! underline, and one `= help:` line per suggestion.

use crate::{Diagnostic, DiagnosticSummary, Severity};
use std::io::{self, Write};
use termcolor::{Color, ColorChoice, ColorSpec, StandardStream, WriteColor};
use unicode_width::UnicodeWidthChar;

/// Renders diagnostics to any `WriteColor` sink.
pub struct TerminalRenderer<W: WriteColor> {
    out: W,
}

impl TerminalRenderer<StandardStream> {
    /// Renderer writing to stderr.
    pub fn stderr(use_color: bool) -> Self {
        let choice = if use_color {
            ColorChoice::Auto
        } else {
            ColorChoice::Never
        };
        Self::new(StandardStream::stderr(choice))
    }
}

impl<W: WriteColor> TerminalRenderer<W> {
    pub fn new(out: W) -> Self {
        Self { out }
    }

    pub fn into_inner(self) -> W {
        self.out
    }

    fn severity_color(severity: Severity) -> Color {
        match severity {
            Severity::Error => Color::Red,
            Severity::Warning => Color::Yellow,
        }
    }

    fn write_colored(&mut self, text: &str, color: Color, bold: bool) -> io::Result<()> {
        let mut spec = ColorSpec::new();
        spec.set_fg(Some(color)).set_bold(bold);
        self.out.set_color(&spec)?;
        write!(self.out, "{}", text)?;
        self.out.reset()
    }

    /// Renders a single diagnostic. `source` is the text the location points into.
    pub fn render(&mut self, diagnostic: &Diagnostic, source: Option<&str>) -> io::Result<()> {
        let color = Self::severity_color(diagnostic.severity);
        let header = format!("{}[{}]", diagnostic.severity.prefix(), diagnostic.code());
        self.write_colored(&header, color, true)?;
        self.write_colored(&format!(": {}", diagnostic.message), Color::White, true)?;
        writeln!(self.out)?;

        let location = &diagnostic.location;
        if !location.is_unknown() {
            writeln!(self.out, " --> {}", location)?;
            let line_text = source.and_then(|s| s.lines().nth(location.line - 1));
            if let Some(line_text) = line_text {
                self.write_snippet(diagnostic.severity, location.line, location.column, line_text)?;
            }
        }

        for suggestion in &diagnostic.suggestions {
            self.write_colored("  = help: ", Color::Green, false)?;
            writeln!(self.out, "{}", suggestion)?;
        }
        Ok(())
    }

    fn write_snippet(
        &mut self,
        severity: Severity,
        line: usize,
        column: usize,
        text: &str,
    ) -> io::Result<()> {
        let width = line.to_string().len();
        writeln!(self.out, "{:>width$} |", "", width = width)?;
        self.write_colored(&format!("{:>width$}", line, width = width), Color::Blue, false)?;
        writeln!(self.out, " | {}", text)?;

        let skip = column.saturating_sub(1);
        let lead: usize = text.chars().take(skip).map(|c| c.width().unwrap_or(0)).sum();
        let span: usize = text.chars().skip(skip).map(|c| c.width().unwrap_or(0)).sum();
        let underline: String = std::iter::repeat(severity.underline_char())
            .take(span.max(1))
            .collect();

        write!(self.out, "{:>width$} | {:lead$}", "", "", width = width, lead = lead)?;
        self.write_colored(&underline, Self::severity_color(severity), false)?;
        writeln!(self.out)
    }

    /// Renders every diagnostic followed by a summary line.
    pub fn render_all(&mut self, diagnostics: &[Diagnostic], source: Option<&str>) -> io::Result<()> {
        for diagnostic in diagnostics {
            self.render(diagnostic, source)?;
        }
        self.render_summary(diagnostics)
    }

    pub fn render_summary(&mut self, diagnostics: &[Diagnostic]) -> io::Result<()> {
        let summary = DiagnosticSummary::from_diagnostics(diagnostics);
        let color = if summary.has_errors() {
            Color::Red
        } else if summary.warnings > 0 {
            Color::Yellow
        } else {
            Color::Green
        };
        self.write_colored(&summary.to_string(), color, true)?;
        writeln!(self.out)
    }
}
