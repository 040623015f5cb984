//! Flow Script Compiler
//!
//! Drives the full pipeline over one source file:
//!
//! ```text
//! preprocess -> lex -> parse -> analyze -> passes -> validate -> optimize -> program
//! ```
//!
//! Library users start from [`Compiler`]; the `flowc` binary wraps it with a
//! command-line interface.

pub mod config;
pub mod logging;
pub mod pipeline;
pub mod preprocess;
pub mod serialize;

pub use config::{CompilerConfig, ConfigError};
pub use pipeline::{read_source, AstPass, Check, Compilation, CompileError, CompileResult, Compiler};
pub use preprocess::{complexity, extract_metadata, preprocess, Complexity};
pub use serialize::{CompiledOutput, OutputFormat};

/// Compiler version string embedded in compiled output
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
