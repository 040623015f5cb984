//! Validation Rules
//!
//! Each file in this module holds the rules for one concern:
//!
//! - `graph.rs` - cycles, isolated tasks, empty scripts
//! - `types.rs` - declared versus actual variable types
//! - `conflicts.rs` - id, name and port collisions
//! - `references.rs` - unresolved placeholders
//! - `content.rs` - task bodies, tool parameters, condition syntax

mod conflicts;
mod content;
mod graph;
mod references;
mod types;

pub use conflicts::{UniqueNameRule, UniquePortRule, UniqueTaskIdRule, UniqueToolIdRule};
pub use content::{ConditionSyntaxRule, InvalidParameterRule, TaskContentRule};
pub use graph::{HasTasksRule, IsolatedTaskRule, NoCyclesRule};
pub use references::UndefinedReferenceRule;
pub use types::TypeCompatibilityRule;
