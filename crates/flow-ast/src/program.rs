//! Flat program model.
//!
//! This is the shape handed to serializers: tasks with ordered body blocks,
//! tools, variables and the selected entry point. It is produced from an
//! analyzed `Ast` by `flow_parser::to_program`.

use crate::literal::{Literal, ValueType, VarScope};
use indexmap::IndexMap;
use serde::Serialize;
use std::collections::HashSet;

/// A whole compiled script
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct Program {
    pub variables: Vec<Variable>,
    pub tools: Vec<Tool>,
    pub tasks: Vec<Task>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub entry_point: Option<String>,
}

impl Program {
    pub fn task(&self, id: &str) -> Option<&Task> {
        self.tasks.iter().find(|t| t.id == id)
    }

    /// The first task that no `next` edge points at, falling back to the
    /// first task when every task is targeted.
    pub fn determine_entry_point(&self) -> Option<String> {
        let targeted: HashSet<&str> = self
            .tasks
            .iter()
            .flat_map(|t| t.next.iter().map(NextTarget::target))
            .collect();

        self.tasks
            .iter()
            .find(|t| !targeted.contains(t.id.as_str()))
            .or_else(|| self.tasks.first())
            .map(|t| t.id.clone())
    }

    /// `(from, to)` for every `next` edge, in task order.
    pub fn edges(&self) -> Vec<(&str, &str)> {
        self.tasks
            .iter()
            .flat_map(|t| t.next.iter().map(move |n| (t.id.as_str(), n.target())))
            .collect()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Task {
    pub id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    pub body: Vec<Block>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub next: Vec<NextTarget>,
}

/// A `next` edge, optionally guarded by the condition of the branch it sits in
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(untagged)]
pub enum NextTarget {
    Plain(String),
    Conditional { when: String, target: String },
}

impl NextTarget {
    pub fn target(&self) -> &str {
        match self {
            NextTarget::Plain(target) | NextTarget::Conditional { target, .. } => target,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Tool {
    pub id: String,
    pub name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(skip_serializing_if = "IndexMap::is_empty")]
    pub parameters: IndexMap<String, String>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Variable {
    pub name: String,
    #[serde(skip_serializing_if = "Literal::is_none")]
    pub value: Literal,
    #[serde(rename = "type")]
    pub ty: ValueType,
    pub scope: VarScope,
}

// ============================================================================
// Body Blocks
// ============================================================================

/// One unit of a task body
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Block {
    Text {
        content: String,
        line: usize,
    },
    Code {
        #[serde(skip_serializing_if = "Option::is_none")]
        language: Option<String>,
        content: String,
        line: usize,
    },
    /// A directive kept in its source form (`@lang`, `@var`, `@include`)
    Directive {
        keyword: String,
        content: String,
        line: usize,
    },
    Conditional {
        branches: Vec<ConditionalBranch>,
        line: usize,
    },
    ToolCall {
        name: String,
        #[serde(skip_serializing_if = "Option::is_none")]
        description: Option<String>,
        line: usize,
    },
    AgentCall {
        name: String,
        #[serde(skip_serializing_if = "Option::is_none")]
        params: Option<String>,
        line: usize,
    },
    NextAction {
        target: String,
        line: usize,
    },
}

impl Block {
    pub fn line(&self) -> usize {
        match self {
            Block::Text { line, .. }
            | Block::Code { line, .. }
            | Block::Directive { line, .. }
            | Block::Conditional { line, .. }
            | Block::ToolCall { line, .. }
            | Block::AgentCall { line, .. }
            | Block::NextAction { line, .. } => *line,
        }
    }
}

/// One arm of a conditional; the `else` arm has no condition
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ConditionalBranch {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub condition: Option<String>,
    pub actions: Vec<ConditionalAction>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ConditionalAction {
    Text {
        content: String,
    },
    ToolCall {
        name: String,
    },
    AgentCall {
        name: String,
        #[serde(skip_serializing_if = "Option::is_none")]
        params: Option<String>,
    },
    Jump {
        target: String,
    },
    Conditional {
        branches: Vec<ConditionalBranch>,
    },
}
