//! Compiled output documents.
//!
//! A [`CompiledOutput`] is the flat `Program` plus file-level metadata,
//! written as JSON, YAML or TOML.

use crate::pipeline::{Compilation, CompileError, CompileResult};
use flow_ast::program::{Program, Task, Tool, Variable};
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::fmt;
use std::path::Path;
use std::str::FromStr;

/// Version of the output document layout
pub const FORMAT_VERSION: &str = "1.0";

/// Output document format
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OutputFormat {
    #[default]
    Json,
    Yaml,
    Toml,
}

impl OutputFormat {
    pub const ALL: [OutputFormat; 3] = [OutputFormat::Json, OutputFormat::Yaml, OutputFormat::Toml];

    pub fn name(&self) -> &'static str {
        match self {
            OutputFormat::Json => "json",
            OutputFormat::Yaml => "yaml",
            OutputFormat::Toml => "toml",
        }
    }

    /// File extension for compiled output
    pub fn extension(&self) -> &'static str {
        self.name()
    }
}

impl fmt::Display for OutputFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for OutputFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "json" => Ok(OutputFormat::Json),
            "yaml" | "yml" => Ok(OutputFormat::Yaml),
            "toml" => Ok(OutputFormat::Toml),
            other => Err(format!("unknown output format '{}', expected json, yaml or toml", other)),
        }
    }
}

/// File-level metadata: the `# key: value` header plus compiler facts
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct OutputMetadata {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub source_file: Option<String>,
    pub directive_count: usize,
    #[serde(flatten)]
    pub header: IndexMap<String, String>,
}

/// The document written by `flowc compile`
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CompiledOutput {
    pub version: String,
    pub compiler_version: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub entry_point: Option<String>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub source_files: Vec<String>,
    pub metadata: OutputMetadata,
    pub variables: Vec<Variable>,
    pub tools: Vec<Tool>,
    pub tasks: Vec<Task>,
}

impl CompiledOutput {
    pub fn new(program: &Program, metadata: OutputMetadata) -> Self {
        Self {
            version: FORMAT_VERSION.to_string(),
            compiler_version: crate::VERSION.to_string(),
            entry_point: program.entry_point.clone(),
            source_files: metadata.source_file.iter().cloned().collect(),
            metadata,
            variables: program.variables.clone(),
            tools: program.tools.clone(),
            tasks: program.tasks.clone(),
        }
    }

    pub fn from_compilation(compilation: &Compilation, source_file: Option<&Path>) -> Self {
        let metadata = OutputMetadata {
            source_file: source_file.map(|p| p.display().to_string()),
            directive_count: compilation.complexity.directives,
            header: compilation.metadata.clone(),
        };
        Self::new(&compilation.program, metadata)
    }

    /// Render in `format`; `compact` drops pretty-printing. YAML has a
    /// single block layout and ignores it.
    pub fn render(&self, format: OutputFormat, compact: bool) -> CompileResult<String> {
        let rendered = match format {
            OutputFormat::Json if compact => serde_json::to_string(self).map_err(|e| e.to_string()),
            OutputFormat::Json => serde_json::to_string_pretty(self).map_err(|e| e.to_string()),
            OutputFormat::Yaml => serde_yaml::to_string(self).map_err(|e| e.to_string()),
            OutputFormat::Toml if compact => toml::to_string(self).map_err(|e| e.to_string()),
            OutputFormat::Toml => toml::to_string_pretty(self).map_err(|e| e.to_string()),
        };
        rendered.map_err(|message| CompileError::Serialize { format, message })
    }

    /// Describe every `next` edge whose target is not a task.
    pub fn validate_dag(&self) -> Vec<String> {
        let ids: HashSet<&str> = self.tasks.iter().map(|t| t.id.as_str()).collect();
        self.tasks
            .iter()
            .flat_map(|task| task.next.iter().map(move |next| (task.id.as_str(), next.target())))
            .filter(|(_, target)| !ids.contains(target))
            .map(|(from, target)| format!("task '{}' points to unknown task '{}'", from, target))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use flow_ast::program::{Block, NextTarget};
    use flow_ast::{Literal, ValueType, VarScope};
    use insta::assert_snapshot;
    use pretty_assertions::assert_eq;

    fn program() -> Program {
        let mut program = Program {
            variables: Vec::new(),
            tools: Vec::new(),
            tasks: vec![
                Task {
                    id: "fetch".to_string(),
                    title: Some("Fetch".to_string()),
                    body: vec![Block::Text {
                        content: "download the report".to_string(),
                        line: 2,
                    }],
                    next: vec![NextTarget::Plain("send".to_string())],
                },
                Task {
                    id: "send".to_string(),
                    title: None,
                    body: Vec::new(),
                    next: Vec::new(),
                },
            ],
            entry_point: None,
        };
        program.entry_point = program.determine_entry_point();
        program
    }

    fn output() -> CompiledOutput {
        let mut header = IndexMap::new();
        header.insert("title".to_string(), "Report".to_string());
        CompiledOutput::new(
            &program(),
            OutputMetadata {
                source_file: Some("report.flow".to_string()),
                directive_count: 3,
                header,
            },
        )
    }

    #[test]
    fn test_output_format_parsing() {
        assert_eq!("JSON".parse::<OutputFormat>(), Ok(OutputFormat::Json));
        assert_eq!("toml".parse::<OutputFormat>(), Ok(OutputFormat::Toml));
        assert_eq!("yml".parse::<OutputFormat>(), Ok(OutputFormat::Yaml));
        assert_eq!(OutputFormat::Yaml.extension(), "yaml");
        assert!("proto".parse::<OutputFormat>().is_err());
        assert_eq!(OutputFormat::default(), OutputFormat::Json);
    }

    #[test]
    fn test_json_document() {
        let text = output().render(OutputFormat::Json, false).unwrap();
        let value: serde_json::Value = serde_json::from_str(&text).unwrap();

        assert_eq!(value["version"], "1.0");
        assert_eq!(value["entry_point"], "fetch");
        assert_eq!(value["source_files"][0], "report.flow");
        assert_eq!(value["metadata"]["title"], "Report");
        assert_eq!(value["metadata"]["directive_count"], 3);
        assert_eq!(value["tasks"][0]["body"][0]["type"], "text");
        assert_eq!(value["tasks"][0]["next"][0], "send");
        assert!(value["tasks"][1].get("title").is_none());
        assert!(value["tasks"][1].get("next").is_none());
    }

    #[test]
    fn test_compact_json_is_single_line() {
        let doc = output();
        let compact = doc.render(OutputFormat::Json, true).unwrap();
        let pretty = doc.render(OutputFormat::Json, false).unwrap();
        assert!(!compact.contains('\n'));
        assert!(compact.len() < pretty.len());
    }

    #[test]
    fn test_yaml_document() {
        let mut doc = output();
        doc.compiler_version = "test".to_string();
        doc.variables.push(Variable {
            name: "limit".to_string(),
            value: Literal::Int(5),
            ty: ValueType::Integer,
            scope: VarScope::Global,
        });
        doc.tools.push(Tool {
            id: "tool_2".to_string(),
            name: "fetch".to_string(),
            description: Some("Download data".to_string()),
            parameters: IndexMap::new(),
        });
        doc.tasks[1].body.push(Block::Text {
            content: "send it".to_string(),
            line: 4,
        });

        assert_snapshot!(doc.render(OutputFormat::Yaml, false).unwrap(), @r###"
        version: '1.0'
        compiler_version: test
        entry_point: fetch
        source_files:
        - report.flow
        metadata:
          source_file: report.flow
          directive_count: 3
          title: Report
        variables:
        - name: limit
          value: 5
          type: integer
          scope: global
        tools:
        - id: tool_2
          name: fetch
          description: Download data
        tasks:
        - id: fetch
          title: Fetch
          body:
          - type: text
            content: download the report
            line: 2
          next:
          - send
        - id: send
          body:
          - type: text
            content: send it
            line: 4
        "###);
    }

    #[test]
    fn test_toml_document() {
        let text = output().render(OutputFormat::Toml, false).unwrap();
        assert!(text.contains("version = \"1.0\""));
        assert!(text.contains("entry_point = \"fetch\""));
        assert!(text.contains("[[tasks]]"));
        assert!(text.contains("download the report"));
    }

    #[test]
    fn test_validate_dag() {
        let mut doc = output();
        assert!(doc.validate_dag().is_empty());

        doc.tasks[1].next.push(NextTarget::Conditional {
            when: "failed".to_string(),
            target: "retry".to_string(),
        });
        assert_eq!(doc.validate_dag(), vec!["task 'send' points to unknown task 'retry'"]);
    }
}
