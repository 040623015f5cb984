//! Lowering of the arena tree into the flat `Program` model.

use flow_ast::program::{
    Block, ConditionalAction, ConditionalBranch, NextTarget, Program, Task, Tool, Variable,
};
use flow_ast::{Ast, Literal, NodeId, NodeKind, VarScope};

/// Flatten an analyzed tree into tasks, tools and variables.
pub fn to_program(ast: &Ast) -> Program {
    let mut lowering = Lowering {
        ast,
        program: Program::default(),
    };
    lowering.top_level(ast.children(ast.root()));
    let mut program = lowering.program;
    program.entry_point = program.determine_entry_point();
    program
}

struct Lowering<'a> {
    ast: &'a Ast,
    program: Program,
}

impl<'a> Lowering<'a> {
    fn top_level(&mut self, children: &[NodeId]) {
        let ast = self.ast;
        for &id in children {
            let (line, _) = ast.position(id);
            match ast.kind(id) {
                NodeKind::Task { .. } => {
                    let task = self.task(id);
                    self.program.tasks.push(task);
                }
                NodeKind::Tool {
                    name,
                    description,
                    parameters,
                } => self.program.tools.push(Tool {
                    id: format!("tool_{}", line),
                    name: name.to_string(),
                    description: description.clone(),
                    parameters: parameters.clone(),
                }),
                NodeKind::Var {
                    name, value, ty, ..
                } => {
                    let value = value.clone().unwrap_or(Literal::None);
                    self.program.variables.push(Variable {
                        name: name.to_string(),
                        ty: ty.unwrap_or_else(|| value.value_type()),
                        value,
                        scope: VarScope::Global,
                    });
                }
                NodeKind::Block => self.top_level(ast.children(id)),
                _ => {}
            }
        }
    }

    fn task(&self, id: NodeId) -> Task {
        let (task_id, title) = match self.ast.kind(id) {
            NodeKind::Task { id, title, .. } => (id.to_string(), title.clone()),
            _ => (String::new(), None),
        };
        let mut next = Vec::new();
        let body = self.body(self.ast.children(id), &mut Vec::new(), &mut next);
        Task {
            id: task_id,
            title,
            body,
            next,
        }
    }

    fn body(
        &self,
        children: &[NodeId],
        guards: &mut Vec<String>,
        next: &mut Vec<NextTarget>,
    ) -> Vec<Block> {
        let mut blocks = Vec::new();
        let mut i = 0;
        while i < children.len() {
            let id = children[i];
            let (line, _) = self.ast.position(id);
            match self.ast.kind(id) {
                NodeKind::Text { content, .. } => blocks.push(Block::Text {
                    content: content.clone(),
                    line,
                }),
                NodeKind::Code { language, content } => blocks.push(Block::Code {
                    language: language.clone(),
                    content: content.clone(),
                    line,
                }),
                NodeKind::Tool {
                    name, description, ..
                } => blocks.push(Block::ToolCall {
                    name: name.to_string(),
                    description: description.clone(),
                    line,
                }),
                NodeKind::Agent { name, params } => blocks.push(Block::AgentCall {
                    name: name.to_string(),
                    params: params.clone(),
                    line,
                }),
                NodeKind::Next { target } => {
                    next.push(guarded(guards, target));
                    blocks.push(Block::NextAction {
                        target: target.to_string(),
                        line,
                    });
                }
                NodeKind::If { .. } => {
                    let (branches, consumed) = self.conditional(&children[i..], guards, next);
                    blocks.push(Block::Conditional { branches, line });
                    i += consumed;
                    continue;
                }
                NodeKind::Block => blocks.extend(self.body(self.ast.children(id), guards, next)),
                kind => {
                    if let Some((keyword, content)) = render_directive(kind) {
                        blocks.push(Block::Directive {
                            keyword: keyword.to_string(),
                            content,
                            line,
                        });
                    }
                }
            }
            i += 1;
        }
        blocks
    }

    /// Lower the `@if` at `run[0]` together with an immediately following
    /// `@else` and `@endif`. Returns the branches and the siblings consumed.
    fn conditional(
        &self,
        run: &[NodeId],
        guards: &mut Vec<String>,
        next: &mut Vec<NextTarget>,
    ) -> (Vec<ConditionalBranch>, usize) {
        let condition = match self.ast.kind(run[0]) {
            NodeKind::If { condition } => condition.clone(),
            _ => String::new(),
        };

        guards.push(condition.clone());
        let actions = self.actions(self.ast.children(run[0]), guards, next);
        guards.pop();

        let mut branches = vec![ConditionalBranch {
            condition: Some(condition.clone()),
            actions,
        }];
        let mut consumed = 1;

        if let Some(&else_id) = run.get(consumed) {
            if matches!(self.ast.kind(else_id), NodeKind::Else) {
                guards.push(format!("!({})", condition));
                let actions = self.actions(self.ast.children(else_id), guards, next);
                guards.pop();
                branches.push(ConditionalBranch {
                    condition: None,
                    actions,
                });
                consumed += 1;
            }
        }
        if let Some(&endif_id) = run.get(consumed) {
            if matches!(self.ast.kind(endif_id), NodeKind::Endif) {
                consumed += 1;
            }
        }

        (branches, consumed)
    }

    fn actions(
        &self,
        children: &[NodeId],
        guards: &mut Vec<String>,
        next: &mut Vec<NextTarget>,
    ) -> Vec<ConditionalAction> {
        let mut actions = Vec::new();
        let mut i = 0;
        while i < children.len() {
            let id = children[i];
            match self.ast.kind(id) {
                NodeKind::Text { content, .. } => actions.push(ConditionalAction::Text {
                    content: content.clone(),
                }),
                NodeKind::Tool { name, .. } => actions.push(ConditionalAction::ToolCall {
                    name: name.to_string(),
                }),
                NodeKind::Agent { name, params } => actions.push(ConditionalAction::AgentCall {
                    name: name.to_string(),
                    params: params.clone(),
                }),
                NodeKind::Next { target } => {
                    next.push(guarded(guards, target));
                    actions.push(ConditionalAction::Jump {
                        target: target.to_string(),
                    });
                }
                NodeKind::If { .. } => {
                    let (branches, consumed) = self.conditional(&children[i..], guards, next);
                    actions.push(ConditionalAction::Conditional { branches });
                    i += consumed;
                    continue;
                }
                NodeKind::Block => {
                    actions.extend(self.actions(self.ast.children(id), guards, next))
                }
                NodeKind::Code { content, .. } => actions.push(ConditionalAction::Text {
                    content: content.clone(),
                }),
                kind => {
                    if let Some((_, content)) = render_directive(kind) {
                        actions.push(ConditionalAction::Text { content });
                    }
                }
            }
            i += 1;
        }
        actions
    }
}

fn guarded(guards: &[String], target: &str) -> NextTarget {
    let target = target.to_string();
    match guards {
        [] => NextTarget::Plain(target),
        [single] => NextTarget::Conditional {
            when: single.clone(),
            target,
        },
        many => NextTarget::Conditional {
            when: many
                .iter()
                .map(|g| format!("({})", g))
                .collect::<Vec<_>>()
                .join(" && "),
            target,
        },
    }
}

/// Source form of directives that are kept verbatim in a body.
fn render_directive(kind: &NodeKind) -> Option<(&'static str, String)> {
    let rendered = match kind {
        NodeKind::Lang { language } => ("lang", format!("@lang {}", language)),
        NodeKind::Include { path } => ("include", format!("@include {}", path)),
        NodeKind::Var { name, value, .. } => match value {
            Some(value) => ("var", format!("@var {} = {}", name, value)),
            None => ("var", format!("@var {}", name)),
        },
        NodeKind::Task { id, title, .. } => match title {
            Some(title) => ("task", format!("@task {} {}", id, title)),
            None => ("task", format!("@task {}", id)),
        },
        NodeKind::Else => ("else", "@else".to_string()),
        NodeKind::Endif => ("endif", "@endif".to_string()),
        _ => return None,
    };
    Some(rendered)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parse;
    use flow_ast::ValueType;
    use flow_lexer::tokenize;
    use pretty_assertions::assert_eq;

    fn lower(source: &str) -> Program {
        to_program(&parse(tokenize(source).unwrap()).unwrap())
    }

    #[test]
    fn test_tools_and_variables() {
        let program = lower("@var retries = 3\n@tool fetch Fetch a page\n    port: 80\n");
        assert_eq!(
            program.variables,
            vec![Variable {
                name: "retries".into(),
                value: Literal::Int(3),
                ty: ValueType::Integer,
                scope: VarScope::Global,
            }]
        );
        assert_eq!(program.tools[0].id, "tool_2");
        assert_eq!(program.tools[0].parameters.get("port").map(String::as_str), Some("80"));
        assert!(program.tasks.is_empty());
        assert_eq!(program.entry_point, None);
    }

    #[test]
    fn test_task_body_blocks() {
        let program = lower("@task a Start\n    hello\n    @lang en\n    @agent Critic(strict)\n    @next b\n@task b\n");
        let a = program.task("a").unwrap();
        assert_eq!(
            a.body,
            vec![
                Block::Text {
                    content: "hello".into(),
                    line: 2
                },
                Block::Directive {
                    keyword: "lang".into(),
                    content: "@lang en".into(),
                    line: 3
                },
                Block::AgentCall {
                    name: "Critic".into(),
                    params: Some("strict".into()),
                    line: 4
                },
                Block::NextAction {
                    target: "b".into(),
                    line: 5
                },
            ]
        );
        assert_eq!(a.next, vec![NextTarget::Plain("b".into())]);
        assert_eq!(program.entry_point.as_deref(), Some("a"));
    }

    #[test]
    fn test_conditional_pairing_and_guarded_next() {
        let source = "\
@task review
    @if approved
        ship it
        @next deploy
    @else
        @next fix
    @endif
    done
@task deploy
@task fix
";
        let program = lower(source);
        let review = program.task("review").unwrap();
        assert_eq!(review.body.len(), 2);
        match &review.body[0] {
            Block::Conditional { branches, line } => {
                assert_eq!(*line, 2);
                assert_eq!(branches.len(), 2);
                assert_eq!(branches[0].condition.as_deref(), Some("approved"));
                assert_eq!(
                    branches[0].actions,
                    vec![
                        ConditionalAction::Text {
                            content: "ship it".into()
                        },
                        ConditionalAction::Jump {
                            target: "deploy".into()
                        },
                    ]
                );
                assert_eq!(branches[1].condition, None);
            }
            other => panic!("expected conditional, got {:?}", other),
        }
        assert_eq!(
            review.next,
            vec![
                NextTarget::Conditional {
                    when: "approved".into(),
                    target: "deploy".into()
                },
                NextTarget::Conditional {
                    when: "!(approved)".into(),
                    target: "fix".into()
                },
            ]
        );
    }

    #[test]
    fn test_nested_conditional_guards() {
        let source = "\
@task t
    @if a
        @if b
            @next u
@task u
";
        let program = lower(source);
        assert_eq!(
            program.task("t").unwrap().next,
            vec![NextTarget::Conditional {
                when: "(a) && (b)".into(),
                target: "u".into()
            }]
        );
    }

    #[test]
    fn test_orphan_else_kept_as_directive() {
        let program = lower("@task t\n    @else\n");
        assert_eq!(
            program.tasks[0].body,
            vec![Block::Directive {
                keyword: "else".into(),
                content: "@else".into(),
                line: 2
            }]
        );
    }
}
