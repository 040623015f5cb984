//! Constant folding.
//!
//! Examples:
//! - `@var total = (2 + 3) * 4` → `@var total = 20`
//! - `@var half = 7 / 2` → `@var half = 3.5`
//! - `value is ${total}` → `value is 20`
//!
//! Variable values are only evaluated by the restricted arithmetic grammar
//! below. Nothing else is ever evaluated.

use flow_ast::{Ast, Literal, NodeId, NodeKind, VarScope};
use flow_lexer::placeholder::{placeholders, substitute};
use rustc_hash::FxHashMap;

/// Returns the number of variables and text nodes rewritten.
pub fn fold_constants(ast: &mut Ast) -> usize {
    fold_variables(ast) + fold_text(ast)
}

fn fold_variables(ast: &mut Ast) -> usize {
    let mut folded = 0;
    for id in ast.walk() {
        if let NodeKind::Var { value, ty, .. } = ast.kind_mut(id) {
            let Some(Literal::Str(expr)) = value.as_ref() else {
                continue;
            };
            if !expr.contains(&['+', '-', '*', '/'][..]) {
                continue;
            }
            let Some(result) = evaluate(expr) else {
                continue;
            };
            *ty = Some(result.value_type());
            *value = Some(result);
            folded += 1;
        }
    }
    folded
}

/// A constant whose own text holds a placeholder is never substituted, so
/// repeated runs cannot keep expanding it.
fn fold_text(ast: &mut Ast) -> usize {
    let constants: FxHashMap<String, String> = ast
        .children(ast.root())
        .iter()
        .filter_map(|&id| match ast.kind(id) {
            NodeKind::Var {
                name,
                value: Some(value),
                scope: VarScope::Global,
                ..
            } if !value.is_none() => Some((name.to_string(), value.to_string())),
            _ => None,
        })
        .filter(|(_, value)| placeholders(value).is_empty())
        .collect();
    if constants.is_empty() {
        return 0;
    }

    let mut folded = 0;
    for id in ast.walk() {
        let Some(content) = ast.kind(id).text_content() else {
            continue;
        };
        let rewritten = substitute(content, |placeholder| {
            if placeholder.sigil != '$' || shadowed(ast, id, placeholder.name) {
                return None;
            }
            constants.get(placeholder.name).cloned()
        });
        if rewritten == content {
            continue;
        }
        if let NodeKind::Text { content, .. } = ast.kind_mut(id) {
            *content = rewritten;
            folded += 1;
        }
    }
    folded
}

/// True if a local variable named `name` is in scope at `id`.
fn shadowed(ast: &Ast, id: NodeId, name: &str) -> bool {
    ast.ancestors(id).filter(|&a| a != ast.root()).any(|scope| {
        ast.children(scope)
            .iter()
            .any(|&c| matches!(ast.kind(c), NodeKind::Var { name: n, .. } if n.as_str() == name))
    })
}

// ============================================================================
// Restricted Arithmetic
// ============================================================================

/// Evaluate `expr` against the grammar
///
/// ```text
/// expr   := term (('+' | '-') term)*
/// term   := factor (('*' | '/') factor)*
/// factor := ('+' | '-') factor | number | '(' expr ')'
/// ```
///
/// Integer-only input stays integral while every intermediate result is;
/// an inexact division or any float operand produces a float. Division by
/// zero, overflow and malformed input fail the fold.
pub fn evaluate(expr: &str) -> Option<Literal> {
    let mut arith = Arith {
        chars: expr.chars().filter(|c| !c.is_whitespace()).collect(),
        pos: 0,
    };
    if has_adjacent_numbers(expr) {
        return None;
    }
    let value = arith.expr()?;
    if arith.pos != arith.chars.len() {
        return None;
    }
    match value {
        Number::Int(n) => Some(Literal::Int(n)),
        Number::Float(x) if x.is_finite() => Some(Literal::Float(x)),
        Number::Float(_) => None,
    }
}

/// `1 2` must not read as `12` once whitespace is dropped.
fn has_adjacent_numbers(expr: &str) -> bool {
    let mut last_digit = false;
    let mut gap = false;
    for c in expr.chars() {
        if c.is_ascii_digit() || c == '.' {
            if last_digit && gap {
                return true;
            }
            last_digit = true;
            gap = false;
        } else if c.is_whitespace() {
            gap = true;
        } else {
            last_digit = false;
            gap = false;
        }
    }
    false
}

#[derive(Debug, Clone, Copy, PartialEq)]
enum Number {
    Int(i64),
    Float(f64),
}

impl Number {
    fn as_f64(self) -> f64 {
        match self {
            Number::Int(n) => n as f64,
            Number::Float(x) => x,
        }
    }
}

struct Arith {
    chars: Vec<char>,
    pos: usize,
}

impl Arith {
    fn current(&self) -> Option<char> {
        self.chars.get(self.pos).copied()
    }

    fn eat(&mut self, c: char) -> bool {
        if self.current() == Some(c) {
            self.pos += 1;
            true
        } else {
            false
        }
    }

    fn expr(&mut self) -> Option<Number> {
        let mut left = self.term()?;
        loop {
            if self.eat('+') {
                left = add(left, self.term()?)?;
            } else if self.eat('-') {
                left = sub(left, self.term()?)?;
            } else {
                return Some(left);
            }
        }
    }

    fn term(&mut self) -> Option<Number> {
        let mut left = self.factor()?;
        loop {
            if self.eat('*') {
                left = mul(left, self.factor()?)?;
            } else if self.eat('/') {
                left = div(left, self.factor()?)?;
            } else {
                return Some(left);
            }
        }
    }

    fn factor(&mut self) -> Option<Number> {
        if self.eat('+') {
            return self.factor();
        }
        if self.eat('-') {
            return match self.factor()? {
                Number::Int(n) => n.checked_neg().map(Number::Int),
                Number::Float(x) => Some(Number::Float(-x)),
            };
        }
        if self.eat('(') {
            let inner = self.expr()?;
            return self.eat(')').then_some(inner);
        }
        self.number()
    }

    fn number(&mut self) -> Option<Number> {
        let start = self.pos;
        while matches!(self.current(), Some(c) if c.is_ascii_digit() || c == '.') {
            self.pos += 1;
        }
        let text: String = self.chars[start..self.pos].iter().collect();
        if text.is_empty() || text == "." || text.matches('.').count() > 1 {
            return None;
        }
        if text.contains('.') {
            return text.parse::<f64>().ok().map(Number::Float);
        }
        // `007` is not a number, `0` and `00` are
        if text.starts_with('0') && text.chars().any(|c| c != '0') {
            return None;
        }
        text.parse::<i64>().ok().map(Number::Int)
    }
}

fn add(a: Number, b: Number) -> Option<Number> {
    match (a, b) {
        (Number::Int(x), Number::Int(y)) => x.checked_add(y).map(Number::Int),
        _ => Some(Number::Float(a.as_f64() + b.as_f64())),
    }
}

fn sub(a: Number, b: Number) -> Option<Number> {
    match (a, b) {
        (Number::Int(x), Number::Int(y)) => x.checked_sub(y).map(Number::Int),
        _ => Some(Number::Float(a.as_f64() - b.as_f64())),
    }
}

fn mul(a: Number, b: Number) -> Option<Number> {
    match (a, b) {
        (Number::Int(x), Number::Int(y)) => x.checked_mul(y).map(Number::Int),
        _ => Some(Number::Float(a.as_f64() * b.as_f64())),
    }
}

fn div(a: Number, b: Number) -> Option<Number> {
    if b.as_f64() == 0.0 {
        return None;
    }
    match (a, b) {
        (Number::Int(x), Number::Int(y)) if x.checked_rem(y) == Some(0) => x.checked_div(y).map(Number::Int),
        _ => Some(Number::Float(a.as_f64() / b.as_f64())),
    }
}
