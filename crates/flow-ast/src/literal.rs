//! Typed literal values carried by `@var` directives.

use serde::Serialize;
use std::fmt;

/// A literal value
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum Literal {
    None,
    Bool(bool),
    Int(i64),
    Float(f64),
    Str(String),
}

impl Literal {
    /// The actual runtime type of this value.
    pub fn value_type(&self) -> ValueType {
        match self {
            Literal::None => ValueType::None,
            Literal::Bool(_) => ValueType::Boolean,
            Literal::Int(_) => ValueType::Integer,
            Literal::Float(_) => ValueType::Float,
            Literal::Str(_) => ValueType::String,
        }
    }

    pub fn is_none(&self) -> bool {
        matches!(self, Literal::None)
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Literal::Str(s) => Some(s),
            _ => None,
        }
    }
}

impl fmt::Display for Literal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Literal::None => write!(f, "none"),
            Literal::Bool(b) => write!(f, "{}", b),
            Literal::Int(n) => write!(f, "{}", n),
            Literal::Float(x) if x.is_finite() && x.fract() == 0.0 => write!(f, "{:.1}", x),
            Literal::Float(x) => write!(f, "{}", x),
            Literal::Str(s) => write!(f, "{}", s),
        }
    }
}

/// The type lattice used for variable type inference
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ValueType {
    None,
    Boolean,
    Integer,
    Float,
    String,
}

impl ValueType {
    pub fn name(&self) -> &'static str {
        match self {
            ValueType::None => "none",
            ValueType::Boolean => "boolean",
            ValueType::Integer => "integer",
            ValueType::Float => "float",
            ValueType::String => "string",
        }
    }

    /// Lenient compatibility: may a value of type `actual` stand in where `self` is declared?
    pub fn accepts(&self, actual: ValueType) -> bool {
        if *self == actual || *self == ValueType::None || actual == ValueType::None {
            return true;
        }
        match self {
            ValueType::Integer => matches!(actual, ValueType::Float | ValueType::String),
            ValueType::Float => matches!(actual, ValueType::Integer | ValueType::String),
            ValueType::String => matches!(
                actual,
                ValueType::Integer | ValueType::Float | ValueType::Boolean
            ),
            ValueType::Boolean => actual == ValueType::String,
            ValueType::None => true,
        }
    }
}

impl fmt::Display for ValueType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Where a variable is visible
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum VarScope {
    #[default]
    Global,
    Local,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_literal_display() {
        assert_eq!(Literal::Int(10).to_string(), "10");
        assert_eq!(Literal::Float(3.0).to_string(), "3.0");
        assert_eq!(Literal::Float(2.5).to_string(), "2.5");
        assert_eq!(Literal::None.to_string(), "none");
        assert_eq!(Literal::Str("hi".into()).to_string(), "hi");
    }

    #[test]
    fn test_compatibility_table() {
        assert!(ValueType::Integer.accepts(ValueType::Float));
        assert!(ValueType::String.accepts(ValueType::Boolean));
        assert!(ValueType::Boolean.accepts(ValueType::String));
        assert!(!ValueType::Boolean.accepts(ValueType::Integer));
        assert!(!ValueType::Integer.accepts(ValueType::Boolean));
        assert!(ValueType::None.accepts(ValueType::Float));
    }

    #[test]
    fn test_literal_serializes_untagged() {
        let values = vec![Literal::None, Literal::Bool(true), Literal::Int(3), Literal::Str("x".into())];
        assert_eq!(serde_json::to_string(&values).unwrap(), r#"[null,true,3,"x"]"#);
    }
}
