// ABOUTME: Attribute values carried by resource descriptors and state records.
// ABOUTME: Untagged serde enum so YAML scalars and lists map naturally.

use serde::{Deserialize, Serialize};
use std::fmt;

/// An attribute value in a desired-state document or a state record.
///
/// Equality is what the planner diffs on, so two values compare equal
/// exactly when no change needs to be applied.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Value {
    Bool(bool),
    Int(i64),
    String(String),
    List(Vec<Value>),
}

impl Value {
    pub fn type_name(&self) -> &'static str {
        match self {
            Value::Bool(_) => "bool",
            Value::Int(_) => "int",
            Value::String(_) => "string",
            Value::List(_) => "list",
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::String(s) => Some(s),
            _ => None,
        }
    }

    /// Render this value for substitution into a larger string.
    /// Lists have no scalar rendering and return `None`.
    pub fn interpolation_fragment(&self) -> Option<String> {
        match self {
            Value::Bool(b) => Some(b.to_string()),
            Value::Int(i) => Some(i.to_string()),
            Value::String(s) => Some(s.clone()),
            Value::List(_) => None,
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Bool(b) => write!(f, "{b}"),
            Value::Int(i) => write!(f, "{i}"),
            Value::String(s) => write!(f, "{s}"),
            Value::List(items) => {
                write!(f, "[")?;
                for (i, item) in items.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{item}")?;
                }
                write!(f, "]")
            }
        }
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Value::String(s.to_string())
    }
}

impl From<String> for Value {
    fn from(s: String) -> Self {
        Value::String(s)
    }
}

impl From<bool> for Value {
    fn from(b: bool) -> Self {
        Value::Bool(b)
    }
}

impl From<i64> for Value {
    fn from(i: i64) -> Self {
        Value::Int(i)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn yaml_scalars_deserialize_untagged() {
        let v: Value = serde_yaml::from_str("true").unwrap();
        assert_eq!(v, Value::Bool(true));

        let v: Value = serde_yaml::from_str("300").unwrap();
        assert_eq!(v, Value::Int(300));

        let v: Value = serde_yaml::from_str("eu-west-1").unwrap();
        assert_eq!(v, Value::String("eu-west-1".to_string()));

        let v: Value = serde_yaml::from_str("[a, b]").unwrap();
        assert_eq!(v, Value::List(vec!["a".into(), "b".into()]));
    }

    #[test]
    fn lists_have_no_interpolation_fragment() {
        assert_eq!(Value::List(vec![]).interpolation_fragment(), None);
        assert_eq!(
            Value::Int(443).interpolation_fragment(),
            Some("443".to_string())
        );
    }
}
