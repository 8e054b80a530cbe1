use anyhow::{Result, anyhow};
use std::fmt;

use crate::error::CoercionError;

// ============================================================================
// VALUE MODEL
// ============================================================================

/// Runtime type tag of a resolved scalar.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ValueKind {
    Boolean,
    Integer,
    Float,
    String,
    Null,
    /// Anything that is not a plain scalar (mappings, sequences, tagged values).
    Other,
}

impl fmt::Display for ValueKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ValueKind::Boolean => "boolean",
            ValueKind::Integer => "integer",
            ValueKind::Float => "float",
            ValueKind::String => "string",
            ValueKind::Null => "null",
            ValueKind::Other => "other",
        };
        write!(f, "{name}")
    }
}

/// An immutable, typed wrapper around a single resolved value.
///
/// A node caches exactly one `Value` once evaluated; anything that wants
/// another node's value goes through evaluation and coercion, never through
/// sharing.
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    Bool(bool),
    Int(i64),
    Float(f64),
    Str(String),
    Null,
    /// Structural value carried verbatim (e.g. the mapping form of a parent
    /// node). Not coercible to a scalar.
    Other(serde_yaml::Value),
}

impl Value {
    /// Wraps a parsed YAML value, tagging its runtime type.
    pub fn from_yaml(raw: &serde_yaml::Value) -> Self {
        match raw {
            serde_yaml::Value::Null => Value::Null,
            serde_yaml::Value::Bool(b) => Value::Bool(*b),
            serde_yaml::Value::Number(n) => {
                if let Some(i) = n.as_i64() {
                    Value::Int(i)
                } else if let Some(f) = n.as_f64() {
                    Value::Float(f)
                } else {
                    Value::Other(raw.clone())
                }
            }
            serde_yaml::Value::String(s) => Value::Str(s.clone()),
            other => Value::Other(other.clone()),
        }
    }

    /// Wraps a parsed JSON value (CI context lookups), tagging its runtime type.
    pub fn from_json(raw: &serde_json::Value) -> Self {
        match raw {
            serde_json::Value::Null => Value::Null,
            serde_json::Value::Bool(b) => Value::Bool(*b),
            serde_json::Value::Number(n) => {
                if let Some(i) = n.as_i64() {
                    Value::Int(i)
                } else if let Some(f) = n.as_f64() {
                    Value::Float(f)
                } else {
                    Value::Other(json_to_yaml(raw))
                }
            }
            serde_json::Value::String(s) => Value::Str(s.clone()),
            composite => Value::Other(json_to_yaml(composite)),
        }
    }

    pub fn kind(&self) -> ValueKind {
        match self {
            Value::Bool(_) => ValueKind::Boolean,
            Value::Int(_) => ValueKind::Integer,
            Value::Float(_) => ValueKind::Float,
            Value::Str(_) => ValueKind::String,
            Value::Null => ValueKind::Null,
            Value::Other(_) => ValueKind::Other,
        }
    }

    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }

    pub fn is_truthy(&self) -> bool {
        match self {
            Value::Bool(b) => *b,
            Value::Int(i) => *i != 0,
            Value::Float(f) => *f != 0.0,
            Value::Str(s) => !s.is_empty(),
            Value::Null => false,
            Value::Other(serde_yaml::Value::Sequence(items)) => !items.is_empty(),
            Value::Other(serde_yaml::Value::Mapping(entries)) => !entries.is_empty(),
            Value::Other(_) => true,
        }
    }

    // ========================================================================
    // COERCIONS
    // ========================================================================

    pub fn as_string(&self) -> Result<String> {
        match self {
            Value::Str(s) => Ok(s.clone()),
            Value::Bool(b) => Ok(b.to_string()),
            Value::Int(i) => Ok(i.to_string()),
            Value::Float(f) => Ok(f.to_string()),
            Value::Null => Ok("null".to_string()),
            Value::Other(_) => Err(self.coercion("string")),
        }
    }

    pub fn as_int(&self) -> Result<i64> {
        match self {
            Value::Int(i) => Ok(*i),
            Value::Bool(b) => Ok(i64::from(*b)),
            Value::Float(f) if f.is_finite() => Ok(f.trunc() as i64),
            Value::Str(s) => s.trim().parse().map_err(|_| self.coercion("integer")),
            _ => Err(self.coercion("integer")),
        }
    }

    pub fn as_float(&self) -> Result<f64> {
        match self {
            Value::Float(f) => Ok(*f),
            Value::Int(i) => Ok(*i as f64),
            Value::Bool(b) => Ok(if *b { 1.0 } else { 0.0 }),
            Value::Str(s) => s.trim().parse().map_err(|_| self.coercion("float")),
            _ => Err(self.coercion("float")),
        }
    }

    /// Boolean coercion follows truthiness for every kind, so it cannot fail.
    pub fn as_bool(&self) -> Result<bool> {
        match self {
            Value::Bool(b) => Ok(*b),
            _ => Ok(self.is_truthy()),
        }
    }

    fn coercion(&self, target: &'static str) -> anyhow::Error {
        anyhow!(CoercionError::new(self.kind(), target, self.display()))
    }

    // ========================================================================
    // FORMATTING / SERIALIZATION
    // ========================================================================

    pub fn display(&self) -> String {
        match self {
            Value::Str(s) => s.clone(),
            Value::Bool(b) => b.to_string(),
            Value::Int(i) => i.to_string(),
            Value::Float(f) => f.to_string(),
            Value::Null => "null".to_string(),
            Value::Other(v) => serde_yaml::to_string(v)
                .map(|s| s.trim_end().to_string())
                .unwrap_or_else(|_| "<structure>".to_string()),
        }
    }

    /// Converts back to a YAML value for the output mapping.
    pub fn to_yaml(&self) -> serde_yaml::Value {
        match self {
            Value::Bool(b) => serde_yaml::Value::Bool(*b),
            Value::Int(i) => serde_yaml::Value::Number(serde_yaml::Number::from(*i)),
            Value::Float(f) => serde_yaml::Value::Number(serde_yaml::Number::from(*f)),
            Value::Str(s) => serde_yaml::Value::String(s.clone()),
            Value::Null => serde_yaml::Value::Null,
            Value::Other(v) => v.clone(),
        }
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

impl From<f64> for Value {
    fn from(f: f64) -> Self {
        Value::Float(f)
    }
}

impl From<String> for Value {
    fn from(s: String) -> Self {
        Value::Str(s)
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Value::Str(s.to_string())
    }
}

pub(crate) fn json_to_yaml(raw: &serde_json::Value) -> serde_yaml::Value {
    match raw {
        serde_json::Value::Null => serde_yaml::Value::Null,
        serde_json::Value::Bool(b) => serde_yaml::Value::Bool(*b),
        serde_json::Value::Number(n) => {
            if let Some(i) = n.as_i64() {
                serde_yaml::Value::Number(serde_yaml::Number::from(i))
            } else if let Some(u) = n.as_u64() {
                serde_yaml::Value::Number(serde_yaml::Number::from(u))
            } else {
                serde_yaml::Value::Number(serde_yaml::Number::from(n.as_f64().unwrap_or(f64::NAN)))
            }
        }
        serde_json::Value::String(s) => serde_yaml::Value::String(s.clone()),
        serde_json::Value::Array(items) => {
            serde_yaml::Value::Sequence(items.iter().map(json_to_yaml).collect())
        }
        serde_json::Value::Object(entries) => {
            let mut mapping = serde_yaml::Mapping::new();
            for (key, value) in entries {
                mapping.insert(serde_yaml::Value::String(key.clone()), json_to_yaml(value));
            }
            serde_yaml::Value::Mapping(mapping)
        }
    }
}
