//! Structural error types for graph construction and evaluation.
//!
//! All three types are wrapped in [`anyhow::Error`] at the call sites so
//! callers can keep using `Result<T>` while still downcasting to the
//! concrete kind when they need to (e.g. to distinguish a reference cycle
//! from an ordinary failure).
//!
//! Operator-level failure is deliberately *not* an error type: an operator
//! that cannot produce output reports [`Outcome::Failed`](crate::Outcome)
//! and the node falls back to the next operator in its list.

use std::fmt;

use crate::value::ValueKind;

/// A value could not be coerced to the requested scalar type.
#[derive(Debug, Clone)]
pub struct CoercionError {
    /// Runtime type of the value being coerced.
    pub kind: ValueKind,
    /// Name of the requested target type.
    pub target: &'static str,
    /// Display form of the offending value.
    pub raw: String,
}

impl CoercionError {
    pub fn new(kind: ValueKind, target: &'static str, raw: impl Into<String>) -> Self {
        Self {
            kind,
            target,
            raw: raw.into(),
        }
    }
}

impl fmt::Display for CoercionError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "cannot coerce {} value '{}' to {}",
            self.kind, self.raw, self.target
        )
    }
}

impl std::error::Error for CoercionError {}

/// An operator definition named a type tag with no registered implementation.
///
/// Raised while the graph is being built, never during evaluation, so a
/// misconfigured document fails before any value is resolved.
#[derive(Debug, Clone)]
pub struct UnknownOperatorType {
    /// The unresolved type tag.
    pub tag: String,
    /// Dotted path of the node declaring the operator.
    pub path: String,
}

impl fmt::Display for UnknownOperatorType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "unknown operator type '{}' at node '{}'",
            self.tag, self.path
        )
    }
}

impl std::error::Error for UnknownOperatorType {}

/// A node's evaluation was re-entered through a path reference.
#[derive(Debug, Clone)]
pub struct CycleError {
    /// Dotted path of the node whose evaluation was re-entered.
    pub path: String,
}

impl CycleError {
    pub fn new(path: impl Into<String>) -> Self {
        Self { path: path.into() }
    }
}

impl fmt::Display for CycleError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "evaluation cycle detected through node '{}'", self.path)
    }
}

impl std::error::Error for CycleError {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn coercion_error_display() {
        let err = CoercionError::new(ValueKind::Null, "integer", "null");
        assert_eq!(format!("{err}"), "cannot coerce null value 'null' to integer");
    }

    #[test]
    fn unknown_operator_type_display() {
        let err = UnknownOperatorType {
            tag: "regex".to_string(),
            path: "meta.image".to_string(),
        };
        assert_eq!(
            format!("{err}"),
            "unknown operator type 'regex' at node 'meta.image'"
        );
    }

    #[test]
    fn cycle_error_display() {
        let err = CycleError::new("a.b");
        assert_eq!(format!("{err}"), "evaluation cycle detected through node 'a.b'");
    }

    #[test]
    fn cycle_error_downcast_from_anyhow() {
        let anyhow_err = anyhow::anyhow!(CycleError::new("x"));
        let downcast = anyhow_err.downcast_ref::<CycleError>().unwrap();
        assert_eq!(downcast.path, "x");
    }
}
