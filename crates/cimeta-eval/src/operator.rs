//! Operator dispatch and registration.
//!
//! A node built from a sequence definition carries an ordered list of
//! operators; evaluation tries them left to right and the first one that
//! produces output wins. Implementations are resolved through an
//! [`OperatorRegistry`] keyed by the `type` tag of the operator definition,
//! with bare scalars accepted as shorthand for `{type: scalar, scalar: ...}`.

use anyhow::{Result, anyhow, bail};
use once_cell::sync::Lazy;
use serde_yaml::Value as Yaml;
use std::collections::HashMap;

use crate::error::UnknownOperatorType;
use crate::graph::EvalContext;
use crate::scalar::Scalar;
use crate::value::Value;

/// The result of one operator attempt.
#[derive(Debug, Clone, PartialEq)]
pub enum Outcome {
    /// The operator produced an output value.
    Produced(Value),
    /// The operator could not produce output; the node falls back to the
    /// next operator in its list. The reason is diagnostic only.
    Failed(String),
}

/// A pluggable unit of computation attached to a node.
///
/// `process` must be safe to call more than once and must not mutate
/// anything outside the operator itself; the owning node decides how often
/// it actually runs (once, under memoization). Returning `Err` aborts the
/// whole evaluation — reserve it for structural problems (e.g. a reference
/// cycle reached through the context) and report everything recoverable as
/// [`Outcome::Failed`].
pub trait Operator {
    fn process(&self, ctx: &EvalContext<'_>) -> Result<Outcome>;
}

/// Builds an operator from its raw definition fragment.
pub type OperatorFactory = Box<dyn Fn(&Yaml) -> Result<Box<dyn Operator>> + Send + Sync>;

type BuiltinFactory = fn(&Yaml) -> Result<Box<dyn Operator>>;

static BUILTIN_OPERATORS: Lazy<HashMap<&'static str, BuiltinFactory>> = Lazy::new(|| {
    let mut map = HashMap::new();
    map.insert("scalar", Scalar::from_definition as BuiltinFactory);
    map
});

/// Maps operator type tags to factories.
///
/// Built-in tags are always available; [`register`](OperatorRegistry::register)
/// adds plugin operators (shadowing a builtin of the same tag). Lookup
/// happens at graph-build time, so an unregistered tag surfaces as an
/// [`UnknownOperatorType`] before any evaluation starts.
pub struct OperatorRegistry {
    plugins: HashMap<String, OperatorFactory>,
}

impl OperatorRegistry {
    pub fn new() -> Self {
        Self {
            plugins: HashMap::new(),
        }
    }

    pub fn register(&mut self, tag: impl Into<String>, factory: OperatorFactory) {
        self.plugins.insert(tag.into(), factory);
    }

    pub fn has(&self, tag: &str) -> bool {
        self.plugins.contains_key(tag) || BUILTIN_OPERATORS.contains_key(tag)
    }

    /// Resolves and constructs the operator for one list entry.
    ///
    /// `path` is the dotted path of the declaring node, used in diagnostics.
    pub(crate) fn instantiate(&self, definition: &Yaml, path: &str) -> Result<Box<dyn Operator>> {
        let mapping = match definition {
            Yaml::Mapping(mapping) => mapping,
            // Bare scalar shorthand for {type: scalar, scalar: <value>}.
            other => return Scalar::from_definition(other),
        };

        let tag = match mapping_key(mapping, "type") {
            None => "scalar".to_string(),
            Some(Yaml::String(tag)) => tag.clone(),
            Some(other) => bail!(
                "operator 'type' at node '{path}' must be a string, got {other:?}"
            ),
        };

        if let Some(factory) = self.plugins.get(tag.as_str()) {
            return factory(definition);
        }
        if let Some(factory) = BUILTIN_OPERATORS.get(tag.as_str()) {
            return factory(definition);
        }
        Err(anyhow!(UnknownOperatorType {
            tag,
            path: path.to_string(),
        }))
    }
}

impl Default for OperatorRegistry {
    fn default() -> Self {
        Self::new()
    }
}

pub(crate) fn mapping_key<'a>(mapping: &'a serde_yaml::Mapping, key: &str) -> Option<&'a Yaml> {
    mapping.get(&Yaml::String(key.to_string()))
}

// Convenience for operators that produce a value unconditionally.
impl From<Value> for Outcome {
    fn from(value: Value) -> Self {
        Outcome::Produced(value)
    }
}
