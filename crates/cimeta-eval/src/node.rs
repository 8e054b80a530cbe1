//! Graph vertices and the lazy evaluation state machine.

use anyhow::{Result, anyhow, bail};
use serde_yaml::Value as Yaml;
use std::cell::RefCell;
use std::collections::HashMap;

use crate::error::CycleError;
use crate::graph::EvalContext;
use crate::operator::{Operator, OperatorRegistry, Outcome};
use crate::value::Value;

enum EvalState {
    Unevaluated,
    /// Evaluation in flight; reaching a node in this state through a path
    /// reference means the configuration contains a cycle.
    Evaluating,
    Evaluated(Value),
}

/// A vertex in the configuration graph.
///
/// The shape of the raw definition fragment determines what the node holds:
/// a mapping nests into named children, a sequence declares an ordered
/// fallback list of operators, and a bare scalar is shorthand for a single
/// scalar operator. Named children are reached only through
/// [`child`](Node::child) — they never shadow node state.
pub struct Node {
    path: String,
    definition: Yaml,
    children: HashMap<String, Node>,
    child_order: Vec<String>,
    operators: Vec<Box<dyn Operator>>,
    initial_param: Option<Value>,
    state: RefCell<EvalState>,
}

impl Node {
    pub(crate) fn from_definition(
        definition: &Yaml,
        registry: &OperatorRegistry,
        path: &str,
    ) -> Result<Self> {
        let mut node = Node {
            path: path.to_string(),
            definition: definition.clone(),
            children: HashMap::new(),
            child_order: Vec::new(),
            operators: Vec::new(),
            initial_param: None,
            state: RefCell::new(EvalState::Unevaluated),
        };

        match definition {
            Yaml::Mapping(entries) => {
                for (key, child_definition) in entries {
                    let name = match key {
                        Yaml::String(name) => name.clone(),
                        other => bail!("child name under '{path}' must be a string, got {other:?}"),
                    };
                    let child_path = if path.is_empty() {
                        name.clone()
                    } else {
                        format!("{path}.{name}")
                    };
                    let child = Node::from_definition(child_definition, registry, &child_path)?;
                    node.child_order.push(name.clone());
                    node.children.insert(name, child);
                }
            }
            Yaml::Sequence(entries) => {
                for entry in entries {
                    node.operators.push(registry.instantiate(entry, path)?);
                }
            }
            // A key with no value is a bare declaration; it resolves to null.
            Yaml::Null => {}
            scalar => node.operators.push(registry.instantiate(scalar, path)?),
        }

        Ok(node)
    }

    /// Dotted path of this node from the graph root.
    pub fn path(&self) -> &str {
        &self.path
    }

    pub fn child(&self, name: &str) -> Option<&Node> {
        self.children.get(name)
    }

    pub(crate) fn child_mut(&mut self, name: &str) -> Option<&mut Node> {
        self.children.get_mut(name)
    }

    /// Child names in declaration order.
    pub fn child_names(&self) -> impl Iterator<Item = &str> {
        self.child_order.iter().map(String::as_str)
    }

    pub fn has_children(&self) -> bool {
        !self.children.is_empty()
    }

    pub fn is_evaluated(&self) -> bool {
        matches!(&*self.state.borrow(), EvalState::Evaluated(_))
    }

    /// Overrides this node's computed value. Must be set before evaluation;
    /// descendants are unaffected.
    pub(crate) fn set_initial_param(&mut self, value: Value) {
        self.initial_param = Some(value);
    }

    /// Evaluates the node, memoizing the result.
    ///
    /// The first call settles all children, then runs the operator list in
    /// order until one produces output. Later calls return the cached value
    /// without touching any operator. Re-entering a node that is still
    /// evaluating fails with [`CycleError`].
    pub fn evaluate(&self, ctx: &EvalContext<'_>) -> Result<Value> {
        {
            let state = self.state.borrow();
            match &*state {
                EvalState::Evaluated(value) => return Ok(value.clone()),
                EvalState::Evaluating => return Err(anyhow!(CycleError::new(&self.path))),
                EvalState::Unevaluated => {}
            }
        }

        *self.state.borrow_mut() = EvalState::Evaluating;
        match self.compute(ctx) {
            Ok(value) => {
                *self.state.borrow_mut() = EvalState::Evaluated(value.clone());
                Ok(value)
            }
            Err(err) => {
                *self.state.borrow_mut() = EvalState::Unevaluated;
                Err(err)
            }
        }
    }

    fn compute(&self, ctx: &EvalContext<'_>) -> Result<Value> {
        for name in &self.child_order {
            if let Some(child) = self.children.get(name)
                && !child.is_evaluated()
            {
                child.evaluate(ctx)?;
            }
        }

        // An externally injected parameter wins over anything the node
        // would compute for itself.
        if let Some(value) = &self.initial_param {
            return Ok(value.clone());
        }

        if !self.operators.is_empty() {
            for operator in &self.operators {
                match operator.process(ctx)? {
                    Outcome::Produced(value) => return Ok(value),
                    // OR semantics: try the next operator.
                    Outcome::Failed(_) => {}
                }
            }
            // No operator produced output; that is a valid terminal state.
            return Ok(Value::Null);
        }

        if !self.children.is_empty() {
            // A parent without operators resolves to its structural form.
            return Ok(Value::Other(self.definition.clone()));
        }

        Ok(Value::Null)
    }
}
