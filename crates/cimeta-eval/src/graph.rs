//! Root evaluation context: document merge, node tree, path lookup, outputs.
//!
//! [`GraphBuilder`] collects the raw inputs (configuration documents,
//! initial parameters, GitHub context, environment snapshot, plugin
//! operators) and [`build`](GraphBuilder::build)s a frozen [`Graph`]. The
//! merge of documents is shallow: later documents override earlier ones per
//! top-level key. Once built, the graph is read-only except for the
//! per-node memoization that happens behind the scenes — `resolve` and
//! `outputs` both take `&self`.

use anyhow::{Context, Result};
use serde_yaml::{Mapping, Value as Yaml};
use std::collections::HashMap;

use crate::node::Node;
use crate::operator::{OperatorFactory, OperatorRegistry};
use crate::value::Value;

/// Collects inputs for a [`Graph`].
pub struct GraphBuilder {
    documents: Vec<Mapping>,
    initial_params: Mapping,
    github: serde_json::Value,
    environment: HashMap<String, String>,
    registry: OperatorRegistry,
}

impl GraphBuilder {
    pub fn new() -> Self {
        Self {
            documents: Vec::new(),
            initial_params: Mapping::new(),
            github: serde_json::Value::Null,
            environment: std::env::vars().collect(),
            registry: OperatorRegistry::new(),
        }
    }

    /// Appends a configuration document. Later documents win per top-level key.
    pub fn with_document(mut self, document: Mapping) -> Self {
        self.documents.push(document);
        self
    }

    /// Merges in initial parameter overrides. Keys are dotted node paths;
    /// nested mappings are flattened to dotted paths before application.
    pub fn with_initial_params(mut self, params: Mapping) -> Self {
        for (key, value) in params {
            self.initial_params.insert(key, value);
        }
        self
    }

    /// Sets the CI context object exposed to templates as the `github` root.
    pub fn with_github_context(mut self, context: serde_json::Value) -> Self {
        self.github = context;
        self
    }

    /// Replaces the environment snapshot (defaults to the process environment).
    pub fn with_environment(mut self, environment: HashMap<String, String>) -> Self {
        self.environment = environment;
        self
    }

    /// Registers a plugin operator under `tag`.
    pub fn register_operator(mut self, tag: impl Into<String>, factory: OperatorFactory) -> Self {
        self.registry.register(tag, factory);
        self
    }

    /// Merges the documents, builds the node tree, and applies initial
    /// parameters. Fails on malformed definitions and unregistered operator
    /// type tags — evaluation never sees a half-built graph.
    pub fn build(self) -> Result<Graph> {
        let mut merged = Mapping::new();
        for document in self.documents {
            for (key, value) in document {
                merged.insert(key, value);
            }
        }

        let root = Node::from_definition(&Yaml::Mapping(merged.clone()), &self.registry, "")?;
        let mut graph = Graph {
            merged,
            root,
            environment: self.environment,
            github: self.github,
            unmatched_initial_params: Vec::new(),
        };
        graph.apply_initial_params(&self.initial_params);
        Ok(graph)
    }
}

impl Default for GraphBuilder {
    fn default() -> Self {
        Self::new()
    }
}

/// The frozen configuration graph plus the process-wide evaluation context.
pub struct Graph {
    merged: Mapping,
    root: Node,
    environment: HashMap<String, String>,
    github: serde_json::Value,
    unmatched_initial_params: Vec<String>,
}

impl std::fmt::Debug for Graph {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Graph")
            .field("merged", &self.merged)
            .field("environment", &self.environment)
            .field("github", &self.github)
            .field("unmatched_initial_params", &self.unmatched_initial_params)
            .finish_non_exhaustive()
    }
}

impl Graph {
    pub fn builder() -> GraphBuilder {
        GraphBuilder::new()
    }

    /// The merged configuration mapping the node tree was built from.
    pub fn merged_params(&self) -> &Mapping {
        &self.merged
    }

    /// Initial parameter paths that matched no node, in application order.
    pub fn unmatched_initial_params(&self) -> &[String] {
        &self.unmatched_initial_params
    }

    /// Looks up a node by dotted path.
    pub fn node(&self, path: &str) -> Option<&Node> {
        let mut node = &self.root;
        for segment in path.split('.') {
            node = node.child(segment)?;
        }
        Some(node)
    }

    /// Evaluates the node at `path` (memoized) and returns its value.
    pub fn resolve(&self, path: &str) -> Result<Value> {
        let node = self
            .node(path)
            .with_context(|| format!("no node at path '{path}'"))?;
        node.evaluate(&self.context())
    }

    /// The shared context handed to operators during evaluation.
    pub fn context(&self) -> EvalContext<'_> {
        EvalContext {
            root: &self.root,
            environment: &self.environment,
            github: &self.github,
        }
    }

    /// Forces evaluation of every top-level node and returns the fully
    /// coerced result mapping, nested mappings recursing. A node none of
    /// whose operators produced output appears as null rather than failing
    /// the walk.
    pub fn outputs(&self) -> Result<Mapping> {
        let ctx = self.context();
        let mut outputs = Mapping::new();
        for name in self.root.child_names() {
            if let Some(node) = self.root.child(name) {
                outputs.insert(Yaml::String(name.to_string()), node_output(node, &ctx)?);
            }
        }
        Ok(outputs)
    }

    fn apply_initial_params(&mut self, params: &Mapping) {
        let mut flattened = Vec::new();
        flatten_params("", params, &mut flattened);
        for (path, raw) in flattened {
            match lookup_mut(&mut self.root, &path) {
                Some(node) => node.set_initial_param(Value::from_yaml(&raw)),
                None => self.unmatched_initial_params.push(path),
            }
        }
    }
}

fn node_output(node: &Node, ctx: &EvalContext<'_>) -> Result<Yaml> {
    let value = node.evaluate(ctx)?;
    if node.has_children() {
        let mut outputs = Mapping::new();
        for name in node.child_names() {
            if let Some(child) = node.child(name) {
                outputs.insert(Yaml::String(name.to_string()), node_output(child, ctx)?);
            }
        }
        Ok(Yaml::Mapping(outputs))
    } else {
        Ok(value.to_yaml())
    }
}

fn flatten_params(prefix: &str, params: &Mapping, out: &mut Vec<(String, Yaml)>) {
    for (key, value) in params {
        let Yaml::String(name) = key else { continue };
        let path = if prefix.is_empty() {
            name.clone()
        } else {
            format!("{prefix}.{name}")
        };
        match value {
            Yaml::Mapping(nested) => flatten_params(&path, nested, out),
            scalar => out.push((path, scalar.clone())),
        }
    }
}

fn lookup_mut<'a>(root: &'a mut Node, path: &str) -> Option<&'a mut Node> {
    let mut node = root;
    for segment in path.split('.') {
        node = node.child_mut(segment)?;
    }
    Some(node)
}

/// Read-only view of the graph handed to operators while they run.
///
/// Exposes the named context roots: `params` (the node tree itself), `env`
/// (the environment snapshot), and `github` (the CI context object).
pub struct EvalContext<'a> {
    root: &'a Node,
    environment: &'a HashMap<String, String>,
    github: &'a serde_json::Value,
}

impl EvalContext<'_> {
    /// Resolves a dotted placeholder path against the context roots.
    ///
    /// `Ok(None)` means the path does not resolve — a recoverable condition
    /// that makes the calling operator fail over. `Err` is structural (e.g.
    /// a reference cycle reached through `params`) and aborts evaluation.
    /// Navigating to an unevaluated node evaluates it on the spot.
    pub fn resolve_path(&self, path: &str) -> Result<Option<Value>> {
        let mut segments = path.split('.');
        let Some(head) = segments.next() else {
            return Ok(None);
        };

        match head {
            "params" => {
                let mut node = self.root;
                for segment in segments {
                    match node.child(segment) {
                        Some(child) => node = child,
                        None => return Ok(None),
                    }
                }
                node.evaluate(self).map(Some)
            }
            "env" => {
                let name = segments.collect::<Vec<_>>().join(".");
                if name.is_empty() {
                    return Ok(None);
                }
                Ok(self.environment.get(&name).map(|v| Value::Str(v.clone())))
            }
            "github" => {
                let mut current = self.github;
                for segment in segments {
                    current = match current {
                        serde_json::Value::Object(entries) => match entries.get(segment) {
                            Some(value) => value,
                            None => return Ok(None),
                        },
                        serde_json::Value::Array(items) => {
                            match segment.parse::<usize>().ok().and_then(|i| items.get(i)) {
                                Some(value) => value,
                                None => return Ok(None),
                            }
                        }
                        _ => return Ok(None),
                    };
                }
                Ok(Some(Value::from_json(current)))
            }
            _ => Ok(None),
        }
    }

    /// The environment snapshot exposed as the `env` root.
    pub fn environment(&self) -> &HashMap<String, String> {
        self.environment
    }

    /// The CI context object exposed as the `github` root.
    pub fn github(&self) -> &serde_json::Value {
        self.github
    }
}
