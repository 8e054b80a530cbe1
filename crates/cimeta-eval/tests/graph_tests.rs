use anyhow::Result;
use cimeta_eval::error::{CycleError, UnknownOperatorType};
use cimeta_eval::graph::{Graph, GraphBuilder};
use cimeta_eval::operator::{Operator, Outcome};
use cimeta_eval::value::{Value, ValueKind};
use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

fn mapping(source: &str) -> serde_yaml::Mapping {
    let parsed: serde_yaml::Value = serde_yaml::from_str(source).unwrap();
    match parsed {
        serde_yaml::Value::Mapping(m) => m,
        other => panic!("expected a mapping, got {other:?}"),
    }
}

fn graph(source: &str) -> Graph {
    Graph::builder().with_document(mapping(source)).build().unwrap()
}

/// Test operator that counts invocations and either produces or declines.
struct Probe {
    hits: Arc<AtomicUsize>,
    output: Option<Value>,
}

impl Operator for Probe {
    fn process(&self, _ctx: &cimeta_eval::EvalContext<'_>) -> Result<Outcome> {
        self.hits.fetch_add(1, Ordering::SeqCst);
        match &self.output {
            Some(value) => Ok(Outcome::Produced(value.clone())),
            None => Ok(Outcome::Failed("probe declined".to_string())),
        }
    }
}

fn with_probe(builder: GraphBuilder, tag: &str, output: Option<Value>) -> (GraphBuilder, Arc<AtomicUsize>) {
    let hits = Arc::new(AtomicUsize::new(0));
    let factory_hits = hits.clone();
    let builder = builder.register_operator(
        tag,
        Box::new(move |_definition| {
            Ok(Box::new(Probe {
                hits: factory_hits.clone(),
                output: output.clone(),
            }))
        }),
    );
    (builder, hits)
}

#[test]
fn test_scalar_passthrough() {
    let g = graph("answer: 42");
    assert_eq!(g.resolve("answer").unwrap(), Value::Int(42));
}

#[test]
fn test_template_substitution() {
    let g = graph("version: '1.2.3'\nimage: 'app-v{params.version}'");
    assert_eq!(
        g.resolve("image").unwrap(),
        Value::Str("app-v1.2.3".to_string())
    );
}

#[test]
fn test_nested_path_reference() {
    let g = graph("meta:\n  version: '2.0'\nfull: 'release-{params.meta.version}'");
    assert_eq!(
        g.resolve("full").unwrap(),
        Value::Str("release-2.0".to_string())
    );
}

#[test]
fn test_memoization_runs_operators_once() {
    let (builder, hits) = with_probe(
        Graph::builder(),
        "probe",
        Some(Value::Str("computed".to_string())),
    );
    let g = builder
        .with_document(mapping("x: [{type: probe}]"))
        .build()
        .unwrap();

    let first = g.resolve("x").unwrap();
    let second = g.resolve("x").unwrap();
    assert_eq!(first, Value::Str("computed".to_string()));
    assert_eq!(first, second);
    assert_eq!(hits.load(Ordering::SeqCst), 1);
}

#[test]
fn test_or_fallback_first_success_wins() {
    // A fails (unresolved path), B succeeds, C must never run.
    let (builder, c_hits) = with_probe(
        Graph::builder(),
        "probe",
        Some(Value::Str("from-c".to_string())),
    );
    let g = builder
        .with_document(mapping(
            "x:\n  - '{params.missing}'\n  - 'from-b'\n  - {type: probe}",
        ))
        .build()
        .unwrap();

    assert_eq!(g.resolve("x").unwrap(), Value::Str("from-b".to_string()));
    assert_eq!(c_hits.load(Ordering::SeqCst), 0);
}

#[test]
fn test_unresolvable_node_is_null() {
    let g = graph("x: ['{params.nowhere}']");
    assert_eq!(g.resolve("x").unwrap(), Value::Null);
}

#[test]
fn test_merge_override() {
    let g = Graph::builder()
        .with_document(mapping("a: 1\nb: 2"))
        .with_document(mapping("b: 3\nc: 4"))
        .build()
        .unwrap();

    assert_eq!(g.resolve("a").unwrap(), Value::Int(1));
    assert_eq!(g.resolve("b").unwrap(), Value::Int(3));
    assert_eq!(g.resolve("c").unwrap(), Value::Int(4));
    assert_eq!(g.merged_params().len(), 3);
}

#[test]
fn test_initial_param_override() {
    let g = Graph::builder()
        .with_document(mapping("meta:\n  image: 'default-image'"))
        .with_initial_params(mapping("meta.image: busybox"))
        .build()
        .unwrap();

    assert_eq!(
        g.resolve("meta.image").unwrap(),
        Value::Str("busybox".to_string())
    );
}

#[test]
fn test_initial_param_skips_operators() {
    let (builder, hits) = with_probe(
        Graph::builder(),
        "probe",
        Some(Value::Str("computed".to_string())),
    );
    let g = builder
        .with_document(mapping("x: [{type: probe}]"))
        .with_initial_params(mapping("x: injected"))
        .build()
        .unwrap();

    assert_eq!(g.resolve("x").unwrap(), Value::Str("injected".to_string()));
    assert_eq!(hits.load(Ordering::SeqCst), 0);
}

#[test]
fn test_initial_param_nested_mapping_flattens() {
    let g = Graph::builder()
        .with_document(mapping("meta:\n  image: 'default'"))
        .with_initial_params(mapping("meta:\n  image: override"))
        .build()
        .unwrap();

    assert_eq!(
        g.resolve("meta.image").unwrap(),
        Value::Str("override".to_string())
    );
}

#[test]
fn test_initial_param_does_not_touch_descendants() {
    let g = Graph::builder()
        .with_document(mapping("meta:\n  image: 'default'"))
        .with_initial_params(mapping("meta: flat"))
        .build()
        .unwrap();

    assert_eq!(g.resolve("meta").unwrap(), Value::Str("flat".to_string()));
    assert_eq!(
        g.resolve("meta.image").unwrap(),
        Value::Str("default".to_string())
    );
}

#[test]
fn test_unmatched_initial_param_is_reported() {
    let g = Graph::builder()
        .with_document(mapping("a: 1"))
        .with_initial_params(mapping("ghost.path: 1"))
        .build()
        .unwrap();

    assert_eq!(g.unmatched_initial_params(), ["ghost.path".to_string()]);
}

#[test]
fn test_cycle_detection() {
    let g = graph("a: '{params.b}'\nb: '{params.a}'");
    let err = g.resolve("a").unwrap_err();
    let cycle = err.downcast_ref::<CycleError>().unwrap();
    assert_eq!(cycle.path, "a");
}

#[test]
fn test_self_reference_is_a_cycle() {
    let g = graph("a: '{params.a}'");
    assert!(g.resolve("a").unwrap_err().downcast_ref::<CycleError>().is_some());
}

#[test]
fn test_unknown_operator_type_fails_at_build() {
    let err = Graph::builder()
        .with_document(mapping("x: [{type: regex, pattern: '.*'}]"))
        .build()
        .unwrap_err();

    let unknown = err.downcast_ref::<UnknownOperatorType>().unwrap();
    assert_eq!(unknown.tag, "regex");
    assert_eq!(unknown.path, "x");
}

#[test]
fn test_env_root_resolution() {
    let mut env = HashMap::new();
    env.insert("DEPLOY_TARGET".to_string(), "staging".to_string());
    let g = Graph::builder()
        .with_document(mapping("target: 'deploy-{env.DEPLOY_TARGET}'"))
        .with_environment(env)
        .build()
        .unwrap();

    assert_eq!(
        g.resolve("target").unwrap(),
        Value::Str("deploy-staging".to_string())
    );
}

#[test]
fn test_github_root_resolution() {
    let g = Graph::builder()
        .with_document(mapping(
            "ref: '{github.ref}'\nrun: 'run-{github.run.id}'",
        ))
        .with_github_context(serde_json::json!({
            "ref": "refs/heads/main",
            "run": {"id": 7}
        }))
        .build()
        .unwrap();

    assert_eq!(
        g.resolve("ref").unwrap(),
        Value::Str("refs/heads/main".to_string())
    );
    assert_eq!(g.resolve("run").unwrap(), Value::Str("run-7".to_string()));
}

#[test]
fn test_missing_github_path_falls_over() {
    let g = Graph::builder()
        .with_document(mapping("x: ['{github.nope}', 'fallback']"))
        .with_github_context(serde_json::json!({"ref": "main"}))
        .build()
        .unwrap();

    assert_eq!(g.resolve("x").unwrap(), Value::Str("fallback".to_string()));
}

#[test]
fn test_parent_without_operators_resolves_to_structure() {
    let g = graph("meta:\n  a: 1");
    let value = g.resolve("meta").unwrap();
    assert_eq!(value.kind(), ValueKind::Other);
}

#[test]
fn test_bare_declaration_resolves_to_null() {
    let g = graph("decl:");
    assert_eq!(g.resolve("decl").unwrap(), Value::Null);
}

#[test]
fn test_empty_operator_list_resolves_to_null() {
    let g = graph("x: []");
    assert_eq!(g.resolve("x").unwrap(), Value::Null);
}

#[test]
fn test_resolve_unknown_path_errors() {
    let g = graph("a: 1");
    assert!(g.resolve("nope").is_err());
}

#[test]
fn test_outputs_walk() {
    let g = graph(
        "meta:\n  version: '1.2.3'\n  image: 'app-v{params.meta.version}'\ncount: 3\nmissing: ['{params.nowhere}']",
    );
    let outputs = g.outputs().unwrap();
    let expected = mapping(
        "meta:\n  version: '1.2.3'\n  image: 'app-v1.2.3'\ncount: 3\nmissing: null",
    );
    assert_eq!(outputs, expected);
}

#[test]
fn test_outputs_preserve_top_level_order() {
    let g = graph("zeta: 1\nalpha: 2\nmiddle: 3");
    let keys: Vec<String> = g
        .outputs()
        .unwrap()
        .into_iter()
        .map(|(k, _)| k.as_str().unwrap().to_string())
        .collect();
    assert_eq!(keys, ["zeta", "alpha", "middle"]);
}

#[test]
fn test_sibling_references_through_output_walk() {
    // Forcing outputs in declaration order must still let an earlier key
    // depend on a later one through lazy evaluation.
    let g = graph("first: 'v{params.second}'\nsecond: '9'");
    let outputs = g.outputs().unwrap();
    let expected = mapping("first: 'v9'\nsecond: '9'");
    assert_eq!(outputs, expected);
}
