//! The built-in scalar operator: literals and `{path}` templates.

use anyhow::Result;
use once_cell::sync::Lazy;
use regex::Regex;
use serde_yaml::Value as Yaml;

use crate::graph::EvalContext;
use crate::operator::{Operator, Outcome, mapping_key};
use crate::value::Value;

/// Dotted placeholder path: `params.version`, `env.HOME`, `github.event.ref`.
static PLACEHOLDER_PATH: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^[A-Za-z_][A-Za-z0-9_-]*(\.[A-Za-z0-9_][A-Za-z0-9_-]*)*$")
        .expect("placeholder path pattern must compile")
});

/// Resolves a literal or a template string against the evaluation context.
///
/// String scalars are treated as templates: every `{path}` placeholder is
/// replaced with the coerced string form of the value the path resolves to
/// (`{{` and `}}` escape literal braces). Non-string scalars are passed
/// through verbatim, which means a literal always succeeds — putting one
/// before other operators in a fallback list makes the rest unreachable.
pub struct Scalar {
    scalar: Yaml,
}

impl Scalar {
    /// Accepts either a full `{type, scalar}` mapping or a bare scalar.
    pub(crate) fn from_definition(definition: &Yaml) -> Result<Box<dyn Operator>> {
        let scalar = match definition {
            Yaml::Mapping(mapping) => mapping_key(mapping, "scalar").cloned().unwrap_or(Yaml::Null),
            other => other.clone(),
        };
        Ok(Box::new(Scalar { scalar }))
    }
}

impl Operator for Scalar {
    fn process(&self, ctx: &EvalContext<'_>) -> Result<Outcome> {
        match &self.scalar {
            Yaml::String(template) => substitute(template, ctx),
            literal => Ok(Outcome::Produced(Value::from_yaml(literal))),
        }
    }
}

/// Substitutes every placeholder in `template`.
///
/// A missing path, a value that cannot be coerced to a string, and a
/// malformed template all report [`Outcome::Failed`] so the node can fall
/// back to its next operator. Only structural errors from path resolution
/// (e.g. a cycle) propagate as `Err`.
fn substitute(template: &str, ctx: &EvalContext<'_>) -> Result<Outcome> {
    let mut out = String::with_capacity(template.len());
    let mut rest = template;

    loop {
        let Some(at) = rest.find(['{', '}']) else {
            out.push_str(rest);
            break;
        };
        out.push_str(&rest[..at]);

        if rest[at..].starts_with("{{") {
            out.push('{');
            rest = &rest[at + 2..];
            continue;
        }
        if rest[at..].starts_with("}}") {
            out.push('}');
            rest = &rest[at + 2..];
            continue;
        }
        if rest[at..].starts_with('}') {
            return Ok(Outcome::Failed(format!(
                "unbalanced '}}' in template '{template}'"
            )));
        }

        let inner = &rest[at + 1..];
        let Some(close) = inner.find(['{', '}']) else {
            return Ok(Outcome::Failed(format!(
                "unbalanced '{{' in template '{template}'"
            )));
        };
        if !inner[close..].starts_with('}') {
            return Ok(Outcome::Failed(format!(
                "unbalanced '{{' in template '{template}'"
            )));
        }

        let path = &inner[..close];
        if !PLACEHOLDER_PATH.is_match(path) {
            return Ok(Outcome::Failed(format!(
                "malformed placeholder '{{{path}}}' in template '{template}'"
            )));
        }

        match ctx.resolve_path(path)? {
            Some(value) => match value.as_string() {
                Ok(s) => out.push_str(&s),
                Err(err) => {
                    return Ok(Outcome::Failed(format!(
                        "placeholder '{{{path}}}': {err:#}"
                    )));
                }
            },
            None => {
                return Ok(Outcome::Failed(format!(
                    "unresolved placeholder '{{{path}}}'"
                )));
            }
        }

        rest = &inner[close + 1..];
    }

    Ok(Outcome::Produced(Value::Str(out)))
}
