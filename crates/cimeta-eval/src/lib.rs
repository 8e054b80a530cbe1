//! Lazy evaluation engine for merged CI metadata documents.
//!
//! A configuration document is a YAML mapping whose keys become graph
//! nodes: mappings nest into child nodes, sequences declare an ordered
//! list of fallback operators (the first to produce output wins), and bare
//! scalars are shorthand for a single scalar operator. Values are resolved
//! on demand, memoized per node, and may refer to one another through
//! dotted paths (`{params.meta.version}`), the process environment
//! (`{env.HOME}`), or a CI context object (`{github.ref}`).
//!
//! ```
//! use cimeta_eval::{Graph, Value};
//!
//! let document: serde_yaml::Mapping = serde_yaml::from_str(
//!     "version: '1.2.3'\nimage: 'app-v{params.version}'",
//! )
//! .unwrap();
//!
//! let graph = Graph::builder().with_document(document).build().unwrap();
//! let image = graph.resolve("image").unwrap();
//! assert_eq!(image, Value::Str("app-v1.2.3".to_string()));
//! ```
//!
//! Evaluation is single-threaded and demand-driven: resolving one node may
//! recursively resolve others it refers to, and a reference cycle fails
//! fast with [`CycleError`] instead of recursing forever. Coercion of an
//! already-resolved [`Value`] (`as_string`, `as_int`, ...) is a pure
//! function and never triggers evaluation by itself.

pub mod error;
pub mod graph;
pub mod node;
pub mod operator;
pub mod scalar;
pub mod value;

pub use error::{CoercionError, CycleError, UnknownOperatorType};
pub use graph::{EvalContext, Graph, GraphBuilder};
pub use node::Node;
pub use operator::{Operator, OperatorFactory, OperatorRegistry, Outcome};
pub use scalar::Scalar;
pub use value::{Value, ValueKind};
