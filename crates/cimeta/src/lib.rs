pub use cimeta_eval::{
    CoercionError, CycleError, EvalContext, Graph, GraphBuilder, Node, Operator, OperatorFactory,
    OperatorRegistry, Outcome, Scalar, UnknownOperatorType, Value, ValueKind,
};
pub use cimeta_eval;

pub mod prelude {
    pub use crate::{Graph, GraphBuilder, Operator, Outcome, Value, ValueKind};
}
