//! Convenient re-exports for downstream crates.

pub use crate::config::PlannerConfig;
pub use crate::error::{Error, Result};
pub use crate::expr::{ArithmeticOp, ComparisonOp, ConjunctionOp, Expr, Function, TupleRef, UnaryOp};
pub use crate::plan::{AggregateColumn, AggregateFunction, AggregatePlanNode, AggregateStrategy, PlanNode};
pub use crate::rex::{
    AggKind, AggregateCall, LiteralValue, NamedProject, Operator, RelField, RelType, RexNode,
    RexProgram, RowType, SqlKind, SqlTypeName,
};
pub use crate::schema::{NodeSchema, SchemaColumn, TypeInfo, ValueType};
