#![forbid(unsafe_code)]
//! rexc-planner: optimizer relational expressions -> typed execution
//! expressions, output schemas and aggregate plan nodes.
//!
//! Layout:
//! - `types`: external type descriptors to engine value types
//! - `convert`: the recursive expression converter and type finalization
//! - `program` / `join`: schema builders and two-sided predicates on top of it
//! - `aggregate`: serial/hash aggregate lowering
//! - `dsl` + `compile`: YAML statements driven through all of the above
//!
//! All state for one statement lives in a `CompileContext`; nothing is global.

pub mod aggregate;
pub mod compile;
pub mod context;
pub mod convert;
pub mod dsl;
pub mod join;
pub mod program;
pub mod types;

pub use aggregate::{AggregateRel, Distribution, TraitSet};
pub use compile::{compile_statement, CompiledStatement};
pub use context::CompileContext;
pub use convert::{convert, finalize_value_types, ExprConverter, JoinSplit};
pub use dsl::yaml::{parse_yaml_statement, Statement};
pub use join::convert_join_predicate;
pub use program::{
    convert_ref_expression, named_projects_to_schema, program_condition, program_to_schema,
    row_type_to_schema,
};
pub use types::{promote_arithmetic, resolve_type};
