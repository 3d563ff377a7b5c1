#![forbid(unsafe_code)]
//! rexc-core: shared, pure data for the rexc compiler.
//!
//! - `rex`: the optimizer's relational-expression model (compiler input)
//! - `expr`: typed execution expressions (compiler output)
//! - `schema`: value types and ordered output schemas
//! - `plan`: physical plan nodes carrying converted expressions
//! - `config`, `error`, `hash`: ambient pieces every layer shares
//!
//! No I/O and no planning logic here; that lives in `rexc-planner`.

pub mod config;
pub mod error;
pub mod expr;
pub mod hash;
pub mod plan;
pub mod prelude;
pub mod rex;
pub mod schema;

pub use error::{Error, Result};

/// Crate version, reported by the CLI next to plan fingerprints.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
