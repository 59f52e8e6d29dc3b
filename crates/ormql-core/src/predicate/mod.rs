//! Predicate compilation.
//!
//! - [`hash`] - Structural hashing and equality of predicate trees
//! - [`eval`] - Client-side evaluators and the shared evaluator cache
//! - [`params`] - Bound parameters
//! - [`compiler`] - WHERE clause generation

pub mod compiler;
pub mod eval;
pub mod hash;
pub mod params;

pub use compiler::{
    compile, escape_like, PredicateCompiler, WhereClause, FALSE_CONDITION, TRUE_CONDITION,
};
pub use eval::{EvaluatorCache, Program};
pub use hash::{structural_hash, structurally_equal};
pub use params::{ParameterBag, SqlParameter};
