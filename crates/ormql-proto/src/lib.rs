//! ORMQL caller-facing types.
//!
//! This crate defines the intermediate representation that application code
//! builds and the ORMQL core consumes.
//!
//! # Modules
//!
//! - [`value`] - Runtime values for captured variables, parameters and rows
//! - [`expr`] - Predicate expression trees
//! - [`query`] - Query envelope and Include/ThenInclude requests

pub mod expr;
pub mod query;
pub mod value;

// Re-export commonly used types at crate root
pub use expr::{
    constant, contains, list_of, param, prop, BinaryOp, Closure, Expr, Method, Predicate,
};
pub use query::{EntityQuery, IncludeSpec, RelationInclude};
pub use value::{list, Value, ValueKind};
