//! ORMQL Benchmark Suite
//!
//! Criterion benchmarks for the ORMQL core.
//!
//! # Benchmark Categories
//!
//! - **Predicate**: Structural hashing, evaluator cache, WHERE compilation
//! - **Include**: Include tree resolution, planning and the plan cache
//! - **Materialize**: Row splitting, identity resolution and graph rebuilding

pub mod fixtures;

pub use fixtures::{blog_registry, blog_rows, Scale};
