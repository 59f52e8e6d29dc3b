//! Object graph materialization.
//!
//! - [`entity`] - Materialized instances and shared handles
//! - [`identity`] - LRU identity map scoped to one pass
//! - [`graph`] - Row-to-graph rebuilding with identity resolution

pub mod entity;
pub mod graph;
pub mod identity;

pub use entity::{Entity, EntityCollection, EntityRef};
pub use graph::{materialize, GraphMaterializer};
pub use identity::{IdentityCache, IdentityCacheStats, IdentityKey};
