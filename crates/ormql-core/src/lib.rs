//! ORMQL Core - predicate compilation, include planning and graph
//! materialization for a mapped SQL data-access layer.
//!
//! # Modules
//!
//! - [`mapping`] - Entity-to-table mappings and the mapping registry
//! - [`dialect`] - SQL dialect rules (quoting, placeholders, literals)
//! - [`predicate`] - Structural hashing, evaluator cache and the WHERE compiler
//! - [`include`] - Include trees, single-statement plans and row splitting
//! - [`materialize`] - Identity cache and object graph rebuilding
//! - [`engine`] - [`QueryEngine`] tying the above together

pub mod config;
pub mod dialect;
pub mod engine;
pub mod error;
pub mod include;
pub mod mapping;
pub mod materialize;
pub mod predicate;
pub mod stats;

/// Table alias of the queried (root) entity.
pub const ROOT_ALIAS: &str = "a";

pub use config::{IdentityCacheConfig, OrmConfig};
pub use dialect::{Dialect, SqlDialect};
pub use engine::{QueryEngine, SqlStatement};
pub use error::{Error, Result};
pub use include::{
    IncludeFingerprint, IncludeKind, IncludeNode, IncludePlanner, IncludeTree, PlanCache,
    PlannedEntity, RowFragment, RowLayout, SingleQueryPlan,
};
pub use mapping::{
    CollectionKind, CollectionNavigation, EntityMapping, EntityMappingBuilder, ForeignKey,
    MappingRegistry, MappingResolver, Navigation, PropertyMapping,
};
pub use materialize::{
    Entity, EntityCollection, EntityRef, GraphMaterializer, IdentityCache, IdentityCacheStats,
    IdentityKey,
};
pub use predicate::{
    structural_hash, structurally_equal, EvaluatorCache, ParameterBag, PredicateCompiler,
    SqlParameter, WhereClause,
};
pub use stats::{CacheStats, CacheStatsSnapshot};

/// Re-export caller-facing types.
pub use ormql_proto as proto;
