//! Include/ThenInclude planning.
//!
//! - [`tree`] - Include trees resolved against mappings
//! - [`planner`] - Single-statement LEFT JOIN plans
//! - [`rows`] - Splitting flat rows back into entity fragments
//! - [`cache`] - Plan cache keyed by include shape

pub mod cache;
pub mod planner;
pub mod rows;
pub mod tree;

pub use cache::{CachedPlan, IncludeFingerprint, PlanCache};
pub use planner::{
    column_alias, join_alias, IncludePlanner, PlannedEntity, SingleQueryPlan, ALIAS_SEPARATOR,
};
pub use rows::{RowFragment, RowLayout};
pub use tree::{IncludeKind, IncludeNode, IncludeTree};
