//! Entity mapping model.
//!
//! Static metadata describing how each entity type maps to a table: columns,
//! keys, reference navigations (foreign keys) and collection navigations.
//! Mappings are built once, validated, and then shared read-only through a
//! [`MappingResolver`].

mod entity;
mod navigation;
mod property;
mod registry;

pub use entity::{EntityMapping, EntityMappingBuilder};
pub use navigation::{CollectionKind, CollectionNavigation, ForeignKey, Navigation};
pub use property::PropertyMapping;
pub use registry::{MappingRegistry, MappingResolver};
