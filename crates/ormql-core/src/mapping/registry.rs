//! Mapping lookup.

use std::collections::HashMap;
use std::sync::Arc;

use super::entity::EntityMapping;
use crate::error::{Error, Result};

/// Read-only source of entity mappings.
pub trait MappingResolver: Send + Sync {
    /// Look up the mapping for an entity type.
    fn resolve(&self, entity_type: &str) -> Option<Arc<EntityMapping>>;

    /// Look up a mapping, failing with a mapping error when it is missing.
    fn require(&self, entity_type: &str) -> Result<Arc<EntityMapping>> {
        self.resolve(entity_type)
            .ok_or_else(|| Error::mapping(entity_type, "entity type is not mapped"))
    }
}

/// Registry owning every mapping by entity type.
///
/// Mappings reference each other by name only, so the registry is the single
/// owner and the navigation graph carries no ownership cycles.
#[derive(Debug, Clone, Default)]
pub struct MappingRegistry {
    mappings: HashMap<String, Arc<EntityMapping>>,
}

impl MappingRegistry {
    /// Create an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a mapping, replacing any earlier mapping for the same type.
    pub fn register(&mut self, mapping: EntityMapping) -> Arc<EntityMapping> {
        let mapping = Arc::new(mapping);
        self.mappings
            .insert(mapping.entity_type().to_string(), Arc::clone(&mapping));
        mapping
    }

    /// Builder-style registration.
    pub fn with_mapping(mut self, mapping: EntityMapping) -> Self {
        self.register(mapping);
        self
    }

    /// Load and validate a JSON array of mappings.
    pub fn from_json_str(json: &str) -> Result<Self> {
        let mappings: Vec<EntityMapping> = serde_json::from_str(json)?;
        let registry = mappings
            .into_iter()
            .fold(Self::new(), |registry, mapping| registry.with_mapping(mapping));
        registry.validate()?;
        Ok(registry)
    }

    /// Number of registered mappings.
    pub fn len(&self) -> usize {
        self.mappings.len()
    }

    pub fn is_empty(&self) -> bool {
        self.mappings.is_empty()
    }

    /// Registered entity type names.
    pub fn entity_types(&self) -> Vec<&str> {
        self.mappings.keys().map(|s| s.as_str()).collect()
    }

    /// Check references between mappings.
    ///
    /// Every foreign key must point at a registered type and one of its mapped
    /// properties; every collection must point at a registered type.
    pub fn validate(&self) -> Result<()> {
        for mapping in self.mappings.values() {
            for fk in mapping.foreign_keys() {
                let principal = self.mappings.get(&fk.principal_entity).ok_or_else(|| {
                    Error::mapping(
                        mapping.entity_type(),
                        format!(
                            "navigation '{}' targets unmapped type '{}'",
                            fk.navigation, fk.principal_entity
                        ),
                    )
                })?;
                if principal.slot_of(&fk.principal_key_property).is_none() {
                    return Err(Error::mapping(
                        mapping.entity_type(),
                        format!(
                            "navigation '{}' targets unmapped key '{}.{}'",
                            fk.navigation, fk.principal_entity, fk.principal_key_property
                        ),
                    ));
                }
            }

            for collection in mapping.collections() {
                if !self.mappings.contains_key(&collection.related_entity) {
                    return Err(Error::mapping(
                        mapping.entity_type(),
                        format!(
                            "navigation '{}' targets unmapped type '{}'",
                            collection.navigation, collection.related_entity
                        ),
                    ));
                }
            }
        }
        Ok(())
    }
}

impl MappingResolver for MappingRegistry {
    fn resolve(&self, entity_type: &str) -> Option<Arc<EntityMapping>> {
        self.mappings.get(entity_type).cloned()
    }
}
