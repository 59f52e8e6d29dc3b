//! Entity mappings.

use std::collections::HashMap;

use serde::Deserialize;

use super::navigation::{CollectionNavigation, ForeignKey, Navigation};
use super::property::PropertyMapping;
use crate::error::{Error, Result};

/// Immutable mapping of one entity type to a table.
///
/// Built once through [`EntityMappingBuilder`] and only read afterwards.
/// Scalar properties are numbered in declaration order; that slot order is
/// the layout of every materialized entity and every row fragment.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(try_from = "EntityMappingBuilder")]
pub struct EntityMapping {
    entity_type: String,
    table_name: String,
    schema: Option<String>,
    key_properties: Vec<String>,
    properties: Vec<PropertyMapping>,
    foreign_keys: Vec<ForeignKey>,
    collections: Vec<CollectionNavigation>,
    is_read_only: bool,
    slots: HashMap<String, usize>,
    key_slots: Vec<usize>,
}

impl EntityMapping {
    /// Start building a mapping.
    pub fn builder(
        entity_type: impl Into<String>,
        table_name: impl Into<String>,
    ) -> EntityMappingBuilder {
        EntityMappingBuilder::new(entity_type, table_name)
    }

    pub fn entity_type(&self) -> &str {
        &self.entity_type
    }

    pub fn table_name(&self) -> &str {
        &self.table_name
    }

    pub fn schema(&self) -> Option<&str> {
        self.schema.as_deref()
    }

    /// Ordered key property names. Empty for keyless types.
    pub fn key_properties(&self) -> &[String] {
        &self.key_properties
    }

    pub fn is_keyless(&self) -> bool {
        self.key_properties.is_empty()
    }

    pub fn is_read_only(&self) -> bool {
        self.is_read_only
    }

    /// Scalar properties in slot order.
    pub fn properties(&self) -> &[PropertyMapping] {
        &self.properties
    }

    pub fn foreign_keys(&self) -> &[ForeignKey] {
        &self.foreign_keys
    }

    pub fn collections(&self) -> &[CollectionNavigation] {
        &self.collections
    }

    /// Number of scalar slots.
    pub fn slot_count(&self) -> usize {
        self.properties.len()
    }

    /// Slot index of a scalar property.
    pub fn slot_of(&self, property: &str) -> Option<usize> {
        self.slots.get(property).copied()
    }

    /// Slot indices of the key properties, in key order.
    pub fn key_slots(&self) -> &[usize] {
        &self.key_slots
    }

    /// Get a scalar property mapping by name.
    pub fn property(&self, name: &str) -> Option<&PropertyMapping> {
        self.slot_of(name).map(|slot| &self.properties[slot])
    }

    /// Column name of a scalar property.
    pub fn column_for(&self, property: &str) -> Option<&str> {
        self.property(property).map(|p| p.column.as_str())
    }

    /// Column name of a scalar property, or a mapping error naming it.
    pub fn require_column(&self, property: &str) -> Result<&str> {
        self.column_for(property).ok_or_else(|| {
            Error::mapping(
                &self.entity_type,
                format!("property '{}' is not mapped to a column", property),
            )
        })
    }

    /// First key property, used as the row split point.
    pub fn first_key_property(&self) -> Option<&str> {
        self.key_properties.first().map(String::as_str)
    }

    /// Resolve a navigation property by name.
    pub fn navigation(&self, name: &str) -> Option<Navigation<'_>> {
        if let Some(fk) = self.foreign_keys.iter().find(|fk| fk.navigation == name) {
            return Some(Navigation::Reference(fk));
        }
        self.collections
            .iter()
            .find(|c| c.navigation == name)
            .map(Navigation::Collection)
    }

    /// Foreign keys on this type that point at `principal_entity`.
    pub fn foreign_keys_to<'a>(
        &'a self,
        principal_entity: &'a str,
    ) -> impl Iterator<Item = &'a ForeignKey> + 'a {
        self.foreign_keys
            .iter()
            .filter(move |fk| fk.principal_entity == principal_entity)
    }
}

/// Builder for [`EntityMapping`]; also the serialized form.
#[derive(Debug, Clone, Deserialize)]
pub struct EntityMappingBuilder {
    entity_type: String,
    table_name: String,
    #[serde(default)]
    schema: Option<String>,
    #[serde(default)]
    key_properties: Vec<String>,
    #[serde(default)]
    properties: Vec<PropertyMapping>,
    #[serde(default)]
    foreign_keys: Vec<ForeignKey>,
    #[serde(default)]
    collections: Vec<CollectionNavigation>,
    #[serde(default)]
    is_read_only: bool,
}

impl EntityMappingBuilder {
    pub fn new(entity_type: impl Into<String>, table_name: impl Into<String>) -> Self {
        Self {
            entity_type: entity_type.into(),
            table_name: table_name.into(),
            schema: None,
            key_properties: Vec::new(),
            properties: Vec::new(),
            foreign_keys: Vec::new(),
            collections: Vec::new(),
            is_read_only: false,
        }
    }

    /// Set the schema the table lives in.
    pub fn schema(mut self, schema: impl Into<String>) -> Self {
        self.schema = Some(schema.into());
        self
    }

    /// Add a key property. Call once per key column, in key order.
    pub fn key(mut self, property: impl Into<String>) -> Self {
        self.key_properties.push(property.into());
        self
    }

    /// Add a scalar property.
    pub fn property(mut self, property: PropertyMapping) -> Self {
        self.properties.push(property);
        self
    }

    /// Add a scalar property mapped to a column of the same name.
    pub fn column(self, name: impl Into<String>) -> Self {
        self.property(PropertyMapping::new(name))
    }

    /// Add a reference navigation.
    pub fn foreign_key(mut self, foreign_key: ForeignKey) -> Self {
        self.foreign_keys.push(foreign_key);
        self
    }

    /// Add a collection navigation.
    pub fn collection(mut self, collection: CollectionNavigation) -> Self {
        self.collections.push(collection);
        self
    }

    /// Mark the whole type as read-only.
    pub fn read_only(mut self) -> Self {
        self.is_read_only = true;
        self
    }

    /// Validate and freeze the mapping.
    pub fn build(self) -> Result<EntityMapping> {
        let entity = &self.entity_type;

        let mut slots = HashMap::with_capacity(self.properties.len());
        for (slot, property) in self.properties.iter().enumerate() {
            if property.name.contains("__") {
                return Err(Error::mapping(
                    entity,
                    format!("property '{}' contains the reserved '__' separator", property.name),
                ));
            }
            if slots.insert(property.name.clone(), slot).is_some() {
                return Err(Error::mapping(
                    entity,
                    format!("property '{}' is mapped twice", property.name),
                ));
            }
        }

        let key_slots = self
            .key_properties
            .iter()
            .map(|key| {
                slots.get(key).copied().ok_or_else(|| {
                    Error::mapping(entity, format!("key property '{}' is not mapped", key))
                })
            })
            .collect::<Result<Vec<_>>>()?;

        for fk in &self.foreign_keys {
            if !slots.contains_key(&fk.foreign_key_property) {
                return Err(Error::mapping(
                    entity,
                    format!(
                        "foreign key property '{}' of navigation '{}' is not mapped",
                        fk.foreign_key_property, fk.navigation
                    ),
                ));
            }
        }

        let navigations = self
            .foreign_keys
            .iter()
            .map(|fk| &fk.navigation)
            .chain(self.collections.iter().map(|c| &c.navigation));
        let mut seen = std::collections::HashSet::new();
        for navigation in navigations {
            if slots.contains_key(navigation) || !seen.insert(navigation) {
                return Err(Error::mapping(
                    entity,
                    format!("navigation '{}' clashes with another member", navigation),
                ));
            }
        }

        // Fill in implicit column names from serialized mappings
        let properties = self
            .properties
            .into_iter()
            .map(|mut p| {
                if p.column.is_empty() {
                    p.column = p.name.clone();
                }
                p
            })
            .collect();

        Ok(EntityMapping {
            entity_type: self.entity_type,
            table_name: self.table_name,
            schema: self.schema,
            key_properties: self.key_properties,
            properties,
            foreign_keys: self.foreign_keys,
            collections: self.collections,
            is_read_only: self.is_read_only,
            slots,
            key_slots,
        })
    }
}

impl TryFrom<EntityMappingBuilder> for EntityMapping {
    type Error = Error;

    fn try_from(builder: EntityMappingBuilder) -> Result<Self> {
        builder.build()
    }
}
