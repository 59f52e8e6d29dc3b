//! Materialized entity instances.

use std::collections::{HashMap, HashSet};
use std::fmt;
use std::sync::Arc;

use ormql_proto::Value;
use parking_lot::{RwLock, RwLockReadGuard, RwLockWriteGuard};

use crate::mapping::{CollectionKind, EntityMapping};

/// A materialized entity: scalar values in mapping slot order plus the
/// navigations populated by the include tree.
#[derive(Debug)]
pub struct Entity {
    mapping: Arc<EntityMapping>,
    values: Vec<Value>,
    references: HashMap<String, EntityRef>,
    collections: HashMap<String, EntityCollection>,
}

impl Entity {
    /// Create an entity from slot-ordered values.
    pub fn new(mapping: Arc<EntityMapping>, values: Vec<Value>) -> Self {
        Self {
            mapping,
            values,
            references: HashMap::new(),
            collections: HashMap::new(),
        }
    }

    pub fn mapping(&self) -> &Arc<EntityMapping> {
        &self.mapping
    }

    pub fn entity_type(&self) -> &str {
        self.mapping.entity_type()
    }

    /// Scalar values in slot order.
    pub fn values(&self) -> &[Value] {
        &self.values
    }

    /// Value of a scalar property.
    pub fn get(&self, property: &str) -> Option<&Value> {
        self.mapping
            .slot_of(property)
            .and_then(|slot| self.values.get(slot))
    }

    /// Key values; `None` for keyless types or a null key part.
    pub fn key(&self) -> Option<Vec<Value>> {
        if self.mapping.is_keyless() {
            return None;
        }
        self.mapping
            .key_slots()
            .iter()
            .map(|&slot| self.values.get(slot).filter(|v| !v.is_null()).cloned())
            .collect()
    }

    /// The instance behind a reference navigation, if loaded.
    pub fn reference(&self, navigation: &str) -> Option<&EntityRef> {
        self.references.get(navigation)
    }

    /// The collection behind a collection navigation, if populated.
    pub fn collection(&self, navigation: &str) -> Option<&EntityCollection> {
        self.collections.get(navigation)
    }

    pub fn set_reference(&mut self, navigation: impl Into<String>, target: EntityRef) {
        self.references.insert(navigation.into(), target);
    }

    /// Add `item` to a collection navigation, creating the collection on
    /// first use. Returns `false` if the collection already held it.
    pub fn add_to_collection(
        &mut self,
        navigation: &str,
        kind: CollectionKind,
        item: EntityRef,
    ) -> bool {
        self.collections
            .entry(navigation.to_string())
            .or_insert_with(|| EntityCollection::new(kind))
            .add(item)
    }
}

/// Items of a collection navigation in first-seen order.
#[derive(Debug)]
pub struct EntityCollection {
    kind: CollectionKind,
    items: Vec<EntityRef>,
    /// Instance addresses of keyed items already present.
    seen: HashSet<usize>,
}

impl EntityCollection {
    pub fn new(kind: CollectionKind) -> Self {
        Self {
            kind,
            items: Vec::new(),
            seen: HashSet::new(),
        }
    }

    pub fn kind(&self) -> CollectionKind {
        self.kind
    }

    pub fn items(&self) -> &[EntityRef] {
        &self.items
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &EntityRef> {
        self.items.iter()
    }

    /// Keyed items are added once per instance. Keyless items always append
    /// to a list; a set skips keyless items equal in value to one it holds.
    fn add(&mut self, item: EntityRef) -> bool {
        if !item.mapping().is_keyless() {
            if !self.seen.insert(item.addr()) {
                return false;
            }
        } else if self.kind == CollectionKind::Set {
            let values = item.read().values().to_vec();
            if self.items.iter().any(|other| other.read().values() == values.as_slice()) {
                return false;
            }
        }
        self.items.push(item);
        true
    }
}

/// Shared handle to a materialized entity.
///
/// Identity resolution hands out clones of one handle per `(type, key)`, so
/// [`EntityRef::ptr_eq`] is the identity test. The mapping is held outside
/// the lock so it can be consulted while the owner is being written.
#[derive(Clone)]
pub struct EntityRef {
    mapping: Arc<EntityMapping>,
    cell: Arc<RwLock<Entity>>,
}

impl EntityRef {
    pub fn new(entity: Entity) -> Self {
        Self {
            mapping: Arc::clone(entity.mapping()),
            cell: Arc::new(RwLock::new(entity)),
        }
    }

    pub fn mapping(&self) -> &Arc<EntityMapping> {
        &self.mapping
    }

    pub fn read(&self) -> RwLockReadGuard<'_, Entity> {
        self.cell.read()
    }

    pub fn write(&self) -> RwLockWriteGuard<'_, Entity> {
        self.cell.write()
    }

    /// True when both handles point at the same instance.
    pub fn ptr_eq(a: &EntityRef, b: &EntityRef) -> bool {
        Arc::ptr_eq(&a.cell, &b.cell)
    }

    pub(crate) fn addr(&self) -> usize {
        Arc::as_ptr(&self.cell) as usize
    }
}

// Navigations can point back at their owner, so Debug stays shallow.
impl fmt::Debug for EntityRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.cell.try_read() {
            Some(entity) => write!(f, "EntityRef({} {:?})", entity.entity_type(), entity.key()),
            None => write!(f, "EntityRef(<locked>)"),
        }
    }
}
