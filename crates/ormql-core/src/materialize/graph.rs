//! Rebuilding object graphs from flat include rows.

use std::collections::HashSet;
use std::sync::Arc;

use ormql_proto::Value;
use tracing::{debug, instrument};

use super::entity::{Entity, EntityRef};
use super::identity::{IdentityCache, IdentityKey};
use crate::error::{Error, Result};
use crate::include::{IncludeKind, PlannedEntity, RowFragment, RowLayout, SingleQueryPlan};
use crate::mapping::EntityMapping;

/// Rebuilds root entities and their included navigations from the rows of
/// one [`SingleQueryPlan`].
///
/// Keyed entities are resolved through the [`IdentityCache`], so every row
/// carrying the same `(type, key)` wires the same instance. Roots are
/// returned once per distinct key in first-seen order; keyless roots are
/// distinct per row.
pub struct GraphMaterializer<'p> {
    plan: &'p SingleQueryPlan,
    layout: RowLayout,
}

#[derive(Debug, Default)]
struct Tally {
    rows: usize,
    skipped: usize,
    created: usize,
}

impl<'p> GraphMaterializer<'p> {
    /// Prepare to read a result set with the given column names.
    pub fn new(plan: &'p SingleQueryPlan, columns: &[String]) -> Result<Self> {
        let layout = plan.layout(columns)?;
        Ok(Self { plan, layout })
    }

    /// Materialize flat rows.
    #[instrument(skip_all, fields(entity = %self.plan.root().mapping.entity_type()))]
    pub fn materialize<I>(&self, rows: I, cache: &mut IdentityCache) -> Result<Vec<EntityRef>>
    where
        I: IntoIterator<Item = Vec<Value>>,
    {
        let layout = &self.layout;
        self.run(rows.into_iter().map(|row| layout.split(row)), cache)
    }

    /// Materialize rows that were already split into fragments.
    pub fn materialize_fragments<I>(
        &self,
        rows: I,
        cache: &mut IdentityCache,
    ) -> Result<Vec<EntityRef>>
    where
        I: IntoIterator<Item = Vec<RowFragment>>,
    {
        self.run(rows.into_iter().map(Ok), cache)
    }

    fn run<I>(&self, rows: I, cache: &mut IdentityCache) -> Result<Vec<EntityRef>>
    where
        I: Iterator<Item = Result<Vec<RowFragment>>>,
    {
        let root = &self.plan.root().mapping;
        let mut tally = Tally::default();
        let mut roots = Vec::new();
        let mut seen_keys: HashSet<Vec<Value>> = HashSet::new();
        let mut seen_instances: HashSet<usize> = HashSet::new();

        for row in rows {
            tally.rows += 1;
            let Some(instance) = self.materialize_row(row?, cache, &mut tally)? else {
                tally.skipped += 1;
                continue;
            };

            let first_seen = match instance.read().key() {
                Some(key) if !root.is_keyless() => seen_keys.insert(key),
                _ => seen_instances.insert(instance.addr()),
            };
            if first_seen {
                roots.push(instance);
            }
        }

        debug!(
            rows = tally.rows,
            skipped = tally.skipped,
            roots = roots.len(),
            entities = tally.created,
            cached = cache.len(),
            "materialized graph"
        );

        Ok(roots)
    }

    fn materialize_row(
        &self,
        fragments: Vec<RowFragment>,
        cache: &mut IdentityCache,
        tally: &mut Tally,
    ) -> Result<Option<EntityRef>> {
        let entities = &self.plan.entities;
        if fragments.len() != entities.len() {
            return Err(Error::mapping(
                self.plan.root().mapping.entity_type(),
                format!(
                    "row has {} fragments but the plan maps {} types",
                    fragments.len(),
                    entities.len()
                ),
            ));
        }

        // Pre-order: a parent is always resolved before its children.
        let mut resolved: Vec<Option<EntityRef>> = Vec::with_capacity(entities.len());
        for (planned, fragment) in entities.iter().zip(fragments) {
            let parent = match planned.parent {
                Some(index) => match resolved.get(index).and_then(Option::as_ref) {
                    Some(parent) => Some(parent.clone()),
                    None => {
                        resolved.push(None);
                        continue;
                    }
                },
                None => None,
            };

            if fragment.is_all_null() {
                resolved.push(None);
                continue;
            }

            let instance = resolve(&planned.mapping, fragment, cache, tally)?;
            if let Some(parent) = parent {
                link(&parent, planned, &instance);
            }
            resolved.push(Some(instance));
        }

        Ok(resolved.into_iter().next().flatten())
    }
}

/// Find or create the instance for a fragment.
fn resolve(
    mapping: &Arc<EntityMapping>,
    fragment: RowFragment,
    cache: &mut IdentityCache,
    tally: &mut Tally,
) -> Result<EntityRef> {
    if mapping.is_keyless() {
        tally.created += 1;
        return Ok(EntityRef::new(Entity::new(Arc::clone(mapping), fragment.values)));
    }

    let key = fragment.key(mapping).ok_or_else(|| {
        Error::mapping(
            mapping.entity_type(),
            format!(
                "row has a null value for key '{}'",
                mapping.key_properties().join(", ")
            ),
        )
    })?;

    let identity = IdentityKey::new(mapping.entity_type(), key);
    let (instance, created) = cache.get_or_insert_with(identity, || {
        EntityRef::new(Entity::new(Arc::clone(mapping), fragment.values))
    });
    if created {
        tally.created += 1;
    }
    Ok(instance)
}

fn link(parent: &EntityRef, planned: &PlannedEntity, child: &EntityRef) {
    let Some(navigation) = planned.navigation.as_deref() else {
        return;
    };
    match planned.kind {
        Some(IncludeKind::Reference) => parent.write().set_reference(navigation, child.clone()),
        Some(IncludeKind::Collection(kind)) => {
            parent
                .write()
                .add_to_collection(navigation, kind, child.clone());
        }
        None => {}
    }
}

/// Materialize `rows` of `plan`, resolving identities through `cache`.
pub fn materialize<I>(
    plan: &SingleQueryPlan,
    columns: &[String],
    rows: I,
    cache: &mut IdentityCache,
) -> Result<Vec<EntityRef>>
where
    I: IntoIterator<Item = Vec<Value>>,
{
    GraphMaterializer::new(plan, columns)?.materialize(rows, cache)
}
