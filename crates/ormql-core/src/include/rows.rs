//! Splitting flat result rows into per-entity fragments.

use std::ops::Range;

use ormql_proto::Value;

use super::planner::{SingleQueryPlan, ALIAS_SEPARATOR};
use crate::error::{Error, Result};
use crate::mapping::EntityMapping;

/// One entity's share of a flat row, in mapping slot order.
#[derive(Debug, Clone, PartialEq)]
pub struct RowFragment {
    pub values: Vec<Value>,
}

impl RowFragment {
    pub fn new(values: Vec<Value>) -> Self {
        Self { values }
    }

    /// True when LEFT JOIN found no row for this entity.
    pub fn is_all_null(&self) -> bool {
        self.values.iter().all(Value::is_null)
    }

    pub fn get(&self, slot: usize) -> Option<&Value> {
        self.values.get(slot)
    }

    /// Key values of this fragment; `None` for keyless types or a null key part.
    pub fn key(&self, mapping: &EntityMapping) -> Option<Vec<Value>> {
        if mapping.is_keyless() {
            return None;
        }
        mapping
            .key_slots()
            .iter()
            .map(|&slot| match self.values.get(slot) {
                Some(value) if !value.is_null() => Some(value.clone()),
                _ => None,
            })
            .collect()
    }
}

#[derive(Debug, Clone)]
struct FragmentLayout {
    columns: Range<usize>,
    /// Target slot for each column in `columns`.
    slots: Vec<usize>,
    slot_count: usize,
}

/// Column-to-slot mapping of one result set, computed once and applied to
/// every row.
#[derive(Debug, Clone)]
pub struct RowLayout {
    entity: String,
    width: usize,
    fragments: Vec<FragmentLayout>,
}

impl RowLayout {
    /// Number of fragments per row.
    pub fn fragment_count(&self) -> usize {
        self.fragments.len()
    }

    /// Carve one row into fragments.
    pub fn split(&self, mut values: Vec<Value>) -> Result<Vec<RowFragment>> {
        if values.len() != self.width {
            return Err(Error::mapping(
                &self.entity,
                format!(
                    "row has {} values but the result set has {} columns",
                    values.len(),
                    self.width
                ),
            ));
        }

        Ok(self
            .fragments
            .iter()
            .map(|fragment| {
                let mut slots = vec![Value::Null; fragment.slot_count];
                for (column, &slot) in fragment.columns.clone().zip(&fragment.slots) {
                    slots[slot] = std::mem::replace(&mut values[column], Value::Null);
                }
                RowFragment::new(slots)
            })
            .collect())
    }
}

impl SingleQueryPlan {
    /// Work out how the columns of a result set map onto this plan's entities.
    ///
    /// Fragment boundaries are found at the split points; within a fragment,
    /// `<alias>__<Property>` columns (or bare property names) are mapped to
    /// the entity's slots. Properties missing from the result set stay null.
    pub fn layout(&self, columns: &[String]) -> Result<RowLayout> {
        let root = self.root().mapping.entity_type().to_string();

        let mut boundaries = Vec::with_capacity(self.split_points.len() + 2);
        boundaries.push(0);
        for split in &self.split_points {
            let from = boundaries.last().copied().unwrap_or(0) + 1;
            let position = columns
                .get(from..)
                .and_then(|rest| rest.iter().position(|c| c == split))
                .map(|offset| from + offset)
                .ok_or_else(|| {
                    Error::mapping(
                        &root,
                        format!("split column '{}' is missing from the result set", split),
                    )
                })?;
            boundaries.push(position);
        }
        boundaries.push(columns.len());

        let fragments = self
            .entities
            .iter()
            .zip(boundaries.windows(2))
            .map(|(entity, bounds)| {
                let range = bounds[0]..bounds[1];
                let slots = columns[range.clone()]
                    .iter()
                    .map(|column| {
                        let property = match column.split_once(ALIAS_SEPARATOR) {
                            Some((alias, property)) if alias == entity.alias => property,
                            Some((alias, _)) => {
                                return Err(Error::mapping(
                                    &root,
                                    format!(
                                        "column '{}' of alias '{}' lies in the fragment of '{}'",
                                        column, alias, entity.alias
                                    ),
                                ))
                            }
                            None => column.as_str(),
                        };
                        entity.mapping.slot_of(property).ok_or_else(|| {
                            Error::mapping(
                                entity.mapping.entity_type(),
                                format!("column '{}' does not map to a property", column),
                            )
                        })
                    })
                    .collect::<Result<Vec<_>>>()?;

                Ok(FragmentLayout {
                    columns: range,
                    slots,
                    slot_count: entity.mapping.slot_count(),
                })
            })
            .collect::<Result<Vec<_>>>()?;

        Ok(RowLayout {
            entity: root,
            width: columns.len(),
            fragments,
        })
    }

    /// Split a single flat row into one fragment per planned entity.
    pub fn split_row(&self, columns: &[String], values: Vec<Value>) -> Result<Vec<RowFragment>> {
        self.layout(columns)?.split(values)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dialect::Dialect;
    use crate::include::{IncludePlanner, IncludeTree};
    use crate::mapping::{EntityMapping, ForeignKey, MappingRegistry, MappingResolver};
    use ormql_proto::RelationInclude;
    use pretty_assertions::assert_eq;

    fn plan() -> SingleQueryPlan {
        let registry = MappingRegistry::new()
            .with_mapping(
                EntityMapping::builder("Order", "Orders")
                    .key("Id")
                    .column("Id")
                    .column("CustomerId")
                    .foreign_key(ForeignKey::new("Customer", "CustomerId", "Customer", "Id"))
                    .build()
                    .unwrap(),
            )
            .with_mapping(
                EntityMapping::builder("Customer", "Customers")
                    .key("Id")
                    .column("Id")
                    .column("Name")
                    .build()
                    .unwrap(),
            );
        let tree =
            IncludeTree::resolve("Order", &[RelationInclude::new("Customer")], &registry).unwrap();
        IncludePlanner::new(&Dialect::SqlServer, &registry)
            .plan(&registry.require("Order").unwrap(), &tree)
            .unwrap()
    }

    #[test]
    fn test_split_row_at_split_points() {
        let plan = plan();
        let fragments = plan
            .split_row(
                &plan.columns,
                vec![Value::Int32(1), Value::Int32(7), Value::Int32(7), "Ann".into()],
            )
            .unwrap();

        assert_eq!(
            fragments,
            vec![
                RowFragment::new(vec![Value::Int32(1), Value::Int32(7)]),
                RowFragment::new(vec![Value::Int32(7), "Ann".into()]),
            ]
        );
    }

    #[test]
    fn test_columns_are_regrouped_into_slot_order() {
        let plan = plan();
        let columns: Vec<String> = ["a__CustomerId", "a__Id", "b1__Id", "b1__Name"]
            .iter()
            .map(|c| c.to_string())
            .collect();

        let fragments = plan
            .split_row(&columns, vec![Value::Int32(7), Value::Int32(1), Value::Null, Value::Null])
            .unwrap();

        assert_eq!(fragments[0].values, vec![Value::Int32(1), Value::Int32(7)]);
        assert!(fragments[1].is_all_null());
        assert_eq!(fragments[1].key(&plan.entities[1].mapping), None);
    }

    #[test]
    fn test_missing_split_column() {
        let plan = plan();
        let columns = vec!["a__Id".to_string(), "a__CustomerId".to_string()];
        let err = plan.layout(&columns).unwrap_err();
        assert!(err.to_string().contains("b1__Id"));
    }

    #[test]
    fn test_wrong_width_row() {
        let plan = plan();
        let layout = plan.layout(&plan.columns).unwrap();
        assert_eq!(layout.fragment_count(), 2);
        assert!(layout.split(vec![Value::Null]).is_err());
    }

    #[test]
    fn test_fragment_key() {
        let plan = plan();
        let mapping = &plan.entities[0].mapping;
        let fragment = RowFragment::new(vec![Value::Int32(3), Value::Null]);
        assert_eq!(fragment.key(mapping), Some(vec![Value::Int32(3)]));
    }
}
