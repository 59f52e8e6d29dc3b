//! Single-statement include planning.
//!
//! Every included navigation becomes one LEFT JOIN. The root table is
//! aliased `a` and joined tables `b1`, `b2`, ... in pre-order. Each selected
//! column is aliased `<alias>__<Property>`; that naming, together with the
//! ordered split points, is what the row splitter relies on to carve a flat
//! row back into per-entity fragments.

use std::ops::Range;
use std::sync::Arc;

use tracing::{debug, instrument};

use super::tree::{IncludeKind, IncludeNode, IncludeTree};
use crate::dialect::SqlDialect;
use crate::error::{Error, Result};
use crate::mapping::{EntityMapping, MappingResolver};
use crate::ROOT_ALIAS;

/// Separator between a table alias and a property name in column aliases.
pub const ALIAS_SEPARATOR: &str = "__";

/// Column alias for a property of the entity at `alias`.
pub fn column_alias(alias: &str, property: &str) -> String {
    format!("{}{}{}", alias, ALIAS_SEPARATOR, property)
}

/// Alias of the `index`-th joined node (1-based).
pub fn join_alias(index: usize) -> String {
    format!("b{}", index)
}

/// One entity type taking part in a plan, in fragment order.
#[derive(Debug, Clone)]
pub struct PlannedEntity {
    /// Table alias (`a`, `b1`, ...).
    pub alias: String,
    pub mapping: Arc<EntityMapping>,
    /// Index of the parent entity in the plan; `None` for the root.
    pub parent: Option<usize>,
    /// Navigation property on the parent; `None` for the root.
    pub navigation: Option<String>,
    /// How this entity hangs off its parent; `None` for the root.
    pub kind: Option<IncludeKind>,
    /// Positions of this entity's columns in the select list.
    pub columns: Range<usize>,
}

impl PlannedEntity {
    pub fn is_root(&self) -> bool {
        self.parent.is_none()
    }
}

/// A planned eager-load statement.
///
/// Depends only on the include shape, so it can be reused across executions
/// with different filters and parameter values.
#[derive(Debug, Clone)]
pub struct SingleQueryPlan {
    /// `SELECT ... FROM ... LEFT JOIN ...` without a WHERE clause.
    pub sql: String,
    /// Column alias starting each joined entity's fragment, in join order.
    pub split_points: Vec<String>,
    /// Root plus every joined type.
    pub mapped_type_count: usize,
    /// Select-list aliases, in order.
    pub columns: Vec<String>,
    /// Root first, then joined entities in pre-order.
    pub entities: Vec<PlannedEntity>,
}

impl SingleQueryPlan {
    /// The root entity's mapping.
    pub fn root(&self) -> &PlannedEntity {
        &self.entities[0]
    }

    /// Aliases in fragment order.
    pub fn aliases(&self) -> Vec<&str> {
        self.entities.iter().map(|e| e.alias.as_str()).collect()
    }
}

/// Plans include trees for one dialect.
pub struct IncludePlanner<'a> {
    dialect: &'a dyn SqlDialect,
    resolver: &'a dyn MappingResolver,
}

struct Builder<'p> {
    dialect: &'p dyn SqlDialect,
    resolver: &'p dyn MappingResolver,
    select: Vec<String>,
    joins: Vec<String>,
    columns: Vec<String>,
    split_points: Vec<String>,
    entities: Vec<PlannedEntity>,
}

impl<'a> IncludePlanner<'a> {
    pub fn new(dialect: &'a dyn SqlDialect, resolver: &'a dyn MappingResolver) -> Self {
        Self { dialect, resolver }
    }

    /// Plan `tree` rooted at `root`.
    #[instrument(
        skip(self, root, tree),
        fields(entity = %root.entity_type(), includes = tree.len())
    )]
    pub fn plan(&self, root: &Arc<EntityMapping>, tree: &IncludeTree) -> Result<SingleQueryPlan> {
        if tree.root_entity != root.entity_type() {
            return Err(Error::mapping(
                root.entity_type(),
                format!(
                    "include tree is rooted at '{}', not '{}'",
                    tree.root_entity,
                    root.entity_type()
                ),
            ));
        }

        let mut builder = Builder {
            dialect: self.dialect,
            resolver: self.resolver,
            select: Vec::new(),
            joins: Vec::new(),
            columns: Vec::new(),
            split_points: Vec::new(),
            entities: Vec::new(),
        };

        builder.add_entity(ROOT_ALIAS, Arc::clone(root), None, None, None)?;
        for node in &tree.nodes {
            builder.add_node(node, 0)?;
        }

        let from = self
            .dialect
            .qualify_table(root.schema(), root.table_name());
        let mut sql = format!("SELECT {} FROM {} {}", builder.select.join(", "), from, ROOT_ALIAS);
        for join in &builder.joins {
            sql.push(' ');
            sql.push_str(join);
        }

        debug!(
            types = builder.entities.len(),
            columns = builder.columns.len(),
            "include plan built"
        );

        Ok(SingleQueryPlan {
            sql,
            split_points: builder.split_points,
            mapped_type_count: builder.entities.len(),
            columns: builder.columns,
            entities: builder.entities,
        })
    }
}

impl Builder<'_> {
    fn add_entity(
        &mut self,
        alias: &str,
        mapping: Arc<EntityMapping>,
        parent: Option<usize>,
        navigation: Option<String>,
        kind: Option<IncludeKind>,
    ) -> Result<usize> {
        if mapping.properties().is_empty() {
            return Err(Error::mapping(
                mapping.entity_type(),
                "entity type has no mapped columns",
            ));
        }

        // The split column leads each fragment; keyless types split on their
        // first column
        let split = mapping
            .first_key_property()
            .unwrap_or(mapping.properties()[0].name.as_str());
        let ordered = mapping
            .properties()
            .iter()
            .filter(|p| p.name == split)
            .chain(mapping.properties().iter().filter(|p| p.name != split));

        let start = self.columns.len();
        for property in ordered {
            let column_alias = column_alias(alias, &property.name);
            self.select.push(format!(
                "{}.{} AS {}",
                alias,
                self.dialect.quote_identifier(&property.column),
                self.dialect.quote_identifier(&column_alias)
            ));
            self.columns.push(column_alias);
        }

        if parent.is_some() {
            self.split_points.push(column_alias(alias, split));
        }

        self.entities.push(PlannedEntity {
            alias: alias.to_string(),
            mapping,
            parent,
            navigation,
            kind,
            columns: start..self.columns.len(),
        });
        Ok(self.entities.len() - 1)
    }

    fn add_node(&mut self, node: &IncludeNode, parent: usize) -> Result<()> {
        let alias = join_alias(self.entities.len());
        let parent_mapping = Arc::clone(&self.entities[parent].mapping);
        let parent_alias = self.entities[parent].alias.clone();
        let related = self.resolver.require(&node.related_entity)?;

        let condition = match node.kind {
            IncludeKind::Reference => {
                let fk = parent_mapping
                    .foreign_keys()
                    .iter()
                    .find(|fk| fk.navigation == node.navigation)
                    .ok_or_else(|| {
                        Error::mapping(
                            parent_mapping.entity_type(),
                            format!("no foreign key for navigation '{}'", node.navigation),
                        )
                    })?;
                let principal_key = related.require_column(&fk.principal_key_property)?;
                let foreign_key = parent_mapping.require_column(&fk.foreign_key_property)?;
                format!(
                    "{}.{} = {}.{}",
                    alias,
                    self.dialect.quote_identifier(principal_key),
                    parent_alias,
                    self.dialect.quote_identifier(foreign_key)
                )
            }
            IncludeKind::Collection(_) => {
                let inverse: Vec<_> = related
                    .foreign_keys_to(parent_mapping.entity_type())
                    .collect();
                let fk = match inverse.as_slice() {
                    [fk] => *fk,
                    [] => {
                        return Err(Error::mapping(
                            related.entity_type(),
                            format!(
                                "no foreign key back to '{}' for collection '{}'",
                                parent_mapping.entity_type(),
                                node.navigation
                            ),
                        ))
                    }
                    _ => {
                        return Err(Error::mapping(
                            related.entity_type(),
                            format!(
                                "{} foreign keys back to '{}' make collection '{}' ambiguous",
                                inverse.len(),
                                parent_mapping.entity_type(),
                                node.navigation
                            ),
                        ))
                    }
                };
                let child_key = related.require_column(&fk.foreign_key_property)?;
                let parent_key = parent_mapping.require_column(&fk.principal_key_property)?;
                format!(
                    "{}.{} = {}.{}",
                    alias,
                    self.dialect.quote_identifier(child_key),
                    parent_alias,
                    self.dialect.quote_identifier(parent_key)
                )
            }
        };

        self.joins.push(format!(
            "LEFT JOIN {} {} ON {}",
            self.dialect
                .qualify_table(related.schema(), related.table_name()),
            alias,
            condition
        ));

        let index = self.add_entity(
            &alias,
            related,
            Some(parent),
            Some(node.navigation.clone()),
            Some(node.kind),
        )?;
        for child in &node.children {
            self.add_node(child, index)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dialect::Dialect;
    use crate::mapping::{
        CollectionKind, CollectionNavigation, ForeignKey, MappingRegistry, PropertyMapping,
    };
    use ormql_proto::RelationInclude;
    use pretty_assertions::assert_eq;

    fn registry() -> MappingRegistry {
        MappingRegistry::new()
            .with_mapping(
                EntityMapping::builder("Order", "Orders")
                    .schema("dbo")
                    .key("Id")
                    .column("Id")
                    .property(PropertyMapping::new("CustomerId").with_column("customer_id"))
                    .foreign_key(ForeignKey::new("Customer", "CustomerId", "Customer", "Id"))
                    .collection(CollectionNavigation::list("Lines", "OrderLine"))
                    .build()
                    .unwrap(),
            )
            .with_mapping(
                EntityMapping::builder("Customer", "Customers")
                    .schema("dbo")
                    .key("Id")
                    .column("Id")
                    .column("Name")
                    .column("AddressId")
                    .foreign_key(ForeignKey::new("Address", "AddressId", "Address", "Id"))
                    .build()
                    .unwrap(),
            )
            .with_mapping(
                EntityMapping::builder("Address", "Addresses")
                    .schema("dbo")
                    .key("Id")
                    .column("Id")
                    .column("City")
                    .build()
                    .unwrap(),
            )
            .with_mapping(
                EntityMapping::builder("OrderLine", "OrderLines")
                    .schema("dbo")
                    .key("Id")
                    .column("Id")
                    .column("OrderId")
                    .foreign_key(ForeignKey::new("Order", "OrderId", "Order", "Id"))
                    .build()
                    .unwrap(),
            )
    }

    fn plan(includes: &[&str]) -> Result<SingleQueryPlan> {
        let registry = registry();
        let includes: Vec<_> = includes.iter().map(|p| RelationInclude::new(*p)).collect();
        let tree = IncludeTree::resolve("Order", &includes, &registry)?;
        let root = registry.require("Order")?;
        IncludePlanner::new(&Dialect::SqlServer, &registry).plan(&root, &tree)
    }

    #[test]
    fn test_reference_chain() {
        let plan = plan(&["Customer", "Customer.Address"]).unwrap();

        assert_eq!(plan.aliases(), vec!["a", "b1", "b2"]);
        assert_eq!(plan.split_points, vec!["b1__Id", "b2__Id"]);
        assert_eq!(plan.mapped_type_count, 3);
        assert_eq!(
            plan.sql,
            "SELECT a.[Id] AS [a__Id], a.[customer_id] AS [a__CustomerId], \
             b1.[Id] AS [b1__Id], b1.[Name] AS [b1__Name], b1.[AddressId] AS [b1__AddressId], \
             b2.[Id] AS [b2__Id], b2.[City] AS [b2__City] \
             FROM [dbo].[Orders] a \
             LEFT JOIN [dbo].[Customers] b1 ON b1.[Id] = a.[customer_id] \
             LEFT JOIN [dbo].[Addresses] b2 ON b2.[Id] = b1.[AddressId]"
        );
    }

    #[test]
    fn test_collection_join_uses_inverse_foreign_key() {
        let plan = plan(&["Lines"]).unwrap();

        assert!(plan
            .sql
            .ends_with("LEFT JOIN [dbo].[OrderLines] b1 ON b1.[OrderId] = a.[Id]"));
        assert_eq!(
            plan.entities[1].kind,
            Some(IncludeKind::Collection(CollectionKind::List))
        );
        assert_eq!(plan.entities[1].navigation.as_deref(), Some("Lines"));
        assert_eq!(plan.entities[1].parent, Some(0));
    }

    #[test]
    fn test_aliases_are_global_preorder() {
        let plan = plan(&["Customer.Address", "Lines"]).unwrap();

        assert_eq!(plan.aliases(), vec!["a", "b1", "b2", "b3"]);
        assert_eq!(plan.entities[2].parent, Some(1));
        assert_eq!(plan.entities[3].parent, Some(0));
        assert_eq!(plan.split_points, vec!["b1__Id", "b2__Id", "b3__Id"]);
        assert_eq!(plan.entities[3].columns, 7..9);
    }

    #[test]
    fn test_every_join_is_left() {
        let plan = plan(&["Customer.Address", "Lines"]).unwrap();
        assert_eq!(plan.sql.matches("LEFT JOIN").count(), 3);
        assert_eq!(plan.sql.matches(" JOIN").count(), 3);
    }

    #[test]
    fn test_ambiguous_collection_is_a_mapping_error() {
        let registry = MappingRegistry::new()
            .with_mapping(
                EntityMapping::builder("User", "Users")
                    .key("Id")
                    .column("Id")
                    .collection(CollectionNavigation::list("Messages", "Message"))
                    .build()
                    .unwrap(),
            )
            .with_mapping(
                EntityMapping::builder("Message", "Messages")
                    .key("Id")
                    .column("Id")
                    .column("SenderId")
                    .column("RecipientId")
                    .foreign_key(ForeignKey::new("Sender", "SenderId", "User", "Id"))
                    .foreign_key(ForeignKey::new("Recipient", "RecipientId", "User", "Id"))
                    .build()
                    .unwrap(),
            );

        let tree = IncludeTree::resolve("User", &[RelationInclude::new("Messages")], &registry)
            .unwrap();
        let root = registry.require("User").unwrap();
        let err = IncludePlanner::new(&Dialect::SqlServer, &registry)
            .plan(&root, &tree)
            .unwrap_err();

        assert_eq!(err.entity(), Some("Message"));
        assert!(err.to_string().contains("ambiguous"));
    }

    #[test]
    fn test_keyless_join_splits_on_first_column() {
        let registry = MappingRegistry::new()
            .with_mapping(
                EntityMapping::builder("Order", "Orders")
                    .key("Id")
                    .column("Id")
                    .collection(CollectionNavigation::list("Notes", "Note"))
                    .build()
                    .unwrap(),
            )
            .with_mapping(
                EntityMapping::builder("Note", "Notes")
                    .column("Text")
                    .column("OrderId")
                    .foreign_key(ForeignKey::new("Order", "OrderId", "Order", "Id"))
                    .build()
                    .unwrap(),
            );

        let tree =
            IncludeTree::resolve("Order", &[RelationInclude::new("Notes")], &registry).unwrap();
        let root = registry.require("Order").unwrap();
        let plan = IncludePlanner::new(&Dialect::Postgres, &registry)
            .plan(&root, &tree)
            .unwrap();

        assert_eq!(plan.split_points, vec!["b1__Text"]);
        assert_eq!(
            plan.sql,
            "SELECT a.\"Id\" AS \"a__Id\", b1.\"Text\" AS \"b1__Text\", \
             b1.\"OrderId\" AS \"b1__OrderId\" \
             FROM \"Orders\" a LEFT JOIN \"Notes\" b1 ON b1.\"OrderId\" = a.\"Id\""
        );
    }

    #[test]
    fn test_key_column_leads_its_fragment() {
        let registry = MappingRegistry::new()
            .with_mapping(
                EntityMapping::builder("Order", "Orders")
                    .key("Id")
                    .column("CustomerId")
                    .column("Id")
                    .foreign_key(ForeignKey::new("Customer", "CustomerId", "Customer", "Id"))
                    .build()
                    .unwrap(),
            )
            .with_mapping(
                EntityMapping::builder("Customer", "Customers")
                    .key("Id")
                    .column("Name")
                    .column("Id")
                    .build()
                    .unwrap(),
            );

        let tree =
            IncludeTree::resolve("Order", &[RelationInclude::new("Customer")], &registry).unwrap();
        let root = registry.require("Order").unwrap();
        let plan = IncludePlanner::new(&Dialect::SqlServer, &registry)
            .plan(&root, &tree)
            .unwrap();

        assert_eq!(plan.split_points, vec!["b1__Id"]);
        assert_eq!(
            plan.columns,
            vec!["a__Id", "a__CustomerId", "b1__Id", "b1__Name"]
        );
        assert_eq!(plan.entities[1].columns, 2..4);
        assert!(plan.layout(&plan.columns).is_ok());
    }

    #[test]
    fn test_no_includes() {
        let plan = plan(&[]).unwrap();
        assert!(plan.split_points.is_empty());
        assert_eq!(plan.mapped_type_count, 1);
        assert!(!plan.sql.contains("JOIN"));
    }
}
