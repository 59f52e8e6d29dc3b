//! Include trees resolved against mappings.

use ormql_proto::RelationInclude;

use crate::error::{Error, Result};
use crate::mapping::{CollectionKind, MappingResolver, Navigation};

/// How an included node hangs off its parent.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum IncludeKind {
    /// Many-to-one / one-to-one through a foreign key on the parent.
    Reference,
    /// One-to-many through a foreign key on the related type.
    Collection(CollectionKind),
}

/// One requested navigation and its nested includes.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct IncludeNode {
    pub navigation: String,
    pub related_entity: String,
    pub kind: IncludeKind,
    pub children: Vec<IncludeNode>,
}

impl IncludeNode {
    /// Reference navigation node.
    pub fn reference(navigation: impl Into<String>, related_entity: impl Into<String>) -> Self {
        Self {
            navigation: navigation.into(),
            related_entity: related_entity.into(),
            kind: IncludeKind::Reference,
            children: Vec::new(),
        }
    }

    /// Collection navigation node.
    pub fn collection(
        navigation: impl Into<String>,
        related_entity: impl Into<String>,
        kind: CollectionKind,
    ) -> Self {
        Self {
            navigation: navigation.into(),
            related_entity: related_entity.into(),
            kind: IncludeKind::Collection(kind),
            children: Vec::new(),
        }
    }

    /// Add a nested include.
    pub fn with_child(mut self, child: IncludeNode) -> Self {
        self.children.push(child);
        self
    }

    pub fn is_collection(&self) -> bool {
        matches!(self.kind, IncludeKind::Collection(_))
    }
}

/// The include forest of one query, rooted at the queried type.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct IncludeTree {
    pub root_entity: String,
    pub nodes: Vec<IncludeNode>,
}

impl IncludeTree {
    /// Create an empty tree.
    pub fn new(root_entity: impl Into<String>) -> Self {
        Self {
            root_entity: root_entity.into(),
            nodes: Vec::new(),
        }
    }

    /// Add a top-level include.
    pub fn with_node(mut self, node: IncludeNode) -> Self {
        self.nodes.push(node);
        self
    }

    /// Build the tree from dotted include paths.
    ///
    /// Missing intermediate segments are added implicitly and repeated paths
    /// are merged, so `["Customer.Address", "Customer"]` yields one
    /// `Customer` node with one `Address` child.
    pub fn resolve(
        root_entity: &str,
        includes: &[RelationInclude],
        resolver: &dyn MappingResolver,
    ) -> Result<Self> {
        let mut tree = Self::new(root_entity);
        // Fail early on an unmapped root even without includes
        resolver.require(root_entity)?;

        for include in includes {
            let mut owner = root_entity.to_string();
            let mut level = &mut tree.nodes;

            for segment in include.segments() {
                let mapping = resolver.require(&owner)?;
                let position = match level.iter().position(|n| n.navigation == segment) {
                    Some(position) => position,
                    None => {
                        let node = match mapping.navigation(segment) {
                            Some(Navigation::Reference(fk)) => {
                                IncludeNode::reference(segment, &fk.principal_entity)
                            }
                            Some(Navigation::Collection(nav)) => {
                                IncludeNode::collection(segment, &nav.related_entity, nav.kind)
                            }
                            None => {
                                return Err(Error::mapping(
                                    &owner,
                                    format!(
                                        "navigation '{}' in include '{}' does not exist",
                                        segment, include.path
                                    ),
                                ))
                            }
                        };
                        level.push(node);
                        level.len() - 1
                    }
                };

                let node = &mut level[position];
                owner = node.related_entity.clone();
                level = &mut node.children;
            }
        }

        Ok(tree)
    }

    /// Number of included nodes (excluding the root).
    pub fn len(&self) -> usize {
        fn count(nodes: &[IncludeNode]) -> usize {
            nodes.iter().map(|n| 1 + count(&n.children)).sum()
        }
        count(&self.nodes)
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// Nodes in pre-order, depth first.
    pub fn preorder(&self) -> Vec<&IncludeNode> {
        fn walk<'a>(nodes: &'a [IncludeNode], out: &mut Vec<&'a IncludeNode>) {
            for node in nodes {
                out.push(node);
                walk(&node.children, out);
            }
        }
        let mut out = Vec::with_capacity(self.len());
        walk(&self.nodes, &mut out);
        out
    }
}
