//! Query envelope and include requests.

use crate::expr::Predicate;

/// A query over one root entity with an optional filter and eager loads.
///
/// Note: includes are represented as a flat list with path-based nesting
/// (e.g., "Customer", "Customer.Address"); the planner rebuilds the tree.
#[derive(Debug, Clone, PartialEq)]
pub struct EntityQuery {
    /// The root entity type to query.
    pub root_entity: String,
    /// Optional filter for the root entity.
    pub filter: Option<Predicate>,
    /// Flat list of navigation includes (nested includes use dot-notation paths).
    pub includes: Vec<RelationInclude>,
}

impl EntityQuery {
    /// Create a new query for an entity type.
    pub fn new(root_entity: impl Into<String>) -> Self {
        Self {
            root_entity: root_entity.into(),
            filter: None,
            includes: vec![],
        }
    }

    /// Set the filter predicate.
    pub fn with_filter(mut self, filter: Predicate) -> Self {
        self.filter = Some(filter);
        self
    }

    /// Add a single include path.
    pub fn include(mut self, include: RelationInclude) -> Self {
        self.includes.push(include);
        self
    }

    /// Add every path produced by an [`IncludeSpec`].
    pub fn with_includes(mut self, spec: IncludeSpec) -> Self {
        self.includes.extend(spec.into_includes());
        self
    }
}

/// An included navigation in a query.
///
/// The `path` field uses dot-notation for nested navigations:
/// - "Customer" - include Customer from the root entity
/// - "Customer.Address" - include Address from Customer
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct RelationInclude {
    /// Dot-separated path to this navigation (e.g., "Customer.Address").
    pub path: String,
}

impl RelationInclude {
    /// Create a new include for a navigation path.
    pub fn new(path: impl Into<String>) -> Self {
        Self { path: path.into() }
    }

    /// Iterate over the path segments.
    pub fn segments(&self) -> impl Iterator<Item = &str> {
        self.path.split('.')
    }
}

/// Include / ThenInclude chain builder.
///
/// `include` starts a new chain at the root; `then_include` extends the most
/// recent chain by one level.
///
/// ```ignore
/// let spec = IncludeSpec::new()
///     .include("Customer")
///     .then_include("Address")
///     .include("Lines");
/// // paths: "Customer", "Customer.Address", "Lines"
/// ```
#[derive(Debug, Clone, Default, PartialEq)]
pub struct IncludeSpec {
    paths: Vec<String>,
    current: Option<String>,
}

impl IncludeSpec {
    /// Create an empty include spec.
    pub fn new() -> Self {
        Self::default()
    }

    /// Start a new chain at the root entity.
    pub fn include(mut self, navigation: impl Into<String>) -> Self {
        let path = navigation.into();
        self.push(path.clone());
        self.current = Some(path);
        self
    }

    /// Extend the current chain by one navigation.
    ///
    /// Without a preceding `include` this behaves like `include`.
    pub fn then_include(mut self, navigation: impl Into<String>) -> Self {
        let navigation = navigation.into();
        let path = match self.current.take() {
            Some(parent) => format!("{}.{}", parent, navigation),
            None => navigation,
        };
        self.push(path.clone());
        self.current = Some(path);
        self
    }

    fn push(&mut self, path: String) {
        if !self.paths.contains(&path) {
            self.paths.push(path);
        }
    }

    /// The collected include paths, parents before children.
    pub fn paths(&self) -> &[String] {
        &self.paths
    }

    /// Convert into include requests.
    pub fn into_includes(self) -> Vec<RelationInclude> {
        self.paths.into_iter().map(RelationInclude::new).collect()
    }
}
