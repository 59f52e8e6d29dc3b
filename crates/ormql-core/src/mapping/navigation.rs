//! Navigation descriptors between mapped types.

use serde::Deserialize;

/// A many-to-one / one-to-one navigation backed by a foreign key on the
/// declaring (dependent) type.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct ForeignKey {
    /// Navigation property on the dependent type (e.g. `Order.Customer`).
    pub navigation: String,
    /// Scalar property on the dependent type holding the key value.
    pub foreign_key_property: String,
    /// Referenced entity type.
    pub principal_entity: String,
    /// Key property on the principal type.
    pub principal_key_property: String,
}

impl ForeignKey {
    /// Create a foreign key descriptor.
    pub fn new(
        navigation: impl Into<String>,
        foreign_key_property: impl Into<String>,
        principal_entity: impl Into<String>,
        principal_key_property: impl Into<String>,
    ) -> Self {
        Self {
            navigation: navigation.into(),
            foreign_key_property: foreign_key_property.into(),
            principal_entity: principal_entity.into(),
            principal_key_property: principal_key_property.into(),
        }
    }
}

/// Container used for a collection navigation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CollectionKind {
    /// Ordered, growable list.
    #[default]
    List,
    /// Set of distinct entities.
    Set,
}

/// A one-to-many navigation declared on the principal type.
///
/// The join condition comes from the related type's inverse [`ForeignKey`].
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct CollectionNavigation {
    /// Navigation property on the principal type (e.g. `Order.Lines`).
    pub navigation: String,
    /// Entity type of the collection elements.
    pub related_entity: String,
    /// Container kind.
    #[serde(default)]
    pub kind: CollectionKind,
}

impl CollectionNavigation {
    /// Declare a list navigation.
    pub fn list(navigation: impl Into<String>, related_entity: impl Into<String>) -> Self {
        Self {
            navigation: navigation.into(),
            related_entity: related_entity.into(),
            kind: CollectionKind::List,
        }
    }

    /// Declare a set navigation.
    pub fn set(navigation: impl Into<String>, related_entity: impl Into<String>) -> Self {
        Self {
            navigation: navigation.into(),
            related_entity: related_entity.into(),
            kind: CollectionKind::Set,
        }
    }
}

/// A navigation resolved by name on a mapping.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Navigation<'a> {
    Reference(&'a ForeignKey),
    Collection(&'a CollectionNavigation),
}

impl Navigation<'_> {
    /// Entity type on the other end.
    pub fn related_entity(&self) -> &str {
        match self {
            Navigation::Reference(fk) => &fk.principal_entity,
            Navigation::Collection(nav) => &nav.related_entity,
        }
    }

    pub fn is_collection(&self) -> bool {
        matches!(self, Navigation::Collection(_))
    }
}
