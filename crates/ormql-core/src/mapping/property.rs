//! Column mappings for scalar properties.

use serde::Deserialize;

/// Mapping of one scalar property to a column.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct PropertyMapping {
    /// Property name as used in predicates and materialized entities.
    pub name: String,
    /// Column name. Defaults to the property name.
    #[serde(default)]
    pub column: String,
    /// Value produced by the database (identity, computed).
    #[serde(default)]
    pub is_generated: bool,
    /// Never written back.
    #[serde(default)]
    pub is_read_only: bool,
    /// Non-nullable at the application level.
    #[serde(default)]
    pub is_required: bool,
    /// Maximum length for string/binary columns.
    #[serde(default)]
    pub max_length: Option<usize>,
    /// Sequence feeding a generated key.
    #[serde(default)]
    pub sequence_name: Option<String>,
}

impl PropertyMapping {
    /// Map a property to a column of the same name.
    pub fn new(name: impl Into<String>) -> Self {
        let name = name.into();
        Self {
            column: name.clone(),
            name,
            is_generated: false,
            is_read_only: false,
            is_required: false,
            max_length: None,
            sequence_name: None,
        }
    }

    /// Set the column name.
    pub fn with_column(mut self, column: impl Into<String>) -> Self {
        self.column = column.into();
        self
    }

    /// Mark as database-generated.
    pub fn generated(mut self) -> Self {
        self.is_generated = true;
        self
    }

    /// Mark as read-only.
    pub fn read_only(mut self) -> Self {
        self.is_read_only = true;
        self
    }

    /// Mark as required.
    pub fn required(mut self) -> Self {
        self.is_required = true;
        self
    }

    /// Set the maximum length.
    pub fn with_max_length(mut self, max_length: usize) -> Self {
        self.max_length = Some(max_length);
        self
    }

    /// Set the key sequence; implies generated.
    pub fn with_sequence(mut self, sequence: impl Into<String>) -> Self {
        self.sequence_name = Some(sequence.into());
        self.is_generated = true;
        self
    }
}
