//! Parameters collected while compiling a predicate.

use ormql_proto::Value;

use crate::dialect::{helpers, SqlDialect};

/// One bound SQL parameter.
#[derive(Debug, Clone, PartialEq)]
pub struct SqlParameter {
    /// Logical name (`p0`, `p1`, ...), independent of dialect.
    pub name: String,
    /// Placeholder as it appears in the SQL text.
    pub placeholder: String,
    pub value: Value,
}

/// Ordered parameter bag.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ParameterBag {
    params: Vec<SqlParameter>,
}

impl ParameterBag {
    pub fn new() -> Self {
        Self::default()
    }

    /// Bind a value and return its placeholder.
    pub fn bind(&mut self, dialect: &dyn SqlDialect, value: Value) -> String {
        let index = self.params.len();
        let placeholder = dialect.parameter_placeholder(index);
        self.params.push(SqlParameter {
            name: helpers::parameter_name(index),
            placeholder: placeholder.clone(),
            value,
        });
        placeholder
    }

    pub fn len(&self) -> usize {
        self.params.len()
    }

    pub fn is_empty(&self) -> bool {
        self.params.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &SqlParameter> {
        self.params.iter()
    }

    /// Get a parameter by logical name.
    pub fn get(&self, name: &str) -> Option<&Value> {
        self.params
            .iter()
            .find(|p| p.name == name)
            .map(|p| &p.value)
    }

    /// Values in binding order.
    pub fn values(&self) -> Vec<Value> {
        self.params.iter().map(|p| p.value.clone()).collect()
    }

    pub fn into_vec(self) -> Vec<SqlParameter> {
        self.params
    }
}
