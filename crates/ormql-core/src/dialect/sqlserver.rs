//! SQL Server dialect.
//!
//! - Square bracket identifier quoting (`[name]`)
//! - No boolean literal; bit columns compare against `1`/`0`
//! - Named `@p0` parameters

use super::helpers;
use super::SqlDialect;

/// SQL Server / Azure SQL dialect.
#[derive(Debug, Clone, Copy)]
pub struct SqlServer;

impl SqlDialect for SqlServer {
    fn name(&self) -> &'static str {
        "sqlserver"
    }

    fn quote_identifier(&self, ident: &str) -> String {
        helpers::quote_bracket(ident)
    }

    fn parameter_placeholder(&self, index: usize) -> String {
        helpers::placeholder_at(index)
    }

    fn format_bool(&self, b: bool) -> &'static str {
        helpers::format_bool_numeric(b)
    }
}
