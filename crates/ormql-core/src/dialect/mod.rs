//! SQL dialect definitions.
//!
//! Each dialect implements [`SqlDialect`] to handle the syntax differences the
//! predicate compiler and include planner care about:
//!
//! - Identifier quoting: `[x]` (SQL Server), `"x"` (PostgreSQL/SQLite/Oracle), `` `x` `` (MySQL)
//! - Parameter placeholders: `@p0`, `$1`, `?`, `:p0`
//! - Boolean literals: `true`/`false` vs `1`/`0`
//! - Whether the empty string is stored as NULL (Oracle)
//!
//! ```ignore
//! use ormql_core::dialect::{Dialect, SqlDialect};
//!
//! let dialect = Dialect::SqlServer;
//! assert_eq!(dialect.quote_identifier("Name"), "[Name]");
//! assert_eq!(dialect.parameter_placeholder(0), "@p0");
//! ```

pub mod helpers;
mod mysql;
mod oracle;
mod postgres;
mod sqlite;
mod sqlserver;

pub use mysql::MySql;
pub use oracle::Oracle;
pub use postgres::Postgres;
pub use sqlite::Sqlite;
pub use sqlserver::SqlServer;

use serde::Deserialize;

/// SQL dialect trait - defines how identifiers, parameters and literals are
/// rendered.
///
/// The default implementations follow ANSI SQL where possible.
pub trait SqlDialect: std::fmt::Debug + Send + Sync {
    /// Dialect name for display/logging.
    fn name(&self) -> &'static str;

    /// Quote an identifier (table, column, alias).
    fn quote_identifier(&self, ident: &str) -> String;

    /// Quote a possibly schema-qualified table name.
    fn qualify_table(&self, schema: Option<&str>, table: &str) -> String {
        match schema {
            Some(schema) => format!(
                "{}.{}",
                self.quote_identifier(schema),
                self.quote_identifier(table)
            ),
            None => self.quote_identifier(table),
        }
    }

    /// Placeholder text for the zero-based parameter at `index`.
    fn parameter_placeholder(&self, index: usize) -> String;

    /// Format a boolean literal.
    ///
    /// - PostgreSQL: `true`/`false`
    /// - Everyone else: `1`/`0`
    fn format_bool(&self, b: bool) -> &'static str;

    /// Whether the database stores `''` as NULL.
    fn empty_string_is_null(&self) -> bool {
        false
    }

    /// Function used to fold case for case-insensitive comparisons.
    fn case_fold_function(&self) -> &'static str {
        "LOWER"
    }

    /// Whether string comparisons are case-insensitive unless told otherwise.
    fn default_ignore_case(&self) -> bool {
        false
    }

    /// Escape clause appended to LIKE patterns; the escape character is `\`.
    fn like_escape_clause(&self) -> &'static str {
        "ESCAPE '\\'"
    }
}

/// Supported SQL dialects.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Dialect {
    #[default]
    SqlServer,
    Postgres,
    MySql,
    Sqlite,
    Oracle,
}

impl Dialect {
    /// Get the dialect implementation.
    pub fn dialect(&self) -> &'static dyn SqlDialect {
        match self {
            Dialect::SqlServer => &SqlServer,
            Dialect::Postgres => &Postgres,
            Dialect::MySql => &MySql,
            Dialect::Sqlite => &Sqlite,
            Dialect::Oracle => &Oracle,
        }
    }
}

// Implement SqlDialect for Dialect enum by delegating to concrete types
impl SqlDialect for Dialect {
    fn name(&self) -> &'static str {
        self.dialect().name()
    }

    fn quote_identifier(&self, ident: &str) -> String {
        self.dialect().quote_identifier(ident)
    }

    fn qualify_table(&self, schema: Option<&str>, table: &str) -> String {
        self.dialect().qualify_table(schema, table)
    }

    fn parameter_placeholder(&self, index: usize) -> String {
        self.dialect().parameter_placeholder(index)
    }

    fn format_bool(&self, b: bool) -> &'static str {
        self.dialect().format_bool(b)
    }

    fn empty_string_is_null(&self) -> bool {
        self.dialect().empty_string_is_null()
    }

    fn case_fold_function(&self) -> &'static str {
        self.dialect().case_fold_function()
    }

    fn default_ignore_case(&self) -> bool {
        self.dialect().default_ignore_case()
    }

    fn like_escape_clause(&self) -> &'static str {
        self.dialect().like_escape_clause()
    }
}
