//! MySQL dialect.
//!
//! MySQL treats backslash as an escape character inside string literals, so
//! the LIKE escape clause has to double it.

use super::helpers;
use super::SqlDialect;

/// MySQL / MariaDB dialect.
#[derive(Debug, Clone, Copy)]
pub struct MySql;

impl SqlDialect for MySql {
    fn name(&self) -> &'static str {
        "mysql"
    }

    fn quote_identifier(&self, ident: &str) -> String {
        helpers::quote_backtick(ident)
    }

    fn parameter_placeholder(&self, index: usize) -> String {
        helpers::placeholder_question(index)
    }

    fn format_bool(&self, b: bool) -> &'static str {
        helpers::format_bool_numeric(b)
    }

    fn like_escape_clause(&self) -> &'static str {
        "ESCAPE '\\\\'"
    }
}
