//! Oracle dialect.
//!
//! Oracle stores the empty string as NULL, so `x.Name == ""` must compile to
//! `IS NULL` rather than an equality that can never match.

use super::helpers;
use super::SqlDialect;

/// Oracle dialect.
#[derive(Debug, Clone, Copy)]
pub struct Oracle;

impl SqlDialect for Oracle {
    fn name(&self) -> &'static str {
        "oracle"
    }

    fn quote_identifier(&self, ident: &str) -> String {
        helpers::quote_double(ident)
    }

    fn parameter_placeholder(&self, index: usize) -> String {
        helpers::placeholder_colon(index)
    }

    fn format_bool(&self, b: bool) -> &'static str {
        helpers::format_bool_numeric(b)
    }

    fn empty_string_is_null(&self) -> bool {
        true
    }
}
