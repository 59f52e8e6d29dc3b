//! Shared helper functions for SQL dialect implementations.
//!
//! This module provides reusable building blocks that dialects can compose
//! to implement the `SqlDialect` trait with minimal duplication.

// =============================================================================
// Identifier Quoting
// =============================================================================

/// Quote identifier with double quotes (ANSI style).
/// Used by: PostgreSQL, SQLite, Oracle
pub fn quote_double(ident: &str) -> String {
    format!("\"{}\"", ident.replace('"', "\"\""))
}

/// Quote identifier with backticks.
/// Used by: MySQL
pub fn quote_backtick(ident: &str) -> String {
    format!("`{}`", ident.replace('`', "``"))
}

/// Quote identifier with square brackets.
/// Used by: SQL Server
pub fn quote_bracket(ident: &str) -> String {
    format!("[{}]", ident.replace(']', "]]"))
}

// =============================================================================
// Boolean Formatting
// =============================================================================

/// Format boolean as literal true/false.
/// Used by: PostgreSQL
pub fn format_bool_literal(b: bool) -> &'static str {
    if b {
        "true"
    } else {
        "false"
    }
}

/// Format boolean as numeric 1/0.
/// Used by: SQL Server, MySQL, SQLite, Oracle
pub fn format_bool_numeric(b: bool) -> &'static str {
    if b {
        "1"
    } else {
        "0"
    }
}

// =============================================================================
// Parameter Placeholders
// =============================================================================

/// Name of the zero-based parameter at `index` (`p0`, `p1`, ...).
pub fn parameter_name(index: usize) -> String {
    format!("p{}", index)
}

/// `@p0` style named placeholder.
/// Used by: SQL Server, SQLite
pub fn placeholder_at(index: usize) -> String {
    format!("@{}", parameter_name(index))
}

/// `:p0` style named placeholder.
/// Used by: Oracle
pub fn placeholder_colon(index: usize) -> String {
    format!(":{}", parameter_name(index))
}

/// `$1` style one-based positional placeholder.
/// Used by: PostgreSQL
pub fn placeholder_dollar(index: usize) -> String {
    format!("${}", index + 1)
}

/// `?` anonymous positional placeholder.
/// Used by: MySQL
pub fn placeholder_question(_index: usize) -> String {
    "?".to_string()
}
