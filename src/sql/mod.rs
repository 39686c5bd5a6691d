//! SQL text inspection.
//!
//! - [`references`] - table references from the token stream
//! - [`parse_statements`] - syntactic check with sqlparser-rs
//!
//! Nothing here talks to a database.

pub mod references;

pub use references::extract_table_names;

use sqlparser::ast::Statement;
use sqlparser::dialect::PostgreSqlDialect;
use sqlparser::parser::{Parser, ParserError};

/// Parse `sql` as PostgreSQL and return its statements.
pub fn parse_statements(sql: &str) -> Result<Vec<Statement>, ParserError> {
    Parser::parse_sql(&PostgreSqlDialect {}, sql)
}
