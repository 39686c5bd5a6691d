//! Query validation against a live database.

use tracing::{error, warn};

use crate::db::Database;
use crate::sql::parse_statements;

/// Whether `sql` parses and the database accepts it for preparation.
///
/// Text must parse to exactly one statement; anything else is rejected
/// without a database round trip. The statement is then prepared and
/// deallocated, never executed, so validity depends on the current schema
/// as well as the text.
pub async fn validate(sql: &str, db: &dyn Database) -> bool {
    match parse_statements(sql) {
        Ok(statements) if statements.len() == 1 => {}
        Ok(statements) => {
            warn!(count = statements.len(), "query must be exactly one statement");
            return false;
        }
        Err(err) => {
            warn!(error = %err, "failed to parse query");
            return false;
        }
    }

    match db.prepare(sql).await {
        Ok(()) => true,
        Err(err) => {
            error!(error = %err, "failed to prepare statement");
            false
        }
    }
}
