//! Database port.
//!
//! The copilot never talks to a driver directly. Every round trip goes
//! through the [`Database`] trait, which exposes exactly the three
//! capabilities the analysis pipeline needs:
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────┐
//! │                          Database                               │
//! │  - fetch_pairs()      parameterized catalog SELECT (2 columns)  │
//! │  - prepare()          PREPARE + DEALLOCATE, nothing executed    │
//! │  - explain_analyze()  EXPLAIN ANALYZE, plan lines in order      │
//! └─────────────────────────────────────────────────────────────────┘
//!                           │
//!                           ▼
//! ┌─────────────────────────────────────────────────────────────────┐
//! │                 PgDatabase (sqlx connection pool)               │
//! └─────────────────────────────────────────────────────────────────┘
//! ```
//!
//! All driver failures collapse into a single [`DbError`] carrying the
//! underlying message.

mod postgres;

pub use postgres::PgDatabase;

use async_trait::async_trait;

/// Result type for database operations.
pub type DbResult<T> = Result<T, DbError>;

/// A database operation failed.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("database operation failed: {message}")]
pub struct DbError {
    /// Message reported by the driver or server.
    pub message: String,
}

impl DbError {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}

impl From<sqlx::Error> for DbError {
    fn from(err: sqlx::Error) -> Self {
        match err {
            sqlx::Error::Database(db) => Self::new(db.message()),
            other => Self::new(other.to_string()),
        }
    }
}

/// Handle to a live relational database.
///
/// Implementations must release every resource they acquire (connections,
/// transactions, prepared statements) on all exit paths, including errors.
#[async_trait]
pub trait Database: Send + Sync {
    /// Stable identity of the underlying connection target.
    ///
    /// Used together with the table name as the metadata cache key, so two
    /// databases that share a table name never share cached metadata.
    fn identity(&self) -> &str;

    /// Run a parameterized catalog query and return its first two columns
    /// as text, in row order.
    ///
    /// `sql` takes exactly one bind parameter (`$1`), the table name.
    async fn fetch_pairs(&self, sql: &str, table: &str) -> DbResult<Vec<(String, String)>>;

    /// Prepare `statement` and immediately deallocate it.
    ///
    /// Succeeds only when the server accepts the statement against the
    /// current schema. No rows are produced.
    async fn prepare(&self, statement: &str) -> DbResult<()>;

    /// Run the server's analyze-and-explain facility on `statement` and
    /// return each plan line verbatim.
    async fn explain_analyze(&self, statement: &str) -> DbResult<Vec<String>>;
}
