//! Table metadata.
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────┐
//! │                        TableResolver                            │
//! │  resolve(name, db)                                              │
//! │    ├── hit  ──► TableCache (connection, table) -> Arc<Table>    │
//! │    └── miss ──► Table::fetch  (pg_indexes + information_schema) │
//! └─────────────────────────────────────────────────────────────────┘
//! ```
//!
//! # Example
//!
//! ```ignore
//! use precinct::metadata::TableResolver;
//!
//! let resolver = TableResolver::with_capacity(128);
//! let orders = resolver.resolve("orders", &db).await?;
//! println!("{:?}", orders.indexes);
//! ```

mod cache;
mod resolver;
mod table;

pub use cache::{CacheStats, TableCache, TableKey, DEFAULT_CAPACITY};
pub use resolver::TableResolver;
pub use table::{Table, COLUMNS_SQL, INDEXES_SQL};

use crate::db::DbError;

/// Fetching metadata for a table failed.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("failed to fetch metadata for table {table}: {source}")]
pub struct MetadataError {
    /// Table being resolved.
    pub table: String,
    /// Underlying database failure.
    #[source]
    pub source: DbError,
}
