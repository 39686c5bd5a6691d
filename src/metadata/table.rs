//! Table entity and catalog queries.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use tracing::{debug, error};

use crate::db::{Database, DbResult};

/// Index name and definition for a table, from `pg_indexes`.
pub const INDEXES_SQL: &str = "\
SELECT indexname::text AS index_name, indexdef::text AS index_definition \
FROM pg_indexes \
WHERE tablename = $1";

/// Column name and declared type for a table, from `information_schema`.
pub const COLUMNS_SQL: &str = "\
SELECT column_name::text, data_type::text \
FROM information_schema.columns \
WHERE table_name = $1";

/// Metadata for one relation referenced by a query.
///
/// Fetched once per distinct name and treated as immutable while cached.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Table {
    /// Table name as referenced.
    pub name: String,
    /// Index name -> index definition.
    pub indexes: BTreeMap<String, String>,
    /// Column name -> declared type name.
    pub columns: BTreeMap<String, String>,
}

impl Table {
    /// Fetch indexes and columns for `name`.
    ///
    /// Two round trips; either failing fails the whole fetch.
    pub async fn fetch(name: &str, db: &dyn Database) -> DbResult<Self> {
        debug!(table = name, "fetching indexes");
        let indexes = db.fetch_pairs(INDEXES_SQL, name).await.map_err(|err| {
            error!(table = name, error = %err, "error fetching indexes");
            err
        })?;

        debug!(table = name, "fetching columns");
        let columns = db.fetch_pairs(COLUMNS_SQL, name).await.map_err(|err| {
            error!(table = name, error = %err, "error fetching columns");
            err
        })?;

        Ok(Self {
            name: name.to_string(),
            indexes: indexes.into_iter().collect(),
            columns: columns.into_iter().collect(),
        })
    }
}
