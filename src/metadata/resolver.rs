//! Cache-aware table metadata resolution.

use std::collections::BTreeSet;
use std::sync::Arc;

use tracing::debug;

use super::{MetadataError, Table, TableCache, TableKey};
use crate::db::Database;

/// Resolves table names to [`Table`] metadata through a shared [`TableCache`].
///
/// A hit returns the cached value without touching the database. A miss
/// fetches indexes and columns, and only a complete fetch is cached.
#[derive(Clone)]
pub struct TableResolver {
    cache: Arc<TableCache>,
}

impl Default for TableResolver {
    fn default() -> Self {
        Self::new(Arc::new(TableCache::default()))
    }
}

impl TableResolver {
    pub fn new(cache: Arc<TableCache>) -> Self {
        Self { cache }
    }

    /// Create a resolver with its own cache of `capacity` entries.
    pub fn with_capacity(capacity: usize) -> Self {
        Self::new(Arc::new(TableCache::new(capacity)))
    }

    pub fn cache(&self) -> &Arc<TableCache> {
        &self.cache
    }

    /// Resolve one table.
    pub async fn resolve(&self, name: &str, db: &dyn Database) -> Result<Arc<Table>, MetadataError> {
        let key = TableKey::new(db.identity(), name);
        if let Some(table) = self.cache.get(&key) {
            debug!(%key, "table metadata cache hit");
            return Ok(table);
        }

        debug!(%key, "table metadata cache miss");
        let table = Table::fetch(name, db)
            .await
            .map(Arc::new)
            .map_err(|source| MetadataError {
                table: name.to_string(),
                source,
            })?;

        self.cache.insert(key, Arc::clone(&table));
        Ok(table)
    }

    /// Resolve every name in order, stopping at the first failure.
    pub async fn resolve_all(
        &self,
        names: &BTreeSet<String>,
        db: &dyn Database,
    ) -> Result<Vec<Arc<Table>>, MetadataError> {
        let mut tables = Vec::with_capacity(names.len());
        for name in names {
            tables.push(self.resolve(name, db).await?);
        }
        Ok(tables)
    }
}
