//! In-memory table metadata cache.
//!
//! Entries are keyed by connection identity *and* table name, so two
//! databases that share a table name never see each other's metadata.
//!
//! # Design
//!
//! - `DashMap<TableKey, Arc<Table>>` for concurrent access without a global lock
//! - LRU eviction via a separate map of access ticks, so a hit never clones a `Table`
//! - Bounded by `capacity` (0 = unbounded). Concurrent inserts may overshoot
//!   briefly; each insert evicts until the cache is back within bounds
//! - Process lifetime only; nothing is persisted
//!
//! Two callers racing on the same missing key may both fetch and insert.
//! Both values come from the same catalog, so the later write is equal to
//! the earlier one.

use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use dashmap::DashMap;

use super::Table;

/// Default number of cached tables.
pub const DEFAULT_CAPACITY: usize = 128;

/// Cache key: which database, which table.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct TableKey {
    /// Connection identity, see [`crate::db::Database::identity`].
    pub connection: String,
    /// Table name.
    pub table: String,
}

impl TableKey {
    pub fn new(connection: impl Into<String>, table: impl Into<String>) -> Self {
        Self {
            connection: connection.into(),
            table: table.into(),
        }
    }
}

impl fmt::Display for TableKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.connection, self.table)
    }
}

/// Cache statistics.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct CacheStats {
    pub entries: usize,
    pub hits: u64,
    pub misses: u64,
}

/// Bounded LRU cache of [`Table`] metadata.
pub struct TableCache {
    entries: DashMap<TableKey, Arc<Table>>,
    /// Last access tick per key.
    access: DashMap<TableKey, AtomicU64>,
    /// Monotonic access clock.
    clock: AtomicU64,
    capacity: usize,
    hits: AtomicU64,
    misses: AtomicU64,
}

impl Default for TableCache {
    fn default() -> Self {
        Self::new(DEFAULT_CAPACITY)
    }
}

impl TableCache {
    /// Create a cache holding at most `capacity` tables (0 = unbounded).
    pub fn new(capacity: usize) -> Self {
        Self {
            entries: DashMap::new(),
            access: DashMap::new(),
            clock: AtomicU64::new(0),
            capacity,
            hits: AtomicU64::new(0),
            misses: AtomicU64::new(0),
        }
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    fn tick(&self) -> u64 {
        self.clock.fetch_add(1, Ordering::Relaxed)
    }

    /// Look up a table, marking it most recently used on a hit.
    pub fn get(&self, key: &TableKey) -> Option<Arc<Table>> {
        match self.entries.get(key) {
            Some(entry) => {
                self.hits.fetch_add(1, Ordering::Relaxed);
                if let Some(last) = self.access.get(key) {
                    last.store(self.tick(), Ordering::Relaxed);
                }
                Some(Arc::clone(entry.value()))
            }
            None => {
                self.misses.fetch_add(1, Ordering::Relaxed);
                None
            }
        }
    }

    /// Insert or replace a table, then evict least recently used entries
    /// until the cache is within capacity.
    pub fn insert(&self, key: TableKey, table: Arc<Table>) {
        // Entry first: eviction only considers keys with an access tick.
        self.entries.insert(key.clone(), table);
        self.access.insert(key.clone(), AtomicU64::new(self.tick()));

        if self.capacity == 0 {
            return;
        }
        while self.entries.len() > self.capacity {
            if !self.evict_lru(&key) {
                break;
            }
        }
    }

    /// Drop one entry.
    pub fn invalidate(&self, key: &TableKey) {
        self.entries.remove(key);
        self.access.remove(key);
    }

    /// Drop every entry for one connection.
    pub fn invalidate_connection(&self, connection: &str) {
        self.entries.retain(|key, _| key.connection != connection);
        self.access.retain(|key, _| key.connection != connection);
    }

    pub fn clear(&self) {
        self.entries.clear();
        self.access.clear();
    }

    pub fn stats(&self) -> CacheStats {
        CacheStats {
            entries: self.entries.len(),
            hits: self.hits.load(Ordering::Relaxed),
            misses: self.misses.load(Ordering::Relaxed),
        }
    }

    /// O(n) scan for the oldest tick other than `keep`; only runs when the
    /// cache is over capacity. Returns `false` when there is nothing to evict.
    fn evict_lru(&self, keep: &TableKey) -> bool {
        let oldest = self
            .access
            .iter()
            .filter(|entry| entry.key() != keep)
            .min_by_key(|entry| entry.value().load(Ordering::Relaxed))
            .map(|entry| entry.key().clone());

        match oldest {
            Some(key) => {
                tracing::debug!(%key, "evicting table metadata");
                self.invalidate(&key);
                true
            }
            None => false,
        }
    }
}
