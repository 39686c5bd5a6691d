//! Validated queries.
//!
//! A [`Query`] only exists for text the database accepted. Building one
//! runs, in order:
//!
//! ```text
//! text ──► validate (parse + PREPARE/DEALLOCATE) ──► ValidatedText
//!                                                       │
//!           Plan::analyze  ◄────────────────────────────┤
//!           extract_table_names ──► TableResolver ◄─────┘
//!                                                       │
//!                                                       ▼
//!                                                     Query
//! ```

mod plan;
mod validate;

pub use plan::Plan;
pub use validate::validate;

use std::collections::BTreeMap;
use std::sync::Arc;

use tracing::debug;

use crate::db::Database;
use crate::metadata::{MetadataError, Table, TableResolver};
use crate::sql::extract_table_names;

/// Result type for query construction.
pub type QueryResult<T> = Result<T, QueryError>;

/// Errors that can occur while constructing a [`Query`].
#[derive(Debug, Clone, thiserror::Error)]
pub enum QueryError {
    /// The text failed to parse or the database rejected it.
    #[error("invalid query: {query}")]
    Invalid { query: String },

    /// Metadata for a referenced table could not be fetched.
    #[error(transparent)]
    Metadata(#[from] MetadataError),
}

/// Query text that passed [`validate`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidatedText {
    text: String,
}

impl ValidatedText {
    /// Validate `text` against `db`.
    pub async fn check(text: impl Into<String>, db: &dyn Database) -> QueryResult<Self> {
        let text = text.into();
        if validate(&text, db).await {
            Ok(Self { text })
        } else {
            Err(QueryError::Invalid { query: text })
        }
    }

    pub fn as_str(&self) -> &str {
        &self.text
    }
}

/// A SQL statement with its plan and referenced table metadata.
#[derive(Debug, Clone)]
pub struct Query {
    text: String,
    plan: Plan,
    tables: Vec<Arc<Table>>,
}

impl Query {
    /// Validate `text` and gather its plan and table metadata.
    pub async fn new(
        text: impl Into<String>,
        db: &dyn Database,
        resolver: &TableResolver,
    ) -> QueryResult<Self> {
        let validated = ValidatedText::check(text, db).await?;
        Self::analyze(validated, db, resolver).await
    }

    /// Gather plan and table metadata for already-validated text.
    pub async fn analyze(
        validated: ValidatedText,
        db: &dyn Database,
        resolver: &TableResolver,
    ) -> QueryResult<Self> {
        let text = validated.text;
        let plan = Plan::analyze(&text, db).await;
        let names = extract_table_names(&text);
        let tables = resolver.resolve_all(&names, db).await?;
        debug!(tables = tables.len(), plan_lines = plan.lines().len(), "query analyzed");

        Ok(Self { text, plan, tables })
    }

    pub fn text(&self) -> &str {
        &self.text
    }

    pub fn plan(&self) -> &Plan {
        &self.plan
    }

    pub fn tables(&self) -> &[Arc<Table>] {
        &self.tables
    }

    /// Table name -> index name -> definition.
    pub fn indexes_by_table(&self) -> BTreeMap<String, BTreeMap<String, String>> {
        self.tables
            .iter()
            .map(|t| (t.name.clone(), t.indexes.clone()))
            .collect()
    }

    /// Table name -> column name -> type.
    pub fn columns_by_table(&self) -> BTreeMap<String, BTreeMap<String, String>> {
        self.tables
            .iter()
            .map(|t| (t.name.clone(), t.columns.clone()))
            .collect()
    }
}
