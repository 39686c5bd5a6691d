//! Workflow failures.

use thiserror::Error;

use crate::db::DbError;
use crate::llm::LlmError;
use crate::query::QueryError;

/// Result type for workflow operations.
pub type WorkflowResult<T> = Result<T, WorkflowError>;

/// Terminal and per-attempt workflow failures.
///
/// Cancellation is not here: an operator abort ends the run with
/// [`Outcome::Cancelled`](super::Outcome::Cancelled).
#[derive(Error, Debug)]
pub enum WorkflowError {
    /// The text failed to parse or the database rejected it.
    #[error("invalid query: {query}")]
    InvalidQuery { query: String },

    /// Catalog lookup for a referenced table failed.
    #[error("failed to fetch metadata for table '{table}': {source}")]
    MetadataFetchFailed {
        table: String,
        #[source]
        source: DbError,
    },

    /// The explanation call failed or returned the wrong shape.
    #[error("failed to explain query: {source}")]
    ExplanationFailed {
        query: String,
        #[source]
        source: LlmError,
    },

    /// One optimization call failed or returned the wrong shape.
    #[error("failed to optimize query: {source}")]
    OptimizationFailed {
        query: String,
        #[source]
        source: LlmError,
    },

    /// Every optimization attempt failed.
    #[error("unable to optimize query after {attempts} attempts: {last}")]
    UnableToOptimize {
        query: String,
        attempts: u32,
        #[source]
        last: Box<WorkflowError>,
    },
}

impl WorkflowError {
    /// Model failures are presumed transient. Validation and metadata
    /// failures reflect the query against the schema and repeat unless the
    /// input changes.
    pub fn is_retriable(&self) -> bool {
        matches!(
            self,
            WorkflowError::ExplanationFailed { .. } | WorkflowError::OptimizationFailed { .. }
        )
    }

    /// The query text the failure is about.
    pub fn query(&self) -> Option<&str> {
        match self {
            WorkflowError::InvalidQuery { query }
            | WorkflowError::ExplanationFailed { query, .. }
            | WorkflowError::OptimizationFailed { query, .. }
            | WorkflowError::UnableToOptimize { query, .. } => Some(query),
            WorkflowError::MetadataFetchFailed { .. } => None,
        }
    }
}

impl From<QueryError> for WorkflowError {
    fn from(err: QueryError) -> Self {
        match err {
            QueryError::Invalid { query } => WorkflowError::InvalidQuery { query },
            QueryError::Metadata(err) => WorkflowError::MetadataFetchFailed {
                table: err.table,
                source: err.source,
            },
        }
    }
}
