//! Execution plan capture.

use serde::{Deserialize, Serialize};
use tracing::error;

use crate::db::Database;

/// Ordered lines of `EXPLAIN ANALYZE` output.
///
/// Empty when the database refused to produce a plan; that means
/// "unavailable", not "no plan".
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Plan {
    lines: Vec<String>,
}

impl Plan {
    pub fn new(lines: Vec<String>) -> Self {
        Self { lines }
    }

    /// Run the database's analyze-and-explain facility on `sql`.
    ///
    /// This executes the statement to gather real timings. Database errors
    /// are logged and produce an empty plan instead of failing.
    pub async fn analyze(sql: &str, db: &dyn Database) -> Self {
        match db.explain_analyze(sql).await {
            Ok(lines) => Self { lines },
            Err(err) => {
                error!(error = %err, "failed to execute query analysis");
                Self::default()
            }
        }
    }

    pub fn lines(&self) -> &[String] {
        &self.lines
    }

    pub fn is_available(&self) -> bool {
        !self.lines.is_empty()
    }
}
