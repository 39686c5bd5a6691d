//! System prompts for the two advisor calls.

use crate::config::PromptSettings;

/// Built-in system prompt for intent explanation.
pub const EXPLAIN_PROMPT: &str = "\
You are a PostgreSQL expert reviewing a query for a colleague.
The user message contains the query inside <query> tags and, optionally,
a correction of a previous reading inside <clarification> tags.
Respond with:
- structure: a short description of the query's shape (tables, joins,
  filters, grouping, ordering, subqueries).
- goal: one or two sentences stating what the query is trying to achieve.
When a clarification is present it overrides your own reading of the goal.";

/// Built-in system prompt for optimization.
pub const OPTIMIZE_PROMPT: &str = "\
You are a PostgreSQL performance expert.
The user message contains:
- <query>: the original query
- <goal>: what the query must achieve
- <indices>: index name to definition, per table
- <columns>: column name to type, per table
- <analyze>: EXPLAIN ANALYZE output, one line per entry (may be empty)
Rewrite the query so it returns the same result for the stated goal while
running faster on this schema. Only reference tables and columns that
exist. Respond with:
- query: the rewritten query as a single executable statement.
- explanation: what changed and why it should be faster.";

/// System prompts in effect for a run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Prompts {
    pub explain: String,
    pub optimize: String,
}

impl Default for Prompts {
    fn default() -> Self {
        Self {
            explain: EXPLAIN_PROMPT.to_string(),
            optimize: OPTIMIZE_PROMPT.to_string(),
        }
    }
}

impl Prompts {
    /// Built-in prompts with any configured overrides applied.
    pub fn from_settings(settings: &PromptSettings) -> Self {
        let defaults = Self::default();
        Self {
            explain: settings.explain.clone().unwrap_or(defaults.explain),
            optimize: settings.optimize.clone().unwrap_or(defaults.optimize),
        }
    }
}
