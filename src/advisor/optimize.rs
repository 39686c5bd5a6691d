use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use serde_json::json;
use tracing::{debug, error};

use super::Intent;
use crate::llm::{complete_structured, CompletionClient, LlmResult, Message, ResponseShape};
use crate::query::Query;

/// Payload for one optimization call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OptimizeRequest<'a> {
    pub query: &'a str,
    pub goal: &'a str,
    /// Table -> index name -> definition.
    pub indices: BTreeMap<String, BTreeMap<String, String>>,
    /// Table -> column name -> type.
    pub columns: BTreeMap<String, BTreeMap<String, String>>,
    /// Plan lines; empty when no plan was available.
    pub analyze: &'a [String],
}

impl<'a> OptimizeRequest<'a> {
    pub fn new(query: &'a Query, intent: &'a Intent) -> Self {
        Self {
            query: query.text(),
            goal: &intent.goal,
            indices: query.indexes_by_table(),
            columns: query.columns_by_table(),
            analyze: query.plan().lines(),
        }
    }
}

fn to_json<T: Serialize>(value: &T) -> String {
    serde_json::to_string(value).unwrap_or_default()
}

impl fmt::Display for OptimizeRequest<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "<query>{}</query>\n<goal>{}</goal>\n<indices>{}</indices>\n<columns>{}</columns>\n<analyze>{}</analyze>",
            self.query,
            self.goal,
            to_json(&self.indices),
            to_json(&self.columns),
            to_json(&self.analyze),
        )
    }
}

/// A candidate rewrite. Not final until the candidate passes validation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Suggestion {
    /// Candidate query text.
    pub query: String,
    /// Why the candidate should be faster.
    pub explanation: String,
}

impl ResponseShape for Suggestion {
    const NAME: &'static str = "optimize_query";

    fn schema() -> serde_json::Value {
        json!({
            "type": "object",
            "properties": {
                "query": {
                    "type": "string",
                    "description": "The optimized query"
                },
                "explanation": {
                    "type": "string",
                    "description": "What changed and why it is faster"
                }
            },
            "required": ["query", "explanation"],
            "additionalProperties": false
        })
    }
}

/// Proposes a rewrite for an analyzed query.
#[derive(Clone)]
pub struct QueryOptimizer {
    client: Arc<dyn CompletionClient>,
    model: String,
    system_prompt: String,
}

impl QueryOptimizer {
    pub fn new(client: Arc<dyn CompletionClient>, model: impl Into<String>, system_prompt: impl Into<String>) -> Self {
        Self {
            client,
            model: model.into(),
            system_prompt: system_prompt.into(),
        }
    }

    pub async fn optimize(&self, query: &Query, intent: &Intent) -> LlmResult<Suggestion> {
        let request = OptimizeRequest::new(query, intent);
        debug!(
            tables = request.indices.len(),
            plan_lines = request.analyze.len(),
            "requesting optimization"
        );

        let messages = vec![
            Message::system(self.system_prompt.as_str()),
            Message::user(request.to_string()),
        ];
        complete_structured::<Suggestion>(self.client.as_ref(), &self.model, messages)
            .await
            .map_err(|err| {
                error!(error = %err, "failed to get optimized query");
                err
            })
    }
}
