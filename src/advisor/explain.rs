use std::fmt;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use serde_json::json;
use tracing::{debug, error};

use crate::llm::{complete_structured, CompletionClient, LlmResult, Message, ResponseShape};

/// Payload for one explanation call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ExplainRequest<'a> {
    pub query: &'a str,
    pub clarification: Option<&'a str>,
}

impl fmt::Display for ExplainRequest<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "<query>{}</query>", self.query)?;
        match self.clarification {
            Some(text) if !text.is_empty() => write!(f, "\n<clarification>{}</clarification>", text),
            _ => Ok(()),
        }
    }
}

/// The model's reading of a query.
///
/// Never cached: every clarification produces a fresh one.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Intent {
    /// Structural summary.
    pub structure: String,
    /// What the query is trying to accomplish.
    pub goal: String,
}

impl ResponseShape for Intent {
    const NAME: &'static str = "explain_query";

    fn schema() -> serde_json::Value {
        json!({
            "type": "object",
            "properties": {
                "structure": {
                    "type": "string",
                    "description": "Short description of the query's structure"
                },
                "goal": {
                    "type": "string",
                    "description": "What the query is trying to achieve"
                }
            },
            "required": ["structure", "goal"],
            "additionalProperties": false
        })
    }
}

/// States what a query is for.
#[derive(Clone)]
pub struct IntentExplainer {
    client: Arc<dyn CompletionClient>,
    model: String,
    system_prompt: String,
}

impl IntentExplainer {
    pub fn new(client: Arc<dyn CompletionClient>, model: impl Into<String>, system_prompt: impl Into<String>) -> Self {
        Self {
            client,
            model: model.into(),
            system_prompt: system_prompt.into(),
        }
    }

    /// One completion call; failures are returned, never retried here.
    pub async fn explain(&self, query: &str, clarification: Option<&str>) -> LlmResult<Intent> {
        let request = ExplainRequest { query, clarification };
        debug!(clarified = clarification.is_some(), "explaining query");

        let messages = vec![
            Message::system(self.system_prompt.as_str()),
            Message::user(request.to_string()),
        ];
        complete_structured::<Intent>(self.client.as_ref(), &self.model, messages)
            .await
            .map_err(|err| {
                error!(error = %err, "failed to get query summary");
                err
            })
    }
}
