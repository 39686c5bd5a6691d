//! Structured completion.
//!
//! The copilot asks an external model for two things, a stated intent and
//! an optimized rewrite, and both answers must arrive in a declared shape.
//!
//! ```text
//! ┌──────────────────────┐   CompletionRequest    ┌──────────────────────┐
//! │  IntentExplainer     │  model + messages +    │   CompletionClient   │
//! │  QueryOptimizer      │ ─────────────────────► │   (OpenAiClient)     │
//! └──────────────────────┘  response_format       └──────────────────────┘
//!            ▲                                               │
//!            │   ResponseShape::decode (deny unknown,        │ serde_json::Value
//!            └────────────── require every field) ◄──────────┘
//! ```
//!
//! Nothing is coerced: a response that does not match the declared shape
//! is an [`LlmError::ShapeMismatch`].

mod openai;
pub mod prompts;
mod shape;

pub use openai::OpenAiClient;
pub use prompts::Prompts;
pub use shape::{complete_structured, ResponseShape};

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Result type for completion calls.
pub type LlmResult<T> = Result<T, LlmError>;

/// Errors from the structured completion boundary.
#[derive(Error, Debug)]
pub enum LlmError {
    /// No API key was configured.
    #[error("missing API key: set {0}")]
    MissingApiKey(String),

    /// The HTTP request failed (connect, timeout, body read).
    #[error("completion request failed: {0}")]
    Http(#[from] reqwest::Error),

    /// The API answered with a non-success status.
    #[error("completion API error: {message} (status: {status})")]
    Api { status: u16, message: String },

    /// The model declined to answer.
    #[error("model refused: {0}")]
    Refused(String),

    /// The response had no message content.
    #[error("completion response contained no content")]
    EmptyResponse,

    /// The message content was not JSON.
    #[error("completion content is not JSON: {0}")]
    MalformedContent(#[source] serde_json::Error),

    /// The JSON did not match the declared response shape.
    #[error("response does not match shape {shape}: {source}")]
    ShapeMismatch {
        shape: &'static str,
        #[source]
        source: serde_json::Error,
    },
}

/// Message author role.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    System,
    User,
    Assistant,
}

/// One role-tagged message.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Message {
    pub role: Role,
    pub content: String,
}

impl Message {
    pub fn system(content: impl Into<String>) -> Self {
        Self {
            role: Role::System,
            content: content.into(),
        }
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: Role::User,
            content: content.into(),
        }
    }
}

/// Declared result shape for one call.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ResponseFormat {
    /// Shape name, e.g. `explain_query`.
    pub name: &'static str,
    /// JSON Schema the answer must satisfy.
    pub schema: serde_json::Value,
}

/// A structured completion request.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CompletionRequest {
    /// Model identifier.
    pub model: String,
    /// Ordered conversation.
    pub messages: Vec<Message>,
    /// Expected result shape.
    pub response_format: ResponseFormat,
}

/// A structured-completion capability.
///
/// Implementations return the model's answer as raw JSON; decoding and
/// shape checking happen in [`complete_structured`]. Timeouts belong here,
/// at the collaborator boundary.
#[async_trait]
pub trait CompletionClient: Send + Sync {
    async fn complete(&self, request: &CompletionRequest) -> LlmResult<serde_json::Value>;
}
