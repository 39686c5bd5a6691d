//! Declared response shapes.

use serde::de::DeserializeOwned;
use tracing::{debug, error};

use super::{CompletionClient, CompletionRequest, LlmError, LlmResult, Message, ResponseFormat};

/// A typed answer the model must produce.
///
/// Implementors should be `#[serde(deny_unknown_fields)]` with no defaulted
/// fields, so [`decode`](ResponseShape::decode) rejects anything that is not
/// exactly the declared shape.
pub trait ResponseShape: DeserializeOwned {
    /// Name sent to the model alongside the schema.
    const NAME: &'static str;

    /// JSON Schema describing the shape.
    fn schema() -> serde_json::Value;

    /// Declared format for a request.
    fn format() -> ResponseFormat {
        ResponseFormat {
            name: Self::NAME,
            schema: Self::schema(),
        }
    }

    /// Decode a raw answer.
    fn decode(value: serde_json::Value) -> LlmResult<Self> {
        serde_json::from_value(value).map_err(|source| LlmError::ShapeMismatch {
            shape: Self::NAME,
            source,
        })
    }
}

/// Send one request declaring `T` as the result shape and decode the answer.
pub async fn complete_structured<T: ResponseShape>(
    client: &dyn CompletionClient,
    model: &str,
    messages: Vec<Message>,
) -> LlmResult<T> {
    let request = CompletionRequest {
        model: model.to_string(),
        messages,
        response_format: T::format(),
    };

    debug!(shape = T::NAME, model, "requesting structured completion");
    let value = client.complete(&request).await?;
    T::decode(value).map_err(|err| {
        error!(shape = T::NAME, error = %err, "completion did not match declared shape");
        err
    })
}
