//! Best-effort recovery of a JSON object embedded in free-form model output.
//!
//! Models wrap JSON in prose, markdown fences, or apologies. The payload is
//! taken to be everything from the first `{` to the last `}`; anything the
//! scan cannot turn into a document is reported as an [`ExtractionError`]
//! rather than guessed at.

use serde::de::DeserializeOwned;
use serde_json::Value;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ExtractionError {
    #[error("no JSON object found in response")]
    NoObject,

    #[error("invalid JSON in response: {0}")]
    InvalidJson(#[source] serde_json::Error),

    #[error("unexpected JSON structure: {0}")]
    Schema(#[source] serde_json::Error),
}

/// Slice between the first `{` and the last `}` (inclusive), if any.
pub fn json_span(text: &str) -> Option<&str> {
    let start = text.find('{')?;
    let end = text.rfind('}')?;
    (end > start).then(|| &text[start..=end])
}

/// Extract the embedded JSON object as an untyped value.
pub fn extract_json(text: &str) -> Result<Value, ExtractionError> {
    let span = json_span(text).ok_or(ExtractionError::NoObject)?;
    serde_json::from_str(span).map_err(ExtractionError::InvalidJson)
}

/// Extract the embedded JSON object and deserialize it into `T`.
///
/// Syntax errors and shape errors are reported separately so callers can
/// tell a garbled reply from one that ignored the requested schema.
pub fn extract_as<T: DeserializeOwned>(text: &str) -> Result<T, ExtractionError> {
    let value = extract_json(text)?;
    serde_json::from_value(value).map_err(ExtractionError::Schema)
}
