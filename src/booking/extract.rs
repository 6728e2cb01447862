//! Pull the JSON object out of free-form model output.
//!
//! Models wrap their answer in prose or code fences. The span from the first
//! `{` to the last `}` is taken as the candidate object; anything else is a
//! contract violation by the completer.

use serde_json::{Map, Value};
use tracing::{debug, warn};

use super::ExtractionResult;

/// Why model output could not be turned into an extraction.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ExtractError {
    /// No `{` ... `}` span in the output.
    #[error("no JSON object in model output")]
    NoJsonObject,
    /// The brace-delimited span is not a valid JSON object.
    #[error("invalid JSON in model output: {0}")]
    InvalidJson(String),
}

/// Locate and decode the JSON object embedded in `text`.
///
/// # Errors
///
/// Returns [`ExtractError::NoJsonObject`] when there is no brace pair and
/// [`ExtractError::InvalidJson`] when the span does not decode to an object.
pub fn extract_json_object(text: &str) -> Result<Map<String, Value>, ExtractError> {
    let start = text.find('{').ok_or(ExtractError::NoJsonObject)?;
    let end = text.rfind('}').ok_or(ExtractError::NoJsonObject)?;
    if end < start {
        return Err(ExtractError::NoJsonObject);
    }

    let candidate = text.get(start..=end).ok_or(ExtractError::NoJsonObject)?;
    serde_json::from_str::<Map<String, Value>>(candidate).map_err(|e| {
        warn!(
            error = %e,
            text_preview = %preview(text),
            "failed to parse extraction JSON"
        );
        ExtractError::InvalidJson(e.to_string())
    })
}

/// Decode model output straight into an [`ExtractionResult`].
///
/// # Errors
///
/// Propagates [`extract_json_object`] failures.
pub fn parse_extraction(text: &str) -> Result<ExtractionResult, ExtractError> {
    let map = extract_json_object(text)?;
    debug!(keys = map.len(), "decoded extraction object");
    Ok(ExtractionResult::from_map(&map))
}

fn preview(text: &str) -> String {
    text.chars().take(200).collect()
}
