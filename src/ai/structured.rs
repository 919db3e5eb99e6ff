//! Structured (JSON) output on top of free-text generation.

use serde::de::DeserializeOwned;

use super::{GenerationError, GenerationRequest, TextGenerator};

/// Why a structured generation call produced no value.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum StructuredError {
    /// The provider call itself failed.
    #[error(transparent)]
    Generation(#[from] GenerationError),

    /// The model answered, but not with a value of the expected shape.
    #[error("Response did not match the expected structure: {0}")]
    Invalid(String),
}

/// Run a generation call and decode its JSON answer into `T`.
///
/// Models often wrap JSON in prose or code fences, so every JSON value in the
/// response is tried in order and the first one that decodes as `T` wins.
pub async fn generate_structured<T: DeserializeOwned>(
    generator: &dyn TextGenerator,
    request: &GenerationRequest,
) -> Result<T, StructuredError> {
    let text = generator.generate(request).await?;

    let mut first_error = None;
    for candidate in json_candidates(&text) {
        match serde_json::from_str(candidate) {
            Ok(value) => return Ok(value),
            Err(e) => {
                first_error.get_or_insert_with(|| e.to_string());
            }
        }
    }

    Err(StructuredError::Invalid(
        first_error.unwrap_or_else(|| "no JSON value in response".to_string()),
    ))
}

/// Every top-level JSON object or array embedded in `text`, in order.
///
/// Each `{` or `[` is tried as a start; brackets that do not begin a complete
/// value are skipped, and values nested inside an earlier match are not
/// reported again.
pub fn json_candidates(text: &str) -> impl Iterator<Item = &str> {
    let mut pos = 0;
    std::iter::from_fn(move || {
        while let Some(offset) = text[pos..].find(&['{', '['][..]) {
            let start = pos + offset;
            let rest = &text[start..];
            let mut values = serde_json::Deserializer::from_str(rest).into_iter::<serde_json::Value>();
            if let Some(Ok(_)) = values.next() {
                let end = start + values.byte_offset();
                pos = end;
                return Some(&text[start..end]);
            }
            pos = start + 1;
        }
        None
    })
}

/// The largest JSON object or array in `text`; the earliest one wins a tie.
pub fn extract_json(text: &str) -> Option<&str> {
    json_candidates(text).fold(None, |best: Option<&str>, candidate| match best {
        Some(b) if b.len() >= candidate.len() => Some(b),
        _ => Some(candidate),
    })
}
