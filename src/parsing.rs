//! Untrusted JSON coming back from the language model.

use log::warn;
use serde::de::DeserializeOwned;

/// Narrows raw model output down to the JSON document it contains.
///
/// Handles Markdown code fences and prose before or after the document.
pub fn extract_json_block(raw: &str) -> &str {
    let mut body = raw.trim();

    if let Some(fenced) = body.strip_prefix("```") {
        // drop the info string (```json)
        let fenced = fenced.split_once('\n').map_or("", |(_, rest)| rest);
        body = fenced.rsplit_once("```").map_or(fenced, |(inner, _)| inner).trim();
    }

    let start = body.find(['{', '[']);
    let end = body.rfind(['}', ']']);
    match (start, end) {
        (Some(start), Some(end)) if start < end => &body[start..=end],
        _ => body,
    }
}

/// The contents of a Markdown code fence wrapping `text`, or `text` itself
/// when it is not fenced. An unclosed fence yields what arrived so far.
pub fn strip_code_fence(text: &str) -> &str {
    let body = text.trim();
    let Some(fenced) = body.strip_prefix("```") else {
        return body;
    };
    let inner = fenced.split_once('\n').map_or("", |(_, rest)| rest);
    inner.rsplit_once("```").map_or(inner, |(code, _)| code).trim()
}

/// Deserializes `raw` as `T`, or returns `fallback()` when it is not valid.
pub fn parse_or_default<T, F>(raw: &str, fallback: F) -> T
where
    T: DeserializeOwned,
    F: FnOnce() -> T,
{
    match serde_json::from_str::<T>(extract_json_block(raw)) {
        Ok(value) => value,
        Err(e) => {
            warn!(
                "Model returned unusable JSON for {} ({e}), using fallback",
                std::any::type_name::<T>()
            );
            fallback()
        }
    }
}
