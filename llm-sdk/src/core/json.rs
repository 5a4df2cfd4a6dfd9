//! Helpers for pulling JSON out of model text

use serde_json::Value;

/// Parse the span between the first `{` and the last `}` as a JSON object.
///
/// Falls back to parsing the whole (trimmed) text when no braces are found.
/// Returns `None` when neither parses to an object.
pub fn extract_json_object(text: &str) -> Option<Value> {
    let candidate = match (text.find('{'), text.rfind('}')) {
        (Some(start), Some(end)) if start < end => &text[start..=end],
        _ => text.trim(),
    };

    match serde_json::from_str::<Value>(candidate) {
        Ok(value @ Value::Object(_)) => Some(value),
        _ => None,
    }
}
