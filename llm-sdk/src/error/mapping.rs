//! Error mapping for backend APIs
//!
//! Converts non-success HTTP responses into the normalized [`ServiceError`].

use reqwest::StatusCode;
use serde_json::Value;

use super::{ErrorContext, ServiceError};

/// Map a Gemini API error body to a ServiceError.
///
/// Gemini errors look like `{"error": {"code": 400, "message": "...", "status": "INVALID_ARGUMENT"}}`.
pub fn map_gemini_error(status: StatusCode, json: &Value, context: &mut ErrorContext) -> ServiceError {
    context.service = "gemini".to_string();

    let error = json.get("error").unwrap_or(json);

    if let Some(code) = error.get("status").and_then(|s| s.as_str()) {
        context.error_code = Some(code.to_string());
    }

    let message = error
        .get("message")
        .and_then(|m| m.as_str())
        .unwrap_or("Unknown Gemini error");

    map_status(status, message)
}

/// Map a generic HTTP error to a ServiceError
pub fn map_http_error(status: StatusCode, body: &str, context: &mut ErrorContext) -> ServiceError {
    if let Ok(json) = serde_json::from_str::<Value>(body) {
        if context.service == "gemini" {
            return map_gemini_error(status, &json, context);
        }

        let message = json
            .get("message")
            .or_else(|| json.get("error"))
            .and_then(|m| m.as_str())
            .unwrap_or(body);
        return map_status(status, message);
    }

    // Fallback to status-based mapping
    let message = if body.is_empty() {
        status.to_string()
    } else if body.len() > 100 {
        format!("{}: {:.100}...", status, body)
    } else {
        format!("{}: {}", status, body)
    };

    map_status(status, message)
}

fn map_status(status: StatusCode, message: impl Into<String>) -> ServiceError {
    let message = message.into();
    match status {
        StatusCode::UNAUTHORIZED => ServiceError::authentication(message),
        StatusCode::FORBIDDEN => ServiceError::authorization(message),
        StatusCode::TOO_MANY_REQUESTS => ServiceError::rate_limit(message),
        StatusCode::BAD_REQUEST => ServiceError::validation(message),
        StatusCode::NOT_FOUND => ServiceError::not_found(message),
        StatusCode::REQUEST_TIMEOUT | StatusCode::GATEWAY_TIMEOUT => ServiceError::timeout(message),
        _ => ServiceError::service(message),
    }
}

/// Helper function to classify HTTP errors by category
pub fn classify_http_error(status: StatusCode) -> &'static str {
    match status.as_u16() {
        400 => "validation",
        401 => "authentication",
        403 => "authorization",
        404 => "not_found",
        408 => "timeout",
        429 => "rate_limit",
        500..=599 => "server",
        _ => "unknown",
    }
}
