//! API Gateway Input Validation
//!
//! Request validation and sanitization for the JSON endpoints: content type
//! enforcement, JSON parsing, per-route schema checks and string cleanup
//! before the body reaches a handler.

use axum::body::{to_bytes, Body};
use axum::http::header::{CONTENT_LENGTH, CONTENT_TYPE};
use axum::http::{HeaderMap, Method, Request, StatusCode};
use axum::middleware::Next;
use axum::response::Response;
use axum::Json;
use jsonschema::{Draft, JSONSchema};
use serde_json::{json, Value};

/// Maximum request payload size (1 MiB)
pub const MAX_PAYLOAD_SIZE: usize = 1024 * 1024;

fn compile(schema: Value) -> Result<JSONSchema, String> {
    JSONSchema::options()
        .with_draft(Draft::Draft7)
        .compile(&schema)
        .map_err(|e| e.to_string())
}

lazy_static::lazy_static! {
    /// Schema for `POST /create_ticket`
    static ref CREATE_TICKET_SCHEMA: Result<JSONSchema, String> = compile(json!({
        "type": "object",
        "required": ["user_id", "location", "description"],
        "properties": {
            "user_id": {"type": "string", "minLength": 1, "maxLength": 128},
            "location": {"type": "string", "minLength": 1, "maxLength": 512},
            "description": {"type": "string", "minLength": 1},
            "image_paths": {"type": "array", "items": {"type": "string"}},
            "session_id": {"type": ["string", "null"]}
        },
        "additionalProperties": false
    }));

    /// Schema for bodies that carry a ticket-like record
    static ref RECORD_SCHEMA: Result<JSONSchema, String> = compile(json!({
        "type": "object"
    }));
}

/// Error response for validation failures
#[derive(Debug, serde::Serialize)]
pub struct ValidationErrorResponse {
    pub error: String,
    pub code: u16,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<Vec<String>>,
}

/// Validation error for API requests
#[derive(Debug, thiserror::Error)]
pub enum ApiValidationError {
    #[error("Invalid request format: {0}")]
    InvalidFormat(String),

    #[error("Content type must be {0}")]
    ContentType(String),

    #[error("Request payload too large: {0}")]
    PayloadTooLarge(String),

    #[error("Schema validation error: {}", .0.join("; "))]
    Schema(Vec<String>),
}

impl ApiValidationError {
    /// Convert to HTTP status code and error response
    pub fn to_response(&self) -> (StatusCode, Json<ValidationErrorResponse>) {
        let status = match self {
            Self::InvalidFormat(_) | Self::Schema(_) => StatusCode::BAD_REQUEST,
            Self::ContentType(_) => StatusCode::UNSUPPORTED_MEDIA_TYPE,
            Self::PayloadTooLarge(_) => StatusCode::PAYLOAD_TOO_LARGE,
        };
        let details = match self {
            Self::Schema(errors) => Some(errors.clone()),
            _ => None,
        };

        (
            status,
            Json(ValidationErrorResponse {
                error: self.to_string(),
                code: status.as_u16(),
                details,
            }),
        )
    }
}

/// Validate the Content-Type header
pub fn validate_content_type(headers: &HeaderMap, expected: &str) -> Result<(), ApiValidationError> {
    let content_type = headers
        .get(CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .unwrap_or_default();

    if !content_type.starts_with(expected) {
        return Err(ApiValidationError::ContentType(format!(
            "'{}', got '{}'",
            expected, content_type
        )));
    }

    Ok(())
}

/// Validate a JSON payload against the schema registered for `path`.
///
/// Paths without a schema pass unchecked.
pub fn validate_json_schema(path: &str, json: &Value) -> Result<(), ApiValidationError> {
    let schema = match path {
        "/create_ticket" => &*CREATE_TICKET_SCHEMA,
        "/submit_form" | "/notify" => &*RECORD_SCHEMA,
        _ => return Ok(()),
    };
    let schema = schema
        .as_ref()
        .map_err(|e| ApiValidationError::Schema(vec![format!("schema for {} failed to compile: {}", path, e)]))?;

    if let Err(errors) = schema.validate(json) {
        let mut details: Vec<String> = errors
            .map(|err| {
                let at = err.instance_path.to_string();
                if at.is_empty() {
                    err.to_string()
                } else {
                    format!("{} at {}", err, at)
                }
            })
            .collect();
        if details.is_empty() {
            details.push("Schema validation failed".to_string());
        }
        return Err(ApiValidationError::Schema(details));
    }

    Ok(())
}

/// Parse a request body as JSON
pub fn parse_json_body(body: &[u8]) -> Result<Value, ApiValidationError> {
    let text = std::str::from_utf8(body)
        .map_err(|_| ApiValidationError::InvalidFormat("Request body is not valid UTF-8".to_string()))?;

    serde_json::from_str::<Value>(text.trim())
        .map_err(|e| ApiValidationError::InvalidFormat(format!("Invalid JSON: {}", e)))
}

/// Trim every string value and strip NUL characters, recursively
pub fn sanitize_json_object(value: &mut Value) {
    match value {
        Value::String(s) => {
            let cleaned = s.trim().replace('\u{0000}', "");
            if &cleaned != s {
                *s = cleaned;
            }
        }
        Value::Array(items) => items.iter_mut().for_each(sanitize_json_object),
        Value::Object(map) => map.values_mut().for_each(sanitize_json_object),
        _ => {}
    }
}

/// Middleware config for payload limits
pub fn payload_limit_config() -> tower_http::limit::RequestBodyLimitLayer {
    tower_http::limit::RequestBodyLimitLayer::new(MAX_PAYLOAD_SIZE)
}

/// Validate and sanitize JSON POST bodies before they reach a handler
pub async fn validate_request_middleware(
    req: Request<Body>,
    next: Next,
) -> Result<Response, (StatusCode, Json<ValidationErrorResponse>)> {
    if req.method() != Method::POST {
        return Ok(next.run(req).await);
    }

    let (mut parts, body) = req.into_parts();
    let path = parts.uri.path().to_string();

    validate_content_type(&parts.headers, "application/json").map_err(|e| e.to_response())?;

    let bytes = to_bytes(body, MAX_PAYLOAD_SIZE)
        .await
        .map_err(|e| ApiValidationError::PayloadTooLarge(e.to_string()).to_response())?;

    let mut json = parse_json_body(&bytes).map_err(|e| e.to_response())?;
    // length constraints apply to the trimmed values the handler will see
    sanitize_json_object(&mut json);
    validate_json_schema(&path, &json).map_err(|e| {
        tracing::debug!(path = %path, error = %e, "request rejected");
        e.to_response()
    })?;

    let sanitized = serde_json::to_vec(&json)
        .map_err(|e| ApiValidationError::InvalidFormat(e.to_string()).to_response())?;
    parts.headers.remove(CONTENT_LENGTH);

    Ok(next.run(Request::from_parts(parts, Body::from(sanitized))).await)
}
