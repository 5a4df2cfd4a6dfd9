//! Core abstractions for the LLM SDK
//!
//! - `GenerativeBackend`: text, structured and vision-structured generation
//! - `ImagePart`: an inline image handed to a vision call
//! - `StructuredResponse`: parsed JSON, or the raw text when parsing failed

pub mod json;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::Result;

/// Error string recorded when a structured response is not valid JSON
pub const PARSE_FAILURE: &str = "Failed to parse JSON output";

/// Base64-encoded image data with its MIME type
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ImagePart {
    pub mime_type: String,
    /// Standard base64 (with padding)
    pub data: String,
}

/// Outcome of a structured generation call.
///
/// Malformed model output is never an error; it degrades to `Unparsed`
/// so callers can fall back to deterministic values.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum StructuredResponse {
    Parsed { value: Value },
    Unparsed { error: String, raw: String },
}

impl StructuredResponse {
    /// Build from raw model text by parsing the outermost `{...}` block
    pub fn from_model_text(text: &str) -> Self {
        match json::extract_json_object(text) {
            Some(value) => StructuredResponse::Parsed { value },
            None => StructuredResponse::unparsed(text),
        }
    }

    /// Build from model text that should be a JSON document as a whole
    pub fn from_json_text(text: &str) -> Self {
        match serde_json::from_str::<Value>(text.trim()) {
            Ok(value) => StructuredResponse::Parsed { value },
            Err(_) => StructuredResponse::unparsed(text),
        }
    }

    pub fn unparsed(raw: impl Into<String>) -> Self {
        StructuredResponse::Unparsed {
            error: PARSE_FAILURE.to_string(),
            raw: raw.into(),
        }
    }

    pub fn value(&self) -> Option<&Value> {
        match self {
            StructuredResponse::Parsed { value } => Some(value),
            StructuredResponse::Unparsed { .. } => None,
        }
    }

    pub fn into_value(self) -> Option<Value> {
        match self {
            StructuredResponse::Parsed { value } => Some(value),
            StructuredResponse::Unparsed { .. } => None,
        }
    }

    pub fn is_parsed(&self) -> bool {
        matches!(self, StructuredResponse::Parsed { .. })
    }
}

/// Capability object for a generative text/vision model.
///
/// Implementations are injected into agents; nothing in this crate holds a
/// process-wide client instance. Calls are made at most once: there is no
/// retry layer.
#[async_trait]
pub trait GenerativeBackend: Send + Sync {
    /// Backend name for logs and error context
    fn name(&self) -> &str;

    /// Free-form text completion
    async fn generate_text(&self, prompt: &str, temperature: f32) -> Result<String>;

    /// JSON completion constrained by `schema`.
    ///
    /// The default wraps the prompt with a JSON-only instruction, calls
    /// [`generate_text`](Self::generate_text) at temperature 0, and extracts
    /// the outermost JSON object from the reply.
    async fn generate_structured(&self, prompt: &str, schema: &Value) -> Result<StructuredResponse> {
        let wrapped = structured_prompt(prompt, schema);
        let text = self.generate_text(&wrapped, 0.0).await?;
        let response = StructuredResponse::from_model_text(&text);
        if !response.is_parsed() {
            log::warn!("[{}] structured output was not valid JSON; returning raw text", self.name());
        }
        Ok(response)
    }

    /// Multimodal JSON completion over a prompt, user text and inline images
    async fn generate_structured_vision(
        &self,
        prompt: &str,
        text_input: &str,
        images: &[ImagePart],
        schema: &Value,
    ) -> Result<StructuredResponse>;
}

/// Wrap a prompt with the JSON-only instruction and the target schema
pub fn structured_prompt(prompt: &str, schema: &Value) -> String {
    format!(
        "Return ONLY valid JSON (no commentary). If unable, return {{}}.\nSCHEMA: {}\n\nCONTENT:\n{}",
        schema, prompt
    )
}
