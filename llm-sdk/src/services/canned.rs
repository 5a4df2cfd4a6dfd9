//! Deterministic, scripted backend
//!
//! Replies are taken from per-capability queues; once a queue is drained
//! the backend answers with neutral defaults (empty text, `{}` objects).
//! Used for offline evaluation runs and as a test double.

use std::collections::VecDeque;
use std::sync::{Mutex, MutexGuard, PoisonError};

use async_trait::async_trait;
use serde_json::{json, Value};

use crate::core::{GenerativeBackend, ImagePart, StructuredResponse};
use crate::error::Result;

/// A call observed by [`CannedBackend`]
#[derive(Debug, Clone, PartialEq)]
pub enum BackendCall {
    Text { prompt: String, temperature: f32 },
    Structured { prompt: String, schema: Value },
    Vision { prompt: String, text_input: String, images: Vec<ImagePart> },
}

#[derive(Debug, Default)]
pub struct CannedBackend {
    text: Mutex<VecDeque<Result<String>>>,
    structured: Mutex<VecDeque<Result<StructuredResponse>>>,
    vision: Mutex<VecDeque<Result<StructuredResponse>>>,
    calls: Mutex<Vec<BackendCall>>,
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

impl CannedBackend {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push_text(&self, reply: Result<String>) -> &Self {
        lock(&self.text).push_back(reply);
        self
    }

    pub fn push_structured(&self, reply: Result<StructuredResponse>) -> &Self {
        lock(&self.structured).push_back(reply);
        self
    }

    pub fn push_vision(&self, reply: Result<StructuredResponse>) -> &Self {
        lock(&self.vision).push_back(reply);
        self
    }

    /// Convenience for a parsed JSON structured reply
    pub fn push_structured_json(&self, value: Value) -> &Self {
        self.push_structured(Ok(StructuredResponse::Parsed { value }))
    }

    /// Convenience for a parsed JSON vision reply
    pub fn push_vision_json(&self, value: Value) -> &Self {
        self.push_vision(Ok(StructuredResponse::Parsed { value }))
    }

    /// Every call received so far, in order
    pub fn calls(&self) -> Vec<BackendCall> {
        lock(&self.calls).clone()
    }

    fn record(&self, call: BackendCall) {
        lock(&self.calls).push(call);
    }
}

#[async_trait]
impl GenerativeBackend for CannedBackend {
    fn name(&self) -> &str {
        "canned"
    }

    async fn generate_text(&self, prompt: &str, temperature: f32) -> Result<String> {
        self.record(BackendCall::Text {
            prompt: prompt.to_string(),
            temperature,
        });
        lock(&self.text).pop_front().unwrap_or_else(|| Ok(String::new()))
    }

    async fn generate_structured(&self, prompt: &str, schema: &Value) -> Result<StructuredResponse> {
        self.record(BackendCall::Structured {
            prompt: prompt.to_string(),
            schema: schema.clone(),
        });
        lock(&self.structured)
            .pop_front()
            .unwrap_or_else(|| Ok(StructuredResponse::Parsed { value: json!({}) }))
    }

    async fn generate_structured_vision(
        &self,
        prompt: &str,
        text_input: &str,
        images: &[ImagePart],
        _schema: &Value,
    ) -> Result<StructuredResponse> {
        self.record(BackendCall::Vision {
            prompt: prompt.to_string(),
            text_input: text_input.to_string(),
            images: images.to_vec(),
        });
        lock(&self.vision)
            .pop_front()
            .unwrap_or_else(|| Ok(StructuredResponse::Parsed { value: json!({}) }))
    }
}
