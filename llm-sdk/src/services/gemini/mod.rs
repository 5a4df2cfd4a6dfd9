//! Gemini API client implementation
//!
//! A typed client for the Gemini `generateContent` REST endpoint, exposed to
//! the rest of the workspace through [`GenerativeBackend`].

mod models;
pub use models::*;

use std::time::{Duration, Instant};

use async_trait::async_trait;
use log::{debug, info, warn};
use reqwest::Client;
use serde_json::Value;

use crate::config::{GeminiConfig, ServiceConfig, DEFAULT_GEMINI_BASE_URL, DEFAULT_GEMINI_MODEL};
use crate::core::{GenerativeBackend, ImagePart, StructuredResponse};
use crate::error::mapping::classify_http_error;
use crate::error::{Result, ServiceError};
use crate::services::common::{build_http_client, parse_error_response, UserAgent};

const SERVICE_NAME: &str = "gemini";

/// Gemini API client
pub struct GeminiClient {
    http_client: Client,
    config: GeminiConfig,
}

impl std::fmt::Debug for GeminiClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GeminiClient")
            .field("base_url", &self.config.base_url)
            .field("model", &self.config.model)
            .finish()
    }
}

impl GeminiClient {
    /// Create a client from a validated configuration
    pub fn new_with_config(config: GeminiConfig) -> Result<Self> {
        config.validate()?;

        let http_client = build_http_client(
            Some(UserAgent {
                extra: Some("Gemini-Client".to_string()),
                ..UserAgent::default()
            }),
            Some(Duration::from_secs(config.timeout_seconds)),
        )?;

        Ok(Self { http_client, config })
    }

    /// Create a client from `GEMINI_*` environment variables
    pub fn from_env() -> Result<Self> {
        Self::new_with_config(GeminiConfig::from_env()?)
    }

    pub fn builder() -> GeminiClientBuilder {
        GeminiClientBuilder::default()
    }

    pub fn config(&self) -> &GeminiConfig {
        &self.config
    }

    /// Send a raw `generateContent` request
    pub async fn generate_content(&self, request: &GenerateContentRequest) -> Result<GenerateContentResponse> {
        let endpoint = format!("models/{}:generateContent", self.config.model);
        let url = format!("{}/{}", self.config.base_url, endpoint);
        debug!("Sending request to Gemini: POST {}", url);

        let start_time = Instant::now();
        let response = self
            .http_client
            .post(&url)
            .header("x-goog-api-key", &self.config.api_key)
            .json(request)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let error = parse_error_response(SERVICE_NAME, &endpoint, response).await;
            warn!(
                "[gemini] model={} {} failure ({}): {}",
                self.config.model,
                status.as_u16(),
                classify_http_error(status),
                error
            );
            return Err(error);
        }

        let body = response
            .json::<GenerateContentResponse>()
            .await
            .map_err(|e| ServiceError::parsing(format!("Failed to parse response: {}", e)))?;

        info!(
            "[gemini] model={} duration={:.2}s",
            self.config.model,
            start_time.elapsed().as_secs_f64()
        );

        Ok(body)
    }
}

#[async_trait]
impl GenerativeBackend for GeminiClient {
    fn name(&self) -> &str {
        SERVICE_NAME
    }

    async fn generate_text(&self, prompt: &str, temperature: f32) -> Result<String> {
        let request = GenerateContentRequest::user(
            vec![Part::text(prompt)],
            GenerationConfig {
                temperature: Some(temperature),
                response_mime_type: None,
            },
        );

        let response = self.generate_content(&request).await?;
        Ok(response.text())
    }

    async fn generate_structured_vision(
        &self,
        prompt: &str,
        text_input: &str,
        images: &[ImagePart],
        schema: &Value,
    ) -> Result<StructuredResponse> {
        let mut parts = vec![
            Part::text(prompt),
            Part::text(text_input),
            Part::text(format!("SCHEMA: {}", schema)),
        ];
        parts.extend(images.iter().map(Part::from));

        let request = GenerateContentRequest::user(
            parts,
            GenerationConfig {
                temperature: None,
                response_mime_type: Some("application/json".to_string()),
            },
        );

        let response = self.generate_content(&request).await?;
        let structured = StructuredResponse::from_json_text(&response.text());
        if !structured.is_parsed() {
            warn!("[gemini] vision output was not valid JSON; returning raw text");
        }
        Ok(structured)
    }
}

/// Builder for [`GeminiClient`]
#[derive(Debug, Default)]
pub struct GeminiClientBuilder {
    api_key: Option<String>,
    base_url: Option<String>,
    model: Option<String>,
    timeout_seconds: Option<u64>,
}

impl GeminiClientBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn api_key(mut self, api_key: impl Into<String>) -> Self {
        self.api_key = Some(api_key.into());
        self
    }

    pub fn base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = Some(base_url.into());
        self
    }

    pub fn model(mut self, model: impl Into<String>) -> Self {
        self.model = Some(model.into());
        self
    }

    /// Set the timeout in seconds
    pub fn timeout(mut self, seconds: u64) -> Self {
        self.timeout_seconds = Some(seconds);
        self
    }

    pub fn build(self) -> Result<GeminiClient> {
        let api_key = self
            .api_key
            .ok_or_else(|| ServiceError::configuration("Gemini API key is required"))?;

        let config = GeminiConfig {
            api_key,
            base_url: self
                .base_url
                .unwrap_or_else(|| DEFAULT_GEMINI_BASE_URL.to_string())
                .trim_end_matches('/')
                .to_string(),
            model: self.model.unwrap_or_else(|| DEFAULT_GEMINI_MODEL.to_string()),
            timeout_seconds: self.timeout_seconds.unwrap_or(60),
        };

        GeminiClient::new_with_config(config)
    }
}
