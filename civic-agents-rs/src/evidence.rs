// civic-agents-rs/src/evidence.rs
// Vision-backed evidence analysis over the complaint text and photos.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use base64::engine::general_purpose::STANDARD;
use base64::Engine as _;
use llm_sdk::{GenerativeBackend, ImagePart, StructuredResponse};
use serde_json::{json, Value};
use tracing::instrument;

use crate::model::{EvidenceAssessment, EvidenceOutcome};
use crate::trace::{self, NoopSpanSink, SpanSink, TraceSpan};
use crate::{PipelineError, Result};

const EVIDENCE_PROMPT: &str = "You are an expert civic infrastructure inspector.\n\
Analyze the user's textual description and the provided images.\n\n\
Your job:\n\
1. Identify the visible or implied civic issue.\n\
2. Assess severity: low, medium, or high.\n\
3. Evaluate evidence quality (good, moderate, poor).\n\
4. Produce a short text summary.\n\n\
Return ONLY JSON following the exact schema provided.";

const BUNDLED_SCHEMA: &str = include_str!("../schemas/evidence_schema.json");

/// JSON schema handed to the vision backend, loaded once at startup
#[derive(Debug, Clone, PartialEq)]
pub struct EvidenceSchema(Value);

impl EvidenceSchema {
    /// Load from a JSON file; a missing or malformed file is a schema error
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let raw = std::fs::read_to_string(path)
            .map_err(|e| PipelineError::Schema(format!("cannot read {}: {}", path.display(), e)))?;
        Self::parse(&raw).map_err(|e| match e {
            PipelineError::Schema(msg) => PipelineError::Schema(format!("{}: {}", path.display(), msg)),
            other => other,
        })
    }

    /// `EVIDENCE_SCHEMA_PATH` when set, else the schema shipped with this crate
    pub fn from_env() -> Result<Self> {
        let path = std::env::var("EVIDENCE_SCHEMA_PATH")
            .map(PathBuf::from)
            .unwrap_or_else(|_| Self::default_path());
        Self::load(path)
    }

    pub fn default_path() -> PathBuf {
        Path::new(env!("CARGO_MANIFEST_DIR")).join("schemas").join("evidence_schema.json")
    }

    /// The schema compiled into the binary
    pub fn bundled() -> Result<Self> {
        Self::parse(BUNDLED_SCHEMA)
    }

    fn parse(raw: &str) -> Result<Self> {
        let value: Value =
            serde_json::from_str(raw).map_err(|e| PipelineError::Schema(format!("invalid JSON: {}", e)))?;
        if !value.is_object() {
            return Err(PipelineError::Schema("schema must be a JSON object".to_string()));
        }
        Ok(Self(value))
    }

    pub fn as_value(&self) -> &Value {
        &self.0
    }
}

/// MIME type guessed from the file extension, defaulting to `image/jpeg`
pub fn mime_type_for(path: &Path) -> &'static str {
    let ext = path
        .extension()
        .and_then(|e| e.to_str())
        .map(|e| e.to_ascii_lowercase());

    match ext.as_deref() {
        Some("png") => "image/png",
        Some("gif") => "image/gif",
        Some("webp") => "image/webp",
        Some("bmp") => "image/bmp",
        Some("tif") | Some("tiff") => "image/tiff",
        Some("heic") => "image/heic",
        Some("heif") => "image/heif",
        Some("svg") => "image/svg+xml",
        _ => "image/jpeg",
    }
}

/// Read an image file into a base64 inline part
pub async fn load_image(path: &str) -> Result<ImagePart> {
    let bytes = tokio::fs::read(path).await.map_err(|source| PipelineError::ImageRead {
        path: path.to_string(),
        source,
    })?;

    Ok(ImagePart {
        mime_type: mime_type_for(Path::new(path)).to_string(),
        data: STANDARD.encode(bytes),
    })
}

pub struct EvidenceAnalyzer {
    backend: Arc<dyn GenerativeBackend>,
    schema: EvidenceSchema,
    spans: Arc<dyn SpanSink>,
}

impl EvidenceAnalyzer {
    pub fn new(backend: Arc<dyn GenerativeBackend>, schema: EvidenceSchema) -> Self {
        Self {
            backend,
            schema,
            spans: Arc::new(NoopSpanSink),
        }
    }

    pub fn with_span_sink(mut self, spans: Arc<dyn SpanSink>) -> Self {
        self.spans = spans;
        self
    }

    /// Assess the complaint and its images with one vision call.
    ///
    /// Unreadable images and backend failures are errors; output that is
    /// not a JSON object degrades to [`EvidenceOutcome::Unparsed`].
    #[instrument(skip(self, issue_description, image_paths), fields(images = image_paths.len()))]
    pub async fn analyze_evidence(&self, issue_description: &str, image_paths: &[String]) -> Result<EvidenceOutcome> {
        let mut span = TraceSpan::new("evidence.analyze");

        let mut images = Vec::with_capacity(image_paths.len());
        for path in image_paths {
            images.push(load_image(path).await?);
        }

        let response = self
            .backend
            .generate_structured_vision(EVIDENCE_PROMPT, issue_description, &images, self.schema.as_value())
            .await?;

        let outcome = match response {
            StructuredResponse::Parsed { value } if value.is_object() => {
                EvidenceOutcome::Assessed(EvidenceAssessment::from_value(&value))
            }
            StructuredResponse::Parsed { value } => EvidenceOutcome::Unparsed {
                error: llm_sdk::core::PARSE_FAILURE.to_string(),
                raw: value.to_string(),
            },
            StructuredResponse::Unparsed { error, raw } => EvidenceOutcome::Unparsed { error, raw },
        };

        if let EvidenceOutcome::Unparsed { .. } = outcome {
            tracing::warn!("evidence backend returned unparseable output");
        }

        span.log(json!({"action": "vision_evidence", "output": &outcome}));
        trace::emit(self.spans.as_ref(), span).await;

        Ok(outcome)
    }
}
