// civic-agents-rs/src/trace.rs
// Lightweight observability spans, written one JSON object per line.

use std::path::{Path, PathBuf};
use std::time::Instant;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tokio::fs::OpenOptions;
use tokio::io::AsyncWriteExt;
use tokio::sync::Mutex;
use uuid::Uuid;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SpanLog {
    pub at: DateTime<Utc>,
    pub fields: Value,
}

/// A named unit of pipeline work with structured log entries.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TraceSpan {
    pub span_id: String,
    pub name: String,
    pub started_at: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub finished_at: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub duration_ms: Option<f64>,
    pub logs: Vec<SpanLog>,
    #[serde(skip)]
    clock: Option<Instant>,
}

impl TraceSpan {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            span_id: Uuid::new_v4().to_string(),
            name: name.into(),
            started_at: Utc::now(),
            finished_at: None,
            duration_ms: None,
            logs: Vec::new(),
            clock: Some(Instant::now()),
        }
    }

    pub fn log(&mut self, fields: Value) {
        self.logs.push(SpanLog { at: Utc::now(), fields });
    }

    /// Stamp the end time; later calls keep the first stamp
    pub fn finish(&mut self) {
        if self.finished_at.is_some() {
            return;
        }
        self.finished_at = Some(Utc::now());
        self.duration_ms = self.clock.map(|c| c.elapsed().as_secs_f64() * 1000.0);
    }

    pub fn is_finished(&self) -> bool {
        self.finished_at.is_some()
    }
}

/// Destination for finished spans
#[async_trait]
pub trait SpanSink: Send + Sync {
    async fn write_span(&self, span: &TraceSpan) -> std::io::Result<()>;
}

/// Discards spans
#[derive(Debug, Default)]
pub struct NoopSpanSink;

#[async_trait]
impl SpanSink for NoopSpanSink {
    async fn write_span(&self, _span: &TraceSpan) -> std::io::Result<()> {
        Ok(())
    }
}

/// Appends spans to an NDJSON file
#[derive(Debug)]
pub struct NdjsonSpanWriter {
    path: PathBuf,
    write_lock: Mutex<()>,
}

impl NdjsonSpanWriter {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            write_lock: Mutex::new(()),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

#[async_trait]
impl SpanSink for NdjsonSpanWriter {
    async fn write_span(&self, span: &TraceSpan) -> std::io::Result<()> {
        let mut line = serde_json::to_string(span)?;
        line.push('\n');

        let _guard = self.write_lock.lock().await;
        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                tokio::fs::create_dir_all(parent).await?;
            }
        }
        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)
            .await?;
        file.write_all(line.as_bytes()).await?;
        file.flush().await
    }
}

/// Finish `span` and hand it to `sink`. Write failures are logged and
/// swallowed.
pub(crate) async fn emit(sink: &dyn SpanSink, mut span: TraceSpan) {
    span.finish();
    if let Err(err) = sink.write_span(&span).await {
        tracing::warn!(span = %span.name, error = %err, "failed to write trace span");
    }
}
