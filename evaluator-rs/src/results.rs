// evaluator-rs/src/results.rs
// Append-only NDJSON sink for per-case evaluation results.

use std::path::{Path, PathBuf};

use serde::Serialize;
use tokio::fs::OpenOptions;
use tokio::io::AsyncWriteExt;
use tokio::sync::Mutex;

use crate::Result;

/// Writes one JSON object per line, flushing after every record so results
/// already written survive a crash later in the run.
#[derive(Debug)]
pub struct ResultsWriter {
    path: PathBuf,
    write_lock: Mutex<()>,
}

impl ResultsWriter {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            write_lock: Mutex::new(()),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Empty the file, creating it and its parent directory if needed
    pub async fn truncate(&self) -> Result<()> {
        let _guard = self.write_lock.lock().await;
        self.ensure_parent().await?;
        tokio::fs::File::create(&self.path).await?;
        Ok(())
    }

    pub async fn append<T: Serialize>(&self, record: &T) -> Result<()> {
        let mut line = serde_json::to_string(record)?;
        line.push('\n');

        let _guard = self.write_lock.lock().await;
        self.ensure_parent().await?;
        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)
            .await?;
        file.write_all(line.as_bytes()).await?;
        file.flush().await?;
        Ok(())
    }

    async fn ensure_parent(&self) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                tokio::fs::create_dir_all(parent).await?;
            }
        }
        Ok(())
    }
}
