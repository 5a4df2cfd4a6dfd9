// session-store-rs/src/log.rs
// Append-only, ordered record logs keyed by stream.
//
// Two backends sit behind the `AppendLog` trait:
// - `InMemoryLog`: process-lifetime storage, the default for the stores.
// - `NdjsonLog`: one `{"stream": .., "record": ..}` JSON object per line on
//   disk, for deployments that want session and memory history to survive
//   restarts.

use std::collections::HashMap;
use std::marker::PhantomData;
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use tokio::fs::{self, OpenOptions};
use tokio::io::AsyncWriteExt;
use tokio::sync::{Mutex, RwLock};

use crate::error::Result;

/// Ordered, append-only log partitioned into named streams.
///
/// Records within a stream are returned in append order. Streams are
/// listed in order of first append.
#[async_trait]
pub trait AppendLog<T>: Send + Sync
where
    T: Clone + Send + Sync + 'static,
{
    async fn append(&self, stream: &str, record: T) -> Result<()>;

    /// All records of `stream`; empty when the stream does not exist
    async fn read(&self, stream: &str) -> Result<Vec<T>>;

    async fn streams(&self) -> Result<Vec<String>>;
}

#[derive(Debug)]
struct Streams<T> {
    order: Vec<String>,
    records: HashMap<String, Vec<T>>,
}

impl<T> Default for Streams<T> {
    fn default() -> Self {
        Self {
            order: Vec::new(),
            records: HashMap::new(),
        }
    }
}

/// Process-lifetime log backed by a lock-guarded map
#[derive(Debug)]
pub struct InMemoryLog<T> {
    inner: RwLock<Streams<T>>,
}

impl<T> InMemoryLog<T> {
    pub fn new() -> Self {
        Self {
            inner: RwLock::new(Streams::default()),
        }
    }
}

impl<T> Default for InMemoryLog<T> {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl<T> AppendLog<T> for InMemoryLog<T>
where
    T: Clone + Send + Sync + 'static,
{
    async fn append(&self, stream: &str, record: T) -> Result<()> {
        let mut guard = self.inner.write().await;
        let Streams { order, records } = &mut *guard;
        records
            .entry(stream.to_string())
            .or_insert_with(|| {
                order.push(stream.to_string());
                Vec::new()
            })
            .push(record);
        Ok(())
    }

    async fn read(&self, stream: &str) -> Result<Vec<T>> {
        let guard = self.inner.read().await;
        Ok(guard.records.get(stream).cloned().unwrap_or_default())
    }

    async fn streams(&self) -> Result<Vec<String>> {
        Ok(self.inner.read().await.order.clone())
    }
}

#[derive(Serialize, Deserialize)]
struct LogLine<R> {
    stream: String,
    record: R,
}

/// Durable log: append-only NDJSON file, one record per line.
///
/// Appends are serialized through an internal mutex so concurrent writers
/// never interleave partial lines.
pub struct NdjsonLog<T> {
    path: PathBuf,
    write_lock: Mutex<()>,
    _record: PhantomData<fn() -> T>,
}

impl<T> NdjsonLog<T> {
    /// Create a log at `path`, creating its parent directory eagerly so
    /// startup fails fast on an unwritable location.
    pub fn open(path: impl Into<PathBuf>) -> Result<Self> {
        let path = path.into();
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }

        Ok(Self {
            path,
            write_lock: Mutex::new(()),
            _record: PhantomData,
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl<T> NdjsonLog<T>
where
    T: DeserializeOwned,
{
    async fn read_lines(&self) -> Result<Vec<LogLine<T>>> {
        if !fs::try_exists(&self.path).await? {
            return Ok(Vec::new());
        }

        let buf = fs::read_to_string(&self.path).await?;
        let mut out = Vec::new();
        for line in buf.lines() {
            if line.trim().is_empty() {
                continue;
            }
            match serde_json::from_str::<LogLine<T>>(line) {
                Ok(entry) => out.push(entry),
                Err(err) => {
                    tracing::warn!(error = %err, path = %self.path.display(), "failed to parse log line; skipping");
                }
            }
        }

        Ok(out)
    }
}

#[async_trait]
impl<T> AppendLog<T> for NdjsonLog<T>
where
    T: Clone + Serialize + DeserializeOwned + Send + Sync + 'static,
{
    async fn append(&self, stream: &str, record: T) -> Result<()> {
        let line = serde_json::to_string(&LogLine {
            stream: stream.to_string(),
            record,
        })?;

        let _guard = self.write_lock.lock().await;
        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)
            .await?;
        file.write_all(line.as_bytes()).await?;
        file.write_all(b"\n").await?;
        file.flush().await?;

        Ok(())
    }

    async fn read(&self, stream: &str) -> Result<Vec<T>> {
        Ok(self
            .read_lines()
            .await?
            .into_iter()
            .filter(|line| line.stream == stream)
            .map(|line| line.record)
            .collect())
    }

    async fn streams(&self) -> Result<Vec<String>> {
        let mut seen = Vec::new();
        for line in self.read_lines().await? {
            if !seen.contains(&line.stream) {
                seen.push(line.stream);
            }
        }
        Ok(seen)
    }
}
