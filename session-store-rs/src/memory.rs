// session-store-rs/src/memory.rs
// Long-term per-user memory: append-only entries under (user_id, memory_key).

use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::Result;
use crate::log::{AppendLog, InMemoryLog};

const KEY_SEPARATOR: char = '/';

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MemoryEntry {
    pub timestamp: DateTime<Utc>,
    pub data: Value,
}

impl MemoryEntry {
    /// Deserialize `data` into a typed record
    pub fn decode<T: DeserializeOwned>(&self) -> Result<T> {
        Ok(serde_json::from_value(self.data.clone())?)
    }
}

/// Per-user memory store. No eviction and no deduplication.
pub struct MemoryStore {
    log: Arc<dyn AppendLog<MemoryEntry>>,
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

fn stream_key(user_id: &str, memory_key: &str) -> String {
    format!("{}{}{}", user_id, KEY_SEPARATOR, memory_key)
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::with_log(Arc::new(InMemoryLog::new()))
    }

    pub fn with_log(log: Arc<dyn AppendLog<MemoryEntry>>) -> Self {
        Self { log }
    }

    /// Append a timestamped entry and return it
    pub async fn create_memory(&self, user_id: &str, memory_key: &str, data: Value) -> Result<MemoryEntry> {
        let entry = MemoryEntry {
            timestamp: Utc::now(),
            data,
        };
        self.log.append(&stream_key(user_id, memory_key), entry.clone()).await?;
        tracing::debug!(user_id, memory_key, "memory entry created");
        Ok(entry)
    }

    /// Serialize `record` and store it as a memory entry
    pub async fn remember<T: Serialize>(&self, user_id: &str, memory_key: &str, record: &T) -> Result<MemoryEntry> {
        let data = serde_json::to_value(record)?;
        self.create_memory(user_id, memory_key, data).await
    }

    /// Entries for (user, key) in insertion order; empty when absent
    pub async fn query_memory(&self, user_id: &str, memory_key: &str) -> Result<Vec<MemoryEntry>> {
        self.log.read(&stream_key(user_id, memory_key)).await
    }

    /// Users with at least one memory entry, in order of first write
    pub async fn list_users(&self) -> Result<Vec<String>> {
        let mut users: Vec<String> = Vec::new();
        for stream in self.log.streams().await? {
            // memory keys never contain the separator; user ids might
            if let Some((user, _)) = stream.rsplit_once(KEY_SEPARATOR) {
                if !users.iter().any(|u| u == user) {
                    users.push(user.to_string());
                }
            }
        }
        Ok(users)
    }
}
