// session-store-rs/src/session.rs
// Conversation sessions: one per ticket flow, holding an ordered event log.
//
// Session metadata and events go to separate `AppendLog`s. A store opened
// over durable logs replays the metadata, so sessions survive a restart.

use std::collections::HashMap;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::sync::RwLock;
use uuid::Uuid;

use crate::error::{Result, StoreError};
use crate::log::{AppendLog, InMemoryLog};

/// Stream of the registry log that holds session metadata
pub const SESSIONS_STREAM: &str = "sessions";

/// A timestamped pipeline event.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Event<E> {
    pub timestamp: DateTime<Utc>,
    pub event: E,
}

/// Session metadata plus its events in append order.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Session<E> {
    pub id: String,
    pub user_id: String,
    pub created_at: DateTime<Utc>,
    pub events: Vec<Event<E>>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionInfo {
    pub id: String,
    pub user_id: String,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Default)]
struct Registry {
    sessions: HashMap<String, SessionInfo>,
    order: Vec<String>,
}

impl Registry {
    fn insert(&mut self, info: SessionInfo) {
        if !self.sessions.contains_key(&info.id) {
            self.order.push(info.id.clone());
        }
        self.sessions.insert(info.id.clone(), info);
    }
}

/// Keyed session registry over an [`AppendLog`] of events.
///
/// Internally synchronized; share it behind an `Arc`.
pub struct SessionStore<E>
where
    E: Clone + Send + Sync + 'static,
{
    registry: RwLock<Registry>,
    registry_log: Arc<dyn AppendLog<SessionInfo>>,
    events: Arc<dyn AppendLog<Event<E>>>,
}

impl<E> Default for SessionStore<E>
where
    E: Clone + Send + Sync + 'static,
{
    fn default() -> Self {
        Self::new()
    }
}

impl<E> SessionStore<E>
where
    E: Clone + Send + Sync + 'static,
{
    /// Volatile store: sessions live for the lifetime of the process
    pub fn new() -> Self {
        Self {
            registry: RwLock::new(Registry::default()),
            registry_log: Arc::new(InMemoryLog::new()),
            events: Arc::new(InMemoryLog::new()),
        }
    }

    /// Store over the given backends, replaying sessions already recorded
    /// in `registry_log`.
    pub async fn open(
        registry_log: Arc<dyn AppendLog<SessionInfo>>,
        events: Arc<dyn AppendLog<Event<E>>>,
    ) -> Result<Self> {
        let mut registry = Registry::default();
        for info in registry_log.read(SESSIONS_STREAM).await? {
            registry.insert(info);
        }
        tracing::debug!(sessions = registry.order.len(), "session registry loaded");

        Ok(Self {
            registry: RwLock::new(registry),
            registry_log,
            events,
        })
    }

    /// Register a new empty session for `user_id` and return its id
    pub async fn new_session(&self, user_id: &str) -> Result<String> {
        let info = SessionInfo {
            id: Uuid::new_v4().to_string(),
            user_id: user_id.to_string(),
            created_at: Utc::now(),
        };
        let id = info.id.clone();

        self.registry_log.append(SESSIONS_STREAM, info.clone()).await?;
        self.registry.write().await.insert(info);
        tracing::debug!(session_id = %id, user_id, "session created");

        Ok(id)
    }

    pub async fn exists(&self, session_id: &str) -> bool {
        self.registry.read().await.sessions.contains_key(session_id)
    }

    /// Append `event` stamped with the current time.
    ///
    /// Fails with [`StoreError::SessionNotFound`] for unknown ids.
    pub async fn append_event(&self, session_id: &str, event: E) -> Result<()> {
        if !self.exists(session_id).await {
            return Err(StoreError::SessionNotFound(session_id.to_string()));
        }

        self.events
            .append(
                session_id,
                Event {
                    timestamp: Utc::now(),
                    event,
                },
            )
            .await
    }

    pub async fn get_session(&self, session_id: &str) -> Result<Option<Session<E>>> {
        let info = match self.registry.read().await.sessions.get(session_id) {
            Some(info) => info.clone(),
            None => return Ok(None),
        };

        let events = self.events.read(session_id).await?;
        Ok(Some(Session {
            id: info.id,
            user_id: info.user_id,
            created_at: info.created_at,
            events,
        }))
    }

    /// Events of a session; empty for unknown ids
    pub async fn events(&self, session_id: &str) -> Result<Vec<Event<E>>> {
        self.events.read(session_id).await
    }

    /// Session ids in creation order
    pub async fn list_sessions(&self) -> Vec<String> {
        self.registry.read().await.order.clone()
    }
}
