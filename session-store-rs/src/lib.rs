// session-store-rs/src/lib.rs
// Session and memory storage for the civic ticket pipeline.
//
// Both stores are built on the `AppendLog` abstraction: in-memory by
// default, with an NDJSON file backend available for durability.

pub mod error;
pub mod locks;
pub mod log;
pub mod memory;
pub mod session;

pub use error::{Result, StoreError};
pub use locks::{KeyedGuard, KeyedLocks};
pub use log::{AppendLog, InMemoryLog, NdjsonLog};
pub use memory::{MemoryEntry, MemoryStore};
pub use session::{Event, Session, SessionInfo, SessionStore};
