//! Disk-backed response cache with lazy expiry.
//!
//! The storage backend persists whole JSON payloads keyed by the
//! caller-supplied cache key. Expiry is checked lazily on read against
//! an injected clock; stale or unreadable entries degrade to a cache
//! miss, never to a fatal fault.

mod storage;
mod store;

pub use storage::{CacheStorage, NoopStorage, SqliteStorage, StoredEntry};
pub use store::CacheStore;
