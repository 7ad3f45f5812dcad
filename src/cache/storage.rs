//! Cache storage trait and SQLite implementation.

use chrono::{DateTime, TimeZone, Utc};
use rusqlite::{params, Connection, OptionalExtension};
use serde_json::Value;
use sha2::{Digest, Sha256};
use std::path::Path;
use std::sync::Mutex;

use crate::error::{Error, Result};

/// A raw cache row: payload plus its write timestamp. Expiry is the
/// caller's concern; storage only records when the write happened.
#[derive(Debug, Clone)]
pub struct StoredEntry {
  pub payload: Value,
  pub stored_at: DateTime<Utc>,
}

/// Trait for cache storage backends.
pub trait CacheStorage: Send + Sync {
  /// Fetch the entry for `key`, if one exists and is readable.
  fn get(&self, key: &str) -> Result<Option<StoredEntry>>;

  /// Persist `payload` under `key`, overwriting any prior value.
  fn set(&self, key: &str, payload: &Value, stored_at: DateTime<Utc>) -> Result<()>;

  /// Remove the entry for `key` if present.
  fn clear(&self, key: &str) -> Result<()>;
}

/// Storage implementation that doesn't cache anything.
/// Used when caching is disabled - all operations are no-ops.
pub struct NoopStorage;

impl CacheStorage for NoopStorage {
  fn get(&self, _key: &str) -> Result<Option<StoredEntry>> {
    Ok(None) // Always miss
  }

  fn set(&self, _key: &str, _payload: &Value, _stored_at: DateTime<Utc>) -> Result<()> {
    Ok(()) // Discard
  }

  fn clear(&self, _key: &str) -> Result<()> {
    Ok(())
  }
}

/// SQLite-based cache storage implementation.
pub struct SqliteStorage {
  conn: Mutex<Connection>,
}

impl SqliteStorage {
  /// Open (or create) the cache database at `path`.
  pub fn open(path: &Path) -> Result<Self> {
    // Ensure parent directory exists
    if let Some(parent) = path.parent() {
      std::fs::create_dir_all(parent)
        .map_err(|e| Error::Cache(format!("failed to create cache directory: {}", e)))?;
    }

    let conn = Connection::open(path).map_err(|e| {
      Error::Cache(format!(
        "failed to open cache database at {}: {}",
        path.display(),
        e
      ))
    })?;

    let storage = Self {
      conn: Mutex::new(conn),
    };
    storage.run_migrations()?;

    Ok(storage)
  }

  fn run_migrations(&self) -> Result<()> {
    let conn = self.conn.lock().unwrap_or_else(|p| p.into_inner());

    conn
      .execute_batch(CACHE_SCHEMA)
      .map_err(|e| Error::Cache(format!("failed to run cache migrations: {}", e)))?;

    Ok(())
  }
}

/// Schema for the response cache table.
const CACHE_SCHEMA: &str = r#"
-- Whole-response cache (serialized JSON payloads)
CREATE TABLE IF NOT EXISTS response_cache (
    key_hash TEXT PRIMARY KEY,
    cache_key TEXT NOT NULL,
    payload BLOB NOT NULL,
    stored_at INTEGER NOT NULL
);
"#;

impl CacheStorage for SqliteStorage {
  fn get(&self, key: &str) -> Result<Option<StoredEntry>> {
    let conn = self.conn.lock().unwrap_or_else(|p| p.into_inner());

    let mut stmt = conn
      .prepare("SELECT payload, stored_at FROM response_cache WHERE key_hash = ?")
      .map_err(|e| Error::Cache(format!("failed to prepare query: {}", e)))?;

    let row: Option<(Vec<u8>, i64)> = stmt
      .query_row(params![key_hash(key)], |row| Ok((row.get(0)?, row.get(1)?)))
      .optional()
      .map_err(|e| Error::Cache(format!("failed to read cache entry: {}", e)))?;

    let (data, stored_at_ms) = match row {
      Some(row) => row,
      None => return Ok(None),
    };

    // Unreadable rows degrade to a miss instead of failing the fetch.
    let payload: Value = match serde_json::from_slice(&data) {
      Ok(payload) => payload,
      Err(e) => {
        tracing::warn!("discarding corrupted cache entry for {}: {}", key, e);
        return Ok(None);
      }
    };

    let stored_at = match Utc.timestamp_millis_opt(stored_at_ms).single() {
      Some(ts) => ts,
      None => {
        tracing::warn!("discarding cache entry for {} with bad timestamp", key);
        return Ok(None);
      }
    };

    Ok(Some(StoredEntry { payload, stored_at }))
  }

  fn set(&self, key: &str, payload: &Value, stored_at: DateTime<Utc>) -> Result<()> {
    let conn = self.conn.lock().unwrap_or_else(|p| p.into_inner());

    let data = serde_json::to_vec(payload)
      .map_err(|e| Error::Cache(format!("failed to serialize payload: {}", e)))?;

    conn
      .execute(
        "INSERT OR REPLACE INTO response_cache (key_hash, cache_key, payload, stored_at)
         VALUES (?, ?, ?, ?)",
        params![key_hash(key), key, data, stored_at.timestamp_millis()],
      )
      .map_err(|e| Error::Cache(format!("failed to store cache entry: {}", e)))?;

    Ok(())
  }

  fn clear(&self, key: &str) -> Result<()> {
    let conn = self.conn.lock().unwrap_or_else(|p| p.into_inner());

    conn
      .execute(
        "DELETE FROM response_cache WHERE key_hash = ?",
        params![key_hash(key)],
      )
      .map_err(|e| Error::Cache(format!("failed to clear cache entry: {}", e)))?;

    Ok(())
  }
}

/// SHA256 hash for stable, fixed-length storage keys.
fn key_hash(key: &str) -> String {
  let mut hasher = Sha256::new();
  hasher.update(key.as_bytes());
  hex::encode(hasher.finalize())
}
