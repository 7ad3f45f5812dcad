//! Expiry-aware wrapper over the cache storage backend.

use chrono::Duration as ChronoDuration;
use serde_json::Value;
use std::sync::Arc;
use std::time::Duration;

use super::storage::CacheStorage;
use crate::time::Clock;

/// Cache front-end used by the request pipeline.
///
/// Applies the `data_expiry` window on read and shields callers from
/// storage faults: a broken backend degrades to cache-miss behavior,
/// it never fails a fetch.
pub struct CacheStore {
  storage: Arc<dyn CacheStorage>,
  clock: Arc<dyn Clock>,
  expiry: ChronoDuration,
}

impl CacheStore {
  pub fn new(storage: Arc<dyn CacheStorage>, clock: Arc<dyn Clock>, expiry: Duration) -> Self {
    Self {
      storage,
      clock,
      expiry: ChronoDuration::from_std(expiry).unwrap_or(ChronoDuration::MAX),
    }
  }

  /// Look up `key`. Returns `None` on a missing, stale, or unreadable
  /// entry. Stale entries are left in place (lazy expiry); the next
  /// `set` overwrites them.
  pub fn get(&self, key: &str) -> Option<Value> {
    let entry = match self.storage.get(key) {
      Ok(entry) => entry?,
      Err(e) => {
        tracing::warn!("cache read failed for {}: {}", key, e);
        return None;
      }
    };

    if self.clock.now() - entry.stored_at > self.expiry {
      return None;
    }

    Some(entry.payload)
  }

  /// Write through `payload` under `key`, stamped with the current
  /// clock time. Storage faults are logged, not surfaced: a completed
  /// fetch never fails because the cache is broken.
  pub fn set(&self, key: &str, payload: &Value) {
    if let Err(e) = self.storage.set(key, payload, self.clock.now()) {
      tracing::warn!("cache write failed for {}: {}", key, e);
    }
  }

  /// Drop the entry for `key`, if any.
  pub fn clear(&self, key: &str) {
    if let Err(e) = self.storage.clear(key) {
      tracing::warn!("cache clear failed for {}: {}", key, e);
    }
  }
}
