//! Client construction and dependency wiring.
//!
//! Every component receives its collaborators explicitly at
//! construction; there is no process-wide client registry.

use std::sync::Arc;
use tokio::sync::mpsc;

use crate::api::RequestPipeline;
use crate::cache::{CacheStorage, CacheStore, NoopStorage, SqliteStorage};
use crate::config::ClientOptions;
use crate::error::Result;
use crate::events::{DebugEvent, EventBus};
use crate::heartbeat::{HeartBeatMonitor, HeartBeatStatus};
use crate::queue::RequestQueue;
use crate::time::{Clock, SystemClock};
use crate::transport::{ReqwestTransport, Transport};

/// Handle to the request pipeline and heartbeat monitor.
///
/// Resource managers are built on top of [`Client::pipeline`]; this
/// crate itself maps no resource schemas. Construction spawns the
/// queue dispatch loop and the heartbeat poller, so it must happen
/// within a tokio runtime.
pub struct Client {
  options: ClientOptions,
  pipeline: RequestPipeline,
  heartbeat: Arc<HeartBeatMonitor>,
  events: Arc<EventBus>,
}

impl Client {
  /// Build a client with the production transport and system clock.
  pub fn new(options: ClientOptions) -> Result<Self> {
    let transport = Arc::new(ReqwestTransport::new(options.request_timeout())?);
    Self::with_parts(options, transport, Arc::new(SystemClock))
  }

  /// Build a client around a caller-supplied transport. Useful for
  /// proxying setups and for tests.
  pub fn with_transport(options: ClientOptions, transport: Arc<dyn Transport>) -> Result<Self> {
    Self::with_parts(options, transport, Arc::new(SystemClock))
  }

  /// Full dependency-injection seam: transport and clock.
  pub fn with_parts(
    options: ClientOptions,
    transport: Arc<dyn Transport>,
    clock: Arc<dyn Clock>,
  ) -> Result<Self> {
    let events = Arc::new(EventBus::new());

    let storage: Arc<dyn CacheStorage> = if options.disable_caching {
      Arc::new(NoopStorage)
    } else {
      Arc::new(SqliteStorage::open(&options.data_path)?)
    };
    let cache = CacheStore::new(storage, clock.clone(), options.data_expiry());

    let queue = RequestQueue::new(
      transport.clone(),
      events.clone(),
      options.data_rate_limit(),
      options.request_queue_limit,
      options.max_api_error_retry,
    );

    let heartbeat = Arc::new(HeartBeatMonitor::new(
      transport,
      clock,
      events.clone(),
      options.root_url(),
      options.heartbeat_interval(),
    ));

    let pipeline = RequestPipeline::new(
      cache,
      queue,
      heartbeat.clone(),
      events.clone(),
      options.data_pagination_max_size,
    );

    Ok(Self {
      options,
      pipeline,
      heartbeat,
      events,
    })
  }

  pub fn options(&self) -> &ClientOptions {
    &self.options
  }

  /// The request pipeline: `fetch` and `fetch_paginated`.
  pub fn pipeline(&self) -> &RequestPipeline {
    &self.pipeline
  }

  /// The upstream availability monitor.
  pub fn heartbeat(&self) -> &HeartBeatMonitor {
    &self.heartbeat
  }

  /// Current heartbeat status without probing.
  pub fn heartbeat_status(&self) -> HeartBeatStatus {
    self.heartbeat.status()
  }

  /// Register a debug-event listener.
  pub fn subscribe(&self) -> mpsc::UnboundedReceiver<DebugEvent> {
    self.events.subscribe()
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::transport::testing::{ScriptedTransport, Step};
  use serde_json::json;
  use tempfile::TempDir;

  fn test_options(dir: &TempDir) -> ClientOptions {
    ClientOptions {
      data_path: dir.path().join("cache.db"),
      data_rate_limit: 1,
      heartbeat_interval: 3_600_000,
      ..ClientOptions::default()
    }
  }

  #[tokio::test]
  async fn test_fetch_through_client_emits_debug_events() {
    let dir = TempDir::new().unwrap();
    let transport = Arc::new(ScriptedTransport::always(Step::Respond(
      200,
      r#"{"data":{"mal_id":1}}"#,
    )));
    let client = Client::with_transport(test_options(&dir), transport).unwrap();
    let mut rx = client.subscribe();

    let payload = client
      .pipeline()
      .fetch("anime:1", "https://api.jikan.moe/v4/anime/1")
      .await
      .unwrap();
    assert_eq!(payload, json!({ "data": { "mal_id": 1 } }));

    // Miss, dispatch, success: at least those three transitions.
    let mut scopes = Vec::new();
    while let Ok(event) = rx.try_recv() {
      scopes.push(event.scope);
    }
    assert!(scopes.iter().any(|s| s == "api"));
    assert!(scopes.iter().any(|s| s == "queue"));
  }

  #[tokio::test]
  async fn test_cache_persists_across_client_instances() {
    let dir = TempDir::new().unwrap();

    {
      let transport = Arc::new(ScriptedTransport::always(Step::Respond(
        200,
        r#"{"data":1}"#,
      )));
      let client = Client::with_transport(test_options(&dir), transport.clone()).unwrap();
      client
        .pipeline()
        .fetch("anime:1", "https://api.jikan.moe/v4/anime/1")
        .await
        .unwrap();
      assert_eq!(transport.call_count(), 1);
    }

    // A fresh client over the same data path serves the cached entry
    // without touching the network.
    let transport = Arc::new(ScriptedTransport::always(Step::Respond(500, "")));
    let client = Client::with_transport(test_options(&dir), transport.clone()).unwrap();
    let payload = client
      .pipeline()
      .fetch("anime:1", "https://api.jikan.moe/v4/anime/1")
      .await
      .unwrap();

    assert_eq!(payload, json!({ "data": 1 }));
    assert_eq!(transport.call_count(), 0);
  }

  #[tokio::test]
  async fn test_disable_caching_uses_noop_storage() {
    let dir = TempDir::new().unwrap();
    let options = ClientOptions {
      disable_caching: true,
      ..test_options(&dir)
    };
    let transport = Arc::new(ScriptedTransport::always(Step::Respond(
      200,
      r#"{"data":1}"#,
    )));
    let client = Client::with_transport(options, transport.clone()).unwrap();

    for _ in 0..2 {
      client
        .pipeline()
        .fetch("anime:1", "https://api.jikan.moe/v4/anime/1")
        .await
        .unwrap();
    }

    assert_eq!(transport.call_count(), 2);
  }
}
