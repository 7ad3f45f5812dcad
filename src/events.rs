//! Debug-event fan-out for pipeline observability.
//!
//! Every pipeline state transition (enqueue, dispatch, retry, success,
//! terminal failure, heartbeat flip) is published as a `(scope, message)`
//! pair. Consumers register explicitly via [`EventBus::subscribe`];
//! emission never blocks and closed receivers are pruned lazily.

use std::sync::Mutex;
use tokio::sync::mpsc;

/// A single debug notification from the pipeline.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DebugEvent {
  /// Component that produced the event, e.g. `"queue"` or `"heartbeat"`.
  pub scope: String,
  pub message: String,
}

/// Fan-out channel for [`DebugEvent`]s.
pub struct EventBus {
  senders: Mutex<Vec<mpsc::UnboundedSender<DebugEvent>>>,
}

impl EventBus {
  pub fn new() -> Self {
    Self {
      senders: Mutex::new(Vec::new()),
    }
  }

  /// Register a new listener. Events emitted after this call are
  /// delivered to the returned receiver until it is dropped.
  pub fn subscribe(&self) -> mpsc::UnboundedReceiver<DebugEvent> {
    let (tx, rx) = mpsc::unbounded_channel();
    let mut senders = self.senders.lock().unwrap_or_else(|p| p.into_inner());
    senders.push(tx);
    rx
  }

  /// Publish an event to all live subscribers.
  pub fn emit(&self, scope: &str, message: impl Into<String>) {
    let message = message.into();
    tracing::debug!(scope = %scope, "{}", message);

    let event = DebugEvent {
      scope: scope.to_string(),
      message,
    };

    let mut senders = self.senders.lock().unwrap_or_else(|p| p.into_inner());
    senders.retain(|tx| tx.send(event.clone()).is_ok());
  }
}

impl Default for EventBus {
  fn default() -> Self {
    Self::new()
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[tokio::test]
  async fn test_subscriber_receives_emitted_events() {
    let bus = EventBus::new();
    let mut rx = bus.subscribe();

    bus.emit("queue", "dispatching job 1");

    let event = rx.recv().await.unwrap();
    assert_eq!(event.scope, "queue");
    assert_eq!(event.message, "dispatching job 1");
  }

  #[tokio::test]
  async fn test_emit_survives_dropped_subscribers() {
    let bus = EventBus::new();
    let rx = bus.subscribe();
    drop(rx);

    // Must not panic or block; the dead sender is pruned.
    bus.emit("api", "cache hit");

    let mut rx = bus.subscribe();
    bus.emit("api", "cache miss");
    assert_eq!(rx.recv().await.unwrap().message, "cache miss");
  }

  #[tokio::test]
  async fn test_multiple_subscribers_all_receive() {
    let bus = EventBus::new();
    let mut a = bus.subscribe();
    let mut b = bus.subscribe();

    bus.emit("heartbeat", "upstream is down");

    assert_eq!(a.recv().await.unwrap().scope, "heartbeat");
    assert_eq!(b.recv().await.unwrap().scope, "heartbeat");
  }
}
