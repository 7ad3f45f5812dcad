//! Upstream availability monitor.
//!
//! Probes the API root on its own interval, independent of the request
//! queue and its rate limiter, so availability checks keep working even
//! when the queue is saturated or upstream is refusing data requests.
//! A probe failure is evidence of "down", never an error to the caller.

use chrono::{DateTime, Utc};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio::time::{interval_at, Instant};

use crate::events::EventBus;
use crate::time::Clock;
use crate::transport::Transport;

/// Current upstream availability as seen by the monitor.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HeartBeatStatus {
  pub down: bool,
  pub last_checked: DateTime<Utc>,
}

struct MonitorShared {
  status: Mutex<HeartBeatStatus>,
  transport: Arc<dyn Transport>,
  clock: Arc<dyn Clock>,
  events: Arc<EventBus>,
  probe_url: String,
}

impl MonitorShared {
  /// Run one probe and fold the result into the shared status.
  ///
  /// Any received HTTP response below 500 counts as "up"; network
  /// errors, timeouts, and 5xx count as "down". Exactly one event is
  /// emitted per up/down flip, regardless of how many probes agree.
  async fn probe(&self) -> HeartBeatStatus {
    let down = match self.transport.get(&self.probe_url).await {
      Ok(response) => response.status >= 500,
      Err(_) => true,
    };
    let now = self.clock.now();

    let mut status = self.status.lock().unwrap_or_else(|p| p.into_inner());
    if status.down != down {
      if down {
        tracing::warn!("upstream transitioned to down");
        self.events.emit("heartbeat", "upstream is down");
      } else {
        tracing::info!("upstream transitioned to up");
        self.events.emit("heartbeat", "upstream is back up");
      }
    }

    *status = HeartBeatStatus {
      down,
      last_checked: now,
    };
    *status
  }
}

/// Background poller plus on-demand probing.
pub struct HeartBeatMonitor {
  shared: Arc<MonitorShared>,
  poller: JoinHandle<()>,
}

impl HeartBeatMonitor {
  /// Spawn the poll loop. The first scheduled probe happens one full
  /// `poll_interval` after construction; upstream is assumed up until
  /// a probe says otherwise. Must be called within a tokio runtime.
  pub fn new(
    transport: Arc<dyn Transport>,
    clock: Arc<dyn Clock>,
    events: Arc<EventBus>,
    probe_url: String,
    poll_interval: Duration,
  ) -> Self {
    let shared = Arc::new(MonitorShared {
      status: Mutex::new(HeartBeatStatus {
        down: false,
        last_checked: clock.now(),
      }),
      transport,
      clock,
      events,
      probe_url,
    });

    let poller = {
      let shared = shared.clone();
      tokio::spawn(async move {
        let mut ticker = interval_at(Instant::now() + poll_interval, poll_interval);
        loop {
          ticker.tick().await;
          shared.probe().await;
        }
      })
    };

    Self { shared, poller }
  }

  /// Probe upstream right now and return the refreshed status.
  pub async fn check(&self) -> HeartBeatStatus {
    self.shared.probe().await
  }

  /// Status recorded by the most recent probe (scheduled or on-demand).
  pub fn status(&self) -> HeartBeatStatus {
    *self
      .shared
      .status
      .lock()
      .unwrap_or_else(|p| p.into_inner())
  }

  pub fn is_down(&self) -> bool {
    self.status().down
  }
}

impl Drop for HeartBeatMonitor {
  fn drop(&mut self) {
    self.poller.abort();
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::time::testing::ManualClock;
  use crate::transport::testing::{ScriptedTransport, Step};

  // Long enough that scheduled polls never interleave with the
  // explicit check() calls below.
  const QUIET: Duration = Duration::from_secs(3600);

  fn monitor_with(transport: Arc<ScriptedTransport>) -> (HeartBeatMonitor, Arc<EventBus>) {
    let events = Arc::new(EventBus::new());
    let monitor = HeartBeatMonitor::new(
      transport,
      Arc::new(ManualClock::starting_now()),
      events.clone(),
      "https://api.jikan.moe/".to_string(),
      QUIET,
    );
    (monitor, events)
  }

  #[tokio::test]
  async fn test_probe_failure_degrades_to_down() {
    let transport = Arc::new(ScriptedTransport::always(Step::Timeout));
    let (monitor, _events) = monitor_with(transport);

    let status = monitor.check().await;
    assert!(status.down);
    assert!(monitor.is_down());
  }

  #[tokio::test]
  async fn test_5xx_probe_counts_as_down_but_4xx_does_not() {
    let transport = Arc::new(ScriptedTransport::sequence(
      vec![Step::Respond(500, ""), Step::Respond(404, "")],
      Step::Respond(200, ""),
    ));
    let (monitor, _events) = monitor_with(transport);

    assert!(monitor.check().await.down);
    assert!(!monitor.check().await.down);
  }

  #[tokio::test]
  async fn test_transition_emits_exactly_once() {
    let transport = Arc::new(ScriptedTransport::always(Step::Timeout));
    let (monitor, events) = monitor_with(transport);
    let mut rx = events.subscribe();

    // Ten consecutive failing probes: one down transition.
    for _ in 0..10 {
      monitor.check().await;
    }

    let event = rx.try_recv().unwrap();
    assert_eq!(event.scope, "heartbeat");
    assert_eq!(event.message, "upstream is down");
    assert!(rx.try_recv().is_err());
  }

  #[tokio::test]
  async fn test_recovery_emits_one_up_notification() {
    let transport = Arc::new(ScriptedTransport::sequence(
      vec![Step::Timeout, Step::Timeout],
      Step::Respond(200, ""),
    ));
    let (monitor, events) = monitor_with(transport);
    let mut rx = events.subscribe();

    monitor.check().await;
    monitor.check().await;
    monitor.check().await;
    monitor.check().await;

    assert_eq!(rx.try_recv().unwrap().message, "upstream is down");
    assert_eq!(rx.try_recv().unwrap().message, "upstream is back up");
    assert!(rx.try_recv().is_err());
  }

  #[tokio::test]
  async fn test_scheduled_polling_updates_status() {
    let transport = Arc::new(ScriptedTransport::always(Step::Timeout));
    let events = Arc::new(EventBus::new());
    let monitor = HeartBeatMonitor::new(
      transport,
      Arc::new(ManualClock::starting_now()),
      events,
      "https://api.jikan.moe/".to_string(),
      Duration::from_millis(10),
    );

    assert!(!monitor.is_down());
    tokio::time::sleep(Duration::from_millis(50)).await;
    assert!(monitor.is_down());
  }
}
