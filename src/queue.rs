//! Bounded FIFO request queue with a rate-limited dispatch loop.
//!
//! A single background task releases at most one job per rate-limit
//! interval, measured between dispatch starts. Jobs that fail
//! transiently re-enter at the FRONT of the queue so a retrying request
//! is not starved behind fresh ones; permanent failures and exhausted
//! retry budgets complete the job with a terminal error.

use serde_json::Value;
use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::{oneshot, Notify};
use tokio::task::JoinHandle;
use tokio::time::Instant;

use crate::error::{Error, Result};
use crate::events::EventBus;
use crate::transport::{classify, Outcome, Transport};

/// One logical fetch waiting for (or undergoing) dispatch.
struct QueuedJob {
  id: u64,
  url: String,
  attempts_made: u32,
  completion: oneshot::Sender<Result<Value>>,
}

struct Shared {
  pending: Mutex<VecDeque<QueuedJob>>,
  /// 1 while the dispatcher holds a popped job; counted toward depth.
  in_flight: AtomicUsize,
  notify: Notify,
  limit: usize,
  next_id: AtomicUsize,
}

impl Shared {
  fn depth(&self) -> usize {
    let pending = self.pending.lock().unwrap_or_else(|p| p.into_inner());
    pending.len() + self.in_flight.load(Ordering::SeqCst)
  }
}

/// Handle to the queue. Dropping it aborts the dispatch loop; jobs
/// still pending at that point resolve with [`Error::QueueClosed`].
pub struct RequestQueue {
  shared: Arc<Shared>,
  dispatcher: JoinHandle<()>,
}

impl RequestQueue {
  /// Spawn the dispatch loop. Must be called within a tokio runtime.
  pub fn new(
    transport: Arc<dyn Transport>,
    events: Arc<EventBus>,
    rate_limit: Duration,
    limit: usize,
    max_retry: u32,
  ) -> Self {
    let shared = Arc::new(Shared {
      pending: Mutex::new(VecDeque::new()),
      in_flight: AtomicUsize::new(0),
      notify: Notify::new(),
      limit,
      next_id: AtomicUsize::new(1),
    });

    let dispatcher = tokio::spawn(dispatch_loop(
      shared.clone(),
      transport,
      events,
      rate_limit,
      max_retry,
    ));

    Self { shared, dispatcher }
  }

  /// Current queue depth, counting the in-flight job.
  pub fn size(&self) -> usize {
    self.shared.depth()
  }

  /// Add a job to the tail of the queue.
  ///
  /// Fails synchronously with [`Error::QueueLimitExceeded`] when the
  /// depth is at capacity; the job is never created in that case.
  pub fn enqueue(&self, url: &str) -> Result<oneshot::Receiver<Result<Value>>> {
    let mut pending = self
      .shared
      .pending
      .lock()
      .unwrap_or_else(|p| p.into_inner());

    if pending.len() + self.shared.in_flight.load(Ordering::SeqCst) >= self.shared.limit {
      return Err(Error::QueueLimitExceeded {
        limit: self.shared.limit,
      });
    }

    let id = self.shared.next_id.fetch_add(1, Ordering::SeqCst) as u64;
    let (tx, rx) = oneshot::channel();
    pending.push_back(QueuedJob {
      id,
      url: url.to_string(),
      attempts_made: 0,
      completion: tx,
    });
    drop(pending);

    self.shared.notify.notify_one();
    Ok(rx)
  }
}

impl Drop for RequestQueue {
  fn drop(&mut self) {
    self.dispatcher.abort();
  }
}

async fn dispatch_loop(
  shared: Arc<Shared>,
  transport: Arc<dyn Transport>,
  events: Arc<EventBus>,
  rate_limit: Duration,
  max_retry: u32,
) {
  let mut last_dispatch: Option<Instant> = None;

  loop {
    // Take the head job, or park until one arrives.
    let mut job = loop {
      let popped = {
        let mut pending = shared.pending.lock().unwrap_or_else(|p| p.into_inner());
        let job = pending.pop_front();
        if job.is_some() {
          // Flagged before the lock drops so depth accounting never
          // undercounts the dispatched job.
          shared.in_flight.store(1, Ordering::SeqCst);
        }
        job
      };

      match popped {
        Some(job) => break job,
        None => shared.notify.notified().await,
      }
    };

    // Pace dispatch starts: no sooner than rate_limit after the
    // previous one began.
    if let Some(prev) = last_dispatch {
      tokio::time::sleep_until(prev + rate_limit).await;
    }
    last_dispatch = Some(Instant::now());

    job.attempts_made += 1;
    events.emit(
      "queue",
      format!(
        "dispatching job {} (attempt {}): {}",
        job.id, job.attempts_made, job.url
      ),
    );

    let outcome = classify(&job.url, transport.get(&job.url).await);

    match outcome {
      Outcome::Success(payload) => {
        events.emit("queue", format!("job {} succeeded", job.id));
        let _ = job.completion.send(Ok(payload));
      }
      Outcome::Permanent(error) => {
        events.emit("queue", format!("job {} failed: {}", job.id, error));
        let _ = job.completion.send(Err(error));
      }
      Outcome::Transient(error) => {
        if job.attempts_made > max_retry {
          events.emit(
            "queue",
            format!(
              "job {} gave up after {} attempts: {}",
              job.id, job.attempts_made, error
            ),
          );
          let _ = job.completion.send(Err(Error::UpstreamUnavailable {
            attempts: job.attempts_made,
            url: job.url,
            source: error,
          }));
        } else {
          events.emit(
            "queue",
            format!("job {} retrying after transient failure: {}", job.id, error),
          );
          let mut pending = shared.pending.lock().unwrap_or_else(|p| p.into_inner());
          pending.push_front(job);
        }
      }
    }

    shared.in_flight.store(0, Ordering::SeqCst);
  }
}
