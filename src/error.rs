//! Error types surfaced by the request pipeline.
//!
//! Transient upstream conditions (timeouts, 5xx, network failures) are
//! retried internally and never reach callers as distinct errors; only
//! permanent or budget-exhausted conditions cross the boundary.

use thiserror::Error;

pub type Result<T> = std::result::Result<T, Error>;

/// Terminal errors returned to callers of the pipeline.
#[derive(Debug, Error)]
pub enum Error {
  /// The request queue is at capacity; the job was never created.
  #[error("request queue is full ({limit} jobs)")]
  QueueLimitExceeded { limit: usize },

  /// Upstream answered with a 4xx status. Permanent, not retried.
  #[error("upstream returned {status} for {url}")]
  ClientError { status: u16, url: String },

  /// The retry budget was exhausted on transient failures.
  #[error("upstream unavailable after {attempts} attempts for {url}")]
  UpstreamUnavailable {
    attempts: u32,
    url: String,
    #[source]
    source: TransportError,
  },

  /// The heartbeat monitor reports upstream as down; the fetch was
  /// never enqueued.
  #[error("upstream is down")]
  UpstreamDown,

  /// A 2xx response carried a body that is not valid JSON.
  #[error("invalid JSON payload from {url}")]
  InvalidPayload {
    url: String,
    #[source]
    source: serde_json::Error,
  },

  /// Cache storage could not be opened or migrated.
  #[error("cache storage: {0}")]
  Cache(String),

  /// Options that cannot produce a usable client (e.g. a host that
  /// does not parse as a URL).
  #[error("invalid configuration: {0}")]
  Config(String),

  /// The HTTP transport could not be constructed.
  #[error("failed to build http transport")]
  Transport(#[from] TransportError),

  /// The dispatch loop went away before the job completed. Only seen
  /// when the owning client is dropped with fetches still pending.
  #[error("request queue shut down before the job completed")]
  QueueClosed,
}

/// A single failed transport attempt. Every variant is transient:
/// eligible for a retry until the budget runs out.
#[derive(Debug, Error)]
pub enum TransportError {
  #[error("request timed out")]
  Timeout,

  #[error("network error: {0}")]
  Network(#[from] reqwest::Error),

  #[error("upstream returned server error {status}")]
  ServerError { status: u16 },
}
