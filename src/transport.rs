//! HTTP transport abstraction and response classification.
//!
//! The trait exists for dependency injection: the dispatch loop and the
//! heartbeat monitor both talk to upstream through `dyn Transport`, so
//! tests can script status sequences without a network.

use async_trait::async_trait;
use serde_json::Value;
use std::time::Duration;

use crate::error::{Error, TransportError};

/// Raw result of one HTTP GET attempt.
#[derive(Debug, Clone)]
pub struct TransportResponse {
  pub status: u16,
  pub body: Vec<u8>,
}

/// One HTTP GET per call, honoring a per-attempt timeout. The pipeline
/// never implements HTTP framing itself.
#[async_trait]
pub trait Transport: Send + Sync {
  async fn get(&self, url: &str) -> Result<TransportResponse, TransportError>;
}

/// Production transport backed by reqwest.
pub struct ReqwestTransport {
  client: reqwest::Client,
}

impl ReqwestTransport {
  /// Build a transport whose every attempt is bounded by `timeout`.
  pub fn new(timeout: Duration) -> Result<Self, TransportError> {
    let client = reqwest::Client::builder().timeout(timeout).build()?;
    Ok(Self { client })
  }
}

#[async_trait]
impl Transport for ReqwestTransport {
  async fn get(&self, url: &str) -> Result<TransportResponse, TransportError> {
    let response = self.client.get(url).send().await.map_err(from_reqwest)?;
    let status = response.status().as_u16();
    let body = response.bytes().await.map_err(from_reqwest)?.to_vec();

    Ok(TransportResponse { status, body })
  }
}

fn from_reqwest(e: reqwest::Error) -> TransportError {
  if e.is_timeout() {
    TransportError::Timeout
  } else {
    TransportError::Network(e)
  }
}

/// How one attempt resolves from the dispatch loop's point of view.
#[derive(Debug)]
pub(crate) enum Outcome {
  /// 2xx with a parseable JSON body.
  Success(Value),
  /// Not retry-eligible: 4xx, or an unparseable success body.
  Permanent(Error),
  /// Retry-eligible: 5xx, timeout, network failure.
  Transient(TransportError),
}

/// Classify a finished attempt.
pub(crate) fn classify(
  url: &str,
  result: Result<TransportResponse, TransportError>,
) -> Outcome {
  match result {
    Ok(response) if (200..300).contains(&response.status) => {
      match serde_json::from_slice(&response.body) {
        Ok(payload) => Outcome::Success(payload),
        Err(e) => Outcome::Permanent(Error::InvalidPayload {
          url: url.to_string(),
          source: e,
        }),
      }
    }
    Ok(response) if response.status >= 500 => Outcome::Transient(TransportError::ServerError {
      status: response.status,
    }),
    Ok(response) => Outcome::Permanent(Error::ClientError {
      status: response.status,
      url: url.to_string(),
    }),
    Err(e) => Outcome::Transient(e),
  }
}
