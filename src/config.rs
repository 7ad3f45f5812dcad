//! Client configuration snapshot.
//!
//! `ClientOptions` is read by every pipeline component at construction
//! and never mutated afterwards. Millisecond fields mirror the upstream
//! client's knobs; `Duration` helpers exist for the tokio-facing code.

use serde::Deserialize;
use std::path::PathBuf;
use std::time::Duration;
use url::Url;

use crate::error::{Error, Result};

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ClientOptions {
  /// Hostname of the upstream API server. Override to point at a
  /// self-hosted instance.
  pub host: String,

  /// Base pathname prepended to every request (API version).
  pub base_uri: String,

  /// Whether to use HTTPS instead of HTTP.
  pub secure: bool,

  /// Milliseconds between queue dispatches. The default keeps the
  /// client under the upstream's 50-requests-a-minute limit.
  pub data_rate_limit: u64,

  /// Milliseconds before a cached payload is considered stale.
  pub data_expiry: u64,

  /// Number of items per upstream page.
  pub data_pagination_max_size: u32,

  /// Hard per-attempt deadline in milliseconds.
  pub request_timeout: u64,

  /// Maximum queue depth, counting the in-flight job.
  pub request_queue_limit: usize,

  /// Retries allowed per job on transient failures (timeouts, 5xx).
  pub max_api_error_retry: u32,

  /// Skip cache reads and writes entirely.
  pub disable_caching: bool,

  /// Location of the on-disk response cache.
  pub data_path: PathBuf,

  /// Milliseconds between heartbeat probes. Independent of
  /// `data_rate_limit`; availability checks bypass the main queue.
  pub heartbeat_interval: u64,
}

impl Default for ClientOptions {
  fn default() -> Self {
    Self {
      host: "api.jikan.moe".to_string(),
      base_uri: "v4".to_string(),
      secure: true,
      data_rate_limit: 1200, // 50 requests a minute
      data_expiry: 1000 * 60 * 60 * 24,
      data_pagination_max_size: 25,
      request_timeout: 15_000,
      request_queue_limit: 100,
      max_api_error_retry: 5,
      disable_caching: false,
      data_path: default_data_path(),
      heartbeat_interval: 60_000,
    }
  }
}

impl ClientOptions {
  pub fn data_rate_limit(&self) -> Duration {
    Duration::from_millis(self.data_rate_limit)
  }

  pub fn data_expiry(&self) -> Duration {
    Duration::from_millis(self.data_expiry)
  }

  pub fn request_timeout(&self) -> Duration {
    Duration::from_millis(self.request_timeout)
  }

  pub fn heartbeat_interval(&self) -> Duration {
    Duration::from_millis(self.heartbeat_interval)
  }

  fn scheme(&self) -> &'static str {
    if self.secure {
      "https"
    } else {
      "http"
    }
  }

  /// Base URL for API requests: `{scheme}://{host}/{base_uri}`.
  pub fn base_url(&self) -> Result<Url> {
    let raw = format!("{}://{}/{}", self.scheme(), self.host, self.base_uri);
    Url::parse(&raw).map_err(|e| Error::Config(format!("invalid base url {}: {}", raw, e)))
  }

  /// Root URL probed by the heartbeat monitor.
  pub fn root_url(&self) -> String {
    format!("{}://{}/", self.scheme(), self.host)
  }
}

/// Default cache location under the platform data directory.
fn default_data_path() -> PathBuf {
  let data_dir = dirs::data_dir()
    .or_else(|| dirs::home_dir().map(|p| p.join(".local/share")))
    .unwrap_or_else(|| PathBuf::from("."));

  data_dir.join("jikan-pipeline").join("cache.db")
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn test_defaults_match_upstream_client() {
    let options = ClientOptions::default();

    assert_eq!(options.host, "api.jikan.moe");
    assert_eq!(options.base_uri, "v4");
    assert!(options.secure);
    assert_eq!(options.data_rate_limit, 1200);
    assert_eq!(options.data_expiry, 86_400_000);
    assert_eq!(options.data_pagination_max_size, 25);
    assert_eq!(options.request_timeout, 15_000);
    assert_eq!(options.request_queue_limit, 100);
    assert_eq!(options.max_api_error_retry, 5);
    assert!(!options.disable_caching);
  }

  #[test]
  fn test_base_url_reflects_scheme_and_host() {
    let options = ClientOptions {
      host: "localhost:8080".to_string(),
      secure: false,
      ..ClientOptions::default()
    };

    assert_eq!(
      options.base_url().unwrap().as_str(),
      "http://localhost:8080/v4"
    );
    assert_eq!(options.root_url(), "http://localhost:8080/");
  }

  #[test]
  fn test_deserialize_partial_options() {
    let options: ClientOptions =
      serde_json::from_str(r#"{ "data_rate_limit": 500, "disable_caching": true }"#).unwrap();

    assert_eq!(options.data_rate_limit, 500);
    assert!(options.disable_caching);
    assert_eq!(options.host, "api.jikan.moe");
  }
}
