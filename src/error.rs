//! Error taxonomy for fetch operations.

use thiserror::Error;

/// Failure of a single fetch against the service.
///
/// Cloneable so that resources can keep the last error next to their data.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum FetchError {
  /// The request was rejected, timed out, or returned a failure status
  #[error("network failure: {0}")]
  Network(String),

  /// The request resolved without a usable payload
  #[error("empty response from {0}")]
  EmptyResponse(String),

  /// The referenced resource does not exist
  #[error("not found: {0}")]
  NotFound(String),
}

impl FetchError {
  pub fn network(msg: impl Into<String>) -> Self {
    Self::Network(msg.into())
  }
}

impl From<reqwest::Error> for FetchError {
  fn from(err: reqwest::Error) -> Self {
    if err.is_timeout() {
      Self::Network(format!("request timed out: {}", err))
    } else {
      Self::Network(err.to_string())
    }
  }
}
