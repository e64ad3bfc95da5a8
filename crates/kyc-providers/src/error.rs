//! Error type for `kyc-providers`.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum ProviderError {
  #[error("http error: {0}")]
  Http(#[from] reqwest::Error),

  #[error("provider call timed out")]
  Timeout,

  #[error("provider returned {status}: {body}")]
  Status { status: u16, body: String },

  /// The payload is not JSON at all.
  #[error("payload is not valid json: {0}")]
  InvalidJson(#[source] serde_json::Error),

  /// The payload parsed but lacks required fields or has unusable values.
  #[error("malformed payload: {0}")]
  MalformedPayload(String),

  /// Carries the reason for logs only; never echo it to the sender.
  #[error("invalid webhook signature: {0}")]
  InvalidSignature(&'static str),

  #[error("unknown provider status: {0:?}")]
  UnknownStatus(String),

  #[error("provider not registered: {0}")]
  NotRegistered(String),

  #[error("configuration error: {0}")]
  Config(String),
}

impl ProviderError {
  /// Whether retrying the same call might succeed.
  pub fn is_transient(&self) -> bool {
    match self {
      Self::Timeout => true,
      Self::Http(e) => e.is_timeout() || e.is_connect() || e.is_request(),
      Self::Status { status, .. } => *status == 429 || *status >= 500,
      _ => false,
    }
  }
}

pub type Result<T, E = ProviderError> = std::result::Result<T, E>;
