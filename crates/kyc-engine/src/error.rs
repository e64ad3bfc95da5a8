//! Error taxonomy for `kyc-engine`.

use kyc_core::record::{KycRecord, KycStatus, UserId};
use kyc_providers::ProviderError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum KycError {
  #[error("user not found: {0}")]
  UserNotFound(UserId),

  #[error("provider not configured: {0}")]
  ProviderNotConfigured(String),

  /// Opening a check failed after the retry budget was spent.
  #[error("provider unavailable: {0}")]
  ProviderUnavailable(#[source] ProviderError),

  /// Polling the provider failed; `record` is the stored record, unchanged.
  #[error("provider query failed: {source}")]
  ProviderQueryFailed {
    record: Box<KycRecord>,
    #[source]
    source: ProviderError,
  },

  #[error("invalid webhook signature")]
  InvalidSignature(#[source] ProviderError),

  #[error("unknown provider: {0}")]
  UnknownProvider(String),

  #[error("malformed webhook payload: {0}")]
  MalformedPayload(#[source] ProviderError),

  /// No record is tied to this provider check (never created, or superseded
  /// by a resubmission).
  #[error("unknown reference {reference_id:?} for provider {provider:?}")]
  UnknownReference {
    provider:     String,
    reference_id: String,
  },

  #[error("stale or duplicate event")]
  StaleOrDuplicateEvent,

  /// A terminal-to-terminal correction the policy does not allow.
  #[error("transition {current} -> {proposed} suppressed")]
  InvalidTransition {
    current:  KycStatus,
    proposed: KycStatus,
  },

  #[error("no active session for user {0}")]
  NoActiveSession(UserId),

  #[error("invalid redirect url: {0}")]
  InvalidRedirectUrl(String),

  /// The record kept changing underneath us; the caller may retry.
  #[error("concurrent update to record of user {0}")]
  Conflict(UserId),

  #[error("store error: {0}")]
  Store(#[source] Box<dyn std::error::Error + Send + Sync>),
}

impl KycError {
  pub(crate) fn store<E>(e: E) -> Self
  where
    E: std::error::Error + Send + Sync + 'static,
  {
    Self::Store(Box::new(e))
  }

  /// Errors that may indicate probing and are logged as security events.
  pub fn is_security(&self) -> bool {
    matches!(self, Self::InvalidSignature(_) | Self::UnknownProvider(_))
  }

  /// Outcomes that are logged but not treated as failures.
  pub fn is_benign(&self) -> bool {
    matches!(
      self,
      Self::UnknownReference { .. }
        | Self::StaleOrDuplicateEvent
        | Self::InvalidTransition { .. }
    )
  }
}

pub type Result<T, E = KycError> = std::result::Result<T, E>;
