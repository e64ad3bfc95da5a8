//! Provider-neutral shapes produced by adapters: polled status and parsed
//! webhook events.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::record::{KycStatus, Outcome};

/// Reason recorded when a provider rejects a check without saying why.
pub const UNSPECIFIED_REJECTION: &str = "rejected by provider";

/// A provider's view of a check, mapped to the internal vocabulary.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProviderStatus {
  pub status:      KycStatus,
  /// Human-readable rejection reason; only meaningful when rejected.
  pub reason:      Option<String>,
  /// When the provider reached this status, if it reports it.
  pub observed_at: Option<DateTime<Utc>>,
}

impl ProviderStatus {
  pub fn pending() -> Self {
    Self { status: KycStatus::Pending, reason: None, observed_at: None }
  }

  pub fn verified(observed_at: Option<DateTime<Utc>>) -> Self {
    Self { status: KycStatus::Verified, reason: None, observed_at }
  }

  pub fn rejected(
    reason: Option<String>,
    observed_at: Option<DateTime<Utc>>,
  ) -> Self {
    Self { status: KycStatus::Rejected, reason, observed_at }
  }

  /// The outcome this status represents, stamped at `at`.
  pub fn to_outcome(&self, at: DateTime<Utc>) -> Outcome {
    match self.status {
      KycStatus::Pending => Outcome::Pending,
      KycStatus::Verified => Outcome::Verified { verified_at: at },
      KycStatus::Rejected => Outcome::Rejected {
        rejected_at: at,
        reason:      self
          .reason
          .clone()
          .filter(|r| !r.trim().is_empty())
          .unwrap_or_else(|| UNSPECIFIED_REJECTION.to_owned()),
      },
    }
  }
}

/// A webhook delivery after authentication and parsing.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WebhookEvent {
  pub provider:     String,
  /// The provider's event type, e.g. `applicantReviewed`.
  pub event_type:   String,
  pub reference_id: String,
  pub status:       ProviderStatus,
  /// Provider-reported event time; used as the ordering token.
  pub occurred_at:  Option<DateTime<Utc>>,
  pub received_at:  DateTime<Utc>,
}

impl WebhookEvent {
  /// The ordering token: the provider's event time, falling back to the
  /// receipt time when the payload carries none.
  pub fn ordering_token(&self) -> DateTime<Utc> {
    self.occurred_at.unwrap_or(self.received_at)
  }
}
