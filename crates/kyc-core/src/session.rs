//! Verification sessions, the short-lived handles returned when a user starts a
//! check with a provider.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::record::UserId;

/// A provider check opened for a user. The `reference_id` is the join key to
/// the eventual [`KycRecord`](crate::record::KycRecord) update.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VerificationSession {
  pub user_id:      UserId,
  pub provider:     String,
  pub reference_id: String,
  /// Where the user is sent to complete the check with the provider.
  pub redirect_url: String,
  pub expires_at:   DateTime<Utc>,
}

impl VerificationSession {
  pub fn is_expired(&self, now: DateTime<Utc>) -> bool { now >= self.expires_at }
}
