//! Administrative status override.

use chrono::Utc;
use kyc_core::{
  event::ProviderStatus,
  record::{KycRecord, KycStatus, UserId},
  store::{KycRepository, UpsertResult},
};
use serde::{Deserialize, Serialize};

use crate::{KycEngine, KycError, Result, apply::CAS_ATTEMPTS};

/// A verdict set by an administrator instead of the provider.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum StatusOverride {
  Verified,
  Rejected { reason: Option<String> },
}

impl StatusOverride {
  fn as_provider_status(&self) -> ProviderStatus {
    match self {
      Self::Verified => ProviderStatus::verified(None),
      Self::Rejected { reason } => ProviderStatus::rejected(reason.clone(), None),
    }
  }
}

impl<R: KycRepository> KycEngine<R> {
  /// Make `user_id` known to the engine so it can start verifications.
  pub async fn register_user(&self, user_id: UserId) -> Result<()> {
    self.repo.register_user(user_id).await.map_err(KycError::store)?;
    tracing::debug!(%user_id, "user registered");
    Ok(())
  }

  /// Set the user's verdict directly. Applies regardless of the transition
  /// policy but still advances `last_event_at`, so older provider events
  /// cannot undo it. Notifies when the status changes.
  pub async fn override_status(
    &self,
    user_id: UserId,
    verdict: StatusOverride,
  ) -> Result<KycRecord> {
    let _guard = self.locks.lock(user_id).await;
    let incoming = verdict.as_provider_status();

    for _ in 0..CAS_ATTEMPTS {
      let Some(current) = self
        .repo
        .get_by_user_id(user_id)
        .await
        .map_err(KycError::store)?
      else {
        return Err(self.missing_record(user_id).await?);
      };

      if current.status() == KycStatus::Verified && incoming.status == KycStatus::Verified {
        return Ok(current);
      }

      let now = Utc::now();
      let next = current.with_outcome(incoming.to_outcome(now), now, now);
      match self
        .repo
        .upsert(next.clone(), Some(current.version))
        .await
        .map_err(KycError::store)?
      {
        UpsertResult::Written => {
          tracing::warn!(
            target: "kyc::audit",
            %user_id,
            old = %current.status(),
            new = %next.status(),
            "kyc status overridden by administrator"
          );
          self.announce(user_id, current.status(), next.status()).await;
          return Ok(next);
        }
        UpsertResult::Conflict => {
          tracing::debug!(%user_id, "record changed during override, re-reading");
        }
      }
    }
    Err(KycError::Conflict(user_id))
  }
}
