//! The transition step shared by webhook ingestion and reconciliation.

use chrono::{DateTime, Utc};
use kyc_core::{
  event::ProviderStatus,
  record::{KycRecord, KycStatus, UserId},
  store::{KycRepository, UpsertResult},
  transition::{Decision, decide},
};

use crate::{IngestOutcome, KycEngine, KycError, Result};

/// Re-read attempts when a compare-and-set write loses to another writer.
pub(crate) const CAS_ATTEMPTS: usize = 3;

impl<R: KycRepository> KycEngine<R> {
  /// Feed a provider-reported status for `(provider, reference_id)` through
  /// the transition rules and persist the result.
  ///
  /// Runs under the user's lock and writes with compare-and-set, so of any
  /// number of concurrent identical deliveries exactly one applies and
  /// notifies. Redeliveries and suppressed corrections come back as `Ok`
  /// with the current record.
  pub(crate) async fn apply_provider_status(
    &self,
    user_id: UserId,
    provider: &str,
    reference_id: &str,
    incoming: &ProviderStatus,
    token: DateTime<Utc>,
  ) -> Result<(KycRecord, IngestOutcome)> {
    let _guard = self.locks.lock(user_id).await;

    for _ in 0..CAS_ATTEMPTS {
      let current = self.current_for(user_id, provider, reference_id).await?;
      let now = Utc::now();

      let next =
        match decide(&current, incoming, token, now, self.config.transition_policy()) {
          Decision::Apply(next) => next,
          Decision::Duplicate => {
            return acknowledge(current, KycError::StaleOrDuplicateEvent);
          }
          Decision::CorrectionSuppressed { current: from, proposed } => {
            return acknowledge(current, KycError::InvalidTransition {
              current: from,
              proposed,
            });
          }
          Decision::Ignored => {
            tracing::debug!(
              %user_id,
              status = %current.status(),
              incoming = %incoming.status,
              "event carries no transition"
            );
            return Ok((current, IngestOutcome::Ignored));
          }
        };

      match self
        .repo
        .upsert(next.clone(), Some(current.version))
        .await
        .map_err(KycError::store)?
      {
        UpsertResult::Written => {
          tracing::info!(
            %user_id,
            provider,
            reference_id,
            old = %current.status(),
            new = %next.status(),
            "kyc status transition applied"
          );
          self.announce(user_id, current.status(), next.status()).await;
          return Ok((next, IngestOutcome::Applied));
        }
        UpsertResult::Conflict => {
          tracing::debug!(%user_id, "record changed concurrently, re-reading");
        }
      }
    }

    Err(KycError::Conflict(user_id))
  }

  /// Record that reconciliation asked the provider about this check without
  /// learning anything new. Moves the record to the back of the sweep queue.
  ///
  /// A no-op once the record has left pending or moved to another check.
  pub(crate) async fn mark_polled(
    &self,
    user_id: UserId,
    provider: &str,
    reference_id: &str,
    now: DateTime<Utc>,
  ) -> Result<()> {
    let _guard = self.locks.lock(user_id).await;

    for _ in 0..CAS_ATTEMPTS {
      let current = match self.current_for(user_id, provider, reference_id).await {
        Ok(current) if current.status() == KycStatus::Pending => current,
        Ok(_) | Err(KycError::UnknownReference { .. }) => return Ok(()),
        Err(e) => return Err(e),
      };

      match self
        .repo
        .upsert(current.polled(now), Some(current.version))
        .await
        .map_err(KycError::store)?
      {
        UpsertResult::Written => return Ok(()),
        UpsertResult::Conflict => {
          tracing::debug!(%user_id, "record changed concurrently, re-reading");
        }
      }
    }

    Err(KycError::Conflict(user_id))
  }

  /// The user's record, provided it is still tied to this provider check.
  async fn current_for(
    &self,
    user_id: UserId,
    provider: &str,
    reference_id: &str,
  ) -> Result<KycRecord> {
    self
      .repo
      .get_by_user_id(user_id)
      .await
      .map_err(KycError::store)?
      .filter(|record| record.is_for(provider, reference_id))
      .ok_or_else(|| KycError::UnknownReference {
        provider:     provider.to_owned(),
        reference_id: reference_id.to_owned(),
      })
  }

  /// Notify when the effective status changed.
  pub(crate) async fn announce(&self, user_id: UserId, old: KycStatus, new: KycStatus) {
    if old != new {
      self.notifier.notify_status_changed(user_id, old, new).await;
    }
  }
}

/// Turn a benign no-op into an acknowledged outcome.
fn acknowledge(
  record: KycRecord,
  reason: KycError,
) -> Result<(KycRecord, IngestOutcome)> {
  let outcome = match &reason {
    KycError::StaleOrDuplicateEvent => IngestOutcome::Duplicate,
    KycError::InvalidTransition { .. } => IngestOutcome::CorrectionSuppressed,
    _ => return Err(reason),
  };
  tracing::info!(user_id = %record.user_id, %reason, "event acknowledged without change");
  Ok((record, outcome))
}
