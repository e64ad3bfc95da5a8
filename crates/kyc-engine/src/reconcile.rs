//! Reconciliation: pull the provider's view of a check and feed it through
//! the same transition step webhooks use.

use std::{sync::Arc, time::Duration};

use chrono::{DateTime, Utc};
use kyc_core::{
  record::{KycRecord, UserId},
  store::KycRepository,
};
use serde::Serialize;
use tokio::{task::JoinHandle, time::MissedTickBehavior};

use crate::{IngestOutcome, KycEngine, KycError, Result};

/// Totals for one sweep pass.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct SweepReport {
  pub examined: usize,
  pub changed:  usize,
  pub failed:   usize,
}

impl<R: KycRepository> KycEngine<R> {
  /// Re-query the provider for the user's current check.
  ///
  /// On adapter failure the stored record is returned unchanged inside
  /// [`KycError::ProviderQueryFailed`]. A user who never submitted gets
  /// [`KycError::NoActiveSession`].
  pub async fn sync(&self, user_id: UserId) -> Result<KycRecord> {
    self.reconcile(user_id).await.map(|(record, _)| record)
  }

  async fn reconcile(&self, user_id: UserId) -> Result<(KycRecord, bool)> {
    let Some(record) = self
      .repo
      .get_by_user_id(user_id)
      .await
      .map_err(KycError::store)?
    else {
      return Err(self.missing_record(user_id).await?);
    };

    let adapter = self
      .registry
      .resolve(&record.provider)
      .map_err(|_| KycError::ProviderNotConfigured(record.provider.clone()))?;

    let status = match self
      .retry
      .run("get_status", || adapter.get_status(&record.reference_id))
      .await
    {
      Ok(status) => status,
      Err(source) => {
        tracing::warn!(
          %user_id,
          provider = %record.provider,
          reference_id = %record.reference_id,
          error = %source,
          "provider status query failed"
        );
        return Err(KycError::ProviderQueryFailed {
          record: Box::new(record),
          source,
        });
      }
    };

    let token = status.observed_at.unwrap_or_else(Utc::now);
    match self
      .apply_provider_status(
        user_id,
        &record.provider,
        &record.reference_id,
        &status,
        token,
      )
      .await
    {
      Ok((record, outcome)) => Ok((record, outcome == IngestOutcome::Applied)),
      // Resubmitted while we were polling; the new check is not ours to judge.
      Err(KycError::UnknownReference { .. }) => {
        let current = self
          .repo
          .get_by_user_id(user_id)
          .await
          .map_err(KycError::store)?
          .ok_or(KycError::NoActiveSession(user_id))?;
        Ok((current, false))
      }
      Err(e) => Err(e),
    }
  }

  /// The error for a user without a record.
  pub(crate) async fn missing_record(&self, user_id: UserId) -> Result<KycError> {
    if self.repo.user_exists(user_id).await.map_err(KycError::store)? {
      Ok(KycError::NoActiveSession(user_id))
    } else {
      Ok(KycError::UserNotFound(user_id))
    }
  }

  /// Sync pending records that have neither changed nor been polled since
  /// `now - stale_pending_after`, least recently touched first, up to the
  /// batch limit. Records are handled one at a time to bound load on
  /// providers.
  ///
  /// A poll that leaves a record pending stamps it with `now`, so a batch of
  /// abandoned checks cannot keep the rest of the queue from being reached.
  pub async fn sweep(&self, now: DateTime<Utc>) -> Result<SweepReport> {
    let cutoff = now
      .checked_sub_signed(self.config.stale_pending_after())
      .unwrap_or(DateTime::<Utc>::MIN_UTC);
    let stale = self
      .repo
      .find_stale_pending(cutoff, self.config.sweep_batch_limit)
      .await
      .map_err(KycError::store)?;

    let mut report = SweepReport::default();
    for record in stale {
      report.examined += 1;
      match self.reconcile(record.user_id).await {
        Ok((_, true)) => {
          report.changed += 1;
          continue;
        }
        Ok((_, false)) => {}
        Err(e) => {
          report.failed += 1;
          tracing::warn!(user_id = %record.user_id, error = %e, "sweep could not sync record");
        }
      }

      if let Err(e) = self
        .mark_polled(record.user_id, &record.provider, &record.reference_id, now)
        .await
      {
        tracing::warn!(user_id = %record.user_id, error = %e, "sweep could not record poll time");
      }
    }

    tracing::info!(
      examined = report.examined,
      changed = report.changed,
      failed = report.failed,
      "reconciliation sweep finished"
    );
    Ok(report)
  }
}

/// Run [`KycEngine::sweep`] every `every` on a single background task.
/// Ticks that fall behind are skipped rather than bunched.
pub fn spawn_sweeper<R>(engine: Arc<KycEngine<R>>, every: Duration) -> JoinHandle<()>
where
  R: KycRepository + 'static,
{
  tokio::spawn(async move {
    let mut ticker = tokio::time::interval(every);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
    loop {
      ticker.tick().await;
      if let Err(e) = engine.sweep(Utc::now()).await {
        tracing::warn!(error = %e, "reconciliation sweep failed");
      }
    }
  })
}
