//! Webhook ingestion: authenticate, parse, correlate, transition.

use kyc_core::{record::KycRecord, store::KycRepository};
use kyc_providers::HeaderMap;
use serde::Serialize;

use crate::{KycEngine, KycError, Result};

/// What an accepted webhook did to the record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum IngestOutcome {
  Applied,
  /// Redelivery of an event already reflected in the record.
  Duplicate,
  /// A terminal-to-terminal change the policy does not allow.
  CorrectionSuppressed,
  Ignored,
}

#[derive(Debug, Clone)]
pub struct Ingested {
  pub record:  KycRecord,
  pub outcome: IngestOutcome,
}

impl<R: KycRepository> KycEngine<R> {
  /// Process one webhook delivery for `provider_id`.
  ///
  /// Safe to call repeatedly with the same delivery. Security failures
  /// ([`KycError::UnknownProvider`], [`KycError::InvalidSignature`]) are
  /// logged under the `kyc::security` target; their detail stays in the log.
  pub async fn ingest(
    &self,
    provider_id: &str,
    headers: &HeaderMap,
    raw_body: &[u8],
  ) -> Result<Ingested> {
    let Ok(adapter) = self.registry.resolve(provider_id) else {
      tracing::warn!(
        target: "kyc::security",
        provider = provider_id,
        reason = "unknown provider",
        "webhook rejected"
      );
      return Err(KycError::UnknownProvider(provider_id.to_owned()));
    };

    if let Err(e) = adapter.verify_webhook_signature(headers, raw_body) {
      tracing::warn!(
        target: "kyc::security",
        provider = provider_id,
        reason = %e,
        body_len = raw_body.len(),
        "webhook rejected"
      );
      return Err(KycError::InvalidSignature(e));
    }

    let event = adapter.parse_webhook_payload(raw_body).map_err(|e| {
      tracing::warn!(provider = provider_id, error = %e, "discarding malformed webhook");
      KycError::MalformedPayload(e)
    })?;

    let found = self
      .repo
      .get_by_provider_reference(provider_id, &event.reference_id)
      .await
      .map_err(KycError::store)?;
    let Some(found) = found else {
      tracing::info!(
        provider = provider_id,
        reference_id = %event.reference_id,
        event_type = %event.event_type,
        "webhook for unknown reference"
      );
      return Err(KycError::UnknownReference {
        provider:     provider_id.to_owned(),
        reference_id: event.reference_id,
      });
    };

    let (record, outcome) = self
      .apply_provider_status(
        found.user_id,
        provider_id,
        &event.reference_id,
        &event.status,
        event.ordering_token(),
      )
      .await?;

    if event.status.status.is_terminal() {
      self.sessions.close(provider_id, &event.reference_id);
    }

    tracing::debug!(
      user_id = %record.user_id,
      provider = provider_id,
      event_type = %event.event_type,
      ?outcome,
      "webhook processed"
    );
    Ok(Ingested { record, outcome })
  }
}
