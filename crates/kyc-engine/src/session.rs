//! Session manager: opening provider checks and caching the sessions.

use std::{
  collections::HashMap,
  sync::{Mutex, PoisonError},
};

use chrono::{DateTime, Utc};
use kyc_core::{
  record::{KycRecord, UserId},
  session::VerificationSession,
  store::{KycRepository, UpsertResult},
};
use kyc_providers::Url;

use crate::{KycEngine, KycError, Result, apply::CAS_ATTEMPTS};

// ─── Cache ───────────────────────────────────────────────────────────────────

struct CachedSession {
  session:  VerificationSession,
  evict_at: DateTime<Utc>,
  closed:   bool,
}

/// Issued sessions keyed by `(provider, reference_id)`.
///
/// Purely informational: the durable side effect of initiation is the
/// record upsert, so losing the cache loses nothing.
#[derive(Default)]
pub struct SessionCache {
  entries: Mutex<HashMap<(String, String), CachedSession>>,
}

impl SessionCache {
  pub fn new() -> Self { Self::default() }

  /// Cache `session` until it expires or `ttl` passes, whichever is first.
  /// Expired entries are pruned on the way in.
  pub fn insert(
    &self,
    session: VerificationSession,
    now: DateTime<Utc>,
    ttl: chrono::Duration,
  ) {
    let evict_at = now
      .checked_add_signed(ttl)
      .map_or(session.expires_at, |cap| cap.min(session.expires_at));
    let key = (session.provider.clone(), session.reference_id.clone());

    let mut entries = self.entries.lock().unwrap_or_else(PoisonError::into_inner);
    entries.retain(|_, entry| entry.evict_at > now);
    entries.insert(key, CachedSession { session, evict_at, closed: false });
  }

  /// The session for a provider check, if it is still open.
  pub fn lookup(
    &self,
    provider: &str,
    reference_id: &str,
    now: DateTime<Utc>,
  ) -> Option<VerificationSession> {
    let entries = self.entries.lock().unwrap_or_else(PoisonError::into_inner);
    entries
      .get(&(provider.to_owned(), reference_id.to_owned()))
      .filter(|entry| !entry.closed && entry.evict_at > now)
      .map(|entry| entry.session.clone())
  }

  /// Mark a session finished. Returns whether it was cached.
  pub fn close(&self, provider: &str, reference_id: &str) -> bool {
    let mut entries = self.entries.lock().unwrap_or_else(PoisonError::into_inner);
    match entries.get_mut(&(provider.to_owned(), reference_id.to_owned())) {
      Some(entry) => {
        entry.closed = true;
        true
      }
      None => false,
    }
  }

  pub fn len(&self) -> usize {
    self.entries.lock().unwrap_or_else(PoisonError::into_inner).len()
  }

  pub fn is_empty(&self) -> bool { self.len() == 0 }
}

// ─── Initiation ──────────────────────────────────────────────────────────────

/// Accept only absolute `http`/`https` URLs as redirect targets.
fn parse_redirect_url(raw: &str) -> Result<Url> {
  let url =
    Url::parse(raw).map_err(|e| KycError::InvalidRedirectUrl(format!("{raw:?}: {e}")))?;
  match url.scheme() {
    "http" | "https" if url.has_host() => Ok(url),
    _ => Err(KycError::InvalidRedirectUrl(format!(
      "{raw:?}: expected an absolute http(s) url"
    ))),
  }
}

impl<R: KycRepository> KycEngine<R> {
  /// Open a verification check for `user_id` with `provider_id`.
  ///
  /// The user's record is reset to pending under the new reference, which
  /// clears any earlier outcome. Transient provider failures are retried
  /// within the configured budget before surfacing as
  /// [`KycError::ProviderUnavailable`].
  pub async fn initiate(
    &self,
    user_id: UserId,
    provider_id: &str,
    redirect_url: &str,
  ) -> Result<VerificationSession> {
    let redirect = parse_redirect_url(redirect_url)?;

    if !self.repo.user_exists(user_id).await.map_err(KycError::store)? {
      return Err(KycError::UserNotFound(user_id));
    }

    let adapter = self
      .registry
      .resolve(provider_id)
      .map_err(|_| KycError::ProviderNotConfigured(provider_id.to_owned()))?;

    let mut session = self
      .retry
      .run("init_verification", || adapter.init_verification(user_id, &redirect))
      .await
      .map_err(|e| {
        tracing::warn!(%user_id, provider = provider_id, error = %e, "could not open verification");
        KycError::ProviderUnavailable(e)
      })?;
    session.provider = provider_id.to_owned();

    let record = {
      let _guard = self.locks.lock(user_id).await;
      self.record_submission(user_id, provider_id, &session.reference_id).await?
    };

    tracing::info!(
      %user_id,
      provider = provider_id,
      reference_id = %record.reference_id,
      "verification session opened"
    );

    self
      .sessions
      .insert(session.clone(), Utc::now(), self.config.session_ttl());
    Ok(session)
  }

  /// Write the pending record for a new submission. Caller holds the lock.
  async fn record_submission(
    &self,
    user_id: UserId,
    provider_id: &str,
    reference_id: &str,
  ) -> Result<KycRecord> {
    for _ in 0..CAS_ATTEMPTS {
      let now = Utc::now();
      let (next, expected) =
        match self.repo.get_by_user_id(user_id).await.map_err(KycError::store)? {
          None => (KycRecord::pending(user_id, provider_id, reference_id, now), None),
          Some(current) => (
            current.resubmitted(provider_id, reference_id, now),
            Some(current.version),
          ),
        };

      match self
        .repo
        .upsert(next.clone(), expected)
        .await
        .map_err(KycError::store)?
      {
        UpsertResult::Written => return Ok(next),
        UpsertResult::Conflict => {
          tracing::debug!(%user_id, "record changed during submission, re-reading");
        }
      }
    }
    Err(KycError::Conflict(user_id))
  }
}
